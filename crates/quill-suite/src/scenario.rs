//! Scenario trait and registry.

use async_trait::async_trait;

use crate::context::ScenarioContext;
use crate::error::{Result, SuiteError};
use crate::scenarios;

/// An end-to-end conformance scenario.
///
/// A scenario starts servers, sends traffic, waits, and records checks on
/// its context. Returning `Err` aborts it; servers still tracked by the
/// context are stopped by the runner either way.
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Name used on the command line.
    fn name(&self) -> &str;

    /// One-line description for `quill list`.
    fn description(&self) -> &str;

    /// Runs the scenario.
    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()>;
}

/// Scenarios run when none are named.
pub const DEFAULT_SUITE: &[&str] = &["simple", "basic", "basic2", "buffer", "param", "twodefault"];

/// Named scenarios, in registration order.
pub struct ScenarioRegistry {
    scenarios: Vec<Box<dyn Scenario>>,
}

impl ScenarioRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scenarios: Vec::new(),
        }
    }

    /// The full built-in catalogue.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for scenario in scenarios::catalogue() {
            registry.register(scenario);
        }
        registry
    }

    /// Adds a scenario, replacing any with the same name.
    pub fn register(&mut self, scenario: Box<dyn Scenario>) {
        self.scenarios.retain(|s| s.name() != scenario.name());
        self.scenarios.push(scenario);
    }

    /// Looks a scenario up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.name() == name)
            .map(|s| &**s)
    }

    /// Resolves names to scenarios, failing on the first unknown one.
    ///
    /// # Errors
    /// Returns [`SuiteError::UnknownScenario`] for a name not registered.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&dyn Scenario>> {
        names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .ok_or_else(|| SuiteError::UnknownScenario(name.as_ref().to_string()))
            })
            .collect()
    }

    /// Every registered scenario.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Scenario> {
        self.scenarios.iter().map(|s| &**s)
    }

    /// Number of registered scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Scenario for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "does nothing"
        }

        async fn run(&self, _ctx: &mut ScenarioContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_builtin_covers_default_suite() {
        let registry = ScenarioRegistry::builtin();
        assert!(registry.resolve(DEFAULT_SUITE).is_ok());
        for name in [
            "simple",
            "basic",
            "basic2",
            "twodefault",
            "buffer",
            "categories",
            "param",
            "latency",
            "diskfull",
            "bucketupdater",
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ScenarioRegistry::builtin();
        let err = registry
            .resolve(&["simple", "reloadtest"])
            .err()
            .expect("unknown name");
        assert!(matches!(err, SuiteError::UnknownScenario(name) if name == "reloadtest"));
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = ScenarioRegistry::new();
        assert!(registry.is_empty());
        registry.register(Box::new(Named("custom")));
        registry.register(Box::new(Named("custom")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.iter().next().map(|s| s.name()), Some("custom"));
    }
}
