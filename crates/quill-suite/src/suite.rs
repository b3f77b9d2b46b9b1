//! Suite runner.

use std::time::Duration;

use quill_core::HarnessConfig;

use crate::context::{Environment, ScenarioContext};
use crate::error::Result;
use crate::report::{ScenarioOutcome, SuiteReport};
use crate::scenario::Scenario;

/// Removes and recreates every scratch root.
///
/// # Errors
/// Returns an error if a root cannot be removed or created.
pub async fn clean_scratch(config: &HarnessConfig) -> Result<()> {
    for root in &config.paths.scratch_roots {
        match tokio::fs::remove_dir_all(root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(root).await?;
        tracing::debug!(root = %root.display(), "scratch root reset");
    }
    Ok(())
}

/// Runs one scenario on clean scratch roots.
///
/// Servers the scenario leaves running are stopped before the outcome is
/// built, whether it returned normally or aborted.
pub async fn run_scenario(env: &Environment, scenario: &dyn Scenario) -> ScenarioOutcome {
    let name = scenario.name();
    tracing::info!(scenario = name, "running");

    if let Err(e) = clean_scratch(env.config()).await {
        tracing::error!(scenario = name, error = %e, "could not reset scratch roots");
        return ScenarioOutcome::new(name, Vec::new(), Some(e.to_string()), Duration::ZERO);
    }

    let mut ctx = ScenarioContext::new(name, env);
    let result = scenario.run(&mut ctx).await;
    ctx.teardown().await;

    let error = match result {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(scenario = name, error = %e, "scenario aborted");
            Some(e)
        }
    };
    let outcome = ctx.finish(error);
    if outcome.passed {
        tracing::info!(scenario = name, elapsed_ms = outcome.elapsed_ms, "scenario passed");
    } else {
        tracing::warn!(
            scenario = name,
            failed_checks = outcome.failures().count(),
            elapsed_ms = outcome.elapsed_ms,
            "scenario failed"
        );
    }
    outcome
}

/// Runs scenarios in order, handing each outcome to `observer` as it
/// completes.
pub async fn run_suite<F>(
    env: &Environment,
    scenarios: &[&dyn Scenario],
    mut observer: F,
) -> SuiteReport
where
    F: FnMut(&ScenarioOutcome),
{
    let mut report = SuiteReport::default();
    for scenario in scenarios {
        let outcome = run_scenario(env, *scenario).await;
        observer(&outcome);
        report.push(outcome);
    }
    tracing::info!(passed = report.passed(), failed = report.failed(), "suite finished");
    report
}
