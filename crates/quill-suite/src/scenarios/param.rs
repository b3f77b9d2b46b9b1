//! Store parameters from the config file reach the output path.

use async_trait::async_trait;
use quill_core::LogEntry;

use crate::context::ScenarioContext;
use crate::error::Result;
use crate::scenario::Scenario;

/// One message to a store whose file name comes from a config parameter.
#[derive(Debug, Default)]
pub struct Param;

#[async_trait]
impl Scenario for Param {
    fn name(&self) -> &str {
        "param"
    }

    fn description(&self) -> &str {
        "file store honours the configured base file name"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.port;
        ctx.start("paramtest", port, "scribe.conf.paramtest").await?;

        ctx.send(&[LogEntry::new("paramtest", "paramtest")]).await;
        ctx.settle("message routed", ctx.grace().route_check).await;

        let current = ctx.primary("paramtest/primary_current");
        ctx.expect_contains(&current, b"paramtest")?;

        ctx.stop(port).await;
        Ok(())
    }
}
