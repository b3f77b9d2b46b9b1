//! Buffer store: traffic sent while the primary store is unavailable is
//! replayed once it comes back.

use async_trait::async_trait;
use quill_core::Delivery;
use quill_load::StressParams;

use crate::context::ScenarioContext;
use crate::error::Result;
use crate::scenario::Scenario;

/// Removes the primary root under a buffering server, sends, restores the
/// root, and expects nothing lost once the buffer drains.
#[derive(Debug, Default)]
pub struct Buffer;

fn run(category: &str, client: &str, rate: u64, total: u64, batch_size: usize) -> StressParams {
    StressParams {
        rate,
        total,
        batch_size,
        avg_size: 100,
        ..StressParams::new(category, client)
    }
}

async fn remove_root(ctx: &ScenarioContext) -> Result<()> {
    let root = ctx.config().primary_root().to_path_buf();
    match tokio::fs::remove_dir_all(&root).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tracing::info!(root = %root.display(), "primary store removed");
    Ok(())
}

#[async_trait]
impl Scenario for Buffer {
    fn name(&self) -> &str {
        "buffer"
    }

    fn description(&self) -> &str {
        "messages buffered while the primary store is missing are delivered later"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.port;
        ctx.start("buffertest", port, "scribe.conf.buffertest").await?;

        remove_root(ctx).await?;

        ctx.stress(&run("test", "client1", 1000, 10_000, 20)).await?;
        ctx.settle("server notices missing store", ctx.grace().settle).await;
        ctx.stress(&run("test", "client1", 1000, 10_000, 20)).await?;
        ctx.stress(&run("test", "client2", 10_000, 200_000, 50)).await?;
        ctx.stress(&run("foodoo", "client1", 10_000, 10_000, 20)).await?;
        ctx.stress(&run("rock", "client1", 100, 10_000, 20)).await?;

        let root = ctx.config().primary_root().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(root = %root.display(), "primary store restored");
        ctx.settle("buffer drains", ctx.grace().buffer_flush).await;

        let test = ctx.primary("test");
        ctx.expect_delivery(&test, "test-", "client1", Delivery::new(20_000, 1))?;
        ctx.expect_delivery(&test, "test-", "client2", Delivery::new(200_000, 0))?;
        let foodoo = ctx.primary("foodoo");
        ctx.expect_delivery(&foodoo, "foodoo-", "client1", Delivery::new(10_000, 0))?;
        let rock = ctx.primary("rock");
        ctx.expect_delivery(&rock, "rock-", "client1", Delivery::new(10_000, 0))?;

        ctx.stop(port).await;
        Ok(())
    }
}
