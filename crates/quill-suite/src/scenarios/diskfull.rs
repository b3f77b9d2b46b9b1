//! Client store fills up while the central server is down, then drains.
//!
//! The client server's store lives on a 16 MiB tmpfs so its buffer runs
//! out of space long before the run ends. Needs root for `mount`.

use async_trait::async_trait;
use quill_load::StressParams;

use crate::context::ScenarioContext;
use crate::error::{Result, SuiteError};
use crate::report::Check;
use crate::scenario::Scenario;

const TMPFS_SIZE: &str = "size=16m";

/// Central server starts late; everything buffered by the client must
/// arrive and the client's store must end up empty.
#[derive(Debug, Default)]
pub struct DiskFull;

async fn set_up(ctx: &mut ScenarioContext) -> Result<()> {
    let central = ctx.primary("central");
    let client = ctx.primary("client");
    tokio::fs::create_dir_all(&central).await?;
    tokio::fs::create_dir_all(&client).await?;

    let target = client.to_string_lossy().into_owned();
    let code = ctx
        .supervisor()
        .run_command("mount", ["-t", "tmpfs", "-o", TMPFS_SIZE, "tmpfs", target.as_str()])
        .await?;
    let label = format!("mount tmpfs on {target}");
    if code == 0 {
        ctx.check(Check::pass(label));
        Ok(())
    } else {
        ctx.check(Check::fail(label, format!("mount exited with {code}")));
        Err(SuiteError::setup(format!("could not mount tmpfs on {target}")))
    }
}

/// Servers must be stopped before the unmount.
async fn tear_down(ctx: &mut ScenarioContext) {
    ctx.teardown().await;

    let client = ctx.primary("client");
    let target = client.to_string_lossy().into_owned();
    match ctx.supervisor().run_command("umount", [target.as_str()]).await {
        Ok(0) => {}
        Ok(code) => tracing::warn!(target_dir = %target, code, "umount failed"),
        Err(e) => tracing::warn!(target_dir = %target, error = %e, "could not run umount"),
    }
    for dir in [client, ctx.primary("central")] {
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::debug!(dir = %dir.display(), error = %e, "could not remove scratch dir");
        }
    }
}

async fn exercise(ctx: &mut ScenarioContext) -> Result<()> {
    let client_port = ctx.config().sut.port;
    let central_port = ctx.config().sut.secondary_port;

    ctx.start("diskfulltest.client", client_port, "scribe.conf.diskfull.client")
        .await?;

    let params = StressParams {
        rate: 1000,
        total: 200_000,
        batch_size: 20,
        avg_size: 100,
        ..StressParams::new("test", "client1")
    };
    let sent = ctx.stress(&params).await?;
    ctx.settle("client store fills", ctx.grace().settle).await;

    ctx.start("diskfulltest.central", central_port, "scribe.conf.diskfull.central")
        .await?;
    ctx.settle("buffer drains to central", ctx.grace().buffer_flush)
        .await;

    // forwarding may duplicate, so only a lower bound holds centrally
    let central = ctx.primary("central/test");
    ctx.expect_at_least(&central, "test_", &params.client_id, sent.attempted)?;
    let client = ctx.primary("client/test");
    ctx.expect_drained(&client, "test_", &params.client_id);

    ctx.stop(client_port).await;
    ctx.stop(central_port).await;
    Ok(())
}

#[async_trait]
impl Scenario for DiskFull {
    fn name(&self) -> &str {
        "diskfull"
    }

    fn description(&self) -> &str {
        "client buffer on a full disk drains once the central server is up (root)"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        set_up(ctx).await?;
        let result = exercise(ctx).await;
        tear_down(ctx).await;
        result
    }
}
