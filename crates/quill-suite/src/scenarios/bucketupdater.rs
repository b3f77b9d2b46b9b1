//! Bucket store driven by an external bucket-to-server mapping service.
//!
//! Three downstream servers write under `bucketupdater/server{1,2,3}`. The
//! mapping helper serves whatever `bidmap` in the config directory points
//! to; swapping that symlink must reroute buckets without restarting the
//! central server.

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use quill_core::LogEntry;

use crate::context::ScenarioContext;
use crate::error::Result;
use crate::report::Check;
use crate::scenario::Scenario;

const DOWNSTREAM: [(u16, &str, &str); 3] = [
    (1465, "bucketupdater.server1", "scribe.conf.bucketupdater.server1"),
    (1466, "bucketupdater.server2", "scribe.conf.bucketupdater.server2"),
    (1467, "bucketupdater.server3", "scribe.conf.bucketupdater.server3"),
];

const MAPPING_LINK: &str = "bidmap";

/// One mapping and where each bucket's message must land.
struct Round {
    mapping: &'static str,
    bucket1: &'static str,
    bucket2: &'static str,
}

const ROUNDS: [Round; 2] = [
    Round {
        mapping: "bidmap.1",
        bucket1: "server1/bucket001/content_current",
        bucket2: "server2/bucket002/content_current",
    },
    Round {
        mapping: "bidmap.2",
        bucket1: "server2/bucket001/content_current",
        bucket2: "server1/bucket002/content_current",
    },
];

/// Routes by bucket id, swaps the mapping, and routes again.
#[derive(Debug, Default)]
pub struct BucketUpdater;

/// Points `<dir>/bidmap` at `target` by renaming a fresh link over it.
#[cfg(unix)]
async fn point_mapping(dir: &Path, target: &str) -> Result<()> {
    let link = dir.join(MAPPING_LINK);
    let staging = dir.join(format!("{MAPPING_LINK}.swap"));
    match tokio::fs::remove_file(&staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::symlink(target, &staging).await?;
    tokio::fs::rename(&staging, &link).await?;
    tracing::info!(link = %link.display(), target, "mapping switched");
    Ok(())
}

#[cfg(not(unix))]
async fn point_mapping(_dir: &Path, _target: &str) -> Result<()> {
    Err(crate::error::SuiteError::setup("mapping symlinks need a unix host"))
}

/// `<bucket>;test #<round>\n`: the prefix before `;` is the bucket key.
fn round_messages(round: usize) -> [LogEntry; 2] {
    [
        LogEntry::new("bucketupdater", format!("0;test #{round}\n")),
        LogEntry::new("bucketupdater", format!("1;test #{round}\n")),
    ]
}

async fn route(ctx: &mut ScenarioContext, number: usize, round: &Round) -> Result<()> {
    ctx.send(&round_messages(number)).await;
    ctx.settle("messages routed", ctx.grace().route_check).await;

    let bucket1 = ctx.primary("bucketupdater").join(round.bucket1);
    ctx.expect_contains(&bucket1, format!("0;test #{number}").as_bytes())?;
    let bucket2 = ctx.primary("bucketupdater").join(round.bucket2);
    ctx.expect_contains(&bucket2, format!("1;test #{number}").as_bytes())?;
    Ok(())
}

#[async_trait]
impl Scenario for BucketUpdater {
    fn name(&self) -> &str {
        "bucketupdater"
    }

    fn description(&self) -> &str {
        "bucket store reroutes when the mapping service changes (manual)"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        for (port, test_name, conf) in DOWNSTREAM {
            ctx.start(test_name, port, conf).await?;
        }

        let conf_dir = ctx.config().sut.conf_dir.clone();
        let [first, second] = &ROUNDS;
        point_mapping(&conf_dir, first.mapping).await?;

        let updater = ctx.config().sut.bucket_updater.clone();
        let updater_port = ctx.config().sut.updater_port.to_string();
        let mapping = conf_dir.join(MAPPING_LINK);
        ctx.spawn_helper(
            "bidupdater",
            &updater,
            [
                OsStr::new("-p"),
                OsStr::new(&updater_port),
                OsStr::new("-f"),
                mapping.as_os_str(),
            ],
        )?;

        let central = ctx.config().sut.port;
        ctx.start("bucketupdater.central", central, "scribe.conf.bucketupdater.central")
            .await?;

        route(ctx, 1, first).await?;

        if let Err(e) = point_mapping(&conf_dir, second.mapping).await {
            ctx.check(Check::fail("switch mapping", e.to_string()));
            return Err(e);
        }
        ctx.settle("updater picks up new mapping", ctx.grace().reconfigure)
            .await;

        route(ctx, 2, second).await?;

        for (port, _, _) in DOWNSTREAM {
            ctx.stop(port).await;
        }
        ctx.stop(central).await;
        Ok(())
    }
}
