//! Client-to-central forwarding under load.
//!
//! Nothing is compared here: the run leaves both servers' counters in the
//! log for inspection.

use async_trait::async_trait;
use quill_load::StressParams;

use crate::context::ScenarioContext;
use crate::error::Result;
use crate::scenario::Scenario;
use crate::scenarios::categories::CATEGORIES;

/// A client server forwarding to a central one, driven by nine senders.
#[derive(Debug, Default)]
pub struct Latency;

async fn log_counters(ctx: &ScenarioContext, role: &str, port: u16) {
    match ctx.supervisor().counters(port).await {
        Ok(counters) => {
            for (name, value) in &counters {
                tracing::info!(role, port, counter = %name, value, "counter");
            }
        }
        Err(e) => tracing::warn!(role, port, error = %e, "could not read counters"),
    }
}

#[async_trait]
impl Scenario for Latency {
    fn name(&self) -> &str {
        "latency"
    }

    fn description(&self) -> &str {
        "forwarding latency from a client server to a central server (manual)"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let client_port = ctx.config().sut.port;
        let central_port = ctx.config().sut.secondary_port;
        ctx.start("latency.central", central_port, "scribe.conf.latency.central")
            .await?;
        ctx.start("latency.client", client_port, "scribe.conf.latency.client")
            .await?;

        let categories: Vec<String> = CATEGORIES.iter().map(|c| (*c).to_string()).collect();
        let template = StressParams {
            rate: 10_000,
            total: 200_000,
            batch_size: 20,
            avg_size: 100,
            ..StressParams::new("hello", "client1")
        };
        ctx.super_stress(&categories, &template).await?;
        ctx.settle("forwarding drains", ctx.grace().latency_drain).await;

        log_counters(ctx, "client", client_port).await;
        log_counters(ctx, "central", central_port).await;

        ctx.stop(client_port).await;
        ctx.stop(central_port).await;
        Ok(())
    }
}
