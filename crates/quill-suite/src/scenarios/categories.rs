//! Prefix and categories stores under concurrent senders.

use async_trait::async_trait;
use quill_core::Delivery;
use quill_load::StressParams;

use crate::context::ScenarioContext;
use crate::error::Result;
use crate::scenario::Scenario;

/// Categories with overlapping prefixes, one isolated sender each.
pub const CATEGORIES: &[&str] = &[
    "hello", "foo", "food", "rock", "rockstar", "paper", "scissors", "apple", "banana",
];

/// Nine concurrent senders; each category must land whole in its own
/// directory.
#[derive(Debug, Default)]
pub struct Categories;

fn template() -> StressParams {
    StressParams {
        rate: 1000,
        total: 100_000,
        batch_size: 20,
        avg_size: 100,
        ..StressParams::new("hello", "client1")
    }
}

#[async_trait]
impl Scenario for Categories {
    fn name(&self) -> &str {
        "categories"
    }

    fn description(&self) -> &str {
        "concurrent senders on prefix-overlapping categories"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.port;
        ctx.start("categoriestest", port, "scribe.conf.categoriestest").await?;

        let categories: Vec<String> = CATEGORIES.iter().map(|c| (*c).to_string()).collect();
        let template = template();
        ctx.super_stress(&categories, &template).await?;
        ctx.settle("output settle", ctx.grace().settle).await;

        for category in &categories {
            let dir = ctx.primary(category);
            let prefix = format!("{category}-");
            ctx.expect_delivery(
                &dir,
                &prefix,
                &template.client_id,
                Delivery::new(template.total, 0),
            )?;
        }

        ctx.stop(port).await;
        Ok(())
    }
}
