//! Built-in scenarios.
//!
//! `latency`, `diskfull` and `bucketupdater` are not in the default suite:
//! the first only logs counters, the other two need root or extra binaries.

pub mod bucketupdater;
pub mod buffer;
pub mod categories;
pub mod diskfull;
pub mod latency;
pub mod matrix;
pub mod param;
pub mod simple;

pub use bucketupdater::BucketUpdater;
pub use buffer::Buffer;
pub use categories::Categories;
pub use diskfull::DiskFull;
pub use latency::Latency;
pub use matrix::{BASIC, BASIC2, DeliveryMatrix, Expect, Root, Step, TWODEFAULT, Traffic};
pub use param::Param;
pub use simple::Simple;

use crate::scenario::Scenario;

/// Every built-in scenario, in listing order.
#[must_use]
pub fn catalogue() -> Vec<Box<dyn Scenario>> {
    let scenarios: [Box<dyn Scenario>; 10] = [
        Box::new(Simple),
        Box::new(BASIC),
        Box::new(BASIC2),
        Box::new(TWODEFAULT),
        Box::new(Buffer),
        Box::new(Categories),
        Box::new(Param),
        Box::new(Latency),
        Box::new(DiskFull),
        Box::new(BucketUpdater),
    ];
    scenarios.into()
}
