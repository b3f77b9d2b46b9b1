//! Table-driven delivery scenarios.
//!
//! Each step sends one stress run, waits the settle period, then compares
//! the verifier's totals against literal expectations. Totals are
//! cumulative: a second run for the same client that restarts numbering at
//! zero adds exactly one ordering anomaly at the seam.

use async_trait::async_trait;
use quill_core::Delivery;
use quill_load::StressParams;

use crate::context::ScenarioContext;
use crate::error::Result;
use crate::scenario::Scenario;

/// Which scratch root an expectation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    /// `paths.scratch_roots[0]`.
    Primary,
    /// `paths.scratch_roots[1]`.
    Secondary,
}

/// One stress run.
#[derive(Debug, Clone, Copy)]
pub struct Traffic {
    /// Category to send to.
    pub category: &'static str,
    /// Client id embedded in messages.
    pub client: &'static str,
    /// Messages per second.
    pub rate: u64,
    /// Messages to send.
    pub total: u64,
    /// Messages per call.
    pub batch_size: usize,
    /// Average message size.
    pub avg_size: usize,
}

impl Traffic {
    /// Generator parameters for this run.
    #[must_use]
    pub fn params(&self) -> StressParams {
        StressParams {
            rate: self.rate,
            total: self.total,
            batch_size: self.batch_size,
            avg_size: self.avg_size,
            ..StressParams::new(self.category, self.client)
        }
    }
}

/// Expected verifier totals for one output location.
#[derive(Debug, Clone, Copy)]
pub struct Expect {
    /// Scratch root holding the store.
    pub root: Root,
    /// Store directory under the root.
    pub dir: &'static str,
    /// File-name prefix.
    pub prefix: &'static str,
    /// Client to verify.
    pub client: &'static str,
    /// Exact totals.
    pub expected: Delivery,
}

/// A run and what it should produce.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    /// Traffic to send.
    pub traffic: Traffic,
    /// Checks after the settle period.
    pub expect: &'static [Expect],
}

/// A single-server scenario made of [`Step`]s.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryMatrix {
    /// Scenario name.
    pub name: &'static str,
    /// Description for `quill list`.
    pub description: &'static str,
    /// Test name used for the server's output file.
    pub test_name: &'static str,
    /// Server config file.
    pub conf: &'static str,
    /// Skip remaining steps once a check fails.
    pub stop_on_failure: bool,
    /// Steps, in order.
    pub steps: &'static [Step],
}

#[async_trait]
impl Scenario for DeliveryMatrix {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.port;
        ctx.start(self.test_name, port, self.conf).await?;

        for step in self.steps {
            if self.stop_on_failure && !ctx.passing() {
                tracing::warn!(scenario = self.name, "skipping remaining steps after a failure");
                break;
            }
            let traffic = step.traffic;
            ctx.stress(&traffic.params()).await?;
            ctx.settle("output settle", ctx.grace().settle).await;

            for expect in step.expect {
                let dir = match expect.root {
                    Root::Primary => ctx.primary(expect.dir),
                    Root::Secondary => ctx.secondary(expect.dir),
                };
                ctx.expect_delivery(&dir, expect.prefix, expect.client, expect.expected)?;
            }
        }

        ctx.stop(port).await;
        Ok(())
    }
}

const fn traffic(
    category: &'static str,
    client: &'static str,
    rate: u64,
    total: u64,
    batch_size: usize,
    avg_size: usize,
) -> Traffic {
    Traffic {
        category,
        client,
        rate,
        total,
        batch_size,
        avg_size,
    }
}

const fn primary(
    dir: &'static str,
    prefix: &'static str,
    client: &'static str,
    count: u64,
    out_of_order: u64,
) -> Expect {
    Expect {
        root: Root::Primary,
        dir,
        prefix,
        client,
        expected: Delivery::new(count, out_of_order),
    }
}

const fn secondary(
    dir: &'static str,
    prefix: &'static str,
    client: &'static str,
    count: u64,
    out_of_order: u64,
) -> Expect {
    Expect {
        root: Root::Secondary,
        dir,
        prefix,
        client,
        expected: Delivery::new(count, out_of_order),
    }
}

/// Default, named, prefix and categories stores on one server.
pub static BASIC: DeliveryMatrix = DeliveryMatrix {
    name: "basic",
    description: "stress runs routed to default, named, prefix and categories stores",
    test_name: "basictest",
    conf: "scribe.conf.basictest",
    stop_on_failure: true,
    steps: &[
        Step {
            traffic: traffic("test", "client1", 1000, 10_000, 20, 100),
            expect: &[primary("test", "test-", "client1", 10_000, 0)],
        },
        // numbering restarts at zero: one anomaly at the seam
        Step {
            traffic: traffic("test", "client1", 1000, 10_000, 20, 100),
            expect: &[primary("test", "test-", "client1", 20_000, 1)],
        },
        Step {
            traffic: traffic("test", "client2", 10_000, 200_000, 50, 100),
            expect: &[primary("test", "test-", "client2", 200_000, 0)],
        },
        Step {
            traffic: traffic("tps", "client1", 1000, 10_000, 200, 100),
            expect: &[primary("tps", "tps-", "client1", 10_000, 0)],
        },
        Step {
            traffic: traffic("foodoo", "client1", 10_000, 10_000, 20, 100),
            expect: &[primary("foodoo", "foodoo-", "client1", 10_000, 0)],
        },
        Step {
            traffic: traffic("rock", "client1", 100, 10_000, 20, 100),
            expect: &[primary("rock", "rock-", "client1", 10_000, 0)],
        },
        Step {
            traffic: traffic("paper", "client1", 1000, 10_000, 20, 500),
            expect: &[primary("paper", "paper-", "client1", 10_000, 0)],
        },
    ],
};

/// Like [`BASIC`] with a single server thread and shared store directories.
pub static BASIC2: DeliveryMatrix = DeliveryMatrix {
    name: "basic2",
    description: "basic routing without a thread per category",
    test_name: "basictest2",
    conf: "scribe.conf.basictest2",
    stop_on_failure: true,
    steps: &[
        Step {
            traffic: traffic("test", "client1", 1000, 10_000, 20, 100),
            expect: &[primary("default", "default-", "client1", 10_000, 0)],
        },
        Step {
            traffic: traffic("test", "client1", 1000, 10_000, 20, 100),
            expect: &[primary("default", "default-", "client1", 20_000, 1)],
        },
        Step {
            traffic: traffic("test", "client2", 10_000, 200_000, 50, 100),
            expect: &[primary("default", "default-", "client2", 200_000, 0)],
        },
        Step {
            traffic: traffic("tps", "client1", 1000, 10_000, 200, 100),
            expect: &[primary("tps", "tps-", "client1", 10_000, 0)],
        },
        Step {
            traffic: traffic("foodoo", "client1", 10_000, 10_000, 20, 100),
            expect: &[primary("foo", "foo-", "client1", 10_000, 0)],
        },
        Step {
            traffic: traffic("rock", "client1", 100, 10_000, 20, 100),
            expect: &[primary("rockpaper", "rockpaper-", "client1", 10_000, 0)],
        },
        Step {
            traffic: traffic("paper", "client2", 1000, 10_000, 20, 500),
            expect: &[primary("rockpaper", "rockpaper-", "client2", 10_000, 0)],
        },
    ],
};

/// Every default-store write lands in both scratch roots.
pub static TWODEFAULT: DeliveryMatrix = DeliveryMatrix {
    name: "twodefault",
    description: "default category logged to two file stores at once",
    test_name: "twodefaulttest",
    conf: "scribe.conf.twodefaulttest",
    stop_on_failure: false,
    steps: &[
        Step {
            traffic: traffic("test", "client1", 1000, 10_000, 20, 100),
            expect: &[
                primary("test", "test-", "client1", 10_000, 0),
                secondary("test", "test-", "client1", 10_000, 0),
            ],
        },
        Step {
            traffic: traffic("test", "client1", 1000, 10_000, 20, 100),
            expect: &[
                primary("test", "test-", "client1", 20_000, 1),
                secondary("test", "test-", "client1", 20_000, 1),
            ],
        },
        Step {
            traffic: traffic("test", "client2", 10_000, 200_000, 50, 100),
            expect: &[
                primary("test", "test-", "client2", 200_000, 0),
                secondary("test", "test-", "client2", 200_000, 0),
            ],
        },
        Step {
            traffic: traffic("tps", "client1", 1000, 10_000, 200, 100),
            expect: &[
                primary("tps", "tps-", "client1", 10_000, 0),
                secondary("tps", "tps-", "client1", 10_000, 0),
            ],
        },
        Step {
            traffic: traffic("foodoo", "client1", 10_000, 10_000, 20, 100),
            expect: &[
                primary("foodoo", "foodoo-", "client1", 10_000, 0),
                secondary("foodoo", "foodoo-", "client1", 10_000, 0),
            ],
        },
        Step {
            traffic: traffic("rock", "client1", 100, 10_000, 20, 100),
            expect: &[
                primary("rock", "rock-", "client1", 10_000, 0),
                secondary("rock", "rock-", "client1", 10_000, 0),
            ],
        },
        Step {
            traffic: traffic("paper", "client1", 1000, 10_000, 20, 500),
            expect: &[
                primary("paper", "paper-", "client1", 10_000, 0),
                secondary("paper", "paper-", "client1", 10_000, 0),
            ],
        },
    ],
};
