//! Odd input survives and plain messages land verbatim.

use async_trait::async_trait;
use quill_core::LogEntry;

use crate::context::ScenarioContext;
use crate::error::Result;
use crate::scenario::Scenario;

/// Sends malformed categories and empty or binary messages, then checks the
/// server is still up and the first bytes of its output are exact.
#[derive(Debug, Default)]
pub struct Simple;

const STRANGE_CATEGORY: &str = "%!@#$%^&*()_+-=[]{}|;':\",./<>?~`\\\n\t";
const STRANGE_MESSAGE: &[u8] = b"\x00\x01\x02\x03\xff\xfe\r\n\t\\n%s%d{}";

/// `\\n` is a literal backslash-n, not a newline.
fn strange_input() -> Vec<LogEntry> {
    vec![
        LogEntry::new(STRANGE_CATEGORY, STRANGE_MESSAGE),
        LogEntry::new("scribe_test", b"\\n".as_slice()),
        LogEntry::new("scribe_test", Vec::new()),
    ]
}

fn plain_input() -> Vec<LogEntry> {
    vec![
        LogEntry::new("scribe_test", b"this is a message\n".as_slice()),
        LogEntry::new("scribe_test", b"and a binary\x00\x01 message\n".as_slice()),
        LogEntry::new(
            "buckettest",
            b"99\x01a key-value message with a non-printable delimiter\\n".as_slice(),
        ),
        LogEntry::new(
            "buckettest",
            b"99\x01a different message in the same bucket\\n".as_slice(),
        ),
        LogEntry::new("buckettest", b"98\x01a different bucket\\n".as_slice()),
    ]
}

#[async_trait]
impl Scenario for Simple {
    fn name(&self) -> &str {
        "simple"
    }

    fn description(&self) -> &str {
        "strange categories and binary messages are accepted and stored verbatim"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.port;
        ctx.start("simpletest", port, "scribe.conf.simpletest").await?;

        ctx.send(&strange_input()).await;
        ctx.settle("server digests strange input", ctx.grace().route_check).await;
        ctx.send(&plain_input()).await;
        ctx.settle("output settle", ctx.grace().settle).await;

        let current = ctx.primary("scribe_test/scribe_test_current");
        ctx.expect_starts_with(
            &current,
            &[b"\\n", b"this is a message\n", b"and a binary\x00\x01 message\n"],
        )?;

        ctx.expect_alive(port).await;
        ctx.stop(port).await;
        Ok(())
    }
}
