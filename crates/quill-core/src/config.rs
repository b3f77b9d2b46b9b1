//! Harness configuration.
//!
//! Loaded from TOML and validated at load time. Every fixed sleep the
//! harness performs is a named field of [`GracePeriods`]: these waits are
//! the dominant source of scenario flakiness, so they must be tunable per
//! environment rather than baked in.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// System-under-test binaries and endpoints.
    #[serde(default)]
    pub sut: SutConfig,

    /// RPC client settings.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Fixed waits inserted around asynchronous SUT behaviour.
    #[serde(default)]
    pub grace: GracePeriods,

    /// Scratch directories the SUT writes into.
    #[serde(default)]
    pub paths: PathsConfig,
}

impl HarnessConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.sut.validate()?;
        self.rpc.validate()?;
        if self.paths.scratch_roots.is_empty() {
            return Err(CoreError::config("paths.scratch_roots cannot be empty"));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoreError::config(format!("failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text cannot be parsed or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CoreError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the primary scratch root (`/tmp/scribetest_` by default).
    #[must_use]
    pub fn primary_root(&self) -> &Path {
        self.paths
            .scratch_roots
            .first()
            .map_or_else(|| Path::new(DEFAULT_PRIMARY_ROOT), PathBuf::as_path)
    }

    /// Returns the secondary scratch root, falling back to the primary one.
    #[must_use]
    pub fn secondary_root(&self) -> &Path {
        self.paths
            .scratch_roots
            .get(1)
            .map_or_else(|| self.primary_root(), PathBuf::as_path)
    }
}

/// System-under-test locations and ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SutConfig {
    /// Directory holding the `scribed` binary.
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    /// Directory holding the `scribe_ctrl` utility.
    #[serde(default = "default_ctrl_dir")]
    pub ctrl_dir: PathBuf,

    /// Directory holding `scribe.conf.*` files.
    #[serde(default = "default_conf_dir")]
    pub conf_dir: PathBuf,

    /// Host the SUT listens on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Primary listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port for a second SUT in multi-hop scenarios.
    #[serde(default = "default_secondary_port")]
    pub secondary_port: u16,

    /// Where `scribed.out.<test>` output files are written.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// `scribe_ctrl status` exit code meaning the server is alive.
    #[serde(default = "default_alive_status_code")]
    pub alive_status_code: i32,

    /// Bucket-mapping updater helper used by the bucket updater scenario.
    #[serde(default = "default_bucket_updater")]
    pub bucket_updater: PathBuf,

    /// Port the bucket-mapping updater listens on.
    #[serde(default = "default_updater_port")]
    pub updater_port: u16,
}

const DEFAULT_PRIMARY_ROOT: &str = "/tmp/scribetest_";
const DEFAULT_SECONDARY_ROOT: &str = "/tmp/scribe_test_";

fn default_bin_dir() -> PathBuf {
    PathBuf::from("../src")
}

fn default_ctrl_dir() -> PathBuf {
    PathBuf::from("../examples")
}

fn default_conf_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    1463
}

const fn default_secondary_port() -> u16 {
    1466
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

// fb303 ALIVE
const fn default_alive_status_code() -> i32 {
    2
}

fn default_bucket_updater() -> PathBuf {
    PathBuf::from("bucketupdater/bidupdater")
}

const fn default_updater_port() -> u16 {
    9999
}

impl Default for SutConfig {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            ctrl_dir: default_ctrl_dir(),
            conf_dir: default_conf_dir(),
            host: default_host(),
            port: default_port(),
            secondary_port: default_secondary_port(),
            log_dir: default_log_dir(),
            alive_status_code: default_alive_status_code(),
            bucket_updater: default_bucket_updater(),
            updater_port: default_updater_port(),
        }
    }
}

impl SutConfig {
    /// Path of the SUT server binary.
    #[must_use]
    pub fn scribed(&self) -> PathBuf {
        self.bin_dir.join("scribed")
    }

    /// Path of the control utility.
    #[must_use]
    pub fn scribe_ctrl(&self) -> PathBuf {
        self.ctrl_dir.join("scribe_ctrl")
    }

    /// Resolves a SUT config file name against `conf_dir`.
    #[must_use]
    pub fn conf(&self, name: &str) -> PathBuf {
        self.conf_dir.join(name)
    }

    /// Returns `host:port` for the primary endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates SUT settings.
    ///
    /// # Errors
    /// Returns an error if a port or host is unusable.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CoreError::config("sut.host cannot be empty"));
        }
        if self.port == 0 || self.secondary_port == 0 || self.updater_port == 0 {
            return Err(CoreError::config("sut ports must be non-zero"));
        }
        if self.port == self.secondary_port {
            return Err(CoreError::config(
                "sut.port and sut.secondary_port must differ",
            ));
        }
        Ok(())
    }
}

/// RPC client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Timeout for connecting and writing a batch.
    #[serde(default = "default_send_timeout")]
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,

    /// Timeout for reading a reply.
    #[serde(default = "default_recv_timeout")]
    #[serde(with = "humantime_serde")]
    pub recv_timeout: Duration,

    /// Largest reply frame accepted.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_send_timeout() -> Duration {
    Duration::from_millis(1000)
}

fn default_recv_timeout() -> Duration {
    Duration::from_millis(2500)
}

const fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            send_timeout: default_send_timeout(),
            recv_timeout: default_recv_timeout(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl RpcConfig {
    /// Validates RPC settings.
    ///
    /// # Errors
    /// Returns an error if a timeout or frame cap is zero.
    pub fn validate(&self) -> Result<()> {
        if self.send_timeout.is_zero() || self.recv_timeout.is_zero() {
            return Err(CoreError::config("rpc timeouts must be positive"));
        }
        if self.max_frame_bytes == 0 {
            return Err(CoreError::config("rpc.max_frame_bytes must be positive"));
        }
        Ok(())
    }
}

/// Fixed, non-adaptive waits.
///
/// No cheap readiness signal exists at the SUT boundary, so the harness
/// sleeps. Over-provision these on slow machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GracePeriods {
    /// Wait after launching the SUT before sending traffic.
    #[serde(default = "default_startup")]
    #[serde(with = "humantime_serde")]
    pub startup: Duration,

    /// Wait after a stop command before checking for termination.
    #[serde(default = "default_stop")]
    #[serde(with = "humantime_serde")]
    pub stop: Duration,

    /// Wait after sending before verifying output.
    #[serde(default = "default_settle")]
    #[serde(with = "humantime_serde")]
    pub settle: Duration,

    /// Wait for buffered stores to drain once their primary recovers.
    #[serde(default = "default_buffer_flush")]
    #[serde(with = "humantime_serde")]
    pub buffer_flush: Duration,

    /// Wait for a dynamic mapping change to propagate.
    #[serde(default = "default_reconfigure")]
    #[serde(with = "humantime_serde")]
    pub reconfigure: Duration,

    /// Wait between routing a message and probing its destination.
    #[serde(default = "default_route_check")]
    #[serde(with = "humantime_serde")]
    pub route_check: Duration,

    /// Wait for a multi-hop chain to drain in the latency scenario.
    #[serde(default = "default_latency_drain")]
    #[serde(with = "humantime_serde")]
    pub latency_drain: Duration,
}

fn default_startup() -> Duration {
    Duration::from_secs(2)
}

fn default_stop() -> Duration {
    Duration::from_secs(5)
}

fn default_settle() -> Duration {
    Duration::from_secs(3)
}

fn default_buffer_flush() -> Duration {
    Duration::from_secs(120)
}

fn default_reconfigure() -> Duration {
    Duration::from_secs(15)
}

fn default_route_check() -> Duration {
    Duration::from_secs(2)
}

fn default_latency_drain() -> Duration {
    Duration::from_secs(200)
}

impl Default for GracePeriods {
    fn default() -> Self {
        Self {
            startup: default_startup(),
            stop: default_stop(),
            settle: default_settle(),
            buffer_flush: default_buffer_flush(),
            reconfigure: default_reconfigure(),
            route_check: default_route_check(),
            latency_drain: default_latency_drain(),
        }
    }
}

impl GracePeriods {
    /// Zero-length waits, for tests that drive fake processes.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            startup: Duration::ZERO,
            stop: Duration::ZERO,
            settle: Duration::ZERO,
            buffer_flush: Duration::ZERO,
            reconfigure: Duration::ZERO,
            route_check: Duration::ZERO,
            latency_drain: Duration::ZERO,
        }
    }
}

/// Scratch directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Roots removed and recreated before every scenario.
    #[serde(default = "default_scratch_roots")]
    pub scratch_roots: Vec<PathBuf>,
}

fn default_scratch_roots() -> Vec<PathBuf> {
    vec![
        PathBuf::from(DEFAULT_PRIMARY_ROOT),
        PathBuf::from(DEFAULT_SECONDARY_ROOT),
    ]
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scratch_roots: default_scratch_roots(),
        }
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as a human-readable string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from a human-readable string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.sut.port, 1463);
        assert_eq!(config.sut.secondary_port, 1466);
        assert_eq!(config.sut.alive_status_code, 2);
        assert_eq!(config.grace.startup, Duration::from_secs(2));
        assert_eq!(config.grace.stop, Duration::from_secs(5));
        assert_eq!(config.rpc.recv_timeout, Duration::from_millis(2500));
        assert_eq!(config.primary_root(), Path::new("/tmp/scribetest_"));
        assert_eq!(config.secondary_root(), Path::new("/tmp/scribe_test_"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sut_paths() {
        let sut = SutConfig {
            bin_dir: PathBuf::from("/opt/scribe/bin"),
            ctrl_dir: PathBuf::from("/opt/scribe/ctrl"),
            conf_dir: PathBuf::from("/opt/scribe/conf"),
            ..Default::default()
        };
        assert_eq!(sut.scribed(), PathBuf::from("/opt/scribe/bin/scribed"));
        assert_eq!(sut.scribe_ctrl(), PathBuf::from("/opt/scribe/ctrl/scribe_ctrl"));
        assert_eq!(
            sut.conf("scribe.conf.basictest"),
            PathBuf::from("/opt/scribe/conf/scribe.conf.basictest")
        );
        assert_eq!(sut.endpoint(), "localhost:1463");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = HarnessConfig::from_toml(
            r#"
            [sut]
            bin_dir = "/usr/local/bin"
            port = 2463
            secondary_port = 2466

            [grace]
            settle = "10s"
            buffer_flush = "3m"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.sut.bin_dir, PathBuf::from("/usr/local/bin"));
        assert_eq!(config.sut.port, 2463);
        assert_eq!(config.grace.settle, Duration::from_secs(10));
        assert_eq!(config.grace.buffer_flush, Duration::from_secs(180));
        // untouched fields keep their defaults
        assert_eq!(config.grace.startup, Duration::from_secs(2));
        assert_eq!(config.sut.host, "localhost");
    }

    #[test]
    fn test_reject_same_ports() {
        let err = HarnessConfig::from_toml(
            r#"
            [sut]
            port = 1463
            secondary_port = 1463
            "#,
        )
        .expect_err("ports must differ");
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_reject_bad_duration() {
        let err = HarnessConfig::from_toml(
            r#"
            [grace]
            settle = "soon"
            "#,
        )
        .expect_err("bad duration");
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_reject_empty_scratch_roots() {
        let err = HarnessConfig::from_toml(
            r#"
            [paths]
            scratch_roots = []
            "#,
        )
        .expect_err("roots required");
        assert!(err.to_string().contains("scratch_roots"));
    }

    #[test]
    fn test_single_scratch_root_serves_both() {
        let config = HarnessConfig::from_toml(
            r#"
            [paths]
            scratch_roots = ["/var/tmp/quill"]
            "#,
        )
        .expect("valid config");
        assert_eq!(config.primary_root(), Path::new("/var/tmp/quill"));
        assert_eq!(config.secondary_root(), Path::new("/var/tmp/quill"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = HarnessConfig::load("/nonexistent/quill.toml").expect_err("missing file");
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = HarnessConfig::default();
        let text = toml::to_string(&config).expect("serialize");
        let back = HarnessConfig::from_toml(&text).expect("parse");
        assert_eq!(back.grace.latency_drain, config.grace.latency_drain);
        assert_eq!(back.sut.port, config.sut.port);
    }

    #[test]
    fn test_grace_none() {
        let grace = GracePeriods::none();
        assert!(grace.startup.is_zero());
        assert!(grace.buffer_flush.is_zero());
    }
}
