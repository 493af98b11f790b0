//! Command-line and environment configuration.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use listcast_core::{AckMode, WriterConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "listcast")]
#[command(about = "Shared checklists per channel, synchronized through a GRIP fan-out proxy", long_about = None)]
#[command(version)]
pub struct Config {
    /// Address the HTTP server listens on.
    #[arg(long, env = "LISTCAST_BIND", default_value = "0.0.0.0:7999")]
    pub bind: String,

    /// Where lists are kept.
    #[arg(long, env = "LISTCAST_STORE", value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    /// PostgreSQL connection string, required with `--store postgres`.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// GRIP publish endpoint, e.g. `https://api.fastly.com/service/<id>/publish/`.
    #[arg(long, env = "LISTCAST_PUBLISH_URL")]
    pub publish_url: String,

    /// API token for the publish endpoint.
    #[arg(long, env = "LISTCAST_PUBLISH_TOKEN", hide_env_values = true)]
    pub publish_token: Option<String>,

    /// Header that carries the publish token.
    #[arg(long, env = "LISTCAST_PUBLISH_TOKEN_HEADER", default_value = "Fastly-Key")]
    pub publish_token_header: String,

    /// Fan-out proxy that unproxied subscription requests are handed to.
    #[arg(long, env = "LISTCAST_FANOUT_URL")]
    pub fanout_url: String,

    /// Reported in the `x-service-version` response header.
    #[arg(long, env = "LISTCAST_SERVICE_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub service_version: String,

    /// Delay before the first `ping` on a freshly held stream.
    #[arg(long, env = "LISTCAST_PING_DELAY_MS", default_value_t = 10)]
    pub ping_delay_ms: u64,

    /// Answer mutating requests after apply or only after the save committed.
    #[arg(long, env = "LISTCAST_ACK", value_enum, default_value_t = AckArg::Applied)]
    pub ack: AckArg,

    /// Save attempts per change, including the first.
    #[arg(long, env = "LISTCAST_SAVE_ATTEMPTS", default_value_t = 3)]
    pub save_attempts: u32,

    /// Backoff before the second save attempt; doubles afterwards.
    #[arg(long, env = "LISTCAST_SAVE_BACKOFF_MS", default_value_t = 50)]
    pub save_backoff_ms: u64,

    /// Seconds a channel writer may sit idle before it retires.
    #[arg(long, env = "LISTCAST_WRITER_IDLE_SECS", default_value_t = 30)]
    pub writer_idle_secs: u64,

    /// Log output format.
    #[arg(long, env = "LISTCAST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AckArg {
    Applied,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            ack: match self.ack {
                AckArg::Applied => AckMode::Applied,
                AckArg::Committed => AckMode::Committed,
            },
            save_attempts: self.save_attempts,
            save_backoff: Duration::from_millis(self.save_backoff_ms),
            idle_timeout: Duration::from_secs(self.writer_idle_secs),
        }
    }

    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.ping_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 5] = [
        "listcast",
        "--publish-url",
        "http://127.0.0.1:5561/publish/",
        "--fanout-url",
        "http://127.0.0.1:7999",
    ];

    #[test]
    fn defaults_follow_the_documented_values() {
        let config = Config::try_parse_from(REQUIRED).unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.publish_token_header, "Fastly-Key");
        assert_eq!(config.ping_delay(), Duration::from_millis(10));

        let writer = config.writer_config();
        assert_eq!(writer.ack, AckMode::Applied);
        assert_eq!(writer.save_attempts, 3);
        assert_eq!(writer.save_backoff, Duration::from_millis(50));
        assert_eq!(writer.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn enums_parse_from_kebab_values() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--store", "postgres", "--ack", "committed", "--log-format", "json"]);

        let config = Config::try_parse_from(args).unwrap();

        assert_eq!(config.store, StoreKind::Postgres);
        assert_eq!(config.writer_config().ack, AckMode::Committed);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn publish_url_is_required() {
        let result = Config::try_parse_from(["listcast", "--fanout-url", "http://x"]);
        assert!(result.is_err());
    }
}
