use clap::{Parser, ValueEnum};
use shorty_generator::AllocatorSettings;
use shorty_shortener::WritePolicy;
use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const PORT_ENV: &str = "HOST_PORT";
pub const STORAGE_BACKEND_ENV: &str = "SHORTY_STORAGE_BACKEND";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const DB_NUM_ENV: &str = "DB_NUM";
pub const WRITE_POLICY_ENV: &str = "SHORTY_WRITE_POLICY";
pub const ID_BUFFER_ENV: &str = "SHORTY_ID_BUFFER";
pub const ALLOCATION_TIMEOUT_ENV: &str = "SHORTY_ALLOCATION_TIMEOUT_MS";
pub const SHUTDOWN_TIMEOUT_ENV: &str = "SHORTY_SHUTDOWN_TIMEOUT_SECS";
pub const LOG_JSON_ENV: &str = "SHORTY_LOG_JSON";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REDIS_URL: &str = "redis:6379";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "redis")]
    Redis,
    #[value(name = "in-memory")]
    InMemory,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Redis => write!(f, "redis"),
            StorageBackendArg::InMemory => write!(f, "in-memory"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shorty", version, about = "Maps long values to short codes over HTTP")]
pub struct Cli {
    /// HTTP listen port on all interfaces.
    #[arg(long, env = PORT_ENV, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Redis
    )]
    pub storage: StorageBackendArg,

    /// `host:port` or a full `redis://` URL.
    #[arg(long, env = REDIS_URL_ENV, default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// Redis logical database, ignored if the URL already names one.
    #[arg(long, env = DB_NUM_ENV, default_value_t = 0)]
    pub db_num: u32,

    #[arg(long, env = WRITE_POLICY_ENV, default_value_t = WritePolicy::LastWriterWins)]
    pub write_policy: WritePolicy,

    /// Ids the allocator prepares ahead of requests.
    #[arg(
        long,
        env = ID_BUFFER_ENV,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub id_buffer: u32,

    #[arg(
        long,
        env = ALLOCATION_TIMEOUT_ENV,
        default_value_t = 5000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub allocation_timeout_ms: u64,

    #[arg(long, env = SHUTDOWN_TIMEOUT_ENV, default_value_t = 30)]
    pub shutdown_timeout_secs: u64,

    /// Emit log lines as JSON.
    #[arg(long, env = LOG_JSON_ENV)]
    pub log_json: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Builds the Redis connection URL from `--redis-url` and `--db-num`.
    pub fn redis_connection_url(&self) -> String {
        let (scheme, rest) = self
            .redis_url
            .split_once("://")
            .unwrap_or(("redis", self.redis_url.as_str()));
        let rest = rest.trim_end_matches('/');

        if rest.contains('/') {
            format!("{scheme}://{rest}")
        } else {
            format!("{scheme}://{rest}/{}", self.db_num)
        }
    }

    pub fn allocator_settings(&self) -> AllocatorSettings {
        AllocatorSettings::builder()
            .buffer(self.id_buffer as usize)
            .allocation_timeout(Duration::from_millis(self.allocation_timeout_ms))
            .build()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["shorty"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn bare_host_gets_scheme_and_database() {
        let cli = parse(&["--redis-url", "redis:6379", "--db-num", "0"]);
        assert_eq!(cli.redis_connection_url(), "redis://redis:6379/0");

        let cli = parse(&["--redis-url", "cache.local:6380", "--db-num", "3"]);
        assert_eq!(cli.redis_connection_url(), "redis://cache.local:6380/3");
    }

    #[test]
    fn full_url_keeps_scheme() {
        let cli = parse(&["--redis-url", "rediss://user:pw@cache:6380/", "--db-num", "2"]);
        assert_eq!(cli.redis_connection_url(), "rediss://user:pw@cache:6380/2");
    }

    #[test]
    fn database_in_url_wins() {
        let cli = parse(&["--redis-url", "redis://cache:6379/5", "--db-num", "2"]);
        assert_eq!(cli.redis_connection_url(), "redis://cache:6379/5");
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--port",
            "9090",
            "--storage",
            "in-memory",
            "--write-policy",
            "set-if-absent",
            "--id-buffer",
            "8",
            "--allocation-timeout-ms",
            "250",
        ]);

        assert_eq!(cli.listen_addr().port(), 9090);
        assert_eq!(cli.storage, StorageBackendArg::InMemory);
        assert_eq!(cli.write_policy, WritePolicy::SetIfAbsent);

        let settings = cli.allocator_settings();
        assert_eq!(settings.buffer, 8);
        assert_eq!(settings.allocation_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["shorty", "--port", "http"]).is_err());
        assert!(Cli::try_parse_from(["shorty", "--id-buffer", "0"]).is_err());
        assert!(Cli::try_parse_from(["shorty", "--write-policy", "first-wins"]).is_err());
        assert!(Cli::try_parse_from(["shorty", "--storage", "mysql"]).is_err());
    }
}
