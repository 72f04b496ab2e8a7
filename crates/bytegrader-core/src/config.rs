//! Process-wide configuration, parsed once at startup from the environment.
//!
//! Mirrors the teacher's `ApiConfig::from_env` / `ApiConfig::validate` split:
//! every field has a documented default, environment variables override it,
//! and a misconfigured value fails the process at boot rather than later at
//! request time.

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

/// A single allowlist entry: either a literal IP or a CIDR block.
#[derive(Debug, Clone, PartialEq)]
pub enum IpAllow {
    Literal(IpAddr),
    Cidr { network: IpAddr, prefix_len: u8 },
}

impl IpAllow {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if let Some((net, len)) = raw.split_once('/') {
            let network: IpAddr = net.parse()?;
            let prefix_len: u8 = len.parse()?;
            Ok(IpAllow::Cidr {
                network,
                prefix_len,
            })
        } else {
            Ok(IpAllow::Literal(raw.parse()?))
        }
    }

    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            IpAllow::Literal(allowed) => allowed == ip,
            IpAllow::Cidr {
                network,
                prefix_len,
            } => cidr_contains(*network, *prefix_len, *ip),
        }
    }
}

fn cidr_contains(network: IpAddr, prefix_len: u8, candidate: IpAddr) -> bool {
    match (network, candidate) {
        (IpAddr::V4(net), IpAddr::V4(ip)) => {
            let mask = mask_for(prefix_len.min(32), 32);
            u32::from(net) & mask == u32::from(ip) & mask
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) => {
            let mask = mask_for128(prefix_len.min(128));
            u128::from(net) & mask == u128::from(ip) & mask
        }
        _ => false,
    }
}

fn mask_for(prefix_len: u8, width: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (width - prefix_len)
    }
}

fn mask_for128(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len)
    }
}

/// Process-wide, read-once configuration record.
#[derive(Debug, Clone)]
pub struct Config {
    // server
    pub port: u16,
    pub max_file_size_mb: u64,
    pub grading_timeout_min: u64,
    pub queue_buffer_size: usize,
    pub grader_registry_path: String,

    // lifecycle
    pub cleanup_interval_hours: u64,
    pub completed_job_ttl_hours: i64,
    pub failed_job_ttl_hours: i64,
    pub old_file_ttl_hours: i64,

    // admission
    pub require_api_key: bool,
    pub valid_api_keys: HashSet<String>,
    pub allowed_ips: Vec<IpAllow>,

    // rate limit
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_min: u64,

    // concurrency
    pub max_concurrent_jobs: usize,
    pub max_queue_size: usize,

    // workspace root backing the shared volume
    pub workspace_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            max_file_size_mb: 50,
            grading_timeout_min: 10,
            queue_buffer_size: 100,
            grader_registry_path: "config/graders.yaml".to_string(),
            cleanup_interval_hours: 1,
            completed_job_ttl_hours: 24,
            failed_job_ttl_hours: 24,
            old_file_ttl_hours: 72,
            require_api_key: true,
            valid_api_keys: HashSet::new(),
            allowed_ips: Vec::new(),
            rate_limit_enabled: true,
            rate_limit_requests: 60,
            rate_limit_window_min: 1,
            max_concurrent_jobs: 4,
            max_queue_size: 100,
            workspace_root: "/var/bytegrader".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PORT") {
            if let Ok(val) = val.parse() {
                config.port = val;
            }
        }
        if let Ok(val) = std::env::var("MAX_FILE_SIZE_MB") {
            if let Ok(val) = val.parse() {
                config.max_file_size_mb = val;
            }
        }
        if let Ok(val) = std::env::var("GRADING_TIMEOUT_MIN") {
            if let Ok(val) = val.parse() {
                config.grading_timeout_min = val;
            }
        }
        if let Ok(val) = std::env::var("QUEUE_BUFFER_SIZE") {
            if let Ok(val) = val.parse() {
                config.queue_buffer_size = val;
            }
        }
        if let Ok(val) = std::env::var("GRADER_REGISTRY_PATH") {
            config.grader_registry_path = val;
        }
        if let Ok(val) = std::env::var("CLEANUP_INTERVAL_HOURS") {
            if let Ok(val) = val.parse() {
                config.cleanup_interval_hours = val;
            }
        }
        if let Ok(val) = std::env::var("COMPLETED_JOB_TTL_HOURS") {
            if let Ok(val) = val.parse() {
                config.completed_job_ttl_hours = val;
            }
        }
        if let Ok(val) = std::env::var("FAILED_JOB_TTL_HOURS") {
            if let Ok(val) = val.parse() {
                config.failed_job_ttl_hours = val;
            }
        }
        if let Ok(val) = std::env::var("OLD_FILE_TTL_HOURS") {
            if let Ok(val) = val.parse() {
                config.old_file_ttl_hours = val;
            }
        }
        if let Ok(val) = std::env::var("REQUIRE_API_KEY") {
            config.require_api_key = val.eq_ignore_ascii_case("true") || val == "1";
        }
        if let Ok(val) = std::env::var("VALID_API_KEYS") {
            config.valid_api_keys = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(val) = std::env::var("ALLOWED_IPS") {
            config.allowed_ips = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .filter_map(|s| IpAllow::parse(s).ok())
                .collect();
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_ENABLED") {
            config.rate_limit_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_REQUESTS") {
            if let Ok(val) = val.parse() {
                config.rate_limit_requests = val;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_WINDOW_MIN") {
            if let Ok(val) = val.parse() {
                config.rate_limit_window_min = val;
            }
        }
        if let Ok(val) = std::env::var("MAX_CONCURRENT_JOBS") {
            if let Ok(val) = val.parse() {
                config.max_concurrent_jobs = val;
            }
        }
        if let Ok(val) = std::env::var("MAX_QUEUE_SIZE") {
            if let Ok(val) = val.parse() {
                config.max_queue_size = val;
            }
        }
        if let Ok(val) = std::env::var("BYTEGRADER_WORKSPACE_ROOT") {
            config.workspace_root = val;
        }

        config
    }

    /// Validate configuration settings. Fatal-at-startup if this fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be greater than 0".to_string());
        }
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be greater than 0".to_string());
        }
        if self.queue_buffer_size == 0 {
            return Err("queue_buffer_size must be greater than 0".to_string());
        }
        if self.max_file_size_mb == 0 {
            return Err("max_file_size_mb must be greater than 0".to_string());
        }
        if self.grading_timeout_min == 0 {
            return Err("grading_timeout_min must be greater than 0".to_string());
        }
        if self.require_api_key && self.valid_api_keys.is_empty() {
            return Err("require_api_key is set but valid_api_keys is empty".to_string());
        }
        if self.rate_limit_enabled {
            if self.rate_limit_requests == 0 {
                return Err("rate_limit_requests must be greater than 0 when enabled".to_string());
            }
            if self.rate_limit_window_min == 0 {
                return Err(
                    "rate_limit_window_min must be greater than 0 when enabled".to_string(),
                );
            }
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn grading_timeout(&self) -> Duration {
        Duration::from_secs(self.grading_timeout_min * 60)
    }

    pub fn is_ip_allowed(&self, ip: &IpAddr) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|a| a.matches(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: &[&str] = &[
        "PORT",
        "MAX_FILE_SIZE_MB",
        "GRADING_TIMEOUT_MIN",
        "QUEUE_BUFFER_SIZE",
        "GRADER_REGISTRY_PATH",
        "CLEANUP_INTERVAL_HOURS",
        "COMPLETED_JOB_TTL_HOURS",
        "FAILED_JOB_TTL_HOURS",
        "OLD_FILE_TTL_HOURS",
        "REQUIRE_API_KEY",
        "VALID_API_KEYS",
        "ALLOWED_IPS",
        "RATE_LIMIT_ENABLED",
        "RATE_LIMIT_REQUESTS",
        "RATE_LIMIT_WINDOW_MIN",
        "MAX_CONCURRENT_JOBS",
        "MAX_QUEUE_SIZE",
        "BYTEGRADER_WORKSPACE_ROOT",
    ];

    /// Clears every `Config::from_env`-observed variable so tests in this
    /// module don't see leftovers from each other or from the ambient
    /// process environment. Combined with `#[serial]`, this keeps the suite
    /// deterministic despite `Config::from_env` reading *global* process
    /// state that `cargo test`'s default parallel runner would otherwise
    /// race on.
    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn from_env_falls_back_to_defaults_when_unset() {
        clear_env();
        let config = Config::from_env();
        let defaults = Config::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.max_file_size_mb, defaults.max_file_size_mb);
        assert_eq!(config.grading_timeout_min, defaults.grading_timeout_min);
        assert_eq!(config.require_api_key, defaults.require_api_key);
        assert!(config.valid_api_keys.is_empty());
        assert!(config.allowed_ips.is_empty());
        assert_eq!(config.max_concurrent_jobs, defaults.max_concurrent_jobs);
        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_parses_every_documented_variable() {
        clear_env();
        std::env::set_var("PORT", "9090");
        std::env::set_var("MAX_FILE_SIZE_MB", "25");
        std::env::set_var("GRADING_TIMEOUT_MIN", "5");
        std::env::set_var("QUEUE_BUFFER_SIZE", "50");
        std::env::set_var("GRADER_REGISTRY_PATH", "/etc/bytegrader/graders.yaml");
        std::env::set_var("CLEANUP_INTERVAL_HOURS", "2");
        std::env::set_var("COMPLETED_JOB_TTL_HOURS", "12");
        std::env::set_var("FAILED_JOB_TTL_HOURS", "6");
        std::env::set_var("OLD_FILE_TTL_HOURS", "48");
        std::env::set_var("REQUIRE_API_KEY", "true");
        std::env::set_var("VALID_API_KEYS", "key-a, key-b ,key-c");
        std::env::set_var("ALLOWED_IPS", "203.0.113.5, 198.51.100.0/24");
        std::env::set_var("RATE_LIMIT_ENABLED", "1");
        std::env::set_var("RATE_LIMIT_REQUESTS", "30");
        std::env::set_var("RATE_LIMIT_WINDOW_MIN", "2");
        std::env::set_var("MAX_CONCURRENT_JOBS", "8");
        std::env::set_var("MAX_QUEUE_SIZE", "200");
        std::env::set_var("BYTEGRADER_WORKSPACE_ROOT", "/mnt/bytegrader");

        let config = Config::from_env();

        assert_eq!(config.port, 9090);
        assert_eq!(config.max_file_size_mb, 25);
        assert_eq!(config.grading_timeout_min, 5);
        assert_eq!(config.queue_buffer_size, 50);
        assert_eq!(config.grader_registry_path, "/etc/bytegrader/graders.yaml");
        assert_eq!(config.cleanup_interval_hours, 2);
        assert_eq!(config.completed_job_ttl_hours, 12);
        assert_eq!(config.failed_job_ttl_hours, 6);
        assert_eq!(config.old_file_ttl_hours, 48);
        assert!(config.require_api_key);
        assert_eq!(
            config.valid_api_keys,
            ["key-a", "key-b", "key-c"]
                .into_iter()
                .map(String::from)
                .collect::<HashSet<_>>()
        );
        assert_eq!(config.allowed_ips.len(), 2);
        assert!(config.is_ip_allowed(&"203.0.113.5".parse().unwrap()));
        assert!(config.is_ip_allowed(&"198.51.100.200".parse().unwrap()));
        assert!(!config.is_ip_allowed(&"198.51.101.1".parse().unwrap()));
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_requests, 30);
        assert_eq!(config.rate_limit_window_min, 2);
        assert_eq!(config.max_concurrent_jobs, 8);
        assert_eq!(config.max_queue_size, 200);
        assert_eq!(config.workspace_root, "/mnt/bytegrader");

        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_ignores_unparseable_values_and_keeps_the_default() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("MAX_CONCURRENT_JOBS", "-1");

        let config = Config::from_env();

        assert_eq!(config.port, Config::default().port);
        assert_eq!(
            config.max_concurrent_jobs,
            Config::default().max_concurrent_jobs
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_treats_require_api_key_as_case_insensitive_bool() {
        clear_env();
        std::env::set_var("REQUIRE_API_KEY", "TRUE");
        assert!(Config::from_env().require_api_key);

        std::env::set_var("REQUIRE_API_KEY", "false");
        assert!(!Config::from_env().require_api_key);

        clear_env();
    }

    #[test]
    fn default_config_validates() {
        let mut config = Config::default();
        config.require_api_key = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn require_api_key_without_keys_fails() {
        let config = Config::default();
        assert!(config.valid_api_keys.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_fails() {
        let mut config = Config::default();
        config.require_api_key = false;
        config.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn literal_ip_allowlist() {
        let allow = IpAllow::parse("203.0.113.5").unwrap();
        assert!(allow.matches(&"203.0.113.5".parse().unwrap()));
        assert!(!allow.matches(&"198.51.100.9".parse().unwrap()));
    }

    #[test]
    fn cidr_ip_allowlist() {
        let allow = IpAllow::parse("203.0.113.0/24").unwrap();
        assert!(allow.matches(&"203.0.113.200".parse().unwrap()));
        assert!(!allow.matches(&"203.0.114.1".parse().unwrap()));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let config = Config::default();
        assert!(config.is_ip_allowed(&"1.2.3.4".parse().unwrap()));
    }
}
