use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Public trackers appended to every magnet so cold torrents still find peers.
pub const DEFAULT_FALLBACK_TRACKERS: [&str; 10] = [
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://9.rarbg.com:2810/announce",
    "udp://exodus.desync.com:6969/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://tracker.moeking.me:6969/announce",
    "udp://explodie.org:6969/announce",
    "udp://open.demonii.com:1337/announce",
    "udp://tracker.coppersurfer.tk:6969/announce",
    "udp://bt.t-ru.org:2710/announce",
];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub download_dir: String,
    pub stream_chunk_size_kb: usize,

    pub qbit_url: String,
    pub qbit_user: String,
    pub qbit_pass: String,
    pub qbit_save_path: String,
    pub engine_login_timeout_seconds: u64,
    pub engine_request_timeout_seconds: u64,
    pub fallback_trackers: Vec<String>,

    pub metadata_timeout_seconds: u64,
    pub metadata_poll_interval_ms: u64,
    pub add_grace_period_ms: u64,
    pub ready_progress_threshold: f64,
    pub ready_states: Vec<String>,

    pub delete_files_on_drop: bool,
    pub drop_on_shutdown: bool,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Missing or blank keys
    /// take their defaults; malformed ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let api_port = match get("API_PORT") {
            Some(value) => parse_value("API_PORT", value)?,
            None => parse_or("PORT", get("PORT"), 3000)?,
        };

        let ready_progress_threshold: f64 =
            parse_or("READY_PROGRESS_THRESHOLD", get("READY_PROGRESS_THRESHOLD"), 0.05)?;
        if !(0.0..=1.0).contains(&ready_progress_threshold) {
            return Err(ConfigError::Invalid {
                key: "READY_PROGRESS_THRESHOLD",
                value: ready_progress_threshold.to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        let stream_chunk_size_kb = parse_or("STREAM_CHUNK_SIZE_KB", get("STREAM_CHUNK_SIZE_KB"), 256)?;
        if stream_chunk_size_kb == 0 {
            return Err(ConfigError::Invalid {
                key: "STREAM_CHUNK_SIZE_KB",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let fallback_trackers = match get("FALLBACK_TRACKERS") {
            Some(value) => split_list(&value),
            None => DEFAULT_FALLBACK_TRACKERS.iter().map(|t| t.to_string()).collect(),
        };

        Ok(Self {
            api_host: text("API_HOST", "0.0.0.0"),
            api_port,
            download_dir: text("DOWNLOAD_DIR", "/downloads"),
            stream_chunk_size_kb,
            qbit_url: text("QBIT_URL", "http://localhost:8080"),
            qbit_user: text("QBIT_USER", "admin"),
            qbit_pass: text("QBIT_PASS", "adminadmin"),
            qbit_save_path: text("QBIT_SAVE_PATH", "/downloads"),
            engine_login_timeout_seconds: parse_or(
                "ENGINE_LOGIN_TIMEOUT_SECONDS",
                get("ENGINE_LOGIN_TIMEOUT_SECONDS"),
                5,
            )?,
            engine_request_timeout_seconds: parse_or(
                "ENGINE_REQUEST_TIMEOUT_SECONDS",
                get("ENGINE_REQUEST_TIMEOUT_SECONDS"),
                5,
            )?,
            fallback_trackers,
            metadata_timeout_seconds: parse_or("METADATA_TIMEOUT_SECONDS", get("METADATA_TIMEOUT_SECONDS"), 20)?,
            metadata_poll_interval_ms: parse_or(
                "METADATA_POLL_INTERVAL_MS",
                get("METADATA_POLL_INTERVAL_MS"),
                1000,
            )?,
            add_grace_period_ms: parse_or("ADD_GRACE_PERIOD_MS", get("ADD_GRACE_PERIOD_MS"), 1500)?,
            ready_progress_threshold,
            ready_states: get("READY_STATES")
                .map(|value| split_list(&value))
                .unwrap_or_else(|| vec!["downloading".to_string(), "stalledDL".to_string()]),
            delete_files_on_drop: parse_flag("DELETE_FILES_ON_DROP", get("DELETE_FILES_ON_DROP"), true)?,
            drop_on_shutdown: parse_flag("DROP_ON_SHUTDOWN", get("DROP_ON_SHUTDOWN"), false)?,
        })
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn stream_chunk_size(&self) -> usize {
        self.stream_chunk_size_kb * 1024
    }

    pub fn engine_login_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_login_timeout_seconds)
    }

    pub fn engine_request_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_request_timeout_seconds)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_seconds)
    }

    pub fn metadata_poll_interval(&self) -> Duration {
        Duration::from_millis(self.metadata_poll_interval_ms)
    }

    pub fn add_grace_period(&self) -> Duration {
        Duration::from_millis(self.add_grace_period_ms)
    }

    /// Logs the effective settings. Credentials are left out.
    pub fn log_summary(&self) {
        info!("🌐 API address: {}", self.api_address());
        info!("📂 Download dir: {} (engine save path {})", self.download_dir, self.qbit_save_path);
        info!("⚙️  Engine: {} as {}", self.qbit_url, self.qbit_user);
        info!("📡 Fallback trackers: {}", self.fallback_trackers.len());
        info!(
            "⏱️  Metadata wait {}s, poll {}ms, add grace {}ms",
            self.metadata_timeout_seconds, self.metadata_poll_interval_ms, self.add_grace_period_ms
        );
        info!(
            "▶️  Ready at {:.0}% or states [{}]",
            self.ready_progress_threshold * 100.0,
            self.ready_states.join(", ")
        );
    }
}

fn parse_value<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => parse_value(key, value),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
