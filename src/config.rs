use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub http: HttpConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Base URL of the MedTrack API (without the /api/v1 prefix)
    #[arg(long, env = "MEDTRACK_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,
}

#[derive(Clone, Debug, Args)]
pub struct HttpConfig {
    /// Timeout for establishing a connection
    #[arg(long, env = "MEDTRACK_CONNECT_TIMEOUT_SECS", default_value_t = 30)]
    pub connect_timeout_secs: u64,

    /// Timeout between reads of the response body
    #[arg(long, env = "MEDTRACK_READ_TIMEOUT_SECS", default_value_t = 30)]
    pub read_timeout_secs: u64,

    /// Upper bound for a whole request, covering the upload side as well
    #[arg(long, env = "MEDTRACK_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// File holding the persisted session preferences
    #[arg(long, env = "MEDTRACK_SESSION_FILE", default_value = "medtrack-session.json")]
    pub session_file: PathBuf,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; export is disabled when unset
    #[arg(long, env = "MEDTRACK_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "MEDTRACK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Log in and persist the session
    Login {
        /// Username or email address
        #[arg(long)]
        username: String,

        /// Account password
        #[arg(long, env = "MEDTRACK_PASSWORD")]
        password: String,
    },
    /// Revoke the current session and clear stored tokens
    Logout {
        /// Wipe every stored preference and sign out of all devices
        #[arg(long, default_value_t = false)]
        everywhere: bool,
    },
    /// Show whether a session is stored
    Status,
    /// Fetch the profile of the logged-in user
    Whoami,
    /// Issue an authorized GET against an API path and print the body
    Get {
        /// Path relative to the base URL, e.g. /api/v1/reminders
        path: String,
    },
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }

    /// Configuration pointing at `base_url` with default timeouts, used by tests and embedders.
    #[must_use]
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig { base_url: base_url.into() },
            http: HttpConfig::default(),
            storage: StorageConfig { session_file: PathBuf::from("medtrack-session.json") },
            telemetry: TelemetryConfig { otlp_endpoint: None, log_format: LogFormat::Text },
            command: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { connect_timeout_secs: 30, read_timeout_secs: 30, request_timeout_secs: 30 }
    }
}
