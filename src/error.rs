//! Error types for the stake escrow and seat negotiation flow

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Main error type for a staked matchmaking attempt
#[derive(Debug, Clone, Error)]
pub enum StakeFlowError {
    #[error("Account resolution failed: {source}")]
    AccountResolution { source: NetworkError },

    #[error("Balance query failed: {source}")]
    BalanceQuery { source: NetworkError },

    #[error("Insufficient balance: required {required}, available {balance}")]
    InsufficientBalance { required: u64, balance: u64 },

    #[error("Stake debit failed: {source}")]
    DebitFailure { source: NetworkError },

    #[error("Match channel is not connected")]
    ChannelUnavailable,

    #[error("Seat request rejected: {}", message.as_deref().unwrap_or("no reason given"))]
    SeatRejected { message: Option<String> },

    #[error("Seat acknowledgement timed out after {duration_ms}ms")]
    SeatAckTimeout { duration_ms: u64 },

    #[error("Matchmaking timed out after {duration_ms}ms on table {table_id}")]
    MatchmakingTimeout { duration_ms: u64, table_id: String },

    #[error("An attempt is already in flight for participant {participant_id}")]
    AttemptInFlight { participant_id: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String, field: String },

    #[error("Validation failed: {message}")]
    Validation { message: String, field: Option<String> },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures reported by external collaborators (identity, ledger, transport)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout: {duration_ms}ms")]
    RequestTimeout { duration_ms: u64 },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },
}

/// Why a stake refund was issued. Serialized into ledger metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    #[serde(rename = "socket_registration_failed")]
    ChannelUnavailable,
    #[serde(rename = "seat_table_failed")]
    SeatRejected,
    SeatAckTimeout,
    MatchmakingTimeout,
    ManualCleanup,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::ChannelUnavailable => "socket_registration_failed",
            RefundReason::SeatRejected => "seat_table_failed",
            RefundReason::SeatAckTimeout => "seat_ack_timeout",
            RefundReason::MatchmakingTimeout => "matchmaking_timeout",
            RefundReason::ManualCleanup => "manual_cleanup",
        }
    }
}

impl fmt::Display for RefundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StakeFlowError {
    /// Text shown to the player for this failure
    pub fn user_message(&self) -> String {
        match self {
            StakeFlowError::AccountResolution { .. } => {
                "Unable to verify your account. Please retry.".to_string()
            }
            StakeFlowError::BalanceQuery { .. } => {
                "Could not check your balance. Please try again.".to_string()
            }
            StakeFlowError::InsufficientBalance { .. } => {
                "Insufficient balance for this stake.".to_string()
            }
            StakeFlowError::DebitFailure { .. } => {
                "Unable to reserve your stake. Please retry.".to_string()
            }
            StakeFlowError::ChannelUnavailable => {
                "Unable to reach the online arena. We refunded your stake.".to_string()
            }
            StakeFlowError::SeatRejected { message } => message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| {
                    "Failed to join the online arena. We refunded your stake.".to_string()
                }),
            StakeFlowError::SeatAckTimeout { .. } => {
                "Timed out while joining the online arena. We refunded your stake.".to_string()
            }
            StakeFlowError::MatchmakingTimeout { .. } => {
                "Matchmaking timed out. We refunded your stake.".to_string()
            }
            StakeFlowError::AttemptInFlight { .. } => {
                "A match search is already running for this account.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Refund reason attached to the compensating ledger entry, if this
    /// failure happens after the stake has been debited
    pub fn refund_reason(&self) -> Option<RefundReason> {
        match self {
            StakeFlowError::ChannelUnavailable => Some(RefundReason::ChannelUnavailable),
            StakeFlowError::SeatRejected { .. } => Some(RefundReason::SeatRejected),
            StakeFlowError::SeatAckTimeout { .. } => Some(RefundReason::SeatAckTimeout),
            StakeFlowError::MatchmakingTimeout { .. } => Some(RefundReason::MatchmakingTimeout),
            _ => None,
        }
    }

    /// Whether a ledger debit was attempted before this failure
    pub fn debit_attempted(&self) -> bool {
        matches!(
            self,
            StakeFlowError::DebitFailure { .. }
                | StakeFlowError::ChannelUnavailable
                | StakeFlowError::SeatRejected { .. }
                | StakeFlowError::SeatAckTimeout { .. }
                | StakeFlowError::MatchmakingTimeout { .. }
        )
    }

    /// Timeouts are reported separately in metrics and logs
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            StakeFlowError::SeatAckTimeout { .. } | StakeFlowError::MatchmakingTimeout { .. }
        )
    }
}

impl From<serde_json::Error> for StakeFlowError {
    fn from(err: serde_json::Error) -> Self {
        StakeFlowError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StakeFlowError {
    fn from(err: std::io::Error) -> Self {
        StakeFlowError::Storage {
            message: err.to_string(),
        }
    }
}

/// Diagnostic context attached to ledger and log records
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Type alias for the main result type used throughout the library
pub type FlowResult<T> = Result<T, StakeFlowError>;

/// Logging configuration and initialization
pub mod logging {
    use std::env;
    use tracing::Level;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    pub const LEVEL_VAR: &str = "TABLESTAKE_LOG_LEVEL";
    pub const FORMAT_VAR: &str = "TABLESTAKE_LOG_FORMAT";
    pub const OUTPUT_VAR: &str = "TABLESTAKE_LOG_OUTPUT";

    /// Logging output format
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogFormat {
        Human,
        Json,
    }

    /// Logging output destination
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogOutput {
        Stdout,
        Stderr,
    }

    /// Logging configuration
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LoggingConfig {
        pub level: Level,
        pub format: LogFormat,
        pub output: LogOutput,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                format: LogFormat::Human,
                output: LogOutput::Stdout,
            }
        }
    }

    /// Initialize structured logging with the given configuration
    pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
        let env_filter = EnvFilter::builder()
            .with_default_directive(config.level.into())
            .from_env_lossy()
            .add_directive("tablestake=trace".parse()?)
            .add_directive("tokio=info".parse()?);

        let registry = tracing_subscriber::registry().with(env_filter);

        match config.format {
            LogFormat::Human => {
                let fmt_layer = fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true);

                match config.output {
                    LogOutput::Stdout => registry.with(fmt_layer.with_writer(std::io::stdout)).try_init()?,
                    LogOutput::Stderr => registry.with(fmt_layer.with_writer(std::io::stderr)).try_init()?,
                }
            }
            LogFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(fmt::format::FmtSpan::CLOSE);

                match config.output {
                    LogOutput::Stdout => registry.with(fmt_layer.with_writer(std::io::stdout)).try_init()?,
                    LogOutput::Stderr => registry.with(fmt_layer.with_writer(std::io::stderr)).try_init()?,
                }
            }
        }

        Ok(())
    }

    /// Build a logging configuration from `TABLESTAKE_LOG_*` environment variables
    pub fn config_from_env() -> LoggingConfig {
        config_from_lookup(|key| env::var(key).ok())
    }

    /// Unset or unrecognised values fall back to the defaults
    pub fn config_from_lookup<F>(lookup: F) -> LoggingConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LoggingConfig::default();

        let level = lookup(LEVEL_VAR)
            .and_then(|value| value.trim().parse::<Level>().ok())
            .unwrap_or(defaults.level);

        let format = match lookup(FORMAT_VAR).map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("human") | Some("pretty") => LogFormat::Human,
            _ => defaults.format,
        };

        let output = match lookup(OUTPUT_VAR).map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("stderr") => LogOutput::Stderr,
            Some("stdout") => LogOutput::Stdout,
            _ => defaults.output,
        };

        LoggingConfig { level, format, output }
    }

    /// Initialize logging with environment-based configuration
    pub fn init_from_env() -> anyhow::Result<()> {
        init_logging(config_from_env())
    }
}
