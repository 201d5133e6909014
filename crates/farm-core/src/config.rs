//! Farm service configuration

use postgrest_client::RetryConfig;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable selecting the store precedence
pub const PRECEDENCE_ENV: &str = "FARMTRACK_PRECEDENCE";

/// Environment variable enabling the detached-owner ladder step
pub const ALLOW_DETACHED_OWNER_ENV: &str = "FARMTRACK_ALLOW_DETACHED_OWNER";

/// Settings error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A setting has a value that cannot be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// Setting name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Which replica is consulted first when both could answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SourcePrecedence {
    /// Read the remote store; fall back to local data when it fails
    #[default]
    RemoteFirst,
    /// Read local data; query the remote store only when nothing is local
    LocalFirst,
}

impl fmt::Display for SourcePrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePrecedence::RemoteFirst => write!(f, "remote-first"),
            SourcePrecedence::LocalFirst => write!(f, "local-first"),
        }
    }
}

impl FromStr for SourcePrecedence {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote-first" | "remote" => Ok(SourcePrecedence::RemoteFirst),
            "local-first" | "local" => Ok(SourcePrecedence::LocalFirst),
            _ => Err(SettingsError::InvalidValue { name: PRECEDENCE_ENV, value: s.to_string() }),
        }
    }
}

/// Steps enabled in the farmer-id resolution ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderConfig {
    /// Allow inserting a profile whose owner reference is a fresh id
    ///
    /// The resulting profile is not tied to the signed-in identity.
    pub allow_detached_owner: bool,
    /// Fall back to the `create_farmer` procedure
    pub use_rpc: bool,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self { allow_detached_owner: false, use_rpc: true }
    }
}

impl LadderConfig {
    /// Enable or disable the detached-owner step
    pub fn with_detached_owner(mut self, allow: bool) -> Self {
        self.allow_detached_owner = allow;
        self
    }

    /// Enable or disable the procedure step
    pub fn with_rpc(mut self, use_rpc: bool) -> Self {
        self.use_rpc = use_rpc;
        self
    }
}

/// Configuration shared by the farm services
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FarmConfig {
    /// Store precedence for reads and profile lookup
    pub precedence: SourcePrecedence,
    /// Farmer-id ladder steps
    pub ladder: LadderConfig,
    /// Retry policy applied to every remote call
    pub retry: RetryConfig,
}

impl FarmConfig {
    /// Read settings through a lookup function, defaulting what is unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut config = Self::default();

        if let Some(value) = lookup(PRECEDENCE_ENV).filter(|v| !v.trim().is_empty()) {
            config.precedence = value.parse()?;
        }

        if let Some(value) = lookup(ALLOW_DETACHED_OWNER_ENV).filter(|v| !v.trim().is_empty()) {
            config.ladder.allow_detached_owner = match value.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(SettingsError::InvalidValue {
                        name: ALLOW_DETACHED_OWNER_ENV,
                        value,
                    })
                }
            };
        }

        Ok(config)
    }

    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Set the store precedence
    pub fn with_precedence(mut self, precedence: SourcePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Set the ladder steps
    pub fn with_ladder(mut self, ladder: LadderConfig) -> Self {
        self.ladder = ladder;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
