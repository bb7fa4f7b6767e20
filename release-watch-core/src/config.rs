use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::select::NamePattern;

/// Complete settings of a watcher: where to poll and whom to notify.
///
/// Passed explicitly into every stage; there is no process-wide config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(alias = "ftp")]
    pub remote: RemoteConfig,
    #[serde(alias = "smtp")]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub server: String,
    #[serde(default = "default_remote_port")]
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    pub dir: String,
    /// File name mask, `*` matches any sequence.
    pub pattern: String,
    /// Poll period in minutes.
    pub period: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    pub from: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    pub to: Vec<String>,
    pub subject: String,
    /// Introductory line of every notification body.
    pub text: String,
    /// Accept self-signed or otherwise invalid server certificates.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

fn default_remote_port() -> u16 {
    21
}

fn default_accept_invalid_certs() -> bool {
    true
}

// Ports show up quoted in older config files.
fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl RemoteConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.period * 60)
    }
}

impl WatchConfig {
    /// Reject settings the watcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.remote.pattern.is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        NamePattern::compile(&self.remote.pattern)?;
        if self.notify.to.is_empty() {
            return Err(ConfigError::NoRecipients);
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            server = %self.remote.server,
            port = self.remote.port,
            dir = %self.remote.dir,
            pattern = %self.remote.pattern,
            period_minutes = self.remote.period,
            "Loaded remote config"
        );
        info!(
            host = %self.notify.host,
            port = self.notify.port,
            from = %self.notify.from,
            recipients = self.notify.to.len(),
            accept_invalid_certs = self.notify.accept_invalid_certs,
            "Loaded notify config"
        );
    }
}
