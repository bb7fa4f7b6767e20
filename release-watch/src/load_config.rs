/// `load_config` module: reads the YAML settings file into a validated [`WatchConfig`].
///
/// This is the only place where untrusted YAML is parsed.
///
/// # Responsibilities
/// - Parse the `remote` (or legacy `ftp`) and `notify` (or legacy `smtp`) sections
/// - Let secrets come from the environment instead of the file:
///   `RELEASE_WATCH_REMOTE_PASSWORD` and `RELEASE_WATCH_NOTIFY_PASSWORD` override
///   the passwords when set
/// - Validate the result so a broken file stops the process at startup
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use release_watch_core::config::WatchConfig;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const REMOTE_PASSWORD_ENV: &str = "RELEASE_WATCH_REMOTE_PASSWORD";
pub const NOTIFY_PASSWORD_ENV: &str = "RELEASE_WATCH_NOTIFY_PASSWORD";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<WatchConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: WatchConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(password) = std::env::var(REMOTE_PASSWORD_ENV) {
        info!(var = REMOTE_PASSWORD_ENV, "Using remote password from environment");
        config.remote.password = password;
    }
    if let Ok(password) = std::env::var(NOTIFY_PASSWORD_ENV) {
        info!(var = NOTIFY_PASSWORD_ENV, "Using notify password from environment");
        config.notify.password = password;
    }

    if let Err(e) = config.validate() {
        error!(error = %e, config_path = ?path_ref, "Invalid configuration");
        return Err(anyhow::anyhow!("Invalid configuration in {:?}: {e}", path_ref));
    }

    config.trace_loaded();
    Ok(config)
}
