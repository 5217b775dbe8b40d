use crate::config::model::EngineConfig;
use crate::config::validate::validate_config;
use crate::config::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides [`default_config_path`].
pub const CONFIG_PATH_ENV: &str = "ORDER_AUTOMATION_CONFIG";

/// Reads and deserializes a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a config file and validates it. This is the entry point the binary uses.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let config = load_from_path(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// `OrderAutomation.toml` in the working directory unless `ORDER_AUTOMATION_CONFIG` is set.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("OrderAutomation.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderStatus;
    use crate::notify::Channel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = write_config("");
        let config = load_and_validate(file.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.scheduler.sweep_interval_secs, 60);
        assert_eq!(config.reviews.request_delay_hours, 72);
    }

    #[test]
    fn parses_routes_and_rosters() {
        let file = write_config(
            r#"
[scheduler]
sweep_interval_secs = 15
max_concurrency = 1

[notifications]
operators = ["ops@example.org"]
webhook_url = "https://hooks.example.org/orders"

[[notifications.routes]]
status = "ready_to_ship"
channel = "admin"
template = "order_ready_to_ship"

[[notifications.routes]]
status = "shipped"
channel = "webhook"
template = "order_shipped"
"#,
        );
        let config = load_and_validate(file.path()).unwrap();
        assert_eq!(config.scheduler.sweep_interval_secs, 15);
        assert_eq!(config.scheduler.housekeeping_interval_secs, 3600);
        assert_eq!(config.notifications.routes.len(), 2);
        assert_eq!(config.notifications.routes[1].status, OrderStatus::Shipped);
        assert_eq!(config.notifications.routes[1].channel, Channel::Webhook);
    }

    #[test]
    fn unknown_status_is_a_parse_error() {
        let file = write_config(
            r#"
[[notifications.routes]]
status = "lost_in_transit"
channel = "email"
template = "oops"
"#,
        );
        assert!(matches!(load_from_path(file.path()), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn oversized_review_delay_fails_validation() {
        let file = write_config("[reviews]\nrequest_delay_hours = 4000000000\n");
        assert!(load_from_path(file.path()).is_ok());
        assert!(matches!(load_and_validate(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
