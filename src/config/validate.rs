use crate::config::model::{EngineConfig, MAX_REQUEST_DELAY_HOURS};
use crate::config::ConfigError;
use crate::notify::Channel;

/// Semantic checks on a deserialized config.
///
/// Covers scheduler sanity and notification routes that could never be
/// delivered. The route table itself is checked again when it is built
/// (see [`EngineConfig::notification_table`]).
pub fn validate_config(cfg: &EngineConfig) -> Result<(), ConfigError> {
    validate_scheduler(cfg)?;
    validate_reviews(cfg)?;
    validate_routes(cfg)?;
    Ok(())
}

fn validate_scheduler(cfg: &EngineConfig) -> Result<(), ConfigError> {
    let s = &cfg.scheduler;
    if s.sweep_interval_secs == 0 {
        return Err(ConfigError::Invalid("[scheduler].sweep_interval_secs must be >= 1 (got 0)".into()));
    }
    if s.housekeeping_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "[scheduler].housekeeping_interval_secs must be >= 1 (got 0)".into(),
        ));
    }
    if s.max_concurrency == 0 {
        return Err(ConfigError::Invalid("[scheduler].max_concurrency must be >= 1 (got 0)".into()));
    }
    Ok(())
}

fn validate_reviews(cfg: &EngineConfig) -> Result<(), ConfigError> {
    let hours = cfg.reviews.request_delay_hours;
    if hours > MAX_REQUEST_DELAY_HOURS {
        return Err(ConfigError::Invalid(format!(
            "[reviews].request_delay_hours must be <= {MAX_REQUEST_DELAY_HOURS} (got {hours})"
        )));
    }
    Ok(())
}

fn validate_routes(cfg: &EngineConfig) -> Result<(), ConfigError> {
    let n = &cfg.notifications;
    for route in &n.routes {
        match route.channel {
            Channel::Webhook if n.webhook_url.as_deref().map_or(true, |u| u.trim().is_empty()) => {
                return Err(ConfigError::Invalid(format!(
                    "webhook route '{}' on {} requires [notifications].webhook_url",
                    route.template, route.status
                )));
            }
            Channel::Admin if n.operators.is_empty() => {
                return Err(ConfigError::Invalid(format!(
                    "admin route '{}' on {} requires a non-empty [notifications].operators",
                    route.template, route.status
                )));
            }
            _ => {}
        }
    }
    cfg.notification_table()?;
    Ok(())
}
