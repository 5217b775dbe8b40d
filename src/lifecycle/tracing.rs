//! # Observability
//!
//! [`setup_tracing`] initializes structured logging with `tracing`. The
//! compact format hides module paths (`with_target(false)`); spans such as
//! `evaluate{order_id=order_3}` and `run_once` are shown inline, so every
//! log line of one order's evaluation carries its id.
//!
//! ```bash
//! # Transitions, sweep summaries, notification failures
//! RUST_LOG=info cargo run
//!
//! # Adds skipped rules, dwell gates and store traffic
//! RUST_LOG=debug cargo run
//!
//! # Adds every published event
//! RUST_LOG=trace cargo run
//! ```
//!
//! Typical `info` output for one sweep:
//!
//! ```text
//! INFO run_once:evaluate: Status advanced order_id=order_1 status=pending rule="payment_confirmed" from=pending to=processing
//! WARN run_once:evaluate: Notification skipped order_id=order_1 channel=sms template=order_confirmation_sms reason="customer has no phone number"
//! INFO run_once: Sweep finished examined=4 transitioned=1 failed=0 elapsed_ms=2
//! ```

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// `level` (a filter directive such as `debug` or `order_automation=trace`)
/// takes precedence over `RUST_LOG`; with neither set, `info` is used.
pub fn setup_tracing(level: Option<&str>) {
    let filter = match level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // A second call (e.g. from several tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
