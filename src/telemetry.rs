//! Telemetry metric name constants.
//!
//! Centralised metric names for freshcache operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `freshcache_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).

/// Total freshness evaluations.
///
/// Labels: `result` ("refresh" | "current" | "error").
pub const CHECKS_TOTAL: &str = "freshcache_checks_total";

/// Evaluation duration in seconds, including reconnects.
pub const CHECK_DURATION_SECONDS: &str = "freshcache_check_duration_seconds";

/// Total failed cache fetches (each one triggers a reconnect or exhaustion).
pub const FETCH_ERRORS_TOTAL: &str = "freshcache_fetch_errors_total";

/// Total reconnects attempted after a failed fetch.
///
/// Labels: `status` ("ok" | "error").
pub const RECONNECTS_TOTAL: &str = "freshcache_reconnects_total";

/// Total evaluations that gave up after the reconnect ceiling.
pub const EXHAUSTED_TOTAL: &str = "freshcache_exhausted_total";

/// Total stored records that failed to decode and were read as empty.
pub const DECODE_FALLBACKS_TOTAL: &str = "freshcache_decode_fallbacks_total";
