//! Freshness evaluation: "has anything changed that this session hasn't seen?"
//!
//! Each evaluation re-reads the project's [`NotificationRecord`] through the
//! [`ConnectionManager`]. A failed read triggers a reconnect and another
//! attempt, up to [`RetryConfig::max_retries`] reconnects per call. Past the
//! ceiling the call fails with [`FreshnessError::CacheExhausted`]; it never
//! guesses an answer.
//!
//! Reads are permissive: a missing entry, or one that no longer decodes, is
//! the empty record.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::retry::RetryConfig;
use crate::telemetry;
use crate::types::NotificationRecord;
use crate::{FreshnessError, Result};

/// Prefix of every project's cache key.
pub const NOTIFICATION_KEY_PREFIX: &str = "notification_cache/";

/// Cache key holding `project_id`'s record.
pub fn notification_key(project_id: &str) -> String {
    format!("{NOTIFICATION_KEY_PREFIX}{project_id}")
}

/// Answers freshness queries against the shared cache.
pub struct FreshnessEvaluator {
    connections: Arc<ConnectionManager>,
    retry: RetryConfig,
}

impl FreshnessEvaluator {
    /// Create an evaluator reading through `connections`.
    pub fn new(connections: Arc<ConnectionManager>, retry: RetryConfig) -> Self {
        Self { connections, retry }
    }

    /// The connection manager this evaluator reads through.
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Whether `session_id` must refresh its view of `project_id`.
    ///
    /// Returns `true` if the session has never checked in for this project,
    /// or if another session (or the system) recorded an update after the
    /// session's last check. Never writes to the cache.
    pub async fn refresh_my_view(&self, project_id: &str, session_id: &str) -> Result<bool> {
        let started = Instant::now();
        let outcome = self.load_record(project_id).await;
        metrics::histogram!(telemetry::CHECK_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let record = match outcome {
            Ok(record) => record,
            Err(e) => {
                metrics::counter!(telemetry::CHECKS_TOTAL, "result" => "error").increment(1);
                return Err(e);
            }
        };

        let refresh = record.needs_refresh(session_id);
        let result = if refresh { "refresh" } else { "current" };
        metrics::counter!(telemetry::CHECKS_TOTAL, "result" => result).increment(1);
        info!(
            project_id,
            updates = record.updates.len(),
            sessions = record.last_check.len(),
            refresh,
            "evaluated freshness"
        );
        Ok(refresh)
    }

    /// Fetch and decode `project_id`'s record, reconnecting on failure.
    pub async fn load_record(&self, project_id: &str) -> Result<NotificationRecord> {
        let key = notification_key(project_id);
        let raw = self.fetch_with_reconnect(&key).await?;
        Ok(decode_permissive(project_id, raw))
    }

    async fn fetch_with_reconnect(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // The first connect is not a reconnect and costs no retry budget.
        if !self.connections.is_connected().await {
            if let Err(e) = self.connections.initialize().await {
                warn!(error = %e, "initial cache connect failed");
            }
        }

        let mut reconnects = 0u32;
        loop {
            let err = match self.connections.fetch(key).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };
            metrics::counter!(telemetry::FETCH_ERRORS_TOTAL).increment(1);

            if reconnects >= self.retry.max_retries {
                metrics::counter!(telemetry::EXHAUSTED_TOTAL).increment(1);
                warn!(
                    key,
                    attempts = reconnects + 1,
                    error = %err,
                    "giving up on cache after reconnect ceiling"
                );
                return Err(FreshnessError::CacheExhausted {
                    attempts: reconnects + 1,
                    last_error: err.to_string(),
                });
            }

            let delay = self.retry.delay_for_attempt(reconnects);
            reconnects += 1;
            warn!(
                key,
                attempt = reconnects,
                max_retries = self.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "cache fetch failed, reconnecting"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            // A failed rebuild is not fatal here; the next fetch decides.
            match self.connections.initialize().await {
                Ok(()) => {
                    metrics::counter!(telemetry::RECONNECTS_TOTAL, "status" => "ok").increment(1);
                }
                Err(e) => {
                    metrics::counter!(telemetry::RECONNECTS_TOTAL, "status" => "error")
                        .increment(1);
                    warn!(error = %e, "cache reconnect failed");
                }
            }
        }
    }
}

/// Absent or undecodable values read as the empty record.
fn decode_permissive(project_id: &str, raw: Option<Vec<u8>>) -> NotificationRecord {
    let Some(bytes) = raw else {
        debug!(project_id, "no cached record, using empty record");
        return NotificationRecord::default();
    };
    match NotificationRecord::from_slice(&bytes) {
        Ok(record) => record,
        Err(e) => {
            metrics::counter!(telemetry::DECODE_FALLBACKS_TOTAL).increment(1);
            warn!(project_id, error = %e, "cached record did not decode, using empty record");
            NotificationRecord::default()
        }
    }
}
