//! Contract replay engine.
//!
//! Walks a contract's endpoints in declared order, replaying each with the
//! configured politeness delay, retrying transient failures with exponential
//! backoff, and short-circuiting the run when the remote looks down or the
//! credential has expired. Every execution writes one run-audit row.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use prospector_core::{AppConfig, ErrorHandlingConfig, RequestConfig, RunLayer, RunStatus, RunSummary};
use prospector_db::endpoint_records;
use prospector_db::run_log;
use reqwest::StatusCode;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthTokenProvider;
use crate::definition::{ApiContract, ContractEndpoint, HttpMethod, Pagination};
use crate::error::{FetchError, Result};

/// Replays an API contract against its remote and persists the records.
pub struct ContractFetcher {
    client: reqwest::Client,
    contract: ApiContract,
    auth: AuthTokenProvider,
    request: RequestConfig,
    error_handling: ErrorHandlingConfig,
    disabled: HashSet<String>,
}

/// How a run ended, before it's written to the audit log.
struct RunOutcome {
    items: u64,
    errors: u64,
    status: RunStatus,
    reason: Option<String>,
}

impl ContractFetcher {
    /// Build a fetcher from a validated contract and the app configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client can't be constructed.
    pub fn new(contract: ApiContract, auth: AuthTokenProvider, config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            contract,
            auth,
            request: config.request.clone(),
            error_handling: config.error_handling.clone(),
            disabled: config.endpoints.disabled.iter().cloned().collect(),
        })
    }

    /// Replay the whole contract once.
    ///
    /// Writes a `run_log` row for the execution whatever happens. Partial
    /// results stay persisted: records stored before a failure are kept.
    ///
    /// # Errors
    /// Returns `FetchError::AuthExpired` when the credential is rejected;
    /// other job-level failures are folded into the returned summary.
    pub async fn run(
        &self,
        pool: &SqlitePool,
        shutdown: &CancellationToken,
    ) -> Result<RunSummary> {
        let run_id = run_log::start_run(pool, RunLayer::Contract).await?;
        tracing::info!(run_id, "Contract replay started");

        let outcome = self.execute(pool, shutdown).await;

        run_log::finish_run(
            pool,
            run_id,
            outcome.items,
            outcome.errors,
            outcome.status,
            outcome.reason.as_deref(),
        )
        .await?;

        tracing::info!(
            run_id,
            items = outcome.items,
            errors = outcome.errors,
            status = %outcome.status,
            "Contract replay finished"
        );

        if outcome.status == RunStatus::Failed && outcome.reason.as_deref() == Some("auth-expired")
        {
            return Err(FetchError::AuthExpired);
        }

        Ok(RunSummary {
            items: outcome.items,
            errors: outcome.errors,
            status: outcome.status,
        })
    }

    async fn execute(&self, pool: &SqlitePool, shutdown: &CancellationToken) -> RunOutcome {
        let mut items = 0u64;
        let mut errors = 0u64;
        let mut consecutive_failures = 0u32;

        // A token already known to be stale fails the run before any
        // requests are spent on it.
        if self.auth.is_expired() {
            return RunOutcome {
                items,
                errors,
                status: RunStatus::Failed,
                reason: Some("auth-expired".to_string()),
            };
        }

        for endpoint in self.contract.active_endpoints() {
            if shutdown.is_cancelled() {
                tracing::info!("Shutdown requested, stopping contract replay");
                return RunOutcome {
                    items,
                    errors,
                    status: RunStatus::Completed,
                    reason: Some("shutdown".to_string()),
                };
            }

            if self.disabled.contains(endpoint.name.as_str()) {
                tracing::info!(endpoint = %endpoint.name, "Endpoint disabled, skipping");
                continue;
            }

            match self.replay_endpoint(pool, endpoint, shutdown).await {
                Ok(stored) => {
                    items += stored;
                    consecutive_failures = 0;
                    tracing::info!(endpoint = %endpoint.name, stored, "Endpoint replayed");
                }
                Err(FetchError::AuthExpired) => {
                    tracing::error!(
                        endpoint = %endpoint.name,
                        "Credential rejected, aborting run"
                    );
                    return RunOutcome {
                        items,
                        errors: errors + 1,
                        status: RunStatus::Failed,
                        reason: Some("auth-expired".to_string()),
                    };
                }
                Err(e) => {
                    errors += 1;
                    consecutive_failures += 1;
                    tracing::warn!(
                        endpoint = %endpoint.name,
                        error = %e,
                        consecutive_failures,
                        "Endpoint replay failed"
                    );

                    if consecutive_failures >= self.error_handling.circuit_breaker_threshold {
                        tracing::error!(
                            threshold = self.error_handling.circuit_breaker_threshold,
                            "Circuit breaker tripped, skipping remaining endpoints"
                        );
                        return RunOutcome {
                            items,
                            errors,
                            status: RunStatus::CircuitTripped,
                            reason: Some("circuit-breaker".to_string()),
                        };
                    }

                    if !self.error_handling.continue_on_error {
                        return RunOutcome {
                            items,
                            errors,
                            status: RunStatus::Failed,
                            reason: Some(e.to_string()),
                        };
                    }
                }
            }

            self.politeness_delay().await;
        }

        RunOutcome {
            items,
            errors,
            status: RunStatus::Completed,
            reason: None,
        }
    }

    /// Replay one endpoint, following its pagination until exhausted.
    async fn replay_endpoint(
        &self,
        pool: &SqlitePool,
        endpoint: &ContractEndpoint,
        shutdown: &CancellationToken,
    ) -> Result<u64> {
        endpoint_records::ensure_table(pool, &endpoint.name).await?;

        let mut stored = 0u64;

        match &endpoint.pagination {
            Pagination::None => {
                let body = self.request_json(endpoint, &[]).await?;
                stored += self.store_page(pool, endpoint, &body).await?;
            }
            Pagination::PageNumber {
                page_param,
                per_page_param,
                per_page,
            } => {
                let mut page = 1u32;
                loop {
                    if shutdown.is_cancelled() {
                        break;
                    }

                    let mut params = vec![(page_param.clone(), page.to_string())];
                    if let Some(per_page_param) = per_page_param {
                        params.push((per_page_param.clone(), per_page.to_string()));
                    }

                    let body = self.request_json(endpoint, &params).await?;
                    let count = self.store_page(pool, endpoint, &body).await?;
                    stored += count;

                    // When the page size is declared, a short page is the
                    // last one; otherwise only an empty page ends the walk.
                    let short_page =
                        per_page_param.is_some() && count < u64::from(*per_page);
                    if count == 0 || short_page {
                        break;
                    }
                    page += 1;
                    self.politeness_delay().await;
                }
            }
            Pagination::Cursor {
                cursor_param,
                cursor_field,
            } => {
                let mut cursor: Option<String> = None;
                loop {
                    if shutdown.is_cancelled() {
                        break;
                    }

                    let params = match &cursor {
                        Some(value) => vec![(cursor_param.clone(), value.clone())],
                        None => Vec::new(),
                    };

                    let body = self.request_json(endpoint, &params).await?;
                    let count = self.store_page(pool, endpoint, &body).await?;
                    stored += count;

                    cursor = body
                        .get(cursor_field)
                        .and_then(Value::as_str)
                        .filter(|c| !c.is_empty())
                        .map(String::from);
                    if cursor.is_none() || count == 0 {
                        break;
                    }
                    self.politeness_delay().await;
                }
            }
        }

        Ok(stored)
    }

    /// Extract and upsert the records from one response body.
    async fn store_page(
        &self,
        pool: &SqlitePool,
        endpoint: &ContractEndpoint,
        body: &Value,
    ) -> Result<u64> {
        let records = extract_records(body, endpoint.response_path.as_deref());
        let mut stored = 0u64;
        for record in &records {
            let record_id = record_identity(record);
            endpoint_records::upsert_record(pool, &endpoint.name, &record_id, record).await?;
            stored += 1;
        }
        Ok(stored)
    }

    /// Issue one logical request, retrying transient failures with
    /// exponential backoff.
    async fn request_json(
        &self,
        endpoint: &ContractEndpoint,
        params: &[(String, String)],
    ) -> Result<Value> {
        let url = format!(
            "{}{}",
            self.contract.base_url.trim_end_matches('/'),
            endpoint.path
        );

        let mut last_transient: Option<FetchError> = None;

        for attempt in 0..=self.request.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.request.retry_backoff_base, attempt);
                tracing::debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, "Retrying");
                tokio::time::sleep(delay).await;
            }

            let mut req = match endpoint.method {
                HttpMethod::Get => self.client.get(&url),
                HttpMethod::Post => self.client.post(&url),
            };
            if !params.is_empty() {
                req = req.query(params);
            }
            if endpoint.auth_required {
                req = req.header(
                    self.contract.auth.header.as_str(),
                    self.auth.header_value(&self.contract.auth),
                );
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return resp
                            .json::<Value>()
                            .await
                            .map_err(|e| FetchError::BadPayload(e.to_string()));
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(FetchError::AuthExpired);
                    }
                    if status == StatusCode::FORBIDDEN {
                        let body = resp.text().await.unwrap_or_default();
                        if looks_like_expired_credential(&body) {
                            return Err(FetchError::AuthExpired);
                        }
                        return Err(FetchError::Http { status: 403 });
                    }

                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        last_transient =
                            Some(FetchError::Transient(format!("status {}", status.as_u16())));
                        continue;
                    }

                    return Err(FetchError::Http {
                        status: status.as_u16(),
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_transient = Some(FetchError::Transient(e.to_string()));
                }
                Err(e) => return Err(FetchError::Request(e)),
            }
        }

        Err(last_transient
            .unwrap_or_else(|| FetchError::Transient("retries exhausted".to_string())))
    }

    async fn politeness_delay(&self) {
        if self.request.delay_seconds > 0 {
            tokio::time::sleep(Duration::from_secs(self.request.delay_seconds)).await;
        }
    }
}

/// Backoff before retry `attempt` (1-based): `base^attempt` seconds.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn backoff_delay(base: f64, attempt: u32) -> Duration {
    Duration::from_secs_f64(base.max(0.0).powi(attempt as i32))
}

/// 403 bodies that indicate a stale credential rather than a permission gap.
fn looks_like_expired_credential(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    lowered.contains("expired") || lowered.contains("invalid token")
}

/// Pull the record array out of a response body.
///
/// An explicit dotted `response_path` wins; otherwise a bare array is taken
/// as-is, common wrapper keys are probed, and any remaining object counts as
/// a single record.
fn extract_records(body: &Value, response_path: Option<&str>) -> Vec<Value> {
    const WRAPPER_KEYS: [&str; 4] = ["data", "results", "items", "records"];

    if let Some(path) = response_path {
        let mut current = body;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => return Vec::new(),
            }
        }
        return match current {
            Value::Array(records) => records.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        };
    }

    match body {
        Value::Array(records) => records.clone(),
        Value::Object(map) => {
            for key in WRAPPER_KEYS {
                if let Some(Value::Array(records)) = map.get(key) {
                    return records.clone();
                }
            }
            vec![body.clone()]
        }
        _ => Vec::new(),
    }
}

/// Stable identity for a record: a conventional id field when present,
/// otherwise a hash of the canonical payload.
fn record_identity(record: &Value) -> String {
    for key in ["id", "_id", "uuid"] {
        match record.get(key) {
            Some(Value::String(id)) if !id.is_empty() => return id.clone(),
            Some(Value::Number(id)) => return id.to_string(),
            _ => {}
        }
    }

    let mut hasher = DefaultHasher::new();
    record.to_string().hash(&mut hasher);
    format!("h{:016x}", hasher.finish())
}
