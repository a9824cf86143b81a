use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{error::QueryError, pagination_utils::QueryDescriptor};

/// Envelope shared by every graphql api: `data` may be missing or null when
/// `errors` is filled in.
#[derive(Deserialize, Debug)]
pub(crate) struct GraphqlResponse<T> {
    pub(crate) data: Option<T>,
    #[serde(default)]
    pub(crate) errors: Vec<GraphqlError>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct GraphqlError {
    pub(crate) message: String,
    /// github's error code, e.g. `FORBIDDEN`
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    /// http-like status some apis (anilist) attach to each error
    pub(crate) status: Option<u16>,
}

/// Builds the error for a response whose `field` couldn't be read.
pub(crate) fn graphql_error(errors: &[GraphqlError], field: &str) -> QueryError {
    if errors.is_empty() {
        return QueryError::MalformedResponse(format!("response has no '{field}' field"));
    }
    let message = errors
        .iter()
        .map(|err| err.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let forbidden = errors.iter().any(|err| {
        matches!(err.kind.as_deref(), Some("FORBIDDEN") | Some("UNAUTHORIZED"))
            || matches!(err.status, Some(401) | Some(403))
    });
    if forbidden {
        QueryError::Authorization(message)
    } else {
        QueryError::MalformedResponse(message)
    }
}

/// Reads a numeric header, surrounding whitespace allowed.
fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    header_i64(headers, "x-ratelimit-remaining") == Some(0)
}

/// Uses rate limit response headers to return the amount of time to wait
/// before the next request.
pub(crate) fn rate_limit_wait(
    response_headers: &HeaderMap,
    response_status: StatusCode,
    base_delay: TimeDelta,
    now: DateTime<Utc>,
) -> TimeDelta {
    let one_second = TimeDelta::try_seconds(1).unwrap_or(base_delay);

    let mut primary_rate_limit_wait = base_delay;
    let mut secondary_rate_limit_wait = base_delay;

    if quota_exhausted(response_headers) {
        // wait for the primary limit to reset, plus one second
        let reset = header_i64(response_headers, "x-ratelimit-reset")
            .and_then(|timestamp| Utc.timestamp_opt(timestamp, 0).single())
            .unwrap_or(now);
        primary_rate_limit_wait = (reset - now) + one_second;
    } else if let Some(retry_after) = header_i64(response_headers, "retry-after") {
        // secondary rate limit, the server tells how many seconds to wait
        secondary_rate_limit_wait = TimeDelta::try_seconds(retry_after)
            .map_or(base_delay, |delay| delay + one_second);
    } else if !response_status.is_success() {
        // most likely a secondary rate limit without 'retry-after', double the wait
        secondary_rate_limit_wait = base_delay + base_delay;
    }

    primary_rate_limit_wait
        .max(secondary_rate_limit_wait)
        .max(TimeDelta::zero())
}

/// Maps a non successful status to the error surfaced to the controller.
pub(crate) fn classify_status(status: StatusCode, response_headers: &HeaderMap) -> Option<QueryError> {
    if status.is_success() {
        return None;
    }
    let rate_limited =
        quota_exhausted(response_headers) || response_headers.contains_key("retry-after");
    let message = format!("Request failed: {status}");

    Some(match status {
        StatusCode::UNAUTHORIZED => QueryError::Authorization(message),
        StatusCode::FORBIDDEN if !rate_limited => QueryError::Authorization(message),
        _ => QueryError::Network(message),
    })
}

/// Spaces requests out: the wait computed from one response is slept before
/// the next request goes out.
pub(crate) struct RequestThrottle {
    base_delay: TimeDelta,
    next_request_at: Mutex<Option<DateTime<Utc>>>,
}

impl RequestThrottle {
    pub(crate) fn new(min_interval_ms: u64) -> Self {
        let base_delay = i64::try_from(min_interval_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or_else(TimeDelta::zero);
        RequestThrottle {
            base_delay,
            next_request_at: Mutex::new(None),
        }
    }

    fn pending_wait(&self) -> Option<std::time::Duration> {
        let next_request_at = (*self.next_request_at.lock().ok()?)?;
        (next_request_at - Utc::now())
            .to_std()
            .ok()
            .filter(|wait| !wait.is_zero())
    }

    pub(crate) async fn wait_turn(&self) {
        if let Some(wait) = self.pending_wait() {
            info!("Sleeping for {} ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }

    pub(crate) fn record(&self, response_headers: &HeaderMap, status: StatusCode) {
        let wait = rate_limit_wait(response_headers, status, self.base_delay, Utc::now());
        if let Ok(mut next_request_at) = self.next_request_at.lock() {
            *next_request_at = Some(Utc::now() + wait);
        }
    }
}

/// Posts `query` with `variables` and returns the raw body of a successful response.
pub(crate) async fn post_graphql(
    client: &Client,
    endpoint: &str,
    headers: &HeaderMap,
    throttle: &RequestThrottle,
    query: &QueryDescriptor,
    variables: Value,
) -> Result<String, QueryError> {
    let body = json!({
        "query": query.document,
        "variables": variables,
    });

    throttle.wait_turn().await;
    let response = client
        .post(endpoint)
        .headers(headers.clone())
        .json(&body)
        .send()
        .await?;
    let status = response.status();

    // handle headers for ratelimits and status code
    throttle.record(response.headers(), status);
    if let Some(err) = classify_status(status, response.headers()) {
        error!("{} request failed: {}", query.name, status);
        return Err(err);
    }
    info!("{} request successful: {}", query.name, status);

    Ok(response.text().await?)
}
