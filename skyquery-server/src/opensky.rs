//! OpenSky Network REST client: the live `SnapshotProvider`.
//!
//! One `GET /states/all` per query. No caching, no retries: a failure is
//! classified into a `FeedError` and handed back to the engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};

use skyquery_core::config::FeedConfig;
use skyquery_core::feed::{parse_states, FeedError, SnapshotProvider, SnapshotRequest};
use skyquery_core::types::Snapshot;

const RATE_LIMIT_RETRY_HEADER: &str = "x-rate-limit-retry-after-seconds";

/// HTTP client for the OpenSky `states/all` endpoint.
pub struct OpenSkyClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl OpenSkyClient {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(concat!("skyquery/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| FeedError::Unreachable(e.to_string()))?;

        Ok(OpenSkyClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config
                .credentials()
                .map(|(u, p)| (u.to_string(), p.to_string())),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    fn states_url(&self) -> String {
        format!("{}/states/all", self.base_url)
    }
}

/// Query string for a snapshot request. Repeated `icao24` keys select
/// several aircraft.
fn query_params(request: &SnapshotRequest) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(bbox) = &request.bbox {
        params.push(("lamin", bbox.min_lat.to_string()));
        params.push(("lomin", bbox.min_lon.to_string()));
        params.push(("lamax", bbox.max_lat.to_string()));
        params.push(("lomax", bbox.max_lon.to_string()));
    }
    for icao in &request.icao24 {
        params.push(("icao24", icao.to_string()));
    }
    params
}

/// Map a non-success HTTP status onto the feed error taxonomy.
fn classify_status(status: StatusCode, headers: &HeaderMap) -> FeedError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = headers
                .get(RATE_LIMIT_RETRY_HEADER)
                .or_else(|| headers.get(RETRY_AFTER))
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            FeedError::RateLimited { retry_after_secs }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FeedError::Unauthorized,
        status => FeedError::Status(status.as_u16()),
    }
}

#[async_trait]
impl SnapshotProvider for OpenSkyClient {
    async fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot, FeedError> {
        let url = self.states_url();
        let params = query_params(request);
        tracing::debug!(%url, ?params, "fetching states");

        let mut req = self.client.get(&url).query(&params);
        if let Some((user, pass)) = &self.credentials {
            req = req.basic_auth(user, Some(pass));
        }

        let response = req
            .send()
            .await
            .map_err(|e| FeedError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let err = classify_status(status, response.headers());
            tracing::warn!(%status, error = %err, "feed request failed");
            return Err(err);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Unreachable(e.to_string()))?;
        let snapshot = parse_states(&body)?;

        tracing::debug!(
            time = snapshot.time,
            states = snapshot.states.len(),
            "snapshot received"
        );
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use skyquery_core::types::BoundingBox;

    #[test]
    fn test_query_params() {
        let request = SnapshotRequest {
            bbox: Some(BoundingBox {
                min_lat: 37.0,
                max_lat: 38.5,
                min_lon: -123.0,
                max_lon: -121.5,
            }),
            icao24: vec!["a1b2c3".parse().unwrap(), "3C6444".parse().unwrap()],
        };
        let params = query_params(&request);
        assert_eq!(
            params,
            vec![
                ("lamin", "37".to_string()),
                ("lomin", "-123".to_string()),
                ("lamax", "38.5".to_string()),
                ("lomax", "-121.5".to_string()),
                ("icao24", "a1b2c3".to_string()),
                ("icao24", "3c6444".to_string()),
            ]
        );
        assert!(query_params(&SnapshotRequest::default()).is_empty());
    }

    #[test]
    fn test_classify_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_RETRY_HEADER, HeaderValue::from_static("120"));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &headers),
            FeedError::RateLimited {
                retry_after_secs: Some(120)
            }
        );

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("15"));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &headers),
            FeedError::RateLimited {
                retry_after_secs: Some(15)
            }
        );

        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()),
            FeedError::RateLimited {
                retry_after_secs: None
            }
        );
    }

    #[test]
    fn test_classify_other_statuses() {
        let headers = HeaderMap::new();
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, &headers),
            FeedError::Unauthorized
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, &headers),
            FeedError::Unauthorized
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, &headers),
            FeedError::Status(503)
        );
    }

    #[test]
    fn test_client_config() {
        let config = FeedConfig {
            base_url: "http://localhost:9000/api/".into(),
            username: Some("pilot".into()),
            password: Some("secret".into()),
            timeout_secs: 5,
        };
        let client = OpenSkyClient::new(&config).unwrap();
        assert!(client.is_authenticated());
        assert_eq!(client.states_url(), "http://localhost:9000/api/states/all");

        let anonymous = OpenSkyClient::new(&FeedConfig::default()).unwrap();
        assert!(!anonymous.is_authenticated());
    }
}
