//! # QuickBooks API Client
//!
//! Authenticated JSON calls against the QuickBooks Online v3 API.
//!
//! Every call pins `minorversion` and runs under the standard retry
//! discipline: when an authorized request comes back 401/403 the client
//! forces exactly one token refresh and retries once; a second rejection
//! propagates. Fault payloads are parsed into the structured error
//! taxonomy (first `Fault.Error` entry wins).

use crate::config::{QboConfig, MINOR_VERSION};
use crate::oauth::{TokenManager, TokenState};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store_core::{StoreError, StoreResult};
use tracing::debug;

pub struct QboClient {
    config: QboConfig,
    tokens: Arc<TokenManager>,
    client: Client,
}

impl QboClient {
    pub fn new(config: QboConfig, tokens: Arc<TokenManager>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            tokens,
            client,
        }
    }

    /// Run a query in the QuickBooks SELECT dialect
    pub async fn query<T: DeserializeOwned>(&self, statement: &str) -> StoreResult<T> {
        self.request(Method::GET, "query", &[("query", statement)], None, false)
            .await
    }

    /// Create an entity (`customer`, `invoice`, ...)
    pub async fn create<T: DeserializeOwned>(
        &self,
        entity: &str,
        body: &impl Serialize,
    ) -> StoreResult<T> {
        let body = serde_json::to_value(body)
            .map_err(|err| StoreError::Internal(format!("failed to serialize payload: {}", err)))?;
        self.request(Method::POST, entity, &[], Some(body), false)
            .await
    }

    /// Bodyless POST (the invoice send endpoint wants octet-stream)
    pub async fn post_empty(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<serde_json::Value> {
        self.request(Method::POST, path, query, None, true).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
        octet_stream: bool,
    ) -> StoreResult<T> {
        let token = self.tokens.valid_token().await?;

        let (status, text) = self
            .execute(&token, method.clone(), path, query, body.as_ref(), octet_stream)
            .await?;

        let (status, text) =
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                debug!(
                    %status,
                    "QuickBooks rejected the access token; refreshing and retrying once"
                );
                let token = self.tokens.force_refresh().await?;
                self.execute(&token, method, path, query, body.as_ref(), octet_stream)
                    .await?
            } else {
                (status, text)
            };

        if !status.is_success() {
            return Err(parse_fault(status, &text));
        }

        serde_json::from_str(&text).map_err(|err| {
            StoreError::Internal(format!("Failed to parse QuickBooks response: {}", err))
        })
    }

    async fn execute(
        &self,
        token: &TokenState,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
        octet_stream: bool,
    ) -> StoreResult<(StatusCode, String)> {
        let realm_id = token.realm_id.trim();
        if realm_id.is_empty() {
            return Err(StoreError::not_configured(
                "QuickBooks realm id (reconnect via /api/qbo/connect)",
            ));
        }

        let url = format!(
            "{}/v3/company/{}/{}",
            self.config.api_base_url, realm_id, path
        );

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&token.access_token)
            .header("Accept", "application/json")
            .query(&[("minorversion", MINOR_VERSION)])
            .query(query);

        if let Some(body) = body {
            request = request.json(body);
        }
        if octet_stream {
            request = request.header("Content-Type", "application/octet-stream");
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        Ok((status, text))
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> StoreError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    StoreError::Unreachable {
        provider: "quickbooks".to_string(),
        message,
    }
}

fn parse_fault(status: StatusCode, body: &str) -> StoreError {
    let parsed: Option<FaultEnvelope> = serde_json::from_str(body).ok();
    let first = parsed
        .as_ref()
        .and_then(|e| e.fault.as_ref())
        .and_then(|f| f.errors.first());

    let message = first
        .and_then(|e| e.message.clone().or_else(|| e.detail.clone()))
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
    let code = first.and_then(|e| e.code.clone());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StoreError::Authentication {
            provider: "quickbooks".to_string(),
            message,
        }
    } else {
        StoreError::ExternalBusiness {
            provider: "quickbooks".to_string(),
            status: status.as_u16(),
            code,
            message,
        }
    }
}

// =============================================================================
// QuickBooks wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct FaultEnvelope {
    #[serde(rename = "Fault", default)]
    fault: Option<FaultBody>,
}

#[derive(Debug, Deserialize)]
struct FaultBody {
    #[serde(rename = "Error", default)]
    errors: Vec<FaultError>,
}

#[derive(Debug, Deserialize)]
struct FaultError {
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Detail", default)]
    detail: Option<String>,
    #[serde(rename = "code", default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::MemoryTokenStore;
    use chrono::{Duration, Utc};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fresh_token(access: &str) -> TokenState {
        TokenState {
            access_token: access.into(),
            refresh_token: "refresh-1".into(),
            realm_id: "9341452".into(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn client_against(server: &MockServer, token: TokenState) -> QboClient {
        let config = QboConfig::new("client-id", "client-secret", "https://cb", "state-secret")
            .with_token_base_url(format!("{}/oauth2/v1/tokens/bearer", server.uri()))
            .with_api_base_url(server.uri());
        let tokens = Arc::new(TokenManager::new(
            config.clone(),
            Arc::new(MemoryTokenStore::seeded(token)),
        ));
        QboClient::new(config, tokens)
    }

    #[derive(Debug, Deserialize)]
    struct CountEnvelope {
        #[serde(rename = "QueryResponse")]
        query_response: serde_json::Value,
    }

    #[tokio::test]
    async fn queries_hit_the_realm_scoped_path_with_minorversion() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/company/9341452/query"))
            .and(query_param("minorversion", MINOR_VERSION))
            .and(query_param("query", "select Id from Customer"))
            .and(header("Authorization", "Bearer fresh-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "QueryResponse": { "totalCount": 3 },
                "time": "2025-08-25T10:00:00.000-07:00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server, fresh_token("fresh-access"));
        let response: CountEnvelope = client.query("select Id from Customer").await.unwrap();
        assert_eq!(response.query_response["totalCount"], 3);
    }

    #[tokio::test]
    async fn a_rejected_token_triggers_exactly_one_refresh_and_retry() {
        let server = MockServer::start().await;

        // first API call is rejected once
        Mock::given(method("GET"))
            .and(path("/v3/company/9341452/query"))
            .and(header("Authorization", "Bearer stale-access"))
            .respond_with(ResponseTemplate::new(401).set_body_string(""))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        // exactly one refresh
        Mock::given(method("POST"))
            .and(path("/oauth2/v1/tokens/bearer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "rotated-access",
                "refresh_token": "rotated-refresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        // the retry carries the rotated token
        Mock::given(method("GET"))
            .and(path("/v3/company/9341452/query"))
            .and(header("Authorization", "Bearer rotated-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "QueryResponse": { "totalCount": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server, fresh_token("stale-access"));
        let response: CountEnvelope = client.query("select Id from Customer").await.unwrap();
        assert_eq!(response.query_response["totalCount"], 1);
    }

    #[tokio::test]
    async fn a_second_rejection_propagates_without_another_refresh() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/company/9341452/query"))
            .respond_with(ResponseTemplate::new(401).set_body_string(""))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/oauth2/v1/tokens/bearer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "rotated-access",
                "refresh_token": "rotated-refresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server, fresh_token("stale-access"));
        let err = client
            .query::<CountEnvelope>("select Id from Customer")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Authentication { .. }));
    }

    #[tokio::test]
    async fn fault_payloads_become_structured_business_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/company/9341452/invoice"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "Fault": {
                    "Error": [{
                        "Message": "Business Validation Error",
                        "Detail": "The account period has closed.",
                        "code": "6210"
                    }],
                    "type": "ValidationFault"
                },
                "time": "2025-08-25T10:00:00.000-07:00"
            })))
            .mount(&server)
            .await;

        let client = client_against(&server, fresh_token("fresh-access"));
        let err = client
            .create::<serde_json::Value>("invoice", &serde_json::json!({"DocNumber": "ORD-1"}))
            .await
            .unwrap_err();

        match err {
            StoreError::ExternalBusiness {
                status,
                code,
                message,
                ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("6210"));
                assert_eq!(message, "Business Validation Error");
            }
            other => panic!("expected a business rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bodyless_posts_send_octet_stream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/company/9341452/invoice/239/send"))
            .and(query_param("sendTo", "ada@example.com"))
            .and(query_param("minorversion", MINOR_VERSION))
            .and(header("Content-Type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Invoice": { "Id": "239", "EmailStatus": "EmailSent" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server, fresh_token("fresh-access"));
        client
            .post_empty("invoice/239/send", &[("sendTo", "ada@example.com")])
            .await
            .unwrap();
    }
}
