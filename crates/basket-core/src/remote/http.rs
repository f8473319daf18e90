//! reqwest-backed implementation of the remote gateway.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Connect, Rejection, RemoteError, RemoteGateway, RemoteResult};
use crate::models::{ItemId, RemoteItem};
use crate::util::{compact_text, format_timestamp, is_http_url, normalize_text_option};

/// Resource path of the item collection below the endpoint.
pub const ITEMS_PATH: &str = "/items";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which request a response belongs to; decides which statuses are rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    List,
    Fetch,
    Create,
    Replace,
    Delete,
}

impl Operation {
    fn rejection(self, status: StatusCode) -> Option<Rejection> {
        match (self, status) {
            (Self::Create | Self::Replace, StatusCode::BAD_REQUEST) => Some(Rejection::BadRequest),
            (Self::Create | Self::Replace, StatusCode::CONFLICT) => Some(Rejection::Conflict),
            (Self::Replace | Self::Delete, StatusCode::NOT_FOUND) => Some(Rejection::NotFound),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct HttpRemoteGateway {
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteGateway {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteGateway")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpRemoteGateway {
    pub fn new(endpoint: impl Into<String>) -> RemoteResult<Self> {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Build a gateway whose every request gives up after `timeout`.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteError::Transport(error.to_string()))?;
        Ok(Self { endpoint, client })
    }

    fn collection_url(&self) -> String {
        format!("{}{ITEMS_PATH}", self.endpoint)
    }

    fn item_url(&self, id: &ItemId) -> String {
        format!("{}{ITEMS_PATH}/{id}", self.endpoint)
    }

    fn prepare(builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::ACCEPT, "application/json")
            .header(header::CACHE_CONTROL, "no-cache")
    }

    async fn send(
        &self,
        operation: Operation,
        builder: RequestBuilder,
    ) -> RemoteResult<Response> {
        let response = Self::prepare(builder).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let Some(rejection) = operation.rejection(status) {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                "{operation:?} rejected with HTTP {}: {}",
                status.as_u16(),
                compact_text(&body)
            );
            return Err(RemoteError::Rejected(rejection));
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| {
            RemoteError::Malformed(format!("{error}: {}", compact_text(&body)))
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpRemoteGateway {
    async fn list_since(&self, since: Option<DateTime<Utc>>) -> RemoteResult<Vec<RemoteItem>> {
        let mut builder = self.client.get(self.collection_url());
        if let Some(since) = since {
            builder = builder.query(&[("lastSync", format_timestamp(&since))]);
        }
        let response = self.send(Operation::List, builder).await?;
        Self::decode(response).await
    }

    async fn list_ids(&self) -> RemoteResult<Vec<ItemId>> {
        let url = format!("{}/ids", self.collection_url());
        let response = self.send(Operation::List, self.client.get(url)).await?;
        Self::decode(response).await
    }

    async fn fetch(&self, id: &ItemId) -> RemoteResult<Option<RemoteItem>> {
        let builder = self.client.get(self.item_url(id));
        match self.send(Operation::Fetch, builder).await {
            Ok(response) => Self::decode(response).await.map(Some),
            Err(RemoteError::Status { status: 404, .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn create(&self, item: &RemoteItem) -> RemoteResult<RemoteItem> {
        let builder = self.client.post(self.collection_url()).json(item);
        let response = self.send(Operation::Create, builder).await?;
        Self::decode(response).await
    }

    async fn replace(&self, id: &ItemId, item: &RemoteItem) -> RemoteResult<RemoteItem> {
        let builder = self.client.put(self.item_url(id)).json(item);
        let response = self.send(Operation::Replace, builder).await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: &ItemId) -> RemoteResult<()> {
        let builder = self.client.delete(self.item_url(id));
        self.send(Operation::Delete, builder).await?;
        Ok(())
    }
}

/// Connects [`HttpRemoteGateway`]s with a shared per-request timeout.
#[derive(Debug, Clone, Copy)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl Connect for HttpConnector {
    type Gateway = HttpRemoteGateway;

    fn connect(&self, endpoint: &str) -> RemoteResult<HttpRemoteGateway> {
        HttpRemoteGateway::with_timeout(endpoint, self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> RemoteResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidEndpoint("endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidEndpoint(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_endpoint_rejects_invalid_values() {
        assert!(normalize_endpoint(String::new()).is_err());
        assert!(normalize_endpoint("   ".to_string()).is_err());
        assert!(normalize_endpoint("api.example.com".to_string()).is_err());
    }

    #[test]
    fn normalize_endpoint_trims_trailing_slash() {
        assert_eq!(
            normalize_endpoint(" https://api.example.com/v1/ ".to_string()).unwrap(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn urls_are_built_below_the_collection() {
        let gateway = HttpRemoteGateway::new("http://localhost:8080/").unwrap();
        let id: ItemId = "018f3c4e-8a2b-7c3d-9e4f-5a6b7c8d9e0f".parse().unwrap();

        assert_eq!(gateway.collection_url(), "http://localhost:8080/items");
        assert_eq!(
            gateway.item_url(&id),
            "http://localhost:8080/items/018f3c4e-8a2b-7c3d-9e4f-5a6b7c8d9e0f"
        );
    }

    #[test]
    fn status_mapping_follows_each_operation_contract() {
        assert_eq!(
            Operation::Create.rejection(StatusCode::BAD_REQUEST),
            Some(Rejection::BadRequest)
        );
        assert_eq!(
            Operation::Create.rejection(StatusCode::CONFLICT),
            Some(Rejection::Conflict)
        );
        assert_eq!(Operation::Create.rejection(StatusCode::NOT_FOUND), None);
        assert_eq!(
            Operation::Replace.rejection(StatusCode::NOT_FOUND),
            Some(Rejection::NotFound)
        );
        assert_eq!(
            Operation::Delete.rejection(StatusCode::NOT_FOUND),
            Some(Rejection::NotFound)
        );
        assert_eq!(Operation::List.rejection(StatusCode::BAD_REQUEST), None);
        assert_eq!(
            Operation::Replace.rejection(StatusCode::INTERNAL_SERVER_ERROR),
            None
        );
    }

    #[test]
    fn api_errors_prefer_structured_messages() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, r#"{"message":" upstream down "}"#),
            "upstream down (502)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::SERVICE_UNAVAILABLE, "try later"),
            "try later (503)"
        );
    }

    #[test]
    fn gateway_debug_shows_endpoint() {
        let gateway = HttpRemoteGateway::new("https://api.example.com").unwrap();
        assert!(format!("{gateway:?}").contains("https://api.example.com"));
    }
}
