//! HTTP implementation of the draft gateway.
//!
//! Talks to the backend's draft endpoints: `POST /api/save-draft` (upsert
//! keyed by kind + parent entity) and `GET /api/get-draft`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DraftGateway, GatewayError};
use crate::models::{Draft, FormKind};

pub struct HttpDraftGateway {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveDraftRequest<'a> {
    parent_entity_id: &'a str,
    kind: FormKind,
    draft: &'a Draft,
}

#[derive(Deserialize)]
struct GetDraftResponse {
    draft: Draft,
}

impl HttpDraftGateway {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> GatewayError {
        if status.is_client_error() {
            GatewayError::Rejected(format!("{}: {}", status, body))
        } else {
            GatewayError::Network(format!("server returned {}", status))
        }
    }
}

#[async_trait]
impl DraftGateway for HttpDraftGateway {
    async fn save(&self, draft: &Draft) -> Result<(), GatewayError> {
        let body = SaveDraftRequest {
            parent_entity_id: draft.id.parent_entity_id(),
            kind: draft.id.kind(),
            draft,
        };

        let response = self
            .client
            .post(self.endpoint("/api/save-draft"))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, body))
    }

    async fn load(
        &self,
        kind: FormKind,
        parent_entity_id: &str,
    ) -> Result<Option<Draft>, GatewayError> {
        let response = self
            .client
            .get(self.endpoint("/api/get-draft"))
            .query(&[("parentEntityId", parent_entity_id), ("kind", kind.as_str())])
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let parsed: GetDraftResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("invalid response body: {}", e)))?;

        Ok(Some(parsed.draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        let gateway = HttpDraftGateway::new("https://qa.example.com", "token");
        assert_eq!(
            gateway.endpoint("/api/save-draft"),
            "https://qa.example.com/api/save-draft"
        );
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let gateway = HttpDraftGateway::new("https://qa.example.com/", "token");
        assert_eq!(
            gateway.endpoint("/api/get-draft"),
            "https://qa.example.com/api/get-draft"
        );
    }

    #[test]
    fn test_client_errors_classify_as_rejected() {
        let err =
            HttpDraftGateway::classify_status(reqwest::StatusCode::FORBIDDEN, "nope".to_string());
        assert!(matches!(err, GatewayError::Rejected(_)));
    }

    #[test]
    fn test_server_errors_classify_as_network() {
        let err = HttpDraftGateway::classify_status(
            reqwest::StatusCode::BAD_GATEWAY,
            String::new(),
        );
        assert!(matches!(err, GatewayError::Network(_)));
    }
}
