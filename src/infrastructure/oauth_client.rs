use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime Google documents for service-account access tokens.
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// A signed service-account assertion and the endpoint that trades it for an access token.
#[derive(Debug, Clone)]
pub struct JwtBearerRequest {
    pub token_endpoint: String,
    pub assertion: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: Option<String>,
}

#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn exchange_jwt_assertion(
        &self,
        request: JwtBearerRequest,
    ) -> Result<OAuthTokenResponse, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

impl ReqwestOAuthClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointPayload {
    #[serde(default)]
    access_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Turns a token endpoint reply into a token. Error replies keep the HTTP status in
/// the message so callers can tell transient failures from rejected assertions.
fn parse_token_reply(status: StatusCode, body: &str) -> Result<OAuthTokenResponse, InfraError> {
    let payload = serde_json::from_str::<TokenEndpointPayload>(body);

    let payload = match payload {
        Ok(payload) if status.is_success() && payload.error.is_none() => payload,
        Ok(payload) => {
            let code = payload.error.unwrap_or_else(|| "request_failed".to_string());
            let detail = payload
                .error_description
                .map(|description| format!("; {description}"))
                .unwrap_or_default();
            return Err(InfraError::OAuth(format!(
                "token endpoint error: http {}; {code}{detail}",
                status.as_u16()
            )));
        }
        Err(_) if !status.is_success() => {
            return Err(InfraError::OAuth(format!(
                "token endpoint error: http {}; body={body}",
                status.as_u16()
            )));
        }
        Err(error) => {
            return Err(InfraError::OAuth(format!(
                "invalid token response payload: {error}; body={body}"
            )));
        }
    };

    let access_token = payload
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| InfraError::OAuth("token endpoint response did not include access_token".to_string()))?;

    Ok(OAuthTokenResponse {
        access_token,
        expires_in: payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS).max(0),
        token_type: payload.token_type,
    })
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn exchange_jwt_assertion(
        &self,
        request: JwtBearerRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        let form = [
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("assertion", request.assertion.as_str()),
        ];
        let response = self
            .client
            .post(&request.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|error| InfraError::OAuth(format!("network error while requesting token: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::OAuth(format!("network error while reading token reply: {error}")))?;

        parse_token_reply(status, &body)
    }
}
