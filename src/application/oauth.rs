use crate::application::NowProvider;
use crate::domain::models::OAuthToken;
use crate::infrastructure::credential_store::{CredentialStore, ServiceAccountKey};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{JwtBearerRequest, OAuthHttpClient, OAuthTokenResponse};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

pub trait AssertionSigner: Send + Sync {
    fn sign(&self, claims: &AssertionClaims) -> Result<String, InfraError>;
}

pub struct Rs256AssertionSigner {
    key: EncodingKey,
    key_id: Option<String>,
}

impl Rs256AssertionSigner {
    pub fn from_key(key: &ServiceAccountKey) -> Result<Self, InfraError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|error| {
            InfraError::Credential(format!("invalid service account private key: {error}"))
        })?;
        Ok(Self {
            key: encoding_key,
            key_id: key.private_key_id.clone(),
        })
    }
}

impl AssertionSigner for Rs256AssertionSigner {
    fn sign(&self, claims: &AssertionClaims) -> Result<String, InfraError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        jsonwebtoken::encode(&header, claims, &self.key)
            .map_err(|error| InfraError::Credential(format!("failed signing token assertion: {error}")))
    }
}

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, InfraError>;
    /// Drops any cached token so the next call mints a fresh one.
    fn invalidate(&self) -> Result<(), InfraError>;
    fn service_account_email(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Minted(OAuthToken),
}

impl EnsureTokenResult {
    pub fn into_token(self) -> OAuthToken {
        match self {
            Self::Existing(token) | Self::Minted(token) => token,
        }
    }
}

/// Mints Sheets access tokens from a service-account key and caches them until shortly before expiry.
pub struct ServiceAccountAuthenticator<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    client_email: String,
    token_uri: String,
    signer: Arc<dyn AssertionSigner>,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> ServiceAccountAuthenticator<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(
        key: &ServiceAccountKey,
        signer: Arc<dyn AssertionSigner>,
        credential_store: Arc<S>,
        oauth_client: Arc<C>,
    ) -> Self {
        Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            signer,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_token_valid(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS)
    }

    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        if let Some(stored_token) = self.credential_store.load_token()? {
            if self.is_token_valid(&stored_token) {
                return Ok(EnsureTokenResult::Existing(stored_token));
            }
        }

        let now = (self.now_provider)();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECONDS)).timestamp(),
        };
        let assertion = self.signer.sign(&claims)?;
        let response = self
            .oauth_client
            .exchange_jwt_assertion(JwtBearerRequest {
                token_endpoint: self.token_uri.clone(),
                assertion,
            })
            .await?;

        let token = self.token_from_response(response);
        self.credential_store.save_token(&token)?;
        Ok(EnsureTokenResult::Minted(token))
    }

    pub fn clear_stored_token(&self) -> Result<(), InfraError> {
        self.credential_store.delete_token()
    }

    fn token_from_response(&self, response: OAuthTokenResponse) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
        }
    }
}

#[async_trait]
impl<S, C> AccessTokenProvider for ServiceAccountAuthenticator<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    async fn access_token(&self) -> Result<String, InfraError> {
        Ok(self.ensure_access_token().await?.into_token().access_token)
    }

    fn invalidate(&self) -> Result<(), InfraError> {
        self.clear_stored_token()
    }

    fn service_account_email(&self) -> &str {
        &self.client_email
    }
}
