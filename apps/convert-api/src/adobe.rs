//! Adobe PDF Services client
//!
//! [`ConversionClient`] implementation over the Adobe PDF Services REST API:
//! server-to-server OAuth token, asset upload, export-PDF job submission,
//! result polling and content download. Provider failures are classified
//! transient/permanent here, at the call boundary, from the response text.
//!
//! Because every call is a plain async HTTP request, the orchestrator's
//! per-call timeout genuinely cancels an in-flight request when it drops the
//! future; there is no lingering worker thread.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::LOCATION;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use convert_core::{
    client::provider_error, AssetRef, BatchError, ConversionClient, JobLocation, ResultRef,
};

const DEFAULT_BASE_URL: &str = "https://pdf-services.adobe.io";
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Server-to-server credentials, required at startup.
#[derive(Clone)]
pub struct AdobeCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl AdobeCredentials {
    /// Read `PDF_SERVICES_CLIENT_ID` / `PDF_SERVICES_CLIENT_SECRET`.
    /// Missing credentials are a fatal startup error, not a request-time one.
    pub fn from_env() -> anyhow::Result<Self> {
        let client_id = std::env::var("PDF_SERVICES_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("PDF_SERVICES_CLIENT_ID not set"))?;
        let client_secret = std::env::var("PDF_SERVICES_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("PDF_SERVICES_CLIENT_SECRET not set"))?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct AdobeClient {
    http: reqwest::Client,
    credentials: AdobeCredentials,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssetResponse {
    upload_uri: String,
    #[serde(rename = "assetID")]
    asset_id: String,
}

#[derive(Deserialize)]
struct PollResponse {
    status: String,
    asset: Option<PollAsset>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollAsset {
    download_uri: String,
}

impl AdobeClient {
    pub fn new(credentials: AdobeCredentials) -> Self {
        Self::with_base_url(credentials, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(credentials: AdobeCredentials, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            base_url,
            token: Mutex::new(None),
        }
    }

    /// Current access token, refreshed when close to expiry.
    async fn access_token(&self) -> Result<String, BatchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_EXPIRY_SLACK {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| provider_error(format!("token request failed: {e}")))?;
        let response = Self::check(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("invalid token response: {e}")))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    /// Surface non-success responses as classified provider errors; the body
    /// text is what carries the transient signature.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BatchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(provider_error(format!("provider returned {status}: {body}")))
    }
}

#[async_trait]
impl ConversionClient for AdobeClient {
    async fn upload(&self, bytes: &[u8]) -> Result<AssetRef, BatchError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(format!("{}/assets", self.base_url))
            .bearer_auth(&token)
            .header("x-api-key", &self.credentials.client_id)
            .json(&json!({ "mediaType": "application/pdf" }))
            .send()
            .await
            .map_err(|e| provider_error(format!("asset creation failed: {e}")))?;
        let response = Self::check(response).await?;
        let asset: CreateAssetResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("invalid asset response: {e}")))?;

        let response = self
            .http
            .put(&asset.upload_uri)
            .header("Content-Type", "application/pdf")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| provider_error(format!("asset upload failed: {e}")))?;
        Self::check(response).await?;

        debug!(asset_id = %asset.asset_id, "uploaded asset");
        Ok(AssetRef(asset.asset_id))
    }

    async fn submit(&self, asset: &AssetRef) -> Result<JobLocation, BatchError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(format!("{}/operation/exportpdf", self.base_url))
            .bearer_auth(&token)
            .header("x-api-key", &self.credentials.client_id)
            .json(&json!({ "assetID": asset.0, "targetFormat": "docx" }))
            .send()
            .await
            .map_err(|e| provider_error(format!("job submission failed: {e}")))?;
        let response = Self::check(response).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| provider_error("job submission returned no Location header"))?;
        Ok(JobLocation(location))
    }

    async fn poll_result(&self, location: &JobLocation) -> Result<ResultRef, BatchError> {
        // The loop itself has no deadline; the orchestrator bounds the whole
        // call with its per-call budget and drops it on expiry.
        loop {
            let token = self.access_token().await?;
            let response = self
                .http
                .get(&location.0)
                .bearer_auth(&token)
                .header("x-api-key", &self.credentials.client_id)
                .send()
                .await
                .map_err(|e| provider_error(format!("status poll failed: {e}")))?;
            let response = Self::check(response).await?;
            let poll: PollResponse = response
                .json()
                .await
                .map_err(|e| provider_error(format!("invalid status response: {e}")))?;

            match poll.status.as_str() {
                "done" => {
                    let asset = poll
                        .asset
                        .ok_or_else(|| provider_error("finished job carries no asset"))?;
                    return Ok(ResultRef(asset.download_uri));
                }
                "failed" => {
                    let detail = poll
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no detail".to_string());
                    return Err(provider_error(format!("conversion failed: {detail}")));
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    async fn fetch_content(&self, result: &ResultRef) -> Result<Vec<u8>, BatchError> {
        let response = self
            .http
            .get(&result.0)
            .send()
            .await
            .map_err(|e| provider_error(format!("content download failed: {e}")))?;
        let response = Self::check(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| provider_error(format!("content read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
