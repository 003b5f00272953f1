//! Reqwest-based client for the Qiniu certificate and domain API
//!
//! Requests are authorized with a QBox token: the URL-safe base64 HMAC-SHA1 of
//! `<path>[?<query>]\n` keyed by the secret key. JSON bodies are not signed.

use std::time::Duration;

use base64::Engine as _;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::RemoteCdnConfig;
use crate::traits::{CdnApi, CdnError, NewCertificate, RemoteCertificate};

type HmacSha1 = Hmac<sha1::Sha1>;

const TIMEOUT_SECONDS: u64 = 30;
const PAGE_LIMIT: usize = 100;

#[derive(Deserialize)]
struct CertListResponse {
    #[serde(default)]
    marker: String,
    #[serde(default)]
    certs: Vec<CertSummary>,
}

#[derive(Deserialize)]
struct CertSummary {
    certid: String,
}

#[derive(Deserialize)]
struct CertResponse {
    cert: RemoteCertificate,
}

#[derive(Deserialize)]
struct AddCertResponse {
    #[serde(rename = "certID")]
    cert_id: String,
}

pub struct QiniuCdnClient {
    client: Client,
    api_base: Url,
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for QiniuCdnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QiniuCdnClient")
            .field("api_base", &self.api_base.as_str())
            .field("access_key", &self.access_key)
            .field("secret_key", &"<REDACTED>")
            .finish()
    }
}

impl QiniuCdnClient {
    pub fn new(config: &RemoteCdnConfig) -> Result<Self, CdnError> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| CdnError::Configuration(format!("invalid api_base {}: {}", config.api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(CdnError::Configuration(format!(
                "api_base {} cannot carry a path",
                config.api_base
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()
            .map_err(|e| CdnError::Network(e.to_string()))?;

        tracing::debug!(api_base = %api_base, "Initialized CDN client with {}s timeout", TIMEOUT_SECONDS);
        Ok(Self {
            client,
            api_base,
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Endpoint URL under `api_base`, keeping its path and escaping each segment
    fn url(&self, segments: &[&str]) -> Result<Url, CdnError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| CdnError::Configuration(format!("api_base {} cannot carry a path", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// QBox authorization header value for a request to `url`
    fn authorization(&self, url: &Url) -> Result<String, CdnError> {
        let mut signing = url.path().to_string();
        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            signing.push('?');
            signing.push_str(query);
        }
        signing.push('\n');

        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| CdnError::Configuration(format!("cannot sign request: {}", e)))?;
        mac.update(signing.as_bytes());
        let signature = base64::engine::general_purpose::URL_SAFE.encode(mac.finalize().into_bytes());

        Ok(format!("QBox {}:{}", self.access_key, signature))
    }

    /// Send a signed request and return the raw body of a 2xx response
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<String, CdnError> {
        tracing::debug!(method = %method, url = %url, "CDN API request");

        let mut request = self
            .client
            .request(method, url.clone())
            .header("Authorization", self.authorization(&url)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CdnError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CdnError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(CdnError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T, CdnError> {
        let text = self.send(method, url, body).await?;
        serde_json::from_str(&text).map_err(|e| CdnError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl CdnApi for QiniuCdnClient {
    async fn list_certificates(&self) -> Result<Vec<String>, CdnError> {
        let mut ids = Vec::new();
        let mut marker = String::new();

        loop {
            let mut url = self.url(&["sslcert"])?;
            url.query_pairs_mut()
                .append_pair("marker", &marker)
                .append_pair("limit", &PAGE_LIMIT.to_string());

            let page: CertListResponse = self.send_json(Method::GET, url, None).await?;
            ids.extend(page.certs.into_iter().map(|c| c.certid));

            if page.marker.is_empty() || page.marker == marker {
                break;
            }
            marker = page.marker;
        }

        Ok(ids)
    }

    async fn get_certificate(&self, id: &str) -> Result<RemoteCertificate, CdnError> {
        let url = self.url(&["sslcert", id])?;
        let response: CertResponse = self.send_json(Method::GET, url, None).await?;
        Ok(response.cert)
    }

    async fn add_certificate(&self, cert: &NewCertificate) -> Result<String, CdnError> {
        let url = self.url(&["sslcert"])?;
        let body = serde_json::to_value(cert).map_err(|e| CdnError::Decode(e.to_string()))?;
        let response: AddCertResponse = self.send_json(Method::POST, url, Some(&body)).await?;
        if response.cert_id.is_empty() {
            return Err(CdnError::InvalidResponse("empty certID in upload response".to_string()));
        }
        Ok(response.cert_id)
    }

    async fn bind_certificate(&self, domain: &str, cert_id: &str, force_https: bool) -> Result<(), CdnError> {
        let url = self.url(&["domain", domain, "httpsconf"])?;
        let body = serde_json::json!({
            "certid": cert_id,
            "forceHttps": force_https,
        });
        self.send(Method::PUT, url, Some(&body)).await?;
        Ok(())
    }
}
