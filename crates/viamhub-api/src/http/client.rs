// Gateway HTTP client
//
// Wraps `reqwest::Client` with bearer-token auth, endpoint construction
// relative to the device base URL, and status → error mapping. The
// component clients in `components.rs` share one `GatewayClient` per
// session through an `Arc`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::device::{Credentials, DeviceSession, DeviceTransport, Motor, ResourceName, Sensor};
use crate::error::Error;
use crate::http::components::{HttpMotor, HttpSensor};
use crate::transport::{TransportConfig, base_url};

/// Longest slice of an error body kept in `Error::Api`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct AuthRequest<'a> {
    api_key_id: &'a str,
    api_key: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ResourcesResponse {
    #[serde(default)]
    resources: Vec<ResourceName>,
}

// ── Transport ────────────────────────────────────────────────────────

/// Connects to robots exposed through the JSON/HTTP gateway.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    config: TransportConfig,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn DeviceSession>, Error> {
        let http = self.config.build_client()?;
        let base = base_url(address)?;
        let url = base.join("api/v1/auth")?;

        debug!("POST {}", url);
        let resp = http
            .post(url)
            .json(&AuthRequest {
                api_key_id: &credentials.api_key_id,
                api_key: credentials.api_key.expose_secret(),
            })
            .send()
            .await?;

        let body = read_success_body(resp).await?;
        let auth: AuthResponse = decode(&body)?;

        info!(address = %base, "gateway session established");
        Ok(Arc::new(HttpSession {
            client: Arc::new(GatewayClient {
                http,
                base_url: base,
                token: SecretString::from(auth.access_token),
                closed: AtomicBool::new(false),
            }),
        }))
    }
}

// ── Raw client ───────────────────────────────────────────────────────

pub(crate) struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
    closed: AtomicBool,
}

impl GatewayClient {
    /// `{base}/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String, Error> {
        let url = self.endpoint(segments)?;
        debug!("{} {}", method, url);

        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(self.token.expose_secret());
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        read_success_body(resp).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, Error> {
        self.ensure_open()?;
        let body = self.send::<()>(Method::GET, segments, None).await?;
        decode(&body)
    }

    pub(crate) async fn get_unit(&self, segments: &[&str]) -> Result<(), Error> {
        self.ensure_open()?;
        self.send::<()>(Method::GET, segments, None).await?;
        Ok(())
    }

    pub(crate) async fn post_unit<B: Serialize + Sync + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        self.send(Method::POST, segments, Some(body)).await?;
        Ok(())
    }
}

/// Map the response status onto the crate error type and return the
/// body text on success.
pub(crate) async fn read_success_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let path = resp.url().path().to_owned();
    let body = resp.text().await?;

    match status {
        s if s.is_success() => Ok(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Authentication {
            message: format!("HTTP {} on {path}", status.as_u16()),
        }),
        StatusCode::NOT_FOUND => Err(Error::NotFound { name: path }),
        _ => Err(Error::Api {
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        }),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

// ── Session ──────────────────────────────────────────────────────────

/// A live, token-authenticated gateway session.
pub struct HttpSession {
    client: Arc<GatewayClient>,
}

#[async_trait]
impl DeviceSession for HttpSession {
    async fn probe(&self) -> Result<(), Error> {
        self.client.get_unit(&["api", "v1", "version"]).await
    }

    async fn list_resources(&self) -> Result<Vec<ResourceName>, Error> {
        let resp: ResourcesResponse = self.client.get_json(&["api", "v1", "resources"]).await?;
        Ok(resp.resources)
    }

    fn as_motor(&self, resource: &ResourceName) -> Arc<dyn Motor> {
        Arc::new(HttpMotor::new(Arc::clone(&self.client), &resource.name))
    }

    fn as_sensor(&self, resource: &ResourceName) -> Arc<dyn Sensor> {
        Arc::new(HttpSensor::new(Arc::clone(&self.client), &resource.name))
    }

    async fn close(&self) -> Result<(), Error> {
        if self.client.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.client
            .send::<()>(Method::POST, &["api", "v1", "auth", "logout"], None)
            .await?;
        debug!("gateway session closed");
        Ok(())
    }
}
