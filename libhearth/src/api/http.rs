//! HTTP implementation of the REST boundary
//!
//! Every request carries the session `Cookie` header and the CSRF token
//! taken from the configured cookie, echoed in `X-CSRFToken`.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{Api, ApiResult, ContentPayload};
use crate::config::Config;
use crate::error::ApiError;
use crate::streams::StreamRequest;
use crate::types::{Content, Profile};

const CSRF_HEADER: &str = "X-CSRFToken";

/// Session material extracted from a `Cookie` header line
pub struct Session {
    cookie: SecretString,
    csrf_token: Option<SecretString>,
}

impl Session {
    /// Parse a header line such as `sessionid=abc; csrftoken=xyz`
    pub fn from_cookie_header(header: &str, csrf_cookie: &str) -> Self {
        let csrf_token = header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == csrf_cookie)
            .map(|(_, value)| SecretString::from(value.to_string()));

        Self {
            cookie: SecretString::from(header.trim().to_string()),
            csrf_token,
        }
    }

    pub fn cookie(&self) -> &str {
        self.cookie.expose_secret()
    }

    pub fn has_csrf_token(&self) -> bool {
        self.csrf_token.is_some()
    }
}

/// Structured error body sent by the server on validation failures
#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    detail: Option<String>,
}

pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, session: Option<Session>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Create a client for the configured server, authenticated with
    /// `cookie` when one was read
    pub fn from_config(config: &Config, cookie: Option<&SecretString>) -> Self {
        let session = cookie.map(|cookie| {
            Session::from_cookie_header(cookie.expose_secret(), &config.server.csrf_cookie)
        });
        Self::new(config.server.base_url(), session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL; each segment is percent-encoded on its own and the
    /// path keeps its trailing slash
    fn url<S: AsRef<str>>(&self, segments: &[S]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Network(format!("Invalid server URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("Invalid server URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    fn request<S: AsRef<str>>(&self, method: Method, segments: &[S]) -> ApiResult<RequestBuilder> {
        let mut request = self
            .http
            .request(method, self.url(segments)?)
            .header(ACCEPT, "application/json");

        if let Some(session) = &self.session {
            request = request.header(COOKIE, session.cookie.expose_secret());
            if let Some(token) = &session.csrf_token {
                request = request.header(CSRF_HEADER, token.expose_secret());
            }
        }

        Ok(request)
    }

    fn stream_request(&self, request: &StreamRequest) -> ApiResult<RequestBuilder> {
        Ok(self
            .request(Method::GET, request.segments.as_slice())?
            .query(&request.query()))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = check_status(request.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        check_status(request.send().await?).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %body, "request failed");
    Err(error_from_status(status, &body))
}

fn error_from_status(status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let message = parsed
                .and_then(|b| b.detail.or(b.message))
                .unwrap_or_else(|| "Log in to do that".to_string());
            ApiError::NotAuthenticated(message)
        }
        StatusCode::BAD_REQUEST => match parsed {
            Some(ErrorBody {
                code: Some(code),
                message,
                detail,
            }) => ApiError::Validation {
                code,
                message: message.or(detail).unwrap_or_default(),
            },
            _ => ApiError::Server {
                status: status.as_u16(),
                message: body.to_string(),
            },
        },
        _ => ApiError::Server {
            status: status.as_u16(),
            message: parsed
                .and_then(|b| b.detail.or(b.message))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
        },
    }
}

#[async_trait]
impl Api for HttpApi {
    async fn fetch_stream(&self, request: &StreamRequest) -> ApiResult<Vec<Content>> {
        debug!(path = %request.path(), last_id = ?request.last_id, accept_ids = ?request.accept_ids, "fetching stream");
        let builder = self.stream_request(request)?;
        self.send_json(builder).await
    }

    async fn fetch_content(&self, id: &str) -> ApiResult<Content> {
        let builder = self.request(Method::GET, &["api", "content", id])?;
        self.send_json(builder).await
    }

    async fn fetch_replies(&self, id: &str) -> ApiResult<Vec<Content>> {
        let builder = self.request(Method::GET, &["api", "content", id, "replies"])?;
        self.send_json(builder).await
    }

    async fn fetch_shares(&self, id: &str) -> ApiResult<Vec<Content>> {
        let builder = self.request(Method::GET, &["api", "content", id, "shares"])?;
        self.send_json(builder).await
    }

    async fn share(&self, id: &str) -> ApiResult<()> {
        let builder = self.request(Method::POST, &["api", "content", id, "share"])?;
        self.send_empty(builder).await
    }

    async fn unshare(&self, id: &str) -> ApiResult<()> {
        let builder = self.request(Method::DELETE, &["api", "content", id, "share"])?;
        self.send_empty(builder).await
    }

    async fn fetch_profile(&self, id: &str) -> ApiResult<Profile> {
        let builder = self.request(Method::GET, &["api", "profiles", id])?;
        self.send_json(builder).await
    }

    async fn follow(&self, profile_id: &str) -> ApiResult<()> {
        let builder = self.request(Method::POST, &["api", "profiles", profile_id, "follow"])?;
        self.send_empty(builder).await
    }

    async fn unfollow(&self, profile_id: &str) -> ApiResult<()> {
        let builder = self.request(Method::POST, &["api", "profiles", profile_id, "unfollow"])?;
        self.send_empty(builder).await
    }

    async fn schedule_profile_update(&self, profile_id: &str) -> ApiResult<()> {
        let builder = self.request(
            Method::POST,
            &["api", "profiles", profile_id, "schedule-update"],
        )?;
        self.send_empty(builder).await
    }

    async fn create_content(&self, payload: &ContentPayload) -> ApiResult<Content> {
        let builder = self.request(Method::POST, &["api", "content"])?.json(payload);
        self.send_json(builder).await
    }

    async fn update_content(&self, id: &str, payload: &ContentPayload) -> ApiResult<Content> {
        let builder = self
            .request(Method::PATCH, &["api", "content", id])?
            .json(payload);
        self.send_json(builder).await
    }
}
