//! HTTP session fetcher using `reqwest`.

use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use sessync_protocol::{
    ApiEnvelope, Codec, JsonCodec, LoginData, LoginRequest, LoginResponse, ProtocolError,
    SessionInfo, UserSession, decode_api,
};

use crate::{FetchError, FetchOutcome, SessionFetcher};

/// Paths of the backend endpoints, relative to the base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub current_user: String,
    pub session_info: String,
    pub logout: String,
    pub clear_session: String,
    pub login: String,
    pub confirm_duplicate_login: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            current_user: "/api/auth/current-user".into(),
            session_info: "/api/auth/session-info".into(),
            logout: "/api/auth/logout".into(),
            clear_session: "/api/auth/clear-session".into(),
            login: "/api/auth/login".into(),
            confirm_duplicate_login: "/api/auth/confirm-duplicate-login".into(),
        }
    }
}

/// A [`SessionFetcher`] that talks to the backend over HTTP.
///
/// The default client keeps a cookie store, so the session cookie set by
/// login is sent on every later call (the browser's
/// `credentials: include`).
pub struct HttpFetcher<C: Codec = JsonCodec> {
    http: reqwest::Client,
    base: Url,
    endpoints: Endpoints,
    codec: C,
}

impl HttpFetcher<JsonCodec> {
    /// Creates a fetcher for the backend at `base_url`.
    ///
    /// # Errors
    /// - [`FetchError::InvalidUrl`] if `base_url` doesn't parse
    /// - [`FetchError::Http`] if the HTTP client can't be built
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let base: Url = base_url
            .parse()
            .map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base,
            endpoints: Endpoints::default(),
            codec: JsonCodec,
        })
    }
}

impl<C: Codec> HttpFetcher<C> {
    /// Replaces the HTTP client (custom timeouts, proxies, shared cookie
    /// jar).
    #[must_use]
    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Overrides the endpoint paths.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Swaps the body codec.
    pub fn with_codec<D: Codec>(self, codec: D) -> HttpFetcher<D> {
        HttpFetcher {
            http: self.http,
            base: self.base,
            endpoints: self.endpoints,
            codec,
        }
    }

    /// The base URL every endpoint path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|e| FetchError::InvalidUrl(format!("{path}: {e}")))
    }

    /// POSTs with no body and only checks the status.
    async fn post_empty(&self, path: &str) -> Result<(), FetchError> {
        let response = self.http.post(self.url(path)?).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(FetchError::Status(status.as_u16()))
        }
    }

    async fn post_login(
        &self,
        path: &str,
        request: &LoginRequest,
    ) -> Result<LoginResponse, FetchError> {
        let body = self.codec.encode(request)?;
        let response = self
            .http
            .post(self.url(path)?)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        // The backend reports bad credentials as a 4xx with an envelope;
        // that is still a usable answer.
        match self.codec.decode::<ApiEnvelope<LoginData>>(&bytes) {
            Ok(envelope) => Ok(LoginResponse::from_envelope(envelope)),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(FetchError::Status(status.as_u16())),
        }
    }
}

impl<C: Codec> SessionFetcher for HttpFetcher<C> {
    async fn current_user(&self) -> Result<FetchOutcome, FetchError> {
        let response = self.http.get(self.url(&self.endpoints.current_user)?).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Ok(FetchOutcome::Unauthenticated);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let user: UserSession = decode_api(&self.codec, &bytes)?;
        if !user.is_identified() {
            return Err(ProtocolError::InvalidMessage(
                "current-user body names no principal".into(),
            )
            .into());
        }
        tracing::trace!(user_id = ?user.id, "current-user fetched");
        Ok(FetchOutcome::Authenticated(user))
    }

    async fn session_info(&self) -> Result<Option<SessionInfo>, FetchError> {
        let response = self.http.get(self.url(&self.endpoints.session_info)?).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode_api(&self.codec, &bytes)?))
    }

    async fn logout(&self) -> Result<(), FetchError> {
        self.post_empty(&self.endpoints.logout).await
    }

    async fn clear_session(&self) -> Result<(), FetchError> {
        self.post_empty(&self.endpoints.clear_session).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, FetchError> {
        self.post_login(&self.endpoints.login, request).await
    }

    async fn confirm_duplicate_login(
        &self,
        request: &LoginRequest,
    ) -> Result<LoginResponse, FetchError> {
        self.post_login(&self.endpoints.confirm_duplicate_login, request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let result = HttpFetcher::new("not a url");
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn test_url_joins_endpoint_paths_onto_base() {
        let fetcher = HttpFetcher::new("http://localhost:8080/").unwrap();
        let url = fetcher.url(&fetcher.endpoints.current_user).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/auth/current-user");
    }

    #[test]
    fn test_with_endpoints_overrides_paths() {
        let fetcher = HttpFetcher::new("http://localhost:8080").unwrap().with_endpoints(Endpoints {
            current_user: "/v2/me".into(),
            ..Endpoints::default()
        });
        let url = fetcher.url(&fetcher.endpoints.current_user).unwrap();
        assert_eq!(url.path(), "/v2/me");
    }
}
