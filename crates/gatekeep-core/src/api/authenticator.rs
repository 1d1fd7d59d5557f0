use reqwest::{header, RequestBuilder, Response};
use tracing::warn;

use super::ApiError;
use crate::auth::SessionReader;

/// Request/response transform pair applied to every gateway call.
///
/// The credential comes from the session manager's published state, not the
/// credential store, so there is only one source of truth. The authenticator
/// never writes session state.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    session: SessionReader,
}

impl RequestAuthenticator {
    pub fn new(session: SessionReader) -> Self {
        Self { session }
    }

    /// Authorization header for the current credential, empty when signed out
    pub fn auth_headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.session.credential() {
            match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("Credential is not a valid header value, sending unauthenticated"),
            }
        }
        headers
    }

    /// Attach the current credential to a request
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.headers(self.auth_headers())
    }

    /// Authorize, send, and normalize the outcome
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        Self::check_response(response).await
    }

    /// Check if response is successful, normalizing it to `ApiError` if not
    pub async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_response(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use tokio::sync::watch;

    fn authenticator(credential: Option<&str>) -> (watch::Sender<Session>, RequestAuthenticator) {
        let (tx, rx) = watch::channel(Session::restored(credential.map(str::to_string)));
        (tx, RequestAuthenticator::new(SessionReader::new(rx)))
    }

    #[test]
    fn test_attaches_bearer_when_signed_in() {
        let (_tx, auth) = authenticator(Some("abc123"));
        let request = auth
            .authorize(reqwest::Client::new().get("http://localhost/auth/me"))
            .build()
            .unwrap();

        let value = request.headers().get(header::AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer abc123");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_no_header_when_signed_out() {
        let (_tx, auth) = authenticator(None);
        let request = auth
            .authorize(reqwest::Client::new().get("http://localhost/auth/me"))
            .build()
            .unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_follows_session_changes() {
        let (tx, auth) = authenticator(Some("abc123"));
        assert!(!auth.auth_headers().is_empty());

        tx.send_modify(|s| s.invalidated());
        assert!(auth.auth_headers().is_empty());
    }

    #[test]
    fn test_invalid_credential_is_skipped() {
        let (_tx, auth) = authenticator(Some("bad\ntoken"));
        assert!(auth.auth_headers().is_empty());
    }
}
