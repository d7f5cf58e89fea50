//! # Vendor gateway client
//!
//! Request building, authentication and response envelope handling shared by
//! every client in this crate. The vendor wraps success bodies in
//! `{"response": ...}` and error bodies in `{"errors": [...]}`.
use crate::api::error::ApiError;
use crate::config::ApiCredentials;
use http::header::ACCEPT;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

/// Header carrying the vendor API key.
const API_KEY_HEADER: &str = "x-api-key";
/// Path prefix of every account-scoped endpoint, relative to the base url.
const GATEWAY_PREFIX: &str = "gateway/lw/api/accounts";

/// Envelope wrapping every successful vendor response body.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

/// Blocking client for the vendor gateway, carrying the credentials and the
/// account-scoped base endpoint. Cheap to clone; the underlying connection
/// pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credentials: ApiCredentials,
}

impl ApiClient {
    pub fn new(client: Client, base_url: Url, credentials: ApiCredentials) -> Self {
        Self {
            client,
            base_url,
            credentials,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.credentials.account_id
    }

    /// Issues a POST with a JSON body to the account-scoped `path`.
    pub fn post<B, T>(
        &self,
        path: &str,
        extra_params: &[(&str, String)],
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "issuing POST to vendor gateway");
        let res = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .header(ACCEPT, "*/*")
            .query(&self.request_params(extra_params))
            .json(body)
            .send()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        handle_response(res)
    }

    /// Issues a GET to the account-scoped `path`.
    pub fn get<T>(&self, path: &str, extra_params: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "issuing GET to vendor gateway");
        let res = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .header(ACCEPT, "*/*")
            .query(&self.request_params(extra_params))
            .send()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        handle_response(res)
    }

    /// Builds the account-scoped endpoint for `path`.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            GATEWAY_PREFIX,
            self.credentials.account_id,
            path
        );
        Url::parse(&url).map_err(|err| ApiError::InvalidUrl(err.to_string()))
    }

    /// Builds the query parameters for one request: the account routing
    /// parameters present on every call plus the call-specific extras. A new
    /// set is constructed per request; nothing is shared or mutated.
    fn request_params(&self, extra: &[(&str, String)]) -> Vec<(String, String)> {
        let mut params = vec![
            ("routingId".to_string(), self.credentials.account_id.clone()),
            (
                "accountIdentifier".to_string(),
                self.credentials.account_id.clone(),
            ),
        ];
        params.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));
        params
    }
}

/// Decodes a response according to the vendor conventions: 2xx bodies are
/// deserialized as `T`; non-2xx bodies are expected to carry an `errors`
/// field, which is logged and surfaced as [ApiError::Api]. A non-2xx body
/// that is not JSON at all surfaces the original HTTP status instead.
fn handle_response<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
    let status = res.status();
    let body = res
        .bytes()
        .map_err(|err| ApiError::Transport(err.to_string()))?;

    if !status.is_success() {
        let Ok(parsed) = serde_json::from_slice::<serde_json::Value>(&body) else {
            return Err(ApiError::UnexpectedStatus(status));
        };
        let messages = error_messages(&parsed);
        error!(%status, errors = messages.join(", "), "vendor api call failed");
        return Err(ApiError::Api { status, messages });
    }

    serde_json::from_slice(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
}

/// Extracts the vendor error messages, falling back to the whole body when
/// the `errors` field is absent.
fn error_messages(body: &serde_json::Value) -> Vec<String> {
    match body.get("errors").and_then(|errors| errors.as_array()) {
        Some(errors) => errors.iter().map(display_value).collect(),
        None => vec![display_value(body)],
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
