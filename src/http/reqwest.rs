//! # Helpers to build a reqwest blocking client
use super::config::HttpConfig;
use reqwest::blocking::Client;
use reqwest::Proxy;

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: `{0}`")]
    ClientBuilder(String),
    #[error("invalid proxy url: `{0}`")]
    InvalidProxy(String),
}

/// Builds a reqwest blocking client according to the provided configuration.
/// Every request carries an explicit timeout and connect timeout; expiry
/// surfaces to the caller as a transport error.
pub fn try_build_reqwest_client(config: HttpConfig) -> Result<Client, HttpBuildError> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .timeout(config.timeout)
        .connect_timeout(config.conn_timeout);

    if let Some(proxy_url) = config.proxy_url {
        let proxy =
            Proxy::all(proxy_url).map_err(|err| HttpBuildError::InvalidProxy(err.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))
}
