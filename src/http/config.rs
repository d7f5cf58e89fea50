use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings used to build the blocking HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub(crate) timeout: Duration,
    pub(crate) conn_timeout: Duration,
    pub(crate) proxy_url: Option<Url>,
}

impl HttpConfig {
    pub fn new(timeout: Duration, conn_timeout: Duration) -> Self {
        Self {
            timeout,
            conn_timeout,
            proxy_url: None,
        }
    }

    pub fn with_proxy(self, proxy_url: Url) -> Self {
        Self {
            proxy_url: Some(proxy_url),
            ..self
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_CONN_TIMEOUT)
    }
}
