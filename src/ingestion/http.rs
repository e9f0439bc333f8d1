//! Blocking retrieval of remote sources.

use std::error::Error as StdError;
use std::io::{self, Read};
use std::time::Duration;

use tracing::debug;

use crate::error::{IngestionError, IngestionResult};

/// A fetched remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// The requested URL.
    pub url: String,
    /// `Content-Type` response header, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub bytes: Vec<u8>,
}

/// Retrieves remote documents.
///
/// Implementations report HTTP status failures and unusable URLs as
/// [`IngestionError::Http`], and proxy failures as [`IngestionError::Proxy`].
pub trait Fetcher {
    fn fetch(&self, url: &str) -> IngestionResult<FetchedDocument>;
}

/// [`Fetcher`] backed by a `ureq` agent.
///
/// When a proxy is configured it is used for plain and TLS requests alike.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(proxy: Option<&str>) -> IngestionResult<Self> {
        let mut builder = ureq::AgentBuilder::new().timeout(Duration::from_secs(60));
        if let Some(proxy) = proxy {
            let proxy = ureq::Proxy::new(proxy).map_err(|e| IngestionError::Proxy {
                message: format!("invalid proxy '{proxy}': {e}"),
            })?;
            builder = builder.proxy(proxy);
        }
        Ok(Self {
            agent: builder.build(),
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> IngestionResult<FetchedDocument> {
        debug!(url, "fetching");
        let response = self.agent.get(url).call().map_err(from_ureq_error)?;
        let content_type = response.header("content-type").map(str::to_owned);

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| from_io_error(url, e))?;
        debug!(url, bytes = bytes.len(), "fetched");

        Ok(FetchedDocument {
            url: url.to_owned(),
            content_type,
            bytes,
        })
    }
}

fn from_ureq_error(err: ureq::Error) -> IngestionError {
    match err {
        ureq::Error::Status(code, response) => IngestionError::Http {
            message: format!(
                "{} returned HTTP {code} {}",
                response.get_url(),
                response.status_text()
            ),
        },
        ureq::Error::Transport(transport) => {
            let proxy_failure = matches!(
                transport.kind(),
                ureq::ErrorKind::InvalidProxyUrl
                    | ureq::ErrorKind::ProxyConnect
                    | ureq::ErrorKind::ProxyUnauthorized
            ) || error_chain_is_connection_aborted(&transport);
            if proxy_failure {
                IngestionError::Proxy {
                    message: transport.to_string(),
                }
            } else {
                IngestionError::Http {
                    message: transport.to_string(),
                }
            }
        }
    }
}

fn from_io_error(url: &str, e: io::Error) -> IngestionError {
    if e.kind() == io::ErrorKind::ConnectionAborted {
        IngestionError::Proxy {
            message: format!("{url}: {e}"),
        }
    } else {
        IngestionError::Http {
            message: format!("{url}: failed to read response: {e}"),
        }
    }
}

fn error_chain_is_connection_aborted(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::ConnectionAborted {
                return true;
            }
        }
        cur = err.source();
    }
    false
}
