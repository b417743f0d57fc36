use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// Errors raised while fetching token content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport failure.
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status.
    #[error("{uri} answered with status {status}")]
    Status {
        /// Requested URI.
        uri: String,
        /// HTTP status code.
        status: u16,
    },
    /// URI scheme is neither http(s) nor data.
    #[error("unsupported uri scheme in {0:?}")]
    UnsupportedScheme(String),
    /// `data:` URI could not be decoded.
    #[error("malformed data uri: {0}")]
    MalformedDataUri(String),
}

/// Retrieves the raw bytes behind a URI.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the content at `uri`.
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher for `http://`, `https://` and `data:` URIs.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }
}

fn scheme(uri: &str) -> Option<String> {
    uri.split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        match scheme(uri).as_deref() {
            Some("data") => decode_data_uri(uri),
            Some("http") | Some("https") => {
                debug!(uri, "fetching token content");
                let response = self.client.get(uri).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        uri: uri.to_string(),
                        status: status.as_u16(),
                    });
                }
                Ok(response.bytes().await?.to_vec())
            }
            _ => Err(FetchError::UnsupportedScheme(uri.to_string())),
        }
    }
}

/// Decode an RFC 2397 `data:` URI (base64 or percent-encoded payload).
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, FetchError> {
    let malformed = |why: &str| FetchError::MalformedDataUri(why.to_string());
    let rest = uri
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("data:"))
        .map(|_| &uri[5..])
        .ok_or_else(|| malformed("missing data: prefix"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| malformed("missing ',' separator"))?;
    if meta
        .rsplit(';')
        .next()
        .is_some_and(|param| param.eq_ignore_ascii_case("base64"))
    {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        return STANDARD
            .decode(compact)
            .map_err(|err| malformed(&err.to_string()));
    }
    percent_decode(payload).ok_or_else(|| malformed("bad percent escape"))
}

fn percent_decode(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = char::from(*bytes.get(i + 1)?).to_digit(16)?;
            let lo = char::from(*bytes.get(i + 2)?).to_digit(16)?;
            out.push((hi * 16 + lo) as u8);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_payload() {
        let uri = "data:application/json;base64,eyJydWxlIjozMH0=";
        assert_eq!(decode_data_uri(uri).unwrap(), br#"{"rule":30}"#);
    }

    #[test]
    fn decodes_percent_payload() {
        let uri = "data:image/svg+xml;utf8,%3Csvg%3E%3C%2Fsvg%3E";
        assert_eq!(decode_data_uri(uri).unwrap(), b"<svg></svg>");
        assert_eq!(decode_data_uri("DATA:,plain").unwrap(), b"plain");
    }

    #[test]
    fn rejects_malformed_data_uris() {
        for uri in [
            "data:text/plain",
            "data:,%zz",
            "data:,%4",
            "data:;base64,@@@",
            "text/plain,abc",
        ] {
            assert!(
                matches!(decode_data_uri(uri), Err(FetchError::MalformedDataUri(_))),
                "{uri} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn unsupported_schemes_are_reported() {
        let fetcher = HttpFetcher::new();
        let err = fetcher.fetch("ipfs://bafy/1.json").await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(_)));
        let err = fetcher.fetch("no-scheme").await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn data_uris_skip_the_network() {
        let fetcher = HttpFetcher::new();
        let body = fetcher.fetch("data:text/plain;base64,cnVsZSAzMA==").await.unwrap();
        assert_eq!(body, b"rule 30");
    }
}
