//! Retrieval of the key set from the issuer.

use std::{io::Read, time::Duration};

use crate::{KeySet, KeySetError};

/// Default timeout for the key set request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted size of a key set document.
pub const MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// Source of raw key set documents.
///
/// Implemented for [`HttpSource`] and for plain functions / closures taking the document URL,
/// which is handy for tests and for sources other than HTTP.
pub trait KeySetSource {
    /// Retrieves the document located at `url`. Implementations perform a single attempt.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, KeySetError>;
}

impl<F> KeySetSource for F
where
    F: Fn(&str) -> Result<Vec<u8>, KeySetError>,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>, KeySetError> {
        self(url)
    }
}

/// [`KeySetSource`] performing a blocking HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
    max_document_size: usize,
}

impl HttpSource {
    /// Creates a source with the specified request timeout.
    pub fn new(timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| KeySetError::Fetch {
                url: String::new(),
                source: anyhow::Error::new(err).context("cannot create HTTP client"),
            })?;

        Ok(Self {
            client,
            max_document_size: MAX_DOCUMENT_SIZE,
        })
    }

    /// Sets the maximum accepted document size in bytes.
    #[must_use]
    pub fn with_max_document_size(mut self, max_document_size: usize) -> Self {
        self.max_document_size = max_document_size;
        self
    }
}

impl KeySetSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, KeySetError> {
        let fetch_error = |err: reqwest::Error| KeySetError::Fetch {
            url: url.to_owned(),
            source: err.into(),
        };

        let response = self.client.get(url).send().map_err(fetch_error)?;
        let status = response.status();
        tracing::debug!(url, %status, "received key set response");
        if !status.is_success() {
            return Err(KeySetError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let too_large = || KeySetError::ResponseTooLarge {
            url: url.to_owned(),
            limit: self.max_document_size,
        };
        if let Some(len) = response.content_length() {
            if len > self.max_document_size as u64 {
                return Err(too_large());
            }
        }

        let mut body = Vec::new();
        response
            .take(self.max_document_size as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|err| KeySetError::Fetch {
                url: url.to_owned(),
                source: err.into(),
            })?;
        if body.len() > self.max_document_size {
            return Err(too_large());
        }
        Ok(body)
    }
}

/// Retrieves a JWKS document and decodes it into a [`KeySet`].
#[derive(Debug, Clone)]
pub struct KeyResolver<S> {
    source: S,
}

impl<S: KeySetSource> KeyResolver<S> {
    /// Creates a resolver over the specified source.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Fetches the document at `url` and decodes it. There are no retries.
    pub fn fetch(&self, url: &str) -> Result<KeySet, KeySetError> {
        let document = self.source.fetch(url)?;
        let key_set = KeySet::from_slice(&document)?;
        tracing::debug!(url, keys = key_set.len(), "decoded key set");
        Ok(key_set)
    }
}

impl KeyResolver<HttpSource> {
    /// Creates a resolver performing HTTP requests with the specified timeout.
    pub fn http(timeout: Duration) -> Result<Self, KeySetError> {
        HttpSource::new(timeout).map(Self::new)
    }
}
