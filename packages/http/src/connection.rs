//! Blocking `reqwest` implementation of the connection capability.

use std::io::{self, Read};
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use reqwest::blocking::{Client, Response};
use url::Url;

use remotefs_core::{Connection, ConnectionBuilder};

use crate::error::Error;

/// Opens connections with a shared blocking client.
///
/// The client's timeout bounds every request; the core itself never retries or
/// times out.
#[derive(Debug, Clone)]
pub struct ReqwestConnectionBuilder {
    client: Client,
    default_headers: HeaderMap,
}

impl ReqwestConnectionBuilder {
    /// Create a builder whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self, Error> {
        Self::new(Duration::from_secs(30))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            default_headers: HeaderMap::new(),
        }
    }

    /// Add a header sent with every request. Per-request headers win on
    /// conflict.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let header_name = HeaderName::try_from(name)?;
        let header_value = HeaderValue::try_from(value)?;
        self.default_headers.insert(header_name, header_value);
        Ok(self)
    }
}

impl ConnectionBuilder for ReqwestConnectionBuilder {
    fn build_connection(
        &self,
        url: &Url,
        method: &Method,
        headers: &HeaderMap,
    ) -> remotefs_core::Result<Box<dyn Connection>> {
        let mut request_headers = self.default_headers.clone();
        for (name, value) in headers {
            request_headers.insert(name.clone(), value.clone());
        }
        let response = self
            .client
            .request(method.clone(), url.clone())
            .headers(request_headers)
            .send()
            .map_err(Error::from)?;
        log::debug!("{} {} -> {}", method, url, response.status());
        Ok(Box::new(ReqwestConnection { response }))
    }
}

/// An open response whose body is read on demand.
#[derive(Debug)]
pub struct ReqwestConnection {
    response: Response,
}

impl ReqwestConnection {
    /// The canonical reason phrase of the status.
    pub fn reason(&self) -> &'static str {
        self.response.status().canonical_reason().unwrap_or("Unknown")
    }
}

impl Read for ReqwestConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.response.read(buf)
    }
}

impl Connection for ReqwestConnection {
    fn status(&self) -> StatusCode {
        self.response.status()
    }

    fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    fn disconnect(self: Box<Self>) {
        log::debug!("disconnecting from {}", self.response.url());
    }
}
