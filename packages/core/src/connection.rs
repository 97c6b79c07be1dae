//! The connection capability consumed by the core.
//!
//! The core never opens sockets. It asks a [`ConnectionBuilder`] for an open
//! [`Connection`] to a URL and reads the response body through `std::io::Read`.

use std::io::Read;

use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use http::{Method, StatusCode};
use url::Url;

use crate::error::{Error, Result};

/// An open response to a single request.
pub trait Connection: Read + Send {
    /// Response status code.
    fn status(&self) -> StatusCode;

    /// Response headers.
    fn headers(&self) -> &HeaderMap;

    /// Tear down the underlying transport.
    ///
    /// Dropping a connection must have the same effect; this exists so callers
    /// can make the teardown explicit.
    fn disconnect(self: Box<Self>) {}

    /// The declared `Content-Length`, if present and well formed.
    fn content_length(&self) -> Option<u64> {
        header_u64(self.headers(), &CONTENT_LENGTH)
    }
}

/// Builds connected handles for the core.
///
/// Implementations own timeouts, credentials and proxies.
pub trait ConnectionBuilder: Send + Sync {
    fn build_connection(
        &self,
        url: &Url,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Box<dyn Connection>>;
}

/// Value for a `Range` header: `bytes=<start>-` or `bytes=<start>-<end>`.
pub fn range_value(start: u64, end_inclusive: Option<u64>) -> HeaderValue {
    let value = match end_inclusive {
        Some(end) => format!("bytes={}-{}", start, end),
        None => format!("bytes={}-", start),
    };
    // Digits, '=' and '-' are always valid header bytes.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("bytes=0-"))
}

/// Build a header map from configured string pairs.
pub fn header_map<'a, I>(pairs: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|e| Error::io_failure(format!("invalid header name '{}': {}", name, e)))?;
        let header_value = HeaderValue::try_from(value.as_str())
            .map_err(|e| Error::io_failure(format!("invalid value for header '{}': {}", name, e)))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Open a connection with an extra `Range` header and require a success status.
///
/// On a non-success status the connection is torn down before the error is
/// returned.
pub fn open_ranged(
    builder: &dyn ConnectionBuilder,
    url: &Url,
    base_headers: &HeaderMap,
    start: u64,
    end_inclusive: Option<u64>,
) -> Result<Box<dyn Connection>> {
    let mut headers = base_headers.clone();
    headers.insert(RANGE, range_value(start, end_inclusive));
    open_checked(builder, url, &Method::GET, &headers)
}

/// Open a connection and require a 2xx status.
pub fn open_checked(
    builder: &dyn ConnectionBuilder,
    url: &Url,
    method: &Method,
    headers: &HeaderMap,
) -> Result<Box<dyn Connection>> {
    let connection = builder.build_connection(url, method, headers)?;
    let status = connection.status();
    if status.is_success() {
        return Ok(connection);
    }
    connection.disconnect();
    Err(Error::http_status(
        status.as_u16(),
        format!(
            "{}: response code {}: {}",
            url,
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        ),
    ))
}

/// Total resource length from a `Content-Range: bytes a-b/N` header.
pub fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

fn header_u64(headers: &HeaderMap, name: &HeaderName) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
