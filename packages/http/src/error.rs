use remotefs_core::Error as CoreError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("Malformed directory listing at {url}: {message}")]
    Listing { url: String, message: String },
}

impl From<Error> for CoreError {
    fn from(error: Error) -> Self {
        match &error {
            Error::Http(e) => CoreError::IoFailure {
                status: e.status().map(|status| status.as_u16()),
                message: error.to_string(),
            },
            _ => CoreError::io_failure(error.to_string()),
        }
    }
}
