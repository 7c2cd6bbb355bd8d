use thiserror::Error;

/// Failures of the scrape / store pipeline.
///
/// `Network`, `HttpStatus` and `Decode` come from the fetch step, `InvalidSelector` and
/// `MissingContainer` from extraction. `Store` only reaches callers from
/// `storage::select_page`; the write path logs and swallows it.
#[derive(Debug, Error)]
pub enum GrabError {
    #[error("Network: request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Network: {url} answered with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Network: body from {url} is not valid {charset}")]
    Decode { url: String, charset: String },

    #[error("HTTP client setup failed: {source}")]
    ClientSetup {
        #[source]
        source: reqwest::Error,
    },

    #[error("Parse: invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Parse: no element matches '{selector}'")]
    MissingContainer { selector: String },

    #[error("Store: {source}")]
    Store {
        #[from]
        source: sqlx::Error,
    },
}

impl GrabError {
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            GrabError::Network { .. } | GrabError::HttpStatus { .. } | GrabError::Decode { .. }
        )
    }

    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            GrabError::InvalidSelector { .. } | GrabError::MissingContainer { .. }
        )
    }
}
