#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Weather API returned status {status}")]
    Http { status: u16 },
    #[error("Failed to interpret timestamp in API response: {0}")]
    DateTimeError(String),
}

impl FetchError {
    /// True for transport-level failures (connect, timeout, DNS), as
    /// opposed to a response the server actually produced.
    pub fn is_transport(&self) -> bool {
        match self {
            FetchError::Request(e) => !e.is_decode(),
            _ => false,
        }
    }
}
