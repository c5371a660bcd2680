use thiserror::Error;

/// Errors returned by the YouTube Data API client.
#[derive(Debug, Error)]
pub enum YoutubeError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The base URL given to the client could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The channel lookup returned zero matching channels.
    #[error("channel not found")]
    NotFound,

    /// The API returned a non-2xx status. `reason` carries the
    /// machine-readable token from the Google error envelope
    /// (`quotaExceeded`, `keyInvalid`, `forbidden`, ...) when present.
    #[error("YouTube API error (status {status}): {message}")]
    Upstream {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
