//! HTTP client for the YouTube Data API v3.
//!
//! Wraps `reqwest` with typed response deserialization and YouTube's
//! error envelope handling. Non-2xx responses surface as
//! [`YoutubeError::Upstream`] with the upstream status code and the
//! envelope's `reason` token preserved for translation by the caller.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};

use crate::error::YoutubeError;
use crate::types::{
    parse_count, ChannelListResponse, ChannelSummary, ErrorEnvelope, RawVideo, SearchListResponse,
    VideoListResponse,
};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";

/// Title used when the API returns a video without one.
const UNTITLED_VIDEO: &str = "Untitled Video";

/// The three read operations the engagement pipeline needs from the
/// video platform. Implemented by [`YoutubeClient`] for production and
/// by hand-rolled doubles in pipeline tests.
///
/// None of the operations retry; callers wrap them in
/// [`crate::retry::retry_with_backoff`] as needed.
#[async_trait]
pub trait ChannelDataApi: Send + Sync {
    /// Looks up a channel's title and subscriber count.
    ///
    /// # Errors
    ///
    /// [`YoutubeError::NotFound`] when the platform returns zero
    /// matching channels; [`YoutubeError::Upstream`] / [`YoutubeError::Http`]
    /// on API or transport failures.
    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelSummary, YoutubeError>;

    /// Returns the ids of the channel's most recent videos, newest
    /// first. A channel with no public videos yields an empty vec,
    /// not an error.
    async fn fetch_latest_video_ids(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<String>, YoutubeError>;

    /// Fetches snippet and statistics for the given video ids,
    /// preserving response order. An empty `video_ids` slice is a
    /// no-op success: the API rejects a call with zero ids, so none
    /// is made.
    async fn fetch_video_stats(&self, video_ids: &[String]) -> Result<Vec<RawVideo>, YoutubeError>;
}

/// Client for the YouTube Data API v3.
///
/// Manages the HTTP client, API key, and base URL. Use [`YoutubeClient::new`]
/// for production or [`YoutubeClient::with_base_url`] to point at a mock
/// server in tests.
pub struct YoutubeClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl YoutubeClient {
    /// Creates a new client pointed at the production YouTube API.
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, YoutubeError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`YoutubeError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, YoutubeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("ytpulse/0.1 (channel-analytics)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so
        // that joining a resource segment appends rather than replaces
        // the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| YoutubeError::InvalidBaseUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Builds the full request URL with properly percent-encoded query
    /// parameters, appending the API key.
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::InvalidBaseUrl`] if the resource segment
    /// cannot be joined onto the base URL (e.g. a cannot-be-a-base URL
    /// slipped through construction).
    fn build_url(&self, resource: &str, extra: &[(&str, &str)]) -> Result<Url, YoutubeError> {
        let mut url = self.base_url.join(resource).map_err(|e| {
            YoutubeError::InvalidBaseUrl(format!("cannot join '{resource}': {e}"))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", &self.api_key);
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends a GET request and parses the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Upstream`] for non-2xx statuses (with the
    /// Google error envelope parsed when present), [`YoutubeError::Http`]
    /// on transport failure, and [`YoutubeError::Deserialize`] if the
    /// body is not valid JSON.
    async fn request_json(
        &self,
        context: &str,
        url: &Url,
    ) -> Result<serde_json::Value, YoutubeError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| YoutubeError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

#[async_trait]
impl ChannelDataApi for YoutubeClient {
    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelSummary, YoutubeError> {
        let url = self.build_url(
            "channels",
            &[("part", "snippet,statistics"), ("id", channel_id)],
        )?;
        let context = format!("channels(id={channel_id})");
        let body = self.request_json(&context, &url).await?;

        let list: ChannelListResponse =
            serde_json::from_value(body).map_err(|e| YoutubeError::Deserialize {
                context,
                source: e,
            })?;

        let Some(channel) = list.items.into_iter().next() else {
            return Err(YoutubeError::NotFound);
        };

        Ok(ChannelSummary {
            title: channel.snippet.map(|s| s.title).unwrap_or_default(),
            subscriber_count: parse_count(
                channel
                    .statistics
                    .and_then(|s| s.subscriber_count)
                    .as_deref(),
            ),
        })
    }

    async fn fetch_latest_video_ids(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<String>, YoutubeError> {
        let limit_str = limit.to_string();
        let url = self.build_url(
            "search",
            &[
                ("part", "id"),
                ("channelId", channel_id),
                ("type", "video"),
                ("order", "date"),
                ("maxResults", &limit_str),
            ],
        )?;
        let context = format!("search(channelId={channel_id})");
        let body = self.request_json(&context, &url).await?;

        let list: SearchListResponse =
            serde_json::from_value(body).map_err(|e| YoutubeError::Deserialize {
                context,
                source: e,
            })?;

        // Search results can include entries whose id carries no videoId
        // (e.g. upcoming premieres); skip them rather than fail.
        Ok(list
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    async fn fetch_video_stats(&self, video_ids: &[String]) -> Result<Vec<RawVideo>, YoutubeError> {
        if video_ids.is_empty() {
            // videos.list rejects an empty id parameter; skip the call.
            return Ok(Vec::new());
        }

        let ids = video_ids.join(",");
        let url = self.build_url("videos", &[("part", "snippet,statistics"), ("id", &ids)])?;
        let context = format!("videos(id={ids})");
        let body = self.request_json(&context, &url).await?;

        let list: VideoListResponse =
            serde_json::from_value(body).map_err(|e| YoutubeError::Deserialize {
                context,
                source: e,
            })?;

        Ok(list
            .items
            .into_iter()
            .map(|item| {
                let snippet = item.snippet;
                let stats = item.statistics;
                let title = snippet
                    .as_ref()
                    .and_then(|s| s.title.clone())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNTITLED_VIDEO.to_owned());
                let published_at = snippet
                    .as_ref()
                    .and_then(|s| s.published_at)
                    .unwrap_or_else(Utc::now);
                RawVideo {
                    video_id: item.id,
                    title,
                    published_at,
                    views: parse_count(stats.as_ref().and_then(|s| s.view_count.as_deref())),
                    likes: parse_count(stats.as_ref().and_then(|s| s.like_count.as_deref())),
                    comments: parse_count(stats.as_ref().and_then(|s| s.comment_count.as_deref())),
                }
            })
            .collect())
    }
}

/// Parses a non-2xx response body into [`YoutubeError::Upstream`],
/// extracting the Google error envelope's message and first `reason`
/// token when the body carries one.
fn upstream_error(status: u16, body: &str) -> YoutubeError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => YoutubeError::Upstream {
            status,
            reason: envelope
                .error
                .errors
                .into_iter()
                .next()
                .and_then(|e| e.reason),
            message: envelope.error.message,
        },
        Err(_) => YoutubeError::Upstream {
            status,
            reason: None,
            message: "YouTube API error".to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> YoutubeClient {
        YoutubeClient::with_base_url("test-key", 30, base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn build_url_constructs_correct_query_string() {
        let client = test_client("https://www.googleapis.com/youtube/v3");
        let url = client
            .build_url("channels", &[("part", "snippet,statistics"), ("id", "UC1")])
            .expect("joinable resource");
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/youtube/v3/channels?key=test-key&part=snippet%2Cstatistics&id=UC1"
        );
    }

    #[test]
    fn build_url_strips_trailing_slash() {
        let client = test_client("https://www.googleapis.com/youtube/v3/");
        let url = client
            .build_url("videos", &[("id", "a,b")])
            .expect("joinable resource");
        assert!(url.as_str().starts_with("https://www.googleapis.com/youtube/v3/videos?"));
    }

    #[test]
    fn build_url_surfaces_unjoinable_base() {
        // A cannot-be-a-base URL parses, but resource segments cannot
        // be joined onto it; that must surface, not silently fall back
        // to requesting the base URL itself.
        let client = test_client("mailto:someone@example.com");
        let result = client.build_url("channels", &[("id", "UC1")]);
        assert!(matches!(result, Err(YoutubeError::InvalidBaseUrl(_))));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = YoutubeClient::with_base_url("k", 30, "not a url");
        assert!(matches!(result, Err(YoutubeError::InvalidBaseUrl(_))));
    }

    #[test]
    fn upstream_error_extracts_reason() {
        let body = r#"{"error": {"code": 403, "message": "Quota exceeded.", "errors": [{"reason": "quotaExceeded"}]}}"#;
        let err = upstream_error(403, body);
        match err {
            YoutubeError::Upstream {
                status,
                reason,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(reason.as_deref(), Some("quotaExceeded"));
                assert_eq!(message, "Quota exceeded.");
            }
            other => panic!("expected Upstream, got: {other:?}"),
        }
    }

    #[test]
    fn upstream_error_falls_back_on_unparseable_body() {
        let err = upstream_error(502, "<html>bad gateway</html>");
        match err {
            YoutubeError::Upstream { status, reason, .. } => {
                assert_eq!(status, 502);
                assert!(reason.is_none());
            }
            other => panic!("expected Upstream, got: {other:?}"),
        }
    }
}
