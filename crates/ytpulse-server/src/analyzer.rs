//! The channel analysis pipeline: normalize the identifier, fetch
//! channel/video data from YouTube, compute engagement metrics, and
//! persist one immutable report.
//!
//! Stages run strictly in sequence because each depends on the previous
//! one's output (channel existence gates the video search; the returned
//! ids gate the statistics lookup). Every external call is wrapped in
//! the generic retry decorator so transient network failures are
//! absorbed here, while semantic failures (not-found, quota, bad key)
//! propagate immediately. On any failure, nothing is written: the
//! single persistence write is the last step.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use ytpulse_core::metrics;
use ytpulse_db::{DbError, NewReport, NewVideoMetric, ReportRecord};
use ytpulse_youtube::{
    normalize_channel_id, retry::retry_with_backoff, ChannelDataApi, YoutubeError,
};

/// Number of most-recent uploads analyzed per report.
const LATEST_VIDEO_LIMIT: u8 = 10;

/// Failures of the analysis pipeline, by stage semantics.
///
/// The hosting layer maps these to HTTP statuses and user-facing text;
/// nothing in here formats a response.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Blank or missing channel identifier; rejected before any
    /// external call.
    #[error("channel identifier is blank")]
    InvalidInput,

    /// The platform returned zero channels for the normalized id.
    #[error("channel not found")]
    NotFound,

    /// The channel exists but has no public videos; a report with zero
    /// videos is never persisted because its channel rate would be
    /// undefined.
    #[error("no videos found for this channel")]
    NoVideosFound,

    /// The platform API answered with an error status. The upstream
    /// status and reason token are preserved for mapping and logging.
    #[error("YouTube API error (status {status}): {message}")]
    Upstream {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    /// Network-level failure reaching the platform, after retries.
    #[error("failed to reach YouTube: {0}")]
    Transport(#[source] reqwest::Error),

    /// The report was computed but could not be written. It is lost;
    /// re-running re-fetches fresh data rather than resubmitting.
    #[error("failed to persist report: {0}")]
    Persistence(#[from] DbError),
}

impl From<YoutubeError> for AnalyzeError {
    fn from(err: YoutubeError) -> Self {
        match err {
            YoutubeError::NotFound => Self::NotFound,
            YoutubeError::Upstream {
                status,
                reason,
                message,
            } => Self::Upstream {
                status,
                reason,
                message,
            },
            YoutubeError::Http(e) => Self::Transport(e),
            YoutubeError::Deserialize { context, source } => Self::Upstream {
                status: 500,
                reason: None,
                message: format!("unexpected YouTube response for {context}: {source}"),
            },
            YoutubeError::InvalidBaseUrl(msg) => Self::Upstream {
                status: 500,
                reason: None,
                message: format!("invalid YouTube base URL: {msg}"),
            },
        }
    }
}

/// Persistence seam for the pipeline. Implemented for `PgPool` in
/// production and by an in-memory double in tests.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &NewReport) -> Result<ReportRecord, DbError>;
}

#[async_trait]
impl ReportStore for PgPool {
    async fn save(&self, report: &NewReport) -> Result<ReportRecord, DbError> {
        ytpulse_db::insert_report(self, report).await
    }
}

/// Orchestrates one analysis run end to end.
///
/// Holds no per-request state; concurrent `analyze` calls are
/// independent and each produces its own report row.
pub struct Analyzer<C, S> {
    client: C,
    store: S,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl<C, S> Analyzer<C, S>
where
    C: ChannelDataApi,
    S: ReportStore,
{
    pub fn new(client: C, store: S, max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            client,
            store,
            max_retries,
            backoff_base_ms,
        }
    }

    /// Runs the full pipeline for one raw channel identifier and
    /// returns the persisted report.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure unchanged (see [`AnalyzeError`]);
    /// no report row exists on any error path.
    pub async fn analyze(
        &self,
        raw_channel_id: &str,
        user_id: Option<Uuid>,
    ) -> Result<ReportRecord, AnalyzeError> {
        if raw_channel_id.trim().is_empty() {
            return Err(AnalyzeError::InvalidInput);
        }

        let channel_id = normalize_channel_id(raw_channel_id);

        let channel = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.client.fetch_channel(&channel_id)
        })
        .await
        .map_err(|e| stage_failed("fetch_channel", &channel_id, e))?;

        let video_ids = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.client
                .fetch_latest_video_ids(&channel_id, LATEST_VIDEO_LIMIT)
        })
        .await
        .map_err(|e| stage_failed("fetch_latest_video_ids", &channel_id, e))?;

        let raw_videos = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.client.fetch_video_stats(&video_ids)
        })
        .await
        .map_err(|e| stage_failed("fetch_video_stats", &channel_id, e))?;

        if raw_videos.is_empty() {
            return Err(AnalyzeError::NoVideosFound);
        }

        let videos: Vec<NewVideoMetric> = raw_videos
            .into_iter()
            .map(|video| {
                let engagement_rate =
                    metrics::engagement_rate(video.likes, video.comments, video.views);
                NewVideoMetric {
                    video_id: video.video_id,
                    title: video.title,
                    published_at: video.published_at,
                    views: video.views,
                    likes: video.likes,
                    comments: video.comments,
                    engagement_rate,
                }
            })
            .collect();

        let rates: Vec<f64> = videos.iter().map(|v| v.engagement_rate).collect();
        let channel_engagement_rate = metrics::channel_engagement_rate(&rates);

        let report = NewReport {
            channel_id,
            channel_title: channel.title,
            total_subscribers: channel.subscriber_count,
            channel_engagement_rate,
            user_id,
            videos,
        };

        let stored = self.store.save(&report).await.map_err(|e| {
            tracing::error!(stage = "persist_report", error = %e, "analysis stage failed");
            AnalyzeError::Persistence(e)
        })?;

        tracing::info!(
            channel_id = %stored.channel_id,
            videos = stored.videos.len(),
            channel_engagement_rate = stored.channel_engagement_rate,
            "channel analysis persisted"
        );
        Ok(stored)
    }
}

fn stage_failed(stage: &'static str, channel_id: &str, err: YoutubeError) -> AnalyzeError {
    tracing::warn!(stage, channel_id, error = %err, "analysis stage failed");
    AnalyzeError::from(err)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;
    use ytpulse_youtube::{ChannelSummary, RawVideo};

    use super::*;

    /// Scripted stand-in for the YouTube client; counts calls so tests
    /// can prove which stages ran.
    #[derive(Default)]
    struct MockApi {
        channel: Option<ChannelSummary>,
        channel_error: Option<(u16, &'static str, &'static str)>,
        video_ids: Vec<String>,
        videos: Vec<RawVideo>,
        channel_calls: AtomicU32,
        search_calls: AtomicU32,
        stats_calls: AtomicU32,
        seen_channel_id: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ChannelDataApi for MockApi {
        async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelSummary, YoutubeError> {
            self.channel_calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_channel_id.lock().unwrap() = Some(channel_id.to_owned());
            if let Some((status, reason, message)) = self.channel_error {
                return Err(YoutubeError::Upstream {
                    status,
                    reason: Some(reason.to_owned()),
                    message: message.to_owned(),
                });
            }
            self.channel.clone().ok_or(YoutubeError::NotFound)
        }

        async fn fetch_latest_video_ids(
            &self,
            _channel_id: &str,
            limit: u8,
        ) -> Result<Vec<String>, YoutubeError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(limit, 10, "pipeline analyzes the ten most recent uploads");
            Ok(self.video_ids.clone())
        }

        async fn fetch_video_stats(
            &self,
            video_ids: &[String],
        ) -> Result<Vec<RawVideo>, YoutubeError> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            if video_ids.is_empty() {
                return Ok(Vec::new());
            }
            Ok(self.videos.clone())
        }
    }

    /// In-memory store double; records every saved report.
    #[derive(Default)]
    struct MemStore {
        saved: Mutex<Vec<NewReport>>,
        fail: bool,
    }

    #[async_trait]
    impl ReportStore for MemStore {
        async fn save(&self, report: &NewReport) -> Result<ReportRecord, DbError> {
            if self.fail {
                return Err(DbError::Sqlx(sqlx::Error::PoolClosed));
            }
            self.saved.lock().unwrap().push(report.clone());
            Ok(ReportRecord {
                public_id: Uuid::new_v4(),
                channel_id: report.channel_id.clone(),
                channel_title: report.channel_title.clone(),
                total_subscribers: report.total_subscribers,
                channel_engagement_rate: report.channel_engagement_rate,
                user_id: report.user_id,
                created_at: Utc::now(),
                videos: report
                    .videos
                    .iter()
                    .map(|v| ytpulse_db::VideoMetricRecord {
                        video_id: v.video_id.clone(),
                        title: v.title.clone(),
                        published_at: v.published_at,
                        views: v.views,
                        likes: v.likes,
                        comments: v.comments,
                        engagement_rate: v.engagement_rate,
                    })
                    .collect(),
            })
        }
    }

    fn video(id: &str, views: i64, likes: i64, comments: i64) -> RawVideo {
        RawVideo {
            video_id: id.to_owned(),
            title: format!("Video {id}"),
            published_at: Utc::now(),
            views,
            likes,
            comments,
        }
    }

    fn analyzer(api: MockApi, store: MemStore) -> Analyzer<MockApi, MemStore> {
        // Zero back-off keeps retry paths instant in tests.
        Analyzer::new(api, store, 0, 0)
    }

    #[tokio::test]
    async fn unprefixed_id_is_normalized_and_report_assembled() {
        let api = MockApi {
            channel: Some(ChannelSummary {
                title: "Test Channel".to_owned(),
                subscriber_count: 5000,
            }),
            video_ids: vec!["vid-1".to_owned(), "vid-2".to_owned()],
            videos: vec![video("vid-1", 100, 10, 5), video("vid-2", 0, 0, 0)],
            ..MockApi::default()
        };
        let analyzer = analyzer(api, MemStore::default());

        let report = analyzer
            .analyze("1234567890123", None)
            .await
            .expect("analysis should succeed");

        assert_eq!(
            analyzer.client.seen_channel_id.lock().unwrap().as_deref(),
            Some("UC1234567890123"),
            "lookup must use the normalized id"
        );
        assert_eq!(report.channel_id, "UC1234567890123");
        assert_eq!(report.channel_title, "Test Channel");
        assert_eq!(report.total_subscribers, 5000);

        let rates: Vec<f64> = report.videos.iter().map(|v| v.engagement_rate).collect();
        assert_eq!(rates, vec![15.0, 0.0]);
        assert_eq!(report.channel_engagement_rate, 7.5);

        assert_eq!(analyzer.store.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_channel_fails_with_not_found_and_writes_nothing() {
        let api = MockApi::default();
        let analyzer = analyzer(api, MemStore::default());

        let result = analyzer.analyze("UCmissing", None).await;

        assert!(matches!(result, Err(AnalyzeError::NotFound)));
        assert_eq!(analyzer.store.saved.lock().unwrap().len(), 0);
        assert_eq!(
            analyzer.client.search_calls.load(Ordering::SeqCst),
            0,
            "video search must not run when the channel is unknown"
        );
    }

    #[tokio::test]
    async fn channel_without_videos_fails_with_no_videos_found() {
        let api = MockApi {
            channel: Some(ChannelSummary {
                title: "Silent Channel".to_owned(),
                subscriber_count: 12,
            }),
            ..MockApi::default()
        };
        let analyzer = analyzer(api, MemStore::default());

        let result = analyzer.analyze("UCsilent", None).await;

        assert!(matches!(result, Err(AnalyzeError::NoVideosFound)));
        assert_eq!(analyzer.store.saved.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_external_call() {
        let api = MockApi::default();
        let analyzer = analyzer(api, MemStore::default());

        let result = analyzer.analyze("   ", None).await;

        assert!(matches!(result, Err(AnalyzeError::InvalidInput)));
        assert_eq!(analyzer.client.channel_calls.load(Ordering::SeqCst), 0);
        assert_eq!(analyzer.client.search_calls.load(Ordering::SeqCst), 0);
        assert_eq!(analyzer.client.stats_calls.load(Ordering::SeqCst), 0);
        assert_eq!(analyzer.store.saved.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn upstream_403_propagates_status_and_reason() {
        let api = MockApi {
            channel_error: Some((403, "forbidden", "Access forbidden")),
            ..MockApi::default()
        };
        let analyzer = analyzer(api, MemStore::default());

        let result = analyzer.analyze("UCforbidden", None).await;

        match result {
            Err(AnalyzeError::Upstream { status, reason, .. }) => {
                assert_eq!(status, 403);
                assert_eq!(reason.as_deref(), Some("forbidden"));
            }
            other => panic!("expected Upstream(403), got: {other:?}"),
        }
        assert_eq!(
            analyzer.client.channel_calls.load(Ordering::SeqCst),
            1,
            "4xx semantic errors must not be retried"
        );
        assert_eq!(analyzer.store.saved.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_surfaces_after_successful_fetch() {
        let api = MockApi {
            channel: Some(ChannelSummary {
                title: "Doomed".to_owned(),
                subscriber_count: 1,
            }),
            video_ids: vec!["vid-1".to_owned()],
            videos: vec![video("vid-1", 10, 1, 0)],
            ..MockApi::default()
        };
        let analyzer = analyzer(
            api,
            MemStore {
                fail: true,
                ..MemStore::default()
            },
        );

        let result = analyzer.analyze("UCdoomed", None).await;

        assert!(matches!(result, Err(AnalyzeError::Persistence(_))));
    }

    #[tokio::test]
    async fn user_reference_is_carried_into_the_report() {
        let api = MockApi {
            channel: Some(ChannelSummary {
                title: "Owned".to_owned(),
                subscriber_count: 7,
            }),
            video_ids: vec!["vid-1".to_owned()],
            videos: vec![video("vid-1", 200, 20, 0)],
            ..MockApi::default()
        };
        let analyzer = analyzer(api, MemStore::default());
        let user_id = Uuid::new_v4();

        let report = analyzer
            .analyze("UCowned", Some(user_id))
            .await
            .expect("analysis should succeed");

        assert_eq!(report.user_id, Some(user_id));
    }
}
