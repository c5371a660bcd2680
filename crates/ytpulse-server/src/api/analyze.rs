use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use ytpulse_db::{ReportRecord, VideoMetricRecord};

use crate::analyzer::AnalyzeError;
use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AnalyzeRequest {
    pub channel_id: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReportItem {
    id: Uuid,
    channel_id: String,
    channel_title: String,
    total_subscribers: i64,
    channel_engagement_rate: f64,
    videos: Vec<VideoMetricItem>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VideoMetricItem {
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub engagement_rate: f64,
}

impl From<VideoMetricRecord> for VideoMetricItem {
    fn from(record: VideoMetricRecord) -> Self {
        Self {
            video_id: record.video_id,
            title: record.title,
            published_at: record.published_at,
            views: record.views,
            likes: record.likes,
            comments: record.comments,
            engagement_rate: record.engagement_rate,
        }
    }
}

impl From<ReportRecord> for ReportItem {
    fn from(record: ReportRecord) -> Self {
        Self {
            id: record.public_id,
            channel_id: record.channel_id,
            channel_title: record.channel_title,
            total_subscribers: record.total_subscribers,
            channel_engagement_rate: record.channel_engagement_rate,
            videos: record.videos.into_iter().map(VideoMetricItem::from).collect(),
            created_at: record.created_at,
            user_id: record.user_id,
        }
    }
}

pub(super) async fn analyze_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<ReportItem>>, ApiError> {
    let channel_id = request.channel_id.unwrap_or_default();

    let report = state
        .analyzer
        .analyze(&channel_id, request.user_id)
        .await
        .map_err(|e| map_analyze_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ReportItem::from(report),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Maps pipeline failures to user-facing HTTP errors.
///
/// Upstream YouTube errors mirror the upstream status; the reason token
/// selects a more specific message where one exists.
pub(super) fn map_analyze_error(request_id: String, error: &AnalyzeError) -> ApiError {
    match error {
        AnalyzeError::InvalidInput => ApiError::new(
            request_id,
            StatusCode::BAD_REQUEST,
            "validation_error",
            "channelId is required",
        ),
        AnalyzeError::NotFound => ApiError::new(
            request_id,
            StatusCode::NOT_FOUND,
            "not_found",
            "Channel not found. Please check the Channel ID.",
        ),
        AnalyzeError::NoVideosFound => ApiError::new(
            request_id,
            StatusCode::NOT_FOUND,
            "not_found",
            "No videos found for this channel",
        ),
        AnalyzeError::Upstream {
            status,
            reason,
            message,
        } => {
            let status_code =
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let message = match (reason.as_deref(), *status) {
                (Some("quotaExceeded"), _) => {
                    "YouTube API quota exceeded. Please try again later.".to_owned()
                }
                (Some("keyInvalid"), _) => {
                    "Invalid YouTube API key. Please contact support.".to_owned()
                }
                (_, 403) => {
                    "Access denied. The channel may be private or the API key lacks permissions."
                        .to_owned()
                }
                (_, 400) => "Invalid request. Please check the Channel ID format.".to_owned(),
                _ => message.clone(),
            };
            ApiError::new(request_id, status_code, "youtube_error", message)
        }
        AnalyzeError::Transport(_) => ApiError::new(
            request_id,
            StatusCode::SERVICE_UNAVAILABLE,
            "youtube_unreachable",
            "Unable to connect to YouTube. Please try again later.",
        ),
        AnalyzeError::Persistence(_) => ApiError::new(
            request_id,
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Failed to save analysis report",
        ),
    }
}
