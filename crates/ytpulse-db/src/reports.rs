//! Database operations for the `reports` and `report_videos` tables.
//!
//! A report is written exactly once, inside a single transaction, and is
//! never updated afterwards. Video rows carry a `position` column so the
//! read path returns them in the same order the analysis produced them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// One video's metrics as produced by the analysis pipeline.
#[derive(Debug, Clone)]
pub struct NewVideoMetric {
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub engagement_rate: f64,
}

/// A channel report ready for persistence.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub channel_id: String,
    pub channel_title: String,
    pub total_subscribers: i64,
    pub channel_engagement_rate: f64,
    pub user_id: Option<Uuid>,
    pub videos: Vec<NewVideoMetric>,
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    public_id: Uuid,
    channel_id: String,
    channel_title: String,
    total_subscribers: i64,
    channel_engagement_rate: f64,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct VideoRow {
    report_id: i64,
    video_id: String,
    title: String,
    published_at: DateTime<Utc>,
    views: i64,
    likes: i64,
    comments: i64,
    engagement_rate: f64,
}

/// A persisted per-video metric, in analysis order.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetricRecord {
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub engagement_rate: f64,
}

/// A persisted channel report with its videos attached.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub public_id: Uuid,
    pub channel_id: String,
    pub channel_title: String,
    pub total_subscribers: i64,
    pub channel_engagement_rate: f64,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub videos: Vec<VideoMetricRecord>,
}

impl From<VideoRow> for VideoMetricRecord {
    fn from(row: VideoRow) -> Self {
        Self {
            video_id: row.video_id,
            title: row.title,
            published_at: row.published_at,
            views: row.views,
            likes: row.likes,
            comments: row.comments,
            engagement_rate: row.engagement_rate,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a report and its videos in one transaction and returns the
/// persisted record.
///
/// Either the report row and every video row commit together, or nothing
/// is written at all; a failure partway through leaves no partial report.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn insert_report(pool: &PgPool, report: &NewReport) -> Result<ReportRecord, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ReportRow>(
        "INSERT INTO reports \
           (channel_id, channel_title, total_subscribers, channel_engagement_rate, user_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, public_id, channel_id, channel_title, total_subscribers, \
                   channel_engagement_rate, user_id, created_at",
    )
    .bind(&report.channel_id)
    .bind(&report.channel_title)
    .bind(report.total_subscribers)
    .bind(report.channel_engagement_rate)
    .bind(report.user_id)
    .fetch_one(&mut *tx)
    .await?;

    for (index, video) in report.videos.iter().enumerate() {
        let position = i32::try_from(index).unwrap_or(i32::MAX);
        sqlx::query(
            "INSERT INTO report_videos \
               (report_id, position, video_id, title, published_at, views, likes, comments, engagement_rate) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(row.id)
        .bind(position)
        .bind(&video.video_id)
        .bind(&video.title)
        .bind(video.published_at)
        .bind(video.views)
        .bind(video.likes)
        .bind(video.comments)
        .bind(video.engagement_rate)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(ReportRecord {
        public_id: row.public_id,
        channel_id: row.channel_id,
        channel_title: row.channel_title,
        total_subscribers: row.total_subscribers,
        channel_engagement_rate: row.channel_engagement_rate,
        user_id: row.user_id,
        created_at: row.created_at,
        videos: report
            .videos
            .iter()
            .map(|v| VideoMetricRecord {
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

/// Returns the most recent reports, newest first, with their videos
/// re-attached in analysis order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn recent_reports(pool: &PgPool, limit: i64) -> Result<Vec<ReportRecord>, DbError> {
    let rows = sqlx::query_as::<_, ReportRow>(
        "SELECT id, public_id, channel_id, channel_title, total_subscribers, \
                channel_engagement_rate, user_id, created_at \
         FROM reports \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let report_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let video_rows = sqlx::query_as::<_, VideoRow>(
        "SELECT report_id, video_id, title, published_at, views, likes, comments, engagement_rate \
         FROM report_videos \
         WHERE report_id = ANY($1) \
         ORDER BY report_id, position",
    )
    .bind(&report_ids)
    .fetch_all(pool)
    .await?;

    let mut videos_by_report: HashMap<i64, Vec<VideoMetricRecord>> = HashMap::new();
    for video in video_rows {
        videos_by_report
            .entry(video.report_id)
            .or_default()
            .push(video.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| ReportRecord {
            videos: videos_by_report.remove(&row.id).unwrap_or_default(),
            public_id: row.public_id,
            channel_id: row.channel_id,
            channel_title: row.channel_title,
            total_subscribers: row.total_subscribers,
            channel_engagement_rate: row.channel_engagement_rate,
            user_id: row.user_id,
            created_at: row.created_at,
        })
        .collect())
}
