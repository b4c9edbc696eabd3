//! Fan engagement REST endpoints.

use crate::rest::{status_for, ApiError, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use fanscore_core::activity::validate_id;
use fanscore_core::{
    ActivityLogEntry, ActivityRequest, ActivityResponse, FanError, FanState, NextTierProgress,
    UserAchievement, UserMilestoneProgress,
};
use serde::{Deserialize, Serialize};

const DEFAULT_FEED_LIMIT: u32 = 50;
const MAX_FEED_LIMIT: u32 = 500;

/// POST /v1/fans/activity
pub async fn handle_activity(
    State(state): State<AppState>,
    payload: Result<Json<ActivityRequest>, JsonRejection>,
) -> (StatusCode, Json<ActivityResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            metrics::counter!("fan.api.malformed_requests").increment(1);
            let err = FanError::Validation(rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(ActivityResponse::rejected(&err)));
        }
    };

    metrics::counter!("fan.api.activity_requests").increment(1);
    match state.engine.process_activity(&request).await {
        Ok(processed) => (StatusCode::OK, Json(ActivityResponse::ok(processed.result))),
        Err(e) => {
            metrics::counter!("fan.api.errors", "code" => e.code()).increment(1);
            (status_for(&e), Json(ActivityResponse::rejected(&e)))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanStateResponse {
    pub state: FanState,
    pub next_tier_progress: NextTierProgress,
}

fn validate_pair(user_id: &str, artist_id: &str) -> Result<(), ApiError> {
    validate_id("userId", user_id)?;
    validate_id("artistId", artist_id)?;
    Ok(())
}

/// GET /v1/fans/:user_id/:artist_id
pub async fn handle_fan_state(
    State(state): State<AppState>,
    Path((user_id, artist_id)): Path<(String, String)>,
) -> Result<Json<FanStateResponse>, ApiError> {
    validate_pair(&user_id, &artist_id)?;
    let fan = state.engine.fan_state(&user_id, &artist_id).await?;
    let next_tier_progress = state.engine.progress(&fan);
    metrics::counter!("fan.api.state_reads").increment(1);
    Ok(Json(FanStateResponse {
        state: fan,
        next_tier_progress,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u32>,
}

impl FeedQuery {
    fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_FEED_LIMIT)
            .clamp(1, MAX_FEED_LIMIT)
    }
}

/// GET /v1/fans/:user_id/:artist_id/activity?limit=N
pub async fn handle_activity_feed(
    State(state): State<AppState>,
    Path((user_id, artist_id)): Path<(String, String)>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<ActivityLogEntry>>, ApiError> {
    validate_pair(&user_id, &artist_id)?;
    let feed = state
        .engine
        .activity_feed(&user_id, &artist_id, query.effective_limit())
        .await?;
    metrics::counter!("fan.api.feed_reads").increment(1);
    Ok(Json(feed))
}

/// GET /v1/fans/:user_id/:artist_id/achievements
pub async fn handle_achievements(
    State(state): State<AppState>,
    Path((user_id, artist_id)): Path<(String, String)>,
) -> Result<Json<Vec<UserAchievement>>, ApiError> {
    validate_pair(&user_id, &artist_id)?;
    Ok(Json(state.engine.achievements(&user_id, &artist_id).await?))
}

/// GET /v1/fans/:user_id/:artist_id/milestones
pub async fn handle_milestones(
    State(state): State<AppState>,
    Path((user_id, artist_id)): Path<(String, String)>,
) -> Result<Json<Vec<UserMilestoneProgress>>, ApiError> {
    validate_pair(&user_id, &artist_id)?;
    Ok(Json(state.engine.milestones(&user_id, &artist_id).await?))
}
