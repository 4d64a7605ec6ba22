//! Administrative endpoints for anchor maintenance.
//!
//! When a new official statistical release lands, the operator
//! replaces a territory's anchor through `POST /api/admin/update-base`
//! instead of restarting the process. The endpoint requires the
//! pre-shared credential; validation failures leave prior state
//! intact.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use pulse_core::BaseUpdate;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /api/admin/update-base`.
///
/// Counts are signed so that negative inputs are rejected with a
/// validation error rather than failing opaquely at deserialization.
#[derive(Debug, serde::Deserialize)]
pub struct UpdateBaseRequest {
    /// Machine name of the territory to update.
    pub territory: String,

    /// New reference population.
    pub population: i64,

    /// New reference timestamp. Must not be in the future.
    pub timestamp: DateTime<Utc>,

    /// Optional new annual growth rate (fraction per year).
    #[serde(default)]
    pub annual_growth_rate: Option<f64>,

    /// Optional new annual birth count.
    #[serde(default)]
    pub annual_births: Option<i64>,

    /// Optional new annual death count.
    #[serde(default)]
    pub annual_deaths: Option<i64>,
}

/// Replace a territory's anchor with newly released official figures.
///
/// # Route
///
/// `POST /api/admin/update-base` (requires `x-admin-key`)
pub async fn update_base(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateBaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.require_admin(&headers)?;

    let updated = state
        .board
        .update_base(
            &body.territory,
            BaseUpdate {
                population: body.population,
                timestamp: body.timestamp,
                annual_growth_rate: body.annual_growth_rate,
                annual_births: body.annual_births,
                annual_deaths: body.annual_deaths,
            },
        )
        .await?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("Updated {} base data", updated.label()),
        "territory": updated,
    })))
}
