//! REST endpoint handlers for the Pulse dashboard.
//!
//! All handlers read through the shared [`AppState`]; population
//! figures are recomputed from the board on every request, never
//! cached.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Inline HTML status page |
//! | `GET` | `/api/population` | Current snapshots for all territories |
//! | `GET` | `/api/population/:name` | Current snapshot for one territory |
//! | `GET` | `/api/data` | Static demographic data + current figures |
//! | `GET` | `/api/data/:name` | Same, for one territory |
//! | `GET` | `/api/validation` | Growth-rate consistency report |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use axum::Json;
use pulse_core::Snapshot;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- inline HTML status page
// ---------------------------------------------------------------------------

/// Serve the dashboard status page: one metric card per territory
/// plus links to the API endpoints and the live stream.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let territories = state.board.territories().await;
    let snapshots = state.board.current_all().await;
    let connections = state.registry.len();

    let mut cards = String::new();
    for territory in &territories {
        let snapshot = snapshots
            .iter()
            .find(|snapshot| snapshot.territory == territory.name);
        let population = snapshot.map_or_else(String::new, |s| group_thousands(s.population));
        let delta = snapshot.map_or_else(String::new, |s| format_signed(s.delta_since_reference));
        cards.push_str(&format!(
            r#"        <div class="metric">
            <div class="label">{label}</div>
            <div class="value">{population}</div>
            <div class="delta">{delta} since {year} &middot; {rate}/yr</div>
        </div>
"#,
            label = territory.label(),
            year = territory.reference_timestamp.format("%Y-%m-%d"),
            rate = format_rate(territory.annual_growth_rate),
        ));
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Pulse</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 220px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        .metric .delta {{ color: #8b949e; font-size: 0.8rem; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Pulse</h1>
    <p class="subtitle">Real-time demographic dashboard</p>

    <p>Status: <span class="status">RUNNING</span> &middot; {connections} live connection(s)</p>

    <div>
{cards}    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/population">/api/population</a> -- Current snapshots</li>
        <li><a href="/api/population/:name">/api/population/:name</a> -- Single territory snapshot</li>
        <li><a href="/api/data">/api/data</a> -- Demographic data + current figures</li>
        <li><a href="/api/data/:name">/api/data/:name</a> -- Single territory data</li>
        <li><a href="/api/validation">/api/validation</a> -- Growth-rate consistency report</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li style="list-style:none;"><code>ws://host:port/ws/population</code> -- Live population stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/population -- current snapshots
// ---------------------------------------------------------------------------

/// Return the current snapshot for every territory plus the combined
/// total.
pub async fn population_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshots = state.board.current_all().await;
    let total: u64 = snapshots
        .iter()
        .fold(0, |total, snapshot| total.saturating_add(snapshot.population));

    Json(serde_json::json!({
        "count": snapshots.len(),
        "total_population": total,
        "territories": snapshots,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/population/:name -- single snapshot
// ---------------------------------------------------------------------------

/// Return the current snapshot for one territory.
pub async fn population_one(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.board.current(&name).await?;
    Ok(Json(snapshot))
}

// ---------------------------------------------------------------------------
// GET /api/data -- demographic data + current figures
// ---------------------------------------------------------------------------

/// Return the full demographic record for every territory joined
/// with its current snapshot.
pub async fn data_all(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let territories = state.board.territories().await;
    let snapshots = state.board.current_all().await;
    let computed_at = snapshots.first().map(|snapshot| snapshot.computed_at);

    let mut entries = serde_json::Map::new();
    let mut total: u64 = 0;
    for territory in &territories {
        let snapshot = snapshots
            .iter()
            .find(|snapshot| snapshot.territory == territory.name);
        if let Some(snapshot) = snapshot {
            total = total.saturating_add(snapshot.population);
        }
        entries.insert(territory.name.clone(), joined_record(territory, snapshot)?);
    }

    Ok(Json(serde_json::json!({
        "territories": entries,
        "total_current_population": total,
        "computed_at": computed_at,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/data/:name -- single territory data
// ---------------------------------------------------------------------------

/// Return the full demographic record for one territory joined with
/// its current snapshot.
pub async fn data_one(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.board.current(&name).await?;
    let territories = state.board.territories().await;
    let territory = territories
        .iter()
        .find(|territory| territory.name == name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown territory: {name}")))?;

    Ok(Json(joined_record(territory, Some(&snapshot))?))
}

// ---------------------------------------------------------------------------
// GET /api/validation -- growth-rate consistency report
// ---------------------------------------------------------------------------

/// Cross-check each territory's stated growth rate against its crude
/// birth and death rates.
pub async fn validation(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reports = state.board.rate_consistency().await;
    Json(serde_json::json!({ "validation": reports }))
}

/// Merge a territory's static record with its current snapshot into
/// one JSON object.
fn joined_record(
    territory: &pulse_core::Territory,
    snapshot: Option<&Snapshot>,
) -> Result<serde_json::Value, ApiError> {
    let mut value = serde_json::to_value(territory)?;
    if let (serde_json::Value::Object(record), Some(snapshot)) = (&mut value, snapshot) {
        record.insert(
            String::from("current_population"),
            serde_json::json!(snapshot.population),
        );
        record.insert(
            String::from("delta_since_reference"),
            serde_json::json!(snapshot.delta_since_reference),
        );
        record.insert(
            String::from("births_today"),
            serde_json::json!(snapshot.births_today),
        );
        record.insert(
            String::from("deaths_today"),
            serde_json::json!(snapshot.deaths_today),
        );
    }
    Ok(value)
}

/// Format an integer with thousands separators for the status page.
#[allow(clippy::arithmetic_side_effects)]
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        let remaining = digits.len() - index;
        if index > 0 && remaining % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format a signed delta with an explicit sign.
fn format_signed(value: i64) -> String {
    format!("{value:+}")
}

/// Format a growth-rate fraction as a signed percentage.
#[allow(clippy::arithmetic_side_effects)]
fn format_rate(rate: f64) -> String {
    format!("{:+.2}%", rate * 100.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn group_thousands_inserts_separators() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(51_628_117), "51,628,117");
    }

    #[test]
    fn format_rate_shows_signed_percent() {
        assert_eq!(format_rate(-0.0021), "-0.21%");
        assert_eq!(format_rate(0.004), "+0.40%");
    }

    #[test]
    fn format_signed_always_carries_a_sign() {
        assert_eq!(format_signed(12), "+12");
        assert_eq!(format_signed(-3), "-3");
        assert_eq!(format_signed(0), "+0");
    }
}
