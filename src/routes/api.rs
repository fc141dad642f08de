use crate::error::ApiError;
use crate::models::{LogEntry, LogType};
use crate::state::AppState;
use log::debug;
use rocket::serde::json::Json;
use rocket::{State, get};

use super::packages::parse_since;

#[get("/api/health")]
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// Audit entries newer than `since` (epoch milliseconds), optionally filtered
/// by a comma separated list of type codes.
#[get("/api/log?<since>&<types>")]
pub async fn get_log(
    since: Option<i64>,
    types: Option<&str>,
    state: &State<AppState>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let since = parse_since(since)?;
    let types = parse_types(types.unwrap_or_default())?;
    debug!("Log requested since {since} for types {types:?}");

    let database = state.database.clone();
    let entries = tokio::task::spawn_blocking(move || {
        database.log().get_entries_since(since, &types)
    })
    .await??;

    Ok(Json(entries))
}

fn parse_types(raw: &str) -> Result<Vec<LogType>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| {
            code.parse::<i32>()
                .map_err(|_| format!("Invalid log type '{code}'"))
                .and_then(LogType::try_from)
                .map_err(ApiError::BadRequest)
        })
        .collect()
}
