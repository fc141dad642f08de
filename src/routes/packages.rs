use crate::error::ApiError;
use crate::models::{PackageView, VersionView};
use crate::services::{RegistryService, Updates};
use crate::state::AppState;
use chrono::{DateTime, NaiveDateTime};
use log::debug;
use rocket::serde::json::Json;
use rocket::{State, get};

#[get("/api/packages?<q>")]
pub async fn list_packages(
    q: Option<String>,
    state: &State<AppState>,
) -> Result<Json<Vec<PackageView>>, ApiError> {
    let query = q.unwrap_or_default();
    let database = state.database.clone();
    let packages =
        tokio::task::spawn_blocking(move || RegistryService::list_packages(&database, &query))
            .await??;

    debug!("Listing {} packages", packages.len());
    Ok(Json(packages))
}

#[get("/api/packages/<name>")]
pub async fn get_package(
    name: &str,
    state: &State<AppState>,
) -> Result<Json<PackageView>, ApiError> {
    let name = name.to_string();
    let database = state.database.clone();
    let view = tokio::task::spawn_blocking(move || RegistryService::package_view(&database, &name))
        .await??;

    Ok(Json(view))
}

#[get("/api/packages/<name>/<version>")]
pub async fn get_version(
    name: &str,
    version: &str,
    state: &State<AppState>,
) -> Result<Json<VersionView>, ApiError> {
    let (name, version) = (name.to_string(), version.to_string());
    let database = state.database.clone();
    let view = tokio::task::spawn_blocking(move || {
        RegistryService::version_view(&database, &name, &version)
    })
    .await??;

    Ok(Json(view))
}

/// Packages changed and packages removed after `since` (epoch milliseconds).
#[get("/api/updates?<since>")]
pub async fn get_updates(
    since: Option<i64>,
    state: &State<AppState>,
) -> Result<Json<Updates>, ApiError> {
    let since = parse_since(since)?;
    let database = state.database.clone();
    let updates =
        tokio::task::spawn_blocking(move || RegistryService::updates_since(&database, since))
            .await??;

    debug!(
        "Updates since {since}: {} updated, {} removed",
        updates.updated.len(),
        updates.removed.len()
    );
    Ok(Json(updates))
}

/// Missing `since` means the beginning of time.
pub(crate) fn parse_since(since: Option<i64>) -> Result<NaiveDateTime, ApiError> {
    let millis = since.unwrap_or(0);
    DateTime::from_timestamp_millis(millis)
        .map(|ts| ts.naive_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid timestamp: {millis}")))
}
