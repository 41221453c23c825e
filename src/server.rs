use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::analytics::{self, AnalyticsPolicy};
use crate::db::ResultStore;
use crate::error::{AppError, Result};
use crate::models::{
    CollegeDashboardData, DegreeLevel, FilterOption, FilterOptions, ProgramAnalysisDashboardData,
    ResultAnalyticsFilters,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResultStore>,
    pub policy: AnalyticsPolicy,
}

/// Raw query string. Empty values count as absent, as the portal's forms
/// send them.
#[derive(Debug, Default, Deserialize)]
pub struct ProgramStatsQuery {
    pub institution_id: Option<String>,
    pub academic_year_id: Option<String>,
    pub examination_session_id: Option<String>,
    pub program_id: Option<String>,
    pub degree_level: Option<String>,
    pub semester: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_uuid(name: &str, value: Option<String>) -> Result<Option<Uuid>> {
    present(value)
        .map(|v| {
            Uuid::parse_str(&v).map_err(|_| AppError::Validation(format!("{name} must be a UUID")))
        })
        .transpose()
}

impl ProgramStatsQuery {
    pub fn into_filters(self) -> Result<ResultAnalyticsFilters> {
        let degree_level = match present(self.degree_level) {
            Some(level) => level.parse::<DegreeLevel>().map_err(AppError::Validation)?,
            None => DegreeLevel::All,
        };
        let semester = present(self.semester)
            .map(|v| {
                v.parse::<i32>()
                    .map_err(|_| AppError::Validation("semester must be an integer".to_string()))
            })
            .transpose()?;

        Ok(ResultAnalyticsFilters {
            institution_id: parse_uuid("institution_id", self.institution_id)?,
            academic_year_id: parse_uuid("academic_year_id", self.academic_year_id)?,
            examination_session_id: parse_uuid(
                "examination_session_id",
                self.examination_session_id,
            )?,
            program_id: parse_uuid("program_id", self.program_id)?,
            degree_level,
            semester,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProgramStatsResponse {
    pub success: bool,
    pub data: ProgramAnalysisDashboardData,
    pub filters_applied: ResultAnalyticsFilters,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CollegeStatsResponse {
    pub success: bool,
    pub data: CollegeDashboardData,
    pub filters_applied: ResultAnalyticsFilters,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FilterOptionsQuery {
    pub institution_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterOptionsResponse {
    pub success: bool,
    pub data: FilterOptions,
    pub generated_at: DateTime<Utc>,
}

async fn health_checker_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn program_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<ProgramStatsQuery>,
) -> Result<Json<ProgramStatsResponse>> {
    let filters = query.into_filters()?;
    let data = analytics::load_dashboard(state.store.as_ref(), &filters, &state.policy).await?;

    Ok(Json(ProgramStatsResponse {
        success: true,
        data,
        filters_applied: filters,
        generated_at: Utc::now(),
    }))
}

async fn college_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<ProgramStatsQuery>,
) -> Result<Json<CollegeStatsResponse>> {
    let filters = query.into_filters()?;
    let data =
        analytics::load_college_dashboard(state.store.as_ref(), &filters, &state.policy).await?;

    Ok(Json(CollegeStatsResponse {
        success: true,
        data,
        filters_applied: filters,
        generated_at: Utc::now(),
    }))
}

fn semester_options() -> Vec<FilterOption> {
    (1..=10)
        .map(|n| FilterOption {
            value: n.to_string(),
            label: format!("Semester {n}"),
        })
        .collect()
}

fn degree_level_options() -> Vec<FilterOption> {
    DegreeLevel::ALL_LEVELS
        .iter()
        .map(|level| FilterOption {
            value: level.as_str().to_string(),
            label: level.label().to_string(),
        })
        .collect()
}

async fn filter_options_handler(
    State(state): State<AppState>,
    Query(query): Query<FilterOptionsQuery>,
) -> Result<Json<FilterOptionsResponse>> {
    let institution_id = parse_uuid("institution_id", query.institution_id)?;
    let store = state.store.as_ref();

    let (
        institutions,
        academic_years,
        programs,
        examination_sessions,
        regulations,
        batches,
        boards,
    ) = tokio::try_join!(
        store.institution_options(),
        store.academic_year_options(),
        store.program_options(institution_id),
        store.session_options(institution_id),
        store.regulation_options(),
        store.batch_options(institution_id),
        store.board_options(),
    )
    .inspect_err(|err| tracing::error!(error = %err, "failed to fetch filter options"))?;

    Ok(Json(FilterOptionsResponse {
        success: true,
        data: FilterOptions {
            institutions,
            academic_years,
            programs,
            examination_sessions,
            regulations,
            batches,
            boards,
            // Sections depend on a program and batch pair; none are listed up front.
            sections: Vec::new(),
            semesters: semester_options(),
            degree_levels: degree_level_options(),
        },
        generated_at: Utc::now(),
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthchecker", get(health_checker_handler))
        .route(
            "/api/result-analytics/program-stats",
            get(program_stats_handler),
        )
        .route(
            "/api/result-analytics/college-stats",
            get(college_stats_handler),
        )
        .route(
            "/api/result-analytics/filter-options",
            get(filter_options_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

pub async fn serve(state: AppState, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, "result analytics server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
