pub mod chart;
pub mod cli;
pub mod error;
pub mod params;

use std::collections::BTreeMap;

use axum::{
    Router,
    extract::{Json, RawQuery, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::core::{Plan, Projection, SolveFor, SolvedPlan, YearSnapshot, project, solve_plan};
use chart::{ChartData, HiddenSeries, chart_data};
use error::{ApiError, ErrorResponse};
use params::{
    ParamStore, PlanField, QueryParams, load_hidden_series, load_plan, store_hidden_series,
    store_plan,
};

/// Optional plan fields accepted by `POST /api/projection`. Missing fields
/// keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectionPayload {
    starting_age: Option<u32>,
    starting_balance: Option<f64>,
    interest_rate: Option<f64>,
    retirement_age: Option<u32>,
    max_age: Option<u32>,
    starting_investment_per_month: Option<f64>,
    investment_increasing_rate: Option<f64>,
    spending_per_year: Option<f64>,
    withdrawal_rate: Option<f64>,
    solve_for: Option<SolveFor>,
    hidden_series: Option<Vec<usize>>,
}

impl ProjectionPayload {
    /// Routes the payload through the same store the query string uses so
    /// both endpoints share validation.
    fn into_params(self) -> QueryParams {
        let mut store = QueryParams::new();
        let ages = [
            (PlanField::StartingAge, self.starting_age),
            (PlanField::RetirementAge, self.retirement_age),
            (PlanField::MaxAge, self.max_age),
        ];
        for (field, value) in ages {
            if let Some(v) = value {
                store.set(field.label(), &v.to_string());
            }
        }

        let amounts = [
            (PlanField::StartingBalance, self.starting_balance),
            (PlanField::InterestRate, self.interest_rate),
            (
                PlanField::StartingInvestmentPerMonth,
                self.starting_investment_per_month,
            ),
            (
                PlanField::InvestmentIncreasingRate,
                self.investment_increasing_rate,
            ),
            (PlanField::SpendingPerYear, self.spending_per_year),
            (PlanField::WithdrawalRate, self.withdrawal_rate),
        ];
        for (field, value) in amounts {
            if let Some(v) = value {
                store.set(field.label(), &v.to_string());
            }
        }

        if let Some(target) = self.solve_for {
            store.set(
                params::SOLVE_FOR_PARAM,
                PlanField::for_solve_target(target).label(),
            );
        }
        if let Some(indices) = self.hidden_series {
            store_hidden_series(&mut store, &indices.into_iter().collect());
        }
        store
    }
}

/// Solved plan plus everything a front end needs to draw it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionReport {
    pub plan: Plan,
    pub solved_value: f64,
    pub converged: bool,
    pub nest_egg: f64,
    pub depleted_at_age: Option<u32>,
    pub years: Vec<YearSnapshot>,
    pub chart: ChartData,
    /// Non-default parameters keyed by their store names.
    pub params: BTreeMap<String, String>,
    /// Canonical query string for the solved plan, defaults omitted.
    pub query: String,
}

pub(crate) fn build_report(
    solved: SolvedPlan,
    projection: Projection,
    hidden: HiddenSeries,
) -> ProjectionReport {
    let plan = solved.plan;
    let mut canonical = QueryParams::new();
    store_plan(&mut canonical, &plan);
    store_hidden_series(&mut canonical, &hidden);

    ProjectionReport {
        plan,
        solved_value: solved.solved_value,
        converged: solved.converged,
        nest_egg: plan
            .assumptions
            .required_nest_egg(plan.withdrawal_rate_percent),
        depleted_at_age: projection.depleted_at(),
        chart: chart_data(&projection, &hidden),
        years: projection.years,
        params: canonical
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        query: canonical.to_query_string(),
    }
}

/// Loads a plan from `store`, solves it and projects the result.
pub fn evaluate(store: &impl ParamStore) -> Result<ProjectionReport, ApiError> {
    let plan = load_plan(store)?;
    let hidden = load_hidden_series(store);
    let solved = solve_plan(&plan);
    let projection = project(&solved.plan.assumptions);

    debug!(
        solve_for = ?plan.solve_for,
        solved_value = solved.solved_value,
        converged = solved.converged,
        years = projection.len(),
        "evaluated projection"
    );
    if !solved.converged {
        warn!(solve_for = ?plan.solve_for, "solver did not converge; reporting fallback value");
    }

    Ok(build_report(solved, projection, hidden))
}

pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_http_server(config: &ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "nestegg HTTP API listening");
    info!("Try http://{addr}/api/projection");

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "failed to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn projection_get_handler(RawQuery(query): RawQuery) -> Result<Response, ApiError> {
    let store = QueryParams::parse(query.as_deref().unwrap_or_default())?;
    let report = evaluate_blocking(store).await?;
    Ok(json_response(StatusCode::OK, report))
}

async fn projection_post_handler(
    payload: Result<Json<ProjectionPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::Payload(e.body_text()))?;
    let report = evaluate_blocking(payload.into_params()).await?;
    Ok(json_response(StatusCode::OK, report))
}

/// Solving can run thousands of simulated years, so it stays off the async
/// workers.
async fn evaluate_blocking(store: QueryParams) -> Result<ProjectionReport, ApiError> {
    tokio::task::spawn_blocking(move || evaluate(&store))
        .await
        .map_err(|e| {
            error!(error = %e, "projection task failed");
            ApiError::Internal("projection task failed".to_string())
        })?
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

pub(crate) fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
