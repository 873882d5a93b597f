use std::net::SocketAddr;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use arbo::config::ScenarioConfig;
use arbo::fit::{solve_fit, FittedValues};
use arbo::model::arbo::Compartment;
use arbo::ArboError;

#[derive(Debug, Deserialize)]
struct FitRequest {
    #[serde(default)]
    scenario: ScenarioConfig,
    values: FittedValues,
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    return_code: i32,
    t: Vec<f64>,
    compartments: Vec<(Compartment, Vec<f64>)>,
    infected_plus_recovered: Vec<f64>,
    n_accepted: usize,
    n_rejected: usize,
}

#[derive(Debug, Serialize)]
struct FitResponse {
    return_code: i32,
    t: Vec<f64>,
    infected_plus_recovered: Vec<f64>,
}

type ApiError = (StatusCode, serde_json::Value);

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/simulate", post(simulate))
        .route("/fit_trajectory", post(fit_trajectory));

    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(a) => a,
        Err(e) => {
            log::error!("invalid HOST/PORT {host}:{port}: {e}");
            std::process::exit(1);
        }
    };
    log::info!("[arbo-api] listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("bind failed: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        log::error!("server failed: {e}");
        std::process::exit(1);
    }
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn simulate(Json(cfg): Json<ScenarioConfig>) -> impl IntoResponse {
    // Integration is CPU-bound; keep it off the async workers.
    let join = tokio::task::spawn_blocking(move || simulate_sync(&cfg));
    respond(join.await)
}

async fn fit_trajectory(Json(req): Json<FitRequest>) -> impl IntoResponse {
    let join = tokio::task::spawn_blocking(move || fit_sync(&req));
    respond(join.await)
}

fn respond<T: Serialize>(joined: Result<Result<T, ApiError>, tokio::task::JoinError>) -> axum::response::Response {
    match joined {
        Ok(Ok(resp)) => (StatusCode::OK, Json(resp)).into_response(),
        Ok(Err((code, body))) => (code, Json(body)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"return_code": 2, "error": format!("join error: {e}")})),
        )
            .into_response(),
    }
}

fn model_error(e: anyhow::Error) -> ApiError {
    match e.downcast_ref::<ArboError>() {
        Some(ArboError::IntegrationFailed { t, partial, .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "return_code": 1,
                "error": format!("{e:#}"),
                "failed_at": t,
                "partial_points": partial.len(),
            }),
        ),
        Some(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"return_code": 1, "error": format!("{e:#}")}),
        ),
        None => (
            StatusCode::BAD_REQUEST,
            json!({"return_code": 1, "error": format!("{e:#}")}),
        ),
    }
}

fn simulate_sync(cfg: &ScenarioConfig) -> Result<SimulateResponse, ApiError> {
    let traj = cfg.run().map_err(model_error)?;
    log::info!(
        "simulated {} points ({} steps)",
        traj.len(),
        traj.stats.n_accepted
    );
    Ok(SimulateResponse {
        return_code: 0,
        compartments: Compartment::ALL.iter().map(|&c| (c, traj.series(c))).collect(),
        infected_plus_recovered: traj.infected_plus_recovered(),
        n_accepted: traj.stats.n_accepted,
        n_rejected: traj.stats.n_rejected,
        t: traj.t,
    })
}

fn fit_sync(req: &FitRequest) -> Result<FitResponse, ApiError> {
    let (grid, entomology, capacity, cfg) = req.scenario.fit_inputs().map_err(model_error)?;
    let curve = solve_fit(&req.values, &grid, &req.scenario.initial, &entomology, &capacity, &cfg)
        .map_err(|e| model_error(e.into()))?;
    Ok(FitResponse {
        return_code: 0,
        t: grid,
        infected_plus_recovered: curve,
    })
}
