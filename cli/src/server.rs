use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use tally_core::error::Error as CoreError;
use tally_core::models::{
    BodyMovementReflection, CustomGoal, GoalReflection, NewReflection, ScreenTimeReflection,
    TaskView, UserIdentity,
};
use tally_core::service::TallyService;

use crate::commands::helpers::local_identity;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
pub struct AppState {
    service: Arc<Mutex<TallyService>>,
    require_auth: bool,
}

impl AppState {
    pub fn new(service: TallyService, require_auth: bool) -> Self {
        AppState {
            service: Arc::new(Mutex::new(service)),
            require_auth,
        }
    }
}

// --- Request / Response types ---

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Save payload for the current-week task. `screen_time_target` distinguishes
/// "absent" (leave untouched) from an explicit null (clear the target).
#[derive(Deserialize)]
struct SaveTaskRequest {
    custom_goals: Option<Vec<CustomGoal>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    screen_time_target: Option<Option<f64>>,
}

#[derive(Deserialize)]
struct UpdateGoalRequest {
    target: String,
    input: String,
}

#[derive(Deserialize)]
struct SubmitReflectionRequest {
    custom_goal_reflections: Vec<GoalReflection>,
    screen_time_reflection: ScreenTimeReflection,
    body_movement_reflection: BodyMovementReflection,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct PreviousReflectionResponse {
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reflection: Option<tally_core::models::Reflection>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::BadRequest(msg),
            CoreError::NotFound(msg) => Self::NotFound(msg),
            CoreError::DuplicateSubmission => {
                Self::Conflict("Reflection already submitted for this week".to_string())
            }
            err @ (CoreError::Store(_) | CoreError::Serde(_)) => Self::Internal(err.into()),
        }
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let identity = if state.require_auth {
        let token = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token {
            Some(token) => {
                let service = state
                    .service
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                match service.user_by_token(token) {
                    Ok(Some(user)) => Some(UserIdentity::from(&user)),
                    Ok(None) => None,
                    Err(err) => {
                        return ApiError::Internal(err.into()).into_response();
                    }
                }
            }
            None => None,
        }
    } else {
        // --no-auth mode: every request acts as the local default user
        let service = state
            .service
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match local_identity(&service) {
            Ok(identity) => Some(identity),
            Err(err) => return ApiError::Internal(err).into_response(),
        }
    };

    match identity {
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or missing API token".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Task handlers ---

async fn get_current_week_task(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<TaskView>, ApiError> {
    let today = Local::now().date_naive();
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let view = service.current_week_task(identity.user_id, today)?;
    Ok(Json(view))
}

async fn save_current_week_task(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<SaveTaskRequest>,
) -> Result<Json<TaskView>, ApiError> {
    let today = Local::now().date_naive();
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let task = service.save_current_week_task(
        identity.user_id,
        today,
        req.custom_goals,
        req.screen_time_target,
    )?;
    Ok(Json(TaskView::from(task)))
}

async fn update_custom_goal(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(index): Path<usize>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<Json<CustomGoal>, ApiError> {
    let today = Local::now().date_naive();
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let goal = service.update_custom_goal(
        identity.user_id,
        today,
        index,
        CustomGoal {
            target: req.target,
            input: req.input,
        },
    )?;
    Ok(Json(goal))
}

async fn delete_custom_goal(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(index): Path<usize>,
) -> Result<StatusCode, ApiError> {
    let today = Local::now().date_naive();
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    service.remove_custom_goal(identity.user_id, today, index)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Reflection handlers ---

async fn get_previous_week_task(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<TaskView>, ApiError> {
    let today = Local::now().date_naive();
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let task = service.previous_week_task(identity.user_id, today)?;
    Ok(Json(TaskView::from(task)))
}

async fn get_previous_week_reflection(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<PreviousReflectionResponse>, ApiError> {
    let today = Local::now().date_naive();
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let reflection = service.previous_week_reflection(identity.user_id, today)?;
    Ok(Json(PreviousReflectionResponse {
        exists: reflection.is_some(),
        reflection,
    }))
}

async fn submit_reflection(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<SubmitReflectionRequest>,
) -> Result<(StatusCode, Json<tally_core::service::SubmissionOutcome>), ApiError> {
    let today = Local::now().date_naive();
    let submission = NewReflection {
        custom_goal_reflections: req.custom_goal_reflections,
        screen_time_reflection: req.screen_time_reflection,
        body_movement_reflection: req.body_movement_reflection,
    };
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let outcome = service.submit_reflection(&identity, today, &submission)?;
    tracing::info!(
        user = identity.user_id,
        percentage = outcome.completion_percentage,
        "reflection submitted"
    );
    Ok((StatusCode::CREATED, Json(outcome)))
}

// --- Leaderboard handler (public) ---

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Vec<tally_core::models::RankedEntry>>, ApiError> {
    let limit = params.limit.unwrap_or(100);
    if limit <= 0 {
        return Err(ApiError::BadRequest(
            "limit must be greater than 0".to_string(),
        ));
    }
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let board = service.leaderboard(limit)?;
    Ok(Json(board))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/tasks/current-week",
            get(get_current_week_task).post(save_current_week_task),
        )
        .route(
            "/api/tasks/custom-goal/{index}",
            put(update_custom_goal).delete(delete_custom_goal),
        )
        .route(
            "/api/reflections/previous-week-task",
            get(get_previous_week_task),
        )
        .route(
            "/api/reflections/previous-week",
            get(get_previous_week_reflection),
        )
        .route("/api/reflections/submit", post(submit_reflection))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        // The leaderboard is public, like the original service
        .route("/api/leaderboard", get(get_leaderboard))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: TallyService,
    port: u16,
    bind: &str,
    require_auth: bool,
) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if require_auth {
        let users = service.list_users()?;
        if users.is_empty() {
            eprintln!(
                "Warning: no users provisioned. Add one with `tally user add <name> <email>` \
                 and use its token as `Authorization: Bearer <token>`."
            );
        } else {
            let count = users.len();
            eprintln!("{count} user token(s) provisioned (see `tally user list`)");
        }
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && !require_auth {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let state = AppState::new(service, require_auth);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
