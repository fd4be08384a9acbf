//! REST API server
//!
//! Routes, handlers and the auth middleware. Handlers stay thin: decode,
//! delegate to a service, project to a response document. Domain errors map
//! to the `{"error": msg}` envelope here and nowhere else.

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::admin::AdminService;
use crate::auth::{AuthService, AuthUser, JwtService, Registration};
use crate::chat::ChatService;
use crate::dto::{
    AdminRegisterRequest, AiRecommendationQuery, AuthResponse, ChatRequest, ChatTurn,
    ConversationDeleteResponse, ConversationStatsResponse, DeletedUserResponse, LoginRequest,
    PlaceRecommendationResponse, PlaceSummary, RegisterRequest, TripRequest, TripResponse,
    UserProfile,
};
use crate::error::TravelPlannerError;
use crate::models::Role;
use crate::places::PlaceRecommender;
use crate::store::PlaceStore;
use crate::trips::TripService;

const TOP_RATED_THRESHOLD: f64 = 4.0;
const DEFAULT_RECOMMENDATION_DURATION: i32 = 3;

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthService>,
    pub jwt: JwtService,
    pub trips: Arc<TripService>,
    pub chat: Arc<ChatService>,
    pub admin: Arc<AdminService>,
    pub place_recommender: Arc<PlaceRecommender>,
    pub places: Arc<dyn PlaceStore>,
}

/// =============================
/// Error Mapping
/// =============================

fn status_for(error: &TravelPlannerError) -> StatusCode {
    match error {
        TravelPlannerError::ValidationError(_) | TravelPlannerError::Conflict(_) => {
            StatusCode::BAD_REQUEST
        }
        TravelPlannerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        TravelPlannerError::Forbidden(_) => StatusCode::FORBIDDEN,
        TravelPlannerError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for TravelPlannerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        // Client errors carry their message; everything else stays generic
        // with details in the log.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Internal error serving request: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// =============================
/// Auth Middleware
/// =============================

async fn auth_middleware(
    State(state): State<ApiState>,
    mut req: Request,
    next: Next,
) -> Result<Response, TravelPlannerError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| TravelPlannerError::Unauthorized("Missing bearer token".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| TravelPlannerError::Unauthorized("Missing bearer token".to_string()))?;

    let auth_user = state.jwt.auth_user(token)?;
    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}

fn require_admin(auth_user: &AuthUser) -> Result<(), TravelPlannerError> {
    if auth_user.role != Role::Admin {
        return Err(TravelPlannerError::Forbidden(
            "Admin access required".to_string(),
        ));
    }
    Ok(())
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Auth Endpoints
/// =============================

async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, TravelPlannerError> {
    let (token, user) = state
        .auth
        .register(Registration {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

async fn register_admin(
    State(state): State<ApiState>,
    Json(req): Json<AdminRegisterRequest>,
) -> Result<Json<AuthResponse>, TravelPlannerError> {
    let (token, user) = state
        .auth
        .register_admin(
            Registration {
                username: req.username,
                email: req.email,
                password: req.password,
            },
            &req.admin_secret_code,
        )
        .await?;

    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, TravelPlannerError> {
    let (token, user) = state.auth.login(&req.username, &req.password).await?;

    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

/// =============================
/// Trip Endpoints
/// =============================

async fn create_trip(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<TripRequest>,
) -> Result<Json<TripResponse>, TravelPlannerError> {
    let plan = req.into_plan_request()?;
    let trip = state.trips.create_trip(plan, &auth_user.username).await?;
    Ok(Json(TripResponse::from(&trip)))
}

async fn list_trips(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<TripResponse>>, TravelPlannerError> {
    let trips = state.trips.user_trips(&auth_user.username).await?;
    Ok(Json(trips.iter().map(TripResponse::from).collect()))
}

async fn get_trip(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<TripResponse>, TravelPlannerError> {
    let trip = state.trips.user_trip(id, &auth_user.username).await?;
    Ok(Json(TripResponse::from(&trip)))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn send_chat_message(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatTurn>, TravelPlannerError> {
    if req.message.trim().is_empty() {
        return Err(TravelPlannerError::ValidationError(
            "Message is required".to_string(),
        ));
    }

    let turn = state
        .chat
        .process_message(&req.message, &auth_user.username, req.conversation_id.as_deref())
        .await?;

    Ok(Json(ChatTurn::from(&turn)))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    conversation_id: Option<String>,
}

async fn chat_history(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatTurn>>, TravelPlannerError> {
    let turns = state
        .chat
        .history(&auth_user.username, query.conversation_id.as_deref())
        .await?;

    Ok(Json(turns.iter().map(ChatTurn::from).collect()))
}

/// =============================
/// Place Endpoints
/// =============================

async fn places_by_city(
    State(state): State<ApiState>,
    Path(city): Path<String>,
) -> Result<Json<Vec<PlaceSummary>>, TravelPlannerError> {
    let places = state.places.places_by_city(&city).await?;
    Ok(Json(places.iter().map(PlaceSummary::from).collect()))
}

async fn top_rated_places(
    State(state): State<ApiState>,
    Path(city): Path<String>,
) -> Result<Json<Vec<PlaceSummary>>, TravelPlannerError> {
    let places = state
        .places
        .top_rated_in_city(&city, TOP_RATED_THRESHOLD)
        .await?;
    Ok(Json(places.iter().map(PlaceSummary::from).collect()))
}

async fn ai_recommendations(
    State(state): State<ApiState>,
    Query(query): Query<AiRecommendationQuery>,
) -> Result<Json<PlaceRecommendationResponse>, TravelPlannerError> {
    if query.city.trim().is_empty() {
        return Err(TravelPlannerError::ValidationError(
            "City is required".to_string(),
        ));
    }

    let interests = query.interests_list();
    let recommendation = state
        .place_recommender
        .recommend(
            &query.city,
            &interests,
            query.duration.unwrap_or(DEFAULT_RECOMMENDATION_DURATION),
            query.budget.unwrap_or(0.0),
            query.companions.as_deref().unwrap_or("solo"),
        )
        .await?;

    Ok(Json(PlaceRecommendationResponse::from(&recommendation)))
}

/// =============================
/// Admin Endpoints
/// =============================

async fn admin_users(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<UserProfile>>, TravelPlannerError> {
    require_admin(&auth_user)?;
    let users = state.admin.all_users().await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

async fn admin_trips(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<TripResponse>>, TravelPlannerError> {
    require_admin(&auth_user)?;
    let trips = state.admin.all_trips().await?;
    Ok(Json(trips.iter().map(TripResponse::from).collect()))
}

async fn admin_chats(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<ChatTurn>>, TravelPlannerError> {
    require_admin(&auth_user)?;
    let chats = state.admin.all_chats().await?;
    Ok(Json(chats.iter().map(ChatTurn::from).collect()))
}

async fn admin_user_trips(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<TripResponse>>, TravelPlannerError> {
    require_admin(&auth_user)?;
    let trips = state.admin.user_trips(user_id).await?;
    Ok(Json(trips.iter().map(TripResponse::from).collect()))
}

async fn admin_user_chats(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ChatTurn>>, TravelPlannerError> {
    require_admin(&auth_user)?;
    let chats = state.admin.user_chats(user_id).await?;
    Ok(Json(chats.iter().map(ChatTurn::from).collect()))
}

async fn admin_delete_user(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<DeletedUserResponse>, TravelPlannerError> {
    require_admin(&auth_user)?;
    state.admin.delete_user(user_id).await?;

    Ok(Json(DeletedUserResponse {
        message: "User deleted successfully".to_string(),
        deleted_user_id: user_id,
    }))
}

async fn admin_delete_trip(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(trip_id): Path<i64>,
) -> Result<Json<serde_json::Value>, TravelPlannerError> {
    require_admin(&auth_user)?;
    state.admin.delete_trip(trip_id).await?;
    Ok(Json(json!({ "deletedTripId": trip_id })))
}

async fn admin_delete_chat(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(chat_id): Path<i64>,
) -> Result<Json<serde_json::Value>, TravelPlannerError> {
    require_admin(&auth_user)?;
    state.admin.delete_chat(chat_id).await?;
    Ok(Json(json!({ "deletedChatId": chat_id })))
}

async fn admin_conversation_stats(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationStatsResponse>, TravelPlannerError> {
    require_admin(&auth_user)?;
    let stats = state.admin.conversation_stats(&conversation_id).await?;
    Ok(Json(ConversationStatsResponse::from(&stats)))
}

async fn admin_delete_conversation(
    State(state): State<ApiState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationDeleteResponse>, TravelPlannerError> {
    require_admin(&auth_user)?;
    let (stats, deleted) = state.admin.delete_conversation(&conversation_id).await?;

    Ok(Json(ConversationDeleteResponse {
        stats: ConversationStatsResponse::from(&stats),
        deleted,
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/trips", post(create_trip).get(list_trips))
        .route("/trips/:id", get(get_trip))
        .route("/chat", post(send_chat_message))
        .route("/chat/history", get(chat_history))
        .route("/places/city/:city", get(places_by_city))
        .route("/places/city/:city/top-rated", get(top_rated_places))
        .route("/places/ai-recommendations", get(ai_recommendations))
        .route("/admin/users", get(admin_users))
        .route("/admin/trips", get(admin_trips))
        .route("/admin/chats", get(admin_chats))
        .route("/admin/users/:id/trips", get(admin_user_trips))
        .route("/admin/users/:id/chats", get(admin_user_chats))
        .route("/admin/users/:id", delete(admin_delete_user))
        .route("/admin/trips/:id", delete(admin_delete_trip))
        .route("/admin/chats/:id", delete(admin_delete_chat))
        .route(
            "/admin/conversations/:id/stats",
            get(admin_conversation_stats),
        )
        .route(
            "/admin/conversations/:id",
            delete(admin_delete_conversation),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/register-admin", post(register_admin))
        .route("/auth/login", post(login));

    Router::new()
        .route("/health", get(health))
        .nest("/api", public.merge(protected))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    bind_addr: &str,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port)).await?;

    info!("API Server listening on http://{}:{}", bind_addr, port);

    axum::serve(listener, router).await?;

    Ok(())
}
