use std::sync::Arc;

use tracing::info;

use travel_planner_backend::admin::AdminService;
use travel_planner_backend::api::{start_server, ApiState};
use travel_planner_backend::auth::{AuthService, JwtService};
use travel_planner_backend::chat::ChatService;
use travel_planner_backend::chat_model::ChatModelClient;
use travel_planner_backend::config::Config;
use travel_planner_backend::geocoding::GeocodingClient;
use travel_planner_backend::mode::ModeRecommender;
use travel_planner_backend::places::PlaceRecommender;
use travel_planner_backend::store::PgStore;
use travel_planner_backend::trips::TripService;
use travel_planner_backend::weather::WeatherClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    info!("Travel Planner Backend - API Server");
    info!("Port: {}", config.port);

    // Shared store: one pool behind every repository port
    let store = Arc::new(PgStore::connect(&config.database_url)?);

    // External clients
    let chat_model = Arc::new(ChatModelClient::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
    ));
    let geocoding = Arc::new(GeocodingClient::new(config.geocoding_api_url.clone()));
    let weather = Arc::new(WeatherClient::new(config.weather_api_url.clone()));

    // Services
    let jwt = JwtService::new(&config.jwt_secret);
    let auth = Arc::new(AuthService::new(
        store.clone(),
        jwt.clone(),
        config.admin_secret_code.clone(),
    ));
    let chat = Arc::new(ChatService::new(
        store.clone(),
        store.clone(),
        chat_model.clone(),
    ));
    let place_recommender = Arc::new(PlaceRecommender::new(chat_model.clone(), store.clone()));
    let trips = Arc::new(TripService::new(
        store.clone(),
        store.clone(),
        geocoding,
        weather,
        ModeRecommender::new(chat_model.clone()),
        PlaceRecommender::new(chat_model, store.clone()),
        chat.clone(),
    ));
    let admin = Arc::new(AdminService::new(store.clone(), store.clone(), store.clone()));

    let state = ApiState {
        auth,
        jwt,
        trips,
        chat,
        admin,
        place_recommender,
        places: store,
    };

    info!("Services initialized");
    info!("Starting API server...");

    start_server(state, &config.bind_addr, config.port).await?;

    Ok(())
}
