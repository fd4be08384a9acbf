//! Environment-driven configuration
//!
//! Every external collaborator (database, chat model endpoint, geocoder,
//! weather API) is addressed through here so deployments and tests can
//! repoint them without code changes.

use std::env;

use crate::error::{Result, TravelPlannerError};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub geocoding_api_url: String,
    pub weather_api_url: String,
    pub jwt_secret: String,
    /// Shared secret gating admin self-registration.
    pub admin_secret_code: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").map_err(|_| {
            TravelPlannerError::Internal("DATABASE_URL environment variable not set".to_string())
        })?;

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| {
            TravelPlannerError::Internal("JWT_SECRET environment variable not set".to_string())
        })?;

        let admin_secret_code = env::var("ADMIN_SECRET_CODE").map_err(|_| {
            TravelPlannerError::Internal("ADMIN_SECRET_CODE environment variable not set".to_string())
        })?;

        let port: u16 = env::var("PORT")
            .or_else(|_| env::var("API_PORT"))
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|e| TravelPlannerError::Internal(format!("Invalid PORT value: {}", e)))?;

        Ok(Self {
            database_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            llm_api_url: env::var("LLM_API_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
                    .to_string()
            }),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            geocoding_api_url: env::var("GEOCODING_API_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".to_string()),
            weather_api_url: env::var("WEATHER_API_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com/v1/forecast".to_string()),
            jwt_secret,
            admin_secret_code,
        })
    }
}
