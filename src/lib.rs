//! Travel Planner Backend
//!
//! An authenticated travel-planning API that:
//! - Synthesises trip plans by fanning out to geocoding, weather and a chat model
//! - Coerces free-form model output into typed recommendations
//! - Degrades gracefully: every external call has its own fallback
//! - Persists trips, places and conversations relationally
//! - Supports follow-up chat about a planned trip
//!
//! PIPELINE:
//! REQUEST → GEOCODE ×2 → WEATHER ×2 → (MODE ∥ PLACES) → CHAT TURNS → TRIP

pub mod admin;
pub mod ai_adapter;
pub mod api;
pub mod auth;
pub mod chat;
pub mod chat_model;
pub mod config;
pub mod dto;
pub mod error;
pub mod geocoding;
pub mod mode;
pub mod models;
pub mod places;
pub mod store;
pub mod trips;
pub mod weather;

pub use error::Result;

// Re-export common types
pub use models::*;
