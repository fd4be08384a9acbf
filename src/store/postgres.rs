//! Postgres store
//!
//! Single-pool implementation of every persistence port. The schema is
//! bootstrapped lazily on first use; place upserts ride on a unique index
//! over `(city, lower(name))` so concurrent trips to the same city cannot
//! race the catalogue.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::TravelPlannerError;
use crate::models::{
    ChatHistory, ComfortLevel, NewChatTurn, NewTrip, NewUser, Place, PlaceDraft, Role, Trip,
    TravelMode, User,
};
use crate::store::{ChatStore, PlaceStore, TripStore, UserStore};
use crate::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id BIGSERIAL PRIMARY KEY,
      username TEXT NOT NULL UNIQUE,
      email TEXT NOT NULL UNIQUE,
      password_hash TEXT NOT NULL,
      role TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS famous_places (
      id BIGSERIAL PRIMARY KEY,
      name TEXT NOT NULL,
      description TEXT NOT NULL DEFAULT '',
      city TEXT NOT NULL,
      country TEXT NOT NULL DEFAULT '',
      latitude DOUBLE PRECISION NOT NULL DEFAULT 0,
      longitude DOUBLE PRECISION NOT NULL DEFAULT 0,
      coordinates_known BOOLEAN NOT NULL DEFAULT FALSE,
      category TEXT NOT NULL DEFAULT 'General',
      image_url TEXT,
      entry_fee DOUBLE PRECISION NOT NULL DEFAULT 0,
      recommended_duration_hours INTEGER NOT NULL DEFAULT 2,
      rating DOUBLE PRECISION NOT NULL DEFAULT 4.0,
      best_time_to_visit TEXT
    );
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_famous_places_city_name
    ON famous_places (city, LOWER(name));
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trips (
      id BIGSERIAL PRIMARY KEY,
      user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      source_city TEXT NOT NULL,
      destination_city TEXT NOT NULL,
      source_lat DOUBLE PRECISION NOT NULL,
      source_lng DOUBLE PRECISION NOT NULL,
      dest_lat DOUBLE PRECISION NOT NULL,
      dest_lng DOUBLE PRECISION NOT NULL,
      passengers INTEGER NOT NULL,
      budget DOUBLE PRECISION NOT NULL,
      comfort_level TEXT NOT NULL,
      recommended_mode TEXT NOT NULL,
      distance_estimate_km DOUBLE PRECISION NOT NULL,
      confidence_score DOUBLE PRECISION NOT NULL,
      source_weather TEXT NOT NULL,
      destination_weather TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      conversation_id TEXT
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trip_recommended_places (
      trip_id BIGINT NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
      place_id BIGINT NOT NULL REFERENCES famous_places(id) ON DELETE CASCADE,
      position INTEGER NOT NULL,
      PRIMARY KEY (trip_id, place_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_history (
      id BIGSERIAL PRIMARY KEY,
      user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      user_message TEXT NOT NULL,
      ai_response TEXT NOT NULL,
      conversation_id TEXT NOT NULL,
      timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_chat_history_conversation
    ON chat_history (conversation_id, timestamp, id);
    "#,
];

pub struct PgStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PgStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                TravelPlannerError::DatabaseError(format!("Failed to create pool: {}", e))
            })?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                info!("Database schema ready");
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                TravelPlannerError::DatabaseError(format!("Failed to initialize schema: {}", e))
            })?;

        Ok(())
    }
}

fn db_err(context: &str, e: sqlx::Error) -> TravelPlannerError {
    TravelPlannerError::DatabaseError(format!("{}: {}", context, e))
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role_str: String = row.try_get("role").map_err(|e| db_err("users.role", e))?;
    Ok(User {
        id: row.try_get("id").map_err(|e| db_err("users.id", e))?,
        username: row
            .try_get("username")
            .map_err(|e| db_err("users.username", e))?,
        email: row.try_get("email").map_err(|e| db_err("users.email", e))?,
        password_hash: row
            .try_get("password_hash")
            .map_err(|e| db_err("users.password_hash", e))?,
        role: Role::from_str(&role_str).map_err(TravelPlannerError::Internal)?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| db_err("users.created_at", e))?,
    })
}

fn place_from_row(row: &PgRow) -> Result<Place> {
    Ok(Place {
        id: row.try_get("id").map_err(|e| db_err("famous_places.id", e))?,
        name: row
            .try_get("name")
            .map_err(|e| db_err("famous_places.name", e))?,
        description: row
            .try_get("description")
            .map_err(|e| db_err("famous_places.description", e))?,
        city: row
            .try_get("city")
            .map_err(|e| db_err("famous_places.city", e))?,
        country: row
            .try_get("country")
            .map_err(|e| db_err("famous_places.country", e))?,
        latitude: row
            .try_get("latitude")
            .map_err(|e| db_err("famous_places.latitude", e))?,
        longitude: row
            .try_get("longitude")
            .map_err(|e| db_err("famous_places.longitude", e))?,
        coordinates_known: row
            .try_get("coordinates_known")
            .map_err(|e| db_err("famous_places.coordinates_known", e))?,
        category: row
            .try_get("category")
            .map_err(|e| db_err("famous_places.category", e))?,
        image_url: row
            .try_get("image_url")
            .map_err(|e| db_err("famous_places.image_url", e))?,
        entry_fee: row
            .try_get("entry_fee")
            .map_err(|e| db_err("famous_places.entry_fee", e))?,
        recommended_duration_hours: row
            .try_get("recommended_duration_hours")
            .map_err(|e| db_err("famous_places.recommended_duration_hours", e))?,
        rating: row
            .try_get("rating")
            .map_err(|e| db_err("famous_places.rating", e))?,
        best_time_to_visit: row
            .try_get("best_time_to_visit")
            .map_err(|e| db_err("famous_places.best_time_to_visit", e))?,
    })
}

fn trip_from_row(row: &PgRow, recommended_places: Vec<Place>) -> Result<Trip> {
    let comfort_str: String = row
        .try_get("comfort_level")
        .map_err(|e| db_err("trips.comfort_level", e))?;
    let mode_str: String = row
        .try_get("recommended_mode")
        .map_err(|e| db_err("trips.recommended_mode", e))?;

    Ok(Trip {
        id: row.try_get("id").map_err(|e| db_err("trips.id", e))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| db_err("trips.user_id", e))?,
        username: row
            .try_get("username")
            .map_err(|e| db_err("trips.username", e))?,
        source_city: row
            .try_get("source_city")
            .map_err(|e| db_err("trips.source_city", e))?,
        destination_city: row
            .try_get("destination_city")
            .map_err(|e| db_err("trips.destination_city", e))?,
        source_lat: row
            .try_get("source_lat")
            .map_err(|e| db_err("trips.source_lat", e))?,
        source_lng: row
            .try_get("source_lng")
            .map_err(|e| db_err("trips.source_lng", e))?,
        dest_lat: row
            .try_get("dest_lat")
            .map_err(|e| db_err("trips.dest_lat", e))?,
        dest_lng: row
            .try_get("dest_lng")
            .map_err(|e| db_err("trips.dest_lng", e))?,
        passengers: row
            .try_get("passengers")
            .map_err(|e| db_err("trips.passengers", e))?,
        budget: row.try_get("budget").map_err(|e| db_err("trips.budget", e))?,
        comfort_level: ComfortLevel::from_str(&comfort_str).map_err(TravelPlannerError::Internal)?,
        recommended_mode: TravelMode::from_str(&mode_str).map_err(TravelPlannerError::Internal)?,
        distance_estimate_km: row
            .try_get("distance_estimate_km")
            .map_err(|e| db_err("trips.distance_estimate_km", e))?,
        confidence_score: row
            .try_get("confidence_score")
            .map_err(|e| db_err("trips.confidence_score", e))?,
        source_weather: row
            .try_get("source_weather")
            .map_err(|e| db_err("trips.source_weather", e))?,
        destination_weather: row
            .try_get("destination_weather")
            .map_err(|e| db_err("trips.destination_weather", e))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| db_err("trips.created_at", e))?,
        conversation_id: row
            .try_get("conversation_id")
            .map_err(|e| db_err("trips.conversation_id", e))?,
        recommended_places,
    })
}

fn chat_from_row(row: &PgRow) -> Result<ChatHistory> {
    Ok(ChatHistory {
        id: row.try_get("id").map_err(|e| db_err("chat_history.id", e))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| db_err("chat_history.user_id", e))?,
        username: row
            .try_get("username")
            .map_err(|e| db_err("chat_history.username", e))?,
        user_message: row
            .try_get("user_message")
            .map_err(|e| db_err("chat_history.user_message", e))?,
        ai_response: row
            .try_get("ai_response")
            .map_err(|e| db_err("chat_history.ai_response", e))?,
        conversation_id: row
            .try_get("conversation_id")
            .map_err(|e| db_err("chat_history.conversation_id", e))?,
        timestamp: row
            .try_get("timestamp")
            .map_err(|e| db_err("chat_history.timestamp", e))?,
    })
}

const TRIP_SELECT: &str = r#"
    SELECT t.id, t.user_id, u.username, t.source_city, t.destination_city,
           t.source_lat, t.source_lng, t.dest_lat, t.dest_lng,
           t.passengers, t.budget, t.comfort_level, t.recommended_mode,
           t.distance_estimate_km, t.confidence_score,
           t.source_weather, t.destination_weather,
           t.created_at, t.conversation_id
    FROM trips t
    JOIN users u ON u.id = t.user_id
"#;

const CHAT_SELECT: &str = r#"
    SELECT c.id, c.user_id, u.username, c.user_message, c.ai_response,
           c.conversation_id, c.timestamp
    FROM chat_history c
    JOIN users u ON u.id = c.user_id
"#;

impl PgStore {
    async fn places_for_trip(&self, trip_id: i64) -> Result<Vec<Place>> {
        let rows = sqlx::query(
            r#"
            SELECT p.* FROM famous_places p
            JOIN trip_recommended_places tp ON tp.place_id = p.id
            WHERE tp.trip_id = $1
            ORDER BY tp.position ASC
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to load trip places", e))?;

        rows.iter().map(place_from_row).collect()
    }

    async fn trips_from_rows(&self, rows: Vec<PgRow>) -> Result<Vec<Trip>> {
        let mut trips = Vec::with_capacity(rows.len());
        for row in &rows {
            let trip_id: i64 = row.try_get("id").map_err(|e| db_err("trips.id", e))?;
            let places = self.places_for_trip(trip_id).await?;
            trips.push(trip_from_row(row, places)?);
        }
        Ok(trips)
    }
}

#[async_trait::async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, role, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to insert user", e))?;

        user_from_row(&row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to load user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to load user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT 1 AS hit FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to check username", e))?;

        Ok(row.is_some())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT 1 AS hit FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to check email", e))?;

        Ok(row.is_some())
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        self.ensure_schema().await?;

        let rows = sqlx::query("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list users", e))?;

        rows.iter().map(user_from_row).collect()
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        self.ensure_schema().await?;

        // Trips and chat history go with the user via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete user", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl TripStore for PgStore {
    async fn insert_trip(&self, trip: NewTrip) -> Result<Trip> {
        self.ensure_schema().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin trip transaction", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO trips
              (user_id, source_city, destination_city, source_lat, source_lng,
               dest_lat, dest_lng, passengers, budget, comfort_level,
               recommended_mode, distance_estimate_km, confidence_score,
               source_weather, destination_weather, conversation_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id, created_at
            "#,
        )
        .bind(trip.user_id)
        .bind(&trip.source_city)
        .bind(&trip.destination_city)
        .bind(trip.source_lat)
        .bind(trip.source_lng)
        .bind(trip.dest_lat)
        .bind(trip.dest_lng)
        .bind(trip.passengers)
        .bind(trip.budget)
        .bind(trip.comfort_level.to_string())
        .bind(trip.recommended_mode.to_string())
        .bind(trip.distance_estimate_km)
        .bind(trip.confidence_score)
        .bind(&trip.source_weather)
        .bind(&trip.destination_weather)
        .bind(&trip.conversation_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to insert trip", e))?;

        let trip_id: i64 = row.try_get("id").map_err(|e| db_err("trips.id", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| db_err("trips.created_at", e))?;

        for (position, place_id) in trip.recommended_place_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO trip_recommended_places (trip_id, place_id, position)
                VALUES ($1, $2, $3)
                ON CONFLICT (trip_id, place_id) DO NOTHING
                "#,
            )
            .bind(trip_id)
            .bind(place_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to link recommended place", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit trip transaction", e))?;

        let places = self.places_for_trip(trip_id).await?;

        Ok(Trip {
            id: trip_id,
            user_id: trip.user_id,
            username: trip.username,
            source_city: trip.source_city,
            destination_city: trip.destination_city,
            source_lat: trip.source_lat,
            source_lng: trip.source_lng,
            dest_lat: trip.dest_lat,
            dest_lng: trip.dest_lng,
            passengers: trip.passengers,
            budget: trip.budget,
            comfort_level: trip.comfort_level,
            recommended_mode: trip.recommended_mode,
            distance_estimate_km: trip.distance_estimate_km,
            confidence_score: trip.confidence_score,
            source_weather: trip.source_weather,
            destination_weather: trip.destination_weather,
            created_at,
            conversation_id: trip.conversation_id,
            recommended_places: places,
        })
    }

    async fn trip_by_id(&self, id: i64) -> Result<Option<Trip>> {
        self.ensure_schema().await?;

        let query = format!("{} WHERE t.id = $1", TRIP_SELECT);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to load trip", e))?;

        match row {
            Some(row) => {
                let places = self.places_for_trip(id).await?;
                Ok(Some(trip_from_row(&row, places)?))
            }
            None => Ok(None),
        }
    }

    async fn trips_for_username(&self, username: &str) -> Result<Vec<Trip>> {
        self.ensure_schema().await?;

        let query = format!("{} WHERE u.username = $1 ORDER BY t.id ASC", TRIP_SELECT);
        let rows = sqlx::query(&query)
            .bind(username)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list user trips", e))?;

        self.trips_from_rows(rows).await
    }

    async fn trips_for_user_id(&self, user_id: i64) -> Result<Vec<Trip>> {
        self.ensure_schema().await?;

        let query = format!("{} WHERE t.user_id = $1 ORDER BY t.id ASC", TRIP_SELECT);
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list user trips", e))?;

        self.trips_from_rows(rows).await
    }

    async fn all_trips(&self) -> Result<Vec<Trip>> {
        self.ensure_schema().await?;

        let query = format!("{} ORDER BY t.id ASC", TRIP_SELECT);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list trips", e))?;

        self.trips_from_rows(rows).await
    }

    async fn delete_trip(&self, id: i64) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete trip", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_conversation(&self, conversation_id: &str) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query("UPDATE trips SET conversation_id = NULL WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to clear trip conversation", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl PlaceStore for PgStore {
    async fn places_by_city(&self, city: &str) -> Result<Vec<Place>> {
        self.ensure_schema().await?;

        let rows = sqlx::query("SELECT * FROM famous_places WHERE city = $1 ORDER BY id ASC")
            .bind(city)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list city places", e))?;

        rows.iter().map(place_from_row).collect()
    }

    async fn top_rated_in_city(&self, city: &str, min_rating: f64) -> Result<Vec<Place>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM famous_places
            WHERE city = $1 AND rating >= $2
            ORDER BY rating DESC, id ASC
            "#,
        )
        .bind(city)
        .bind(min_rating)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list top rated places", e))?;

        rows.iter().map(place_from_row).collect()
    }

    async fn upsert_places(
        &self,
        city: &str,
        country: &str,
        drafts: Vec<PlaceDraft>,
    ) -> Result<Vec<Place>> {
        self.ensure_schema().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin place transaction", e))?;

        let mut results = Vec::with_capacity(drafts.len());

        for draft in &drafts {
            let row = sqlx::query(
                r#"
                INSERT INTO famous_places
                  (name, city, country, description, category, entry_fee,
                   recommended_duration_hours, rating, latitude, longitude, coordinates_known)
                VALUES ($1, $2, $3, COALESCE($4, ''), COALESCE($5, 'General'),
                        COALESCE($6, 0), COALESCE($7, 2), 4.0, 0, 0, FALSE)
                ON CONFLICT (city, LOWER(name)) DO UPDATE SET
                  description = COALESCE($4, famous_places.description),
                  category = COALESCE($5, famous_places.category),
                  entry_fee = COALESCE($6, famous_places.entry_fee),
                  recommended_duration_hours =
                    COALESCE($7, famous_places.recommended_duration_hours)
                RETURNING *
                "#,
            )
            .bind(&draft.name)
            .bind(city)
            .bind(country)
            .bind(&draft.description)
            .bind(&draft.category)
            .bind(draft.entry_fee)
            .bind(draft.recommended_duration_hours)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to upsert place", e))?;

            results.push(place_from_row(&row)?);
        }

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit place transaction", e))?;

        Ok(results)
    }
}

#[async_trait::async_trait]
impl ChatStore for PgStore {
    async fn insert_turn(&self, turn: NewChatTurn) -> Result<ChatHistory> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO chat_history (user_id, user_message, ai_response, conversation_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, timestamp
            "#,
        )
        .bind(turn.user_id)
        .bind(&turn.user_message)
        .bind(&turn.ai_response)
        .bind(&turn.conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to insert chat turn", e))?;

        Ok(ChatHistory {
            id: row.try_get("id").map_err(|e| db_err("chat_history.id", e))?,
            user_id: turn.user_id,
            username: turn.username,
            user_message: turn.user_message,
            ai_response: turn.ai_response,
            conversation_id: turn.conversation_id,
            timestamp: row
                .try_get("timestamp")
                .map_err(|e| db_err("chat_history.timestamp", e))?,
        })
    }

    async fn turns_for_user(&self, username: &str) -> Result<Vec<ChatHistory>> {
        self.ensure_schema().await?;

        let query = format!(
            "{} WHERE u.username = $1 ORDER BY c.timestamp ASC, c.id ASC",
            CHAT_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(username)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list user chats", e))?;

        rows.iter().map(chat_from_row).collect()
    }

    async fn turns_for_user_conversation(
        &self,
        username: &str,
        conversation_id: &str,
    ) -> Result<Vec<ChatHistory>> {
        self.ensure_schema().await?;

        let query = format!(
            "{} WHERE u.username = $1 AND c.conversation_id = $2 ORDER BY c.timestamp ASC, c.id ASC",
            CHAT_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(username)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to load conversation", e))?;

        rows.iter().map(chat_from_row).collect()
    }

    async fn turns_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatHistory>> {
        self.ensure_schema().await?;

        let query = format!(
            "{} WHERE c.conversation_id = $1 ORDER BY c.timestamp ASC, c.id ASC",
            CHAT_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to load conversation", e))?;

        rows.iter().map(chat_from_row).collect()
    }

    async fn turns_for_user_id(&self, user_id: i64) -> Result<Vec<ChatHistory>> {
        self.ensure_schema().await?;

        let query = format!(
            "{} WHERE c.user_id = $1 ORDER BY c.timestamp ASC, c.id ASC",
            CHAT_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list user chats", e))?;

        rows.iter().map(chat_from_row).collect()
    }

    async fn all_turns(&self) -> Result<Vec<ChatHistory>> {
        self.ensure_schema().await?;

        let query = format!("{} ORDER BY c.timestamp ASC, c.id ASC", CHAT_SELECT);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list chats", e))?;

        rows.iter().map(chat_from_row).collect()
    }

    async fn delete_turn(&self, id: i64) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM chat_history WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete chat turn", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<u64> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM chat_history WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete conversation", e))?;

        Ok(result.rows_affected())
    }
}
