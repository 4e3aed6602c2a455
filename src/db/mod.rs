pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;

#[cfg(test)]
pub mod testing {
    //! Shared fixtures: an in-memory database with migrations applied and a
    //! minimal booking graph (client, professional, salon owner, salon,
    //! service).

    use std::str::FromStr;

    use chrono::Utc;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;

    use crate::config::BookingConfig;

    pub async fn pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("valid sqlite url")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("open in-memory database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");

        pool
    }

    pub fn booking_config() -> BookingConfig {
        BookingConfig {
            create_max_attempts: 3,
            // No real backoff in tests.
            create_initial_backoff_seconds: 0,
            code_regeneration_attempts: 3,
        }
    }

    pub async fn seed_profile(pool: &SqlitePool, id: &str, name: &str, agenda_enabled: bool) {
        sqlx::query(
            "INSERT INTO profiles (id, name, agenda_enabled, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(agenda_enabled)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .expect("seed profile");
    }

    pub async fn seed_salon(pool: &SqlitePool, id: &str, name: &str, owner_id: &str) {
        sqlx::query("INSERT INTO salons (id, name, owner_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(owner_id)
            .bind(Utc::now().naive_utc())
            .execute(pool)
            .await
            .expect("seed salon");
    }

    pub async fn seed_service(pool: &SqlitePool, id: &str, salon_id: Option<&str>, name: &str) {
        sqlx::query(
            r#"
            INSERT INTO services (id, salon_id, name, duration_minutes, price, created_at)
            VALUES (?, ?, ?, 30, 50.0, ?)
            "#,
        )
        .bind(id)
        .bind(salon_id)
        .bind(name)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .expect("seed service");
    }

    /// Client "client-1", professional "pro-1" (agenda enabled), owner
    /// "owner-1", salon "salon-1" and service "svc-1" (Haircut).
    pub async fn seed_booking_graph(pool: &SqlitePool) {
        seed_profile(pool, "client-1", "Ana", true).await;
        seed_profile(pool, "pro-1", "Bia", true).await;
        seed_profile(pool, "owner-1", "Carla", true).await;
        seed_salon(pool, "salon-1", "Studio Glow", "owner-1").await;
        seed_service(pool, "svc-1", Some("salon-1"), "Haircut").await;
    }
}
