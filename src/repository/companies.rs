use sqlx::PgPool;

use crate::error::{map_db_error, AppResult};
use crate::models::Company;

pub async fn create(pool: &PgPool, name: &str) -> AppResult<Company> {
    sqlx::query_as::<_, Company>(
        "INSERT INTO companies (name) VALUES ($1) RETURNING id, name, created_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn list(pool: &PgPool) -> AppResult<Vec<Company>> {
    sqlx::query_as::<_, Company>("SELECT id, name, created_at FROM companies ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}
