use sqlx::{PgPool, Row};

use crate::error::AppError;

/// Look up a property's base monthly price by external id or internal id.
/// Returns `None` when no row matches; the caller decides how to degrade.
pub async fn find_price_monthly(pool: &PgPool, reference: &str) -> Result<Option<f64>, AppError> {
    let row = sqlx::query(
        "SELECT price_monthly::float8 AS price_monthly
         FROM properties
         WHERE external_id = $1 OR id::text = $1
         LIMIT 1",
    )
    .bind(reference)
    .fetch_optional(pool)
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "Database query failed");
        AppError::Dependency("External service request failed.".to_string())
    })?;

    Ok(row.and_then(|r| r.try_get::<Option<f64>, _>("price_monthly").ok().flatten()))
}
