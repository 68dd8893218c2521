use std::path::Path;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::services::overrides::OverrideMap;
use crate::state::AppState;

/// Liveness plus the two dependencies a quote can touch: the database and
/// the pricing override store.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = match &state.db_pool {
        Some(pool) => db_reachable(pool).await,
        // Catalog-only mode: nothing to ping.
        None => true,
    };
    let override_store_ok =
        override_store_readable(Path::new(&state.config.pricing_overrides_path)).await;

    let status = if db_ok && override_store_ok {
        "ok"
    } else {
        "degraded"
    };
    Json(json!({
        "status": status,
        "now": Utc::now().to_rfc3339(),
        "db": db_ok,
        "override_store": override_store_ok,
    }))
}

async fn db_reachable(pool: &sqlx::PgPool) -> bool {
    // Cap the probe so a stalled first connection cannot hang the endpoint.
    match tokio::time::timeout(
        Duration::from_secs(3),
        sqlx::query("SELECT 1").fetch_one(pool),
    )
    .await
    {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Health check DB query failed");
            false
        }
        Err(_) => {
            tracing::error!("Health check DB query timed out (3s)");
            false
        }
    }
}

/// A missing store file is healthy (the reader treats it as "no overrides").
/// An unreadable or unparseable one is not: the reader would fail open and
/// quietly quote base rates while admins believe their overrides apply.
async fn override_store_readable(path: &Path) -> bool {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice::<OverrideMap>(&bytes).is_ok(),
        Err(e) => e.kind() == std::io::ErrorKind::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::override_store_readable;
    use std::path::Path;

    #[tokio::test]
    async fn missing_store_is_healthy() {
        assert!(override_store_readable(Path::new("/nonexistent/overrides.json")).await);
    }

    #[tokio::test]
    async fn valid_store_is_healthy_and_garbage_is_not() {
        let dir = std::env::temp_dir().join("vivara-health-test");
        let _ = tokio::fs::create_dir_all(&dir).await;

        let good = dir.join("good.json");
        tokio::fs::write(&good, br#"{"villa-serena":{"calendar":{}}}"#)
            .await
            .unwrap();
        assert!(override_store_readable(&good).await);

        let bad = dir.join("bad.json");
        tokio::fs::write(&bad, b"{ not json").await.unwrap();
        assert!(!override_store_readable(&bad).await);
    }
}
