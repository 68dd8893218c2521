use std::path::Path as FsPath;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_internal_key,
    catalog,
    error::{AppError, AppResult},
    repository::payments::{
        delete_scheduled_rent, insert_payment_record, list_for_reservation, NewPaymentRecord,
    },
    repository::reservations::get_reservation,
    schemas::{PropertyPath, ReservationPath},
    services::booking_totals::quote_stay,
    services::overrides,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/pricing/overrides/{property_id}",
            axum::routing::get(get_property_overrides),
        )
        .route(
            "/admin/reservations/{reservation_id}/recompute",
            axum::routing::post(recompute_reservation),
        )
}

/// Read-only view of a property's override calendar, as the calculator sees
/// it right now, alongside the catalog listing the overrides layer over.
/// A property with no overrides yields an empty calendar.
async fn get_property_overrides(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
) -> AppResult<Json<Value>> {
    let store =
        overrides::load_overrides(FsPath::new(&state.config.pricing_overrides_path)).await;
    let calendar = overrides::calendar_for(&store, Some(&path.property_id));

    Ok(Json(json!({
        "property_id": path.property_id,
        "listing": listing_summary(&path.property_id),
        "calendar": calendar,
    })))
}

fn listing_summary(property_id: &str) -> Option<Value> {
    catalog::find_by_external_id(property_id).map(|listing| {
        json!({
            "name": listing.name,
            "location": listing.location,
            "price_monthly": listing.price_monthly,
        })
    })
}

/// Recompute a reservation's totals and rent schedule against the current
/// override store, replacing its not-yet-due scheduled rent records.
async fn recompute_reservation(
    State(state): State<AppState>,
    Path(path): Path<ReservationPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;
    let pool = db_pool(&state)?;

    let reservation = get_reservation(pool, &path.reservation_id).await?;
    let quote = quote_stay(
        &state,
        reservation.property_external_id.as_deref(),
        reservation.check_in_date,
        reservation.check_out_date,
    )
    .await;

    let replaced = delete_scheduled_rent(pool, reservation.id).await?;
    for item in &quote.schedule {
        insert_payment_record(
            pool,
            &NewPaymentRecord {
                reservation_id: reservation.id,
                purpose: item.purpose,
                amount_cents: to_cents(item.amount),
                due_date: Some(item.due_at),
                status: "scheduled",
                coverage: Some(&item.coverage),
            },
        )
        .await?;
    }

    let payments = list_for_reservation(pool, reservation.id).await?;

    Ok(Json(json!({
        "reservation": reservation,
        "totals": quote.totals,
        "schedule": quote.schedule,
        "replaced_scheduled_records": replaced,
        "payments": payments,
    })))
}

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::listing_summary;
    use serde_json::Value;

    #[test]
    fn summarizes_catalog_listings() {
        let summary = listing_summary("atico-la-cala").expect("catalog listing");
        assert_eq!(summary["name"], Value::from("Atico La Cala"));
        assert_eq!(summary["location"], Value::from("Mijas Costa"));
        assert_eq!(summary["price_monthly"], Value::from(3000.0));

        assert!(listing_summary("no-such-listing").is_none());
    }
}
