use axum::{extract::State, response::IntoResponse, Json};
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    repository::payments::{insert_payment_record, NewPaymentRecord},
    repository::reservations::{
        insert_reservation, list_active_for_property, NewReservation, Reservation,
    },
    schemas::{validate_input, CreateBookingInput, StayQuoteInput},
    services::booking_totals::quote_stay,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/bookings/quote", axum::routing::post(quote_booking))
        .route("/bookings", axum::routing::post(create_booking))
}

/// Price a stay without persisting anything: totals plus the remaining
/// monthly rent schedule.
async fn quote_booking(
    State(state): State<AppState>,
    Json(payload): Json<StayQuoteInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let (check_in, check_out) = parse_stay_dates(&payload.check_in, &payload.check_out)?;

    let quote = quote_stay(&state, payload.property_id.as_deref(), check_in, check_out).await;

    Ok(Json(json!({
        "totals": quote.totals,
        "schedule": quote.schedule,
    })))
}

/// Create a booking: a reservation row plus its payment records. The
/// first-period charge, move-in fee and deposit are due now; remaining
/// months are persisted as scheduled rent. Amounts are stored in cents.
async fn create_booking(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;
    let (check_in, check_out) = parse_stay_dates(&payload.check_in, &payload.check_out)?;

    let quote = quote_stay(&state, Some(&payload.property_id), check_in, check_out).await;
    if quote.totals.degraded {
        tracing::warn!(
            property = %payload.property_id,
            reason = quote.totals.degraded_reason.as_deref().unwrap_or("unknown"),
            "Booking created with degraded pricing"
        );
    }

    let existing = list_active_for_property(pool, &payload.property_id).await?;
    if has_overlap(&existing, check_in, check_out) {
        return Err(AppError::Conflict(
            "Selected dates overlap with an existing reservation.".to_string(),
        ));
    }

    let reservation = insert_reservation(
        pool,
        &NewReservation {
            property_external_id: Some(&payload.property_id),
            guest_full_name: &payload.guest_full_name,
            guest_email: payload.guest_email.as_deref(),
            check_in_date: check_in,
            check_out_date: check_out,
        },
    )
    .await?;

    let mut payments = Vec::new();
    let due_now = [
        ("first_period", quote.totals.first_period),
        ("move_in_fee", quote.totals.move_in_fee),
        ("deposit", quote.totals.deposit),
    ];
    for (purpose, amount) in due_now {
        let amount_cents = to_cents(amount);
        if amount_cents == 0 {
            continue;
        }
        let record = insert_payment_record(
            pool,
            &NewPaymentRecord {
                reservation_id: reservation.id,
                purpose,
                amount_cents,
                due_date: Some(check_in),
                status: "due",
                coverage: None,
            },
        )
        .await?;
        payments.push(record);
    }

    for item in &quote.schedule {
        let record = insert_payment_record(
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
        payments.push(record);
    }

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "reservation": reservation,
            "payments": payments,
            "totals": quote.totals,
            "schedule": quote.schedule,
        })),
    ))
}

fn parse_stay_dates(check_in: &str, check_out: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let check_in = NaiveDate::parse_from_str(check_in.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid check-in date.".to_string()))?;
    let check_out = NaiveDate::parse_from_str(check_out.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid check-out date.".to_string()))?;
    if check_out <= check_in {
        return Err(AppError::BadRequest(
            "Check-out must be after check-in.".to_string(),
        ));
    }
    Ok((check_in, check_out))
}

/// Half-open stay ranges conflict when each starts before the other ends;
/// back-to-back stays sharing a changeover day do not.
fn has_overlap(existing: &[Reservation], check_in: NaiveDate, check_out: NaiveDate) -> bool {
    existing
        .iter()
        .any(|r| check_in < r.check_out_date && check_out > r.check_in_date)
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
    use super::{has_overlap, parse_stay_dates, to_cents, Reservation};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn reservation(check_in: NaiveDate, check_out: NaiveDate) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            property_external_id: Some("atico-la-cala".to_string()),
            guest_full_name: "Guest".to_string(),
            guest_email: None,
            check_in_date: check_in,
            check_out_date: check_out,
            status: "confirmed".to_string(),
        }
    }

    #[test]
    fn detects_overlapping_stays() {
        let existing = [reservation(d(2025, 2, 10), d(2025, 2, 20))];

        assert!(has_overlap(&existing, d(2025, 2, 15), d(2025, 2, 25)));
        assert!(has_overlap(&existing, d(2025, 2, 5), d(2025, 2, 11)));
        assert!(has_overlap(&existing, d(2025, 2, 1), d(2025, 3, 1)));
        // Back-to-back changeover days are fine.
        assert!(!has_overlap(&existing, d(2025, 2, 20), d(2025, 2, 28)));
        assert!(!has_overlap(&existing, d(2025, 2, 1), d(2025, 2, 10)));
        assert!(!has_overlap(&[], d(2025, 2, 15), d(2025, 2, 25)));
    }

    #[test]
    fn parses_and_orders_stay_dates() {
        let (check_in, check_out) = parse_stay_dates("2025-01-05", "2025-01-20").expect("valid");
        assert!(check_out > check_in);

        assert!(parse_stay_dates("2025-01-20", "2025-01-05").is_err());
        assert!(parse_stay_dates("2025-01-05", "2025-01-05").is_err());
        assert!(parse_stay_dates("05/01/2025", "2025-01-20").is_err());
    }

    #[test]
    fn converts_major_units_to_cents() {
        assert_eq!(to_cents(0.0), 0);
        assert_eq!(to_cents(1500.0), 150_000);
        assert_eq!(to_cents(96.775), 9678);
    }
}
