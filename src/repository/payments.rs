use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;

/// A payment record row. Amounts are stored in integer minor units (cents);
/// the calculator works in major units and the routes convert at the edge.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub purpose: String,
    pub amount_cents: i64,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub coverage: Option<String>,
}

pub struct NewPaymentRecord<'a> {
    pub reservation_id: Uuid,
    pub purpose: &'a str,
    pub amount_cents: i64,
    pub due_date: Option<NaiveDate>,
    pub status: &'a str,
    pub coverage: Option<&'a str>,
}

pub async fn insert_payment_record(
    pool: &PgPool,
    input: &NewPaymentRecord<'_>,
) -> Result<PaymentRecord, AppError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO payment_records
             (id, reservation_id, purpose, amount_cents, due_date, status, coverage)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(input.reservation_id)
    .bind(input.purpose)
    .bind(input.amount_cents)
    .bind(input.due_date)
    .bind(input.status)
    .bind(input.coverage)
    .execute(pool)
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "Database query failed");
        AppError::Dependency("External service request failed.".to_string())
    })?;

    Ok(PaymentRecord {
        id,
        reservation_id: input.reservation_id,
        purpose: input.purpose.to_string(),
        amount_cents: input.amount_cents,
        due_date: input.due_date,
        status: input.status.to_string(),
        coverage: input.coverage.map(ToOwned::to_owned),
    })
}

pub async fn list_for_reservation(
    pool: &PgPool,
    reservation_id: Uuid,
) -> Result<Vec<PaymentRecord>, AppError> {
    let rows = sqlx::query(
        "SELECT id, reservation_id, purpose, amount_cents, due_date, status, coverage
         FROM payment_records
         WHERE reservation_id = $1
         ORDER BY due_date NULLS FIRST, purpose",
    )
    .bind(reservation_id)
    .fetch_all(pool)
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "Database query failed");
        AppError::Dependency("External service request failed.".to_string())
    })?;

    Ok(rows.into_iter().filter_map(read_record).collect())
}

/// Remove a reservation's not-yet-due scheduled rent records. Used by the
/// admin recompute flow before reinserting the fresh schedule; paid or
/// pending records are left untouched.
pub async fn delete_scheduled_rent(
    pool: &PgPool,
    reservation_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM payment_records
         WHERE reservation_id = $1 AND purpose = 'monthly_rent' AND status = 'scheduled'",
    )
    .bind(reservation_id)
    .execute(pool)
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "Database query failed");
        AppError::Dependency("External service request failed.".to_string())
    })?;

    Ok(result.rows_affected())
}

fn read_record(row: sqlx::postgres::PgRow) -> Option<PaymentRecord> {
    Some(PaymentRecord {
        id: row.try_get("id").ok()?,
        reservation_id: row.try_get("reservation_id").ok()?,
        purpose: row.try_get("purpose").ok()?,
        amount_cents: row.try_get("amount_cents").ok()?,
        due_date: row.try_get("due_date").unwrap_or(None),
        status: row.try_get("status").unwrap_or_default(),
        coverage: row.try_get("coverage").unwrap_or(None),
    })
}
