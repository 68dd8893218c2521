use chrono::NaiveDate;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;

/// Reservation statuses that block a property's calendar.
const ACTIVE_STATUSES: &[&str] = &["pending", "confirmed", "checked_in"];

#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub id: Uuid,
    pub property_external_id: Option<String>,
    pub guest_full_name: String,
    pub guest_email: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub status: String,
}

pub struct NewReservation<'a> {
    pub property_external_id: Option<&'a str>,
    pub guest_full_name: &'a str,
    pub guest_email: Option<&'a str>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
}

pub async fn insert_reservation(
    pool: &PgPool,
    input: &NewReservation<'_>,
) -> Result<Reservation, AppError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO reservations
             (id, property_external_id, guest_full_name, guest_email,
              check_in_date, check_out_date, status)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending')",
    )
    .bind(id)
    .bind(input.property_external_id)
    .bind(input.guest_full_name)
    .bind(input.guest_email)
    .bind(input.check_in_date)
    .bind(input.check_out_date)
    .execute(pool)
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "Database query failed");
        AppError::Dependency("External service request failed.".to_string())
    })?;

    Ok(Reservation {
        id,
        property_external_id: input.property_external_id.map(ToOwned::to_owned),
        guest_full_name: input.guest_full_name.to_string(),
        guest_email: input.guest_email.map(ToOwned::to_owned),
        check_in_date: input.check_in_date,
        check_out_date: input.check_out_date,
        status: "pending".to_string(),
    })
}

pub async fn get_reservation(pool: &PgPool, reservation_id: &str) -> Result<Reservation, AppError> {
    let row = sqlx::query(
        "SELECT id, property_external_id, guest_full_name, guest_email,
                check_in_date, check_out_date, status
         FROM reservations
         WHERE id::text = $1
         LIMIT 1",
    )
    .bind(reservation_id)
    .fetch_optional(pool)
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "Database query failed");
        AppError::Dependency("External service request failed.".to_string())
    })?
    .ok_or_else(|| AppError::NotFound(format!("Reservation '{reservation_id}' not found.")))?;

    read_reservation(&row)
}

/// Reservations that currently block a property's calendar, for overlap
/// checks at booking time.
pub async fn list_active_for_property(
    pool: &PgPool,
    property_external_id: &str,
) -> Result<Vec<Reservation>, AppError> {
    let rows = sqlx::query(
        "SELECT id, property_external_id, guest_full_name, guest_email,
                check_in_date, check_out_date, status
         FROM reservations
         WHERE property_external_id = $1 AND status = ANY($2)
         ORDER BY check_in_date",
    )
    .bind(property_external_id)
    .bind(ACTIVE_STATUSES)
    .fetch_all(pool)
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "Database query failed");
        AppError::Dependency("External service request failed.".to_string())
    })?;

    rows.iter().map(read_reservation).collect()
}

fn read_reservation(row: &PgRow) -> Result<Reservation, AppError> {
    Ok(Reservation {
        id: row
            .try_get("id")
            .map_err(|e| AppError::Internal(e.to_string()))?,
        property_external_id: row.try_get("property_external_id").unwrap_or(None),
        guest_full_name: row.try_get("guest_full_name").unwrap_or_default(),
        guest_email: row.try_get("guest_email").unwrap_or(None),
        check_in_date: row
            .try_get("check_in_date")
            .map_err(|e| AppError::Internal(e.to_string()))?,
        check_out_date: row
            .try_get("check_out_date")
            .map_err(|e| AppError::Internal(e.to_string()))?,
        status: row.try_get("status").unwrap_or_default(),
    })
}
