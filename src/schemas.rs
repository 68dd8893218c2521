use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StayQuoteInput {
    pub property_id: Option<String>,
    pub check_in: String,
    pub check_out: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingInput {
    #[validate(length(min = 1, max = 255))]
    pub property_id: String,
    pub check_in: String,
    pub check_out: String,
    #[validate(length(min = 1, max = 255))]
    pub guest_full_name: String,
    #[validate(email)]
    pub guest_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyPath {
    pub property_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReservationPath {
    pub reservation_id: String,
}
