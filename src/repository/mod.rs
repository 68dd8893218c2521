pub mod payments;
pub mod properties;
pub mod reservations;
