pub mod booking_totals;
pub mod overrides;
