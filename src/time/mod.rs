//! Calendar arithmetic and time formatting
pub mod calendar;
pub mod strftime;
