//! Shared definitions
pub mod errno;
