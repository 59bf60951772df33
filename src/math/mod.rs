//! Numeric routines: elementary functions, pseudo-random numbers and
//! checksums
pub mod checksum;
pub mod random;
pub mod series;
