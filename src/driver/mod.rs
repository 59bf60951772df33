//! Command line driver for `flc`

pub mod commands;
pub mod error;
pub mod options;
pub mod statistics;
