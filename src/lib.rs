extern crate bitflags;
extern crate indexmap;
extern crate itertools;
extern crate regex;
extern crate thiserror;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod common;
pub mod driver;
pub mod math;
pub mod memory;
pub mod text;
pub mod time;
