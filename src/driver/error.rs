//! Overall high-level error type for the flc driver
use crate::common::errno::{EINVAL, EIO};
use crate::memory::heap::HeapError;
use crate::text::numeric::ConversionError;
use crate::text::printf::FormatError;
use crate::time::calendar::TimeError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FreeLibcError {
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("bad argument {0}")]
    BadArgument(String),
    #[error("{0} is not a date and time of the form YYYY-MM-DDTHH:MM:SS")]
    BadDateTime(String),
}

impl FreeLibcError {
    /// The C error number corresponding to this error
    pub fn errno(&self) -> i32 {
        match self {
            FreeLibcError::Heap(e) => e.errno(),
            FreeLibcError::Conversion(e) => e.errno(),
            FreeLibcError::Format(e) => e.errno(),
            FreeLibcError::Time(e) => e.errno(),
            FreeLibcError::Io(e) => e.raw_os_error().unwrap_or(EIO),
            FreeLibcError::BadArgument(_) | FreeLibcError::BadDateTime(_) => EINVAL,
        }
    }
}
