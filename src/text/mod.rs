//! Text conversion: string primitives, number parsing and printf /
//! scanf style formatting
pub mod convert;
pub mod numeric;
pub mod printf;
pub mod scanf;
pub mod string;
