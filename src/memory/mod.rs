//! Free-list allocation over coarse backing regions
pub mod block;
pub mod header;
pub mod heap;
