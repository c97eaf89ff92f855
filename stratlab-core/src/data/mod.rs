//! Market data access: CSV schema validation, streaming snapshot reader,
//! rolling features, and price-series reconstruction.

pub mod reconstruct;
pub mod rolling;
pub mod schema;
pub mod stream;

pub use reconstruct::AdjustmentTable;
pub use schema::DataError;
pub use stream::{ReaderStats, SnapshotReader, StreamOptions};
