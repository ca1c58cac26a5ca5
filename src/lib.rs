pub mod compactor;
pub mod config;
pub mod engine;
pub mod holiday;
pub mod limits;
pub mod model;
pub mod observability;
pub mod page;
pub mod store;
pub mod wal;
