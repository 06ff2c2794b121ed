pub mod client;

pub use client::{PgAnalyticsStore, PostgresConfig};
