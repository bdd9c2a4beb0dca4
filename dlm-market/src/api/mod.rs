//! HTTP API handlers for dlm-market

pub mod health;
pub mod identity;
pub mod ingest;
pub mod labeling;
pub mod rewards;
pub mod settlements;
pub mod verification;

pub use health::health_routes;
pub use ingest::ingest_routes;
pub use labeling::labeling_routes;
pub use rewards::reward_routes;
pub use settlements::settlement_routes;
pub use verification::verification_routes;
