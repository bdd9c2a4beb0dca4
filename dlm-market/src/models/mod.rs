//! Domain model

pub mod dataset;
pub mod item;
pub mod labeler;
pub mod settlement;
pub mod vote;

pub use dataset::{Dataset, DatasetStatus};
pub use item::{Item, ItemState, ItemStatus, Labeling, TransitionError};
pub use labeler::Labeler;
pub use settlement::{Settlement, SettlementKind, SettlementMetadata, SettlementStatus};
pub use vote::{Vote, VoteRecord};

use uuid::Uuid;

/// Authenticated identity supplied by the upstream identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Labeler(Uuid),
    Company(Uuid),
}
