//! Item lifecycle state machine
//!
//! ```text
//! Unlabeled ──submit_label──> PendingVerification ──approve──> Verified
//!     ^  \                          │
//!     │   └──submit_label (no quorum configured)──────────────> Verified
//!     └───────────────reject────────┘
//! ```
//!
//! The label, labeler and timestamp live inside the state variants, so an
//! unlabeled item cannot carry a label and a labeled one cannot lack its
//! labeler. Transitions consume the current state and are the only way to
//! produce a new one.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::MarketError;

/// A label assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Labeling {
    pub label: String,
    pub labeled_by: Uuid,
    pub labeled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Unlabeled,
    PendingVerification(Labeling),
    Verified(Labeling),
}

/// Flat status as persisted and reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Unlabeled,
    PendingVerification,
    Verified,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Unlabeled => "UNLABELED",
            ItemStatus::PendingVerification => "PENDING_VERIFICATION",
            ItemStatus::Verified => "VERIFIED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNLABELED" => Some(ItemStatus::Unlabeled),
            "PENDING_VERIFICATION" => Some(ItemStatus::PendingVerification),
            "VERIFIED" => Some(ItemStatus::Verified),
            _ => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} an item that is {from}")]
pub struct TransitionError {
    pub from: ItemStatus,
    pub action: &'static str,
}

impl From<TransitionError> for MarketError {
    fn from(err: TransitionError) -> Self {
        MarketError::InvalidState(err.to_string())
    }
}

impl ItemState {
    pub fn status(&self) -> ItemStatus {
        match self {
            ItemState::Unlabeled => ItemStatus::Unlabeled,
            ItemState::PendingVerification(_) => ItemStatus::PendingVerification,
            ItemState::Verified(_) => ItemStatus::Verified,
        }
    }

    pub fn labeling(&self) -> Option<&Labeling> {
        match self {
            ItemState::Unlabeled => None,
            ItemState::PendingVerification(l) | ItemState::Verified(l) => Some(l),
        }
    }

    /// Attach a label. Without verification the item is final immediately.
    pub fn submit_label(
        self,
        labeling: Labeling,
        verification_required: bool,
    ) -> Result<ItemState, TransitionError> {
        match self {
            ItemState::Unlabeled if verification_required => {
                Ok(ItemState::PendingVerification(labeling))
            }
            ItemState::Unlabeled => Ok(ItemState::Verified(labeling)),
            other => Err(TransitionError {
                from: other.status(),
                action: "label",
            }),
        }
    }

    /// Majority accepted the label
    pub fn approve(self) -> Result<ItemState, TransitionError> {
        match self {
            ItemState::PendingVerification(labeling) => Ok(ItemState::Verified(labeling)),
            other => Err(TransitionError {
                from: other.status(),
                action: "approve",
            }),
        }
    }

    /// Majority rejected the label; the item goes back to the work pool
    pub fn reject(self) -> Result<ItemState, TransitionError> {
        match self {
            ItemState::PendingVerification(_) => Ok(ItemState::Unlabeled),
            other => Err(TransitionError {
                from: other.status(),
                action: "reject",
            }),
        }
    }

    /// Rebuild from persisted columns, refusing combinations the lifecycle
    /// can never produce
    pub fn from_columns(
        status: &str,
        label: Option<String>,
        labeled_by: Option<Uuid>,
        labeled_at: Option<DateTime<Utc>>,
    ) -> Result<ItemState, String> {
        let status =
            ItemStatus::parse(status).ok_or_else(|| format!("unknown item status '{}'", status))?;

        let labeling = match (label, labeled_by, labeled_at) {
            (None, None, None) => None,
            (Some(label), Some(labeled_by), Some(labeled_at)) => Some(Labeling {
                label,
                labeled_by,
                labeled_at,
            }),
            _ => return Err("label, labeler and labeled_at must be set together".to_string()),
        };

        match (status, labeling) {
            (ItemStatus::Unlabeled, None) => Ok(ItemState::Unlabeled),
            (ItemStatus::PendingVerification, Some(l)) => Ok(ItemState::PendingVerification(l)),
            (ItemStatus::Verified, Some(l)) => Ok(ItemState::Verified(l)),
            (status, _) => Err(format!("label presence does not match status {}", status)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: Uuid,
    pub dataset_id: Uuid,
    /// Fixed at ingest: dataset labeling pool / item count
    pub reward_value: Decimal,
    pub image_url: String,
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn status(&self) -> ItemStatus {
        self.state.status()
    }

    pub fn labeler(&self) -> Option<Uuid> {
        self.state.labeling().map(|l| l.labeled_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeling() -> Labeling {
        Labeling {
            label: "cat".into(),
            labeled_by: Uuid::new_v4(),
            labeled_at: Utc::now(),
        }
    }

    #[test]
    fn test_label_then_approve() {
        let l = labeling();
        let pending = ItemState::Unlabeled.submit_label(l.clone(), true).unwrap();
        assert_eq!(pending, ItemState::PendingVerification(l.clone()));
        assert_eq!(pending.approve().unwrap(), ItemState::Verified(l));
    }

    #[test]
    fn test_auto_verify_without_quorum() {
        let l = labeling();
        let state = ItemState::Unlabeled.submit_label(l.clone(), false).unwrap();
        assert_eq!(state, ItemState::Verified(l));
    }

    #[test]
    fn test_reject_clears_label() {
        let pending = ItemState::Unlabeled.submit_label(labeling(), true).unwrap();
        let reset = pending.reject().unwrap();
        assert_eq!(reset, ItemState::Unlabeled);
        assert!(reset.labeling().is_none());
    }

    #[test]
    fn test_illegal_transitions() {
        let verified = ItemState::Verified(labeling());
        let err = verified.clone().submit_label(labeling(), true).unwrap_err();
        assert_eq!(err.from, ItemStatus::Verified);
        assert!(verified.clone().approve().is_err());
        assert!(verified.reject().is_err());

        assert!(ItemState::Unlabeled.approve().is_err());
        assert!(ItemState::Unlabeled.reject().is_err());

        let pending = ItemState::PendingVerification(labeling());
        assert!(pending.submit_label(labeling(), true).is_err());
    }

    #[test]
    fn test_transition_error_maps_to_invalid_state() {
        let err: MarketError = ItemState::Unlabeled.approve().unwrap_err().into();
        assert!(matches!(err, MarketError::InvalidState(_)));
    }

    #[test]
    fn test_from_columns_accepts_consistent_rows() {
        let by = Uuid::new_v4();
        let at = Utc::now();
        assert_eq!(
            ItemState::from_columns("UNLABELED", None, None, None).unwrap(),
            ItemState::Unlabeled
        );
        let state =
            ItemState::from_columns("PENDING_VERIFICATION", Some("dog".into()), Some(by), Some(at))
                .unwrap();
        assert_eq!(state.status(), ItemStatus::PendingVerification);
        assert_eq!(state.labeling().unwrap().labeled_by, by);
    }

    #[test]
    fn test_from_columns_rejects_inconsistent_rows() {
        let by = Uuid::new_v4();
        let at = Utc::now();
        assert!(ItemState::from_columns("UNLABELED", Some("cat".into()), Some(by), Some(at)).is_err());
        assert!(ItemState::from_columns("VERIFIED", None, None, None).is_err());
        assert!(ItemState::from_columns("VERIFIED", Some("cat".into()), None, Some(at)).is_err());
        assert!(ItemState::from_columns("REJECTED", None, None, None).is_err());
    }
}
