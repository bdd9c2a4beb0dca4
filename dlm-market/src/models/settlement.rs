//! Settlement records (value movements awaiting external confirmation)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Caller;
use crate::error::{MarketError, MarketResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementKind {
    Labeling,
    Verification,
    Withdrawal,
    DatasetLock,
}

impl SettlementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementKind::Labeling => "LABELING",
            SettlementKind::Verification => "VERIFICATION",
            SettlementKind::Withdrawal => "WITHDRAWAL",
            SettlementKind::DatasetLock => "DATASET_LOCK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LABELING" => Some(SettlementKind::Labeling),
            "VERIFICATION" => Some(SettlementKind::Verification),
            "WITHDRAWAL" => Some(SettlementKind::Withdrawal),
            "DATASET_LOCK" => Some(SettlementKind::DatasetLock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    Completed,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "PENDING",
            SettlementStatus::Completed => "COMPLETED",
            SettlementStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SettlementStatus::Pending),
            "COMPLETED" => Some(SettlementStatus::Completed),
            "FAILED" => Some(SettlementStatus::Failed),
            _ => None,
        }
    }

    /// External confirmation arrived. Only a pending settlement may complete.
    pub fn complete(self, settlement_id: Uuid) -> MarketResult<SettlementStatus> {
        match self {
            SettlementStatus::Pending => Ok(SettlementStatus::Completed),
            _ => Err(MarketError::NotPending(settlement_id)),
        }
    }
}

/// Claim parameters bound into the signature, stored as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Amount in the external ledger's base unit, as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_unit_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_dataset_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub id: Uuid,
    pub labeler_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub dataset_id: Option<Uuid>,
    pub kind: SettlementKind,
    pub amount: Decimal,
    pub status: SettlementStatus,
    pub external_tx_ref: Option<String>,
    pub metadata: SettlementMetadata,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Settlement {
    pub fn owned_by(&self, caller: &Caller) -> bool {
        match caller {
            Caller::Labeler(id) => self.labeler_id == Some(*id),
            Caller::Company(id) => self.company_id == Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_completes() {
        let id = Uuid::new_v4();
        assert_eq!(
            SettlementStatus::Pending.complete(id).unwrap(),
            SettlementStatus::Completed
        );
        assert!(matches!(
            SettlementStatus::Completed.complete(id),
            Err(MarketError::NotPending(x)) if x == id
        ));
        assert!(matches!(
            SettlementStatus::Failed.complete(id),
            Err(MarketError::NotPending(_))
        ));
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = SettlementMetadata {
            nonce: Some(42),
            base_unit_amount: Some("3500000000000000000".into()),
            external_dataset_id: Some("ds-1".into()),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["nonce"], 42);
        assert_eq!(json["base_unit_amount"], "3500000000000000000");

        let empty: SettlementMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SettlementMetadata::default());
    }

    #[test]
    fn test_ownership() {
        let labeler = Uuid::new_v4();
        let s = Settlement {
            id: Uuid::new_v4(),
            labeler_id: Some(labeler),
            company_id: None,
            dataset_id: None,
            kind: SettlementKind::Withdrawal,
            amount: Decimal::ONE,
            status: SettlementStatus::Pending,
            external_tx_ref: None,
            metadata: SettlementMetadata::default(),
            created_at: Utc::now(),
            confirmed_at: None,
        };
        assert!(s.owned_by(&Caller::Labeler(labeler)));
        assert!(!s.owned_by(&Caller::Labeler(Uuid::new_v4())));
        assert!(!s.owned_by(&Caller::Company(labeler)));
    }
}
