//! Dataset (a company's labeling job)

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};

/// Dataset lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetStatus {
    Active,
    Completed,
    Expired,
}

impl DatasetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetStatus::Active => "ACTIVE",
            DatasetStatus::Completed => "COMPLETED",
            DatasetStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(DatasetStatus::Active),
            "COMPLETED" => Some(DatasetStatus::Completed),
            "EXPIRED" => Some(DatasetStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub id: Uuid,
    pub company_id: Uuid,
    /// Identifier the external ledger knows this dataset by
    pub external_id: String,
    pub name: String,
    pub labels: Vec<String>,
    pub instructions: Option<String>,
    pub total_items: i64,
    pub amount_locked: Decimal,
    pub labeling_pool: Decimal,
    pub verification_pool: Decimal,
    pub amount_distributed: Decimal,
    pub verification_required: bool,
    pub status: DatasetStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Dataset {
    pub fn accepts_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Reject labels outside the dataset's fixed label set
    pub fn check_label(&self, label: &str) -> MarketResult<()> {
        if self.accepts_label(label) {
            Ok(())
        } else {
            Err(MarketError::InvalidLabel {
                label: label.to_string(),
                allowed: self.labels.clone(),
            })
        }
    }

    pub fn ensure_active(&self) -> MarketResult<()> {
        if self.status == DatasetStatus::Active {
            Ok(())
        } else {
            Err(MarketError::DatasetInactive {
                dataset_id: self.id,
                status: self.status,
            })
        }
    }
}
