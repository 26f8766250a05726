use serde::{Deserialize, Serialize};

use super::record::RecordId;
use super::vendor::VendorStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    Activate,
    Deactivate,
    Delete,
}

impl BulkOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperation::Activate => "activate",
            BulkOperation::Deactivate => "deactivate",
            BulkOperation::Delete => "delete",
        }
    }

    /// Status a record ends up with, or `None` when the record is removed.
    pub fn target_status(&self) -> Option<VendorStatus> {
        match self {
            BulkOperation::Activate => Some(VendorStatus::Active),
            BulkOperation::Deactivate => Some(VendorStatus::Inactive),
            BulkOperation::Delete => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub id: RecordId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub operation: BulkOperation,
    pub results: Vec<BulkItemResult>,
    #[serde(default)]
    pub processed: usize,
    #[serde(default)]
    pub failed: usize,
}

impl BulkOutcome {
    pub fn from_results(operation: BulkOperation, results: Vec<BulkItemResult>) -> Self {
        let failed = results.iter().filter(|r| !r.success).count();
        Self {
            operation,
            processed: results.len() - failed,
            failed,
            results,
        }
    }

    pub fn all_succeeded(operation: BulkOperation, ids: &[RecordId]) -> Self {
        let results = ids
            .iter()
            .map(|id| BulkItemResult {
                id: id.clone(),
                success: true,
                message: None,
            })
            .collect();
        Self::from_results(operation, results)
    }

    pub fn succeeded_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.results.iter().filter(|r| r.success).map(|r| &r.id)
    }
}
