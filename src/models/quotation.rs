use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Pending,
    Approved,
    Rejected,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Pending => "pending",
            QuotationStatus::Approved => "approved",
            QuotationStatus::Rejected => "rejected",
        }
    }
}

/// Decision applied to a quotation by an approver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotationDecision {
    Approve { notes: Option<String> },
    Reject { reason: String },
}

impl QuotationDecision {
    pub fn status(&self) -> QuotationStatus {
        match self {
            QuotationDecision::Approve { .. } => QuotationStatus::Approved,
            QuotationDecision::Reject { .. } => QuotationStatus::Rejected,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            QuotationDecision::Approve { .. } => "approve",
            QuotationDecision::Reject { .. } => "reject",
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            QuotationDecision::Approve { notes } => serde_json::json!({ "notes": notes }),
            QuotationDecision::Reject { reason } => serde_json::json!({ "reason": reason }),
        }
    }
}
