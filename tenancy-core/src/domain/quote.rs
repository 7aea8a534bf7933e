//! Quote version lifecycle models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Status of a quote version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    InternalReview,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 7] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::InternalReview,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
        QuoteStatus::Expired,
        QuoteStatus::Cancelled,
    ];

    /// Statuses reachable in one step
    pub fn allowed_transitions(&self) -> &'static [QuoteStatus] {
        use QuoteStatus::*;
        match self {
            Draft => &[Sent, InternalReview, Cancelled],
            Sent => &[Accepted, Rejected, Expired, Cancelled],
            InternalReview => &[Draft, Sent, Cancelled],
            Accepted | Rejected | Expired | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: QuoteStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::InternalReview => "internal_review",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
            QuoteStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuoteStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown quote status '{}'", s))
    }
}

/// A quote version row as returned through the scoped gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteVersion {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub franchise_id: Option<Uuid>,
    #[serde(default)]
    pub version_number: i32,
    pub status: QuoteStatus,
}

/// Input for a status transition
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionQuoteInput {
    pub status: QuoteStatus,
}
