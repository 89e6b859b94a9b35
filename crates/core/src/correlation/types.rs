//! Correlation meta types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crm::{ContactId, ContributionId};

/// Identifiers already resolved for one Order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationMeta {
    pub order_id: u64,
    pub contact_id: Option<ContactId>,
    pub contribution_id: Option<ContributionId>,
    pub campaign_id: Option<u64>,
    pub source: Option<String>,
}

impl CorrelationMeta {
    pub fn empty(order_id: u64) -> Self {
        Self {
            order_id,
            ..Default::default()
        }
    }

    /// Whether the Order already has a Contribution.
    pub fn is_synced(&self) -> bool {
        self.contribution_id.is_some()
    }
}

/// A persisted field of [`CorrelationMeta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationField {
    ContactId,
    ContributionId,
    CampaignId,
    Source,
}

impl CorrelationField {
    /// Storage key of the field.
    pub fn key(&self) -> &'static str {
        match self {
            CorrelationField::ContactId => "contact_id",
            CorrelationField::ContributionId => "contribution_id",
            CorrelationField::CampaignId => "campaign_id",
            CorrelationField::Source => "source",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "contact_id" => Some(CorrelationField::ContactId),
            "contribution_id" => Some(CorrelationField::ContributionId),
            "campaign_id" => Some(CorrelationField::CampaignId),
            "source" => Some(CorrelationField::Source),
            _ => None,
        }
    }

    /// Whether the field holds a numeric id.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, CorrelationField::Source)
    }
}

impl fmt::Display for CorrelationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
