//! Product → CRM entity mapping as configured per product.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a product turns into on the CRM side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Contribution,
    Membership,
    Participant,
    /// Configuration lives on the variation, not the parent product.
    CustomVariant,
    /// Never synced.
    Exclude,
    #[default]
    Unset,
}

impl EntityType {
    /// Whether a line item of this type ends up in a contribution.
    pub fn is_syncable(&self) -> bool {
        matches!(
            self,
            EntityType::Contribution | EntityType::Membership | EntityType::Participant
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Contribution => "contribution",
            EntityType::Membership => "membership",
            EntityType::Participant => "participant",
            EntityType::CustomVariant => "custom-variant",
            EntityType::Exclude => "exclude",
            EntityType::Unset => "unset",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a mapping is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingNamespace {
    Product,
    Variation,
}

impl MappingNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingNamespace::Product => "product",
            MappingNamespace::Variation => "variation",
        }
    }
}

/// Sync configuration of a single product or variation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMapping {
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_type_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_field_value_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_type_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_role_id: Option<u64>,
}

impl ProductMapping {
    pub fn contribution(financial_type_id: u64, price_field_value_id: u64) -> Self {
        Self {
            entity_type: EntityType::Contribution,
            financial_type_id: Some(financial_type_id),
            price_field_value_id: Some(price_field_value_id),
            ..Default::default()
        }
    }

    pub fn membership(
        financial_type_id: u64,
        price_field_value_id: u64,
        membership_type_id: u64,
    ) -> Self {
        Self {
            entity_type: EntityType::Membership,
            financial_type_id: Some(financial_type_id),
            price_field_value_id: Some(price_field_value_id),
            membership_type_id: Some(membership_type_id),
            ..Default::default()
        }
    }

    pub fn participant(
        financial_type_id: u64,
        price_field_value_id: u64,
        event_id: u64,
        participant_role_id: u64,
    ) -> Self {
        Self {
            entity_type: EntityType::Participant,
            financial_type_id: Some(financial_type_id),
            price_field_value_id: Some(price_field_value_id),
            event_id: Some(event_id),
            participant_role_id: Some(participant_role_id),
            ..Default::default()
        }
    }

    pub fn excluded() -> Self {
        Self {
            entity_type: EntityType::Exclude,
            ..Default::default()
        }
    }

    /// Membership data is complete enough to build a membership line.
    pub fn has_membership(&self) -> bool {
        self.membership_type_id.is_some() && self.price_field_value_id.is_some()
    }

    /// Event registration data is complete enough to build a participant line.
    pub fn has_participant(&self) -> bool {
        self.event_id.is_some()
            && self.participant_role_id.is_some()
            && self.price_field_value_id.is_some()
    }
}
