//! CRM-side entities and call parameters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type ContactId = u64;
pub type ContributionId = u64;

// ============================================================================
// Contacts
// ============================================================================

/// A CRM contact as returned by the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub contact_type: String,
    /// Set semantics; see [`merge_sub_types`].
    #[serde(default)]
    pub contact_sub_type: Vec<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Fields written on contact create/update.
///
/// Email is intentionally absent: writing it here would create a second
/// primary email record next to the one managed by the email sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactParams {
    pub contact_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact_sub_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Union of two sub-type sets, keeping the order of `existing` first.
pub fn merge_sub_types(existing: &[String], additional: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + additional.len());
    for sub_type in existing.iter().chain(additional) {
        if !sub_type.is_empty() && !merged.contains(sub_type) {
            merged.push(sub_type.clone());
        }
    }
    merged
}

/// Which dedupe rule a duplicate check runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeRuleRef {
    /// The contact type's default unsupervised rule.
    Unsupervised,
    /// A specific rule group.
    Rule(u64),
}

/// Fingerprint sent to the CRM duplicate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupeQuery {
    pub contact_type: String,
    pub rule: DedupeRuleRef,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A configured dedupe rule group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupeRule {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub contact_type: String,
    /// "Unsupervised", "Supervised" or "General".
    #[serde(default)]
    pub used: String,
}

// ============================================================================
// Financial configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialType {
    pub id: u64,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// A priced option of a price field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFieldValue {
    pub id: u64,
    pub price_field_id: u64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_type_id: Option<u64>,
}

// ============================================================================
// Line items
// ============================================================================

/// Membership status for memberships created from an order.
pub const MEMBERSHIP_STATUS_PENDING: &str = "Pending";

/// Registration status of a participant created from an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    PendingFromPayLater,
    PendingFromIncompleteTransaction,
}

impl ParticipantStatus {
    pub fn id(&self) -> u64 {
        match self {
            ParticipantStatus::PendingFromPayLater => 5,
            ParticipantStatus::PendingFromIncompleteTransaction => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParticipantStatus::PendingFromPayLater => "Pending from pay later",
            ParticipantStatus::PendingFromIncompleteTransaction => {
                "Pending from incomplete transaction"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipParams {
    pub contact_id: ContactId,
    pub membership_type_id: u64,
    pub status: String,
    /// Explicit financial type carried over from an upstream stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_type_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantParams {
    pub contact_id: ContactId,
    pub event_id: u64,
    pub role_id: u64,
    pub status: ParticipantStatus,
    pub source: String,
    /// Line total with tax folded in.
    pub fee_amount: Decimal,
    pub fee_level: String,
    pub register_date: DateTime<Utc>,
}

/// Entity created together with a line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum SubEntityParams {
    Membership(MembershipParams),
    Participant(ParticipantParams),
}

impl SubEntityParams {
    /// Table the line item is attached to.
    pub fn entity_table(&self) -> &'static str {
        match self {
            SubEntityParams::Membership(_) => "civicrm_membership",
            SubEntityParams::Participant(_) => "civicrm_participant",
        }
    }
}

/// One costed row of a contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_field_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_field_value_id: Option<u64>,
    pub unit_price: Decimal,
    pub qty: Decimal,
    pub line_total: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_type_id: Option<u64>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<SubEntityParams>,
}

impl LineItem {
    /// Amount this line adds to the contribution.
    pub fn charged_amount(&self) -> Decimal {
        self.line_total + self.tax_amount
    }
}

// ============================================================================
// Contributions and payments
// ============================================================================

/// CRM contribution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Completed,
    Pending,
    Cancelled,
    Failed,
    Refunded,
}

impl ContributionStatus {
    pub fn id(&self) -> u64 {
        match self {
            ContributionStatus::Completed => 1,
            ContributionStatus::Pending => 2,
            ContributionStatus::Cancelled => 3,
            ContributionStatus::Failed => 4,
            ContributionStatus::Refunded => 7,
        }
    }

    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(ContributionStatus::Completed),
            2 => Some(ContributionStatus::Pending),
            3 => Some(ContributionStatus::Cancelled),
            4 => Some(ContributionStatus::Failed),
            7 => Some(ContributionStatus::Refunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Completed => "Completed",
            ContributionStatus::Pending => "Pending",
            ContributionStatus::Cancelled => "Cancelled",
            ContributionStatus::Failed => "Failed",
            ContributionStatus::Refunded => "Refunded",
        }
    }
}

/// A CRM contribution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub contact_id: ContactId,
    pub financial_type_id: u64,
    pub contribution_status_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trxn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub is_pay_later: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    // Computed server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_deductible_amount: Option<Decimal>,
}

impl Contribution {
    /// Drop amounts the remote side computed so an update does not ask it
    /// to recalculate from stale values.
    pub fn strip_computed_amounts(&mut self) {
        self.total_amount = None;
        self.fee_amount = None;
        self.net_amount = None;
        self.non_deductible_amount = None;
    }

    pub fn status(&self) -> Option<ContributionStatus> {
        ContributionStatus::from_id(self.contribution_status_id)
    }
}

/// Parameters of the atomic order-create call.
///
/// There is no top-level total: the remote side derives it from the line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCreateParams {
    pub contact_id: ContactId,
    pub financial_type_id: u64,
    pub line_items: Vec<LineItem>,
    pub receive_date: DateTime<Utc>,
    pub trxn_id: String,
    pub invoice_id: String,
    pub contribution_status_id: u64,
    pub is_pay_later: bool,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_instrument_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentParams {
    pub contribution_id: ContributionId,
    pub total_amount: Decimal,
    pub trxn_date: DateTime<Utc>,
    pub trxn_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_instrument_id: Option<u64>,
}

/// A recorded payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: u64,
    pub contribution_id: ContributionId,
    pub total_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_sub_types_is_union() {
        let merged = merge_sub_types(&strings(&["Donor", "Volunteer"]), &strings(&["Customer"]));
        assert_eq!(merged, strings(&["Donor", "Volunteer", "Customer"]));
    }

    #[test]
    fn test_merge_sub_types_keeps_existing_and_dedupes() {
        let merged = merge_sub_types(&strings(&["Customer", "Donor"]), &strings(&["Customer"]));
        assert_eq!(merged, strings(&["Customer", "Donor"]));

        let merged = merge_sub_types(&[], &strings(&["", "Customer"]));
        assert_eq!(merged, strings(&["Customer"]));
    }

    #[test]
    fn test_contribution_status_ids() {
        for status in [
            ContributionStatus::Completed,
            ContributionStatus::Pending,
            ContributionStatus::Cancelled,
            ContributionStatus::Failed,
            ContributionStatus::Refunded,
        ] {
            assert_eq!(ContributionStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(ContributionStatus::Refunded.id(), 7);
        assert_eq!(ContributionStatus::from_id(5), None);
    }

    #[test]
    fn test_strip_computed_amounts() {
        let mut contribution = Contribution {
            id: 1,
            contact_id: 2,
            financial_type_id: 1,
            contribution_status_id: 2,
            receive_date: None,
            trxn_id: None,
            invoice_id: None,
            is_pay_later: false,
            source: None,
            campaign_id: None,
            currency: None,
            total_amount: Some(Decimal::new(1000, 2)),
            fee_amount: Some(Decimal::ZERO),
            net_amount: Some(Decimal::new(1000, 2)),
            non_deductible_amount: Some(Decimal::ZERO),
        };
        contribution.strip_computed_amounts();
        assert!(contribution.total_amount.is_none());
        assert!(contribution.fee_amount.is_none());
        assert!(contribution.net_amount.is_none());
        assert!(contribution.non_deductible_amount.is_none());

        let json = serde_json::to_value(&contribution).unwrap();
        assert!(json.get("total_amount").is_none());
    }

    #[test]
    fn test_charged_amount_includes_tax() {
        let item = LineItem {
            price_field_id: Some(1),
            price_field_value_id: Some(1),
            unit_price: Decimal::new(1000, 2),
            qty: Decimal::ONE,
            line_total: Decimal::new(1000, 2),
            tax_amount: Decimal::new(200, 2),
            financial_type_id: None,
            label: "Tote bag".to_string(),
            entity: None,
        };
        assert_eq!(item.charged_amount(), Decimal::new(1200, 2));
    }
}
