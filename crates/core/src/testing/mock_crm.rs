//! Mock CRM client for testing.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::crm::{
    Contact, ContactId, ContactParams, Contribution, ContributionId, ContributionStatus,
    CrmClient, CrmError, DedupeQuery, DedupeRule, FinancialType, OrderCreateParams, Payment,
    PaymentParams, PriceFieldValue,
};

/// A recorded remote call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// "Entity.action", e.g. "Order.create".
    pub operation: String,
    pub params: Value,
    pub timestamp: Instant,
}

#[derive(Debug)]
struct MockState {
    contacts: HashMap<ContactId, Contact>,
    user_links: HashMap<u64, ContactId>,
    duplicates: Vec<ContactId>,
    dedupe_rules: Vec<DedupeRule>,
    financial_types: Vec<FinancialType>,
    price_field_values: HashMap<u64, PriceFieldValue>,
    default_price_field_value: Option<PriceFieldValue>,
    contributions: HashMap<ContributionId, Contribution>,
    orders: Vec<OrderCreateParams>,
    payments: Vec<PaymentParams>,
    failures: HashMap<String, CrmError>,
    next_contact_id: ContactId,
    next_contribution_id: ContributionId,
    next_payment_id: u64,
}

/// Mock implementation of the CrmClient trait.
///
/// Provides controllable behavior for testing:
/// - An in-memory CRM holding contacts, contributions and payments
/// - Scripted duplicate matches and user links
/// - Injected failures per operation
/// - Every call recorded with its parameters
///
/// # Example
///
/// ```rust,ignore
/// use crmsync_core::testing::{MockCrmClient, fixtures};
///
/// let crm = MockCrmClient::new();
/// crm.add_price_field_value(fixtures::price_field_value(3, 2, Some(5))).await;
/// crm.fail_on("Payment.create", CrmError::Timeout).await;
///
/// // Run the pipeline...
///
/// assert_eq!(crm.call_count("Order.create").await, 1);
/// let order = &crm.created_orders().await[0];
/// assert_eq!(order.financial_type_id, 5);
/// ```
#[derive(Debug)]
pub struct MockCrmClient {
    state: RwLock<MockState>,
    calls: RwLock<Vec<RecordedCall>>,
}

impl Default for MockCrmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCrmClient {
    /// Create a mock CRM with a few financial types and a default price field value.
    pub fn new() -> Self {
        let financial_types = [
            (1, "General"),
            (2, "Member Dues"),
            (4, "Event Fee"),
            (5, "Donation"),
            (6, "Shipping"),
        ]
        .into_iter()
        .map(|(id, name)| FinancialType {
            id,
            name: name.to_string(),
            is_active: true,
        })
        .collect();

        Self {
            state: RwLock::new(MockState {
                contacts: HashMap::new(),
                user_links: HashMap::new(),
                duplicates: Vec::new(),
                dedupe_rules: Vec::new(),
                financial_types,
                price_field_values: HashMap::new(),
                default_price_field_value: Some(PriceFieldValue {
                    id: 1,
                    price_field_id: 1,
                    label: "Contribution Amount".to_string(),
                    amount: Decimal::ONE,
                    financial_type_id: Some(1),
                }),
                contributions: HashMap::new(),
                orders: Vec::new(),
                payments: Vec::new(),
                failures: HashMap::new(),
                next_contact_id: 100,
                next_contribution_id: 500,
                next_payment_id: 900,
            }),
            calls: RwLock::new(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    pub async fn add_contact(&self, contact: Contact) {
        self.state
            .write()
            .await
            .contacts
            .insert(contact.id, contact);
    }

    /// Link a commerce user account to a contact.
    pub async fn link_user(&self, user_id: u64, contact_id: ContactId) {
        self.state
            .write()
            .await
            .user_links
            .insert(user_id, contact_id);
    }

    /// Set the ids every duplicate check returns.
    pub async fn set_duplicates(&self, contact_ids: Vec<ContactId>) {
        self.state.write().await.duplicates = contact_ids;
    }

    pub async fn add_dedupe_rule(&self, rule: DedupeRule) {
        self.state.write().await.dedupe_rules.push(rule);
    }

    pub async fn set_financial_types(&self, types: Vec<FinancialType>) {
        self.state.write().await.financial_types = types;
    }

    pub async fn add_price_field_value(&self, value: PriceFieldValue) {
        self.state
            .write()
            .await
            .price_field_values
            .insert(value.id, value);
    }

    pub async fn set_default_price_field_value(&self, value: Option<PriceFieldValue>) {
        self.state.write().await.default_price_field_value = value;
    }

    /// Store a contribution as if it had been created earlier.
    pub async fn add_contribution(&self, contribution: Contribution) {
        self.state
            .write()
            .await
            .contributions
            .insert(contribution.id, contribution);
    }

    /// Make every call of `operation` fail with `error` until cleared.
    pub async fn fail_on(&self, operation: &str, error: CrmError) {
        self.state
            .write()
            .await
            .failures
            .insert(operation.to_string(), error);
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Number of calls that write to the CRM.
    pub async fn write_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| {
                c.operation.ends_with(".create")
                    || c.operation.ends_with(".update")
            })
            .count()
    }

    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Parameters of every successful Order.create.
    pub async fn created_orders(&self) -> Vec<OrderCreateParams> {
        self.state.read().await.orders.clone()
    }

    /// Parameters of every successful Payment.create.
    pub async fn payments(&self) -> Vec<PaymentParams> {
        self.state.read().await.payments.clone()
    }

    pub async fn contact(&self, id: ContactId) -> Option<Contact> {
        self.state.read().await.contacts.get(&id).cloned()
    }

    pub async fn contact_count(&self) -> usize {
        self.state.read().await.contacts.len()
    }

    pub async fn contribution(&self, id: ContributionId) -> Option<Contribution> {
        self.state.read().await.contributions.get(&id).cloned()
    }

    async fn record<P: Serialize>(&self, operation: &str, params: &P) -> Result<(), CrmError> {
        self.calls.write().await.push(RecordedCall {
            operation: operation.to_string(),
            params: serde_json::to_value(params).unwrap_or(Value::Null),
            timestamp: Instant::now(),
        });

        match self.state.read().await.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn apply_contact_params(contact: &mut Contact, params: &ContactParams) {
    contact.contact_type = params.contact_type.clone();
    contact.contact_sub_type = params.contact_sub_type.clone();
    if let Some(first_name) = &params.first_name {
        contact.first_name = first_name.clone();
    }
    if let Some(last_name) = &params.last_name {
        contact.last_name = last_name.clone();
    }
    if let Some(display_name) = &params.display_name {
        contact.display_name = display_name.clone();
    }
    if params.source.is_some() {
        contact.source = params.source.clone();
    }
}

#[async_trait]
impl CrmClient for MockCrmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>, CrmError> {
        self.record("Contact.get", &id).await?;
        Ok(self.state.read().await.contacts.get(&id).cloned())
    }

    async fn find_contact_for_user(&self, user_id: u64) -> Result<Option<ContactId>, CrmError> {
        self.record("UFMatch.get", &user_id).await?;
        Ok(self.state.read().await.user_links.get(&user_id).copied())
    }

    async fn find_duplicate_contacts(
        &self,
        query: &DedupeQuery,
    ) -> Result<Vec<ContactId>, CrmError> {
        self.record("Contact.duplicatecheck", query).await?;
        Ok(self.state.read().await.duplicates.clone())
    }

    async fn create_contact(&self, params: &ContactParams) -> Result<Contact, CrmError> {
        self.record("Contact.create", params).await?;

        let mut state = self.state.write().await;
        let id = state.next_contact_id;
        state.next_contact_id += 1;

        let mut contact = Contact {
            id,
            contact_type: String::new(),
            contact_sub_type: Vec::new(),
            first_name: String::new(),
            last_name: String::new(),
            display_name: String::new(),
            source: None,
        };
        apply_contact_params(&mut contact, params);
        if contact.display_name.is_empty() {
            contact.display_name = format!("{} {}", contact.first_name, contact.last_name)
                .trim()
                .to_string();
        }
        state.contacts.insert(id, contact.clone());
        Ok(contact)
    }

    async fn update_contact(
        &self,
        id: ContactId,
        params: &ContactParams,
    ) -> Result<Contact, CrmError> {
        self.record("Contact.update", params).await?;

        let mut state = self.state.write().await;
        let contact = state
            .contacts
            .get_mut(&id)
            .ok_or_else(|| CrmError::api("Contact", "create", format!("Contact {} not found", id)))?;
        apply_contact_params(contact, params);
        Ok(contact.clone())
    }

    async fn dedupe_rules(&self, contact_type: &str) -> Result<Vec<DedupeRule>, CrmError> {
        self.record("RuleGroup.get", &contact_type).await?;
        Ok(self
            .state
            .read()
            .await
            .dedupe_rules
            .iter()
            .filter(|r| r.contact_type == contact_type)
            .cloned()
            .collect())
    }

    async fn financial_types(&self) -> Result<Vec<FinancialType>, CrmError> {
        self.record("FinancialType.get", &()).await?;
        Ok(self.state.read().await.financial_types.clone())
    }

    async fn price_field_value(&self, id: u64) -> Result<Option<PriceFieldValue>, CrmError> {
        self.record("PriceFieldValue.get", &id).await?;
        let state = self.state.read().await;
        let value = state.price_field_values.get(&id).cloned().or_else(|| {
            state
                .default_price_field_value
                .clone()
                .filter(|default| default.id == id)
        });
        Ok(value)
    }

    async fn default_price_field_value(&self) -> Result<Option<PriceFieldValue>, CrmError> {
        self.record("PriceFieldValue.getdefault", &()).await?;
        Ok(self.state.read().await.default_price_field_value.clone())
    }

    async fn create_order(&self, params: &OrderCreateParams) -> Result<Contribution, CrmError> {
        self.record("Order.create", params).await?;

        let total: Decimal = params.line_items.iter().map(|l| l.charged_amount()).sum();

        let mut state = self.state.write().await;
        let id = state.next_contribution_id;
        state.next_contribution_id += 1;

        let contribution = Contribution {
            id,
            contact_id: params.contact_id,
            financial_type_id: params.financial_type_id,
            contribution_status_id: params.contribution_status_id,
            receive_date: Some(params.receive_date),
            trxn_id: Some(params.trxn_id.clone()),
            invoice_id: Some(params.invoice_id.clone()),
            is_pay_later: params.is_pay_later,
            source: params.source.clone(),
            campaign_id: params.campaign_id,
            currency: Some(params.currency.clone()),
            total_amount: Some(total),
            fee_amount: Some(Decimal::ZERO),
            net_amount: Some(total),
            non_deductible_amount: Some(Decimal::ZERO),
        };
        state.contributions.insert(id, contribution.clone());
        state.orders.push(params.clone());
        Ok(contribution)
    }

    async fn create_payment(&self, params: &PaymentParams) -> Result<Payment, CrmError> {
        self.record("Payment.create", params).await?;

        let mut state = self.state.write().await;
        let contribution = state
            .contributions
            .get_mut(&params.contribution_id)
            .ok_or_else(|| {
                CrmError::api(
                    "Payment",
                    "create",
                    format!("Contribution {} not found", params.contribution_id),
                )
            })?;
        contribution.contribution_status_id = ContributionStatus::Completed.id();

        let id = state.next_payment_id;
        state.next_payment_id += 1;
        state.payments.push(params.clone());

        Ok(Payment {
            id,
            contribution_id: params.contribution_id,
            total_amount: params.total_amount,
        })
    }

    async fn get_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<Contribution>, CrmError> {
        self.record("Contribution.get", &id).await?;
        Ok(self.state.read().await.contributions.get(&id).cloned())
    }

    async fn update_contribution(
        &self,
        contribution: &Contribution,
    ) -> Result<Contribution, CrmError> {
        self.record("Contribution.update", contribution).await?;

        let mut state = self.state.write().await;
        let stored = state
            .contributions
            .get_mut(&contribution.id)
            .ok_or_else(|| {
                CrmError::api(
                    "Contribution",
                    "create",
                    format!("Contribution {} not found", contribution.id),
                )
            })?;

        let mut updated = contribution.clone();
        // Amounts left out of the update are kept as stored.
        updated.total_amount = updated.total_amount.or(stored.total_amount);
        updated.fee_amount = updated.fee_amount.or(stored.fee_amount);
        updated.net_amount = updated.net_amount.or(stored.net_amount);
        updated.non_deductible_amount = updated
            .non_deductible_amount
            .or(stored.non_deductible_amount);
        *stored = updated.clone();
        Ok(updated)
    }
}
