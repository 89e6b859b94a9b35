//! Remote CRM operation surface.

use async_trait::async_trait;

use super::error::CrmError;
use super::types::{
    Contact, ContactId, ContactParams, Contribution, ContributionId, DedupeQuery, DedupeRule,
    FinancialType, OrderCreateParams, Payment, PaymentParams, PriceFieldValue,
};

/// The CRM operations the sync pipeline consumes.
///
/// Every call is a blocking unit from the pipeline's point of view: callers
/// await each one before moving on, and nothing is retried automatically.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Name of this client implementation.
    fn name(&self) -> &str;

    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>, CrmError>;

    /// Contact linked to a commerce user account, if any.
    async fn find_contact_for_user(&self, user_id: u64) -> Result<Option<ContactId>, CrmError>;

    /// Existing contacts matching the query, best match first.
    async fn find_duplicate_contacts(
        &self,
        query: &DedupeQuery,
    ) -> Result<Vec<ContactId>, CrmError>;

    async fn create_contact(&self, params: &ContactParams) -> Result<Contact, CrmError>;

    async fn update_contact(
        &self,
        id: ContactId,
        params: &ContactParams,
    ) -> Result<Contact, CrmError>;

    /// Dedupe rule groups configured for a contact type.
    async fn dedupe_rules(&self, contact_type: &str) -> Result<Vec<DedupeRule>, CrmError>;

    /// Active financial types.
    async fn financial_types(&self) -> Result<Vec<FinancialType>, CrmError>;

    async fn price_field_value(&self, id: u64) -> Result<Option<PriceFieldValue>, CrmError>;

    /// The price field value of the default contribution price set.
    async fn default_price_field_value(&self) -> Result<Option<PriceFieldValue>, CrmError>;

    /// Create a contribution with its line items and sub-entities in one transaction.
    async fn create_order(&self, params: &OrderCreateParams) -> Result<Contribution, CrmError>;

    async fn create_payment(&self, params: &PaymentParams) -> Result<Payment, CrmError>;

    async fn get_contribution(&self, id: ContributionId)
        -> Result<Option<Contribution>, CrmError>;

    async fn update_contribution(
        &self,
        contribution: &Contribution,
    ) -> Result<Contribution, CrmError>;
}
