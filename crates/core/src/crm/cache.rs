//! Process-wide cache for CRM lookups that rarely change.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CrmClient, CrmError, DedupeRule, FinancialType, PriceFieldValue};

/// Caches financial types, price field values and dedupe rules.
///
/// Entries live until [`invalidate`](Self::invalidate) is called. Lookups
/// that return nothing are not cached, so a value created remotely later
/// is picked up on the next call.
pub struct LookupCache {
    crm: Arc<dyn CrmClient>,
    financial_types: RwLock<Option<Vec<FinancialType>>>,
    price_field_values: RwLock<HashMap<u64, PriceFieldValue>>,
    default_price_field_value: RwLock<Option<PriceFieldValue>>,
    dedupe_rules: RwLock<HashMap<String, Vec<DedupeRule>>>,
}

impl LookupCache {
    pub fn new(crm: Arc<dyn CrmClient>) -> Self {
        Self {
            crm,
            financial_types: RwLock::new(None),
            price_field_values: RwLock::new(HashMap::new()),
            default_price_field_value: RwLock::new(None),
            dedupe_rules: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached entry.
    pub async fn invalidate(&self) {
        *self.financial_types.write().await = None;
        self.price_field_values.write().await.clear();
        *self.default_price_field_value.write().await = None;
        self.dedupe_rules.write().await.clear();
        debug!("Lookup cache invalidated");
    }

    pub async fn financial_types(&self) -> Result<Vec<FinancialType>, CrmError> {
        if let Some(types) = self.financial_types.read().await.as_ref() {
            return Ok(types.clone());
        }

        let types = self.crm.financial_types().await?;
        *self.financial_types.write().await = Some(types.clone());
        Ok(types)
    }

    /// Whether the id names an active financial type.
    pub async fn is_active_financial_type(&self, id: u64) -> Result<bool, CrmError> {
        Ok(self
            .financial_types()
            .await?
            .iter()
            .any(|t| t.id == id && t.is_active))
    }

    pub async fn price_field_value(&self, id: u64) -> Result<Option<PriceFieldValue>, CrmError> {
        if let Some(value) = self.price_field_values.read().await.get(&id) {
            return Ok(Some(value.clone()));
        }

        let value = self.crm.price_field_value(id).await?;
        if let Some(value) = &value {
            self.price_field_values
                .write()
                .await
                .insert(id, value.clone());
        }
        Ok(value)
    }

    pub async fn default_price_field_value(&self) -> Result<Option<PriceFieldValue>, CrmError> {
        if let Some(value) = self.default_price_field_value.read().await.as_ref() {
            return Ok(Some(value.clone()));
        }

        let value = self.crm.default_price_field_value().await?;
        if let Some(value) = &value {
            *self.default_price_field_value.write().await = Some(value.clone());
        }
        Ok(value)
    }

    /// Resolve a dedupe rule by name or title for a contact type.
    pub async fn dedupe_rule_id(
        &self,
        contact_type: &str,
        rule: &str,
    ) -> Result<Option<u64>, CrmError> {
        let cached = self.dedupe_rules.read().await.get(contact_type).cloned();
        let rules = match cached {
            Some(rules) => rules,
            None => {
                let rules = self.crm.dedupe_rules(contact_type).await?;
                self.dedupe_rules
                    .write()
                    .await
                    .insert(contact_type.to_string(), rules.clone());
                rules
            }
        };

        Ok(rules
            .iter()
            .find(|r| r.name == rule || r.title == rule)
            .map(|r| r.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCrmClient;

    fn cache_with_mock() -> (LookupCache, Arc<MockCrmClient>) {
        let mock = Arc::new(MockCrmClient::new());
        (LookupCache::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_financial_types_fetched_once() {
        let (cache, mock) = cache_with_mock();

        cache.financial_types().await.unwrap();
        cache.financial_types().await.unwrap();
        assert!(cache.is_active_financial_type(1).await.unwrap());
        assert!(!cache.is_active_financial_type(999).await.unwrap());

        assert_eq!(mock.call_count("FinancialType.get").await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (cache, mock) = cache_with_mock();

        cache.default_price_field_value().await.unwrap();
        cache.invalidate().await;
        cache.default_price_field_value().await.unwrap();

        assert_eq!(mock.call_count("PriceFieldValue.getdefault").await, 2);
    }

    #[tokio::test]
    async fn test_missing_price_field_value_not_cached() {
        let (cache, mock) = cache_with_mock();

        assert!(cache.price_field_value(42).await.unwrap().is_none());
        mock.add_price_field_value(crate::testing::fixtures::price_field_value(42, 4, Some(3)))
            .await;
        let value = cache.price_field_value(42).await.unwrap().unwrap();
        assert_eq!(value.price_field_id, 4);

        cache.price_field_value(42).await.unwrap();
        assert_eq!(mock.call_count("PriceFieldValue.get").await, 2);
    }

    #[tokio::test]
    async fn test_dedupe_rule_lookup_by_name_or_title() {
        let (cache, mock) = cache_with_mock();
        mock.add_dedupe_rule(DedupeRule {
            id: 12,
            name: "IndividualShop_12".to_string(),
            title: "Shop customers".to_string(),
            contact_type: "Individual".to_string(),
            used: "General".to_string(),
        })
        .await;

        assert_eq!(
            cache
                .dedupe_rule_id("Individual", "IndividualShop_12")
                .await
                .unwrap(),
            Some(12)
        );
        assert_eq!(
            cache
                .dedupe_rule_id("Individual", "Shop customers")
                .await
                .unwrap(),
            Some(12)
        );
        assert_eq!(
            cache.dedupe_rule_id("Individual", "nope").await.unwrap(),
            None
        );
        assert_eq!(mock.call_count("RuleGroup.get").await, 1);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let (cache, mock) = cache_with_mock();
        mock.fail_on("FinancialType.get", CrmError::Timeout).await;

        assert!(matches!(
            cache.financial_types().await,
            Err(CrmError::Timeout)
        ));
    }
}
