use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{ContactConfig, DedupeStrategy};
use crate::correlation::{CorrelationField, CorrelationStore};
use crate::crm::{
    merge_sub_types, Contact, ContactId, ContactParams, CrmClient, DedupeQuery, DedupeRuleRef,
    LookupCache,
};
use crate::error::SyncError;
use crate::metrics::CONTACT_RESOLUTIONS;
use crate::notify::{SyncEvent, SyncEventHandle};
use crate::order::Order;

/// Display name given to contacts created without any name.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown Name";

/// How the contact for an Order was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactResolution {
    /// Already stored for the Order.
    Linked,
    /// Linked to the customer's user account.
    User,
    /// Matched by the dedupe rule.
    Dedupe,
    /// Newly created.
    Created,
}

impl ContactResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactResolution::Linked => "linked",
            ContactResolution::User => "user",
            ContactResolution::Dedupe => "dedupe",
            ContactResolution::Created => "created",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedContact {
    pub contact_id: ContactId,
    pub resolution: ContactResolution,
}

/// Resolves or creates the Contact an Order belongs to.
pub struct ContactResolver {
    crm: Arc<dyn CrmClient>,
    cache: Arc<LookupCache>,
    correlation: Arc<dyn CorrelationStore>,
    events: SyncEventHandle,
    config: ContactConfig,
}

impl ContactResolver {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        cache: Arc<LookupCache>,
        correlation: Arc<dyn CorrelationStore>,
        events: SyncEventHandle,
        config: ContactConfig,
    ) -> Self {
        Self {
            crm,
            cache,
            correlation,
            events,
            config,
        }
    }

    /// Resolve the Contact for an Order.
    ///
    /// The stored contact id wins over any lookup. A newly found or created id
    /// is stored only after every remote call succeeded, so a failed run can
    /// simply be retried.
    pub async fn resolve(&self, order: &Order) -> Result<ResolvedContact, SyncError> {
        let meta = self.correlation.get(order.id)?;
        if let Some(contact_id) = meta.contact_id {
            debug!(order_id = order.id, contact_id, "Contact already linked");
            CONTACT_RESOLUTIONS.with_label_values(&["linked"]).inc();
            return Ok(ResolvedContact {
                contact_id,
                resolution: ContactResolution::Linked,
            });
        }

        let resolved = match self.resolve_remote(order).await {
            Ok(resolved) => resolved,
            Err(e) => {
                CONTACT_RESOLUTIONS.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        let written = self.correlation.set_if_absent(
            order.id,
            CorrelationField::ContactId,
            &resolved.contact_id.to_string(),
        )?;
        if !written {
            // A concurrent run stored a contact first; keep that one.
            if let Some(contact_id) = self.correlation.get(order.id)?.contact_id {
                return Ok(ResolvedContact {
                    contact_id,
                    resolution: ContactResolution::Linked,
                });
            }
        }

        CONTACT_RESOLUTIONS
            .with_label_values(&[resolved.resolution.as_str()])
            .inc();
        Ok(resolved)
    }

    async fn resolve_remote(&self, order: &Order) -> Result<ResolvedContact, SyncError> {
        if let Some(user_id) = order.customer_user_id {
            if let Some(contact_id) = self.crm.find_contact_for_user(user_id).await? {
                debug!(order_id = order.id, user_id, contact_id, "Contact found by user link");
                self.ensure_sub_type(contact_id, order).await?;
                return Ok(ResolvedContact {
                    contact_id,
                    resolution: ContactResolution::User,
                });
            }
        }

        if let Some(contact_id) = self.find_duplicate(order).await? {
            debug!(order_id = order.id, contact_id, "Contact matched by dedupe rule");
            self.ensure_sub_type(contact_id, order).await?;
            return Ok(ResolvedContact {
                contact_id,
                resolution: ContactResolution::Dedupe,
            });
        }

        let contact = self.create(order).await?;
        Ok(ResolvedContact {
            contact_id: contact.id,
            resolution: ContactResolution::Created,
        })
    }

    /// Best existing match for the Order's billing details, if any.
    pub async fn find_duplicate(&self, order: &Order) -> Result<Option<ContactId>, SyncError> {
        let billing = &order.billing;
        if billing.first_name.is_empty() && billing.last_name.is_empty() && billing.email.is_empty()
        {
            debug!(order_id = order.id, "No billing details to match on");
            return Ok(None);
        }

        let query = DedupeQuery {
            contact_type: self.config.contact_type.clone(),
            rule: self.dedupe_rule().await?,
            first_name: billing.first_name.clone(),
            last_name: billing.last_name.clone(),
            email: billing.email.clone(),
        };

        let matches = self.crm.find_duplicate_contacts(&query).await?;
        Ok(matches.into_iter().next())
    }

    async fn dedupe_rule(&self) -> Result<DedupeRuleRef, SyncError> {
        match &self.config.dedupe_rule {
            DedupeStrategy::Unsupervised => Ok(DedupeRuleRef::Unsupervised),
            DedupeStrategy::Named(name) => self
                .cache
                .dedupe_rule_id(&self.config.contact_type, name)
                .await?
                .map(DedupeRuleRef::Rule)
                .ok_or_else(|| {
                    SyncError::Validation(format!(
                        "no dedupe rule named '{}' for contact type {}",
                        name, self.config.contact_type
                    ))
                }),
        }
    }

    /// Add the configured sub-type to an existing contact, keeping the ones it has.
    async fn ensure_sub_type(&self, contact_id: ContactId, order: &Order) -> Result<(), SyncError> {
        let Some(sub_type) = self.configured_sub_types() else {
            return Ok(());
        };
        let Some(contact) = self.crm.get_contact(contact_id).await? else {
            return Ok(());
        };

        let merged = merge_sub_types(&contact.contact_sub_type, &sub_type);
        if merged == contact.contact_sub_type {
            return Ok(());
        }

        let params = ContactParams {
            contact_type: contact.contact_type.clone(),
            contact_sub_type: merged,
            ..Default::default()
        };
        let updated = self
            .crm
            .update_contact(contact_id, &params)
            .await
            .map_err(|e| {
                error!(
                    method = "Contact.update",
                    params = ?params,
                    result = %e,
                    order_id = order.id,
                    "Failed to update contact"
                );
                e
            })?;

        info!(order_id = order.id, contact_id, "Contact sub-types updated");
        self.events.try_emit(SyncEvent::ContactUpdated {
            contact: updated,
            order: order.clone(),
        });
        Ok(())
    }

    async fn create(&self, order: &Order) -> Result<Contact, SyncError> {
        let params = self.contact_params(order);

        let contact = self.crm.create_contact(&params).await.map_err(|e| {
            error!(
                method = "Contact.create",
                params = ?params,
                result = %e,
                order_id = order.id,
                "Failed to create contact"
            );
            e
        })?;

        info!(order_id = order.id, contact_id = contact.id, "Contact created");
        self.events.try_emit(SyncEvent::ContactCreated {
            contact: contact.clone(),
            order: order.clone(),
        });
        Ok(contact)
    }

    /// Parameters for a new contact. Email is left to the email sync.
    pub fn contact_params(&self, order: &Order) -> ContactParams {
        let first_name = non_empty(&order.billing.first_name);
        let last_name = non_empty(&order.billing.last_name);
        let display_name = if first_name.is_none() && last_name.is_none() {
            Some(UNKNOWN_DISPLAY_NAME.to_string())
        } else {
            None
        };

        ContactParams {
            contact_type: self.config.contact_type.clone(),
            contact_sub_type: self.configured_sub_types().unwrap_or_default(),
            first_name,
            last_name,
            display_name,
            source: Some(self.config.contact_source.clone()),
        }
    }

    fn configured_sub_types(&self) -> Option<Vec<String>> {
        self.config
            .contact_sub_type
            .as_deref()
            .and_then(non_empty)
            .map(|s| vec![s])
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
