//! Remote CRM access: entity types, the client trait, a REST implementation
//! and a lookup cache.

mod cache;
mod error;
mod rest;
mod traits;
mod types;

pub use cache::LookupCache;
pub use error::CrmError;
pub use rest::RestCrmClient;
pub use traits::CrmClient;
pub use types::{
    merge_sub_types, Contact, ContactId, ContactParams, Contribution, ContributionId,
    ContributionStatus, DedupeQuery, DedupeRule, DedupeRuleRef, FinancialType, LineItem,
    MembershipParams, OrderCreateParams, ParticipantParams, ParticipantStatus, Payment,
    PaymentParams, PriceFieldValue, SubEntityParams, MEMBERSHIP_STATUS_PENDING,
};
