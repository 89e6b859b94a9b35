//! Line item composition: Order items through a fixed list of stages.

mod compositor;
mod stages;
mod types;

pub use compositor::{LineItemCompositor, SHIPPING_LABEL};
pub use stages::{
    default_stages, BaseMapping, LineItemStage, MembershipAugmentation, ParticipantAugmentation,
    TaxAugmentation, VariantRedirect,
};
pub use types::{ComposedLineItems, Composition, DraftLineItem, StageContext, StageOutcome};
