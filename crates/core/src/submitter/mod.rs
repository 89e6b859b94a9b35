//! Order submission: the atomic order-create call and its bookkeeping.

mod submit;

pub use submit::{OrderSubmitter, SubmitOutcome};
