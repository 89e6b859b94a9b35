//! Contact resolution for Orders.

mod resolver;

pub use resolver::{ContactResolution, ContactResolver, ResolvedContact, UNKNOWN_DISPLAY_NAME};
