//! Update-action synthesis for ctsync.
//!
//! Given a persisted resource and its desired draft, this crate computes the
//! ordered list of atomic update actions that converge one to the other. It is
//! pure and synchronous: no I/O, no shared state.
//!
//! - [`common`]: null/empty-aware comparison and set-field helpers
//! - [`categories`]: category membership and order hints
//! - [`variants`], [`attributes`], [`prices`], [`images`], [`assets`]: keyed
//!   diffs over nested collections
//! - [`custom`]: custom type and field diffs
//! - [`ordering`]: the conflict-avoidance ordering pass
//! - [`Synthesizer`]: composes named comparators, ordering and publish check
//!
//! Every synthesizer satisfies:
//! - **Deterministic**: the same inputs give the same action list
//! - **Convergent**: applying the list and diffing again gives no actions
//! - **Ordered**: a non-master variant removal precedes any variant addition

pub mod assets;
pub mod attributes;
pub mod categories;
pub mod common;
pub mod custom;
mod error;
pub mod images;
pub mod ordering;
pub mod prices;
mod product;
mod synthesizer;
pub mod variants;

pub use attributes::AttributeMetaDataMap;
pub use error::{SynthesisError, SynthesisResult};
pub use ordering::order_actions;
pub use product::product_synthesizer;
pub use synthesizer::{
    build_publish_action, ActionOrdering, Comparator, PublishCheck, SynthesisContext, Synthesizer,
};
