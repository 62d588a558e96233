//! Composable update-action synthesizer.
//!
//! A [`Synthesizer`] is a list of named comparators plus an ordering function
//! and an optional publish check. Resource kinds differ only in which
//! comparators they register.

use crate::attributes::AttributeMetaDataMap;
use crate::common::{build_set_field_action, Emptiable};
use crate::error::SynthesisResult;
use crate::ordering::order_actions;
use ctsync_types::UpdateAction;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Resource-specific metadata some comparators need to decide action shape.
#[derive(Debug, Clone, Default)]
pub struct SynthesisContext {
    /// Attribute definitions of the resource's product type, when known.
    pub attributes: Option<Arc<AttributeMetaDataMap>>,
}

impl SynthesisContext {
    /// A context with no metadata.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A context carrying attribute definitions.
    #[must_use]
    pub fn with_attributes(attributes: Arc<AttributeMetaDataMap>) -> Self {
        Self {
            attributes: Some(attributes),
        }
    }

    /// Attribute definitions, if supplied.
    #[must_use]
    pub fn attributes(&self) -> Option<&AttributeMetaDataMap> {
        self.attributes.as_deref()
    }
}

/// Compares one aspect of a resource with its draft.
pub type Comparator<R, D> =
    Box<dyn Fn(&R, &D, &SynthesisContext) -> SynthesisResult<Vec<UpdateAction>> + Send + Sync>;

/// Reorders a complete action list, given the current resource.
pub type ActionOrdering<R> = Box<dyn Fn(&R, Vec<UpdateAction>) -> Vec<UpdateAction> + Send + Sync>;

/// Decides whether a publish-state action should trail the list.
pub type PublishCheck<R, D> = Box<dyn Fn(&R, &D) -> Option<UpdateAction> + Send + Sync>;

/// Builds the ordered action list turning a resource `R` into its draft `D`.
pub struct Synthesizer<R, D> {
    comparators: Vec<(String, Comparator<R, D>)>,
    ordering: ActionOrdering<R>,
    publish: Option<PublishCheck<R, D>>,
}

impl<R, D> Default for Synthesizer<R, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, D> Synthesizer<R, D> {
    /// An empty synthesizer using the default ordering.
    pub fn new() -> Self {
        Self {
            comparators: Vec::new(),
            ordering: Box::new(|_, actions| order_actions(actions, None)),
            publish: None,
        }
    }

    /// Registers a comparator. Comparators run in registration order.
    #[must_use]
    pub fn with_comparator<F>(mut self, name: impl Into<String>, comparator: F) -> Self
    where
        F: Fn(&R, &D, &SynthesisContext) -> SynthesisResult<Vec<UpdateAction>> + Send + Sync + 'static,
    {
        self.comparators.push((name.into(), Box::new(comparator)));
        self
    }

    /// Registers a plain field: when the values differ, one `SetField` named
    /// `action` carries the new value (or unsets it).
    #[must_use]
    pub fn with_field<T, OF, NF>(self, action: &str, old: OF, new: NF) -> Self
    where
        T: PartialEq + Emptiable + Serialize + 'static,
        OF: Fn(&R) -> Option<&T> + Send + Sync + 'static,
        NF: Fn(&D) -> Option<&T> + Send + Sync + 'static,
    {
        let action_name = action.to_string();
        self.with_comparator(action, move |r, d, _| {
            Ok(build_set_field_action(&action_name, old(r), new(d))?.into_iter().collect())
        })
    }

    /// Replaces the ordering pass.
    #[must_use]
    pub fn with_ordering<F>(mut self, ordering: F) -> Self
    where
        F: Fn(&R, Vec<UpdateAction>) -> Vec<UpdateAction> + Send + Sync + 'static,
    {
        self.ordering = Box::new(ordering);
        self
    }

    /// Sets the publish check consulted after the other actions.
    #[must_use]
    pub fn with_publish_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&R, &D) -> Option<UpdateAction> + Send + Sync + 'static,
    {
        self.publish = Some(Box::new(check));
        self
    }

    /// Names of the registered comparators, in run order.
    pub fn comparator_names(&self) -> impl Iterator<Item = &str> {
        self.comparators.iter().map(|(name, _)| name.as_str())
    }

    /// Runs every comparator, orders the result and appends the publish
    /// action if one is warranted and at least one other action exists.
    ///
    /// The first comparator error aborts synthesis for this resource.
    pub fn synthesize(&self, old: &R, new: &D, context: &SynthesisContext) -> SynthesisResult<Vec<UpdateAction>> {
        let mut actions = Vec::new();
        for (name, comparator) in &self.comparators {
            let produced = comparator(old, new, context).inspect_err(|e| {
                debug!("Comparator {} failed: {}", name, e);
            })?;
            actions.extend(produced);
        }

        let mut actions = (self.ordering)(old, actions);
        if !actions.is_empty() {
            if let Some(publish) = self.publish.as_ref().and_then(|check| check(old, new)) {
                actions.push(publish);
            }
        }
        Ok(actions)
    }
}

/// The publish-state transition warranted by a non-empty update.
///
/// A published draft always publishes, promoting the staged changes just
/// produced. An unpublished draft unpublishes a published resource.
#[must_use]
pub fn build_publish_action(old_published: bool, new_publish: bool) -> Option<UpdateAction> {
    match (old_published, new_publish) {
        (_, true) => Some(UpdateAction::Publish),
        (true, false) => Some(UpdateAction::Unpublish),
        (false, false) => None,
    }
}
