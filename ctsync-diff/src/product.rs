//! Ready-made synthesizer for products.

use crate::categories::{
    build_add_to_category_actions, build_order_hint_actions, build_remove_from_category_actions,
};
use crate::common::build_set_field_action;
use crate::ordering::order_actions;
use crate::synthesizer::{build_publish_action, Synthesizer};
use crate::variants::build_variant_actions;
use ctsync_types::{Product, ProductDraft};

/// Synthesizer covering the product fields this crate models.
///
/// Comparator order follows the remote's own expectations: categories are
/// added before hints are set for them, and removed after.
pub fn product_synthesizer() -> Synthesizer<Product, ProductDraft> {
    Synthesizer::new()
        .with_field("changeName", |p: &Product| Some(&p.name), |d: &ProductDraft| Some(&d.name))
        .with_field("changeSlug", |p: &Product| Some(&p.slug), |d: &ProductDraft| Some(&d.slug))
        .with_field(
            "setDescription",
            |p: &Product| p.description.as_ref(),
            |d: &ProductDraft| d.description.as_ref(),
        )
        .with_comparator("setTaxCategory", |old: &Product, new: &ProductDraft, _| {
            Ok(build_set_field_action("setTaxCategory", old.tax_category.as_ref(), new.tax_category.as_ref())?
                .into_iter()
                .collect())
        })
        .with_comparator("transitionState", |old: &Product, new: &ProductDraft, _| {
            // A state cannot be unset, only moved.
            if new.state.is_none() {
                return Ok(Vec::new());
            }
            Ok(build_set_field_action("transitionState", old.state.as_ref(), new.state.as_ref())?
                .into_iter()
                .collect())
        })
        .with_comparator("addToCategory", |old: &Product, new: &ProductDraft, _| {
            Ok(build_add_to_category_actions(&old.categories, &new.categories))
        })
        .with_comparator("setCategoryOrderHint", |old: &Product, new: &ProductDraft, _| {
            Ok(build_order_hint_actions(
                &old.category_order_hints,
                &new.category_order_hints,
                &new.categories,
            ))
        })
        .with_comparator("removeFromCategory", |old: &Product, new: &ProductDraft, _| {
            Ok(build_remove_from_category_actions(&old.categories, &new.categories))
        })
        .with_comparator("variants", |old: &Product, new: &ProductDraft, context| {
            build_variant_actions(old, new, context.attributes())
        })
        .with_ordering(|old: &Product, actions| order_actions(actions, Some(old.master_variant.id)))
        .with_publish_check(|old: &Product, new: &ProductDraft| build_publish_action(old.published, new.publish))
}
