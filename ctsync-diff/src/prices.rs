//! Variant price diffs. Prices are matched by composite id.

use ctsync_types::{Price, PriceCompositeId, PriceDraft, UpdateAction};
use std::collections::HashMap;

/// Builds price actions for one variant: removes, then changes, then adds.
pub fn build_price_actions(variant_id: u32, old: &[Price], new: &[PriceDraft]) -> Vec<UpdateAction> {
    let old_by_id: HashMap<PriceCompositeId, &Price> =
        old.iter().map(|p| (p.composite_id(), p)).collect();
    let new_by_id: HashMap<PriceCompositeId, &PriceDraft> =
        new.iter().map(|p| (p.composite_id(), p)).collect();

    let mut removes = Vec::new();
    let mut changes = Vec::new();
    let mut adds = Vec::new();

    for price in old {
        match new_by_id.get(&price.composite_id()) {
            None => removes.push(UpdateAction::RemovePrice {
                price_id: price.id.clone(),
            }),
            Some(draft) if price.draft != **draft => changes.push(UpdateAction::ChangePrice {
                price_id: price.id.clone(),
                price: (*draft).clone(),
            }),
            Some(_) => {}
        }
    }

    for draft in new {
        if !old_by_id.contains_key(&draft.composite_id()) {
            adds.push(UpdateAction::AddPrice {
                variant_id,
                price: draft.clone(),
            });
        }
    }

    removes.into_iter().chain(changes).chain(adds).collect()
}
