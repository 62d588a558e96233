//! Variant image diffs. Images are matched by URL and their order matters.

use ctsync_types::{Image, UpdateAction};

/// Builds image actions for one variant: removals, additions, then moves so
/// the final order equals `new`.
pub fn build_image_actions(variant_id: u32, old: &[Image], new: &[Image]) -> Vec<UpdateAction> {
    let mut actions = Vec::new();
    let mut working: Vec<&str> = Vec::with_capacity(new.len());

    for image in old {
        if new.iter().any(|n| n.url == image.url) {
            working.push(&image.url);
        } else {
            actions.push(UpdateAction::RemoveImage {
                variant_id,
                image_url: image.url.clone(),
            });
        }
    }

    for image in new {
        if !old.iter().any(|o| o.url == image.url) {
            actions.push(UpdateAction::AddExternalImage {
                variant_id,
                image: image.clone(),
            });
            working.push(&image.url);
        }
    }

    for (position, image) in new.iter().enumerate() {
        let Some(current) = working.iter().position(|url| *url == image.url) else {
            continue;
        };
        if current != position {
            let url = working.remove(current);
            working.insert(position, url);
            actions.push(UpdateAction::MoveImageToPosition {
                variant_id,
                image_url: image.url.clone(),
                position,
            });
        }
    }

    actions
}
