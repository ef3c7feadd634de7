//! Geometric checks for placed items and free space.
//!
//! The allocator never consults these functions while loading. They verify a
//! container after arbitrary placement sequences.

use crate::container::{Container, PlacedItem};
use crate::types::{Cuboid, Dimensional, Point};

/// Checks whether the extended footprints of two placed items share a cell.
///
/// Uses axis-aligned box overlap on inclusive corners: two boxes are disjoint
/// as soon as they are separated along one axis.
pub fn intersects(a: &PlacedItem, b: &PlacedItem) -> bool {
    a.footprint().intersects(&b.footprint())
}

/// Returns `true` if no two placed items overlap.
pub fn placements_are_disjoint<'a, I>(items: I) -> bool
where
    I: IntoIterator<Item = &'a PlacedItem>,
{
    let items: Vec<&PlacedItem> = items.into_iter().collect();
    items
        .iter()
        .enumerate()
        .all(|(i, a)| items[i + 1..].iter().all(|b| !intersects(a, b)))
}

/// Returns `true` if every placed footprint lies inside the container.
pub fn placements_within_bounds(container: &Container) -> bool {
    let bounds = container_bounds(container);
    container
        .placed_items()
        .all(|placed| bounds.contains(&placed.footprint()))
}

/// Bounding cuboid of the container interior.
pub fn container_bounds(container: &Container) -> Cuboid {
    let spec = container.spec();
    Cuboid::from_origin_and_size(Point::origin(), spec.length(), spec.width(), spec.height())
}

/// Finds the first free box that overlaps a placed item or leaves the container.
///
/// # Returns
/// The offending `(anchor, max corner)` pair, or `None` when free space is sound
pub fn first_unsound_free_box(container: &Container) -> Option<(Point, Point)> {
    let bounds = container_bounds(container);
    container
        .free_boxes()
        .find(|free| {
            !bounds.contains(free)
                || container
                    .placed_items()
                    .any(|placed| placed.footprint().intersects(free))
        })
        .map(|free| (free.min, free.max))
}

/// Free space never claims an occupied cell and never leaves the container.
pub fn free_space_is_sound(container: &Container) -> bool {
    first_unsound_free_box(container).is_none()
}
