//! Free-space allocator for a single container instance.
//!
//! Free space is a multimap from anchor points to the inclusive max corners of
//! the free boxes starting there. Boxes may overlap each other but never cover
//! a cell occupied by the extended footprint of a placed item.
//!
//! Placing an item runs two updates:
//! - the bottom update crops or splits every free box on the item's base level
//!   that the item cuts into;
//! - the top update (stackable items only) opens a box above the item and merges
//!   it with neighbouring free boxes on the same level through four directional
//!   passes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::ids::{ItemId, ItemIdFactory};
use crate::model::{ContainerSpec, ItemSpec, LoadedItem, VolumeSpec};
use crate::types::{Axis, Cuboid, Dimensional, Point, Weighted};

/// Anchor point to the max corners of the free boxes starting at it.
pub type FreeSpace = HashMap<Point, HashSet<Point>>;

type FreeBox = (Point, Point);

/// An item inside a container.
#[derive(Clone, Debug)]
pub struct PlacedItem {
    item: LoadedItem,
    anchor: Point,
    min_corner: Point,
}

impl PlacedItem {
    pub fn item(&self) -> &LoadedItem {
        &self.item
    }

    /// Anchor the item was loaded at; the corner of its extended footprint.
    pub fn anchor(&self) -> Point {
        self.anchor
    }

    /// Minimum corner of the item body, inside its clearance.
    pub fn min_corner(&self) -> Point {
        self.min_corner
    }

    /// Cells reserved by the item including clearance.
    pub fn footprint(&self) -> Cuboid {
        let v = self.item.volume_spec();
        Cuboid::from_origin_and_size(self.anchor, v.extended_length(), v.extended_width(), v.height())
    }

    pub fn into_item(self) -> LoadedItem {
        self.item
    }

    /// Cells occupied by the item body.
    pub fn body(&self) -> Cuboid {
        let v = self.item.volume_spec();
        Cuboid::from_origin_and_size(self.min_corner, v.length(), v.width(), v.height())
    }
}

/// A run of consecutively placed items with the same spec and orientation.
#[derive(Clone, Debug)]
pub struct Batch {
    pub spec: Arc<ItemSpec>,
    pub volume: VolumeSpec,
    pub ids: Vec<ItemId>,
    pub positions: Vec<Point>,
}

/// Direction of a top merge pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Neighbor {
    /// The extension box lies above the existing box along the pass axis.
    Upper,
    /// The extension box lies below the existing box along the pass axis.
    Lower,
}

/// Width-up, length-up, width-down, length-down.
const MERGE_PASSES: [(Axis, Neighbor); 4] = [
    (Axis::Y, Neighbor::Upper),
    (Axis::X, Neighbor::Upper),
    (Axis::Y, Neighbor::Lower),
    (Axis::X, Neighbor::Lower),
];

/// Merges two boxes adjacent along `axis` into the box covering both where
/// their ranges on the orthogonal axis overlap.
fn merge_adjacent(lower: FreeBox, upper: FreeBox, axis: Axis) -> Option<FreeBox> {
    let other = axis.orthogonal();
    let ((lo, lo_max), (up, up_max)) = (lower, upper);
    let adjacent = lo_max.get(axis) + 1 == up.get(axis);
    let overlapping = lo_max.get(other) >= up.get(other) && lo.get(other) <= up_max.get(other);
    if !(adjacent && overlapping) {
        return None;
    }
    let anchor = lo.with(other, lo.get(other).max(up.get(other)));
    let max = up_max.with(other, lo_max.get(other).min(up_max.get(other)));
    Some((anchor, max))
}

/// `inner` covers no more than `outer` along `axis`.
fn covered_along(inner: FreeBox, outer: FreeBox, axis: Axis) -> bool {
    inner.0.get(axis) >= outer.0.get(axis) && inner.1.get(axis) <= outer.1.get(axis)
}

/// One container instance with its free-space bookkeeping.
#[derive(Clone, Debug)]
pub struct Container {
    id: usize,
    spec: Arc<ContainerSpec>,
    free_space: FreeSpace,
    placed: HashMap<ItemId, PlacedItem>,
    order: Vec<ItemId>,
    loaded_weight: u64,
    loaded_volume: u64,
}

impl Container {
    /// Creates an empty container whose free space is the whole interior.
    pub fn new(spec: Arc<ContainerSpec>, id: usize) -> Self {
        let mut container = Self {
            id,
            spec,
            free_space: FreeSpace::new(),
            placed: HashMap::new(),
            order: Vec::new(),
            loaded_weight: 0,
            loaded_volume: 0,
        };
        container.reset_free_space();
        container
    }

    fn reset_free_space(&mut self) {
        let max = Point::new(
            self.spec.length() - 1,
            self.spec.width() - 1,
            self.spec.height() - 1,
        );
        self.free_space.clear();
        self.free_space.insert(Point::origin(), HashSet::from([max]));
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn spec(&self) -> &Arc<ContainerSpec> {
        &self.spec
    }

    pub fn free_space(&self) -> &FreeSpace {
        &self.free_space
    }

    /// Iterates all free boxes in no particular order.
    pub fn free_boxes(&self) -> impl Iterator<Item = Cuboid> + '_ {
        self.free_space
            .iter()
            .flat_map(|(anchor, maxes)| maxes.iter().map(move |max| Cuboid::new(*anchor, *max)))
    }

    /// Anchor points that currently start at least one free box.
    pub fn anchors(&self) -> impl Iterator<Item = Point> + '_ {
        self.free_space.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.order.len()
    }

    /// Placed items in placement order.
    pub fn placed_items(&self) -> impl Iterator<Item = &PlacedItem> + '_ {
        self.order.iter().filter_map(|id| self.placed.get(id))
    }

    pub fn placed_item(&self, id: ItemId) -> Option<&PlacedItem> {
        self.placed.get(&id)
    }

    pub fn loaded_weight(&self) -> u64 {
        self.loaded_weight
    }

    /// Sum of the extended volumes of all placed items.
    pub fn loaded_volume(&self) -> u64 {
        self.loaded_volume
    }

    pub fn loaded_volume_share(&self) -> f64 {
        self.loaded_volume as f64 / self.spec.volume() as f64
    }

    /// Checks whether an item in the given orientation can be loaded at `point`.
    ///
    /// The total weight must stay within the lifting capacity and at least one
    /// free box anchored exactly at `point` must hold the extended footprint.
    pub fn can_load(&self, point: Point, spec: &ItemSpec, volume: &VolumeSpec) -> bool {
        if self.loaded_weight + u64::from(spec.weight()) > u64::from(self.spec.lifting_capacity()) {
            return false;
        }
        self.free_space.get(&point).is_some_and(|maxes| {
            maxes.iter().any(|max| {
                Cuboid::new(point, *max).fits(
                    volume.extended_length(),
                    volume.extended_width(),
                    volume.height(),
                )
            })
        })
    }

    /// Assigns an id to a new item instance and loads it at `point`.
    ///
    /// `can_load` must have accepted the same point, spec and orientation.
    pub fn load(
        &mut self,
        point: Point,
        spec: &Arc<ItemSpec>,
        volume: VolumeSpec,
        ids: &dyn ItemIdFactory,
    ) -> ItemId {
        let item = LoadedItem::new(ids.next_id(), Arc::clone(spec), volume);
        self.load_item(point, item)
    }

    /// Loads an item instance that already has an id.
    pub fn load_item(&mut self, point: Point, item: LoadedItem) -> ItemId {
        debug_assert!(
            self.can_load(point, item.spec(), item.volume_spec()),
            "item {} does not fit at {}",
            item.id(),
            point
        );

        let volume = *item.volume_spec();
        let max_point = Point::new(
            point.x + volume.extended_length() - 1,
            point.y + volume.extended_width() - 1,
            point.z + volume.height() - 1,
        );
        self.update_free_space(point, max_point, item.is_stackable());

        let min_corner = Point::new(
            point.x + (volume.extended_length() - volume.length()) / 2,
            point.y + (volume.extended_width() - volume.width()) / 2,
            point.z,
        );
        let id = item.id();
        self.loaded_weight += u64::from(item.weight());
        self.loaded_volume = self.loaded_volume.saturating_add(volume.extended_volume());
        self.placed.insert(
            id,
            PlacedItem {
                item,
                anchor: point,
                min_corner,
            },
        );
        self.order.push(id);
        id
    }

    /// Removes every item and restores the initial free space.
    ///
    /// # Returns
    /// The removed items in placement order
    pub fn unload_all(&mut self) -> Vec<PlacedItem> {
        let mut placed = std::mem::take(&mut self.placed);
        let removed = std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|id| placed.remove(&id))
            .collect();
        self.loaded_weight = 0;
        self.loaded_volume = 0;
        self.reset_free_space();
        removed
    }

    /// Groups consecutive items with the same spec and orientation.
    pub fn batches(&self) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();
        for placed in self.placed_items() {
            let item = placed.item();
            match batches.last_mut() {
                Some(batch) if *batch.spec == **item.spec() && batch.volume == *item.volume_spec() => {
                    batch.ids.push(item.id());
                    batch.positions.push(placed.min_corner());
                }
                _ => batches.push(Batch {
                    spec: Arc::clone(item.spec()),
                    volume: *item.volume_spec(),
                    ids: vec![item.id()],
                    positions: vec![placed.min_corner()],
                }),
            }
        }
        batches
    }

    /// Min corners of all placed items in physical loading order, door side last.
    pub fn point_loading_order(&self) -> Vec<Point> {
        let mut points: Vec<Point> = self.placed.values().map(PlacedItem::min_corner).collect();
        points.sort_unstable_by_key(Point::column_key);
        points
    }

    fn update_free_space(&mut self, point: Point, max_point: Point, stackable: bool) {
        let top_candidates: Vec<Point> = if stackable {
            self.free_space
                .keys()
                .filter(|q| {
                    q.z == max_point.z + 1 && q.x <= max_point.x + 1 && q.y <= max_point.y + 1
                })
                .copied()
                .collect()
        } else {
            Vec::new()
        };

        self.resolve_bottom(point, max_point);
        if stackable {
            self.extend_top(point, max_point, &top_candidates);
        }
        self.free_space.retain(|_, maxes| !maxes.is_empty());
    }

    fn resolve_bottom(&mut self, p: Point, max_p: Point) {
        let affected: Vec<Point> = self
            .free_space
            .keys()
            .filter(|q| q.z == p.z && q.x <= max_p.x && q.y <= max_p.y)
            .copied()
            .collect();

        let mut replacements: Vec<FreeBox> = Vec::new();
        for q in affected {
            let Some(maxes) = self.free_space.remove(&q) else {
                continue;
            };
            for m in maxes {
                if m.x < p.x || m.y < p.y {
                    replacements.push((q, m));
                } else if q.x >= p.x && q.y >= p.y {
                    if m.x > max_p.x {
                        replacements.push((q.with_x(max_p.x + 1), m));
                    }
                    if m.y > max_p.y {
                        replacements.push((q.with_y(max_p.y + 1), m));
                    }
                } else {
                    if p.x > q.x {
                        replacements.push((q, m.with_x(p.x - 1)));
                    }
                    if m.x > max_p.x {
                        replacements.push((q.with_x(max_p.x + 1), m));
                    }
                    if p.y > q.y {
                        replacements.push((q, m.with_y(p.y - 1)));
                    }
                    if m.y > max_p.y {
                        replacements.push((q.with_y(max_p.y + 1), m));
                    }
                }
            }
        }

        for (anchor, max) in replacements {
            self.free_space.entry(anchor).or_default().insert(max);
        }
    }

    fn extend_top(&mut self, p: Point, max_p: Point, candidates: &[Point]) {
        let top_z = max_p.z + 1;
        if top_z >= self.spec.height() {
            return;
        }

        let top_box = (p.with_z(top_z), max_p.with_z(self.spec.height() - 1));
        self.free_space.entry(top_box.0).or_default().insert(top_box.1);
        let mut extension: HashSet<FreeBox> = HashSet::from([top_box]);

        for (axis, neighbor) in MERGE_PASSES {
            self.merge_pass(axis, neighbor, candidates, &mut extension);
        }

        for (anchor, max) in extension {
            self.free_space.entry(anchor).or_default().insert(max);
        }
    }

    fn merge_pass(
        &mut self,
        axis: Axis,
        neighbor: Neighbor,
        candidates: &[Point],
        extension: &mut HashSet<FreeBox>,
    ) {
        let other = axis.orthogonal();
        let mut merged: Vec<FreeBox> = Vec::new();
        let mut subsumed: Vec<FreeBox> = Vec::new();

        for q in candidates {
            let Some(maxes) = self.free_space.get(q) else {
                continue;
            };
            for m in maxes {
                let existing = (*q, *m);
                for ext in extension.iter() {
                    let (lower, upper) = match neighbor {
                        Neighbor::Upper => (existing, *ext),
                        Neighbor::Lower => (*ext, existing),
                    };
                    let Some(joined) = merge_adjacent(lower, upper, axis) else {
                        continue;
                    };
                    merged.push(joined);
                    if covered_along(existing, *ext, other) {
                        subsumed.push(existing);
                    }
                    if covered_along(*ext, existing, other) {
                        subsumed.push(*ext);
                    }
                }
            }
        }

        extension.extend(merged);
        for free_box in subsumed {
            if let Some(maxes) = self.free_space.get_mut(&free_box.0) {
                maxes.remove(&free_box.1);
            }
            extension.remove(&free_box);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{free_space_is_sound, placements_are_disjoint};
    use crate::ids::SequentialIdFactory;

    fn container(dims: (u32, u32, u32), capacity: u32) -> Container {
        Container::new(Arc::new(ContainerSpec::new("test", dims, capacity).unwrap()), 0)
    }

    fn item(dims: (u32, u32, u32), stackable: bool) -> Arc<ItemSpec> {
        Arc::new(ItemSpec::builder("item", dims, 1).stackable(stackable).build().unwrap())
    }

    fn load(container: &mut Container, ids: &SequentialIdFactory, point: Point, spec: &Arc<ItemSpec>) {
        assert!(container.can_load(point, spec, spec.volume_spec()));
        container.load(point, spec, *spec.volume_spec(), ids);
        assert!(free_space_is_sound(container));
    }

    fn free_map(entries: &[((u32, u32, u32), &[(u32, u32, u32)])]) -> FreeSpace {
        entries
            .iter()
            .map(|(anchor, maxes)| {
                (
                    Point::from(*anchor),
                    maxes.iter().map(|m| Point::from(*m)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn new_container_has_one_free_box() {
        let container = container((10, 8, 6), 100);
        assert_eq!(
            container.free_space(),
            &free_map(&[((0, 0, 0), &[(9, 7, 5)])])
        );
    }

    #[test]
    fn can_load_only_at_anchor_points() {
        let container = container((10, 10, 10), 100);
        let spec = item((5, 5, 5), true);
        assert!(container.can_load(Point::origin(), &spec, spec.volume_spec()));
        assert!(!container.can_load(Point::new(1, 0, 0), &spec, spec.volume_spec()));
    }

    #[test]
    fn can_load_rejects_items_larger_than_the_box() {
        let container = container((10, 10, 10), 100);
        let spec = item((11, 5, 5), true);
        assert!(!container.can_load(Point::origin(), &spec, spec.volume_spec()));
    }

    #[test]
    fn can_load_enforces_lifting_capacity() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 2);
        let light = item((2, 2, 2), true);
        let heavy = Arc::new(ItemSpec::builder("heavy", (2, 2, 2), 2).build().unwrap());

        load(&mut container, &ids, Point::origin(), &light);
        assert!(container.can_load(Point::new(2, 0, 0), &light, light.volume_spec()));
        assert!(!container.can_load(Point::new(2, 0, 0), &heavy, heavy.volume_spec()));
    }

    #[test]
    fn non_stackable_item_seals_the_space_above() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        load(&mut container, &ids, Point::origin(), &item((5, 5, 5), false));

        assert_eq!(
            container.free_space(),
            &free_map(&[((0, 5, 0), &[(9, 9, 9)]), ((5, 0, 0), &[(9, 9, 9)])])
        );
        assert!(container.anchors().all(|a| !(a.z >= 5 && a.x < 5 && a.y < 5)));
    }

    #[test]
    fn stackable_item_opens_a_box_above() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        load(&mut container, &ids, Point::origin(), &item((5, 5, 5), true));

        assert_eq!(
            container.free_space(),
            &free_map(&[
                ((5, 0, 0), &[(9, 9, 9)]),
                ((0, 5, 0), &[(9, 9, 9)]),
                ((0, 0, 5), &[(4, 4, 9)]),
            ])
        );
    }

    #[test]
    fn item_stacked_on_top_consumes_the_upper_box() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        let spec = item((5, 5, 5), true);
        load(&mut container, &ids, Point::origin(), &spec);
        load(&mut container, &ids, Point::new(0, 0, 5), &spec);

        assert!(!container.free_space().contains_key(&Point::new(0, 0, 5)));
        assert_eq!(container.item_count(), 2);
    }

    #[test]
    fn no_box_is_opened_at_the_ceiling() {
        let ids = SequentialIdFactory::new();
        let mut container = container((5, 5, 10), 100);
        let spec = item((5, 5, 5), true);
        load(&mut container, &ids, Point::origin(), &spec);
        load(&mut container, &ids, Point::new(0, 0, 5), &spec);

        assert!(container.free_space().is_empty());
        let corners: Vec<_> = container.placed_items().map(PlacedItem::min_corner).collect();
        assert_eq!(corners, vec![Point::origin(), Point::new(0, 0, 5)]);
    }

    #[test]
    fn neighbouring_tops_are_merged() {
        let ids = SequentialIdFactory::new();
        let mut container = container((40, 20, 20), 100);
        let large = item((5, 5, 5), true);
        let small = item((2, 2, 2), true);

        load(&mut container, &ids, Point::origin(), &large);
        for y in [5, 7, 9, 11] {
            load(&mut container, &ids, Point::new(0, y, 0), &small);
        }

        assert_eq!(
            container.free_space(),
            &free_map(&[
                ((0, 0, 5), &[(4, 4, 19)]),
                ((0, 5, 2), &[(1, 12, 19)]),
                ((0, 13, 0), &[(39, 19, 19)]),
                ((2, 5, 0), &[(39, 19, 19)]),
                ((2, 7, 0), &[(39, 19, 19)]),
                ((2, 9, 0), &[(39, 19, 19)]),
                ((2, 11, 0), &[(39, 19, 19)]),
                ((5, 0, 0), &[(39, 19, 19)]),
            ])
        );
        assert!(placements_are_disjoint(container.placed_items()));
    }

    #[test]
    fn top_merges_with_a_lower_neighbour_along_the_length() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        load(&mut container, &ids, Point::origin(), &item((5, 2, 5), true));
        load(&mut container, &ids, Point::new(5, 0, 0), &item((5, 5, 5), true));

        // The narrow top at (0, 0, 5) is swallowed by the wider merged box.
        assert_eq!(
            container.free_space(),
            &free_map(&[
                ((0, 2, 0), &[(4, 9, 9)]),
                ((0, 5, 0), &[(9, 9, 9)]),
                ((5, 5, 0), &[(9, 9, 9)]),
                ((0, 0, 5), &[(9, 1, 9)]),
                ((5, 0, 5), &[(9, 4, 9)]),
            ])
        );

        load(&mut container, &ids, Point::new(0, 2, 0), &item((5, 3, 5), true));

        assert_eq!(
            container.free_space(),
            &free_map(&[
                ((0, 5, 0), &[(4, 9, 9), (9, 9, 9)]),
                ((5, 5, 0), &[(9, 9, 9)]),
                ((0, 0, 5), &[(9, 1, 9), (9, 4, 9)]),
            ])
        );
    }

    #[test]
    fn top_merges_with_a_lower_neighbour_along_the_width() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        load(&mut container, &ids, Point::origin(), &item((2, 5, 5), true));
        load(&mut container, &ids, Point::new(0, 5, 0), &item((5, 5, 5), true));

        assert_eq!(
            container.free_space(),
            &free_map(&[
                ((2, 0, 0), &[(9, 4, 9)]),
                ((5, 0, 0), &[(9, 9, 9)]),
                ((5, 5, 0), &[(9, 9, 9)]),
                ((0, 0, 5), &[(1, 9, 9)]),
                ((0, 5, 5), &[(4, 9, 9)]),
            ])
        );

        load(&mut container, &ids, Point::new(2, 0, 0), &item((3, 5, 5), true));

        assert_eq!(
            container.free_space(),
            &free_map(&[
                ((5, 0, 0), &[(9, 4, 9), (9, 9, 9)]),
                ((5, 5, 0), &[(9, 9, 9)]),
                ((0, 0, 5), &[(1, 9, 9), (4, 9, 9)]),
            ])
        );
    }

    #[test]
    fn boxes_cut_from_the_side_are_cropped() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        load(&mut container, &ids, Point::new(0, 0, 0), &item((2, 10, 10), true));
        load(&mut container, &ids, Point::new(2, 0, 0), &item((2, 2, 2), false));
        load(&mut container, &ids, Point::new(4, 0, 0), &item((3, 3, 3), false));

        assert!(placements_are_disjoint(container.placed_items()));
        assert!(free_space_is_sound(&container));
    }

    #[test]
    fn unload_all_restores_the_initial_state() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        let spec = item((5, 5, 5), true);
        load(&mut container, &ids, Point::origin(), &spec);
        load(&mut container, &ids, Point::new(5, 0, 0), &spec);

        let removed = container.unload_all();

        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].anchor(), Point::origin());
        assert!(container.is_empty());
        assert_eq!(container.loaded_weight(), 0);
        assert_eq!(container.free_space(), &free_map(&[((0, 0, 0), &[(9, 9, 9)])]));
    }

    #[test]
    fn batches_group_consecutive_identical_items() {
        let ids = SequentialIdFactory::new();
        let mut container = container((20, 10, 10), 100);
        let a = item((2, 2, 2), true);
        let b = Arc::new(ItemSpec::builder("other", (3, 3, 3), 1).build().unwrap());

        load(&mut container, &ids, Point::origin(), &a);
        load(&mut container, &ids, Point::new(2, 0, 0), &a);
        load(&mut container, &ids, Point::new(4, 0, 0), &b);
        load(&mut container, &ids, Point::new(7, 0, 0), &a);

        let batches = container.batches();
        let sizes: Vec<_> = batches.iter().map(|b| b.positions.len()).collect();
        assert_eq!(sizes, vec![2, 1, 1]);
        assert_eq!(batches[1].spec.name(), "other");
        assert_eq!(batches[0].positions, vec![Point::origin(), Point::new(2, 0, 0)]);
    }

    #[test]
    fn loaded_volume_counts_the_clearance() {
        let ids = SequentialIdFactory::new();
        let mut container = container((10, 10, 10), 100);
        let spec = Arc::new(ItemSpec::builder("padded", (2, 2, 5), 3).extension(1).build().unwrap());
        load(&mut container, &ids, Point::origin(), &spec);

        assert_eq!(container.loaded_volume(), 4 * 4 * 5);
        assert_eq!(container.loaded_weight(), 3);
        assert!((container.loaded_volume_share() - 0.08).abs() < 1e-9);
        assert_eq!(container.point_loading_order(), vec![Point::new(1, 1, 0)]);
    }
}
