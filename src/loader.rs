//! Scheduling of item units into containers.
//!
//! The loader orders item types by priority and fills containers greedily:
//! - every unit tries its orientations in order and takes the first anchor that
//!   accepts it (first fit);
//! - in `BestTrial` mode each available container type is filled on trial and
//!   the fullest trial is committed, round after round;
//! - in `ExistingFirst` mode units go into the first open container that takes
//!   them and a selection strategy decides which container to open next.
//!
//! An optional second pass reloads every container in physical loading order.
//! Items that cannot be reloaded in that order are dropped and reported as
//! leftovers.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::container::{Container, PlacedItem};
use crate::ids::{ItemIdFactory, SequentialIdFactory};
use crate::model::{ContainerSpec, ItemSpec, LoadedItem, VolumeSpec};
use crate::scan::ScanOrder;
use crate::selection::{ContainerSelector, SmallestSufficientSelector};
use crate::types::{Dimensional, Point, Weighted};

/// How anchors are scanned while loading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoadingType {
    /// Layer by layer from the floor up.
    #[default]
    Stable,
    /// Column by column from the far wall to the door.
    Vertical,
}

impl LoadingType {
    pub fn scan_order(self) -> ScanOrder {
        match self {
            LoadingType::Stable => ScanOrder::LayerFirst,
            LoadingType::Vertical => ScanOrder::ColumnFirst,
        }
    }
}

/// Strategy for assigning units to containers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PackingMode {
    /// Fill every available container type on trial and keep the fullest.
    #[default]
    BestTrial,
    /// Use open containers first and open new ones on demand.
    ExistingFirst,
}

/// Configuration for the loader.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PackingConfig {
    pub loading_type: LoadingType,
    pub packing_mode: PackingMode,
    /// Recompute a physical loading sequence after placement.
    pub with_order: bool,
    /// Evaluate trial containers on the rayon thread pool.
    ///
    /// Layouts match a sequential run. Item ids do not: trials draw from the
    /// shared id factory concurrently, so ids stay unique but their values
    /// depend on scheduling.
    pub parallel_trials: bool,
}

impl PackingConfig {
    pub const DEFAULT_LOADING_TYPE: LoadingType = LoadingType::Stable;
    pub const DEFAULT_PACKING_MODE: PackingMode = PackingMode::BestTrial;
    pub const DEFAULT_WITH_ORDER: bool = false;
    pub const DEFAULT_PARALLEL_TRIALS: bool = false;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            loading_type: Self::DEFAULT_LOADING_TYPE,
            packing_mode: Self::DEFAULT_PACKING_MODE,
            with_order: Self::DEFAULT_WITH_ORDER,
            parallel_trials: Self::DEFAULT_PARALLEL_TRIALS,
        }
    }
}

/// Builder for `PackingConfig`.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn loading_type(mut self, loading_type: LoadingType) -> Self {
        self.config.loading_type = loading_type;
        self
    }

    pub fn packing_mode(mut self, mode: PackingMode) -> Self {
        self.config.packing_mode = mode;
        self
    }

    pub fn with_order(mut self, with_order: bool) -> Self {
        self.config.with_order = with_order;
        self
    }

    pub fn parallel_trials(mut self, parallel: bool) -> Self {
        self.config.parallel_trials = parallel;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Container types the loader may open.
#[derive(Clone, Debug)]
pub enum ContainerInventory {
    /// Each type with the number of containers available.
    Fixed(Vec<(ContainerSpec, u32)>),
    /// Any number of containers of each type.
    Auto(Vec<ContainerSpec>),
}

/// Requested units of one item type that were not loaded.
#[derive(Clone, Debug)]
pub struct Leftover {
    pub spec: Arc<ItemSpec>,
    pub count: u32,
}

/// Outcome of a loading run.
#[derive(Clone, Debug)]
pub struct LoadingResult {
    pub containers: Vec<Container>,
    /// In request order; item types with nothing left over are omitted.
    pub leftovers: Vec<Leftover>,
}

impl LoadingResult {
    /// Whether every requested unit was loaded.
    pub fn is_complete(&self) -> bool {
        self.leftovers.is_empty()
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn loaded_count(&self) -> usize {
        self.containers.iter().map(Container::item_count).sum()
    }

    pub fn leftover_count(&self) -> u32 {
        self.leftovers.iter().map(|l| l.count).sum()
    }

    /// Units of `spec` left over.
    pub fn leftover_of(&self, spec: &ItemSpec) -> u32 {
        self.leftovers
            .iter()
            .filter(|l| *l.spec == *spec)
            .map(|l| l.count)
            .sum()
    }

    /// Units of `spec` loaded across all containers.
    pub fn loaded_of(&self, spec: &ItemSpec) -> usize {
        self.containers
            .iter()
            .flat_map(|c| c.placed_items())
            .filter(|p| **p.item().spec() == *spec)
            .count()
    }

    /// Mean loaded volume share of all containers.
    pub fn average_volume_share(&self) -> f64 {
        if self.containers.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .containers
            .iter()
            .map(Container::loaded_volume_share)
            .sum();
        sum / self.containers.len() as f64
    }

    pub fn total_loaded_weight(&self) -> u64 {
        self.containers.iter().map(Container::loaded_weight).sum()
    }
}

/// Progress reported while loading, suitable for live visualisation.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum LoadEvent {
    /// A container was committed.
    ContainerOpened {
        container_id: usize,
        kind: String,
        dims: (u32, u32, u32),
        lifting_capacity: u32,
    },
    /// A unit was placed in a committed container.
    ItemPlaced {
        container_id: usize,
        item_id: u64,
        name: String,
        pos: (u32, u32, u32),
        dims: (u32, u32, u32),
        loaded_weight: u64,
    },
    /// Units of an item type found no place.
    ItemsLeftOver { name: String, count: u32 },
    /// Units removed from a container while recomputing the loading order.
    ItemsDropped {
        container_id: usize,
        name: String,
        count: u32,
    },
    /// Loading finished.
    Finished {
        containers: usize,
        loaded: usize,
        leftover: u32,
    },
}

/// Requested units of one item type.
#[derive(Debug)]
struct Demand {
    spec: Arc<ItemSpec>,
    variations: Vec<VolumeSpec>,
    remaining: u32,
}

/// One container type and how many containers of it are left. `None` is unlimited.
#[derive(Debug)]
struct InventorySlot {
    spec: Arc<ContainerSpec>,
    remaining: Option<u32>,
}

impl InventorySlot {
    fn is_available(&self) -> bool {
        self.remaining != Some(0)
    }

    fn take_one(&mut self) {
        if let Some(count) = self.remaining.as_mut() {
            *count = count.saturating_sub(1);
        }
    }
}

/// A provisionally filled container and the units it took per demand.
struct Trial {
    slot: usize,
    container: Container,
    loaded: Vec<u32>,
}

/// Plans the loading of item units into containers.
pub struct Loader {
    demands: Vec<Demand>,
    priority: Vec<usize>,
    inventory: Vec<InventorySlot>,
    config: PackingConfig,
    selector: Box<dyn ContainerSelector>,
    ids: Arc<dyn ItemIdFactory>,
}

impl Loader {
    /// Creates a loader for the requested units.
    ///
    /// # Parameters
    /// * `items` - Item types with the number of units requested, in request order
    /// * `inventory` - Container types that may be opened
    /// * `config` - Loading configuration
    pub fn new(items: Vec<(ItemSpec, u32)>, inventory: ContainerInventory, config: PackingConfig) -> Self {
        let demands: Vec<Demand> = items
            .into_iter()
            .map(|(spec, count)| Demand {
                variations: spec.variations(),
                spec: Arc::new(spec),
                remaining: count,
            })
            .collect();

        let mut priority: Vec<usize> = (0..demands.len()).collect();
        priority.sort_by(|&a, &b| demands[a].spec.priority_cmp(&demands[b].spec));

        let inventory = match inventory {
            ContainerInventory::Fixed(entries) => entries
                .into_iter()
                .map(|(spec, count)| InventorySlot {
                    spec: Arc::new(spec),
                    remaining: Some(count),
                })
                .collect(),
            ContainerInventory::Auto(specs) => specs
                .into_iter()
                .map(|spec| InventorySlot {
                    spec: Arc::new(spec),
                    remaining: None,
                })
                .collect(),
        };

        Self {
            demands,
            priority,
            inventory,
            config,
            selector: Box::new(SmallestSufficientSelector),
            ids: Arc::new(SequentialIdFactory::new()),
        }
    }

    /// Replaces the strategy that picks container types in `ExistingFirst` mode.
    pub fn with_selector(mut self, selector: impl ContainerSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn with_id_factory(mut self, ids: Arc<dyn ItemIdFactory>) -> Self {
        self.ids = ids;
        self
    }

    pub fn run(self) -> LoadingResult {
        self.run_with_progress(|_| {})
    }

    /// Runs the loader and reports every step to `on_event`.
    pub fn run_with_progress(mut self, mut on_event: impl FnMut(&LoadEvent)) -> LoadingResult {
        let requested = self.pending_units();
        let mut containers = match self.config.packing_mode {
            PackingMode::BestTrial => self.load_best_trials(&mut on_event),
            PackingMode::ExistingFirst => self.load_existing_first(&mut on_event),
        };

        let mut dropped: Vec<u32> = vec![0; self.demands.len()];
        if self.config.with_order {
            for container in &mut containers {
                let removed = recompute_loading_order(container);
                self.report_dropped(container.id(), removed, &mut dropped, &mut on_event);
            }
        }

        let mut leftovers = Vec::new();
        for (demand, dropped) in self.demands.iter().zip(&dropped) {
            let count = demand.remaining + dropped;
            if count == 0 {
                continue;
            }
            on_event(&LoadEvent::ItemsLeftOver {
                name: demand.spec.name().to_string(),
                count,
            });
            leftovers.push(Leftover {
                spec: Arc::clone(&demand.spec),
                count,
            });
        }

        let result = LoadingResult {
            containers,
            leftovers,
        };
        log::info!(
            "Loaded {} of {} units into {} containers, {} left over",
            result.loaded_count(),
            requested,
            result.container_count(),
            result.leftover_count()
        );
        on_event(&LoadEvent::Finished {
            containers: result.container_count(),
            loaded: result.loaded_count(),
            leftover: result.leftover_count(),
        });
        result
    }

    fn pending_units(&self) -> u64 {
        self.demands.iter().map(|d| u64::from(d.remaining)).sum()
    }

    fn load_best_trials(&mut self, on_event: &mut impl FnMut(&LoadEvent)) -> Vec<Container> {
        let mut containers: Vec<Container> = Vec::new();

        while self.pending_units() > 0 {
            let available: Vec<usize> = (0..self.inventory.len())
                .filter(|&slot| self.inventory[slot].is_available())
                .collect();
            let container_id = containers.len() + 1;

            let trials: Vec<Trial> = if self.config.parallel_trials {
                available
                    .par_iter()
                    .map(|&slot| self.run_trial(slot, container_id))
                    .collect()
            } else {
                available
                    .iter()
                    .map(|&slot| self.run_trial(slot, container_id))
                    .collect()
            };

            let Some(best) = select_fullest(trials) else {
                log::debug!("No container type accepts any remaining unit");
                break;
            };

            self.inventory[best.slot].take_one();
            for (demand, loaded) in self.demands.iter_mut().zip(&best.loaded) {
                demand.remaining -= loaded;
            }
            log::debug!(
                "Committed container {} ({}) with {} units, volume {}",
                container_id,
                best.container.spec().name(),
                best.container.item_count(),
                best.container.loaded_volume()
            );
            report_committed(&best.container, on_event);
            containers.push(best.container);
        }

        containers
    }

    fn run_trial(&self, slot: usize, container_id: usize) -> Trial {
        let mut container = Container::new(Arc::clone(&self.inventory[slot].spec), container_id);
        let mut loaded = vec![0u32; self.demands.len()];

        for &index in &self.priority {
            let demand = &self.demands[index];
            while loaded[index] < demand.remaining {
                if !self.place_unit(&mut container, demand) {
                    break;
                }
                loaded[index] += 1;
            }
        }

        log::debug!(
            "Trial {} loaded {} units, volume {}",
            container.spec().name(),
            container.item_count(),
            container.loaded_volume()
        );
        Trial {
            slot,
            container,
            loaded,
        }
    }

    /// Loads one unit at the first anchor accepting any orientation.
    fn place_unit(&self, container: &mut Container, demand: &Demand) -> bool {
        let order = self.config.loading_type.scan_order();
        for variation in &demand.variations {
            if let Some(point) = container.first_fit(order, &demand.spec, variation) {
                container.load(point, &demand.spec, *variation, self.ids.as_ref());
                return true;
            }
        }
        false
    }

    fn load_existing_first(&mut self, on_event: &mut impl FnMut(&LoadEvent)) -> Vec<Container> {
        let mut containers: Vec<Container> = Vec::new();
        let priority = self.priority.clone();

        for index in priority {
            while self.demands[index].remaining > 0 {
                if let Some(target) = self.place_in_open(&mut containers, index) {
                    report_last_placed(&containers[target], on_event);
                    self.demands[index].remaining -= 1;
                    continue;
                }

                let Some(mut container) = self.open_for(index, containers.len() + 1) else {
                    log::debug!(
                        "No new container for {}, {} units left over",
                        self.demands[index].spec.name(),
                        self.demands[index].remaining
                    );
                    break;
                };
                if !self.place_unit(&mut container, &self.demands[index]) {
                    log::debug!(
                        "{} does not fit into a new {}",
                        self.demands[index].spec.name(),
                        container.spec().name()
                    );
                    break;
                }

                if let Some(slot) = self
                    .inventory
                    .iter_mut()
                    .find(|slot| *slot.spec == **container.spec())
                {
                    slot.take_one();
                }
                self.demands[index].remaining -= 1;
                report_committed(&container, on_event);
                containers.push(container);
            }
        }

        containers
    }

    /// Tries every orientation against every open container in opening order.
    fn place_in_open(&self, containers: &mut [Container], index: usize) -> Option<usize> {
        let demand = &self.demands[index];
        let order = self.config.loading_type.scan_order();
        for variation in &demand.variations {
            for (target, container) in containers.iter_mut().enumerate() {
                if let Some(point) = container.first_fit(order, &demand.spec, variation) {
                    container.load(point, &demand.spec, *variation, self.ids.as_ref());
                    return Some(target);
                }
            }
        }
        None
    }

    fn open_for(&self, index: usize, container_id: usize) -> Option<Container> {
        let eligible: Vec<Arc<ContainerSpec>> = self
            .inventory
            .iter()
            .filter(|slot| slot.is_available())
            .map(|slot| Arc::clone(&slot.spec))
            .collect();
        let pending_volume = self.demands.iter().fold(0u64, |acc, d| {
            acc.saturating_add(u64::from(d.remaining).saturating_mul(d.spec.extended_volume()))
        });
        let pending_weight = self.demands.iter().fold(0u64, |acc, d| {
            acc.saturating_add(u64::from(d.remaining) * u64::from(d.spec.weight()))
        });

        let spec = self
            .selector
            .select(&eligible, pending_volume, pending_weight)?;
        log::debug!(
            "Opening {} for {} (pending volume {}, weight {})",
            spec.name(),
            self.demands[index].spec.name(),
            pending_volume,
            pending_weight
        );
        Some(Container::new(spec, container_id))
    }

    fn report_dropped(
        &self,
        container_id: usize,
        removed: Vec<LoadedItem>,
        dropped: &mut [u32],
        on_event: &mut impl FnMut(&LoadEvent),
    ) {
        for (index, demand) in self.demands.iter().enumerate() {
            let count = removed
                .iter()
                .filter(|item| **item.spec() == *demand.spec)
                .count() as u32;
            if count == 0 {
                continue;
            }
            log::warn!(
                "Dropped {} x {} from container {} while ordering",
                count,
                demand.spec.name(),
                container_id
            );
            dropped[index] += count;
            on_event(&LoadEvent::ItemsDropped {
                container_id,
                name: demand.spec.name().to_string(),
                count,
            });
        }
    }
}

/// Loads item units with the default configuration.
pub fn load_items(items: Vec<(ItemSpec, u32)>, inventory: ContainerInventory) -> LoadingResult {
    load_items_with_config(items, inventory, PackingConfig::default())
}

pub fn load_items_with_config(
    items: Vec<(ItemSpec, u32)>,
    inventory: ContainerInventory,
    config: PackingConfig,
) -> LoadingResult {
    load_items_with_progress(items, inventory, config, |_| {})
}

/// Like `load_items_with_config`, reporting every step to `on_event`.
pub fn load_items_with_progress(
    items: Vec<(ItemSpec, u32)>,
    inventory: ContainerInventory,
    config: PackingConfig,
    on_event: impl FnMut(&LoadEvent),
) -> LoadingResult {
    Loader::new(items, inventory, config).run_with_progress(on_event)
}

/// Returns the trial with the largest loaded volume; the first one wins ties.
fn select_fullest(trials: Vec<Trial>) -> Option<Trial> {
    let mut best: Option<Trial> = None;
    for trial in trials {
        let volume = trial.container.loaded_volume();
        if volume == 0 {
            continue;
        }
        if best
            .as_ref()
            .is_none_or(|current| volume > current.container.loaded_volume())
        {
            best = Some(trial);
        }
    }
    best
}

/// Unloads a container and reloads its items in physical loading order.
///
/// Each pass walks the remembered anchors column by column and reloads every
/// item that fits again, but stops at the first loadable item in a new column
/// once something was loaded. Passes repeat until one loads nothing.
///
/// # Returns
/// Items that could not be reloaded, ordered by anchor
pub fn recompute_loading_order(container: &mut Container) -> Vec<LoadedItem> {
    let mut pending: HashMap<Point, LoadedItem> = container
        .unload_all()
        .into_iter()
        .map(|placed| (placed.anchor(), placed.into_item()))
        .collect();

    while !pending.is_empty() {
        let before = pending.len();
        let mut last_x: Option<u32> = None;

        for point in ScanOrder::ColumnFirst.scan(pending.keys().copied()) {
            let Some(item) = pending.get(&point) else {
                continue;
            };
            if !container.can_load(point, item.spec(), item.volume_spec()) {
                continue;
            }
            if last_x.is_some_and(|x| x != point.x) {
                break;
            }
            if let Some(item) = pending.remove(&point) {
                container.load_item(point, item);
                last_x = Some(point.x);
            }
        }

        if pending.len() == before {
            break;
        }
    }

    let mut dropped: Vec<(Point, LoadedItem)> = pending.into_iter().collect();
    dropped.sort_unstable_by_key(|(point, _)| point.column_key());
    dropped.into_iter().map(|(_, item)| item).collect()
}

fn report_committed(container: &Container, on_event: &mut impl FnMut(&LoadEvent)) {
    let spec = container.spec();
    on_event(&LoadEvent::ContainerOpened {
        container_id: container.id(),
        kind: spec.name().to_string(),
        dims: (spec.length(), spec.width(), spec.height()),
        lifting_capacity: spec.lifting_capacity(),
    });
    let mut loaded_weight = 0u64;
    for placed in container.placed_items() {
        loaded_weight += u64::from(placed.item().weight());
        on_event(&placed_event(container.id(), placed, loaded_weight));
    }
}

fn report_last_placed(container: &Container, on_event: &mut impl FnMut(&LoadEvent)) {
    if let Some(placed) = container.placed_items().last() {
        on_event(&placed_event(container.id(), placed, container.loaded_weight()));
    }
}

fn placed_event(container_id: usize, placed: &PlacedItem, loaded_weight: u64) -> LoadEvent {
    let item = placed.item();
    let volume = item.volume_spec();
    LoadEvent::ItemPlaced {
        container_id,
        item_id: item.id(),
        name: item.spec().name().to_string(),
        pos: placed.min_corner().as_tuple(),
        dims: (volume.length(), volume.width(), volume.height()),
        loaded_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{free_space_is_sound, placements_are_disjoint, placements_within_bounds};
    use crate::model::OrientationRules;

    fn unit(name: &str, dims: (u32, u32, u32)) -> ItemSpec {
        ItemSpec::builder(name, dims, 1).build().unwrap()
    }

    fn single(dims: (u32, u32, u32), capacity: u32, count: u32) -> ContainerInventory {
        ContainerInventory::Fixed(vec![(ContainerSpec::new("box", dims, capacity).unwrap(), count)])
    }

    fn anchors(container: &Container) -> Vec<(u32, u32, u32)> {
        container
            .placed_items()
            .map(|p| p.anchor().as_tuple())
            .collect()
    }

    fn assert_valid(result: &LoadingResult) {
        for container in &result.containers {
            assert!(placements_are_disjoint(container.placed_items()));
            assert!(placements_within_bounds(container));
            assert!(free_space_is_sound(container));
            assert!(container.loaded_weight() <= u64::from(container.spec().lifting_capacity()));
        }
    }

    fn lossy_request() -> Vec<(ItemSpec, u32)> {
        vec![(unit("a", (5, 2, 2)), 4), (unit("b", (2, 5, 2)), 7)]
    }

    #[test]
    fn small_and_large_units_share_one_container() {
        let result = load_items(
            vec![(unit("b", (2, 2, 2)), 4), (unit("r", (5, 5, 5)), 1)],
            single((40, 20, 20), 100, 1),
        );

        assert!(result.is_complete());
        assert_eq!(result.container_count(), 1);
        assert_eq!(
            anchors(&result.containers[0]),
            vec![(0, 0, 0), (0, 5, 0), (0, 7, 0), (0, 9, 0), (0, 11, 0)]
        );
        assert_valid(&result);
    }

    #[test]
    fn vertical_loading_stacks_before_moving_on() {
        let config = PackingConfig::builder()
            .loading_type(LoadingType::Vertical)
            .build();
        let result = load_items_with_config(
            vec![(unit("b", (2, 2, 2)), 4), (unit("r", (5, 5, 5)), 1)],
            single((40, 20, 20), 100, 1),
            config,
        );

        assert_eq!(
            anchors(&result.containers[0]),
            vec![(0, 0, 0), (0, 0, 5), (0, 0, 7), (0, 0, 9), (0, 0, 11)]
        );
        assert_valid(&result);
    }

    #[test]
    fn oversized_units_are_left_over() {
        let oversized = ItemSpec::builder("long", (11, 5, 5), 1)
            .orientation(OrientationRules::any())
            .build()
            .unwrap();
        let result = load_items(vec![(oversized.clone(), 2)], single((10, 10, 10), 100, 5));

        assert_eq!(result.container_count(), 0);
        assert_eq!(result.leftover_of(&oversized), 2);
    }

    #[test]
    fn stackable_units_are_stacked() {
        let result = load_items(vec![(unit("cube", (5, 5, 5)), 2)], single((5, 5, 10), 100, 1));

        let corners: Vec<_> = result.containers[0]
            .placed_items()
            .map(|p| p.min_corner())
            .collect();
        assert_eq!(corners, vec![Point::origin(), Point::new(0, 0, 5)]);
    }

    #[test]
    fn weight_limit_opens_further_containers() {
        let heavy = ItemSpec::builder("heavy", (2, 2, 2), 40).build().unwrap();
        let result = load_items(vec![(heavy, 5)], single((10, 10, 10), 100, 3));

        let counts: Vec<_> = result.containers.iter().map(Container::item_count).collect();
        assert_eq!(counts, vec![2, 2, 1]);
        assert!(result.is_complete());
        assert_eq!(result.total_loaded_weight(), 200);
        let expected_share = (2.0 + 2.0 + 1.0) * 8.0 / 1000.0 / 3.0;
        assert!((result.average_volume_share() - expected_share).abs() < 1e-9);
        assert_valid(&result);
    }

    #[test]
    fn exhausted_inventory_leaves_units_over() {
        let heavy = ItemSpec::builder("heavy", (2, 2, 2), 40).build().unwrap();
        let result = load_items(vec![(heavy.clone(), 5)], single((10, 10, 10), 100, 1));

        assert_eq!(result.container_count(), 1);
        assert_eq!(result.leftover_of(&heavy), 3);
    }

    #[test]
    fn fullest_trial_is_committed() {
        let inventory = ContainerInventory::Fixed(vec![
            (ContainerSpec::new("small", (4, 4, 4), 100).unwrap(), 1),
            (ContainerSpec::new("large", (8, 4, 4), 100).unwrap(), 1),
        ]);
        let result = load_items(vec![(unit("cube", (4, 4, 4)), 2)], inventory);

        assert_eq!(result.container_count(), 1);
        assert_eq!(result.containers[0].spec().name(), "large");
        assert_eq!(result.containers[0].item_count(), 2);
    }

    #[test]
    fn auto_inventory_never_runs_out() {
        let inventory = ContainerInventory::Auto(vec![ContainerSpec::new("auto", (4, 4, 4), 100).unwrap()]);
        let result = load_items(vec![(unit("cube", (4, 4, 4)), 3)], inventory);

        assert_eq!(result.container_count(), 3);
        assert!(result.is_complete());
    }

    #[test]
    fn requested_units_are_conserved() {
        let items = vec![
            (unit("flat", (6, 4, 1)), 9),
            (ItemSpec::builder("fragile", (3, 3, 3), 2).stackable(false).build().unwrap(), 6),
            (unit("cube", (4, 4, 4)), 7),
            (ItemSpec::builder("padded", (2, 2, 3), 1).extension(1).build().unwrap(), 5),
        ];
        let result = load_items_with_config(
            items.clone(),
            single((12, 8, 8), 30, 2),
            PackingConfig::builder().with_order(true).build(),
        );

        for (spec, requested) in &items {
            let placed = result.loaded_of(spec) as u32;
            assert_eq!(placed + result.leftover_of(spec), *requested, "{}", spec.name());
        }
        assert_valid(&result);
    }

    #[test]
    fn all_units_fit_without_ordering() {
        let result = load_items(lossy_request(), single((7, 7, 7), 100, 1));

        assert!(result.is_complete());
        assert_eq!(result.loaded_count(), 11);
        assert_valid(&result);
    }

    #[test]
    fn ordering_pass_drops_an_unreachable_unit() {
        let config = PackingConfig::builder().with_order(true).build();
        let mut dropped_events = Vec::new();
        let result = load_items_with_progress(
            lossy_request(),
            single((7, 7, 7), 100, 1),
            config,
            |event| {
                if let LoadEvent::ItemsDropped { name, count, .. } = event {
                    dropped_events.push((name.clone(), *count));
                }
            },
        );

        assert_eq!(result.loaded_count(), 10);
        assert_eq!(result.leftover_count(), 1);
        assert_eq!(result.leftovers[0].spec.name(), "b");
        assert_eq!(dropped_events, vec![("b".to_string(), 1)]);
        assert_eq!(
            anchors(&result.containers[0]),
            vec![
                (0, 0, 0),
                (0, 0, 2),
                (0, 2, 0),
                (0, 2, 2),
                (0, 4, 0),
                (0, 4, 2),
                (0, 0, 4),
                (2, 0, 4),
                (5, 0, 0),
                (5, 0, 2),
            ]
        );
        assert_valid(&result);
    }

    #[test]
    fn parallel_trials_match_sequential_trials() {
        let items = vec![(unit("flat", (6, 4, 1)), 12), (unit("cube", (3, 3, 3)), 10)];
        let inventory = || {
            ContainerInventory::Fixed(vec![
                (ContainerSpec::new("short", (10, 8, 6), 100).unwrap(), 2),
                (ContainerSpec::new("long", (16, 8, 6), 100).unwrap(), 1),
            ])
        };
        let sequential = load_items(items.clone(), inventory());
        let parallel = load_items_with_config(
            items,
            inventory(),
            PackingConfig::builder().parallel_trials(true).build(),
        );

        let layout = |result: &LoadingResult| -> Vec<(String, Vec<(u32, u32, u32)>)> {
            result
                .containers
                .iter()
                .map(|c| (c.spec().name().to_string(), anchors(c)))
                .collect()
        };
        assert_eq!(layout(&sequential), layout(&parallel));

        let ids: Vec<_> = parallel
            .containers
            .iter()
            .flat_map(|c| c.placed_items().map(|p| p.item().id()))
            .collect();
        let unique: std::collections::HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn saturated_pending_volume_still_opens_a_container() {
        let config = PackingConfig::builder()
            .packing_mode(PackingMode::ExistingFirst)
            .build();
        let wide = ItemSpec::builder("wide", (1, 1, 1), 1)
            .extension((u32::MAX - 1) / 2)
            .build()
            .unwrap();
        let result = load_items_with_config(
            vec![(unit("cube", (2, 2, 2)), 1), (wide.clone(), u32::MAX)],
            single((10, 10, 10), 100, 1),
            config,
        );

        assert_eq!(result.container_count(), 1);
        assert_eq!(result.leftover_of(&wide), u32::MAX);
        assert_valid(&result);
    }

    #[test]
    fn existing_first_fills_open_containers_before_opening_new_ones() {
        let config = PackingConfig::builder()
            .packing_mode(PackingMode::ExistingFirst)
            .build();
        let result = load_items_with_config(
            vec![(unit("cube", (4, 4, 4)), 3)],
            single((8, 4, 4), 100, 3),
            config,
        );

        let counts: Vec<_> = result.containers.iter().map(Container::item_count).collect();
        assert_eq!(counts, vec![2, 1]);
        assert!(result.is_complete());
    }

    #[test]
    fn existing_first_leaves_units_over_when_nothing_can_be_opened() {
        let config = PackingConfig::builder()
            .packing_mode(PackingMode::ExistingFirst)
            .build();
        let cube = unit("cube", (4, 4, 4));
        let result = Loader::new(vec![(cube.clone(), 3)], single((8, 4, 4), 100, 3), config)
            .with_selector(|_: &[Arc<ContainerSpec>], _: u64, _: u64| -> Option<Arc<ContainerSpec>> { None })
            .run();

        assert_eq!(result.container_count(), 0);
        assert_eq!(result.leftover_of(&cube), 3);
    }

    #[test]
    fn events_describe_the_run() {
        let mut events = Vec::new();
        load_items_with_progress(
            vec![(unit("cube", (4, 4, 4)), 3)],
            single((8, 4, 4), 100, 1),
            PackingConfig::default(),
            |event| events.push(event.clone()),
        );

        assert!(matches!(events[0], LoadEvent::ContainerOpened { container_id: 1, .. }));
        let placed = events
            .iter()
            .filter(|e| matches!(e, LoadEvent::ItemPlaced { .. }))
            .count();
        assert_eq!(placed, 2);
        assert!(events.iter().any(|e| matches!(e, LoadEvent::ItemsLeftOver { count: 1, .. })));
        assert!(matches!(
            events.last(),
            Some(LoadEvent::Finished { containers: 1, loaded: 2, leftover: 1 })
        ));
    }

    #[test]
    fn injected_id_factory_numbers_the_items() {
        let ids: Arc<dyn ItemIdFactory> = Arc::new(SequentialIdFactory::starting_at(100));
        let result = Loader::new(
            vec![(unit("cube", (2, 2, 2)), 3)],
            single((10, 10, 10), 100, 1),
            PackingConfig::default(),
        )
        .with_id_factory(ids)
        .run();

        let item_ids: Vec<_> = result.containers[0]
            .placed_items()
            .map(|p| p.item().id())
            .collect();
        assert_eq!(item_ids, vec![100, 101, 102]);
    }

    #[test]
    fn priority_orders_barrels_first() {
        let barrel = ItemSpec::builder("barrel", (3, 3, 4), 1)
            .kind(crate::model::BARREL_FORM)
            .diameter(3)
            .build()
            .unwrap();
        let result = load_items(
            vec![(unit("cube", (4, 4, 4)), 1), (barrel, 1)],
            single((10, 10, 10), 100, 1),
        );

        let first = result.containers[0].placed_items().next().unwrap();
        assert_eq!(first.item().spec().name(), "barrel");
        assert_eq!(first.anchor(), Point::origin());
    }
}
