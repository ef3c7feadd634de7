//! Choosing which container type to open next.

use std::sync::Arc;

use crate::model::ContainerSpec;
use crate::types::Dimensional;

/// Picks the next container type for the units that are still pending.
pub trait ContainerSelector: Send + Sync {
    /// # Parameters
    /// * `eligible` - Container types that may still be opened
    /// * `pending_volume` - Extended volume of all pending units
    /// * `pending_weight` - Weight of all pending units
    fn select(
        &self,
        eligible: &[Arc<ContainerSpec>],
        pending_volume: u64,
        pending_weight: u64,
    ) -> Option<Arc<ContainerSpec>>;
}

impl<F> ContainerSelector for F
where
    F: Fn(&[Arc<ContainerSpec>], u64, u64) -> Option<Arc<ContainerSpec>> + Send + Sync,
{
    fn select(
        &self,
        eligible: &[Arc<ContainerSpec>],
        pending_volume: u64,
        pending_weight: u64,
    ) -> Option<Arc<ContainerSpec>> {
        self(eligible, pending_volume, pending_weight)
    }
}

/// Prefers the smallest container that takes everything still pending.
///
/// When no eligible type holds the whole remainder, the largest one is opened
/// so that as much as possible goes into it.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmallestSufficientSelector;

impl ContainerSelector for SmallestSufficientSelector {
    fn select(
        &self,
        eligible: &[Arc<ContainerSpec>],
        pending_volume: u64,
        pending_weight: u64,
    ) -> Option<Arc<ContainerSpec>> {
        let mut smallest_sufficient: Option<&Arc<ContainerSpec>> = None;
        let mut largest: Option<&Arc<ContainerSpec>> = None;

        for spec in eligible {
            let sufficient = spec.volume() >= pending_volume
                && u64::from(spec.lifting_capacity()) >= pending_weight;
            if sufficient && smallest_sufficient.is_none_or(|best| spec.volume() < best.volume()) {
                smallest_sufficient = Some(spec);
            }
            if largest.is_none_or(|best| spec.volume() > best.volume()) {
                largest = Some(spec);
            }
        }

        smallest_sufficient.or(largest).cloned()
    }
}
