//! Orders in which anchor points are offered to the loader.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::container::Container;
use crate::model::{ItemSpec, VolumeSpec};
use crate::types::Point;

/// Total order over anchor points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Exhausts a height layer before moving up: `(z, x, y)`.
    #[default]
    LayerFirst,
    /// Fills from the far wall towards the door column by column: `(x, y, z)`.
    ColumnFirst,
}

impl ScanOrder {
    #[inline]
    pub fn key(self, point: &Point) -> (u32, u32, u32) {
        match self {
            ScanOrder::LayerFirst => point.layer_key(),
            ScanOrder::ColumnFirst => point.column_key(),
        }
    }

    /// Sorts a snapshot of points into this order.
    pub fn scan<I>(self, points: I) -> AnchorScan
    where
        I: IntoIterator<Item = Point>,
    {
        let mut points: Vec<Point> = points.into_iter().collect();
        points.sort_unstable_by_key(|p| self.key(p));
        AnchorScan {
            points: points.into_iter(),
        }
    }
}

/// Lazy sequence over a sorted snapshot of anchor points.
///
/// The snapshot is taken when the scan is created, so the container can be
/// mutated while a scan is alive. Cloning restarts from the clone's position.
#[derive(Clone, Debug)]
pub struct AnchorScan {
    points: std::vec::IntoIter<Point>,
}

impl Iterator for AnchorScan {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        self.points.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.points.size_hint()
    }
}

impl ExactSizeIterator for AnchorScan {}

impl Container {
    /// Scans the current anchors of this container.
    pub fn scan(&self, order: ScanOrder) -> AnchorScan {
        order.scan(self.anchors())
    }

    /// First anchor in `order` that accepts the item in the given orientation.
    pub fn first_fit(&self, order: ScanOrder, spec: &ItemSpec, volume: &VolumeSpec) -> Option<Point> {
        self.scan(order)
            .find(|point| self.can_load(*point, spec, volume))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdFactory;
    use crate::model::ContainerSpec;
    use std::sync::Arc;
    use test_case::test_case;

    fn container_with_one_item() -> Container {
        let ids = SequentialIdFactory::new();
        let spec = Arc::new(ItemSpec::builder("crate", (5, 5, 5), 1).build().unwrap());
        let mut container =
            Container::new(Arc::new(ContainerSpec::new("cube", (10, 10, 10), 100).unwrap()), 0);
        container.load(Point::origin(), &spec, *spec.volume_spec(), &ids);
        container
    }

    #[test_case(ScanOrder::LayerFirst, vec![(0, 5, 0), (5, 0, 0), (0, 0, 5)]; "layer first")]
    #[test_case(ScanOrder::ColumnFirst, vec![(0, 0, 5), (0, 5, 0), (5, 0, 0)]; "column first")]
    fn scan_visits_anchors_in_order(order: ScanOrder, expected: Vec<(u32, u32, u32)>) {
        let container = container_with_one_item();
        let points: Vec<_> = container.scan(order).map(|p| p.as_tuple()).collect();
        assert_eq!(points, expected);
    }

    #[test_case(ScanOrder::LayerFirst; "layer first")]
    #[test_case(ScanOrder::ColumnFirst; "column first")]
    fn rescanning_unchanged_state_is_idempotent(order: ScanOrder) {
        let container = container_with_one_item();
        let first: Vec<_> = container.scan(order).collect();
        let second: Vec<_> = container.scan(order).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn cloned_scan_restarts_from_the_same_position() {
        let container = container_with_one_item();
        let mut scan = container.scan(ScanOrder::LayerFirst);
        scan.next();
        let rest: Vec<_> = scan.clone().collect();
        assert_eq!(scan.len(), 2);
        assert_eq!(rest, scan.collect::<Vec<_>>());
    }

    #[test]
    fn first_fit_skips_anchors_without_room() {
        let container = container_with_one_item();
        let tall = ItemSpec::builder("tall", (5, 5, 10), 1).build().unwrap();
        // (0,0,5) only has room for half the height.
        assert_eq!(
            container.first_fit(ScanOrder::ColumnFirst, &tall, tall.volume_spec()),
            Some(Point::new(0, 5, 0))
        );
    }
}
