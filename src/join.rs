//! Point-in-polygon and key joins between incidents and geographic units.

use std::collections::BTreeMap;

use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};

/// Bounding box of one indexed area, pointing back at its slot.
#[derive(Debug, Clone)]
struct Extent {
    slot: usize,
    bounds: AABB<[f64; 2]>,
}

impl RTreeObject for Extent {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

/// Areas behind an R-tree of their bounding boxes.
///
/// A point matches an area it lies in or on the boundary of. When areas
/// overlap, the one inserted first wins, so lookups never depend on the
/// tree's traversal order.
#[derive(Debug)]
pub struct SpatialIndex {
    keys: Vec<String>,
    areas: Vec<MultiPolygon<f64>>,
    tree: RTree<Extent>,
}

impl SpatialIndex {
    pub fn new<I>(areas: I) -> Self
    where
        I: IntoIterator<Item = (String, MultiPolygon<f64>)>,
    {
        let (keys, areas): (Vec<_>, Vec<_>) = areas.into_iter().unzip();
        let envelopes = areas
            .iter()
            .enumerate()
            .filter_map(|(slot, area)| {
                area.bounding_rect().map(|rect| Extent {
                    slot,
                    bounds: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        Self {
            keys,
            areas,
            tree: RTree::bulk_load(envelopes),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key of the area containing `point`, if any.
    pub fn locate(&self, point: &Point<f64>) -> Option<&str> {
        let probe = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&probe)
            .map(|candidate| candidate.slot)
            .filter(|&slot| self.areas[slot].intersects(point))
            .min()
            .map(|slot| self.keys[slot].as_str())
    }
}

/// Tags each record with the area containing its location.
///
/// Records without a location, or whose location falls outside every area,
/// are left out.
pub fn join<T, I, F>(records: I, index: &SpatialIndex, location: F) -> Vec<(T, String)>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> Option<Point<f64>>,
{
    records
        .into_iter()
        .filter_map(|record| {
            let key = index.locate(&location(&record)?)?.to_owned();
            Some((record, key))
        })
        .collect()
}

/// Inner join of records against a keyed table.
pub fn join_on<T, K, V, I, F>(records: I, table: &BTreeMap<K, V>, key: F) -> Vec<(T, V)>
where
    K: Ord,
    V: Clone,
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> Option<K>,
{
    records
        .into_iter()
        .filter_map(|record| {
            let value = table.get(&key(&record)?)?.clone();
            Some((record, value))
        })
        .collect()
}
