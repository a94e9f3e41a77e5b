#![forbid(unsafe_code)]

//! First-match coordinate clustering.
//!
//! [`cluster`] groups entities whose coordinates lie within a per-axis
//! tolerance of an existing cluster's anchor.
//!
//! # Algorithm
//!
//! Entities are visited in input order. Each one joins the first existing
//! cluster whose anchor satisfies `|Δlat| < tolerance && |Δlng| < tolerance`;
//! otherwise it starts a new cluster anchored at its own exact coordinates.
//! Anchors never move when later members join (no centroid update).
//!
//! # Invariants
//!
//! 1. Every entity with valid coordinates belongs to exactly one cluster.
//! 2. Entities without valid coordinates belong to none.
//! 3. Every cluster is non-empty and its anchor equals the position of its
//!    first member.
//! 4. For a fixed input order and tolerance the partition is deterministic.
//!    A different input order may produce different membership at
//!    tolerance boundaries.
//!
//! # Complexity
//!
//! O(n·k) where k is the number of clusters formed so far. Sized for result
//! sets in the hundreds, not for geographic-scale point clouds.

use serde::Serialize;
use tracing::debug;

use crate::entity::Entity;
use crate::geo::Coordinates;

/// A group of entities rendered as a single marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub anchor: Coordinates,
    pub members: Vec<Entity>,
}

impl Cluster {
    fn seed(anchor: Coordinates, first: Entity) -> Self {
        Self {
            anchor,
            members: vec![first],
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false` for clusters produced by [`cluster`].
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Partition the mappable subset of `entities` into clusters.
///
/// A tolerance that is not a positive finite number merges nothing: every
/// mappable entity becomes its own cluster.
#[must_use]
pub fn cluster(entities: &[Entity], tolerance: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut skipped = 0usize;

    for entity in entities {
        let Some(position) = entity.map_position() else {
            skipped += 1;
            continue;
        };

        match clusters
            .iter_mut()
            .find(|c| c.anchor.within(&position, tolerance))
        {
            Some(existing) => existing.members.push(entity.clone()),
            None => clusters.push(Cluster::seed(position, entity.clone())),
        }
    }

    if skipped > 0 {
        debug!(
            skipped,
            total = entities.len(),
            "entities without valid coordinates excluded from clustering"
        );
    }

    clusters
}
