#![forbid(unsafe_code)]

//! Marker and popup document construction.
//!
//! # Shape
//!
//! - A singleton cluster becomes one marker with a plain price label and a
//!   detail popup (title, price, optional distance).
//! - A multi-member cluster becomes one marker with the range label plus a
//!   member-count badge, and a listing popup with at most `popup_cap`
//!   entries. Hidden members are summarised by a single `"(+N more)"` line.
//!
//! # Invariants
//!
//! 1. Exactly one marker per input cluster, in input order.
//! 2. Every marker lists all of its cluster's entity ids, including those
//!    hidden from the popup.
//! 3. `entries.len() + hidden == members` for listing popups.
//! 4. Markers are independent: no marker references another, and nothing
//!    depends on pan or zoom state.

use serde::Serialize;
use staymap_core::{AnnotatedCluster, AnnotatedEntity, Coordinates, EntityId, format_distance};
use tracing::debug;

/// Maximum entries shown in a cluster popup before the overflow line.
pub const DEFAULT_POPUP_CAP: usize = 10;

/// One row inside a popup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupEntry {
    pub entity_id: EntityId,
    pub title: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

impl PopupEntry {
    fn from_annotated(member: &AnnotatedEntity) -> Self {
        Self {
            entity_id: member.entity.id.clone(),
            title: member.entity.title.clone(),
            price: member.display_string.clone(),
            distance: member.entity.distance.and_then(format_distance),
        }
    }
}

/// Popup content attached to a marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Popup {
    /// Single listing: title, price, optional distance.
    Detail { entry: PopupEntry },
    /// Several listings at one spot, truncated to the popup cap.
    Listing {
        entries: Vec<PopupEntry>,
        hidden: usize,
    },
}

impl Popup {
    /// Visible popup rows.
    #[must_use]
    pub fn entries(&self) -> &[PopupEntry] {
        match self {
            Self::Detail { entry } => std::slice::from_ref(entry),
            Self::Listing { entries, .. } => entries,
        }
    }

    /// The `"(+N more)"` line when members were cut off.
    #[must_use]
    pub fn overflow_line(&self) -> Option<String> {
        match self {
            Self::Listing { hidden, .. } if *hidden > 0 => Some(format!("(+{hidden} more)")),
            _ => None,
        }
    }
}

/// A map marker standing for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub position: Coordinates,
    pub label: String,
    /// Member count for multi-member clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<usize>,
    pub entity_ids: Vec<EntityId>,
    pub popup: Popup,
}

/// Full description of what the sandbox should draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderDocument {
    /// Code of the currency every label is expressed in.
    pub currency: String,
    pub markers: Vec<Marker>,
}

impl RenderDocument {
    #[must_use]
    pub fn empty(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            markers: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Index of the marker that carries `id`.
    #[must_use]
    pub fn marker_for(&self, id: &EntityId) -> Option<usize> {
        self.markers
            .iter()
            .position(|m| m.entity_ids.iter().any(|e| e == id))
    }

    /// Total number of entities drawn on the map.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.markers.iter().map(|m| m.entity_ids.len()).sum()
    }
}

/// A document stamped with its monotonic version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEnvelope {
    pub version: u64,
    pub document: RenderDocument,
}

/// Builds [`RenderDocument`]s from annotated clusters.
#[derive(Debug, Clone, Copy)]
pub struct DocumentBuilder {
    popup_cap: usize,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_POPUP_CAP)
    }
}

impl DocumentBuilder {
    /// Create a builder; a cap of zero is raised to one.
    #[must_use]
    pub fn new(popup_cap: usize) -> Self {
        Self {
            popup_cap: popup_cap.max(1),
        }
    }

    #[must_use]
    pub fn popup_cap(&self) -> usize {
        self.popup_cap
    }

    /// Build a fresh document. Never reuses anything from a previous build.
    #[must_use]
    pub fn build(&self, currency: &str, clusters: &[AnnotatedCluster]) -> RenderDocument {
        let markers: Vec<Marker> = clusters.iter().map(|c| self.marker(c)).collect();
        debug!(
            markers = markers.len(),
            currency, "built render document"
        );
        RenderDocument {
            currency: currency.to_owned(),
            markers,
        }
    }

    fn marker(&self, cluster: &AnnotatedCluster) -> Marker {
        let entity_ids = cluster
            .members
            .iter()
            .map(|m| m.entity.id.clone())
            .collect();

        if cluster.is_singleton() {
            let entry = PopupEntry::from_annotated(&cluster.members[0]);
            return Marker {
                position: cluster.anchor,
                label: cluster.members[0].display_string.clone(),
                badge: None,
                entity_ids,
                popup: Popup::Detail { entry },
            };
        }

        let entries: Vec<PopupEntry> = cluster
            .members
            .iter()
            .take(self.popup_cap)
            .map(PopupEntry::from_annotated)
            .collect();
        let hidden = cluster.members.len() - entries.len();

        Marker {
            position: cluster.anchor,
            label: cluster.label.clone(),
            badge: Some(cluster.members.len()),
            entity_ids,
            popup: Popup::Listing { entries, hidden },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staymap_core::{Currency, Entity, PriceFormat, annotate_cluster, cluster};

    fn annotated(entities: &[Entity]) -> Vec<AnnotatedCluster> {
        let format = PriceFormat::base(Currency::new("MKD", "MKD"));
        cluster(entities, 0.001)
            .iter()
            .map(|c| annotate_cluster(c, &format, |p| p))
            .collect()
    }

    fn stack(n: usize) -> Vec<Entity> {
        (0..n)
            .map(|i| {
                Entity::new(format!("e{i}"), format!("Stay {i}"), 1000.0 + i as f64).at(41.99, 21.43)
            })
            .collect()
    }

    #[test]
    fn singleton_gets_detail_popup() {
        let clusters = annotated(&[Entity::new("a", "Loft", 2500.0)
            .at(41.99, 21.43)
            .with_distance(0.35)]);
        let doc = DocumentBuilder::default().build("MKD", &clusters);
        assert_eq!(doc.markers.len(), 1);
        let marker = &doc.markers[0];
        assert_eq!(marker.label, "2500 MKD");
        assert_eq!(marker.badge, None);
        match &marker.popup {
            Popup::Detail { entry } => {
                assert_eq!(entry.title, "Loft");
                assert_eq!(entry.price, "2500 MKD");
                assert_eq!(entry.distance.as_deref(), Some("350 m"));
            }
            other => panic!("expected detail popup, got {other:?}"),
        }
        assert_eq!(marker.popup.overflow_line(), None);
    }

    #[test]
    fn multi_member_cluster_gets_badge_and_range_label() {
        let mut entities = stack(3);
        entities[0].base_price = 100.0;
        entities[1].base_price = 100.0;
        entities[2].base_price = 300.0;
        let doc = DocumentBuilder::default().build("MKD", &annotated(&entities));
        let marker = &doc.markers[0];
        assert_eq!(marker.badge, Some(3));
        assert_eq!(marker.label, "from 100 MKD");
        assert_eq!(marker.popup.entries().len(), 3);
    }

    #[test]
    fn eleven_members_show_ten_entries_and_one_overflow_line() {
        let doc = DocumentBuilder::default().build("MKD", &annotated(&stack(11)));
        let popup = &doc.markers[0].popup;
        assert_eq!(popup.entries().len(), 10);
        assert_eq!(popup.overflow_line().as_deref(), Some("(+1 more)"));
        assert!(popup.overflow_line().is_some_and(|l| l.contains("+1")));
        assert_eq!(doc.markers[0].entity_ids.len(), 11);
    }

    #[test]
    fn exactly_cap_members_have_no_overflow() {
        let doc = DocumentBuilder::default().build("MKD", &annotated(&stack(10)));
        assert_eq!(doc.markers[0].popup.entries().len(), 10);
        assert_eq!(doc.markers[0].popup.overflow_line(), None);
    }

    #[test]
    fn zero_cap_is_raised_to_one() {
        let builder = DocumentBuilder::new(0);
        assert_eq!(builder.popup_cap(), 1);
        let doc = builder.build("MKD", &annotated(&stack(3)));
        assert_eq!(doc.markers[0].popup.overflow_line().as_deref(), Some("(+2 more)"));
    }

    #[test]
    fn marker_lookup_covers_hidden_members() {
        let doc = DocumentBuilder::default().build("MKD", &annotated(&stack(12)));
        assert_eq!(doc.marker_for(&EntityId::new("e11")), Some(0));
        assert_eq!(doc.marker_for(&EntityId::new("missing")), None);
        assert_eq!(doc.entity_count(), 12);
    }
}
