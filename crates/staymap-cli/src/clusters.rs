#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use staymap::{DocumentBuilder, Popup, RenderDocument};

use crate::error::{CliError, Result};
use crate::input::{load_config, read_entities, resolve_currency};

#[derive(Debug, Clone, Args)]
pub struct ClustersArgs {
    /// Entity list as a JSON array; `-` reads stdin.
    pub entities: PathBuf,

    /// Clustering tolerance in degrees. Overrides the config.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Display currency code.
    #[arg(long)]
    pub currency: Option<String>,

    /// Search config (TOML, or JSON by extension).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the full render document as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Counts printed after the marker table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub entities: usize,
    pub mapped: usize,
    pub markers: usize,
    pub clustered_markers: usize,
}

pub fn run_clusters(args: ClustersArgs) -> Result<()> {
    if let Some(tolerance) = args.tolerance {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(CliError::invalid(format!(
                "tolerance must be > 0, got {tolerance}"
            )));
        }
    }
    let config = load_config(args.config.as_deref())?;
    let currency = resolve_currency(&config, args.currency.as_deref())?;
    let tolerance = args.tolerance.unwrap_or(config.tolerance);
    let entities = read_entities(&args.entities)?;

    let rates = config.rate_table();
    let document = staymap::runtime::build_document(
        &entities,
        &rates,
        &currency,
        tolerance,
        &DocumentBuilder::new(config.popup_cap),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print!("{}", format_table(&document));
        let summary = summarize(entities.len(), &document);
        println!(
            "{} entities, {} on the map, {} markers ({} clustered)",
            summary.entities, summary.mapped, summary.markers, summary.clustered_markers
        );
    }
    Ok(())
}

#[must_use]
pub fn summarize(entities: usize, document: &RenderDocument) -> ClusterSummary {
    ClusterSummary {
        entities,
        mapped: document.entity_count(),
        markers: document.markers.len(),
        clustered_markers: document.markers.iter().filter(|m| m.badge.is_some()).count(),
    }
}

/// One line per marker: index, position, label, and member ids.
#[must_use]
pub fn format_table(document: &RenderDocument) -> String {
    let mut out = String::new();
    for (index, marker) in document.markers.iter().enumerate() {
        let ids: Vec<&str> = marker.entity_ids.iter().map(|id| id.as_str()).collect();
        let badge = marker.badge.map(|n| format!(" [{n}]")).unwrap_or_default();
        out.push_str(&format!(
            "#{index:<3} {:>9.5},{:>9.5}  {}{badge}  {}\n",
            marker.position.lat,
            marker.position.lng,
            marker.label,
            ids.join(" ")
        ));
        if let Some(line) = marker.popup.overflow_line() {
            out.push_str(&format!("     {line}\n"));
        }
        if let Popup::Listing { entries, .. } = &marker.popup {
            for entry in entries {
                out.push_str(&format!("     - {} {}\n", entry.title, entry.price));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use staymap::{Currency, Entity, PriceFormat, annotate_cluster, cluster};

    fn document(entities: &[Entity]) -> RenderDocument {
        let format = PriceFormat::base(Currency::new("MKD", "MKD"));
        let annotated: Vec<_> = cluster(entities, 0.0005)
            .iter()
            .map(|c| annotate_cluster(c, &format, |p| p))
            .collect();
        DocumentBuilder::new(2).build("MKD", &annotated)
    }

    #[test]
    fn summary_counts_unmapped_entities_out() {
        let entities = vec![
            Entity::new("a", "A", 100.0).at(41.99, 21.43),
            Entity::new("b", "B", 200.0).at(41.99, 21.43),
            Entity::new("c", "C", 300.0),
        ];
        let summary = summarize(entities.len(), &document(&entities));
        assert_eq!(
            summary,
            ClusterSummary {
                entities: 3,
                mapped: 2,
                markers: 1,
                clustered_markers: 1,
            }
        );
    }

    #[test]
    fn table_lists_labels_and_overflow() {
        let entities = vec![
            Entity::new("a", "A", 100.0).at(41.99, 21.43),
            Entity::new("b", "B", 200.0).at(41.99, 21.43),
            Entity::new("c", "C", 300.0).at(41.99, 21.43),
        ];
        let table = format_table(&document(&entities));
        assert!(table.contains("from 100 MKD [3]"));
        assert!(table.contains("(+1 more)"));
        assert!(table.contains("- B 200 MKD"));
        assert!(!table.contains("- C"));
    }
}
