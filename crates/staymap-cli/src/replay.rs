#![forbid(unsafe_code)]

//! Scripted sessions against the headless sandbox.
//!
//! A script is a JSON array of steps:
//!
//! ```json
//! [
//!   {"op": "tap", "marker": 1, "entry": 3},
//!   {"op": "drag", "dy": 120, "vy": 0.2},
//!   {"op": "currency", "code": "EUR"},
//!   {"op": "details"}
//! ]
//! ```
//!
//! Each step is applied, the peer is flushed, and the coordinator pumped, so
//! the reported state reflects every message the step caused.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use staymap::{
    BasePriceSource, Entity, EntityId, HeadlessSandbox, PeerHandle, RestingTarget, SearchConfig,
    SearchResultsCoordinator,
};
use tracing::{debug, info};

use crate::error::{CliError, Result};
use crate::input::{load_config, read_entities, read_json};

/// How long to wait for the peer to catch up after a step.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Entity list as a JSON array.
    pub entities: PathBuf,

    /// Replay script as a JSON array of steps.
    pub script: PathBuf,

    /// Search config (TOML, or JSON by extension).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the step reports as JSON.
    #[arg(long)]
    pub json: bool,
}

/// One scripted user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    /// Tap a marker, or a row inside its popup when `entry` is set.
    Tap {
        marker: usize,
        #[serde(default)]
        entry: Option<usize>,
    },
    /// Drag the panel by `dy` px and release at `vy` px/ms.
    Drag {
        dy: f64,
        #[serde(default)]
        vy: f64,
    },
    Currency { code: String },
    Tolerance { value: f64 },
    Clear,
    Close,
    Details,
    /// Wait until every live price has resolved.
    Prices,
    /// Push a different entity list.
    Entities { entities: Vec<Entity> },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Tap { .. } => "tap",
            Self::Drag { .. } => "drag",
            Self::Currency { .. } => "currency",
            Self::Tolerance { .. } => "tolerance",
            Self::Clear => "clear",
            Self::Close => "close",
            Self::Details => "details",
            Self::Prices => "prices",
            Self::Entities { .. } => "entities",
        }
    }
}

/// State observed after a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<EntityId>,
    pub panel: RestingTarget,
    pub currency: String,
    pub document_version: u64,
    pub markers: usize,
    /// Ids passed to the details callback during this step.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub opened: Vec<EntityId>,
}

pub fn run_replay(args: ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let entities = read_entities(&args.entities)?;
    let steps: Vec<Step> = read_json(&args.script)?;
    let reports = replay(config, entities, &steps)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!(
                "{:>3} {:<10} selection={:<12} panel={:<9} currency={} doc=v{} markers={}{}",
                report.step,
                report.op,
                report.selection.as_ref().map_or("-", EntityId::as_str),
                report.panel.as_str(),
                report.currency,
                report.document_version,
                report.markers,
                if report.opened.is_empty() {
                    String::new()
                } else {
                    format!(" opened={}", join_ids(&report.opened))
                }
            );
        }
    }
    Ok(())
}

fn join_ids(ids: &[EntityId]) -> String {
    ids.iter().map(EntityId::as_str).collect::<Vec<_>>().join(",")
}

/// Mount a coordinator on a headless peer, push `entities`, and run `steps`.
pub fn replay(
    config: SearchConfig,
    entities: Vec<Entity>,
    steps: &[Step],
) -> Result<Vec<StepReport>> {
    let rates = Arc::new(config.rate_table());
    let mut peer: Option<PeerHandle> = None;
    let mut coordinator =
        SearchResultsCoordinator::mount(config, rates, Arc::new(BasePriceSource), |outbox| {
            let (sandbox, handle) = HeadlessSandbox::spawn(outbox)?;
            peer = Some(handle);
            Ok(sandbox)
        });
    let Some(peer) = peer else {
        return Err(CliError::Replay {
            step: 0,
            message: "headless sandbox did not start".into(),
        });
    };

    let opened = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&opened);
    coordinator.on_entity_selected(move |entity: &Entity| {
        sink.borrow_mut().push(entity.id.clone());
    });

    coordinator.set_entities(entities);
    info!(version = coordinator.document_version(), steps = steps.len(), "replay started");

    let mut reports = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let number = index + 1;
        debug!(step = number, op = step.name(), "applying step");
        apply(&mut coordinator, &peer, number, step)?;
        if !peer.flush(FLUSH_TIMEOUT) {
            return Err(CliError::Replay {
                step: number,
                message: "peer did not answer".into(),
            });
        }
        coordinator.pump();
        coordinator.settle_panel();

        reports.push(StepReport {
            step: number,
            op: step.name(),
            selection: coordinator.selection(),
            panel: coordinator.panel_state().resting_target,
            currency: coordinator.currency(),
            document_version: coordinator.document_version(),
            markers: coordinator.document().map_or(0, |d| d.markers.len()),
            opened: opened.take(),
        });
    }

    coordinator.teardown();
    Ok(reports)
}

fn apply(
    coordinator: &mut SearchResultsCoordinator<HeadlessSandbox>,
    peer: &PeerHandle,
    number: usize,
    step: &Step,
) -> Result<()> {
    let fail = |message: String| CliError::Replay {
        step: number,
        message,
    };
    match step {
        Step::Tap { marker, entry } => {
            // Taps land on whatever the peer has loaded, so it must be current.
            if !peer.flush(FLUSH_TIMEOUT) {
                return Err(fail("peer did not answer".into()));
            }
            let sent = match entry {
                Some(entry) => peer.tap_entry(*marker, *entry),
                None => peer.tap_marker(*marker),
            };
            if !sent {
                return Err(fail("sandbox peer is gone".into()));
            }
        }
        Step::Drag { dy, vy } => {
            coordinator.gesture_start();
            coordinator.gesture_move(*dy);
            coordinator.gesture_end(*dy, *vy);
        }
        Step::Currency { code } => coordinator.set_currency(code.clone()),
        Step::Tolerance { value } => {
            if !value.is_finite() || *value <= 0.0 {
                return Err(fail(format!("tolerance must be > 0, got {value}")));
            }
            coordinator.set_tolerance(*value);
        }
        Step::Clear => coordinator.clear_selection(),
        Step::Close => coordinator.close_panel(),
        Step::Details => {
            if !coordinator.view_details() {
                debug!(step = number, "details requested with nothing selected");
            }
        }
        Step::Prices => {
            if !coordinator.pump_until_prices_settle(FLUSH_TIMEOUT) {
                return Err(fail("prices did not settle".into()));
            }
        }
        Step::Entities { entities } => coordinator.set_entities(entities.clone()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listings() -> Vec<Entity> {
        vec![
            Entity::new("solo", "Solo loft", 1800.0).at(41.9965, 21.4314),
            Entity::new("t1", "Tower one", 2000.0).at(42.0050, 21.4090),
            Entity::new("t2", "Tower two", 2100.0).at(42.0050, 21.4090),
            Entity::new("far", "No coordinates", 700.0),
        ]
    }

    fn steps(json: &str) -> Vec<Step> {
        serde_json::from_str(json).expect("script")
    }

    #[test]
    fn script_steps_decode_from_camel_case_ops() {
        let parsed = steps(
            r#"[{"op":"tap","marker":1,"entry":0},{"op":"drag","dy":-60},{"op":"clear"}]"#,
        );
        assert_eq!(
            parsed,
            vec![
                Step::Tap {
                    marker: 1,
                    entry: Some(0)
                },
                Step::Drag { dy: -60.0, vy: 0.0 },
                Step::Clear,
            ]
        );
    }

    #[test]
    fn tap_then_drag_down_collapses() {
        let reports = replay(
            SearchConfig::default(),
            listings(),
            &steps(r#"[{"op":"tap","marker":1,"entry":1},{"op":"drag","dy":200,"vy":0.1}]"#),
        )
        .expect("replay");

        assert_eq!(reports[0].selection, Some(EntityId::new("t2")));
        assert_eq!(reports[0].panel, RestingTarget::Expanded);
        assert_eq!(reports[1].panel, RestingTarget::Collapsed);
        assert_eq!(reports[1].selection, Some(EntityId::new("t2")));
    }

    #[test]
    fn currency_change_regenerates_and_details_fire() {
        let reports = replay(
            SearchConfig::default(),
            listings(),
            &steps(r#"[{"op":"tap","marker":0},{"op":"currency","code":"EUR"},{"op":"details"}]"#),
        )
        .expect("replay");

        assert_eq!(reports[1].currency, "EUR");
        assert!(reports[1].document_version > reports[0].document_version);
        assert_eq!(reports[1].markers, 2);
        assert_eq!(reports[2].opened, vec![EntityId::new("solo")]);
    }

    #[test]
    fn bad_tolerance_names_the_step() {
        let err = replay(
            SearchConfig::default(),
            listings(),
            &steps(r#"[{"op":"clear"},{"op":"tolerance","value":0}]"#),
        )
        .expect_err("bad tolerance");
        match err {
            CliError::Replay { step, .. } => assert_eq!(step, 2),
            other => panic!("unexpected error {other}"),
        }
    }
}
