#![forbid(unsafe_code)]

//! Panel geometry and snap thresholds.

use serde::{Deserialize, Serialize};

/// Tunables for [`PanelController`](crate::PanelController).
///
/// Positions are pixels from the top edge, so the expanded position is the
/// smaller of the two. Velocities are pixels per millisecond, as reported by
/// the platform gesture recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub expanded_position: f64,
    pub collapsed_position: f64,
    /// Drag distance that decides the snap on its own.
    pub distance_threshold: f64,
    /// Release velocity that decides the snap on its own.
    pub velocity_threshold: f64,
    pub spring_stiffness: f64,
    pub spring_damping: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            expanded_position: 80.0,
            collapsed_position: 520.0,
            distance_threshold: 50.0,
            velocity_threshold: 0.5,
            spring_stiffness: 170.0,
            spring_damping: 26.0,
        }
    }
}

impl PanelConfig {
    /// Lower and upper position bound, whichever way round they were given.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        let (a, b) = (self.expanded_position, self.collapsed_position);
        (a.min(b), a.max(b))
    }

    /// Human-readable problems; empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, value) in [
            ("expanded_position", self.expanded_position),
            ("collapsed_position", self.collapsed_position),
            ("distance_threshold", self.distance_threshold),
            ("velocity_threshold", self.velocity_threshold),
            ("spring_stiffness", self.spring_stiffness),
            ("spring_damping", self.spring_damping),
        ] {
            if !value.is_finite() {
                problems.push(format!("panel.{name} must be finite"));
            }
        }
        if self.expanded_position >= self.collapsed_position {
            problems.push(format!(
                "panel.expanded_position ({}) must be above collapsed_position ({})",
                self.expanded_position, self.collapsed_position
            ));
        }
        if self.distance_threshold < 0.0 {
            problems.push("panel.distance_threshold must not be negative".to_owned());
        }
        if self.velocity_threshold < 0.0 {
            problems.push("panel.velocity_threshold must not be negative".to_owned());
        }
        if self.spring_stiffness <= 0.0 {
            problems.push("panel.spring_stiffness must be positive".to_owned());
        }
        if self.spring_damping < 0.0 {
            problems.push("panel.spring_damping must not be negative".to_owned());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PanelConfig::default().validate().is_empty());
    }

    #[test]
    fn inverted_positions_are_reported() {
        let cfg = PanelConfig {
            expanded_position: 600.0,
            ..PanelConfig::default()
        };
        let problems = cfg.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("expanded_position"));
        assert_eq!(cfg.bounds(), (520.0, 600.0));
    }

    #[test]
    fn non_finite_values_are_reported() {
        let cfg = PanelConfig {
            velocity_threshold: f64::NAN,
            ..PanelConfig::default()
        };
        assert!(cfg.validate().iter().any(|p| p.contains("velocity_threshold")));
    }
}
