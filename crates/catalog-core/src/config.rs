//! Engine configuration.
//!
//! Everything here has a default, so the hosting page may pass a partial JS
//! object (or nothing at all). Rates and thresholds live in [`Tuning`]; they
//! are behaviourally significant but not contracts.

use crate::constants::*;
use glam::Vec3;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Named camera destination for a non-product "section" view.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionConfig {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// When set, the camera target is lowered so the grid top lands at this
    /// fraction of the viewport height, pushing the grid off-screen behind a
    /// separate page overlay.
    pub push_grid_to_screen_frac: Option<f32>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.12,
            z: 2.8,
            push_grid_to_screen_frac: None,
        }
    }
}

impl SectionConfig {
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            finite_or(self.x, DEFAULT_CAM_POS.x),
            finite_or(self.y, DEFAULT_CAM_POS.y),
            finite_or(self.z, DEFAULT_CAM_POS.z),
        )
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Tuning {
    pub auto_spin_speed: f32,
    pub drag_spin_scale: f32,
    pub drag_min_dt: f32,
    pub spin_damping_rate: f32,
    pub auto_spin_resume_delay: f32,
    pub auto_spin_blend_rate: f32,
    pub auto_spin_threshold: f32,
    pub spin_velocity_limit: f32,
    pub camera_y_rate: f32,
    pub camera_3d_rate: f32,
    pub entry_move_rate: f32,
    pub entry_turn_rate: f32,
    pub grid_slide_rate: f32,
    pub context_reload_min_interval_sec: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            auto_spin_speed: AUTO_SPIN_SPEED,
            drag_spin_scale: DRAG_SPIN_SCALE,
            drag_min_dt: DRAG_MIN_DT,
            spin_damping_rate: SPIN_DAMPING_RATE,
            auto_spin_resume_delay: AUTO_SPIN_RESUME_DELAY,
            auto_spin_blend_rate: AUTO_SPIN_BLEND_RATE,
            auto_spin_threshold: AUTO_SPIN_THRESHOLD,
            spin_velocity_limit: SPIN_VELOCITY_LIMIT,
            camera_y_rate: CAMERA_Y_RATE,
            camera_3d_rate: CAMERA_3D_RATE,
            entry_move_rate: ENTRY_MOVE_RATE,
            entry_turn_rate: ENTRY_TURN_RATE,
            grid_slide_rate: GRID_SLIDE_RATE,
            context_reload_min_interval_sec: CONTEXT_RELOAD_MIN_INTERVAL_SEC,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub background_url: String,
    pub environment_url: Option<String>,
    pub selection_anchor_id: String,
    pub bartop_extra: f32,
    pub sections: BTreeMap<String, SectionConfig>,
    pub tuning: Tuning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut sections = BTreeMap::new();
        sections.insert(
            "about".to_string(),
            SectionConfig {
                x: 0.0,
                y: 0.82,
                z: 2.8,
                push_grid_to_screen_frac: None,
            },
        );
        sections.insert(
            "legal".to_string(),
            SectionConfig {
                x: 0.0,
                y: 0.82,
                z: 2.8,
                push_grid_to_screen_frac: Some(LEGAL_GRID_SCREEN_FRAC),
            },
        );
        sections.insert("default".to_string(), SectionConfig::default());
        Self {
            background_url: "/SHOP.glb".to_string(),
            environment_url: Some("/env.png".to_string()),
            selection_anchor_id: "km-select-target".to_string(),
            bartop_extra: BARTOP_EXTRA,
            sections,
            tuning: Tuning::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Camera target for a named section, falling back to `default`, then to
    /// the default camera position.
    pub fn section(&self, name: &str) -> SectionConfig {
        self.sections
            .get(name)
            .or_else(|| self.sections.get("default"))
            .cloned()
            .unwrap_or(SectionConfig {
                x: DEFAULT_CAM_POS.x,
                y: DEFAULT_CAM_POS.y,
                z: DEFAULT_CAM_POS.z,
                push_grid_to_screen_frac: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(
            r#"{"backgroundUrl":"/bg.glb","bartopExtra":0.5,"selectionAnchorId":"slot","tuning":{"autoSpinSpeed":2.0}}"#,
        )
        .unwrap();
        assert_eq!(cfg.background_url, "/bg.glb");
        assert_eq!(cfg.bartop_extra, 0.5);
        assert_eq!(cfg.selection_anchor_id, "slot");
        assert_eq!(cfg.tuning.auto_spin_speed, 2.0);
        assert_eq!(cfg.tuning.spin_damping_rate, SPIN_DAMPING_RATE);
        assert!(cfg.sections.contains_key("legal"));
    }

    #[test]
    fn section_keys_are_camel_case() {
        let cfg = EngineConfig::from_json(
            r#"{"sections":{"legal":{"x":0.0,"y":1.0,"z":2.0,"pushGridToScreenFrac":0.9}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.section("legal").push_grid_to_screen_frac, Some(0.9));
    }

    #[test]
    fn unknown_section_falls_back_to_default() {
        let cfg = EngineConfig::default();
        let s = cfg.section("nope");
        assert_eq!(s.position(), Vec3::new(0.0, 0.12, 2.8));
    }
}
