use crate::error::ControllerResult;
use crate::model::hexapod_types::HexapodTypes;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Physical geometry and joint limits for one leg, fixed at construction
/// time (§3 Joint fields that do not change per tick: limits, offsets).
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct LegConfig {
    pub coxa_id: u8,
    pub femur_id: u8,
    pub tibia_id: u8,
    pub angle_offset: f32,
    pub position: Point3<f32>,
    pub femur_correction: f32,
    pub tibia_correction: f32,
    pub min_position: f32,
    pub max_position: f32,
    pub max_angular_speed: f32,
    pub packed_position: [f32; 3],
    pub unpacked_position: [f32; 3],
}

pub type BodyConfig = HexapodTypes<LegConfig>;

impl BodyConfig {
    pub fn get_ids(&self) -> [u8; 18] {
        let mut ids = [0u8; 18];
        for (i, leg) in self.as_legs().iter().enumerate() {
            ids[i * 3] = leg.coxa_id;
            ids[i * 3 + 1] = leg.femur_id;
            ids[i * 3 + 2] = leg.tibia_id;
        }
        ids
    }
}

/// Physical body geometry: leg link lengths, joint offsets, and per-leg
/// mounting configuration. This is the kinematic-constant half of the
/// runtime configuration; the tunable half lives in `ParameterFile`.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct BodyGeometry {
    pub coxa_length: f32,
    pub femur_length: f32,
    pub tibia_length: f32,
    pub femur_offset: f32,
    pub tibia_offset: f32,
    pub legs: BodyConfig,
}

impl BodyGeometry {
    pub fn load(path: &Path) -> ControllerResult<BodyGeometry> {
        let text = fs::read_to_string(path)?;
        let deserialized_config: BodyGeometry = toml::from_str(&text)?;
        Ok(deserialized_config)
    }

    pub fn save_as_toml(&self, path: &Path) -> ControllerResult<()> {
        fs::write(path, toml::to_string_pretty(&self)?)?;
        Ok(())
    }

    /// Loads from an optional TOML file layered under `HEXAPOD_`-prefixed
    /// environment overrides (same layering as `ParameterFile::load_layered`).
    pub fn load_layered(path: Option<&Path>) -> ControllerResult<Self> {
        let defaults = toml::to_string(&BodyGeometry::default())?;
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("HEXAPOD").separator("__"));
        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Maximum planar reach of a tip from its leg's coxa axis (§GLOSSARY
    /// "Workspace radius"), used by `WalkController` to reject or clamp
    /// step targets that would overextend the leg.
    pub fn workspace_radius(&self, leg: &LegConfig) -> f32 {
        let _ = leg;
        self.femur_length + self.tibia_length
    }
}

fn leg_config(
    coxa_id: u8,
    femur_id: u8,
    tibia_id: u8,
    angle_offset: f32,
    position: Point3<f32>,
    femur_correction: f32,
    tibia_correction: f32,
) -> LegConfig {
    LegConfig {
        coxa_id,
        femur_id,
        tibia_id,
        angle_offset,
        position,
        femur_correction,
        tibia_correction,
        min_position: 0.0,
        max_position: std::f32::consts::TAU,
        max_angular_speed: 8.0,
        packed_position: [150_f32.to_radians(), 210_f32.to_radians(), 25_f32.to_radians()],
        unpacked_position: [150_f32.to_radians(), 150_f32.to_radians(), 150_f32.to_radians()],
    }
}

impl Default for BodyGeometry {
    /// Literal defaults for a hexapod with 0.18m lateral / 0.15m
    /// longitudinal leg spacing and 0.055/0.08/0.13 link lengths. No
    /// bundled config asset ships with this crate — callers load a
    /// tuned `BodyGeometry` from a TOML file via `load`.
    fn default() -> Self {
        BodyGeometry {
            coxa_length: 0.055,
            femur_length: 0.08,
            tibia_length: 0.13,
            femur_offset: 0.0,
            tibia_offset: 0.0,
            legs: BodyConfig::new(
                leg_config(1, 2, 3, 0.0, Point3::new(0.1075, 0.046, 0.0), 0.0, 0.0),
                leg_config(13, 14, 15, 0.0, Point3::new(0.0, 0.065, 0.0), 0.0, 0.0),
                leg_config(19, 20, 21, 0.0, Point3::new(-0.1075, 0.046, 0.0), 0.0, 0.0),
                leg_config(7, 8, 9, 0.0, Point3::new(0.1075, -0.046, 0.0), 0.0, 0.0),
                leg_config(16, 17, 18, 0.0, Point3::new(0.0, -0.065, 0.0), 0.0, 0.0),
                leg_config(10, 11, 12, 0.0, Point3::new(-0.1075, -0.046, 0.0), 0.0, 0.0),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_body_geometry_builds() {
        let _ = BodyGeometry::default();
    }

    #[test]
    fn get_ids_picks_up_left_front_first() {
        let geometry = BodyGeometry::default();
        let ids = geometry.legs.get_ids();
        assert_eq!(ids[0], geometry.legs.left_front().coxa_id);
    }

    #[test]
    fn workspace_radius_is_femur_plus_tibia() {
        let geometry = BodyGeometry::default();
        let radius = geometry.workspace_radius(geometry.legs.left_front());
        assert_eq!(radius, geometry.femur_length + geometry.tibia_length);
    }
}
