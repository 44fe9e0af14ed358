//! Typed, bounded, runtime-adjustable parameters, plus the selection
//! map `StateController` uses to route an incoming adjust command.

use crate::error::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which of the adjustable parameters a `parameter_selection` input
/// names (§3 "A selection map keyed by ParameterSelection").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSelection {
    StepFrequency,
    StepClearance,
    BodyClearance,
    LegSpanScale,
    VirtualMass,
    VirtualStiffness,
    VirtualDamping,
    ForceGain,
}

impl ParameterSelection {
    pub const ALL: [ParameterSelection; 8] = [
        ParameterSelection::StepFrequency,
        ParameterSelection::StepClearance,
        ParameterSelection::BodyClearance,
        ParameterSelection::LegSpanScale,
        ParameterSelection::VirtualMass,
        ParameterSelection::VirtualStiffness,
        ParameterSelection::VirtualDamping,
        ParameterSelection::ForceGain,
    ];

    /// Whether changing this parameter requires re-deriving gait
    /// geometry (stride length, stance tip positions) rather than just
    /// the impedance model.
    pub fn affects_gait_geometry(self) -> bool {
        matches!(
            self,
            ParameterSelection::StepFrequency
                | ParameterSelection::StepClearance
                | ParameterSelection::BodyClearance
                | ParameterSelection::LegSpanScale
        )
    }
}

/// One bounded, steppable runtime value (§3 `AdjustableParameter`).
/// Invariant: `min <= current_value <= max`, enforced by `adjust`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdjustableParameter {
    pub current_value: f32,
    pub default_value: f32,
    pub min: f32,
    pub max: f32,
    pub adjust_step: f32,
}

impl AdjustableParameter {
    pub fn new(default_value: f32, min: f32, max: f32, adjust_step: f32) -> Self {
        AdjustableParameter {
            current_value: default_value,
            default_value,
            min,
            max,
            adjust_step,
        }
    }

    /// Applies one `parameter_adjustment` step (`-1`, `0`, or `+1`),
    /// flipping the sign of `adjust_step` when it opposes the requested
    /// direction, then clamps into `[min, max]` (§6, §8 boundary
    /// behaviors: "`parameter_adjustment = 0` never changes any
    /// parameter").
    pub fn adjust(&mut self, direction: i8) {
        if direction == 0 {
            return;
        }
        if direction.signum() as f32 != self.adjust_step.signum() {
            self.adjust_step = -self.adjust_step;
        }
        self.current_value = (self.current_value + self.adjust_step).clamp(self.min, self.max);
    }
}

/// The full runtime-tunable parameter table, plus ambient timing and
/// compensation toggles not covered by `ParameterSelection` (§6
/// "Parameters (illustrative, complete enumeration in code)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterFile {
    pub time_delta: f32,
    pub start_up_sequence: bool,
    pub imu_compensation: bool,
    pub auto_compensation: bool,
    pub manual_compensation: bool,
    pub inclination_compensation: bool,
    pub impedance_control: bool,
    pub dynamic_stiffness: bool,

    pub step_frequency: AdjustableParameter,
    pub step_clearance: AdjustableParameter,
    pub body_clearance: AdjustableParameter,
    pub leg_span_scale: AdjustableParameter,
    pub virtual_mass: AdjustableParameter,
    pub virtual_stiffness: AdjustableParameter,
    pub virtual_damping: AdjustableParameter,
    pub force_gain: AdjustableParameter,

    pub max_linear_acceleration: f32,
    pub max_angular_acceleration: f32,
    pub footprint_downscale: f32,
    pub virtual_damping_ratio: f32,
    pub load_stiffness_scaler: f32,
    pub swing_stiffness_scaler: f32,
    pub integrator_step_time: f32,
    pub force_offset: f32,
    pub max_force: f32,

    pub rotation_pid_gains: PidGains,
    pub translation_pid_gains: PidGains,
    pub max_translation: f32,
    pub max_translation_velocity: f32,
    pub max_rotation: f32,
    pub max_rotation_velocity: f32,
    pub pose_reset_velocity: f32,
    pub time_to_start: f32,
}

/// Absement/position/velocity PID gains (§4.3: "three terms: absement
/// ... position ... velocity").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidGains {
    pub absement: f32,
    pub position: f32,
    pub velocity: f32,
}

impl ParameterFile {
    pub fn load(path: &Path) -> ControllerResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save_as_toml(&self, path: &Path) -> ControllerResult<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads from an optional TOML file layered under `HEXAPOD_`-prefixed
    /// environment overrides (file source + env source, env wins).
    /// Falls back to the literal `Default` when no path is given and no
    /// override env vars are set.
    pub fn load_layered(path: Option<&Path>) -> ControllerResult<Self> {
        let defaults = toml::to_string(&ParameterFile::default())?;
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("HEXAPOD").separator("__"));
        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn get(&self, selection: ParameterSelection) -> &AdjustableParameter {
        match selection {
            ParameterSelection::StepFrequency => &self.step_frequency,
            ParameterSelection::StepClearance => &self.step_clearance,
            ParameterSelection::BodyClearance => &self.body_clearance,
            ParameterSelection::LegSpanScale => &self.leg_span_scale,
            ParameterSelection::VirtualMass => &self.virtual_mass,
            ParameterSelection::VirtualStiffness => &self.virtual_stiffness,
            ParameterSelection::VirtualDamping => &self.virtual_damping,
            ParameterSelection::ForceGain => &self.force_gain,
        }
    }

    pub fn get_mut(&mut self, selection: ParameterSelection) -> &mut AdjustableParameter {
        match selection {
            ParameterSelection::StepFrequency => &mut self.step_frequency,
            ParameterSelection::StepClearance => &mut self.step_clearance,
            ParameterSelection::BodyClearance => &mut self.body_clearance,
            ParameterSelection::LegSpanScale => &mut self.leg_span_scale,
            ParameterSelection::VirtualMass => &mut self.virtual_mass,
            ParameterSelection::VirtualStiffness => &mut self.virtual_stiffness,
            ParameterSelection::VirtualDamping => &mut self.virtual_damping,
            ParameterSelection::ForceGain => &mut self.force_gain,
        }
    }

    /// Applies a `parameter_adjustment` to the selected parameter and
    /// returns whether the change affects gait geometry (the walker
    /// needs re-initializing too, not just impedance).
    pub fn adjust(
        &mut self,
        selection: ParameterSelection,
        direction: i8,
    ) -> ControllerResult<bool> {
        if !(-1..=1).contains(&direction) {
            return Err(ControllerError::Fatal(format!(
                "invalid parameter_adjustment direction {direction}"
            )));
        }
        self.get_mut(selection).adjust(direction);
        Ok(selection.affects_gait_geometry())
    }
}

impl Default for ParameterFile {
    fn default() -> Self {
        ParameterFile {
            time_delta: 1.0 / 50.0,
            start_up_sequence: true,
            imu_compensation: false,
            auto_compensation: true,
            manual_compensation: false,
            inclination_compensation: false,
            impedance_control: true,
            dynamic_stiffness: true,

            step_frequency: AdjustableParameter::new(1.0, 0.1, 3.0, 0.1),
            step_clearance: AdjustableParameter::new(0.05, 0.01, 0.2, 0.01),
            body_clearance: AdjustableParameter::new(0.09, 0.03, 0.15, 0.01),
            leg_span_scale: AdjustableParameter::new(1.0, 0.5, 1.5, 0.05),
            virtual_mass: AdjustableParameter::new(5.0, 0.5, 20.0, 0.5),
            virtual_stiffness: AdjustableParameter::new(50.0, 5.0, 200.0, 5.0),
            virtual_damping: AdjustableParameter::new(10.0, 1.0, 50.0, 1.0),
            force_gain: AdjustableParameter::new(1.0, 0.1, 5.0, 0.1),

            max_linear_acceleration: 0.5,
            max_angular_acceleration: 1.0,
            footprint_downscale: 0.8,
            virtual_damping_ratio: 0.7,
            load_stiffness_scaler: 1.5,
            swing_stiffness_scaler: 0.5,
            integrator_step_time: 1.0 / 50.0,
            force_offset: 1255.0,
            max_force: 1000.0,

            rotation_pid_gains: PidGains {
                absement: 0.0,
                position: 4.0,
                velocity: 0.1,
            },
            translation_pid_gains: PidGains {
                absement: 0.0,
                position: 1.0,
                velocity: 0.05,
            },
            max_translation: 0.05,
            max_translation_velocity: 0.3,
            max_rotation: 0.3,
            max_rotation_velocity: 2.0,
            pose_reset_velocity: 0.5,
            time_to_start: 2.0,
        }
    }
}
