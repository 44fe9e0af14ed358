//! Generates per-leg tip trajectories from a commanded body velocity
//! using a selectable gait, and runs each leg's step-phase sub-state
//! machine.

use crate::body_config::BodyGeometry;
use crate::gait::Gait;
use crate::model::hexapod_types::LegId;
use crate::model::{LegState, Model, StepState};
use crate::parameters::ParameterFile;
use nalgebra::{Point3, Vector2, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Starting,
    Moving,
    Stopping,
    Stopped,
}

/// No dynamic dispatch: the gait is held as data (`Gait`), not a
/// subclassed strategy object (§9 "No dynamic dispatch in the hot
/// loop").
pub struct WalkController {
    pub walk_state: WalkState,
    pub gait: Gait,
    prev_linear_velocity: Vector2<f32>,
    prev_angular_velocity: f32,
}

fn clamp_accel_vec2(prev: Vector2<f32>, target: Vector2<f32>, max_accel: f32, dt: f32) -> Vector2<f32> {
    if max_accel < 0.0 {
        return target;
    }
    let delta = target - prev;
    let max_delta = max_accel * dt;
    if delta.magnitude() > max_delta {
        prev + delta.normalize() * max_delta
    } else {
        target
    }
}

fn clamp_accel_scalar(prev: f32, target: f32, max_accel: f32, dt: f32) -> f32 {
    if max_accel < 0.0 {
        return target;
    }
    let max_delta = max_accel * dt;
    prev + (target - prev).clamp(-max_delta, max_delta)
}

/// Symmetric quartic bump in `[0,1]` peaking at `t=0.5`; the swing arc
/// height profile (§4.2 "parameterize a quartic/bezier swing arc").
fn swing_height_fraction(t: f32) -> f32 {
    16.0 * t.powi(2) * (1.0 - t).powi(2)
}

impl WalkController {
    pub fn new(gait: Gait) -> Self {
        WalkController {
            walk_state: WalkState::Stopped,
            gait,
            prev_linear_velocity: Vector2::zeros(),
            prev_angular_velocity: 0.0,
        }
    }

    /// Loads a new gait's phase table into the model. Callers must only
    /// invoke this while `walk_state == Stopped` (enforced by
    /// `StateController::change_gait`, §4.1.1 action 1).
    pub fn load_gait(&mut self, gait: Gait, model: &mut Model) {
        self.gait = gait;
        model.set_gait_phase_offsets(gait.phase_offsets());
        for leg_id in LegId::ALL {
            let stepper = &mut model.legs.get_mut(leg_id).leg_stepper;
            stepper.phase = stepper.phase_offset;
            stepper.step_state = StepState::Stance;
            stepper.stance_progress = 0.0;
            stepper.swing_progress = 0.0;
        }
    }

    /// Normalized position within the current gait cycle, in `[0, 1)`.
    /// Read off the left-front leg's stepper phase: every leg advances
    /// phase at the same rate and only differs by a fixed per-leg
    /// offset, so any single leg's phase is a valid proxy for where the
    /// whole gait cycle currently stands (§4.3 "phase-locked pose sway
    /// per gait cycle").
    pub fn phase_fraction(&self, model: &Model) -> f32 {
        let cycle = self.gait.cycle_length();
        if cycle <= 0.0 {
            return 0.0;
        }
        model.legs.left_front().leg_stepper.phase / cycle
    }

    pub fn update_walk(
        &mut self,
        model: &mut Model,
        body_config: &BodyGeometry,
        parameters: &ParameterFile,
        linear_velocity: Vector2<f32>,
        angular_velocity: f32,
        max_linear_acceleration: f32,
        max_angular_acceleration: f32,
    ) {
        let linear_velocity = clamp_accel_vec2(
            self.prev_linear_velocity,
            linear_velocity,
            max_linear_acceleration,
            parameters.time_delta,
        );
        let angular_velocity = clamp_accel_scalar(
            self.prev_angular_velocity,
            angular_velocity,
            max_angular_acceleration,
            parameters.time_delta,
        );
        self.prev_linear_velocity = linear_velocity;
        self.prev_angular_velocity = angular_velocity;

        let commanded_stop = linear_velocity.magnitude() < 1e-6 && angular_velocity.abs() < 1e-6;

        match self.walk_state {
            WalkState::Stopped if !commanded_stop => self.walk_state = WalkState::Starting,
            WalkState::Starting => self.walk_state = WalkState::Moving,
            WalkState::Moving if commanded_stop => self.walk_state = WalkState::Stopping,
            WalkState::Stopping if !commanded_stop => self.walk_state = WalkState::Moving,
            _ => {}
        }

        let cycle = self.gait.cycle_length();
        let step_frequency = parameters.step_frequency.current_value;
        let step_clearance = parameters.step_clearance.current_value;
        let max_body_height = parameters.body_clearance.current_value;
        let footprint_downscale = parameters.footprint_downscale;

        let mut all_force_stance_at_zero = true;

        for leg_id in LegId::ALL {
            let leg_config = body_config.legs.get(leg_id);
            let workspace_radius = body_config.workspace_radius(leg_config) * footprint_downscale;
            let leg = model.legs.get_mut(leg_id);
            let stance_xy = Vector2::new(
                leg.leg_stepper.default_tip_position.x,
                leg.leg_stepper.default_tip_position.y,
            );
            let tangential = Vector2::new(-stance_xy.y, stance_xy.x) * angular_velocity;
            let stride = if step_frequency > 1e-6 {
                (linear_velocity + tangential) / step_frequency
            } else {
                Vector2::zeros()
            };
            leg.leg_stepper.stride_vector = Vector3::new(stride.x, stride.y, 0.0);

            if self.walk_state == WalkState::Stopping || self.walk_state == WalkState::Stopped {
                leg.leg_stepper.step_state = StepState::ForceStance;
            }

            if leg.leg_stepper.step_state == StepState::ForceStance {
                leg.leg_stepper.stance_progress = 0.0;
                leg.leg_stepper.swing_progress = 0.0;
                leg.leg_stepper.current_tip_position = leg.leg_stepper.default_tip_position;
            } else {
                leg.leg_stepper.phase = (leg.leg_stepper.phase + parameters.time_delta * step_frequency) % cycle;
                let phase = leg.leg_stepper.phase;
                if phase < self.gait.stance_phase {
                    leg.leg_stepper.step_state = StepState::Stance;
                    let progress = phase / self.gait.stance_phase;
                    leg.leg_stepper.stance_progress = progress;
                    let xy = stance_xy + leg.leg_stepper.stride_vector.xy() * (0.5 - progress);
                    leg.leg_stepper.current_tip_position =
                        Point3::new(xy.x, xy.y, leg.leg_stepper.default_tip_position.z);
                } else {
                    leg.leg_stepper.step_state = StepState::Swing;
                    let progress = (phase - self.gait.stance_phase) / self.gait.swing_phase;
                    leg.leg_stepper.swing_progress = progress;
                    let xy = stance_xy + leg.leg_stepper.stride_vector.xy() * (progress - 0.5);
                    let height = swing_height_fraction(progress) * step_clearance * max_body_height;
                    leg.leg_stepper.current_tip_position = Point3::new(
                        xy.x,
                        xy.y,
                        leg.leg_stepper.default_tip_position.z + height,
                    );
                }
                all_force_stance_at_zero = false;
            }

            // Workspace enforcement: clamp the tip back inside the reach circle.
            let planar = Vector2::new(
                leg.leg_stepper.current_tip_position.x - leg_config.position.x,
                leg.leg_stepper.current_tip_position.y - leg_config.position.y,
            );
            if planar.magnitude() > workspace_radius {
                let clamped = planar.normalize() * workspace_radius;
                leg.leg_stepper.current_tip_position.x = leg_config.position.x + clamped.x;
                leg.leg_stepper.current_tip_position.y = leg_config.position.y + clamped.y;
            }
        }

        if self.walk_state == WalkState::Stopping && all_force_stance_at_zero {
            self.walk_state = WalkState::Stopped;
        }
    }

    /// Integrates manual tip velocity commands for legs currently in
    /// `LegState::Manual`, clamped to each leg's workspace radius.
    pub fn update_manual(
        &self,
        model: &mut Model,
        body_config: &BodyGeometry,
        parameters: &ParameterFile,
        primary_leg: Option<LegId>,
        primary_tip_velocity: Vector3<f32>,
        secondary_leg: Option<LegId>,
        secondary_tip_velocity: Vector3<f32>,
    ) {
        for (leg_id, velocity) in [
            (primary_leg, primary_tip_velocity),
            (secondary_leg, secondary_tip_velocity),
        ] {
            let Some(leg_id) = leg_id else { continue };
            let leg_config = body_config.legs.get(leg_id);
            let workspace_radius = body_config.workspace_radius(leg_config);
            let leg = model.legs.get_mut(leg_id);
            if leg.leg_state != LegState::Manual {
                continue;
            }
            let mut new_position = leg.leg_stepper.current_tip_position + velocity * parameters.time_delta;
            let planar = Vector2::new(
                new_position.x - leg_config.position.x,
                new_position.y - leg_config.position.y,
            );
            if planar.magnitude() > workspace_radius {
                let clamped = planar.normalize() * workspace_radius;
                new_position.x = leg_config.position.x + clamped.x;
                new_position.y = leg_config.position.y + clamped.y;
            }
            leg.leg_stepper.current_tip_position = new_position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body_config::BodyGeometry;
    use crate::gait::TRIPOD;
    use crate::model::stance_poses::RELAXED;

    fn setup() -> (Model, BodyGeometry, ParameterFile) {
        let body_config = BodyGeometry::default();
        let model = Model::new(&body_config, &RELAXED);
        (model, body_config, ParameterFile::default())
    }

    #[test]
    fn tripod_walking_keeps_exactly_three_legs_in_stance() {
        let (mut model, body_config, parameters) = setup();
        let mut walker = WalkController::new(TRIPOD);
        walker.load_gait(TRIPOD, &mut model);
        for _ in 0..200 {
            walker.update_walk(
                &mut model,
                &body_config,
                &parameters,
                Vector2::new(0.1, 0.0),
                0.0,
                -1.0,
                -1.0,
            );
        }
        let stance_count = model
            .legs
            .as_legs()
            .iter()
            .filter(|leg| leg.leg_stepper.step_state == StepState::Stance)
            .count();
        assert_eq!(stance_count, 3);
    }

    #[test]
    fn zero_velocity_eventually_reaches_stopped() {
        let (mut model, body_config, parameters) = setup();
        let mut walker = WalkController::new(TRIPOD);
        walker.load_gait(TRIPOD, &mut model);
        for _ in 0..10 {
            walker.update_walk(
                &mut model,
                &body_config,
                &parameters,
                Vector2::new(0.1, 0.0),
                0.0,
                -1.0,
                -1.0,
            );
        }
        for _ in 0..400 {
            walker.update_walk(
                &mut model,
                &body_config,
                &parameters,
                Vector2::zeros(),
                0.0,
                -1.0,
                -1.0,
            );
        }
        assert_eq!(walker.walk_state, WalkState::Stopped);
    }

    #[test]
    fn phase_fraction_stays_in_unit_range_while_walking() {
        let (mut model, body_config, parameters) = setup();
        let mut walker = WalkController::new(TRIPOD);
        walker.load_gait(TRIPOD, &mut model);
        for _ in 0..200 {
            walker.update_walk(
                &mut model,
                &body_config,
                &parameters,
                Vector2::new(0.1, 0.0),
                0.0,
                -1.0,
                -1.0,
            );
            let fraction = walker.phase_fraction(&model);
            assert!((0.0..1.0).contains(&fraction));
        }
    }

    #[test]
    fn manual_leg_ignores_walk_updates() {
        let (mut model, body_config, parameters) = setup();
        model.legs.get_mut(LegId::LeftFront).leg_state = LegState::Manual;
        let before = model.legs.get(LegId::LeftFront).leg_stepper.current_tip_position;
        let walker = WalkController::new(TRIPOD);
        walker.update_manual(
            &mut model,
            &body_config,
            &parameters,
            Some(LegId::LeftFront),
            Vector3::new(0.0, 0.0, 0.01),
            None,
            Vector3::zeros(),
        );
        let after = model.legs.get(LegId::LeftFront).leg_stepper.current_tip_position;
        assert!(after.z > before.z);
    }
}
