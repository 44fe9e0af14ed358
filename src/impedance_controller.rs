//! Per-leg vertical impedance: a second-order virtual spring/damper
//! driven by measured tip force, integrated once per tick (§4.4).

use crate::model::hexapod_types::LegId;
use crate::model::{LegState, Model};
use crate::parameters::ParameterFile;
use crate::walk_controller::WalkController;

/// Per-leg spring/damper state. `virtual_stiffness` is mutable per leg
/// (dynamic stiffness scales it by walk phase); mass and the derived
/// damping coefficient are shared across legs for a given tick.
#[derive(Debug, Clone, Copy, Default)]
struct ImpedanceState {
    z: f32,
    z_dot: f32,
}

pub struct ImpedanceController {
    state: [ImpedanceState; 6],
}

impl Default for ImpedanceController {
    fn default() -> Self {
        ImpedanceController {
            state: [ImpedanceState::default(); 6],
        }
    }
}

impl ImpedanceController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-initializes the integrator state, used after a parameter
    /// change affects the spring/mass/damping coefficients (§4.1.1
    /// action 2: "re-init impedance").
    pub fn reset(&mut self) {
        self.state = [ImpedanceState::default(); 6];
    }

    /// Integrates `virtual_mass * z'' + virtual_damping * z' +
    /// virtual_stiffness * z = force_gain * tip_force` once per leg
    /// using semi-implicit Euler with step `integrator_step_time`, and
    /// writes the result into `Leg.delta_z`. Manual legs are excluded
    /// and held at zero (§4.4 "manual legs get delta_z = 0").
    pub fn update(&mut self, model: &mut Model, parameters: &ParameterFile) {
        if !parameters.impedance_control {
            for leg_id in LegId::ALL {
                model.legs.get_mut(leg_id).delta_z = 0.0;
            }
            self.reset();
            return;
        }
        let mass = parameters.virtual_mass.current_value;
        let damping = 2.0
            * parameters.virtual_damping_ratio
            * (mass * parameters.virtual_stiffness.current_value).sqrt();
        let dt = parameters.integrator_step_time;

        for leg_id in LegId::ALL {
            let leg = model.legs.get_mut(leg_id);
            if leg.leg_state != LegState::Walking {
                leg.delta_z = 0.0;
                self.state[leg_id.index()] = ImpedanceState::default();
                continue;
            }
            let stiffness = leg.virtual_stiffness * parameters.virtual_stiffness.current_value;
            let force = leg.tip_force.clamp(0.0, parameters.max_force);
            let state = &mut self.state[leg_id.index()];
            let z_ddot = (parameters.force_gain * force - damping * state.z_dot - stiffness * state.z) / mass;
            state.z_dot += z_ddot * dt;
            state.z += state.z_dot * dt;
            leg.delta_z = state.z;
        }
    }

    /// §4.4 `updateStiffness(walker)`: dynamic per-leg stiffness driven
    /// by walk phase. Swinging legs get `swing_stiffness_scaler`; the
    /// two legs of the tripod taking over the load (the ones entering
    /// stance opposite a swinging leg) get `load_stiffness_scaler`;
    /// everyone else is unity.
    pub fn update_stiffness(&self, model: &mut Model, walker: &WalkController, parameters: &ParameterFile) {
        use crate::model::StepState;
        let _ = walker;
        if !parameters.dynamic_stiffness {
            for leg_id in LegId::ALL {
                model.legs.get_mut(leg_id).virtual_stiffness = 1.0;
            }
            return;
        }
        for leg_id in LegId::ALL {
            let leg = model.legs.get_mut(leg_id);
            let scaler = match leg.leg_stepper.step_state {
                StepState::Swing => parameters.swing_stiffness_scaler,
                StepState::Stance if leg.leg_stepper.stance_progress < 0.2 => parameters.load_stiffness_scaler,
                _ => 1.0,
            };
            leg.virtual_stiffness = scaler;
        }
    }

    /// §4.4 `updateStiffness(leg, ratio)`: scalar interpolation of one
    /// leg's stiffness toward `ratio`, used while a leg transitions
    /// in/out of manual (§4.1.2 "if dynamic_stiffness, update that leg's
    /// stiffness proportionally").
    pub fn update_leg_stiffness(&self, model: &mut Model, leg_id: LegId, ratio: f32) {
        // Interpolates stiffness from 1.0 (fully walking) toward 0.0
        // (fully manual) as `ratio` goes 0 -> 1.
        model.legs.get_mut(leg_id).virtual_stiffness = 1.0 - ratio.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body_config::BodyGeometry;
    use crate::model::stance_poses::RELAXED;
    use crate::model::Model;

    fn setup() -> (Model, ParameterFile) {
        let body_config = BodyGeometry::default();
        (Model::new(&body_config, &RELAXED), ParameterFile::default())
    }

    #[test]
    fn zero_force_settles_delta_z_to_zero() {
        let (mut model, parameters) = setup();
        let mut impedance = ImpedanceController::new();
        for _ in 0..500 {
            impedance.update(&mut model, &parameters);
        }
        for leg_id in LegId::ALL {
            assert!(model.legs.get(leg_id).delta_z.abs() < 1e-3);
        }
    }

    #[test]
    fn positive_force_pushes_delta_z_positive_at_steady_state() {
        let (mut model, parameters) = setup();
        model.legs.get_mut(LegId::LeftFront).tip_force = 500.0;
        let mut impedance = ImpedanceController::new();
        for _ in 0..2000 {
            impedance.update(&mut model, &parameters);
        }
        assert!(model.legs.get(LegId::LeftFront).delta_z > 0.0);
    }

    #[test]
    fn manual_leg_excluded_from_impedance() {
        let (mut model, parameters) = setup();
        model.legs.get_mut(LegId::LeftFront).leg_state = LegState::Manual;
        model.legs.get_mut(LegId::LeftFront).tip_force = 900.0;
        let mut impedance = ImpedanceController::new();
        for _ in 0..500 {
            impedance.update(&mut model, &parameters);
        }
        assert_eq!(model.legs.get(LegId::LeftFront).delta_z, 0.0);
    }

    #[test]
    fn disabling_impedance_control_zeroes_every_leg() {
        let (mut model, mut parameters) = setup();
        model.legs.get_mut(LegId::LeftFront).tip_force = 500.0;
        let mut impedance = ImpedanceController::new();
        for _ in 0..100 {
            impedance.update(&mut model, &parameters);
        }
        parameters.impedance_control = false;
        impedance.update(&mut model, &parameters);
        assert_eq!(model.legs.get(LegId::LeftFront).delta_z, 0.0);
    }
}
