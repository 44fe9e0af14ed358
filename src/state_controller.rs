//! Top-level lifecycle state machine and per-tick pipeline orchestrator
//! (§4.1). Gates what the rest of the pipeline is allowed to do, and is
//! the only component that calls `WalkController`, `PoseController`,
//! `ImpedanceController`, and `Model::apply_ik` in sequence.

use crate::body_config::BodyGeometry;
use crate::error::{ControllerError, ControllerResult};
use crate::gait::{gait_for, GaitSelection};
use crate::impedance_controller::ImpedanceController;
use crate::model::hexapod_types::LegId;
use crate::model::stance_poses::RELAXED;
use crate::model::{LegState, Model};
use crate::parameters::{ParameterFile, ParameterSelection};
use crate::pose_controller::{PoseController, PoseResetMode, PosingMode};
use crate::walk_controller::{WalkController, WalkState};
use nalgebra::{Vector2, Vector3};

pub const MAX_MANUAL_LEGS: usize = 2;
const PACKED_TOLERANCE: f32 = 0.01;

/// §4.1 "System states".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    WaitingForUser,
    Unknown,
    Off,
    Packed,
    Ready,
    Running,
    Suspended,
}

/// Which manual slot a leg-state toggle request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSlot {
    Primary,
    Secondary,
}

/// The in-flight choreography driving a multi-tick system-state
/// transition (§4.1 "Allowed transitions").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionAction {
    DirectStartup,
    UnpackLegs,
    PackLegs,
    StartUpSequence,
    ShutDownSequence,
    Instantaneous,
}

/// Per-tick user input surface, mirroring §6 "Input message surface".
/// Each field is last-write-wins and read once per tick (§5 "single
/// mailbox" model) — `StateController` owns the whole struct and
/// callers mutate it between ticks.
#[derive(Debug, Clone)]
pub struct ControlInputs {
    pub desired_linear_velocity: Vector2<f32>,
    pub desired_angular_velocity: f32,
    pub primary_tip_velocity: Vector3<f32>,
    pub secondary_tip_velocity: Vector3<f32>,
    pub new_system_state: Option<SystemState>,
    pub gait_selection: Option<GaitSelection>,
    pub posing_mode: PosingMode,
    pub desired_pose_translation: Vector3<f32>,
    pub desired_pose_rotation: Vector3<f32>,
    pub cruise_control_on: bool,
    pub linear_cruise_velocity: Vector2<f32>,
    pub angular_cruise_velocity: f32,
    pub parameter_selection: Option<ParameterSelection>,
    pub parameter_adjustment: i8,
    pub primary_leg_selection: Option<LegId>,
    pub secondary_leg_selection: Option<LegId>,
    pub primary_leg_toggle: bool,
    pub secondary_leg_toggle: bool,
    pub pose_reset_mode: PoseResetMode,
    pub measured_imu_orientation: nalgebra::UnitQuaternion<f32>,
}

impl Default for ControlInputs {
    fn default() -> Self {
        ControlInputs {
            desired_linear_velocity: Vector2::zeros(),
            desired_angular_velocity: 0.0,
            primary_tip_velocity: Vector3::zeros(),
            secondary_tip_velocity: Vector3::zeros(),
            new_system_state: None,
            gait_selection: None,
            posing_mode: PosingMode::NoPosing,
            desired_pose_translation: Vector3::zeros(),
            desired_pose_rotation: Vector3::zeros(),
            cruise_control_on: false,
            linear_cruise_velocity: Vector2::zeros(),
            angular_cruise_velocity: 0.0,
            parameter_selection: None,
            parameter_adjustment: 0,
            primary_leg_selection: None,
            secondary_leg_selection: None,
            primary_leg_toggle: false,
            secondary_leg_toggle: false,
            pose_reset_mode: PoseResetMode::NoReset,
            measured_imu_orientation: nalgebra::UnitQuaternion::identity(),
        }
    }
}

pub struct StateController {
    pub system_state: SystemState,
    pub new_system_state: SystemState,
    transition_state_flag: bool,
    transition_action: Option<TransitionAction>,

    pub body_config: BodyGeometry,
    pub parameters: ParameterFile,
    pub model: Model,
    pub walker: WalkController,
    pub poser: PoseController,
    pub impedance: ImpedanceController,

    gait_change_pending: Option<GaitSelection>,
    parameter_adjust_pending: Option<(ParameterSelection, i8)>,
    manual_leg_count: usize,
    primary_leg: Option<LegId>,
    secondary_leg: Option<LegId>,
    primary_busy: bool,
    secondary_busy: bool,
}

impl StateController {
    pub fn new(body_config: BodyGeometry, parameters: ParameterFile) -> Self {
        let model = Model::new(&body_config, &RELAXED);
        let gait = gait_for(GaitSelection::Tripod);
        let mut walker = WalkController::new(gait);
        let mut model = model;
        walker.load_gait(gait, &mut model);
        StateController {
            system_state: SystemState::WaitingForUser,
            new_system_state: SystemState::WaitingForUser,
            transition_state_flag: false,
            transition_action: None,
            body_config,
            parameters,
            model,
            walker,
            poser: PoseController::new(),
            impedance: ImpedanceController::new(),
            gait_change_pending: None,
            parameter_adjust_pending: None,
            manual_leg_count: 0,
            primary_leg: None,
            secondary_leg: None,
            primary_busy: false,
            secondary_busy: false,
        }
    }

    /// §4.1 "Bootstrap": the first `system_state` input captures
    /// `new_system_state`; later commands only take effect once the
    /// controller has left `WaitingForUser`. `start_up_sequence = false`
    /// rewrites `Ready`/`Packed` targets to `Off`.
    fn accept_system_state_command(&mut self, requested: SystemState) {
        if self.system_state == SystemState::WaitingForUser {
            self.new_system_state = self.rewrite_for_startup_policy(requested);
            self.system_state = SystemState::Unknown;
            self.transition_state_flag = true;
            return;
        }
        let requested = self.rewrite_for_startup_policy(requested);
        if requested != self.system_state {
            self.new_system_state = requested;
            self.transition_state_flag = true;
        }
    }

    fn rewrite_for_startup_policy(&self, requested: SystemState) -> SystemState {
        if !self.parameters.start_up_sequence
            && matches!(requested, SystemState::Ready | SystemState::Packed)
        {
            SystemState::Off
        } else {
            requested
        }
    }

    /// §4.1 "UNKNOWN resolution": inspects every joint's distance to its
    /// `packed_position`. A packed robot found with `start_up_sequence =
    /// false` is fatal — the bring-up policy contradicts the observed
    /// hardware state and needs operator intervention.
    fn resolve_unknown(&mut self) -> ControllerResult<()> {
        let all_packed = self.model.all_joints_near_packed(PACKED_TOLERANCE);
        if all_packed {
            if !self.parameters.start_up_sequence {
                return Err(ControllerError::Fatal(
                    "robot found packed at bring-up but start_up_sequence is disabled; \
                     operator must unpack manually or enable start_up_sequence"
                        .to_string(),
                ));
            }
            self.system_state = SystemState::Packed;
        } else if !self.parameters.start_up_sequence {
            self.system_state = SystemState::Off;
        } else {
            tracing::warn!("robot not near packed_position at bring-up; assuming Packed");
            self.system_state = SystemState::Packed;
        }
        Ok(())
    }

    /// §4.1's chain order along which a transition is allowed to step:
    /// `Off <-> Packed <-> Ready <-> Running`. Used by `next_hop` to walk
    /// one allowed edge at a time instead of jumping straight to a
    /// distant `new_system_state` (§8 scenario 1: a cold `RUNNING`
    /// request from `Packed` must pass through `Ready`, running
    /// `startUpSequence`, not skip it).
    fn chain_index(state: SystemState) -> Option<i8> {
        match state {
            SystemState::Off => Some(0),
            SystemState::Packed => Some(1),
            SystemState::Ready => Some(2),
            SystemState::Running => Some(3),
            _ => None,
        }
    }

    fn chain_state(index: i8) -> SystemState {
        match index {
            0 => SystemState::Off,
            1 => SystemState::Packed,
            2 => SystemState::Ready,
            _ => SystemState::Running,
        }
    }

    /// The next adjacent state to move to on the way from `from` to
    /// `to`. Falls back to `to` directly for pairs outside the
    /// `Off..=Running` chain (e.g. `Suspended`, or same-state ticks).
    fn next_hop(&self, from: SystemState, to: SystemState) -> SystemState {
        if !self.parameters.start_up_sequence
            && ((from == SystemState::Off && to == SystemState::Running)
                || (from == SystemState::Running && to == SystemState::Off))
        {
            return to;
        }
        match (Self::chain_index(from), Self::chain_index(to)) {
            (Some(a), Some(b)) if a < b => Self::chain_state(a + 1),
            (Some(a), Some(b)) if a > b => Self::chain_state(a - 1),
            _ => to,
        }
    }

    /// Looks up the action table row for one adjacent `(current, next)`
    /// hop (§4.1 "Allowed transitions"), or returns a fatal error for an
    /// undefined pair.
    fn transition_action_for(&self, from: SystemState, to: SystemState) -> ControllerResult<TransitionAction> {
        use SystemState::*;
        let action = match (from, to) {
            (Off, Running) if !self.parameters.start_up_sequence => TransitionAction::DirectStartup,
            (Off, Packed) => TransitionAction::Instantaneous,
            (Packed, Off) => TransitionAction::Instantaneous,
            (Packed, Ready) => TransitionAction::UnpackLegs,
            (Ready, Packed) => TransitionAction::PackLegs,
            (Ready, Off) => TransitionAction::PackLegs,
            (Ready, Running) => TransitionAction::StartUpSequence,
            (Running, Off) if !self.parameters.start_up_sequence => TransitionAction::Instantaneous,
            (Running, Ready) => TransitionAction::ShutDownSequence,
            (Suspended, Suspended) => TransitionAction::Instantaneous,
            (a, b) if a == b => TransitionAction::Instantaneous,
            _ => {
                return Err(ControllerError::Fatal(format!(
                    "undefined system state transition requested: {from:?} -> {to:?}"
                )))
            }
        };
        Ok(action)
    }

    /// Runs one step of the currently active transition, advancing
    /// towards `new_system_state` one allowed chain hop at a time. Once
    /// the current hop's action completes, `system_state` lands on that
    /// intermediate state (e.g. `Ready`) and the next tick picks the
    /// next hop from there, so the whole chain is walked tick-by-tick
    /// rather than the action for the final target being invoked
    /// directly from a distant starting state.
    fn run_transition_step(&mut self) -> ControllerResult<()> {
        if self.system_state == self.new_system_state {
            self.transition_state_flag = false;
            self.transition_action = None;
            return Ok(());
        }
        let hop_target = self.next_hop(self.system_state, self.new_system_state);
        let action = match self.transition_action {
            Some(action) => action,
            None => self.transition_action_for(self.system_state, hop_target)?,
        };
        self.transition_action = Some(action);

        let duration = 2.0 / self.parameters.step_frequency.current_value.max(1e-3);
        let time_delta = self.parameters.time_delta;

        let complete = match action {
            TransitionAction::Instantaneous => true,
            TransitionAction::DirectStartup => {
                self.poser.direct_startup(&mut self.model, self.parameters.time_to_start, time_delta) >= 1.0
            }
            TransitionAction::UnpackLegs => self.poser.unpack_legs(&mut self.model, duration, time_delta) >= 1.0,
            TransitionAction::PackLegs => self.poser.pack_legs(&mut self.model, duration, time_delta) >= 1.0,
            TransitionAction::StartUpSequence => {
                self.poser.start_up_sequence(&mut self.model, &self.body_config, time_delta) >= 1.0
            }
            TransitionAction::ShutDownSequence => {
                self.poser.shut_down_sequence(&mut self.model, &self.body_config, time_delta) >= 1.0
            }
        };

        if complete {
            self.system_state = hop_target;
            self.transition_action = None;
            if self.system_state == self.new_system_state {
                self.transition_state_flag = false;
            }
            tracing::info!(target = ?hop_target, "system state transition hop complete");
        }
        Ok(())
    }

    /// §4.1.1 action 1: `changeGait`. Requires the walker to be
    /// `Stopped`; otherwise zeroes the velocity inputs to force a stop
    /// and leaves the request pending.
    fn try_change_gait(&mut self, inputs: &mut ControlInputs) -> bool {
        let Some(selection) = self.gait_change_pending else {
            return false;
        };
        if self.walker.walk_state != WalkState::Stopped {
            inputs.desired_linear_velocity = Vector2::zeros();
            inputs.desired_angular_velocity = 0.0;
            return true;
        }
        let gait = gait_for(selection);
        self.walker.load_gait(gait, &mut self.model);
        // Acceleration clamps are disabled immediately after a gait
        // change by the sentinel -1 (unlimited); whether they are ever
        // re-enabled afterward is left to the caller's subsequent
        // parameter adjustments.
        self.parameters.max_linear_acceleration = -1.0;
        self.parameters.max_angular_acceleration = -1.0;
        self.gait_change_pending = None;
        tracing::info!(gait = gait.name, "gait change complete");
        true
    }

    /// §4.1.1 action 2: `adjustParameter`.
    fn try_adjust_parameter(&mut self, inputs: &mut ControlInputs) -> ControllerResult<bool> {
        let Some((selection, direction)) = self.parameter_adjust_pending else {
            return Ok(false);
        };
        if self.walker.walk_state != WalkState::Stopped {
            inputs.desired_linear_velocity = Vector2::zeros();
            inputs.desired_angular_velocity = 0.0;
            return Ok(true);
        }
        let affects_gait = self.parameters.adjust(selection, direction)?;
        self.impedance.reset();
        if affects_gait {
            let gait = self.walker.gait;
            self.walker.load_gait(gait, &mut self.model);
        }
        let target = RELAXED.scaled_by_leg_span(self.parameters.leg_span_scale.current_value);
        let progress = self
            .poser
            .step_to_new_stance(&mut self.model, &target, self.parameters.time_delta);
        if progress >= 1.0 {
            self.parameter_adjust_pending = None;
            tracing::info!(?selection, "parameter adjust complete");
        }
        Ok(true)
    }

    /// §4.1.2 `legStateToggle`.
    fn run_leg_state_toggle(&mut self, slot: LegSlot, inputs: &mut ControlInputs) -> bool {
        let (leg, other_busy) = match slot {
            LegSlot::Primary => (self.primary_leg, self.secondary_busy),
            LegSlot::Secondary => (self.secondary_leg, self.primary_busy),
        };
        let Some(leg_id) = leg else {
            tracing::debug!(?slot, "leg-state toggle requested with no leg selected; ignored");
            self.clear_toggle_request(slot);
            return false;
        };
        if other_busy {
            return true;
        }
        if self.walker.walk_state != WalkState::Stopped {
            inputs.desired_linear_velocity = Vector2::zeros();
            inputs.desired_angular_velocity = 0.0;
            return true;
        }

        let current_state = self.model.legs.get(leg_id).leg_state;
        match current_state {
            LegState::Walking => {
                if self.manual_leg_count >= MAX_MANUAL_LEGS {
                    tracing::warn!(leg = leg_id.name(), "manual leg cap reached; rejecting toggle");
                    self.clear_toggle_request(slot);
                    return false;
                }
                self.model.legs.get_mut(leg_id).leg_state = LegState::WalkingToManual;
                self.set_busy(slot, true);
            }
            LegState::Manual => {
                self.model.legs.get_mut(leg_id).leg_state = LegState::ManualToWalking;
                self.set_busy(slot, true);
            }
            LegState::WalkingToManual | LegState::ManualToWalking => {
                self.poser.pose_reset_mode = PoseResetMode::ImmediateAllReset;
                let flags = leg_id.flag();
                let duration = 2.0 / self.parameters.step_frequency.current_value.max(1e-3);
                let progress = self.poser.pose_for_leg_manipulation(
                    &mut self.model,
                    flags,
                    duration,
                    self.parameters.time_delta,
                );
                if self.parameters.dynamic_stiffness {
                    let ratio = if current_state == LegState::WalkingToManual {
                        progress
                    } else {
                        1.0 - progress
                    };
                    self.impedance.update_leg_stiffness(&mut self.model, leg_id, ratio);
                }
                if progress >= 1.0 {
                    let finished = match current_state {
                        LegState::WalkingToManual => {
                            self.manual_leg_count += 1;
                            LegState::Manual
                        }
                        LegState::ManualToWalking => {
                            self.manual_leg_count -= 1;
                            LegState::Walking
                        }
                        _ => unreachable!(),
                    };
                    self.model.legs.get_mut(leg_id).leg_state = finished;
                    self.poser.pose_reset_mode = PoseResetMode::NoReset;
                    self.set_busy(slot, false);
                    self.clear_toggle_request(slot);
                }
            }
        }
        true
    }

    fn set_busy(&mut self, slot: LegSlot, busy: bool) {
        match slot {
            LegSlot::Primary => self.primary_busy = busy,
            LegSlot::Secondary => self.secondary_busy = busy,
        }
    }

    fn clear_toggle_request(&mut self, slot: LegSlot) {
        match slot {
            LegSlot::Primary => self.primary_busy = false,
            LegSlot::Secondary => self.secondary_busy = false,
        }
    }

    pub fn manual_leg_count(&self) -> usize {
        self.manual_leg_count
    }

    /// §4.1.1: the RUNNING pipeline. Priority-ordered, first matching
    /// action wins; the unconditional four-stage pipeline still runs
    /// every tick unless a pending action is actively holding the
    /// walker away from `Stopped`.
    fn run_running_pipeline(&mut self, inputs: &mut ControlInputs) -> ControllerResult<()> {
        if let Some(selection) = inputs.gait_selection.take() {
            if self.walker.walk_state == WalkState::Stopped {
                self.gait_change_pending = Some(selection);
            } else {
                tracing::debug!("gait change request ignored: not RUNNING/stopped cleanly");
            }
        }
        if let Some(selection) = inputs.parameter_selection {
            if inputs.parameter_adjustment != 0 {
                self.parameter_adjust_pending = Some((selection, inputs.parameter_adjustment));
            }
        } else if inputs.parameter_adjustment != 0 {
            tracing::debug!("parameter adjust requested with no parameter selected; ignored");
        }
        if inputs.primary_leg_toggle {
            self.primary_leg = inputs.primary_leg_selection;
            inputs.primary_leg_toggle = false;
            self.primary_busy = true;
        }
        if inputs.secondary_leg_toggle {
            self.secondary_leg = inputs.secondary_leg_selection;
            inputs.secondary_leg_toggle = false;
            self.secondary_busy = true;
        }

        let action_active = self.try_change_gait(inputs)
            || self.try_adjust_parameter(inputs)?
            || self.primary_busy && self.run_leg_state_toggle(LegSlot::Primary, inputs)
            || self.secondary_busy && self.run_leg_state_toggle(LegSlot::Secondary, inputs);

        if inputs.cruise_control_on {
            inputs.desired_linear_velocity = inputs.linear_cruise_velocity;
            inputs.desired_angular_velocity = inputs.angular_cruise_velocity;
        }

        let held_by_pending_action = action_active && self.walker.walk_state != WalkState::Stopped;
        if held_by_pending_action {
            return Ok(());
        }

        self.walker.update_walk(
            &mut self.model,
            &self.body_config,
            &self.parameters,
            inputs.desired_linear_velocity,
            inputs.desired_angular_velocity,
            self.parameters.max_linear_acceleration,
            self.parameters.max_angular_acceleration,
        );
        self.walker.update_manual(
            &mut self.model,
            &self.body_config,
            &self.parameters,
            self.primary_leg,
            inputs.primary_tip_velocity,
            self.secondary_leg,
            inputs.secondary_tip_velocity,
        );
        if self.parameters.dynamic_stiffness {
            self.impedance
                .update_stiffness(&mut self.model, &self.walker, &self.parameters);
        }
        self.poser.update_stance(&mut self.model);

        for leg_id in LegId::ALL {
            let leg = self.model.legs.get_mut(leg_id);
            let mut target = leg.leg_poser.current_tip_position;
            if leg.leg_state != LegState::Manual {
                target.z -= leg.delta_z;
            }
            leg.desired_tip_position = target;
        }
        self.model.apply_ik(&self.body_config, self.parameters.time_delta)?;
        Ok(())
    }

    /// The full per-tick dispatch (§4.1 "Per-tick dispatch").
    pub fn tick(&mut self, inputs: &mut ControlInputs) -> ControllerResult<()> {
        if let Some(requested) = inputs.new_system_state.take() {
            self.accept_system_state_command(requested);
        }

        if self.system_state == SystemState::Unknown {
            self.resolve_unknown()?;
        } else {
            self.poser
                .update_imu_compensation(inputs.measured_imu_orientation, &self.parameters);
            self.poser
                .update_inclination_compensation(inputs.measured_imu_orientation, &self.parameters);
            let walk_phase_fraction = self.walker.phase_fraction(&self.model);
            self.poser
                .update_auto_compensation(walk_phase_fraction, &self.parameters);
            self.poser.update_manual_compensation(
                inputs.posing_mode,
                inputs.desired_pose_translation,
                inputs.desired_pose_rotation,
                &self.parameters,
            );
            // While a leg-state toggle is mid-transition it owns
            // `pose_reset_mode` (set to `ImmediateAllReset` in
            // `run_leg_state_toggle`, restored to `NoReset` on
            // completion) for the duration of the transition; accepting
            // `inputs.pose_reset_mode` here would clobber that request
            // before `apply_pose_reset` ever consumes it.
            if !(self.primary_busy || self.secondary_busy) {
                self.poser.pose_reset_mode = inputs.pose_reset_mode;
            }
            self.poser.apply_pose_reset(&self.parameters);
            self.poser.update_current_pose(&mut self.model, &self.parameters);
            if self.parameters.impedance_control {
                self.impedance.update(&mut self.model, &self.parameters);
            }
        }

        if self.transition_state_flag {
            self.run_transition_step()?;
        } else if self.system_state == SystemState::Running {
            self.run_running_pipeline(inputs)?;
        }

        if self.system_state == self.new_system_state {
            self.transition_state_flag = false;
        }
        Ok(())
    }

    pub fn walk_state(&self) -> WalkState {
        self.walker.walk_state
    }

    pub fn gait_change_pending(&self) -> bool {
        self.gait_change_pending.is_some()
    }

    pub fn parameter_adjust_pending(&self) -> bool {
        self.parameter_adjust_pending.is_some()
    }

    pub fn is_leg_toggle_in_progress(&self) -> bool {
        self.primary_busy || self.secondary_busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> StateController {
        StateController::new(BodyGeometry::default(), ParameterFile::default())
    }

    fn drive_to_running(controller: &mut StateController) {
        let mut inputs = ControlInputs {
            new_system_state: Some(SystemState::Running),
            ..Default::default()
        };
        for _ in 0..20_000 {
            controller.tick(&mut inputs).unwrap();
            inputs.new_system_state = None;
            if controller.system_state == SystemState::Running {
                break;
            }
        }
        assert_eq!(controller.system_state, SystemState::Running);
    }

    #[test]
    fn cold_start_passes_through_ready_before_running() {
        let mut controller = controller();
        let mut inputs = ControlInputs {
            new_system_state: Some(SystemState::Running),
            ..Default::default()
        };
        let mut saw_ready = false;
        for _ in 0..20_000 {
            controller.tick(&mut inputs).unwrap();
            inputs.new_system_state = None;
            if controller.system_state == SystemState::Ready {
                saw_ready = true;
            }
            if controller.system_state == SystemState::Running {
                break;
            }
        }
        assert!(saw_ready, "cold start must land on Ready before Running so startUpSequence runs");
        assert_eq!(controller.system_state, SystemState::Running);
    }

    #[test]
    fn cold_start_packed_reaches_running() {
        let mut controller = controller();
        drive_to_running(&mut controller);
        let mut zero_inputs = ControlInputs::default();
        controller.tick(&mut zero_inputs).unwrap();
        for leg_id in LegId::ALL {
            let leg = controller.model.legs.get(leg_id);
            assert!((leg.local_tip_position.z - RELAXED.get(leg_id).z).abs() < 0.05);
        }
    }

    #[test]
    fn undefined_transition_from_running_to_unknown_is_fatal() {
        let mut controller = controller();
        drive_to_running(&mut controller);
        let mut inputs = ControlInputs {
            new_system_state: Some(SystemState::Unknown),
            ..Default::default()
        };
        let result = controller.tick(&mut inputs);
        assert!(result.is_err());
    }

    #[test]
    fn gait_change_while_walking_stops_then_loads_wave() {
        let mut controller = controller();
        drive_to_running(&mut controller);
        let mut inputs = ControlInputs {
            desired_linear_velocity: Vector2::new(0.1, 0.0),
            ..Default::default()
        };
        for _ in 0..20 {
            controller.tick(&mut inputs).unwrap();
        }
        inputs.gait_selection = Some(GaitSelection::Wave);
        for _ in 0..2000 {
            controller.tick(&mut inputs).unwrap();
            if controller.walker.gait.name == "wave_gait" {
                break;
            }
        }
        assert_eq!(controller.walker.gait.name, "wave_gait");
        assert!(!controller.gait_change_pending());
    }

    #[test]
    fn manual_leg_takeover_respects_cap() {
        let mut controller = controller();
        drive_to_running(&mut controller);
        let mut inputs = ControlInputs {
            primary_leg_selection: Some(LegId::LeftFront),
            primary_leg_toggle: true,
            ..Default::default()
        };
        for _ in 0..2000 {
            controller.tick(&mut inputs).unwrap();
            inputs.primary_leg_toggle = false;
            if controller.manual_leg_count() == 1 {
                break;
            }
        }
        assert_eq!(controller.manual_leg_count(), 1);
        assert_eq!(
            controller.model.legs.get(LegId::LeftFront).leg_state,
            LegState::Manual
        );
    }

    #[test]
    fn parameter_adjustment_zero_never_changes_value() {
        let mut controller = controller();
        drive_to_running(&mut controller);
        let before = controller.parameters.step_frequency.current_value;
        let mut inputs = ControlInputs {
            parameter_selection: Some(ParameterSelection::StepFrequency),
            parameter_adjustment: 0,
            ..Default::default()
        };
        controller.tick(&mut inputs).unwrap();
        assert_eq!(controller.parameters.step_frequency.current_value, before);
    }

    #[test]
    fn two_consecutive_stopped_ticks_produce_identical_targets() {
        let mut controller = controller();
        drive_to_running(&mut controller);
        let mut inputs = ControlInputs::default();
        controller.tick(&mut inputs).unwrap();
        let first = LegId::ALL.map(|leg_id| controller.model.legs.get(leg_id).desired_tip_position);
        controller.tick(&mut inputs).unwrap();
        let second = LegId::ALL.map(|leg_id| controller.model.legs.get(leg_id).desired_tip_position);
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a - b).magnitude() < 1e-6);
        }
    }
}
