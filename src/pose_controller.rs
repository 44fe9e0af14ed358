//! Body-pose compensation: additive translation/rotation on top of the
//! walker's nominal stance, plus the multi-tick choreographies that
//! move the robot between packed, grounded, and walking stances.
//!
//! Each choreography is a `progress`-returner (§9 "Choreography as
//! progress returners") rather than a coroutine: the caller polls it
//! once per tick until it reports `1.0`, the language-neutral
//! replacement for blocking waits (§5 "Suspension points: none").

use crate::body_config::BodyGeometry;
use crate::model::hexapod_types::{LegFlags, LegId};
use crate::model::leg_positions::{LegPositions, MoveTowards};
use crate::model::stance_poses::{GROUNDED, RELAXED, RELAXED_WIDE};
use crate::model::{Model, Pose};
use crate::parameters::{ParameterFile, PidGains};
use nalgebra::{UnitQuaternion, Vector3};

/// How a pose axis resets to zero (§4.3 "Pose reset modes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseResetMode {
    NoReset,
    ZAndYawReset,
    XAndYReset,
    PitchAndRollReset,
    AllReset,
    ImmediateAllReset,
}

/// User manual-compensation gating (§4.3 "manual compensation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosingMode {
    NoPosing,
    XY,
    PitchRoll,
    ZYaw,
}

impl Default for PosingMode {
    fn default() -> Self {
        PosingMode::NoPosing
    }
}

impl Default for PoseResetMode {
    fn default() -> Self {
        PoseResetMode::NoReset
    }
}

/// A single absement/position/velocity PID track, run once per tick on
/// a scalar error signal (§4.3 "three terms: absement ... position ...
/// velocity").
#[derive(Debug, Clone, Copy, Default)]
struct PidTrack {
    integral: f32,
    prev_error: f32,
}

impl PidTrack {
    fn step(&mut self, error: f32, gains: &PidGains, time_delta: f32) -> f32 {
        self.integral += error * time_delta;
        let derivative = (error - self.prev_error) / time_delta;
        self.prev_error = error;
        gains.absement * self.integral + gains.position * error + gains.velocity * derivative
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}

/// Body pose compensation and lifecycle choreography driver.
pub struct PoseController {
    pub auto_compensation: Pose,
    pub imu_compensation: Pose,
    pub manual_compensation: Pose,
    pub inclination_compensation: Pose,
    pub impedance_height: f32,
    pub pose_reset_mode: PoseResetMode,

    roll_pid: PidTrack,
    pitch_pid: PidTrack,
    translation_pid: [PidTrack; 2],
    prev_output_translation: Vector3<f32>,
    prev_output_rotation: UnitQuaternion<f32>,

    choreography: Option<Choreography>,
}

/// The progress state of a running multi-tick choreography. Kept
/// separate from `PoseController`'s steady-state fields so a new
/// choreography can't be started while one is already in flight.
enum Choreography {
    DirectStartup {
        start: LegPositions,
        target: LegPositions,
        elapsed: f32,
        duration: f32,
    },
    UnpackLegs {
        start_joints: [[f32; 3]; 6],
        duration: f32,
        elapsed: f32,
    },
    PackLegs {
        start_joints: [[f32; 3]; 6],
        duration: f32,
        elapsed: f32,
    },
    StartUp {
        stage: StartShutdownStage,
        start: LegPositions,
    },
    ShutDown {
        stage: StartShutdownStage,
        start: LegPositions,
    },
    StepToNewStance {
        start: LegPositions,
        target: LegPositions,
        elapsed: f32,
        duration: f32,
    },
    LegManipulation {
        start: LegPositions,
        target: LegPositions,
        elapsed: f32,
        duration: f32,
    },
}

/// Startup/shutdown keep 3+ legs grounded at all times by stepping the
/// tripods through the grounded intermediate stance before reaching the
/// final target, one tripod at a time (§4.3
/// startUpSequence/shutDownSequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartShutdownStage {
    ToGrounded,
    FirstTripod,
    SecondTripod,
    Done,
}

impl Default for PoseController {
    fn default() -> Self {
        PoseController {
            auto_compensation: Pose::default(),
            imu_compensation: Pose::default(),
            manual_compensation: Pose::default(),
            inclination_compensation: Pose::default(),
            impedance_height: 0.0,
            pose_reset_mode: PoseResetMode::NoReset,
            roll_pid: PidTrack::default(),
            pitch_pid: PidTrack::default(),
            translation_pid: [PidTrack::default(); 2],
            prev_output_translation: Vector3::zeros(),
            prev_output_rotation: UnitQuaternion::identity(),
            choreography: None,
        }
    }
}

impl PoseController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.choreography.is_some()
    }

    /// Combines the active compensation sources additively, caps the
    /// result by the configured translation/rotation magnitude bounds,
    /// then rate-limits the combined output by
    /// `max_translation_velocity`/`max_rotation_velocity` (§4.3 "All
    /// outputs are clamped").
    pub fn current_pose(&mut self, parameters: &ParameterFile) -> Pose {
        let translation = self.auto_compensation.translation
            + self.imu_compensation.translation
            + self.manual_compensation.translation
            + self.inclination_compensation.translation;
        let translation = clamp_vector_magnitude(translation, parameters.max_translation);
        let translation = clamp_rate_vector(
            self.prev_output_translation,
            translation,
            parameters.max_translation_velocity,
            parameters.time_delta,
        );
        self.prev_output_translation = translation;

        let rotation = self.auto_compensation.rotation
            * self.imu_compensation.rotation
            * self.manual_compensation.rotation
            * self.inclination_compensation.rotation;
        let rotation = clamp_rotation_angle(rotation, parameters.max_rotation);
        let rotation = clamp_rate_rotation(
            self.prev_output_rotation,
            rotation,
            parameters.max_rotation_velocity,
            parameters.time_delta,
        );
        self.prev_output_rotation = rotation;

        Pose {
            translation: translation + Vector3::new(0.0, 0.0, self.impedance_height),
            rotation,
        }
    }

    /// §4.1 step 1: recompute `Model.current_pose` from every
    /// compensation source, folding in the impedance-driven height.
    ///
    /// `RELAXED` and every walker/stepper default tip position are
    /// already expressed at `z = -body_clearance` in the body frame, so
    /// the body pose itself stays at identity translation at rest —
    /// adding `body_clearance` again here would double-count standing
    /// height and lift the feet off the ground (`body_clearance` still
    /// legitimately scales swing height via `WalkController::update_walk`).
    pub fn update_current_pose(&mut self, model: &mut Model, parameters: &ParameterFile) {
        self.impedance_height = 0.0;
        model.current_pose = self.current_pose(parameters);
    }

    /// IMU compensation: PID on `(roll, pitch)` error against level,
    /// driven by the IMU's measured orientation (§4.3 "PID on (roll,
    /// pitch) using IMU orientation vs level").
    pub fn update_imu_compensation(
        &mut self,
        measured_orientation: UnitQuaternion<f32>,
        parameters: &ParameterFile,
    ) {
        if !parameters.imu_compensation {
            self.imu_compensation = Pose::default();
            return;
        }
        let (roll, pitch, _yaw) = measured_orientation.euler_angles();
        let roll_correction = self
            .roll_pid
            .step(-roll, &parameters.rotation_pid_gains, parameters.time_delta);
        let pitch_correction = self
            .pitch_pid
            .step(-pitch, &parameters.rotation_pid_gains, parameters.time_delta);
        self.imu_compensation.rotation =
            UnitQuaternion::from_euler_angles(roll_correction, pitch_correction, 0.0);
    }

    /// Auto-compensation: phase-locked sway that leans the body toward
    /// the current support tripod, one cycle per gait period.
    pub fn update_auto_compensation(
        &mut self,
        walk_phase_fraction: f32,
        parameters: &ParameterFile,
    ) {
        if !parameters.auto_compensation {
            self.auto_compensation = Pose::default();
            return;
        }
        let sway = (walk_phase_fraction * std::f32::consts::TAU).sin() * 0.01;
        self.auto_compensation.translation = Vector3::new(0.0, sway, 0.0);
    }

    /// Inclination compensation: tracks the ground's measured tilt
    /// directly, letting the body follow the slope rather than leveling
    /// against it — distinct from `imu_compensation`'s closed-loop PID,
    /// which drives roll/pitch error toward zero (§4.3 "inclination
    /// compensation").
    pub fn update_inclination_compensation(
        &mut self,
        measured_orientation: UnitQuaternion<f32>,
        parameters: &ParameterFile,
    ) {
        if !parameters.inclination_compensation {
            self.inclination_compensation = Pose::default();
            return;
        }
        let (roll, pitch, _yaw) = measured_orientation.euler_angles();
        self.inclination_compensation.rotation = UnitQuaternion::from_euler_angles(roll, pitch, 0.0);
    }

    /// Manual compensation: direct user pose input, gated by the active
    /// `PosingMode` (§4.3 "manual compensation (user input, mode-gated:
    /// NO_POSING | X_Y | PITCH_ROLL | Z_YAW)"). Under `XY`, the commanded
    /// translation runs through the same absement/position/velocity PID
    /// track the rotation axes use, rather than being applied raw (§4.3
    /// "analogous terms for translation").
    pub fn update_manual_compensation(
        &mut self,
        mode: PosingMode,
        desired_translation: Vector3<f32>,
        desired_rotation: Vector3<f32>,
        parameters: &ParameterFile,
    ) {
        if !parameters.manual_compensation {
            self.manual_compensation = Pose::default();
            self.translation_pid[0].reset();
            self.translation_pid[1].reset();
            return;
        }
        let translation = if matches!(mode, PosingMode::XY) {
            let x = self.translation_pid[0].step(
                desired_translation.x,
                &parameters.translation_pid_gains,
                parameters.time_delta,
            );
            let y = self.translation_pid[1].step(
                desired_translation.y,
                &parameters.translation_pid_gains,
                parameters.time_delta,
            );
            Vector3::new(x, y, 0.0)
        } else {
            self.translation_pid[0].reset();
            self.translation_pid[1].reset();
            if matches!(mode, PosingMode::ZYaw) {
                Vector3::new(0.0, 0.0, desired_translation.z)
            } else {
                Vector3::zeros()
            }
        };
        let rotation = match mode {
            PosingMode::PitchRoll => {
                UnitQuaternion::from_euler_angles(desired_rotation.x, desired_rotation.y, 0.0)
            }
            PosingMode::ZYaw => UnitQuaternion::from_euler_angles(0.0, 0.0, desired_rotation.z),
            _ => UnitQuaternion::identity(),
        };
        self.manual_compensation = Pose {
            translation,
            rotation,
        };
    }

    /// Applies `self.pose_reset_mode`, driving the selected axes of
    /// `manual_compensation` toward zero at `parameters.pose_reset_velocity`,
    /// or snapping to zero immediately under `ImmediateAllReset`.
    pub fn apply_pose_reset(&mut self, parameters: &ParameterFile) {
        match self.pose_reset_mode {
            PoseResetMode::NoReset => {}
            PoseResetMode::ImmediateAllReset => {
                self.manual_compensation = Pose::default();
            }
            PoseResetMode::AllReset => {
                self.step_translation_to_zero(parameters.pose_reset_velocity * parameters.time_delta);
                self.step_rotation_to_zero(parameters.pose_reset_velocity * parameters.time_delta);
            }
            PoseResetMode::ZAndYawReset => {
                let max_step = parameters.pose_reset_velocity * parameters.time_delta;
                self.manual_compensation.translation.z =
                    step_scalar_to_zero(self.manual_compensation.translation.z, max_step);
                let (roll, pitch, yaw) = self.manual_compensation.rotation.euler_angles();
                let yaw = step_scalar_to_zero(yaw, max_step);
                self.manual_compensation.rotation = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
            }
            PoseResetMode::XAndYReset => {
                let max_step = parameters.pose_reset_velocity * parameters.time_delta;
                self.manual_compensation.translation.x =
                    step_scalar_to_zero(self.manual_compensation.translation.x, max_step);
                self.manual_compensation.translation.y =
                    step_scalar_to_zero(self.manual_compensation.translation.y, max_step);
            }
            PoseResetMode::PitchAndRollReset => {
                let max_step = parameters.pose_reset_velocity * parameters.time_delta;
                let (roll, pitch, yaw) = self.manual_compensation.rotation.euler_angles();
                let roll = step_scalar_to_zero(roll, max_step);
                let pitch = step_scalar_to_zero(pitch, max_step);
                self.manual_compensation.rotation = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
            }
        }
    }

    fn step_translation_to_zero(&mut self, max_step: f32) {
        self.manual_compensation.translation = step_vector_to_zero(self.manual_compensation.translation, max_step);
    }

    fn step_rotation_to_zero(&mut self, max_step: f32) {
        let (roll, pitch, yaw) = self.manual_compensation.rotation.euler_angles();
        self.manual_compensation.rotation = UnitQuaternion::from_euler_angles(
            step_scalar_to_zero(roll, max_step),
            step_scalar_to_zero(pitch, max_step),
            step_scalar_to_zero(yaw, max_step),
        );
    }

    /// §4.1.1 "PoseController.updateStance()": copy each leg's posed
    /// tip position — the walker's stepper output transformed by the
    /// current body pose — into its `LegPoser`.
    pub fn update_stance(&mut self, model: &mut Model) {
        let pose = model.current_pose;
        for leg_id in LegId::ALL {
            let leg = model.legs.get_mut(leg_id);
            leg.leg_poser.current_tip_position = pose.transform_point(&leg.leg_stepper.current_tip_position);
        }
    }

    /// §4.3 `directStartup`: interpolate every leg from its current tip
    /// position straight to the walking default stance, no intermediate
    /// grounded stage. Used only for the startup-sequence-disabled path
    /// (OFF -> RUNNING directly).
    pub fn direct_startup(&mut self, model: &mut Model, duration: f32, time_delta: f32) -> f32 {
        if self.choreography.is_none() {
            let start = current_tip_positions(model);
            self.choreography = Some(Choreography::DirectStartup {
                start,
                target: *RELAXED,
                elapsed: 0.0,
                duration: duration.max(time_delta),
            });
        }
        let Some(Choreography::DirectStartup {
            start,
            target,
            elapsed,
            duration,
        }) = &mut self.choreography
        else {
            unreachable!()
        };
        *elapsed += time_delta;
        let progress = (*elapsed / *duration).clamp(0.0, 1.0);
        let current = lerp_leg_positions(start, target, progress);
        write_tip_positions(model, &current);
        if progress >= 1.0 {
            self.choreography = None;
        }
        progress
    }

    /// §4.3 `unpackLegs`: joint-space move from each joint's current
    /// position to its `unpacked_position` over `duration`.
    pub fn unpack_legs(&mut self, model: &mut Model, duration: f32, time_delta: f32) -> f32 {
        self.joint_space_move(model, duration, time_delta, true)
    }

    /// §4.3 `packLegs`: joint-space move to each joint's
    /// `packed_position` over `duration`.
    pub fn pack_legs(&mut self, model: &mut Model, duration: f32, time_delta: f32) -> f32 {
        self.joint_space_move(model, duration, time_delta, false)
    }

    fn joint_space_move(&mut self, model: &mut Model, duration: f32, time_delta: f32, unpack: bool) -> f32 {
        if self.choreography.is_none() {
            let mut start_joints = [[0.0_f32; 3]; 6];
            for leg_id in LegId::ALL {
                let leg = model.legs.get(leg_id);
                for (i, joint) in leg.joints.iter().enumerate() {
                    start_joints[leg_id.index()][i] = joint.current_position;
                }
            }
            self.choreography = Some(if unpack {
                Choreography::UnpackLegs {
                    start_joints,
                    duration: duration.max(time_delta),
                    elapsed: 0.0,
                }
            } else {
                Choreography::PackLegs {
                    start_joints,
                    duration: duration.max(time_delta),
                    elapsed: 0.0,
                }
            });
        }
        let (start_joints, elapsed, duration) = match &mut self.choreography {
            Some(Choreography::UnpackLegs {
                start_joints,
                elapsed,
                duration,
            }) => (*start_joints, elapsed, *duration),
            Some(Choreography::PackLegs {
                start_joints,
                elapsed,
                duration,
            }) => (*start_joints, elapsed, *duration),
            _ => unreachable!(),
        };
        *elapsed += time_delta;
        let progress = (*elapsed / duration).clamp(0.0, 1.0);
        for leg_id in LegId::ALL {
            let leg = model.legs.get_mut(leg_id);
            for (i, joint) in leg.joints.iter_mut().enumerate() {
                let target = if unpack {
                    joint.unpacked_position
                } else {
                    joint.packed_position
                };
                let desired = start_joints[leg_id.index()][i] + (target - start_joints[leg_id.index()][i]) * progress;
                joint.desired_position = desired;
                joint.current_position = desired;
                joint.prev_desired_position = desired;
            }
        }
        if progress >= 1.0 {
            self.choreography = None;
        }
        progress
    }

    /// §4.3 `startUpSequence`: raises the body from the grounded stance
    /// to the walking stance by stepping one tripod at a time through
    /// the grounded intermediate, keeping 3+ legs grounded throughout.
    pub fn start_up_sequence(&mut self, model: &mut Model, body_config: &BodyGeometry, time_delta: f32) -> f32 {
        if self.choreography.is_none() {
            self.choreography = Some(Choreography::StartUp {
                stage: StartShutdownStage::ToGrounded,
                start: current_tip_positions(model),
            });
        }
        self.run_startup_shutdown(model, body_config, time_delta, true)
    }

    /// §4.3 `shutDownSequence`: the inverse of `start_up_sequence`,
    /// lowering the body back to the grounded stance.
    pub fn shut_down_sequence(&mut self, model: &mut Model, body_config: &BodyGeometry, time_delta: f32) -> f32 {
        if self.choreography.is_none() {
            self.choreography = Some(Choreography::ShutDown {
                stage: StartShutdownStage::ToGrounded,
                start: current_tip_positions(model),
            });
        }
        self.run_startup_shutdown(model, body_config, time_delta, false)
    }

    fn run_startup_shutdown(&mut self, model: &mut Model, body_config: &BodyGeometry, time_delta: f32, rising: bool) -> f32 {
        let _ = body_config;
        const STEP_SPEED: f32 = 0.2;
        let max_move = STEP_SPEED * time_delta;
        let (stage, start) = match &mut self.choreography {
            Some(Choreography::StartUp { stage, start }) => (stage, *start),
            Some(Choreography::ShutDown { stage, start }) => (stage, *start),
            _ => unreachable!(),
        };
        let _ = start;
        let intermediate = *GROUNDED;
        let target = if rising { *RELAXED } else { intermediate };
        // Move one tripod's legs to `target` while the other tripod is
        // held at its current (already-grounded) position, then swap —
        // never more than one tripod is mid-transition at a time.
        let (first_tripod, second_tripod) = if rising {
            (LegFlags::LRL_TRIPOD, LegFlags::RLR_TRIPOD)
        } else {
            (LegFlags::RLR_TRIPOD, LegFlags::LRL_TRIPOD)
        };
        match stage {
            StartShutdownStage::ToGrounded => {
                let current = current_tip_positions(model);
                let (next, moved) = current.move_towards(&intermediate, &max_move);
                write_tip_positions(model, &next);
                if !moved {
                    *stage = StartShutdownStage::FirstTripod;
                }
            }
            StartShutdownStage::FirstTripod => {
                let current = current_tip_positions(model);
                let tripod_target = current.merge_with(&target, first_tripod);
                let (next, moved) = current.move_towards(&tripod_target, &max_move);
                write_tip_positions(model, &next);
                if !moved {
                    *stage = StartShutdownStage::SecondTripod;
                }
            }
            StartShutdownStage::SecondTripod => {
                let current = current_tip_positions(model);
                let tripod_target = current.merge_with(&target, second_tripod);
                let (next, moved) = current.move_towards(&tripod_target, &max_move);
                write_tip_positions(model, &next);
                if !moved {
                    *stage = StartShutdownStage::Done;
                }
            }
            StartShutdownStage::Done => {}
        }
        let progress = match stage {
            StartShutdownStage::Done => 1.0,
            _ => 0.0,
        };
        if progress >= 1.0 {
            self.choreography = None;
        }
        progress
    }

    /// §4.1.1 action 2: after a parameter change that affects gait
    /// geometry, step every leg into the updated default stance.
    pub fn step_to_new_stance(&mut self, model: &mut Model, target: &LegPositions, time_delta: f32) -> f32 {
        if self.choreography.is_none() {
            self.choreography = Some(Choreography::StepToNewStance {
                start: current_tip_positions(model),
                target: *target,
                elapsed: 0.0,
                duration: 1.0,
            });
        }
        let Some(Choreography::StepToNewStance {
            start,
            target,
            elapsed,
            duration,
        }) = &mut self.choreography
        else {
            unreachable!()
        };
        *elapsed += time_delta;
        let progress = (*elapsed / *duration).clamp(0.0, 1.0);
        let current = lerp_leg_positions(start, target, progress);
        write_tip_positions(model, &current);
        for leg_id in LegId::ALL {
            model.legs.get_mut(leg_id).leg_stepper.default_tip_position = *target.get(leg_id);
        }
        if progress >= 1.0 {
            self.choreography = None;
        }
        progress
    }

    /// §4.1.2 `poseForLegManipulation`: widens the stance (toward
    /// `RELAXED_WIDE`) to keep the center of mass over the remaining
    /// support polygon while `legs` transitions to/from manual.
    pub fn pose_for_leg_manipulation(&mut self, model: &mut Model, legs: LegFlags, duration: f32, time_delta: f32) -> f32 {
        if self.choreography.is_none() {
            let target = current_tip_positions(model).merge_with(&RELAXED_WIDE, legs.complement() & LegFlags::ALL);
            self.choreography = Some(Choreography::LegManipulation {
                start: current_tip_positions(model),
                target,
                elapsed: 0.0,
                duration: duration.max(time_delta),
            });
        }
        let Some(Choreography::LegManipulation {
            start,
            target,
            elapsed,
            duration,
        }) = &mut self.choreography
        else {
            unreachable!()
        };
        *elapsed += time_delta;
        let progress = (*elapsed / *duration).clamp(0.0, 1.0);
        let current = lerp_leg_positions(start, target, progress);
        write_tip_positions(model, &current);
        if progress >= 1.0 {
            self.choreography = None;
        }
        progress
    }

    pub fn abort_choreography(&mut self) {
        self.choreography = None;
    }
}

fn current_tip_positions(model: &Model) -> LegPositions {
    LegPositions::from_fn(|leg_id| model.legs.get(leg_id).leg_stepper.current_tip_position)
}

fn write_tip_positions(model: &mut Model, positions: &LegPositions) {
    for leg_id in LegId::ALL {
        model.legs.get_mut(leg_id).leg_stepper.current_tip_position = *positions.get(leg_id);
    }
}

fn lerp_leg_positions(start: &LegPositions, target: &LegPositions, t: f32) -> LegPositions {
    LegPositions::from_fn(|leg_id| {
        let a = start.get(leg_id);
        let b = target.get(leg_id);
        a + (b - a) * t
    })
}

fn step_scalar_to_zero(value: f32, max_step: f32) -> f32 {
    if value.abs() <= max_step {
        0.0
    } else {
        value - max_step * value.signum()
    }
}

fn step_vector_to_zero(value: Vector3<f32>, max_step: f32) -> Vector3<f32> {
    if value.magnitude() <= max_step {
        Vector3::zeros()
    } else {
        value - value.normalize() * max_step
    }
}

fn clamp_vector_magnitude(value: Vector3<f32>, max_magnitude: f32) -> Vector3<f32> {
    if value.magnitude() > max_magnitude {
        value.normalize() * max_magnitude
    } else {
        value
    }
}

fn clamp_rotation_angle(rotation: UnitQuaternion<f32>, max_angle: f32) -> UnitQuaternion<f32> {
    if let Some((axis, angle)) = rotation.axis_angle() {
        if angle > max_angle {
            return UnitQuaternion::from_axis_angle(&axis, max_angle);
        }
    }
    rotation
}

/// Rate-limits `target` to move at most `max_velocity * time_delta` away
/// from `prev`. A negative `max_velocity` means unlimited, mirroring
/// `walk_controller`'s acceleration-clamp sentinel convention.
fn clamp_rate_vector(prev: Vector3<f32>, target: Vector3<f32>, max_velocity: f32, time_delta: f32) -> Vector3<f32> {
    if max_velocity < 0.0 {
        return target;
    }
    let delta = target - prev;
    let max_step = max_velocity * time_delta;
    if delta.magnitude() > max_step {
        prev + delta.normalize() * max_step
    } else {
        target
    }
}

fn clamp_rate_rotation(
    prev: UnitQuaternion<f32>,
    target: UnitQuaternion<f32>,
    max_velocity: f32,
    time_delta: f32,
) -> UnitQuaternion<f32> {
    if max_velocity < 0.0 {
        return target;
    }
    let max_step = max_velocity * time_delta;
    let delta = prev.inverse() * target;
    if let Some((axis, angle)) = delta.axis_angle() {
        if angle > max_step {
            return prev * UnitQuaternion::from_axis_angle(&axis, max_step);
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body_config::BodyGeometry;
    use approx::assert_relative_eq;

    fn setup() -> (Model, BodyGeometry, ParameterFile) {
        let body_config = BodyGeometry::default();
        let model = Model::new(&body_config, &RELAXED);
        (model, body_config, ParameterFile::default())
    }

    #[test]
    fn update_stance_applies_pose_transform_to_every_leg() {
        let (mut model, _body_config, _parameters) = setup();
        model.current_pose.translation = Vector3::new(0.0, 0.0, 0.05);
        let mut pose_controller = PoseController::new();
        pose_controller.update_stance(&mut model);
        assert_relative_eq!(
            model.legs.left_front().leg_poser.current_tip_position.z,
            model.legs.left_front().leg_stepper.current_tip_position.z + 0.05,
            epsilon = 1e-5
        );
    }

    #[test]
    fn pose_transform_round_trips_through_inverse() {
        let pose = Pose {
            translation: Vector3::new(0.01, -0.02, 0.03),
            rotation: UnitQuaternion::from_euler_angles(0.1, -0.05, 0.2),
        };
        let point = nalgebra::Point3::new(0.1, 0.05, -0.09);
        let transformed = pose.transform_point(&point);
        let back = pose.inverse_transform_point(&transformed);
        assert_relative_eq!(point, back, epsilon = 1e-5);
    }

    #[test]
    fn unpack_legs_reaches_unpacked_position_at_progress_one() {
        let (mut model, _body_config, _parameters) = setup();
        let mut pose_controller = PoseController::new();
        let mut progress = 0.0;
        for _ in 0..1000 {
            progress = pose_controller.unpack_legs(&mut model, 0.2, 0.02);
            if progress >= 1.0 {
                break;
            }
        }
        assert_eq!(progress, 1.0);
        for leg_id in LegId::ALL {
            let leg = model.legs.get(leg_id);
            for joint in &leg.joints {
                assert_relative_eq!(joint.current_position, joint.unpacked_position, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn pack_legs_reaches_packed_position_at_progress_one() {
        let (mut model, _body_config, _parameters) = setup();
        let mut pose_controller = PoseController::new();
        let mut progress = 0.0;
        for _ in 0..1000 {
            progress = pose_controller.pack_legs(&mut model, 0.2, 0.02);
            if progress >= 1.0 {
                break;
            }
        }
        assert_eq!(progress, 1.0);
        for leg_id in LegId::ALL {
            let leg = model.legs.get(leg_id);
            for joint in &leg.joints {
                assert_relative_eq!(joint.current_position, joint.packed_position, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn apply_pose_reset_immediate_zeroes_manual_compensation() {
        let mut pose_controller = PoseController::new();
        pose_controller.manual_compensation.translation = Vector3::new(0.1, 0.1, 0.1);
        pose_controller.pose_reset_mode = PoseResetMode::ImmediateAllReset;
        pose_controller.apply_pose_reset(&ParameterFile::default());
        assert_eq!(pose_controller.manual_compensation.translation, Vector3::zeros());
    }

    #[test]
    fn direct_startup_runs_to_completion_and_reaches_relaxed() {
        let (mut model, _body_config, _parameters) = setup();
        for leg_id in LegId::ALL {
            model.legs.get_mut(leg_id).leg_stepper.current_tip_position = *GROUNDED.get(leg_id);
        }
        let mut pose_controller = PoseController::new();
        let mut progress = 0.0;
        for _ in 0..10_000 {
            progress = pose_controller.direct_startup(&mut model, 1.0, 0.02);
            if progress >= 1.0 {
                break;
            }
        }
        assert_eq!(progress, 1.0);
        for leg_id in LegId::ALL {
            assert_relative_eq!(
                model.legs.get(leg_id).leg_stepper.current_tip_position,
                *RELAXED.get(leg_id),
                epsilon = 1e-3
            );
        }
    }

    #[test]
    fn auto_compensation_is_zero_when_disabled() {
        let mut pose_controller = PoseController::new();
        let mut parameters = ParameterFile::default();
        parameters.auto_compensation = false;
        pose_controller.update_auto_compensation(0.25, &parameters);
        assert_eq!(pose_controller.auto_compensation.translation, Vector3::zeros());
    }

    #[test]
    fn auto_compensation_sways_with_phase_when_enabled() {
        let mut pose_controller = PoseController::new();
        let parameters = ParameterFile::default();
        pose_controller.update_auto_compensation(0.25, &parameters);
        assert!(pose_controller.auto_compensation.translation.y.abs() > 1e-6);
    }

    #[test]
    fn inclination_compensation_mirrors_measured_tilt_when_enabled() {
        let mut pose_controller = PoseController::new();
        let mut parameters = ParameterFile::default();
        parameters.inclination_compensation = true;
        let tilt = UnitQuaternion::from_euler_angles(0.1, -0.05, 0.0);
        pose_controller.update_inclination_compensation(tilt, &parameters);
        let (roll, pitch, _) = pose_controller.inclination_compensation.rotation.euler_angles();
        assert_relative_eq!(roll, 0.1, epsilon = 1e-5);
        assert_relative_eq!(pitch, -0.05, epsilon = 1e-5);
    }

    #[test]
    fn inclination_compensation_stays_zero_when_disabled() {
        let mut pose_controller = PoseController::new();
        let parameters = ParameterFile::default();
        let tilt = UnitQuaternion::from_euler_angles(0.1, -0.05, 0.0);
        pose_controller.update_inclination_compensation(tilt, &parameters);
        assert_relative_eq!(
            pose_controller.inclination_compensation.rotation.angle(),
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn manual_compensation_xy_converges_toward_commanded_translation() {
        let mut pose_controller = PoseController::new();
        let mut parameters = ParameterFile::default();
        parameters.manual_compensation = true;
        let commanded = Vector3::new(0.03, -0.02, 0.0);
        for _ in 0..500 {
            pose_controller.update_manual_compensation(PosingMode::XY, commanded, Vector3::zeros(), &parameters);
        }
        assert_relative_eq!(pose_controller.manual_compensation.translation.x, commanded.x, epsilon = 1e-3);
        assert_relative_eq!(pose_controller.manual_compensation.translation.y, commanded.y, epsilon = 1e-3);
    }

    #[test]
    fn current_pose_rate_limits_a_sudden_translation_jump() {
        let mut pose_controller = PoseController::new();
        let mut parameters = ParameterFile::default();
        parameters.max_translation_velocity = 0.1;
        parameters.time_delta = 0.02;
        pose_controller.manual_compensation.translation = Vector3::new(1.0, 0.0, 0.0);
        let pose = pose_controller.current_pose(&parameters);
        assert!(pose.translation.x < 1.0);
        assert!(pose.translation.x <= parameters.max_translation_velocity * parameters.time_delta + 1e-6);
    }

    #[test]
    fn start_up_sequence_moves_one_tripod_before_the_other() {
        let (mut model, body_config, _parameters) = setup();
        for leg_id in LegId::ALL {
            model.legs.get_mut(leg_id).leg_stepper.current_tip_position = *GROUNDED.get(leg_id);
        }
        let mut pose_controller = PoseController::new();
        // Drive past the (already-grounded) `ToGrounded` stage into the
        // first tripod's transition, but not far enough to finish it.
        for _ in 0..5 {
            pose_controller.start_up_sequence(&mut model, &body_config, 0.02);
        }
        let right_front_untouched = model.legs.get(LegId::RightFront).leg_stepper.current_tip_position;
        assert_relative_eq!(right_front_untouched, *GROUNDED.get(LegId::RightFront), epsilon = 1e-4);
        let left_front_progressed = model.legs.get(LegId::LeftFront).leg_stepper.current_tip_position;
        assert!((left_front_progressed.z - GROUNDED.get(LegId::LeftFront).z).abs() > 1e-4);
    }

    #[test]
    fn start_up_sequence_eventually_reaches_relaxed_with_all_legs_grounded_mid_flight() {
        let (mut model, body_config, _parameters) = setup();
        for leg_id in LegId::ALL {
            model.legs.get_mut(leg_id).leg_stepper.current_tip_position = *GROUNDED.get(leg_id);
        }
        let mut pose_controller = PoseController::new();
        let mut progress = 0.0;
        for _ in 0..10_000 {
            progress = pose_controller.start_up_sequence(&mut model, &body_config, 0.02);
            if progress >= 1.0 {
                break;
            }
        }
        assert_eq!(progress, 1.0);
        for leg_id in LegId::ALL {
            assert_relative_eq!(
                model.legs.get(leg_id).leg_stepper.current_tip_position,
                *RELAXED.get(leg_id),
                epsilon = 1e-3
            );
        }
    }
}
