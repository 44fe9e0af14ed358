//! Kinematic tree: legs, joints, links, current/desired tip positions,
//! and the IK/FK that maps between them.

pub mod hexapod_types;
pub mod ik;
pub mod joint_targets;
pub mod leg_positions;
pub mod stance_poses;

use crate::body_config::BodyGeometry;
use crate::error::ControllerResult;
use crate::model::hexapod_types::{HexapodTypes, LegId};
use crate::model::joint_targets::LegJointTargets;
use crate::model::leg_positions::LegPositions;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

/// Per-leg operating mode. Transitions only through the adjacent pairs
/// `Walking<->WalkingToManual<->Manual` and
/// `Manual<->ManualToWalking<->Walking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegState {
    Walking,
    WalkingToManual,
    Manual,
    ManualToWalking,
}

impl LegState {
    pub fn is_manual_associated(self) -> bool {
        !matches!(self, LegState::Walking)
    }
}

/// Per-leg walk-phase sub-state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Stance,
    Swing,
    ForceStance,
    ForceStop,
}

#[derive(Debug, Clone)]
pub struct LegStepper {
    pub step_state: StepState,
    pub swing_progress: f32,
    pub stance_progress: f32,
    pub current_tip_position: Point3<f32>,
    pub default_tip_position: Point3<f32>,
    pub stride_vector: Vector3<f32>,
    pub phase_offset: f32,
    pub phase: f32,
}

impl LegStepper {
    pub fn new(default_tip_position: Point3<f32>, phase_offset: f32) -> Self {
        LegStepper {
            step_state: StepState::Stance,
            swing_progress: 0.0,
            stance_progress: 0.0,
            current_tip_position: default_tip_position,
            default_tip_position,
            stride_vector: Vector3::zeros(),
            phase_offset,
            phase: phase_offset,
        }
    }
}

/// Per-leg pose sub-state: the handoff point between `PoseController`
/// and the IK stage.
#[derive(Debug, Clone)]
pub struct LegPoser {
    pub current_tip_position: Point3<f32>,
    pub target_tip_position: Point3<f32>,
    pub transition_progress: f32,
}

impl LegPoser {
    pub fn new(default_tip_position: Point3<f32>) -> Self {
        LegPoser {
            current_tip_position: default_tip_position,
            target_tip_position: default_tip_position,
            transition_progress: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub name: &'static str,
    pub length: f32,
}

/// A single revolute joint. Invariant: `min_position <= current_position
/// <= max_position` is actuator-enforced; this type enforces it on the
/// commanded side via `apply_motion`.
#[derive(Debug, Clone, Copy)]
pub struct Joint {
    pub name: &'static str,
    pub current_position: f32,
    pub current_velocity: f32,
    pub current_effort: f32,
    pub desired_position: f32,
    pub prev_desired_position: f32,
    pub desired_velocity: f32,
    pub position_offset: f32,
    pub packed_position: f32,
    pub unpacked_position: f32,
    pub min_position: f32,
    pub max_position: f32,
    pub max_angular_speed: f32,
}

impl Joint {
    pub fn new(
        name: &'static str,
        packed_position: f32,
        unpacked_position: f32,
        min_position: f32,
        max_position: f32,
        max_angular_speed: f32,
    ) -> Self {
        Joint {
            name,
            current_position: packed_position,
            current_velocity: 0.0,
            current_effort: 0.0,
            desired_position: packed_position,
            prev_desired_position: packed_position,
            desired_velocity: 0.0,
            position_offset: 0.0,
            packed_position,
            unpacked_position,
            min_position,
            max_position,
            max_angular_speed,
        }
    }

    /// Clamp `target` into `[min_position, max_position]`, then clamp
    /// the implied `desired_velocity` to `max_angular_speed` by backing
    /// off `desired_position` rather than exceeding the speed bound.
    pub fn apply_motion(&mut self, target: f32, time_delta: f32) {
        let clamped_target = target.clamp(self.min_position, self.max_position);
        let mut desired_velocity = (clamped_target - self.prev_desired_position) / time_delta;
        let mut desired_position = clamped_target;
        if desired_velocity.abs() > self.max_angular_speed {
            let sign = desired_velocity.signum();
            desired_velocity = sign * self.max_angular_speed;
            desired_position = self.prev_desired_position + desired_velocity * time_delta;
        }
        self.desired_position = desired_position;
        self.desired_velocity = desired_velocity;
        self.prev_desired_position = desired_position;
    }

    pub fn is_near_packed(&self, tolerance: f32) -> bool {
        (self.current_position - self.packed_position).abs() <= tolerance
    }
}

pub struct Leg {
    pub id: LegId,
    pub joints: [Joint; 3],
    pub links: [Link; 3],
    pub leg_stepper: LegStepper,
    pub leg_poser: LegPoser,
    pub leg_state: LegState,
    pub local_tip_position: Point3<f32>,
    pub desired_tip_position: Point3<f32>,
    pub delta_z: f32,
    pub tip_force: f32,
    pub virtual_stiffness: f32,
}

impl Clone for Leg {
    fn clone(&self) -> Self {
        Leg {
            id: self.id,
            joints: self.joints,
            links: self.links,
            leg_stepper: self.leg_stepper.clone(),
            leg_poser: self.leg_poser.clone(),
            leg_state: self.leg_state,
            local_tip_position: self.local_tip_position,
            desired_tip_position: self.desired_tip_position,
            delta_z: self.delta_z,
            tip_force: self.tip_force,
            virtual_stiffness: self.virtual_stiffness,
        }
    }
}

impl Leg {
    pub fn new(
        id: LegId,
        body_config: &BodyGeometry,
        default_tip_position: Point3<f32>,
        virtual_stiffness: f32,
    ) -> Self {
        let leg_config = body_config.legs.get(id);
        let joints = [
            Joint::new(
                "coxa",
                leg_config.packed_position[0],
                leg_config.unpacked_position[0],
                leg_config.min_position,
                leg_config.max_position,
                leg_config.max_angular_speed,
            ),
            Joint::new(
                "femur",
                leg_config.packed_position[1],
                leg_config.unpacked_position[1],
                leg_config.min_position,
                leg_config.max_position,
                leg_config.max_angular_speed,
            ),
            Joint::new(
                "tibia",
                leg_config.packed_position[2],
                leg_config.unpacked_position[2],
                leg_config.min_position,
                leg_config.max_position,
                leg_config.max_angular_speed,
            ),
        ];
        let links = [
            Link {
                name: "coxa",
                length: body_config.coxa_length,
            },
            Link {
                name: "femur",
                length: body_config.femur_length,
            },
            Link {
                name: "tibia",
                length: body_config.tibia_length,
            },
        ];
        Leg {
            id,
            joints,
            links,
            leg_stepper: LegStepper::new(default_tip_position, 0.0),
            leg_poser: LegPoser::new(default_tip_position),
            leg_state: LegState::Walking,
            local_tip_position: default_tip_position,
            desired_tip_position: default_tip_position,
            delta_z: 0.0,
            tip_force: 0.0,
            virtual_stiffness: 1.0,
        }
    }

    /// Maps `desired_tip_position` to joint targets via IK, clamps each
    /// joint's motion, and returns the tip position actually achieved
    /// (after clamping) via FK (§4.5 `applyIK`).
    pub fn apply_ik(&mut self, body_config: &BodyGeometry, time_delta: f32) -> ControllerResult<Point3<f32>> {
        let leg_config = body_config.legs.get(self.id);
        let targets = ik::calculate_ik_for_leg(&self.desired_tip_position, body_config, leg_config)
            .map_err(|reason| crate::error::ControllerError::IkFailure {
                leg: self.id.name(),
                reason,
            })?;
        self.joints[0].apply_motion(targets.coxa(), time_delta);
        self.joints[1].apply_motion(targets.femur(), time_delta);
        self.joints[2].apply_motion(targets.tibia(), time_delta);
        let achieved = ik::calculate_fk_for_leg(
            &LegJointTargets::new(
                self.joints[0].desired_position,
                self.joints[1].desired_position,
                self.joints[2].desired_position,
            ),
            body_config,
            leg_config,
        );
        self.local_tip_position = achieved;
        Ok(achieved)
    }
}

/// Body frame relative to the stance frame (§3 `CurrentPose`).
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl Pose {
    pub fn isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.isometry().transform_point(point)
    }

    pub fn inverse_transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.isometry().inverse_transform_point(point)
    }
}

/// Owns every leg, keyed by stable `LegId`, plus the current body pose.
pub struct Model {
    pub legs: HexapodTypes<Leg>,
    pub current_pose: Pose,
}

impl Model {
    pub fn new(body_config: &BodyGeometry, default_stance: &LegPositions) -> Self {
        let legs = HexapodTypes::from_fn(|leg_id| {
            Leg::new(leg_id, body_config, *default_stance.get(leg_id), 1.0)
        });
        Model {
            legs,
            current_pose: Pose::default(),
        }
    }

    pub fn manual_leg_count(&self) -> usize {
        self.legs
            .as_legs()
            .iter()
            .filter(|leg| leg.leg_state.is_manual_associated())
            .count()
    }

    pub fn all_joints_near_packed(&self, tolerance: f32) -> bool {
        self.legs
            .as_legs()
            .iter()
            .all(|leg| leg.joints.iter().all(|joint| joint.is_near_packed(tolerance)))
    }

    pub fn set_gait_phase_offsets(&mut self, offsets: [f32; 6]) {
        for leg_id in LegId::ALL {
            self.legs.get_mut(leg_id).leg_stepper.phase_offset = offsets[leg_id.index()];
        }
    }

    /// Runs `Leg::apply_ik` for every leg and returns the achieved tip
    /// positions, preserving the §4.1.1 "for each leg: ... Leg.applyIK"
    /// step of the unconditional pipeline.
    pub fn apply_ik(
        &mut self,
        body_config: &BodyGeometry,
        time_delta: f32,
    ) -> ControllerResult<LegPositions> {
        let mut achieved = [Point3::origin(); 6];
        for leg_id in LegId::ALL {
            achieved[leg_id.index()] = self.legs.get_mut(leg_id).apply_ik(body_config, time_delta)?;
        }
        Ok(LegPositions::from_fn(|leg_id| achieved[leg_id.index()]))
    }

    /// Current per-joint targets as last written by `apply_ik`, in the
    /// shape `joint_targets::commands_for_body` flattens for the
    /// actuator adapter.
    pub fn joint_targets(&self) -> joint_targets::BodyJointTargets {
        joint_targets::BodyJointTargets::from_fn(|leg_id| {
            let leg = self.legs.get(leg_id);
            joint_targets::LegJointTargets::new(
                leg.joints[0].desired_position,
                leg.joints[1].desired_position,
                leg.joints[2].desired_position,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body_config::BodyGeometry;

    #[test]
    fn joint_apply_motion_clamps_to_limits() {
        let mut joint = Joint::new("coxa", 0.0, 1.0, -1.0, 1.0, 100.0);
        joint.apply_motion(5.0, 0.01);
        assert_eq!(joint.desired_position, 1.0);
    }

    #[test]
    fn joint_apply_motion_backs_off_position_when_speed_exceeded() {
        let mut joint = Joint::new("coxa", 0.0, 1.0, -10.0, 10.0, 1.0);
        joint.apply_motion(5.0, 0.1);
        assert!((joint.desired_velocity.abs() - 1.0).abs() < 1e-5);
        assert!(joint.desired_position < 5.0);
    }

    #[test]
    fn model_new_builds_all_six_legs_near_default_stance() {
        let body_config = BodyGeometry::default();
        let model = Model::new(&body_config, &stance_poses::RELAXED);
        assert_eq!(model.manual_leg_count(), 0);
        assert_eq!(
            model.legs.left_front().local_tip_position,
            *stance_poses::RELAXED.left_front()
        );
    }

    #[test]
    fn model_all_joints_near_packed_true_at_construction() {
        let body_config = BodyGeometry::default();
        let model = Model::new(&body_config, &stance_poses::RELAXED);
        assert!(model.all_joints_near_packed(0.01));
    }
}
