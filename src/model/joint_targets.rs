use crate::body_config::BodyConfig;
use crate::model::hexapod_types::HexapodTypes;
use serde::{Deserialize, Serialize};

/// Target joint angles for one leg (coxa, femur, tibia), in radians,
/// as produced by `calculate_ik` and consumed by the actuator adapter.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct LegJointTargets {
    pub(crate) coxa: f32,
    pub(crate) femur: f32,
    pub(crate) tibia: f32,
}

impl LegJointTargets {
    pub fn new(coxa: f32, femur: f32, tibia: f32) -> LegJointTargets {
        LegJointTargets { coxa, femur, tibia }
    }

    pub fn coxa(&self) -> f32 {
        self.coxa
    }

    pub fn femur(&self) -> f32 {
        self.femur
    }

    pub fn tibia(&self) -> f32 {
        self.tibia
    }
}

pub type BodyJointTargets = HexapodTypes<LegJointTargets>;

/// One flattened `(joint_id, desired_position)` pair per actuator, the
/// shape the actuator bus adapter (§6 "Actuator output surface")
/// ultimately receives.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ActuatorCommand {
    pub joint_id: u8,
    pub desired_position: f32,
}

fn commands_for_leg(
    leg_config: &crate::body_config::LegConfig,
    targets: &LegJointTargets,
) -> [ActuatorCommand; 3] {
    [
        ActuatorCommand {
            joint_id: leg_config.coxa_id,
            desired_position: targets.coxa,
        },
        ActuatorCommand {
            joint_id: leg_config.femur_id,
            desired_position: targets.femur,
        },
        ActuatorCommand {
            joint_id: leg_config.tibia_id,
            desired_position: targets.tibia,
        },
    ]
}

pub fn commands_for_body(
    config: &BodyConfig,
    targets: &BodyJointTargets,
) -> Vec<ActuatorCommand> {
    let mut commands = Vec::with_capacity(18);
    for (leg, (leg_config, leg_targets)) in config
        .as_legs()
        .into_iter()
        .zip(targets.as_legs().into_iter())
        .enumerate()
    {
        let _ = leg;
        commands.extend_from_slice(&commands_for_leg(leg_config, leg_targets));
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body_config::BodyGeometry;

    #[test]
    fn commands_for_body_produces_eighteen_entries() {
        let geometry = BodyGeometry::default();
        let targets = BodyJointTargets::new(
            LegJointTargets::new(0.0, 0.0, 0.0),
            LegJointTargets::new(0.1, 0.1, 0.1),
            LegJointTargets::new(0.2, 0.2, 0.2),
            LegJointTargets::new(0.3, 0.3, 0.3),
            LegJointTargets::new(0.4, 0.4, 0.4),
            LegJointTargets::new(0.5, 0.5, 0.5),
        );
        let commands = commands_for_body(&geometry.legs, &targets);
        assert_eq!(commands.len(), 18);
        assert_eq!(commands[0].joint_id, geometry.legs.left_front().coxa_id);
    }
}
