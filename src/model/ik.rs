//! Analytic inverse/forward kinematics for a 3-DOF (coxa/femur/tibia)
//! leg, solved as an SSS triangle via the law of cosines.

use crate::body_config::{BodyGeometry, LegConfig};
use crate::error::{ControllerError, ControllerResult};
use crate::model::hexapod_types::LegId;
use crate::model::joint_targets::{BodyJointTargets, LegJointTargets};
use crate::model::leg_positions::LegPositions;
use nalgebra::{Point3, Vector3};

pub(crate) fn calculate_ik(
    positions: &LegPositions,
    body_config: &BodyGeometry,
) -> ControllerResult<BodyJointTargets> {
    let mut targets = [None; 6];
    for leg in LegId::ALL {
        let leg_config = body_config.legs.get(leg);
        let target = calculate_ik_for_leg(positions.get(leg), body_config, leg_config)
            .map_err(|reason| ControllerError::IkFailure {
                leg: leg.name(),
                reason,
            })?;
        targets[leg.index()] = Some(target);
    }
    Ok(BodyJointTargets::new(
        targets[LegId::LeftFront.index()].unwrap(),
        targets[LegId::LeftMiddle.index()].unwrap(),
        targets[LegId::LeftRear.index()].unwrap(),
        targets[LegId::RightFront.index()].unwrap(),
        targets[LegId::RightMiddle.index()].unwrap(),
        targets[LegId::RightRear.index()].unwrap(),
    ))
}

pub(crate) fn calculate_fk(
    joint_targets: &BodyJointTargets,
    body_config: &BodyGeometry,
) -> LegPositions {
    LegPositions::from_fn(|leg| {
        calculate_fk_for_leg(joint_targets.get(leg), body_config, body_config.legs.get(leg))
    })
}

pub(crate) fn calculate_ik_for_leg(
    target: &Point3<f32>,
    body_config: &BodyGeometry,
    leg_config: &LegConfig,
) -> Result<LegJointTargets, String> {
    let coxa_position = leg_config.position;
    let relative_vector: Vector3<f32> = target - coxa_position;
    let target_angle = relative_vector.y.atan2(relative_vector.x) + leg_config.angle_offset;
    let horizontal_distance =
        (relative_vector.x.powi(2) + relative_vector.y.powi(2)).sqrt() - body_config.coxa_length;
    let distance = (horizontal_distance.powi(2) + relative_vector.z.powi(2)).sqrt();
    // SSS triangle solution: law of cosines for the two non-coxa angles.
    let angle_by_tibia = get_alpha_angle(
        &distance,
        &body_config.femur_length,
        &body_config.tibia_length,
    );
    let angle_by_femur = get_alpha_angle(
        &body_config.tibia_length,
        &body_config.femur_length,
        &distance,
    );
    let ground_target_angle = horizontal_distance.atan2(-relative_vector.z);
    if target_angle >= 90_f32.to_radians() || target_angle <= (-90_f32).to_radians() {
        return Err(format!("unreachable coxa angle {target_angle} for target {target}"));
    }
    let femur_angle = angle_by_femur + ground_target_angle;
    let corrected_femur =
        (leg_config.femur_correction + body_config.femur_offset + femur_angle).abs();
    let corrected_tibia =
        (leg_config.tibia_correction + body_config.tibia_offset + angle_by_tibia).abs();
    let corrected_coxa = 150_f32.to_radians() + target_angle;
    Ok(LegJointTargets::new(
        corrected_coxa,
        corrected_femur,
        corrected_tibia,
    ))
}

pub(crate) fn calculate_fk_for_leg(
    joint_targets: &LegJointTargets,
    body_config: &BodyGeometry,
    leg_config: &LegConfig,
) -> Point3<f32> {
    let femur_angle = (joint_targets.femur()
        - (leg_config.femur_correction + body_config.femur_offset).abs())
    .abs();
    let tibia_angle = (joint_targets.tibia()
        - (leg_config.tibia_correction + body_config.tibia_offset).abs())
    .abs();
    let coxa_angle = joint_targets.coxa() - 150_f32.to_radians() - leg_config.angle_offset;
    let base_x = coxa_angle.cos();
    let base_y = coxa_angle.sin();
    let coxa_vector = Vector3::new(base_x, base_y, 0.0) * body_config.coxa_length;
    let femur_x = (femur_angle - 90_f32.to_radians()).sin() * body_config.femur_length;
    let femur_y = (femur_angle - 90_f32.to_radians()).cos() * body_config.femur_length;
    let femur_vector = Vector3::new(base_x * femur_y, base_y * femur_y, femur_x);
    // Angle between tibia and vertical: derived from the femur angle via
    // the 180-degree triangle-angle sum, then subtracted from tibia_angle.
    let angle_tibia_vector =
        tibia_angle - (90_f32.to_radians() - (femur_angle - 90_f32.to_radians()));
    let tibia_x = angle_tibia_vector.sin() * body_config.tibia_length;
    let tibia_y = angle_tibia_vector.cos() * body_config.tibia_length;
    let tibia_vector = Vector3::new(base_x * tibia_x, base_y * tibia_x, -tibia_y);
    let coxa_position = leg_config.position;
    coxa_position + coxa_vector + femur_vector + tibia_vector
}

fn get_alpha_angle(a: &f32, b: &f32, c: &f32) -> f32 {
    let upper = b.powi(2) + c.powi(2) - a.powi(2);
    let bottom = 2.0 * b * c;
    let divident: f32 = (-1_f32).max((1_f32).min(upper / bottom));
    divident.acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn get_angle_equilateral_triangle() {
        let angle = get_alpha_angle(&1.0, &1.0, &1.0);
        assert_relative_eq!(60_f32.to_radians(), angle);
    }

    #[test]
    fn get_angle_by_a_right_angled() {
        let b = 2_f32;
        let c = 2_f32;
        let a = (b.powi(2) + c.powi(2)).sqrt();
        let angle = get_alpha_angle(&a, &b, &c);
        assert_relative_eq!(90_f32.to_radians(), angle);
    }

    #[test]
    fn basic_ik_left_front() {
        let body_config = BodyGeometry::default();
        let target = Point3::new(0.18, 0.15, -0.09);
        let targets =
            calculate_ik_for_leg(&target, &body_config, body_config.legs.left_front()).unwrap();
        assert!(targets.coxa().is_finite());
        assert!(targets.femur().is_finite());
        assert!(targets.tibia().is_finite());
    }

    #[test]
    fn test_fk_against_ik_left_front() {
        let body_config = BodyGeometry::default();
        let target = Point3::new(0.15, 0.10, -0.05);
        let joint_targets =
            calculate_ik_for_leg(&target, &body_config, body_config.legs.left_front()).unwrap();
        let fk_calculated =
            calculate_fk_for_leg(&joint_targets, &body_config, body_config.legs.left_front());
        assert_relative_eq!(target, fk_calculated, epsilon = 1e-4);
    }

    #[test]
    fn test_fk_against_ik_right_front() {
        let body_config = BodyGeometry::default();
        let target = Point3::new(0.15, -0.10, -0.05);
        let joint_targets =
            calculate_ik_for_leg(&target, &body_config, body_config.legs.right_front()).unwrap();
        let fk_calculated =
            calculate_fk_for_leg(&joint_targets, &body_config, body_config.legs.right_front());
        assert_relative_eq!(target, fk_calculated, epsilon = 1e-4);
    }

    #[test]
    fn test_full_fk_against_ik() {
        let body_config = BodyGeometry::default();
        let origin = LegPositions::new(
            Point3::new(0.15, 0.10, -0.05),
            Point3::new(0.065, 0.10, -0.05),
            Point3::new(-0.15, 0.10, -0.05),
            Point3::new(0.15, -0.10, -0.05),
            Point3::new(0.065, -0.10, -0.05),
            Point3::new(-0.15, -0.10, -0.05),
        );
        let joint_targets = calculate_ik(&origin, &body_config).unwrap();
        let result = calculate_fk(&joint_targets, &body_config);
        assert_relative_eq!(origin.left_front(), result.left_front(), epsilon = 1e-4);
        assert_relative_eq!(origin.right_rear(), result.right_rear(), epsilon = 1e-4);
    }

    #[test]
    fn out_of_reach_target_reports_leg_name() {
        let body_config = BodyGeometry::default();
        let target = Point3::new(-1.0, 10.0, -0.05);
        let error = calculate_ik(
            &LegPositions::new(target, target, target, target, target, target),
            &body_config,
        )
        .unwrap_err();
        match error {
            ControllerError::IkFailure { leg, .. } => assert_eq!(leg, "left_front"),
            other => panic!("expected IkFailure, got {other:?}"),
        }
    }
}
