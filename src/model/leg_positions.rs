use crate::model::hexapod_types::{HexapodTypes, LegFlags};
use nalgebra::{distance, Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

/// Tip position of every leg, in the body frame. This is the shared
/// state that the Walk -> Pose -> Impedance -> IK pipeline hands off
/// stage to stage every tick (§5 "Shared resources").
pub type LegPositions = HexapodTypes<Point3<f32>>;

impl LegPositions {
    pub fn transform(
        &self,
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> LegPositions {
        let iso = Isometry3::from_parts(Translation3::from(translation), rotation);
        LegPositions::from_fn(|leg| iso.transform_point(self.get(leg)))
    }

    pub fn transform_selected_legs(
        &self,
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        legs: LegFlags,
    ) -> LegPositions {
        let transformed = self.transform(translation, rotation);
        self.merge_with(&transformed, legs)
    }

    /// Scales every leg's lateral/longitudinal reach by `scale` about
    /// the body origin, leaving tip height untouched. Used to widen or
    /// narrow a stance target when `leg_span_scale` is adjusted.
    pub fn scaled_by_leg_span(&self, scale: f32) -> LegPositions {
        LegPositions::from_fn(|leg| {
            let p = self.get(leg);
            Point3::new(p.x * scale, p.y * scale, p.z)
        })
    }

    pub fn longest_distance(&self, other: &LegPositions) -> f32 {
        self.as_legs()
            .iter()
            .zip(other.as_legs().iter())
            .map(|(mine, other)| distance(mine, other))
            .fold(f32::NAN, f32::max)
    }

    /// Overwrite just the legs selected by `legs`, in leg order, with the
    /// corresponding entry from `targets`. Used by single-leg manual
    /// placement where only one or two legs carry a new target.
    pub fn updated_from_selected_legs(
        &mut self,
        targets: &[Point3<f32>],
        legs: LegFlags,
    ) -> Result<(), &'static str> {
        let selected: Vec<_> = crate::model::hexapod_types::LegId::ALL
            .into_iter()
            .filter(|leg| legs.contains_leg(*leg))
            .collect();
        if selected.len() != targets.len() {
            return Err("target count does not match selected leg count");
        }
        for (leg, target) in selected.into_iter().zip(targets.iter()) {
            *self.get_mut(leg) = *target;
        }
        Ok(())
    }
}

pub struct MovingTowardsIterator<T> {
    target: T,
    max_move: f32,
    last_state: T,
}

impl Iterator for MovingTowardsIterator<Point3<f32>> {
    type Item = Point3<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        let (new_state, moved) = self.last_state.move_towards(&self.target, &self.max_move);
        if !moved {
            return None;
        }
        self.last_state = new_state;
        Some(self.last_state)
    }
}

impl Iterator for MovingTowardsIterator<LegPositions> {
    type Item = LegPositions;

    fn next(&mut self) -> Option<Self::Item> {
        let (new_state, moved) = self.last_state.move_towards(&self.target, &self.max_move);
        if !moved {
            return None;
        }
        self.last_state = new_state;
        Some(self.last_state)
    }
}

pub trait MoveTowards {
    type Item;

    fn move_towards(&self, target: &Self, max_move: &f32) -> (Self::Item, bool);
    fn to_move_towards_iter(
        &self,
        target: &Self,
        max_move: f32,
    ) -> MovingTowardsIterator<Self::Item>;
}

impl MoveTowards for Point3<f32> {
    type Item = Point3<f32>;

    fn move_towards(&self, target: &Point3<f32>, max_move: &f32) -> (Point3<f32>, bool) {
        if self == target {
            return (*target, false);
        }
        let dist = distance(self, target);
        if &dist <= max_move {
            return (*target, true);
        }
        let vector = target - self;
        (self + vector.normalize() * *max_move, true)
    }

    fn to_move_towards_iter(
        &self,
        target: &Self,
        max_move: f32,
    ) -> MovingTowardsIterator<Self::Item> {
        MovingTowardsIterator {
            target: *target,
            max_move,
            last_state: *self,
        }
    }
}

impl MoveTowards for Vector3<f32> {
    type Item = Vector3<f32>;

    fn move_towards(&self, target: &Vector3<f32>, max_move: &f32) -> (Vector3<f32>, bool) {
        if self == target {
            return (*target, false);
        }
        let dist = (self - target).magnitude();
        if &dist <= max_move {
            return (*target, true);
        }
        let vector = target - self;
        (self + vector.normalize() * *max_move, true)
    }

    fn to_move_towards_iter(
        &self,
        target: &Self,
        max_move: f32,
    ) -> MovingTowardsIterator<Self::Item> {
        MovingTowardsIterator {
            target: *target,
            max_move,
            last_state: *self,
        }
    }
}

impl MoveTowards for LegPositions {
    type Item = LegPositions;

    fn move_towards(&self, target: &LegPositions, max_move: &f32) -> (LegPositions, bool) {
        let mut moved = false;
        let result = LegPositions::from_fn(|leg| {
            let (new_point, leg_moved) = self.get(leg).move_towards(target.get(leg), max_move);
            moved |= leg_moved;
            new_point
        });
        (result, moved)
    }

    fn to_move_towards_iter(
        &self,
        target: &Self,
        max_move: f32,
    ) -> MovingTowardsIterator<Self::Item> {
        MovingTowardsIterator {
            target: *target,
            max_move,
            last_state: *self,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;

    #[test]
    fn move_point_towards_full_step() {
        let start = Point3::new(0_f32, 0_f32, 0_f32);
        let target = Point3::new(1_f32, 1_f32, 1_f32);
        let (new, moved) = start.move_towards(&target, &distance(&start, &target));
        assert!(moved);
        assert_eq!(new, target);
    }

    #[test]
    fn move_point_towards_half() {
        let start = Point3::new(0_f32, 0_f32, 0_f32);
        let target = Point3::new(1_f32, 0_f32, 0_f32);
        let (new, moved) = start.move_towards(&target, &(distance(&start, &target) / 2.0));
        assert!(moved);
        assert_eq!(new, Point3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn move_point_towards_not_move() {
        let start = Point3::new(1_f32, 0_f32, 0_f32);
        let target = Point3::new(1_f32, 0_f32, 0_f32);
        let (new, moved) = start.move_towards(&target, &10.0);
        assert!(!moved);
        assert_eq!(new, target);
    }

    #[test]
    fn move_legs_towards_multiple_steps_iter() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(2.0, 0.0, 0.0);
        let start = LegPositions::new(a, a, a, a, a, a);
        let middle = LegPositions::new(b, b, b, b, b, b);
        let target = LegPositions::new(b, b, b, b, b, c);
        let mut iterator = start.to_move_towards_iter(&target, 1.0);
        let new = iterator.next().unwrap();
        assert_eq!(middle, new);
        let new = iterator.next().unwrap();
        assert_eq!(target, new);
        assert!(iterator.next().is_none());
    }

    #[test]
    fn merging_leg_positions_tripod() {
        let point_a = Point3::new(0.0, 0.0, 0.0);
        let a = LegPositions::new(point_a, point_a, point_a, point_a, point_a, point_a);
        let point_b = Point3::new(1.0, 1.0, 1.0);
        let b = LegPositions::new(point_b, point_b, point_b, point_b, point_b, point_b);
        let merged = a.merge_with(&b, LegFlags::LRL_TRIPOD);
        assert_eq!(merged.left_front(), b.left_front());
        assert_eq!(merged.right_middle(), b.right_middle());
        assert_eq!(merged.left_rear(), b.left_rear());
        assert_eq!(merged.right_front(), a.right_front());
        assert_eq!(merged.left_middle(), a.left_middle());
        assert_eq!(merged.right_rear(), a.right_rear());
    }

    #[test]
    fn scaled_by_leg_span_widens_xy_and_preserves_height() {
        let point = Point3::new(0.2, 0.1, -0.09);
        let positions = LegPositions::new(point, point, point, point, point, point);
        let scaled = positions.scaled_by_leg_span(1.5);
        assert_relative_eq!(scaled.left_front().x, 0.3, epsilon = 1e-5);
        assert_relative_eq!(scaled.left_front().y, 0.15, epsilon = 1e-5);
        assert_relative_eq!(scaled.left_front().z, -0.09, epsilon = 1e-5);
    }

    #[test]
    fn apply_transformation_to_leg_positions() {
        let point_a = Point3::new(0.0, 0.0, 0.0);
        let a = LegPositions::new(point_a, point_a, point_a, point_a, point_a, point_a);
        let point_b = Point3::new(1.0, 1.0, 1.0);
        let b = LegPositions::new(point_b, point_b, point_b, point_b, point_b, point_b);

        let transformed_a = a.transform(Vector3::new(1.0, 1.0, 1.0), UnitQuaternion::identity());
        assert_relative_eq!(transformed_a.left_front(), b.left_front());
        assert_relative_eq!(transformed_a.right_middle(), b.right_middle());
    }

    #[test]
    fn updated_from_selected_legs_rejects_mismatched_count() {
        let point_a = Point3::new(0.0, 0.0, 0.0);
        let mut a = LegPositions::new(point_a, point_a, point_a, point_a, point_a, point_a);
        let err = a.updated_from_selected_legs(&[point_a, point_a], LegFlags::LEFT_FRONT);
        assert!(err.is_err());
    }

    #[test]
    fn updated_from_selected_legs_writes_targets() {
        let point_a = Point3::new(0.0, 0.0, 0.0);
        let mut a = LegPositions::new(point_a, point_a, point_a, point_a, point_a, point_a);
        let target = Point3::new(5.0, 0.0, 0.0);
        a.updated_from_selected_legs(&[target], LegFlags::LEFT_FRONT)
            .unwrap();
        assert_eq!(a.left_front(), &target);
        assert_eq!(a.left_middle(), &point_a);
    }
}
