use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Stable leg identity, also used as the gait phase index (§3: "order
/// stable and meaningful: used as gait phase index"). The discriminants
/// fix the 0..5 ordering used everywhere a `[T; 6]` or phase table is
/// indexed by leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegId {
    LeftFront = 0,
    RightFront = 1,
    LeftMiddle = 2,
    RightMiddle = 3,
    LeftRear = 4,
    RightRear = 5,
}

impl LegId {
    pub const ALL: [LegId; 6] = [
        LegId::LeftFront,
        LegId::RightFront,
        LegId::LeftMiddle,
        LegId::RightMiddle,
        LegId::LeftRear,
        LegId::RightRear,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            LegId::LeftFront => "left_front",
            LegId::RightFront => "right_front",
            LegId::LeftMiddle => "left_middle",
            LegId::RightMiddle => "right_middle",
            LegId::LeftRear => "left_rear",
            LegId::RightRear => "right_rear",
        }
    }

    pub fn flag(self) -> LegFlags {
        match self {
            LegId::LeftFront => LegFlags::LEFT_FRONT,
            LegId::RightFront => LegFlags::RIGHT_FRONT,
            LegId::LeftMiddle => LegFlags::LEFT_MIDDLE,
            LegId::RightMiddle => LegFlags::RIGHT_MIDDLE,
            LegId::LeftRear => LegFlags::LEFT_REAR,
            LegId::RightRear => LegFlags::RIGHT_REAR,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LegFlags: u32 {
        const LEFT_FRONT = 0b00000001;
        const LEFT_MIDDLE = 0b00000010;
        const LEFT_REAR = 0b00000100;
        const RIGHT_FRONT = 0b00001000;
        const RIGHT_MIDDLE = 0b00010000;
        const RIGHT_REAR = 0b00100000;
        const LRL_TRIPOD = Self::LEFT_FRONT.bits() | Self::RIGHT_MIDDLE.bits() | Self::LEFT_REAR.bits();
        const RLR_TRIPOD = Self::RIGHT_FRONT.bits() | Self::LEFT_MIDDLE.bits() | Self::RIGHT_REAR.bits();
        const RIGHT = Self::RIGHT_FRONT.bits() | Self::RIGHT_MIDDLE.bits() | Self::RIGHT_REAR.bits();
        const LEFT = Self::LEFT_FRONT.bits() | Self::LEFT_MIDDLE.bits() | Self::LEFT_REAR.bits();
        const MIDDLE = Self::RIGHT_MIDDLE.bits() | Self::LEFT_MIDDLE.bits();
        const FRONT = Self::LEFT_FRONT.bits() | Self::RIGHT_FRONT.bits();
        const REAR = Self::LEFT_REAR.bits() | Self::RIGHT_REAR.bits();
        const ALL = Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

impl LegFlags {
    pub fn contains_leg(&self, leg: LegId) -> bool {
        self.contains(leg.flag())
    }
}

/// A value per leg, keyed by the stable `LegId` order. This is the
/// per-leg container used throughout the crate: `LegPositions`,
/// per-leg configuration, and any other "one value per leg" shape.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct HexapodTypes<T: Clone> {
    left_front: T,
    left_middle: T,
    left_rear: T,
    right_front: T,
    right_middle: T,
    right_rear: T,
}

impl<T: Clone> HexapodTypes<T> {
    pub fn new(
        left_front: T,
        left_middle: T,
        left_rear: T,
        right_front: T,
        right_middle: T,
        right_rear: T,
    ) -> Self {
        Self {
            left_front,
            left_middle,
            left_rear,
            right_front,
            right_middle,
            right_rear,
        }
    }

    pub fn from_fn(mut f: impl FnMut(LegId) -> T) -> Self {
        Self {
            left_front: f(LegId::LeftFront),
            left_middle: f(LegId::LeftMiddle),
            left_rear: f(LegId::LeftRear),
            right_front: f(LegId::RightFront),
            right_middle: f(LegId::RightMiddle),
            right_rear: f(LegId::RightRear),
        }
    }

    pub fn left_front(&self) -> &T {
        &self.left_front
    }

    pub fn left_middle(&self) -> &T {
        &self.left_middle
    }

    pub fn left_rear(&self) -> &T {
        &self.left_rear
    }

    pub fn right_front(&self) -> &T {
        &self.right_front
    }

    pub fn right_middle(&self) -> &T {
        &self.right_middle
    }

    pub fn right_rear(&self) -> &T {
        &self.right_rear
    }

    pub fn get(&self, leg: LegId) -> &T {
        match leg {
            LegId::LeftFront => &self.left_front,
            LegId::RightFront => &self.right_front,
            LegId::LeftMiddle => &self.left_middle,
            LegId::RightMiddle => &self.right_middle,
            LegId::LeftRear => &self.left_rear,
            LegId::RightRear => &self.right_rear,
        }
    }

    pub fn get_mut(&mut self, leg: LegId) -> &mut T {
        match leg {
            LegId::LeftFront => &mut self.left_front,
            LegId::RightFront => &mut self.right_front,
            LegId::LeftMiddle => &mut self.left_middle,
            LegId::RightMiddle => &mut self.right_middle,
            LegId::LeftRear => &mut self.left_rear,
            LegId::RightRear => &mut self.right_rear,
        }
    }

    pub fn updated(&self, leg: LegId, value: T) -> Self {
        let mut new = self.clone();
        *new.get_mut(leg) = value;
        new
    }

    /// Leg values in stable `LegId` order (0..5): LF, RF, LM, RM, LR, RR.
    pub fn as_legs(&self) -> [&T; 6] {
        [
            &self.left_front,
            &self.right_front,
            &self.left_middle,
            &self.right_middle,
            &self.left_rear,
            &self.right_rear,
        ]
    }

    pub fn iter_with_id(&self) -> impl Iterator<Item = (LegId, &T)> {
        LegId::ALL.into_iter().map(move |id| (id, self.get(id)))
    }

    pub fn selected_legs(&self, legs: LegFlags) -> Vec<&T> {
        LegId::ALL
            .into_iter()
            .filter(|leg| legs.contains_leg(*leg))
            .map(|leg| self.get(leg))
            .collect()
    }

    /// Combine `self` with `other`, taking each leg's value from `other`
    /// wherever `legs` selects it and from `self` otherwise.
    pub fn merge_with(&self, other: &Self, legs: LegFlags) -> Self {
        Self::from_fn(|leg| {
            if legs.contains_leg(leg) {
                other.get(leg).clone()
            } else {
                self.get(leg).clone()
            }
        })
    }
}

impl<T: Clone + Copy> Copy for HexapodTypes<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_with_selects_only_flagged_legs() {
        let a = HexapodTypes::new(0, 0, 0, 0, 0, 0);
        let b = HexapodTypes::new(1, 1, 1, 1, 1, 1);
        let merged = a.merge_with(&b, LegFlags::LEFT_FRONT);
        assert_eq!(*merged.left_front(), 1);
        assert_eq!(*merged.left_middle(), 0);
        assert_eq!(*merged.right_rear(), 0);
    }

    #[test]
    fn merge_with_tripod_selects_three_legs() {
        let a = HexapodTypes::new(0, 0, 0, 0, 0, 0);
        let b = HexapodTypes::new(1, 1, 1, 1, 1, 1);
        let merged = a.merge_with(&b, LegFlags::LRL_TRIPOD);
        assert_eq!(*merged.left_front(), 1);
        assert_eq!(*merged.right_middle(), 1);
        assert_eq!(*merged.left_rear(), 1);
        assert_eq!(*merged.right_front(), 0);
        assert_eq!(*merged.left_middle(), 0);
        assert_eq!(*merged.right_rear(), 0);
    }

    #[test]
    fn selected_legs_preserves_stable_order() {
        let hexapod = HexapodTypes::new("lf", "lm", "lr", "rf", "rm", "rr");
        let selected = hexapod.selected_legs(LegFlags::RLR_TRIPOD);
        assert_eq!(selected, vec![&"rf", &"lm", &"rr"]);
    }

    #[test]
    fn leg_id_index_matches_as_legs_order() {
        let hexapod = HexapodTypes::new(
            LegId::LeftFront,
            LegId::LeftMiddle,
            LegId::LeftRear,
            LegId::RightFront,
            LegId::RightMiddle,
            LegId::RightRear,
        );
        for (leg, value) in hexapod.iter_with_id() {
            assert_eq!(leg, *value);
            assert_eq!(hexapod.as_legs()[leg.index()], value);
        }
    }
}
