//! Data-driven gait tables. A gait is a tuple
//! `(stance_phase, swing_phase, phase_offset, offset_multiplier[6])`;
//! each leg's phase offset is `(phase_offset * offset_multiplier[i]) mod
//! (stance_phase + swing_phase)`. No dynamic dispatch: gaits are data,
//! selected by enum, not subclassed controllers.

use crate::model::hexapod_types::LegId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaitSelection {
    Tripod,
    Ripple,
    Wave,
    Amble,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Gait {
    pub name: &'static str,
    pub stance_phase: f32,
    pub swing_phase: f32,
    pub phase_offset: f32,
    pub offset_multiplier: [f32; 6],
}

impl Gait {
    pub fn cycle_length(&self) -> f32 {
        self.stance_phase + self.swing_phase
    }

    /// Per-leg phase offset `phi_i`, ordered as `LegId` (LF, RF, LM, RM,
    /// LR, RR — matching `HexapodTypes::as_legs`).
    pub fn phase_offsets(&self) -> [f32; 6] {
        let cycle = self.cycle_length();
        let mut offsets = [0.0; 6];
        for leg in LegId::ALL {
            offsets[leg.index()] = (self.phase_offset * self.offset_multiplier[leg.index()]) % cycle;
        }
        offsets
    }
}

pub fn gait_for(selection: GaitSelection) -> Gait {
    match selection {
        GaitSelection::Tripod => TRIPOD,
        GaitSelection::Ripple => RIPPLE,
        GaitSelection::Wave => WAVE,
        GaitSelection::Amble => AMBLE,
    }
}

/// Two tripods, LF/RM/LR vs RF/LM/RR, 180 degrees out of phase — the
/// fastest, least statically stable gait.
pub const TRIPOD: Gait = Gait {
    name: "tripod_gait",
    stance_phase: 0.5,
    swing_phase: 0.5,
    phase_offset: 0.5,
    // order: LF, RF, LM, RM, LR, RR
    offset_multiplier: [0.0, 1.0, 1.0, 0.0, 0.0, 1.0],
};

/// Each leg's swing overlaps the next leg's by one sixth of the cycle;
/// only one leg swings at a time, always five legs in stance.
pub const RIPPLE: Gait = Gait {
    name: "ripple_gait",
    stance_phase: 5.0 / 6.0,
    swing_phase: 1.0 / 6.0,
    phase_offset: 1.0 / 6.0,
    offset_multiplier: [0.0, 3.0, 4.0, 1.0, 2.0, 5.0],
};

/// One leg swings at a time in strict front-to-back sequence per side;
/// the most statically stable, slowest gait.
pub const WAVE: Gait = Gait {
    name: "wave_gait",
    stance_phase: 5.0 / 6.0,
    swing_phase: 1.0 / 6.0,
    phase_offset: 1.0 / 6.0,
    offset_multiplier: [0.0, 3.0, 2.0, 5.0, 4.0, 1.0],
};

/// Diagonal pairs, four-beat pattern: stable at moderate speed with a
/// duty factor between tripod and wave.
pub const AMBLE: Gait = Gait {
    name: "amble_gait",
    stance_phase: 0.75,
    swing_phase: 0.25,
    phase_offset: 0.25,
    offset_multiplier: [0.0, 2.0, 1.0, 3.0, 2.0, 0.0],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tripod_gait_splits_legs_into_two_groups() {
        let offsets = TRIPOD.phase_offsets();
        assert_eq!(offsets[LegId::LeftFront.index()], offsets[LegId::LeftRear.index()]);
        assert_eq!(offsets[LegId::LeftFront.index()], offsets[LegId::RightMiddle.index()]);
        assert_ne!(offsets[LegId::LeftFront.index()], offsets[LegId::RightFront.index()]);
    }

    #[test]
    fn wave_gait_assigns_six_distinct_offsets() {
        let offsets = WAVE.phase_offsets();
        let mut sorted = offsets;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for window in sorted.windows(2) {
            assert!(window[1] - window[0] > 1e-6);
        }
    }

    #[test]
    fn gait_for_selection_round_trips_name() {
        assert_eq!(gait_for(GaitSelection::Wave).name, "wave_gait");
        assert_eq!(gait_for(GaitSelection::Tripod).name, "tripod_gait");
    }
}
