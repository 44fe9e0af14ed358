//! Default tip-position poses used as choreography endpoints: the
//! walking default stance, a ground-contact reference used while
//! packing/unpacking, and a wider relaxed stance used by some startup
//! choreographies.

use crate::error::ControllerResult;
use crate::model::leg_positions::LegPositions;
use lazy_static::lazy_static;
use nalgebra::Point3;
use std::fs;
use std::path::Path;

const LEG_HEIGHT: f32 = -0.09;
const LEG_DISTANCE_LONGITUDAL: f32 = 0.15;
const MIDDLE_LEG_LONGITUDAL_OFFSET: f32 = 0.07;
const LEG_DISTANCE_LATERAL: f32 = 0.18;
const OFFSET_DISTANCE: f32 = 0.015;
const GROUND_LEG_HEIGHT: f32 = -0.03;

lazy_static! {
    /// Walking default stance: the tip positions `PoseController::directStartup`
    /// interpolates towards and `WalkController` treats as phase-zero stance.
    pub static ref RELAXED: LegPositions = LegPositions::new(
        Point3::new(LEG_DISTANCE_LATERAL, LEG_DISTANCE_LONGITUDAL, LEG_HEIGHT),
        Point3::new(
            0.0,
            LEG_DISTANCE_LONGITUDAL + MIDDLE_LEG_LONGITUDAL_OFFSET,
            LEG_HEIGHT,
        ),
        Point3::new(-LEG_DISTANCE_LATERAL, LEG_DISTANCE_LONGITUDAL, LEG_HEIGHT),
        Point3::new(LEG_DISTANCE_LATERAL, -LEG_DISTANCE_LONGITUDAL, LEG_HEIGHT),
        Point3::new(
            0.0,
            -LEG_DISTANCE_LONGITUDAL - MIDDLE_LEG_LONGITUDAL_OFFSET,
            LEG_HEIGHT,
        ),
        Point3::new(-LEG_DISTANCE_LATERAL, -LEG_DISTANCE_LONGITUDAL, LEG_HEIGHT),
    );

    /// Tip positions with all six legs touching the ground, used as a
    /// startup/shutdown intermediate where the body must stay supported.
    pub static ref GROUNDED: LegPositions = LegPositions::new(
        Point3::new(
            LEG_DISTANCE_LATERAL + OFFSET_DISTANCE,
            LEG_DISTANCE_LONGITUDAL + OFFSET_DISTANCE,
            GROUND_LEG_HEIGHT,
        ),
        Point3::new(
            0.0,
            LEG_DISTANCE_LONGITUDAL + MIDDLE_LEG_LONGITUDAL_OFFSET + OFFSET_DISTANCE,
            GROUND_LEG_HEIGHT,
        ),
        Point3::new(
            -LEG_DISTANCE_LATERAL - OFFSET_DISTANCE,
            LEG_DISTANCE_LONGITUDAL + OFFSET_DISTANCE,
            GROUND_LEG_HEIGHT,
        ),
        Point3::new(
            LEG_DISTANCE_LATERAL + OFFSET_DISTANCE,
            -LEG_DISTANCE_LONGITUDAL - OFFSET_DISTANCE,
            GROUND_LEG_HEIGHT,
        ),
        Point3::new(
            0.0,
            -LEG_DISTANCE_LONGITUDAL - MIDDLE_LEG_LONGITUDAL_OFFSET - OFFSET_DISTANCE,
            GROUND_LEG_HEIGHT,
        ),
        Point3::new(
            -LEG_DISTANCE_LATERAL - OFFSET_DISTANCE,
            -LEG_DISTANCE_LONGITUDAL - OFFSET_DISTANCE,
            GROUND_LEG_HEIGHT,
        ),
    );

    /// Wider stance used by `poseForLegManipulation` to keep the support
    /// polygon large while one leg is mid-transition to/from manual.
    pub static ref RELAXED_WIDE: LegPositions = LegPositions::new(
        Point3::new(
            LEG_DISTANCE_LATERAL + OFFSET_DISTANCE,
            LEG_DISTANCE_LONGITUDAL + OFFSET_DISTANCE,
            LEG_HEIGHT,
        ),
        Point3::new(
            0.0,
            LEG_DISTANCE_LONGITUDAL + MIDDLE_LEG_LONGITUDAL_OFFSET + OFFSET_DISTANCE,
            LEG_HEIGHT,
        ),
        Point3::new(
            -LEG_DISTANCE_LATERAL - OFFSET_DISTANCE,
            LEG_DISTANCE_LONGITUDAL + OFFSET_DISTANCE,
            LEG_HEIGHT,
        ),
        Point3::new(
            LEG_DISTANCE_LATERAL + OFFSET_DISTANCE,
            -LEG_DISTANCE_LONGITUDAL - OFFSET_DISTANCE,
            LEG_HEIGHT,
        ),
        Point3::new(
            0.0,
            -LEG_DISTANCE_LONGITUDAL - MIDDLE_LEG_LONGITUDAL_OFFSET - OFFSET_DISTANCE,
            LEG_HEIGHT,
        ),
        Point3::new(
            -LEG_DISTANCE_LATERAL - OFFSET_DISTANCE,
            -LEG_DISTANCE_LONGITUDAL - OFFSET_DISTANCE,
            LEG_HEIGHT,
        ),
    );
}

pub fn save_basic(directory: &Path) -> ControllerResult<()> {
    fs::write(
        directory.join("relaxed.toml"),
        toml::to_string_pretty(&*RELAXED)?,
    )?;
    fs::write(
        directory.join("grounded.toml"),
        toml::to_string_pretty(&*GROUNDED)?,
    )?;
    fs::write(
        directory.join("relaxed_wide.toml"),
        toml::to_string_pretty(&*RELAXED_WIDE)?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxed_stance_is_symmetric_front_to_back() {
        assert_eq!(RELAXED.left_front().y, -RELAXED.left_rear().y);
    }

    #[test]
    fn grounded_stance_sits_lower_than_relaxed() {
        assert!(GROUNDED.left_front().z < RELAXED.left_front().z);
    }
}
