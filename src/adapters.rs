//! Contracts for the external collaborators named in §6 but explicitly
//! out of scope for this crate's implementation: the actuator bus, the
//! sensor bus (IMU + joint states + tip force), and telemetry
//! publishing. `async_trait` boundary traits around a hardware/
//! transport concern the crate itself never implements, only a
//! downstream binary does.

use crate::error::ControllerResult;
use crate::model::joint_targets::ActuatorCommand;
use crate::model::Model;
use async_trait::async_trait;
use nalgebra::{UnitQuaternion, Vector3};

/// Actuator output surface (§6 "Actuator output surface"): joint
/// targets go out, nothing comes back on this path within a tick.
#[async_trait]
pub trait ActuatorAdapter: Send {
    async fn init(&mut self, model: &Model, setup_speed: f32) -> ControllerResult<()>;
    async fn publish(&mut self, commands: &[ActuatorCommand]) -> ControllerResult<()>;
}

/// One leg's tip force reading, pre-offset-subtraction (§6 "Tip force
/// (per leg 0..5): clamp(raw[2*id] - force_offset, 0, 1000)").
#[derive(Debug, Clone, Copy, Default)]
pub struct RawJointSample {
    pub name: &'static str,
    pub position: f32,
    pub velocity: Option<f32>,
    pub effort: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImuSample {
    pub orientation: Option<UnitQuaternion<f32>>,
    pub linear_acceleration: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
}

/// Sensor input surface (§6 "Sensor input surface"). Joint samples are
/// a parallel-array read with optional velocity/effort (§7 transient:
/// "sensor message missing a field ... proceed with the fields
/// present").
#[async_trait]
pub trait SensorAdapter: Send {
    async fn read_imu(&mut self) -> ControllerResult<ImuSample>;
    async fn read_joint_states(&mut self) -> ControllerResult<Vec<RawJointSample>>;
    async fn read_tip_forces(&mut self) -> ControllerResult<[f32; 6]>;
}

/// Telemetry surface (§6 "implementer may omit"). A no-op
/// implementation satisfies the contract without publishing anything.
#[async_trait]
pub trait TelemetryAdapter: Send {
    async fn publish_pose(&mut self, model: &Model) -> ControllerResult<()>;
}

/// Loopback sensor adapter used by the standalone binary: reports a
/// level IMU and zero tip force on every read, and never overrides
/// joint positions (letting the model's own IK-driven values stand in
/// for "measured" state). Exists so the crate builds and runs
/// standalone without a real transport.
#[derive(Debug, Default)]
pub struct LoopbackSensorAdapter;

#[async_trait]
impl SensorAdapter for LoopbackSensorAdapter {
    async fn read_imu(&mut self) -> ControllerResult<ImuSample> {
        Ok(ImuSample {
            orientation: Some(UnitQuaternion::identity()),
            linear_acceleration: Vector3::new(0.0, 0.0, -9.81),
            angular_velocity: Vector3::zeros(),
        })
    }

    async fn read_joint_states(&mut self) -> ControllerResult<Vec<RawJointSample>> {
        Ok(Vec::new())
    }

    async fn read_tip_forces(&mut self) -> ControllerResult<[f32; 6]> {
        Ok([0.0; 6])
    }
}

/// Loopback actuator adapter: accepts every command, logs nothing,
/// drives nothing. The standalone binary's default.
#[derive(Debug, Default)]
pub struct LoopbackActuatorAdapter;

#[async_trait]
impl ActuatorAdapter for LoopbackActuatorAdapter {
    async fn init(&mut self, _model: &Model, _setup_speed: f32) -> ControllerResult<()> {
        Ok(())
    }

    async fn publish(&mut self, _commands: &[ActuatorCommand]) -> ControllerResult<()> {
        Ok(())
    }
}

/// Loopback telemetry adapter: drops every sample.
#[derive(Debug, Default)]
pub struct LoopbackTelemetryAdapter;

#[async_trait]
impl TelemetryAdapter for LoopbackTelemetryAdapter {
    async fn publish_pose(&mut self, _model: &Model) -> ControllerResult<()> {
        Ok(())
    }
}

/// §6 "Tip force... clamp(raw[2*id] - force_offset, 0, 1000)".
pub fn clamp_tip_force(raw: f32, force_offset: f32, max_force: f32) -> f32 {
    (raw - force_offset).clamp(0.0, max_force)
}

/// §6 "current_position = measured - position_offset".
pub fn apply_position_offset(measured: f32, position_offset: f32) -> f32 {
    measured - position_offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_tip_force_below_offset_is_zero() {
        assert_eq!(clamp_tip_force(1000.0, 1255.0, 1000.0), 0.0);
    }

    #[test]
    fn clamp_tip_force_saturates_at_max() {
        assert_eq!(clamp_tip_force(5000.0, 1255.0, 1000.0), 1000.0);
    }

    #[test]
    fn clamp_tip_force_passes_through_midrange() {
        assert_eq!(clamp_tip_force(1755.0, 1255.0, 1000.0), 500.0);
    }
}
