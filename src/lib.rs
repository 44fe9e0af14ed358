#![doc = include_str!("../README.md")]

pub mod adapters;
pub mod body_config;
pub mod error;
pub mod gait;
pub mod impedance_controller;
pub mod model;
pub mod parameters;
pub mod pose_controller;
pub mod state_controller;
pub mod utilities;
pub mod walk_controller;
