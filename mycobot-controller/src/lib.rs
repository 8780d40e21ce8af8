#![doc = include_str!("../../README.md")]

pub mod arm;
pub mod cobot_driver;
pub mod commands;
pub mod component_config;
pub mod connection;
pub mod error;
pub mod gripper;
pub mod kinematics;
pub mod resource;
pub mod spatial_math;
