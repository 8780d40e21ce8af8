/// Formats the host runtime accepts for kinematic descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KinematicsFileFormat {
    Urdf,
}

/// Link and joint geometry of the myCobot 280 Pi, served untouched to the
/// host runtime's planner.
pub const MYCOBOT_280_PI_URDF: &[u8] = include_bytes!("../assets/mycobot_280_pi.urdf");

pub fn included_kinematics() -> (KinematicsFileFormat, Vec<u8>) {
    (KinematicsFileFormat::Urdf, MYCOBOT_280_PI_URDF.to_vec())
}
