//! Conversions between the arm's roll/pitch/yaw coordinates and the
//! orientation vector poses used by the host runtime.

use crate::cobot_driver::Coords;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

const ANGLE_EPSILON: f64 = 1e-4;

/// Rotation given by the direction the local z axis points at and a twist
/// `theta` (radians) around it.
///
/// Defined as `Rz(lon) * Ry(lat) * Rz(theta)` where `lat = acos(o_z)` and
/// `lon = atan2(o_y, o_x)`. At the poles `lon` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationVector {
    pub o_x: f64,
    pub o_y: f64,
    pub o_z: f64,
    pub theta: f64,
}

impl OrientationVector {
    pub fn new(o_x: f64, o_y: f64, o_z: f64, theta: f64) -> OrientationVector {
        OrientationVector {
            o_x,
            o_y,
            o_z,
            theta,
        }
    }

    /// Zero length axes are treated as pointing up
    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        let axis = Vector3::new(self.o_x, self.o_y, self.o_z);
        let norm = axis.norm();
        let axis = if norm < ANGLE_EPSILON {
            Vector3::z()
        } else {
            axis / norm
        };
        let lat = axis.z.clamp(-1.0, 1.0).acos();
        let lon = if 1.0 - axis.z.abs() > ANGLE_EPSILON {
            axis.y.atan2(axis.x)
        } else {
            0.0
        };
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), lon)
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), lat)
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.theta)
    }

    pub fn from_quaternion(rotation: &UnitQuaternion<f64>) -> OrientationVector {
        let z = rotation * Vector3::z();
        let lat = z.z.clamp(-1.0, 1.0).acos();
        let lon = if 1.0 - z.z.abs() > ANGLE_EPSILON {
            z.y.atan2(z.x)
        } else {
            0.0
        };
        // what is left after undoing lon and lat is the twist around z
        let twist = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -lat)
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -lon)
            * rotation;
        let x = twist * Vector3::x();
        OrientationVector::new(z.x, z.y, z.z, x.y.atan2(x.x))
    }
}

/// Fixed axis rotations applied x, then y, then z. Radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> EulerAngles {
        EulerAngles { roll, pitch, yaw }
    }

    pub fn from_degrees(roll: f64, pitch: f64, yaw: f64) -> EulerAngles {
        EulerAngles::new(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }

    pub fn from_quaternion(rotation: &UnitQuaternion<f64>) -> EulerAngles {
        let (roll, pitch, yaw) = rotation.euler_angles();
        EulerAngles::new(roll, pitch, yaw)
    }
}

/// End effector pose. Position in millimeters, `theta` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub o_x: f64,
    pub o_y: f64,
    pub o_z: f64,
    pub theta: f64,
}

impl Pose {
    pub fn orientation(&self) -> OrientationVector {
        OrientationVector::new(self.o_x, self.o_y, self.o_z, self.theta.to_radians())
    }

    /// Pose from `[x, y, z, rx, ry, rz]` as reported by the arm
    pub fn from_coords(coords: &Coords) -> Pose {
        let [x, y, z, rx, ry, rz] = *coords;
        let rotation = EulerAngles::from_degrees(rx, ry, rz).to_quaternion();
        let orientation = OrientationVector::from_quaternion(&rotation);
        Pose {
            x,
            y,
            z,
            o_x: orientation.o_x,
            o_y: orientation.o_y,
            o_z: orientation.o_z,
            theta: orientation.theta.to_degrees(),
        }
    }

    pub fn to_coords(&self) -> Coords {
        let euler = EulerAngles::from_quaternion(&self.orientation().to_quaternion());
        [
            self.x,
            self.y,
            self.z,
            euler.roll.to_degrees(),
            euler.pitch.to_degrees(),
            euler.yaw.to_degrees(),
        ]
    }
}
