use crate::component_config::Speed;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed when talking to arm")]
    IoError(#[from] std::io::Error),
    #[error("failed to connect to {path}: {reason}")]
    ConnectionError { path: String, reason: String },
    #[error("expected {expected} joint angles, got {actual}")]
    JointCount { expected: usize, actual: usize },
    #[error("joint {joint} angle {angle} is outside of [{min}, {max}]")]
    JointLimit {
        joint: usize,
        angle: f64,
        min: f64,
        max: f64,
    },
    #[error("{path} is already open at {open} baud, requested {requested}")]
    BaudRateMismatch {
        path: String,
        open: u32,
        requested: u32,
    },
    #[error("connection is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, DriverError>;

pub const JOINT_COUNT: usize = 6;

/// x, y, z in millimeters followed by rx, ry, rz in degrees
pub type Coords = [f64; 6];

/// Values are what the firmware expects on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperState {
    Open = 0,
    Closed = 1,
}

impl GripperState {
    pub fn from_wire(value: i64) -> Option<GripperState> {
        match value {
            0 => Some(GripperState::Open),
            1 => Some(GripperState::Closed),
            _ => None,
        }
    }

    pub fn wire_value(self) -> i64 {
        self as i64
    }
}

/// How the firmware interpolates a cartesian move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordMode {
    Angular = 0,
    Linear = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LedColor {
    pub const BLUE: LedColor = LedColor::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> LedColor {
        LedColor { r, g, b }
    }
}

/// Calls exposed by the vendor SDK for the myCobot 280.
///
/// Errors are whatever the SDK raised and are passed through as is.
#[async_trait]
pub trait CobotDriver: Send + Sync {
    /// Joint angles in degrees
    async fn get_angles(&mut self) -> Result<Vec<f64>>;
    async fn send_angles(&mut self, angles: &[f64], speed: Speed) -> Result<()>;
    async fn get_coords(&mut self) -> Result<Coords>;
    async fn send_coords(&mut self, coords: &Coords, speed: Speed, mode: CoordMode) -> Result<()>;
    async fn is_moving(&mut self) -> Result<bool>;
    async fn stop(&mut self) -> Result<()>;
    async fn set_color(&mut self, color: LedColor) -> Result<()>;
    /// Returns whether the firmware acknowledged the command
    async fn set_gripper_state(&mut self, state: GripperState, speed: Speed) -> Result<bool>;
    async fn is_gripper_moving(&mut self) -> Result<bool>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens a vendor SDK session on a serial port
pub trait CobotConnector: Send + Sync {
    fn connect(&self, serial_path: &str, baud_rate: u32) -> Result<Box<dyn CobotDriver>>;
}

/// Joint limits of the myCobot 280 in degrees
pub const JOINT_LIMITS: [(f64, f64); JOINT_COUNT] = [
    (-165.0, 165.0),
    (-165.0, 165.0),
    (-165.0, 165.0),
    (-165.0, 165.0),
    (-165.0, 165.0),
    (-175.0, 175.0),
];

/// Roughly what the arm reports with every joint at zero
pub const HOME_COORDS: Coords = [156.8, -63.6, 303.7, -90.0, 0.0, -90.0];

/// Calls a simulated session can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFault {
    SendAngles,
    Stop,
    SetColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedState {
    pub angles: Vec<f64>,
    pub coords: Coords,
    pub color: LedColor,
    pub gripper: GripperState,
    pub last_speed: Option<Speed>,
    pub last_coord_mode: Option<CoordMode>,
    pub stop_count: usize,
    pub closed: bool,
    pub faults: Vec<SimulatedFault>,
}

impl Default for SimulatedState {
    fn default() -> Self {
        SimulatedState {
            angles: vec![0.0; JOINT_COUNT],
            coords: HOME_COORDS,
            color: LedColor::default(),
            gripper: GripperState::Open,
            last_speed: None,
            last_coord_mode: None,
            stop_count: 0,
            closed: false,
            faults: vec![],
        }
    }
}

/// In-memory stand-in for the vendor SDK.
///
/// Moves complete instantly and angles and coordinates are tracked
/// independently of each other.
pub struct SimulatedCobotDriver {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedCobotDriver {
    pub fn new() -> SimulatedCobotDriver {
        SimulatedCobotDriver::with_state(SimulatedState::default())
    }

    pub fn with_state(state: SimulatedState) -> SimulatedCobotDriver {
        SimulatedCobotDriver {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> Arc<Mutex<SimulatedState>> {
        Arc::clone(&self.state)
    }

    fn open_state(&self) -> Result<MutexGuard<'_, SimulatedState>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(DriverError::Closed);
        }
        Ok(state)
    }
}

impl Default for SimulatedCobotDriver {
    fn default() -> Self {
        SimulatedCobotDriver::new()
    }
}

fn check_fault(state: &SimulatedState, fault: SimulatedFault) -> Result<()> {
    if state.faults.contains(&fault) {
        return Err(DriverError::IoError(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated {:?} failure", fault),
        )));
    }
    Ok(())
}

fn check_angles(angles: &[f64]) -> Result<()> {
    if angles.len() != JOINT_COUNT {
        return Err(DriverError::JointCount {
            expected: JOINT_COUNT,
            actual: angles.len(),
        });
    }
    for (joint, (angle, (min, max))) in angles.iter().zip(JOINT_LIMITS.iter()).enumerate() {
        if angle < min || angle > max {
            return Err(DriverError::JointLimit {
                joint: joint + 1,
                angle: *angle,
                min: *min,
                max: *max,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl CobotDriver for SimulatedCobotDriver {
    async fn get_angles(&mut self) -> Result<Vec<f64>> {
        Ok(self.open_state()?.angles.clone())
    }

    async fn send_angles(&mut self, angles: &[f64], speed: Speed) -> Result<()> {
        check_angles(angles)?;
        let mut state = self.open_state()?;
        check_fault(&state, SimulatedFault::SendAngles)?;
        state.angles = angles.to_vec();
        state.last_speed = Some(speed);
        Ok(())
    }

    async fn get_coords(&mut self) -> Result<Coords> {
        Ok(self.open_state()?.coords)
    }

    async fn send_coords(&mut self, coords: &Coords, speed: Speed, mode: CoordMode) -> Result<()> {
        let mut state = self.open_state()?;
        state.coords = *coords;
        state.last_speed = Some(speed);
        state.last_coord_mode = Some(mode);
        Ok(())
    }

    async fn is_moving(&mut self) -> Result<bool> {
        self.open_state().map(|_| false)
    }

    async fn stop(&mut self) -> Result<()> {
        let mut state = self.open_state()?;
        check_fault(&state, SimulatedFault::Stop)?;
        state.stop_count += 1;
        Ok(())
    }

    async fn set_color(&mut self, color: LedColor) -> Result<()> {
        let mut state = self.open_state()?;
        check_fault(&state, SimulatedFault::SetColor)?;
        state.color = color;
        Ok(())
    }

    async fn set_gripper_state(&mut self, gripper: GripperState, speed: Speed) -> Result<bool> {
        let mut state = self.open_state()?;
        state.gripper = gripper;
        state.last_speed = Some(speed);
        Ok(true)
    }

    async fn is_gripper_moving(&mut self) -> Result<bool> {
        self.open_state().map(|_| false)
    }

    async fn close(&mut self) -> Result<()> {
        self.open_state()?.closed = true;
        Ok(())
    }
}

/// Hands out simulated drivers and remembers every session it opened
#[derive(Default)]
pub struct SimulatedConnector {
    sessions: Mutex<HashMap<String, Vec<Arc<Mutex<SimulatedState>>>>>,
    unavailable: bool,
    faults: Vec<SimulatedFault>,
}

impl SimulatedConnector {
    pub fn new() -> SimulatedConnector {
        SimulatedConnector::default()
    }

    /// Connector for which every connection attempt fails
    pub fn unavailable() -> SimulatedConnector {
        SimulatedConnector {
            sessions: Mutex::default(),
            unavailable: true,
            faults: vec![],
        }
    }

    /// Connector whose sessions fail the given calls
    pub fn with_faults(faults: &[SimulatedFault]) -> SimulatedConnector {
        SimulatedConnector {
            faults: faults.to_vec(),
            ..SimulatedConnector::default()
        }
    }

    /// Every session opened on `serial_path`, oldest first
    pub fn sessions(&self, serial_path: &str) -> Vec<Arc<Mutex<SimulatedState>>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(serial_path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn latest_session(&self, serial_path: &str) -> Option<Arc<Mutex<SimulatedState>>> {
        self.sessions(serial_path).pop()
    }
}

impl CobotConnector for SimulatedConnector {
    fn connect(&self, serial_path: &str, baud_rate: u32) -> Result<Box<dyn CobotDriver>> {
        if self.unavailable {
            return Err(DriverError::ConnectionError {
                path: serial_path.to_owned(),
                reason: "no device".to_owned(),
            });
        }
        tracing::debug!("Opening simulated myCobot on {} at {}", serial_path, baud_rate);
        let driver = SimulatedCobotDriver::with_state(SimulatedState {
            faults: self.faults.clone(),
            ..SimulatedState::default()
        });
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(serial_path.to_owned())
            .or_default()
            .push(driver.state());
        Ok(Box::new(driver))
    }
}
