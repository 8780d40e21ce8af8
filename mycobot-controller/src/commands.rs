//! `do_command` payloads understood by the arm.
//!
//! The gripper has no line of its own to the hardware and drives the jaws
//! through these commands on its arm.

use crate::cobot_driver::GripperState;
use crate::component_config::Speed;
use crate::error::ComponentError;
use serde_json::{json, Map, Value};
use std::convert::TryFrom;

pub type Command = Map<String, Value>;

pub const IS_GRIPPER_MOVING: &str = "is_gripper_moving";
pub const SET_GRIPPER_STATE: &str = "set_gripper_state";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmCommand {
    IsGripperMoving,
    /// Sent as `[state, speed]`
    SetGripperState { state: GripperState, speed: Speed },
}

impl ArmCommand {
    pub fn key(&self) -> &'static str {
        match self {
            ArmCommand::IsGripperMoving => IS_GRIPPER_MOVING,
            ArmCommand::SetGripperState { .. } => SET_GRIPPER_STATE,
        }
    }

    /// Unknown keys are skipped
    pub fn parse(command: &Command) -> Result<Vec<ArmCommand>, ComponentError> {
        let mut parsed = vec![];
        for (name, args) in command {
            match name.as_str() {
                IS_GRIPPER_MOVING => parsed.push(ArmCommand::IsGripperMoving),
                SET_GRIPPER_STATE => parsed.push(parse_set_gripper_state(args)?),
                other => tracing::debug!("Ignoring unknown command {}", other),
            }
        }
        Ok(parsed)
    }

    pub fn to_command(&self) -> Command {
        let args = match self {
            ArmCommand::IsGripperMoving => json!([]),
            ArmCommand::SetGripperState { state, speed } => {
                json!([state.wire_value(), speed.get()])
            }
        };
        let mut command = Command::new();
        command.insert(self.key().to_owned(), args);
        command
    }
}

/// Reads a boolean answer out of a `do_command` response, missing means false
pub fn response_flag(response: &Command, key: &str) -> bool {
    response.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn parse_set_gripper_state(args: &Value) -> Result<ArmCommand, ComponentError> {
    let invalid = |reason: String| ComponentError::InvalidCommand {
        name: SET_GRIPPER_STATE.to_owned(),
        reason,
    };
    let (state, speed) = match args.as_array().map(Vec::as_slice) {
        Some([state, speed]) => (state, speed),
        _ => return Err(invalid("expected [state, speed]".to_owned())),
    };
    let state = state
        .as_f64()
        .filter(|value| value.fract() == 0.0)
        .and_then(|value| GripperState::from_wire(value as i64))
        .ok_or_else(|| invalid(format!("state must be 0 or 1, got {}", state)))?;
    let speed = speed
        .as_f64()
        .ok_or_else(|| invalid(format!("speed must be a number, got {}", speed)))?;
    let speed = Speed::try_from(speed).map_err(|err| invalid(err.to_string()))?;
    Ok(ArmCommand::SetGripperState { state, speed })
}
