use crate::cobot_driver::{CoordMode, LedColor};
use crate::commands::{ArmCommand, Command};
use crate::component_config::{ArmConfig, ComponentConfig};
use crate::connection::{CobotConnection, ConnectionPool};
use crate::error::ComponentError;
use crate::kinematics::{self, KinematicsFileFormat};
use crate::resource::{Component, Dependencies};
use crate::spatial_math::Pose;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

type Result<T> = std::result::Result<T, ComponentError>;

/// Joint angles in degrees, base first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointPositions {
    pub values: Vec<f64>,
}

impl JointPositions {
    pub fn new(values: Vec<f64>) -> JointPositions {
        JointPositions { values }
    }
}

#[async_trait]
pub trait Arm: Component {
    async fn get_end_position(&self) -> Result<Pose>;
    async fn move_to_position(&self, pose: Pose) -> Result<()>;
    async fn move_to_joint_positions(&self, positions: JointPositions) -> Result<()>;
    async fn get_joint_positions(&self) -> Result<JointPositions>;
    async fn stop(&self) -> Result<()>;
    async fn is_moving(&self) -> Result<bool>;
    async fn get_kinematics(&self) -> Result<(KinematicsFileFormat, Vec<u8>)>;
}

struct ArmState {
    config: ArmConfig,
    connection: Option<CobotConnection>,
}

/// myCobot 280 arm backed by the vendor SDK.
///
/// Once closed every call answers as if no arm was attached.
pub struct MyCobotArm {
    name: String,
    pool: Arc<ConnectionPool>,
    state: Mutex<ArmState>,
}

impl MyCobotArm {
    pub fn validate_config(config: &ComponentConfig) -> Result<Vec<String>> {
        ArmConfig::from_attributes(&config.attributes)?;
        Ok(vec![])
    }

    pub async fn new(config: &ComponentConfig, pool: Arc<ConnectionPool>) -> Result<MyCobotArm> {
        let arm = MyCobotArm {
            name: config.name.clone(),
            pool,
            state: Mutex::new(ArmState {
                config: ArmConfig::default(),
                connection: None,
            }),
        };
        arm.reconfigure(config, &Dependencies::new()).await?;
        Ok(arm)
    }

    pub async fn config(&self) -> ArmConfig {
        self.state.lock().await.config.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connection.is_some()
    }

    /// Stops the arm and hands the session back to the pool
    async fn disconnect(&self, connection: CobotConnection) -> Result<()> {
        let stopped = connection.lock().await.stop().await;
        self.pool.release(connection).await?;
        stopped?;
        Ok(())
    }
}

#[async_trait]
impl Component for MyCobotArm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reconfigure(&self, config: &ComponentConfig, _dependencies: &Dependencies) -> Result<()> {
        let config = ArmConfig::from_attributes(&config.attributes)?;
        let mut state = self.state.lock().await;
        if let Some(connection) = state.connection.take() {
            tracing::info!("Resetting connection");
            self.disconnect(connection).await?;
        }

        let connection = self.pool.acquire(&config.serial_path, config.baud_rate)?;
        let colored = connection.lock().await.set_color(LedColor::BLUE).await;
        if let Err(err) = colored {
            if let Err(release_err) = self.pool.release(connection).await {
                tracing::error!("Failed to release {}: {}", config.serial_path, release_err);
            }
            return Err(err.into());
        }
        state.connection = Some(connection);
        state.config = config;
        Ok(())
    }

    async fn do_command(&self, command: &Command) -> Result<Command> {
        let arm_state = self.state.lock().await;
        let connection = match &arm_state.connection {
            Some(connection) => connection,
            None => return Ok(Command::new()),
        };

        tracing::info!("do_command: {:?}", command);
        let mut result = Command::new();
        let mut driver = connection.lock().await;
        for arm_command in ArmCommand::parse(command)? {
            let answer = match arm_command {
                ArmCommand::IsGripperMoving => driver.is_gripper_moving().await?,
                ArmCommand::SetGripperState { state, speed } => {
                    driver.set_gripper_state(state, speed).await?
                }
            };
            result.insert(arm_command.key().to_owned(), Value::Bool(answer));
        }
        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        let connection = self.state.lock().await.connection.take();
        match connection {
            Some(connection) => self.disconnect(connection).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Arm for MyCobotArm {
    async fn get_end_position(&self) -> Result<Pose> {
        let state = self.state.lock().await;
        match &state.connection {
            Some(connection) => {
                let coords = connection.lock().await.get_coords().await?;
                Ok(Pose::from_coords(&coords))
            }
            None => Ok(Pose::default()),
        }
    }

    async fn move_to_position(&self, pose: Pose) -> Result<()> {
        tracing::info!(
            "Moving to Pose: x = {}, y = {}, z = {}, o_x = {}, o_y = {}, o_z = {}, theta = {}",
            pose.x,
            pose.y,
            pose.z,
            pose.o_x,
            pose.o_y,
            pose.o_z,
            pose.theta
        );
        let state = self.state.lock().await;
        if let Some(connection) = &state.connection {
            connection
                .lock()
                .await
                .send_coords(&pose.to_coords(), state.config.default_speed, CoordMode::Linear)
                .await?;
        }
        Ok(())
    }

    async fn move_to_joint_positions(&self, positions: JointPositions) -> Result<()> {
        tracing::info!("Moving to positions: {:?}", positions.values);
        let state = self.state.lock().await;
        match &state.connection {
            Some(connection) => {
                connection
                    .lock()
                    .await
                    .send_angles(&positions.values, state.config.default_speed)
                    .await?;
            }
            None => tracing::warn!("mycobot not available"),
        }
        Ok(())
    }

    async fn get_joint_positions(&self) -> Result<JointPositions> {
        let state = self.state.lock().await;
        match &state.connection {
            Some(connection) => Ok(JointPositions::new(connection.lock().await.get_angles().await?)),
            None => Ok(JointPositions::default()),
        }
    }

    async fn stop(&self) -> Result<()> {
        let state = self.state.lock().await;
        if let Some(connection) = &state.connection {
            connection.lock().await.stop().await?;
        }
        Ok(())
    }

    async fn is_moving(&self) -> Result<bool> {
        let state = self.state.lock().await;
        match &state.connection {
            Some(connection) => Ok(connection.lock().await.is_moving().await?),
            None => Ok(false),
        }
    }

    async fn get_kinematics(&self) -> Result<(KinematicsFileFormat, Vec<u8>)> {
        Ok(kinematics::included_kinematics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cobot_driver::{
        DriverError, GripperState, SimulatedConnector, SimulatedFault, HOME_COORDS,
    };
    use crate::component_config::Speed;
    use crate::resource::{Api, ARM_MODEL};
    use approx::assert_relative_eq;
    use serde_json::json;

    const PORT: &str = "/dev/ttyAMA0";

    fn arm_config(speed: u8) -> ComponentConfig {
        ComponentConfig::new("arm", Api::Arm, ARM_MODEL.clone()).with_attribute("default_speed", speed)
    }

    async fn connected_arm(speed: u8) -> (Arc<SimulatedConnector>, MyCobotArm) {
        let connector = Arc::new(SimulatedConnector::new());
        let pool = ConnectionPool::new(connector.clone());
        let arm = MyCobotArm::new(&arm_config(speed), pool).await.unwrap();
        (connector, arm)
    }

    fn command(value: serde_json::Value) -> Command {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("command must be an object"),
        }
    }

    #[tokio::test]
    async fn connecting_turns_led_blue() {
        let (connector, arm) = connected_arm(20).await;
        assert!(arm.is_connected().await);
        let session = connector.latest_session(PORT).unwrap();
        assert_eq!(session.lock().unwrap().color, LedColor::new(0, 0, 255));
    }

    #[tokio::test]
    async fn joint_moves_use_default_speed() {
        let (connector, arm) = connected_arm(35).await;
        let target = vec![10.0, 20.0, -30.0, 0.0, 45.0, 90.0];
        arm.move_to_joint_positions(JointPositions::new(target.clone()))
            .await
            .unwrap();
        assert_eq!(arm.get_joint_positions().await.unwrap().values, target);

        let session = connector.latest_session(PORT).unwrap();
        assert_eq!(
            session.lock().unwrap().last_speed,
            Some(Speed::new(35).unwrap())
        );
    }

    #[tokio::test]
    async fn cartesian_moves_are_linear() {
        let (connector, arm) = connected_arm(20).await;
        let pose = Pose {
            x: 120.0,
            y: -40.0,
            z: 180.0,
            o_x: 0.0,
            o_y: 0.0,
            o_z: -1.0,
            theta: 0.0,
        };
        arm.move_to_position(pose).await.unwrap();

        let session = connector.latest_session(PORT).unwrap();
        let state = session.lock().unwrap().clone();
        assert_eq!(state.last_coord_mode, Some(CoordMode::Linear));
        assert_relative_eq!(state.coords[0], 120.0);
        assert_relative_eq!(state.coords[1], -40.0);
        assert_relative_eq!(state.coords[2], 180.0);
        assert_relative_eq!(state.coords[3].abs(), 180.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn end_position_comes_from_coords() {
        let (_connector, arm) = connected_arm(20).await;
        let pose = arm.get_end_position().await.unwrap();
        assert_relative_eq!(pose.x, HOME_COORDS[0]);
        assert_relative_eq!(pose.y, HOME_COORDS[1]);
        assert_relative_eq!(pose.z, HOME_COORDS[2]);
        assert_relative_eq!(pose.o_x, 1.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn driver_errors_pass_through() {
        let (_connector, arm) = connected_arm(20).await;
        let result = arm
            .move_to_joint_positions(JointPositions::new(vec![0.0, 0.0]))
            .await;
        assert!(matches!(
            result,
            Err(ComponentError::Driver(DriverError::JointCount { .. }))
        ));
    }

    #[tokio::test]
    async fn reconfigure_resets_connection() {
        let (connector, arm) = connected_arm(20).await;
        arm.reconfigure(&arm_config(80), &Dependencies::new())
            .await
            .unwrap();

        let sessions = connector.sessions(PORT);
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].lock().unwrap().closed);
        assert!(!sessions[1].lock().unwrap().closed);
        assert_eq!(arm.config().await.default_speed.get(), 80);
    }

    #[tokio::test]
    async fn invalid_reconfigure_keeps_connection() {
        let (connector, arm) = connected_arm(20).await;
        let result = arm.reconfigure(&arm_config(0), &Dependencies::new()).await;
        assert!(matches!(result, Err(ComponentError::Config(_))));
        assert!(arm.is_connected().await);
        assert_eq!(connector.sessions(PORT).len(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_speed() {
        let pool = ConnectionPool::new(Arc::new(SimulatedConnector::new()));
        let result = MyCobotArm::new(&arm_config(101), pool).await;
        assert!(matches!(result, Err(ComponentError::Config(_))));
    }

    #[tokio::test]
    async fn connection_failure_is_reported() {
        let pool = ConnectionPool::new(Arc::new(SimulatedConnector::unavailable()));
        let result = MyCobotArm::new(&arm_config(20), pool).await;
        assert!(matches!(
            result,
            Err(ComponentError::Driver(DriverError::ConnectionError { .. }))
        ));
    }

    #[tokio::test]
    async fn failed_led_setup_releases_connection() {
        let connector = Arc::new(SimulatedConnector::with_faults(&[SimulatedFault::SetColor]));
        let pool = ConnectionPool::new(connector.clone());
        let result = MyCobotArm::new(&arm_config(20), pool.clone()).await;

        assert!(matches!(
            result,
            Err(ComponentError::Driver(DriverError::IoError(_)))
        ));
        assert_eq!(pool.holders(PORT), 0);
        assert!(connector.latest_session(PORT).unwrap().lock().unwrap().closed);
    }

    #[tokio::test]
    async fn closed_arm_answers_with_defaults() {
        let (connector, arm) = connected_arm(20).await;
        arm.close().await.unwrap();
        assert!(connector.latest_session(PORT).unwrap().lock().unwrap().closed);

        assert_eq!(arm.get_end_position().await.unwrap(), Pose::default());
        assert!(arm.get_joint_positions().await.unwrap().values.is_empty());
        assert!(!arm.is_moving().await.unwrap());
        arm.stop().await.unwrap();
        arm.move_to_joint_positions(JointPositions::new(vec![0.0; 6]))
            .await
            .unwrap();
        arm.move_to_position(Pose::default()).await.unwrap();
        let response = arm
            .do_command(&command(json!({"is_gripper_moving": []})))
            .await
            .unwrap();
        assert!(response.is_empty());
        // closing twice is fine
        arm.close().await.unwrap();
    }

    #[tokio::test]
    async fn do_command_drives_gripper() {
        let (connector, arm) = connected_arm(20).await;
        let response = arm
            .do_command(&command(json!({"set_gripper_state": [1, 60], "is_gripper_moving": []})))
            .await
            .unwrap();
        assert_eq!(response.get("set_gripper_state"), Some(&json!(true)));
        assert_eq!(response.get("is_gripper_moving"), Some(&json!(false)));

        let session = connector.latest_session(PORT).unwrap();
        let state = session.lock().unwrap().clone();
        assert_eq!(state.gripper, GripperState::Closed);
        assert_eq!(state.last_speed, Some(Speed::new(60).unwrap()));
    }

    #[tokio::test]
    async fn do_command_ignores_unknown_commands() {
        let (_connector, arm) = connected_arm(20).await;
        let response = arm
            .do_command(&command(json!({"wave": true})))
            .await
            .unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn do_command_rejects_malformed_arguments() {
        let (_connector, arm) = connected_arm(20).await;
        let result = arm
            .do_command(&command(json!({"set_gripper_state": "open"})))
            .await;
        assert!(matches!(result, Err(ComponentError::InvalidCommand { .. })));
    }

    #[tokio::test]
    async fn serves_urdf() {
        let (_connector, arm) = connected_arm(20).await;
        let (format, data) = arm.get_kinematics().await.unwrap();
        assert_eq!(format, KinematicsFileFormat::Urdf);
        assert!(!data.is_empty());
    }
}
