use crate::arm::Arm;
use crate::cobot_driver::GripperState;
use crate::commands::{self, ArmCommand, Command};
use crate::component_config::{ComponentConfig, GripperConfig};
use crate::error::ComponentError;
use crate::resource::{arm_dependency, Component, Dependencies};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

type Result<T> = std::result::Result<T, ComponentError>;

#[async_trait]
pub trait Gripper: Component {
    async fn open(&self) -> Result<()>;
    /// Closes the jaws, true if the arm acknowledged
    async fn grab(&self) -> Result<bool>;
    async fn stop(&self) -> Result<()>;
    async fn is_moving(&self) -> Result<bool>;
}

struct GripperInner {
    config: GripperConfig,
    arm: Arc<dyn Arm>,
}

/// Adaptive gripper mounted on a myCobot arm.
///
/// It shares the arm's serial line, so every call is a `do_command` on the
/// arm named by `arm_name`.
pub struct MyCobotGripper {
    name: String,
    state: RwLock<GripperInner>,
}

impl MyCobotGripper {
    pub fn validate_config(config: &ComponentConfig) -> Result<Vec<String>> {
        let gripper_config = GripperConfig::from_attributes(&config.attributes)?;
        Ok(vec![gripper_config.arm_name])
    }

    pub async fn new(config: &ComponentConfig, dependencies: &Dependencies) -> Result<MyCobotGripper> {
        Ok(MyCobotGripper {
            name: config.name.clone(),
            state: RwLock::new(Self::resolve(config, dependencies)?),
        })
    }

    pub async fn config(&self) -> GripperConfig {
        self.state.read().await.config.clone()
    }

    fn resolve(config: &ComponentConfig, dependencies: &Dependencies) -> Result<GripperInner> {
        let config = GripperConfig::from_attributes(&config.attributes)?;
        let arm = arm_dependency(dependencies, &config.arm_name)?;
        Ok(GripperInner { config, arm })
    }

    /// Sends through the arm without holding our own lock
    async fn send(&self, command: ArmCommand) -> Result<Command> {
        let arm = Arc::clone(&self.state.read().await.arm);
        arm.do_command(&command.to_command()).await
    }

    async fn set_jaws(&self, jaws: GripperState) -> Result<bool> {
        let speed = self.state.read().await.config.default_speed;
        let command = ArmCommand::SetGripperState { state: jaws, speed };
        let response = self.send(command).await?;
        Ok(commands::response_flag(&response, command.key()))
    }
}

#[async_trait]
impl Component for MyCobotGripper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reconfigure(&self, config: &ComponentConfig, dependencies: &Dependencies) -> Result<()> {
        let resolved = Self::resolve(config, dependencies)?;
        *self.state.write().await = resolved;
        Ok(())
    }

    async fn do_command(&self, command: &Command) -> Result<Command> {
        tracing::debug!("Gripper {} has no commands, ignoring {:?}", self.name, command);
        Ok(Command::new())
    }

    /// The arm owns the connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Gripper for MyCobotGripper {
    async fn open(&self) -> Result<()> {
        self.set_jaws(GripperState::Open).await?;
        Ok(())
    }

    async fn grab(&self) -> Result<bool> {
        self.set_jaws(GripperState::Closed).await
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn is_moving(&self) -> Result<bool> {
        let response = self.send(ArmCommand::IsGripperMoving).await?;
        Ok(commands::response_flag(&response, commands::IS_GRIPPER_MOVING))
    }
}
