use crate::arm::{Arm, MyCobotArm};
use crate::cobot_driver::CobotConnector;
use crate::commands::Command;
use crate::component_config::ComponentConfig;
use crate::connection::ConnectionPool;
use crate::error::ComponentError;
use crate::gripper::{Gripper, MyCobotGripper};
use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, convert::TryFrom, fmt, str::FromStr, sync::Arc};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    #[serde(rename = "rdk:component:arm")]
    Arm,
    #[serde(rename = "rdk:component:gripper")]
    Gripper,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::Arm => "rdk:component:arm",
            Api::Gripper => "rdk:component:gripper",
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("model {0:?} is not of the form namespace:family:name")]
pub struct ModelParseError(String);

/// Model triplet such as `hipsterbrown:arm:mycobot280`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Model {
    pub namespace: String,
    pub family: String,
    pub name: String,
}

impl Model {
    pub fn new(namespace: &str, family: &str, name: &str) -> Model {
        Model {
            namespace: namespace.to_owned(),
            family: family.to_owned(),
            name: name.to_owned(),
        }
    }
}

impl FromStr for Model {
    type Err = ModelParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = text.split(':').collect();
        match parts.as_slice() {
            [namespace, family, name]
                if !namespace.is_empty() && !family.is_empty() && !name.is_empty() =>
            {
                Ok(Model::new(namespace, family, name))
            }
            _ => Err(ModelParseError(text.to_owned())),
        }
    }
}

impl TryFrom<String> for Model {
    type Error = ModelParseError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<Model> for String {
    fn from(model: Model) -> String {
        model.to_string()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.family, self.name)
    }
}

lazy_static! {
    pub static ref ARM_MODEL: Model = Model::new("hipsterbrown", "arm", "mycobot280");
    pub static ref GRIPPER_MODEL: Model = Model::new("hipsterbrown", "gripper", "mycobot");
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    pub api: Api,
    pub name: String,
}

impl ResourceName {
    pub fn new(api: Api, name: &str) -> ResourceName {
        ResourceName {
            api,
            name: name.to_owned(),
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api, self.name)
    }
}

/// Lifecycle shared by every component the host runtime manages
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;
    async fn reconfigure(
        &self,
        config: &ComponentConfig,
        dependencies: &Dependencies,
    ) -> Result<(), ComponentError>;
    async fn do_command(&self, command: &Command) -> Result<Command, ComponentError>;
    async fn close(&self) -> Result<(), ComponentError>;
}

#[derive(Clone)]
pub enum Resource {
    Arm(Arc<dyn Arm>),
    Gripper(Arc<dyn Gripper>),
}

impl Resource {
    pub fn api(&self) -> Api {
        match self {
            Resource::Arm(_) => Api::Arm,
            Resource::Gripper(_) => Api::Gripper,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Arm(arm) => arm.name(),
            Resource::Gripper(gripper) => gripper.name(),
        }
    }

    pub fn resource_name(&self) -> ResourceName {
        ResourceName::new(self.api(), self.name())
    }

    pub async fn reconfigure(
        &self,
        config: &ComponentConfig,
        dependencies: &Dependencies,
    ) -> Result<(), ComponentError> {
        match self {
            Resource::Arm(arm) => arm.reconfigure(config, dependencies).await,
            Resource::Gripper(gripper) => gripper.reconfigure(config, dependencies).await,
        }
    }

    pub async fn do_command(&self, command: &Command) -> Result<Command, ComponentError> {
        match self {
            Resource::Arm(arm) => arm.do_command(command).await,
            Resource::Gripper(gripper) => gripper.do_command(command).await,
        }
    }

    pub async fn close(&self) -> Result<(), ComponentError> {
        match self {
            Resource::Arm(arm) => arm.close().await,
            Resource::Gripper(gripper) => gripper.close().await,
        }
    }
}

pub type Dependencies = HashMap<ResourceName, Resource>;

pub fn arm_dependency(dependencies: &Dependencies, name: &str) -> Result<Arc<dyn Arm>, ComponentError> {
    let resource_name = ResourceName::new(Api::Arm, name);
    match dependencies.get(&resource_name) {
        Some(Resource::Arm(arm)) => Ok(Arc::clone(arm)),
        _ => Err(ComponentError::MissingDependency(resource_name)),
    }
}

enum RegisteredModel {
    MyCobotArm,
    MyCobotGripper,
}

/// Models this module provides and how to build them
pub struct Registry {
    pool: Arc<ConnectionPool>,
}

impl Registry {
    pub fn new(pool: Arc<ConnectionPool>) -> Registry {
        Registry { pool }
    }

    pub fn with_connector(connector: Arc<dyn CobotConnector>) -> Registry {
        Registry::new(ConnectionPool::new(connector))
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn models(&self) -> Vec<(Api, Model)> {
        vec![
            (Api::Arm, ARM_MODEL.clone()),
            (Api::Gripper, GRIPPER_MODEL.clone()),
        ]
    }

    fn lookup(&self, config: &ComponentConfig) -> Result<RegisteredModel, ComponentError> {
        let (api, registered) = if config.model == *ARM_MODEL {
            (Api::Arm, RegisteredModel::MyCobotArm)
        } else if config.model == *GRIPPER_MODEL {
            (Api::Gripper, RegisteredModel::MyCobotGripper)
        } else {
            return Err(ComponentError::UnknownModel(config.model.clone()));
        };
        if api != config.api {
            return Err(ComponentError::ApiMismatch {
                api: config.api,
                model: config.model.clone(),
            });
        }
        Ok(registered)
    }

    /// Checks the attributes and returns the names of implicit dependencies
    pub fn validate_config(&self, config: &ComponentConfig) -> Result<Vec<String>, ComponentError> {
        match self.lookup(config)? {
            RegisteredModel::MyCobotArm => MyCobotArm::validate_config(config),
            RegisteredModel::MyCobotGripper => MyCobotGripper::validate_config(config),
        }
    }

    pub async fn construct(
        &self,
        config: &ComponentConfig,
        dependencies: &Dependencies,
    ) -> Result<Resource, ComponentError> {
        let resource = match self.lookup(config)? {
            RegisteredModel::MyCobotArm => {
                Resource::Arm(Arc::new(MyCobotArm::new(config, Arc::clone(&self.pool)).await?))
            }
            RegisteredModel::MyCobotGripper => {
                Resource::Gripper(Arc::new(MyCobotGripper::new(config, dependencies).await?))
            }
        };
        tracing::info!("Constructed {} as {}", resource.resource_name(), config.model);
        Ok(resource)
    }
}
