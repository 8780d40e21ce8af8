use crate::cobot_driver::DriverError;
use crate::component_config::ConfigError;
use crate::resource::{Api, Model, ResourceName};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("myCobot error: {0}")]
    Driver(#[from] DriverError),
    #[error("no component registered for model {0}")]
    UnknownModel(Model),
    #[error("model {model} does not implement {api}")]
    ApiMismatch { api: Api, model: Model },
    #[error("missing dependency {0}")]
    MissingDependency(ResourceName),
    #[error("invalid {name} command: {reason}")]
    InvalidCommand { name: String, reason: String },
}
