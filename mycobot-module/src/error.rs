use mycobot_controller::{error::ComponentError, resource::ResourceName};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("component {0} is configured more than once")]
    DuplicateComponent(ResourceName),
    #[error("component {component} depends on unknown component {dependency}")]
    UnknownDependency {
        component: ResourceName,
        dependency: String,
    },
    #[error("machine config has no arm")]
    NoArm,
    #[error("dependency cycle between {0:?}")]
    DependencyCycle(Vec<String>),
    #[error("component {name} failed: {source}")]
    Component {
        name: ResourceName,
        #[source]
        source: ComponentError,
    },
}
