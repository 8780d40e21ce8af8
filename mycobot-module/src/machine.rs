use crate::error::ModuleError;
use mycobot_controller::{
    arm::Arm,
    component_config::{ComponentConfig, MachineConfig},
    gripper::Gripper,
    resource::{Api, Dependencies, Registry, Resource, ResourceName},
};
use std::{collections::HashMap, sync::Arc};

type Result<T> = std::result::Result<T, ModuleError>;

/// Components of one machine config, built in dependency order
pub struct Machine {
    resources: Vec<Resource>,
}

impl Machine {
    pub async fn build(config: &MachineConfig, registry: &Registry) -> Result<Machine> {
        let order = construction_order(config, registry)?;
        let mut resources: Vec<Resource> = Vec::with_capacity(order.len());
        let mut by_name: HashMap<String, Resource> = HashMap::new();

        for (index, dependency_names) in order {
            let component = &config.components[index];
            let mut dependencies = Dependencies::new();
            for name in &dependency_names {
                if let Some(resource) = by_name.get(name) {
                    dependencies.insert(resource.resource_name(), resource.clone());
                }
            }

            match registry.construct(component, &dependencies).await {
                Ok(resource) => {
                    by_name.insert(component.name.clone(), resource.clone());
                    resources.push(resource);
                }
                Err(source) => {
                    tracing::error!("Failed to build {}, closing built components", component.name);
                    let partial = Machine { resources };
                    if let Err(err) = partial.close().await {
                        tracing::error!("Failed to close partial machine: {}", err);
                    }
                    return Err(ModuleError::Component {
                        name: component.resource_name(),
                        source,
                    });
                }
            }
        }
        Ok(Machine { resources })
    }

    /// Checks a config without connecting anything, returns the components in
    /// construction order with the names they depend on
    pub fn validate(
        config: &MachineConfig,
        registry: &Registry,
    ) -> Result<Vec<(ResourceName, Vec<String>)>> {
        Ok(construction_order(config, registry)?
            .into_iter()
            .map(|(index, names)| (config.components[index].resource_name(), names))
            .collect())
    }

    /// Resources in construction order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn arm(&self, name: &str) -> Option<Arc<dyn Arm>> {
        self.resources.iter().find_map(|resource| match resource {
            Resource::Arm(arm) if arm.name() == name => Some(Arc::clone(arm)),
            _ => None,
        })
    }

    pub fn gripper(&self, name: &str) -> Option<Arc<dyn Gripper>> {
        self.resources.iter().find_map(|resource| match resource {
            Resource::Gripper(gripper) if gripper.name() == name => Some(Arc::clone(gripper)),
            _ => None,
        })
    }

    pub fn first_of(&self, api: Api) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.api() == api)
    }

    /// Closes in reverse construction order, every component gets closed even
    /// if an earlier one fails. The first failure is returned.
    pub async fn close(self) -> Result<()> {
        let mut first_error = None;
        for resource in self.resources.iter().rev() {
            tracing::info!("Closing {}", resource.resource_name());
            if let Err(source) = resource.close().await {
                tracing::error!("Failed to close {}: {}", resource.resource_name(), source);
                if first_error.is_none() {
                    first_error = Some(ModuleError::Component {
                        name: resource.resource_name(),
                        source,
                    });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Dependency names of a component, implicit ones first
fn dependency_names(component: &ComponentConfig, registry: &Registry) -> Result<Vec<String>> {
    let mut names = registry
        .validate_config(component)
        .map_err(|source| ModuleError::Component {
            name: component.resource_name(),
            source,
        })?;
    for name in &component.depends_on {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    Ok(names)
}

/// Indices into `config.components` with their dependency names, each
/// component after everything it depends on. Ties keep config order.
fn construction_order(
    config: &MachineConfig,
    registry: &Registry,
) -> Result<Vec<(usize, Vec<String>)>> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();
    for (index, component) in config.components.iter().enumerate() {
        if index_by_name.insert(&component.name, index).is_some() {
            return Err(ModuleError::DuplicateComponent(component.resource_name()));
        }
    }

    let mut pending = vec![];
    for (index, component) in config.components.iter().enumerate() {
        let names = dependency_names(component, registry)?;
        let mut indices = vec![];
        for name in &names {
            match index_by_name.get(name.as_str()) {
                Some(dependency) => indices.push(*dependency),
                None => {
                    return Err(ModuleError::UnknownDependency {
                        component: component.resource_name(),
                        dependency: name.clone(),
                    })
                }
            }
        }
        pending.push((index, names, indices));
    }

    let mut built = vec![false; config.components.len()];
    let mut order = vec![];
    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|(_, _, indices)| indices.iter().all(|dependency| built[*dependency]));
        match ready {
            Some(position) => {
                let (index, names, _) = pending.remove(position);
                built[index] = true;
                order.push((index, names));
            }
            None => {
                let names = pending
                    .iter()
                    .map(|(index, _, _)| config.components[*index].name.clone())
                    .collect();
                return Err(ModuleError::DependencyCycle(names));
            }
        }
    }
    Ok(order)
}
