use crate::{error::ModuleError, machine::Machine};
use mycobot_controller::{
    arm::{Arm, JointPositions},
    cobot_driver::JOINT_COUNT,
    error::ComponentError,
    gripper::Gripper,
    resource::{Api, Resource, ResourceName},
    spatial_math::Pose,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

type Result<T> = std::result::Result<T, ModuleError>;

const REACH: Pose = Pose {
    x: 150.0,
    y: 0.0,
    z: 120.0,
    o_x: 0.0,
    o_y: 0.0,
    o_z: -1.0,
    theta: 0.0,
};

/// Pick cycle settings
pub struct PickCycle {
    pub cycles: Option<u32>,
    pub pause: Duration,
}

/// Runs pick cycles on the machine's first arm and gripper until the cycle
/// limit is hit or `keep_running` is cleared. The machine is closed whether
/// the cycles succeed or not. Returns the number of completed cycles.
pub async fn run(machine: Machine, settings: PickCycle, keep_running: Arc<AtomicBool>) -> Result<u32> {
    let cycled = match first_arm(&machine) {
        Some(arm) => {
            let gripper = first_gripper(&machine);
            pick_cycles(&arm, gripper.as_ref(), &settings, &keep_running).await
        }
        None => Err(ModuleError::NoArm),
    };
    let closed = machine.close().await;
    let completed = cycled?;
    closed?;
    Ok(completed)
}

fn first_arm(machine: &Machine) -> Option<Arc<dyn Arm>> {
    match machine.first_of(Api::Arm) {
        Some(Resource::Arm(arm)) => Some(Arc::clone(arm)),
        _ => None,
    }
}

fn first_gripper(machine: &Machine) -> Option<Arc<dyn Gripper>> {
    match machine.first_of(Api::Gripper) {
        Some(Resource::Gripper(gripper)) => Some(Arc::clone(gripper)),
        _ => None,
    }
}

fn component_error(api: Api, name: &str) -> impl Fn(ComponentError) -> ModuleError + '_ {
    move |source| ModuleError::Component {
        name: ResourceName::new(api, name),
        source,
    }
}

async fn pick_cycles(
    arm: &Arc<dyn Arm>,
    gripper: Option<&Arc<dyn Gripper>>,
    settings: &PickCycle,
    keep_running: &AtomicBool,
) -> Result<u32> {
    let arm_error = component_error(Api::Arm, arm.name());
    let home = JointPositions::new(vec![0.0; JOINT_COUNT]);

    let mut completed = 0;
    while keep_running.load(Ordering::Relaxed)
        && settings.cycles.map_or(true, |limit| completed < limit)
    {
        arm.move_to_joint_positions(home.clone()).await.map_err(&arm_error)?;
        if let Some(gripper) = gripper {
            gripper
                .open()
                .await
                .map_err(component_error(Api::Gripper, gripper.name()))?;
        }
        sleep(settings.pause).await;

        if !keep_running.load(Ordering::Relaxed) {
            continue;
        }

        arm.move_to_position(REACH).await.map_err(&arm_error)?;
        let grabbed = match gripper {
            Some(gripper) => gripper
                .grab()
                .await
                .map_err(component_error(Api::Gripper, gripper.name()))?,
            None => false,
        };
        let pose = arm.get_end_position().await.map_err(&arm_error)?;
        tracing::info!(
            "Cycle {} reached x = {:.1}, y = {:.1}, z = {:.1}, grabbed: {}",
            completed + 1,
            pose.x,
            pose.y,
            pose.z,
            grabbed
        );
        sleep(settings.pause).await;
        completed += 1;
    }

    tracing::info!("Moving to home");
    arm.move_to_joint_positions(home).await.map_err(&arm_error)?;
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycobot_controller::{
        cobot_driver::{GripperState, SimulatedConnector, SimulatedFault},
        component_config::{ComponentConfig, MachineConfig},
        resource::{Registry, GRIPPER_MODEL},
    };

    const PORT: &str = "/dev/ttyAMA0";

    fn settings(cycles: u32) -> PickCycle {
        PickCycle {
            cycles: Some(cycles),
            pause: Duration::ZERO,
        }
    }

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[tokio::test]
    async fn runs_requested_cycles_and_closes() {
        let connector = Arc::new(SimulatedConnector::new());
        let registry = Registry::with_connector(connector.clone());
        let machine = Machine::build(&MachineConfig::included().unwrap(), &registry)
            .await
            .unwrap();

        let completed = run(machine, settings(2), running()).await.unwrap();
        assert_eq!(completed, 2);

        let session = connector.latest_session(PORT).unwrap();
        let state = session.lock().unwrap().clone();
        assert_eq!(state.gripper, GripperState::Closed);
        assert_eq!(state.angles, vec![0.0; JOINT_COUNT]);
        assert!(state.closed);
        assert_eq!(registry.pool().holders(PORT), 0);
    }

    #[tokio::test]
    async fn stopped_flag_skips_cycles() {
        let registry = Registry::with_connector(Arc::new(SimulatedConnector::new()));
        let machine = Machine::build(&MachineConfig::included().unwrap(), &registry)
            .await
            .unwrap();
        let keep_running = Arc::new(AtomicBool::new(false));

        assert_eq!(run(machine, settings(5), keep_running).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_cycle_still_closes_machine() {
        let connector = Arc::new(SimulatedConnector::with_faults(&[SimulatedFault::SendAngles]));
        let registry = Registry::with_connector(connector.clone());
        let machine = Machine::build(&MachineConfig::included().unwrap(), &registry)
            .await
            .unwrap();

        let result = run(machine, settings(1), running()).await;
        assert!(matches!(result, Err(ModuleError::Component { .. })));
        assert_eq!(registry.pool().holders(PORT), 0);
        assert!(connector.latest_session(PORT).unwrap().lock().unwrap().closed);
    }

    #[tokio::test]
    async fn machine_without_arm_is_rejected() {
        let registry = Registry::with_connector(Arc::new(SimulatedConnector::new()));
        let config = MachineConfig {
            components: vec![ComponentConfig::new("gripper", Api::Gripper, GRIPPER_MODEL.clone())
                .with_attribute("arm_name", "arm")],
        };
        // the gripper cannot be built without its arm either
        assert!(Machine::build(&config, &registry).await.is_err());

        let empty = Machine::build(&MachineConfig::default(), &registry).await.unwrap();
        assert!(matches!(
            run(empty, settings(1), running()).await,
            Err(ModuleError::NoArm)
        ));
    }
}
