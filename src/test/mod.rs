mod batch;
mod execution;
mod remote_handle;
mod submitter;

use crate::handle::{SelfContainedHandle, SimulationHandle};
use crate::job::{ExecutionProfile, Job, ProfileKind};
use crate::platform::{
    NodeId, NodeSpec, Platform, PlatformSpec, PowerState, PowerStateId, PowerStateKind, ProcSet,
    ResourceId, ResourceSpec,
};
use crate::sim::{Event, EventType};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};

/// 启动子进程的测试互相串行：`teardown_all` 会清理进程内所有已登记的子进程
static CHILD_PROCESSES: Mutex<()> = Mutex::new(());

pub(crate) fn child_process_lock() -> MutexGuard<'static, ()> {
    CHILD_PROCESSES.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) const COMPUTE: PowerStateId = PowerStateId(0);
pub(crate) const SLEEP: PowerStateId = PowerStateId(1);
pub(crate) const SWITCHING_OFF: PowerStateId = PowerStateId(2);
pub(crate) const SWITCHING_ON: PowerStateId = PowerStateId(3);

/// 两个节点：节点 0 有资源 0-1（速度 2），节点 1 有资源 2-3（速度 1）。
/// 关机耗时 2 秒，开机耗时 4 秒。
pub(crate) fn platform_spec() -> PlatformSpec {
    let power_states = || {
        vec![
            PowerState::new(0, PowerStateKind::Computation, 1.0),
            PowerState::new(1, PowerStateKind::Sleep, 0.1),
            PowerState::new(2, PowerStateKind::SwitchingOff, 0.5),
            PowerState::new(3, PowerStateKind::SwitchingOn, 0.25),
        ]
    };
    let resource = |id: u32, speed: f64| ResourceSpec {
        id: ResourceId(id),
        speed,
        power_state: None,
    };
    PlatformSpec {
        nodes: vec![
            NodeSpec {
                id: NodeId(0),
                power_states: power_states(),
                initial_power_state: None,
                resources: vec![resource(0, 2.0), resource(1, 2.0)],
            },
            NodeSpec {
                id: NodeId(1),
                power_states: power_states(),
                initial_power_state: None,
                resources: vec![resource(2, 1.0), resource(3, 1.0)],
            },
        ],
    }
}

pub(crate) fn platform() -> Platform {
    platform_spec().build().expect("build test platform")
}

pub(crate) fn procs(s: &str) -> ProcSet {
    s.parse().expect("parse proc set")
}

pub(crate) fn profile(name: &str, cpu_work: f64) -> ExecutionProfile {
    ExecutionProfile::new(name, ProfileKind::ParallelHomogeneous, cpu_work)
}

pub(crate) fn job(id: &str, profile: &str, res: u32, walltime: Option<u64>) -> Job {
    Job::new(id, profile, res, walltime)
}

/// 已开始、无工作负载的自包含句柄
pub(crate) fn started_handle() -> SelfContainedHandle {
    let mut handle = SelfContainedHandle::new();
    handle
        .start_with(platform(), None, None)
        .expect("start handle");
    handle
}

/// 记录指定类型的所有事件
pub(crate) fn record(handle: &mut dyn SimulationHandle, types: &[EventType]) -> Rc<RefCell<Vec<Event>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for &event_type in types {
        let log = Rc::clone(&log);
        handle.set_callback(
            event_type,
            Box::new(move |_, event| {
                log.borrow_mut().push(event.clone());
                Ok(())
            }),
        );
    }
    log
}

/// 推进直到仿真结束
pub(crate) fn run_to_end(handle: &mut dyn SimulationHandle) {
    let mut steps = 0;
    while handle.is_running() {
        handle.advance().expect("advance");
        steps += 1;
        assert!(steps < 10_000, "simulation did not terminate");
    }
}
