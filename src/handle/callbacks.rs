//! 回调注册与事件分发
//!
//! 分发一个事件的顺序：记录状态变化（功耗状态、作业账本）→ 后端钩子 → 监视器 →
//! 该类型的全部回调（按注册顺序）→ 派生事件（例如 `ResourceIdle`）。

use super::SimulationHandle;
use super::ledger::JobLedger;
use crate::monitor::Monitor;
use crate::platform::{Platform, PowerStateKind, ProcSet};
use crate::power;
use crate::sim::{Event, EventBody, EventType, ResourceState, Result};
use std::collections::HashMap;
use tracing::trace;

/// 事件回调：可以通过句柄继续下达命令
pub type Callback = Box<dyn FnMut(&mut dyn SimulationHandle, &Event) -> Result<()>>;

/// 按事件类型分组的回调表
#[derive(Default)]
pub struct CallbackRegistry {
    slots: HashMap<EventType, Vec<Callback>>,
}

impl CallbackRegistry {
    pub fn register(&mut self, event_type: EventType, callback: Callback) {
        self.slots.entry(event_type).or_default().push(callback);
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.slots.get(&event_type).map_or(0, Vec::len)
    }

    /// 暂时取出某类型的回调，避免 &mut self 与回调内 &mut handle 的重叠借用。
    fn take(&mut self, event_type: EventType) -> Vec<Callback> {
        self.slots.remove(&event_type).unwrap_or_default()
    }

    /// 放回取出的回调；分发期间新注册的回调排在其后。
    fn restore(&mut self, event_type: EventType, mut callbacks: Vec<Callback>) {
        let added = self.slots.remove(&event_type).unwrap_or_default();
        callbacks.extend(added);
        if !callbacks.is_empty() {
            self.slots.insert(event_type, callbacks);
        }
    }
}

/// 分发所需的后端内部状态
pub(crate) trait Dispatch: SimulationHandle + Sized {
    fn callbacks_mut(&mut self) -> &mut CallbackRegistry;
    fn monitors_mut(&mut self) -> &mut Vec<Box<dyn Monitor>>;
    fn platform_mut(&mut self) -> Option<&mut Platform>;
    fn ledger_mut(&mut self) -> &mut JobLedger;

    /// 回调之前的后端钩子
    fn before_callbacks(&mut self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

/// 分发单个事件及其派生事件
pub(crate) fn dispatch_one<H: Dispatch>(handle: &mut H, event: Event) -> Result<()> {
    let event_type = event.event_type();
    trace!(at = %event.timestamp, ?event_type, "分发事件");

    let mut power_kind = None;
    match &event.body {
        EventBody::ResourcePowerStateChanged { resources, state } => {
            if let Some(platform) = handle.platform_mut() {
                power_kind = power::apply(platform, resources, *state)?;
            }
        }
        EventBody::JobCompleted { job_id, .. } => handle.ledger_mut().complete(job_id),
        EventBody::JobKilled { job_ids, .. } => {
            for id in job_ids {
                handle.ledger_mut().retire(id);
            }
        }
        _ => {}
    }

    handle.before_callbacks(&event)?;

    for monitor in handle.monitors_mut().iter_mut() {
        monitor.on_event(&event);
    }

    let mut callbacks = handle.callbacks_mut().take(event_type);
    let mut result = Ok(());
    for callback in callbacks.iter_mut() {
        result = callback(&mut *handle, &event);
        if result.is_err() {
            break;
        }
    }
    handle.callbacks_mut().restore(event_type, callbacks);
    result?;

    for derived in follow_ups(&event, power_kind) {
        dispatch_one(handle, derived)?;
    }
    Ok(())
}

/// 由主事件派生的资源层事件
fn follow_ups(event: &Event, power_kind: Option<PowerStateKind>) -> Vec<Event> {
    let at = event.timestamp;
    let touched = |resources: &ProcSet, state: ResourceState| {
        Event::new(
            at,
            EventBody::ResourceStateChanged {
                resources: resources.clone(),
                state,
            },
        )
    };

    match &event.body {
        EventBody::ResourcePowerStateChanged { resources, .. } => {
            let Some(kind) = power_kind else {
                return Vec::new();
            };
            let resources = resources.clone();
            let (state, specific) = match kind {
                PowerStateKind::SwitchingOff => (
                    ResourceState::SwitchingOff,
                    EventBody::ResourceSwitchingOff {
                        resources: resources.clone(),
                    },
                ),
                PowerStateKind::SwitchingOn => (
                    ResourceState::SwitchingOn,
                    EventBody::ResourceSwitchingOn {
                        resources: resources.clone(),
                    },
                ),
                PowerStateKind::Sleep => (
                    ResourceState::Sleeping,
                    EventBody::ResourceSleep {
                        resources: resources.clone(),
                    },
                ),
                PowerStateKind::Computation => (
                    ResourceState::Idle,
                    EventBody::ResourceOn {
                        resources: resources.clone(),
                    },
                ),
            };
            vec![touched(&resources, state), Event::new(at, specific)]
        }
        EventBody::JobStarted { alloc, .. } => vec![
            touched(alloc, ResourceState::Computing),
            Event::new(
                at,
                EventBody::ResourceComputing {
                    resources: alloc.clone(),
                },
            ),
        ],
        EventBody::JobCompleted { alloc, .. } | EventBody::JobKilled { alloc, .. }
            if !alloc.is_empty() =>
        {
            vec![
                touched(alloc, ResourceState::Idle),
                Event::new(
                    at,
                    EventBody::ResourceIdle {
                        resources: alloc.clone(),
                    },
                ),
            ]
        }
        _ => Vec::new(),
    }
}
