//! 功耗状态切换规划
//!
//! 硬件无法在任意功耗状态之间瞬时跳转：进入睡眠必须经过 switching_off，
//! 唤醒关机节点必须经过 switching_on。规划器把“将这些资源切到状态 P”
//! 展开为带正确延迟的一组状态变更事件。

use crate::platform::{Platform, PowerStateId, PowerStateKind, ProcSet, ResourceId};
use crate::sim::{Event, EventBody, Result, SimTime};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// 规划结果
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub target: PowerStateId,
    /// 立即进入的过渡状态：过渡状态 id → 资源集合
    pub transitions: BTreeMap<PowerStateId, ProcSet>,
    /// 最终状态的到达延迟（秒） → 资源集合
    pub finals: BTreeMap<u64, ProcSet>,
}

impl TransitionPlan {
    /// 当前时刻立即分发的过渡事件
    pub fn transition_events(&self, now: SimTime) -> Vec<Event> {
        self.transitions
            .iter()
            .map(|(state, resources)| {
                Event::new(
                    now,
                    EventBody::ResourcePowerStateChanged {
                        resources: resources.clone(),
                        state: *state,
                    },
                )
            })
            .collect()
    }

    /// 到达目标状态的事件（按延迟升序）
    pub fn final_events(&self, now: SimTime) -> Vec<Event> {
        self.finals
            .iter()
            .map(|(delay, resources)| {
                Event::new(
                    now.saturating_add(*delay),
                    EventBody::ResourcePowerStateChanged {
                        resources: resources.clone(),
                        state: self.target,
                    },
                )
            })
            .collect()
    }
}

/// 为 `resources` 规划到 `target` 的切换。每个节点只处理一次，并作用于节点的全部资源。
pub fn plan(platform: &Platform, resources: &ProcSet, target: PowerStateId) -> Result<TransitionPlan> {
    let mut visited = BTreeSet::new();
    let mut transitions: BTreeMap<PowerStateId, ProcSet> = BTreeMap::new();
    let mut finals: BTreeMap<u64, ProcSet> = BTreeMap::new();

    for resource in platform.resources_in(resources)? {
        if !visited.insert(resource.node_id) {
            continue;
        }
        let node = platform.node(resource.node_id)?;
        let next = node.power_state(target)?;
        let transition = match next.kind {
            PowerStateKind::Sleep => Some(node.power_state_of_kind(PowerStateKind::SwitchingOff)?),
            PowerStateKind::Computation if !platform.is_node_on(node.id)? => {
                Some(node.power_state_of_kind(PowerStateKind::SwitchingOn)?)
            }
            _ => None,
        };

        let delay = transition.map_or(0, |ps| ps.transition_secs());
        trace!(node_id = %node.id, ?transition, delay, "节点切换计划");
        for &rid in &node.resources {
            finals.entry(delay).or_default().insert(rid);
            if let Some(ps) = transition {
                transitions.entry(ps.id).or_default().insert(rid);
            }
        }
    }

    debug!(
        target = %target,
        nodes = visited.len(),
        transitions = transitions.len(),
        finals = finals.len(),
        "功耗状态切换规划完成"
    );
    Ok(TransitionPlan {
        target,
        transitions,
        finals,
    })
}

/// 记录资源进入新的功耗状态，返回该状态的类别（资源集合为空时为 `None`）。
///
/// 这是唯一修改资源功耗状态的入口，在对应事件分发时调用。
pub fn apply(
    platform: &mut Platform,
    resources: &ProcSet,
    state: PowerStateId,
) -> Result<Option<PowerStateKind>> {
    let mut kind = None;
    for rid in resources.iter() {
        let node_id = platform.resource(rid)?.node_id;
        let ps_kind = platform.node(node_id)?.power_state(state)?.kind;
        platform.set_power_state(rid, state)?;
        kind.get_or_insert(ps_kind);
    }
    Ok(kind)
}

/// 资源是否处于可计算的功耗状态
pub fn is_available(platform: &Platform, rid: ResourceId) -> bool {
    platform
        .current_power_state(rid)
        .map(|ps| ps.kind == PowerStateKind::Computation)
        .unwrap_or(false)
}
