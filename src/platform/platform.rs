//! 平台拓扑
//!
//! 节点、资源与功耗状态组成的静态拓扑。拓扑本身只读；
//! 资源的当前功耗状态只允许由功耗状态规划器（`power` 模块）修改。

use super::id::{NodeId, PowerStateId, ResourceId};
use super::power::{PowerState, PowerStateKind};
use super::proc_set::ProcSet;
use super::spec::{NodeSpec, PlatformSpec, ResourceSpec};
use crate::sim::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 计算节点：拥有固定的资源集合与功耗状态集合
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub power_states: Vec<PowerState>,
    pub resources: Vec<ResourceId>,
}

impl Node {
    pub fn power_state(&self, id: PowerStateId) -> Result<&PowerState> {
        self.power_states
            .iter()
            .find(|ps| ps.id == id)
            .ok_or(SimError::UnknownPowerState {
                node_id: self.id,
                state_id: id,
            })
    }

    /// 第一个指定类别的功耗状态
    pub fn power_state_of_kind(&self, kind: PowerStateKind) -> Result<&PowerState> {
        self.power_states
            .iter()
            .find(|ps| ps.kind == kind)
            .ok_or(SimError::MissingTransitionState {
                node_id: self.id,
                kind,
            })
    }
}

/// 资源（一个计算单元）
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub node_id: NodeId,
    pub speed: f64,
    pub power_state: PowerStateId,
}

/// 平台：启动时由外部描述构建一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PlatformSpec", try_from = "PlatformSpec")]
pub struct Platform {
    nodes: BTreeMap<NodeId, Node>,
    resources: BTreeMap<ResourceId, Resource>,
}

impl Platform {
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(SimError::UnknownNode { node_id: id })
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource> {
        self.resources
            .get(&id)
            .ok_or(SimError::UnknownResource { resource_id: id })
    }

    /// 按 id 集合查找资源，任一 id 不存在即失败
    pub fn resources_in(&self, set: &ProcSet) -> Result<Vec<&Resource>> {
        set.iter().map(|id| self.resource(id)).collect()
    }

    /// 资源当前的功耗状态描述
    pub fn current_power_state(&self, id: ResourceId) -> Result<&PowerState> {
        let resource = self.resource(id)?;
        self.node(resource.node_id)?.power_state(resource.power_state)
    }

    /// 节点是否处于计算（开机）状态
    pub fn is_node_on(&self, id: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        match node.resources.first() {
            Some(&rid) => Ok(self.current_power_state(rid)?.kind == PowerStateKind::Computation),
            None => Ok(false),
        }
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub(crate) fn set_power_state(&mut self, id: ResourceId, state: PowerStateId) -> Result<()> {
        let resource = self
            .resources
            .get_mut(&id)
            .ok_or(SimError::UnknownResource { resource_id: id })?;
        resource.power_state = state;
        Ok(())
    }
}

impl TryFrom<PlatformSpec> for Platform {
    type Error = SimError;

    fn try_from(spec: PlatformSpec) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        let mut resources = BTreeMap::new();
        for node_spec in spec.nodes {
            let NodeSpec {
                id,
                power_states,
                initial_power_state,
                resources: resource_specs,
            } = node_spec;
            let node = Node {
                id,
                power_states,
                resources: resource_specs.iter().map(|r| r.id).collect(),
            };
            let default_state = match initial_power_state {
                Some(ps) => node.power_state(ps)?.id,
                None => node.power_state_of_kind(PowerStateKind::Computation)?.id,
            };
            for r in resource_specs {
                let power_state = match r.power_state {
                    Some(ps) => node.power_state(ps)?.id,
                    None => default_state,
                };
                let resource = Resource {
                    id: r.id,
                    node_id: id,
                    speed: r.speed,
                    power_state,
                };
                if resources.insert(r.id, resource).is_some() {
                    return Err(SimError::malformed(format!("duplicate resource id {}", r.id)));
                }
            }
            if nodes.insert(id, node).is_some() {
                return Err(SimError::malformed(format!("duplicate node id {id}")));
            }
        }
        Ok(Platform { nodes, resources })
    }
}

impl From<Platform> for PlatformSpec {
    fn from(platform: Platform) -> Self {
        let Platform { nodes, resources } = platform;
        let nodes = nodes
            .into_values()
            .map(|node| NodeSpec {
                id: node.id,
                initial_power_state: None,
                resources: node
                    .resources
                    .iter()
                    .filter_map(|rid| resources.get(rid))
                    .map(|r| ResourceSpec {
                        id: r.id,
                        speed: r.speed,
                        power_state: Some(r.power_state),
                    })
                    .collect(),
                power_states: node.power_states,
            })
            .collect();
        PlatformSpec { nodes }
    }
}
