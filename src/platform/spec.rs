//! 平台描述（JSON）

use super::id::{NodeId, PowerStateId, ResourceId};
use super::platform::Platform;
use super::power::PowerState;
use crate::sim::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub power_states: Vec<PowerState>,
    /// 资源未指定时的初始功耗状态；缺省为第一个计算状态
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_power_state: Option<PowerStateId>,
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub id: ResourceId,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<PowerStateId>,
}

impl PlatformSpec {
    /// 读取并解析平台描述文件
    pub fn load(path: &Path) -> Result<PlatformSpec> {
        let describe = |source: SimError| SimError::Description {
            path: path.to_path_buf(),
            source: Box::new(source),
        };
        let raw = fs::read_to_string(path).map_err(|e| describe(e.into()))?;
        serde_json::from_str(&raw).map_err(|e| describe(e.into()))
    }

    pub fn build(self) -> Result<Platform> {
        Platform::try_from(self)
    }
}
