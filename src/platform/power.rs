//! 功耗状态描述

use super::id::PowerStateId;
use serde::{Deserialize, Serialize};

/// 功耗状态类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerStateKind {
    Computation,
    Sleep,
    SwitchingOn,
    SwitchingOff,
}

/// 节点的一个功耗状态。
///
/// 对于切换类状态（switching_on/off），`speed` 表示 `1 / 切换时长`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    pub id: PowerStateId,
    pub kind: PowerStateKind,
    pub speed: f64,
}

impl PowerState {
    pub fn new(id: u32, kind: PowerStateKind, speed: f64) -> Self {
        PowerState {
            id: PowerStateId(id),
            kind,
            speed,
        }
    }

    /// 切换时长（秒）：`1 / speed` 截断取整，可能截断为 0。
    pub fn transition_secs(&self) -> u64 {
        (1.0 / self.speed) as u64
    }

    pub fn is_transition(&self) -> bool {
        matches!(
            self.kind,
            PowerStateKind::SwitchingOn | PowerStateKind::SwitchingOff
        )
    }
}
