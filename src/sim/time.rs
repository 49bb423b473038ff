//! 仿真时间类型
//!
//! 定义仿真时间及其与线上（浮点秒）格式的转换。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 仿真时间（整数秒）。
///
/// 线上协议使用浮点秒；解码时向下取整，保证 `current_time` 始终是最近事件时间戳的 floor。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    /// 从浮点秒构造（向下取整；负数与 NaN 视为 0）。
    pub fn from_secs_f64(s: f64) -> SimTime {
        if s.is_nan() || s <= 0.0 {
            return SimTime::ZERO;
        }
        SimTime(s.floor() as u64)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64
    }

    /// 时间加上一段秒数（溢出时饱和）。
    pub fn saturating_add(self, secs: u64) -> SimTime {
        SimTime(self.0.saturating_add(secs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(SimTime::from_secs_f64(secs))
    }
}
