//! 执行画像（profile）

use serde::{Deserialize, Serialize};
use std::fmt;

/// 画像类别。只有两种 parallel_homogeneous 类别可以在自包含后端中执行，
/// 其余类别仅能透传给外部仿真进程。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    ParallelHomogeneous,
    ParallelHomogeneousTotal,
    Delay,
    Parallel,
    Composed,
    ParallelHomogeneousPfs,
    DataStaging,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileKind::ParallelHomogeneous => "parallel_homogeneous",
            ProfileKind::ParallelHomogeneousTotal => "parallel_homogeneous_total",
            ProfileKind::Delay => "delay",
            ProfileKind::Parallel => "parallel",
            ProfileKind::Composed => "composed",
            ProfileKind::ParallelHomogeneousPfs => "parallel_homogeneous_pfs",
            ProfileKind::DataStaging => "data_staging",
        };
        f.write_str(name)
    }
}

/// 命名的执行开销描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProfile {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProfileKind,
    /// 计算量（flops）
    #[serde(rename = "cpu", default)]
    pub cpu_work: f64,
}

impl ExecutionProfile {
    pub fn new(name: impl Into<String>, kind: ProfileKind, cpu_work: f64) -> Self {
        ExecutionProfile {
            name: name.into(),
            kind,
            cpu_work,
        }
    }
}
