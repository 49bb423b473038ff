//! 作业

use crate::sim::SimTime;
use serde::{Deserialize, Serialize};

/// 作业 id（由工作负载提交时为 `"<workload>!<id>"`）
pub type JobId = String;

/// 作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Submitted,
    Allocated,
    Rejected,
    Running,
    CompletedSuccessfully,
    CompletedWalltimeReached,
    Killed,
}

/// 作业描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub profile: String,
    /// 请求的资源数
    pub res: u32,
    /// 最长允许运行时间（秒）；`None` 表示不限
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walltime: Option<u64>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub subtime: SimTime,
    #[serde(default)]
    pub state: JobState,
}

impl Job {
    pub fn new(id: impl Into<JobId>, profile: impl Into<String>, res: u32, walltime: Option<u64>) -> Self {
        Job {
            id: id.into(),
            profile: profile.into(),
            res,
            walltime,
            user: String::new(),
            subtime: SimTime::ZERO,
            state: JobState::Submitted,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}
