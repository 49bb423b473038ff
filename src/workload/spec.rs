use crate::job::{ExecutionProfile, Job};
use crate::sim::{Result, SimError, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// 工作负载描述（JSON）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// 在最后一个作业提交后仍需保持仿真运行到的时刻（秒）
    #[serde(default)]
    pub simulation_time: Option<f64>,
    pub profiles: BTreeMap<String, ExecutionProfile>,
    pub jobs: Vec<JobSpec>,
}

/// 作业 id 在描述文件中可以是数字或字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobKey {
    Number(u64),
    Text(String),
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::Number(n) => write!(f, "{n}"),
            JobKey::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobKey,
    pub subtime: f64,
    pub res: u32,
    #[serde(default)]
    pub walltime: Option<f64>,
    pub profile: String,
    #[serde(default)]
    pub user: String,
}

impl WorkloadSpec {
    pub fn load(path: &Path) -> Result<WorkloadSpec> {
        let describe = |source: SimError| SimError::Description {
            path: path.to_path_buf(),
            source: Box::new(source),
        };
        let raw = fs::read_to_string(path).map_err(|e| describe(e.into()))?;
        serde_json::from_str(&raw).map_err(|e| describe(e.into()))
    }

    /// 画像列表（名字取自映射的键）
    pub fn profiles(&self) -> Vec<ExecutionProfile> {
        self.profiles
            .iter()
            .map(|(name, profile)| ExecutionProfile {
                name: name.clone(),
                ..profile.clone()
            })
            .collect()
    }

    /// 作业列表（id 加上工作负载名前缀，按提交时间稳定排序）
    pub fn jobs(&self, workload_name: &str) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .map(|j| Job {
                id: format!("{workload_name}!{}", j.id),
                profile: j.profile.clone(),
                res: j.res,
                walltime: j.walltime.map(|w| SimTime::from_secs_f64(w).0),
                user: j.user.clone(),
                subtime: SimTime::from_secs_f64(j.subtime),
                state: Default::default(),
            })
            .collect();
        jobs.sort_by_key(|j| j.subtime);
        jobs
    }
}
