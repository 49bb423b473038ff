//! 作业账本
//!
//! 记录作业 id 处于 pending / running / completed / dropped 哪个集合，保证同一 id
//! 在再次注册前只能被 execute/reject/kill 一次。dropped 指被拒绝或被终止的作业。

use crate::job::{Job, JobId};
use crate::sim::{Result, SimError};
use std::collections::{HashMap, HashSet};

/// `kill` 对单个作业的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum KillOutcome {
    /// 尚未开始，直接从 pending 集合移除
    Pending(Job),
    /// 正在运行
    Running,
    /// 已完成，终止为空操作
    AlreadyDone,
}

impl KillOutcome {
    /// 该作业是否应出现在 `JobKilled` 事件中
    pub fn is_killed(&self) -> bool {
        !matches!(self, KillOutcome::AlreadyDone)
    }
}

#[derive(Debug, Default)]
pub struct JobLedger {
    pending: HashMap<JobId, Job>,
    running: HashSet<JobId>,
    completed: HashSet<JobId>,
    dropped: HashSet<JobId>,
}

impl JobLedger {
    pub fn register(&mut self, job: Job) -> Result<()> {
        if self.pending.contains_key(&job.id) || self.running.contains(&job.id) {
            return Err(SimError::DuplicateJob { job_id: job.id });
        }
        self.completed.remove(&job.id);
        self.dropped.remove(&job.id);
        self.pending.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn pending(&self, job_id: &str) -> Option<&Job> {
        self.pending.get(job_id)
    }

    pub fn ensure_pending(&self, op: &'static str, job_id: &str) -> Result<&Job> {
        self.pending.get(job_id).ok_or_else(|| SimError::UnknownJob {
            op,
            job_id: job_id.to_string(),
        })
    }

    /// 作业开始执行：pending → running
    pub fn start(&mut self, op: &'static str, job_id: &str) -> Result<Job> {
        let job = self.take_pending(op, job_id)?;
        self.running.insert(job.id.clone());
        Ok(job)
    }

    /// 作业被拒绝：pending → dropped
    pub fn reject(&mut self, op: &'static str, job_id: &str) -> Result<Job> {
        let job = self.take_pending(op, job_id)?;
        self.dropped.insert(job.id.clone());
        Ok(job)
    }

    /// 终止一组作业。先整体校验再生效：任一 id 未注册、已被拒绝或终止
    /// （包括同一批中重复出现）时返回 `UnknownJob`，账本保持不变。
    /// pending 与 running 的作业转入 dropped；已完成的作业为空操作。
    pub fn kill(&mut self, job_ids: &[JobId]) -> Result<Vec<(JobId, KillOutcome)>> {
        let mut seen = HashSet::with_capacity(job_ids.len());
        for id in job_ids {
            let live = self.pending.contains_key(id) || self.running.contains(id);
            let known = live || self.completed.contains(id);
            if !known || !seen.insert(id.as_str()) {
                return Err(SimError::UnknownJob {
                    op: "kill_jobs",
                    job_id: id.clone(),
                });
            }
        }

        let outcomes = job_ids
            .iter()
            .map(|id| {
                let outcome = if let Some(job) = self.pending.remove(id) {
                    KillOutcome::Pending(job)
                } else if self.running.remove(id) {
                    KillOutcome::Running
                } else {
                    KillOutcome::AlreadyDone
                };
                if outcome.is_killed() {
                    self.dropped.insert(id.clone());
                }
                (id.clone(), outcome)
            })
            .collect();
        Ok(outcomes)
    }

    /// 作业正常结束：running → completed
    pub fn complete(&mut self, job_id: &str) {
        if self.running.remove(job_id) {
            self.completed.insert(job_id.to_string());
        }
    }

    /// 外部报告的终止：仍在 pending/running 的作业转入 dropped
    pub fn retire(&mut self, job_id: &str) {
        if self.running.remove(job_id) || self.pending.remove(job_id).is_some() {
            self.dropped.insert(job_id.to_string());
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.running.clear();
        self.completed.clear();
        self.dropped.clear();
    }

    fn take_pending(&mut self, op: &'static str, job_id: &str) -> Result<Job> {
        self.pending.remove(job_id).ok_or_else(|| SimError::UnknownJob {
            op,
            job_id: job_id.to_string(),
        })
    }
}
