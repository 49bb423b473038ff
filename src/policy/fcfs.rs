//! 先来先服务
//!
//! 等待队列按提交顺序排列；每当有作业提交或资源释放，就把队首作业分配到
//! id 最小的空闲可用资源上，直到队首作业所需资源不足为止。请求资源数
//! 超过平台规模的作业直接拒绝。

use crate::handle::SimulationHandle;
use crate::job::{Job, JobId, JobState};
use crate::platform::{ProcSet, ResourceId};
use crate::power;
use crate::sim::{Event, EventBody, EventType, Result, SimTime};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct FirstComeFirstServed {
    queue: VecDeque<Job>,
    allocations: HashMap<JobId, ProcSet>,
    busy: BTreeSet<ResourceId>,
    completed: usize,
    walltime_reached: usize,
    killed: usize,
    rejected: usize,
    makespan: SimTime,
}

impl FirstComeFirstServed {
    /// 在句柄上注册回调，返回共享的策略状态
    pub fn attach(handle: &mut dyn SimulationHandle) -> Rc<RefCell<Self>> {
        let policy = Rc::new(RefCell::new(FirstComeFirstServed::default()));
        for event_type in [
            EventType::JobSubmitted,
            EventType::JobCompleted,
            EventType::JobKilled,
        ] {
            let policy = Rc::clone(&policy);
            handle.set_callback(
                event_type,
                Box::new(move |h, event| policy.borrow_mut().on_event(h, event)),
            );
        }
        policy
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn running(&self) -> usize {
        self.allocations.len()
    }

    /// 已完成的作业数（包括达到 walltime 的）
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn walltime_reached(&self) -> usize {
        self.walltime_reached
    }

    pub fn killed(&self) -> usize {
        self.killed
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// 最后一个作业结束的时间
    pub fn makespan(&self) -> SimTime {
        self.makespan
    }

    fn on_event(&mut self, handle: &mut dyn SimulationHandle, event: &Event) -> Result<()> {
        match &event.body {
            EventBody::JobSubmitted { job, .. } => self.queue.push_back(job.clone()),
            EventBody::JobCompleted {
                job_id, job_state, ..
            } => {
                self.release(job_id);
                self.completed += 1;
                if *job_state == JobState::CompletedWalltimeReached {
                    self.walltime_reached += 1;
                }
                self.makespan = self.makespan.max(event.timestamp);
            }
            EventBody::JobKilled { job_ids, .. } => {
                for id in job_ids {
                    self.release(id);
                    self.queue.retain(|j| &j.id != id);
                    self.killed += 1;
                }
                self.makespan = self.makespan.max(event.timestamp);
            }
            _ => return Ok(()),
        }
        self.schedule(handle)
    }

    fn release(&mut self, job_id: &str) {
        if let Some(alloc) = self.allocations.remove(job_id) {
            for rid in alloc.iter() {
                self.busy.remove(&rid);
            }
        }
    }

    /// 按队列顺序分配，队首放不下时停止
    fn schedule(&mut self, handle: &mut dyn SimulationHandle) -> Result<()> {
        while let Some(job) = self.queue.front() {
            let Some(platform) = handle.platform() else {
                return Ok(());
            };
            let needed = job.res as usize;
            if needed == 0 || needed > platform.resource_count() {
                let Some(job) = self.queue.pop_front() else {
                    break;
                };
                info!(job_id = %job.id, res = job.res, "作业无法满足，拒绝");
                handle.reject_job(&job.id)?;
                self.rejected += 1;
                continue;
            }

            let alloc: ProcSet = platform
                .resources()
                .map(|r| r.id)
                .filter(|rid| !self.busy.contains(rid) && power::is_available(platform, *rid))
                .take(needed)
                .collect();
            if alloc.len() < needed {
                debug!(job_id = %job.id, needed, idle = alloc.len(), "资源不足，等待释放");
                break;
            }

            let Some(job) = self.queue.pop_front() else {
                break;
            };
            debug!(job_id = %job.id, %alloc, "分配作业");
            handle.execute_job(&job.id, &alloc)?;
            self.busy.extend(alloc.iter());
            self.allocations.insert(job.id, alloc);
        }
        Ok(())
    }
}
