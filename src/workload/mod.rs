//! 工作负载模块
//!
//! 工作负载描述与作业提交器（把描述转为定时的作业注册调用）。

mod spec;
mod submitter;

pub use spec::{JobKey, JobSpec, WorkloadSpec};
pub use submitter::JobSubmitter;
