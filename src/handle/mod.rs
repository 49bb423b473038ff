//! 仿真句柄
//!
//! 策略代码通过 `SimulationHandle` 驱动仿真、通过按事件类型注册的回调观察仿真。
//! 两种后端实现同一接口，在构造时选定：
//! - `SelfContainedHandle`：进程内直接计算作业运行时间与功耗状态切换；
//! - `RemoteHandle`：把同样的计算委托给外部仿真进程，按步批量交换请求/事件。

mod callbacks;
mod ledger;
mod local;
mod remote;

pub use callbacks::{Callback, CallbackRegistry};
pub use ledger::{JobLedger, KillOutcome};
pub use local::SelfContainedHandle;
pub use remote::RemoteHandle;

use crate::job::{ExecutionProfile, Job, JobId};
use crate::monitor::Monitor;
use crate::platform::{Platform, PowerStateId, ProcSet};
use crate::sim::{Event, EventType, NotifyType, Result, SimTime};
use std::path::Path;

/// 两种后端共享的能力集合
pub trait SimulationHandle {
    fn is_running(&self) -> bool;

    /// 当前仿真时间（最近处理事件时间戳的 floor）
    fn current_time(&self) -> SimTime;

    /// 仿真开始后可用的平台视图
    fn platform(&self) -> Option<&Platform>;

    /// 开始仿真：构建平台，分发 `SimulationBegins`，如配置了工作负载则启动提交器。
    fn start(&mut self, platform: &Path, workload: Option<&Path>, output: Option<&Path>) -> Result<()>;

    /// 单步推进：推进到下一事件时刻并分发该时刻的全部事件；无后续工作时结束仿真。
    fn advance(&mut self) -> Result<()>;

    /// 结束仿真（幂等）：释放资源、写出监视器并分发 `SimulationEnds`。
    fn finish(&mut self) -> Result<()>;

    /// 通知外部进程本步无请求（自包含后端为空操作）
    fn acknowledge(&mut self) -> Result<()>;

    fn execute_job(&mut self, job_id: &str, alloc: &ProcSet) -> Result<()>;

    fn reject_job(&mut self, job_id: &str) -> Result<()>;

    fn kill_jobs(&mut self, job_ids: &[JobId]) -> Result<()>;

    fn register_job(&mut self, job: Job) -> Result<()>;

    fn register_profile(&mut self, workload: &str, profile: ExecutionProfile) -> Result<()>;

    fn set_resource_power_state(&mut self, resources: &ProcSet, state: PowerStateId) -> Result<()>;

    /// 确保在 `at` 时刻恰好存在一个唤醒事件
    fn schedule_callback(&mut self, at: SimTime) -> Result<()>;

    fn notify(&mut self, kind: NotifyType) -> Result<()>;

    /// 注册回调；同一类型可注册多个，按注册顺序调用
    fn set_callback(&mut self, event_type: EventType, callback: Callback);

    fn add_monitor(&mut self, monitor: Box<dyn Monitor>);

    /// `set_callback` 的便捷形式
    fn on<F>(&mut self, event_type: EventType, callback: F)
    where
        Self: Sized,
        F: FnMut(&mut dyn SimulationHandle, &Event) -> Result<()> + 'static,
    {
        self.set_callback(event_type, Box::new(callback));
    }
}
