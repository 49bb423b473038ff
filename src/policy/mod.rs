//! 调度策略
//!
//! 策略只通过 `SimulationHandle` 的回调观察仿真、通过其命令驱动仿真，
//! 因此对两种后端一视同仁。

mod fcfs;

pub use fcfs::FirstComeFirstServed;
