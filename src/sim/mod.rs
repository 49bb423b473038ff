//! 仿真核心模块
//!
//! 此模块包含离散事件仿真的基础组件：仿真时间、事件/请求、事件队列与错误类型。

// 子模块声明
mod error;
mod event;
mod queue;
mod time;

// 重新导出公共接口
pub use error::{Result, SimError};
pub use event::{
    Direction, Event, EventBody, EventType, Inbound, Message, NotifyType, Outbound, Request,
    RequestBody, ResourceState, Stamped,
};
pub use queue::EventQueue;
pub use time::SimTime;
