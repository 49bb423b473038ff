//! 平台模块
//!
//! 静态拓扑（节点、资源、功耗状态）、其 JSON 描述以及紧凑资源集合。

mod id;
#[allow(clippy::module_inception)]
mod platform;
mod power;
mod proc_set;
mod spec;

pub use id::{NodeId, PowerStateId, ResourceId};
pub use platform::{Node, Platform, Resource};
pub use power::{PowerState, PowerStateKind};
pub use proc_set::ProcSet;
pub use spec::{NodeSpec, PlatformSpec, ResourceSpec};
