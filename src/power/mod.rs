//! 功耗管理模块

mod planner;

pub use planner::{TransitionPlan, apply, is_available, plan};
