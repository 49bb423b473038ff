//! 监视器（外部观察者）
//!
//! 监视器被动观察分发的事件，在仿真结束时把累积的视图写到由输出目标派生的文件中。

mod event_log;

pub use event_log::EventLog;

use crate::sim::{Event, Result};
use std::path::{Path, PathBuf};

/// 事件观察者接口
pub trait Monitor {
    /// 用于派生输出文件名
    fn name(&self) -> &str;
    fn on_event(&mut self, event: &Event);
    fn persist(&self, path: &Path) -> Result<()>;
}

/// 输出文件路径：`<output>_<name>.json`
pub fn sink_path(output: &Path, name: &str) -> PathBuf {
    let mut raw = output.as_os_str().to_owned();
    raw.push(format!("_{name}.json"));
    PathBuf::from(raw)
}

/// 依次持久化所有监视器（必要时创建输出目录）
pub fn persist_all(monitors: &[Box<dyn Monitor>], output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    for monitor in monitors {
        let path = sink_path(output, monitor.name());
        tracing::info!(monitor = monitor.name(), path = %path.display(), "写出监视器数据");
        monitor.persist(&path)?;
    }
    Ok(())
}
