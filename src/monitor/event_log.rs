use super::Monitor;
use crate::sim::{Event, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 一个简单的事件收集器（存内存，仿真结束写 JSON 文件）
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Monitor for EventLog {
    fn name(&self) -> &str {
        "events"
    }

    fn on_event(&mut self, event: &Event) {
        self.events.push(event.clone());
    }

    fn persist(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.events)?;
        Ok(())
    }
}
