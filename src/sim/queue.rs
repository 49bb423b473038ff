//! 事件队列
//!
//! 按时间戳排序的待处理事件容器；时间戳相同的事件按插入顺序出队。

use super::event::Event;
use super::time::SimTime;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// 队列项，包含执行时间、序列号和事件本身。
struct Queued {
    at: SimTime,
    seq: u64,
    event: Event,
}

// BinaryHeap 是 max-heap；我们需要最小时间优先，因此反向比较。
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.at.cmp(&other.at) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            ord => ord,
        }
        .reverse()
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Queued {}

/// 可变的时间有序事件队列（单线程、非阻塞）。
#[derive(Default)]
pub struct EventQueue {
    next_seq: u64,
    heap: BinaryHeap<Queued>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入事件
    pub fn add(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        trace!(at = %event.timestamp, seq, event_type = ?event.event_type(), "事件入队");
        self.heap.push(Queued {
            at: event.timestamp,
            seq,
            event,
        });
    }

    /// 查看最早的事件
    pub fn peek_earliest(&self) -> Option<&Event> {
        self.heap.peek().map(|q| &q.event)
    }

    /// 取出最早的事件
    pub fn pop_earliest(&mut self) -> Option<Event> {
        self.heap.pop().map(|q| q.event)
    }

    /// 仅当最早事件的时间戳不晚于 `until` 时取出它。
    pub fn pop_due(&mut self, until: SimTime) -> Option<Event> {
        match self.heap.peek() {
            Some(top) if top.at <= until => self.pop_earliest(),
            _ => None,
        }
    }

    /// 移除所有满足 `pred` 的事件，并按原队列顺序返回被移除的事件。
    pub fn cancel_where<F>(&mut self, mut pred: F) -> Vec<Event>
    where
        F: FnMut(&Event) -> bool,
    {
        let (mut removed, kept): (Vec<Queued>, Vec<Queued>) = std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .partition(|q| pred(&q.event));
        self.heap = BinaryHeap::from(kept);
        // 反向比较下，逆序排序即为出队顺序
        removed.sort_by(|a, b| b.cmp(a));
        removed.into_iter().map(|q| q.event).collect()
    }

    /// 是否存在满足 `pred` 的事件
    pub fn contains<F>(&self, mut pred: F) -> bool
    where
        F: FnMut(&Event) -> bool,
    {
        self.heap.iter().any(|q| pred(&q.event))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
