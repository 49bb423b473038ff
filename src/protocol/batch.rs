//! 出站请求批
//!
//! 累积两次发送之间产生的请求。同一时间戳、同一类型、同一合并键的请求会被合并：
//! 切换功耗状态的请求合并资源集合；唤醒请求去重。

use crate::platform::PowerStateId;
use crate::sim::{Request, RequestBody, SimTime};
use std::collections::HashMap;
use tracing::trace;

/// 合并键：`(时间戳, 请求类型, 类型内的键)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MergeKey {
    SetResourceState(SimTime, PowerStateId),
    CallMeLater(SimTime, u64),
}

impl MergeKey {
    fn of(request: &Request) -> Option<MergeKey> {
        match &request.body {
            RequestBody::SetResourceState { state, .. } => {
                Some(MergeKey::SetResourceState(request.timestamp, *state))
            }
            RequestBody::CallMeLater { at } => {
                Some(MergeKey::CallMeLater(request.timestamp, at.to_bits()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RequestBatch {
    requests: Vec<Request>,
    merged: HashMap<MergeKey, usize>,
}

impl RequestBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入请求；可合并时并入已有请求，返回是否新增了一条请求
    pub fn push(&mut self, request: Request) -> bool {
        let Some(key) = MergeKey::of(&request) else {
            self.requests.push(request);
            return true;
        };

        if let Some(&idx) = self.merged.get(&key) {
            if let (
                RequestBody::SetResourceState { resources, .. },
                RequestBody::SetResourceState { resources: extra, .. },
            ) = (&mut self.requests[idx].body, &request.body)
            {
                resources.union(extra);
            }
            trace!(?key, "合并请求");
            return false;
        }

        self.merged.insert(key, self.requests.len());
        self.requests.push(request);
        true
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// 取出全部请求（按时间戳稳定排序），批次清空
    pub fn drain(&mut self) -> Vec<Request> {
        self.merged.clear();
        let mut requests = std::mem::take(&mut self.requests);
        requests.sort_by_key(|r| r.timestamp);
        requests
    }

    pub fn clear(&mut self) {
        self.merged.clear();
        self.requests.clear();
    }
}
