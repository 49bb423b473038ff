//! 参考外部仿真进程
//!
//! 连接到驱动绑定的地址，在进程内运行一个 `SelfContainedHandle`：
//! 每收到一批请求就逐条执行、推进一步，并把驱动看不到的计算结果
//! （作业完成、最终功耗状态、唤醒等）作为下一批事件回复。

use super::transport::{Transport, socket_addr};
use crate::handle::{SelfContainedHandle, SimulationHandle};
use crate::job::JobId;
use crate::sim::{
    Event, EventBody, EventType, Inbound, Message, NotifyType, Outbound, Request, RequestBody,
    Result, SimError, SimTime,
};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::net::TcpStream;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// 服务端状态：待回复的事件以及驱动自己产生的作业与唤醒
#[derive(Default)]
struct Outbox {
    events: Vec<Event>,
    driver_jobs: HashSet<JobId>,
    driver_calls: BTreeSet<SimTime>,
    ended: bool,
}

type SharedOutbox = Rc<RefCell<Outbox>>;

/// 驱动可见的事件类型
const FORWARDED: [EventType; 7] = [
    EventType::SimulationBegins,
    EventType::SimulationEnds,
    EventType::JobSubmitted,
    EventType::JobCompleted,
    EventType::JobKilled,
    EventType::ResourcePowerStateChanged,
    EventType::RequestedCall,
];

/// 连接 `address` 并服务一次仿真，直到驱动确认 `SIMULATION_ENDS`。
///
/// `dynamic_jobs` 为真时，提交在驱动通知 `REGISTRATION_FINISHED` 之前不视为结束。
pub fn serve(
    address: &str,
    platform: &Path,
    workload: Option<&Path>,
    output: Option<&Path>,
    dynamic_jobs: bool,
) -> Result<()> {
    let stream = TcpStream::connect(socket_addr(address))?;
    let mut transport = Transport::from_stream(address, stream)?;
    info!(%address, "🔌 已连接驱动");

    let outbox: SharedOutbox = Rc::default();
    let mut handle = SelfContainedHandle::new();
    for event_type in FORWARDED {
        let outbox = Rc::clone(&outbox);
        handle.on(event_type, move |h, event| {
            collect(&mut outbox.borrow_mut(), h, event);
            Ok(())
        });
    }

    handle.start(platform, workload, output)?;
    if dynamic_jobs {
        handle.notify(NotifyType::ContinueRegistration)?;
    }
    reply(&mut transport, &handle, &outbox)?;

    loop {
        let batch: Message<Outbound> = match transport.recv() {
            Ok(batch) => batch,
            Err(SimError::ChannelClosed) if outbox.borrow().ended => break,
            Err(e) => return Err(e),
        };
        if outbox.borrow().ended {
            debug!(now = %batch.now, "收到结束确认");
            break;
        }

        for request in batch.events {
            apply(&mut handle, &outbox, request)?;
        }
        match handle.advance() {
            Ok(()) => {}
            Err(SimError::NoPendingWork { now }) => debug!(%now, "暂无待处理事件"),
            Err(e) => return Err(e),
        }
        reply(&mut transport, &handle, &outbox)?;
    }

    transport.close::<Inbound>(None);
    info!(now = %handle.current_time(), "服务结束");
    Ok(())
}

/// 过滤出驱动需要的事件
fn collect(outbox: &mut Outbox, handle: &dyn SimulationHandle, event: &Event) {
    let forward = match &event.body {
        EventBody::JobSubmitted { job_id, .. } => !outbox.driver_jobs.contains(job_id),
        EventBody::RequestedCall {} => outbox.driver_calls.remove(&event.timestamp),
        EventBody::ResourcePowerStateChanged { resources, state } => {
            // 过渡状态由驱动自行推导
            let transition = handle.platform().and_then(|p| {
                let rid = resources.iter().next()?;
                let node_id = p.resource(rid).ok()?.node_id;
                p.node(node_id).ok()?.power_state(*state).ok().map(|s| s.is_transition())
            });
            transition == Some(false)
        }
        EventBody::SimulationEnds {} => {
            outbox.ended = true;
            true
        }
        _ => true,
    };
    if forward {
        outbox.events.push(event.clone());
    }
}

fn apply(handle: &mut SelfContainedHandle, outbox: &SharedOutbox, request: Request) -> Result<()> {
    debug!(request = request.body.name(), at = %request.timestamp, "执行请求");
    match request.body {
        RequestBody::RejectJob { job_id } => handle.reject_job(&job_id),
        RequestBody::ExecuteJob { job_id, alloc } => handle.execute_job(&job_id, &alloc),
        RequestBody::CallMeLater { at } => {
            let at = SimTime::from_secs_f64(at).max(handle.current_time());
            outbox.borrow_mut().driver_calls.insert(at);
            handle.schedule_callback(at)
        }
        RequestBody::KillJob { job_ids } => handle.kill_jobs(&job_ids),
        RequestBody::RegisterJob { job_id, job } => {
            outbox.borrow_mut().driver_jobs.insert(job_id);
            handle.register_job(job)
        }
        RequestBody::RegisterProfile {
            workload_name,
            profile,
            ..
        } => handle.register_profile(&workload_name, profile),
        RequestBody::SetResourceState { resources, state } => {
            handle.set_resource_power_state(&resources, state)
        }
        RequestBody::Notify { kind } => handle.notify(kind),
    }
}

fn reply(transport: &mut Transport, handle: &SelfContainedHandle, outbox: &SharedOutbox) -> Result<()> {
    let events = std::mem::take(&mut outbox.borrow_mut().events);
    if events.is_empty() && !handle.is_running() {
        warn!("仿真已结束但没有待回复的事件");
    }
    transport.send(&Message::new(handle.current_time(), events))
}
