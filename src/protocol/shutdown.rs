//! 外部进程清理
//!
//! 外部仿真进程一旦成为孤儿会一直占用通道端口，因此所有已启动的进程都登记在
//! 进程级注册表里。首次登记时安装两个钩子，二者都调用同一个幂等的 `teardown_all`：
//! - `atexit`：驱动进程正常退出（包括 `std::process::exit`）时触发；
//! - SIGINT/SIGTERM 处理器：驱动被信号终止时触发，清理后以 130 退出。

use std::process::Child;
use std::sync::{Arc, Mutex, Once, OnceLock, Weak};
use tracing::{debug, warn};

/// 与 `Transport` 共享的子进程槽位；取走后即视为已回收
pub(crate) type ChildSlot = Arc<Mutex<Option<Child>>>;

static LIVE: OnceLock<Mutex<Vec<Weak<Mutex<Option<Child>>>>>> = OnceLock::new();
static HOOKS: Once = Once::new();

fn live() -> &'static Mutex<Vec<Weak<Mutex<Option<Child>>>>> {
    LIVE.get_or_init(|| Mutex::new(Vec::new()))
}

/// 登记一个子进程，必要时安装退出钩子与信号处理器
pub(crate) fn register(slot: &ChildSlot) {
    HOOKS.call_once(install_hooks);
    let mut live = live().lock().unwrap_or_else(|e| e.into_inner());
    live.retain(|w| w.strong_count() > 0);
    live.push(Arc::downgrade(slot));
}

/// 杀死并回收一个槽位中的子进程（幂等）
pub(crate) fn kill_slot(slot: &Mutex<Option<Child>>) {
    let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(mut child) = guard.take() {
        if let Ok(None) = child.try_wait() {
            debug!(pid = child.id(), "终止外部仿真进程");
            let _ = child.kill();
        }
        let _ = child.wait();
    }
}

/// 终止所有仍存活的外部进程（幂等）
pub fn teardown_all() {
    let slots: Vec<_> = {
        let mut live = live().lock().unwrap_or_else(|e| e.into_inner());
        live.drain(..).filter_map(|w| w.upgrade()).collect()
    };
    for slot in slots {
        kill_slot(&slot);
    }
}

extern "C" fn on_process_exit() {
    teardown_all();
}

fn install_hooks() {
    // SAFETY: `on_process_exit` 是无参数、不 unwind 的 extern "C" 函数。
    let rc = unsafe { libc::atexit(on_process_exit) };
    if rc != 0 {
        warn!(rc, "无法注册进程退出钩子");
    }

    if let Err(e) = ctrlc::set_handler(|| {
        teardown_all();
        std::process::exit(130);
    }) {
        warn!(error = %e, "无法安装信号处理器，外部进程仅在正常退出时清理");
    }
}
