//! 传输层
//!
//! 管理一个外部仿真进程与一条双向消息通道。通道在进程启动前绑定；
//! 每条消息是一行紧凑 JSON（以 `\n` 结尾）。

use super::shutdown::{self, ChildSlot};
use crate::sim::{Direction, Message, Result, SimError};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const ACCEPT_POLL: Duration = Duration::from_millis(10);
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// 外部进程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// 外部仿真程序
    pub program: PathBuf,
    /// 绑定地址（`tcp://host:port`）；缺省时绑定本机空闲端口
    #[serde(default)]
    pub address: Option<String>,
    /// 追加到命令行末尾的参数
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            program: PathBuf::from("batsim"),
            address: None,
            extra_args: Vec::new(),
        }
    }
}

impl RemoteConfig {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        RemoteConfig {
            program: program.into(),
            ..Default::default()
        }
    }
}

/// `tcp://host:port` → `host:port`
pub fn socket_addr(address: &str) -> &str {
    address.strip_prefix("tcp://").unwrap_or(address)
}

pub struct Transport {
    address: String,
    child: Option<ChildSlot>,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Transport {
    /// 绑定通道、启动外部进程并等待其连接
    pub fn launch(
        config: &RemoteConfig,
        platform: &Path,
        workload: Option<&Path>,
        output: Option<&Path>,
    ) -> Result<Transport> {
        let bind_to = config
            .address
            .as_deref()
            .map(socket_addr)
            .unwrap_or("127.0.0.1:0");
        let listener = TcpListener::bind(bind_to)?;
        let local = listener.local_addr()?;
        let address = format!("tcp://{local}");

        let mut cmd = Command::new(&config.program);
        cmd.arg("-s").arg(&address).arg("-p").arg(platform);
        match workload {
            Some(w) => cmd.arg("-w").arg(w),
            None => cmd.arg("--enable-dynamic-jobs"),
        };
        if let Some(out) = output {
            cmd.arg("-e").arg(out);
        }
        cmd.args(&config.extra_args).stdin(Stdio::null());

        info!(program = %config.program.display(), %address, "🚀 启动外部仿真进程");
        let child = cmd.spawn()?;
        let slot: ChildSlot = Arc::new(Mutex::new(Some(child)));
        shutdown::register(&slot);

        let stream = match accept_while_alive(&listener, &slot) {
            Ok(stream) => stream,
            Err(e) => {
                shutdown::kill_slot(&slot);
                return Err(e);
            }
        };
        let mut transport = Transport::from_stream(address, stream)
            .inspect_err(|_| shutdown::kill_slot(&slot))?;
        transport.child = Some(slot);
        Ok(transport)
    }

    /// 基于已连接的流构造（不管理任何进程）
    pub fn from_stream(address: impl Into<String>, stream: TcpStream) -> Result<Transport> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Transport {
            address: address.into(),
            child: None,
            reader: BufReader::new(stream),
            writer,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn send<D: Direction>(&mut self, msg: &Message<D>) -> Result<()> {
        trace!(now = %msg.now, len = msg.events.len(), "发送消息");
        write_line(&mut self.writer, msg)
    }

    /// 阻塞直到收到一条消息
    pub fn recv<D: Direction>(&mut self) -> Result<Message<D>> {
        match read_line(&mut self.reader) {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(self.closed_error()),
            Err(SimError::Io(e)) if is_disconnect(&e) => Err(self.closed_error()),
            Err(e) => Err(e),
        }
    }

    /// 关闭通道：可选地先发送确认，给进程一段宽限期退出，之后强制终止
    pub fn close<D: Direction>(&mut self, ack: Option<&Message<D>>) {
        if let Some(msg) = ack {
            if let Err(e) = self.send(msg) {
                debug!(error = %e, "确认消息发送失败");
            }
        }
        let _ = self.writer.shutdown(std::net::Shutdown::Both);

        if let Some(slot) = self.child.take() {
            wait_with_grace(&slot, EXIT_GRACE);
            shutdown::kill_slot(&slot);
        }
    }

    fn closed_error(&self) -> SimError {
        let Some(slot) = &self.child else {
            return SimError::ChannelClosed;
        };
        // 通道断开通常意味着进程已退出，稍等片刻以取得退出状态
        let deadline = Instant::now() + Duration::from_millis(500);
        loop {
            let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_mut().map(|c| c.try_wait()) {
                Some(Ok(Some(status))) => return SimError::ProcessExited { status },
                Some(Ok(None)) if Instant::now() < deadline => {}
                _ => return SimError::ChannelClosed,
            }
            drop(guard);
            thread::sleep(ACCEPT_POLL);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(slot) = self.child.take() {
            shutdown::kill_slot(&slot);
        }
    }
}

/// 轮询 accept，同时检查进程是否已经退出
fn accept_while_alive(listener: &TcpListener, slot: &ChildSlot) -> Result<TcpStream> {
    listener.set_nonblocking(true)?;
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "外部仿真进程已连接");
                return Ok(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
                match guard.as_mut().map(|c| c.try_wait()) {
                    Some(Ok(Some(status))) => {
                        warn!(%status, "外部仿真进程在连接前退出");
                        return Err(SimError::ProcessExited { status });
                    }
                    // 进程已被清理（例如收到终止信号）
                    None => return Err(SimError::ChannelClosed),
                    _ => {}
                }
                drop(guard);
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn wait_with_grace(slot: &ChildSlot, grace: Duration) {
    let deadline = Instant::now() + grace;
    loop {
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) if Instant::now() < deadline => {}
            _ => return,
        }
        drop(guard);
        thread::sleep(ACCEPT_POLL);
    }
}

fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

/// 写出一行 JSON
pub(crate) fn write_line<T: Serialize>(writer: &mut TcpStream, msg: &T) -> Result<()> {
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

/// 读取一行 JSON；对端关闭时返回 `None`
pub(crate) fn read_line<T: for<'de> Deserialize<'de>>(
    reader: &mut BufReader<TcpStream>,
) -> Result<Option<T>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| SimError::malformed(format!("{e}: {}", line.trim_end())))
}
