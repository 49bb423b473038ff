//! 外部仿真进程协议
//!
//! 远程后端与外部进程之间按步交换消息：驱动发送一批请求，外部进程回复一批事件。

mod batch;
mod server;
pub(crate) mod shutdown;
mod transport;

pub use batch::RequestBatch;
pub use server::serve;
pub use shutdown::teardown_all;
pub use transport::{RemoteConfig, Transport, socket_addr};
