//! 包与标识符
//!
//! 此模块定义调度核心处理的包句柄以及流、服务类的标识符。

// 子模块声明
mod id;
mod packet;

// 重新导出公共接口
pub use id::{ClassId, FlowId, FlowKey};
pub use packet::{ClassqPacket, FlowSource, FramePacket, Packet, PacketFlags, Protocol};
