//! 数据包类型
//!
//! 调度核心只通过 [`ClassqPacket`] 访问包：长度、时间戳、协议、流标识、
//! 流来源、标志位和可压缩代数。这里给出两种实现：只带头部字段的
//! [`Packet`]（仿真与测试用）和携带真实负载的 [`FramePacket`]。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::sim::SimTime;

/// 传输层协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Quic,
    Other(u8),
}

impl Protocol {
    /// 能否对流控通告作出反应（收到后降低发送速率）。
    ///
    /// 不在此列表中的协议即使被通告也要直接丢包。
    pub fn honors_flow_advisory(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Quic)
    }
}

/// 包的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSource {
    /// 本机 socket 发出，可以接收流控通告
    Socket,
    /// 转发或接口自身产生
    #[default]
    Interface,
    /// 包过滤器等其他来源
    Other,
}

impl FlowSource {
    pub fn supports_flow_control(self) -> bool {
        matches!(self, FlowSource::Socket)
    }
}

bitflags::bitflags! {
    /// 包标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFlags: u32 {
        /// 包当前位于调度路径上（已入队、尚未出队或丢弃）
        const GUARDED = 1 << 0;
        /// 发送方愿意接收流控通告
        const FLOW_ADVISORY = 1 << 1;
    }
}

/// 调度核心看到的包句柄
pub trait ClassqPacket: std::fmt::Debug {
    /// 包长度（字节），必须大于 0
    fn len_bytes(&self) -> u32;
    /// 入队时间戳；出队后被清零
    fn timestamp(&self) -> SimTime;
    fn set_timestamp(&mut self, ts: SimTime);
    fn protocol(&self) -> Protocol;
    fn flow_hash(&self) -> u32;
    fn flow_source(&self) -> FlowSource;
    fn flags(&self) -> PacketFlags;
    fn flags_mut(&mut self) -> &mut PacketFlags;
    /// 可压缩代数；0 表示不可压缩
    fn comp_gen(&self) -> u32;
}

/// 仿真用数据包：只有头部字段
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub flow_hash: u32,
    pub size_bytes: u32,
    pub proto: Protocol,
    pub flow_src: FlowSource,
    pub timestamp: SimTime,
    pub flags: PacketFlags,
    pub comp_gen: u32,
}

impl Packet {
    /// 创建数据包（TCP，来源为接口，不可压缩）
    pub fn new(id: u64, flow_hash: u32, size_bytes: u32, timestamp: SimTime) -> Self {
        Self {
            id,
            flow_hash,
            size_bytes,
            proto: Protocol::default(),
            flow_src: FlowSource::default(),
            timestamp,
            flags: PacketFlags::empty(),
            comp_gen: 0,
        }
    }

    pub fn with_proto(mut self, proto: Protocol) -> Self {
        self.proto = proto;
        self
    }

    /// 标记为本机 socket 发出并愿意接收流控通告
    pub fn from_socket(mut self) -> Self {
        self.flow_src = FlowSource::Socket;
        self.flags.insert(PacketFlags::FLOW_ADVISORY);
        self
    }

    pub fn with_comp_gen(mut self, comp_gen: u32) -> Self {
        self.comp_gen = comp_gen;
        self
    }
}

impl ClassqPacket for Packet {
    fn len_bytes(&self) -> u32 {
        self.size_bytes
    }

    fn timestamp(&self) -> SimTime {
        self.timestamp
    }

    fn set_timestamp(&mut self, ts: SimTime) {
        self.timestamp = ts;
    }

    fn protocol(&self) -> Protocol {
        self.proto
    }

    fn flow_hash(&self) -> u32 {
        self.flow_hash
    }

    fn flow_source(&self) -> FlowSource {
        self.flow_src
    }

    fn flags(&self) -> PacketFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut PacketFlags {
        &mut self.flags
    }

    fn comp_gen(&self) -> u32 {
        self.comp_gen
    }
}

/// 携带负载的数据帧，长度由负载决定
#[derive(Debug, Clone)]
pub struct FramePacket {
    pub payload: Bytes,
    pub flow_hash: u32,
    pub proto: Protocol,
    pub flow_src: FlowSource,
    pub timestamp: SimTime,
    pub flags: PacketFlags,
    pub comp_gen: u32,
}

impl FramePacket {
    pub fn new(payload: impl Into<Bytes>, flow_hash: u32, proto: Protocol, timestamp: SimTime) -> Self {
        Self {
            payload: payload.into(),
            flow_hash,
            proto,
            flow_src: FlowSource::default(),
            timestamp,
            flags: PacketFlags::empty(),
            comp_gen: 0,
        }
    }
}

impl ClassqPacket for FramePacket {
    fn len_bytes(&self) -> u32 {
        u32::try_from(self.payload.len()).unwrap_or(u32::MAX)
    }

    fn timestamp(&self) -> SimTime {
        self.timestamp
    }

    fn set_timestamp(&mut self, ts: SimTime) {
        self.timestamp = ts;
    }

    fn protocol(&self) -> Protocol {
        self.proto
    }

    fn flow_hash(&self) -> u32 {
        self.flow_hash
    }

    fn flow_source(&self) -> FlowSource {
        self.flow_src
    }

    fn flags(&self) -> PacketFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut PacketFlags {
        &mut self.flags
    }

    fn comp_gen(&self) -> u32 {
        self.comp_gen
    }
}
