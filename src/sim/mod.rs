//! 仿真核心模块
//!
//! 事件驱动仿真器，以及用它驱动 FQ-CoDel 接口的参考环境：出口链路、
//! DRR 调度器、场景描述与运行入口。这些扮演调度核心的外部协作方。

// 子模块声明
mod aqm_world;
mod drr;
mod event;
mod link;
mod runner;
mod scenario;
mod scheduled_event;
mod simulator;
mod time;
mod world;

// 重新导出公共接口
pub use aqm_world::{AqmWorld, FlowReport, InjectFlow, TxDone};
pub use drr::DrrScheduler;
pub use event::Event;
pub use link::Link;
pub use runner::{SimReport, run_scenario};
pub use scenario::{FlowSpec, ScenarioSpec};
pub use scheduled_event::ScheduledEvent;
pub use simulator::Simulator;
pub use time::SimTime;
pub use world::World;
