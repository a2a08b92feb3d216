//! # CyberGear Driver
//!
//! 请求-应答驱动层：把异步、无序、广播的 CAN 应答流变成同步的
//! 请求/应答操作，带超时、故障传播和多电机共享总线。
//!
//! ## 模块
//!
//! - `bus`: 总线与请求-应答关联器（并发核心）
//! - `motor`: 电机门面（对外 API）
//! - `error`: 驱动层错误类型
//!
//! ## 并发模型
//!
//! 每条总线一个专用 RX 线程泵入站帧；所有电机操作可从任意线程
//! 并发调用，由单在途请求许可在总线上串行化。本层不做重试，
//! 调用者拿到超时/故障错误后自行决定是否重发。

pub mod bus;
pub mod error;
pub mod motor;

pub use bus::{CanBus, CanBusBuilder, DEFAULT_REPLY_TIMEOUT, DEFAULT_RX_POLL_TIMEOUT};
pub use error::DriverError;
pub use motor::{Motor, RunMode};

// 重新导出常用的协议层类型
pub use cybergear_protocol::control::MotionCommand;
pub use cybergear_protocol::feedback::{Feedback, MotorFeedback, ParamFeedback};
pub use cybergear_protocol::params::{self, ParamDescriptor, ParamValue};
