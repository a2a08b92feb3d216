//! # CyberGear CAN Adapter Layer
//!
//! CAN 硬件抽象层，提供统一的 CAN 接口抽象。
//!
//! 驱动层只依赖本模块的 trait，不依赖具体后端：
//! - Linux 下提供 SocketCAN 后端（`socketcan` feature，默认开启）
//! - 测试下提供 Mock 后端（`mock` feature）

use std::time::Duration;
use thiserror::Error;

// 重新导出 cybergear-protocol 中的 CanFrame
pub use cybergear_protocol::CanFrame;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan::{SocketCanAdapter, SocketCanRxAdapter, SocketCanTxAdapter};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockCanAdapter, MockCanHandle};

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

impl CanError {
    /// 错误是否不可恢复（接收循环据此决定退出）
    pub fn is_fatal(&self) -> bool {
        match self {
            CanError::Device(e) => e.is_fatal(),
            CanError::BusOff | CanError::NotStarted => true,
            CanError::Io(_) | CanError::Timeout => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    UnsupportedConfig,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NoDevice
                | CanDeviceErrorKind::AccessDenied
                | CanDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// 统一 CAN 适配器接口
pub trait CanAdapter {
    fn send(&mut self, frame: CanFrame) -> Result<(), CanError>;
    fn receive(&mut self) -> Result<CanFrame, CanError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<CanFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    fn try_receive(&mut self) -> Result<Option<CanFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// 只收适配器（接收线程持有）
pub trait RxAdapter: Send {
    fn receive(&mut self) -> Result<CanFrame, CanError>;
}

/// 只发适配器（调用线程持有）
pub trait TxAdapter: Send {
    fn send(&mut self, frame: CanFrame) -> Result<(), CanError>;
}

/// 可分离为独立收/发两端的适配器
///
/// 分离后 RX 和 TX 可以在不同线程中并发使用。
pub trait SplittableAdapter: CanAdapter {
    type RxAdapter: RxAdapter + 'static;
    type TxAdapter: TxAdapter + 'static;
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError>;
}
