//! SocketCAN CAN 适配器实现
//!
//! 基于 Linux 内核 SocketCAN 子系统的后端。
//!
//! ## 依赖
//!
//! - `socketcan` crate (版本 3.5)
//! - CAN 接口必须已配置（通过 `ip link` 命令，1 Mbps）
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **接口配置**：波特率等配置由系统工具（`ip link`）完成，不在应用层设置
//!
//! ## 分离（split）的共享状态陷阱
//!
//! 分离通过 `try_clone()`（`dup()` 系统调用）实现，文件状态标志
//! 保存在"打开文件描述"中而不是 FD 中。分离后的适配器严禁使用
//! `set_nonblocking()`，超时必须依赖 `SO_RCVTIMEO`。

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, CanFrame, RxAdapter,
            SplittableAdapter, TxAdapter};
use socketcan::{
    BlockingCan, CanFrame as RawCanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Socket,
};
use std::time::Duration;
use tracing::{trace, warn};

/// 默认读超时（接收循环的轮询周期）
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use cybergear_can::{CanAdapter, SocketCanAdapter};
/// use cybergear_protocol::CanFrame;
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(CanFrame::new_extended(0x0300_007F, &[])).unwrap();
/// let reply = adapter.receive().unwrap();
/// # let _ = reply;
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    interface: String,
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 创建新的 SocketCAN 适配器
    ///
    /// 打开 socket 之前检查接口是否存在且已启动（UP 状态），
    /// 失败时返回带修复提示的错误信息。
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在、未启动或无法打开
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        check_interface_up(&interface)?;

        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                format!("Failed to open CAN interface '{interface}': {e}"),
            ))
        })?;

        socket
            .set_read_timeout(DEFAULT_READ_TIMEOUT)
            .map_err(CanError::Io)?;

        trace!("SocketCAN adapter opened on '{}'", interface);
        Ok(Self {
            socket,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// 接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        // SO_RCVTIMEO 为 0 表示永久阻塞，这里用 1us 下限模拟零超时
        let effective = timeout.max(Duration::from_micros(1));
        self.socket.set_read_timeout(effective).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: CanFrame) -> Result<(), CanError> {
        let raw = raw_frame(&frame)?;
        self.socket.transmit(&raw).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {e}"
            )))
        })?;
        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    fn receive(&mut self) -> Result<CanFrame, CanError> {
        receive_data_frame(&self.socket)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {e}");
        }
    }
}

impl SplittableAdapter for SocketCanAdapter {
    type RxAdapter = SocketCanRxAdapter;
    type TxAdapter = SocketCanTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError> {
        let tx_socket = std::os::fd::AsFd::as_fd(&self.socket)
            .try_clone_to_owned()
            .map(CanSocket::from)
            .map_err(|e| {
                CanError::Io(std::io::Error::other(format!(
                    "Failed to clone SocketCAN socket for TX: {e}"
                )))
            })?;
        trace!("SocketCAN adapter split on '{}'", self.interface);
        Ok((
            SocketCanRxAdapter {
                socket: self.socket,
            },
            SocketCanTxAdapter { socket: tx_socket },
        ))
    }
}

/// 只收适配器（接收线程持有）
///
/// 读超时沿用分离前通过 [`CanAdapter::set_receive_timeout`] 设置的值。
#[derive(Debug)]
pub struct SocketCanRxAdapter {
    socket: CanSocket,
}

impl RxAdapter for SocketCanRxAdapter {
    fn receive(&mut self) -> Result<CanFrame, CanError> {
        receive_data_frame(&self.socket)
    }
}

/// 只发适配器（调用线程持有）
#[derive(Debug)]
pub struct SocketCanTxAdapter {
    socket: CanSocket,
}

impl TxAdapter for SocketCanTxAdapter {
    fn send(&mut self, frame: CanFrame) -> Result<(), CanError> {
        let raw = raw_frame(&frame)?;
        self.socket.transmit(&raw).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {e}"
            )))
        })
    }
}

/// CanFrame -> socketcan 帧
fn raw_frame(frame: &CanFrame) -> Result<RawCanFrame, CanError> {
    if !frame.is_extended {
        return Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::InvalidFrame,
            "CyberGear protocol requires extended (29-bit) frames",
        )));
    }
    ExtendedId::new(frame.id)
        .and_then(|id| RawCanFrame::new(id, frame.data_slice()))
        .ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to create extended frame with ID 0x{:X}", frame.id),
            ))
        })
}

/// 读一个有效数据帧（过滤远程帧和错误帧）
fn receive_data_frame(socket: &CanSocket) -> Result<CanFrame, CanError> {
    loop {
        let raw = socket.read_frame().map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => CanError::Timeout,
            _ => CanError::Io(e),
        })?;

        match raw {
            RawCanFrame::Data(data_frame) => {
                let frame = CanFrame {
                    id: data_frame.raw_id(),
                    data: {
                        let mut data = [0u8; 8];
                        let payload = data_frame.data();
                        let len = payload.len().min(8);
                        data[..len].copy_from_slice(&payload[..len]);
                        data
                    },
                    len: data_frame.data().len().min(8) as u8,
                    is_extended: data_frame.is_extended(),
                };
                trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
                return Ok(frame);
            }
            RawCanFrame::Remote(_) => {
                trace!("Ignoring remote frame");
            }
            RawCanFrame::Error(error_frame) => {
                warn!("CAN error frame: {:?}", error_frame);
            }
        }
    }
}

/// 检查 CAN 接口是否存在且为 UP 状态
///
/// 仅检查，不自动配置。vcan 等虚拟接口的 operstate 为 "unknown"，
/// 视为可用。
fn check_interface_up(interface: &str) -> Result<(), CanError> {
    let sys_path = format!("/sys/class/net/{interface}");
    if !std::path::Path::new(&sys_path).exists() {
        return Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::NotFound,
            format!(
                "CAN interface '{interface}' does not exist. Create it first:\n  \
                 sudo ip link add dev {interface} type vcan && sudo ip link set up {interface}"
            ),
        )));
    }

    let operstate = std::fs::read_to_string(format!("{sys_path}/operstate"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    if operstate == "down" {
        return Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::UnsupportedConfig,
            format!(
                "CAN interface '{interface}' exists but is not UP. Start it first:\n  \
                 sudo ip link set up {interface}"
            ),
        )));
    }
    Ok(())
}
