//! # CyberGear Protocol
//!
//! CyberGear 电机 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `arbitration`: 29 位仲裁 ID 的打包/解包
//! - `quantize`: 物理量 <-> 定点整数的线性量化
//! - `params`: 可调参数表（索引、格式、范围）
//! - `control`: 控制帧构建
//! - `feedback`: 反馈帧解析
//!
//! ## 字节序
//!
//! 协议混用两种字节序：反馈帧数据区为 Motorola (MSB) 大端，
//! 参数写入和运控指令数据区为 Intel (LSB) 小端。
//! 各模块内的编码/解码函数已经固定了对应方向的字节序。

pub mod arbitration;
pub mod constants;
pub mod control;
pub mod feedback;
pub mod params;
pub mod quantize;

pub use arbitration::{CmdType, FaultFlags, MotorMode, RequestHeader};
pub use constants::*;
pub use control::MotionCommand;
pub use feedback::{FaultFeedback, Feedback, MotorFeedback, ParamFeedback};
pub use params::{ParamDescriptor, ParamFormat, ParamValue};

use thiserror::Error;

/// CAN 2.0 帧的统一抽象
///
/// 协议层和硬件层之间的中间类型：协议层负责构建/解析，
/// CAN 适配层负责与具体后端（SocketCAN 等）的转换。
///
/// # 设计特性
///
/// - **Copy trait**：零成本复制，适合高频 CAN 场景
/// - **固定 8 字节**：避免堆分配
/// - **无生命周期**：自包含数据结构，简化 API
///
/// CyberGear 协议只使用扩展帧（29 位 ID），`is_extended`
/// 字段保留给适配层做一致性检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanFrame {
    /// CAN ID（29 位扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,
}

impl CanFrame {
    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id: id & arbitration::CAN_EFF_MASK,
            data: fixed_data,
            len: len as u8,
            is_extended: true,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unknown command type: {cmd}")]
    UnknownCmd { cmd: u8 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("Parameter {param} expects {expected:?} value")]
    FormatMismatch {
        param: &'static str,
        expected: params::ParamFormat,
    },
}
