//! 29 位仲裁 ID 的打包/解包
//!
//! CyberGear 协议把命令类型和寻址信息打包进 CAN 扩展帧的仲裁 ID，
//! 且请求方向和反馈方向使用**不同**的布局：
//!
//! ```text
//! 请求（主机 -> 电机）：
//!   bit 28-24  命令类型（5 bit）
//!   bit 23-8   数据区 2（主机 ID，运控指令时为量化力矩）
//!   bit 7-0    目标电机 ID
//!
//! 反馈（电机 -> 主机）：
//!   bit 28-24  命令类型（5 bit）
//!   bit 23-22  电机模式（0 Reset / 1 Cali / 2 Motor）
//!   bit 21-16  故障标志位
//!   bit 15-8   电机 ID
//!   bit 7-0    主机 ID
//! ```
//!
//! 两个方向的解码函数都提供，由调用者按预期方向选择，
//! 绝不从位模式推断方向。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 29 位扩展帧 ID 掩码
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

/// 仲裁 ID 的通讯类型（bit 24-28，5 bit）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CmdType {
    /// 获取设备 ID
    GetDeviceId = 0,
    /// 电机运控模式
    MotorControl = 1,
    /// 电机反馈
    MotorFeedback = 2,
    /// 电机使能
    MotorEnable = 3,
    /// 电机停止
    MotorStop = 4,
    /// 设置机械零点
    SetMechanicalZero = 6,
    /// 设置电机 CAN ID
    SetMotorCanId = 7,
    /// 参数表写入
    ParamTableWrite = 8,
    /// 单个参数读取
    SingleParamRead = 17,
    /// 单个参数写入
    SingleParamWrite = 18,
    /// 故障反馈
    FaultFeedback = 21,
}

/// 请求方向仲裁 ID 的解码结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// 命令类型
    pub cmd: CmdType,
    /// 数据区 2（主机 ID 或量化力矩）
    pub data16: u16,
    /// 目标电机 ID
    pub target_id: u8,
}

/// 计算请求方向的仲裁 ID
pub fn request_id(cmd: CmdType, data16: u16, target_id: u8) -> u32 {
    (u8::from(cmd) as u32) << 24 | (data16 as u32) << 8 | target_id as u32
}

/// 解码请求方向的仲裁 ID
pub fn parse_request_id(id: u32) -> Result<RequestHeader, ProtocolError> {
    let raw_cmd = ((id >> 24) & 0x1F) as u8;
    let cmd =
        CmdType::try_from(raw_cmd).map_err(|_| ProtocolError::UnknownCmd { cmd: raw_cmd })?;
    Ok(RequestHeader {
        cmd,
        data16: ((id >> 8) & 0xFFFF) as u16,
        target_id: (id & 0xFF) as u8,
    })
}

/// 从反馈方向仲裁 ID 提取原始命令类型（bit 24-28）
pub fn feedback_cmd(id: u32) -> u8 {
    ((id >> 24) & 0x1F) as u8
}

/// 从反馈方向仲裁 ID 提取电机 ID（bit 8-15）
pub fn feedback_motor_id(id: u32) -> u8 {
    ((id >> 8) & 0xFF) as u8
}

/// 从反馈方向仲裁 ID 提取主机 ID（bit 0-7）
pub fn feedback_master_id(id: u32) -> u8 {
    (id & 0xFF) as u8
}

/// 反馈帧故障标志位（bit 16-21）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultFlags {
    /// 欠压（bit 16）
    pub undervoltage: bool,
    /// 过流（bit 17）
    pub overcurrent: bool,
    /// 过温（bit 18）
    pub overheat: bool,
    /// 磁编码故障（bit 19）
    pub magnetic_error: bool,
    /// HALL 编码故障（bit 20）
    pub hall_error: bool,
}

impl FaultFlags {
    /// 从反馈方向仲裁 ID 提取故障标志
    pub fn from_feedback_id(id: u32) -> Self {
        Self {
            undervoltage: id >> 16 & 1 == 1,
            overcurrent: id >> 17 & 1 == 1,
            overheat: id >> 18 & 1 == 1,
            magnetic_error: id >> 19 & 1 == 1,
            hall_error: id >> 20 & 1 == 1,
        }
    }

    /// 是否存在任意故障
    pub fn has_fault(&self) -> bool {
        self.undervoltage
            || self.overcurrent
            || self.overheat
            || self.magnetic_error
            || self.hall_error
    }
}

/// 电机模式（反馈帧 bit 22-23）
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum MotorMode {
    /// Reset 模式
    Reset = 0,
    /// 标定模式
    Calibration = 1,
    /// 运行模式
    Motor = 2,
}

impl MotorMode {
    /// 从反馈方向仲裁 ID 提取电机模式
    pub fn from_feedback_id(id: u32) -> Result<Self, ProtocolError> {
        let raw = ((id >> 22) & 0x3) as u8;
        Self::try_from(raw).map_err(|_| ProtocolError::InvalidValue {
            field: "MotorMode",
            value: raw,
        })
    }
}
