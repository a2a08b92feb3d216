//! 反馈帧解析
//!
//! 按反馈方向仲裁 ID 的命令类型分类入站帧，解码为封闭的
//! [`Feedback`] 枚举。未建模的命令类型解析为 [`Feedback::Unknown`]，
//! 由上层记录后丢弃（对固件新消息类型保持前向兼容），绝不报错。

#[cfg(test)]
use crate::arbitration;
use crate::arbitration::{
    CmdType, FaultFlags, MotorMode, feedback_cmd, feedback_master_id, feedback_motor_id,
};
use crate::constants::*;
use crate::quantize::decode_ranged;
use crate::{CanFrame, ProtocolError};

/// 应答电机反馈帧（类型 2）
///
/// 数据区为 4 个大端 u16，按各自物理范围反量化。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorFeedback {
    /// 电机 CAN ID
    pub motor_id: u8,
    /// 主机 CAN ID
    pub master_id: u8,
    /// 故障标志位
    pub faults: FaultFlags,
    /// 电机模式
    pub mode: MotorMode,
    /// 当前角度（rad）
    pub angle: f64,
    /// 当前角速度（rad/s）
    pub velocity: f64,
    /// 当前力矩（N·m）
    pub torque: f64,
    /// 当前温度（摄氏度）
    pub temperature: f64,
}

/// 单个参数读写应答帧（类型 17）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamFeedback {
    /// 电机 CAN ID
    pub motor_id: u8,
    /// 主机 CAN ID
    pub master_id: u8,
    /// 参数索引
    pub index: u16,
    /// 原始参数值（byte 4-7），按描述符格式另行解释
    pub raw: [u8; 4],
}

impl ParamFeedback {
    /// 按 f32 格式解释参数值（小端）
    pub fn as_f32(&self) -> f32 {
        f32::from_le_bytes(self.raw)
    }

    /// 按 u8 格式解释参数值
    pub fn as_u8(&self) -> u8 {
        self.raw[0]
    }

    /// 按 i16 格式解释参数值（小端）
    pub fn as_i16(&self) -> i16 {
        i16::from_le_bytes([self.raw[0], self.raw[1]])
    }

    /// 按 i32 格式解释参数值（小端）
    pub fn as_i32(&self) -> i32 {
        i32::from_le_bytes(self.raw)
    }
}

/// 故障反馈帧（类型 21）
///
/// 原始故障码保留给调用者对照手册解读。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultFeedback {
    /// 电机 CAN ID
    pub motor_id: u8,
    /// 主机 CAN ID
    pub master_id: u8,
    /// 原始故障码（完整 8 字节数据区）
    pub code: [u8; 8],
}

/// 入站帧分类结果（封闭和类型）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feedback {
    /// 电机反馈帧
    Motor(MotorFeedback),
    /// 参数读写应答帧
    Param(ParamFeedback),
    /// 故障反馈帧（对在途请求而言永远是错误）
    Fault(FaultFeedback),
    /// 未建模的命令类型，记录后丢弃
    Unknown { cmd: u8 },
}

/// 解析入站帧
///
/// # 错误
/// - [`ProtocolError::InvalidLength`]: 已知类型但数据区长度不符
/// - [`ProtocolError::InvalidValue`]: 电机模式字段非法
pub fn parse_feedback(frame: &CanFrame) -> Result<Feedback, ProtocolError> {
    let raw_cmd = feedback_cmd(frame.id);
    let Ok(cmd) = CmdType::try_from(raw_cmd) else {
        return Ok(Feedback::Unknown { cmd: raw_cmd });
    };

    match cmd {
        CmdType::MotorFeedback => parse_motor_feedback(frame).map(Feedback::Motor),
        CmdType::SingleParamRead | CmdType::SingleParamWrite => {
            parse_param_feedback(frame).map(Feedback::Param)
        }
        CmdType::FaultFeedback => Ok(Feedback::Fault(FaultFeedback {
            motor_id: feedback_motor_id(frame.id),
            master_id: feedback_master_id(frame.id),
            code: frame.data,
        })),
        _ => Ok(Feedback::Unknown { cmd: raw_cmd }),
    }
}

fn parse_motor_feedback(frame: &CanFrame) -> Result<MotorFeedback, ProtocolError> {
    expect_len(frame, 8)?;
    let d = &frame.data;

    let angle_raw = u16::from_be_bytes([d[0], d[1]]) as u32;
    let velocity_raw = u16::from_be_bytes([d[2], d[3]]) as u32;
    let torque_raw = u16::from_be_bytes([d[4], d[5]]) as u32;
    let temperature_raw = u16::from_be_bytes([d[6], d[7]]) as u32;

    Ok(MotorFeedback {
        motor_id: feedback_motor_id(frame.id),
        master_id: feedback_master_id(frame.id),
        faults: FaultFlags::from_feedback_id(frame.id),
        mode: MotorMode::from_feedback_id(frame.id)?,
        angle: decode_ranged(angle_raw, ANGLE_FEEDBACK_RANGE.0, ANGLE_FEEDBACK_RANGE.1, 16),
        velocity: decode_ranged(velocity_raw, VELOCITY_RANGE.0, VELOCITY_RANGE.1, 16),
        torque: decode_ranged(torque_raw, TORQUE_RANGE.0, TORQUE_RANGE.1, 16),
        temperature: decode_ranged(
            temperature_raw,
            TEMPERATURE_RANGE.0,
            TEMPERATURE_RANGE.1,
            16,
        ),
    })
}

fn parse_param_feedback(frame: &CanFrame) -> Result<ParamFeedback, ProtocolError> {
    expect_len(frame, 8)?;
    let d = &frame.data;
    Ok(ParamFeedback {
        motor_id: feedback_motor_id(frame.id),
        master_id: feedback_master_id(frame.id),
        // 应答帧索引为大端（与写入方向的小端不同，实测行为）
        index: u16::from_be_bytes([d[0], d[1]]),
        raw: [d[4], d[5], d[6], d[7]],
    })
}

fn expect_len(frame: &CanFrame, expected: usize) -> Result<(), ProtocolError> {
    if frame.len as usize != expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: frame.len as usize,
        });
    }
    Ok(())
}

/// 构造反馈方向的仲裁 ID（测试与回放工具使用）
pub fn feedback_id(cmd: CmdType, mode: MotorMode, motor_id: u8, master_id: u8) -> u32 {
    (u8::from(cmd) as u32) << 24
        | ((mode as u8) as u32) << 22
        | (motor_id as u32) << 8
        | master_id as u32
}
