//! 控制帧构建
//!
//! 每种指令一个纯函数，输出可直接发送的 [`CanFrame`]。
//! 数据区布局与固件逐字节对齐，不允许改动。

use crate::arbitration::{CmdType, request_id};
use crate::constants::*;
use crate::params::{ParamDescriptor, ParamValue};
use crate::quantize::encode_ranged;
use crate::{CanFrame, ProtocolError};

/// 运控指令的目标量
///
/// 所有字段在编码时按各自物理范围钳位量化，
/// 极限值输入不会报错（运控回路必须保持响应）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCommand {
    /// 目标力矩（N·m），[-12, 12]
    pub torque: f64,
    /// 目标角度（rad），±4π
    pub angle: f64,
    /// 目标角速度（rad/s），[-30, 30]
    pub velocity: f64,
    /// 比例增益，[0, 500]
    pub kp: f64,
    /// 微分增益，[0, 5]
    pub kd: f64,
}

/// 电机使能（类型 3，空数据区）
pub fn enable_frame(master_id: u8, motor_id: u8) -> CanFrame {
    CanFrame::new_extended(
        request_id(CmdType::MotorEnable, master_id as u16, motor_id),
        &[],
    )
}

/// 电机停止（类型 4，8 字节 0）
pub fn stop_frame(master_id: u8, motor_id: u8) -> CanFrame {
    CanFrame::new_extended(
        request_id(CmdType::MotorStop, master_id as u16, motor_id),
        &[0u8; 8],
    )
}

/// 设置机械零点（类型 6，数据区 [1]）
pub fn set_mechanical_zero_frame(master_id: u8, motor_id: u8) -> CanFrame {
    CanFrame::new_extended(
        request_id(CmdType::SetMechanicalZero, master_id as u16, motor_id),
        &[1],
    )
}

/// 单个参数写入（类型 18）
///
/// 有界参数在此处做严格校验，越界直接返回错误，不产生帧。
pub fn write_param_frame(
    master_id: u8,
    motor_id: u8,
    descriptor: &ParamDescriptor,
    value: ParamValue,
) -> Result<CanFrame, ProtocolError> {
    let payload = descriptor.encode_payload(value)?;
    Ok(CanFrame::new_extended(
        request_id(CmdType::SingleParamWrite, master_id as u16, motor_id),
        &payload,
    ))
}

/// 单个参数读取（类型 17）
///
/// 数据区：byte 0-1 索引（小端），其余 6 字节补 0。
pub fn read_param_frame(master_id: u8, motor_id: u8, index: u16) -> CanFrame {
    let mut payload = [0u8; 8];
    payload[0..2].copy_from_slice(&index.to_le_bytes());
    CanFrame::new_extended(
        request_id(CmdType::SingleParamRead, master_id as u16, motor_id),
        &payload,
    )
}

/// 运控模式指令（类型 1）
///
/// 量化力矩占用仲裁 ID 的数据区 2（bit 8-23），
/// 数据区为 4 个小端 u16：目标角度、目标角速度、Kp、Kd。
pub fn motion_control_frame(motor_id: u8, cmd: &MotionCommand) -> CanFrame {
    let torque = encode_ranged(cmd.torque, TORQUE_RANGE.0, TORQUE_RANGE.1, 16) as u16;

    let angle = encode_ranged(cmd.angle, ANGLE_CMD_RANGE.0, ANGLE_CMD_RANGE.1, 16) as u16;
    let velocity = encode_ranged(cmd.velocity, VELOCITY_RANGE.0, VELOCITY_RANGE.1, 16) as u16;
    let kp = encode_ranged(cmd.kp, KP_RANGE.0, KP_RANGE.1, 16) as u16;
    let kd = encode_ranged(cmd.kd, KD_RANGE.0, KD_RANGE.1, 16) as u16;

    let mut payload = [0u8; 8];
    payload[0..2].copy_from_slice(&angle.to_le_bytes());
    payload[2..4].copy_from_slice(&velocity.to_le_bytes());
    payload[4..6].copy_from_slice(&kp.to_le_bytes());
    payload[6..8].copy_from_slice(&kd.to_le_bytes());

    CanFrame::new_extended(request_id(CmdType::MotorControl, torque, motor_id), &payload)
}
