//! 电机句柄
//!
//! 把逻辑电机身份（目标 CAN ID）绑定到共享总线上的轻量门面。
//! 每个公开操作：构建帧 -> 经关联器收发 -> 把应答变体映射为
//! 操作声明的返回类型，类型不符时报 [`DriverError::UnexpectedReply`]。

use crate::bus::BusCore;
use crate::error::DriverError;
use cybergear_protocol::control::{
    self, MotionCommand, motion_control_frame, read_param_frame, write_param_frame,
};
use cybergear_protocol::feedback::{Feedback, MotorFeedback, ParamFeedback};
use cybergear_protocol::params::{self, ParamDescriptor, ParamValue};
use cybergear_protocol::CanFrame;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::Arc;
use std::time::Duration;

/// 运行模式（参数 0x7005）
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RunMode {
    /// 运控模式
    Control = 0,
    /// 位置模式
    Position = 1,
    /// 速度模式
    Speed = 2,
    /// 电流模式
    Current = 3,
}

/// 电机句柄
///
/// 无状态门面，可按需克隆；多个句柄共享同一条总线时由
/// 总线的单在途请求纪律串行化。
#[derive(Clone)]
pub struct Motor {
    motor_id: u8,
    timeout: Option<Duration>,
    core: Arc<BusCore>,
}

impl Motor {
    pub(crate) fn new(motor_id: u8, core: Arc<BusCore>) -> Self {
        Self {
            motor_id,
            timeout: None,
            core,
        }
    }

    /// 目标电机 CAN ID
    pub fn id(&self) -> u8 {
        self.motor_id
    }

    /// 带单独应答超时的句柄副本（覆盖总线默认值）
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self.clone()
        }
    }

    fn transact(&self, frame: CanFrame) -> Result<Feedback, DriverError> {
        let timeout = self.timeout.unwrap_or_else(|| self.core.default_timeout());
        self.core.transact(frame, timeout)
    }

    fn transact_motor(&self, frame: CanFrame) -> Result<MotorFeedback, DriverError> {
        match self.transact(frame)? {
            Feedback::Motor(fb) => Ok(fb),
            _ => Err(DriverError::UnexpectedReply {
                expected: "motor feedback",
            }),
        }
    }

    /// 使能电机
    pub fn enable(&self) -> Result<MotorFeedback, DriverError> {
        self.transact_motor(control::enable_frame(self.core.master_id(), self.motor_id))
    }

    /// 停止电机
    pub fn disable(&self) -> Result<MotorFeedback, DriverError> {
        self.transact_motor(control::stop_frame(self.core.master_id(), self.motor_id))
    }

    /// 设置机械零点（当前位置归零）
    pub fn set_mechanical_zero(&self) -> Result<MotorFeedback, DriverError> {
        self.transact_motor(control::set_mechanical_zero_frame(
            self.core.master_id(),
            self.motor_id,
        ))
    }

    /// 运控模式指令
    ///
    /// 目标量按物理范围钳位量化，极限输入不会报错。
    pub fn motion_control(&self, cmd: &MotionCommand) -> Result<MotorFeedback, DriverError> {
        self.transact_motor(motion_control_frame(self.motor_id, cmd))
    }

    /// 写入单个参数
    ///
    /// 有界参数越界时同步返回错误，不发送任何帧。
    pub fn write_param(
        &self,
        descriptor: &ParamDescriptor,
        value: ParamValue,
    ) -> Result<MotorFeedback, DriverError> {
        let frame = write_param_frame(self.core.master_id(), self.motor_id, descriptor, value)?;
        self.transact_motor(frame)
    }

    /// 读取单个参数
    ///
    /// 具体索引参见官方手册；已知参数可用 [`cybergear_protocol::params`]
    /// 中的描述符常量。
    pub fn read_param(&self, index: u16) -> Result<ParamFeedback, DriverError> {
        let frame = read_param_frame(self.core.master_id(), self.motor_id, index);
        match self.transact(frame)? {
            Feedback::Param(fb) if fb.index == index => Ok(fb),
            _ => Err(DriverError::UnexpectedReply {
                expected: "param feedback",
            }),
        }
    }

    /// 设置运行模式
    pub fn set_run_mode(&self, mode: RunMode) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::RUN_MODE, ParamValue::Uint8(mode.into()))
    }

    /// 设置电流模式 Iq 指令（A）
    pub fn set_iq_ref(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::IQ_REF, ParamValue::Float(value))
    }

    /// 设置转速模式转速指令（rad/s）
    pub fn set_spd_ref(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::SPD_REF, ParamValue::Float(value))
    }

    /// 设置转矩限制（N·m）
    pub fn set_limit_torque(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::LIMIT_TORQUE, ParamValue::Float(value))
    }

    /// 设置电流环 Kp
    pub fn set_cur_kp(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::CUR_KP, ParamValue::Float(value))
    }

    /// 设置电流环 Ki
    pub fn set_cur_ki(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::CUR_KI, ParamValue::Float(value))
    }

    /// 设置电流滤波系数
    pub fn set_cur_filt_gain(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::CUR_FILT_GAIN, ParamValue::Float(value))
    }

    /// 设置位置模式角度指令（rad）
    pub fn set_loc_ref(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::LOC_REF, ParamValue::Float(value))
    }

    /// 设置位置模式速度限制（rad/s）
    pub fn set_limit_spd(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::LIMIT_SPD, ParamValue::Float(value))
    }

    /// 设置速度/位置模式电流限制（A）
    pub fn set_limit_cur(&self, value: f32) -> Result<MotorFeedback, DriverError> {
        self.write_param(&params::LIMIT_CUR, ParamValue::Float(value))
    }
}
