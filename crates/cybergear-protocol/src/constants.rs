//! 物理量范围常量定义
//!
//! 集中定义所有量化映射使用的物理范围，避免在代码中散落"魔法数"。
//! 范围取自 CyberGear 官方手册。

/// 运控指令目标角度范围（rad），±4π
pub const ANGLE_CMD_RANGE: (f64, f64) = (
    -4.0 * std::f64::consts::PI,
    4.0 * std::f64::consts::PI,
);

/// 反馈帧当前角度范围（rad）
pub const ANGLE_FEEDBACK_RANGE: (f64, f64) = (-4.0, 4.0);

/// 角速度范围（rad/s）
pub const VELOCITY_RANGE: (f64, f64) = (-30.0, 30.0);

/// 力矩范围（N·m）
pub const TORQUE_RANGE: (f64, f64) = (-12.0, 12.0);

/// 比例增益 Kp 范围
pub const KP_RANGE: (f64, f64) = (0.0, 500.0);

/// 微分增益 Kd 范围
pub const KD_RANGE: (f64, f64) = (0.0, 5.0);

/// 反馈帧温度范围（摄氏度）
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 500.0);
