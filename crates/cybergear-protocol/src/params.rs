//! 可调参数表
//!
//! CyberGear 电机通过"单个参数读写"指令（0x11/0x12）访问一张以
//! 16 位索引编址的参数表。本模块将所有已知参数收敛为一张静态
//! 描述符表：索引、二进制格式、可选的 [min, max] 范围。
//!
//! 有界参数写入前做严格范围校验，校验失败直接返回错误，
//! 不发送任何帧。

use crate::ProtocolError;
use crate::quantize::check_range;

/// 参数值的二进制格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFormat {
    /// 单字节无符号整数（byte 4，其余补 0）
    Uint8,
    /// 16 位有符号整数（小端，byte 4-5）
    Int16,
    /// 32 位有符号整数（小端，byte 4-7）
    Int32,
    /// IEEE-754 单精度浮点（小端，byte 4-7）
    Float,
}

/// 参数描述符
///
/// 进程启动时定义的不可变静态表项，永不修改。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// 参数名（与官方手册一致）
    pub name: &'static str,
    /// 参数表索引
    pub index: u16,
    /// 二进制格式
    pub format: ParamFormat,
    /// 可选范围 [min, max]，越界写入被拒绝
    pub bounds: Option<(f64, f64)>,
}

/// 运行模式（0: 运控 1: 位置 2: 速度 3: 电流）
pub const RUN_MODE: ParamDescriptor = ParamDescriptor {
    name: "run_mode",
    index: 0x7005,
    format: ParamFormat::Uint8,
    bounds: Some((0.0, 3.0)),
};

/// 电流模式 Iq 指令（A）
pub const IQ_REF: ParamDescriptor = ParamDescriptor {
    name: "iq_ref",
    index: 0x7006,
    format: ParamFormat::Float,
    bounds: Some((-23.0, 23.0)),
};

/// 转速模式转速指令（rad/s）
pub const SPD_REF: ParamDescriptor = ParamDescriptor {
    name: "spd_ref",
    index: 0x700A,
    format: ParamFormat::Float,
    bounds: Some((-30.0, 30.0)),
};

/// 转矩限制（N·m）
pub const LIMIT_TORQUE: ParamDescriptor = ParamDescriptor {
    name: "limit_torque",
    index: 0x700B,
    format: ParamFormat::Float,
    bounds: Some((0.0, 12.0)),
};

/// 电流环 Kp
pub const CUR_KP: ParamDescriptor = ParamDescriptor {
    name: "cur_kp",
    index: 0x7010,
    format: ParamFormat::Float,
    bounds: None,
};

/// 电流环 Ki
pub const CUR_KI: ParamDescriptor = ParamDescriptor {
    name: "cur_ki",
    index: 0x7011,
    format: ParamFormat::Float,
    bounds: None,
};

/// 电流滤波系数
pub const CUR_FILT_GAIN: ParamDescriptor = ParamDescriptor {
    name: "cur_filt_gain",
    index: 0x7014,
    format: ParamFormat::Float,
    bounds: Some((0.0, 1.0)),
};

/// 位置模式角度指令（rad）
pub const LOC_REF: ParamDescriptor = ParamDescriptor {
    name: "loc_ref",
    index: 0x7016,
    format: ParamFormat::Float,
    bounds: None,
};

/// 位置模式速度限制（rad/s）
pub const LIMIT_SPD: ParamDescriptor = ParamDescriptor {
    name: "limit_spd",
    index: 0x7017,
    format: ParamFormat::Float,
    bounds: Some((0.0, 30.0)),
};

/// 速度/位置模式电流限制（A）
pub const LIMIT_CUR: ParamDescriptor = ParamDescriptor {
    name: "limit_cur",
    index: 0x7018,
    format: ParamFormat::Float,
    bounds: Some((0.0, 27.0)),
};

/// 完整参数表
pub static PARAM_TABLE: &[ParamDescriptor] = &[
    RUN_MODE,
    IQ_REF,
    SPD_REF,
    LIMIT_TORQUE,
    CUR_KP,
    CUR_KI,
    CUR_FILT_GAIN,
    LOC_REF,
    LIMIT_SPD,
    LIMIT_CUR,
];

/// 按索引查找参数描述符
pub fn param_by_index(index: u16) -> Option<&'static ParamDescriptor> {
    PARAM_TABLE.iter().find(|d| d.index == index)
}

/// 按名称查找参数描述符
pub fn param_by_name(name: &str) -> Option<&'static ParamDescriptor> {
    PARAM_TABLE.iter().find(|d| d.name == name)
}

/// 参数值（与 [`ParamFormat`] 一一对应的带数据枚举）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Uint8(u8),
    Int16(i16),
    Int32(i32),
    Float(f32),
}

impl ParamValue {
    /// 数值视图（用于范围校验）
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Uint8(v) => v as f64,
            ParamValue::Int16(v) => v as f64,
            ParamValue::Int32(v) => v as f64,
            ParamValue::Float(v) => v as f64,
        }
    }

    fn matches(&self, format: ParamFormat) -> bool {
        matches!(
            (self, format),
            (ParamValue::Uint8(_), ParamFormat::Uint8)
                | (ParamValue::Int16(_), ParamFormat::Int16)
                | (ParamValue::Int32(_), ParamFormat::Int32)
                | (ParamValue::Float(_), ParamFormat::Float)
        )
    }

    /// 按格式序列化到数据区 byte 4-7（小端）
    fn write_to(&self, out: &mut [u8; 8]) {
        match *self {
            ParamValue::Uint8(v) => out[4] = v,
            ParamValue::Int16(v) => out[4..6].copy_from_slice(&v.to_le_bytes()),
            ParamValue::Int32(v) => out[4..8].copy_from_slice(&v.to_le_bytes()),
            ParamValue::Float(v) => out[4..8].copy_from_slice(&v.to_le_bytes()),
        }
    }
}

impl ParamDescriptor {
    /// 构建"单个参数写入"指令的 8 字节数据区
    ///
    /// 布局：byte 0-1 索引（小端），byte 2-3 保留为 0，
    /// byte 4-7 参数值。
    ///
    /// # 错误
    /// - [`ProtocolError::FormatMismatch`]: 值类型与参数格式不符
    /// - [`ProtocolError::OutOfRange`]: 有界参数越界（不发送任何帧）
    pub fn encode_payload(&self, value: ParamValue) -> Result<[u8; 8], ProtocolError> {
        if !value.matches(self.format) {
            return Err(ProtocolError::FormatMismatch {
                param: self.name,
                expected: self.format,
            });
        }
        if let Some((min, max)) = self.bounds {
            check_range(value.as_f64(), min, max)?;
        }

        let mut payload = [0u8; 8];
        payload[0..2].copy_from_slice(&self.index.to_le_bytes());
        value.write_to(&mut payload);
        Ok(payload)
    }
}
