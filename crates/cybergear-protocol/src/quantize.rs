//! 物理量 <-> 定点整数的线性量化
//!
//! CyberGear 协议将有界物理量（角度、速度、力矩、增益）均匀映射到
//! 无符号定点区间 `[0, 2^bits - 1]` 后上总线传输。映射是有损的，
//! 误差上界为一个量化步长 `(max - min) / (2^bits - 1)`。

use crate::ProtocolError;

/// 编码：物理量 -> 定点整数（钳位）
///
/// 超出 `[min, max]` 的输入先钳位再映射，保证运控指令在极限值
/// 附近仍然可用。`bits` 为目标位宽（1-32）。
pub fn encode_ranged(value: f64, min: f64, max: f64, bits: u8) -> u32 {
    debug_assert!(bits >= 1 && bits <= 32);
    debug_assert!(min < max);

    let span = (((1u64 << bits) - 1) as u32) as f64;
    let clamped = value.clamp(min, max);
    ((clamped - min) * span / (max - min)).round() as u32
}

/// 编码：物理量 -> 16 位定点整数（拒绝越界）
///
/// 与 [`encode_ranged`] 同一映射，但超出范围的输入返回
/// [`ProtocolError::OutOfRange`] 而不是静默钳位。用于有界参数写入，
/// 钳位会掩盖操作者的输入错误。
pub fn encode_ranged_strict(value: f64, min: f64, max: f64) -> Result<u16, ProtocolError> {
    check_range(value, min, max)?;
    Ok(encode_ranged(value, min, max, 16) as u16)
}

/// 解码：定点整数 -> 物理量
///
/// 超出位宽的 `raw` 先钳位到 `[0, 2^bits - 1]`。
pub fn decode_ranged(raw: u32, min: f64, max: f64, bits: u8) -> f64 {
    debug_assert!(bits >= 1 && bits <= 32);
    debug_assert!(min < max);

    let span = ((1u64 << bits) - 1) as u32;
    let clamped = raw.min(span);
    clamped as f64 * (max - min) / span as f64 + min
}

/// 范围校验（不做任何映射）
pub fn check_range(value: f64, min: f64, max: f64) -> Result<(), ProtocolError> {
    if value < min || value > max || value.is_nan() {
        return Err(ProtocolError::OutOfRange { value, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STEP_16: f64 = 24.0 / 65535.0;

    #[test]
    fn test_encode_endpoints() {
        assert_eq!(encode_ranged(-12.0, -12.0, 12.0, 16), 0);
        assert_eq!(encode_ranged(12.0, -12.0, 12.0, 16), 65535);
        // 中点落在量化区间正中
        assert_eq!(encode_ranged(0.0, -12.0, 12.0, 16), 32768);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        assert_eq!(
            encode_ranged(112.0, -12.0, 12.0, 16),
            encode_ranged(12.0, -12.0, 12.0, 16)
        );
        assert_eq!(
            encode_ranged(-112.0, -12.0, 12.0, 16),
            encode_ranged(-12.0, -12.0, 12.0, 16)
        );
    }

    #[test]
    fn test_decode_clamps_raw() {
        // 位宽外的 raw 先钳位
        assert_eq!(decode_ranged(0x1_0000, -12.0, 12.0, 16), 12.0);
        assert_eq!(decode_ranged(0, -12.0, 12.0, 16), -12.0);
    }

    #[test]
    fn test_strict_rejects_out_of_range() {
        assert!(matches!(
            encode_ranged_strict(12.5, -12.0, 12.0),
            Err(ProtocolError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode_ranged_strict(-12.5, -12.0, 12.0),
            Err(ProtocolError::OutOfRange { .. })
        ));
        assert_eq!(encode_ranged_strict(12.0, -12.0, 12.0).unwrap(), 65535);
    }

    #[test]
    fn test_strict_rejects_nan() {
        assert!(encode_ranged_strict(f64::NAN, -12.0, 12.0).is_err());
    }

    #[test]
    fn test_roundtrip_within_one_step() {
        for i in 0..=1000 {
            let x = -12.0 + 24.0 * (i as f64) / 1000.0;
            let decoded = decode_ranged(encode_ranged(x, -12.0, 12.0, 16), -12.0, 12.0, 16);
            assert!(
                (decoded - x).abs() <= STEP_16,
                "x={x}, decoded={decoded}"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip_within_one_step(x in -12.0f64..=12.0) {
            let decoded = decode_ranged(encode_ranged(x, -12.0, 12.0, 16), -12.0, 12.0, 16);
            prop_assert!((decoded - x).abs() <= STEP_16);
        }

        #[test]
        fn prop_encode_monotonic(a in -30.0f64..=30.0, b in -30.0f64..=30.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                encode_ranged(lo, -30.0, 30.0, 16) <= encode_ranged(hi, -30.0, 30.0, 16)
            );
        }
    }
}
