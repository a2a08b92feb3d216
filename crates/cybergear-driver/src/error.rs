//! 驱动层错误类型定义

use cybergear_can::CanError;
use cybergear_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 适配层错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 协议编解码错误（含有界参数越界，发帧前返回）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 超时未收到应答
    #[error("Reply timeout")]
    Timeout,

    /// 电机上报故障帧（在途请求以此失败，原始故障码对照手册解读）
    #[error("Motor {motor_id} reported fault, raw code {code:02X?}")]
    Fault { motor_id: u8, code: [u8; 8] },

    /// 应答帧类型与请求不符
    #[error("Unexpected reply: expected {expected}")]
    UnexpectedReply { expected: &'static str },

    /// 总线未启动
    #[error("Bus is not running")]
    NotRunning,

    /// 总线已在运行（重复启动）
    #[error("Bus is already running")]
    AlreadyRunning,

    /// 总线在请求在途时被停止
    #[error("Bus stopped while request was in flight")]
    Stopped,

    /// RX 线程错误
    #[error("RX thread error: {0}")]
    RxThread(String),
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use cybergear_can::CanError;
    use cybergear_protocol::ProtocolError;

    #[test]
    fn test_display_messages() {
        assert_eq!(format!("{}", DriverError::Timeout), "Reply timeout");
        assert_eq!(format!("{}", DriverError::NotRunning), "Bus is not running");

        let fault = DriverError::Fault {
            motor_id: 127,
            code: [0xDE, 0xAD, 0, 0, 0, 0, 0, 1],
        };
        let msg = format!("{fault}");
        assert!(msg.contains("127"));
        assert!(msg.contains("DE"));
    }

    #[test]
    fn test_from_can_error() {
        let err: DriverError = CanError::Timeout.into();
        assert!(matches!(err, DriverError::Can(CanError::Timeout)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: DriverError = ProtocolError::UnknownCmd { cmd: 5 }.into();
        match err {
            DriverError::Protocol(ProtocolError::UnknownCmd { cmd }) => assert_eq!(cmd, 5),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}
