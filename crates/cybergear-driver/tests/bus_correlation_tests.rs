//! 总线请求-应答关联的集成测试
//!
//! 用 Mock 适配器验证并发核心的关键性质：单在途请求、超时释放
//! 许可、故障传播、迟到帧丢弃、停止时结束在途请求。

use cybergear_can::mock::{MockCanAdapter, MockCanHandle};
use cybergear_driver::{CanBus, CanBusBuilder, DriverError, MotionCommand};
use cybergear_protocol::CanFrame;
use cybergear_protocol::arbitration::{CmdType, MotorMode, parse_request_id};
use cybergear_protocol::feedback::feedback_id;
use cybergear_protocol::ProtocolError;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// 构建一条已启动的 Mock 总线
fn started_bus() -> (CanBus, MockCanHandle) {
    let adapter = MockCanAdapter::new();
    let handle = adapter.handle();
    let bus = CanBusBuilder::new()
        .master_id(0)
        .rx_poll_timeout(Duration::from_millis(1))
        .build(adapter)
        .unwrap();
    bus.start().unwrap();
    (bus, handle)
}

/// 中点量化的电机反馈帧（角度/速度/力矩 ≈ 0）
fn midscale_motor_reply(motor_id: u8) -> CanFrame {
    CanFrame::new_extended(
        feedback_id(CmdType::MotorFeedback, MotorMode::Motor, motor_id, 0),
        &[0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x00, 0x00],
    )
}

/// 对每个请求自动应答电机反馈
fn echo_motor_feedback(handle: &MockCanHandle) {
    handle.set_responder(|sent| {
        let target = parse_request_id(sent.id).map(|h| h.target_id).unwrap_or(0);
        vec![midscale_motor_reply(target)]
    });
}

#[test]
fn test_enable_end_to_end() {
    init_tracing();
    let (bus, handle) = started_bus();
    echo_motor_feedback(&handle);

    let motor = bus.motor(127);
    let feedback = motor.enable().unwrap();

    // 0x8000 为 [-4, 4] 的中点
    assert!(feedback.angle.abs() < 1e-3);
    assert_eq!(feedback.motor_id, 127);
    assert!(!feedback.faults.has_fault());

    let sent = handle.sent_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, 0x0300_007F);
    assert_eq!(sent[0].len, 0);
}

#[test]
fn test_set_loc_ref_frame_layout() {
    init_tracing();
    let (bus, handle) = started_bus();
    echo_motor_feedback(&handle);

    bus.motor(1).set_loc_ref(1.1).unwrap();

    let sent = handle.sent_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, 0x1200_0001);
    assert_eq!(sent[0].data[0..4], [0x16, 0x70, 0, 0]);
    assert_eq!(sent[0].data[4..8], 1.1f32.to_le_bytes());
}

#[test]
fn test_bounded_param_write_rejected_before_io() {
    init_tracing();
    let (bus, handle) = started_bus();

    // limit_spd ∈ [0, 30]
    let err = bus.motor(1).set_limit_spd(31.0).unwrap_err();
    assert!(matches!(
        err,
        DriverError::Protocol(ProtocolError::OutOfRange { .. })
    ));
    // 校验失败时不发送任何帧
    assert_eq!(handle.sent_count(), 0);
}

#[test]
fn test_timeout_releases_permit() {
    init_tracing();
    let (bus, handle) = started_bus();

    let motor = bus.motor(127).with_timeout(Duration::from_millis(50));
    assert!(matches!(motor.enable(), Err(DriverError::Timeout)));

    // 超时后许可已释放，下一个请求注入应答即可成功
    echo_motor_feedback(&handle);
    assert!(motor.enable().is_ok());
    assert_eq!(handle.sent_count(), 2);
}

#[test]
fn test_fault_frame_fails_inflight_request() {
    init_tracing();
    let (bus, handle) = started_bus();

    let code = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 1];
    handle.set_responder(move |_| {
        vec![CanFrame::new_extended(
            feedback_id(CmdType::FaultFeedback, MotorMode::Reset, 127, 0),
            &code,
        )]
    });

    match bus.motor(127).enable() {
        Err(DriverError::Fault { motor_id, code: c }) => {
            assert_eq!(motor_id, 127);
            assert_eq!(c, code);
        }
        other => panic!("expected fault error, got {other:?}"),
    }
}

#[test]
fn test_fault_settles_whichever_request_is_outstanding() {
    init_tracing();
    let (bus, handle) = started_bus();

    // 故障帧的电机 ID 与请求目标不同：按单在途请求纪律，
    // 它仍然结束当前在途请求
    handle.set_responder(|_| {
        vec![CanFrame::new_extended(
            feedback_id(CmdType::FaultFeedback, MotorMode::Reset, 9, 0),
            &[1, 0, 0, 0, 0, 0, 0, 0],
        )]
    });

    match bus.motor(1).enable() {
        Err(DriverError::Fault { motor_id, .. }) => assert_eq!(motor_id, 9),
        other => panic!("expected fault error, got {other:?}"),
    }
}

#[test]
fn test_single_outstanding_request_serializes_callers() {
    init_tracing();
    let (bus, handle) = started_bus();

    // 无应答器：两个请求都会超时，但第二个必须等第一个超时
    // 释放许可后才能发送
    let start = Instant::now();
    std::thread::scope(|s| {
        let first = bus.motor(127).with_timeout(Duration::from_millis(100));
        s.spawn(move || {
            assert!(matches!(first.enable(), Err(DriverError::Timeout)));
        });

        std::thread::sleep(Duration::from_millis(10));
        let second = bus.motor(5).with_timeout(Duration::from_millis(100));
        s.spawn(move || {
            assert!(matches!(second.enable(), Err(DriverError::Timeout)));
        });
    });

    // 第二个请求 = 等待许可 (~90ms) + 自身超时 (100ms)
    assert!(start.elapsed() >= Duration::from_millis(180));

    let sent = handle.sent_frames();
    assert_eq!(sent.len(), 2);
    assert_eq!(parse_request_id(sent[0].id).unwrap().target_id, 127);
    assert_eq!(parse_request_id(sent[1].id).unwrap().target_id, 5);
}

#[test]
fn test_late_reply_is_discarded_not_delivered() {
    init_tracing();
    let (bus, handle) = started_bus();

    let motor = bus.motor(2).with_timeout(Duration::from_millis(30));
    assert!(matches!(motor.enable(), Err(DriverError::Timeout)));

    // 迟到的应答：此刻已无在途请求，必须被丢弃
    handle.inject(midscale_motor_reply(2));
    std::thread::sleep(Duration::from_millis(20));

    // 后续请求拿到的是自己的应答，而不是迟到帧
    handle.set_responder(|sent| {
        let request = parse_request_id(sent.id).unwrap();
        assert_eq!(request.cmd, CmdType::SingleParamRead);
        let mut data = [0u8; 8];
        data[0..2].copy_from_slice(&0x7016u16.to_be_bytes());
        data[4..8].copy_from_slice(&2.5f32.to_le_bytes());
        vec![CanFrame::new_extended(
            feedback_id(CmdType::SingleParamRead, MotorMode::Motor, 2, 0),
            &data,
        )]
    });

    let param = motor.read_param(0x7016).unwrap();
    assert_eq!(param.index, 0x7016);
    assert_eq!(param.as_f32(), 2.5);
}

#[test]
fn test_unknown_frames_do_not_settle_requests() {
    init_tracing();
    let (bus, handle) = started_bus();

    // 应答器回以未建模的命令类型（30）：记录后丢弃，请求照常超时
    handle.set_responder(|_| vec![CanFrame::new_extended(30u32 << 24 | 0x7F00, &[0u8; 8])]);

    let motor = bus.motor(127).with_timeout(Duration::from_millis(50));
    assert!(matches!(motor.enable(), Err(DriverError::Timeout)));
}

#[test]
fn test_operations_require_started_bus() {
    init_tracing();
    let adapter = MockCanAdapter::new();
    let bus = CanBusBuilder::new().build(adapter).unwrap();

    assert!(matches!(
        bus.motor(1).enable(),
        Err(DriverError::NotRunning)
    ));
}

#[test]
fn test_start_twice_fails_stop_is_idempotent() {
    init_tracing();
    let (bus, handle) = started_bus();

    assert!(matches!(bus.start(), Err(DriverError::AlreadyRunning)));
    assert!(bus.is_running());

    bus.stop();
    bus.stop();
    assert!(!bus.is_running());
    assert!(matches!(
        bus.motor(1).enable(),
        Err(DriverError::NotRunning)
    ));

    // 停止后可以重新启动
    bus.start().unwrap();
    echo_motor_feedback(&handle);
    assert!(bus.motor(1).enable().is_ok());
}

#[test]
fn test_stop_settles_inflight_request() {
    init_tracing();
    let (bus, _handle) = started_bus();

    std::thread::scope(|s| {
        let motor = bus.motor(127);
        let waiter = s.spawn(move || motor.enable());

        // 等请求进入 AwaitingReply 后停止总线
        std::thread::sleep(Duration::from_millis(50));
        bus.stop();

        match waiter.join().unwrap() {
            Err(DriverError::Stopped) => {}
            other => panic!("expected stopped error, got {other:?}"),
        }
    });
}

#[test]
fn test_send_failure_releases_permit() {
    init_tracing();
    let (bus, handle) = started_bus();

    handle.set_fail_sends(true);
    assert!(matches!(
        bus.motor(1).enable(),
        Err(DriverError::Can(cybergear_can::CanError::Io(_)))
    ));

    handle.set_fail_sends(false);
    echo_motor_feedback(&handle);
    assert!(bus.motor(1).enable().is_ok());
}

#[test]
fn test_motion_control_roundtrip() {
    init_tracing();
    let (bus, handle) = started_bus();
    echo_motor_feedback(&handle);

    let cmd = MotionCommand {
        torque: 0.0,
        angle: 0.0,
        velocity: 0.0,
        kp: 10.0,
        kd: 0.5,
    };
    let feedback = bus.motor(127).motion_control(&cmd).unwrap();
    assert!(feedback.velocity.abs() < 1e-2);

    let sent = handle.sent_frames();
    assert_eq!(sent.len(), 1);
    // 力矩 0 N·m 量化到 0x8000，位于仲裁 ID bit 8-23
    assert_eq!((sent[0].id >> 8) & 0xFFFF, 0x8000);
    assert_eq!((sent[0].id >> 24) & 0x1F, u32::from(u8::from(CmdType::MotorControl)));
}

#[test]
fn test_param_write_reply_of_wrong_kind_is_error() {
    init_tracing();
    let (bus, handle) = started_bus();

    // 写参数却收到参数应答帧（期望电机反馈帧）
    handle.set_responder(|_| {
        let mut data = [0u8; 8];
        data[0..2].copy_from_slice(&0x7016u16.to_be_bytes());
        vec![CanFrame::new_extended(
            feedback_id(CmdType::SingleParamWrite, MotorMode::Motor, 1, 0),
            &data,
        )]
    });

    assert!(matches!(
        bus.motor(1).set_loc_ref(0.5),
        Err(DriverError::UnexpectedReply { .. })
    ));
}
