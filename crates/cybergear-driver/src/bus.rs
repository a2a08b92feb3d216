//! CAN 总线与请求-应答关联器
//!
//! CyberGear 协议没有请求 ID 字段，应答与请求的唯一关联信号是
//! "我发送之后总线上出现的下一帧是我的"。因此总线维持严格的
//! **单在途请求**纪律：
//!
//! ```text
//! Idle -> Sending       获取发送许可（容量 1 的互斥门）
//! Sending -> AwaitingReply  帧交给 TX 适配器，启动超时计时
//! AwaitingReply -> Settled  RX 线程把下一帧解码结果写入完成槽
//! AwaitingReply -> TimedOut 先到期则请求失败，完成槽作废
//! ```
//!
//! 任一路径结束后释放发送许可。超时后迟到的应答帧找不到在途
//! 请求，记录警告后丢弃，绝不派发给后续调用者。

use crate::error::DriverError;
use crate::motor::Motor;
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use cybergear_can::{CanFrame, RxAdapter, SplittableAdapter, TxAdapter};
use cybergear_protocol::feedback::{Feedback, parse_feedback};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, trace, warn};

/// 默认应答超时
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(2000);

/// 默认 RX 轮询超时（接收循环检查停止标志的周期）
pub const DEFAULT_RX_POLL_TIMEOUT: Duration = Duration::from_millis(2);

/// 在途请求的完成槽
///
/// 每个请求一个，至多写入一次；超时或停止后被取走作废。
struct PendingRequest {
    settle: Sender<Result<Feedback, DriverError>>,
}

/// 总线共享核心（RX 线程与所有 Motor 句柄共享）
pub(crate) struct BusCore {
    master_id: u8,
    default_timeout: Duration,
    running: AtomicBool,
    /// 发送端（调用线程串行使用）
    tx: Mutex<Box<dyn TxAdapter>>,
    /// 接收端停放槽（启动时取走，RX 线程退出时归还）
    rx_slot: Mutex<Option<Box<dyn RxAdapter>>>,
    /// 单在途请求的发送许可
    send_permit: Mutex<()>,
    /// 在途请求完成槽（至多一个）
    pending: Mutex<Option<PendingRequest>>,
}

impl BusCore {
    pub(crate) fn master_id(&self) -> u8 {
        self.master_id
    }

    pub(crate) fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 发送请求帧并等待下一帧应答
    ///
    /// 整个调用持有发送许可，保证总线上同一时刻至多一个在途请求。
    /// 不期待有效应答体的指令也走同一条路径，维持排序纪律。
    pub(crate) fn transact(
        &self,
        frame: CanFrame,
        timeout: Duration,
    ) -> Result<Feedback, DriverError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(DriverError::NotRunning);
        }

        let _permit = self.send_permit.lock();

        // 注册完成槽后再发送，应答不可能先于注册到达
        let (settle_tx, settle_rx) = bounded(1);
        *self.pending.lock() = Some(PendingRequest { settle: settle_tx });

        if let Err(e) = self.tx.lock().send(frame) {
            self.pending.lock().take();
            return Err(e.into());
        }
        trace!("Sent request frame ID=0x{:08X}", frame.id);

        // stop() 先清运行标志再取完成槽；这里反向检查，
        // 两种交错都能保证在途请求被立即结束而不是等到超时
        if !self.running.load(Ordering::Acquire) {
            self.pending.lock().take();
            return Err(DriverError::Stopped);
        }

        match settle_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                // 作废完成槽；此后到达的应答帧按迟到帧丢弃
                self.pending.lock().take();
                Err(DriverError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::Stopped),
        }
    }

    /// 把解码结果写入在途请求的完成槽
    fn settle(&self, frame_id: u32, result: Result<Feedback, DriverError>) {
        match self.pending.lock().take() {
            Some(pending) => {
                // 接收方可能刚好超时退出，发送失败无需处理
                let _ = pending.settle.send(result);
            }
            None => {
                warn!(
                    "Dropping frame ID=0x{frame_id:08X}: no outstanding request (late reply?)"
                );
            }
        }
    }

    /// 处理一个入站帧
    fn handle_frame(&self, frame: CanFrame) {
        match parse_feedback(&frame) {
            Ok(Feedback::Unknown { cmd }) => {
                // 未建模的命令类型：前向兼容，记录后丢弃
                trace!("Ignoring frame with unknown cmd type {cmd} (ID=0x{:08X})", frame.id);
            }
            Ok(Feedback::Fault(fault)) => {
                warn!(
                    "Motor {} fault frame, raw code {:02X?}",
                    fault.motor_id, fault.code
                );
                self.settle(
                    frame.id,
                    Err(DriverError::Fault {
                        motor_id: fault.motor_id,
                        code: fault.code,
                    }),
                );
            }
            Ok(feedback) => {
                trace!("Received feedback frame ID=0x{:08X}", frame.id);
                self.settle(frame.id, Ok(feedback));
            }
            Err(e) => {
                // 无法解码的帧不结束任何在途请求
                warn!("Dropping undecodable frame ID=0x{:08X}: {e}", frame.id);
            }
        }
    }
}

/// RX 线程主循环
///
/// 以短超时轮询接收端，既能及时停止又不空转。致命的适配层错误
/// 会结束在途请求并终止总线。
fn rx_loop(core: &BusCore, rx: &mut dyn RxAdapter) {
    while core.running.load(Ordering::Acquire) {
        match rx.receive() {
            Ok(frame) => core.handle_frame(frame),
            Err(cybergear_can::CanError::Timeout) => continue,
            Err(e) if e.is_fatal() => {
                error!("RX loop terminating: {e}");
                if let Some(pending) = core.pending.lock().take() {
                    let _ = pending.settle.send(Err(DriverError::Can(e)));
                }
                core.running.store(false, Ordering::Release);
                break;
            }
            Err(e) => {
                warn!("RX receive error (retrying): {e}");
            }
        }
    }
    trace!("RX loop exited");
}

/// CyberGear CAN 总线
///
/// 独占接收循环和请求-应答关联器；所有 [`Motor`] 句柄共享同一条
/// 总线。`start`/`stop` 幂等配对，停止时在途请求以
/// [`DriverError::Stopped`] 结束，不会被永远挂起。
///
/// # 示例
///
/// ```no_run
/// use cybergear_can::SocketCanAdapter;
/// use cybergear_driver::CanBusBuilder;
///
/// let adapter = SocketCanAdapter::new("can0").unwrap();
/// let bus = CanBusBuilder::new().master_id(0xFD).build(adapter).unwrap();
/// bus.start().unwrap();
///
/// let motor = bus.motor(127);
/// let feedback = motor.enable().unwrap();
/// println!("angle = {:.3} rad", feedback.angle);
/// ```
pub struct CanBus {
    core: Arc<BusCore>,
    rx_thread: Mutex<Option<JoinHandle<()>>>,
}

impl CanBus {
    /// 启动接收循环
    ///
    /// # 错误
    /// - [`DriverError::AlreadyRunning`]: 总线已在运行（重复启动不是崩溃）
    pub fn start(&self) -> Result<(), DriverError> {
        if self.core.running.swap(true, Ordering::SeqCst) {
            return Err(DriverError::AlreadyRunning);
        }

        let Some(mut rx) = self.core.rx_slot.lock().take() else {
            self.core.running.store(false, Ordering::SeqCst);
            return Err(DriverError::RxThread(
                "receive adapter lost (previous RX thread panicked?)".into(),
            ));
        };

        let core = self.core.clone();
        let handle = std::thread::Builder::new()
            .name("cybergear-rx".into())
            .spawn(move || {
                rx_loop(&core, rx.as_mut());
                // 归还接收端，允许 stop 后再次 start
                *core.rx_slot.lock() = Some(rx);
            })
            .map_err(|e| {
                self.core.running.store(false, Ordering::SeqCst);
                DriverError::RxThread(format!("failed to spawn RX thread: {e}"))
            })?;

        *self.rx_thread.lock() = Some(handle);
        Ok(())
    }

    /// 停止接收循环（幂等）
    ///
    /// 结束在途请求、join RX 线程后返回。可与在途请求并发调用。
    pub fn stop(&self) {
        if !self.core.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(pending) = self.core.pending.lock().take() {
            let _ = pending.settle.send(Err(DriverError::Stopped));
        }

        if let Some(handle) = self.rx_thread.lock().take() {
            if handle.join().is_err() {
                error!("RX thread panicked during shutdown");
            }
        }
    }

    /// 总线是否在运行
    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// 主机 CAN ID
    pub fn master_id(&self) -> u8 {
        self.core.master_id
    }

    /// 创建指定目标 ID 的电机句柄
    ///
    /// 句柄是轻量的，可按需创建多个；总线先于句柄停止时，
    /// 句柄上的操作返回 [`DriverError::NotRunning`]。
    pub fn motor(&self, motor_id: u8) -> Motor {
        Motor::new(motor_id, self.core.clone())
    }
}

impl Drop for CanBus {
    fn drop(&mut self) {
        self.stop();
    }
}

/// [`CanBus`] 建造者
///
/// # 示例
///
/// ```no_run
/// use cybergear_can::SocketCanAdapter;
/// use cybergear_driver::CanBusBuilder;
/// use std::time::Duration;
///
/// let bus = CanBusBuilder::new()
///     .master_id(0xFD)
///     .reply_timeout(Duration::from_millis(500))
///     .build(SocketCanAdapter::new("can0").unwrap())
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct CanBusBuilder {
    master_id: u8,
    reply_timeout: Duration,
    rx_poll_timeout: Duration,
}

impl CanBusBuilder {
    pub fn new() -> Self {
        Self {
            master_id: 0,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            rx_poll_timeout: DEFAULT_RX_POLL_TIMEOUT,
        }
    }

    /// 主机 CAN ID（默认 0）
    pub fn master_id(mut self, master_id: u8) -> Self {
        self.master_id = master_id;
        self
    }

    /// 默认应答超时（默认 2000 ms，可被单次调用覆盖）
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// RX 轮询超时（默认 2 ms）
    pub fn rx_poll_timeout(mut self, timeout: Duration) -> Self {
        self.rx_poll_timeout = timeout;
        self
    }

    /// 用给定适配器构建总线（未启动，需调用 [`CanBus::start`]）
    pub fn build<A: SplittableAdapter>(self, mut adapter: A) -> Result<CanBus, DriverError> {
        adapter.set_receive_timeout(self.rx_poll_timeout);
        let (rx, tx) = adapter.split()?;

        let core = Arc::new(BusCore {
            master_id: self.master_id,
            default_timeout: self.reply_timeout,
            running: AtomicBool::new(false),
            tx: Mutex::new(Box::new(tx)),
            rx_slot: Mutex::new(Some(Box::new(rx))),
            send_permit: Mutex::new(()),
            pending: Mutex::new(None),
        });

        Ok(CanBus {
            core,
            rx_thread: Mutex::new(None),
        })
    }
}

impl Default for CanBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
