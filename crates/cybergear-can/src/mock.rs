//! Mock CAN 适配器
//!
//! 无硬件依赖的测试后端：出站帧被记录，入站帧由测试脚本注入，
//! 或由可选的应答器（responder）在发送时自动生成。
//!
//! 适配器可分离（split），RX/TX 两端共享同一份内部状态，
//! 与真实后端的线程模型一致。

use crate::{CanAdapter, CanError, CanFrame, RxAdapter, SplittableAdapter, TxAdapter};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// 发送时自动生成应答帧的回调
pub type Responder = Box<dyn FnMut(&CanFrame) -> Vec<CanFrame> + Send>;

#[derive(Default)]
struct MockShared {
    /// 入站队列（硬件 -> 控制器）
    rx_queue: Mutex<VecDeque<CanFrame>>,
    rx_cv: Condvar,
    /// 出站记录（控制器 -> 硬件）
    tx_log: Mutex<Vec<CanFrame>>,
    responder: Mutex<Option<Responder>>,
    /// 模拟发送失败
    fail_sends: AtomicBool,
    /// 读超时（分离前后共享）
    read_timeout: Mutex<Duration>,
}

impl MockShared {
    fn push_rx(&self, frame: CanFrame) {
        self.rx_queue
            .lock()
            .expect("mock rx queue poisoned")
            .push_back(frame);
        self.rx_cv.notify_one();
    }

    fn send(&self, frame: CanFrame) -> Result<(), CanError> {
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(CanError::Io(std::io::Error::other("mock send failure")));
        }
        self.tx_log
            .lock()
            .expect("mock tx log poisoned")
            .push(frame);

        let replies = {
            let mut responder = self.responder.lock().expect("mock responder poisoned");
            responder.as_mut().map(|f| f(&frame)).unwrap_or_default()
        };
        for reply in replies {
            self.push_rx(reply);
        }
        Ok(())
    }

    fn receive(&self) -> Result<CanFrame, CanError> {
        let timeout = *self.read_timeout.lock().expect("mock timeout poisoned");
        let deadline = Instant::now() + timeout;
        let mut queue = self.rx_queue.lock().expect("mock rx queue poisoned");
        loop {
            if let Some(frame) = queue.pop_front() {
                return Ok(frame);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CanError::Timeout);
            }
            let (guard, _result) = self
                .rx_cv
                .wait_timeout(queue, remaining)
                .expect("mock rx queue poisoned");
            queue = guard;
        }
    }
}

/// Mock CAN 适配器
pub struct MockCanAdapter {
    shared: Arc<MockShared>,
}

impl MockCanAdapter {
    pub fn new() -> Self {
        let shared = Arc::new(MockShared::default());
        *shared.read_timeout.lock().expect("mock timeout poisoned") = Duration::from_millis(2);
        Self { shared }
    }

    /// 测试侧控制句柄（注入入站帧、检查出站记录）
    pub fn handle(&self) -> MockCanHandle {
        MockCanHandle {
            shared: self.shared.clone(),
        }
    }
}

impl Default for MockCanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: CanFrame) -> Result<(), CanError> {
        self.shared.send(frame)
    }

    fn receive(&mut self) -> Result<CanFrame, CanError> {
        self.shared.receive()
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        *self
            .shared
            .read_timeout
            .lock()
            .expect("mock timeout poisoned") = timeout;
    }
}

impl SplittableAdapter for MockCanAdapter {
    type RxAdapter = MockRxAdapter;
    type TxAdapter = MockTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), CanError> {
        Ok((
            MockRxAdapter {
                shared: self.shared.clone(),
            },
            MockTxAdapter {
                shared: self.shared,
            },
        ))
    }
}

/// 分离出的只收端
pub struct MockRxAdapter {
    shared: Arc<MockShared>,
}

impl RxAdapter for MockRxAdapter {
    fn receive(&mut self) -> Result<CanFrame, CanError> {
        self.shared.receive()
    }
}

/// 分离出的只发端
pub struct MockTxAdapter {
    shared: Arc<MockShared>,
}

impl TxAdapter for MockTxAdapter {
    fn send(&mut self, frame: CanFrame) -> Result<(), CanError> {
        self.shared.send(frame)
    }
}

/// 测试侧控制句柄
///
/// 可跨线程克隆；适配器被分离或移动后仍然有效。
#[derive(Clone)]
pub struct MockCanHandle {
    shared: Arc<MockShared>,
}

impl MockCanHandle {
    /// 注入一个入站帧（硬件 -> 控制器）
    pub fn inject(&self, frame: CanFrame) {
        self.shared.push_rx(frame);
    }

    /// 所有已发送帧的快照
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.shared
            .tx_log
            .lock()
            .expect("mock tx log poisoned")
            .clone()
    }

    /// 已发送帧数量
    pub fn sent_count(&self) -> usize {
        self.shared
            .tx_log
            .lock()
            .expect("mock tx log poisoned")
            .len()
    }

    /// 安装应答器：每次发送后自动注入其返回的帧
    pub fn set_responder(
        &self,
        responder: impl FnMut(&CanFrame) -> Vec<CanFrame> + Send + 'static,
    ) {
        *self.shared.responder.lock().expect("mock responder poisoned") =
            Some(Box::new(responder));
    }

    /// 移除应答器
    pub fn clear_responder(&self) {
        *self.shared.responder.lock().expect("mock responder poisoned") = None;
    }

    /// 打开/关闭发送失败模拟
    pub fn set_fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::Release);
    }
}
