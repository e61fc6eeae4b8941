use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, trace};

use crate::error::{panic_message, TaskError};
use crate::task::Task;

/// 任务执行失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// panic 原样向外传播，`run()` 随之中止，剩余任务被放弃（默认）
    #[default]
    Propagate,
    /// 捕获并记录每个任务的 panic，继续执行后续任务
    Isolate,
}

/// 等待到期的延迟任务
///
/// 按 (deadline, sequence) 升序出堆；sequence 只用来在 deadline
/// 相同时保持提交顺序。
struct PendingEntry {
    deadline: Instant,
    sequence: u64,
    task: Task,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap 是大顶堆，反向比较让最小的组合键成为堆顶；
        // 两个字段都参与比较，不依赖堆本身的插入顺序
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// 调度器内部状态
struct SchedulerState {
    /// 就绪队列，严格 FIFO
    ready: VecDeque<Task>,
    /// 等待集合，按 (deadline, sequence) 排序
    pending: BinaryHeap<PendingEntry>,
    /// 序号计数器，调度器实例生命周期内单调递增、从不重置
    sequence: u64,
    /// 隔离策略下捕获到的失败
    failures: Vec<TaskError>,
    policy: FailurePolicy,
}

/// 单线程协作式任务调度器
///
/// 两个队列加一个运行循环：就绪队列按提交顺序执行，等待集合按
/// (deadline, sequence) 提升。任务在执行中可以继续向调度器提交新
/// 任务，通过克隆句柄把调度器捕获进闭包即可。
///
/// 克隆句柄共享同一组队列，这也是任务自我续期的方式：
///
/// ```no_run
/// use coop_sched::{Task, TaskScheduler};
///
/// let sched = TaskScheduler::new();
/// let handle = sched.clone();
/// sched.submit_immediate(Task::new(move || {
///     handle.submit_immediate(Task::new(|| println!("后续任务")));
/// }));
/// ```
pub struct TaskScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl TaskScheduler {
    /// 创建调度器，失败策略为 [`FailurePolicy::Propagate`]
    pub fn new() -> Self {
        Self::with_policy(FailurePolicy::default())
    }

    /// 指定失败策略创建调度器
    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            state: Rc::new(RefCell::new(SchedulerState {
                ready: VecDeque::new(),
                pending: BinaryHeap::new(),
                sequence: 0,
                failures: Vec::new(),
                policy,
            })),
        }
    }

    /// 把任务追加到就绪队列尾部，在下一次排空时尽快执行
    ///
    /// 总是成功。运行循环排空就绪队列期间提交的任务会被并入当前
    /// 这一轮排空，不必等待等待集合。
    pub fn submit_immediate(&self, task: Task) {
        let mut state = self.state.borrow_mut();
        state.ready.push_back(task);
        trace!(ready = state.ready.len(), "任务进入就绪队列");
    }

    /// `delay` 之后到期执行，deadline = now + delay
    ///
    /// 零延迟是合法的，但不会被快进到就绪队列：任务仍然进入等待
    /// 集合，只在就绪队列排空之后、deadline 已到时被提升。
    pub fn submit_after(&self, delay: Duration, task: Task) {
        let deadline = Instant::now() + delay;
        let mut state = self.state.borrow_mut();
        let sequence = state.sequence;
        state.sequence += 1;
        state.pending.push(PendingEntry {
            deadline,
            sequence,
            task,
        });
        trace!(sequence, delay_ms = delay.as_millis() as u64, "任务进入等待集合");
    }

    /// 运行直到两个队列同时为空
    ///
    /// 就绪队列为空而等待集合非空时，向最近的 deadline 睡眠，随后
    /// 把该任务提升到就绪队列；排空就绪队列时每执行完一个任务都
    /// 重新检查队列，所以执行中提交的立即任务会在同一轮被消化。
    /// 睡眠是整个循环唯一的挂起点。
    ///
    /// 无条件自我续期的任务链会让本函数永不返回，这是约定行为。
    /// 默认失败策略下任务的 panic 直接穿出本函数，剩余任务被放弃。
    pub async fn run(&self) {
        loop {
            // 循环顶部检查：两个队列同时为空才终止
            let next_deadline = {
                let state = self.state.borrow();
                if !state.ready.is_empty() {
                    None
                } else {
                    match state.pending.peek() {
                        Some(entry) => Some(entry.deadline),
                        None => break,
                    }
                }
            };

            if let Some(deadline) = next_deadline {
                if deadline > Instant::now() {
                    sleep_until(deadline).await;
                }
                // 单线程，睡眠期间堆顶不会被别人改动
                let mut state = self.state.borrow_mut();
                if let Some(entry) = state.pending.pop() {
                    debug!(sequence = entry.sequence, "延迟任务到期，提升到就绪队列");
                    state.ready.push_back(entry.task);
                }
            }

            // 排空就绪队列；借用在取出任务后立即释放，任务执行时
            // 才能通过另一个句柄提交新任务
            loop {
                let task = self.state.borrow_mut().ready.pop_front();
                match task {
                    Some(task) => self.execute(task),
                    None => break,
                }
            }
        }
    }

    fn execute(&self, task: Task) {
        let policy = self.state.borrow().policy;
        match policy {
            FailurePolicy::Propagate => task.invoke(),
            FailurePolicy::Isolate => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.invoke())) {
                    let err = TaskError::Panicked(panic_message(payload.as_ref()));
                    error!(%err, "任务执行失败，已隔离");
                    self.state.borrow_mut().failures.push(err);
                }
            }
        }
    }

    /// 就绪队列当前长度
    pub fn ready_len(&self) -> usize {
        self.state.borrow().ready.len()
    }

    /// 等待集合当前长度
    pub fn pending_len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// 两个队列是否都为空
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        state.ready.is_empty() && state.pending.is_empty()
    }

    /// 取走隔离策略下累积的失败记录
    pub fn take_failures(&self) -> Vec<TaskError> {
        std::mem::take(&mut self.state.borrow_mut().failures)
    }
}

impl Clone for TaskScheduler {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}
