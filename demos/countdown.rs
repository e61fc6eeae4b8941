use std::time::Duration;

use coop_sched::{Task, TaskScheduler};
use tracing::{info, Level};

/// 每 400ms 倒数一格，数到 0 为止
fn countdown(sched: &TaskScheduler, n: u32) {
    if n > 0 {
        info!("倒数 => {}", n);
        let next = sched.clone();
        sched.submit_after(
            Duration::from_millis(400),
            Task::new(move || countdown(&next, n - 1)),
        );
    }
}

/// 每 100ms 正数一格，数到 stop 为止
fn countup(sched: &TaskScheduler, start: u32, stop: u32) {
    if start < stop {
        info!("正数 => {}", start);
        let next = sched.clone();
        sched.submit_after(
            Duration::from_millis(100),
            Task::new(move || countup(&next, start + 1, stop)),
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 初始化日志
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("=== 倒数 / 正数交错示例 ===");

    // 两条自我续期的延迟任务链共用一个调度器，
    // 交错顺序完全由绝对 deadline 决定
    let sched = TaskScheduler::new();
    let down = sched.clone();
    let up = sched.clone();
    sched.submit_immediate(Task::new(move || countdown(&down, 5)));
    sched.submit_immediate(Task::new(move || countup(&up, 0, 5)));
    sched.run().await;

    info!("全部任务执行完毕");
}
