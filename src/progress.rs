//! # 进度与取消模块
//!
//! 所有进度信息通过同一个事件类型 [`Progress`] 发送给可选的 [`ProgressHandler`]。
//! [`ProgressScope`] 负责把子步骤的进度映射到整个操作的区间，并对百分比更新限流，
//! 同时在批次边界检查 [`CancellationToken`]。

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;

use crate::constants::MIN_BATCH_BITS;
use crate::error::{Result, StegoError};

/// 单次操作所处的阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ReadingContainer,
    ReadingPayload,
    BuildingHeader,
    CheckingCapacity,
    Transferring,
    WritingOutput,
    Done,
    /// 任一阶段出错后的终止状态
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::ReadingContainer => "reading container",
            Stage::ReadingPayload => "reading payload",
            Stage::BuildingHeader => "building header",
            Stage::CheckingCapacity => "checking capacity",
            Stage::Transferring => "transferring bits",
            Stage::WritingOutput => "writing output",
            Stage::Done => "done",
            Stage::Failed => "failed",
        })
    }
}

/// 进度事件。
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// 进入新的阶段
    Stage(Stage),
    /// 整个操作的完成比例，位于 [0, 1]
    Percent(f64),
    /// 最终生成的文件路径
    Output(PathBuf),
}

/// 接收进度事件。编解码器不假定回调运行在哪个线程上。
pub trait ProgressHandler: Sync {
    fn handle(&self, event: Progress);
}

impl<F> ProgressHandler for F
where
    F: Fn(Progress) + Sync,
{
    fn handle(&self, event: Progress) {
        self(event)
    }
}

impl ProgressHandler for Sender<Progress> {
    fn handle(&self, event: Progress) {
        // 接收端已关闭时丢弃事件，不影响操作本身
        let _ = self.send(event);
    }
}

/// 可跨线程克隆的取消标记。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 已取消时返回 [`StegoError::Cancelled`]。
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(StegoError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// 操作中某一段的进度视图。
///
/// `report` 接收的是该段内部的比例，输出的是整个操作的比例
/// `start + span * fraction`。只有当比例前进了至少 `1 / updates`
/// 时才真正发送事件，所以回调频率与载荷大小无关。
pub struct ProgressScope<'a> {
    handler: Option<&'a dyn ProgressHandler>,
    cancel: &'a CancellationToken,
    updates: usize,
    start: f64,
    span: f64,
    last: Option<f64>,
}

impl<'a> ProgressScope<'a> {
    pub fn new(
        handler: Option<&'a dyn ProgressHandler>,
        cancel: &'a CancellationToken,
        updates: usize,
    ) -> Self {
        Self {
            handler,
            cancel,
            updates: updates.max(1),
            start: 0.0,
            span: 1.0,
            last: None,
        }
    }

    /// 以当前段的 `[start, start + span]` 为范围创建子段。
    pub fn sub(&self, start: f64, span: f64) -> ProgressScope<'a> {
        ProgressScope {
            handler: self.handler,
            cancel: self.cancel,
            updates: self.updates,
            start: self.start + self.span * start,
            span: self.span * span,
            last: None,
        }
    }

    /// 限流后的进度更新。
    pub fn report(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let due = match self.last {
            None => true,
            Some(last) => fraction - last >= 1.0 / self.updates as f64,
        };
        if due {
            self.emit(fraction);
        }
    }

    /// 不经限流，立即发送当前段内的比例。
    pub fn set(&mut self, fraction: f64) {
        self.emit(fraction.clamp(0.0, 1.0));
    }

    /// 标记该段完成。
    pub fn finish(&mut self) {
        if self.last != Some(1.0) {
            self.emit(1.0);
        }
    }

    pub fn stage(&self, stage: Stage) {
        if let Some(handler) = self.handler {
            handler.handle(Progress::Stage(stage));
        }
    }

    pub fn output(&self, path: PathBuf) {
        if let Some(handler) = self.handler {
            handler.handle(Progress::Output(path));
        }
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    /// 批次边界：检查取消并主动让出时间片。
    pub fn checkpoint(&self) -> Result<()> {
        self.cancel.check()?;
        thread::yield_now();
        Ok(())
    }

    /// 处理 `total` 个 bit 时每批的大小，保证批次数大致等于 `updates`。
    pub fn batch_size(&self, total: usize) -> usize {
        total.div_ceil(self.updates).max(MIN_BATCH_BITS)
    }

    fn emit(&mut self, fraction: f64) {
        self.last = Some(fraction);
        if let Some(handler) = self.handler {
            handler.handle(Progress::Percent(self.start + self.span * fraction));
        }
    }
}
