//! 帧延迟执行队列
//!
//! 一帧内收集可失败的操作，在帧结束的同步点统一执行并汇报失败。

use crate::core::error::BridgeError;
use crate::impl_default_and_new;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

type DeferredCallback = Box<dyn FnOnce() -> Result<(), BridgeError>>;

struct Deferred {
    label: String,
    callback: DeferredCallback,
}

/// A failure collected during a frame.
#[derive(Debug)]
pub struct DeferredFailure {
    pub label: String,
    pub error: BridgeError,
}

impl fmt::Display for DeferredFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.label, self.error)
    }
}

/// Outcome of one `end_frame`.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Deferred callbacks executed this frame.
    pub ran: usize,
    pub failures: Vec<DeferredFailure>,
    /// Cache entries evicted for destroyed objects.
    pub evicted: usize,
    /// Slots whose handle had been garbage collected.
    pub reclaimed: usize,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// FIFO queue drained once per frame tick.
///
/// Callbacks queued while the queue is being drained run on the next frame.
pub struct FrameQueue {
    pending: RefCell<VecDeque<Deferred>>,
    failures: RefCell<Vec<DeferredFailure>>,
}

impl_default_and_new!(FrameQueue {
    pending: RefCell::new(VecDeque::new()),
    failures: RefCell::new(Vec::new()),
});

impl FrameQueue {
    pub fn defer<F>(&self, label: impl Into<String>, callback: F)
    where
        F: FnOnce() -> Result<(), BridgeError> + 'static,
    {
        self.pending.borrow_mut().push_back(Deferred {
            label: label.into(),
            callback: Box::new(callback),
        });
    }

    /// Runs `op` now; a failure is held back until the end of the frame.
    pub fn try_in_frame<T, E, F>(&self, label: impl Into<String>, op: F) -> Option<T>
    where
        E: Into<BridgeError>,
        F: FnOnce() -> Result<T, E>,
    {
        match op() {
            Ok(value) => Some(value),
            Err(err) => {
                self.failures.borrow_mut().push(DeferredFailure {
                    label: label.into(),
                    error: err.into(),
                });
                None
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn end_frame(&self) -> FrameReport {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        let mut report = FrameReport {
            failures: std::mem::take(&mut *self.failures.borrow_mut()),
            ..FrameReport::default()
        };

        for deferred in batch {
            report.ran += 1;
            if let Err(error) = (deferred.callback)() {
                tracing::warn!(target: "frame", label = %deferred.label, %error, "Deferred callback failed");
                report.failures.push(DeferredFailure {
                    label: deferred.label,
                    error,
                });
            }
        }

        // try_in_frame 在回调中产生的失败也归入本帧
        report
            .failures
            .extend(std::mem::take(&mut *self.failures.borrow_mut()));
        report
    }
}
