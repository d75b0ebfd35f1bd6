//! 核心模块
//!
//! 错误类型、通用宏、日志初始化和帧延迟队列。

pub mod deferred;
pub mod error;
pub mod logging;
pub mod macros;
pub mod utils;

pub use deferred::{DeferredFailure, FrameQueue, FrameReport};
pub use error::{BindingError, BindingResult, BridgeError, BridgeResult};
