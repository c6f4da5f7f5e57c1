//! # 错误类型模块
//!
//! 底层模块返回 [`StegoError`]，公开操作在边界处把它包装成 [`CodecError`]，
//! 附带失败的操作和所处阶段。

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::constants::HIDE_HEADER_SIZE;
use crate::progress::Stage;

#[derive(Error, Debug)]
pub enum StegoError {
    /// 不是 BMP 文件、位深度不受支持、经过压缩或头部不一致
    #[error("unsupported container: {0}")]
    Format(String),

    /// 数据头加载荷超出了可用的 LSB 位置
    #[error(
        "payload of {required} bytes exceeds the hiding capacity of {capacity} bytes \
         ({available} bytes of LSB slots, {} reserved for the header)",
        HIDE_HEADER_SIZE
    )]
    CapacityExceeded {
        required: u64,
        capacity: u64,
        /// `available_bits / 8`，容量为 0 时也如实给出
        available: u64,
    },

    /// 数据头标识不匹配，或者声明的长度超出了容器
    #[error("hidden data is invalid: {0}")]
    Integrity(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl StegoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StegoError::Io {
            path: path.into(),
            source,
        }
    }
}

/// 公开操作的种类，用于错误信息的前缀。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Embed,
    Extract,
    Verify,
    ComputeCapacity,
    Inspect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Embed => "embedding",
            Operation::Extract => "extraction",
            Operation::Verify => "verification",
            Operation::ComputeCapacity => "capacity computation",
            Operation::Inspect => "inspection",
        })
    }
}

/// 公开操作返回的错误：操作 + 阶段 + 原始原因。
#[derive(Error, Debug)]
#[error("{operation} failed while {stage}: {source}")]
pub struct CodecError {
    operation: Operation,
    stage: Stage,
    #[source]
    source: StegoError,
}

impl CodecError {
    pub(crate) fn new(operation: Operation, stage: Stage, source: StegoError) -> Self {
        Self {
            operation,
            stage,
            source,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 底层错误，供调用方按类别匹配。
    pub fn kind(&self) -> &StegoError {
        &self.source
    }

    pub fn into_kind(self) -> StegoError {
        self.source
    }
}

pub type Result<T, E = StegoError> = std::result::Result<T, E>;
