//! 場景片段擷取流程的錯誤類型
//!
//! 核心元件回傳 [`SlicerError`]；選單與主程式層則沿用 `anyhow`。

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlicerError {
    /// 影片無法開啟或解碼，只影響目前這部影片
    #[error("無法開啟影片 {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// 找不到任何可用的視訊編碼器，整個擷取呼叫失敗
    #[error("沒有可用的視訊編碼器: {0}")]
    EncoderUnavailable(String),

    /// 單一片段的轉檔程序以非零狀態結束
    #[error("片段 {index} 轉檔失敗 (exit code: {code:?}): {stderr}")]
    SubprocessFailure {
        index: usize,
        code: Option<i32>,
        stderr: String,
    },

    /// 單一片段的轉檔超過時間限制
    #[error("片段 {index} 轉檔逾時 ({seconds:.1}s)")]
    TimeoutExceeded { index: usize, seconds: f64 },

    #[error("處理執行緒異常終止")]
    WorkerPanicked,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SlicerError {
    pub fn open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 是否屬於單一片段的失敗（不應中斷整批擷取）
    #[must_use]
    pub const fn is_job_failure(&self) -> bool {
        matches!(
            self,
            Self::SubprocessFailure { .. } | Self::TimeoutExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SlicerError>;
