use log::{info, warn};
use std::fmt;

/// 起始點的選取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// 找到可以完整容納所有片段的場景變換點
    FullFit,
    /// 從第一個場景變換點開始，減少片段數量
    FirstChangePartial,
    /// 從影片開頭開始
    FromStart,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullFit => write!(f, "場景變換點（完整容納）"),
            Self::FirstChangePartial => write!(f, "第一個場景變換點（減少片段數）"),
            Self::FromStart => write!(f, "影片開頭"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencePlan {
    pub start_time: f64,
    pub count: usize,
    pub strategy: SelectionStrategy,
}

/// 決定擷取起點與實際片段數量
///
/// 策略依序：
/// 1. 第一個能完整容納 `sequence_length * num_sequences` 的場景變換點
/// 2. 第一個場景變換點，片段數量減為剩餘長度可容納的數量
/// 3. 影片開頭，維持原本的數量（超出的片段在擷取時略過）
#[must_use]
pub fn select_sequence(
    scene_changes: &[f64],
    video_duration: f64,
    sequence_length: f64,
    num_sequences: usize,
) -> SequencePlan {
    let total_length = sequence_length * num_sequences as f64;

    if let Some(&start_time) = scene_changes
        .iter()
        .find(|&&sc| sc + total_length <= video_duration)
    {
        return SequencePlan {
            start_time,
            count: num_sequences,
            strategy: SelectionStrategy::FullFit,
        };
    }

    warn!("沒有可完整容納 {num_sequences} 個片段的場景變換點");

    if let Some(&first_change) = scene_changes.first() {
        let max_sequences = if sequence_length > 0.0 {
            ((video_duration - first_change) / sequence_length).floor()
        } else {
            0.0
        };

        if max_sequences >= 1.0 {
            let count = num_sequences.min(max_sequences as usize);
            info!("使用第一個場景變換點 {first_change:.2}s，片段數量調整為 {count}");
            return SequencePlan {
                start_time: first_change,
                count,
                strategy: SelectionStrategy::FirstChangePartial,
            };
        }

        warn!("第一個場景變換點之後的長度不足，改從影片開頭擷取");
    } else {
        warn!("未偵測到場景變換，改從影片開頭擷取");
    }

    SequencePlan {
        start_time: 0.0,
        count: num_sequences,
        strategy: SelectionStrategy::FromStart,
    }
}
