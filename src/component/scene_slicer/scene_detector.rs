use crate::error::Result;
use crate::tools::{FfmpegFrameSource, FrameSource, LumaFrame, ProgressReporter};
use log::{debug, info};
use std::path::Path;

const PROGRESS_LOG_INTERVAL: u64 = 100;

/// 場景偵測設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneDetectorConfig {
    /// 相鄰影格的平均亮度差超過此值即視為場景變換，越低越敏感
    pub threshold: f64,
    /// 只分析影片開頭的秒數
    pub max_duration: f64,
}

impl Default for SceneDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 30.0,
            max_duration: 40.0,
        }
    }
}

impl SceneDetectorConfig {
    #[must_use]
    pub const fn new(threshold: f64, max_duration: f64) -> Self {
        Self {
            threshold,
            max_duration,
        }
    }

    /// 實際要掃描的影格數
    #[must_use]
    pub fn max_frames(&self, fps: f64, total_frames: u64) -> u64 {
        if fps <= 0.0 || self.max_duration <= 0.0 {
            return 0;
        }
        let by_duration = (self.max_duration * fps).floor() as u64;
        by_duration.min(total_frames)
    }
}

/// 開啟影片並偵測開頭片段的場景變換點
pub fn detect_scene_changes(
    ffmpeg: &Path,
    ffprobe: &Path,
    video_path: &Path,
    config: &SceneDetectorConfig,
    progress: &dyn ProgressReporter,
) -> Result<Vec<f64>> {
    let source = FfmpegFrameSource::open(ffmpeg, ffprobe, video_path)?;
    info!("開始場景偵測: {}", video_path.display());
    detect(source, config, progress)
}

/// 比較相鄰影格的平均絕對差，回傳場景變換的時間點（秒）
///
/// 影格來源在函式結束時釋放，包含讀取錯誤與串流提早結束的情況。
pub fn detect<S: FrameSource>(
    mut source: S,
    config: &SceneDetectorConfig,
    progress: &dyn ProgressReporter,
) -> Result<Vec<f64>> {
    let fps = source.fps();
    let max_frames = config.max_frames(fps, source.frame_count());

    info!(
        "場景偵測參數: threshold={}, max_duration={}s, fps={fps:.3}, 掃描 {max_frames} 幀",
        config.threshold, config.max_duration
    );

    let mut scene_changes = Vec::new();
    let mut previous: Option<LumaFrame> = None;

    for frame_index in 0..max_frames {
        let Some(frame) = source.read_next()? else {
            debug!("影格串流在第 {frame_index} 幀提早結束");
            break;
        };

        if let Some(prev) = &previous {
            let mean_diff = frame.mean_abs_diff(prev);
            if mean_diff > config.threshold {
                let timestamp = frame_index as f64 / fps;
                info!("偵測到場景變換: {timestamp:.2}s (diff={mean_diff:.2})");
                scene_changes.push(timestamp);
            }
        }
        previous = Some(frame);

        let scanned = frame_index + 1;
        if scanned < max_frames {
            progress.report(scanned as f64 / max_frames as f64 * 100.0);
        }
        if scanned % PROGRESS_LOG_INTERVAL == 0 {
            debug!("場景偵測進度: {scanned}/{max_frames}");
        }
    }

    progress.report(100.0);
    info!("場景偵測完成，共 {} 個變換點", scene_changes.len());

    Ok(scene_changes)
}
