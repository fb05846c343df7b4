use crate::error::{Result, SlicerError};
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// 無法從串流取得幀率時的預設值
const FALLBACK_FRAME_RATE: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub frame_count: u64,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// 使用 ffprobe 取得影片資訊
pub fn get_video_info(ffprobe: &Path, path: &Path) -> Result<VideoInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| SlicerError::open(path, format!("無法執行 ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SlicerError::open(
            path,
            format!("ffprobe 執行失敗: {}", stderr.trim()),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_ffprobe_output(&stdout).map_err(|reason| SlicerError::open(path, reason))
}

fn parse_ffprobe_output(json: &str) -> std::result::Result<VideoInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| format!("無法解析 ffprobe 輸出: {e}"))?;

    let video_stream = probe
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .ok_or_else(|| "找不到視訊串流".to_string())?;

    let width = video_stream.width.ok_or("無法取得影片寬度")?;
    let height = video_stream.height.ok_or("無法取得影片高度")?;
    if width == 0 || height == 0 {
        return Err(format!("影片尺寸無效: {width}x{height}"));
    }

    // 取得影片長度（優先從 format，其次從 stream）
    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .or(video_stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let frame_rate = video_stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.avg_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or_else(|| {
            debug!("無法取得幀率，使用預設值 {FALLBACK_FRAME_RATE}");
            FALLBACK_FRAME_RATE
        });

    // 容器未記錄幀數時，以長度 × 幀率推算
    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration_seconds.map(|d| (d * frame_rate).round() as u64))
        .ok_or("無法取得影片長度")?;

    Ok(VideoInfo {
        duration_seconds: duration_seconds.unwrap_or(frame_count as f64 / frame_rate),
        width,
        height,
        frame_rate,
        frame_count,
    })
}

/// 解析幀率字串（例如 "30/1" 或 "30000/1001"）
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.parse().ok()?;
        let den: f64 = den_str.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse().ok().filter(|r: &f64| *r > 0.0)
}
