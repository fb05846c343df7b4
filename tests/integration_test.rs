//! 整合測試 - 以假的 ffmpeg/ffprobe 腳本驗證擷取流程
//!
//! 腳本只模擬必要的輸出：版本、編碼器清單、影片資訊與輸出檔案，
//! 因此不需要安裝 ffmpeg 即可執行。

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tempfile::TempDir;
use video_slicer::SlicerError;
use video_slicer::component::scene_slicer::{
    ExtractionRequest, SceneDetectorConfig, SelectionStrategy, SequenceExtractor, SlotOutcome,
    detect_scene_changes,
};
use video_slicer::config::{OutputFormat, Quality};
use video_slicer::tools::{FfmpegCapability, MonitorConfig, NoProgress};

const LIBX264_LINE: &str = " V....D libx264              libx264 H.264 / AVC";
const PRORES_LINE: &str = " VF...D prores_ks            Apple ProRes (iCodec Pro)";

struct FakeTools {
    dir: TempDir,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    video: PathBuf,
}

impl FakeTools {
    /// `transcode_exit` 為轉檔時的結束代碼，非 0 時會留下不完整的輸出檔
    fn new(encoder_lines: &[&str], transcode_exit: i32, frame_count: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let encoders = encoder_lines
            .iter()
            .map(|line| format!("'{line}'"))
            .collect::<Vec<_>>()
            .join(" ");
        let ffmpeg = dir.path().join("ffmpeg");
        write_script(
            &ffmpeg,
            &format!(
                r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 9.9-fake"
  exit 0
fi
if [ "$2" = "-encoders" ]; then
  printf '%s\n' "Encoders:" " ------" {encoders}
  exit 0
fi
for last in "$@"; do :; done
if [ {transcode_exit} -ne 0 ]; then
  echo "partial" > "$last"
  echo "Conversion failed!" >&2
  exit {transcode_exit}
fi
echo "clip" > "$last"
exit 0
"#
            ),
        );

        let ffprobe = dir.path().join("ffprobe");
        write_script(
            &ffprobe,
            &format!(
                r#"#!/bin/sh
cat <<'JSON'
{{"streams":[{{"codec_type":"video","width":320,"height":240,"r_frame_rate":"25/1","nb_frames":"{frame_count}"}}],"format":{{}}}}
JSON
"#
            ),
        );

        let video = dir.path().join("input.mp4");
        fs::write(&video, b"not really a video").unwrap();

        Self {
            dir,
            ffmpeg,
            ffprobe,
            video,
        }
    }

    fn output_folder(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn extractor(&self, stop: bool) -> SequenceExtractor {
        SequenceExtractor::new(
            &self.ffmpeg,
            &self.ffprobe,
            MonitorConfig {
                timeout: Duration::from_secs(10),
                poll_interval: Duration::from_millis(20),
                source_wait_interval: Duration::from_millis(10),
                grace_period: Duration::from_millis(500),
            },
            Arc::new(AtomicBool::new(stop)),
        )
    }

    fn request(&self, format: OutputFormat) -> ExtractionRequest {
        ExtractionRequest {
            video_path: self.video.clone(),
            output_folder: self.output_folder(),
            sequence_length: 10.0,
            num_sequences: 3,
            format,
            quality: Quality::Medium,
        }
    }
}

fn write_script(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// 測試 1: 編碼器偵測
#[test]
fn test_capability_probe_with_fake_ffmpeg() {
    let tools = FakeTools::new(&[LIBX264_LINE, PRORES_LINE], 0, 1500);
    let report = FfmpegCapability::new(&tools.ffmpeg).probe();

    assert!(report.available);
    assert_eq!(report.version.as_deref(), Some("ffmpeg version 9.9-fake"));
    assert_eq!(report.encoder_for(OutputFormat::ProRes), Some("prores_ks"));
    assert_eq!(report.encoder_for(OutputFormat::H264), Some("libx264"));
    assert!(!report.is_supported(OutputFormat::H265));
}

/// 測試 2: 從場景變換點擷取三個片段
#[test]
fn test_extracts_full_fit_sequences() {
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 1500);
    let result = tools
        .extractor(false)
        .extract(&tools.request(OutputFormat::H264), &[5.0], &NoProgress)
        .unwrap();

    assert_eq!(result.plan.strategy, SelectionStrategy::FullFit);
    assert_eq!(result.video_duration, 60.0);
    assert_eq!(
        result.output_paths,
        vec![
            tools.output_folder().join("input_seq_1.mp4"),
            tools.output_folder().join("input_seq_2.mp4"),
            tools.output_folder().join("input_seq_3.mp4"),
        ]
    );
    assert!(result.output_paths.iter().all(|p| p.exists()));

    let starts: Vec<f64> = result.slots.iter().map(|s| s.slot.start_time).collect();
    assert_eq!(starts, vec![5.0, 15.0, 25.0]);
}

/// 測試 3: 要求的格式不支援時改用第一個可用格式
#[test]
fn test_unsupported_format_falls_back() {
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 1500);
    let result = tools
        .extractor(false)
        .extract(&tools.request(OutputFormat::ProRes), &[5.0], &NoProgress)
        .unwrap();

    assert_eq!(result.format, OutputFormat::H264);
    assert!(
        result
            .output_paths
            .iter()
            .all(|p| p.extension().is_some_and(|e| e == "mp4"))
    );
}

/// 測試 4: 影片太短時所有片段都被略過
#[test]
fn test_short_video_skips_every_slot() {
    // 200 幀 / 25 fps = 8 秒，比一個片段還短
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 200);
    let result = tools
        .extractor(false)
        .extract(&tools.request(OutputFormat::H264), &[], &NoProgress)
        .unwrap();

    assert_eq!(result.plan.strategy, SelectionStrategy::FromStart);
    assert!(result.output_paths.is_empty());
    assert_eq!(result.slots.len(), 3);
    assert!(
        result
            .slots
            .iter()
            .all(|s| s.outcome == SlotOutcome::SkippedOverrun)
    );
}

/// 測試 5: 轉檔失敗不影響其他片段，並刪除不完整的輸出
#[test]
fn test_failed_transcodes_are_isolated() {
    let tools = FakeTools::new(&[LIBX264_LINE], 1, 1500);
    let result = tools
        .extractor(false)
        .extract(&tools.request(OutputFormat::H264), &[5.0], &NoProgress)
        .unwrap();

    assert!(result.output_paths.is_empty());
    assert_eq!(result.slots.len(), 3);
    for report in &result.slots {
        assert!(matches!(report.outcome, SlotOutcome::Failed(_)));
        assert!(!report.output_path.exists());
    }
}

/// 測試 6: 停止旗標已設定時不啟動任何轉檔
#[test]
fn test_stop_signal_cancels_remaining_slots() {
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 1500);
    let result = tools
        .extractor(true)
        .extract(&tools.request(OutputFormat::H264), &[5.0], &NoProgress)
        .unwrap();

    assert!(result.output_paths.is_empty());
    assert!(
        result
            .slots
            .iter()
            .all(|s| s.outcome == SlotOutcome::Cancelled)
    );

    // 未執行的片段仍回報預定的輸出路徑，但不會產生檔案
    for (i, report) in result.slots.iter().enumerate() {
        assert_eq!(
            report.output_path,
            tools.output_folder().join(format!("input_seq_{}.mp4", i + 1))
        );
        assert!(!report.output_path.exists());
    }
}

/// 測試 7: 沒有可用的編碼器
#[test]
fn test_no_encoders_is_fatal() {
    let tools = FakeTools::new(&[], 0, 1500);
    let result = tools
        .extractor(false)
        .extract(&tools.request(OutputFormat::H264), &[5.0], &NoProgress);

    assert!(matches!(result, Err(SlicerError::EncoderUnavailable(_))));
}

/// 測試 8: 擷取進度單調遞增並以 100 結束
#[test]
fn test_extraction_progress_is_monotonic() {
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 1500);
    let seen = std::sync::Mutex::new(Vec::new());
    let reporter = |p: f64| seen.lock().unwrap().push(p);

    tools
        .extractor(false)
        .extract(&tools.request(OutputFormat::H264), &[5.0], &reporter)
        .unwrap();

    let seen = seen.into_inner().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1] + 1e-9));
    assert_eq!(seen.last().copied(), Some(100.0));
}

/// 測試 9: ffprobe 正常但 ffmpeg 無法解碼時回報開啟錯誤
#[test]
fn test_undecodable_video_is_open_error() {
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 1500);
    write_script(
        &tools.ffmpeg,
        r#"#!/bin/sh
echo "input.mp4: Invalid data found when processing input" >&2
exit 1
"#,
    );

    let result = detect_scene_changes(
        &tools.ffmpeg,
        &tools.ffprobe,
        &tools.video,
        &SceneDetectorConfig::default(),
        &NoProgress,
    );

    match result {
        Err(SlicerError::Open { path, reason }) => {
            assert_eq!(path, tools.video);
            assert!(reason.contains("Invalid data found"), "{reason}");
        }
        other => panic!("應該回報無法解碼: {other:?}"),
    }
}

/// 測試 10: 解碼中途失敗時保留已讀到的影格
#[test]
fn test_decoder_failure_after_frames_keeps_result() {
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 1500);
    // 兩個全黑的 320x240 灰階影格後異常結束
    write_script(
        &tools.ffmpeg,
        r#"#!/bin/sh
head -c 153600 /dev/zero
echo "corrupt packet" >&2
exit 1
"#,
    );

    let changes = detect_scene_changes(
        &tools.ffmpeg,
        &tools.ffprobe,
        &tools.video,
        &SceneDetectorConfig::default(),
        &NoProgress,
    )
    .unwrap();

    assert!(changes.is_empty());
}

/// 測試 11: ffmpeg -version 失敗時報告包含錯誤輸出
#[test]
fn test_capability_probe_reports_version_stderr() {
    let tools = FakeTools::new(&[LIBX264_LINE], 0, 1500);
    write_script(
        &tools.ffmpeg,
        r#"#!/bin/sh
echo "error while loading shared libraries: libavcodec.so" >&2
exit 127
"#,
    );

    let report = FfmpegCapability::new(&tools.ffmpeg).probe();

    assert!(!report.available);
    let message = report.error.unwrap_or_default();
    assert!(message.contains("libavcodec.so"), "{message}");
}
