use super::codec_profile::CodecProfile;
use super::extraction_job::{ClipSlot, ExtractionJob, output_path_for};
use super::sequence_selector::{SequencePlan, select_sequence};
use crate::config::{OutputFormat, Quality, UserSettings};
use crate::error::{Result, SlicerError};
use crate::tools::{
    FfmpegCapability, FfmpegFrameSource, FrameSource, MonitorConfig, MonitorOutcome,
    ProgressMonitor, ProgressReporter, ScaledProgress, TranscodeProcess, temp_progress_path,
};
use log::{debug, error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub video_path: PathBuf,
    pub output_folder: PathBuf,
    /// 片段長度（秒）
    pub sequence_length: f64,
    pub num_sequences: usize,
    pub format: OutputFormat,
    pub quality: Quality,
}

impl ExtractionRequest {
    #[must_use]
    pub fn from_settings(
        video_path: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
        settings: &UserSettings,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            output_folder: output_folder.into(),
            sequence_length: f64::from(settings.sequence_length),
            num_sequences: settings.num_sequences as usize,
            format: settings.output_format,
            quality: settings.quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Written,
    /// 片段結束時間超出影片長度，未執行
    SkippedOverrun,
    Failed(String),
    /// 收到中斷信號，未執行
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotReport {
    pub slot: ClipSlot,
    pub output_path: PathBuf,
    pub outcome: SlotOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// 實際寫出的檔案，依片段順序排列
    pub output_paths: Vec<PathBuf>,
    pub slots: Vec<SlotReport>,
    pub plan: SequencePlan,
    /// 實際使用的格式（可能因編碼器不支援而改變）
    pub format: OutputFormat,
    pub video_duration: f64,
}

impl ExtractionResult {
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&SlotOutcome) -> bool) -> usize {
        self.slots.iter().filter(|s| predicate(&s.outcome)).count()
    }
}

/// 依場景變換點擷取固定長度的片段
///
/// 每個片段各啟動一次 ffmpeg，依序執行；單一片段失敗不影響後續片段。
pub struct SequenceExtractor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    monitor: ProgressMonitor,
    stop_signal: Arc<AtomicBool>,
}

impl SequenceExtractor {
    #[must_use]
    pub fn new(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        monitor_config: MonitorConfig,
        stop_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            monitor: ProgressMonitor::new(monitor_config),
            stop_signal,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &UserSettings, stop_signal: Arc<AtomicBool>) -> Self {
        let monitor_config = MonitorConfig::default()
            .with_timeout(Duration::from_secs(settings.transcode_timeout_secs));
        Self::new(
            &settings.ffmpeg_path,
            &settings.ffprobe_path,
            monitor_config,
            stop_signal,
        )
    }

    pub fn extract(
        &self,
        request: &ExtractionRequest,
        scene_changes: &[f64],
        progress: &dyn ProgressReporter,
    ) -> Result<ExtractionResult> {
        self.extract_with(request, scene_changes, progress, &mut |_| {})
    }

    /// 同 [`Self::extract`]，每個片段結束後另外呼叫 `on_slot`
    pub fn extract_with(
        &self,
        request: &ExtractionRequest,
        scene_changes: &[f64],
        progress: &dyn ProgressReporter,
        on_slot: &mut dyn FnMut(&SlotReport),
    ) -> Result<ExtractionResult> {
        let capability = FfmpegCapability::new(&self.ffmpeg).probe();
        if !capability.available {
            let reason = capability
                .error
                .unwrap_or_else(|| "ffmpeg 不可用".to_string());
            error!("無法擷取片段: {reason}");
            return Err(SlicerError::EncoderUnavailable(reason));
        }

        let format = capability
            .resolve_format(request.format)
            .ok_or_else(|| SlicerError::EncoderUnavailable("找不到支援的視訊編碼器".to_string()))?;
        if format != request.format {
            warn!("ffmpeg 不支援 {}，改用 {format}", request.format);
        }

        let (video_duration, dimensions) = {
            let source = FfmpegFrameSource::open(&self.ffmpeg, &self.ffprobe, &request.video_path)?;
            (source.duration(), source.dimensions())
        };
        info!(
            "影片長度 {video_duration:.2}s, 尺寸 {}x{}",
            dimensions.0, dimensions.1
        );

        fs::create_dir_all(&request.output_folder)?;

        let plan = select_sequence(
            scene_changes,
            video_duration,
            request.sequence_length,
            request.num_sequences,
        );
        info!(
            "擷取起點 {:.2}s ({})，共 {} 個片段",
            plan.start_time, plan.strategy, plan.count
        );

        let profile = CodecProfile::resolve(format, request.quality);
        let encoder = capability
            .encoder_for(format)
            .unwrap_or_else(|| profile.default_encoder());

        let mut slots = Vec::with_capacity(plan.count);
        let mut output_paths = Vec::new();

        for (index, slot) in plan_slots(&plan, request.sequence_length).into_iter().enumerate() {
            let output_path = output_path_for(
                &request.video_path,
                &request.output_folder,
                slot.index,
                profile.extension(),
            );

            let outcome = if self.stop_signal.load(Ordering::SeqCst) {
                SlotOutcome::Cancelled
            } else if slot.end_time() > video_duration {
                warn!(
                    "片段 {} ({:.2}s - {:.2}s) 超出影片長度 {video_duration:.2}s，略過",
                    index + 1,
                    slot.start_time,
                    slot.end_time()
                );
                SlotOutcome::SkippedOverrun
            } else {
                let slot_progress = ScaledProgress::new(
                    progress,
                    index as f64 / plan.count as f64 * 100.0,
                    100.0 / plan.count as f64,
                );
                let job = ExtractionJob::new(
                    &request.video_path,
                    &request.output_folder,
                    slot,
                    &profile,
                    encoder,
                    dimensions,
                    temp_progress_path(),
                );
                self.run_job(&job, &slot_progress)
            };

            if outcome == SlotOutcome::Written {
                output_paths.push(output_path.clone());
            }

            let report = SlotReport {
                slot,
                output_path,
                outcome,
            };
            on_slot(&report);
            slots.push(report);

            progress.report((index + 1) as f64 / plan.count as f64 * 100.0);
        }

        if plan.count == 0 {
            progress.report(100.0);
        }

        let cancelled = slots
            .iter()
            .filter(|s| s.outcome == SlotOutcome::Cancelled)
            .count();
        if cancelled > 0 {
            warn!("收到中斷信號，{cancelled} 個片段未執行");
        }
        info!(
            "擷取完成: {}/{} 個片段成功",
            output_paths.len(),
            slots.len()
        );

        Ok(ExtractionResult {
            output_paths,
            slots,
            plan,
            format,
            video_duration,
        })
    }

    fn run_job(&self, job: &ExtractionJob, progress: &dyn ProgressReporter) -> SlotOutcome {
        let slot = job.slot();
        info!(
            "擷取片段 {}: {:.2}s - {:.2}s -> {}",
            slot.index + 1,
            slot.start_time,
            slot.end_time(),
            job.output_path().display()
        );
        debug!("ffmpeg 參數: {:?}", job.args());

        let mut process = match TranscodeProcess::spawn(job.build_command(&self.ffmpeg)) {
            Ok(process) => process,
            Err(e) => {
                error!("無法啟動 ffmpeg: {e}");
                return SlotOutcome::Failed(format!("無法啟動 ffmpeg: {e}"));
            }
        };

        let outcome = self.monitor.supervise(
            &mut process,
            job.progress_path(),
            Some(slot.duration),
            progress,
        );
        drop(process);

        match outcome_to_result(slot.index, &outcome) {
            Ok(()) => SlotOutcome::Written,
            Err(e) => {
                error!("{e}");
                let diagnostics = outcome.diagnostics();
                if matches!(e, SlicerError::TimeoutExceeded { .. }) && !diagnostics.is_empty() {
                    error!("ffmpeg 錯誤輸出:\n{diagnostics}");
                }
                remove_partial_output(job.output_path());
                SlotOutcome::Failed(e.to_string())
            }
        }
    }
}

/// 由起點依序排列片段，尚未檢查是否超出影片長度
fn plan_slots(plan: &SequencePlan, sequence_length: f64) -> Vec<ClipSlot> {
    (0..plan.count)
        .map(|index| ClipSlot {
            index,
            start_time: plan.start_time + index as f64 * sequence_length,
            duration: sequence_length,
        })
        .collect()
}

fn outcome_to_result(index: usize, outcome: &MonitorOutcome) -> Result<()> {
    match outcome {
        MonitorOutcome::Finished { code: Some(0), .. } => Ok(()),
        MonitorOutcome::Finished { code, diagnostics } => Err(SlicerError::SubprocessFailure {
            index,
            code: *code,
            stderr: diagnostics.clone(),
        }),
        MonitorOutcome::TimedOut { elapsed, .. } | MonitorOutcome::ForceKilled { elapsed, .. } => {
            Err(SlicerError::TimeoutExceeded {
                index,
                seconds: elapsed.as_secs_f64(),
            })
        }
    }
}

fn remove_partial_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("已刪除不完整的輸出: {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("無法刪除不完整的輸出 {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::scene_slicer::sequence_selector::SelectionStrategy;
    use crate::tools::NoProgress;

    #[test]
    fn test_plan_slots_are_contiguous() {
        let plan = SequencePlan {
            start_time: 5.0,
            count: 3,
            strategy: SelectionStrategy::FullFit,
        };
        let slots = plan_slots(&plan, 10.0);

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start_time, 5.0);
        assert_eq!(slots[1].start_time, 15.0);
        assert_eq!(slots[2].start_time, 25.0);
        assert!(slots.windows(2).all(|w| w[0].end_time() == w[1].start_time));
        assert!(slots.iter().enumerate().all(|(i, s)| s.index == i));
    }

    #[test]
    fn test_outcome_to_result() {
        let ok = MonitorOutcome::Finished {
            code: Some(0),
            diagnostics: String::new(),
        };
        assert!(outcome_to_result(0, &ok).is_ok());

        let failed = MonitorOutcome::Finished {
            code: Some(1),
            diagnostics: "Invalid argument".to_string(),
        };
        match outcome_to_result(2, &failed) {
            Err(SlicerError::SubprocessFailure {
                index,
                code,
                stderr,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "Invalid argument");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let killed = MonitorOutcome::ForceKilled {
            elapsed: Duration::from_secs(35),
            diagnostics: String::new(),
        };
        let err = outcome_to_result(1, &killed).unwrap_err();
        assert!(matches!(err, SlicerError::TimeoutExceeded { index: 1, .. }));
        assert!(err.is_job_failure());

        let signalled = MonitorOutcome::Finished {
            code: None,
            diagnostics: String::new(),
        };
        assert!(outcome_to_result(0, &signalled).is_err());
    }

    #[test]
    fn test_remove_partial_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("partial.mp4");
        fs::write(&path, b"partial").unwrap();

        remove_partial_output(&path);
        assert!(!path.exists());
        // 不存在時不應出錯
        remove_partial_output(&path);
    }

    #[test]
    fn test_missing_ffmpeg_is_encoder_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let extractor = SequenceExtractor::new(
            "/nonexistent/ffmpeg",
            "/nonexistent/ffprobe",
            MonitorConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let request = ExtractionRequest {
            video_path: temp_dir.path().join("video.mp4"),
            output_folder: temp_dir.path().join("out"),
            sequence_length: 10.0,
            num_sequences: 3,
            format: OutputFormat::H264,
            quality: Quality::Medium,
        };

        let result = extractor.extract(&request, &[5.0], &NoProgress);
        assert!(matches!(result, Err(SlicerError::EncoderUnavailable(_))));
        assert!(!request.output_folder.exists());
    }

    #[test]
    fn test_request_from_settings() {
        let settings = UserSettings {
            sequence_length: 8,
            num_sequences: 4,
            output_format: OutputFormat::H265,
            quality: Quality::High,
            ..UserSettings::default()
        };
        let request = ExtractionRequest::from_settings("/v/a.mp4", "/out", &settings);

        assert_eq!(request.sequence_length, 8.0);
        assert_eq!(request.num_sequences, 4);
        assert_eq!(request.format, OutputFormat::H265);
        assert_eq!(request.quality, Quality::High);
    }
}
