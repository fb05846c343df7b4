//! 背景執行緒上的場景偵測與片段擷取
//!
//! 兩個階段依序執行，進度以 [`PipelineEvent`] 經由 channel 送回呼叫端，
//! 呼叫端自行決定何時讀取。

use super::extractor::{ExtractionRequest, ExtractionResult, SequenceExtractor, SlotReport};
use super::scene_detector::{SceneDetectorConfig, detect_scene_changes};
use crate::config::UserSettings;
use crate::error::{Result, SlicerError};
use crate::tools::ProgressReporter;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

const DETECTION_SHARE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Detection,
    Extraction,
}

impl PipelineStage {
    /// 此階段在整體進度中的起點與區間
    const fn range(self) -> (f64, f64) {
        match self {
            Self::Detection => (0.0, DETECTION_SHARE),
            Self::Extraction => (DETECTION_SHARE, 100.0 - DETECTION_SHARE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted(PipelineStage),
    Progress {
        stage: PipelineStage,
        stage_percent: f64,
        overall_percent: f64,
    },
    SceneChangesDetected(Vec<f64>),
    ClipFinished(SlotReport),
    Finished { written: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub video_path: PathBuf,
    pub output_folder: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub scene_changes: Vec<f64>,
    pub extraction: ExtractionResult,
}

/// 將階段內的百分比轉為事件
struct StageReporter<'a> {
    stage: PipelineStage,
    events: &'a Sender<PipelineEvent>,
}

impl ProgressReporter for StageReporter<'_> {
    fn report(&self, percent: f64) {
        let stage_percent = percent.clamp(0.0, 100.0);
        let (offset, span) = self.stage.range();
        // 接收端已關閉時直接丟棄
        let _ = self.events.send(PipelineEvent::Progress {
            stage: self.stage,
            stage_percent,
            overall_percent: offset + stage_percent / 100.0 * span,
        });
    }
}

/// 在目前執行緒上依序執行偵測與擷取
pub fn run_pipeline(
    request: &PipelineRequest,
    settings: &UserSettings,
    stop_signal: Arc<AtomicBool>,
    events: &Sender<PipelineEvent>,
) -> Result<PipelineOutcome> {
    info!("開始處理影片: {}", request.video_path.display());

    let _ = events.send(PipelineEvent::StageStarted(PipelineStage::Detection));
    let detector_config =
        SceneDetectorConfig::new(settings.scene_threshold, settings.max_analysis_duration);
    let scene_changes = detect_scene_changes(
        &settings.ffmpeg_path,
        &settings.ffprobe_path,
        &request.video_path,
        &detector_config,
        &StageReporter {
            stage: PipelineStage::Detection,
            events,
        },
    )?;
    let _ = events.send(PipelineEvent::SceneChangesDetected(scene_changes.clone()));

    let _ = events.send(PipelineEvent::StageStarted(PipelineStage::Extraction));
    let extractor = SequenceExtractor::from_settings(settings, stop_signal);
    let extraction_request =
        ExtractionRequest::from_settings(&request.video_path, &request.output_folder, settings);
    let extraction = extractor.extract_with(
        &extraction_request,
        &scene_changes,
        &StageReporter {
            stage: PipelineStage::Extraction,
            events,
        },
        &mut |report| {
            let _ = events.send(PipelineEvent::ClipFinished(report.clone()));
        },
    )?;

    let _ = events.send(PipelineEvent::Finished {
        written: extraction.output_paths.len(),
        total: extraction.slots.len(),
    });

    Ok(PipelineOutcome {
        scene_changes,
        extraction,
    })
}

/// 背景執行中的處理流程
pub struct PipelineHandle {
    events: Receiver<PipelineEvent>,
    worker: JoinHandle<Result<PipelineOutcome>>,
}

impl PipelineHandle {
    /// 事件接收端；處理結束後 `iter()` 會自然結束
    #[must_use]
    pub const fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn join(self) -> Result<PipelineOutcome> {
        self.worker.join().map_err(|_| SlicerError::WorkerPanicked)?
    }
}

/// 在新的執行緒上執行 [`run_pipeline`]，呼叫端不會被阻塞
pub fn spawn_pipeline(
    request: PipelineRequest,
    settings: UserSettings,
    stop_signal: Arc<AtomicBool>,
) -> Result<PipelineHandle> {
    let (sender, receiver) = mpsc::channel();

    let worker = thread::Builder::new()
        .name("scene-slicer".to_string())
        .spawn(move || {
            let result = run_pipeline(&request, &settings, stop_signal, &sender);
            debug!("處理執行緒結束: {}", request.video_path.display());
            result
        })?;

    Ok(PipelineHandle {
        events: receiver,
        worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_reporter_maps_to_overall() {
        let (sender, receiver) = mpsc::channel();

        StageReporter {
            stage: PipelineStage::Detection,
            events: &sender,
        }
        .report(50.0);
        StageReporter {
            stage: PipelineStage::Extraction,
            events: &sender,
        }
        .report(150.0);
        drop(sender);

        let events: Vec<PipelineEvent> = receiver.iter().collect();
        assert_eq!(
            events,
            vec![
                PipelineEvent::Progress {
                    stage: PipelineStage::Detection,
                    stage_percent: 50.0,
                    overall_percent: 25.0,
                },
                PipelineEvent::Progress {
                    stage: PipelineStage::Extraction,
                    stage_percent: 100.0,
                    overall_percent: 100.0,
                },
            ]
        );
    }

    #[test]
    fn test_reporter_survives_closed_receiver() {
        let (sender, receiver) = mpsc::channel();
        drop(receiver);
        StageReporter {
            stage: PipelineStage::Extraction,
            events: &sender,
        }
        .report(10.0);
    }

    #[test]
    fn test_spawned_pipeline_reports_open_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let request = PipelineRequest {
            video_path: temp_dir.path().join("missing.mp4"),
            output_folder: temp_dir.path().join("out"),
        };

        let handle = spawn_pipeline(
            request,
            UserSettings::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        let events: Vec<PipelineEvent> = handle.events().iter().collect();
        let result = handle.join();

        assert_eq!(
            events,
            vec![PipelineEvent::StageStarted(PipelineStage::Detection)]
        );
        assert!(matches!(result, Err(SlicerError::Open { .. })));
    }
}
