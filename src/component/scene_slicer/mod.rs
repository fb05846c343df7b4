//! 場景片段擷取元件
//!
//! 流程：
//! A. 比較相鄰影格偵測影片開頭的場景變換
//! B. 選定擷取起點與片段數量
//! C. 依輸出格式與畫質建立 ffmpeg 參數
//! D. 逐一轉檔並監控進度

mod codec_profile;
mod extraction_job;
mod extractor;
mod main;
mod pipeline;
mod scene_detector;
mod sequence_selector;

pub use codec_profile::{CodecProfile, QualityKnob};
pub use extraction_job::{ClipSlot, ExtractionJob, HD_HEIGHT, HD_WIDTH, hd_scale_filter};
pub use extractor::{
    ExtractionRequest, ExtractionResult, SequenceExtractor, SlotOutcome, SlotReport,
};
pub use main::SceneSlicer;
pub use pipeline::{
    PipelineEvent, PipelineHandle, PipelineOutcome, PipelineRequest, PipelineStage, run_pipeline,
    spawn_pipeline,
};
pub use scene_detector::{SceneDetectorConfig, detect, detect_scene_changes};
pub use sequence_selector::{SelectionStrategy, SequencePlan, select_sequence};
