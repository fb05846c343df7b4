mod disk_space;
mod ffmpeg_capability;
mod ffprobe_info;
mod frame_source;
mod path_validator;
mod progress_monitor;
mod progress_reporter;
mod time_format;

pub use disk_space::{DiskSpaceCheck, available_space, check_disk_space, format_bytes};
pub use ffmpeg_capability::{CapabilityReport, FfmpegCapability};
pub use ffprobe_info::{VideoInfo, get_video_info};
pub use frame_source::{FfmpegFrameSource, FrameSource, LumaFrame};
pub use path_validator::{VIDEO_EXTENSIONS, has_video_extension, validate_video_file};
pub use progress_monitor::{
    MonitorConfig, MonitorOutcome, MonitorState, ProcessExit, ProgressMonitor, ProgressSnapshot,
    SupervisedProcess, TranscodeProcess, temp_progress_path,
};
pub use progress_reporter::{NoProgress, ProgressReporter, ScaledProgress};
pub use time_format::format_time;
