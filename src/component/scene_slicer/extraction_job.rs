use super::codec_profile::CodecProfile;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const HD_WIDTH: u32 = 1920;
pub const HD_HEIGHT: u32 = 1080;

/// 單一片段在影片中的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSlot {
    pub index: usize,
    pub start_time: f64,
    pub duration: f64,
}

impl ClipSlot {
    #[must_use]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// 一次 ffmpeg 轉檔所需的全部參數，建立後不再改變
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    slot: ClipSlot,
    input_path: PathBuf,
    output_path: PathBuf,
    progress_path: PathBuf,
    scale_filter: Option<String>,
    video_args: Vec<String>,
    audio_args: Vec<String>,
}

impl ExtractionJob {
    #[must_use]
    pub fn new(
        input_path: &Path,
        output_folder: &Path,
        slot: ClipSlot,
        profile: &CodecProfile,
        encoder: &str,
        dimensions: (u32, u32),
        progress_path: PathBuf,
    ) -> Self {
        let (width, height) = dimensions;
        let scale_filter = (width > HD_WIDTH || height > HD_HEIGHT).then(hd_scale_filter);

        Self {
            slot,
            input_path: input_path.to_path_buf(),
            output_path: output_path_for(input_path, output_folder, slot.index, profile.extension()),
            progress_path,
            scale_filter,
            video_args: profile.video_args(encoder),
            audio_args: profile.audio_args(),
        }
    }

    #[must_use]
    pub const fn slot(&self) -> &ClipSlot {
        &self.slot
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    #[must_use]
    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    #[must_use]
    pub fn scale_filter(&self) -> Option<&str> {
        self.scale_filter.as_deref()
    }

    /// ffmpeg 參數（不含執行檔本身）
    ///
    /// `-ss` 放在 `-i` 之前以快速定位；stdin 保留給結束指令，所以不加 `-nostdin`。
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-nostats",
            "-loglevel", "error",
            "-y",
            "-ss",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        args.push(format!("{:.3}", self.slot.start_time));
        args.push("-t".to_string());
        args.push(format!("{:.3}", self.slot.duration));
        args.push("-i".to_string());
        args.push(self.input_path.to_string_lossy().into_owned());

        if let Some(filter) = &self.scale_filter {
            args.push("-vf".to_string());
            args.push(filter.clone());
        }

        args.extend(self.video_args.iter().cloned());
        args.extend(self.audio_args.iter().cloned());

        args.push("-progress".to_string());
        args.push(self.progress_path.to_string_lossy().into_owned());
        args.push(self.output_path.to_string_lossy().into_owned());

        args
    }

    #[must_use]
    pub fn build_command(&self, ffmpeg: &Path) -> Command {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(self.args());
        cmd
    }
}

/// `{stem}_seq_{序號}{副檔名}`，序號從 1 開始
#[must_use]
pub fn output_path_for(
    input_path: &Path,
    output_folder: &Path,
    index: usize,
    extension: &str,
) -> PathBuf {
    let file_stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output_folder.join(format!("{file_stem}_seq_{}{extension}", index + 1))
}

/// 縮小至 1920x1080 內並補黑邊置中
#[must_use]
pub fn hd_scale_filter() -> String {
    format!(
        "scale={HD_WIDTH}:{HD_HEIGHT}:force_original_aspect_ratio=decrease,\
         pad={HD_WIDTH}:{HD_HEIGHT}:(ow-iw)/2:(oh-ih)/2"
    )
}
