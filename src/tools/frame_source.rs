//! 影格來源
//!
//! [`FrameSource`] 抽象出可循序讀取、可跳轉的灰階影格串流。
//! [`FfmpegFrameSource`] 以 ffmpeg 子程序解碼，輸出 `gray` 格式的 rawvideo。

use crate::error::{Result, SlicerError};
use crate::tools::ffprobe_info::{VideoInfo, get_video_info};
use crate::tools::progress_monitor::drain_stderr;
use log::{debug, warn};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

/// 單通道亮度影格，每個像素一個位元組
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LumaFrame {
    #[must_use]
    pub const fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// 以單一亮度值填滿的影格
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 與另一影格的平均絕對像素差
    #[must_use]
    pub fn mean_abs_diff(&self, other: &Self) -> f64 {
        let len = self.data.len().min(other.data.len());
        if len == 0 {
            return 0.0;
        }

        let sum: u64 = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| u64::from(a.abs_diff(b)))
            .sum();

        sum as f64 / len as f64
    }
}

/// 可循序讀取的影片來源，釋放由 `Drop` 負責
pub trait FrameSource {
    fn fps(&self) -> f64;

    fn frame_count(&self) -> u64;

    fn dimensions(&self) -> (u32, u32);

    fn duration(&self) -> f64 {
        let fps = self.fps();
        if fps > 0.0 {
            self.frame_count() as f64 / fps
        } else {
            0.0
        }
    }

    /// 讀取下一個影格，串流結束時回傳 `None`
    fn read_next(&mut self) -> Result<Option<LumaFrame>>;

    fn seek(&mut self, frame_index: u64) -> Result<()>;
}

struct Decoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_reader: Option<JoinHandle<String>>,
    frames_read: u64,
}

impl Decoder {
    /// 等待解碼程序結束，回傳結束狀態與錯誤輸出
    fn finish(mut self) -> (Option<ExitStatus>, String) {
        let status = self.child.wait().ok();
        let diagnostics = self
            .stderr_reader
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();
        (status, diagnostics)
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// 以 ffmpeg 解碼的影格來源
///
/// 開啟時只呼叫 ffprobe 讀取影片資訊，第一次讀取影格時才啟動解碼程序。
pub struct FfmpegFrameSource {
    ffmpeg: PathBuf,
    path: PathBuf,
    info: VideoInfo,
    start_frame: u64,
    decoder: Option<Decoder>,
    exhausted: bool,
}

impl FfmpegFrameSource {
    pub fn open(ffmpeg: &Path, ffprobe: &Path, path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SlicerError::open(path, "檔案不存在"));
        }

        let info = get_video_info(ffprobe, path)?;
        debug!(
            "開啟影片 {}: {}x{}, {:.3} fps, {} 幀",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count
        );

        Ok(Self {
            ffmpeg: ffmpeg.to_path_buf(),
            path: path.to_path_buf(),
            info,
            start_frame: 0,
            decoder: None,
            exhausted: false,
        })
    }

    fn frame_size(&self) -> usize {
        self.info.width as usize * self.info.height as usize
    }

    fn spawn_decoder(&self) -> Result<Decoder> {
        let mut command = Command::new(&self.ffmpeg);
        command.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-noautorotate"]);

        if self.start_frame > 0 {
            let seek_seconds = self.start_frame as f64 / self.info.frame_rate;
            command.args(["-ss", &format!("{seek_seconds:.3}")]);
        }

        command
            .arg("-i")
            .arg(&self.path)
            .args([
                "-map", "0:v:0", "-an", "-sn", "-dn", "-f", "rawvideo", "-pix_fmt", "gray", "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| SlicerError::open(&self.path, format!("無法啟動 ffmpeg 解碼: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SlicerError::open(&self.path, "無法讀取 ffmpeg 輸出"));
        };

        debug!("啟動解碼程序 [{}]: {}", child.id(), self.path.display());
        let stderr_reader = drain_stderr(&mut child);

        Ok(Decoder {
            child,
            stdout: BufReader::new(stdout),
            stderr_reader,
            frames_read: 0,
        })
    }

    /// 串流讀完後檢查解碼程序是否正常結束
    ///
    /// 一個影格都沒讀到就失敗視為無法解碼；中途失敗只記錄錯誤輸出。
    fn finish_decoder(&mut self) -> Result<()> {
        let Some(decoder) = self.decoder.take() else {
            return Ok(());
        };
        let frames_read = decoder.frames_read;
        let (status, diagnostics) = decoder.finish();

        if status.is_none_or(|s| s.success()) {
            debug!("解碼串流結束: {} ({frames_read} 幀)", self.path.display());
            return Ok(());
        }

        let code = status.and_then(|s| s.code());
        if frames_read == 0 {
            let reason = if diagnostics.is_empty() {
                format!("ffmpeg 解碼失敗 (exit code: {code:?})")
            } else {
                diagnostics
            };
            return Err(SlicerError::open(&self.path, reason));
        }

        warn!(
            "解碼程序在 {frames_read} 幀後異常結束 (exit code: {code:?}): {}: {diagnostics}",
            self.path.display()
        );
        Ok(())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn fps(&self) -> f64 {
        self.info.frame_rate
    }

    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn read_next(&mut self) -> Result<Option<LumaFrame>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.decoder.is_none() {
            self.decoder = Some(self.spawn_decoder()?);
        }

        let frame_size = self.frame_size();
        let mut buffer = vec![0u8; frame_size];
        let read_result = match self.decoder.as_mut() {
            Some(decoder) => decoder.stdout.read_exact(&mut buffer).map(|()| {
                decoder.frames_read += 1;
            }),
            None => return Ok(None),
        };

        match read_result {
            Ok(()) => Ok(Some(LumaFrame::new(
                self.info.width,
                self.info.height,
                buffer,
            ))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.exhausted = true;
                self.finish_decoder()?;
                Ok(None)
            }
            Err(e) => {
                self.decoder = None;
                Err(SlicerError::Io(e))
            }
        }
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        // 重新啟動解碼程序，從目標時間點開始輸出
        self.decoder = None;
        self.exhausted = false;
        self.start_frame = frame_index.min(self.info.frame_count);
        Ok(())
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if self.decoder.take().is_some() {
            debug!("釋放解碼程序: {}", self.path.display());
        }
    }
}
