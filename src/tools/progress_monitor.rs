//! 轉檔程序監控
//!
//! ffmpeg 以 `-progress <file>` 將 `key=value` 形式的進度寫入旁路檔案。
//! [`ProgressMonitor`] 輪詢該檔案回報百分比，並負責逾時終止與檔案清理：
//!
//! `WaitingForSource → Polling → {TimedOut, Finished, ForceKilled}`

use crate::tools::progress_reporter::ProgressReporter;
use log::{debug, error, warn};
use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const EXIT_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// 受監控的外部程序
pub trait SupervisedProcess {
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    /// 請求程序自行收尾並結束
    fn request_stop(&mut self) -> io::Result<()>;

    fn kill(&mut self) -> io::Result<()>;

    /// 取出錯誤輸出，只在程序結束後呼叫
    fn take_diagnostics(&mut self) -> String;
}

/// ffmpeg 轉檔子程序
///
/// stderr 由背景執行緒持續讀取，避免管線塞滿造成 ffmpeg 卡住。
pub struct TranscodeProcess {
    child: Child,
    stderr_reader: Option<JoinHandle<String>>,
}

impl TranscodeProcess {
    pub fn spawn(mut command: Command) -> io::Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;
        let stderr_reader = drain_stderr(&mut child);

        Ok(Self {
            child,
            stderr_reader,
        })
    }
}

/// 在背景執行緒讀完子程序的 stderr，結束後回傳去除首尾空白的內容
pub(crate) fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stderr.read_to_end(&mut buffer);
            String::from_utf8_lossy(&buffer).trim().to_string()
        })
    })
}

impl SupervisedProcess for TranscodeProcess {
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ProcessExit {
                code: status.code(),
            }))
    }

    fn request_stop(&mut self) -> io::Result<()> {
        // ffmpeg 從 stdin 讀到 q 會寫完檔尾後結束
        let Some(mut stdin) = self.child.stdin.take() else {
            return Ok(());
        };
        match stdin.write_all(b"q") {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            Err(e) if e.kind() == ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    fn take_diagnostics(&mut self) -> String {
        self.stderr_reader
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl Drop for TranscodeProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            warn!("終止殘留的轉檔程序 [{}]", self.child.id());
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// 進度檔解析結果，只保留最後出現的數值
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub elapsed_seconds: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub finished: bool,
}

impl ProgressSnapshot {
    /// 解析整份進度檔，格式錯誤的行直接略過
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut snapshot = Self::default();

        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                // out_time_ms 實際單位也是微秒
                "out_time_us" | "out_time_ms" => {
                    if let Some(seconds) = value
                        .parse::<i64>()
                        .ok()
                        .filter(|us| *us >= 0)
                        .map(|us| us as f64 / 1_000_000.0)
                    {
                        snapshot.elapsed_seconds = Some(seconds);
                    }
                }
                "out_time" => {
                    if let Some(seconds) = parse_clock(value) {
                        snapshot.elapsed_seconds = Some(seconds);
                    }
                }
                "duration" => {
                    if let Some(duration) = value.parse::<f64>().ok().filter(|d| d.is_finite()) {
                        snapshot.duration_seconds = Some(duration);
                    }
                }
                "progress" => snapshot.finished = value == "end",
                _ => {}
            }
        }

        snapshot
    }

    /// 以進度檔中的長度計算百分比，檔案未提供時改用 `fallback_duration`
    #[must_use]
    pub fn percent(&self, fallback_duration: Option<f64>) -> Option<f64> {
        let duration = self
            .duration_seconds
            .or(fallback_duration)
            .filter(|d| *d > 0.0)?;
        let elapsed = self.elapsed_seconds?;
        Some((elapsed / duration * 100.0).clamp(0.0, 100.0))
    }
}

/// 解析 `HH:MM:SS.micro`
fn parse_clock(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let h = parts[0].parse::<u64>().ok()?;
    let m = parts[1].parse::<u64>().ok()?;
    let s = parts[2].parse::<f64>().ok().filter(|s| *s >= 0.0)?;
    Some((h * 3600 + m * 60) as f64 + s)
}

/// 離開時刪除進度檔
struct SideChannelGuard<'a> {
    path: &'a Path,
}

impl Drop for SideChannelGuard<'_> {
    fn drop(&mut self) {
        match fs::remove_file(self.path) {
            Ok(()) => debug!("已刪除進度檔: {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("無法刪除進度檔 {}: {e}", self.path.display()),
        }
    }
}

fn side_channel_ready(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.len() > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    WaitingForSource,
    Polling,
    TimedOut,
    Finished,
    ForceKilled,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// 從開始監控起算的總時間上限
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub source_wait_interval: Duration,
    /// 要求結束後等待的時間，逾時即強制終止
    pub grace_period: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            source_wait_interval: Duration::from_millis(100),
            grace_period: Duration::from_secs(5),
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    Finished {
        code: Option<i32>,
        diagnostics: String,
    },
    TimedOut {
        elapsed: Duration,
        diagnostics: String,
    },
    ForceKilled {
        elapsed: Duration,
        diagnostics: String,
    },
}

impl MonitorOutcome {
    /// 只有程序自行結束且狀態碼為 0 才算成功
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Finished { code: Some(0), .. })
    }

    #[must_use]
    pub const fn state(&self) -> MonitorState {
        match self {
            Self::Finished { .. } => MonitorState::Finished,
            Self::TimedOut { .. } => MonitorState::TimedOut,
            Self::ForceKilled { .. } => MonitorState::ForceKilled,
        }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &str {
        match self {
            Self::Finished { diagnostics, .. }
            | Self::TimedOut { diagnostics, .. }
            | Self::ForceKilled { diagnostics, .. } => diagnostics,
        }
    }
}

pub struct ProgressMonitor {
    config: MonitorConfig,
}

impl ProgressMonitor {
    #[must_use]
    pub const fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// 監控程序直到結束或逾時
    ///
    /// `progress_path` 無論結果如何都會被刪除。
    pub fn supervise<P: SupervisedProcess + ?Sized>(
        &self,
        process: &mut P,
        progress_path: &Path,
        expected_duration: Option<f64>,
        progress: &dyn ProgressReporter,
    ) -> MonitorOutcome {
        let _side_channel = SideChannelGuard {
            path: progress_path,
        };
        let started = Instant::now();
        let mut state = MonitorState::WaitingForSource;
        let mut last_percent = 0.0_f64;

        let exit = loop {
            match process.try_wait() {
                Ok(Some(exit)) => break Some(exit),
                Ok(None) => {}
                Err(e) => {
                    warn!("無法檢查程序狀態: {e}");
                    break None;
                }
            }

            if started.elapsed() >= self.config.timeout {
                state = MonitorState::TimedOut;
                break None;
            }

            if state == MonitorState::WaitingForSource {
                if side_channel_ready(progress_path) {
                    debug!("進度檔已建立: {}", progress_path.display());
                    state = MonitorState::Polling;
                    continue;
                }
                thread::sleep(self.config.source_wait_interval);
            } else {
                Self::poll_side_channel(
                    progress_path,
                    expected_duration,
                    progress,
                    &mut last_percent,
                );
                thread::sleep(self.config.poll_interval);
            }
        };

        if let Some(exit) = exit {
            progress.report(100.0);
            return MonitorOutcome::Finished {
                code: exit.code,
                diagnostics: process.take_diagnostics(),
            };
        }

        if state == MonitorState::TimedOut {
            warn!(
                "轉檔程序逾時 ({:.1}s)，要求結束",
                started.elapsed().as_secs_f64()
            );
        }
        self.terminate(process, started)
    }

    fn poll_side_channel(
        progress_path: &Path,
        expected_duration: Option<f64>,
        progress: &dyn ProgressReporter,
        last_percent: &mut f64,
    ) {
        let content = match fs::read_to_string(progress_path) {
            Ok(content) => content,
            Err(e) => {
                debug!("無法讀取進度檔 {}: {e}", progress_path.display());
                return;
            }
        };

        let snapshot = ProgressSnapshot::parse(&content);
        // progress=end 代表 ffmpeg 已寫完輸出，只剩收尾
        let percent = if snapshot.finished {
            Some(100.0)
        } else {
            snapshot.percent(expected_duration)
        };
        if let Some(percent) = percent {
            if percent >= *last_percent {
                *last_percent = percent;
                progress.report(percent);
            }
        }
    }

    fn terminate<P: SupervisedProcess + ?Sized>(
        &self,
        process: &mut P,
        started: Instant,
    ) -> MonitorOutcome {
        if let Err(e) = process.request_stop() {
            warn!("無法要求程序結束: {e}");
        }

        if self.wait_for_exit(process, self.config.grace_period).is_some() {
            return MonitorOutcome::TimedOut {
                elapsed: started.elapsed(),
                diagnostics: process.take_diagnostics(),
            };
        }

        warn!(
            "程序未在 {:.1}s 內結束，強制終止",
            self.config.grace_period.as_secs_f64()
        );
        if let Err(e) = process.kill() {
            error!("無法終止程序: {e}");
        }

        let diagnostics = if self.wait_for_exit(process, self.config.grace_period).is_some() {
            process.take_diagnostics()
        } else {
            error!("程序在強制終止後仍未結束");
            String::new()
        };

        MonitorOutcome::ForceKilled {
            elapsed: started.elapsed(),
            diagnostics,
        }
    }

    fn wait_for_exit<P: SupervisedProcess + ?Sized>(
        &self,
        process: &mut P,
        limit: Duration,
    ) -> Option<ProcessExit> {
        let started = Instant::now();
        loop {
            match process.try_wait() {
                Ok(Some(exit)) => return Some(exit),
                Ok(None) => {}
                Err(_) => return None,
            }
            if started.elapsed() >= limit {
                return None;
            }
            thread::sleep(EXIT_CHECK_INTERVAL.min(self.config.source_wait_interval));
        }
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

/// 在系統暫存目錄下產生不重複的進度檔路徑
#[must_use]
pub fn temp_progress_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "video_slicer_progress_{}.txt",
        uuid::Uuid::new_v4()
    ))
}
