use crate::config::OutputFormat;
use log::{debug, warn};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

/// ffmpeg 可用性與編碼器支援情況
///
/// 每次檢查都重新產生，不做快取（安裝狀態可能改變）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityReport {
    pub available: bool,
    pub version: Option<String>,
    /// 各格式實際偵測到的編碼器名稱
    pub encoders: BTreeMap<OutputFormat, String>,
    pub error: Option<String>,
}

impl CapabilityReport {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_supported(&self, format: OutputFormat) -> bool {
        self.encoders.contains_key(&format)
    }

    #[must_use]
    pub fn encoder_for(&self, format: OutputFormat) -> Option<&str> {
        self.encoders.get(&format).map(String::as_str)
    }

    /// 依固定順序列出支援的格式
    pub fn supported_formats(&self) -> impl Iterator<Item = OutputFormat> + '_ {
        OutputFormat::ALL
            .into_iter()
            .filter(|format| self.is_supported(*format))
    }

    /// 回傳可用的格式：要求的格式不支援時，改用第一個支援的格式
    #[must_use]
    pub fn resolve_format(&self, requested: OutputFormat) -> Option<OutputFormat> {
        if self.is_supported(requested) {
            return Some(requested);
        }
        self.supported_formats().next()
    }
}

pub struct FfmpegCapability {
    ffmpeg: PathBuf,
}

impl FfmpegCapability {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    #[must_use]
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// 檢查 ffmpeg 是否可用，以及支援哪些編碼器
    ///
    /// 任何錯誤都反映在回傳的報告中，不會回傳錯誤。
    #[must_use]
    pub fn probe(&self) -> CapabilityReport {
        let version_output = match Command::new(&self.ffmpeg).arg("-version").output() {
            Ok(output) => output,
            Err(e) => {
                warn!("無法執行 ffmpeg ({}): {e}", self.ffmpeg.display());
                return CapabilityReport::unavailable(format!(
                    "無法執行 ffmpeg，請確認已安裝並加入 PATH: {e}"
                ));
            }
        };

        if !version_output.status.success() {
            let stderr = String::from_utf8_lossy(&version_output.stderr);
            warn!("ffmpeg -version 失敗: {}", stderr.trim());
            return CapabilityReport::unavailable(format!(
                "ffmpeg 未安裝或無法正常執行: {}",
                stderr.trim()
            ));
        }

        let version = String::from_utf8_lossy(&version_output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty());

        let encoders_output = match Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .output()
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return CapabilityReport {
                    version,
                    ..CapabilityReport::unavailable(format!(
                        "無法查詢 ffmpeg 編碼器: {}",
                        stderr.trim()
                    ))
                };
            }
            Err(e) => {
                return CapabilityReport {
                    version,
                    ..CapabilityReport::unavailable(format!("無法查詢 ffmpeg 編碼器: {e}"))
                };
            }
        };

        let listing = String::from_utf8_lossy(&encoders_output.stdout);
        let names = match parse_encoder_names(&listing) {
            Ok(names) => names,
            Err(e) => {
                return CapabilityReport {
                    version,
                    ..CapabilityReport::unavailable(format!("無法解析 ffmpeg 編碼器清單: {e}"))
                };
            }
        };
        let report = build_report(version, &names);

        if report.available && !report.is_supported(OutputFormat::ProRes) {
            warn!("ffmpeg 不支援 ProRes 編碼");
        }
        debug!("ffmpeg 編碼器支援: {:?}", report.encoders);

        report
    }
}

fn build_report(version: Option<String>, names: &HashSet<String>) -> CapabilityReport {
    let encoders: BTreeMap<OutputFormat, String> = OutputFormat::ALL
        .into_iter()
        .filter_map(|format| {
            format
                .known_encoders()
                .iter()
                .find(|name| names.contains(**name))
                .map(|name| (format, (*name).to_string()))
        })
        .collect();

    let available = !encoders.is_empty();
    CapabilityReport {
        available,
        version,
        error: (!available).then(|| "ffmpeg 已安裝，但找不到支援的視訊編碼器".to_string()),
        encoders,
    }
}

/// 從 `ffmpeg -encoders` 的輸出取出編碼器名稱
///
/// 每行格式為 ` V....D libx264   libx264 H.264 ...`，第一欄為六個旗標字元。
fn parse_encoder_names(listing: &str) -> Result<HashSet<String>, regex::Error> {
    let line_regex = Regex::new(r"^\s*[VAS][A-Z.]{5}\s+([A-Za-z0-9_\-]+)\s")?;

    Ok(listing
        .lines()
        .filter_map(|line| line_regex.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect())
}
