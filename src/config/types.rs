use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const MAX_RECENT_PATHS: usize = 10;

pub const DEFAULT_SEQUENCE_LENGTH: u32 = 10;
pub const DEFAULT_NUM_SEQUENCES: u32 = 3;
pub const DEFAULT_SCENE_THRESHOLD: f64 = 30.0;
pub const DEFAULT_MAX_ANALYSIS_DURATION: f64 = 40.0;
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 30;

pub const SEQUENCE_LENGTH_RANGE: (u32, u32) = (1, 60);
pub const NUM_SEQUENCES_RANGE: (u32, u32) = (1, 10);
pub const SCENE_THRESHOLD_RANGE: (f64, f64) = (5.0, 100.0);

/// 輸出格式
///
/// 宣告順序即為編碼器後備選擇的順序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    #[serde(rename = "prores")]
    ProRes,
    #[serde(rename = "h264", alias = "mp4")]
    H264,
    #[serde(rename = "h265")]
    H265,
}

impl OutputFormat {
    pub const ALL: [Self; 3] = [Self::ProRes, Self::H264, Self::H265];

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::ProRes => ".mov",
            Self::H264 | Self::H265 => ".mp4",
        }
    }

    /// `ffmpeg -encoders` 中代表此格式的編碼器名稱，依偏好排序
    #[must_use]
    pub const fn known_encoders(self) -> &'static [&'static str] {
        match self {
            Self::ProRes => &["prores_ks", "prores"],
            Self::H264 => &["libx264"],
            Self::H265 => &["libx265"],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProRes => write!(f, "ProRes 422 (.mov)"),
            Self::H264 => write!(f, "H.264 (.mp4)"),
            Self::H265 => write!(f, "H.265 (.mp4)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知的選項: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for OutputFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prores" => Ok(Self::ProRes),
            "h264" | "mp4" => Ok(Self::H264),
            "h265" | "hevc" => Ok(Self::H265),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// 畫質等級
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "低（檔案較小）"),
            Self::Medium => write!(f, "中（平衡）"),
            Self::High => write!(f, "高（檔案較大）"),
        }
    }
}

impl FromStr for Quality {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// 每個片段長度（秒）
    pub sequence_length: u32,
    /// 要擷取的片段數量
    pub num_sequences: u32,
    /// 場景變換閾值，越高越不敏感
    pub scene_threshold: f64,
    /// 場景偵測只分析影片開頭的秒數
    pub max_analysis_duration: f64,
    pub output_format: OutputFormat,
    pub quality: Quality,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// 單一片段轉檔的時間上限（秒）
    pub transcode_timeout_secs: u64,
    pub output_folder: Option<PathBuf>,
    pub recent_paths: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            num_sequences: DEFAULT_NUM_SEQUENCES,
            scene_threshold: DEFAULT_SCENE_THRESHOLD,
            max_analysis_duration: DEFAULT_MAX_ANALYSIS_DURATION,
            output_format: OutputFormat::ProRes,
            quality: Quality::Medium,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            transcode_timeout_secs: DEFAULT_TRANSCODE_TIMEOUT_SECS,
            output_folder: None,
            recent_paths: Vec::new(),
        }
    }
}

impl UserSettings {
    /// 將數值限制在允許範圍內，超出範圍的設定會記錄警告
    #[must_use]
    pub fn validated(mut self) -> Self {
        let (min, max) = SEQUENCE_LENGTH_RANGE;
        if !(min..=max).contains(&self.sequence_length) {
            warn!("片段長度 {} 超出範圍，調整為 {min}-{max}", self.sequence_length);
            self.sequence_length = self.sequence_length.clamp(min, max);
        }

        let (min, max) = NUM_SEQUENCES_RANGE;
        if !(min..=max).contains(&self.num_sequences) {
            warn!("片段數量 {} 超出範圍，調整為 {min}-{max}", self.num_sequences);
            self.num_sequences = self.num_sequences.clamp(min, max);
        }

        let (min, max) = SCENE_THRESHOLD_RANGE;
        if !self.scene_threshold.is_finite() {
            warn!("場景閾值無效，使用預設值 {DEFAULT_SCENE_THRESHOLD}");
            self.scene_threshold = DEFAULT_SCENE_THRESHOLD;
        } else if !(min..=max).contains(&self.scene_threshold) {
            warn!("場景閾值 {} 超出範圍，調整為 {min}-{max}", self.scene_threshold);
            self.scene_threshold = self.scene_threshold.clamp(min, max);
        }

        if !self.max_analysis_duration.is_finite() || self.max_analysis_duration <= 0.0 {
            warn!(
                "分析時長 {} 無效，使用預設值 {DEFAULT_MAX_ANALYSIS_DURATION}",
                self.max_analysis_duration
            );
            self.max_analysis_duration = DEFAULT_MAX_ANALYSIS_DURATION;
        }

        if self.transcode_timeout_secs == 0 {
            warn!("轉檔逾時不可為 0，使用預設值 {DEFAULT_TRANSCODE_TIMEOUT_SECS}");
            self.transcode_timeout_secs = DEFAULT_TRANSCODE_TIMEOUT_SECS;
        }

        self.recent_paths.truncate(MAX_RECENT_PATHS);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: UserSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("prores".parse::<OutputFormat>(), Ok(OutputFormat::ProRes));
        assert_eq!("MP4".parse::<OutputFormat>(), Ok(OutputFormat::H264));
        assert_eq!(" h264 ".parse::<OutputFormat>(), Ok(OutputFormat::H264));
        assert_eq!("h265".parse::<OutputFormat>(), Ok(OutputFormat::H265));
        assert!("bogus".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_order_is_fallback_order() {
        let mut formats = vec![OutputFormat::H265, OutputFormat::ProRes, OutputFormat::H264];
        formats.sort();
        assert_eq!(formats, OutputFormat::ALL.to_vec());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let json = r#"{"sequence_length": 5, "output_format": "mp4", "quality": "high"}"#;
        let settings: UserSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.sequence_length, 5);
        assert_eq!(settings.output_format, OutputFormat::H264);
        assert_eq!(settings.quality, Quality::High);
        assert_eq!(settings.num_sequences, DEFAULT_NUM_SEQUENCES);
        assert!((settings.max_analysis_duration - 40.0).abs() < f64::EPSILON);
        assert_eq!(settings.transcode_timeout_secs, 30);
    }

    #[test]
    fn test_settings_serialize_format_keys() {
        let settings = UserSettings {
            output_format: OutputFormat::H265,
            ..UserSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains(r#""output_format":"h265""#));
        assert!(json.contains(r#""quality":"medium""#));
    }

    #[test]
    fn test_validated_clamps_out_of_range_values() {
        let settings = UserSettings {
            sequence_length: 0,
            num_sequences: 42,
            scene_threshold: 1.0,
            max_analysis_duration: -3.0,
            transcode_timeout_secs: 0,
            ..UserSettings::default()
        }
        .validated();

        assert_eq!(settings.sequence_length, 1);
        assert_eq!(settings.num_sequences, 10);
        assert!((settings.scene_threshold - 5.0).abs() < f64::EPSILON);
        assert!((settings.max_analysis_duration - 40.0).abs() < f64::EPSILON);
        assert_eq!(settings.transcode_timeout_secs, 30);
    }

    #[test]
    fn test_validated_keeps_valid_values() {
        let original = UserSettings {
            sequence_length: 60,
            num_sequences: 1,
            scene_threshold: 100.0,
            ..UserSettings::default()
        };
        assert_eq!(original.clone().validated(), original);
    }
}
