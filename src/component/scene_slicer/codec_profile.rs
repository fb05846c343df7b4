use crate::config::{OutputFormat, Quality};
use log::warn;

/// ProRes 422 的 `-profile:v` 編號
pub const PRORES_PROXY: u8 = 0;
pub const PRORES_LT: u8 = 1;
pub const PRORES_HQ: u8 = 3;

/// CRF 值，越低畫質越好
pub const CRF_LOW: u8 = 28;
pub const CRF_MEDIUM: u8 = 23;
pub const CRF_HIGH: u8 = 18;

const AAC_BITRATE: &str = "128k";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityKnob {
    ProResProfile(u8),
    Crf(u8),
}

/// 輸出格式與畫質對應的編碼參數
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecProfile {
    pub format: OutputFormat,
    pub quality: Quality,
    pub knob: QualityKnob,
}

impl CodecProfile {
    #[must_use]
    pub const fn resolve(format: OutputFormat, quality: Quality) -> Self {
        let knob = match format {
            OutputFormat::ProRes => QualityKnob::ProResProfile(match quality {
                Quality::Low => PRORES_PROXY,
                Quality::Medium => PRORES_LT,
                Quality::High => PRORES_HQ,
            }),
            OutputFormat::H264 | OutputFormat::H265 => QualityKnob::Crf(match quality {
                Quality::Low => CRF_LOW,
                Quality::Medium => CRF_MEDIUM,
                Quality::High => CRF_HIGH,
            }),
        };

        Self {
            format,
            quality,
            knob,
        }
    }

    /// 以字串解析格式與畫質
    ///
    /// 未知格式改用 H.264 中畫質；已知格式搭配未知畫質則使用中畫質。
    #[must_use]
    pub fn resolve_named(format: &str, quality: &str) -> Self {
        let Ok(format_value) = format.parse::<OutputFormat>() else {
            warn!("未知的輸出格式 '{format}'，改用 H.264");
            return Self::resolve(OutputFormat::H264, Quality::Medium);
        };

        let quality_value = quality.parse::<Quality>().unwrap_or_else(|_| {
            warn!("未知的畫質 '{quality}'，改用中畫質");
            Quality::Medium
        });

        Self::resolve(format_value, quality_value)
    }

    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.format.extension()
    }

    #[must_use]
    pub const fn default_encoder(&self) -> &'static str {
        match self.format {
            OutputFormat::ProRes => "prores_ks",
            OutputFormat::H264 => "libx264",
            OutputFormat::H265 => "libx265",
        }
    }

    /// 視訊編碼參數（`-c:v` 起）
    #[must_use]
    pub fn video_args(&self, encoder: &str) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), encoder.to_string()];

        match self.knob {
            QualityKnob::ProResProfile(profile) => {
                args.extend(["-profile:v".to_string(), profile.to_string()]);
                if encoder == "prores_ks" {
                    args.extend(["-vendor".to_string(), "ap10".to_string()]);
                }
                args.extend(["-pix_fmt".to_string(), "yuv422p10le".to_string()]);
            }
            QualityKnob::Crf(crf) => {
                args.extend([
                    "-crf".to_string(),
                    crf.to_string(),
                    "-preset".to_string(),
                    "medium".to_string(),
                ]);
                if self.format == OutputFormat::H264 {
                    args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
                }
            }
        }

        args
    }

    /// 音訊參數：ProRes 直接複製，H.26x 轉為 AAC
    #[must_use]
    pub fn audio_args(&self) -> Vec<String> {
        match self.format {
            OutputFormat::ProRes => vec!["-c:a".to_string(), "copy".to_string()],
            OutputFormat::H264 | OutputFormat::H265 => vec![
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                AAC_BITRATE.to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prores_profiles() {
        assert_eq!(
            CodecProfile::resolve(OutputFormat::ProRes, Quality::Low).knob,
            QualityKnob::ProResProfile(PRORES_PROXY)
        );
        assert_eq!(
            CodecProfile::resolve(OutputFormat::ProRes, Quality::Medium).knob,
            QualityKnob::ProResProfile(PRORES_LT)
        );
        assert_eq!(
            CodecProfile::resolve_named("prores", "high").knob,
            QualityKnob::ProResProfile(PRORES_HQ)
        );
        assert_eq!(CodecProfile::resolve_named("prores", "high").extension(), ".mov");
    }

    #[test]
    fn test_resolve_h26x_crf() {
        for format in [OutputFormat::H264, OutputFormat::H265] {
            assert_eq!(
                CodecProfile::resolve(format, Quality::Low).knob,
                QualityKnob::Crf(28)
            );
            assert_eq!(
                CodecProfile::resolve(format, Quality::Medium).knob,
                QualityKnob::Crf(23)
            );
            assert_eq!(
                CodecProfile::resolve(format, Quality::High).knob,
                QualityKnob::Crf(18)
            );
            assert_eq!(CodecProfile::resolve(format, Quality::High).extension(), ".mp4");
        }
    }

    #[test]
    fn test_unknown_format_falls_back_to_h264_medium() {
        let profile = CodecProfile::resolve_named("bogus", "medium");
        assert_eq!(profile.format, OutputFormat::H264);
        assert_eq!(profile.knob, QualityKnob::Crf(23));
        assert_eq!(profile.extension(), ".mp4");

        let profile = CodecProfile::resolve_named("bogus", "high");
        assert_eq!(profile.knob, QualityKnob::Crf(23));
    }

    #[test]
    fn test_unknown_quality_defaults_to_medium() {
        assert_eq!(
            CodecProfile::resolve_named("h265", "ultra").knob,
            QualityKnob::Crf(23)
        );
        assert_eq!(
            CodecProfile::resolve_named("prores", "").knob,
            QualityKnob::ProResProfile(PRORES_LT)
        );
        assert_eq!(
            CodecProfile::resolve_named("mp4", "LOW").knob,
            QualityKnob::Crf(28)
        );
    }

    #[test]
    fn test_prores_video_args() {
        let profile = CodecProfile::resolve(OutputFormat::ProRes, Quality::High);
        assert_eq!(
            profile.video_args("prores_ks"),
            vec!["-c:v", "prores_ks", "-profile:v", "3", "-vendor", "ap10", "-pix_fmt", "yuv422p10le"]
        );
        assert!(!profile.video_args("prores").contains(&"-vendor".to_string()));
        assert_eq!(profile.audio_args(), vec!["-c:a", "copy"]);
    }

    #[test]
    fn test_h26x_video_args() {
        let h264 = CodecProfile::resolve(OutputFormat::H264, Quality::Medium);
        assert_eq!(
            h264.video_args(h264.default_encoder()),
            vec!["-c:v", "libx264", "-crf", "23", "-preset", "medium", "-pix_fmt", "yuv420p"]
        );
        assert_eq!(h264.audio_args(), vec!["-c:a", "aac", "-b:a", "128k"]);

        let h265 = CodecProfile::resolve(OutputFormat::H265, Quality::Low);
        assert_eq!(
            h265.video_args(h265.default_encoder()),
            vec!["-c:v", "libx265", "-crf", "28", "-preset", "medium"]
        );
    }
}
