use anyhow::{Result, bail};
use std::path::Path;

/// 影片副檔名（小寫，不含點）
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "wmv"];

pub fn validate_video_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("路徑不存在: {}", path.display());
    }
    if !path.is_file() {
        bail!("路徑不是檔案: {}", path.display());
    }
    if !has_video_extension(path) {
        bail!("不支援的影片格式: {}", path.display());
    }
    Ok(())
}

#[must_use]
pub fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_video_extension() {
        assert!(has_video_extension(Path::new("/videos/a.mp4")));
        assert!(has_video_extension(Path::new("/videos/B.MOV")));
        assert!(!has_video_extension(Path::new("/videos/notes.txt")));
        assert!(!has_video_extension(Path::new("/videos/noext")));
    }

    #[test]
    fn test_validate_video_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mkv");
        let text = dir.path().join("clip.txt");
        std::fs::write(&video, b"x").unwrap();
        std::fs::write(&text, b"x").unwrap();

        assert!(validate_video_file(&video).is_ok());
        assert!(validate_video_file(&text).is_err());
        assert!(validate_video_file(dir.path()).is_err());
        assert!(validate_video_file(&dir.path().join("missing.mp4")).is_err());
    }
}
