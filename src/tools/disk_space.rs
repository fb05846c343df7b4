//! 輸出磁碟空間檢查

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;
use sysinfo::Disks;

/// 每個片段預估佔用輸入檔案大小的倍數
pub const OUTPUT_SIZE_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpaceCheck {
    pub required: u64,
    /// 無法判斷輸出位置所在的磁碟時為 `None`
    pub available: Option<u64>,
}

impl DiskSpaceCheck {
    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        self.available.is_none_or(|available| available >= self.required)
    }
}

#[must_use]
pub fn estimate_output_size(input_size: u64, num_sequences: usize) -> u64 {
    (input_size as f64 * num_sequences as f64 * OUTPUT_SIZE_FACTOR).ceil() as u64
}

/// 以輸入檔大小估算輸出所需空間，並查詢輸出資料夾所在磁碟的可用空間
pub fn check_disk_space(
    video_path: &Path,
    output_folder: &Path,
    num_sequences: usize,
) -> Result<DiskSpaceCheck> {
    let input_size = fs::metadata(video_path)
        .with_context(|| format!("無法讀取檔案大小: {}", video_path.display()))?
        .len();

    let check = DiskSpaceCheck {
        required: estimate_output_size(input_size, num_sequences),
        available: available_space(output_folder),
    };
    debug!(
        "磁碟空間檢查 {}: 需要 {}, 可用 {:?}",
        output_folder.display(),
        format_bytes(check.required),
        check.available.map(format_bytes)
    );
    Ok(check)
}

/// 找出路徑所在磁碟的可用空間，資料夾尚未建立時以最近的上層資料夾判斷
#[must_use]
pub fn available_space(path: &Path) -> Option<u64> {
    let absolute = std::path::absolute(path).ok()?;
    let existing = absolute.ancestors().find(|p| p.exists())?;
    let resolved = existing.canonicalize().ok()?;

    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| resolved.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
