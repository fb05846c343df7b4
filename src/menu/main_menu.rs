use crate::config::save::save_settings;
use crate::config::{
    Config, NUM_SEQUENCES_RANGE, OutputFormat, Quality, SCENE_THRESHOLD_RANGE,
    SEQUENCE_LENGTH_RANGE,
};
use crate::menu::handlers::{run_capability_check, run_scene_slicer};
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 影片場景片段擷取 ===").cyan().bold());
    println!("{}", style("按 ESC 離開").dim());

    let options = ["擷取場景片段", "檢查 FFmpeg 編碼器", "設定", "離開"];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_scene_slicer(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            run_capability_check(term, config)?;
            Ok(true)
        }
        Some(2) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== 設定 ===").cyan().bold());
        println!("{}", style("按 ESC 返回").dim());

        let settings = &config.settings;
        let options = vec![
            format!("片段長度: {}s", settings.sequence_length),
            format!("片段數量: {}", settings.num_sequences),
            format!("場景閾值: {}", settings.scene_threshold),
            format!("分析時長: {}s", settings.max_analysis_duration),
            format!("輸出格式: {}", settings.output_format),
            format!("畫質: {}", settings.quality),
            format!("轉檔逾時: {}s", settings.transcode_timeout_secs),
            format!("ffmpeg 路徑: {}", settings.ffmpeg_path.display()),
            format!("ffprobe 路徑: {}", settings.ffprobe_path.display()),
            format!(
                "預設輸出資料夾: {}",
                settings
                    .output_folder
                    .as_ref()
                    .map_or_else(|| "(影片所在資料夾)".to_string(), |p| p.display().to_string())
            ),
            "返回".to_string(),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("選擇要修改的項目")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        let mut settings = config.settings.clone();
        match selection {
            Some(0) => {
                let (min, max) = SEQUENCE_LENGTH_RANGE;
                settings.sequence_length =
                    prompt_number(&format!("片段長度（{min}-{max} 秒）"), settings.sequence_length)?;
            }
            Some(1) => {
                let (min, max) = NUM_SEQUENCES_RANGE;
                settings.num_sequences =
                    prompt_number(&format!("片段數量（{min}-{max}）"), settings.num_sequences)?;
            }
            Some(2) => {
                let (min, max) = SCENE_THRESHOLD_RANGE;
                settings.scene_threshold =
                    prompt_number(&format!("場景閾值（{min}-{max}）"), settings.scene_threshold)?;
            }
            Some(3) => {
                settings.max_analysis_duration =
                    prompt_number("分析時長（秒）", settings.max_analysis_duration)?;
            }
            Some(4) => {
                let Some(format) =
                    select_variant(term, "輸出格式", &OutputFormat::ALL, settings.output_format)?
                else {
                    continue;
                };
                settings.output_format = format;
            }
            Some(5) => {
                let Some(quality) = select_variant(term, "畫質", &Quality::ALL, settings.quality)?
                else {
                    continue;
                };
                settings.quality = quality;
            }
            Some(6) => {
                settings.transcode_timeout_secs =
                    prompt_number("轉檔逾時（秒）", settings.transcode_timeout_secs)?;
            }
            Some(7) => {
                settings.ffmpeg_path = prompt_path("ffmpeg 路徑", &settings.ffmpeg_path)?;
            }
            Some(8) => {
                settings.ffprobe_path = prompt_path("ffprobe 路徑", &settings.ffprobe_path)?;
            }
            Some(9) => {
                let current = settings
                    .output_folder
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                let input: String = Input::new()
                    .with_prompt("預設輸出資料夾（留空使用影片所在資料夾）")
                    .default(current)
                    .allow_empty(true)
                    .interact_text()?;
                let trimmed = input.trim();
                settings.output_folder = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
            }
            _ => break,
        }

        let settings = settings.validated();
        if settings != config.settings {
            config.settings = settings;
            save_settings(&config.settings)?;
            println!("\n{}", style("設定已儲存").green());
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
    }

    Ok(())
}

fn prompt_number<T>(prompt: &str, current: T) -> Result<T>
where
    T: Clone + ToString + std::str::FromStr,
    <T as std::str::FromStr>::Err: ToString,
{
    let value = Input::new()
        .with_prompt(prompt)
        .default(current)
        .interact_text()?;
    Ok(value)
}

fn prompt_path(prompt: &str, current: &std::path::Path) -> Result<PathBuf> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(current.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(input.trim()))
}

fn select_variant<T>(term: &Term, prompt: &str, variants: &[T], current: T) -> Result<Option<T>>
where
    T: Copy + PartialEq + ToString,
{
    let items: Vec<String> = variants.iter().map(ToString::to_string).collect();
    let default_index = variants.iter().position(|v| *v == current).unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    Ok(selection.and_then(|index| variants.get(index).copied()))
}
