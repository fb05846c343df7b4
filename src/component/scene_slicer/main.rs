//! 場景片段擷取主模組
//!
//! 詢問輸入與輸出路徑，在背景執行處理流程並顯示進度

use super::extractor::SlotOutcome;
use super::pipeline::{
    PipelineEvent, PipelineOutcome, PipelineRequest, PipelineStage, spawn_pipeline,
};
use crate::config::Config;
use crate::config::save::{add_recent_path, save_settings};
use crate::tools::{check_disk_space, format_bytes, format_time, validate_video_file};
use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

const OUTPUT_SUBFOLDER: &str = "sequences";

pub struct SceneSlicer<'a> {
    config: &'a mut Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl<'a> SceneSlicer<'a> {
    pub fn new(config: &'a mut Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("{}", style("=== 場景片段擷取 ===").cyan().bold());

        let video_path = self.prompt_video_path()?;
        validate_video_file(&video_path)?;

        let output_folder = self.prompt_output_folder(&video_path)?;
        self.print_settings();
        self.ensure_disk_space(&video_path, &output_folder)?;

        let settings = &self.config.settings;
        let handle = spawn_pipeline(
            PipelineRequest {
                video_path: video_path.clone(),
                output_folder: output_folder.clone(),
            },
            settings.clone(),
            Arc::clone(&self.shutdown_signal),
        )?;

        let progress_bar = ProgressBar::new(100);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .context("無效的進度列樣式")?
                .progress_chars("#>-"),
        );

        for event in handle.events() {
            match event {
                PipelineEvent::StageStarted(PipelineStage::Detection) => {
                    progress_bar.set_message("偵測場景變換...");
                }
                PipelineEvent::StageStarted(PipelineStage::Extraction) => {
                    progress_bar.set_message("擷取片段...");
                }
                PipelineEvent::Progress {
                    overall_percent, ..
                } => progress_bar.set_position(overall_percent.round() as u64),
                PipelineEvent::SceneChangesDetected(changes) => {
                    progress_bar.println(format!("找到 {} 個場景變換點", changes.len()));
                }
                PipelineEvent::ClipFinished(report) => {
                    let name = report
                        .output_path
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .into_owned();
                    let line = match &report.outcome {
                        SlotOutcome::Written => style(format!("  ✓ {name}")).green(),
                        SlotOutcome::SkippedOverrun => style(format!("  - {name} (超出影片長度)")).yellow(),
                        SlotOutcome::Failed(_) => style(format!("  ✗ {name}")).red(),
                        SlotOutcome::Cancelled => style(format!("  - {name} (已中斷)")).dim(),
                    };
                    progress_bar.println(line.to_string());
                }
                PipelineEvent::Finished { .. } => progress_bar.finish_with_message("完成"),
            }
        }

        let outcome = match handle.join() {
            Ok(outcome) => outcome,
            Err(e) => {
                progress_bar.abandon_with_message("處理失敗");
                return Err(e.into());
            }
        };

        self.remember_path(&video_path);
        print_summary(&outcome, &output_folder);

        Ok(())
    }

    fn prompt_video_path(&self) -> Result<PathBuf> {
        let recent = &self.config.settings.recent_paths;

        if !recent.is_empty() {
            let mut items: Vec<String> = recent.clone();
            items.push("輸入新路徑...".to_string());

            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("選擇影片")
                .items(&items)
                .default(0)
                .interact()?;

            if let Some(path) = recent.get(selection) {
                return Ok(PathBuf::from(path));
            }
        }

        let path: String = Input::new()
            .with_prompt("請輸入影片檔案路徑")
            .interact_text()?;
        Ok(PathBuf::from(path.trim().trim_matches('"')))
    }

    fn prompt_output_folder(&self, video_path: &Path) -> Result<PathBuf> {
        let default_folder = self
            .config
            .settings
            .output_folder
            .clone()
            .unwrap_or_else(|| {
                video_path
                    .parent()
                    .unwrap_or(Path::new("."))
                    .join(OUTPUT_SUBFOLDER)
            });

        let path: String = Input::new()
            .with_prompt("輸出資料夾")
            .default(default_folder.to_string_lossy().into_owned())
            .interact_text()?;
        Ok(PathBuf::from(path.trim().trim_matches('"')))
    }

    fn print_settings(&self) {
        let settings = &self.config.settings;
        println!(
            "{}",
            style(format!(
                "片段長度 {}s × {} 個, 閾值 {}, 分析前 {}s, 格式 {} ({})",
                settings.sequence_length,
                settings.num_sequences,
                settings.scene_threshold,
                settings.max_analysis_duration,
                settings.output_format,
                settings.quality
            ))
            .dim()
        );
    }

    fn ensure_disk_space(&self, video_path: &Path, output_folder: &Path) -> Result<()> {
        let check = check_disk_space(
            video_path,
            output_folder,
            self.config.settings.num_sequences as usize,
        )?;

        match check.available {
            Some(available) if !check.is_sufficient() => {
                bail!(
                    "磁碟空間不足：約需 {}，但只剩 {}",
                    format_bytes(check.required),
                    format_bytes(available)
                );
            }
            Some(_) => {}
            None => warn!("無法取得 {} 的磁碟可用空間，略過檢查", output_folder.display()),
        }
        Ok(())
    }

    fn remember_path(&mut self, video_path: &Path) {
        add_recent_path(&mut self.config.settings, &video_path.to_string_lossy());
        if let Err(e) = save_settings(&self.config.settings) {
            warn!("無法儲存最近使用的路徑: {e:#}");
        }
    }
}

fn print_summary(outcome: &PipelineOutcome, output_folder: &Path) {
    let extraction = &outcome.extraction;

    println!();
    println!("{}", style("=== 擷取摘要 ===").cyan().bold());
    println!("  影片長度: {}", format_time(extraction.video_duration));
    if outcome.scene_changes.is_empty() {
        println!("  場景變換: 無");
    } else {
        let changes: Vec<String> = outcome
            .scene_changes
            .iter()
            .map(|t| format!("{t:.2}s"))
            .collect();
        println!("  場景變換: {}", changes.join(", "));
    }
    println!(
        "  起點: {} ({})",
        format_time(extraction.plan.start_time),
        extraction.plan.strategy
    );
    println!("  輸出格式: {}", extraction.format);

    for report in &extraction.slots {
        let range = format!(
            "{} - {}",
            format_time(report.slot.start_time),
            format_time(report.slot.end_time())
        );
        match &report.outcome {
            SlotOutcome::Written => println!(
                "  {} {range} {}",
                style("✓").green(),
                report.output_path.display()
            ),
            SlotOutcome::SkippedOverrun => {
                println!("  {} {range} 超出影片長度", style("-").yellow());
            }
            SlotOutcome::Failed(reason) => println!("  {} {range} {reason}", style("✗").red()),
            SlotOutcome::Cancelled => println!("  {} {range} 已中斷", style("-").dim()),
        }
    }

    let written = extraction.output_paths.len();
    let failed = extraction.count(|o| matches!(o, SlotOutcome::Failed(_)));
    println!("  成功: {} 個", style(written).green());
    if failed > 0 {
        println!("  失敗: {} 個", style(failed).red());
    }
    println!("  輸出資料夾: {}", output_folder.display());

    info!("擷取完成 - 成功: {written}, 失敗: {failed}");
}
