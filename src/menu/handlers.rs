use crate::component::SceneSlicer;
use crate::config::{Config, OutputFormat};
use crate::pause;
use crate::tools::FfmpegCapability;
use anyhow::Result;
use console::{Term, style};
use log::info;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_scene_slicer(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    let mut slicer = SceneSlicer::new(config, Arc::clone(shutdown_signal));

    if let Err(e) = slicer.run() {
        eprintln!("{} {:#}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_capability_check(term: &Term, config: &Config) -> Result<()> {
    println!("{}", style("=== FFmpeg 編碼器檢查 ===").cyan().bold());

    let capability = FfmpegCapability::new(&config.settings.ffmpeg_path);
    println!(
        "{}",
        style(format!("ffmpeg: {}", capability.ffmpeg_path().display())).dim()
    );

    let report = capability.probe();

    if let Some(version) = &report.version {
        println!("  版本: {version}");
    }

    for format in OutputFormat::ALL {
        match report.encoder_for(format) {
            Some(encoder) => println!(
                "  {} {format} ({encoder})",
                style("✓").green()
            ),
            None => println!("  {} {format}", style("✗").red()),
        }
    }

    if let Some(error) = &report.error {
        println!("\n{} {error}", style("錯誤:").red().bold());
    } else if !report.is_supported(config.settings.output_format) {
        if let Some(fallback) = report.resolve_format(config.settings.output_format) {
            println!(
                "\n{}",
                style(format!(
                    "目前設定的 {} 不可用，擷取時將改用 {fallback}",
                    config.settings.output_format
                ))
                .yellow()
            );
        }
    }

    info!(
        "編碼器檢查: available={}, formats={:?}",
        report.available,
        report.supported_formats().collect::<Vec<_>>()
    );

    pause(term)?;
    Ok(())
}
