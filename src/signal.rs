use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 安裝 Ctrl-C 處理器，回傳擷取流程共用的停止旗標
///
/// 旗標只在片段之間檢查，執行中的 ffmpeg 會先完成目前的片段。
#[must_use]
pub fn setup_shutdown_signal() -> Arc<AtomicBool> {
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let signal_clone = Arc::clone(&shutdown_signal);

    ctrlc::set_handler(move || {
        signal_clone.store(true, Ordering::SeqCst);
        eprintln!("\n收到中斷信號，目前片段完成後停止...");
    })
    .expect("無法設定 Ctrl-C 處理器");

    shutdown_signal
}
