use env_logger::Env;

/// 初始化日誌輸出
///
/// 預設等級為 info，可用 `RUST_LOG` 覆寫。函式庫本身只透過 `log` 巨集輸出，
/// 由執行檔決定後端。
pub fn init() {
    let env = Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init()
        .is_err()
    {
        log::debug!("日誌系統已初始化，略過");
    }
}
