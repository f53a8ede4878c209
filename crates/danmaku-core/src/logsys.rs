use log::LevelFilter;

/// Install the process logger.
///
/// Honors `RUST_LOG`; defaults to `info`. Safe to call more than once.
pub fn init() {
    init_with_level(LevelFilter::Info);
}

pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .is_test(cfg!(test))
        .try_init();
}
