use qtrader::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

pub fn init_logging(logging: &LoggingConfig, json: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let json = json || logging.json;

    // File logging only when QTRADER_LOG_DIR is set.
    //
    // `tracing_appender::rolling::daily` panics (and with panic = "abort",
    // aborts) if it cannot create the initial log file, so preflight
    // writability first.
    let log_dir = std::env::var("QTRADER_LOG_DIR").ok();
    let file_layer = log_dir.as_deref().and_then(|dir| {
        if std::fs::create_dir_all(dir).is_err() {
            eprintln!(
                "Warning: Could not create log directory {}, file logging disabled",
                dir
            );
            return None;
        }
        let test_path = std::path::Path::new(dir).join(".qtrader_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(dir, "qtrader.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Keep the guard alive for the life of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir, e
                );
                None
            }
        }
    });

    let console_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_target(true));

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/qtrader.log", dir);
    }
}

pub fn init_logging_simple() {
    // Minimal logging for commands that print their own output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init();
}
