use clap::Parser;
use o2mc_tracker::core::ConfigProvider;
use o2mc_tracker::utils::error::ErrorSeverity;
use o2mc_tracker::utils::logger;
use o2mc_tracker::{CliConfig, Console, DispatchOutcome, HttpTransport, Tracker, TrackerError};
use tokio::io::BufReader;

fn exit_code(e: &TrackerError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 可重試錯誤
        ErrorSeverity::High => 1,     // 設定或資料錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn fail(e: TrackerError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(&e).max(1));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 先解析設定，日誌格式可能來自設定檔
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            fail(e);
        }
    };

    if config.json_logs() {
        logger::init_json_logger(config.verbose());
    } else {
        logger::init_cli_logger(config.verbose());
    }

    tracing::info!("🚀 Starting o2mc-tracker console");
    tracing::debug!("Resolved config: {:?}", config);

    let transport = match HttpTransport::new(config.request_timeout()) {
        Ok(transport) => transport,
        Err(e) => fail(e),
    };
    let tracker = match Tracker::new(&config, transport) {
        Ok(tracker) => tracker,
        Err(e) => fail(e),
    };

    tracing::info!(
        "✅ Tracking app '{}' to {} (session {})",
        tracker.app_id(),
        tracker.endpoint(),
        tracker.session_identifier()
    );

    let dispatcher = tracker.start();
    let console = Console::new(tracker.clone());

    println!("Type 'help' for commands.");
    let run_result = console
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    match dispatcher.shutdown().await {
        Ok(DispatchOutcome::Sent { number, events }) => {
            tracing::info!("📤 Final batch #{} sent with {} events", number, events);
        }
        Ok(outcome) => tracing::debug!("Final dispatch: {:?}", outcome),
        Err(e) => tracing::warn!("⚠️ Final dispatch failed: {}", e),
    }

    let remaining = tracker.buffered_events();
    if remaining > 0 {
        tracing::warn!("⚠️ {} events were not delivered", remaining);
    }

    if let Err(e) = run_result {
        fail(e);
    }

    Ok(())
}
