//! SysOps Bot - Entry Point

use sysops_bot::config::log_level;
use sysops_bot::Config;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("SysOps Bot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: sysops-bot");
        println!();
        println!("Environment variables:");
        println!("  TOKEN            Telegram bot token");
        println!("  RM_HOST          Remote host to monitor");
        println!("  RM_PORT          SSH port (default: 22)");
        println!("  RM_USER          SSH user");
        println!("  RM_PASSWORD      SSH password");
        println!("  STORE_BACKEND    postgres or sqlite (default: postgres)");
        println!("  DB_HOST          PostgreSQL host");
        println!("  DB_PORT          PostgreSQL port (default: 5432)");
        println!("  DB_USER          PostgreSQL user");
        println!("  DB_PASSWORD      PostgreSQL password");
        println!("  DB_DATABASE      PostgreSQL database");
        println!("  SQLITE_PATH      SQLite file (default: ./sysops.db)");
        println!("  REPL_LOG_PATH    Log read by /get_repl_logs");
        println!("  LOG_FILE         Write logs to this file instead of stdout");
        println!("  RUST_LOG         trace, debug, info, warn or error (default: info)");
        return Ok(());
    }

    let level = log_level(std::env::var("RUST_LOG").ok().as_deref());

    let config = Config::from_env()?;

    // Guard must live until exit or buffered lines are lost
    let _log_guard = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("LOG_FILE has no file name: {:?}", path))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(writer)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Some(guard)
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            None
        }
    };

    info!("SysOps Bot v{}", env!("CARGO_PKG_VERSION"));

    sysops_bot::telegram::run_telegram_bot(config).await?;

    Ok(())
}
