//! Showroom Bot - Entry Point

use showroom_bot::{server, AppState, Config};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Showroom Bot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: showroom-bot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --help, -h         Show this help");
        println!();
        println!("Environment variables:");
        println!("  PORT                        HTTP port (default: 5000)");
        println!("  BIND_ADDR                   Bind address (default: 0.0.0.0)");
        println!("  DATA_DIR                    Leads, sessions and appointments (default: data)");
        println!("  OFFERS_PATH                 Offers JSON (default: <DATA_DIR>/ofertas.json)");
        println!("  OFFERS_CACHE_TTL            Offers cache in seconds (default: 60)");
        println!("  ADMIN_TOKEN                 Admin routes token (default: 1234)");
        println!("  OPENAI_API_KEY              Chat completions key");
        println!("  OPENAI_MODEL                Chat model (default: gpt-4o-mini)");
        println!("  OPENAI_BASE_URL             OpenAI-compatible endpoint");
        println!("  DEALER_NAME                 Dealership name");
        println!("  TZ                          Business timezone (default: America/Sao_Paulo)");
        println!("  GCAL_CALENDAR_ID            Google Calendar id");
        println!("  GOOGLE_SERVICE_ACCOUNT_B64  Base64 service-account JSON");
        println!("  TWILIO_ACCOUNT_SID          Twilio account SID");
        println!("  TWILIO_AUTH_TOKEN           Twilio auth token");
        println!("  TWILIO_WHATSAPP_FROM        Twilio WhatsApp number");
        println!("  CATALOG_GUARD               Require a vehicle keyword for catalog answers (default: true)");
        println!("  LOG_OPT_OUT_LEADS           Record opt-outs as leads (default: false)");
        println!("  LOG_FORMAT                  'json' for JSON logs");
        return Ok(());
    }

    // Setup logging
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Showroom Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;
    info!(
        "Data in {}, offers from {}, timezone {}",
        config.data_dir.display(),
        config.offers_path.display(),
        config.timezone
    );

    let state = Arc::new(AppState::from_config(&config));
    server::run(&config, state).await
}
