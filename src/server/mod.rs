//! HTTP Server
//!
//! Axum router for the webhook, health, simulation, slot lookup, reminder
//! cron and admin pages, with request tracing and graceful shutdown.

pub mod admin;
pub mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::appointment::{AppointmentFlow, MemoryDraftStore};
use crate::assistant::Assistant;
use crate::bot::Bot;
use crate::calendar::{CalendarBackend, CalendarGateway, DisabledCalendar, GoogleCalendar};
use crate::catalog::OfferCatalog;
use crate::channels::{DisabledSender, MessageSender, TwilioSender, WhatsAppConfig};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::llm::OpenAiClient;
use crate::storage::{CsvLog, FileLock, SnapshotFile};

/// Application state shared across handlers
pub struct AppState {
    pub bot: Arc<Bot>,
    pub sender: Arc<dyn MessageSender>,
    pub admin_token: String,
    pub dealer_name: String,
    pub port: u16,
}

impl AppState {
    /// Wire every component from configuration. Missing credentials disable
    /// the matching integration instead of failing.
    pub fn from_config(config: &Config) -> Self {
        let lock = FileLock::new();

        let conversations = Arc::new(ConversationStore::open(SnapshotFile::new(
            config.sessions_path(),
            lock.clone(),
        )));

        let llm = OpenAiClient::from_config(config);
        if !llm.is_available() {
            warn!("OPENAI_API_KEY not set, AI replies will apologize");
        }
        let assistant = Assistant::new(Arc::new(llm), conversations.clone(), &config.dealer_name);

        let catalog = OfferCatalog::new(
            &config.offers_path,
            config.offers_cache_ttl_secs,
            config.catalog_guard,
        );

        let calendar = CalendarGateway::new(calendar_backend(config), config.timezone);
        let appointments = AppointmentFlow::new(
            Arc::new(MemoryDraftStore::new()),
            Arc::new(calendar),
            CsvLog::new(config.appointments_path(), lock.clone()),
        );

        let bot = Bot::new(
            conversations,
            assistant,
            catalog,
            appointments,
            CsvLog::new(config.leads_path(), lock),
        )
        .with_opt_out_leads(config.log_opt_out_leads);

        Self {
            bot: Arc::new(bot),
            sender: message_sender(config),
            admin_token: config.admin_token.clone(),
            dealer_name: config.dealer_name.clone(),
            port: config.port,
        }
    }
}

fn calendar_backend(config: &Config) -> Arc<dyn CalendarBackend> {
    let (Some(key), Some(calendar_id)) = (&config.google_service_account_b64, &config.calendar_id) else {
        warn!("Google Calendar not configured, bookings will fail at the availability check");
        return Arc::new(DisabledCalendar);
    };
    match GoogleCalendar::from_base64(key, calendar_id) {
        Ok(calendar) => {
            info!("Google Calendar backend ready for {}", calendar_id);
            Arc::new(calendar)
        }
        Err(e) => {
            error!("Google Calendar disabled: {}", e);
            Arc::new(DisabledCalendar)
        }
    }
}

fn message_sender(config: &Config) -> Arc<dyn MessageSender> {
    match WhatsAppConfig::from_parts(
        config.twilio_account_sid.as_deref(),
        config.twilio_auth_token.as_deref(),
        config.twilio_whatsapp_from.as_deref(),
    ) {
        Some(whatsapp) => Arc::new(TwilioSender::new(whatsapp)),
        None => {
            warn!("Twilio credentials not set, reminders will be skipped");
            Arc::new(DisabledSender)
        }
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::home))
        .route("/healthz", get(routes::healthz))
        .route("/webhook", post(routes::webhook))
        .route("/whatsapp", post(routes::webhook))
        .route("/simulate", get(routes::simulate))
        .route("/slots", get(routes::slots))
        .route(
            "/cron/reminders",
            get(routes::cron_reminders).post(routes::cron_reminders),
        )
        .route("/painel", get(admin::painel))
        .route("/agenda", get(admin::agenda))
        .route("/admin/leads", get(admin::leads_csv))
        .route("/reset", post(admin::reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and run until shutdown signal
pub async fn run(config: &Config, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let router = build_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
