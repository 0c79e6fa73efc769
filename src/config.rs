//! Configuration management

use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_ADMIN_TOKEN: &str = "1234";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port
    pub port: u16,

    /// Bind address
    pub bind_addr: String,

    /// Directory holding leads, sessions and appointments
    pub data_dir: PathBuf,

    /// Offers JSON file
    pub offers_path: PathBuf,

    /// Seconds the parsed offers file stays cached
    pub offers_cache_ttl_secs: u64,

    /// Token for admin routes
    pub admin_token: String,

    /// OpenAI API key (optional - AI replies fall back to an apology without it)
    pub openai_api_key: Option<String>,

    /// Chat model name
    pub openai_model: String,

    /// OpenAI-compatible base URL override
    pub openai_base_url: Option<String>,

    /// Dealership name used in the assistant persona
    pub dealer_name: String,

    /// Business timezone
    pub timezone: Tz,

    /// Google Calendar id (optional)
    pub calendar_id: Option<String>,

    /// Base64 service-account JSON (optional)
    pub google_service_account_b64: Option<String>,

    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_whatsapp_from: Option<String>,

    /// Only answer from the catalog when a vehicle keyword or model is mentioned
    pub catalog_guard: bool,

    /// Record a lead row for the opt-out farewell
    pub log_opt_out_leads: bool,
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("PORT") {
            Some(v) => v.parse().with_context(|| format!("invalid PORT: {}", v))?,
            None => 5000,
        };

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let offers_path = var("OFFERS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("ofertas.json"));

        let offers_cache_ttl_secs = var("OFFERS_CACHE_TTL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let admin_token = var("ADMIN_TOKEN").unwrap_or_else(|| {
            warn!("ADMIN_TOKEN not set, using the default token");
            DEFAULT_ADMIN_TOKEN.to_string()
        });

        let timezone = match var("TZ") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("invalid TZ {}: {}", name, e))?,
            None => chrono_tz::America::Sao_Paulo,
        };

        let catalog_guard = var("CATALOG_GUARD")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);

        let log_opt_out_leads = var("LOG_OPT_OUT_LEADS")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        Ok(Self {
            port,
            bind_addr,
            data_dir,
            offers_path,
            offers_cache_ttl_secs,
            admin_token,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_base_url: var("OPENAI_BASE_URL"),
            dealer_name: var("DEALER_NAME").unwrap_or_else(|| "Fiat Globo Itajaí".to_string()),
            timezone,
            calendar_id: var("GCAL_CALENDAR_ID"),
            google_service_account_b64: var("GOOGLE_SERVICE_ACCOUNT_B64"),
            twilio_account_sid: var("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: var("TWILIO_AUTH_TOKEN"),
            twilio_whatsapp_from: var("TWILIO_WHATSAPP_FROM"),
            catalog_guard,
            log_opt_out_leads,
        })
    }

    /// Defaults rooted at `data_dir`, with no external services
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            port: 5000,
            bind_addr: "127.0.0.1".to_string(),
            offers_path: data_dir.join("ofertas.json"),
            data_dir,
            offers_cache_ttl_secs: 60,
            admin_token: DEFAULT_ADMIN_TOKEN.to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: None,
            dealer_name: "Fiat Globo Itajaí".to_string(),
            timezone: chrono_tz::America::Sao_Paulo,
            calendar_id: None,
            google_service_account_b64: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_whatsapp_from: None,
            catalog_guard: true,
            log_opt_out_leads: false,
        }
    }

    pub fn leads_path(&self) -> PathBuf {
        self.data_dir.join("leads.csv")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.data_dir.join("sessions.json")
    }

    pub fn appointments_path(&self) -> PathBuf {
        self.data_dir.join("appointments.csv")
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
