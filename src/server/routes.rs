//! Public routes: liveness, health, webhook, simulation, slots, reminders

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Form,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

use super::AppState;
use crate::calendar::slot_labels;
use crate::channels::{twiml, TwilioWebhookData};
use crate::reminders::send_reminders;

const SIMULATE_FROM: &str = "whatsapp:+5500000000000";
const SIMULATE_MSG: &str = "Quero agendar test drive do Pulse";

pub async fn home() -> &'static str {
    "Servidor rodando! ✅"
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
    pub sessions: usize,
    /// Data rows in the leads log, -1 when it cannot be read
    pub leads: i64,
    pub port: u16,
}

pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let leads = match state.bot.leads().count() {
        Ok(n) => n as i64,
        Err(e) => {
            error!("Failed to count leads: {}", e);
            -1
        }
    };
    Json(HealthResponse {
        ok: true,
        model: state.bot.model_name().to_string(),
        sessions: state.bot.conversations().len(),
        leads,
        port: state.port,
    })
}

fn xml(reply: &str) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], twiml(reply)).into_response()
}

/// Twilio inbound message
pub async fn webhook(State(state): State<Arc<AppState>>, Form(data): Form<TwilioWebhookData>) -> Response {
    debug!(
        "Webhook {} from {} ({})",
        data.message_sid.as_deref().unwrap_or("-"),
        data.from,
        data.profile_name.as_deref().unwrap_or("sem nome")
    );
    let reply = state.bot.handle(&data.from, &data.body).await;
    xml(&reply)
}

#[derive(Debug, Deserialize)]
pub struct SimulateParams {
    from: Option<String>,
    msg: Option<String>,
}

/// Run the webhook pipeline from a browser
pub async fn simulate(State(state): State<Arc<AppState>>, Query(params): Query<SimulateParams>) -> Response {
    let from = params.from.as_deref().unwrap_or(SIMULATE_FROM);
    let msg = params.msg.as_deref().unwrap_or(SIMULATE_MSG);
    let reply = state.bot.handle(from, msg).await;
    xml(&reply)
}

#[derive(Debug, Deserialize)]
pub struct SlotsParams {
    date: Option<String>,
}

/// Free hourly slots for one day
pub async fn slots(State(state): State<Arc<AppState>>, Query(params): Query<SlotsParams>) -> Response {
    let Some(raw) = params.date.filter(|d| !d.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Passe ?date=YYYY-MM-DD"}))).into_response();
    };
    let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Data inválida, use YYYY-MM-DD"}))).into_response();
    };

    let calendar = state.bot.appointments().calendar();
    match calendar.free_slots(date).await {
        Ok(free) => Json(json!({
            "date": raw.trim(),
            "timezone": calendar.timezone().name(),
            "slots": slot_labels(&free),
        }))
        .into_response(),
        Err(e) => {
            error!("Slot lookup for {} failed: {}", date, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Falha ao consultar disponibilidade"})),
            )
                .into_response()
        }
    }
}

/// Remind everyone booked for tomorrow (business timezone)
pub async fn cron_reminders(State(state): State<Arc<AppState>>) -> Response {
    let log = state.bot.appointments().log();
    if !log.exists() {
        return Json(json!({"ok": true, "sent": 0, "msg": "sem agendamentos"})).into_response();
    }

    let tz = state.bot.appointments().calendar().timezone();
    let tomorrow = Utc::now().with_timezone(&tz).date_naive() + Duration::days(1);

    match send_reminders(log, state.sender.as_ref(), &state.dealer_name, tomorrow).await {
        Ok(report) => Json(json!({"ok": true, "sent": report.sent})).into_response(),
        Err(e) => {
            error!("Reminder run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}
