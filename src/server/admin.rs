//! Admin routes
//!
//! Gated by the admin token, passed as `?token=` or the `X-Admin-Token`
//! header.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use quick_xml::escape::escape;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::AppState;
use crate::storage::{CsvLog, CsvTable, StorageError};

pub const ADMIN_HEADER: &str = "x-admin-token";

#[derive(Debug, Default, Deserialize)]
pub struct AdminParams {
    token: Option<String>,
}

fn presented_token<'a>(params: &'a AdminParams, headers: &'a HeaderMap) -> Option<&'a str> {
    params
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| headers.get(ADMIN_HEADER).and_then(|v| v.to_str().ok()))
}

/// 403 unless the request carries the admin token
fn require_admin(state: &AppState, params: &AdminParams, headers: &HeaderMap) -> Result<(), Response> {
    match presented_token(params, headers) {
        Some(token) if token == state.admin_token => Ok(()),
        _ => {
            warn!("Rejected admin request");
            Err((StatusCode::FORBIDDEN, "Acesso negado").into_response())
        }
    }
}

const TABLE_STYLE: &str = "body{font-family:system-ui,Segoe UI,Roboto,Arial,sans-serif;padding:20px}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ddd;padding:8px;text-align:left}\
th{background:#f5f5f5} tr:nth-child(even) td{background:#fafafa}";

/// HTML page with the table rows newest first
pub fn render_table(title: &str, heading: &str, table: &CsvTable) -> String {
    let mut html = format!(
        "<html><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>\
         <h2>{}</h2><table><thead><tr>",
        escape(title),
        TABLE_STYLE,
        escape(heading)
    );
    for col in &table.header {
        html.push_str(&format!("<th>{}</th>", escape(col.as_str())));
    }
    html.push_str("</tr></thead><tbody>");
    for row in table.rows.iter().rev() {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", escape(cell.as_str())));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></body></html>");
    html
}

fn table_page(log: &CsvLog, title: &str, heading: &str, empty: &'static str) -> Response {
    match log.read_table() {
        Ok(Some(table)) => Html(render_table(title, heading, &table)).into_response(),
        Ok(None) => empty.into_response(),
        Err(e) => {
            error!("Failed to read {}: {}", log.path().display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Falha ao ler o arquivo").into_response()
        }
    }
}

/// Leads, newest first
pub async fn painel(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = require_admin(&state, &params, &headers) {
        return denied;
    }
    table_page(state.bot.leads(), "Leads", "Leads Registrados", "Nenhum lead ainda.")
}

/// Appointments, newest first
pub async fn agenda(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = require_admin(&state, &params, &headers) {
        return denied;
    }
    table_page(
        state.bot.appointments().log(),
        "Agenda",
        "Agendamentos",
        "Nenhum agendamento ainda.",
    )
}

/// Raw leads CSV
pub async fn leads_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = require_admin(&state, &params, &headers) {
        return denied;
    }
    match state.bot.leads().read_raw() {
        Ok(raw) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            raw.unwrap_or_default(),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to read leads: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Falha ao ler o arquivo").into_response()
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Forget sessions and drafts, then delete leads, sessions and appointments
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = require_admin(&state, &params, &headers) {
        return denied;
    }

    let bot = &state.bot;
    let sessions_cleared = bot.conversations().clear_all();
    let drafts_cleared = bot.appointments().clear_all();

    let sessions = bot.conversations().snapshot();
    let appointments = bot.appointments().log();
    let removals: [(String, Result<bool, StorageError>); 3] = [
        (file_name(bot.leads().path()), bot.leads().remove()),
        (file_name(sessions.path()), sessions.remove()),
        (file_name(appointments.path()), appointments.remove()),
    ];

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in removals {
        match result {
            Ok(true) => deleted.push(name),
            Ok(false) => {}
            Err(e) => {
                error!("Failed to delete {}: {}", name, e);
                failed.push(format!("{}: {}", name, e));
            }
        }
    }

    if !failed.is_empty() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "errors": failed, "deleted": deleted, "cleared": true})),
        )
            .into_response();
    }

    info!(
        "Reset: deleted {:?}, cleared {} sessions and {} drafts",
        deleted, sessions_cleared, drafts_cleared
    );

    Json(json!({"ok": true, "deleted": deleted})).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_escapes_and_reverses() {
        let table = CsvTable {
            header: vec!["telefone".into(), "mensagem".into()],
            rows: vec![
                vec!["+1".into(), "primeira".into()],
                vec!["+2".into(), "<script>alert(1)</script>".into()],
            ],
        };
        let html = render_table("Leads", "Leads Registrados", &table);
        assert!(html.contains("<th>telefone</th>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.find("+2").unwrap() < html.find("+1").unwrap());
    }

    #[test]
    fn test_presented_token() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_HEADER, "from-header".parse().unwrap());

        let query = AdminParams {
            token: Some("from-query".into()),
        };
        assert_eq!(presented_token(&query, &headers), Some("from-query"));
        assert_eq!(presented_token(&AdminParams::default(), &headers), Some("from-header"));
        assert_eq!(presented_token(&AdminParams::default(), &HeaderMap::new()), None);
    }
}
