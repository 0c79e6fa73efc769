mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{app, app_with, message_text, Options};
use showroom_bot::storage::LeadRecord;
use showroom_bot::OPT_OUT_REPLY;

#[tokio::test]
async fn test_home_and_health() {
    let app = app();
    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());

    app.send("whatsapp:+5547999990001", "Oi").await;

    let (status, body) = app.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["model"], "echo-model");
    assert_eq!(json["sessions"], 1);
    assert_eq!(json["leads"], 1);
    assert_eq!(json["port"], 5000);
}

#[tokio::test]
async fn test_reply_is_twiml() {
    let app = app();
    let xml = app.send("whatsapp:+5547999990001", "Oi").await;
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>"));
    assert!(xml.ends_with("</Message></Response>"));
}

#[tokio::test]
async fn test_content_type_is_xml() {
    let app = app();
    let response = tower::ServiceExt::oneshot(
        app.router(),
        Request::builder()
            .method("POST")
            .uri("/whatsapp")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("From=whatsapp%3A%2B55&Body=Oi"))
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/xml");
}

#[tokio::test]
async fn test_empty_sender_gets_empty_message() {
    let app = app();
    let xml = app.send("", "Oi").await;
    assert_eq!(message_text(&xml), "");
    assert!(!app.state.bot.leads().exists());
    assert!(app.model.calls.lock().is_empty());
}

#[tokio::test]
async fn test_greeting_goes_to_ai_with_guard() {
    let app = app();
    let reply = message_text(&app.send("whatsapp:+5547999990001", "Oi").await);
    assert_eq!(reply, "IA: Oi");
}

#[tokio::test]
async fn test_suv_gets_catalog_reply() {
    for guard in [true, false] {
        let app = app_with(Options {
            guard,
            ..Options::default()
        });
        let reply = message_text(&app.send("whatsapp:+5547999990001", "SUV").await);
        assert!(reply.starts_with("Pulse Drive 1.3"), "guard={}: {}", guard, reply);
        assert!(app.model.calls.lock().is_empty());
    }
}

#[tokio::test]
async fn test_catalog_list_and_price() {
    let app = app();
    let reply = message_text(&app.send("whatsapp:+55", "quais as ofertas?").await);
    assert!(reply.starts_with("Algumas ofertas em destaque:"));
    // cheapest first
    assert!(reply.find("Mobi Like").unwrap() < reply.find("Pulse Drive 1.3").unwrap());

    let reply = message_text(&app.send("whatsapp:+55", "qual o preço do Pulse?").await);
    assert!(reply.contains("Preço por: R$ 109.990,00"));
}

#[tokio::test]
async fn test_no_offers_file_falls_back_to_ai() {
    let app = app_with(Options {
        offers: None,
        ..Options::default()
    });
    let reply = message_text(&app.send("whatsapp:+55", "tem SUV?").await);
    assert_eq!(reply, "IA: tem SUV?");
}

#[tokio::test]
async fn test_every_reply_is_a_lead() {
    let app = app();
    app.send("whatsapp:+5547999990001", "Oi").await;
    app.send("whatsapp:+5547999990001", "SUV").await;

    let leads: Vec<LeadRecord> = app.state.bot.leads().read_all().unwrap();
    assert_eq!(leads.len(), 2);
    assert_eq!(leads[0].phone, "+5547999990001");
    assert_eq!(leads[0].message, "Oi");
    assert_eq!(leads[0].reply, "IA: Oi");

    let raw = std::fs::read_to_string(app.dir.path().join("leads.csv")).unwrap();
    assert!(raw.starts_with("timestamp,telefone,mensagem,resposta"));
}

#[tokio::test]
async fn test_opt_out_clears_session_and_draft() {
    let app = app();
    let phone = "+5547999990001";
    app.send(phone, "Oi").await;
    app.send(phone, "quero agendar").await;
    assert_eq!(app.state.bot.conversations().get_history(phone).len(), 2);
    assert!(app.state.bot.appointments().has_draft(phone));

    let reply = message_text(&app.send(&format!("whatsapp:{}", phone), "SAIR").await);
    assert_eq!(reply, OPT_OUT_REPLY);
    assert!(app.state.bot.conversations().get_history(phone).is_empty());
    assert!(!app.state.bot.appointments().has_draft(phone));

    // farewell not recorded by default
    let leads: Vec<LeadRecord> = app.state.bot.leads().read_all().unwrap();
    assert_eq!(leads.len(), 2);

    let reply = message_text(&app.send(phone, "stop").await);
    assert_eq!(reply, OPT_OUT_REPLY);
}

#[tokio::test]
async fn test_opt_out_lead_policy() {
    let app = app_with(Options {
        log_opt_out_leads: true,
        ..Options::default()
    });
    app.send("+55", "SAIR").await;
    let leads: Vec<LeadRecord> = app.state.bot.leads().read_all().unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].reply, OPT_OUT_REPLY);
}

#[tokio::test]
async fn test_history_window() {
    let app = app();
    for i in 0..10 {
        app.send("+55", &format!("mensagem {}", i)).await;
    }

    assert_eq!(app.state.bot.conversations().get_history("+55").len(), 12);
    let calls = app.model.calls.lock();
    let last = calls.last().unwrap();
    // system turn plus the model window
    assert_eq!(last.len(), 1 + 8);
    assert_eq!(last.last().unwrap().content, "mensagem 9");

    let snapshot = std::fs::read_to_string(app.dir.path().join("sessions.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(parsed["+55"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn test_simulate_defaults_to_booking() {
    let app = app();
    let (status, xml) = app.get("/simulate").await;
    assert_eq!(status, StatusCode::OK);
    assert!(message_text(&xml).starts_with("Perfeito! Vamos agendar"));
    assert!(app.state.bot.appointments().has_draft("+5500000000000"));

    let (_, xml) = app.get("/simulate?from=whatsapp%3A%2B5511&msg=Oi").await;
    assert_eq!(message_text(&xml), "IA: Oi");
}

#[tokio::test]
async fn test_concurrent_messages_same_phone() {
    let app = app();
    let mut handles = Vec::new();
    for i in 0..8 {
        let bot = app.state.bot.clone();
        handles.push(tokio::spawn(async move {
            bot.handle("whatsapp:+55", &format!("msg {}", i)).await
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(app.state.bot.conversations().get_history("+55").len(), 12);
    let leads: Vec<LeadRecord> = app.state.bot.leads().read_all().unwrap();
    assert_eq!(leads.len(), 8);
}
