//! Reply text for catalog answers

use super::intent::Intent;
use super::offer::Offer;

const CARD_CLOSING: &str = "Quer consultar cores, disponibilidade e agendar um test drive?";

/// `R$ 1.234,56`; missing price reads "indisponível"
pub fn format_brl(value: Option<f64>) -> String {
    let Some(v) = value else {
        return "indisponível".to_string();
    };
    let cents = (v * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let int_part = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("R$ {}{},{:02}", sign, grouped, frac)
}

fn price_line(offer: &Offer) -> String {
    let (label, value) = offer.price();
    format!("Preço {}: {}", label.as_str(), format_brl(value))
}

/// Full multi-line description of one offer
pub fn offer_card(offer: &Offer) -> String {
    let mut lines = vec![offer.title(), price_line(offer)];

    let mut extras = Vec::new();
    if !offer.engine.is_empty() {
        extras.push(format!("Motor {}", offer.engine));
    }
    if !offer.transmission.is_empty() {
        extras.push(format!("Câmbio {}", offer.transmission));
    }
    if !offer.fuel.is_empty() {
        extras.push(offer.fuel.clone());
    }
    if !extras.is_empty() {
        lines.push(extras.join(", "));
    }

    if !offer.conditions.is_empty() {
        lines.push(format!("Condições: {}", offer.conditions.join("; ")));
    }
    if !offer.audience.is_empty() {
        lines.push(format!("Público-alvo: {}", offer.audience.join(", ")));
    }
    if let Some(link) = offer.preferred_link() {
        lines.push(format!("Link: {}", link));
    }

    lines.push(CARD_CLOSING.to_string());
    lines.join("\n")
}

fn with_link(body: String, offer: &Offer) -> String {
    match offer.preferred_link() {
        Some(link) => format!("{}\n{}", body, link),
        None => body,
    }
}

/// Short answer tailored to the intent; card for everything else
pub fn reply_for_intent(intent: &Intent, offer: &Offer) -> String {
    let title = offer.title();
    match intent {
        Intent::Link => match offer.preferred_link() {
            Some(link) => format!("{}\n{}", title, link),
            None => format!("{}\nLink indisponível.", title),
        },
        Intent::Price => with_link(format!("{}\n{}", title, price_line(offer)), offer),
        Intent::Conditions => {
            let cond = if offer.conditions.is_empty() {
                "Não informado.".to_string()
            } else {
                offer.conditions.join("; ")
            };
            with_link(format!("{}\nCondições: {}", title, cond), offer)
        }
        Intent::Audience => {
            let audience = if offer.audience.is_empty() {
                "Não informado.".to_string()
            } else {
                offer.audience.join(", ")
            };
            with_link(format!("{}\nPúblico-alvo: {}", title, audience), offer)
        }
        _ => offer_card(offer),
    }
}

/// Several cards under a heading
pub fn offer_list(heading: &str, offers: &[&Offer]) -> String {
    let cards: Vec<String> = offers.iter().map(|o| offer_card(o)).collect();
    format!("{}\n\n{}", heading, cards.join("\n\n---\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse() -> Offer {
        Offer {
            model: "Pulse".into(),
            trim: "Drive 1.3".into(),
            engine: "1.3".into(),
            transmission: "CVT".into(),
            fuel: "Flex".into(),
            conditions: vec!["Taxa 0%".into(), "Entrada 50%".into()],
            audience: vec!["família".into()],
            price_for: Some(109990.0),
            model_link: Some("https://x/pulse".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(Some(109990.0)), "R$ 109.990,00");
        assert_eq!(format_brl(Some(1234567.891)), "R$ 1.234.567,89");
        assert_eq!(format_brl(Some(999.5)), "R$ 999,50");
        assert_eq!(format_brl(Some(0.0)), "R$ 0,00");
        assert_eq!(format_brl(None), "indisponível");
    }

    #[test]
    fn test_card() {
        let card = offer_card(&pulse());
        let lines: Vec<&str> = card.lines().collect();
        assert_eq!(lines[0], "Pulse Drive 1.3");
        assert_eq!(lines[1], "Preço por: R$ 109.990,00");
        assert_eq!(lines[2], "Motor 1.3, Câmbio CVT, Flex");
        assert_eq!(lines[3], "Condições: Taxa 0%; Entrada 50%");
        assert_eq!(lines[4], "Público-alvo: família");
        assert_eq!(lines[5], "Link: https://x/pulse");
        assert_eq!(lines[6], CARD_CLOSING);
    }

    #[test]
    fn test_intent_replies() {
        let offer = pulse();
        assert_eq!(reply_for_intent(&Intent::Link, &offer), "Pulse Drive 1.3\nhttps://x/pulse");
        assert_eq!(
            reply_for_intent(&Intent::Price, &offer),
            "Pulse Drive 1.3\nPreço por: R$ 109.990,00\nhttps://x/pulse"
        );
        assert!(reply_for_intent(&Intent::Conditions, &offer).contains("Condições: Taxa 0%; Entrada 50%"));

        let bare = Offer {
            model: "Mobi".into(),
            ..Default::default()
        };
        assert_eq!(reply_for_intent(&Intent::Link, &bare), "Mobi\nLink indisponível.");
        assert_eq!(reply_for_intent(&Intent::Audience, &bare), "Mobi\nPúblico-alvo: Não informado.");
    }
}
