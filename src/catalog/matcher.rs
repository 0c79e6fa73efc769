//! Catalog matching
//!
//! Scores free text against the offer list and decides whether the catalog
//! should answer at all. Everything here is a pure function of
//! (message, offers) except the random pick for "surprise me".

use super::format::{offer_card, offer_list, reply_for_intent};
use super::intent::{detect_intent, Intent};
use super::offer::Offer;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

/// Maximum offers shown for list intents
pub const LIST_SIZE: usize = 3;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}.]+").expect("valid regex"));
static ENGINE_SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d\.\d$").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "de", "da", "do", "das", "dos", "os", "as", "um", "uma", "em", "no", "na", "nos", "nas",
    "com", "por", "para", "pra", "que", "qual", "quais", "quero", "queria", "me", "meu", "minha",
    "eu", "voce", "você", "vc", "tem", "ter", "sobre", "mais", "oi", "ola", "olá", "bom", "boa",
    "dia", "tarde", "noite", "tudo", "bem", "obrigado", "obrigada", "gostaria", "saber", "ver",
];

const AUTOMATIC_TOKENS: &[&str] = &["automático", "automatico", "automática", "automatica", "cvt", "at"];
const MANUAL_TOKENS: &[&str] = &["manual", "mt"];
const FUEL_TOKENS: &[&str] = &[
    "turbo", "flex", "diesel", "elétrico", "eletrico", "híbrido", "hibrido", "gasolina", "etanol",
];

/// Words that make a message eligible for a catalog answer (besides model names)
pub const VEHICLE_KEYWORDS: &[&str] = &[
    "carro", "veículo", "veiculo", "modelo", "versão", "versao", "suv", "picape", "pickup",
    "hatch", "sedan", "sedã", "motor", "câmbio", "cambio", "automático", "automatico", "manual",
    "turbo", "flex", "diesel", "elétrico", "eletrico", "híbrido", "hibrido", "oferta", "promo",
    "preço", "preco", "valor", "quanto custa", "financi", "parcel", "lista", "catálogo",
    "catalogo", "ficha", "surpreend", "0km", "zero km", "test drive",
];

/// Lower-case word tokens; decimal points kept for engine sizes ("1.3")
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase().replace(',', ".");
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().trim_matches('.').to_string())
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn transmission_boost(token: &str, offer: &Offer) -> u32 {
    let transmission = offer.transmission.to_lowercase();
    let automatic = transmission.contains("autom") || transmission.contains("cvt");
    if AUTOMATIC_TOKENS.contains(&token) && automatic {
        return 2;
    }
    if MANUAL_TOKENS.contains(&token) && transmission.contains("manual") {
        return 2;
    }
    0
}

fn fuel_boost(token: &str, offer: &Offer) -> u32 {
    let is_fuel_token = FUEL_TOKENS.contains(&token) || ENGINE_SIZE_RE.is_match(token);
    if !is_fuel_token {
        return 0;
    }
    let powertrain = format!("{} {}", offer.engine, offer.fuel).to_lowercase();
    u32::from(powertrain.contains(token))
}

fn model_boost(token: &str, offer: &Offer) -> u32 {
    let model = offer.model.to_lowercase();
    if model.split_whitespace().any(|w| w == token) {
        3
    } else {
        0
    }
}

/// Relevance of one offer for the query tokens (0 = unrelated)
pub fn score_offer(tokens: &[String], offer: &Offer) -> u32 {
    let blob = offer.search_blob();
    tokens
        .iter()
        .map(|t| {
            let base = u32::from(blob.contains(t.as_str()));
            base + transmission_boost(t, offer) + fuel_boost(t, offer) + model_boost(t, offer)
        })
        .sum()
}

/// Highest-scoring offer; ties keep catalog order; zero score is no match
pub fn best_offer<'a>(message: &str, offers: &'a [Offer]) -> Option<&'a Offer> {
    let tokens = tokenize(message);
    if tokens.is_empty() {
        return None;
    }
    let mut best: Option<(&Offer, u32)> = None;
    for offer in offers {
        let score = score_offer(&tokens, offer);
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((offer, score));
        }
    }
    best.map(|(offer, _)| offer)
}

/// First catalog model named in the message (lower-cased)
pub fn mentioned_model(message: &str, offers: &[Offer]) -> Option<String> {
    let tokens = tokenize(message);
    offers
        .iter()
        .map(|o| o.model.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .find(|model| {
            model
                .split_whitespace()
                .any(|w| tokens.iter().any(|t| t == w))
        })
}

/// Guard against greetings and small talk hitting the catalog
pub fn is_catalog_eligible(message: &str, offers: &[Offer]) -> bool {
    let s = message.to_lowercase();
    VEHICLE_KEYWORDS.iter().any(|k| s.contains(k)) || mentioned_model(message, offers).is_some()
}

/// Intent including the model-restricted list variant
pub fn classify(message: &str, offers: &[Offer]) -> Intent {
    match detect_intent(message) {
        Intent::List => match mentioned_model(message, offers) {
            Some(model) => Intent::ListForModel(model),
            None => Intent::List,
        },
        other => other,
    }
}

/// Up to `LIST_SIZE` offers, cheapest first; offers without price go last
pub fn cheapest<'a>(offers: impl IntoIterator<Item = &'a Offer>) -> Vec<&'a Offer> {
    let mut sorted: Vec<&Offer> = offers.into_iter().collect();
    sorted.sort_by(|a, b| {
        let pa = a.price().1.unwrap_or(f64::MAX);
        let pb = b.price().1.unwrap_or(f64::MAX);
        pa.total_cmp(&pb)
    });
    sorted.truncate(LIST_SIZE);
    sorted
}

/// Catalog reply for `message`, or `None` to let the conversation continue elsewhere
pub fn answer(message: &str, offers: &[Offer], guard: bool) -> Option<String> {
    answer_with_rng(message, offers, guard, &mut rand::thread_rng())
}

pub fn answer_with_rng<R: Rng + ?Sized>(message: &str, offers: &[Offer], guard: bool, rng: &mut R) -> Option<String> {
    if offers.is_empty() || message.trim().is_empty() {
        return None;
    }
    if guard && !is_catalog_eligible(message, offers) {
        return None;
    }

    match classify(message, offers) {
        Intent::List => Some(offer_list("Algumas ofertas em destaque:", &cheapest(offers))),
        Intent::ListForModel(model) => {
            let matching: Vec<&Offer> = offers
                .iter()
                .filter(|o| o.search_blob().contains(&model))
                .collect();
            let top = cheapest(matching);
            let first = top.first()?;
            let heading = format!("Ofertas do {}:", first.model.trim());
            Some(offer_list(&heading, &top))
        }
        Intent::Surprise => {
            let offer = offers.choose(rng)?;
            Some(format!("Que tal este? 😉\n\n{}", offer_card(offer)))
        }
        intent => best_offer(message, offers).map(|offer| reply_for_intent(&intent, offer)),
    }
}
