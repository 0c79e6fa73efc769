//! Offer records as stored in the catalog file
//!
//! Field names follow the dealership's JSON file (Portuguese keys).

use serde::{Deserialize, Deserializer, Serialize};

/// One vehicle trim with price and metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(rename = "modelo", default)]
    pub model: String,
    #[serde(rename = "versao", default)]
    pub trim: String,
    #[serde(rename = "motor", default)]
    pub engine: String,
    #[serde(rename = "cambio", default)]
    pub transmission: String,
    #[serde(rename = "combustivel", default)]
    pub fuel: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "publico_alvo", default)]
    pub audience: Vec<String>,
    #[serde(rename = "condicoes", default)]
    pub conditions: Vec<String>,
    #[serde(rename = "preco_de", default, deserialize_with = "de_price")]
    pub price_from: Option<f64>,
    #[serde(rename = "preco_por", default, deserialize_with = "de_price")]
    pub price_for: Option<f64>,
    #[serde(rename = "preco_a_partir", default, deserialize_with = "de_price")]
    pub price_starting_at: Option<f64>,
    #[serde(rename = "link_modelo", default)]
    pub model_link: Option<String>,
    #[serde(rename = "link_oferta", default)]
    pub offer_link: Option<String>,
}

/// Which price field is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceLabel {
    For,
    StartingAt,
    From,
}

impl PriceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::For => "por",
            Self::StartingAt => "a partir de",
            Self::From => "de",
        }
    }
}

impl Offer {
    /// "Modelo Versão"
    pub fn title(&self) -> String {
        format!("{} {}", self.model.trim(), self.trim.trim()).trim().to_string()
    }

    /// First available price, in display priority order
    pub fn price(&self) -> (PriceLabel, Option<f64>) {
        if let Some(p) = self.price_for {
            (PriceLabel::For, Some(p))
        } else if let Some(p) = self.price_starting_at {
            (PriceLabel::StartingAt, Some(p))
        } else {
            (PriceLabel::From, self.price_from)
        }
    }

    /// Model page first, then the offer page
    pub fn preferred_link(&self) -> Option<&str> {
        [self.model_link.as_deref(), self.offer_link.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|l| !l.is_empty())
    }

    /// Lower-cased concatenation of every searchable field
    pub fn search_blob(&self) -> String {
        [
            self.model.as_str(),
            self.trim.as_str(),
            self.engine.as_str(),
            self.transmission.as_str(),
            &self.tags.join(" "),
            &self.audience.join(" "),
            &self.conditions.join(" "),
        ]
        .join(" ")
        .to_lowercase()
    }
}

/// Accept numbers, numeric strings ("89990.00", "89.990,00") and null
fn de_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Text(s)) => parse_price_text(&s),
        None => None,
    })
}

fn parse_price_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    // Brazilian notation uses ',' for decimals
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    normalized.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_portuguese_keys() {
        let raw = r#"{
            "modelo": "Pulse", "versao": "Drive 1.3", "motor": "1.3", "cambio": "CVT",
            "combustivel": "Flex", "tags": ["suv"], "publico_alvo": ["família"],
            "condicoes": ["Taxa 0%"], "preco_por": 109990, "link_modelo": "https://x/pulse"
        }"#;
        let offer: Offer = serde_json::from_str(raw).unwrap();
        assert_eq!(offer.title(), "Pulse Drive 1.3");
        assert_eq!(offer.price(), (PriceLabel::For, Some(109990.0)));
        assert_eq!(offer.preferred_link(), Some("https://x/pulse"));
    }

    #[test]
    fn test_price_priority() {
        let mut offer = Offer {
            price_from: Some(3.0),
            price_starting_at: Some(2.0),
            ..Default::default()
        };
        assert_eq!(offer.price(), (PriceLabel::StartingAt, Some(2.0)));
        offer.price_starting_at = None;
        assert_eq!(offer.price(), (PriceLabel::From, Some(3.0)));
        offer.price_from = None;
        assert_eq!(offer.price(), (PriceLabel::From, None));
    }

    #[test]
    fn test_string_prices() {
        let offer: Offer = serde_json::from_str(r#"{"preco_de": "R$ 89.990,50", "preco_por": null}"#).unwrap();
        assert_eq!(offer.price_from, Some(89990.5));
        assert_eq!(offer.price_for, None);
        assert_eq!(parse_price_text("99990.00"), Some(99990.0));
        assert_eq!(parse_price_text("consulte"), None);
    }

    #[test]
    fn test_link_fallback() {
        let offer = Offer {
            model_link: Some("  ".into()),
            offer_link: Some("https://x/oferta".into()),
            ..Default::default()
        };
        assert_eq!(offer.preferred_link(), Some("https://x/oferta"));
        assert_eq!(Offer::default().preferred_link(), None);
    }
}
