//! Intent detection
//!
//! An ordered table of trigger substrings; the first rule with a hit wins.
//! The vocabulary lives here as data so it can be tested and tuned without
//! touching the matcher.

/// What the customer is asking about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Link,
    Price,
    Conditions,
    Audience,
    Details,
    List,
    Surprise,
    /// List restricted to one model (lower-cased model name)
    ListForModel(String),
}

/// Kind of intent a trigger rule yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentTag {
    Surprise,
    Link,
    Price,
    Conditions,
    Audience,
    Details,
    List,
}

impl From<IntentTag> for Intent {
    fn from(tag: IntentTag) -> Self {
        match tag {
            IntentTag::Surprise => Intent::Surprise,
            IntentTag::Link => Intent::Link,
            IntentTag::Price => Intent::Price,
            IntentTag::Conditions => Intent::Conditions,
            IntentTag::Audience => Intent::Audience,
            IntentTag::Details => Intent::Details,
            IntentTag::List => Intent::List,
        }
    }
}

/// One row of the rule table
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub tag: IntentTag,
    pub triggers: &'static [&'static str],
}

/// Evaluated top to bottom
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        tag: IntentTag::Surprise,
        triggers: &["surpreend", "qualquer um", "sugestão", "sugestao", "sugere"],
    },
    IntentRule {
        tag: IntentTag::Link,
        triggers: &["link", "site", "url"],
    },
    IntentRule {
        tag: IntentTag::Price,
        triggers: &["preço", "preco", "valor", "quanto custa"],
    },
    IntentRule {
        tag: IntentTag::Conditions,
        triggers: &["condição", "condicao", "condições", "condicoes", "parcel", "financi", "taxa"],
    },
    IntentRule {
        tag: IntentTag::Audience,
        triggers: &["público", "publico", "perfil", "para quem"],
    },
    IntentRule {
        tag: IntentTag::Details,
        triggers: &["ficha", "detalhe", "resumo", "informação", "informações", "informacao", "informacoes"],
    },
    IntentRule {
        tag: IntentTag::List,
        triggers: &["oferta", "promo", "lista", "listar"],
    },
];

/// Classify by substring match; `Details` when nothing fires
pub fn detect_intent(message: &str) -> Intent {
    let s = message.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|rule| rule.triggers.iter().any(|t| s.contains(t)))
        .map(|rule| rule.tag.into())
        .unwrap_or(Intent::Details)
}
