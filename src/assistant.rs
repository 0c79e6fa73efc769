//! AI fallback
//!
//! Answers whatever neither the appointment flow nor the catalog claimed.
//! Failures never reach the customer as errors: they get a fixed apology.

use crate::conversation::{ConversationMessage, ConversationStore};
use crate::llm::ChatModel;
use std::sync::Arc;
use tracing::{error, warn};

/// Sampling temperature for every completion
pub const TEMPERATURE: f32 = 0.7;

/// Reply used when the model cannot be reached
pub const UNAVAILABLE_REPLY: &str = "Desculpe, estou indisponível agora. Pode tentar novamente em instantes? 🙏";

/// Persona and rules sent as the system turn
pub fn system_prompt(dealer_name: &str) -> String {
    format!(
        "Você é um consultor automotivo da {dealer_name}. \
         Fale em tom humano, direto e educado, sempre em português do Brasil. \
         Se a mensagem for genérica (sem citar modelo/oferta), faça UMA pergunta curta de avanço, \
         por exemplo: 'Você pensa em algum modelo específico?' ou 'Vai usar mais na cidade ou estrada?'. \
         Use o catálogo interno somente quando o cliente citar um modelo ou pedir ofertas/lista. \
         Nunca invente preços. Convide para test drive quando fizer sentido. \
         Se o cliente escrever 'SAIR', encerre cordialmente e remova a sessão. \
         Responda em 2–4 frases."
    )
}

/// Conversation-aware wrapper around a `ChatModel`
pub struct Assistant {
    model: Arc<dyn ChatModel>,
    conversations: Arc<ConversationStore>,
    system_prompt: String,
}

impl Assistant {
    pub fn new(model: Arc<dyn ChatModel>, conversations: Arc<ConversationStore>, dealer_name: &str) -> Self {
        Self {
            model,
            conversations,
            system_prompt: system_prompt(dealer_name),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Generate a reply and record the exchange in the phone's history
    pub async fn reply(&self, phone: &str, message: &str) -> String {
        let mut messages = vec![ConversationMessage::system(&self.system_prompt)];
        messages.extend(self.conversations.build_context(phone, message));

        let text = match self.model.complete(&messages, TEMPERATURE).await {
            Ok(text) => text,
            Err(e) => {
                error!("Chat completion failed for {}: {}", phone, e);
                UNAVAILABLE_REPLY.to_string()
            }
        };

        if let Err(e) = self.conversations.add_exchange(phone, message, &text) {
            warn!("Failed to persist conversation for {}: {}", phone, e);
        }
        text
    }
}
