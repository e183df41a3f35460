//! Grounded prompt construction
//!
//! The system instruction restricts answers to the supplied context and
//! requires an explicit "No encontrado" when the context lacks the answer.

use alerta_core::{ChatTurn, Prompt};

/// Fixed system instruction sent with every question
pub const SYSTEM_INSTRUCTION: &str = "Eres un asistente experto en desastres naturales en México. \
Responde SOLO con la información del CONTEXTO. \
Cita las fuentes usadas con su marcador, por ejemplo [1]. \
Si la respuesta no está presente en el CONTEXTO, contesta 'No encontrado'.";

/// Answer returned without calling the LLM when nothing is indexed
pub const NO_CONTEXT_ANSWER: &str = "No encontrado: todavía no hay documentos indexados.";

/// Placed in the context section when no document was selected
pub const EMPTY_CONTEXT_MARKER: &str = "(sin documentos relevantes)";

/// Join summaries as `[rank] summary` blocks in selection order
///
/// Blocks are added until the next one would exceed `max_chars`; the
/// first block is always kept. Returns the context and the number of
/// blocks it holds.
pub fn assemble_context<'a>(
    summaries: impl IntoIterator<Item = &'a str>,
    max_chars: usize,
) -> (String, usize) {
    let mut context = String::new();
    let mut total = 0usize;
    let mut kept = 0usize;

    for (i, summary) in summaries.into_iter().enumerate() {
        let block = format!("[{}] {}", i + 1, summary);
        let block_len = block.chars().count();
        if i > 0 && total + block_len > max_chars {
            tracing::debug!(kept = i, max_chars, "Context truncated");
            break;
        }
        if i > 0 {
            context.push_str("\n\n");
        }
        context.push_str(&block);
        total += block_len;
        kept += 1;
    }

    (context, kept)
}

// ============================================================================
// Prompt Builder
// ============================================================================

/// Builder for grounded prompts
pub struct PromptBuilder {
    system_instruction: String,
    history: Vec<ChatTurn>,
    context: String,
    question: String,
}

impl PromptBuilder {
    /// Create a builder with the default system instruction
    pub fn new() -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            history: Vec::new(),
            context: String::new(),
            question: String::new(),
        }
    }

    /// Override the system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Set the trailing history window
    pub fn history(mut self, turns: &[ChatTurn]) -> Self {
        self.history = turns.to_vec();
        self
    }

    /// Set the assembled context
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the question
    pub fn question(mut self, q: impl Into<String>) -> Self {
        self.question = q.into();
        self
    }

    /// Build the final prompt
    pub fn build(self) -> Prompt {
        let context = if self.context.trim().is_empty() {
            EMPTY_CONTEXT_MARKER
        } else {
            self.context.as_str()
        };

        Prompt {
            system: self.system_instruction,
            history: self.history,
            user: format!("CONTEXTO:\n{context}\n\nPREGUNTA:\n{}", self.question),
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_blocks_in_order() {
        let (context, kept) = assemble_context(["Sismo en Oaxaca", "Inundación en Tabasco"], 1000);
        assert_eq!(context, "[1] Sismo en Oaxaca\n\n[2] Inundación en Tabasco");
        assert_eq!(kept, 2);
    }

    #[test]
    fn test_context_truncation_keeps_first_block() {
        let long = "x".repeat(50);
        let (context, kept) = assemble_context([long.as_str(), "segundo"], 10);
        assert_eq!(context, format!("[1] {long}"));
        assert_eq!(kept, 1);

        let (context, kept) = assemble_context(["uno", "dos", "tres"], 16);
        assert_eq!(context, "[1] uno\n\n[2] dos");
        assert_eq!(kept, 2);

        assert_eq!(assemble_context([], 16), (String::new(), 0));
    }

    #[test]
    fn test_prompt_builder() {
        let history = vec![
            ChatTurn::user("¿Hubo sismos?"),
            ChatTurn::assistant("Sí, en Oaxaca [1]."),
        ];
        let prompt = PromptBuilder::new()
            .history(&history)
            .context("[1] Sismo en Oaxaca")
            .question("¿Hubo víctimas?")
            .build();

        assert_eq!(prompt.system, SYSTEM_INSTRUCTION);
        assert!(prompt.system.contains("No encontrado"));
        assert_eq!(prompt.history, history);
        assert_eq!(
            prompt.user,
            "CONTEXTO:\n[1] Sismo en Oaxaca\n\nPREGUNTA:\n¿Hubo víctimas?"
        );
    }

    #[test]
    fn test_empty_context_is_signalled() {
        let prompt = PromptBuilder::new().question("¿Qué pasó?").build();
        assert!(prompt.user.contains(EMPTY_CONTEXT_MARKER));
        assert!(prompt.history.is_empty());
    }

    #[test]
    fn test_custom_system_instruction() {
        let prompt = PromptBuilder::new().system("Sé breve.").build();
        assert_eq!(prompt.system, "Sé breve.");
    }
}
