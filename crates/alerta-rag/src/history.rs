//! Conversation history helpers
//!
//! History is owned by the caller: the responder reads a trailing window
//! and hands back a new history with the latest exchange appended.

use alerta_core::ChatTurn;

/// Last `max_messages` turns, oldest dropped first
pub fn trailing_window(history: &[ChatTurn], max_messages: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(max_messages);
    &history[start..]
}

/// Append the user question then the assistant answer
pub fn append_exchange(
    mut history: Vec<ChatTurn>,
    question: impl Into<String>,
    answer: impl Into<String>,
) -> Vec<ChatTurn> {
    history.reserve(2);
    history.push(ChatTurn::user(question));
    history.push(ChatTurn::assistant(answer));
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerta_core::ChatRole;

    fn conversation(exchanges: usize) -> Vec<ChatTurn> {
        (0..exchanges).fold(Vec::new(), |history, i| {
            append_exchange(history, format!("q{i}"), format!("a{i}"))
        })
    }

    #[test]
    fn test_window_keeps_latest_messages() {
        let history = conversation(3);
        let window = trailing_window(&history, 4);
        let contents: Vec<_> = window.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn test_window_shorter_history() {
        let history = conversation(1);
        assert_eq!(trailing_window(&history, 4).len(), 2);
        assert!(trailing_window(&history, 0).is_empty());
        assert!(trailing_window(&[], 4).is_empty());
    }

    #[test]
    fn test_append_exchange_order() {
        let history = append_exchange(conversation(2), "¿Dónde?", "En Tabasco [1].");
        assert_eq!(history.len(), 6);
        assert_eq!(history[4].role, ChatRole::User);
        assert_eq!(history[4].content, "¿Dónde?");
        assert_eq!(history[5].role, ChatRole::Assistant);
        assert_eq!(history[5].content, "En Tabasco [1].");
    }
}
