//! Conversation history and the scoped guards that mutate it.

use super::error::RagError;
use convrag_llm::{Role, Turn};

/// Ordered log of the turns of one conversation.
///
/// Outside an in-flight question the turns alternate `user`, `model`,
/// starting with `user`.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Remove and return the most recent turn.
    pub fn remove_last(&mut self) -> Result<Turn, RagError> {
        self.turns.pop().ok_or(RagError::EmptyHistory)
    }

    /// Owned copy of the turns, oldest first.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// True when turns alternate user/model starting with user and every
    /// user turn has its answer.
    pub fn is_alternating(&self) -> bool {
        self.turns.len() % 2 == 0
            && self.turns.iter().enumerate().all(|(i, turn)| {
                let expected = if i % 2 == 0 { Role::User } else { Role::Model };
                turn.role() == expected
            })
    }
}

/// A turn that lives only as long as the guard.
///
/// Dropping the guard removes the turn, whether the scope ends normally,
/// through `?`, or because the enclosing future was dropped.
pub(crate) struct TransientTurn<'a> {
    history: &'a mut ConversationHistory,
}

impl<'a> TransientTurn<'a> {
    pub(crate) fn push(history: &'a mut ConversationHistory, turn: Turn) -> Self {
        history.append(turn);
        Self { history }
    }

    pub(crate) fn history(&self) -> &ConversationHistory {
        &*self.history
    }
}

impl Drop for TransientTurn<'_> {
    fn drop(&mut self) {
        if self.history.remove_last().is_err() {
            tracing::error!("Transient turn vanished from history before rollback");
        }
    }
}

/// A user turn awaiting its model answer.
///
/// `commit` completes the pair. Dropping an uncommitted exchange removes the
/// user turn when `rollback` is set and leaves it dangling otherwise.
pub(crate) struct PendingExchange<'a> {
    history: &'a mut ConversationHistory,
    rollback: bool,
    committed: bool,
}

impl<'a> PendingExchange<'a> {
    pub(crate) fn begin(history: &'a mut ConversationHistory, question: &str, rollback: bool) -> Self {
        history.append(Turn::user(question));
        Self {
            history,
            rollback,
            committed: false,
        }
    }

    pub(crate) fn history(&self) -> &ConversationHistory {
        &*self.history
    }

    pub(crate) fn commit(mut self, answer: &str) {
        self.history.append(Turn::model(answer));
        self.committed = true;
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        if self.rollback {
            if self.history.remove_last().is_err() {
                tracing::error!("Pending question vanished from history before rollback");
            } else {
                tracing::debug!("Rolled back unanswered question");
            }
        } else {
            tracing::warn!("Leaving unanswered question in history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(history: &mut ConversationHistory, q: &str, a: &str) {
        history.append(Turn::user(q));
        history.append(Turn::model(a));
    }

    #[test]
    fn test_remove_last_on_empty() {
        let mut history = ConversationHistory::new();
        assert!(matches!(history.remove_last(), Err(RagError::EmptyHistory)));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut history = ConversationHistory::new();
        exchange(&mut history, "Q1", "A1");
        let snapshot = history.snapshot();
        history.append(Turn::user("Q2"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_alternation() {
        let mut history = ConversationHistory::new();
        assert!(history.is_alternating());
        exchange(&mut history, "Q1", "A1");
        assert!(history.is_alternating());
        history.append(Turn::user("Q2"));
        assert!(!history.is_alternating());
        history.append(Turn::user("Q3"));
        history.append(Turn::model("A3"));
        assert!(!history.is_alternating());
    }

    #[test]
    fn test_transient_turn_is_removed() {
        let mut history = ConversationHistory::new();
        exchange(&mut history, "Q1", "A1");
        {
            let guard = TransientTurn::push(&mut history, Turn::user("follow-up"));
            assert_eq!(guard.history().len(), 3);
            assert_eq!(guard.history().turns()[2].text(), "follow-up");
        }
        assert_eq!(history.len(), 2);
        assert!(history.is_alternating());
    }

    #[test]
    fn test_pending_exchange_commit() {
        let mut history = ConversationHistory::new();
        let pending = PendingExchange::begin(&mut history, "Q1", true);
        assert_eq!(pending.history().len(), 1);
        pending.commit("A1");
        assert_eq!(history.len(), 2);
        assert!(history.is_alternating());
    }

    #[test]
    fn test_pending_exchange_rollback_policy() {
        let mut history = ConversationHistory::new();
        drop(PendingExchange::begin(&mut history, "Q1", true));
        assert!(history.is_empty());

        drop(PendingExchange::begin(&mut history, "Q1", false));
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].role(), Role::User);
    }
}
