//! Token budget estimation and admission control

use serde::Serialize;

use crate::gateway::ChatMessage;

/// Characters assumed per token. Deliberately low so estimates run high.
pub const CHARS_PER_TOKEN: usize = 3;

/// Estimated token cost of one piece of text
pub fn estimate_text(text: &str) -> usize {
    (text.chars().count() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

/// Estimated token cost of a message set
pub fn estimate(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| estimate_text(&m.content)).sum()
}

/// Thresholds applied against a model's input capacity
#[derive(Debug, Clone, Copy)]
pub struct BudgetPolicy {
    /// Fraction of capacity a request may use
    pub admission_ratio: f64,
    /// Utilization above which a warning is raised
    pub warning_ratio: f64,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            admission_ratio: 0.85,
            warning_ratio: 0.80,
        }
    }
}

/// Outcome of checking one message set against a capacity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetAssessment {
    pub estimated: usize,
    pub capacity: usize,
    /// floor(capacity * admission_ratio)
    pub allowed: usize,
    /// Estimated share of capacity, in percent
    pub utilization: f64,
}

impl BudgetPolicy {
    pub fn assess(&self, messages: &[ChatMessage], capacity: usize) -> BudgetAssessment {
        let estimated = estimate(messages);
        let allowed = (capacity as f64 * self.admission_ratio).floor() as usize;
        let utilization = if capacity == 0 {
            f64::INFINITY
        } else {
            estimated as f64 / capacity as f64 * 100.0
        };

        BudgetAssessment {
            estimated,
            capacity,
            allowed,
            utilization,
        }
    }

    /// Whether the assessment falls in the warning band (warning%, 100%]
    pub fn should_warn(&self, assessment: &BudgetAssessment) -> bool {
        assessment.utilization > self.warning_ratio * 100.0 && assessment.utilization <= 100.0
    }
}

impl BudgetAssessment {
    /// Whether the request may be sent to the model
    pub fn admitted(&self) -> bool {
        self.estimated <= self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages_of(chars: usize) -> Vec<ChatMessage> {
        vec![ChatMessage::user("x".repeat(chars))]
    }

    #[test]
    fn test_estimate_rounds_up_per_message() {
        assert_eq!(estimate_text(""), 0);
        assert_eq!(estimate_text("a"), 1);
        assert_eq!(estimate_text("abc"), 1);
        assert_eq!(estimate_text("abcd"), 2);

        let messages = vec![ChatMessage::user("a"), ChatMessage::assistant("b")];
        assert_eq!(estimate(&messages), 2);
    }

    #[test]
    fn test_estimate_counts_characters_not_bytes() {
        assert_eq!(estimate_text("ééé"), 1);
    }

    #[test]
    fn test_admission_threshold_is_inclusive() {
        let policy = BudgetPolicy::default();

        let at = policy.assess(&messages_of(850 * 3), 1000);
        assert_eq!(at.allowed, 850);
        assert!(at.admitted());

        let over = policy.assess(&messages_of(851 * 3), 1000);
        assert!(!over.admitted());
    }

    #[test]
    fn test_warning_band() {
        let policy = BudgetPolicy::default();
        assert!(!policy.should_warn(&policy.assess(&messages_of(800 * 3), 1000)));
        assert!(policy.should_warn(&policy.assess(&messages_of(830 * 3), 1000)));
        assert!(policy.should_warn(&policy.assess(&messages_of(1000 * 3), 1000)));
        assert!(!policy.should_warn(&policy.assess(&messages_of(1001 * 3), 1000)));
    }

    #[test]
    fn test_zero_capacity_rejects_everything_nonempty() {
        let policy = BudgetPolicy::default();
        let assessment = policy.assess(&messages_of(1), 0);
        assert!(!assessment.admitted());
        assert!(!policy.should_warn(&assessment));
    }
}
