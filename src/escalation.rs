//! Query escalation: three attempts, progressively relaxed.
//!
//! Attempt 0 combines both endpoint identifiers, attempts 1 and 2 fall back
//! to one side at a time. The state is threaded by value through `advance`,
//! so concurrent sessions on different interactions cannot share a counter.
//! An attempt whose query would duplicate one already issued is skipped;
//! single-sided sessions therefore issue exactly one query.

use crate::resolver::SearchIdentifier;

const MAX_ATTEMPTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSide {
    Start,
    End,
}

impl EndpointSide {
    pub fn label(self) -> &'static str {
        match self {
            EndpointSide::Start => "start",
            EndpointSide::End => "end",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationState {
    attempt: u8,
    start: Option<SearchIdentifier>,
    end: Option<SearchIdentifier>,
    issued: Vec<String>,
    confirmed: bool,
}

#[derive(Debug)]
pub enum Step {
    /// A query to send; `next` is the state to thread into the following
    /// attempt if this one comes back empty.
    Issue {
        attempt: u8,
        query: String,
        next: EscalationState,
    },
    /// Only one side is connected; ask before searching with it.
    Confirm {
        side: EndpointSide,
        resume: EscalationState,
    },
    /// Neither endpoint produced an identifier; nothing to search for.
    NotImplemented,
    /// All attempts consumed without a usable query left.
    Exhausted,
}

impl EscalationState {
    pub fn new(start: Option<SearchIdentifier>, end: Option<SearchIdentifier>) -> Self {
        Self {
            attempt: 0,
            start,
            end,
            issued: vec![],
            confirmed: false,
        }
    }

    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    pub fn issued_queries(&self) -> &[String] {
        &self.issued
    }

    /// Marks the single-sided confirmation as granted so `advance` can issue
    /// the one-sided query instead of prompting again.
    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    /// Consumes the state and produces the next step of the ladder.
    pub fn advance(mut self) -> Step {
        loop {
            if self.attempt >= MAX_ATTEMPTS {
                return Step::Exhausted;
            }
            let candidate = match self.attempt {
                0 => match (&self.start, &self.end) {
                    (Some(start), Some(end)) => Some(format!("{start}+{end}")),
                    (Some(start), None) => {
                        if !self.confirmed {
                            return Step::Confirm {
                                side: EndpointSide::Start,
                                resume: self,
                            };
                        }
                        Some(start.as_str().to_string())
                    }
                    (None, Some(end)) => {
                        if !self.confirmed {
                            return Step::Confirm {
                                side: EndpointSide::End,
                                resume: self,
                            };
                        }
                        Some(end.as_str().to_string())
                    }
                    (None, None) => return Step::NotImplemented,
                },
                1 => self.start.as_ref().map(|id| id.as_str().to_string()),
                _ => self.end.as_ref().map(|id| id.as_str().to_string()),
            };
            let attempt = self.attempt;
            self.attempt += 1;
            match candidate {
                Some(query) if !self.issued.contains(&query) => {
                    self.issued.push(query.clone());
                    return Step::Issue {
                        attempt,
                        query,
                        next: self,
                    };
                }
                // Absent identifier or duplicate query: no-op attempt.
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(raw: &str) -> Option<SearchIdentifier> {
        Some(SearchIdentifier::new(raw).unwrap())
    }

    fn drain_queries(mut state: EscalationState) -> Vec<String> {
        let mut queries = vec![];
        loop {
            match state.advance() {
                Step::Issue { query, next, .. } => {
                    queries.push(query);
                    state = next;
                }
                Step::Exhausted => return queries,
                other => panic!("unexpected step: {other:?}"),
            }
        }
    }

    #[test]
    fn test_both_sides_escalate_through_three_distinct_queries() {
        let state = EscalationState::new(ident("CHEBI:17632"), ident("CHEBI:16301"));
        let queries = drain_queries(state);
        assert_eq!(
            queries,
            vec![
                "CHEBI:17632+CHEBI:16301".to_string(),
                "CHEBI:17632".to_string(),
                "CHEBI:16301".to_string(),
            ]
        );
    }

    #[test]
    fn test_attempt_counter_threads_through_issue_steps() {
        let state = EscalationState::new(ident("A"), ident("B"));
        let Step::Issue { attempt, next, .. } = state.advance() else {
            panic!("expected a query");
        };
        assert_eq!(attempt, 0);
        assert_eq!(next.attempt(), 1);
        assert_eq!(next.issued_queries(), ["A+B"]);
    }

    #[test]
    fn test_start_only_asks_once_then_issues_once() {
        let state = EscalationState::new(ident("P12345"), None);
        let Step::Confirm { side, resume } = state.advance() else {
            panic!("expected a confirmation prompt");
        };
        assert_eq!(side, EndpointSide::Start);
        let Step::Issue { query, next, .. } = resume.confirmed().advance() else {
            panic!("expected the one-sided query");
        };
        assert_eq!(query, "P12345");
        // Attempts 1 and 2 would repeat the same query; the ladder ends.
        assert!(matches!(next.advance(), Step::Exhausted));
    }

    #[test]
    fn test_end_only_prompts_for_end_side() {
        let state = EscalationState::new(None, ident("CHEBI:16301"));
        let Step::Confirm { side, .. } = state.advance() else {
            panic!("expected a confirmation prompt");
        };
        assert_eq!(side, EndpointSide::End);
    }

    #[test]
    fn test_no_identifiers_is_not_implemented() {
        let state = EscalationState::new(None, None);
        assert!(matches!(state.advance(), Step::NotImplemented));
    }

    #[test]
    fn test_identical_sides_skip_duplicate_single_queries() {
        let state = EscalationState::new(ident("CHEBI:15343"), ident("CHEBI:15343"));
        let queries = drain_queries(state);
        assert_eq!(
            queries,
            vec![
                "CHEBI:15343+CHEBI:15343".to_string(),
                "CHEBI:15343".to_string(),
            ]
        );
    }
}
