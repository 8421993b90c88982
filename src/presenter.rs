//! Presentation seam between the search session and whatever front end
//! drives it. The session never prints or prompts on its own; every
//! user-visible decision goes through [`SearchPresenter`].

use crate::escalation::EndpointSide;
use crate::resolver::SearchIdentifier;
use crate::rhea::ReactionCandidate;
use std::io::Write;
use tracing::warn;

pub const MSG_NOT_IMPLEMENTED: &str =
    "Search function for this pathway element has not been implemented yet";
pub const MSG_ANNOTATION_HINT: &str = "Annotating the datanodes will improve the results.";
pub const MSG_SEARCH_ERROR: &str = "Exception occurred while searching, see error log for details.";

pub fn no_matches_message(query: &str) -> String {
    format!("No reactions found for {query}")
}

pub fn one_sided_prompt(side: EndpointSide) -> String {
    format!(
        "Only the {} node is connected. Do you still want to search?",
        side.label()
    )
}

/// Decisions and reports a search session can raise. Implementations may
/// block (console prompt) or answer from policy (scripted front ends).
pub trait SearchPresenter {
    /// One endpoint resolved, the other did not. `true` continues with the
    /// single-identifier search, `false` abandons the session.
    fn confirm_one_sided(&mut self, side: EndpointSide, query: &SearchIdentifier) -> bool;

    /// Pick one candidate to annotate with, or `None` to leave the pathway
    /// untouched.
    fn choose_reaction(&mut self, query: &str, candidates: &[ReactionCandidate]) -> Option<usize>;

    fn report_no_matches(&mut self, query: &str, annotation_hint: bool);

    fn report_not_implemented(&mut self);

    fn report_search_error(&mut self);
}

/// Console front end. Interactive by default; `assume_yes` and `auto_pick`
/// turn both prompts into fixed policy for scripted runs.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    pub assume_yes: bool,
    pub auto_pick: Option<usize>,
}

impl ConsolePresenter {
    pub fn new(assume_yes: bool, auto_pick: Option<usize>) -> Self {
        Self {
            assume_yes,
            auto_pick,
        }
    }
}

impl SearchPresenter for ConsolePresenter {
    fn confirm_one_sided(&mut self, side: EndpointSide, query: &SearchIdentifier) -> bool {
        println!("{} (query: {query})", one_sided_prompt(side));
        if self.assume_yes {
            println!("-> continuing");
            return true;
        }
        print!("Continue? [y/N] ");
        let _ = std::io::stdout().flush();
        matches!(
            read_stdin_line().as_deref(),
            Some("y") | Some("Y") | Some("yes")
        )
    }

    fn choose_reaction(
        &mut self,
        query: &str,
        candidates: &[ReactionCandidate],
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        println!("Reactions matching {query}:");
        for (index, candidate) in candidates.iter().enumerate() {
            println!("  [{index}] RHEA:{}  {}", candidate.xref.id, candidate.name);
        }
        if let Some(pick) = self.auto_pick {
            if pick < candidates.len() {
                return Some(pick);
            }
            warn!(pick, count = candidates.len(), "pick out of range");
            return None;
        }
        print!("Pick a reaction number (empty to skip): ");
        let _ = std::io::stdout().flush();
        let line = read_stdin_line()?;
        if line.is_empty() {
            return None;
        }
        match line.parse::<usize>() {
            Ok(index) if index < candidates.len() => Some(index),
            _ => {
                println!("No such candidate, skipping");
                None
            }
        }
    }

    fn report_no_matches(&mut self, query: &str, annotation_hint: bool) {
        println!("{}", no_matches_message(query));
        if annotation_hint {
            println!("{MSG_ANNOTATION_HINT}");
        }
    }

    fn report_not_implemented(&mut self) {
        println!("{MSG_NOT_IMPLEMENTED}");
    }

    fn report_search_error(&mut self) {
        println!("{MSG_SEARCH_ERROR}");
    }
}

fn read_stdin_line() -> Option<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok()?;
    Some(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{RHEA_CODE, Xref};

    fn candidates() -> Vec<ReactionCandidate> {
        vec![
            ReactionCandidate {
                xref: Xref::new("10348", RHEA_CODE),
                name: "acetaldehyde + NAD(+) + H2O = acetate + NADH + H(+)".to_string(),
            },
            ReactionCandidate {
                xref: Xref::new("10349", RHEA_CODE),
                name: String::new(),
            },
        ]
    }

    #[test]
    fn test_prompt_names_the_connected_side() {
        assert_eq!(
            one_sided_prompt(EndpointSide::Start),
            "Only the start node is connected. Do you still want to search?"
        );
        assert_eq!(
            one_sided_prompt(EndpointSide::End),
            "Only the end node is connected. Do you still want to search?"
        );
    }

    #[test]
    fn test_no_matches_message_carries_query() {
        assert_eq!(
            no_matches_message("CHEBI:17234+CHEBI:4170"),
            "No reactions found for CHEBI:17234+CHEBI:4170"
        );
    }

    #[test]
    fn test_assume_yes_skips_the_prompt() {
        let mut presenter = ConsolePresenter::new(true, None);
        let query = SearchIdentifier::new("CHEBI:17234").unwrap();
        assert!(presenter.confirm_one_sided(EndpointSide::Start, &query));
    }

    #[test]
    fn test_auto_pick_in_range() {
        let mut presenter = ConsolePresenter::new(true, Some(1));
        assert_eq!(presenter.choose_reaction("q", &candidates()), Some(1));
    }

    #[test]
    fn test_auto_pick_out_of_range_skips() {
        let mut presenter = ConsolePresenter::new(true, Some(7));
        assert_eq!(presenter.choose_reaction("q", &candidates()), None);
    }

    #[test]
    fn test_empty_candidate_list_never_prompts() {
        let mut presenter = ConsolePresenter::default();
        assert_eq!(presenter.choose_reaction("q", &[]), None);
    }
}
