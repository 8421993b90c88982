//! Search session: endpoint resolution, the query ladder, and outcome
//! presentation, glued together for synchronous and worker-thread use.
//!
//! Resolution and the one-sided confirmation run on the calling thread;
//! the ladder itself is pure network work and can be moved to a worker
//! with a [`CancelToken`] as the only cross-thread control.

use crate::cancel::CancelToken;
use crate::error::{ErrorCode, SearchError, search_err};
use crate::escalation::{EndpointSide, EscalationState, Step};
use crate::id_mapper::IdMapper;
use crate::pathway::PathwayDoc;
use crate::presenter::SearchPresenter;
use crate::resolver::{ReferenceIndex, resolve_search_identifier};
use crate::rhea::{ReactionCandidate, ReactionLookup};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// Final result of one session, after presentation.
#[derive(Debug)]
pub enum SearchOutcome {
    NotImplemented,
    Cancelled,
    NoMatches {
        query: String,
    },
    Matched {
        query: String,
        candidates: Vec<ReactionCandidate>,
        selection: Option<usize>,
    },
}

impl SearchOutcome {
    /// Candidate picked by the presenter, when there was one.
    pub fn selected(&self) -> Option<&ReactionCandidate> {
        match self {
            SearchOutcome::Matched {
                candidates,
                selection: Some(index),
                ..
            } => candidates.get(*index),
            _ => None,
        }
    }
}

/// Raw ladder result, before any presenter involvement. This is what a
/// worker thread hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum LadderOutcome {
    NotImplemented,
    Cancelled,
    NoMatches { query: String },
    Found { query: String, candidates: Vec<ReactionCandidate> },
}

/// Where a session stands after resolution and confirmation.
#[derive(Debug)]
pub enum PreparedSearch {
    /// Nothing to search for, or the one-sided search was declined.
    NotImplemented,
    Ready(EscalationState),
}

pub struct SearchSession<'a> {
    doc: &'a PathwayDoc,
    mapper: &'a dyn IdMapper,
    lookup: &'a dyn ReactionLookup,
}

impl<'a> SearchSession<'a> {
    pub fn new(
        doc: &'a PathwayDoc,
        mapper: &'a dyn IdMapper,
        lookup: &'a dyn ReactionLookup,
    ) -> Self {
        Self {
            doc,
            mapper,
            lookup,
        }
    }

    /// Resolves both endpoints of the interaction and settles the
    /// one-sided confirmation, so the returned state is pure network work.
    pub fn prepare(
        &self,
        graph_id: &str,
        presenter: &mut dyn SearchPresenter,
    ) -> Result<PreparedSearch, SearchError> {
        let interaction = self.doc.interaction_by_graph_id(graph_id).ok_or_else(|| {
            search_err(
                ErrorCode::NotFound,
                format!("No interaction with graph id '{graph_id}'"),
            )
        })?;
        let index = ReferenceIndex::build(self.doc);
        let start = interaction
            .start_ref()
            .and_then(|graph_ref| resolve_search_identifier(&index, self.mapper, graph_ref));
        let end = interaction
            .end_ref()
            .and_then(|graph_ref| resolve_search_identifier(&index, self.mapper, graph_ref));
        info!(graph_id, ?start, ?end, "interaction endpoints resolved");
        let state = EscalationState::new(start.clone(), end.clone());
        let state = match (&start, &end) {
            (None, None) => return Ok(PreparedSearch::NotImplemented),
            (Some(id), None) => {
                if presenter.confirm_one_sided(EndpointSide::Start, id) {
                    state.confirmed()
                } else {
                    info!("one-sided search declined");
                    return Ok(PreparedSearch::NotImplemented);
                }
            }
            (None, Some(id)) => {
                if presenter.confirm_one_sided(EndpointSide::End, id) {
                    state.confirmed()
                } else {
                    info!("one-sided search declined");
                    return Ok(PreparedSearch::NotImplemented);
                }
            }
            (Some(_), Some(_)) => state,
        };
        Ok(PreparedSearch::Ready(state))
    }

    /// Whole session on the calling thread: prepare, run the ladder, and
    /// report through the presenter.
    pub fn run(
        &self,
        graph_id: &str,
        presenter: &mut dyn SearchPresenter,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome, SearchError> {
        let state = match self.prepare(graph_id, presenter)? {
            PreparedSearch::NotImplemented => {
                presenter.report_not_implemented();
                return Ok(SearchOutcome::NotImplemented);
            }
            PreparedSearch::Ready(state) => state,
        };
        settle(run_ladder(state, self.lookup, cancel), presenter)
    }
}

/// Drives the attempt ladder against the lookup service. An unconfirmed
/// one-sided state is treated as declined; a lookup error ends the ladder,
/// empty answers escalate until the attempts run out.
pub fn run_ladder(
    mut state: EscalationState,
    lookup: &dyn ReactionLookup,
    cancel: &CancelToken,
) -> Result<LadderOutcome, SearchError> {
    let mut last_query = String::new();
    loop {
        if cancel.is_cancelled() {
            return Ok(LadderOutcome::Cancelled);
        }
        state = match state.advance() {
            Step::Issue {
                attempt,
                query,
                next,
            } => {
                debug!(attempt, query, "issuing reaction query");
                let candidates = lookup.search(&query, cancel)?;
                if cancel.is_cancelled() {
                    return Ok(LadderOutcome::Cancelled);
                }
                if candidates.is_empty() {
                    last_query = query;
                    next
                } else {
                    return Ok(LadderOutcome::Found { query, candidates });
                }
            }
            Step::Confirm { .. } => return Ok(LadderOutcome::NotImplemented),
            Step::NotImplemented => return Ok(LadderOutcome::NotImplemented),
            Step::Exhausted => {
                return Ok(LadderOutcome::NoMatches { query: last_query });
            }
        };
    }
}

/// Maps a finished ladder onto presenter calls and the final outcome.
/// Cancellation presents nothing.
pub fn present_outcome(
    outcome: LadderOutcome,
    presenter: &mut dyn SearchPresenter,
) -> SearchOutcome {
    match outcome {
        LadderOutcome::NotImplemented => {
            presenter.report_not_implemented();
            SearchOutcome::NotImplemented
        }
        LadderOutcome::Cancelled => SearchOutcome::Cancelled,
        LadderOutcome::NoMatches { query } => {
            presenter.report_no_matches(&query, annotation_hint(&query));
            SearchOutcome::NoMatches { query }
        }
        LadderOutcome::Found { query, candidates } => {
            let selection = presenter.choose_reaction(&query, &candidates);
            SearchOutcome::Matched {
                query,
                candidates,
                selection,
            }
        }
    }
}

fn settle(
    result: Result<LadderOutcome, SearchError>,
    presenter: &mut dyn SearchPresenter,
) -> Result<SearchOutcome, SearchError> {
    match result {
        Ok(outcome) => Ok(present_outcome(outcome, presenter)),
        Err(err) => {
            error!(%err, "reaction search failed");
            presenter.report_search_error();
            Err(err)
        }
    }
}

/// Whether a failed query warrants the annotation hint: queries built from
/// bare labels carry neither a ChEBI prefix nor digits, which marks the
/// pathway as unannotated.
pub fn annotation_hint(query: &str) -> bool {
    !query.contains("CHEBI") && !query.chars().any(|c| c.is_ascii_digit())
}

/// Moves a prepared ladder onto a worker thread.
pub fn spawn_search(state: EscalationState, lookup: Arc<dyn ReactionLookup>) -> SearchHandle {
    let token = CancelToken::new();
    let worker_token = token.clone();
    let worker = std::thread::spawn(move || run_ladder(state, lookup.as_ref(), &worker_token));
    SearchHandle { token, worker }
}

pub struct SearchHandle {
    token: CancelToken,
    worker: JoinHandle<Result<LadderOutcome, SearchError>>,
}

impl SearchHandle {
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks for the worker and reports through the presenter.
    pub fn finish(self, presenter: &mut dyn SearchPresenter) -> Result<SearchOutcome, SearchError> {
        settle(self.join(), presenter)
    }

    /// Raw worker result, presenter-free.
    pub fn join(self) -> Result<LadderOutcome, SearchError> {
        match self.worker.join() {
            Ok(result) => result,
            Err(_) => Err(search_err(ErrorCode::Internal, "search worker panicked")),
        }
    }
}
