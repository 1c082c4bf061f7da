use crate::index::{validate_query, MatchResult};
use crate::retrieve::{
    CancellationToken, Lookup, RepeatQuery, RetrievalConfig, RetrievalOutcome, RetryPolicy, Verdict,
};
use crate::{Error, Result};

/// Phases of a retrieval session.
///
/// ```text
/// Init -> Searching -> Evaluating -+-> Accepted
///            ^                     +-> Exhausted
///            +---------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalState {
    Init,
    Searching,
    Evaluating,
    Accepted,
    Exhausted,
}

impl RetrievalState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted)
    }
}

/// Mutable per-session bookkeeping, owned by exactly one session.
#[derive(Debug, Clone)]
pub struct AttemptState {
    /// Original query; retries may issue rewritten text but results are
    /// always judged against this session
    pub query: String,
    /// Result of the most recent attempt, `None` if it failed
    pub last_result: Option<MatchResult>,
    /// Error of the most recent attempt, if it failed
    pub last_error: Option<String>,
    pub attempt_count: u32,
    pub confidence_threshold: f64,
    pub max_attempts: u32,
}

impl AttemptState {
    fn new(query: &str, config: RetrievalConfig) -> Self {
        Self {
            query: query.to_string(),
            last_result: None,
            last_error: None,
            attempt_count: 0,
            confidence_threshold: config.confidence_threshold,
            max_attempts: config.max_attempts,
        }
    }

    /// Score used for routing; a failed attempt counts as 0.0.
    #[must_use]
    pub fn routing_score(&self) -> f64 {
        self.last_result.as_ref().map_or(0.0, |r| r.score)
    }
}

/// Transition out of [`RetrievalState::Evaluating`].
///
/// Acceptance is checked before exhaustion, so a confident match on the last
/// allowed attempt is still accepted.
#[must_use]
pub fn decide(state: &AttemptState) -> RetrievalState {
    let confident =
        state.last_result.is_some() && state.routing_score() >= state.confidence_threshold;

    if confident {
        RetrievalState::Accepted
    } else if state.attempt_count >= state.max_attempts {
        RetrievalState::Exhausted
    } else {
        RetrievalState::Searching
    }
}

/// Bounded-retry retrieval for one query.
///
/// Drive it with [`step`](Self::step) to observe each transition, or call
/// [`run`](Self::run) to go straight to the verdict.
pub struct RetrievalSession<'a, L: Lookup + ?Sized> {
    lookup: &'a L,
    policy: Box<dyn RetryPolicy + 'a>,
    cancel: Option<CancellationToken>,
    state: AttemptState,
    phase: RetrievalState,
}

impl<'a, L: Lookup + ?Sized> RetrievalSession<'a, L> {
    /// Start a session in [`RetrievalState::Init`].
    ///
    /// Fails with [`Error::InvalidQuery`] for a blank query and
    /// [`Error::InvalidConfig`] for out-of-range settings.
    pub fn new(lookup: &'a L, query: &str, config: RetrievalConfig) -> Result<Self> {
        validate_query(query)?;
        config.validate()?;

        Ok(Self {
            lookup,
            policy: Box::new(RepeatQuery),
            cancel: None,
            state: AttemptState::new(query, config),
            phase: RetrievalState::Init,
        })
    }

    /// Replace the default [`RepeatQuery`] policy.
    #[must_use]
    pub fn with_policy(mut self, policy: impl RetryPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn phase(&self) -> RetrievalState {
        self.phase
    }

    #[must_use]
    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    /// Perform one transition and return the new phase.
    ///
    /// Terminal phases are absorbing. Cancellation is honoured before each
    /// lookup is dispatched.
    pub fn step(&mut self) -> Result<RetrievalState> {
        let next = match self.phase {
            RetrievalState::Init => {
                self.state.attempt_count = 0;
                RetrievalState::Searching
            }
            RetrievalState::Searching => {
                self.check_cancelled()?;
                self.attempt()?;
                RetrievalState::Evaluating
            }
            RetrievalState::Evaluating => {
                let next = decide(&self.state);
                tracing::debug!(
                    attempt = self.state.attempt_count,
                    max_attempts = self.state.max_attempts,
                    score = self.state.routing_score(),
                    threshold = self.state.confidence_threshold,
                    next = ?next,
                    "evaluated attempt"
                );
                next
            }
            terminal @ (RetrievalState::Accepted | RetrievalState::Exhausted) => terminal,
        };

        self.phase = next;
        Ok(next)
    }

    /// Drive the session to a terminal verdict.
    pub fn run(mut self) -> Result<RetrievalOutcome> {
        while !self.phase.is_terminal() {
            self.step()?;
        }
        Ok(self.into_outcome())
    }

    fn attempt(&mut self) -> Result<()> {
        let attempt = self.state.attempt_count + 1;
        let query = self
            .policy
            .next_query(&self.state.query, attempt, self.state.last_result.as_ref());

        tracing::debug!(attempt, query = %query, "searching");
        let result = self.lookup.lookup(&query);
        self.state.attempt_count = attempt;

        match result {
            Ok(found) => {
                self.state.last_result = Some(found);
                self.state.last_error = None;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    error = %e,
                    "lookup failed, counting as zero-score attempt"
                );
                self.state.last_result = None;
                self.state.last_error = Some(e.to_string());
            }
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                tracing::debug!(attempts = self.state.attempt_count, "retrieval cancelled");
                Err(Error::Cancelled {
                    attempts: self.state.attempt_count,
                })
            }
            _ => Ok(()),
        }
    }

    fn into_outcome(self) -> RetrievalOutcome {
        let verdict = match self.phase {
            RetrievalState::Accepted => Verdict::Accepted,
            _ => Verdict::Exhausted,
        };

        RetrievalOutcome {
            verdict,
            match_result: self.state.last_result,
            attempts_used: self.state.attempt_count,
            last_error: self.state.last_error,
        }
    }
}
