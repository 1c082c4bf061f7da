use crate::index::MatchResult;

/// Chooses the query text to issue for each attempt.
///
/// Scoring and the session's recorded query always use the original text;
/// only the lookup sees the rewritten one.
pub trait RetryPolicy: Send + Sync {
    /// `attempt` is 1-based. `previous` is the last attempt's result, `None`
    /// on the first attempt or after a failed one.
    fn next_query(&self, original: &str, attempt: u32, previous: Option<&MatchResult>) -> String;
}

/// Re-issues the original query unchanged on every attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatQuery;

impl RetryPolicy for RepeatQuery {
    fn next_query(&self, original: &str, _attempt: u32, _previous: Option<&MatchResult>) -> String {
        original.to_string()
    }
}

impl<F> RetryPolicy for F
where
    F: Fn(&str, u32, Option<&MatchResult>) -> String + Send + Sync,
{
    fn next_query(&self, original: &str, attempt: u32, previous: Option<&MatchResult>) -> String {
        self(original, attempt, previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_query_is_identity() {
        let policy = RepeatQuery;
        for attempt in 1..=3 {
            assert_eq!(policy.next_query("Where did I study?", attempt, None), "Where did I study?");
        }
    }

    #[test]
    fn test_closure_policy() {
        let policy = |q: &str, attempt: u32, _: Option<&MatchResult>| format!("{q} #{attempt}");
        assert_eq!(policy.next_query("phone", 2, None), "phone #2");
    }
}
