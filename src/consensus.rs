// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Majority-vote querying of an external network.
//!
//! A query function is run `redundancy` times concurrently. Every attempt
//! carries its own timeout, and any failure (error, timeout, or a JSON
//! `null` answer) becomes the "no answer" sentinel. All attempts are awaited
//! before voting. Each outcome is reduced to a canonical JSON string, equal
//! strings are tallied, and the highest tally wins. Ties go to the outcome
//! first seen in attempt order, not completion order.
//!
//! `None` is a valid result: it means most attempts produced no answer.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

/// Attempts per query unless overridden.
pub const DEFAULT_REDUNDANCY: usize = 3;

/// Per-attempt timeout unless overridden.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Canonical form of the sentinel.
const NO_ANSWER: &str = "null";

#[derive(Debug, Clone)]
pub struct ConsensusClient {
    redundancy: usize,
    attempt_timeout: Duration,
}

impl Default for ConsensusClient {
    fn default() -> Self {
        Self::new(DEFAULT_REDUNDANCY, DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl ConsensusClient {
    /// A redundancy of zero is raised to one.
    pub fn new(redundancy: usize, attempt_timeout: Duration) -> Self {
        Self {
            redundancy: redundancy.max(1),
            attempt_timeout,
        }
    }

    pub fn redundancy(&self) -> usize {
        self.redundancy
    }

    /// Run `attempt` with the configured redundancy and return the majority.
    pub async fn query<T, E, F, Fut>(&self, attempt: F) -> Option<T>
    where
        T: Serialize,
        E: Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.query_n(attempt, self.redundancy).await
    }

    /// Run `attempt` `redundancy` times and return the majority.
    pub async fn query_n<T, E, F, Fut>(&self, attempt: F, redundancy: usize) -> Option<T>
    where
        T: Serialize,
        E: Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let timeout = self.attempt_timeout;
        let attempts = (0..redundancy.max(1)).map(|index| {
            let fut = attempt();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(Ok(value)) => Some(value),
                    Ok(Err(e)) => {
                        debug!(attempt = index, error = %e, "Consensus attempt failed");
                        None
                    }
                    Err(_) => {
                        debug!(attempt = index, ?timeout, "Consensus attempt timed out");
                        None
                    }
                }
            }
        });

        let outcomes = join_all(attempts).await;
        majority(outcomes)
    }
}

/// Canonical comparable form of one outcome.
fn canonical<T: Serialize>(outcome: &Option<T>) -> String {
    match outcome {
        None => NO_ANSWER.to_string(),
        // Value maps are ordered, so key order in the source never matters.
        Some(value) => serde_json::to_value(value)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| NO_ANSWER.to_string()),
    }
}

/// Pick the most frequent outcome; ties go to the lowest index.
pub fn majority<T: Serialize>(outcomes: Vec<Option<T>>) -> Option<T> {
    let keys: Vec<String> = outcomes.iter().map(canonical).collect();

    // key -> (count, first index)
    let mut tally: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, key) in keys.iter().enumerate() {
        tally
            .entry(key.as_str())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, index));
    }

    let (winner_key, winner_index) = tally
        .iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(key, (_, first))| (*key, *first))?;

    if winner_key == NO_ANSWER {
        debug!(attempts = keys.len(), "No majority answer");
        return None;
    }

    outcomes.into_iter().nth(winner_index).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Answer {
        value: String,
    }

    fn a(v: &str) -> Result<Answer, String> {
        Ok(Answer { value: v.into() })
    }

    fn fail() -> Result<Answer, String> {
        Err("upstream error".into())
    }

    /// Run a scripted query: attempt `i` yields `script[i]`.
    async fn scripted(script: Vec<Result<Answer, String>>) -> (Option<Answer>, usize) {
        let client = ConsensusClient::new(script.len(), Duration::from_secs(1));
        let calls = AtomicUsize::new(0);
        let result = client
            .query(|| {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                let outcome = script[i].clone();
                async move { outcome }
            })
            .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn majority_wins() {
        let (result, calls) = scripted(vec![a("A"), a("B"), a("A")]).await;
        assert_eq!(result, Some(Answer { value: "A".into() }));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn three_way_tie_picks_first_index() {
        let (result, _) = scripted(vec![a("A"), a("B"), a("C")]).await;
        assert_eq!(result.unwrap().value, "A");
    }

    #[tokio::test]
    async fn majority_of_failures_is_no_answer() {
        let (result, calls) = scripted(vec![fail(), fail(), a("A")]).await;
        assert_eq!(result, None);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn later_majority_beats_first_value() {
        let (result, _) = scripted(vec![a("A"), a("B"), a("B")]).await;
        assert_eq!(result.unwrap().value, "B");
    }

    #[tokio::test]
    async fn single_failure_is_outvoted() {
        let (result, _) = scripted(vec![fail(), a("A"), a("A")]).await;
        assert_eq!(result.unwrap().value, "A");
    }

    #[tokio::test]
    async fn tie_break_ignores_completion_order() {
        let client = ConsensusClient::new(3, Duration::from_secs(1));
        let calls = AtomicUsize::new(0);
        let result = client
            .query(|| {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    // The first attempt finishes last.
                    if i == 0 {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Ok::<_, String>(Answer {
                        value: format!("v{i}"),
                    })
                }
            })
            .await;
        assert_eq!(result.unwrap().value, "v0");
    }

    #[tokio::test]
    async fn slow_attempt_times_out_without_blocking_others() {
        let client = ConsensusClient::new(3, Duration::from_millis(100));
        let calls = AtomicUsize::new(0);
        let started = Instant::now();
        let result = client
            .query(|| {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if i == 0 {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                    Ok::<_, String>(Answer { value: "A".into() })
                }
            })
            .await;

        assert_eq!(result.unwrap().value, "A");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn json_null_answers_count_as_no_answer() {
        let client = ConsensusClient::default();
        let calls = AtomicUsize::new(0);
        let result = client
            .query(|| {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let value = if i == 2 {
                        serde_json::json!({"balance": 5})
                    } else {
                        serde_json::Value::Null
                    };
                    Ok::<_, String>(value)
                }
            })
            .await;
        assert_eq!(result, None);
    }

    #[test]
    fn canonical_form_ignores_key_order() {
        let x: serde_json::Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let y: serde_json::Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        let winner = majority(vec![Some(x.clone()), None, Some(y)]);
        assert_eq!(winner, Some(x));
    }

    #[test]
    fn zero_redundancy_is_raised_to_one() {
        assert_eq!(ConsensusClient::new(0, DEFAULT_ATTEMPT_TIMEOUT).redundancy(), 1);
    }

    #[test]
    fn empty_outcomes_yield_no_answer() {
        assert_eq!(majority::<Answer>(Vec::new()), None);
    }
}
