//! # Polls
//!
//! A poll is owned by its post. Invariant: `votes.len() == options.len()` and
//! `sum(votes) == |voted_by|`; each user votes once and cannot change the vote.

use crate::AgoraError;
use crate::primitives::MIN_POLL_OPTIONS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PollDocument")]
pub struct Poll {
    options: Vec<String>,
    votes: Vec<u64>,
    voted_by: BTreeSet<String>,
}

/// On-disk shape, validated before it becomes a `Poll`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollDocument {
    options: Vec<String>,
    votes: Vec<u64>,
    #[serde(default)]
    voted_by: BTreeSet<String>,
}

impl TryFrom<PollDocument> for Poll {
    type Error = String;

    fn try_from(doc: PollDocument) -> Result<Self, Self::Error> {
        if doc.votes.len() != doc.options.len() {
            return Err(format!(
                "poll has {} options but {} vote counters",
                doc.options.len(),
                doc.votes.len()
            ));
        }
        let total: u128 = doc.votes.iter().map(|v| u128::from(*v)).sum();
        if total != doc.voted_by.len() as u128 {
            return Err(format!(
                "poll counts {} votes but {} voters",
                total,
                doc.voted_by.len()
            ));
        }
        Ok(Self {
            options: doc.options,
            votes: doc.votes,
            voted_by: doc.voted_by,
        })
    }
}

impl Poll {
    /// Create a poll with zeroed counters.
    ///
    /// Labels are trimmed; fewer than two non-blank labels is rejected.
    pub fn new<I, S>(options: I) -> Result<Self, AgoraError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options: Vec<String> = options
            .into_iter()
            .map(|o| o.into().trim().to_string())
            .collect();

        if options.len() < MIN_POLL_OPTIONS || options.iter().any(String::is_empty) {
            return Err(AgoraError::InvalidArgument(format!(
                "A poll needs at least {} non-empty options",
                MIN_POLL_OPTIONS
            )));
        }

        let votes = vec![0; options.len()];
        Ok(Self {
            options,
            votes,
            voted_by: BTreeSet::new(),
        })
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn votes(&self) -> &[u64] {
        &self.votes
    }

    pub fn voted_by(&self) -> &BTreeSet<String> {
        &self.voted_by
    }

    pub fn has_voted(&self, username: &str) -> bool {
        self.voted_by.contains(username)
    }

    pub fn total_votes(&self) -> u64 {
        self.votes.iter().sum()
    }

    /// Record `username`'s vote for the option at `option`.
    pub fn vote(&mut self, username: &str, option: i64) -> Result<(), AgoraError> {
        let index = usize::try_from(option)
            .ok()
            .filter(|i| *i < self.options.len())
            .ok_or_else(|| AgoraError::InvalidArgument("Invalid option index".to_string()))?;

        if self.voted_by.contains(username) {
            return Err(AgoraError::Conflict(
                "User already voted in this poll".to_string(),
            ));
        }

        self.votes[index] = self.votes[index].saturating_add(1);
        self.voted_by.insert(username.to_string());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_poll_has_zeroed_counters() {
        let poll = Poll::new(["tea", "coffee"]).expect("poll");
        assert_eq!(poll.options(), ["tea", "coffee"]);
        assert_eq!(poll.votes(), [0, 0]);
        assert_eq!(poll.total_votes(), 0);
    }

    #[test]
    fn poll_needs_two_options() {
        assert!(matches!(
            Poll::new(["only"]),
            Err(AgoraError::InvalidArgument(_))
        ));
        assert!(matches!(
            Poll::new(["a", "  "]),
            Err(AgoraError::InvalidArgument(_))
        ));
    }

    #[test]
    fn vote_counts_once_per_user() {
        let mut poll = Poll::new(["a", "b", "c"]).expect("poll");
        poll.vote("bob", 1).expect("vote");

        let again = poll.vote("bob", 2);
        assert!(matches!(again, Err(AgoraError::Conflict(_))));
        assert_eq!(poll.votes(), [0, 1, 0]);
        assert_eq!(poll.total_votes(), poll.voted_by().len() as u64);
    }

    #[test]
    fn vote_rejects_out_of_range_index() {
        let mut poll = Poll::new(["a", "b"]).expect("poll");
        assert!(matches!(poll.vote("bob", -1), Err(AgoraError::InvalidArgument(_))));
        assert!(matches!(poll.vote("bob", 2), Err(AgoraError::InvalidArgument(_))));
        assert!(!poll.has_voted("bob"));
    }

    #[test]
    fn mismatched_document_is_rejected() {
        let json = r#"{"options":["a","b"],"votes":[1],"votedBy":["x"]}"#;
        assert!(serde_json::from_str::<Poll>(json).is_err());
    }

    #[test]
    fn counters_must_match_voters() {
        let inflated = r#"{"options":["a","b"],"votes":[2,1],"votedBy":["x","y"]}"#;
        assert!(serde_json::from_str::<Poll>(inflated).is_err());

        let missing_voters = r#"{"options":["a","b"],"votes":[0,1]}"#;
        assert!(serde_json::from_str::<Poll>(missing_voters).is_err());

        let consistent = r#"{"options":["a","b"],"votes":[1,1],"votedBy":["x","y"]}"#;
        let poll: Poll = serde_json::from_str(consistent).expect("consistent poll");
        assert_eq!(poll.total_votes(), 2);
    }
}
