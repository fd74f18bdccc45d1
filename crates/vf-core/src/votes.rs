//! # Votes
//!
//! A user holds at most one vote per target. Voting the same value again
//! retracts it, voting the other value flips it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum VoteValue {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVote(pub i64);

impl fmt::Display for InvalidVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vote value must be 1 or -1, got {}", self.0)
    }
}

impl std::error::Error for InvalidVote {}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        value.as_i64() as i8
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVote;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(InvalidVote(other)),
        }
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = InvalidVote;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        VoteValue::try_from(i64::from(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(Uuid),
    Comment(Uuid),
}

impl VoteTarget {
    pub fn id(self) -> Uuid {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post",
            VoteTarget::Comment(_) => "comment",
        }
    }
}

/// What the store has to do with the (target, user) vote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Insert(VoteValue),
    Update(VoteValue),
    Retract,
}

impl VoteChange {
    pub fn resolve(existing: Option<VoteValue>, requested: VoteValue) -> Self {
        match existing {
            Some(current) if current == requested => VoteChange::Retract,
            Some(_) => VoteChange::Update(requested),
            None => VoteChange::Insert(requested),
        }
    }

    /// The user's vote once the change is applied.
    pub fn resulting_value(self) -> Option<VoteValue> {
        match self {
            VoteChange::Insert(value) | VoteChange::Update(value) => Some(value),
            VoteChange::Retract => None,
        }
    }

    /// True when the change produces an upvote that did not exist before.
    pub fn casts_new_upvote(self) -> bool {
        matches!(
            self,
            VoteChange::Insert(VoteValue::Up) | VoteChange::Update(VoteValue::Up)
        )
    }
}

/// Last known counts for a target as seen by one user. Clients apply a
/// requested vote to it for an immediate tentative display and replace it
/// with the server's answer once it arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub upvotes: u64,
    pub downvotes: u64,
    pub user_vote: Option<VoteValue>,
}

impl VoteTally {
    pub fn apply(self, requested: VoteValue) -> Self {
        let mut next = self;
        match next.user_vote {
            Some(VoteValue::Up) => next.upvotes = next.upvotes.saturating_sub(1),
            Some(VoteValue::Down) => next.downvotes = next.downvotes.saturating_sub(1),
            None => {}
        }
        next.user_vote = VoteChange::resolve(self.user_vote, requested).resulting_value();
        match next.user_vote {
            Some(VoteValue::Up) => next.upvotes += 1,
            Some(VoteValue::Down) => next.downvotes += 1,
            None => {}
        }
        next
    }

    pub fn balance(self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}
