//! Jobs and results crossing the worker boundary

use crate::types::{MemberRating, TierId};
use crate::worker::token::WaitToken;
use tokio::sync::oneshot;

/// Result of looking a member up in a tier's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The row exists
    Found(MemberRating),
    /// The store confirmed there is no row
    Absent,
    /// The query failed; nothing is known about the member
    Failed,
}

/// Where the result of a lookup is delivered
#[derive(Debug)]
pub enum LookupReply {
    /// Deliver as a completion on the owner's completion queue
    Token(WaitToken),
    /// Deliver straight to a caller blocked on the other end
    Probe(oneshot::Sender<LookupOutcome>),
}

/// A unit of work for the query worker
#[derive(Debug)]
pub enum QueryJob {
    Lookup {
        tier: TierId,
        table: String,
        name: String,
        reply: LookupReply,
    },
    Insert {
        tier: TierId,
        table: String,
        member: MemberRating,
    },
    Update {
        tier: TierId,
        table: String,
        member: MemberRating,
    },
    /// Number of rows in a table
    Count {
        tier: TierId,
        table: String,
        reply: oneshot::Sender<Option<usize>>,
    },
    /// Number of rows ranked at or above `(rating, name)`
    Rank {
        tier: TierId,
        table: String,
        rating: i32,
        name: String,
        reply: oneshot::Sender<Option<usize>>,
    },
    /// Stop after every job queued before this one has run
    Shutdown,
}

impl QueryJob {
    /// Tier the job belongs to, if any
    pub fn tier(&self) -> Option<TierId> {
        match self {
            QueryJob::Lookup { tier, .. }
            | QueryJob::Insert { tier, .. }
            | QueryJob::Update { tier, .. }
            | QueryJob::Count { tier, .. }
            | QueryJob::Rank { tier, .. } => Some(*tier),
            QueryJob::Shutdown => None,
        }
    }

    /// Short job kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            QueryJob::Lookup { .. } => "lookup",
            QueryJob::Insert { .. } => "insert",
            QueryJob::Update { .. } => "update",
            QueryJob::Count { .. } => "count",
            QueryJob::Rank { .. } => "rank",
            QueryJob::Shutdown => "shutdown",
        }
    }
}

/// A finished asynchronous lookup, ready to be applied to its tier's cache
#[derive(Debug)]
pub struct Completion {
    pub tier: TierId,
    /// Table the lookup ran against
    pub table: String,
    pub name: String,
    pub outcome: LookupOutcome,
    pub token: WaitToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_tier_and_kind() {
        let job = QueryJob::Insert {
            tier: 3,
            table: "tier_ou".to_string(),
            member: MemberRating::new("ash"),
        };
        assert_eq!(job.tier(), Some(3));
        assert_eq!(job.kind(), "insert");

        assert_eq!(QueryJob::Shutdown.tier(), None);
        assert_eq!(QueryJob::Shutdown.kind(), "shutdown");
    }
}
