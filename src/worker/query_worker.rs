//! The dedicated query worker thread and its submission handle

use crate::error::{Result, TierError};
use crate::store::MemberStore;
use crate::types::{MemberRating, TierId};
use crate::worker::job::{Completion, LookupOutcome, LookupReply, QueryJob};
use crate::worker::token::{WaitToken, WaitTokenPool};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

const WORKER_THREAD_NAME: &str = "tier-query-worker";

/// Cloneable submission side of the query worker
#[derive(Debug, Clone)]
pub struct QueryHandle {
    jobs: UnboundedSender<QueryJob>,
    tokens: WaitTokenPool,
}

impl QueryHandle {
    /// Queue a job behind everything already submitted
    pub fn submit(&self, job: QueryJob) -> Result<()> {
        self.jobs
            .send(job)
            .map_err(|_| TierError::WorkerUnavailable.into())
    }

    pub fn tokens(&self) -> &WaitTokenPool {
        &self.tokens
    }

    /// Queue a lookup whose result comes back as a completion.
    ///
    /// Returns the id of the token the completion will carry.
    pub fn lookup_async(&self, tier: TierId, table: &str, name: &str) -> Result<u64> {
        let token = self.tokens.acquire();
        let id = token.id();
        let job = QueryJob::Lookup {
            tier,
            table: table.to_string(),
            name: name.to_string(),
            reply: LookupReply::Token(token),
        };

        if let Err(e) = self.jobs.send(job) {
            if let QueryJob::Lookup {
                reply: LookupReply::Token(token),
                ..
            } = e.0
            {
                self.tokens.release(token);
            }
            return Err(TierError::WorkerUnavailable.into());
        }
        Ok(id)
    }

    /// Look a member up and block until the worker answers.
    ///
    /// The lookup is queued like any other job, so it observes every write
    /// submitted before it. Must not be called from inside an async runtime.
    pub fn probe_member(&self, tier: TierId, table: &str, name: &str) -> LookupOutcome {
        let (reply, answer) = oneshot::channel();
        let job = QueryJob::Lookup {
            tier,
            table: table.to_string(),
            name: name.to_string(),
            reply: LookupReply::Probe(reply),
        };
        if self.submit(job).is_err() {
            return LookupOutcome::Failed;
        }
        answer.blocking_recv().unwrap_or(LookupOutcome::Failed)
    }

    /// Count a table's rows, blocking until the worker answers.
    ///
    /// Must not be called from inside an async runtime.
    pub fn count(&self, tier: TierId, table: &str) -> Option<usize> {
        let (reply, answer) = oneshot::channel();
        self.submit(QueryJob::Count {
            tier,
            table: table.to_string(),
            reply,
        })
        .ok()?;
        answer.blocking_recv().ok().flatten()
    }

    /// Count rows ranked at or above `(rating, name)`, blocking until the
    /// worker answers. Must not be called from inside an async runtime.
    pub fn rank(&self, tier: TierId, table: &str, rating: i32, name: &str) -> Option<usize> {
        let (reply, answer) = oneshot::channel();
        self.submit(QueryJob::Rank {
            tier,
            table: table.to_string(),
            rating,
            name: name.to_string(),
            reply,
        })
        .ok()?;
        answer.blocking_recv().ok().flatten()
    }

    /// Queue a row write; nothing waits for it
    pub fn write_member(
        &self,
        tier: TierId,
        table: &str,
        member: MemberRating,
        is_new: bool,
    ) -> Result<()> {
        let table = table.to_string();
        let job = if is_new {
            QueryJob::Insert { tier, table, member }
        } else {
            QueryJob::Update { tier, table, member }
        };
        self.submit(job)
    }
}

/// Owner of the worker thread and of the completion queue it feeds
#[derive(Debug)]
pub struct QueryWorker {
    handle: QueryHandle,
    completions: UnboundedReceiver<Completion>,
    thread: Option<JoinHandle<()>>,
}

impl QueryWorker {
    /// Start the worker thread against `store`
    pub fn spawn(store: Arc<dyn MemberStore>) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(store, jobs_rx, completions_tx))
            .map_err(|e| TierError::InternalError {
                message: format!("Failed to spawn query worker: {}", e),
            })?;

        Ok(Self {
            handle: QueryHandle {
                jobs: jobs_tx,
                tokens: WaitTokenPool::new(),
            },
            completions: completions_rx,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> QueryHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Take the next completion if one is ready
    pub fn try_next_completion(&mut self) -> Option<Completion> {
        self.completions.try_recv().ok()
    }

    /// Wait for the next completion.
    ///
    /// Returns `None` once the worker has stopped and every completion has
    /// been taken.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions.recv().await
    }

    /// Block the current thread until the next completion arrives.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait_completion(&mut self) -> Option<Completion> {
        self.completions.blocking_recv()
    }

    /// Run every queued job, then stop and join the worker thread
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        // A send error means the thread is already gone; join regardless
        let _ = self.handle.jobs.send(QueryJob::Shutdown);
        thread.join().map_err(|_| TierError::InternalError {
            message: "Query worker panicked".to_string(),
        })?;
        Ok(())
    }
}

impl Drop for QueryWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Query worker shutdown failed: {}", e);
        }
    }
}

fn run(
    store: Arc<dyn MemberStore>,
    mut jobs: UnboundedReceiver<QueryJob>,
    completions: UnboundedSender<Completion>,
) {
    info!("Query worker started");
    let mut executed: u64 = 0;

    while let Some(job) = jobs.blocking_recv() {
        if let QueryJob::Shutdown = job {
            break;
        }
        debug!("Executing {} job for tier {:?}", job.kind(), job.tier());
        execute(store.as_ref(), job, &completions);
        executed += 1;
    }

    info!("Query worker stopped after {} jobs", executed);
}

fn execute(store: &dyn MemberStore, job: QueryJob, completions: &UnboundedSender<Completion>) {
    match job {
        QueryJob::Lookup {
            tier,
            table,
            name,
            reply,
        } => {
            let outcome = match store.select_member(&table, &name) {
                Ok(Some(member)) => LookupOutcome::Found(member),
                Ok(None) => LookupOutcome::Absent,
                Err(e) => {
                    error!("Lookup of '{}' in {} failed: {}", name, table, e);
                    LookupOutcome::Failed
                }
            };

            match reply {
                LookupReply::Token(token) => {
                    send_completion(
                        completions,
                        Completion {
                            tier,
                            table,
                            name,
                            outcome,
                            token,
                        },
                    );
                }
                LookupReply::Probe(reply) => {
                    let _ = reply.send(outcome);
                }
            }
        }
        QueryJob::Insert { table, member, .. } => {
            if let Err(e) = store.insert_member(&table, &member) {
                error!("Insert of '{}' into {} failed: {}", member.name, table, e);
            }
        }
        QueryJob::Update { table, member, .. } => {
            if let Err(e) = store.update_member(&table, &member) {
                error!("Update of '{}' in {} failed: {}", member.name, table, e);
            }
        }
        QueryJob::Count { table, reply, .. } => {
            let count = store
                .count_members(&table)
                .map_err(|e| error!("Count of {} failed: {}", table, e))
                .ok();
            let _ = reply.send(count);
        }
        QueryJob::Rank {
            table,
            rating,
            name,
            reply,
            ..
        } => {
            let rank = store
                .count_ranked_at_or_above(&table, rating, &name)
                .map_err(|e| error!("Ranking of '{}' in {} failed: {}", name, table, e))
                .ok();
            let _ = reply.send(rank);
        }
        QueryJob::Shutdown => {}
    }
}

fn send_completion(completions: &UnboundedSender<Completion>, completion: Completion) {
    if let Err(e) = completions.send(completion) {
        debug!(
            "Dropping completion for '{}': owner is gone",
            e.0.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryMemberStore, MockMemberStore, StoreCall};

    fn store_with_ladder() -> Arc<MockMemberStore> {
        let store = Arc::new(MockMemberStore::new());
        store
            .preset_members(
                "tier_ou",
                &[
                    MemberRating::with_values("ash", 1200, 3),
                    MemberRating::with_values("misty", 1000, 0),
                ],
            )
            .unwrap();
        store.clear_calls();
        store
    }

    #[test]
    fn test_probe_member() {
        let store = store_with_ladder();
        let mut worker = QueryWorker::spawn(store.clone()).unwrap();
        let handle = worker.handle();

        assert_eq!(
            handle.probe_member(1, "tier_ou", "ash"),
            LookupOutcome::Found(MemberRating::with_values("ash", 1200, 3))
        );
        assert_eq!(handle.probe_member(1, "tier_ou", "gary"), LookupOutcome::Absent);
        assert_eq!(handle.probe_member(1, "tier_nope", "ash"), LookupOutcome::Failed);
        assert_eq!(store.select_count(), 3);

        worker.shutdown().unwrap();
    }

    #[test]
    fn test_async_lookup_produces_completion() {
        let store = store_with_ladder();
        let mut worker = QueryWorker::spawn(store).unwrap();
        let handle = worker.handle();

        let token_id = handle.lookup_async(7, "tier_ou", "misty").unwrap();
        let completion = worker.wait_completion().unwrap();

        assert_eq!(completion.tier, 7);
        assert_eq!(completion.token.id(), token_id);
        assert_eq!(
            completion.outcome,
            LookupOutcome::Found(MemberRating::with_values("misty", 1000, 0))
        );
        assert_eq!(handle.tokens().in_use(), 1);
        handle.tokens().release(completion.token);
        assert_eq!(handle.tokens().in_use(), 0);
    }

    #[test]
    fn test_jobs_run_in_submission_order() {
        let store = store_with_ladder();
        let mut worker = QueryWorker::spawn(store.clone()).unwrap();
        let handle = worker.handle();

        handle
            .write_member(1, "tier_ou", MemberRating::with_values("ash", 1250, 4), false)
            .unwrap();
        handle
            .write_member(1, "tier_ou", MemberRating::with_values("gary", 1100, 1), true)
            .unwrap();
        let first = handle.lookup_async(1, "tier_ou", "ash").unwrap();
        let second = handle.lookup_async(1, "tier_ou", "gary").unwrap();

        let a = worker.wait_completion().unwrap();
        let b = worker.wait_completion().unwrap();
        assert_eq!(a.token.id(), first);
        assert_eq!(b.token.id(), second);
        assert_eq!(
            a.outcome,
            LookupOutcome::Found(MemberRating::with_values("ash", 1250, 4))
        );
        assert_eq!(
            b.outcome,
            LookupOutcome::Found(MemberRating::with_values("gary", 1100, 1))
        );

        let calls = store.calls();
        assert!(matches!(calls[0], StoreCall::Update { .. }));
        assert!(matches!(calls[1], StoreCall::Insert { .. }));
    }

    #[test]
    fn test_count_and_rank() {
        let store = store_with_ladder();
        let worker = QueryWorker::spawn(store).unwrap();
        let handle = worker.handle();

        assert_eq!(handle.count(1, "tier_ou"), Some(2));
        assert_eq!(handle.rank(1, "tier_ou", 1200, "ash"), Some(1));
        assert_eq!(handle.rank(1, "tier_ou", 1000, "misty"), Some(2));
        assert_eq!(handle.count(1, "tier_nope"), None);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let store = Arc::new(InMemoryMemberStore::new());
        store.ensure_table("tier_ou").unwrap();
        let mut worker = QueryWorker::spawn(store.clone()).unwrap();
        let handle = worker.handle();

        for i in 0..50 {
            handle
                .write_member(1, "tier_ou", MemberRating::new(&format!("p{}", i)), true)
                .unwrap();
        }
        worker.shutdown().unwrap();

        assert!(!worker.is_running());
        assert_eq!(store.count_members("tier_ou").unwrap(), 50);
        assert!(handle.probe_member(1, "tier_ou", "p1") == LookupOutcome::Failed);
        assert!(handle.lookup_async(1, "tier_ou", "p1").is_err());
        assert_eq!(handle.tokens().in_use(), 0);
    }

    #[test]
    fn test_completion_future_outside_runtime() {
        let store = store_with_ladder();
        let mut worker = QueryWorker::spawn(store).unwrap();
        let handle = worker.handle();

        handle
            .write_member(3, "tier_ou", MemberRating::with_values("gary", 1050, 1), true)
            .unwrap();
        handle.lookup_async(3, "tier_ou", "gary").unwrap();

        let completion = tokio_test::block_on(worker.next_completion()).unwrap();
        assert_eq!(
            completion.outcome,
            LookupOutcome::Found(MemberRating::with_values("gary", 1050, 1))
        );
        handle.tokens().release(completion.token);

        worker.shutdown().unwrap();
        assert!(tokio_test::block_on(worker.next_completion()).is_none());
    }

    #[tokio::test]
    async fn test_completion_can_be_awaited() {
        let store = store_with_ladder();
        let mut worker = QueryWorker::spawn(store).unwrap();
        let handle = worker.handle();

        handle.lookup_async(2, "tier_ou", "gary").unwrap();
        let completion = worker.next_completion().await.unwrap();
        assert_eq!(completion.outcome, LookupOutcome::Absent);
        handle.tokens().release(completion.token);
    }
}
