//! Background query worker
//!
//! All store traffic issued while tiers are serving requests goes through a
//! single dedicated thread draining one FIFO job queue. Results that belong
//! in a tier's member cache come back as completions tagged with a
//! `WaitToken`; the owning side applies them and fires the registered
//! continuation.

pub mod job;
pub mod query_worker;
pub mod token;

// Re-export commonly used types
pub use job::{Completion, LookupOutcome, LookupReply, QueryJob};
pub use query_worker::{QueryHandle, QueryWorker};
pub use token::{WaitToken, WaitTokenPool};
