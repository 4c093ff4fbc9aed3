//! A single competitive tier: its legality rules and its ladder
//!
//! Member standings are served from the tier's cache. A miss is resolved in
//! one of two ways:
//!
//! - read queries (`exists`, `rating`, `ranking`, `change_rating`) probe the
//!   store through the worker and block until it answers;
//! - `load_member_in_memory` queues the lookup and returns at once; the
//!   continuation fires when the completion is applied.
//!
//! Both paths run through the same FIFO queue as pending writes, so a
//! lookup never observes a store older than the cache.

use crate::dex::Dex;
use crate::rating::{apply_result, point_change_estimate, PointChange};
use crate::tier::banned::{BannedSet, TierDefinition};
use crate::tier::cache::MemberCache;
use crate::types::{MemberRating, PokeSlot, Team, TierId, DEFAULT_RATING};
use crate::utils::{normalize_name, table_name};
use crate::worker::{Completion, LookupOutcome, QueryHandle};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, warn};

/// Callback fired once a member is resolved in the tier's cache
pub type Continuation = Box<dyn FnOnce(&mut Tier) + Send>;

/// Resolves tier names to tiers at the time of use
pub trait TierLookup {
    fn tier(&self, name: &str) -> Option<&Tier>;
}

/// A continuation waiting on a queued lookup
struct PendingLoad {
    continuation: Continuation,
    /// Write sequence number when the lookup was queued
    queued_at: u64,
}

/// Outcome of recording a battle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingUpdate {
    pub winner: MemberRating,
    pub loser: MemberRating,
}

pub struct Tier {
    id: TierId,
    name: String,
    parent: Option<String>,
    banned: BannedSet,
    table: String,
    cache: MemberCache,
    pending: HashMap<u64, PendingLoad>,
    /// Bumped on every member write
    write_seq: u64,
    /// Sequence number of the last write per member, kept while lookups are
    /// in flight
    written_at: HashMap<String, u64>,
    queries: QueryHandle,
}

impl Tier {
    /// Create an empty tier with no name, parent or bans
    pub fn new(id: TierId, queries: QueryHandle, cache_capacity: usize) -> Self {
        Self {
            id,
            name: String::new(),
            parent: None,
            banned: BannedSet::new(),
            table: table_name(""),
            cache: MemberCache::new(cache_capacity),
            pending: HashMap::new(),
            write_seq: 0,
            written_at: HashMap::new(),
            queries,
        }
    }

    /// Create a tier from a parsed definition
    pub fn from_definition(
        id: TierId,
        definition: TierDefinition,
        queries: QueryHandle,
        cache_capacity: usize,
    ) -> Self {
        let mut tier = Self::new(id, queries, cache_capacity);
        tier.apply_definition(definition);
        tier
    }

    pub fn id(&self) -> TierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn banned(&self) -> &BannedSet {
        &self.banned
    }

    /// Backing table of the tier's ladder
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn cache(&self) -> &MemberCache {
        &self.cache
    }

    /// Continuations waiting on the worker
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Rename the tier. The ladder moves to the table of the new name, so
    /// the cache is dropped.
    pub fn change_name(&mut self, name: &str) {
        let name = name.trim();
        let table = table_name(name);
        if table != self.table {
            self.cache.clean_cache();
        }
        self.name = name.to_string();
        self.table = table;
    }

    /// Replace name, parent and bans in one step
    pub fn apply_definition(&mut self, definition: TierDefinition) {
        self.change_name(&definition.name);
        self.parent = definition.parent;
        self.banned = definition.banned;
    }

    pub fn definition(&self) -> TierDefinition {
        TierDefinition {
            name: self.name.clone(),
            parent: self.parent.clone(),
            banned: self.banned.clone(),
        }
    }

    /// Configuration line of this tier
    pub fn to_config_string(&self, dex: &Dex) -> String {
        self.definition().format(dex)
    }

    /// Reconfigure from a configuration line
    pub fn load_config_string(&mut self, line: &str, dex: &Dex) {
        self.apply_definition(TierDefinition::parse(line, dex));
    }

    /// Whether the slot is banned here or in any ancestor tier
    pub fn is_banned(&self, slot: &PokeSlot, tiers: &dyn TierLookup) -> bool {
        if self.banned.bans(slot) {
            return true;
        }

        match self.parent.as_deref().and_then(|parent| tiers.tier(parent)) {
            Some(parent) => parent.is_banned(slot, tiers),
            None => false,
        }
    }

    /// Whether no occupied slot of the team is banned
    pub fn is_valid(&self, team: &Team, tiers: &dyn TierLookup) -> bool {
        team.members().all(|slot| !self.is_banned(slot, tiers))
    }

    pub fn is_in_memory(&self, name: &str) -> bool {
        self.cache.is_in_memory(name)
    }

    /// Evict every cached member
    pub fn clean_cache(&mut self) {
        self.cache.clean_cache();
    }

    /// Resolve a member into the cache, querying the store on a miss
    fn probe(&mut self, name: &str) {
        if self.cache.is_in_memory(name) {
            return;
        }
        let key = normalize_name(name);
        let outcome = self.queries.probe_member(self.id, &self.table, &key);
        self.apply_lookup(&key, outcome);
    }

    fn apply_lookup(&mut self, name: &str, outcome: LookupOutcome) {
        // The cache is never older than the store; keep what is there.
        if self.cache.is_in_memory(name) {
            return;
        }
        match outcome {
            LookupOutcome::Found(member) => self.cache.add_member_in_memory(member),
            LookupOutcome::Absent => self.cache.add_non_existent(name),
            LookupOutcome::Failed => {
                warn!("Could not resolve '{}' in tier {}", name, self.name);
            }
        }
    }

    pub fn exists(&mut self, name: &str) -> bool {
        self.probe(name);
        self.cache.exists(name)
    }

    /// Standing of a member, defaulted if the member was never recorded
    pub fn member(&mut self, name: &str) -> MemberRating {
        self.probe(name);
        self.cache
            .member(name)
            .cloned()
            .unwrap_or_else(|| MemberRating::new(name))
    }

    pub fn rating(&mut self, name: &str) -> i32 {
        if self.exists(name) {
            self.member(name).rating
        } else {
            DEFAULT_RATING
        }
    }

    /// 1-based ladder position, ties broken by name; -1 if not on the ladder
    pub fn ranking(&mut self, name: &str) -> i32 {
        if !self.exists(name) {
            return -1;
        }
        let rating = self.rating(name);
        match self
            .queries
            .rank(self.id, &self.table, rating, &normalize_name(name))
        {
            Some(rank) => rank as i32,
            None => -1,
        }
    }

    /// Number of members recorded in the store
    pub fn count(&self) -> usize {
        self.queries.count(self.id, &self.table).unwrap_or(0)
    }

    /// Preview the (win, loss) deltas `player` would get against `foe`
    pub fn point_change_estimate(&mut self, player: &str, foe: &str) -> PointChange {
        let player = self.member(player);
        let foe = self.member(foe);
        point_change_estimate(player.rating, foe.rating, player.matches)
    }

    /// Record a battle result and queue both rows for persistence
    pub fn change_rating(&mut self, winner: &str, loser: &str) -> RatingUpdate {
        let (before_winner, new_winner) = self.resolve_for_write(winner);
        let (before_loser, new_loser) = self.resolve_for_write(loser);

        if before_winner.name == before_loser.name {
            warn!(
                "Ignoring battle of '{}' against itself in tier {}",
                before_winner.name, self.name
            );
            return RatingUpdate {
                winner: before_winner,
                loser: before_loser,
            };
        }

        let (after_winner, after_loser) = apply_result(&before_winner, &before_loser);
        debug!(
            "Tier {}: {} {} -> {}, {} {} -> {}",
            self.name,
            after_winner.name,
            before_winner.rating,
            after_winner.rating,
            after_loser.name,
            before_loser.rating,
            after_loser.rating
        );

        self.update_member(after_winner.clone(), new_winner);
        self.update_member(after_loser.clone(), new_loser);

        RatingUpdate {
            winner: after_winner,
            loser: after_loser,
        }
    }

    /// Overwrite a member's rating
    pub fn set_rating(&mut self, name: &str, rating: i32) -> MemberRating {
        let (mut member, is_new) = self.resolve_for_write(name);
        member.rating = rating;
        self.update_member(member.clone(), is_new);
        member
    }

    /// Current standing of a member about to be written, and whether the
    /// write is an insert. A failed lookup is retried once, so a transient
    /// store error does not turn an existing row into a duplicate insert.
    fn resolve_for_write(&mut self, name: &str) -> (MemberRating, bool) {
        self.probe(name);
        if !self.cache.is_in_memory(name) {
            self.probe(name);
        }
        match self.cache.member(name) {
            Some(member) => (member.clone(), false),
            None => (MemberRating::new(name), true),
        }
    }

    fn update_member(&mut self, member: MemberRating, is_new: bool) {
        if !self.pending.is_empty() {
            self.write_seq += 1;
            self.written_at.insert(member.name.clone(), self.write_seq);
        }
        self.cache.add_member_in_memory(member.clone());
        if let Err(e) = self
            .queries
            .write_member(self.id, &self.table, member, is_new)
        {
            error!("Failed to queue write for tier {}: {}", self.name, e);
        }
    }

    /// Make sure `name` is resolved in the cache, then fire `continuation`.
    ///
    /// If the member is already in memory the continuation fires before this
    /// returns. Otherwise the cache is cleared, a lookup is queued and the
    /// continuation fires when its completion is applied.
    pub fn load_member_in_memory(
        &mut self,
        name: &str,
        continuation: Continuation,
    ) -> crate::error::Result<()> {
        let key = normalize_name(name);

        if self.cache.is_in_memory(&key) {
            let token = self.queries.tokens().acquire();
            continuation(self);
            self.queries.tokens().release(token);
            return Ok(());
        }

        self.cache.clean_cache();
        let token = self.queries.lookup_async(self.id, &self.table, &key)?;
        self.pending.insert(
            token,
            PendingLoad {
                continuation,
                queued_at: self.write_seq,
            },
        );
        Ok(())
    }

    /// Apply a finished lookup and fire the continuation waiting on it
    pub fn complete(&mut self, completion: Completion) {
        let Completion {
            table,
            name,
            outcome,
            token,
            ..
        } = completion;

        let pending = self.pending.remove(&token.id());
        self.queries.tokens().release(token);

        // A member written after the lookup was queued has a newer row than
        // the one the lookup read
        let written_since = match (&pending, self.written_at.get(&name)) {
            (Some(load), Some(&written)) => written > load.queued_at,
            _ => false,
        };

        if table != self.table {
            debug!(
                "Discarding lookup of '{}' from {}: tier {} now uses {}",
                name, table, self.name, self.table
            );
        } else if written_since {
            debug!(
                "Discarding lookup of '{}' in tier {}: written since it was queued",
                name, self.name
            );
        } else {
            self.apply_lookup(&name, outcome);
        }

        if self.pending.is_empty() {
            self.written_at.clear();
        }

        match pending {
            Some(load) => (load.continuation)(self),
            None => warn!("No continuation registered for lookup of '{}'", name),
        }
    }
}

impl fmt::Debug for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tier")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("banned", &self.banned.len())
            .field("table", &self.table)
            .field("cached", &self.cache.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
