//! Registry of all tiers and owner of the query worker
//!
//! Tiers refer to their parent by name only. The registry resolves that name
//! each time a legality check climbs the hierarchy, so reconfiguring one tier
//! takes effect for every tier below it without rebuilding them. The parent
//! graph is checked for cycles whenever definitions change.

use crate::config::AppConfig;
use crate::dex::Dex;
use crate::error::{Result, TierError};
use crate::rating::PointChange;
use crate::store::{import_seed_file, open_store, MemberStore};
use crate::tier::banned::TierDefinition;
use crate::tier::cache::DEFAULT_CACHE_CAPACITY;
use crate::tier::instance::{Continuation, RatingUpdate, Tier, TierLookup};
use crate::types::{MemberRating, PokeSlot, Team, TierId};
use crate::utils::table_name;
use crate::worker::{Completion, QueryWorker};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings the registry applies to every tier it creates
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Directory searched for legacy `tier_<Name>.txt` ladders
    pub seed_dir: PathBuf,
    /// Member cache capacity of each tier
    pub cache_capacity: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            seed_dir: PathBuf::from("."),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

pub struct TierRegistry {
    tiers: BTreeMap<String, Tier>,
    next_id: TierId,
    dex: Arc<Dex>,
    store: Arc<dyn MemberStore>,
    worker: QueryWorker,
    settings: RegistrySettings,
}

impl std::fmt::Debug for TierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierRegistry")
            .field("tiers", &self.tiers.keys().collect::<Vec<_>>())
            .field("next_id", &self.next_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TierRegistry {
    /// Create an empty registry and start its query worker
    pub fn new(store: Arc<dyn MemberStore>, dex: Arc<Dex>, settings: RegistrySettings) -> Result<Self> {
        let worker = QueryWorker::spawn(store.clone())?;

        Ok(Self {
            tiers: BTreeMap::new(),
            next_id: 1,
            dex,
            store,
            worker,
            settings,
        })
    }

    /// Open the configured store and load every configured tier
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = open_store(&config.store)?;
        let dex = Arc::new(config.load_dex()?);
        let settings = RegistrySettings {
            seed_dir: config.store.seed_dir.clone(),
            cache_capacity: config.cache.capacity,
        };

        let mut registry = Self::new(store, dex, settings)?;
        registry.reload(&config.tier_definitions()?)?;
        Ok(registry)
    }

    pub fn dex(&self) -> &Dex {
        &self.dex
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Tier names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }

    pub fn tiers(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.values()
    }

    pub fn get(&self, name: &str) -> Option<&Tier> {
        self.tiers.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tier> {
        self.tiers.get_mut(name)
    }

    fn require(&self, name: &str) -> Result<&Tier> {
        self.tiers.get(name).ok_or_else(|| unknown_tier(name))
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut Tier> {
        self.tiers.get_mut(name).ok_or_else(|| unknown_tier(name))
    }

    /// Replace every tier with the given definition lines.
    ///
    /// Tiers whose name survives keep their cache and pending loads; tiers
    /// that are no longer defined are dropped. Tiers change only once every
    /// line has parsed, the parent graph is acyclic and every table is ready.
    /// A store failure while preparing tables leaves the tables created
    /// before it in place.
    pub fn reload(&mut self, lines: &[String]) -> Result<()> {
        let mut definitions: BTreeMap<String, TierDefinition> = BTreeMap::new();
        for line in lines {
            let definition = self.parse_definition(line)?;
            if definitions.contains_key(&definition.name) {
                return Err(TierError::DuplicateTier {
                    name: definition.name,
                }
                .into());
            }
            definitions.insert(definition.name.clone(), definition);
        }

        let graph = definitions
            .values()
            .map(|def| (def.name.clone(), def.parent.clone()))
            .collect();
        check_acyclic(&graph)?;

        for name in definitions.keys() {
            self.prepare_table(name)?;
        }

        let removed: Vec<String> = self
            .tiers
            .keys()
            .filter(|name| !definitions.contains_key(*name))
            .cloned()
            .collect();
        for name in removed {
            if let Some(tier) = self.tiers.remove(&name) {
                if tier.pending_loads() > 0 {
                    warn!(
                        "Dropping tier {} with {} pending loads",
                        name,
                        tier.pending_loads()
                    );
                }
            }
        }

        for (name, definition) in definitions {
            self.install(name, definition);
        }

        info!("Loaded {} tiers", self.tiers.len());
        Ok(())
    }

    /// Add a tier, or replace the name's existing definition, from one line
    pub fn reconfigure(&mut self, line: &str) -> Result<()> {
        let definition = self.parse_definition(line)?;

        let mut graph = self.parent_graph();
        graph.insert(definition.name.clone(), definition.parent.clone());
        check_acyclic(&graph)?;

        self.prepare_table(&definition.name)?;
        info!("Reconfigured tier {}", definition.name);
        self.install(definition.name.clone(), definition);
        Ok(())
    }

    /// Rename a tier. Tiers naming the old name as parent keep that name,
    /// which no longer resolves until a tier takes it again.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let new = new.trim();
        if new.is_empty() {
            return Err(TierError::ConfigurationError {
                message: "Tier name cannot be empty".to_string(),
            }
            .into());
        }
        self.require(old)?;
        if self.tiers.contains_key(new) {
            return Err(TierError::DuplicateTier {
                name: new.to_string(),
            }
            .into());
        }

        let mut graph = self.parent_graph();
        if let Some(parent) = graph.remove(old) {
            graph.insert(new.to_string(), parent);
        }
        check_acyclic(&graph)?;

        self.prepare_table(new)?;
        if let Some(mut tier) = self.tiers.remove(old) {
            tier.change_name(new);
            self.tiers.insert(new.to_string(), tier);
        }
        info!("Renamed tier {} to {}", old, new);
        Ok(())
    }

    /// Definition lines of every tier, sorted by name
    pub fn to_config_strings(&self) -> Vec<String> {
        self.tiers
            .values()
            .map(|tier| tier.to_config_string(&self.dex))
            .collect()
    }

    fn parse_definition(&self, line: &str) -> Result<TierDefinition> {
        let definition = TierDefinition::parse(line, &self.dex);
        if definition.name.is_empty() {
            return Err(TierError::ConfigurationError {
                message: format!("Tier definition without a name: '{}'", line),
            }
            .into());
        }
        Ok(definition)
    }

    fn parent_graph(&self) -> HashMap<String, Option<String>> {
        self.tiers
            .iter()
            .map(|(name, tier)| (name.clone(), tier.parent().map(str::to_string)))
            .collect()
    }

    fn install(&mut self, name: String, definition: TierDefinition) {
        match self.tiers.get_mut(&name) {
            Some(tier) => tier.apply_definition(definition),
            None => {
                let tier = Tier::from_definition(
                    self.next_id,
                    definition,
                    self.worker.handle(),
                    self.settings.cache_capacity,
                );
                debug!("Created tier {} with id {}", name, self.next_id);
                self.next_id += 1;
                self.tiers.insert(name, tier);
            }
        }
    }

    /// Make sure the tier's table exists, importing the legacy ladder the
    /// first time it is created
    fn prepare_table(&self, name: &str) -> Result<()> {
        let table = table_name(name);
        if self.store.ensure_table(&table)? {
            info!("Created table {} for tier {}", table, name);
            import_seed_file(self.store.as_ref(), &table, &self.settings.seed_dir, name)?;
        }
        Ok(())
    }

    /// Whether the slot is banned in `tier` or any of its ancestors
    pub fn is_banned(&self, tier: &str, slot: &PokeSlot) -> Result<bool> {
        Ok(self.require(tier)?.is_banned(slot, self))
    }

    /// Whether the team is legal in `tier`
    pub fn is_valid(&self, tier: &str, team: &Team) -> Result<bool> {
        Ok(self.require(tier)?.is_valid(team, self))
    }

    pub fn exists(&mut self, tier: &str, name: &str) -> Result<bool> {
        Ok(self.require_mut(tier)?.exists(name))
    }

    pub fn rating(&mut self, tier: &str, name: &str) -> Result<i32> {
        Ok(self.require_mut(tier)?.rating(name))
    }

    pub fn ranking(&mut self, tier: &str, name: &str) -> Result<i32> {
        Ok(self.require_mut(tier)?.ranking(name))
    }

    pub fn member(&mut self, tier: &str, name: &str) -> Result<MemberRating> {
        Ok(self.require_mut(tier)?.member(name))
    }

    pub fn count(&self, tier: &str) -> Result<usize> {
        Ok(self.require(tier)?.count())
    }

    pub fn point_change_estimate(&mut self, tier: &str, player: &str, foe: &str) -> Result<PointChange> {
        Ok(self.require_mut(tier)?.point_change_estimate(player, foe))
    }

    /// Record a battle result in `tier`
    pub fn change_rating(&mut self, tier: &str, winner: &str, loser: &str) -> Result<RatingUpdate> {
        Ok(self.require_mut(tier)?.change_rating(winner, loser))
    }

    pub fn set_rating(&mut self, tier: &str, name: &str, rating: i32) -> Result<MemberRating> {
        Ok(self.require_mut(tier)?.set_rating(name, rating))
    }

    /// Resolve a member without blocking; see [`Tier::load_member_in_memory`]
    pub fn load_member(&mut self, tier: &str, name: &str, continuation: Continuation) -> Result<()> {
        self.require_mut(tier)?.load_member_in_memory(name, continuation)
    }

    fn dispatch(&mut self, completion: Completion) {
        match self.tiers.values_mut().find(|tier| tier.id() == completion.tier) {
            Some(tier) => tier.complete(completion),
            None => {
                debug!(
                    "Discarding lookup of '{}' for removed tier {}",
                    completion.name, completion.tier
                );
                self.worker.handle().tokens().release(completion.token);
            }
        }
    }

    /// Apply every completion that is ready. Returns how many were applied.
    pub fn process_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.worker.try_next_completion() {
            self.dispatch(completion);
            applied += 1;
        }
        applied
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `false` once the worker has stopped and nothing is left.
    pub async fn next_completion(&mut self) -> bool {
        match self.worker.next_completion().await {
            Some(completion) => {
                self.dispatch(completion);
                true
            }
            None => false,
        }
    }

    /// Block until the next completion arrives and apply it.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait_for_completion(&mut self) -> bool {
        match self.worker.wait_completion() {
            Some(completion) => {
                self.dispatch(completion);
                true
            }
            None => false,
        }
    }

    /// Continuations waiting on the worker, across all tiers
    pub fn pending_loads(&self) -> usize {
        self.tiers.values().map(Tier::pending_loads).sum()
    }

    /// Run every queued job, fire the remaining continuations and flush the
    /// store
    pub fn shutdown(mut self) -> Result<()> {
        info!("Shutting down tier registry");
        self.worker.shutdown()?;
        let applied = self.process_completions();
        debug!("Applied {} completions during shutdown", applied);
        self.store.flush()
    }
}

impl TierLookup for TierRegistry {
    fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.get(name)
    }
}

fn unknown_tier(name: &str) -> anyhow::Error {
    TierError::UnknownTier {
        name: name.to_string(),
    }
    .into()
}

/// Reject parent graphs containing a cycle. Parents that name no tier end
/// the chain.
fn check_acyclic(graph: &HashMap<String, Option<String>>) -> Result<()> {
    for start in graph.keys() {
        let mut seen = HashSet::new();
        let mut current = start.as_str();

        while let Some(Some(parent)) = graph.get(current) {
            if !seen.insert(current) {
                return Err(TierError::ParentCycle {
                    name: current.to_string(),
                }
                .into());
            }
            current = parent.as_str();
        }
    }
    Ok(())
}
