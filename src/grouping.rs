//! The grouping engine.
//!
//! Resolves every configured option for each event, expands collection-valued
//! dimensions into the cross-product of keys, and folds events into a map
//! from [`GroupByKey`] to [`EventBucket`]. Events are processed independently
//! with a rayon map/reduce; partial maps are merged at the end.
//!
//! Upstream duplicates are kept as they arrive: two records with different
//! event ids both count, even if every other attribute matches.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::event::{Event, EventId};
use crate::key::{ChartRole, GroupByKey, TrellisKey};
use crate::resolver::OptionScope;
use crate::settings::{ChartSettings, CountBasis, GroupSetting, OptionCatalog};
use crate::value::{AttributeValue, Resolved};

/// Events that share one group key.
#[derive(Debug)]
pub struct EventBucket<'a, E> {
    events: Vec<&'a E>,
    subjects: BTreeSet<&'a str>,
    event_ids: BTreeSet<EventId>,
}

impl<E> Default for EventBucket<'_, E> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            subjects: BTreeSet::new(),
            event_ids: BTreeSet::new(),
        }
    }
}

impl<E> Clone for EventBucket<'_, E> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            subjects: self.subjects.clone(),
            event_ids: self.event_ids.clone(),
        }
    }
}

impl<'a, E: Event> EventBucket<'a, E> {
    /// Create an empty bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one event.
    pub fn push(&mut self, event: &'a E) {
        self.events.push(event);
        self.subjects.insert(event.subject_id());
        self.event_ids.insert(event.event_id());
    }

    /// Move all events of `other` into this bucket.
    pub fn absorb(&mut self, other: Self) {
        self.events.extend(other.events);
        self.subjects.extend(other.subjects);
        self.event_ids.extend(other.event_ids);
    }

    /// Copy the events of `other` into this bucket.
    ///
    /// Events whose id is already in this bucket are skipped, so an event
    /// reached through several keys of a multi-valued option counts once.
    pub fn merge(&mut self, other: &Self) {
        let fresh: Vec<&'a E> = other
            .events
            .iter()
            .copied()
            .filter(|e| !self.event_ids.contains(&e.event_id()))
            .collect();
        self.events.extend(fresh);
        self.subjects.extend(other.subjects.iter().copied());
        self.event_ids.extend(other.event_ids.iter().copied());
    }
}

impl<'a, E> EventBucket<'a, E> {
    /// Contributing events, in arrival order within each worker.
    #[must_use]
    pub fn events(&self) -> &[&'a E] {
        &self.events
    }

    /// Distinct contributing subjects.
    #[must_use]
    pub fn subjects(&self) -> &BTreeSet<&'a str> {
        &self.subjects
    }

    /// Distinct contributing event ids.
    #[must_use]
    pub fn event_ids(&self) -> &BTreeSet<EventId> {
        &self.event_ids
    }

    /// Raw number of contributing records.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Number of distinct subjects.
    #[must_use]
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Count on the requested basis.
    #[must_use]
    pub fn count(&self, basis: CountBasis) -> usize {
        match basis {
            CountBasis::Subjects => self.subject_count(),
            CountBasis::Events => self.event_count(),
        }
    }
}

/// Events grouped by key.
pub type GroupedEvents<'a, E> = HashMap<GroupByKey, EventBucket<'a, E>>;

/// Configuration for the grouping engine.
#[derive(Debug, Clone)]
pub struct GroupingConfig {
    /// Minimum number of events handed to one rayon task.
    pub min_chunk_size: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 256,
        }
    }
}

/// Groups events into keyed buckets according to chart settings.
#[derive(Debug, Clone, Default)]
pub struct GroupingEngine {
    config: GroupingConfig,
}

impl GroupingEngine {
    /// Create an engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: GroupingConfig) -> Self {
        Self { config }
    }

    /// All distinct keys one event belongs to.
    ///
    /// Collection-valued chart roles expand into the cross-product of their
    /// values; trellis dimensions must resolve to a single value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultiValuedTrellis`] if a trellis option yields a
    /// collection, and any resolver error.
    pub fn keys_for<E>(&self, event: &E, settings: &ChartSettings<E>) -> Result<Vec<GroupByKey>> {
        let trellis = resolve_trellis(event, settings.trellis())?;

        let mut combinations: Vec<BTreeMap<ChartRole, AttributeValue>> = vec![BTreeMap::new()];
        for (role, setting) in settings.roles() {
            let values = setting.resolve(event)?.into_values();
            let mut expanded = Vec::with_capacity(combinations.len() * values.len());
            for combination in &combinations {
                for value in &values {
                    let mut next = combination.clone();
                    next.insert(*role, value.clone());
                    expanded.push(next);
                }
            }
            combinations = expanded;
        }

        let mut keys: Vec<GroupByKey> = Vec::with_capacity(combinations.len());
        for roles in combinations {
            let key = GroupByKey::new(roles, trellis.clone());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Group `events` by the keys `settings` assigns them.
    ///
    /// # Errors
    ///
    /// Fails on the first resolver or configuration error; no partial result
    /// is returned.
    pub fn group<'a, E: Event>(
        &self,
        events: &'a [E],
        settings: &ChartSettings<E>,
    ) -> Result<GroupedEvents<'a, E>> {
        let grouped = events
            .par_iter()
            .with_min_len(self.config.min_chunk_size.max(1))
            .try_fold(HashMap::new, |mut acc: GroupedEvents<'a, E>, event| {
                for key in self.keys_for(event, settings)? {
                    acc.entry(key).or_default().push(event);
                }
                Ok::<_, Error>(acc)
            })
            .try_reduce(HashMap::new, |mut left, right| {
                for (key, bucket) in right {
                    left.entry(key).or_default().absorb(bucket);
                }
                Ok(left)
            })?;

        debug!(
            events = events.len(),
            keys = grouped.len(),
            trellis = settings.trellis().len(),
            "grouped events"
        );
        Ok(grouped)
    }

    /// Count subjects per population trellis combination.
    ///
    /// Every population-scoped trellis option of `settings` is looked up by id
    /// in the subject `catalog` and resolved on `subjects` with the same
    /// parameters. Keys of the resulting index match
    /// [`GroupByKey::limit_to_population_trellis`] of event keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] if the subject catalog lacks one of the
    /// population options, and any resolver error.
    pub fn population<E, S: Event>(
        &self,
        subjects: &[S],
        catalog: &OptionCatalog<S>,
        settings: &ChartSettings<E>,
    ) -> Result<PopulationIndex> {
        let mut trellis = Vec::new();
        for setting in settings.trellis() {
            if setting.option.scope() == OptionScope::Population {
                let option = catalog.get(setting.option.id())?.clone();
                trellis.push(GroupSetting::new(option, setting.params.clone()));
            }
        }

        let mut index = PopulationIndex::default();
        for subject in subjects {
            let values = resolve_trellis(subject, &trellis)?
                .into_iter()
                .map(|(k, v)| (TrellisKey { population: true, ..k }, v))
                .collect();
            let key = GroupByKey::new(BTreeMap::new(), values);
            index
                .subjects
                .entry(key)
                .or_default()
                .insert(subject.subject_id().to_string());
            index.total += 1;
        }
        trace!(
            subjects = index.total,
            groups = index.subjects.len(),
            "built population index"
        );
        Ok(index)
    }
}

fn resolve_trellis<E>(
    event: &E,
    trellis: &[GroupSetting<E>],
) -> Result<BTreeMap<TrellisKey, AttributeValue>> {
    let mut values = BTreeMap::new();
    for setting in trellis {
        let option = &setting.option;
        match setting.resolve(event)? {
            Resolved::One(value) => {
                values.insert(TrellisKey::new(option.id(), option.scope()), value);
            }
            Resolved::Many(_) => return Err(Error::MultiValuedTrellis(option.id().to_string())),
        }
    }
    Ok(values)
}

/// Distinct subjects per population trellis combination.
#[derive(Debug, Clone, Default)]
pub struct PopulationIndex {
    subjects: HashMap<GroupByKey, BTreeSet<String>>,
    total: usize,
}

impl PopulationIndex {
    /// Subjects in the population panel matching an event-level key.
    #[must_use]
    pub fn subject_count(&self, key: &GroupByKey) -> usize {
        self.subjects
            .get(&key.limit_to_population_trellis())
            .map_or(0, BTreeSet::len)
    }

    /// Number of subject records indexed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }
}


// ============================================================================
// Property-based tests with proptest
// ============================================================================
