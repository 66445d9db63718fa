//! Composite grouping keys.
//!
//! A [`GroupByKey`] holds the value of every chart role (x axis, color-by, ...)
//! and every trellis dimension for one group of events. Keys are immutable and
//! hashed once at construction; equality checks the cached hash before
//! comparing the maps, which keeps the key→bucket maps cheap at high volume.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::resolver::OptionScope;
use crate::value::{label_cmp, AttributeValue};

/// Role an option plays in a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartRole {
    /// Category axis.
    XAxis,
    /// Second category axis (shift charts).
    YAxis,
    /// Series / color dimension.
    ColorBy,
}

/// Identifies a trellis dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrellisKey {
    /// Option id.
    pub option: String,
    /// Whether the option lives in the population (subject) dimension space.
    pub population: bool,
}

impl TrellisKey {
    /// Create a trellis key.
    #[must_use]
    pub fn new(option: impl Into<String>, scope: OptionScope) -> Self {
        Self {
            option: option.into(),
            population: scope == OptionScope::Population,
        }
    }
}

/// Immutable key of one group: chart-role values plus trellis values.
#[derive(Debug, Clone)]
pub struct GroupByKey {
    settings: BTreeMap<ChartRole, AttributeValue>,
    trellis: BTreeMap<TrellisKey, AttributeValue>,
    hash: u64,
}

impl GroupByKey {
    /// Create a key and cache its hash.
    #[must_use]
    pub fn new(
        settings: BTreeMap<ChartRole, AttributeValue>,
        trellis: BTreeMap<TrellisKey, AttributeValue>,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        settings.hash(&mut hasher);
        trellis.hash(&mut hasher);
        Self {
            settings,
            trellis,
            hash: hasher.finish(),
        }
    }

    /// Chart-role values.
    #[must_use]
    pub fn settings(&self) -> &BTreeMap<ChartRole, AttributeValue> {
        &self.settings
    }

    /// Trellis values.
    #[must_use]
    pub fn trellis(&self) -> &BTreeMap<TrellisKey, AttributeValue> {
        &self.trellis
    }

    /// Value of a chart role.
    #[must_use]
    pub fn value(&self, role: ChartRole) -> Option<&AttributeValue> {
        self.settings.get(&role)
    }

    /// Value of a trellis dimension by option id.
    #[must_use]
    pub fn trellis_value(&self, option: &str) -> Option<&AttributeValue> {
        self.trellis
            .iter()
            .find_map(|(k, v)| (k.option == option).then_some(v))
    }

    /// Project onto a subset of chart roles, keeping all trellis dimensions.
    #[must_use]
    pub fn limit_to_settings(&self, roles: &[ChartRole]) -> Self {
        Self::new(self.pick_settings(roles), self.trellis.clone())
    }

    /// Project onto the trellis dimensions only.
    #[must_use]
    pub fn limit_to_trellis(&self) -> Self {
        Self::new(BTreeMap::new(), self.trellis.clone())
    }

    /// Project onto a subset of chart roles and trellis options.
    #[must_use]
    pub fn limit(&self, roles: &[ChartRole], trellis: &[&str]) -> Self {
        let trellis = self
            .trellis
            .iter()
            .filter(|(k, _)| trellis.contains(&k.option.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::new(self.pick_settings(roles), trellis)
    }

    /// Project onto the population-scoped trellis dimensions.
    ///
    /// The result is comparable with keys computed over subject records,
    /// which lets event-level panels find their population denominator.
    #[must_use]
    pub fn limit_to_population_trellis(&self) -> Self {
        let trellis = self
            .trellis
            .iter()
            .filter(|(k, _)| k.population)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::new(BTreeMap::new(), trellis)
    }

    /// Trellis dimensions as `(option, label)` pairs in key order.
    #[must_use]
    pub fn trellis_labels(&self) -> Vec<(String, String)> {
        self.trellis
            .iter()
            .map(|(k, v)| (k.option.clone(), v.label()))
            .collect()
    }

    /// Display order of panels: trellis labels compared dimension by dimension,
    /// empty values last.
    #[must_use]
    pub fn cmp_trellis(&self, other: &Self) -> Ordering {
        for ((ka, va), (kb, vb)) in self.trellis.iter().zip(other.trellis.iter()) {
            let ord = ka
                .cmp(kb)
                .then_with(|| label_cmp(&va.label(), &vb.label()));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.trellis.len().cmp(&other.trellis.len())
    }

    fn pick_settings(&self, roles: &[ChartRole]) -> BTreeMap<ChartRole, AttributeValue> {
        self.settings
            .iter()
            .filter(|(r, _)| roles.contains(r))
            .map(|(r, v)| (*r, v.clone()))
            .collect()
    }
}

impl PartialEq for GroupByKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.settings == other.settings && self.trellis == other.trellis
    }
}

impl Eq for GroupByKey {}

impl Hash for GroupByKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key(x: &str, color: &str, arm: &str, serious: &str) -> GroupByKey {
        GroupByKey::new(
            [
                (ChartRole::XAxis, AttributeValue::from(x)),
                (ChartRole::ColorBy, AttributeValue::from(color)),
            ]
            .into_iter()
            .collect(),
            [
                (TrellisKey::new("arm", OptionScope::Population), AttributeValue::from(arm)),
                (TrellisKey::new("serious", OptionScope::Event), AttributeValue::from(serious)),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_equal_keys_hash_equal() {
        let a = key("Nausea", "Mild", "Placebo", "Yes");
        let b = key("Nausea", "Mild", "Placebo", "Yes");
        assert_eq!(a, b);
        let set: HashSet<GroupByKey> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_different_keys() {
        assert_ne!(
            key("Nausea", "Mild", "Placebo", "Yes"),
            key("Nausea", "Mild", "Placebo", "No")
        );
    }

    #[test]
    fn test_value_lookup() {
        let k = key("Nausea", "Mild", "Placebo", "Yes");
        assert_eq!(k.value(ChartRole::XAxis), Some(&AttributeValue::from("Nausea")));
        assert_eq!(k.value(ChartRole::YAxis), None);
        assert_eq!(k.trellis_value("arm"), Some(&AttributeValue::from("Placebo")));
    }

    #[test]
    fn test_limit_to_trellis() {
        let a = key("Nausea", "Mild", "Placebo", "Yes").limit_to_trellis();
        let b = key("Headache", "Severe", "Placebo", "Yes").limit_to_trellis();
        assert_eq!(a, b);
        assert!(a.settings().is_empty());
        assert_eq!(a.trellis().len(), 2);
    }

    #[test]
    fn test_limit_to_settings() {
        let k = key("Nausea", "Mild", "Placebo", "Yes").limit_to_settings(&[ChartRole::ColorBy]);
        assert_eq!(k.settings().len(), 1);
        assert_eq!(k.value(ChartRole::ColorBy), Some(&AttributeValue::from("Mild")));
        assert_eq!(k.trellis().len(), 2);
    }

    #[test]
    fn test_limit_to_population_trellis() {
        let k = key("Nausea", "Mild", "Placebo", "Yes").limit_to_population_trellis();
        assert_eq!(k.trellis_labels(), vec![("arm".to_string(), "Placebo".to_string())]);
        assert!(k.settings().is_empty());
    }

    #[test]
    fn test_projection_round_trip() {
        let full = key("Nausea", "Mild", "Placebo", "Yes");
        let roles = [ChartRole::XAxis, ChartRole::ColorBy];
        let projected = full.limit(&roles, &["arm", "serious"]);
        assert_eq!(projected, full);
        assert_eq!(projected.limit(&roles, &["arm", "serious"]), projected);

        let trellis_only = full.limit_to_trellis();
        assert_eq!(trellis_only.limit(&roles, &["arm", "serious"]), trellis_only);
    }

    #[test]
    fn test_panel_order_empty_last() {
        let a = key("x", "c", "Placebo", "Yes");
        let b = key("x", "c", "(Empty)", "Yes");
        let c = key("x", "c", "Drug 10mg", "Yes");
        let mut keys = vec![b.clone(), a.clone(), c.clone()];
        keys.sort_by(GroupByKey::cmp_trellis);
        assert_eq!(keys, vec![c, a, b]);
    }
}
