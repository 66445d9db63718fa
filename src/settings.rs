//! Declarative chart settings.
//!
//! [`ChartSettings`] assigns a configured [`GroupOption`] to each chart role
//! and lists the trellis options that split the chart into panels. Settings
//! can be built in code or described as a serializable [`SettingsSpec`]
//! (YAML) that names options by id and is resolved against an
//! [`OptionCatalog`].
//!
//! # Example
//!
//! ```yaml
//! count_basis: subjects
//! roles:
//!   x_axis: { option: severity, bin_size: 2 }
//!   color_by: { option: serious }
//! trellis:
//!   - option: arm
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::ChartRole;
use crate::resolver::{BinningParams, ContextParams, GroupOption, OptionParams, TimestampBasis};
use crate::value::Resolved;

/// What the discrete axis ordering and default chart values count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountBasis {
    /// Distinct subjects.
    #[default]
    Subjects,
    /// Raw event records.
    Events,
}

/// An option together with its runtime parameters.
pub struct GroupSetting<E> {
    /// The grouping option.
    pub option: GroupOption<E>,
    /// Parameters passed to the option's resolver.
    pub params: OptionParams,
}

impl<E> fmt::Debug for GroupSetting<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupSetting")
            .field("option", &self.option)
            .field("params", &self.params)
            .finish()
    }
}

impl<E> Clone for GroupSetting<E> {
    fn clone(&self) -> Self {
        Self {
            option: self.option.clone(),
            params: self.params.clone(),
        }
    }
}

impl<E> GroupSetting<E> {
    /// Pair an option with parameters.
    #[must_use]
    pub fn new(option: GroupOption<E>, params: OptionParams) -> Self {
        Self { option, params }
    }

    /// Resolve this setting for one event.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors.
    pub fn resolve(&self, event: &E) -> Result<Resolved> {
        self.option.resolve(event, &self.params)
    }
}

/// Validated chart settings for event type `E`.
pub struct ChartSettings<E> {
    roles: BTreeMap<ChartRole, GroupSetting<E>>,
    trellis: Vec<GroupSetting<E>>,
    count_basis: CountBasis,
}

impl<E> fmt::Debug for ChartSettings<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartSettings")
            .field("roles", &self.roles)
            .field("trellis", &self.trellis)
            .field("count_basis", &self.count_basis)
            .finish()
    }
}

impl<E> Clone for ChartSettings<E> {
    fn clone(&self) -> Self {
        Self {
            roles: self.roles.clone(),
            trellis: self.trellis.clone(),
            count_basis: self.count_basis,
        }
    }
}

impl<E> ChartSettings<E> {
    /// Start building settings.
    #[must_use]
    pub fn builder() -> ChartSettingsBuilder<E> {
        ChartSettingsBuilder::new()
    }

    /// Setting assigned to a role.
    #[must_use]
    pub fn role(&self, role: ChartRole) -> Option<&GroupSetting<E>> {
        self.roles.get(&role)
    }

    /// All role assignments.
    #[must_use]
    pub fn roles(&self) -> &BTreeMap<ChartRole, GroupSetting<E>> {
        &self.roles
    }

    /// Trellis settings in configured order.
    #[must_use]
    pub fn trellis(&self) -> &[GroupSetting<E>] {
        &self.trellis
    }

    /// Ids of the trellis options.
    #[must_use]
    pub fn trellis_ids(&self) -> Vec<&str> {
        self.trellis.iter().map(|s| s.option.id()).collect()
    }

    /// Count basis.
    #[must_use]
    pub fn count_basis(&self) -> CountBasis {
        self.count_basis
    }
}

/// Builder for [`ChartSettings`].
pub struct ChartSettingsBuilder<E> {
    roles: BTreeMap<ChartRole, GroupSetting<E>>,
    trellis: Vec<GroupSetting<E>>,
    count_basis: CountBasis,
}

impl<E> Default for ChartSettingsBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ChartSettingsBuilder<E> {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            roles: BTreeMap::new(),
            trellis: Vec::new(),
            count_basis: CountBasis::default(),
        }
    }

    /// Assign an option to a chart role.
    #[must_use]
    pub fn role(mut self, role: ChartRole, option: GroupOption<E>, params: OptionParams) -> Self {
        self.roles.insert(role, GroupSetting::new(option, params));
        self
    }

    /// Add a trellis option.
    #[must_use]
    pub fn trellis(mut self, option: GroupOption<E>, params: OptionParams) -> Self {
        self.trellis.push(GroupSetting::new(option, params));
        self
    }

    /// Set the count basis.
    #[must_use]
    pub fn count_basis(mut self, basis: CountBasis) -> Self {
        self.count_basis = basis;
        self
    }

    /// Validate and build the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultiValuedTrellis`] if a collection-valued option is
    /// used as a trellis, [`Error::DuplicateTrellis`] if a trellis option
    /// repeats, and [`Error::InvalidSettings`] if binning params are given to
    /// an option that cannot be binned.
    pub fn build(self) -> Result<ChartSettings<E>> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.trellis.len());
        for setting in &self.trellis {
            let id = setting.option.id();
            if setting.option.is_multi_valued() {
                return Err(Error::MultiValuedTrellis(id.to_string()));
            }
            if seen.contains(&id) {
                return Err(Error::DuplicateTrellis(id.to_string()));
            }
            seen.push(id);
        }
        for setting in self.roles.values().chain(self.trellis.iter()) {
            if setting.params.binning.is_some() && !setting.option.is_binnable() {
                return Err(Error::InvalidSettings(format!(
                    "option '{}' cannot be binned",
                    setting.option.id()
                )));
            }
        }
        Ok(ChartSettings {
            roles: self.roles,
            trellis: self.trellis,
            count_basis: self.count_basis,
        })
    }
}

// ============================================================================
// Option catalog
// ============================================================================

/// The grouping options available for one event type.
pub struct OptionCatalog<E> {
    entity: &'static str,
    options: Vec<GroupOption<E>>,
}

impl<E> fmt::Debug for OptionCatalog<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionCatalog")
            .field("entity", &self.entity)
            .field("options", &self.ids())
            .finish()
    }
}

impl<E> OptionCatalog<E> {
    /// Create an empty catalog for the named entity.
    #[must_use]
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            options: Vec::new(),
        }
    }

    /// Add an option, replacing any option with the same id.
    #[must_use]
    pub fn with(mut self, option: GroupOption<E>) -> Self {
        self.options.retain(|o| o.id() != option.id());
        self.options.push(option);
        self
    }

    /// Entity name.
    #[must_use]
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Look up an option by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] if no option has this id.
    pub fn get(&self, id: &str) -> Result<&GroupOption<E>> {
        self.options
            .iter()
            .find(|o| o.id() == id)
            .ok_or_else(|| Error::UnknownOption {
                option: id.to_string(),
                entity: self.entity,
            })
    }

    /// Option ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.options.iter().map(GroupOption::id).collect()
    }
}

// ============================================================================
// Serializable spec
// ============================================================================

/// One option reference in a [`SettingsSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Option id in the catalog.
    pub option: String,
    /// Bin size; setting this or `timestamp` enables binning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_size: Option<i64>,
    /// Timestamp basis for binned date options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampBasis>,
    /// Drug name for drug-scoped options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug: Option<String>,
}

impl OptionSpec {
    /// Reference an option by id with no parameters.
    #[must_use]
    pub fn new(option: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            ..Self::default()
        }
    }

    fn params(&self, contexts: &HashMap<String, ContextParams>) -> Result<OptionParams> {
        let mut params = OptionParams::new();
        if self.bin_size.is_some() || self.timestamp.is_some() {
            params = params.binning(BinningParams::new(
                self.bin_size,
                self.timestamp.unwrap_or_default(),
            )?);
        }
        if let Some(context) = contexts.get(&self.option) {
            params = params.context(context.clone());
        }
        if let Some(drug) = &self.drug {
            params = params.drug(drug.clone());
        }
        Ok(params)
    }
}

/// Serializable description of chart settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSpec {
    /// Count basis.
    #[serde(default)]
    pub count_basis: CountBasis,
    /// Option per chart role.
    #[serde(default)]
    pub roles: BTreeMap<ChartRole, OptionSpec>,
    /// Trellis options in panel-split order.
    #[serde(default)]
    pub trellis: Vec<OptionSpec>,
}

impl SettingsSpec {
    /// Parse a spec from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] with the failing line.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map_or(0, |l| l.line());
            Error::ConfigParse {
                line,
                message: e.to_string(),
            }
        })
    }

    /// Load a spec from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist,
    /// [`Error::Io`] if it exists but cannot be read and
    /// [`Error::ConfigParse`] if it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ConfigNotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        Self::from_yaml(&content)
    }

    /// Serialize the spec to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| Error::InvalidSettings(e.to_string()))
    }

    /// Resolve option ids against `catalog` and build validated settings.
    ///
    /// `contexts` supplies precomputed context maps keyed by option id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] for ids missing from the catalog and
    /// any validation error from [`ChartSettingsBuilder::build`].
    pub fn build<E>(
        &self,
        catalog: &OptionCatalog<E>,
        contexts: &HashMap<String, ContextParams>,
    ) -> Result<ChartSettings<E>> {
        let mut builder = ChartSettings::builder().count_basis(self.count_basis);
        for (role, spec) in &self.roles {
            builder = builder.role(*role, catalog.get(&spec.option)?.clone(), spec.params(contexts)?);
        }
        for spec in &self.trellis {
            builder = builder.trellis(catalog.get(&spec.option)?.clone(), spec.params(contexts)?);
        }
        builder.build()
    }
}
