//! Engine configuration, loaded from TOML.

use std::path::Path;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::aggregate::TableOptions;
use crate::align::{BucketEdge, FillPolicy};
use crate::error::AlignError;
use crate::objects::{PlotRole, SourceConfig};

/// Default fill policy per plot role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleFills {
    pub bars: FillPolicy,
    pub indicator: FillPolicy,
    pub observer: FillPolicy,
}

impl Default for RoleFills {
    fn default() -> Self {
        Self {
            bars: PlotRole::Bars.default_fill(),
            indicator: PlotRole::Indicator.default_fill(),
            observer: PlotRole::Observer.default_fill(),
        }
    }
}

impl RoleFills {
    pub fn for_role(&self, role: PlotRole) -> FillPolicy {
        match role {
            PlotRole::Bars => self.bars,
            PlotRole::Indicator => self.indicator,
            PlotRole::Observer => self.observer,
        }
    }
}

/// Defaults applied to every object built through [`EngineConfig::source`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub edge: BucketEdge,
    pub fill: RoleFills,
    pub preserve_index: bool,
    /// IANA name, e.g. `"Europe/Rome"`. Unset means UTC wall clock.
    pub timezone: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            edge: BucketEdge::default(),
            fill: RoleFills::default(),
            preserve_index: false,
            timezone: None,
        }
    }
}

impl EngineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, AlignError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AlignError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, AlignError> {
        let config: Self =
            toml::from_str(content).map_err(|e| AlignError::Config(format!("parse TOML: {e}")))?;
        config.tz()?;
        Ok(config)
    }

    pub fn tz(&self) -> Result<Option<Tz>, AlignError> {
        self.timezone
            .as_deref()
            .map(|name| Tz::from_str(name).map_err(|_| AlignError::UnknownTimezone(name.to_string())))
            .transpose()
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            preserve_index: self.preserve_index,
        }
    }

    /// Source config for `role` carrying this engine's defaults.
    pub fn source(&self, role: PlotRole) -> SourceConfig {
        SourceConfig::new(role)
            .with_edge(self.edge)
            .with_fill(self.fill.for_role(role))
    }
}
