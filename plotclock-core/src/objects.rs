//! Plotted objects: raw data feeds and derived line-bearing objects.
//!
//! Everything the aggregation needs to know about an object is carried
//! explicitly and validated when the object is built: which clock it runs
//! on, its lines, and how each line is resampled.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::align::{AlignSpec, BucketEdge, FillPolicy};
use crate::error::AlignError;
use crate::series::LineBuffer;

/// What an object is drawn as. Decides the default fill policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotRole {
    /// OHLC-style bars. A missing bar must show as a gap.
    Bars,
    Indicator,
    Observer,
}

impl PlotRole {
    pub fn default_fill(self) -> FillPolicy {
        match self {
            Self::Bars => FillPolicy::Gaps,
            Self::Indicator | Self::Observer => FillPolicy::Forward,
        }
    }
}

/// Per-line exceptions to the role's default fill policy.
///
/// `fillnan` lines are held forward, `skipnan` lines are interpolated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOverrides {
    #[serde(default)]
    pub fillnan: Vec<String>,
    #[serde(default)]
    pub skipnan: Vec<String>,
}

impl FillOverrides {
    pub fn is_empty(&self) -> bool {
        self.fillnan.is_empty() && self.skipnan.is_empty()
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.fillnan
            .iter()
            .chain(self.skipnan.iter())
            .map(String::as_str)
    }
}

/// Alignment settings of one plotted object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub role: PlotRole,
    #[serde(default)]
    pub edge: BucketEdge,
    /// Replaces the role default for every line not named in `overrides`.
    #[serde(default)]
    pub fill: Option<FillPolicy>,
    #[serde(default)]
    pub overrides: FillOverrides,
}

impl SourceConfig {
    pub fn new(role: PlotRole) -> Self {
        Self {
            role,
            edge: BucketEdge::default(),
            fill: None,
            overrides: FillOverrides::default(),
        }
    }

    pub fn bars() -> Self {
        Self::new(PlotRole::Bars)
    }

    pub fn indicator() -> Self {
        Self::new(PlotRole::Indicator)
    }

    pub fn observer() -> Self {
        Self::new(PlotRole::Observer)
    }

    pub fn with_edge(mut self, edge: BucketEdge) -> Self {
        self.edge = edge;
        self
    }

    pub fn with_fill(mut self, fill: FillPolicy) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn fillnan(mut self, line: impl Into<String>) -> Self {
        self.overrides.fillnan.push(line.into());
        self
    }

    pub fn skipnan(mut self, line: impl Into<String>) -> Self {
        self.overrides.skipnan.push(line.into());
        self
    }

    /// Reject a line that is in both override lists.
    pub fn validate(&self) -> Result<(), AlignError> {
        if let Some(line) = self
            .overrides
            .fillnan
            .iter()
            .find(|l| self.overrides.skipnan.contains(l))
        {
            return Err(AlignError::ConflictingFillOverride { line: line.clone() });
        }
        Ok(())
    }

    /// Effective fill policy of `line`.
    pub fn fill_for(&self, line: &str) -> FillPolicy {
        if self.overrides.skipnan.iter().any(|l| l == line) {
            FillPolicy::Interpolate
        } else if self.overrides.fillnan.iter().any(|l| l == line) {
            FillPolicy::Forward
        } else {
            self.fill.unwrap_or_else(|| self.role.default_fill())
        }
    }

    pub fn spec_for(&self, line: &str) -> AlignSpec {
        AlignSpec::new(self.edge, self.fill_for(line))
    }
}

/// One output line of an object, indexed like its clock's datetime line.
#[derive(Debug, Clone)]
pub struct NamedLine {
    pub name: String,
    pub buffer: LineBuffer,
}

impl NamedLine {
    pub fn new(name: impl Into<String>, buffer: impl Into<LineBuffer>) -> Self {
        Self {
            name: name.into(),
            buffer: buffer.into(),
        }
    }
}

/// Shared shape of both object kinds.
#[derive(Debug, Clone)]
struct SeriesParts {
    id: String,
    clock: Option<String>,
    lines: Vec<NamedLine>,
    config: SourceConfig,
}

impl SeriesParts {
    fn build(
        id: String,
        clock: Option<String>,
        lines: Vec<NamedLine>,
        config: SourceConfig,
    ) -> Result<Self, AlignError> {
        if id.trim().is_empty() {
            return Err(AlignError::EmptyObjectId);
        }
        config.validate()?;

        let mut seen = HashSet::new();
        for line in &lines {
            if !seen.insert(line.name.as_str()) {
                return Err(AlignError::DuplicateLine {
                    object: id.clone(),
                    line: line.name.clone(),
                });
            }
        }
        if let Some(missing) = config.overrides.names().find(|n| !seen.contains(n)) {
            return Err(AlignError::UnknownLine {
                object: id.clone(),
                line: missing.to_string(),
            });
        }

        Ok(Self {
            id,
            clock,
            lines,
            config,
        })
    }
}

/// An end-point data source (a data feed): bars on its own clock.
#[derive(Debug, Clone)]
pub struct RawSeries(SeriesParts);

impl RawSeries {
    /// A line called `datetime` is the clock itself and is not plotted.
    pub fn new(
        id: impl Into<String>,
        clock: impl Into<String>,
        lines: Vec<NamedLine>,
        config: SourceConfig,
    ) -> Result<Self, AlignError> {
        let lines = lines
            .into_iter()
            .filter(|l| l.name != "datetime")
            .collect();
        SeriesParts::build(id.into(), Some(clock.into()), lines, config).map(Self)
    }
}

/// An indicator or observer: one or more computed lines on the clock of the
/// data it was computed from (`None` = the primary clock).
#[derive(Debug, Clone)]
pub struct DerivedSeries(SeriesParts);

impl DerivedSeries {
    pub fn new(
        id: impl Into<String>,
        clock: Option<String>,
        lines: Vec<NamedLine>,
        config: SourceConfig,
    ) -> Result<Self, AlignError> {
        SeriesParts::build(id.into(), clock, lines, config).map(Self)
    }
}

/// Closed set of things the aggregation can align.
#[derive(Debug, Clone)]
pub enum PlotObject {
    Raw(RawSeries),
    Derived(DerivedSeries),
}

impl PlotObject {
    fn parts(&self) -> &SeriesParts {
        match self {
            Self::Raw(RawSeries(parts)) | Self::Derived(DerivedSeries(parts)) => parts,
        }
    }

    pub fn id(&self) -> &str {
        &self.parts().id
    }

    /// Name of the clock the object's lines are indexed by.
    pub fn clock(&self) -> Option<&str> {
        self.parts().clock.as_deref()
    }

    pub fn lines(&self) -> &[NamedLine] {
        &self.parts().lines
    }

    pub fn config(&self) -> &SourceConfig {
        &self.parts().config
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Unique column id for one of this object's lines.
    pub fn column_id(&self, line: &str) -> String {
        format!("{}.{}", self.id(), line)
    }
}

impl From<RawSeries> for PlotObject {
    fn from(series: RawSeries) -> Self {
        Self::Raw(series)
    }
}

impl From<DerivedSeries> for PlotObject {
    fn from(series: DerivedSeries) -> Self {
        Self::Derived(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(names: &[&str]) -> Vec<NamedLine> {
        names
            .iter()
            .map(|n| NamedLine::new(*n, vec![1.0, 2.0]))
            .collect()
    }

    #[test]
    fn role_defaults() {
        let bars = SourceConfig::bars();
        assert_eq!(bars.fill_for("close"), FillPolicy::Gaps);
        let ind = SourceConfig::indicator();
        assert_eq!(ind.fill_for("sma"), FillPolicy::Forward);
    }

    #[test]
    fn overrides_win_over_defaults() {
        let cfg = SourceConfig::bars().fillnan("volume").skipnan("close");
        assert_eq!(cfg.fill_for("volume"), FillPolicy::Forward);
        assert_eq!(cfg.fill_for("close"), FillPolicy::Interpolate);
        assert_eq!(cfg.fill_for("open"), FillPolicy::Gaps);
        let cfg = SourceConfig::indicator().with_fill(FillPolicy::Gaps);
        assert_eq!(cfg.fill_for("sma"), FillPolicy::Gaps);
    }

    #[test]
    fn conflicting_override_is_rejected() {
        let cfg = SourceConfig::bars().fillnan("close").skipnan("close");
        assert!(matches!(
            cfg.validate(),
            Err(AlignError::ConflictingFillOverride { line }) if line == "close"
        ));
    }

    #[test]
    fn override_must_name_existing_line() {
        let err = DerivedSeries::new("sma", None, lines(&["sma"]), SourceConfig::indicator().skipnan("ema"))
            .unwrap_err();
        assert!(matches!(err, AlignError::UnknownLine { line, .. } if line == "ema"));
    }

    #[test]
    fn duplicate_lines_and_empty_id_are_rejected() {
        assert!(matches!(
            DerivedSeries::new("x", None, lines(&["a", "a"]), SourceConfig::indicator()),
            Err(AlignError::DuplicateLine { .. })
        ));
        assert!(matches!(
            DerivedSeries::new(" ", None, lines(&["a"]), SourceConfig::indicator()),
            Err(AlignError::EmptyObjectId)
        ));
    }

    #[test]
    fn raw_series_drops_datetime_line() {
        let raw = RawSeries::new("data0", "m1", lines(&["datetime", "open", "close"]), SourceConfig::bars())
            .unwrap();
        let obj = PlotObject::from(raw);
        let names: Vec<&str> = obj.lines().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["open", "close"]);
        assert_eq!(obj.clock(), Some("m1"));
        assert_eq!(obj.column_id("close"), "data0.close");
        assert!(obj.is_raw());
    }

    #[test]
    fn config_deserializes_from_toml() {
        let cfg: SourceConfig = toml::from_str(
            r#"
            role = "bars"
            edge = "right"
            [overrides]
            skipnan = ["close"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.edge, BucketEdge::Right);
        assert_eq!(cfg.fill_for("close"), FillPolicy::Interpolate);
        assert!(toml::from_str::<SourceConfig>("role = \"widget\"").is_err());
    }
}
