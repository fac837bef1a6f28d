//! Per-data-name clock registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::handle::ClockHandle;
use super::snapshot::ClockSnapshot;
use crate::error::AlignError;

/// The output clock plus one clock per data name.
///
/// The primary clock is the grid every table is emitted on (by default the
/// first data feed). Objects that have no data name of their own (strategy
/// level observers, for instance) resolve to it as well.
#[derive(Debug, Default)]
pub struct ClockSet {
    primary: Option<ClockHandle>,
    named: BTreeMap<String, ClockHandle>,
}

impl ClockSet {
    pub fn new(primary: ClockHandle) -> Self {
        Self {
            primary: Some(primary),
            named: BTreeMap::new(),
        }
    }

    /// Register another clock. Replaces a previous clock of the same name.
    pub fn insert(&mut self, clock: ClockHandle) {
        self.named.insert(clock.name().to_string(), clock);
    }

    pub fn with(mut self, clock: ClockHandle) -> Self {
        self.insert(clock);
        self
    }

    pub fn primary(&self) -> Result<&ClockHandle, AlignError> {
        self.primary.as_ref().ok_or(AlignError::ClockNotBuilt)
    }

    pub fn primary_mut(&mut self) -> Result<&mut ClockHandle, AlignError> {
        self.primary.as_mut().ok_or(AlignError::ClockNotBuilt)
    }

    pub fn get(&self, name: &str) -> Option<&ClockHandle> {
        match &self.primary {
            Some(primary) if primary.name() == name => Some(primary),
            _ => self.named.get(name),
        }
    }

    /// Clock for an object's data name; `None` means the primary clock.
    pub fn resolve(&self, name: Option<&str>) -> Option<&ClockHandle> {
        match name {
            None => self.primary.as_ref(),
            Some(name) => self.get(name),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.primary
            .iter()
            .map(|c| c.name())
            .chain(self.named.keys().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        usize::from(self.primary.is_some()) + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a snapshot on every clock and return the primary one.
    ///
    /// If any clock fails to open, the ones opened so far are closed again.
    pub fn open_all(&mut self) -> Result<Arc<ClockSnapshot>, AlignError> {
        let snapshot = self
            .primary
            .as_mut()
            .ok_or(AlignError::ClockNotBuilt)?
            .open_snapshot()?;

        let mut opened: Vec<String> = Vec::new();
        let mut failure = None;
        for (name, clock) in self.named.iter_mut() {
            match clock.open_snapshot() {
                Ok(_) => opened.push(name.clone()),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            for name in &opened {
                if let Some(clock) = self.named.get_mut(name) {
                    let _ = clock.close_snapshot(None);
                }
            }
            if let Some(primary) = self.primary.as_mut() {
                let _ = primary.close_snapshot(None);
            }
            return Err(e);
        }
        Ok(snapshot)
    }

    /// Close every snapshot. `last_served_end` is the checkpoint on the
    /// primary clock; named clocks record their own last tick.
    pub fn close_all(&mut self, last_served_end: Option<usize>) -> Result<(), AlignError> {
        let primary = self.primary.as_mut().ok_or(AlignError::ClockNotBuilt)?;
        primary.close_snapshot(last_served_end)?;
        for clock in self.named.values_mut() {
            let last = clock.snapshot().ok().and_then(|s| s.len().checked_sub(1));
            clock.close_snapshot(last)?;
        }
        Ok(())
    }
}
