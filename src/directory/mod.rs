mod chains;
pub use chains::CHAIN_ENDPOINTS;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::OrchestratorError;
use crate::types::{ChainEntry, DestinationRef};

/// Immutable mapping of logical chain names to destination references.
///
/// Lookups are case-insensitive. The directory is built once at startup and
/// shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct ChainDirectory {
    /// Canonical spelling, in listing order
    entries: Vec<ChainEntry>,
    /// Lowercased name -> index into `entries`
    index: HashMap<String, usize>,
}

impl ChainDirectory {
    /// Builds a directory from `(name, endpoint id)` pairs.
    ///
    /// Fails when two names collide case-insensitively, since one of them
    /// could never be resolved.
    pub fn from_table(table: &[(&str, u32)]) -> Result<Self, OrchestratorError> {
        let mut seen = HashSet::with_capacity(table.len());
        for (name, _) in table {
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(OrchestratorError::Configuration(format!(
                    "chain name {name} listed twice"
                )));
            }
        }
        Ok(Self::build(table))
    }

    fn build(table: &[(&str, u32)]) -> Self {
        let mut index = HashMap::with_capacity(table.len());
        let entries = table
            .iter()
            .enumerate()
            .map(|(i, (name, eid))| {
                index.insert(name.to_ascii_lowercase(), i);
                ChainEntry {
                    name: (*name).to_string(),
                    endpoint: DestinationRef(*eid),
                }
            })
            .collect();
        Self { entries, index }
    }

    /// Resolves a logical chain name. Unknown names are a hard error.
    pub fn resolve(&self, name: &str) -> Result<DestinationRef, OrchestratorError> {
        self.index
            .get(&name.trim().to_ascii_lowercase())
            .map(|i| self.entries[*i].endpoint)
            .ok_or_else(|| OrchestratorError::UnknownChain(name.to_string()))
    }

    /// Resolves every name, dropping duplicate references while keeping
    /// first-seen order.
    ///
    /// All names are resolved before anything is returned, so one bad name
    /// fails the whole set.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<DestinationRef>, OrchestratorError> {
        let mut resolved: Vec<DestinationRef> = Vec::with_capacity(names.len());
        for name in names {
            let destination = self.resolve(name.as_ref())?;
            if !resolved.contains(&destination) {
                resolved.push(destination);
            }
        }
        debug!("Resolved {} chain names to {} destinations", names.len(), resolved.len());
        Ok(resolved)
    }

    /// Canonical name of a known chain, for keying configured ledgers.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.index
            .get(&name.trim().to_ascii_lowercase())
            .map(|i| self.entries[*i].name.as_str())
    }

    pub fn list(&self) -> Vec<ChainEntry> {
        self.entries.clone()
    }
}

impl Default for ChainDirectory {
    /// Directory over the built-in [`CHAIN_ENDPOINTS`] table.
    fn default() -> Self {
        Self::build(CHAIN_ENDPOINTS)
    }
}
