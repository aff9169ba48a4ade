//! Include dependency edges and a reverse index for cache invalidation

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One resolved `<"path">` include, in parse order
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub including_path: PathBuf,
    pub included_path: PathBuf,
}

impl DependencyEdge {
    pub fn new(including_path: impl Into<PathBuf>, included_path: impl Into<PathBuf>) -> Self {
        Self {
            including_path: including_path.into(),
            included_path: included_path.into(),
        }
    }
}

/// Accumulated include edges across parses, indexed by included file
///
/// Answers "which loaded files must be reloaded when this file changes".
#[derive(Debug, Default)]
pub struct DependencyGraph {
    includers: HashMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, edge: &DependencyEdge) {
        self.includers
            .entry(edge.included_path.clone())
            .or_default()
            .insert(edge.including_path.clone());
    }

    pub fn record_all<'a>(&mut self, edges: impl IntoIterator<Item = &'a DependencyEdge>) {
        for edge in edges {
            self.record(edge);
        }
    }

    /// Forgets every edge whose including file is `path`, before it is
    /// parsed again.
    pub fn forget_includer(&mut self, path: &Path) {
        for includers in self.includers.values_mut() {
            includers.remove(path);
        }
        self.includers.retain(|_, includers| !includers.is_empty());
    }

    /// Files that include `path` directly or through other includes
    pub fn affected_by(&self, path: &Path) -> Vec<PathBuf> {
        let mut found = BTreeSet::new();
        let mut pending = vec![path.to_path_buf()];
        while let Some(current) = pending.pop() {
            if let Some(includers) = self.includers.get(&current) {
                for includer in includers {
                    if found.insert(includer.clone()) {
                        pending.push(includer.clone());
                    }
                }
            }
        }
        found.into_iter().collect()
    }
}
