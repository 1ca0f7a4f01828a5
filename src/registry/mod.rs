//! Deferred attribute assignment across a module tree
//!
//! Design: Generated init code defines symbols in source order, but an alias
//! (`OrderRef = ::Order`, a class attribute pointing at a module function)
//! may name a symbol that is only defined later. Aliases are recorded during
//! registration and resolved in one flush at the end:
//! - `flush` walks records in insertion order; each target must already be in
//!   the object store, and every resolved alias is added to the store so a
//!   later record can point at it
//! - `flush_in_dependency_order` sorts records so an alias of an alias is
//!   resolved after the alias it points at, and rejects cycles
//!
//! Architecture:
//! - `mod.rs` - Object store and deferred assignment records
//! - `init.rs` - Module builder driving one initialization

pub mod init;

pub use init::{AliasOrder, ModuleBuilder};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{BindError, BindResult};
use crate::logging::debug;
use crate::objects::{PyObject, Scope};

/// Qualified name -> object, for every symbol registered so far
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: HashMap<String, PyObject>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous object under `qualified`
    pub fn insert(&mut self, qualified: impl Into<String>, object: PyObject) -> Option<PyObject> {
        self.objects.insert(qualified.into(), object)
    }

    #[inline]
    pub fn get(&self, qualified: &str) -> Option<&PyObject> {
        self.objects.get(qualified)
    }

    #[inline]
    pub fn contains(&self, qualified: &str) -> bool {
        self.objects.contains_key(qualified)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sorted qualified names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.objects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// `scope.name = store[target]`, registered afterwards as `qualified`
#[derive(Clone)]
pub struct DeferredAssign {
    scope: Arc<dyn Scope>,
    name: String,
    qualified: String,
    target: String,
}

impl DeferredAssign {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    fn apply(&self, store: &mut ObjectStore, missing: impl FnOnce(&Self) -> BindError) -> BindResult<()> {
        let object = store.get(&self.target).cloned().ok_or_else(|| missing(self))?;
        self.scope.set_attr(&self.name, object.clone());
        store.insert(self.qualified.clone(), object);
        Ok(())
    }

    fn unresolved(&self) -> BindError {
        BindError::UnresolvedTarget {
            name: self.qualified.clone(),
            target: self.target.clone(),
        }
    }
}

impl fmt::Debug for DeferredAssign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.qualified, self.target)
    }
}

/// Pending alias records for one initialization
#[derive(Debug, Default)]
pub struct CrossAssign {
    records: Vec<DeferredAssign>,
}

impl CrossAssign {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; nothing is looked up yet
    pub fn record(
        &mut self,
        scope: Arc<dyn Scope>,
        name: impl Into<String>,
        qualified: impl Into<String>,
        target: impl Into<String>,
    ) {
        let record = DeferredAssign {
            scope,
            name: name.into(),
            qualified: qualified.into(),
            target: target.into(),
        };
        debug!(event = "alias_recorded", alias = ?record, "Deferred assignment recorded");
        self.records.push(record);
    }

    /// Resolve every record in insertion order
    pub fn flush(&self, store: &mut ObjectStore) -> BindResult<()> {
        for (position, record) in self.records.iter().enumerate() {
            record.apply(store, |record| {
                let later = self.records[position + 1..]
                    .iter()
                    .any(|other| other.qualified == record.target);
                if later {
                    BindError::AliasOrder {
                        name: record.qualified.clone(),
                        target: record.target.clone(),
                    }
                } else {
                    record.unresolved()
                }
            })?;
        }
        debug!(event = "aliases_flushed", count = self.records.len(), "Deferred assignments resolved");
        Ok(())
    }

    /// Resolve aliases of aliases after their targets, whatever the
    /// recording order
    pub fn flush_in_dependency_order(&self, store: &mut ObjectStore) -> BindResult<()> {
        let mut graph = DiGraph::<usize, ()>::with_capacity(self.records.len(), self.records.len());
        let nodes: Vec<NodeIndex> = (0..self.records.len()).map(|i| graph.add_node(i)).collect();
        let producers: HashMap<&str, usize> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.qualified.as_str(), i))
            .collect();

        for (consumer, record) in self.records.iter().enumerate() {
            if let Some(&producer) = producers.get(record.target.as_str()) {
                graph.add_edge(nodes[producer], nodes[consumer], ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| BindError::AliasCycle {
            chain: self.cycle_from(graph[cycle.node_id()], &producers),
        })?;

        for node in order {
            let record = &self.records[graph[node]];
            record.apply(store, DeferredAssign::unresolved)?;
        }
        debug!(
            event = "aliases_flushed",
            count = self.records.len(),
            ordered = true,
            "Deferred assignments resolved"
        );
        Ok(())
    }

    /// Names along the alias chain starting at record `start` until one repeats
    fn cycle_from(&self, start: usize, producers: &HashMap<&str, usize>) -> Vec<String> {
        let mut chain = vec![self.records[start].qualified.clone()];
        let mut current = start;
        loop {
            let target = &self.records[current].target;
            let seen = chain.contains(target);
            chain.push(target.clone());
            match producers.get(target.as_str()) {
                Some(&next) if !seen => current = next,
                _ => return chain,
            }
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DeferredAssign] {
        &self.records
    }
}
