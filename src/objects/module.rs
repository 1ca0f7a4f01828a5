//! Module namespaces
//!
//! `Scope` is the attribute interface the registry and module builder write
//! through; modules and classes both implement it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{PyFunction, PyObject};

/// Namespace that accepts attribute definitions
pub trait Scope: Send + Sync {
    /// `::`-separated path from the root module; empty for the root itself
    fn qualified_name(&self) -> &str;

    fn set_attr(&self, name: &str, value: PyObject);

    fn get_attr(&self, name: &str) -> Option<PyObject>;

    fn define_callable(&self, name: &str, function: PyFunction) {
        self.set_attr(name, PyObject::Function(function));
    }

    /// Qualified name of a member of this scope
    fn member_name(&self, name: &str) -> String {
        format!("{}::{}", self.qualified_name(), name)
    }
}

pub type ModuleRef = Arc<ModuleObject>;

#[derive(Debug)]
pub struct ModuleObject {
    name: String,
    qualified: String,
    attrs: RwLock<HashMap<String, PyObject>>,
}

impl ModuleObject {
    /// Root module: members are qualified as `::member`
    pub fn root(name: impl Into<String>) -> ModuleRef {
        Arc::new(Self {
            name: name.into(),
            qualified: String::new(),
            attrs: RwLock::new(HashMap::new()),
        })
    }

    /// Child module nested under `parent`
    pub fn child(parent: &dyn Scope, name: impl Into<String>) -> ModuleRef {
        let name = name.into();
        Arc::new(Self {
            qualified: parent.member_name(&name),
            name,
            attrs: RwLock::new(HashMap::new()),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sorted attribute names
    pub fn dir(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attrs.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Scope for ModuleObject {
    fn qualified_name(&self) -> &str {
        &self.qualified
    }

    fn set_attr(&self, name: &str, value: PyObject) {
        self.attrs.write().insert(name.to_string(), value);
    }

    fn get_attr(&self, name: &str) -> Option<PyObject> {
        self.attrs.read().get(name).cloned()
    }
}
