use hashbrown::HashMap;

use super::ir::ObjectId;
use crate::index::{IndexVec, simple_index};

simple_index! {
    /// Identifies a lexical scope within a package
    pub struct ScopeId;
}

/// All scopes of a package, linked into a tree through parent edges.
///
/// Bindings keep their declaration order so passes that iterate a scope
/// (tagging, codegen) produce deterministic output.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    entries: Vec<(String, ObjectId)>,
    by_name: HashMap<String, usize>,
}

impl ScopeTree {
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            entries: Vec::new(),
            by_name: HashMap::new(),
        })
    }

    /// Binds `name` in `scope`. If the name is already bound there, the
    /// existing binding is kept and returned instead.
    pub fn insert(&mut self, scope: ScopeId, name: &str, object: ObjectId) -> Option<ObjectId> {
        let scope = &mut self.scopes[scope];

        if let Some(&slot) = scope.by_name.get(name) {
            return Some(scope.entries[slot].1);
        }

        scope.by_name.insert(name.to_string(), scope.entries.len());
        scope.entries.push((name.to_string(), object));
        None
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<ObjectId> {
        let scope = &self.scopes[scope];
        scope.by_name.get(name).map(|&slot| scope.entries[slot].1)
    }

    /// Resolves `name` by walking the scope chain outwards
    pub fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<ObjectId> {
        loop {
            if let Some(object) = self.lookup_local(scope, name) {
                return Some(object);
            }

            scope = self.scopes[scope].parent?;
        }
    }

    /// Bindings of a single scope in declaration order
    pub fn entries(&self, scope: ScopeId) -> impl Iterator<Item = (&str, ObjectId)> {
        self.scopes[scope]
            .entries
            .iter()
            .map(|(name, object)| (name.as_str(), *object))
    }
}
