//! The namespace shared by every cell of a session.

use std::fmt;

use serde::Serialize;

use crate::execute::format;
use crate::execute::{Namespace, Value, new_namespace};

/// A bound name as shown by the `variables` projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub repr: String,
}

/// Single mutable namespace that cells read from and write to.
///
/// Never rolled back: names bound by cells that were later edited or
/// deleted stay bound.
pub struct Environment {
    namespace: Namespace,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            namespace: new_namespace(),
        }
    }

    /// Handle to the underlying namespace, for backends.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.namespace.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.namespace.borrow().contains_key(name)
    }

    /// Bound names in binding order.
    pub fn names(&self) -> Vec<String> {
        self.namespace.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.namespace.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespace.borrow().is_empty()
    }

    /// Snapshot of every binding with a truncated repr.
    pub fn variables(&self, repr_limit: usize) -> Vec<Variable> {
        self.namespace
            .borrow()
            .iter()
            .map(|(name, value)| Variable {
                name: name.clone(),
                type_name: value.type_name(),
                repr: format::truncate(&format::repr(value), repr_limit),
            })
            .collect()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_snapshot() {
        let env = Environment::new();
        env.namespace()
            .borrow_mut()
            .insert("x".into(), Value::Int(1));
        env.namespace()
            .borrow_mut()
            .insert("s".into(), Value::str("abcdefghij"));

        let vars = env.variables(5);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0], Variable {
            name: "x".into(),
            type_name: "int".into(),
            repr: "1".into(),
        });
        assert_eq!(vars[1].type_name, "str");
        assert!(vars[1].repr.ends_with("..."));
        assert!(env.contains("s"));
        assert_eq!(env.names(), vec!["x", "s"]);
    }
}
