//! The arena-based intermediate representation every pass after parsing
//! operates on. All objects of a package live in one flat `IndexVec` and
//! refer to each other by `ObjectId`; rewriting passes swap child ids or
//! overwrite slots in place instead of rebuilding trees.

use core::fmt;

use crate::{
    frontend::{
        ast::{BinaryOperator, UnaryOperator},
        lexer::Span,
    },
    index::{IndexVec, simple_index},
};

use super::{
    scope::{ScopeId, ScopeTree},
    ty::Type,
};

simple_index! {
    /// Identifies an object within its package's arena
    pub struct ObjectId;
}

/// A compile-time constant. Integers are 32 bits wide, same as at runtime,
/// so folded arithmetic wraps exactly like the generated code does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Bool(bool),
}

impl Value {
    /// The bit pattern emitted for this value as an immediate operand
    pub fn as_int(self) -> i32 {
        match self {
            Value::Int(value) => value,
            Value::Bool(value) => value as i32,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub kind: ObjectKind,
    /// Referenced, assigned, called or declared name; empty when the object
    /// has no name attached
    pub name: String,
    pub span: Span,
    pub ty: Type,
    /// Identity assigned by the tagging pass; 0 until tagged. Identities
    /// name stack slots, labels and generated functions in the backends.
    pub id: u32,
    /// The scope this object was lowered in
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Constant(Value),
    /// A use of `name`, resolved through the scope chain
    VariableRef,
    Unary {
        operator: UnaryOperator,
        operand: ObjectId,
    },
    Binary {
        operator: BinaryOperator,
        lhs: ObjectId,
        rhs: ObjectId,
    },
    /// `(= name value)`
    Assignment {
        value: ObjectId,
    },
    /// `(name arguments...)`
    Call {
        arguments: Vec<ObjectId>,
    },
    If {
        condition: ObjectId,
        then: ObjectId,
        otherwise: Option<ObjectId>,
    },
    For {
        condition: ObjectId,
        body: Vec<ObjectId>,
    },
    Function {
        parameters: Vec<ObjectId>,
        body: Vec<ObjectId>,
    },
    VarBlock {
        parameters: Vec<ObjectId>,
        body: Vec<ObjectId>,
    },
    /// A `func` parameter or `var` local
    Param,
    /// A top-level `(define name body)`
    Definition {
        body: ObjectId,
    },
}

#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub objects: IndexVec<ObjectId, Object>,
    pub scopes: ScopeTree,
    /// The file-level scope holding the definitions
    pub top: ScopeId,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        let mut scopes = ScopeTree::default();
        let top = scopes.new_scope(None);

        Self {
            name: name.into(),
            objects: IndexVec::new(),
            scopes,
            top,
        }
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id]
    }

    /// Top-level definitions in declaration order
    pub fn definitions(&self) -> impl Iterator<Item = (&str, ObjectId)> {
        self.scopes.entries(self.top)
    }
}
