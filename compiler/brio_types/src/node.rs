//! Type and pack node representations.

use brio_ast::{Name, Span};
use smallvec::SmallVec;

use crate::flags::TypeFlags;
use crate::id::{PackId, TypeId};
use crate::level::Level;

/// Inline-capacity list of types: union members, pack heads, argument
/// lists. Four covers nearly all real code without spilling.
pub type TypeList = SmallVec<[TypeId; 4]>;

/// A type node in the pool.
///
/// Nodes are mutated in place during inference: `Free` becomes `Bound`
/// when unified, and unsealed `Table` nodes gain properties. All other
/// variants are immutable after allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// A primitive or sentinel type. Only the pre-allocated handles
    /// point at these.
    Prim(Prim),
    /// An unbound inference variable, created at a [`Level`].
    Free { level: Level },
    /// A variable that has been unified with another type. Forwarding
    /// link; chains are compressed on resolve.
    Bound(TypeId),
    /// A generic type parameter, quantified by some function type.
    Generic { name: Option<Name>, level: Level },
    /// A table type.
    Table(TableType),
    /// A function type.
    Function(FunctionType),
    /// A union of alternatives. Canonicalized on construction:
    /// flattened, deduplicated, `never` dropped, absorbed by `any`.
    Union(TypeList),
    /// An intersection. Canonicalized like unions (dual rules).
    Intersection(TypeList),
}

/// Primitive and sentinel types. One node of each is pre-allocated in
/// every pool at the fixed [`TypeId`] constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prim {
    Nil,
    Boolean,
    Number,
    String,
    Thread,
    /// Unifies with everything in both directions.
    Any,
    /// Top: everything is a subtype; nothing flows out without a check.
    Unknown,
    /// Bottom: no values.
    Never,
    /// Error sentinel. Unifies with everything so one mistake does not
    /// cascade into a wall of follow-on diagnostics.
    Error,
}

impl Prim {
    /// The display name of the primitive.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Thread => "thread",
            Self::Any => "any",
            Self::Unknown => "unknown",
            Self::Never => "never",
            Self::Error => "<error>",
        }
    }
}

/// Whether a table can still gain properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Shape is fixed. Missing properties are errors.
    Sealed,
    /// A table literal still in its constructing scope. Assigning to a
    /// missing property adds it; reading one is still an error.
    Unsealed,
    /// A free table: a table whose full shape is not yet known.
    /// Unifying against it adds the properties it is used with.
    Free,
}

/// A named table property.
#[derive(Debug, Clone, PartialEq)]
pub struct TableProp {
    pub name: Name,
    pub ty: TypeId,
    pub read_only: bool,
    /// Where the property was defined, for diagnostics.
    pub span: Span,
}

/// An optional `[K]: V` indexer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indexer {
    pub key: TypeId,
    pub value: TypeId,
}

/// A table type: named properties, optional indexer, optional
/// metatable, and a sealed/unsealed state.
///
/// Properties are kept in insertion order; tables are small enough
/// that linear lookup beats hashing, and order is deterministic for
/// display.
#[derive(Debug, Clone, PartialEq)]
pub struct TableType {
    pub props: Vec<TableProp>,
    pub indexer: Option<Indexer>,
    pub metatable: Option<TypeId>,
    pub state: TableState,
    /// Level the table was created at. Unsealed and free tables may
    /// only be mutated from scopes at or below this level.
    pub level: Level,
}

impl TableType {
    /// An empty table in the given state at the given level.
    pub fn empty(state: TableState, level: Level) -> Self {
        Self { props: Vec::new(), indexer: None, metatable: None, state, level }
    }

    /// Look up a property by name.
    pub fn prop(&self, name: Name) -> Option<&TableProp> {
        self.props.iter().find(|p| p.name == name)
    }

    /// Whether assignment may add new properties.
    pub fn is_extensible(&self) -> bool {
        matches!(self.state, TableState::Unsealed | TableState::Free)
    }
}

/// A function type: quantified generics plus parameter and return
/// packs.
///
/// `generics` and `generic_packs` list the `Generic` nodes this
/// function binds; instantiation replaces exactly those with fresh
/// free variables.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub generics: SmallVec<[TypeId; 2]>,
    pub generic_packs: SmallVec<[PackId; 1]>,
    pub params: PackId,
    pub rets: PackId,
}

impl FunctionType {
    /// A monomorphic function.
    pub fn new(params: PackId, rets: PackId) -> Self {
        Self {
            generics: SmallVec::new(),
            generic_packs: SmallVec::new(),
            params,
            rets,
        }
    }

    /// Whether instantiation would do anything.
    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty() || !self.generic_packs.is_empty()
    }
}

/// A type-pack node in the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum PackNode {
    /// A finite head of types followed by an optional tail pack.
    List { head: TypeList, tail: Option<PackId> },
    /// An unbound pack variable.
    Free { level: Level },
    /// A pack variable unified with another pack.
    Bound(PackId),
    /// Zero or more repetitions of a single type (`...T`).
    Variadic(TypeId),
    /// A generic pack parameter, quantified by some function type.
    Generic { name: Option<Name> },
}

impl PackNode {
    /// An empty, closed list.
    pub fn empty() -> Self {
        Self::List { head: TypeList::new(), tail: None }
    }
}

/// Flags for a freshly allocated node, from its own shape only.
/// Child flags are OR-ed in by the pool.
pub fn own_flags(node: &TypeNode) -> TypeFlags {
    match node {
        TypeNode::Prim(Prim::Error) => TypeFlags::HAS_ERROR,
        TypeNode::Prim(_) => TypeFlags::empty(),
        TypeNode::Free { .. } => TypeFlags::HAS_FREE,
        TypeNode::Generic { .. } => TypeFlags::HAS_GENERIC,
        TypeNode::Bound(_)
        | TypeNode::Table(_)
        | TypeNode::Function(_)
        | TypeNode::Union(_)
        | TypeNode::Intersection(_) => TypeFlags::empty(),
    }
}
