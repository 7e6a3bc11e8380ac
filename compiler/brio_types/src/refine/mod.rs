//! Branch-condition refinement.
//!
//! A condition like `type(x) == "number"`, `x == nil`, or a bare
//! truthiness test partitions the scrutinee's type between the two
//! branches. Refinement is best-effort: when a type resists
//! normalization or the condition cannot discriminate, the original
//! type is kept rather than guessing.

use crate::config::Config;
use crate::id::{PackId, TypeId};
use crate::level::Level;
use crate::node::TableState;
use crate::normalize::{normalize, NormalForm};
use crate::pool::Pool;

/// The runtime tags `type(x)` can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Nil,
    Boolean,
    Number,
    String,
    Thread,
    Table,
    Function,
}

impl TypeTag {
    /// Parse the string literal compared against `type(x)`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "nil" => Some(Self::Nil),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "thread" => Some(Self::Thread),
            "table" => Some(Self::Table),
            "function" => Some(Self::Function),
            _ => None,
        }
    }
}

/// What a branch condition asserts about an lvalue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// `type(x) == "tag"`
    IsTag(TypeTag),
    /// `x == nil`
    EqNil,
    /// `if x then` (truthiness)
    Truthy,
    /// `x == y` for a non-literal `y`, carrying `y`'s type. The true
    /// branch narrows toward the overlap of the two types; the false
    /// branch is left alone even when the types are provably disjoint,
    /// since distinct values can share a type.
    EqOther(TypeId),
}

/// Narrow `ty` under `predicate`. `positive` selects the then-branch
/// view; the else-branch is the same predicate negated. `level` is the
/// scope level used when a refinement has to invent a witness type.
pub fn refine(
    pool: &mut Pool,
    config: &Config,
    level: Level,
    ty: TypeId,
    predicate: Predicate,
    positive: bool,
) -> TypeId {
    let ty = pool.resolve(ty);
    if ty == TypeId::ERROR {
        return ty;
    }
    let Ok(form) = normalize(pool, config, ty) else {
        // Too complex to split; leave the branch unrefined.
        return ty;
    };

    match (predicate, positive) {
        (Predicate::EqOther(other), true) => {
            let other = pool.resolve(other);
            let Ok(other_form) = normalize(pool, config, other) else {
                return ty;
            };
            if is_indeterminate(&other_form) {
                return ty;
            }
            if is_indeterminate(&form) {
                // The other side knows more; equality adopts its view.
                return other_form.to_type(pool);
            }
            intersect_categories(form, &other_form).to_type(pool)
        }
        (Predicate::EqOther(_), false) => ty,
        (Predicate::IsTag(tag), true) => refine_to_tag(pool, level, &form, tag),
        (Predicate::IsTag(tag), false) => drop_tag(pool, &form, tag),
        (Predicate::EqNil, true) => {
            if form.nil || is_indeterminate(&form) {
                TypeId::NIL
            } else {
                TypeId::NEVER
            }
        }
        (Predicate::EqNil, false) => {
            let mut form = form;
            form.nil = false;
            form.to_type(pool)
        }
        (Predicate::Truthy, true) => {
            // Only nil is provably stripped; `false` would need
            // singleton booleans.
            let mut form = form;
            form.nil = false;
            form.to_type(pool)
        }
        (Predicate::Truthy, false) => {
            let mut members: Vec<TypeId> = Vec::new();
            if form.nil || is_indeterminate(&form) {
                members.push(TypeId::NIL);
            }
            if form.boolean || is_indeterminate(&form) {
                members.push(TypeId::BOOLEAN);
            }
            pool.union(members)
        }
    }
}

/// Category-level overlap of two forms. Tables and functions are kept
/// whole when the other side has any member of the same category;
/// deciding per-member overlap would need full subtype queries.
fn intersect_categories(mut form: NormalForm, other: &NormalForm) -> NormalForm {
    form.nil &= other.nil;
    form.boolean &= other.boolean;
    form.number &= other.number;
    form.string &= other.string;
    form.thread &= other.thread;
    if other.tables.is_empty() {
        form.tables.clear();
    }
    if other.functions.is_empty() {
        form.functions.clear();
    }
    form
}

/// Whether the form contains members whose tag is not statically
/// known, so a positive test may still succeed.
fn is_indeterminate(form: &NormalForm) -> bool {
    form.any || form.unknown || form.error || !form.opaque.is_empty()
}

fn refine_to_tag(pool: &mut Pool, level: Level, form: &NormalForm, tag: TypeTag) -> TypeId {
    let mut members: Vec<TypeId> = Vec::new();
    match tag {
        TypeTag::Nil if form.nil => members.push(TypeId::NIL),
        TypeTag::Boolean if form.boolean => members.push(TypeId::BOOLEAN),
        TypeTag::Number if form.number => members.push(TypeId::NUMBER),
        TypeTag::String if form.string => members.push(TypeId::STRING),
        TypeTag::Thread if form.thread => members.push(TypeId::THREAD),
        TypeTag::Table => members.extend_from_slice(&form.tables),
        TypeTag::Function => members.extend_from_slice(&form.functions),
        _ => {}
    }
    if members.is_empty() && is_indeterminate(form) {
        members.push(witness(pool, level, tag));
    }
    pool.union(members)
}

fn drop_tag(pool: &mut Pool, form: &NormalForm, tag: TypeTag) -> TypeId {
    let mut form = form.clone();
    match tag {
        TypeTag::Nil => form.nil = false,
        TypeTag::Boolean => form.boolean = false,
        TypeTag::Number => form.number = false,
        TypeTag::String => form.string = false,
        TypeTag::Thread => form.thread = false,
        TypeTag::Table => form.tables.clear(),
        TypeTag::Function => form.functions.clear(),
    }
    form.to_type(pool)
}

/// The broadest type with the given tag, for scrutinees whose own type
/// gives no better candidate.
fn witness(pool: &mut Pool, level: Level, tag: TypeTag) -> TypeId {
    match tag {
        TypeTag::Nil => TypeId::NIL,
        TypeTag::Boolean => TypeId::BOOLEAN,
        TypeTag::Number => TypeId::NUMBER,
        TypeTag::String => TypeId::STRING,
        TypeTag::Thread => TypeId::THREAD,
        TypeTag::Table => pool.table(TableState::Free, level),
        TypeTag::Function => pool.function(PackId::ANY, PackId::ANY),
    }
}
