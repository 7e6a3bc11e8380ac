//! Disjunctive normal form for refinement.
//!
//! A [`NormalForm`] splits a type into the runtime categories a branch
//! condition can distinguish: one flag per primitive plus the table,
//! function, and opaque members. Refinement filters the categories and
//! rebuilds a type from what is left.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::config::Config;
use crate::id::TypeId;
use crate::node::{Prim, TypeNode};
use crate::pool::Pool;

/// The normalization budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("type is too complex to normalize")]
pub struct NormalizeTooComplex;

/// A type split by runtime category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalForm {
    pub any: bool,
    pub unknown: bool,
    pub error: bool,
    pub nil: bool,
    pub boolean: bool,
    pub number: bool,
    pub string: bool,
    pub thread: bool,
    pub tables: Vec<TypeId>,
    pub functions: Vec<TypeId>,
    /// Members that do not decompose: free variables, generics, and
    /// intersections. Refinement keeps or drops them whole.
    pub opaque: Vec<TypeId>,
}

impl NormalForm {
    /// No category present: the type is uninhabited.
    pub fn is_never(&self) -> bool {
        !(self.any
            || self.unknown
            || self.error
            || self.nil
            || self.boolean
            || self.number
            || self.string
            || self.thread)
            && self.tables.is_empty()
            && self.functions.is_empty()
            && self.opaque.is_empty()
    }

    /// Rebuild a type from the remaining categories.
    pub fn to_type(&self, pool: &mut Pool) -> TypeId {
        if self.any {
            return TypeId::ANY;
        }
        if self.unknown {
            return TypeId::UNKNOWN;
        }
        let mut members: Vec<TypeId> = Vec::new();
        if self.error {
            members.push(TypeId::ERROR);
        }
        if self.nil {
            members.push(TypeId::NIL);
        }
        if self.boolean {
            members.push(TypeId::BOOLEAN);
        }
        if self.number {
            members.push(TypeId::NUMBER);
        }
        if self.string {
            members.push(TypeId::STRING);
        }
        if self.thread {
            members.push(TypeId::THREAD);
        }
        members.extend_from_slice(&self.tables);
        members.extend_from_slice(&self.functions);
        members.extend_from_slice(&self.opaque);
        pool.union(members)
    }
}

/// Normalize a type, walking unions up to the configured budget.
pub fn normalize(
    pool: &Pool,
    config: &Config,
    ty: TypeId,
) -> Result<NormalForm, NormalizeTooComplex> {
    let mut form = NormalForm::default();
    let mut budget = config.normalization_limit;
    let mut seen = FxHashSet::default();
    visit(pool, ty, &mut form, &mut budget, &mut seen)?;
    Ok(form)
}

fn visit(
    pool: &Pool,
    ty: TypeId,
    form: &mut NormalForm,
    budget: &mut usize,
    seen: &mut FxHashSet<TypeId>,
) -> Result<(), NormalizeTooComplex> {
    let ty = pool.resolve_readonly(ty);
    if !seen.insert(ty) {
        return Ok(());
    }
    *budget = budget.checked_sub(1).ok_or(NormalizeTooComplex)?;

    match pool.get(ty) {
        TypeNode::Prim(prim) => {
            match prim {
                Prim::Nil => form.nil = true,
                Prim::Boolean => form.boolean = true,
                Prim::Number => form.number = true,
                Prim::String => form.string = true,
                Prim::Thread => form.thread = true,
                Prim::Any => form.any = true,
                Prim::Unknown => form.unknown = true,
                Prim::Never => {}
                Prim::Error => form.error = true,
            }
            Ok(())
        }
        TypeNode::Union(members) => {
            for &m in members {
                visit(pool, m, form, budget, seen)?;
            }
            Ok(())
        }
        TypeNode::Table(_) => {
            form.tables.push(ty);
            Ok(())
        }
        TypeNode::Function(_) => {
            form.functions.push(ty);
            Ok(())
        }
        TypeNode::Free { .. }
        | TypeNode::Generic { .. }
        | TypeNode::Intersection(_)
        | TypeNode::Bound(_) => {
            form.opaque.push(ty);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use brio_ast::StringInterner;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::level::Level;
    use crate::node::TableState;

    fn pool() -> Pool {
        Pool::new(Arc::new(StringInterner::new()))
    }

    #[test]
    fn splits_a_union_by_category() {
        let mut pool = pool();
        let table = pool.table(TableState::Sealed, Level::ROOT);
        let ty = pool.union([TypeId::NUMBER, TypeId::NIL, table]);

        let form = normalize(&pool, &Config::default(), ty).unwrap();
        assert!(form.number);
        assert!(form.nil);
        assert_eq!(form.tables, vec![table]);
        assert!(!form.string);
    }

    #[test]
    fn never_normalizes_to_empty() {
        let pool = pool();
        let form = normalize(&pool, &Config::default(), TypeId::NEVER).unwrap();
        assert!(form.is_never());
    }

    #[test]
    fn round_trips_through_to_type() {
        let mut pool = pool();
        let ty = pool.union([TypeId::NUMBER, TypeId::STRING]);
        let form = normalize(&pool, &Config::default(), ty).unwrap();
        let rebuilt = form.to_type(&mut pool);

        let rebuilt_form = normalize(&pool, &Config::default(), rebuilt).unwrap();
        assert_eq!(form, rebuilt_form);
    }

    #[test]
    fn budget_exhaustion_is_an_error() {
        let mut pool = pool();
        let members: Vec<TypeId> =
            (0..8).map(|_| pool.table(TableState::Sealed, Level::ROOT)).collect();
        let ty = pool.union(members);

        let config = Config { normalization_limit: 3, ..Config::default() };
        assert_eq!(normalize(&pool, &config, ty), Err(NormalizeTooComplex));
    }

    #[test]
    fn frees_stay_opaque() {
        let mut pool = pool();
        let free = pool.fresh_free(Level::ROOT);
        let ty = pool.union([free, TypeId::NIL]);

        let form = normalize(&pool, &Config::default(), ty).unwrap();
        assert_eq!(form.opaque, vec![free]);
        assert!(form.nil);
    }
}
