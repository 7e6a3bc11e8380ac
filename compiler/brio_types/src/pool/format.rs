//! Human-readable rendering of types for diagnostics.

use std::fmt::Write;

use rustc_hash::FxHashSet;

use crate::id::{PackId, TypeId};
use crate::node::{PackNode, TableState, TypeNode};
use crate::pool::Pool;

/// Limit on render depth. Diagnostics do not benefit from types deeper
/// than this; the remainder is elided.
const MAX_DEPTH: usize = 16;

/// Renders types from a pool into diagnostic strings.
///
/// Cyclic types are rendered with `<cycle>` at the back-edge; the
/// formatter never recurses into a node it is already printing.
pub struct TypeFormatter<'p> {
    pool: &'p Pool,
    in_progress: FxHashSet<TypeId>,
    packs_in_progress: FxHashSet<PackId>,
}

impl<'p> TypeFormatter<'p> {
    pub fn new(pool: &'p Pool) -> Self {
        Self {
            pool,
            in_progress: FxHashSet::default(),
            packs_in_progress: FxHashSet::default(),
        }
    }

    /// Render a type.
    pub fn format(&mut self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_type(&mut out, id, 0, false);
        out
    }

    /// Render a pack, parenthesized.
    pub fn format_pack(&mut self, id: PackId) -> String {
        let mut out = String::new();
        out.push('(');
        self.write_pack_inner(&mut out, id, 0);
        out.push(')');
        out
    }

    fn write_type(&mut self, out: &mut String, id: TypeId, depth: usize, parenthesize: bool) {
        if depth > MAX_DEPTH {
            out.push_str("...");
            return;
        }
        let id = self.pool.resolve_readonly(id);
        if !self.in_progress.insert(id) {
            out.push_str("<cycle>");
            return;
        }
        self.write_resolved(out, id, depth, parenthesize);
        self.in_progress.remove(&id);
    }

    fn write_resolved(&mut self, out: &mut String, id: TypeId, depth: usize, parenthesize: bool) {
        match self.pool.get(id) {
            TypeNode::Prim(prim) => out.push_str(prim.name()),
            TypeNode::Free { .. } => {
                let _ = write!(out, "'{}", id.raw());
            }
            TypeNode::Bound(_) => out.push_str("<bound>"),
            TypeNode::Generic { name, .. } => match name {
                Some(name) => out.push_str(self.pool.interner().resolve_or_unknown(*name)),
                None => {
                    let _ = write!(out, "T{}", id.raw());
                }
            },
            TypeNode::Table(tt) => {
                let tt = tt.clone();
                out.push('{');
                let mut first = true;
                for prop in &tt.props {
                    if !std::mem::take(&mut first) {
                        out.push(',');
                    }
                    out.push(' ');
                    out.push_str(self.pool.interner().resolve_or_unknown(prop.name));
                    out.push_str(": ");
                    self.write_type(out, prop.ty, depth + 1, false);
                }
                if let Some(ix) = tt.indexer {
                    if !std::mem::take(&mut first) {
                        out.push(',');
                    }
                    out.push_str(" [");
                    self.write_type(out, ix.key, depth + 1, false);
                    out.push_str("]: ");
                    self.write_type(out, ix.value, depth + 1, false);
                }
                if !first {
                    out.push(' ');
                }
                out.push('}');
                if tt.state != TableState::Sealed {
                    // Open tables can still gain properties; make that
                    // visible in errors about them.
                    out.push('*');
                }
                if let Some(mt) = tt.metatable {
                    out.push_str(" with metatable ");
                    self.write_type(out, mt, depth + 1, true);
                }
            }
            TypeNode::Function(ft) => {
                let ft = ft.clone();
                if parenthesize {
                    out.push('(');
                }
                if ft.is_generic() {
                    out.push('<');
                    let mut first = true;
                    for &g in &ft.generics {
                        if !std::mem::take(&mut first) {
                            out.push_str(", ");
                        }
                        self.write_type(out, g, depth + 1, false);
                    }
                    for &gp in &ft.generic_packs {
                        if !std::mem::take(&mut first) {
                            out.push_str(", ");
                        }
                        self.write_pack_inner(out, gp, depth + 1);
                    }
                    out.push('>');
                }
                out.push('(');
                self.write_pack_inner(out, ft.params, depth + 1);
                out.push_str(") -> (");
                self.write_pack_inner(out, ft.rets, depth + 1);
                out.push(')');
                if parenthesize {
                    out.push(')');
                }
            }
            TypeNode::Union(members) => {
                let members = members.clone();
                // `T | nil` reads better as `T?`.
                if members.len() == 2 && members.contains(&TypeId::NIL) {
                    let other = if members[0] == TypeId::NIL { members[1] } else { members[0] };
                    self.write_type(out, other, depth + 1, true);
                    out.push('?');
                    return;
                }
                if parenthesize {
                    out.push('(');
                }
                let mut first = true;
                for &m in &members {
                    if !std::mem::take(&mut first) {
                        out.push_str(" | ");
                    }
                    self.write_type(out, m, depth + 1, true);
                }
                if parenthesize {
                    out.push(')');
                }
            }
            TypeNode::Intersection(members) => {
                let members = members.clone();
                if parenthesize {
                    out.push('(');
                }
                let mut first = true;
                for &m in &members {
                    if !std::mem::take(&mut first) {
                        out.push_str(" & ");
                    }
                    self.write_type(out, m, depth + 1, true);
                }
                if parenthesize {
                    out.push(')');
                }
            }
        }
    }

    fn write_pack_inner(&mut self, out: &mut String, id: PackId, depth: usize) {
        if depth > MAX_DEPTH {
            out.push_str("...");
            return;
        }
        let id = self.pool.resolve_pack_readonly(id);
        if !self.packs_in_progress.insert(id) {
            out.push_str("<cycle>");
            return;
        }
        match self.pool.get_pack(id) {
            PackNode::List { head, tail } => {
                let head = head.clone();
                let tail = *tail;
                let mut first = true;
                for &ty in &head {
                    if !std::mem::take(&mut first) {
                        out.push_str(", ");
                    }
                    self.write_type(out, ty, depth + 1, false);
                }
                if let Some(tail) = tail {
                    if !first {
                        out.push_str(", ");
                    }
                    self.write_pack_inner(out, tail, depth + 1);
                }
            }
            PackNode::Free { .. } => {
                let _ = write!(out, "...'{}", id.raw());
            }
            PackNode::Bound(_) => out.push_str("<bound>"),
            PackNode::Variadic(ty) => {
                let ty = *ty;
                out.push_str("...");
                self.write_type(out, ty, depth + 1, true);
            }
            PackNode::Generic { name } => match name {
                Some(name) => {
                    let _ = write!(out, "...{}", self.pool.interner().resolve_or_unknown(*name));
                }
                None => {
                    let _ = write!(out, "...P{}", id.raw());
                }
            },
        }
        self.packs_in_progress.remove(&id);
    }
}
