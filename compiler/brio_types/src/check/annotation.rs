//! Resolution of surface type annotations into arena types.

use brio_ast::{PackAnnot, Span, TypeAnnot};

use crate::id::{PackId, TypeId};
use crate::node::{Indexer, TableProp, TableState, TableType, TypeList, TypeNode};
use crate::scope::ScopeId;
use crate::type_error::TypeErrorKind;

use super::Checker;

impl<'m> Checker<'m> {
    /// Resolve a surface annotation to an arena type in the given
    /// scope. Unknown names report and resolve to the error sentinel.
    pub fn resolve_annotation(
        &mut self,
        scope: ScopeId,
        annot: &TypeAnnot,
        span: Span,
    ) -> TypeId {
        match annot {
            TypeAnnot::Named(name) => match self.interner.resolve_or_unknown(*name) {
                "nil" => TypeId::NIL,
                "boolean" => TypeId::BOOLEAN,
                "number" => TypeId::NUMBER,
                "string" => TypeId::STRING,
                "thread" => TypeId::THREAD,
                "any" => TypeId::ANY,
                "unknown" => TypeId::UNKNOWN,
                "never" => TypeId::NEVER,
                other => {
                    self.error(
                        TypeErrorKind::UnknownAnnotation { name: other.to_owned() },
                        span,
                    );
                    TypeId::ERROR
                }
            },
            TypeAnnot::Optional(inner) => {
                let inner = self.resolve_annotation(scope, inner, span);
                self.pool.optional(inner)
            }
            TypeAnnot::Union(members) => {
                let resolved: Vec<TypeId> = members
                    .iter()
                    .map(|m| self.resolve_annotation(scope, m, span))
                    .collect();
                self.pool.union(resolved)
            }
            TypeAnnot::Intersection(members) => {
                let resolved: Vec<TypeId> = members
                    .iter()
                    .map(|m| self.resolve_annotation(scope, m, span))
                    .collect();
                self.pool.intersection(resolved)
            }
            TypeAnnot::Table { props, indexer } => {
                let level = self.level(scope);
                let mut table = TableType::empty(TableState::Sealed, level);
                for (name, annot) in props {
                    let ty = self.resolve_annotation(scope, annot, span);
                    table.props.push(TableProp {
                        name: *name,
                        ty,
                        read_only: false,
                        span,
                    });
                }
                if let Some(kv) = indexer {
                    let key = self.resolve_annotation(scope, &kv.0, span);
                    let value = self.resolve_annotation(scope, &kv.1, span);
                    table.indexer = Some(Indexer { key, value });
                }
                self.pool.alloc(TypeNode::Table(table))
            }
            TypeAnnot::Function { args, rets } => {
                let params = self.resolve_pack_annotation(scope, args, span);
                let rets = self.resolve_pack_annotation(scope, rets, span);
                self.pool.function(params, rets)
            }
        }
    }

    pub(crate) fn resolve_pack_annotation(
        &mut self,
        scope: ScopeId,
        annot: &PackAnnot,
        span: Span,
    ) -> PackId {
        let mut head = TypeList::new();
        for member in &annot.head {
            head.push(self.resolve_annotation(scope, member, span));
        }
        match &annot.variadic {
            Some(inner) => {
                let ty = self.resolve_annotation(scope, inner, span);
                let tail = self.pool.variadic(ty);
                self.pool.pack_with_tail(head, tail)
            }
            None => self.pool.pack(head),
        }
    }
}
