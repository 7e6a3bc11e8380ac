//! Expression and statement trees consumed by the checker.
//!
//! Expressions live in an [`ExprArena`] and are referenced by [`ExprId`],
//! so the checker can record an inferred type per expression without
//! borrowing into the tree. Statements own their children directly; the
//! checker walks them once, top to bottom.

use smallvec::SmallVec;

use crate::{Name, Span};

/// Handle to an expression in an [`ExprArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    /// Create from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        ExprId(raw)
    }

    /// Get the raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Arena of expressions for one module.
#[derive(Default)]
pub struct ExprArena {
    exprs: Vec<Expr>,
    spans: Vec<Span>,
}

impl ExprArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an expression, returning its handle.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` expressions are allocated.
    pub fn alloc(&mut self, expr: Expr, span: Span) -> ExprId {
        let raw = u32::try_from(self.exprs.len()).unwrap_or_else(|_| {
            panic!("expression arena overflow: more than u32::MAX expressions")
        });
        self.exprs.push(expr);
        self.spans.push(span);
        ExprId(raw)
    }

    /// Look up an expression by handle.
    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    /// Look up the span of an expression.
    #[inline]
    pub fn span(&self, id: ExprId) -> Span {
        self.spans[id.0 as usize]
    }

    /// Number of allocated expressions.
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Check whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

/// A parsed module: a statement body plus the expression arena it indexes.
pub struct Module {
    pub body: Vec<Stat>,
    pub exprs: ExprArena,
}

impl Module {
    /// Create a module from a body and its arena.
    pub fn new(body: Vec<Stat>, exprs: ExprArena) -> Self {
        Module { body, exprs }
    }
}

/// An assignable path: a base variable plus zero or more field accesses.
///
/// Also used as the key for branch-local refinements, which narrow the
/// type observed through a specific path.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct LValue {
    pub base: Name,
    pub path: SmallVec<[Name; 2]>,
}

impl LValue {
    /// A bare variable reference.
    pub fn name(base: Name) -> Self {
        LValue {
            base,
            path: SmallVec::new(),
        }
    }

    /// A field access chain rooted at `base`.
    pub fn field(base: Name, path: impl IntoIterator<Item = Name>) -> Self {
        LValue {
            base,
            path: path.into_iter().collect(),
        }
    }
}

/// Binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Operators whose result is always `boolean`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// Arithmetic operators over numbers.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow
        )
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum UnOp {
    Not,
    Neg,
    Len,
}

/// An expression node.
pub enum Expr {
    Nil,
    True,
    False,
    Number(f64),
    /// String literal; contents interned like identifiers.
    Str(Name),
    /// `...` in a vararg function.
    Vararg,
    /// Variable reference (local or global; resolution is scope lookup).
    Name(Name),
    /// Field access `object.key`.
    Index { object: ExprId, key: Name },
    /// Function or method call.
    Call { func: ExprId, args: Vec<ExprId> },
    /// Anonymous function.
    Function(FunctionBody),
    /// Table constructor.
    Table(Vec<TableItem>),
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary {
        op: UnOp,
        operand: ExprId,
    },
    /// Type ascription `expr :: T`.
    Ascription { expr: ExprId, annot: TypeAnnot },
}

/// One entry in a table constructor.
pub enum TableItem {
    /// `key = value`
    Named { key: Name, value: ExprId },
    /// Positional entry (contributes to the numeric indexer).
    Item(ExprId),
}

/// A function literal: parameters, optional annotations, and a body.
pub struct FunctionBody {
    pub params: Vec<Param>,
    pub is_vararg: bool,
    pub vararg_annot: Option<TypeAnnot>,
    pub ret_annot: Option<PackAnnot>,
    pub body: Vec<Stat>,
}

/// One function parameter.
pub struct Param {
    pub name: Name,
    pub annot: Option<TypeAnnot>,
    pub span: Span,
}

/// A statement node.
pub enum Stat {
    /// `local a, b = e1, e2`
    Local {
        names: Vec<(Name, Option<TypeAnnot>)>,
        exprs: Vec<ExprId>,
        span: Span,
    },
    /// `a.b.c, d = e1, e2`
    Assign {
        targets: Vec<(LValue, Span)>,
        exprs: Vec<ExprId>,
        span: Span,
    },
    If {
        cond: ExprId,
        then_body: Vec<Stat>,
        else_body: Vec<Stat>,
        span: Span,
    },
    While {
        cond: ExprId,
        body: Vec<Stat>,
        span: Span,
    },
    Return {
        exprs: Vec<ExprId>,
        span: Span,
    },
    /// `local function f() ... end`; `func` must be an `Expr::Function`.
    LocalFunction {
        name: Name,
        func: ExprId,
        span: Span,
    },
    /// Expression evaluated for effect (usually a call).
    ExprStat { expr: ExprId, span: Span },
}

impl Stat {
    /// The source span of this statement.
    pub fn span(&self) -> Span {
        match self {
            Stat::Local { span, .. }
            | Stat::Assign { span, .. }
            | Stat::If { span, .. }
            | Stat::While { span, .. }
            | Stat::Return { span, .. }
            | Stat::LocalFunction { span, .. }
            | Stat::ExprStat { span, .. } => *span,
        }
    }
}

/// A surface type annotation, as handed over by the parser.
///
/// Annotation *syntax* is owned by the parser; this is the already-shaped
/// tree the checker resolves into arena types.
#[derive(Clone)]
pub enum TypeAnnot {
    /// `nil`, `boolean`, `number`, `string`, `thread`, `any`, `unknown`,
    /// `never`, or a user alias.
    Named(Name),
    /// `T?`
    Optional(Box<TypeAnnot>),
    /// `A | B | C`
    Union(Vec<TypeAnnot>),
    /// `A & B & C`
    Intersection(Vec<TypeAnnot>),
    /// `{ key: T, ..., [K]: V }`
    Table {
        props: Vec<(Name, TypeAnnot)>,
        indexer: Option<Box<(TypeAnnot, TypeAnnot)>>,
    },
    /// `(A, B, ...C) -> (R1, ...R2)`
    Function { args: PackAnnot, rets: PackAnnot },
}

/// An annotated type pack: fixed head plus optional variadic tail.
#[derive(Clone)]
pub struct PackAnnot {
    pub head: Vec<TypeAnnot>,
    pub variadic: Option<Box<TypeAnnot>>,
}

impl PackAnnot {
    /// An empty, closed pack `()`.
    pub fn empty() -> Self {
        PackAnnot {
            head: Vec::new(),
            variadic: None,
        }
    }

    /// A fixed pack with no variadic tail.
    pub fn fixed(head: Vec<TypeAnnot>) -> Self {
        PackAnnot {
            head,
            variadic: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_round_trip() {
        let mut arena = ExprArena::new();
        let id = arena.alloc(Expr::Nil, Span::new(0, 3));
        assert!(matches!(arena.get(id), Expr::Nil));
        assert_eq!(arena.span(id), Span::new(0, 3));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn lvalue_equality_ignores_nothing() {
        let x = Name::from_raw(1);
        let y = Name::from_raw(2);
        assert_eq!(LValue::name(x), LValue::name(x));
        assert_ne!(LValue::name(x), LValue::name(y));
        assert_ne!(LValue::name(x), LValue::field(x, [y]));
    }
}
