use std::sync::Arc;

use brio_ast::{
    Expr, ExprArena, ExprId, FunctionBody, LValue, Module, Name, Param, PackAnnot, SharedInterner,
    Span, Stat, StringInterner, TableItem, TypeAnnot,
};
use brio_diagnostic::ErrorCode;
use pretty_assertions::assert_eq;

use super::{check_module, CheckResult, Checker};
use crate::config::Config;
use crate::id::TypeId;
use crate::level::Level;
use crate::node::TableState;
use crate::scope::ScopeId;

/// Hand-built module under construction. Spans are synthesized so that
/// every allocation gets a distinct one; the sink deduplicates by span,
/// and tests assert on codes, not locations.
struct ModuleBuilder {
    exprs: ExprArena,
    interner: SharedInterner,
    next_span: u32,
}

impl ModuleBuilder {
    fn new() -> Self {
        ModuleBuilder {
            exprs: ExprArena::new(),
            interner: Arc::new(StringInterner::new()),
            next_span: 0,
        }
    }

    fn span(&mut self) -> Span {
        let start = self.next_span;
        self.next_span += 1;
        Span::new(start, start + 1)
    }

    fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn expr(&mut self, e: Expr) -> ExprId {
        let span = self.span();
        self.exprs.alloc(e, span)
    }

    fn num(&mut self, v: f64) -> ExprId {
        self.expr(Expr::Number(v))
    }

    fn str_lit(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(Expr::Str(name))
    }

    fn var(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(Expr::Name(name))
    }

    fn index(&mut self, object: ExprId, key: &str) -> ExprId {
        let key = self.name(key);
        self.expr(Expr::Index { object, key })
    }

    fn call(&mut self, func: ExprId, args: Vec<ExprId>) -> ExprId {
        self.expr(Expr::Call { func, args })
    }

    fn local(&mut self, name: &str, annot: Option<TypeAnnot>, value: ExprId) -> Stat {
        let name = self.name(name);
        let span = self.span();
        Stat::Local { names: vec![(name, annot)], exprs: vec![value], span }
    }

    fn named(&self, s: &str) -> TypeAnnot {
        TypeAnnot::Named(self.name(s))
    }

    fn check(self, body: Vec<Stat>) -> CheckResult {
        self.check_with(body, Config::default())
    }

    fn check_with(self, body: Vec<Stat>, config: Config) -> CheckResult {
        let module = Module::new(body, self.exprs);
        check_module(&module, self.interner, config)
    }
}

fn codes(result: &CheckResult) -> Vec<ErrorCode> {
    result.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn local_annotation_mismatch() {
    let mut b = ModuleBuilder::new();
    // local x: number = "oops"
    let value = b.str_lit("oops");
    let annot = b.named("number");
    let stat = b.local("x", Some(annot), value);
    let result = b.check(vec![stat]);
    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
}

#[test]
fn unannotated_local_infers_from_value() {
    let mut b = ModuleBuilder::new();
    // local x = 1; local y: number = x
    let one = b.num(1.0);
    let s1 = b.local("x", None, one);
    let x = b.var("x");
    let annot = b.named("number");
    let s2 = b.local("y", Some(annot), x);
    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn unknown_variable_is_reported_once() {
    let mut b = ModuleBuilder::new();
    let y = b.var("y");
    let stat = b.local("x", None, y);
    let result = b.check(vec![stat]);
    assert_eq!(codes(&result), vec![ErrorCode::E2005]);
}

#[test]
fn unknown_annotation_is_reported() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let annot = b.named("wibble");
    let stat = b.local("x", Some(annot), one);
    let result = b.check(vec![stat]);
    assert!(codes(&result).contains(&ErrorCode::E2009));
}

#[test]
fn calling_a_number_is_not_callable() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let s1 = b.local("x", None, one);
    let x = b.var("x");
    let call = b.call(x, vec![]);
    let span = b.span();
    let s2 = Stat::ExprStat { expr: call, span };
    let result = b.check(vec![s1, s2]);
    assert_eq!(codes(&result), vec![ErrorCode::E2006]);
}

#[test]
fn argument_count_mismatch() {
    let mut b = ModuleBuilder::new();
    // local function f(a, b) return a end; f(1)
    let a_name = b.name("a");
    let a_span = b.span();
    let b_name = b.name("b");
    let b_span = b.span();
    let a_ref = b.var("a");
    let ret_span = b.span();
    let func = b.expr(Expr::Function(FunctionBody {
        params: vec![
            Param { name: a_name, annot: None, span: a_span },
            Param { name: b_name, annot: None, span: b_span },
        ],
        is_vararg: false,
        vararg_annot: None,
        ret_annot: None,
        body: vec![Stat::Return { exprs: vec![a_ref], span: ret_span }],
    }));
    let f_name = b.name("f");
    let def_span = b.span();
    let s1 = Stat::LocalFunction { name: f_name, func, span: def_span };

    let f_ref = b.var("f");
    let one = b.num(1.0);
    let call = b.call(f_ref, vec![one]);
    let call_span = b.span();
    let s2 = Stat::ExprStat { expr: call, span: call_span };
    let result = b.check(vec![s1, s2]);
    assert_eq!(codes(&result), vec![ErrorCode::E2008]);
}

#[test]
fn local_function_generalizes_over_call_sites() {
    let mut b = ModuleBuilder::new();
    // local function id(x) return x end
    // local a: number = id(1)
    // local s: string = id("s")
    let x_name = b.name("x");
    let x_span = b.span();
    let x_ref = b.var("x");
    let ret_span = b.span();
    let func = b.expr(Expr::Function(FunctionBody {
        params: vec![Param { name: x_name, annot: None, span: x_span }],
        is_vararg: false,
        vararg_annot: None,
        ret_annot: None,
        body: vec![Stat::Return { exprs: vec![x_ref], span: ret_span }],
    }));
    let id_name = b.name("id");
    let def_span = b.span();
    let s1 = Stat::LocalFunction { name: id_name, func, span: def_span };

    let id1 = b.var("id");
    let one = b.num(1.0);
    let call1 = b.call(id1, vec![one]);
    let num_annot = b.named("number");
    let s2 = b.local("a", Some(num_annot), call1);

    let id2 = b.var("id");
    let lit = b.str_lit("s");
    let call2 = b.call(id2, vec![lit]);
    let str_annot = b.named("string");
    let s3 = b.local("s", Some(str_annot), call2);

    let result = b.check(vec![s1, s2, s3]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn recursive_local_function_checks() {
    let mut b = ModuleBuilder::new();
    // local function loop(n) return loop(n) end
    let n_name = b.name("n");
    let n_span = b.span();
    let loop_ref = b.var("loop");
    let n_ref = b.var("n");
    let rec_call = b.call(loop_ref, vec![n_ref]);
    let ret_span = b.span();
    let func = b.expr(Expr::Function(FunctionBody {
        params: vec![Param { name: n_name, annot: None, span: n_span }],
        is_vararg: false,
        vararg_annot: None,
        ret_annot: None,
        body: vec![Stat::Return { exprs: vec![rec_call], span: ret_span }],
    }));
    let loop_name = b.name("loop");
    let def_span = b.span();
    let s1 = Stat::LocalFunction { name: loop_name, func, span: def_span };
    let result = b.check(vec![s1]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn typeof_refinement_narrows_a_union() {
    let mut b = ModuleBuilder::new();
    // local x: number | string = 1
    // if type(x) == "number" then local n: number = x
    // else local s: string = x end
    let one = b.num(1.0);
    let union = TypeAnnot::Union(vec![b.named("number"), b.named("string")]);
    let s1 = b.local("x", Some(union), one);

    let type_ref = b.var("type");
    let x_arg = b.var("x");
    let type_call = b.call(type_ref, vec![x_arg]);
    let tag = b.str_lit("number");
    let cond = b.expr(Expr::Binary { op: brio_ast::BinOp::Eq, lhs: type_call, rhs: tag });

    let x_then = b.var("x");
    let num_annot = b.named("number");
    let then_local = b.local("n", Some(num_annot), x_then);
    let x_else = b.var("x");
    let str_annot = b.named("string");
    let else_local = b.local("s", Some(str_annot), x_else);
    let if_span = b.span();
    let s2 = Stat::If {
        cond,
        then_body: vec![then_local],
        else_body: vec![else_local],
        span: if_span,
    };

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn nil_check_narrows_optional() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1
    // if x == nil then else local n: number = x end
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);

    let x_ref = b.var("x");
    let nil = b.expr(Expr::Nil);
    let cond = b.expr(Expr::Binary { op: brio_ast::BinOp::Eq, lhs: x_ref, rhs: nil });
    let x_else = b.var("x");
    let num_annot = b.named("number");
    let else_local = b.local("n", Some(num_annot), x_else);
    let if_span = b.span();
    let s2 = Stat::If { cond, then_body: vec![], else_body: vec![else_local], span: if_span };

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn truthiness_narrows_optional() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1
    // if x then local n: number = x end
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);

    let cond = b.var("x");
    let x_then = b.var("x");
    let num_annot = b.named("number");
    let then_local = b.local("n", Some(num_annot), x_then);
    let if_span = b.span();
    let s2 = Stat::If { cond, then_body: vec![then_local], else_body: vec![], span: if_span };

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn refinement_does_not_leak_past_the_branch() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1
    // if x then end
    // local n: number = x    -- still number?
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);

    let cond = b.var("x");
    let if_span = b.span();
    let s2 = Stat::If { cond, then_body: vec![], else_body: vec![], span: if_span };

    let x_after = b.var("x");
    let num_annot = b.named("number");
    let s3 = b.local("n", Some(num_annot), x_after);

    let result = b.check(vec![s1, s2, s3]);
    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
}

#[test]
fn or_default_strips_nil() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1; local n: number = x or 0
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);

    let x_ref = b.var("x");
    let zero = b.num(0.0);
    let or = b.expr(Expr::Binary { op: brio_ast::BinOp::Or, lhs: x_ref, rhs: zero });
    let num_annot = b.named("number");
    let s2 = b.local("n", Some(num_annot), or);

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn table_gains_properties_by_assignment() {
    let mut b = ModuleBuilder::new();
    // local t = {}; t.x = 1; local n: number = t.x
    let empty = b.expr(Expr::Table(vec![]));
    let s1 = b.local("t", None, empty);

    let t_name = b.name("t");
    let x_name = b.name("x");
    let one = b.num(1.0);
    let assign_span = b.span();
    let target_span = b.span();
    let s2 = Stat::Assign {
        targets: vec![(LValue::field(t_name, [x_name]), target_span)],
        exprs: vec![one],
        span: assign_span,
    };

    let t_ref = b.var("t");
    let read = b.index(t_ref, "x");
    let num_annot = b.named("number");
    let s3 = b.local("n", Some(num_annot), read);

    let result = b.check(vec![s1, s2, s3]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn sealed_table_rejects_unknown_property() {
    let mut b = ModuleBuilder::new();
    // local t: { x: number } = { x = 1 }; local y = t.y
    let x_name = b.name("x");
    let one = b.num(1.0);
    let ctor = b.expr(Expr::Table(vec![TableItem::Named { key: x_name, value: one }]));
    let annot = TypeAnnot::Table {
        props: vec![(x_name, b.named("number"))],
        indexer: None,
    };
    let s1 = b.local("t", Some(annot), ctor);

    let t_ref = b.var("t");
    let read = b.index(t_ref, "y");
    let s2 = b.local("y", None, read);

    let result = b.check(vec![s1, s2]);
    assert_eq!(codes(&result), vec![ErrorCode::E2007]);
}

#[test]
fn pcall_prepends_a_boolean() {
    let mut b = ModuleBuilder::new();
    // local function f() return 1 end
    // local ok, v = pcall(f)
    // local okb: boolean = ok; local n: number = v
    let one = b.num(1.0);
    let ret_span = b.span();
    let func = b.expr(Expr::Function(FunctionBody {
        params: vec![],
        is_vararg: false,
        vararg_annot: None,
        ret_annot: None,
        body: vec![Stat::Return { exprs: vec![one], span: ret_span }],
    }));
    let f_name = b.name("f");
    let def_span = b.span();
    let s1 = Stat::LocalFunction { name: f_name, func, span: def_span };

    let pcall_ref = b.var("pcall");
    let f_ref = b.var("f");
    let call = b.call(pcall_ref, vec![f_ref]);
    let ok_name = b.name("ok");
    let v_name = b.name("v");
    let local_span = b.span();
    let s2 = Stat::Local {
        names: vec![(ok_name, None), (v_name, None)],
        exprs: vec![call],
        span: local_span,
    };

    let ok_ref = b.var("ok");
    let bool_annot = b.named("boolean");
    let s3 = b.local("okb", Some(bool_annot), ok_ref);
    let v_ref = b.var("v");
    let num_annot = b.named("number");
    let s4 = b.local("n", Some(num_annot), v_ref);

    let result = b.check(vec![s1, s2, s3, s4]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn assert_strips_nil_from_its_argument() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1; local n: number = assert(x)
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);

    let assert_ref = b.var("assert");
    let x_ref = b.var("x");
    let call = b.call(assert_ref, vec![x_ref]);
    let num_annot = b.named("number");
    let s2 = b.local("n", Some(num_annot), call);

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn vararg_outside_a_vararg_function_is_an_error() {
    let mut b = ModuleBuilder::new();
    // local f = function() local x = ... end
    let vararg = b.expr(Expr::Vararg);
    let inner = b.local("x", None, vararg);
    let func = b.expr(Expr::Function(FunctionBody {
        params: vec![],
        is_vararg: false,
        vararg_annot: None,
        ret_annot: None,
        body: vec![inner],
    }));
    let s1 = b.local("f", None, func);
    let result = b.check(vec![s1]);
    assert_eq!(codes(&result), vec![ErrorCode::E2011]);
}

#[test]
fn module_level_vararg_is_allowed() {
    let mut b = ModuleBuilder::new();
    // local x = ...
    let vararg = b.expr(Expr::Vararg);
    let s1 = b.local("x", None, vararg);
    let result = b.check(vec![s1]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn return_annotation_is_enforced() {
    let mut b = ModuleBuilder::new();
    // local f = function(): number return "s" end
    let lit = b.str_lit("s");
    let ret_span = b.span();
    let ret_annot = PackAnnot::fixed(vec![b.named("number")]);
    let func = b.expr(Expr::Function(FunctionBody {
        params: vec![],
        is_vararg: false,
        vararg_annot: None,
        ret_annot: Some(ret_annot),
        body: vec![Stat::Return { exprs: vec![lit], span: ret_span }],
    }));
    let s1 = b.local("f", None, func);
    let result = b.check(vec![s1]);
    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
}

#[test]
fn error_limit_caps_reported_errors() {
    let mut b = ModuleBuilder::new();
    let y = b.var("y");
    let s1 = b.local("a", None, y);
    let z = b.var("z");
    let s2 = b.local("b", None, z);
    let config = Config { error_limit: 1, ..Config::default() };
    let result = b.check_with(vec![s1, s2], config);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.diagnostics.len(), 1);
}

#[test]
fn while_condition_refines_the_body() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1
    // while x do local n: number = x end
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);

    let cond = b.var("x");
    let x_body = b.var("x");
    let num_annot = b.named("number");
    let body_local = b.local("n", Some(num_annot), x_body);
    let while_span = b.span();
    let s2 = Stat::While { cond, body: vec![body_local], span: while_span };

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn assignment_in_a_refined_branch_checks_the_narrowed_type() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1
    // local y: number? = 2
    // while x do x = y end    -- number? does not fit the narrowed x
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);
    let two = b.num(2.0);
    let y_annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s2 = b.local("y", Some(y_annot), two);

    let cond = b.var("x");
    let x_name = b.name("x");
    let y_ref = b.var("y");
    let target_span = b.span();
    let assign_span = b.span();
    let assign = Stat::Assign {
        targets: vec![(LValue::name(x_name), target_span)],
        exprs: vec![y_ref],
        span: assign_span,
    };
    let while_span = b.span();
    let s3 = Stat::While { cond, body: vec![assign], span: while_span };

    let result = b.check(vec![s1, s2, s3]);
    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
}

#[test]
fn assignment_fitting_the_refined_type_is_clean() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1
    // while x do x = 2 end
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);

    let cond = b.var("x");
    let x_name = b.name("x");
    let two = b.num(2.0);
    let target_span = b.span();
    let assign_span = b.span();
    let assign = Stat::Assign {
        targets: vec![(LValue::name(x_name), target_span)],
        exprs: vec![two],
        span: assign_span,
    };
    let while_span = b.span();
    let s2 = Stat::While { cond, body: vec![assign], span: while_span };

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn equality_with_a_typed_value_narrows_the_union() {
    let mut b = ModuleBuilder::new();
    // local x: number | string = 1
    // local y: number = 2
    // if x == y then local n: number = x end
    let one = b.num(1.0);
    let union = TypeAnnot::Union(vec![b.named("number"), b.named("string")]);
    let s1 = b.local("x", Some(union), one);
    let two = b.num(2.0);
    let y_annot = b.named("number");
    let s2 = b.local("y", Some(y_annot), two);

    let x_ref = b.var("x");
    let y_ref = b.var("y");
    let cond = b.expr(Expr::Binary { op: brio_ast::BinOp::Eq, lhs: x_ref, rhs: y_ref });
    let x_then = b.var("x");
    let num_annot = b.named("number");
    let then_local = b.local("n", Some(num_annot), x_then);
    let if_span = b.span();
    let s3 = Stat::If { cond, then_body: vec![then_local], else_body: vec![], span: if_span };

    let result = b.check(vec![s1, s2, s3]);
    assert_eq!(result.error_count, 0);
}

#[test]
fn resolved_annotations_format_back_to_source_syntax() {
    let mut b = ModuleBuilder::new();
    // local x: number? = 1; local y = x
    let one = b.num(1.0);
    let annot = TypeAnnot::Optional(Box::new(b.named("number")));
    let s1 = b.local("x", Some(annot), one);
    let x_ref = b.var("x");
    let s2 = b.local("y", None, x_ref);

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);

    let mut fmt = crate::pool::TypeFormatter::new(&result.pool);
    let ty = result.expr_types.get(&x_ref).copied();
    assert_eq!(ty.map(|t| fmt.format(t)), Some("number?".to_owned()));
}

#[test]
fn expression_types_are_recorded_for_tooling() {
    let mut b = ModuleBuilder::new();
    // local x = 1; local y = x
    let one = b.num(1.0);
    let s1 = b.local("x", None, one);
    let x_ref = b.var("x");
    let s2 = b.local("y", None, x_ref);

    let result = b.check(vec![s1, s2]);
    assert_eq!(result.error_count, 0);

    let mut fmt = crate::pool::TypeFormatter::new(&result.pool);
    let ty = result.expr_types.get(&x_ref).copied();
    assert_eq!(ty.map(|t| fmt.format(t)), Some("number".to_owned()));
}

#[test]
fn a_session_checks_statements_and_expressions_piecemeal() {
    let mut b = ModuleBuilder::new();
    // local x = 1, then ask for the type of `x` and resolve an
    // annotation against the same scope.
    let one = b.num(1.0);
    let stat = b.local("x", None, one);
    let x_ref = b.var("x");
    let annot = b.named("number");
    let annot_span = b.span();
    let module = Module::new(vec![], b.exprs);

    let mut checker = Checker::new(&module, b.interner, Config::default());
    checker.check_statement(ScopeId::ROOT, &stat);
    assert_eq!(checker.check_expr(ScopeId::ROOT, x_ref), TypeId::NUMBER);
    assert_eq!(checker.resolve_annotation(ScopeId::ROOT, &annot, annot_span), TypeId::NUMBER);

    let result = checker.finish();
    assert_eq!(result.error_count, 0);
    assert_eq!(result.expr_types.get(&x_ref), Some(&TypeId::NUMBER));
}

#[test]
fn failing_closed_reports_broken_pool_invariants() {
    let b = ModuleBuilder::new();
    let module = Module::new(vec![], b.exprs);
    let config = Config { fail_open_internal_errors: false, ..Config::default() };
    let mut checker = Checker::new(&module, b.interner, config);
    checker.run();

    // Misuse the pool the way a checker bug would.
    let sealed = checker.pool.table(TableState::Sealed, Level::ROOT);
    let x = checker.pool.interner().intern("x");
    checker.pool.add_prop(sealed, x, TypeId::NUMBER, Span::DUMMY);

    let result = checker.finish();
    assert_eq!(codes(&result), vec![ErrorCode::E9001]);
}

#[test]
fn failing_open_keeps_broken_invariants_out_of_diagnostics() {
    let b = ModuleBuilder::new();
    let module = Module::new(vec![], b.exprs);
    let mut checker = Checker::new(&module, b.interner, Config::default());
    checker.run();

    let sealed = checker.pool.table(TableState::Sealed, Level::ROOT);
    let x = checker.pool.interner().intern("x");
    checker.pool.add_prop(sealed, x, TypeId::NUMBER, Span::DUMMY);

    let result = checker.finish();
    assert_eq!(result.error_count, 0);
}

#[test]
fn arithmetic_on_a_string_is_rejected() {
    let mut b = ModuleBuilder::new();
    // local x = "s" + 1
    let lit = b.str_lit("s");
    let one = b.num(1.0);
    let sum = b.expr(Expr::Binary { op: brio_ast::BinOp::Add, lhs: lit, rhs: one });
    let s1 = b.local("x", None, sum);
    let result = b.check(vec![s1]);
    assert_eq!(codes(&result), vec![ErrorCode::E2001]);
}
