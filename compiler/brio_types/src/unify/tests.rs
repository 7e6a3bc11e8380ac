use std::sync::Arc;

use brio_ast::{Span, StringInterner};
use pretty_assertions::assert_eq;
use smallvec::smallvec;

use super::*;
use crate::node::TableState;

fn pool() -> Pool {
    Pool::new(Arc::new(StringInterner::new()))
}

fn unify(pool: &mut Pool, config: &Config, found: TypeId, expected: TypeId) -> UnifyResult {
    Unifier::new(pool, config, Level::ROOT).unify(found, expected)
}

#[test]
fn primitives_unify_reflexively() {
    let mut pool = pool();
    let config = Config::default();
    assert_eq!(unify(&mut pool, &config, TypeId::NUMBER, TypeId::NUMBER), Ok(()));
    assert_eq!(
        unify(&mut pool, &config, TypeId::NUMBER, TypeId::STRING),
        Err(UnifyError::Mismatch { found: TypeId::NUMBER, expected: TypeId::STRING })
    );
}

#[test]
fn wildcards_absorb_everything() {
    let mut pool = pool();
    let config = Config::default();
    assert_eq!(unify(&mut pool, &config, TypeId::NUMBER, TypeId::ANY), Ok(()));
    assert_eq!(unify(&mut pool, &config, TypeId::ANY, TypeId::NUMBER), Ok(()));
    assert_eq!(unify(&mut pool, &config, TypeId::ERROR, TypeId::STRING), Ok(()));
    assert_eq!(unify(&mut pool, &config, TypeId::STRING, TypeId::UNKNOWN), Ok(()));
    assert_eq!(unify(&mut pool, &config, TypeId::NEVER, TypeId::STRING), Ok(()));
    // unknown does not flow into a concrete type.
    assert!(unify(&mut pool, &config, TypeId::UNKNOWN, TypeId::STRING).is_err());
}

#[test]
fn free_variables_bind_in_both_directions() {
    let mut pool = pool();
    let config = Config::default();

    let a = pool.fresh_free(Level::ROOT);
    assert_eq!(unify(&mut pool, &config, a, TypeId::NUMBER), Ok(()));
    assert_eq!(pool.resolve(a), TypeId::NUMBER);

    let b = pool.fresh_free(Level::ROOT);
    assert_eq!(unify(&mut pool, &config, TypeId::STRING, b), Ok(()));
    assert_eq!(pool.resolve(b), TypeId::STRING);
}

#[test]
fn linking_frees_keeps_the_outermost_level() {
    let mut pool = pool();
    let config = Config::default();

    let outer = pool.fresh_free(Level::ROOT);
    let inner = pool.fresh_free(Level::from_raw(3));
    assert_eq!(unify(&mut pool, &config, outer, inner), Ok(()));

    // The surviving variable may not generalize at the inner level.
    let root = pool.resolve(inner);
    match pool.get(root) {
        TypeNode::Free { level } => assert_eq!(*level, Level::ROOT),
        other => panic!("expected a free variable, got {other:?}"),
    }
}

#[test]
fn binding_promotes_reachable_levels() {
    let mut pool = pool();
    let config = Config::default();

    let deep = pool.fresh_free(Level::from_raw(5));
    let params = pool.pack(smallvec![deep]);
    let func = pool.function(params, PackId::EMPTY);

    let shallow = pool.fresh_free(Level::from_raw(1));
    assert_eq!(unify(&mut pool, &config, shallow, func), Ok(()));

    let deep = pool.resolve(deep);
    match pool.get(deep) {
        TypeNode::Free { level } => assert_eq!(*level, Level::from_raw(1)),
        other => panic!("expected a free variable, got {other:?}"),
    }
}

#[test]
fn occurs_check_binds_error_and_reports() {
    let mut pool = pool();
    let config = Config::default();

    let a = pool.fresh_free(Level::ROOT);
    let params = pool.pack(smallvec![a]);
    let func = pool.function(params, PackId::EMPTY);

    let result = unify(&mut pool, &config, a, func);
    assert_eq!(result, Err(UnifyError::Occurs { var: a, ty: func }));
    // One error at the binding site; later uses see the sentinel.
    assert_eq!(pool.resolve(a), TypeId::ERROR);
}

#[test]
fn occurs_check_sees_through_tables() {
    let mut pool = pool();
    let config = Config::default();
    let interner = StringInterner::new();

    let a = pool.fresh_free(Level::ROOT);
    let table = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(table, interner.intern("self"), a, Span::DUMMY);
    pool.seal(table);

    assert_eq!(unify(&mut pool, &config, a, table), Err(UnifyError::Occurs { var: a, ty: table }));
}

#[test]
fn union_found_requires_every_member() {
    let mut pool = pool();
    let config = Config::default();

    let ns = pool.union([TypeId::NUMBER, TypeId::STRING]);
    assert!(unify(&mut pool, &config, ns, TypeId::NUMBER).is_err());
    let ns2 = pool.union([TypeId::NUMBER, TypeId::STRING]);
    assert_eq!(unify(&mut pool, &config, TypeId::NUMBER, ns2), Ok(()));
}

#[test]
fn failed_union_trial_rolls_back_bindings() {
    let mut pool = pool();
    let config = Config::default();

    // (t) -> number must pick the second alternative; the first trial
    // binds t to string and has to be undone.
    let t = pool.fresh_free(Level::ROOT);
    let found_params = pool.pack(smallvec![t]);
    let found_rets = pool.pack(smallvec![TypeId::NUMBER]);
    let found = pool.function(found_params, found_rets);

    let p1 = pool.pack(smallvec![TypeId::STRING]);
    let r1 = pool.pack(smallvec![TypeId::STRING]);
    let alt1 = pool.function(p1, r1);
    let p2 = pool.pack(smallvec![TypeId::BOOLEAN]);
    let r2 = pool.pack(smallvec![TypeId::NUMBER]);
    let alt2 = pool.function(p2, r2);
    let expected = pool.union([alt1, alt2]);

    assert_eq!(unify(&mut pool, &config, found, expected), Ok(()));
    assert_eq!(pool.resolve(t), TypeId::BOOLEAN);
}

#[test]
fn intersection_expected_requires_every_member() {
    let mut pool = pool();
    let config = Config::default();
    let interner = StringInterner::new();

    let t1 = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(t1, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.seal(t1);
    let t2 = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(t2, interner.intern("y"), TypeId::STRING, Span::DUMMY);
    pool.seal(t2);
    let both = pool.intersection([t1, t2]);

    let found = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(found, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.add_prop(found, interner.intern("y"), TypeId::STRING, Span::DUMMY);
    pool.seal(found);
    assert_eq!(unify(&mut pool, &config, found, both), Ok(()));

    let partial = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(partial, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.seal(partial);
    assert!(unify(&mut pool, &config, partial, both).is_err());
}

#[test]
fn tables_use_width_subtyping() {
    let mut pool = pool();
    let config = Config::default();
    let interner = StringInterner::new();

    let found = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(found, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.add_prop(found, interner.intern("y"), TypeId::STRING, Span::DUMMY);
    pool.seal(found);

    let expected = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(expected, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.seal(expected);

    // Extra properties on the found side are fine.
    assert_eq!(unify(&mut pool, &config, found, expected), Ok(()));
    // The reverse direction misses `y`.
    assert_eq!(
        unify(&mut pool, &config, expected, found),
        Err(UnifyError::MissingProperty { table: expected, prop: interner.intern("y") })
    );
}

#[test]
fn properties_are_invariant() {
    let mut pool = pool();
    let config = Config::default();
    let interner = StringInterner::new();

    let optional = pool.optional(TypeId::NUMBER);
    let found = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(found, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.seal(found);

    let expected = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(expected, interner.intern("x"), optional, Span::DUMMY);
    pool.seal(expected);

    // number <: number? holds, but mutable slots need both directions.
    assert!(unify(&mut pool, &config, found, expected).is_err());
}

#[test]
fn free_tables_learn_missing_properties() {
    let mut pool = pool();
    let config = Config::default();
    let interner = StringInterner::new();
    let x = interner.intern("x");

    let found = pool.table(TableState::Free, Level::ROOT);
    let expected = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(expected, x, TypeId::NUMBER, Span::DUMMY);
    pool.seal(expected);

    assert_eq!(unify(&mut pool, &config, found, expected), Ok(()));
    match pool.get(found) {
        TypeNode::Table(tt) => {
            assert_eq!(tt.prop(x).map(|p| p.ty), Some(TypeId::NUMBER));
        }
        other => panic!("expected a table, got {other:?}"),
    }
}

#[test]
fn function_parameters_are_contravariant() {
    let mut pool = pool();
    let config = Config::default();

    // (any) -> number fits where (number) -> number is wanted.
    let any_params = pool.pack(smallvec![TypeId::ANY]);
    let num_rets = pool.pack(smallvec![TypeId::NUMBER]);
    let found = pool.function(any_params, num_rets);

    let num_params = pool.pack(smallvec![TypeId::NUMBER]);
    let num_rets2 = pool.pack(smallvec![TypeId::NUMBER]);
    let expected = pool.function(num_params, num_rets2);

    assert_eq!(unify(&mut pool, &config, found, expected), Ok(()));

    // Returns are covariant: () -> string does not fit () -> number.
    let str_rets = pool.pack(smallvec![TypeId::STRING]);
    let found2 = pool.function(PackId::EMPTY, str_rets);
    let num_rets3 = pool.pack(smallvec![TypeId::NUMBER]);
    let expected2 = pool.function(PackId::EMPTY, num_rets3);
    assert!(unify(&mut pool, &config, found2, expected2).is_err());
}

#[test]
fn pack_count_mismatch_reports_fixed_lengths() {
    let mut pool = pool();
    let config = Config::default();

    let two = pool.pack(smallvec![TypeId::NUMBER, TypeId::STRING]);
    let one = pool.pack(smallvec![TypeId::NUMBER]);
    let mut unifier = Unifier::new(&mut pool, &config, Level::ROOT);
    assert_eq!(
        unifier.unify_packs(one, two, CountKind::Arguments),
        Err(UnifyError::CountMismatch { found: 1, expected: 2, kind: CountKind::Arguments })
    );
}

#[test]
fn variadic_tail_absorbs_extra_elements() {
    let mut pool = pool();
    let config = Config::default();

    let found = pool.pack(smallvec![TypeId::NUMBER, TypeId::NUMBER, TypeId::NUMBER]);
    let expected = pool.variadic(TypeId::NUMBER);
    let mut unifier = Unifier::new(&mut pool, &config, Level::ROOT);
    assert_eq!(unifier.unify_packs(found, expected, CountKind::Arguments), Ok(()));

    let mixed = pool.pack(smallvec![TypeId::NUMBER, TypeId::STRING]);
    let nums = pool.variadic(TypeId::NUMBER);
    let mut unifier = Unifier::new(&mut pool, &config, Level::ROOT);
    assert!(unifier.unify_packs(mixed, nums, CountKind::Arguments).is_err());
}

#[test]
fn free_pack_swallows_the_remainder() {
    let mut pool = pool();
    let config = Config::default();

    let rest = pool.fresh_free_pack(Level::ROOT);
    let found = pool.pack_with_tail(smallvec![TypeId::NUMBER], rest);
    let expected = pool.pack(smallvec![TypeId::NUMBER, TypeId::STRING, TypeId::BOOLEAN]);

    let mut unifier = Unifier::new(&mut pool, &config, Level::ROOT);
    assert_eq!(unifier.unify_packs(found, expected, CountKind::Arguments), Ok(()));

    let bound = pool.resolve_pack(rest);
    match pool.get_pack(bound) {
        PackNode::List { head, tail: None } => {
            assert_eq!(head.as_slice(), &[TypeId::STRING, TypeId::BOOLEAN]);
        }
        other => panic!("expected a fixed pack, got {other:?}"),
    }
}

#[test]
fn recursive_tables_unify_coinductively() {
    let mut pool = pool();
    let config = Config::default();
    let interner = StringInterner::new();
    let next = interner.intern("next");

    // Two structurally identical `{ next: self }` nodes.
    let a = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(a, next, a, Span::DUMMY);
    pool.seal(a);
    let b = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(b, next, b, Span::DUMMY);
    pool.seal(b);

    assert_eq!(unify(&mut pool, &config, a, b), Ok(()));
}

#[test]
fn expansion_budget_stops_deep_structures() {
    let mut pool = pool();
    let config = Config::strict(1);
    let interner = StringInterner::new();

    // Nested tables force two expansions against a budget of one.
    let inner_a = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(inner_a, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.seal(inner_a);
    let outer_a = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(outer_a, interner.intern("inner"), inner_a, Span::DUMMY);
    pool.seal(outer_a);

    let inner_b = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(inner_b, interner.intern("x"), TypeId::NUMBER, Span::DUMMY);
    pool.seal(inner_b);
    let outer_b = pool.table(TableState::Unsealed, Level::ROOT);
    pool.add_prop(outer_b, interner.intern("inner"), inner_b, Span::DUMMY);
    pool.seal(outer_b);

    assert_eq!(unify(&mut pool, &config, outer_a, outer_b), Err(UnifyError::TooComplex));
}

#[test]
fn pack_occurs_through_tail_is_caught() {
    let mut pool = pool();
    let config = Config::default();

    let p = pool.fresh_free_pack(Level::ROOT);
    let wrapped = pool.pack_with_tail(smallvec![TypeId::NUMBER], p);

    let mut unifier = Unifier::new(&mut pool, &config, Level::ROOT);
    assert_eq!(
        unifier.unify_packs(p, wrapped, CountKind::Values),
        Err(UnifyError::OccursPack { var: p, pack: wrapped })
    );
}

#[test]
fn pack_hidden_in_a_head_escapes_the_occurs_check() {
    let mut pool = pool();
    let config = Config::default();

    // The pack occurs check follows only the tail chain, so a pack
    // reachable solely through a function in a head position binds
    // without complaint.
    let p = pool.fresh_free_pack(Level::ROOT);
    let f = pool.function(PackId::EMPTY, p);
    let wrapper = pool.pack(smallvec![f]);

    let mut unifier = Unifier::new(&mut pool, &config, Level::ROOT);
    assert_eq!(unifier.unify_packs(p, wrapper, CountKind::Values), Ok(()));
    assert_eq!(pool.resolve_pack(p), wrapper);
}

#[test]
fn self_feeding_pack_walks_stop_at_the_iteration_limit() {
    let mut pool = pool();
    let config = Config::default();

    // A pack that feeds back into its own tail makes the element
    // walk endless; the iteration budget has to cut it off.
    let p = pool.fresh_free_pack(Level::ROOT);
    let grower = pool.pack_with_tail(smallvec![TypeId::NUMBER], p);
    pool.bind_pack(p, grower);

    let nums = pool.variadic(TypeId::NUMBER);
    let mut unifier = Unifier::new(&mut pool, &config, Level::ROOT);
    assert_eq!(unifier.unify_packs(grower, nums, CountKind::Values), Err(UnifyError::TooComplex));
}

#[test]
fn generic_functions_compare_at_fresh_instances() {
    let mut pool = pool();
    let config = Config::default();

    // forall t. (t) -> t against (number) -> number.
    let t = pool.fresh_free(Level::from_raw(1));
    let params = pool.pack(smallvec![t]);
    let rets = pool.pack(smallvec![t]);
    let id_fn = pool.function(params, rets);
    crate::generalize::generalize(&mut pool, id_fn, Level::from_raw(1));

    let num_params = pool.pack(smallvec![TypeId::NUMBER]);
    let num_rets = pool.pack(smallvec![TypeId::NUMBER]);
    let mono = pool.function(num_params, num_rets);

    assert_eq!(unify(&mut pool, &config, id_fn, mono), Ok(()));
    // The generic itself is untouched and still usable elsewhere.
    let str_params = pool.pack(smallvec![TypeId::STRING]);
    let str_rets = pool.pack(smallvec![TypeId::STRING]);
    let mono2 = pool.function(str_params, str_rets);
    assert_eq!(unify(&mut pool, &config, id_fn, mono2), Ok(()));
}
