//! Property tests for the beta calculus.
//!
//! Random graphs are grown with the builder, then pushed through random
//! rule applications. Whatever the calculus accepts must come out valid,
//! and whatever it rejects must leave the input as it was.

use std::sync::Arc;

use egi_kernel::{
    equivalent, Calculus, CalculusConfig, ContextId, Egi, EgiBuilder, ElementId, ErrorKind,
    Polarity, Selection, Transformation, VertexId,
};
use proptest::prelude::*;
use proptest::sample::Index;

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

type Op = (u8, Index, Index, Index);

fn ops(max: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec((any::<u8>(), any::<Index>(), any::<Index>(), any::<Index>()), 0..max)
}

/// Grow a graph from random builder calls. Every call is in scope by
/// construction, so the builder never refuses one.
fn build_graph(ops: &[Op]) -> Egi {
    let mut b = EgiBuilder::new();
    // Each context alongside its path to the sheet, itself included.
    let mut contexts: Vec<(ContextId, Vec<ContextId>)> = vec![(b.sheet(), vec![b.sheet()])];
    let mut vertices: Vec<(VertexId, ContextId)> = Vec::new();

    for (kind, a, c, _) in ops {
        let (ctx, path) = a.get(&contexts).clone();
        let in_scope: Vec<VertexId> = vertices
            .iter()
            .filter(|(_, owner)| path.contains(owner))
            .map(|(v, _)| *v)
            .collect();

        match kind % 4 {
            0 => {
                let cut = b.add_cut(ctx).unwrap();
                let mut cut_path = path.clone();
                cut_path.push(cut);
                contexts.push((cut, cut_path));
            }
            1 => vertices.push((b.add_vertex(ctx).unwrap(), ctx)),
            2 if !in_scope.is_empty() => {
                b.add_edge(ctx, "P", vec![*c.get(&in_scope)]).unwrap();
            }
            3 if in_scope.len() >= 2 => {
                let first = c.index(in_scope.len());
                let second = (first + 1) % in_scope.len();
                b.add_identity(ctx, vec![in_scope[first], in_scope[second]])
                    .unwrap();
            }
            _ => {}
        }
    }
    b.build().unwrap()
}

fn fragment() -> Arc<Egi> {
    let mut b = EgiBuilder::new();
    let sheet = b.sheet();
    let y = b.add_vertex(sheet).unwrap();
    b.add_edge(sheet, "Q", vec![y]).unwrap();
    Arc::new(b.build().unwrap())
}

fn context_ids(egi: &Egi) -> Vec<ContextId> {
    egi.contexts().map(|c| c.id).collect()
}

fn area(egi: &Egi, context: ContextId) -> Vec<ElementId> {
    egi.context(context).unwrap().area.iter().copied().collect()
}

/// A candidate transformation for `egi`, legal or not.
fn pick(egi: &Egi, (kind, a, c, d): &Op) -> Option<Transformation> {
    let contexts = context_ids(egi);
    let ctx = *a.get(&contexts);
    let area = area(egi, ctx);
    let one = |i: &Index| Selection::new(ctx, [*i.get(&area)]);

    Some(match kind % 7 {
        0 => Transformation::AddIsolatedVertex {
            context: ctx,
            constant: None,
        },
        1 if area.is_empty() => Transformation::AddDoubleCut(Selection::empty(ctx)),
        1 => Transformation::AddDoubleCut(one(c)),
        2 => Transformation::RemoveDoubleCut(ctx),
        3 if !area.is_empty() => Transformation::Erase(one(c)),
        4 if !area.is_empty() => Transformation::Iterate {
            source: one(c),
            destination: *d.get(&contexts),
        },
        5 => Transformation::Insert {
            context: ctx,
            fragment: fragment(),
        },
        6 => {
            let vertices: Vec<VertexId> = area.iter().filter_map(|e| e.as_vertex()).collect();
            if vertices.is_empty() {
                return None;
            }
            Transformation::RemoveIsolatedVertex(*c.get(&vertices))
        }
        _ => return None,
    })
}

fn assert_areas_partition(egi: &Egi) {
    egi.check_invariants().unwrap();
    let covered: usize = egi.contexts().map(|c| c.area.len()).sum();
    assert_eq!(covered, egi.num_elements());
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_built_graphs_are_valid(steps in ops(40)) {
        assert_areas_partition(&build_graph(&steps));
    }

    #[test]
    fn prop_rule_sequences_preserve_invariants(seed in ops(30), steps in ops(24)) {
        let calculus = Calculus::default();
        let mut egi = build_graph(&seed);

        for op in &steps {
            let Some(t) = pick(&egi, op) else { continue };
            let before = egi.fingerprint();
            match calculus.check(&egi, &t) {
                Ok(()) => {
                    let rewrite = calculus.apply(&egi, &t).unwrap();
                    prop_assert_eq!(rewrite.rule, t.rule());
                    assert_areas_partition(&rewrite.graph);
                    egi = rewrite.into_graph();
                }
                Err(_) => {
                    prop_assert!(calculus.apply(&egi, &t).is_err());
                    prop_assert_eq!(egi.fingerprint(), before);
                }
            }
        }
    }

    #[test]
    fn prop_rules_are_deterministic(seed in ops(30), op in (any::<u8>(), any::<Index>(), any::<Index>(), any::<Index>())) {
        let calculus = Calculus::default();
        let egi = build_graph(&seed);
        if let Some(t) = pick(&egi, &op) {
            if let (Ok(a), Ok(b)) = (calculus.apply(&egi, &t), calculus.apply(&egi, &t)) {
                prop_assert_eq!(a.graph.fingerprint(), b.graph.fingerprint());
                prop_assert_eq!(a.created, b.created);
            }
        }
    }

    #[test]
    fn prop_double_cut_round_trip(seed in ops(30), a in any::<Index>(), c in any::<Index>()) {
        let calculus = Calculus::default();
        let egi = build_graph(&seed);
        let ctx = *a.get(&context_ids(&egi));
        let area = area(&egi, ctx);
        let selection = if area.is_empty() {
            Selection::empty(ctx)
        } else {
            Selection::new(ctx, [*c.get(&area)])
        };

        if calculus.check_double_cut_addition(&egi, &selection).is_ok() {
            let added = calculus.add_double_cut(&egi, &selection).unwrap();
            let outer = added.created[0].as_context().unwrap();
            let removed = calculus.remove_double_cut(&added.graph, outer).unwrap();
            prop_assert!(equivalent(&removed.graph, &egi));
            prop_assert_eq!(removed.graph.fingerprint(), egi.fingerprint());
        }
    }

    #[test]
    fn prop_deiteration_undoes_iteration(
        seed in ops(30),
        a in any::<Index>(),
        c in any::<Index>(),
        d in any::<Index>(),
    ) {
        let calculus = Calculus::default();
        let relaxed = Calculus::new(CalculusConfig::default().with_same_context_deiteration(true));
        let egi = build_graph(&seed);
        let contexts = context_ids(&egi);
        let ctx = *a.get(&contexts);
        let area = area(&egi, ctx);
        prop_assume!(!area.is_empty());

        let source = Selection::new(ctx, [*c.get(&area)]);
        let destination = *d.get(&contexts);
        if calculus.check_iteration(&egi, &source, destination).is_ok() {
            let iterated = calculus.iterate(&egi, &source, destination).unwrap();
            let copy = Selection::new(destination, iterated.created.iter().copied());
            let back = relaxed.deiterate(&iterated.graph, &copy, &source).unwrap();
            prop_assert!(equivalent(&back.graph, &egi));
        }
    }

    #[test]
    fn prop_polarity_rejection_leaves_input_alone(seed in ops(30), a in any::<Index>()) {
        let calculus = Calculus::default();
        let egi = build_graph(&seed);
        let ctx = *a.get(&context_ids(&egi));
        let before = egi.fingerprint();
        let snapshot = egi.clone();

        let positive = egi.polarity(ctx).unwrap() == Polarity::Positive;
        let rejected = if positive {
            calculus.insert(&egi, ctx, &fragment())
        } else {
            calculus.erase(&egi, &Selection::whole_area(&egi, ctx).unwrap())
        };

        let err = rejected.unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::WrongPolarity);
        prop_assert_eq!(egi.fingerprint(), before);
        prop_assert!(egi.shares_tables_with(&snapshot));
    }
}
