extern crate criterion;
extern crate lotinduction;
extern crate rand;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lotinduction::{BinderSpec, Grammar, Kernel, Proposer, WeightedKernel};
use rand::{rngs::StdRng, SeedableRng};

fn create_test_grammar() -> Grammar {
    let mut g = Grammar::new("START");
    g.add_rule("START", "", Some(vec!["EXPR"]), 1.0)
        .expect("added start");
    g.add_binder(
        "EXPR",
        "lambda",
        Some(vec!["EXPR"]),
        1.0,
        BinderSpec::new("EXPR"),
    )
    .expect("added lambda");
    g.add_rule("EXPR", "apply_", Some(vec!["EXPR", "EXPR"]), 1.0)
        .expect("added apply_");
    g.add_rule("EXPR", "and_", Some(vec!["EXPR", "EXPR"]), 1.0)
        .expect("added and_");
    g.add_rule("EXPR", "not_", Some(vec!["EXPR"]), 1.0)
        .expect("added not_");
    g.add_rule("EXPR", "True", None, 3.0).expect("added True");
    g.add_rule("EXPR", "False", None, 3.0).expect("added False");
    g
}

pub fn grammar_generate_benchmark(c: &mut Criterion) {
    let g = create_test_grammar();
    let mut rng = StdRng::seed_from_u64(0);
    c.bench_function("generate", |b| {
        b.iter(|| g.generate(black_box("START"), &mut rng))
    });
}

pub fn grammar_log_probability_benchmark(c: &mut Criterion) {
    let g = create_test_grammar();
    let mut rng = StdRng::seed_from_u64(1);
    let trees = (0..100)
        .map(|_| g.generate("START", &mut rng).expect("generated tree"))
        .collect::<Vec<_>>();
    c.bench_function("log_probability", |b| {
        b.iter(|| {
            trees
                .iter()
                .map(|t| g.log_probability(black_box(t)).expect("scored tree"))
                .sum::<f64>()
        })
    });
}

pub fn grammar_pack_benchmark(c: &mut Criterion) {
    let g = create_test_grammar();
    let mut rng = StdRng::seed_from_u64(2);
    let trees = (0..100)
        .map(|_| g.generate("START", &mut rng).expect("generated tree"))
        .collect::<Vec<_>>();
    c.bench_function("pack", |b| {
        b.iter(|| {
            for t in &trees {
                let packed = g.pack(black_box(t)).expect("packed tree");
                g.unpack(&packed).expect("unpacked tree");
            }
        })
    });
}

pub fn proposal_benchmark(c: &mut Criterion) {
    let g = create_test_grammar();
    let mut rng = StdRng::seed_from_u64(3);
    let tree = g.generate("START", &mut rng).expect("generated tree");
    let proposer = Proposer::new(Kernel::Mixture(vec![
        WeightedKernel {
            weight: 2.0,
            kernel: Kernel::Regeneration,
        },
        WeightedKernel {
            weight: 1.0,
            kernel: Kernel::Insert,
        },
        WeightedKernel {
            weight: 1.0,
            kernel: Kernel::Delete,
        },
        WeightedKernel {
            weight: 1.0,
            kernel: Kernel::Copy,
        },
    ]));
    c.bench_function("propose", |b| {
        b.iter(|| proposer.propose(&g, black_box(&tree), &mut rng))
    });
}

criterion_group!(
    benches,
    grammar_generate_benchmark,
    grammar_log_probability_benchmark,
    grammar_pack_benchmark,
    proposal_benchmark
);
criterion_main!(benches);
