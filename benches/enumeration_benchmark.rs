use coinjoin_analyzer::config::AnalyzerConfig;
use coinjoin_analyzer::core::transaction::TransactionData;
use coinjoin_analyzer::greedy::matcher::GreedyMatcher;
use coinjoin_analyzer::optimization::enumeration::analyze_transaction;
use coinjoin_analyzer::simulation::synthetic::{generate_coinjoin, SyntheticConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn synthetic(participants: usize) -> TransactionData {
    let config = SyntheticConfig {
        num_participants: participants,
        seed: Some(2024),
        ..Default::default()
    };
    match generate_coinjoin(&config) {
        Ok(cj) => cj.transaction,
        Err(e) => panic!("synthetic generation failed: {}", e),
    }
}

fn bench_greedy_10_participants(c: &mut Criterion) {
    let tx = synthetic(10);

    c.bench_function("greedy_10_participants", |b| {
        b.iter(|| GreedyMatcher::new(black_box(&tx), 0.005).run())
    });
}

fn bench_greedy_50_participants(c: &mut Criterion) {
    let tx = synthetic(50);

    c.bench_function("greedy_50_participants", |b| {
        b.iter(|| GreedyMatcher::new(black_box(&tx), 0.005).run())
    });
}

fn bench_enumeration_3_participants(c: &mut Criterion) {
    let tx = synthetic(3);
    let config = AnalyzerConfig::default().with_greedy_min_participants(usize::MAX);

    c.bench_function("enumeration_3_participants", |b| {
        b.iter(|| analyze_transaction(black_box(&tx), &config))
    });
}

fn bench_enumeration_symmetric_twins(c: &mut Criterion) {
    let tx = TransactionData::from_amounts(
        "twins",
        &[104_000_000, 104_000_000],
        100_000_000,
        2,
        &[4_000_000, 4_000_000],
    );
    let config = AnalyzerConfig::default().with_max_fee_rel(0.05);

    c.bench_function("enumeration_symmetric_twins", |b| {
        b.iter(|| analyze_transaction(black_box(&tx), &config))
    });
}

criterion_group!(
    benches,
    bench_greedy_10_participants,
    bench_greedy_50_participants,
    bench_enumeration_3_participants,
    bench_enumeration_symmetric_twins
);
criterion_main!(benches);
