use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use policy_core::model::{Effect, Rule, ScopeType, SubjectType};

fn rules(n: usize) -> Vec<Rule> {
    (0..n)
        .map(|i| Rule {
            rule_id: format!("r{i}"),
            version_id: "v1".into(),
            scope_type: ScopeType::Entity,
            scope_key: Some("document".into()),
            subject_type: SubjectType::User,
            subject_key: format!("user-{i}"),
            effect: if i % 7 == 0 { Effect::Deny } else { Effect::Allow },
            conditions: None,
            priority: (i % 50) as u32,
            is_active: true,
            operations: vec!["ENTITY.READ".into()],
            obligations: vec![],
        })
        .collect()
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_1000_rules", |b| {
        b.iter_batched(|| rules(1000), |rules| policy_compiler::compile("p1", "v1", &rules, 0), BatchSize::SmallInput)
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
