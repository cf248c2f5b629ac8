#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use git_compare_core::{ProviderType, Repositories, Repository};

fn build_repositories(count: usize) -> Repositories {
    (0..count)
        .map(|idx| {
            let name = format!("owner-{}/service-{idx}", idx % 17);
            Repository::new(ProviderType::GitLab, name, String::new())
        })
        .collect()
}

fn search_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository_search");
    for &count in &[100usize, 1_000, 10_000] {
        let repositories = build_repositories(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &repositories, |b, repos| {
            b.iter(|| black_box(repos.search(black_box("own3/svc42"), 20).len()));
        });
    }
    group.finish();
}

criterion_group!(benches, search_benchmark);
criterion_main!(benches);
