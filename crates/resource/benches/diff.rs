use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use juju_access_core::{AccessGrant, AccessLevel, GrantState};
use juju_access_resource::diff;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_grant(access: AccessLevel, users: impl Iterator<Item = usize>) -> AccessGrant {
    AccessGrant::new("bench", access, users.map(|i| format!("user-{i:05}"))).unwrap()
}

// ---------------------------------------------------------------------------
// Benchmark: diff with half the users changed
// ---------------------------------------------------------------------------

fn bench_diff_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_update");
    for count in [10usize, 100, 1000] {
        let desired = make_grant(AccessLevel::Write, 0..count);
        let actual = GrantState::from(&make_grant(AccessLevel::Write, count / 2..count + count / 2));
        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &(desired, actual),
            |b, (desired, actual)| b.iter(|| diff(black_box(Some(desired)), black_box(Some(actual)))),
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: diff forcing replacement
// ---------------------------------------------------------------------------

fn bench_diff_replace(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_replace");
    for count in [10usize, 100, 1000] {
        let desired = make_grant(AccessLevel::Admin, 0..count);
        let actual = GrantState::from(&make_grant(AccessLevel::Read, 0..count));
        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &(desired, actual),
            |b, (desired, actual)| b.iter(|| diff(black_box(Some(desired)), black_box(Some(actual)))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_diff_update, bench_diff_replace);
criterion_main!(benches);
