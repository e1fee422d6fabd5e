#![cfg(feature = "criterion-bench")]

use console_access::{
    Action, ActionGrant, Decision, Evaluator, Permission, PermissionSet, Resource, StoreId,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn store(index: usize) -> StoreId {
    StoreId::try_from(format!("store_{index}").as_str()).unwrap()
}

/// One read grant per store; the last entry is the one the check needs.
fn setup_store_fanout(store_count: usize) -> (PermissionSet, StoreId) {
    let set = (0..store_count)
        .map(|i| {
            Permission::new(
                Resource::Inventory,
                [ActionGrant::Action(Action::Read)],
                Some(store(i)),
            )
            .unwrap()
        })
        .collect();
    (set, store(store_count - 1))
}

fn setup_mixed() -> PermissionSet {
    let resources = [Resource::Sales, Resource::Report, Resource::Customer, Resource::Tax];
    let mut entries: Vec<Permission> = resources
        .iter()
        .enumerate()
        .map(|(i, resource)| {
            Permission::new(
                *resource,
                [
                    ActionGrant::Action(Action::Read),
                    ActionGrant::Action(Action::Export),
                ],
                Some(store(i)),
            )
            .unwrap()
        })
        .collect();
    entries.push(Permission::new(Resource::Inventory, [ActionGrant::All], None).unwrap());
    PermissionSet::new(entries)
}

fn bench_store_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_permission_store_fanout");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    for store_count in [1usize, 8, 32, 128] {
        let (set, target) = setup_store_fanout(store_count);
        let evaluator = Evaluator::new(Some(&set));
        assert_eq!(
            evaluator.decide(Resource::Inventory, Action::Read, Some(&target)),
            Decision::Allow
        );

        let id = BenchmarkId::from_parameter(store_count);
        group.bench_with_input(id, &store_count, |b, _| {
            b.iter(|| {
                let allowed =
                    evaluator.has_permission(Resource::Inventory, Action::Read, Some(&target));
                black_box(allowed);
            });
        });
    }

    group.finish();
}

fn bench_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluator_checks");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    let set = setup_mixed();
    let evaluator = Evaluator::new(Some(&set));
    let scoped = store(0);

    group.bench_function("wildcard_allow", |b| {
        b.iter(|| black_box(evaluator.has_permission(Resource::Inventory, Action::Delete, None)));
    });
    group.bench_function("scoped_deny", |b| {
        b.iter(|| {
            black_box(evaluator.has_permission(Resource::Sales, Action::Delete, Some(&scoped)))
        });
    });
    group.bench_function("all_permissions", |b| {
        b.iter(|| {
            black_box(evaluator.has_all_permissions(
                Resource::Sales,
                &[Action::Read, Action::Export],
                Some(&scoped),
            ))
        });
    });
    group.bench_function("user_stores", |b| {
        b.iter(|| black_box(evaluator.user_stores()));
    });
    group.bench_function("is_super_admin", |b| {
        b.iter(|| black_box(evaluator.is_super_admin()));
    });

    group.finish();
}

criterion_group!(benches, bench_store_fanout, bench_checks);
criterion_main!(benches);
