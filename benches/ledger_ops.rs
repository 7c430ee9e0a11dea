use account_ledger::{
    config::SystemConfiguration,
    ledger::{AccountType, User},
    AccountRegistry, FlatFileStorage, StorageBackend,
};
use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use tempfile::tempdir;

fn build_sample_registry(users: usize, deposits_per_account: usize) -> AccountRegistry {
    let config = SystemConfiguration::default();
    let mut registry = AccountRegistry::new();
    let start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    for idx in 0..users {
        let mut user = User::new(
            idx.to_string(),
            format!("user{}", idx),
            "hash",
            format!("user{}@example.com", idx),
        );
        user.open_account(AccountType::Savings, &config, Decimal::from(1000), start_date)
            .expect("open savings");
        user.open_account(AccountType::Checking, &config, Decimal::from(250), start_date)
            .expect("open checking");
        let checking = format!("CA-{}-2", idx);
        for day in 0..deposits_per_account {
            let date = start_date + Duration::days((day % 365) as i64);
            user.account_mut(&checking)
                .expect("checking")
                .deposit_on(Decimal::from(10 + (day % 50) as i64), date)
                .expect("deposit");
        }
        registry.add_user(user).expect("add user");
    }
    registry
}

fn bench_lookups(c: &mut Criterion) {
    let registry = build_sample_registry(100, 10);

    c.bench_function("find_last_account_100_users", |b| {
        b.iter(|| black_box(registry.find_by_account_number(black_box("CA-99-2"))))
    });

    c.bench_function("find_last_username_100_users", |b| {
        b.iter(|| black_box(registry.find_by_username(black_box("user99"))))
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let registry = build_sample_registry(100, 100);
    let config = SystemConfiguration::default();
    let dir = tempdir().expect("tempdir");
    let storage =
        FlatFileStorage::new(Some(dir.path().to_path_buf()), Some(1)).expect("storage");

    c.bench_function("registry_save_20k_txns", |b| {
        b.iter(|| storage.save(&registry, &config).expect("save registry"))
    });

    storage.save(&registry, &config).expect("seed");

    c.bench_function("registry_load_20k_txns", |b| {
        b.iter(|| {
            let report = storage.load().expect("load registry");
            black_box(report);
        })
    });
}

criterion_group!(benches, bench_lookups, bench_round_trip);
criterion_main!(benches);
