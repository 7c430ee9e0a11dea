mod common;

use account_ledger::{
    config::{SystemConfiguration, DEFAULT_INITIAL_DEPOSIT},
    ledger::{AccountState, AccountType, Privilege, Role, TransactionKind, User},
    services::{AccountService, AdminService, PolicySetting, ServiceError, SystemSummary},
    AccountError, RegistryError, StorageBackend,
};
use common::{day, sample_registry, setup_storage};
use rust_decimal_macros::dec;

#[test]
fn account_service_round_trip_by_number() {
    let config = SystemConfiguration::default();
    let mut registry = sample_registry(&config);

    let number = AccountService::open(
        &mut registry,
        &config,
        "root",
        AccountType::Savings,
        None,
        day(2025, 2, 1),
    )
    .expect("open account");
    assert_eq!(number, "SA-2-2");
    assert_eq!(
        registry.find_by_account_number(&number).unwrap().balance(),
        DEFAULT_INITIAL_DEPOSIT
    );

    let balance = AccountService::deposit(&mut registry, &number, dec!(25), day(2025, 2, 2))
        .expect("deposit");
    assert_eq!(balance, dec!(1025));

    let state = AccountService::withdraw(&mut registry, "CA-1-2", dec!(10), day(2025, 2, 3))
        .expect("withdraw from overdrawn checking");
    assert_eq!(state, AccountState::Overdrawn);

    AccountService::transfer(&mut registry, &number, "CA-1-2", dec!(210), day(2025, 2, 4))
        .expect("cross-user transfer");
    assert_eq!(
        registry.find_by_account_number("CA-1-2").unwrap().balance(),
        dec!(0)
    );

    let history = AccountService::history(&registry, &number).expect("history");
    let kinds: Vec<_> = history.iter().map(|txn| txn.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::InitialDeposit,
            TransactionKind::Deposit,
            TransactionKind::TransferOut
        ]
    );
    assert_eq!(AccountService::list(&registry, "root").unwrap().len(), 2);
}

#[test]
fn account_service_reports_missing_targets() {
    let config = SystemConfiguration::default();
    let mut registry = sample_registry(&config);

    let err = AccountService::deposit(&mut registry, "SA-404-1", dec!(1), day(2025, 2, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::AccountNotFound(_))
    ));

    let err = AccountService::withdraw(&mut registry, "SA-1-1", dec!(0), day(2025, 2, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::Account(AccountError::InvalidAmount))
    ));
}

#[test]
fn closing_moves_remaining_balance() {
    let config = SystemConfiguration::default();
    let mut registry = sample_registry(&config);

    let err = AccountService::close(&mut registry, "alice", "CA-1-2", Some("SA-1-1"), day(2025, 2, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::Account(AccountError::NegativeBalance))
    ));

    let closed = AccountService::close(&mut registry, "alice", "SA-1-1", Some("CA-1-2"), day(2025, 2, 1))
        .expect("close savings");
    assert_eq!(closed.balance(), dec!(0));
    let remaining = registry.find_by_account_number("CA-1-2").unwrap();
    assert_eq!(remaining.balance(), dec!(949.75));
    assert_eq!(
        remaining.transactions().last().unwrap().kind,
        TransactionKind::ClosureTransfer
    );
}

#[test]
fn periodic_pass_summarises_one_account_type() {
    let config = SystemConfiguration::default();
    let mut registry = sample_registry(&config);

    let err = AdminService::apply_periodic_features(
        Role::Admin,
        &mut registry,
        AccountType::Checking,
        day(2025, 1, 31),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Forbidden(Privilege::ApplyPeriodicFeatures)
    ));

    let fees = AdminService::apply_periodic_features(
        Role::SuperAdmin,
        &mut registry,
        AccountType::Checking,
        day(2025, 1, 31),
    )
    .expect("fees");
    assert_eq!(fees.accounts_processed, 2);
    assert_eq!(fees.accounts_changed, 1);
    assert_eq!(fees.total_fees, dec!(35));

    let interest = AdminService::apply_periodic_features(
        Role::SuperAdmin,
        &mut registry,
        AccountType::Savings,
        day(2025, 1, 31),
    )
    .expect("interest");
    assert_eq!(interest.accounts_processed, 1);
    // 1149.75 * 0.03 / 12 = 2.874375
    assert_eq!(interest.total_interest, dec!(2.87));
}

#[test]
fn system_summary_counts_everything() {
    let config = SystemConfiguration::default();
    let registry = sample_registry(&config);
    assert_eq!(
        AdminService::system_summary(&registry),
        SystemSummary {
            users: 2,
            savings_accounts: 1,
            checking_accounts: 2,
            total_balance: dec!(5949.75),
            total_transactions: 5,
            average_balance_per_user: dec!(2974.88),
        }
    );
}

#[test]
fn policy_updates_respect_privileges_and_types() {
    let mut config = SystemConfiguration::default();
    let mut registry = sample_registry(&config);

    assert!(matches!(
        AdminService::update_default(Role::Admin, &mut config, PolicySetting::OverdraftFee(dec!(10))),
        Err(ServiceError::Forbidden(Privilege::ManageConfiguration))
    ));
    AdminService::update_default(Role::SuperAdmin, &mut config, PolicySetting::OverdraftFee(dec!(10)))
        .expect("update default");
    assert_eq!(config.default_checking_overdraft_fee(), dec!(10));

    let err = AdminService::update_account_policy(
        Role::SuperAdmin,
        &mut registry,
        "CA-1-2",
        PolicySetting::InterestRate(dec!(0.1)),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::Account(AccountError::WrongAccountType(_)))
    ));
    AdminService::update_account_policy(
        Role::SuperAdmin,
        &mut registry,
        "SA-1-1",
        PolicySetting::MaxWithdrawals(6),
    )
    .expect("update savings cap");
}

#[test]
fn user_management_guards_admin_accounts() {
    let config = SystemConfiguration::default();
    let mut registry = sample_registry(&config);

    AdminService::register_user(
        Role::Admin,
        &mut registry,
        User::new("3", "hal", "h", "hal@example.com"),
    )
    .expect("admin registers regular user");
    assert!(matches!(
        AdminService::register_user(
            Role::Admin,
            &mut registry,
            User::with_role("4", "ivy", "h", "ivy@example.com", Role::Admin),
        ),
        Err(ServiceError::Forbidden(Privilege::ManageAdmins))
    ));
    assert!(matches!(
        AdminService::remove_user(Role::Admin, &mut registry, "root"),
        Err(ServiceError::Forbidden(Privilege::ManageAdmins))
    ));
    AdminService::change_role(Role::SuperAdmin, &mut registry, "hal", Role::Admin)
        .expect("promote");
    let removed = AdminService::remove_user(Role::SuperAdmin, &mut registry, "hal")
        .expect("remove admin");
    assert_eq!(removed.role, Role::Admin);
}

#[test]
fn delete_all_data_clears_memory_and_disk() {
    let (storage, _guard) = setup_storage();
    let mut config = SystemConfiguration::default();
    let mut registry = sample_registry(&config);
    config.set_default_savings_max_withdrawals(9).unwrap();
    storage.save(&registry, &config).expect("save");

    assert!(matches!(
        AdminService::delete_all_data(Role::Admin, &mut registry, &mut config, &storage),
        Err(ServiceError::Forbidden(Privilege::DeleteAllData))
    ));
    AdminService::delete_all_data(Role::SuperAdmin, &mut registry, &mut config, &storage)
        .expect("delete all");

    assert!(registry.is_empty());
    assert_eq!(config, SystemConfiguration::default());
    assert!(!storage.exists());
}
