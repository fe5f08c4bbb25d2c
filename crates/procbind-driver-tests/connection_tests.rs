//! Connection Tests
//!
//! Provisioning of connections from manager configuration: direct and pooled
//! modes, credential and lookup failures, and configuration files.

use std::sync::Arc;

use crate::fixtures::{
    Customer, Harness, NameFilter, Provisioning, customer_database, customer_procedures,
};
use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use procbind::{DriverRegistry, EntityManager, ErrorKind, ManagerConfig, ResourceRegistry};
use procbind_driver_memory::MemoryDriver;
use rstest::rstest;

fn memory_drivers(db: &procbind_driver_memory::MemoryDatabase) -> DriverRegistry {
    DriverRegistry::new().with_driver(Arc::new(MemoryDriver::new().with_database(db.clone())))
}

/// Test that every operation hands its connection back
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_connections_are_released(#[case] mode: Provisioning) -> Result<()> {
    let harness = Harness::new(mode)?;

    harness.manager.save(&Customer::named("Acme")).await?;
    harness.manager.list(&NameFilter::prefix("A")).await?;
    harness.manager.save(&Customer::named("Acme")).await?;
    harness.manager.delete(&Customer::named("Acme")).await?;

    assert!(harness.all_released());
    match mode {
        Provisioning::Direct => assert_eq!(harness.db.journal().opens(), 4),
        Provisioning::Pooled => assert_eq!(harness.db.journal().opens(), 1),
    }
    Ok(())
}

/// Test that a refused connection is a connection error and nothing runs
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_unreachable_database(#[case] mode: Provisioning) -> Result<()> {
    let harness = Harness::new(mode)?;
    harness.db.set_refuse_connections(true);

    let err = harness
        .manager
        .save(&Customer::named("Acme"))
        .await
        .err()
        .expect("save must fail without a connection");

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(harness.db.journal().executions().is_empty());
    Ok(())
}

/// Test that wrong credentials fail before any statement is prepared
#[tokio::test]
async fn test_login_failure() -> Result<()> {
    let db = customer_database();
    db.set_credentials("crm_app", "correct horse");
    let config = ManagerConfig::direct("memory", "memory:crm")
        .with_credentials("crm_app", "battery staple")
        .with_procedures(customer_procedures());
    let manager: EntityManager<Customer> =
        EntityManager::new(config, &memory_drivers(&db), &ResourceRegistry::new())?;

    let err = manager.list(&NameFilter::prefix("")).await.err().expect("login must fail");

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("crm_app"), "{err}");
    assert!(db.journal().executions().is_empty());
    Ok(())
}

/// Test that a pool name nobody bound fails at call time, not at build time
#[tokio::test]
async fn test_unbound_pool_name() -> Result<()> {
    let db = customer_database();
    let manager: EntityManager<Customer> = EntityManager::new(
        ManagerConfig::pooled("pools/missing").with_procedures(customer_procedures()),
        &memory_drivers(&db),
        &ResourceRegistry::new(),
    )?;

    let err = manager
        .get(&crate::fixtures::KeyFilter { id: 1 })
        .await
        .err()
        .expect("lookup must fail");
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("pools/missing"));
    Ok(())
}

/// Test that a blank procedure name is a configuration error
#[tokio::test]
async fn test_blank_procedure_name() -> Result<()> {
    let db = customer_database();
    let mut procedures = customer_procedures();
    procedures.list = "  ".to_string();
    let manager: EntityManager<Customer> = EntityManager::new(
        ManagerConfig::direct("memory", "memory:crm").with_procedures(procedures),
        &memory_drivers(&db),
        &ResourceRegistry::new(),
    )?;

    let err = manager.list(&NameFilter::prefix("")).await.err().expect("blank name must fail");
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(db.journal().opens(), 0);
    Ok(())
}

/// Test a manager assembled from a TOML configuration with credential overrides
#[tokio::test]
async fn test_manager_from_toml() -> Result<()> {
    let db = customer_database();
    db.set_credentials("crm_app", "from-env");

    let mut config = ManagerConfig::from_toml_str(indoc! {r#"
        driver = "memory"
        connection_string = "memory:crm"
        username = "crm_app"
        password = "stale"

        [procedures]
        save = "usp_customer_save"
        delete = "usp_customer_delete"
        get = "usp_customer_get"
        list = "usp_customer_list"
    "#})?;
    config.apply_overrides(|key| (key == "PROCBIND_PASSWORD").then(|| "from-env".to_string()));
    assert!(!format!("{config:?}").contains("from-env"));

    let manager: EntityManager<Customer> =
        EntityManager::new(config, &memory_drivers(&db), &ResourceRegistry::new())?;
    let response = manager.save(&Customer::named("Acme")).await?;

    assert!(response.success);
    assert_eq!(db.table("customers").len(), 1);
    Ok(())
}
