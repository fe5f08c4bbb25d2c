//! Transaction Tests
//!
//! Write paths run every statement of a batch on one connection with
//! auto-commit off and commit once. A failing statement rolls the whole
//! batch back and comes back as a failed response carrying the server
//! message. Connections are released on every path.

use crate::fixtures::{
    Customer, DUPLICATE_NAME, Harness, LOCKED_NAME, LOCKED_ROW, NameFilter, Provisioning,
    REJECTED_NAME, customer_database, seed_customers, stored_names,
};
use anyhow::Result;
use pretty_assertions::assert_eq;
use procbind::ErrorKind;
use procbind_driver_memory::JournalEvent;
use rstest::rstest;

fn customers(names: &[&str]) -> Vec<Customer> {
    names.iter().map(|n| Customer::named(n)).collect()
}

/// Test that a batch save commits once for all rows
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_save_all_commits_once(#[case] mode: Provisioning) -> Result<()> {
    let harness = Harness::new(mode)?;

    let response = harness
        .manager
        .save_all(&customers(&["Acme", "Globex", "Initech"]))
        .await?;

    assert!(response.success);
    assert!(response.message.is_empty());
    assert_eq!(stored_names(&harness.db), vec!["Acme", "Globex", "Initech"]);
    assert_eq!(harness.db.journal().commits(), 1);
    assert_eq!(harness.db.journal().rollbacks(), 0);
    assert!(harness.all_released());
    Ok(())
}

/// Test that any failing row discards the effects of every row in the batch
#[rstest]
#[case::first_of_two(&[REJECTED_NAME, "Acme"])]
#[case::last_of_two(&["Acme", REJECTED_NAME])]
#[case::middle(&["Acme", REJECTED_NAME, "Globex"])]
#[case::duplicate_in_batch(&["Acme", "Globex", "Acme", "Initech"])]
#[tokio::test]
async fn test_save_all_is_all_or_nothing(
    #[case] names: &[&str],
    #[values(Provisioning::Direct, Provisioning::Pooled)] mode: Provisioning,
) -> Result<()> {
    let harness = Harness::new(mode)?;
    let response = harness.manager.save_all(&customers(names)).await?;

    assert!(!response.success);
    assert_eq!(response.message, DUPLICATE_NAME);
    assert!(stored_names(&harness.db).is_empty());
    assert_eq!(harness.db.journal().commits(), 0);
    assert_eq!(harness.db.journal().rollbacks(), 1);
    assert!(harness.all_released());
    Ok(())
}

/// Test that a failing delete leaves every row of the batch in place
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_delete_all_is_all_or_nothing(#[case] mode: Provisioning) -> Result<()> {
    let db = customer_database();
    seed_customers(&db, &["Acme", LOCKED_NAME, "Globex"]);
    let harness = Harness::with_database(mode, db)?;

    let response = harness
        .manager
        .delete_all(&customers(&["Acme", LOCKED_NAME, "Globex"]))
        .await?;

    assert!(!response.success);
    assert_eq!(response.message, LOCKED_ROW);
    assert_eq!(stored_names(&harness.db), vec!["Acme", LOCKED_NAME, "Globex"]);
    assert_eq!(harness.db.journal().rollbacks(), 1);
    assert!(harness.all_released());
    Ok(())
}

/// Test single deletes and deletes by filter
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_delete_single_and_by_filter(#[case] mode: Provisioning) -> Result<()> {
    let db = customer_database();
    seed_customers(&db, &["Acme", "Aperture", "Globex", "Initech"]);
    let harness = Harness::with_database(mode, db)?;

    assert!(harness.manager.delete(&Customer::named("Globex")).await?.success);
    assert!(
        harness
            .manager
            .delete_by_filter(&NameFilter::prefix("A"))
            .await?
            .success
    );

    assert_eq!(stored_names(&harness.db), vec!["Initech"]);
    assert_eq!(harness.db.journal().commits(), 2);
    assert!(harness.all_released());
    Ok(())
}

/// Test that an update procedure raising a constraint violation fails cleanly
#[tokio::test]
async fn test_execute_update_constraint_violation() -> Result<()> {
    let harness = Harness::new(Provisioning::Direct)?;

    let response = harness
        .manager
        .execute_update(&NameFilter::prefix("Acme"), "usp_customer_rename")
        .await?;

    assert!(!response.success);
    assert_eq!(response.message, DUPLICATE_NAME);
    assert_eq!(harness.db.journal().rollbacks(), 1);
    assert_eq!(harness.db.journal().commits(), 0);
    assert_eq!(harness.db.journal().closes(), 1);
    Ok(())
}

/// Test the order of connection actions on a failed update
#[tokio::test]
async fn test_failed_update_rolls_back_before_closing() -> Result<()> {
    let harness = Harness::new(Provisioning::Direct)?;

    harness
        .manager
        .execute_update(&NameFilter::prefix("Acme"), "usp_customer_rename")
        .await?;

    let tail: Vec<_> = harness
        .db
        .journal()
        .events()
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                JournalEvent::Executed { .. }
                    | JournalEvent::RolledBack { .. }
                    | JournalEvent::Closed { .. }
            )
        })
        .collect();
    assert!(matches!(
        tail.as_slice(),
        [
            JournalEvent::Executed { success: false, .. },
            JournalEvent::RolledBack { .. },
            JournalEvent::Closed { .. },
        ]
    ));
    Ok(())
}

/// Test that binding against a procedure that rejects a name is a hard error
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_bind_error_propagates_and_releases(#[case] mode: Provisioning) -> Result<()> {
    let db = customer_database();
    db.register_with_signature(
        "usp_customer_touch",
        procbind_driver_memory::ProcedureSignature::new().input("CustomerName"),
        |_| Ok(procbind::ResultSet::empty()),
    );
    let harness = Harness::with_database(mode, db)?;

    let err = harness
        .manager
        .execute_update(&NameFilter::prefix("A"), "usp_customer_touch")
        .await
        .err()
        .expect("binding an undeclared parameter must fail");

    assert_eq!(err.kind(), ErrorKind::Bind);
    assert_eq!(harness.db.journal().rollbacks(), 1);
    assert!(harness.all_released());
    Ok(())
}
