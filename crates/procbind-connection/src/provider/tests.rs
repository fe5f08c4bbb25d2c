use super::*;
use crate::pool::PoolConfig;
use pretty_assertions::assert_eq;
use procbind_core::ErrorKind;
use procbind_driver_memory::{MemoryDatabase, MemoryDriver};

fn drivers(database: &MemoryDatabase) -> DriverRegistry {
    DriverRegistry::new().with_driver(Arc::new(MemoryDriver::new().with_database(database.clone())))
}

#[tokio::test]
async fn test_direct_provider_opens_without_auto_commit_and_closes() {
    let db = MemoryDatabase::new("crm");
    let config = ManagerConfig::direct("memory", "memory:crm");
    let provider = build_provider(&config, &drivers(&db), &ResourceRegistry::new()).unwrap();

    let conn = provider.open().await.unwrap();
    assert!(!conn.auto_commit());
    provider.release(Arc::clone(&conn)).await.unwrap();

    assert!(conn.is_closed());
    assert_eq!(db.journal().closes(), 1);
    assert_eq!(provider.describe(), "direct memory");
}

#[tokio::test]
async fn test_direct_provider_login_failure_is_connection_error() {
    let db = MemoryDatabase::new("crm");
    db.set_credentials("app", "s3cret");
    let config = ManagerConfig::direct("memory", "memory:crm").with_credentials("app", "wrong");
    let provider = build_provider(&config, &drivers(&db), &ResourceRegistry::new()).unwrap();

    let err = provider.open().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn test_unknown_driver_is_configuration_error() {
    let config = ManagerConfig::direct("oracle", "thin:@host:1521:SID");
    let err = build_provider(&config, &DriverRegistry::new(), &ResourceRegistry::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_pooled_provider_resolves_at_open() {
    let db = MemoryDatabase::new("crm");
    let registry = drivers(&db);
    let resources = ResourceRegistry::new();
    let provider =
        build_provider(&ManagerConfig::pooled("jdbc/crm"), &registry, &resources).unwrap();

    // not bound yet
    let err = provider.open().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Connection);

    let pool_config =
        ManagerConfig::direct("memory", "memory:crm").with_pool(PoolConfig::new(1, 2));
    let pool = Arc::new(build_pool(&pool_config, &registry).unwrap());
    resources.bind("jdbc/crm", Arc::clone(&pool));

    let conn = provider.open().await.unwrap();
    assert!(!conn.auto_commit());
    assert_eq!(pool.stats().leased(), 1);

    provider.release(conn).await.unwrap();
    assert_eq!(pool.stats().idle(), 1);
    assert_eq!(db.journal().closes(), 0);
}

#[tokio::test]
async fn test_pooled_release_after_unbind_closes() {
    let db = MemoryDatabase::new("crm");
    let registry = drivers(&db);
    let resources = ResourceRegistry::new();
    let pool = build_pool(&ManagerConfig::direct("memory", "memory:crm"), &registry).unwrap();
    resources.bind("jdbc/crm", Arc::new(pool));
    let provider = PooledProvider::new(resources.clone(), "jdbc/crm");

    let conn = provider.open().await.unwrap();
    resources.unbind("jdbc/crm");
    provider.release(Arc::clone(&conn)).await.unwrap();
    assert!(conn.is_closed());
}

#[test]
fn test_build_provider_validates_config() {
    let config = ManagerConfig {
        pool_enabled: true,
        ..ManagerConfig::default()
    };
    let err = build_provider(&config, &DriverRegistry::new(), &ResourceRegistry::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
