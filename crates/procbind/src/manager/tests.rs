use super::*;
use pretty_assertions::assert_eq;
use procbind_connection::PoolConfig;
use procbind_core::{
    AttributeMetadata, ErrorKind, FieldBinding, ProcbindError, ResultSet, Row, Value,
    map_by_metadata,
};
use procbind_driver_memory::{MemoryDatabase, MemoryDriver};

#[derive(Debug, Default, Clone, PartialEq)]
struct Product {
    sku: String,
    price: i64,
}

impl Bindable for Product {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new()
            .field(
                FieldBinding::mapped("sku", |p: &Product| p.sku.clone(), |p, v| p.sku = v)
                    .with_name("Sku"),
            )
            .field(
                FieldBinding::mapped("price", |p: &Product| p.price, |p, v| p.price = v)
                    .with_name("Price"),
            )
    }
}

impl ResultMapper for Product {
    fn map_one(row: &Row) -> Result<Self> {
        map_by_metadata(row)
    }
}

struct SkuFilter(&'static str);

impl Bindable for SkuFilter {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new().field(FieldBinding::new("Sku", |f: &SkuFilter| Value::from(f.0)))
    }
}

fn catalog() -> MemoryDatabase {
    let db = MemoryDatabase::new("shop");
    db.register_procedure("usp_product_save", |ctx| {
        let sku: String = ctx.arg("Sku")?;
        let price: i64 = ctx.arg("Price")?;
        ctx.insert(
            "products",
            Row::from_pairs([("Sku", Value::from(sku)), ("Price", Value::Int64(price))]),
        );
        Ok(ResultSet::empty())
    });
    db.register_procedure("usp_product_get", |ctx| {
        let sku: String = ctx.arg("Sku")?;
        Ok(ctx.select("products", |r| r.get_by_name("Sku") == Some(&Value::from(sku.as_str()))))
    });
    db.register_procedure("usp_product_delete", |_| {
        Err(ProcbindError::Execution("delete is disabled".to_string()))
    });
    db
}

fn drivers(db: &MemoryDatabase) -> DriverRegistry {
    DriverRegistry::new().with_driver(Arc::new(MemoryDriver::new().with_database(db.clone())))
}

fn procedures() -> ProcedureNames {
    ProcedureNames::new(
        "usp_product_save",
        "usp_product_delete",
        "usp_product_get",
        "usp_product_list",
    )
}

#[tokio::test]
async fn test_direct_manager_round_trip() {
    let db = catalog();
    let config = ManagerConfig::direct("memory", "memory:shop").with_procedures(procedures());
    let manager: EntityManager<Product> =
        EntityManager::new(config, &drivers(&db), &ResourceRegistry::new()).unwrap();

    let saved = manager
        .save(&Product {
            sku: "A-1".to_string(),
            price: 1250,
        })
        .await
        .unwrap();
    assert!(saved.success);

    let fetched = manager.get(&SkuFilter("A-1")).await.unwrap();
    assert!(fetched.success);
    assert_eq!(
        fetched.data,
        Some(Product {
            sku: "A-1".to_string(),
            price: 1250
        })
    );
    assert_eq!(manager.config().map(|c| c.driver.as_str()), Some("memory"));
}

#[tokio::test]
async fn test_execution_failure_reaches_caller_as_response() {
    let db = catalog();
    let config = ManagerConfig::direct("memory", "memory:shop").with_procedures(procedures());
    let manager: EntityManager<Product> =
        EntityManager::new(config, &drivers(&db), &ResourceRegistry::new()).unwrap();

    let response = manager.delete(&Product::default()).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message, "delete is disabled");
    assert_eq!(db.journal().rollbacks(), 1);
}

#[tokio::test]
async fn test_pooled_manager_uses_registered_pool() {
    let db = catalog();
    let registry = drivers(&db);
    let resources = ResourceRegistry::new();
    let mut config = ManagerConfig::direct("memory", "memory:shop")
        .with_procedures(procedures())
        .with_pool(PoolConfig::new(1, 2));
    config.pool_enabled = true;
    config.pool_name = Some("pools/shop".to_string());

    let manager: EntityManager<Product> =
        EntityManager::new(config.clone(), &registry, &resources).unwrap();
    let pool = register_pool(&config, &registry, &resources).unwrap();
    let again = register_pool(&config, &registry, &resources).unwrap();
    assert!(Arc::ptr_eq(&pool, &again));

    for price in [1, 2] {
        let response = manager
            .save(&Product {
                sku: format!("P-{price}"),
                price,
            })
            .await
            .unwrap();
        assert!(response.success);
    }

    assert_eq!(db.table("products").len(), 2);
    assert_eq!(db.journal().opens(), 1);
    assert_eq!(pool.stats().leased(), 0);
}

#[test]
fn test_register_pool_requires_name() {
    let db = catalog();
    let config = ManagerConfig::direct("memory", "memory:shop");
    let err = register_pool(&config, &drivers(&db), &ResourceRegistry::new()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_from_config_file() {
    let db = catalog();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manager.toml");
    std::fs::write(
        &path,
        r#"
driver = "memory"
connection_string = "memory:shop"

[procedures]
save = "usp_product_save"
delete = "usp_product_delete"
get = "usp_product_get"
list = "usp_product_list"
"#,
    )
    .unwrap();

    let manager: EntityManager<Product> =
        EntityManager::from_config_file(&path, &drivers(&db), &ResourceRegistry::new()).unwrap();
    assert_eq!(manager.procedures().save, "usp_product_save");
}

#[test]
fn test_from_config_file_with_unknown_driver() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manager.toml");
    std::fs::write(
        &path,
        "driver = \"oracle\"\nconnection_string = \"thin:@db:1521:ORCL\"\n",
    )
    .unwrap();

    let err = EntityManager::<Product>::from_config_file(
        &path,
        &DriverRegistry::new(),
        &ResourceRegistry::new(),
    )
    .err()
    .unwrap();
    assert!(format!("{err:#}").contains("unknown driver oracle"));
}
