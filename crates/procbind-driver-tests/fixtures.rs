//! Shared entities, procedures and manager setup for the behavioural tests.
//!
//! Every test builds its own [`MemoryDatabase`], so tests never share rows or
//! journal entries. [`Harness::new`] wires an [`EntityManager`] to that
//! database through the chosen [`Provisioning`] mode.
//!
//! ```rust,ignore
//! use procbind_driver_tests::fixtures::{Harness, Provisioning};
//! use rstest::rstest;
//!
//! #[rstest]
//! #[case::direct(Provisioning::Direct)]
//! #[case::pooled(Provisioning::Pooled)]
//! #[tokio::test]
//! async fn test_save(#[case] mode: Provisioning) -> anyhow::Result<()> {
//!     let harness = Harness::new(mode)?;
//!     let response = harness.manager.save(&Customer::named("Acme")).await?;
//!     assert!(response.success);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use procbind::{
    AttributeMetadata, Bindable, ConnectionPool, DriverRegistry, EntityManager, FieldBinding,
    ManagerConfig, ParamDirection, PoolConfig, ProcbindError, ProcedureNames, ResourceRegistry,
    ResultMapper, ResultSet, Row, SqlType, Value, map_by_metadata, register_pool,
};
use procbind_driver_memory::{MemoryDatabase, MemoryDriver};

/// Message the save procedure raises for a duplicate customer name
pub const DUPLICATE_NAME: &str = concat!(
    "Violation of UNIQUE KEY constraint 'UQ_Customer_Name'. ",
    "Cannot insert duplicate key in object 'dbo.Customer'."
);

/// Message the delete procedure raises for a locked customer
pub const LOCKED_ROW: &str =
    "The DELETE statement conflicted with the REFERENCE constraint 'FK_Order_Customer'.";

/// Name the save procedure always rejects
pub const REJECTED_NAME: &str = "FAIL";

/// Name the delete procedure always rejects
pub const LOCKED_NAME: &str = "LOCKED";

const DATABASE: &str = "crm";
const POOL_NAME: &str = "pools/crm";

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
});

/// Install a test subscriber once per process; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// How the manager under test obtains connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provisioning {
    /// A fresh driver connection per call, closed on release
    Direct,
    /// A named pool bound in the resource registry
    Pooled,
}

/// Customer entity: `Name` is an input, `Id` is assigned by the save procedure
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Customer {
    /// Key assigned by the database
    pub id: Option<i32>,
    /// Unique display name
    pub name: String,
}

impl Customer {
    /// A customer that has not been saved yet
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }
}

impl Bindable for Customer {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new()
            .with_entity_name("Customer")
            .field(
                FieldBinding::mapped("name", |c: &Customer| c.name.clone(), |c, v| c.name = v)
                    .with_name("Name"),
            )
            .field(
                FieldBinding::mapped("id", |c: &Customer| c.id, |c, v| c.id = v)
                    .with_name("Id")
                    .with_direction(ParamDirection::Out)
                    .with_sql_type(SqlType::Integer),
            )
    }
}

impl ResultMapper for Customer {
    fn map_one(row: &Row) -> procbind::Result<Self> {
        map_by_metadata(row)
    }
}

/// Selects customers whose name starts with a prefix
#[derive(Debug, Clone)]
pub struct NameFilter {
    /// Required name prefix; empty matches everyone
    pub prefix: String,
}

impl NameFilter {
    /// Filter on a name prefix
    pub fn prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl Bindable for NameFilter {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new().field(
            FieldBinding::new("prefix", |f: &NameFilter| Value::from(f.prefix.as_str()))
                .with_name("Prefix"),
        )
    }
}

/// Selects one customer by key
#[derive(Debug, Clone, Copy)]
pub struct KeyFilter {
    /// Customer key
    pub id: i32,
}

impl Bindable for KeyFilter {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new()
            .field(FieldBinding::new("id", |f: &KeyFilter| Value::Int32(f.id)).with_name("Id"))
    }
}

fn name_of(row: &Row) -> String {
    row.try_get::<String>("Name").unwrap_or_default()
}

/// The four procedure names of the customer manager
pub fn customer_procedures() -> ProcedureNames {
    ProcedureNames::new(
        "usp_customer_save",
        "usp_customer_delete",
        "usp_customer_get",
        "usp_customer_list",
    )
}

/// Database with the customer procedures registered and no rows
///
/// - `usp_customer_save`: inserts `Name`, returns the new key in `Id`;
///   duplicate names and [`REJECTED_NAME`] raise [`DUPLICATE_NAME`]
/// - `usp_customer_delete`: deletes by `Name` or by `Prefix`;
///   [`LOCKED_NAME`] raises [`LOCKED_ROW`]
/// - `usp_customer_get`: selects by `Id`
/// - `usp_customer_list`: selects by `Prefix`, ordered by name
/// - `usp_customer_rename`: always raises [`DUPLICATE_NAME`]
/// - `usp_customer_none`: returns no rows
pub fn customer_database() -> MemoryDatabase {
    let db = MemoryDatabase::new(DATABASE);

    db.register_procedure("usp_customer_save", |ctx| {
        let name: String = ctx.arg("Name")?;
        if name == REJECTED_NAME || ctx.rows("customers").iter().any(|r| name_of(r) == name) {
            return Err(ProcbindError::Execution(DUPLICATE_NAME.to_string()));
        }
        let id = ctx
            .rows("customers")
            .iter()
            .filter_map(|r| r.try_get::<i32>("Id").ok())
            .max()
            .unwrap_or(0)
            + 1;
        ctx.insert(
            "customers",
            Row::from_pairs([("Id", Value::Int32(id)), ("Name", Value::from(name))]),
        );
        ctx.set_out("Id", id);
        Ok(ResultSet::empty())
    });

    db.register_procedure("usp_customer_delete", |ctx| {
        if let Some(prefix) = ctx.input("Prefix").as_str().map(str::to_string) {
            ctx.delete_where("customers", |r| name_of(r).starts_with(&prefix));
            return Ok(ResultSet::empty());
        }
        let name: String = ctx.arg("Name")?;
        if name == LOCKED_NAME {
            return Err(ProcbindError::Execution(LOCKED_ROW.to_string()));
        }
        ctx.delete_where("customers", |r| name_of(r) == name);
        Ok(ResultSet::empty())
    });

    db.register_procedure("usp_customer_get", |ctx| {
        let id: i32 = ctx.arg("Id")?;
        Ok(ctx.select("customers", |r| r.get_by_name("Id") == Some(&Value::Int32(id))))
    });

    db.register_procedure("usp_customer_list", |ctx| {
        let prefix: String = ctx.arg("Prefix")?;
        let mut rows = ctx.select("customers", |r| name_of(r).starts_with(&prefix)).rows;
        rows.sort_by_key(name_of);
        Ok(ResultSet::new(rows))
    });

    db.register_procedure("usp_customer_rename", |_| {
        Err(ProcbindError::Execution(DUPLICATE_NAME.to_string()))
    });

    db.register_procedure("usp_customer_none", |_| Ok(ResultSet::empty()));

    db
}

/// Insert committed customers with keys 1..=n in the given order
pub fn seed_customers(db: &MemoryDatabase, names: &[&str]) {
    db.seed(
        "customers",
        names.iter().enumerate().map(|(idx, name)| {
            Row::from_pairs([("Id", Value::Int32(idx as i32 + 1)), ("Name", Value::from(*name))])
        }),
    );
}

/// Committed customer names in storage order
pub fn stored_names(db: &MemoryDatabase) -> Vec<String> {
    db.table("customers").iter().map(name_of).collect()
}

/// A database, a manager over it and, in pooled mode, the pool in use
pub struct Harness {
    /// Connection mode of `manager`
    pub mode: Provisioning,
    /// Backing database; its journal records every connection action
    pub db: MemoryDatabase,
    /// Manager under test
    pub manager: EntityManager<Customer>,
    /// Pool the manager resolves, in pooled mode
    pub pool: Option<Arc<ConnectionPool>>,
}

impl Harness {
    /// Harness over an empty customer database
    pub fn new(mode: Provisioning) -> Result<Self> {
        Self::with_database(mode, customer_database())
    }

    /// Harness over a given database
    pub fn with_database(mode: Provisioning, db: MemoryDatabase) -> Result<Self> {
        init_tracing();
        let drivers = DriverRegistry::new()
            .with_driver(Arc::new(MemoryDriver::new().with_database(db.clone())));
        let resources = ResourceRegistry::new();

        let mut config = ManagerConfig::direct("memory", format!("memory:{}", DATABASE))
            .with_procedures(customer_procedures());

        let pool = match mode {
            Provisioning::Direct => None,
            Provisioning::Pooled => {
                config = config.with_pool(PoolConfig::new(1, 4));
                config.pool_enabled = true;
                config.pool_name = Some(POOL_NAME.to_string());
                let pool = register_pool(&config, &drivers, &resources)
                    .context("failed to register pool")?;
                Some(pool)
            }
        };

        let manager =
            EntityManager::new(config, &drivers, &resources).context("failed to build manager")?;
        Ok(Self {
            mode,
            db,
            manager,
            pool,
        })
    }

    /// True when every connection the manager took has been given back
    ///
    /// Direct connections must be closed; pooled ones must be back in the pool.
    pub fn all_released(&self) -> bool {
        match &self.pool {
            None => self.db.journal().opens() == self.db.journal().closes(),
            Some(pool) => pool.stats().leased() == 0,
        }
    }
}
