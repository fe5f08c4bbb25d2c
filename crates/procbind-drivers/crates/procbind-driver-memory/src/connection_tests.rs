//! Tests for in-memory connections and statements

use crate::{MemoryDatabase, ProcedureSignature};
use pretty_assertions::assert_eq;
use procbind_core::{Connection, ErrorKind, ProcbindError, ResultSet, Row, SqlType, Value};

fn database() -> MemoryDatabase {
    let db = MemoryDatabase::new("test");
    db.register_with_signature(
        "usp_save_customer",
        ProcedureSignature::new().input("Name").output("Id"),
        |ctx| {
            let name: String = ctx.arg("Name")?;
            if name.is_empty() {
                return Err(ProcbindError::Execution(
                    "Cannot insert the value NULL into column 'Name'".to_string(),
                ));
            }
            let id = ctx.rows("customers").len() as i32 + 1;
            ctx.insert(
                "customers",
                Row::from_pairs([("Id", Value::Int32(id)), ("Name", Value::from(name))]),
            );
            ctx.set_out("Id", id);
            Ok(ResultSet::empty())
        },
    );
    db.register_procedure("usp_list_customers", |ctx| Ok(ctx.select("customers", |_| true)));
    db
}

async fn save(conn: &dyn Connection, name: &str) -> procbind_core::Result<Option<Value>> {
    let mut stmt = conn.prepare_call("usp_save_customer").await?;
    stmt.set_value("Name", Value::from(name))?;
    stmt.register_out("Id", SqlType::Integer)?;
    stmt.execute_update().await?;
    Ok(stmt.out_value("Id").cloned())
}

#[tokio::test]
async fn test_auto_commit_publishes_each_call() {
    let db = database();
    let conn = db.connect(None, None).unwrap();

    let id = save(&conn, "Acme").await.unwrap();
    assert_eq!(id, Some(Value::Int32(1)));
    assert_eq!(db.table("customers").len(), 1);
    assert!(!conn.in_transaction());
}

#[tokio::test]
async fn test_commit_publishes_working_copy() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    conn.set_auto_commit(false).await.unwrap();

    save(&conn, "Acme").await.unwrap();
    save(&conn, "Globex").await.unwrap();
    assert!(db.table("customers").is_empty());
    assert!(conn.in_transaction());

    conn.commit().await.unwrap();
    assert_eq!(db.table("customers").len(), 2);
    assert_eq!(db.journal().commits(), 1);
}

#[tokio::test]
async fn test_rollback_discards_working_copy() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    conn.set_auto_commit(false).await.unwrap();

    save(&conn, "Acme").await.unwrap();
    let err = save(&conn, "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    conn.rollback().await.unwrap();
    assert!(db.table("customers").is_empty());
    assert_eq!(db.journal().rollbacks(), 1);
    assert_eq!(
        db.journal().executions(),
        vec![
            ("usp_save_customer".to_string(), true),
            ("usp_save_customer".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn test_failed_call_keeps_earlier_work() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    conn.set_auto_commit(false).await.unwrap();

    save(&conn, "Acme").await.unwrap();
    assert!(save(&conn, "").await.is_err());
    conn.commit().await.unwrap();
    assert_eq!(db.table("customers").len(), 1);
}

#[tokio::test]
async fn test_enabling_auto_commit_commits_pending_work() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    conn.set_auto_commit(false).await.unwrap();
    save(&conn, "Acme").await.unwrap();

    conn.set_auto_commit(true).await.unwrap();
    assert_eq!(db.table("customers").len(), 1);
}

#[tokio::test]
async fn test_commit_in_auto_commit_mode_fails() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    assert!(conn.commit().await.is_err());
}

#[tokio::test]
async fn test_close_discards_and_is_idempotent() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    conn.set_auto_commit(false).await.unwrap();
    save(&conn, "Acme").await.unwrap();

    conn.close().await.unwrap();
    conn.close().await.unwrap();
    assert!(conn.is_closed());
    assert!(db.table("customers").is_empty());
    assert_eq!(db.journal().closes(), 1);

    let err = conn.prepare_call("usp_save_customer").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_signature_rejects_unknown_parameter() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    let mut stmt = conn.prepare_call("usp_save_customer").await.unwrap();

    let err = stmt.set_value("Nmae", Value::from("Acme")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bind);
    let err = stmt.register_out("Name", SqlType::Varchar).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bind);
}

#[tokio::test]
async fn test_signature_requires_inputs() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    let mut stmt = conn.prepare_call("usp_save_customer").await.unwrap();

    let err = stmt.execute_update().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bind);
}

#[tokio::test]
async fn test_unknown_procedure_fails_on_execute() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    let mut stmt = conn.prepare_call("usp_missing").await.unwrap();

    let err = stmt.execute_query().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.to_string(), "Could not find stored procedure 'usp_missing'");
}

#[tokio::test]
async fn test_query_returns_rows_in_order() {
    let db = database();
    let conn = db.connect(None, None).unwrap();
    save(&conn, "Acme").await.unwrap();
    save(&conn, "Globex").await.unwrap();

    let mut stmt = conn.prepare_call("usp_list_customers").await.unwrap();
    let rows = stmt.execute_query().await.unwrap();
    let names: Vec<_> = rows
        .into_iter()
        .map(|r| r.try_get::<String>("Name").unwrap())
        .collect();
    assert_eq!(names, vec!["Acme", "Globex"]);
}
