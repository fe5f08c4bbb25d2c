//! Parameter Tests
//!
//! Extraction of named procedure parameters from entities and filters:
//! declaration order, name defaulting, type inference, repeatability and the
//! extract/map round trip through a stored procedure.

use crate::fixtures::{Customer, Harness, Provisioning, customer_database};
use anyhow::Result;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use procbind::{
    AttributeMetadata, Bindable, FieldBinding, ParamDirection, ProcedureNames, ResultMapper,
    ResultSet, Row, SqlType, Value, map_by_metadata,
};
use procbind_query::{Parameter, extract_parameters};
use rstest::rstest;

#[derive(Debug, Default, Clone, PartialEq)]
struct Invoice {
    number: String,
    amount_cents: i64,
    paid: bool,
    issued: Option<NaiveDate>,
    note: Option<String>,
}

impl Bindable for Invoice {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new()
            .field(
                FieldBinding::mapped("number", |i: &Invoice| i.number.clone(), |i, v| i.number = v)
                    .with_name("Number"),
            )
            .field(
                FieldBinding::mapped("amount_cents", |i: &Invoice| i.amount_cents, |i, v| {
                    i.amount_cents = v
                })
                .with_name("AmountCents"),
            )
            .field(
                FieldBinding::mapped("paid", |i: &Invoice| i.paid, |i, v| i.paid = v)
                    .with_name("Paid"),
            )
            .field(
                FieldBinding::mapped("issued", |i: &Invoice| i.issued, |i, v| i.issued = v)
                    .with_name("Issued")
                    .with_sql_type(SqlType::Date),
            )
            .field(
                FieldBinding::mapped("note", |i: &Invoice| i.note.clone(), |i, v| i.note = v)
                    .with_name("Note")
                    .with_sql_type(SqlType::Varchar),
            )
    }
}

impl ResultMapper for Invoice {
    fn map_one(row: &Row) -> procbind::Result<Self> {
        map_by_metadata(row)
    }
}

/// Attribute whose tag is blank, so it binds under its own identifier
struct LegacyFilter {
    region_code: String,
}

impl Bindable for LegacyFilter {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new()
            .field(
                FieldBinding::new("region_code", |f: &LegacyFilter| {
                    Value::from(f.region_code.as_str())
                })
                .with_name("   "),
            )
            .field(
                FieldBinding::new("limit", |_: &LegacyFilter| Value::Int32(50)).with_name(""),
            )
    }
}

struct Untagged;

impl Bindable for Untagged {
    fn metadata() -> AttributeMetadata<Self> {
        AttributeMetadata::new()
    }
}

fn invoice(number: &str, amount_cents: i64, paid: bool, note: Option<&str>) -> Invoice {
    Invoice {
        number: number.to_string(),
        amount_cents,
        paid,
        issued: NaiveDate::from_ymd_opt(2024, 2, 29),
        note: note.map(str::to_string),
    }
}

/// Test that a customer save binds Name as a VARCHAR input and Id as an INTEGER output
#[test]
fn test_customer_parameters_follow_declaration_order() -> Result<()> {
    let params = extract_parameters(&Customer::named("Acme"))?;

    assert_eq!(
        params,
        vec![
            Parameter::new("Name", "Acme"),
            Parameter {
                name: "Id".to_string(),
                value: Value::Null,
                sql_type: SqlType::Integer,
                direction: ParamDirection::Out,
            },
        ]
    );
    assert_eq!(params[0].sql_type, SqlType::Varchar);
    Ok(())
}

/// Test that blank tags fall back to the attribute identifier
#[rstest]
#[case::spaces("us-east")]
#[case::empty_value("")]
fn test_blank_names_fall_back_to_identifier(#[case] region: &str) -> Result<()> {
    let params = extract_parameters(&LegacyFilter {
        region_code: region.to_string(),
    })?;

    let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["region_code", "limit"]);
    assert_eq!(params[0].value, Value::from(region));
    Ok(())
}

/// Test that extracting twice from the same instance gives identical parameters
#[rstest]
#[case::full(invoice("INV-1", 12_500, true, Some("net 30")))]
#[case::nulls(invoice("INV-2", 0, false, None))]
#[case::negative(invoice("CR-7", -400, false, Some("")))]
fn test_extraction_is_repeatable(#[case] value: Invoice) -> Result<()> {
    let first = extract_parameters(&value)?;
    let second = extract_parameters(&value)?;
    assert_eq!(first, second);
    Ok(())
}

/// Test inferred and declared SQL types
#[test]
fn test_sql_types() -> Result<()> {
    let params = extract_parameters(&invoice("INV-3", 99, true, None))?;
    let types: Vec<_> = params.iter().map(|p| (p.name.as_str(), p.sql_type)).collect();
    assert_eq!(
        types,
        vec![
            ("Number", SqlType::Varchar),
            ("AmountCents", SqlType::BigInt),
            ("Paid", SqlType::Bit),
            ("Issued", SqlType::Date),
            ("Note", SqlType::Varchar),
        ]
    );
    Ok(())
}

/// Test that types without tagged attributes produce no parameters
#[test]
fn test_untagged_type_has_no_parameters() -> Result<()> {
    assert!(extract_parameters(&Untagged)?.is_empty());
    Ok(())
}

/// Test that extracted parameters map back to an equal entity
#[rstest]
#[case::full(invoice("INV-1", 12_500, true, Some("net 30")))]
#[case::nulls(invoice("INV-2", 0, false, None))]
#[case::no_date(Invoice { issued: None, ..invoice("INV-4", 1, true, None) })]
fn test_extract_then_map_round_trip(#[case] value: Invoice) -> Result<()> {
    let params = extract_parameters(&value)?;
    let row = Row::from_pairs(params.into_iter().map(|p| (p.name, p.value)));

    let mapped = Invoice::map_one(&row)?;
    assert_eq!(mapped, value);
    Ok(())
}

/// Test the round trip through a save procedure and a get procedure
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_round_trip_through_procedures(#[case] mode: Provisioning) -> Result<()> {
    let db = customer_database();
    db.register_procedure("usp_invoice_save", |ctx| {
        let row = Row::from_pairs(
            ["Number", "AmountCents", "Paid", "Issued", "Note"]
                .into_iter()
                .map(|column| (column, ctx.input(column).clone())),
        );
        ctx.insert("invoices", row);
        Ok(ResultSet::empty())
    });
    db.register_procedure("usp_invoice_get", |ctx| {
        let number: String = ctx.arg("Number")?;
        Ok(ctx.select("invoices", |r| {
            r.get_by_name("Number") == Some(&Value::from(number.as_str()))
        }))
    });

    let harness = Harness::with_database(mode, db)?;
    let invoices = procbind::CrudExecutor::<Invoice>::new(
        harness.manager.provider().clone(),
        ProcedureNames::new(
            "usp_invoice_save",
            "usp_invoice_delete",
            "usp_invoice_get",
            "usp_invoice_list",
        ),
    );

    let original = invoice("INV-9", 4_200, true, Some("paid by card"));
    assert!(invoices.save(&original).await?.success);

    let fetched = invoices.get(&original).await?;
    assert!(fetched.success, "{}", fetched.message);
    assert_eq!(fetched.data, Some(original));
    assert!(harness.all_released());
    Ok(())
}

/// Test that a save writes the generated key back through the output parameter
#[rstest]
#[case::direct(Provisioning::Direct)]
#[case::pooled(Provisioning::Pooled)]
#[tokio::test]
async fn test_save_returning_reads_output_key(#[case] mode: Provisioning) -> Result<()> {
    let harness = Harness::new(mode)?;
    harness.manager.save(&Customer::named("Initech")).await?;

    let mut customer = Customer::named("Acme");
    let response = harness.manager.save_returning(&mut customer).await?;

    assert!(response.success);
    assert_eq!(customer.id, Some(2));
    Ok(())
}
