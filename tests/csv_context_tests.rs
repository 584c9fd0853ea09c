use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use metaquery::{
    ColumnType, CsvConfiguration, CsvDataContext, DataContext, DataContextExt, ErrorKind,
    FileResource, UpdateCallbackExt, UpdateableDataContextExt, Value, ValueKind, WhereClause,
};

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("samples").join(name)
}

fn sample_context(name: &str) -> CsvDataContext {
    CsvDataContext::from_path(sample(name))
}

#[test]
fn test_mixed_types() {
    let dc = sample_context("developer.csv");
    let rows = dc
        .query()
        .from("developer")
        .select("name")
        .select("male")
        .select("developer_since")
        .execute()
        .unwrap()
        .to_values()
        .unwrap();

    assert_eq!(rows.len(), 4);
    for row in &rows {
        let kinds: Vec<ValueKind> = row.iter().map(|v| v.kind()).collect();
        assert_eq!(kinds, vec![ValueKind::String, ValueKind::Boolean, ValueKind::Timestamp]);
    }
}

#[test]
fn test_inferred_schema() {
    let dc = sample_context("developer.csv");
    let table = dc.table_by_qualified_label("developer").unwrap();
    let types: Vec<ColumnType> = table.columns().iter().map(|c| c.column_type).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::BigInt,
            ColumnType::Varchar,
            ColumnType::Varchar,
            ColumnType::Boolean,
            ColumnType::Timestamp,
        ]
    );
    for (i, column) in table.columns().iter().enumerate() {
        assert_eq!(column.number, i);
    }
}

#[test]
fn test_count() {
    let dc = sample_context("product.csv");
    let rows = dc.execute_sql("SELECT COUNT(*) FROM product").unwrap().to_values().unwrap();
    assert_eq!(rows, vec![vec![Value::from(2)]]);
}

#[test]
fn test_projection_in_file_order() {
    let dc = sample_context("product.csv");
    let mut ds = dc
        .execute_sql("SELECT name, version, founder_developer FROM product")
        .unwrap();

    assert!(ds.next().unwrap());
    assert_eq!(
        ds.row().unwrap().values(),
        &[Value::from("Anthons Algorithms"), Value::from(11), Value::from(1)]
    );
    assert!(ds.next().unwrap());
    assert_eq!(
        ds.row().unwrap().values(),
        &[Value::from("Barbaras Basic Bundle"), Value::from(2), Value::from(2)]
    );
    assert!(!ds.next().unwrap());
    ds.close();
    ds.close();
    assert!(!ds.next().unwrap());
}

#[test]
fn test_where_and_group_by() {
    let dc = sample_context("developer.csv");
    let rows = dc
        .execute_sql("SELECT name FROM developer WHERE male = false")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows, vec![vec![Value::from("barbara")]]);

    let rows = dc
        .execute_sql("SELECT male, COUNT(*) FROM developer GROUP BY male ORDER BY male")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from(false), Value::from(1)],
            vec![Value::from(true), Value::from(3)],
        ]
    );
}

#[test]
fn test_unknown_identifiers() {
    let dc = sample_context("product.csv");
    let err = dc.execute_sql("SELECT name FROM developer").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    let err = dc.query().from("product").select("nope").execute().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryConstruction);
}

#[test]
fn test_custom_delimiter_and_quotes() {
    let dc = CsvDataContext::new(
        Arc::new(FileResource::new(sample("visits.csv"))),
        CsvConfiguration::new().with_delimiter(';'),
    );
    let rows = dc
        .execute_sql("SELECT city, visits FROM visits ORDER BY id")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("Aarhus; DK"), Value::from(3)],
            vec![Value::from("Oslo"), Value::Null],
            vec![Value::from("Quoted \"name\""), Value::from(7)],
        ]
    );
}

#[test]
fn test_no_header() {
    let dc = CsvDataContext::new(
        Arc::new(FileResource::new(sample("product.csv"))),
        CsvConfiguration::new().with_column_name_line(0),
    );
    let table = dc.table_by_qualified_label("product").unwrap();
    assert_eq!(table.column_names(), vec!["column1", "column2", "column3"]);
    let rows = dc
        .execute_sql("SELECT column1 FROM product")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec![Value::from("name")]);
}

#[test]
fn test_update_rewrites_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product.csv");
    fs::copy(sample("product.csv"), &path).unwrap();
    let dc = CsvDataContext::from_path(&path);

    dc.execute_update_with(|cb| {
        cb.insert_into("product")
            .value("name", "Cobol Classics")
            .value("version", 3)
            .execute()?;
        cb.update("product").value("version", 12).where_("founder_developer").eq(1).execute()
    })
    .unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "name,version,founder_developer\n\
         Anthons Algorithms,12,1\n\
         Barbaras Basic Bundle,2,2\n\
         Cobol Classics,3,\n"
    );
    let rows = dc
        .execute_sql("SELECT name FROM product WHERE founder_developer IS NULL")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows, vec![vec![Value::from("Cobol Classics")]]);
}

#[test]
fn test_create_table_in_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.csv");
    let dc = CsvDataContext::from_path(&path);
    assert_eq!(dc.default_schema().unwrap().table_count(), 0);

    dc.execute_update_with(|cb| {
        let table = cb
            .create_table("fresh.csv", "fresh")
            .with_column("a")
            .with_column("b")
            .execute()?;
        cb.insert_into(table).value("a", "1").value("b", "x").execute()
    })
    .unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,x\n");
    let rows = dc.execute_sql("SELECT b FROM fresh").unwrap().to_values().unwrap();
    assert_eq!(rows, vec![vec![Value::from("x")]]);
}

#[test]
fn test_drop_table_empties_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product.csv");
    fs::copy(sample("product.csv"), &path).unwrap();
    let dc = CsvDataContext::from_path(&path);

    dc.execute_update_with(|cb| cb.drop_table("product").execute()).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "");
    assert_eq!(dc.default_schema().unwrap().table_count(), 0);
}
