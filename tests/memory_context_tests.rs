use std::collections::HashMap;

use metaquery::adapter::{
    ArrayTableDataProvider, MapTableDataProvider, ObjectTableDataProvider, SimpleTableDef,
    TableDataProvider, TableRecord,
};
use metaquery::{
    ColumnType, DataContext, DataContextExt, ErrorKind, MemoryDataContext, UpdateCallbackExt,
    UpdateableDataContextExt, Value, WhereClause,
};

fn bar_context() -> MemoryDataContext {
    let def = SimpleTableDef::new("bar", &["col1", "col2", "col3"]).with_types(&[
        ColumnType::Varchar,
        ColumnType::Integer,
        ColumnType::Boolean,
    ]);
    let rows = vec![
        vec![Value::from("2"), Value::from(1000), Value::from(true)],
        vec![Value::from("1"), Value::from(1001), Value::from(false)],
        vec![Value::from("1"), Value::from(1002), Value::from(true)],
        vec![Value::from("2"), Value::from(1003), Value::from(false)],
        vec![Value::from("2"), Value::from(1004), Value::from(false)],
    ];
    MemoryDataContext::new("foo", vec![Box::new(ArrayTableDataProvider::new(def, rows))]).unwrap()
}

fn scan(dc: &MemoryDataContext, table: &str) -> Vec<Vec<Value>> {
    dc.query().from(table).select("*").execute().unwrap().to_values().unwrap()
}

#[test]
fn test_filter_on_boolean() {
    let dc = bar_context();
    let mut ds = dc
        .query()
        .from("bar")
        .select("col2")
        .where_("col3")
        .eq(true)
        .execute()
        .unwrap();
    assert!(ds.next().unwrap());
    assert_eq!(ds.row().unwrap().values(), &[Value::from(1000)]);
    assert!(ds.next().unwrap());
    assert_eq!(ds.row().unwrap().values(), &[Value::from(1002)]);
    assert!(!ds.next().unwrap());
}

#[test]
fn test_update_script_and_ddl() {
    let dc = bar_context();
    dc.execute_update_with(|cb| {
        cb.delete_from("bar").where_("col1").eq("1").execute()?;
        cb.insert_into("bar")
            .value("col1", "3")
            .value("col2", 1005)
            .value("col3", true)
            .execute()
    })
    .unwrap();
    assert_eq!(
        scan(&dc, "bar"),
        vec![
            vec![Value::from("2"), Value::from(1000), Value::from(true)],
            vec![Value::from("2"), Value::from(1003), Value::from(false)],
            vec![Value::from("2"), Value::from(1004), Value::from(false)],
            vec![Value::from("3"), Value::from(1005), Value::from(true)],
        ]
    );

    dc.execute_update_with(|cb| cb.drop_table("bar").execute()).unwrap();
    assert_eq!(dc.default_schema().unwrap().table_count(), 0);

    dc.execute_update_with(|cb| {
        let table = cb.create_table("foo", "yo!").with_column("foo").with_column("bar").execute()?;
        cb.insert_into(table).value("foo", "1").value("bar", "2").execute()
    })
    .unwrap();
    let schema = dc.default_schema().unwrap();
    assert_eq!(schema.table_names(), vec!["yo!"]);
    assert_eq!(scan(&dc, "yo!"), vec![vec![Value::from("1"), Value::from("2")]]);
}

#[test]
fn test_explicit_null_update() {
    let dc = bar_context();
    dc.execute_update_with(|cb| {
        cb.update("bar")
            .value("col2", Value::Null)
            .where_("col2")
            .gt(1002)
            .execute()
    })
    .unwrap();
    let rows = dc
        .query()
        .from("bar")
        .select("col2")
        .where_("col2")
        .is_null()
        .execute()
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_grouping_and_ordering() {
    let dc = bar_context();
    let rows = dc
        .execute_sql("SELECT col1, COUNT(*), MAX(col2) FROM bar GROUP BY col1 ORDER BY col1 DESC")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("2"), Value::from(3), Value::from(1004)],
            vec![Value::from("1"), Value::from(2), Value::from(1002)],
        ]
    );
}

#[test]
fn test_limit_and_offset() {
    let dc = bar_context();
    let rows = dc
        .query()
        .from("bar")
        .select("col2")
        .order_by("col2")
        .offset(1)
        .limit(2)
        .execute()
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows, vec![vec![Value::from(1001)], vec![Value::from(1002)]]);
}

#[test]
fn test_unbounded_limit_with_offset() {
    let dc = bar_context();
    let rows = dc
        .query()
        .from("bar")
        .select("col2")
        .limit(usize::MAX)
        .offset(3)
        .execute()
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows, vec![vec![Value::from(1003)], vec![Value::from(1004)]]);
}

#[test]
fn test_not_null_column_rejects_null() {
    let dc = MemoryDataContext::empty("s");
    dc.execute_update_with(|cb| {
        cb.create_table("s", "t")
            .with_column("id")
            .of_type(ColumnType::Integer)
            .as_primary_key()
            .execute()
            .map(|_| ())
    })
    .unwrap();
    let err = dc
        .execute_update_with(|cb| cb.insert_into("t").value("id", Value::Null).execute())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[test]
fn test_map_and_object_providers() {
    struct Person {
        name: &'static str,
        age: i64,
    }

    impl TableRecord for Person {
        fn columns() -> Vec<(&'static str, ColumnType)> {
            vec![("name", ColumnType::Varchar), ("age", ColumnType::Integer)]
        }

        fn values(&self) -> Vec<Value> {
            vec![Value::from(self.name), Value::from(self.age)]
        }
    }

    let mut row = HashMap::new();
    row.insert("city".to_string(), Value::from("Copenhagen"));
    let cities = MapTableDataProvider::new(
        SimpleTableDef::new("cities", &["city", "country"]),
        vec![row],
    );
    let people = ObjectTableDataProvider::new(
        "people",
        vec![Person { name: "kasper", age: 40 }, Person { name: "ankit", age: 30 }],
    );
    let providers: Vec<Box<dyn TableDataProvider>> = vec![Box::new(cities), Box::new(people)];
    let dc = MemoryDataContext::new("s", providers).unwrap();

    assert_eq!(
        scan(&dc, "cities"),
        vec![vec![Value::from("Copenhagen"), Value::Null]]
    );
    let rows = dc
        .execute_sql("SELECT name FROM people WHERE age < 35")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows, vec![vec![Value::from("ankit")]]);
}
