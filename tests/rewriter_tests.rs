use std::sync::Arc;

use metaquery::query::{FromItem, JoinType, OrderByItem, ScalarFunction};
use metaquery::update::{CreateTableStatement, InsertStatement, RowValues, UpdateStatement};
use metaquery::{
    Column, ColumnType, Dialect, DialectRegistry, DialectRewriter, ErrorKind, FilterItem,
    OperatorType, Query, QueryRewriter, Schema, SelectItem, Table, Value,
};

fn table(name: &str) -> Table {
    let mut table = Table::new(name);
    for column in ["c1", "c2", "c3"] {
        table.add_column(Column::new(column, ColumnType::Integer)).unwrap();
    }
    table
}

fn in_schema(schema: &str, table: Table) -> Table {
    let name = table.name().to_string();
    let mut schema = Schema::new(schema);
    schema.add_table(table).unwrap();
    schema.table_by_name(&name).unwrap().clone()
}

fn column(table: &Table, name: &str) -> SelectItem {
    SelectItem::column(table.column_by_name(name).unwrap().clone())
}

fn render(dialect: Dialect, query: &Query) -> String {
    DialectRewriter::new(dialect).render_query(query, false).unwrap().sql
}

#[test]
fn test_insert_skips_unset_columns() {
    let t = table("t");
    let values = RowValues::from_parts(
        t.columns().to_vec(),
        vec![Value::Null, Value::from(5), Value::Null],
        vec![false, false, true],
    )
    .unwrap();
    let insert = InsertStatement { table: t, values };

    let statement = DialectRewriter::new(Dialect::Ansi).render_insert(&insert, false).unwrap();
    assert_eq!(statement.sql, "INSERT INTO t (c2,c3) VALUES (?,?)");
    assert_eq!(statement.parameters, vec![Value::from(5), Value::Null]);

    let inline = DialectRewriter::new(Dialect::Ansi).render_insert(&insert, true).unwrap();
    assert_eq!(inline.sql, "INSERT INTO t (c2,c3) VALUES (5,NULL)");
    assert!(inline.parameters.is_empty());
}

#[test]
fn test_update_binds_set_values_before_where_operands() {
    let t = in_schema("s", table("t"));
    let mut values = RowValues::new(t.columns().to_vec());
    values.set_by_name("c1", Value::from(7)).unwrap();
    let update = UpdateStatement {
        where_items: vec![FilterItem::new(column(&t, "c2"), OperatorType::Equals, 3)],
        table: t,
        values,
    };

    let statement = DialectRewriter::new(Dialect::Sqlite).render_update(&update, false).unwrap();
    assert_eq!(statement.sql, "UPDATE s.t SET c1=? WHERE c2 = ?");
    assert_eq!(statement.parameters, vec![Value::from(7), Value::from(3)]);
}

#[test]
fn test_update_without_values_is_rejected() {
    let t = table("t");
    let update = UpdateStatement {
        values: RowValues::new(t.columns().to_vec()),
        where_items: Vec::new(),
        table: t,
    };
    let err = DialectRewriter::new(Dialect::Ansi).render_update(&update, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryConstruction);
}

#[test]
fn test_create_table_keeps_key_order() {
    let mut t = Table::new("link");
    t.add_column(Column::new("a", ColumnType::Integer).with_primary_key(2)).unwrap();
    t.add_column(Column::new("b", ColumnType::Integer).with_primary_key(1)).unwrap();
    let statement = DialectRewriter::new(Dialect::Sqlite)
        .render_create_table(&CreateTableStatement { table: t })
        .unwrap();
    assert!(statement.sql.starts_with("CREATE TABLE link (a"), "{}", statement.sql);
    assert!(statement.sql.ends_with(",PRIMARY KEY(b,a))"), "{}", statement.sql);
}

#[test]
fn test_row_windows_per_dialect() {
    let t = table("t");
    let query = Query::new()
        .from_table(t.clone())
        .select(column(&t, "c1"))
        .first_row(11)
        .max_rows(5);

    assert_eq!(
        render(Dialect::Ansi, &query),
        "SELECT c1 FROM t OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    assert_eq!(render(Dialect::Sqlite, &query), "SELECT c1 FROM t LIMIT 5 OFFSET 10");
    assert_eq!(render(Dialect::PostgreSql, &query), "SELECT c1 FROM t LIMIT 5 OFFSET 10");
    assert_eq!(render(Dialect::MySql, &query), "SELECT c1 FROM t LIMIT 10, 5");
    assert_eq!(
        render(Dialect::Db2, &query),
        "SELECT \"c1\" FROM \"t\" OFFSET 10 ROWS FETCH FIRST 5 ROWS ONLY"
    );

    let offset_only = Query::new().from_table(t.clone()).select(column(&t, "c1")).first_row(3);
    assert_eq!(render(Dialect::Sqlite, &offset_only), "SELECT c1 FROM t LIMIT -1 OFFSET 2");
}

#[test]
fn test_top_and_rownum() {
    let t = table("t");
    let query = Query::new().from_table(t.clone()).select(column(&t, "c1")).max_rows(3);
    assert_eq!(render(Dialect::SqlServer, &query), "SELECT TOP 3 c1 FROM t");
    assert_eq!(
        render(Dialect::Oracle, &query),
        "SELECT * FROM (SELECT \"c1\" FROM \"t\") WHERE ROWNUM <= 3"
    );

    let skipping = query.first_row(2);
    for dialect in [Dialect::SqlServer, Dialect::Oracle] {
        let err = DialectRewriter::new(dialect).render_query(&skipping, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}

#[test]
fn test_filters() {
    let t = table("t");
    let query = Query::new()
        .from_table(t.clone())
        .select(column(&t, "c1"))
        .where_item(FilterItem::new(column(&t, "c1"), OperatorType::Equals, Value::Null))
        .where_item(FilterItem::in_list(column(&t, "c2"), vec![Value::from(1), Value::from(2)]))
        .where_item(FilterItem::or(vec![
            FilterItem::new(column(&t, "c3"), OperatorType::GreaterThan, 10),
            FilterItem::is_null(column(&t, "c3")),
        ]));

    let statement = DialectRewriter::new(Dialect::Ansi).render_query(&query, false).unwrap();
    assert_eq!(
        statement.sql,
        "SELECT c1 FROM t WHERE c1 IS NULL AND c2 IN (?, ?) AND (c3 > ? OR c3 IS NULL)"
    );
    assert_eq!(
        statement.parameters,
        vec![Value::from(1), Value::from(2), Value::from(10)]
    );
}

#[test]
fn test_empty_in_lists() {
    let t = table("t");
    let empty_in = Query::new()
        .from_table(t.clone())
        .select(column(&t, "c1"))
        .where_item(FilterItem::in_list(column(&t, "c1"), Vec::new()));
    assert_eq!(render(Dialect::Ansi, &empty_in), "SELECT c1 FROM t WHERE 1=0");

    let empty_not_in = Query::new()
        .from_table(t.clone())
        .select(column(&t, "c1"))
        .where_item(FilterItem::in_list(column(&t, "c1"), Vec::new()).negate());
    assert_eq!(render(Dialect::Ansi, &empty_not_in), "SELECT c1 FROM t WHERE 1=1");
}

#[test]
fn test_identifier_quoting() {
    let mut t = Table::new("yo!");
    t.add_column(Column::new("order", ColumnType::Integer)).unwrap();
    t.add_column(Column::new("plain", ColumnType::Integer)).unwrap();
    let t = in_schema("s", t);
    let query = Query::new()
        .from_table(t.clone())
        .select(column(&t, "order"))
        .select(column(&t, "plain"));

    assert_eq!(render(Dialect::Ansi, &query), "SELECT \"order\", plain FROM s.\"yo!\"");
    assert_eq!(render(Dialect::MySql, &query), "SELECT `order`, plain FROM s.`yo!`");
    assert_eq!(render(Dialect::SqlServer, &query), "SELECT [order], plain FROM s.[yo!]");
}

#[test]
fn test_inline_literals() {
    let t = table("t");
    let query = Query::new()
        .from_table(t.clone())
        .select(column(&t, "c1"))
        .where_item(FilterItem::new(column(&t, "c2"), OperatorType::Equals, "it's"))
        .where_item(FilterItem::new(column(&t, "c3"), OperatorType::Equals, true));

    let ansi = DialectRewriter::new(Dialect::Ansi).render_query(&query, true).unwrap();
    assert_eq!(ansi.sql, "SELECT c1 FROM t WHERE c2 = 'it''s' AND c3 = TRUE");
    assert!(ansi.parameters.is_empty());

    let server = DialectRewriter::new(Dialect::SqlServer).render_query(&query, true).unwrap();
    assert_eq!(server.sql, "SELECT c1 FROM t WHERE c2 = 'it''s' AND c3 = 1");

    let bound = DialectRewriter::new(Dialect::SqlServer).render_query(&query, false).unwrap();
    assert_eq!(bound.parameters, vec![Value::from("it's"), Value::from(1)]);
}

#[test]
fn test_like_with_escape() {
    let t = table("t");
    let query = Query::new()
        .from_table(t.clone())
        .select(column(&t, "c1"))
        .where_item(FilterItem::new(column(&t, "c2"), OperatorType::Like, "50\\%%"));
    assert_eq!(
        DialectRewriter::new(Dialect::Ansi).render_query(&query, false).unwrap().sql,
        "SELECT c1 FROM t WHERE c2 LIKE ? ESCAPE '\\'"
    );
}

#[test]
fn test_functions_per_dialect() {
    let t = table("t");
    let concat = SelectItem::scalar(ScalarFunction::Concat, vec![column(&t, "c1"), column(&t, "c2")]);
    let query = Query::new().from_table(t.clone()).select(concat);

    assert_eq!(render(Dialect::Ansi, &query), "SELECT (c1 || c2) FROM t");
    assert_eq!(render(Dialect::MySql, &query), "SELECT CONCAT(c1, c2) FROM t");
    assert_eq!(render(Dialect::SqlServer, &query), "SELECT (c1 + c2) FROM t");

    let grouped = Query::new()
        .from_table(t.clone())
        .select(column(&t, "c1"))
        .select_count()
        .group_by(column(&t, "c1"))
        .order_by(OrderByItem::desc(column(&t, "c1")));
    assert_eq!(
        render(Dialect::Ansi, &grouped),
        "SELECT c1, COUNT(*) FROM t GROUP BY c1 ORDER BY c1 DESC"
    );
}

#[test]
fn test_full_join_on_mysql() {
    let a = table("a");
    let b = table("b");
    let join = FromItem::join(
        FromItem::table(a.clone()),
        FromItem::table(b.clone()),
        JoinType::Full,
        FilterItem::compare_items(
            column(&a, "c1").with_from("a"),
            OperatorType::Equals,
            column(&b, "c1").with_from("b"),
        ),
    );
    let query = Query::new()
        .from(join)
        .select(column(&a, "c2").with_from("a"))
        .select(column(&b, "c2").with_from("b"));

    assert_eq!(
        render(Dialect::Ansi, &query),
        "SELECT a.c2, b.c2 FROM a FULL JOIN b ON a.c1 = b.c1"
    );
    assert_eq!(
        render(Dialect::MySql, &query),
        "SELECT a.c2, b.c2 FROM a LEFT JOIN b ON a.c1 = b.c1 \
         UNION SELECT a.c2, b.c2 FROM a RIGHT JOIN b ON a.c1 = b.c1"
    );

    let limited = query.max_rows(1);
    let err = DialectRewriter::new(Dialect::MySql).render_query(&limited, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_registry_replaces_builtin() {
    struct PlainAnsi;

    impl QueryRewriter for PlainAnsi {
        fn dialect(&self) -> Dialect {
            Dialect::Ansi
        }

        fn name(&self) -> &str {
            "sqlite"
        }
    }

    let registry = DialectRegistry::new();
    assert!(registry.names().contains(&"sqlserver".to_string()));
    assert_eq!(registry.get("sqlite").unwrap().dialect(), Dialect::Sqlite);
    registry.register("SQLite", Arc::new(PlainAnsi));
    assert_eq!(registry.get("sqlite").unwrap().dialect(), Dialect::Ansi);
    assert_eq!(registry.names().len(), 8);
}
