use metaquery::adapter::{ArrayTableDataProvider, SimpleTableDef};
use metaquery::{
    ColumnType, DataContextExt, Dialect, DialectRewriter, ErrorKind, MemoryDataContext, Query,
    QueryRewriter, Value,
};

fn context() -> MemoryDataContext {
    let def = SimpleTableDef::new("employee", &["id", "name", "dept", "salary"]).with_types(&[
        ColumnType::Integer,
        ColumnType::Varchar,
        ColumnType::Varchar,
        ColumnType::Real,
    ]);
    let rows = vec![
        vec![Value::from(1), Value::from("Ada"), Value::from("eng"), Value::from(120.0)],
        vec![Value::from(2), Value::from("Brian"), Value::from("ops"), Value::Null],
    ];
    MemoryDataContext::new("hr", vec![Box::new(ArrayTableDataProvider::new(def, rows))]).unwrap()
}

fn ansi(query: &Query) -> String {
    DialectRewriter::new(Dialect::Ansi).render_query(query, true).unwrap().sql
}

#[test]
fn test_rendered_queries_parse_back_to_the_same_query() {
    let dc = context();
    let queries = [
        "SELECT name FROM employee WHERE salary > 90 ORDER BY name",
        "SELECT DISTINCT dept FROM hr.employee",
        "SELECT dept, COUNT(*) FROM employee GROUP BY dept HAVING COUNT(*) > 1",
        "SELECT name AS who, UPPER(dept) FROM employee WHERE dept IN ('eng', 'ops') AND salary IS NULL",
        "SELECT name FROM employee WHERE name LIKE 'A%' OR NOT (dept = 'eng')",
        "SELECT e.name, m.name FROM employee e LEFT JOIN employee m ON e.dept = m.dept AND e.id < m.id",
        "SELECT q.n FROM (SELECT name AS n FROM employee WHERE id <> 2) q",
        "SELECT id FROM employee ORDER BY id DESC LIMIT 2 OFFSET 1",
        "SELECT id FROM employee WHERE salary BETWEEN 10 AND 200",
    ];
    for sql in queries {
        let parsed = dc.parse_query(sql).unwrap();
        let rendered = ansi(&parsed);
        let reparsed = dc
            .parse_query(&rendered)
            .unwrap_or_else(|e| panic!("{} rendered as {}: {}", sql, rendered, e));
        assert_eq!(parsed, reparsed, "{} rendered as {}", sql, rendered);
    }
}

#[test]
fn test_rendering_is_qualified() {
    let dc = context();
    let query = dc
        .parse_query("select name from employee where salary >= 100 limit 1")
        .unwrap();
    assert_eq!(
        ansi(&query),
        "SELECT employee.name FROM hr.employee WHERE employee.salary >= 100.0 FETCH NEXT 1 ROWS ONLY"
    );
}

#[test]
fn test_select_star_and_qualified_star() {
    let dc = context();
    let query = dc.parse_query("SELECT * FROM employee").unwrap();
    assert_eq!(query.select.len(), 4);
    let query = dc
        .parse_query("SELECT a.*, b.id FROM employee a, employee b")
        .unwrap();
    assert_eq!(query.select.len(), 5);
    assert_eq!(query.select[4].from.as_deref(), Some("b"));
}

#[test]
fn test_literals_are_coerced_to_column_types() {
    let dc = context();
    let rows = dc
        .execute_sql("SELECT name FROM employee WHERE id = '2'")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows, vec![vec![Value::from("Brian")]]);

    let err = dc.parse_query("SELECT name FROM employee WHERE id = 'two'").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryConstruction);
}

#[test]
fn test_malformed_queries() {
    let dc = context();
    for sql in [
        "SELECT",
        "SELECT name FROM",
        "SELECT name FROM employee WHERE",
        "SELECT name FROM employee garbage garbage",
        "SELECT name FROM employee WHERE name = 'unterminated",
        "SELECT nope FROM employee",
        "SELECT e.name FROM employee x",
        "SELECT name FROM employee ORDER BY 3",
    ] {
        let err = dc.parse_query(sql).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryConstruction, "{}", sql);
    }

    let err = dc.parse_query("SELECT name FROM nowhere").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    let err = dc.parse_query("SELECT name FROM other.employee").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}
