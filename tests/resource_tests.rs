use std::io::Write;
use std::sync::Arc;

use metaquery::{
    CsvConfiguration, CsvDataContext, DataContext, DataContextExt, ErrorKind, FileResource,
    InMemoryResource, Resource, ResourceExt, UpdateCallbackExt, UpdateableDataContextExt, Value,
};

#[test]
fn test_csv_over_in_memory_resource() {
    let resource = Arc::new(InMemoryResource::with_contents("data/people.csv", "id,name\n1,kasper\n"));
    let dc = CsvDataContext::new(resource.clone(), CsvConfiguration::new());
    assert_eq!(dc.schema_names().unwrap(), vec!["people.csv"]);

    dc.execute_update_with(|cb| {
        cb.insert_into("people").value("id", 2).value("name", "ankit").execute()
    })
    .unwrap();
    assert_eq!(
        String::from_utf8(resource.bytes()).unwrap(),
        "id,name\n1,kasper\n2,ankit\n"
    );
    let rows = dc
        .execute_sql("SELECT name FROM people ORDER BY id DESC")
        .unwrap()
        .to_values()
        .unwrap();
    assert_eq!(rows, vec![vec![Value::from("ankit")], vec![Value::from("kasper")]]);
}

#[test]
fn test_failed_script_keeps_resource_content() {
    let resource = Arc::new(InMemoryResource::with_contents("people.csv", "id,name\n1,kasper\n"));
    let dc = CsvDataContext::new(resource.clone(), CsvConfiguration::new());

    let err = dc
        .execute_update_with(|cb| {
            cb.delete_from("people").execute()?;
            cb.insert_into("people").value("age", 3).execute()
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert_eq!(String::from_utf8(resource.bytes()).unwrap(), "id,name\n1,kasper\n");
}

#[test]
fn test_read_only_resource_rejects_updates() {
    let resource = Arc::new(InMemoryResource::with_contents("people.csv", "id\n1\n").read_only());
    let dc = CsvDataContext::new(resource, CsvConfiguration::new());
    let err = dc
        .execute_update_with(|cb| cb.delete_from("people").execute())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    let count = dc.execute_sql("SELECT COUNT(*) FROM people").unwrap().to_values().unwrap();
    assert_eq!(count, vec![vec![Value::from(1)]]);
}

#[test]
fn test_file_resource() {
    let dir = tempfile::tempdir().unwrap();
    let resource = FileResource::new(dir.path().join("notes.txt"));
    assert_eq!(resource.name(), "notes.txt");
    assert!(!resource.is_exists());

    resource
        .write(&mut |out: &mut dyn Write| -> metaquery::Result<()> {
            out.write_all(b"one\n")?;
            Ok(())
        })
        .unwrap();
    resource
        .append(&mut |out: &mut dyn Write| -> metaquery::Result<()> {
            out.write_all(b"two\n")?;
            Ok(())
        })
        .unwrap();

    assert!(resource.is_exists());
    assert_eq!(resource.size().unwrap(), 8);
    assert!(resource.last_modified().is_some());
    assert_eq!(resource.read_to_string().unwrap(), "one\ntwo\n");
}
