use std::io::{BufRead, BufReader, Read};

use chrono::NaiveDate;

use crate::data::value::parse_timestamp;
use crate::data::Value;
use crate::error::{MetaQueryError, Result};
use crate::schema::{Column, ColumnType, Table};

use super::CsvConfiguration;

/// Reads records from CSV text. A quoted field may span several lines.
pub(crate) struct RecordReader {
    reader: BufReader<Box<dyn Read + Send>>,
    delimiter: char,
    quote: char,
    path: String,
    line: usize,
}

impl RecordReader {
    pub fn new(reader: Box<dyn Read + Send>, config: &CsvConfiguration, path: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(reader),
            delimiter: config.delimiter(),
            quote: config.quote(),
            path: path.into(),
            line: 0,
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| MetaQueryError::resource(self.path.clone(), e))?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Skips `count` physical lines.
    pub fn skip_lines(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            if self.read_line()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// The next non-blank record with the line it starts on.
    pub fn next_record(&mut self) -> Result<Option<(usize, Vec<String>)>> {
        loop {
            let mut text = match self.read_line()? {
                Some(text) => text,
                None => return Ok(None),
            };
            let start = self.line;
            while text.matches(self.quote).count() % 2 == 1 {
                match self.read_line()? {
                    Some(more) => {
                        text.push('\n');
                        text.push_str(&more);
                    }
                    None => break,
                }
            }
            if text.trim().is_empty() {
                continue;
            }
            let fields = self.parse_line(&text).map_err(|message| MetaQueryError::Csv {
                line: start,
                message,
            })?;
            return Ok(Some((start, fields)));
        }
    }

    fn parse_line(&self, line: &str) -> std::result::Result<Vec<String>, String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                if c == self.quote {
                    if chars.peek() == Some(&self.quote) {
                        current.push(self.quote);
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    current.push(c);
                }
            } else if c == self.quote {
                in_quotes = true;
                quoted = true;
            } else if c == self.delimiter {
                fields.push(finish_field(current, quoted));
                current = String::new();
                quoted = false;
            } else {
                current.push(c);
            }
        }

        if in_quotes {
            return Err("Unclosed quote".to_string());
        }

        fields.push(finish_field(current, quoted));
        Ok(fields)
    }
}

/// Unquoted fields are trimmed; quoted ones are kept verbatim.
fn finish_field(field: String, quoted: bool) -> String {
    if quoted {
        field
    } else {
        field.trim().to_string()
    }
}

/// Reads the header and, when enabled, scans every row to infer column types.
pub(crate) fn read_table(
    source: Box<dyn Read + Send>,
    config: &CsvConfiguration,
    table_name: &str,
    path: &str,
) -> Result<Option<Table>> {
    let mut records = RecordReader::new(source, config, path);
    let mut first_row = None;
    let headers: Vec<String> = if config.has_header() {
        records.skip_lines(config.column_name_line() - 1)?;
        match records.next_record()? {
            Some((_, names)) => names,
            None => return Ok(None),
        }
    } else {
        match records.next_record()? {
            Some((line, fields)) => {
                let names = (0..fields.len()).map(|i| format!("column{}", i + 1)).collect();
                first_row = Some((line, fields));
                names
            }
            None => return Ok(None),
        }
    };

    let mut types: Vec<Option<ColumnType>> = vec![None; headers.len()];
    if config.infer_types() {
        let mut next = first_row;
        loop {
            let (_, fields) = match next.take() {
                Some(record) => record,
                None => match records.next_record()? {
                    Some(record) => record,
                    None => break,
                },
            };
            for (slot, field) in types.iter_mut().zip(&fields) {
                if let Some(inferred) = infer_single_type(field) {
                    *slot = Some(match *slot {
                        Some(current) => merge_types(current, inferred),
                        None => inferred,
                    });
                }
            }
        }
    }

    let mut table = Table::new(table_name);
    for (name, column_type) in headers.into_iter().zip(types) {
        let column = Column::new(name, column_type.unwrap_or(ColumnType::Varchar));
        table.add_column(column)?;
    }
    Ok(Some(table))
}

fn infer_single_type(value: &str) -> Option<ColumnType> {
    if value.is_empty() {
        return None;
    }
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return Some(ColumnType::Boolean);
    }
    if value.parse::<i64>().is_ok() {
        return Some(ColumnType::BigInt);
    }
    if value.parse::<f64>().is_ok() {
        return Some(ColumnType::Double);
    }
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return Some(ColumnType::Date);
    }
    if parse_timestamp(value).is_some() {
        return Some(ColumnType::Timestamp);
    }
    Some(ColumnType::Varchar)
}

fn merge_types(current: ColumnType, new: ColumnType) -> ColumnType {
    match (current, new) {
        (a, b) if a == b => a,
        (ColumnType::BigInt, ColumnType::Double) | (ColumnType::Double, ColumnType::BigInt) => {
            ColumnType::Double
        }
        (ColumnType::Date, ColumnType::Timestamp) | (ColumnType::Timestamp, ColumnType::Date) => {
            ColumnType::Timestamp
        }
        _ => ColumnType::Varchar,
    }
}

/// Converts one cell; the empty cell is NULL.
pub(crate) fn parse_value(cell: &str, column_type: ColumnType) -> Result<Value> {
    if cell.is_empty() {
        return Ok(Value::Null);
    }
    column_type.convert(Value::String(cell.to_string()))
}

/// Lazily converts the records of a CSV resource into projected rows.
pub(crate) struct CsvRows {
    records: RecordReader,
    indices: Vec<usize>,
    types: Vec<ColumnType>,
    width: usize,
    fail_on_inconsistent: bool,
    remaining: Option<usize>,
    done: bool,
}

impl CsvRows {
    /// `records` must be positioned on the first data record.
    pub fn new(
        records: RecordReader,
        table: &Table,
        columns: &[Column],
        config: &CsvConfiguration,
        max_rows: Option<usize>,
    ) -> Result<Self> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut types = Vec::with_capacity(columns.len());
        for column in columns {
            let current = table
                .column_by_name(&column.name)
                .ok_or_else(|| MetaQueryError::ColumnNotFound(column.qualified_label()))?;
            indices.push(current.number);
            types.push(current.column_type);
        }
        Ok(Self {
            records,
            indices,
            types,
            width: table.column_count(),
            fail_on_inconsistent: config.fail_on_inconsistent_row_length(),
            remaining: max_rows,
            done: false,
        })
    }

    fn convert(&self, line: usize, fields: Vec<String>) -> Result<Vec<Value>> {
        if self.fail_on_inconsistent && fields.len() != self.width {
            return Err(MetaQueryError::Csv {
                line,
                message: format!("Expected {} values, got {}", self.width, fields.len()),
            });
        }
        self.indices
            .iter()
            .zip(&self.types)
            .map(|(&i, &column_type)| match fields.get(i) {
                Some(cell) => parse_value(cell, column_type),
                None => Ok(Value::Null),
            })
            .collect()
    }
}

impl Iterator for CsvRows {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == Some(0) {
            return None;
        }
        let result = match self.records.next_record() {
            Ok(Some((line, fields))) => self.convert(line, fields),
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &'static str) -> Box<dyn Read + Send> {
        Box::new(Cursor::new(text))
    }

    #[test]
    fn test_quoted_fields() {
        let config = CsvConfiguration::new();
        let mut records = RecordReader::new(
            reader("name,description\n\"John Doe\",\"A \"\"quoted\"\" value\"\n"),
            &config,
            "test.csv",
        );
        records.next_record().unwrap();
        let (line, fields) = records.next_record().unwrap().unwrap();
        assert_eq!(line, 2);
        assert_eq!(fields, vec!["John Doe", "A \"quoted\" value"]);
        assert!(records.next_record().unwrap().is_none());
    }

    #[test]
    fn test_multi_line_field() {
        let config = CsvConfiguration::new();
        let mut records = RecordReader::new(reader("a,b\n\"x\ny\",2\n3,4\n"), &config, "t.csv");
        records.next_record().unwrap();
        assert_eq!(records.next_record().unwrap().unwrap().1, vec!["x\ny", "2"]);
        assert_eq!(records.next_record().unwrap().unwrap(), (4, vec!["3".to_string(), "4".to_string()]));
    }

    #[test]
    fn test_unclosed_quote() {
        let config = CsvConfiguration::new();
        let mut records = RecordReader::new(reader("a,b\n\"oops,1\n"), &config, "t.csv");
        records.next_record().unwrap();
        let err = records.next_record().unwrap_err();
        assert!(matches!(err, MetaQueryError::Csv { line: 2, .. }));
    }

    #[test]
    fn test_type_inference() {
        let text = "i,f,b,s,d,ts,n\n1,1.5,true,hello,2020-01-01,2020-01-01 10:00:00,\n2,2,false,world,2020-01-02,2020-01-02,\n";
        let table = read_table(reader(text), &CsvConfiguration::new(), "t", "t.csv")
            .unwrap()
            .unwrap();
        let types: Vec<ColumnType> = table.columns().iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::BigInt,
                ColumnType::Double,
                ColumnType::Boolean,
                ColumnType::Varchar,
                ColumnType::Date,
                ColumnType::Timestamp,
                ColumnType::Varchar,
            ]
        );
    }

    #[test]
    fn test_no_header_and_custom_delimiter() {
        let config = CsvConfiguration::new()
            .with_column_name_line(0)
            .with_delimiter(';')
            .with_infer_types(false);
        let table = read_table(reader("1;2;3\n4;5;6\n"), &config, "t", "t.csv")
            .unwrap()
            .unwrap();
        assert_eq!(table.column_names(), vec!["column1", "column2", "column3"]);
        assert!(table.columns().iter().all(|c| c.column_type == ColumnType::Varchar));
    }

    #[test]
    fn test_empty_resource_has_no_table() {
        let table = read_table(reader(""), &CsvConfiguration::new(), "t", "t.csv").unwrap();
        assert!(table.is_none());
    }

    #[test]
    fn test_rows_inconsistent_length() {
        let text = "a,b\n1,2\n3\n";
        let config = CsvConfiguration::new().with_fail_on_inconsistent_row_length(true);
        let table = read_table(reader(text), &config, "t", "t.csv").unwrap().unwrap();
        let mut records = RecordReader::new(reader(text), &config, "t.csv");
        records.next_record().unwrap();
        let rows = CsvRows::new(records, &table, table.columns(), &config, None).unwrap();
        let results: Vec<Result<Vec<Value>>> = rows.collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &vec![Value::from(1), Value::from(2)]);
        assert!(matches!(results[1], Err(MetaQueryError::Csv { line: 3, .. })));
    }
}
