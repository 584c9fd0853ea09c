use std::io::Write;

use crate::data::Value;
use crate::error::Result;
use crate::schema::Table;

use super::CsvConfiguration;

pub(crate) struct CsvWriter<'c> {
    config: &'c CsvConfiguration,
}

impl<'c> CsvWriter<'c> {
    pub fn new(config: &'c CsvConfiguration) -> Self {
        Self { config }
    }

    /// Quotes a field holding the delimiter, the quote character, a line
    /// break or surrounding whitespace.
    fn field(&self, text: &str) -> String {
        let quote = self.config.quote();
        let needs_quotes = text.contains(self.config.delimiter())
            || text.contains(quote)
            || text.contains('\n')
            || text.contains('\r')
            || text.trim() != text;
        if needs_quotes {
            let doubled = format!("{}{}", quote, quote);
            format!("{}{}{}", quote, text.replace(quote, &doubled), quote)
        } else {
            text.to_string()
        }
    }

    fn line(&self, out: &mut dyn Write, fields: impl Iterator<Item = String>) -> Result<()> {
        let fields: Vec<String> = fields.map(|f| self.field(&f)).collect();
        let delimiter = self.config.delimiter().to_string();
        writeln!(out, "{}", fields.join(&delimiter))?;
        Ok(())
    }

    /// Writes the header (preceded by blank lines when the column-name line
    /// is not the first) and then every row. NULL is written as an empty cell.
    pub fn write_table(&self, out: &mut dyn Write, table: &Table, rows: &[Vec<Value>]) -> Result<()> {
        if self.config.has_header() {
            for _ in 1..self.config.column_name_line() {
                writeln!(out)?;
            }
            self.line(out, table.columns().iter().map(|c| c.name.clone()))?;
        }
        for row in rows {
            self.line(
                out,
                row.iter().map(|v| match v {
                    Value::Null => String::new(),
                    other => other.to_string(),
                }),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};

    #[test]
    fn test_write_table() {
        let mut table = Table::new("t");
        table.add_column(Column::new("name", ColumnType::Varchar)).unwrap();
        table.add_column(Column::new("n", ColumnType::Integer)).unwrap();
        let rows = vec![
            vec![Value::from("plain"), Value::from(1)],
            vec![Value::from("a,b \"c\""), Value::Null],
        ];
        let config = CsvConfiguration::new();
        let mut out = Vec::new();
        CsvWriter::new(&config).write_table(&mut out, &table, &rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,n\nplain,1\n\"a,b \"\"c\"\"\",\n"
        );
    }
}
