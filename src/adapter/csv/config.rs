/// How a CSV resource is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvConfiguration {
    column_name_line: usize,
    delimiter: char,
    quote: char,
    infer_types: bool,
    fail_on_inconsistent_row_length: bool,
}

impl Default for CsvConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvConfiguration {
    pub fn new() -> Self {
        Self {
            column_name_line: 1,
            delimiter: ',',
            quote: '"',
            infer_types: true,
            fail_on_inconsistent_row_length: false,
        }
    }

    /// The 1-based line holding the column names; 0 means the file has no
    /// header and columns are named `column1`, `column2`, ...
    pub fn with_column_name_line(mut self, line: usize) -> Self {
        self.column_name_line = line;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    /// When off every column is VARCHAR.
    pub fn with_infer_types(mut self, infer_types: bool) -> Self {
        self.infer_types = infer_types;
        self
    }

    pub fn with_fail_on_inconsistent_row_length(mut self, fail: bool) -> Self {
        self.fail_on_inconsistent_row_length = fail;
        self
    }

    pub fn column_name_line(&self) -> usize {
        self.column_name_line
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    pub fn infer_types(&self) -> bool {
        self.infer_types
    }

    pub fn fail_on_inconsistent_row_length(&self) -> bool {
        self.fail_on_inconsistent_row_length
    }

    pub fn has_header(&self) -> bool {
        self.column_name_line > 0
    }
}
