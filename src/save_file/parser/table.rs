use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a table declaration like `c={"y","x","id"}`. The closing brace
/// may instead follow the rows on a line of its own.
static DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)=\{([^}]*?)\}?\s*$").unwrap());

/// Number of leading key fields (coordinates or id) a row may carry
/// without them being declared in the schema.
const ROW_KEY_FIELDS: usize = 3;

/// Splits a table row on commas, ignoring commas inside double quotes.
/// The quotes themselves are removed.
pub fn split_row(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);
    values
}

/// The column layout a table declares for itself.
/// Save files from different versions, and even different players in the
/// same file, may declare different layouts, so every table resolves its
/// own columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: HashMap<String, usize>,
    len: usize,
}

impl Schema {
    /// Parses a declaration line into the table name and its schema.
    pub fn from_declaration(line: &str) -> Option<(&str, Schema)> {
        let captures = DECLARATION.captures(line.trim())?;
        let name = captures.get(1)?.as_str();
        let names = split_row(captures.get(2)?.as_str());
        let len = names.len();
        let mut columns = HashMap::with_capacity(len);
        for (i, column) in names.into_iter().enumerate() {
            // first declaration wins
            columns.entry(column.trim().to_owned()).or_insert(i);
        }
        Some((name, Schema { columns, len }))
    }

    /// Resolves a column name to its position.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }

    /// Number of declared columns
    pub fn len(&self) -> usize {
        self.len
    }
}

/// A row of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<String>,
    /// How many undeclared key fields precede the declared columns
    offset: usize,
}

impl Row {
    fn new(fields: Vec<String>, schema: &Schema) -> Self {
        let offset = if fields.len() >= schema.len() + ROW_KEY_FIELDS {
            ROW_KEY_FIELDS
        } else {
            0
        };
        Row { fields, offset }
    }

    /// Get the raw value of a declared column
    pub fn get(&self, column: usize) -> Option<&str> {
        self.fields.get(column + self.offset).map(String::as_str)
    }

    /// Get a declared column as an integer
    pub fn get_int(&self, column: usize) -> Option<i64> {
        self.get(column)?.trim().parse().ok()
    }
}

/// A table found inside a section, along with its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    /// Finds the table declared as `name={...}` in the given lines.
    /// Rows are the lines after the declaration matching `row_pattern`, up
    /// to the closing `}` or the next table declaration.
    pub fn find<'a, I: IntoIterator<Item = &'a str>>(
        lines: I,
        name: &str,
        row_pattern: &Regex,
    ) -> Option<Table> {
        let mut lines = lines.into_iter();
        let schema = lines.by_ref().find_map(|line| match Schema::from_declaration(line) {
            Some((n, schema)) if n == name => Some(schema),
            _ => None,
        })?;
        let mut rows = Vec::new();
        for line in lines {
            if line.trim() == "}" || Schema::from_declaration(line).is_some() {
                break;
            }
            if row_pattern.is_match(line) {
                rows.push(Row::new(split_row(line), &schema));
            }
        }
        Some(Table { schema, rows })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}
