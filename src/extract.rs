use std::fs;
use std::io::{self, Read};
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::WetterfeeError;

const DATE_FORMATS: [&str; 2] = ["%Y%m%d", "%Y-%m-%d"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Date(NaiveDate),
    Integer(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl Value {
    fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Missing;
        }
        if let Ok(value) = raw.parse::<i64>() {
            return Value::Integer(value);
        }
        if let Ok(value) = raw.parse::<f64>() {
            return Value::Float(value);
        }
        Value::Text(raw.to_string())
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn to_field(&self) -> String {
        match self {
            Value::Date(date) => date.format("%Y-%m-%d").to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::Missing => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TabularDataset {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.values.get(index)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

pub fn extract(
    container: &Path,
    member_pattern: &str,
    date_column: usize,
) -> Result<TabularDataset, WetterfeeError> {
    let pattern = Regex::new(member_pattern).map_err(|err| WetterfeeError::InvalidQuery {
        query: member_pattern.to_string(),
        message: err.to_string(),
    })?;

    let file = match fs::File::open(container) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(WetterfeeError::ContainerNotFound(container.to_path_buf()));
        }
        Err(err) => {
            return Err(WetterfeeError::Filesystem(format!(
                "open zip {}: {err}",
                container.display()
            )));
        }
    };
    let mut archive = ZipArchive::new(file).map_err(|err| WetterfeeError::Archive(err.to_string()))?;

    let mut names = archive
        .file_names()
        .filter(|name| pattern.is_match(name))
        .map(str::to_string)
        .collect::<Vec<_>>();
    names.sort();
    if names.len() > 1 {
        debug!(members = ?names, "several members match, taking the first");
    }
    let member = names
        .into_iter()
        .next()
        .ok_or_else(|| WetterfeeError::MemberNotFound {
            container: container.to_path_buf(),
            pattern: member_pattern.to_string(),
        })?;

    info!(container = %container.display(), member = %member, "extracting");
    let mut entry = archive
        .by_name(&member)
        .map_err(|err| WetterfeeError::Archive(err.to_string()))?;
    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .map_err(|err| WetterfeeError::Archive(err.to_string()))?;

    parse_table(&content, date_column)
}

pub fn parse_table(content: &[u8], date_column: usize) -> Result<TabularDataset, WetterfeeError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content);

    let columns = reader
        .headers()
        .map_err(|err| WetterfeeError::Csv(err.to_string()))?
        .iter()
        .map(|name| name.trim().to_string())
        .collect::<Vec<_>>();
    let date_name = columns.get(date_column).cloned().unwrap_or_default();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| WetterfeeError::Csv(err.to_string()))?;
        let mut values = Vec::with_capacity(columns.len());
        for (position, raw) in record.iter().enumerate() {
            let raw = raw.trim();
            if position == date_column {
                values.push(Value::Date(parse_date(raw).ok_or_else(|| {
                    WetterfeeError::DateParse {
                        row: index + 1,
                        column: date_name.clone(),
                        value: raw.to_string(),
                    }
                })?));
            } else {
                values.push(Value::parse(raw));
            }
        }
        rows.push(values);
    }

    Ok(TabularDataset { columns, rows })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}
