use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::app::{FetchResult, ResolveResult};
use crate::cache::write_file_atomic;
use crate::error::WetterfeeError;
use crate::extract::TabularDataset;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_resolve(result: &ResolveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct CsvOutput;

impl CsvOutput {
    pub fn write_file(dataset: &TabularDataset, path: &Utf8Path) -> Result<(), WetterfeeError> {
        let mut buffer = Vec::new();
        Self::write(dataset, &mut buffer)?;
        write_file_atomic(path, &buffer)
    }

    pub fn write<W: Write>(dataset: &TabularDataset, sink: W) -> Result<(), WetterfeeError> {
        let mut writer = csv::Writer::from_writer(sink);
        writer
            .write_record(&dataset.columns)
            .map_err(|err| WetterfeeError::Csv(err.to_string()))?;
        for row in &dataset.rows {
            writer
                .write_record(row.iter().map(|value| value.to_field()))
                .map_err(|err| WetterfeeError::Csv(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| WetterfeeError::Filesystem(err.to_string()))
    }
}
