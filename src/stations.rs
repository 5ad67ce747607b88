use regex::RegexBuilder;

use crate::archive::TextEncoding;
use crate::domain::{StationId, StationRecord};
use crate::error::WetterfeeError;

const NAME_FIELD: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct StationIndex {
    lines: Vec<String>,
}

impl StationIndex {
    pub fn build<I, L>(reference_lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            lines: reference_lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text = TextEncoding::Latin1.decode(bytes);
        Self::build(text.lines())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Every station whose listing line matches `query`, case-insensitively.
    /// The query is a regular expression, so plain substrings work too.
    pub fn resolve(&self, query: &str) -> Result<Vec<StationRecord>, WetterfeeError> {
        let pattern = RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .map_err(|err| WetterfeeError::InvalidQuery {
                query: query.to_string(),
                message: err.to_string(),
            })?;

        Ok(self
            .lines
            .iter()
            .filter(|line| pattern.is_match(line))
            .filter_map(|line| parse_line(line))
            .collect())
    }
}

pub fn parse_line(line: &str) -> Option<StationRecord> {
    let fields = line.split_whitespace().collect::<Vec<_>>();
    let id = fields.first()?.parse::<StationId>().ok()?;
    let name = fields.get(NAME_FIELD)?;
    Some(StationRecord {
        id,
        name: name.to_string(),
    })
}
