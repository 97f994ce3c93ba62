use crate::error::DashboardError;
use crate::registry::{AGE_COLUMN, GENRE_COLUMN, Genre};
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// Raw survey sheet as exported by the form
///
/// Headers are de-duplicated on load: a label that appears more than once is
/// kept as-is the first time and suffixed `.1`, `.2`, ... afterwards, which is
/// how the haircare product-name column ends up addressable.
#[derive(Debug, Clone)]
pub struct SurveyTable {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<csv::StringRecord>,
}

impl SurveyTable {
    /// Parse a CSV export
    ///
    /// # Errors
    /// * `DataUnavailable` if the text is not valid CSV or has no header row
    ///
    /// # Examples
    /// ```
    /// use cosme_insight::table::SurveyTable;
    ///
    /// let table = SurveyTable::from_csv_str("a,b,a\n1,2,3\n").unwrap();
    /// assert_eq!(table.headers(), ["a", "b", "a.1"]);
    /// assert_eq!(table.cell(0, 2), Some("3"));
    /// ```
    pub fn from_csv_str(text: &str) -> Result<Self, DashboardError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self::from_reader(text.as_bytes())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DashboardError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let raw: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if raw.iter().all(|h| h.trim().is_empty()) {
            return Err(DashboardError::DataUnavailable(
                "sheet has no header row".to_string(),
            ));
        }

        let headers = dedup_headers(raw);
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let rows = csv_reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(SurveyTable {
            headers,
            index,
            rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Trimmed cell text, `None` when blank or past the end of a short row
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|record| record.get(col))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

// A suffixed name that collides with a later literal header keeps counting up.
fn dedup_headers(raw: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(raw.len());

    for original in raw {
        let mut name = original;
        let mut current = counts.get(&name).copied().unwrap_or(0);
        while current > 0 {
            counts.insert(name.clone(), current + 1);
            name = format!("{}.{}", name, current);
            current = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), current + 1);
        names.push(name);
    }

    names
}

/// One survey submission, projected onto a genre's columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub item: Option<String>,
    pub kind: Option<String>,
    /// Concern field as typed, comma-separated
    pub concerns: Option<String>,
    pub age: Option<String>,
    /// Values in the genre's configured score order
    pub scores: Vec<Option<f64>>,
}

impl Response {
    /// Split the concern field into trimmed, non-empty tags
    pub fn concern_tags(&self) -> impl Iterator<Item = &str> {
        self.concerns
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }
}

/// Column positions for one genre, checked against the table header
#[derive(Debug, Clone)]
struct ResolvedColumns {
    genre: usize,
    age: usize,
    item: usize,
    kind: usize,
    concern: usize,
    scores: Vec<usize>,
}

impl ResolvedColumns {
    fn resolve(table: &SurveyTable, genre: Genre) -> Result<Self, DashboardError> {
        let config = genre.config();
        let lookup = |name: &str| {
            table
                .column(name)
                .ok_or_else(|| DashboardError::MissingColumn {
                    genre: genre.label(),
                    column: name.to_string(),
                })
        };

        Ok(ResolvedColumns {
            genre: lookup(GENRE_COLUMN)?,
            age: lookup(AGE_COLUMN)?,
            item: lookup(config.item_col)?,
            kind: lookup(config.type_col)?,
            concern: lookup(config.concern_col)?,
            scores: config
                .scores
                .iter()
                .map(|name| lookup(name))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Validated survey data split by genre
///
/// Building a `Dataset` checks every registry column against the sheet once,
/// so the aggregation code never looks columns up by label.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    skincare: Vec<Response>,
    haircare: Vec<Response>,
}

impl Dataset {
    /// Validate the table against the registry and extract responses
    ///
    /// # Errors
    /// * `MissingColumn` naming the first registry column absent from the sheet
    pub fn from_table(table: &SurveyTable) -> Result<Self, DashboardError> {
        let mut dataset = Dataset::default();

        for genre in Genre::ALL {
            let columns = ResolvedColumns::resolve(table, genre)?;
            let responses = (0..table.len())
                .filter(|&row| table.cell(row, columns.genre) == Some(genre.label()))
                .map(|row| Response {
                    item: table.cell(row, columns.item).map(str::to_string),
                    kind: table.cell(row, columns.kind).map(str::to_string),
                    concerns: table.cell(row, columns.concern).map(str::to_string),
                    age: table.cell(row, columns.age).map(str::to_string),
                    scores: columns
                        .scores
                        .iter()
                        .map(|&col| table.cell(row, col).and_then(parse_score))
                        .collect(),
                })
                .collect();

            match genre {
                Genre::Skincare => dataset.skincare = responses,
                Genre::Haircare => dataset.haircare = responses,
            }
        }

        Ok(dataset)
    }

    pub fn from_csv_str(text: &str) -> Result<Self, DashboardError> {
        Self::from_table(&SurveyTable::from_csv_str(text)?)
    }

    /// Build a dataset from already-projected responses
    pub fn from_responses(skincare: Vec<Response>, haircare: Vec<Response>) -> Self {
        Dataset { skincare, haircare }
    }

    pub fn responses(&self, genre: Genre) -> &[Response] {
        match genre {
            Genre::Skincare => &self.skincare,
            Genre::Haircare => &self.haircare,
        }
    }

    /// Responses for one product within a genre
    pub fn item_responses<'a>(
        &'a self,
        genre: Genre,
        item: &'a str,
    ) -> impl Iterator<Item = &'a Response> + 'a {
        self.responses(genre)
            .iter()
            .filter(move |r| r.item.as_deref() == Some(item))
    }

    /// Distinct product names in order of first appearance
    pub fn items(&self, genre: Genre) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.responses(genre)
            .iter()
            .filter_map(|r| r.item.as_deref())
            .filter(|item| seen.insert(*item))
            .collect()
    }

    pub fn total_responses(&self) -> usize {
        self.skincare.len() + self.haircare.len()
    }
}

fn parse_score(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
pub(crate) const SAMPLE_CSV: &str = include_str!("../tests/fixtures/survey.csv");
