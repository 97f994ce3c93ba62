use crate::registry::Genre;
use crate::table::{Dataset, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-group mean of every score column, in the genre's axis order
///
/// A `None` entry means no row in the group had a value for that column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateRow {
    means: Vec<Option<f64>>,
}

impl AggregateRow {
    /// Mean of each score column over `rows`, skipping missing values
    ///
    /// # Examples
    /// ```
    /// use cosme_insight::aggregate::AggregateRow;
    /// use cosme_insight::table::Response;
    ///
    /// let rows = vec![
    ///     Response { scores: vec![Some(4.0), None], ..Response::default() },
    ///     Response { scores: vec![Some(2.0), None], ..Response::default() },
    /// ];
    /// let row = AggregateRow::from_responses(&rows, 2);
    /// assert_eq!(row.means(), [Some(3.0), None]);
    /// ```
    pub fn from_responses<'a, I>(rows: I, width: usize) -> Self
    where
        I: IntoIterator<Item = &'a Response>,
    {
        let mut sums = vec![0.0; width];
        let mut counts = vec![0usize; width];

        for row in rows {
            for (i, value) in row.scores.iter().take(width).enumerate() {
                if let Some(v) = value {
                    sums[i] += v;
                    counts[i] += 1;
                }
            }
        }

        let means = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
            .collect();

        AggregateRow { means }
    }

    /// Row for a group with no matching responses
    pub fn undefined(width: usize) -> Self {
        AggregateRow {
            means: vec![None; width],
        }
    }

    pub fn means(&self) -> &[Option<f64>] {
        &self.means
    }

    pub fn get(&self, axis: usize) -> Option<f64> {
        self.means.get(axis).copied().flatten()
    }

    /// True when no column has a mean
    pub fn is_undefined(&self) -> bool {
        self.means.iter().all(Option::is_none)
    }
}

/// How a requested concern label is matched against a row's concern field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "web", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ConcernMatch {
    /// Case-sensitive substring of the raw field; "乾燥" also matches "超乾燥"
    #[default]
    Contains,
    /// Exact membership in the comma-split tag set
    Tag,
}

impl ConcernMatch {
    pub fn matches(self, response: &Response, label: &str) -> bool {
        match self {
            ConcernMatch::Contains => response
                .concerns
                .as_deref()
                .is_some_and(|field| field.contains(label)),
            ConcernMatch::Tag => response.concern_tags().any(|tag| tag == label),
        }
    }
}

/// Grouping dimension for a radar comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupBy<'a> {
    /// One group per product name
    Product,
    /// One group per age bracket among responses for `item`
    Age { item: &'a str },
    /// One group per concern label among responses for `item`
    Concern {
        item: &'a str,
        matching: ConcernMatch,
    },
}

/// Mean scores per requested group, in the order the groups were requested
///
/// Groups with no matching rows come back as [`AggregateRow::undefined`].
pub fn aggregate(
    dataset: &Dataset,
    genre: Genre,
    group_by: GroupBy<'_>,
    group_values: &[String],
) -> Vec<(String, AggregateRow)> {
    let width = genre.config().scores.len();
    let responses = dataset.responses(genre);

    group_values
        .iter()
        .map(|value| {
            let rows = responses.iter().filter(|r| match group_by {
                GroupBy::Product => r.item.as_deref() == Some(value.as_str()),
                GroupBy::Age { item } => {
                    r.item.as_deref() == Some(item) && r.age.as_deref() == Some(value.as_str())
                }
                GroupBy::Concern { item, matching } => {
                    r.item.as_deref() == Some(item) && matching.matches(r, value)
                }
            });
            (value.clone(), AggregateRow::from_responses(rows, width))
        })
        .collect()
}

/// Distinct ages among responses for an item
///
/// Sorted numerically when every value parses as a number, otherwise as text.
pub fn ages(dataset: &Dataset, genre: Genre, item: &str) -> Vec<String> {
    sort_categories(
        dataset
            .item_responses(genre, item)
            .filter_map(|r| r.age.as_deref()),
    )
}

/// Distinct labels sorted numerically when all parse as numbers, else as text
pub(crate) fn sort_categories<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let distinct: BTreeSet<&str> = values.into_iter().collect();
    let labels: Vec<String> = distinct.into_iter().map(str::to_string).collect();

    let numeric: Option<Vec<f64>> = labels.iter().map(|a| a.parse::<f64>().ok()).collect();
    match numeric {
        Some(keys) => {
            let mut paired: Vec<(f64, String)> = keys.into_iter().zip(labels).collect();
            paired.sort_by(|a, b| a.0.total_cmp(&b.0));
            paired.into_iter().map(|(_, label)| label).collect()
        }
        None => labels,
    }
}

/// Sorted distinct concern tags reported for an item
pub fn concern_tags(dataset: &Dataset, genre: Genre, item: &str) -> Vec<String> {
    dataset
        .item_responses(genre, item)
        .flat_map(Response::concern_tags)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
