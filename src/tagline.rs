use crate::aggregate::AggregateRow;
use crate::registry::Genre;
use crate::table::Dataset;
use serde::{Deserialize, Serialize};

/// Register of a generated tagline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Stylish,
    Impact,
}

impl Tone {
    pub const ALL: [Tone; 4] = [Tone::Professional, Tone::Friendly, Tone::Stylish, Tone::Impact];

    pub fn label(self) -> &'static str {
        match self {
            Tone::Professional => "信頼感（プロ風）",
            Tone::Friendly => "親しみやすい",
            Tone::Stylish => "おしゃれ・エモい",
            Tone::Impact => "インパクト重視",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Stylish => "stylish",
            Tone::Impact => "impact",
        }
    }

    /// Callout style the page uses to frame the tagline
    pub fn style(self) -> &'static str {
        match self {
            Tone::Professional => "info",
            Tone::Friendly => "success",
            Tone::Stylish => "warning",
            Tone::Impact => "error",
        }
    }
}

/// Score column with the highest mean for one product
///
/// Ties go to the column listed first in the genre's axis order. Returns
/// `None` when the product has no scored responses.
///
/// # Examples
/// ```
/// use cosme_insight::registry::Genre;
/// use cosme_insight::table::{Dataset, Response};
/// use cosme_insight::tagline::best_feature;
///
/// let row = Response {
///     item: Some("Cream X".to_string()),
///     scores: vec![Some(5.0), Some(3.0), Some(4.0)],
///     ..Response::default()
/// };
/// let dataset = Dataset::from_responses(vec![row], Vec::new());
/// assert_eq!(best_feature(&dataset, Genre::Skincare, "Cream X"), Some("肌なじみ・透明感"));
/// ```
pub fn best_feature(dataset: &Dataset, genre: Genre, item: &str) -> Option<&'static str> {
    let scores = genre.config().scores;
    let row = AggregateRow::from_responses(dataset.item_responses(genre, item), scores.len());
    strongest(scores, &row)
}

/// Stable argmax over the defined means of `row`
pub fn strongest(scores: &[&'static str], row: &AggregateRow) -> Option<&'static str> {
    let mut best: Option<(usize, f64)> = None;
    for (axis, mean) in row.means().iter().enumerate().take(scores.len()) {
        if let Some(value) = *mean {
            if best.is_none_or(|(_, top)| value > top) {
                best = Some((axis, value));
            }
        }
    }
    best.map(|(axis, _)| scores[axis])
}

/// A templated marketing line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tagline {
    pub tone: Tone,
    pub text: String,
}

impl Tagline {
    /// Fill the tone's template with the product and its strongest attribute
    pub fn compose(tone: Tone, item: &str, feature: &str) -> Self {
        let text = match tone {
            Tone::Professional => {
                format!("【案】データが証明する実力。{feature}に妥協したくないあなたへ。")
            }
            Tone::Friendly => format!("【案】スタッフも驚いた！{item}で毎日がもっと楽しくなる。"),
            Tone::Stylish => format!("【案】光を味方に。{feature}が導く、新しい私。"),
            Tone::Impact => format!("【案】リピート確定！？この「{feature}」は事件です。"),
        };
        Tagline { tone, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Response, SAMPLE_CSV};

    #[test]
    fn best_feature_of_sample_products() {
        let dataset = Dataset::from_csv_str(SAMPLE_CSV).unwrap();
        assert_eq!(
            best_feature(&dataset, Genre::Skincare, "Cream X"),
            Some("肌への負担感のなさ・優しさ")
        );
        assert_eq!(best_feature(&dataset, Genre::Skincare, "Gel Y"), Some("さらっと感"));
        assert_eq!(best_feature(&dataset, Genre::Skincare, "Unknown"), None);
    }

    #[test]
    fn single_row_example_picks_first_axis() {
        let row = Response {
            item: Some("Cream X".to_string()),
            scores: vec![Some(5.0), Some(3.0), Some(4.0), Some(2.0), Some(1.0), Some(3.0), Some(4.0)],
            ..Response::default()
        };
        let dataset = Dataset::from_responses(vec![row], Vec::new());
        assert_eq!(
            best_feature(&dataset, Genre::Skincare, "Cream X"),
            Some("肌なじみ・透明感")
        );
    }

    #[test]
    fn ties_go_to_first_configured_axis() {
        let scores = ["a", "b", "c"];
        let row = AggregateRow::from_responses(
            &[Response {
                scores: vec![Some(3.0), Some(4.0), Some(4.0)],
                ..Response::default()
            }],
            3,
        );
        assert_eq!(strongest(&scores, &row), Some("b"));
    }

    #[test]
    fn undefined_row_has_no_strongest_axis() {
        assert_eq!(strongest(&["a", "b"], &AggregateRow::undefined(2)), None);
    }

    #[test]
    fn templates_interpolate_feature_or_item() {
        let pro = Tagline::compose(Tone::Professional, "Cream X", "しっとり感");
        assert_eq!(pro.text, "【案】データが証明する実力。しっとり感に妥協したくないあなたへ。");

        let friendly = Tagline::compose(Tone::Friendly, "Cream X", "しっとり感");
        assert!(friendly.text.contains("Cream X"));
        assert!(!friendly.text.contains("しっとり感"));

        let impact = Tagline::compose(Tone::Impact, "Cream X", "ツヤ感");
        assert_eq!(impact.text, "【案】リピート確定！？この「ツヤ感」は事件です。");
        assert_eq!(impact.tone.style(), "error");
    }
}
