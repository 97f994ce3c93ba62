//! Static column layout of the survey sheet, keyed by product genre.

use serde::{Deserialize, Serialize};

/// Column holding the genre each respondent picked
pub const GENRE_COLUMN: &str = "今回ご使用の商品のジャンルを選択してください。";

/// Column holding the respondent's age bracket
pub const AGE_COLUMN: &str = "年齢";

/// Top-level product category, each with its own column schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    #[default]
    Skincare,
    Haircare,
}

impl Genre {
    pub const ALL: [Genre; 2] = [Genre::Skincare, Genre::Haircare];

    /// Value stored in the genre column for this category
    pub fn label(self) -> &'static str {
        match self {
            Genre::Skincare => "スキンケア商品（フェイスケア・ボディケア）",
            Genre::Haircare => "ヘアケア商品",
        }
    }

    /// Identifier used in query strings
    pub fn slug(self) -> &'static str {
        match self {
            Genre::Skincare => "skincare",
            Genre::Haircare => "haircare",
        }
    }

    pub fn config(self) -> &'static CategoryConfig {
        match self {
            Genre::Skincare => &SKINCARE,
            Genre::Haircare => &HAIRCARE,
        }
    }
}

/// Column names the dashboard reads for one genre
#[derive(Debug)]
pub struct CategoryConfig {
    /// Free-text product name
    pub item_col: &'static str,
    /// Product sub-type (lotion, shampoo, ...)
    pub type_col: &'static str,
    /// Comma-separated list of reported concerns
    pub concern_col: &'static str,
    /// Score columns in chart-axis order
    pub scores: &'static [&'static str],
}

impl CategoryConfig {
    /// Position of a score column in axis order
    pub fn score_index(&self, name: &str) -> Option<usize> {
        self.scores.iter().position(|s| *s == name)
    }

    /// Every column this genre reads, registry columns first
    pub fn required_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        [
            GENRE_COLUMN,
            AGE_COLUMN,
            self.item_col,
            self.type_col,
            self.concern_col,
        ]
        .into_iter()
        .chain(self.scores.iter().copied())
    }
}

static SKINCARE: CategoryConfig = CategoryConfig {
    item_col: "今回ご使用の商品名を入力してください。",
    type_col: "スキンケア商品を選択した方は種類を選択してください。",
    concern_col: "肌のお悩み（※複数選択可）",
    scores: &[
        "肌なじみ・透明感",
        "しっとり感",
        "さらっと感",
        "肌への負担感のなさ・優しさ",
        "香りの好み",
        "パッケージのときめき・使いやすさ",
        "リピート欲・おすすめ度",
    ],
};

// The form asks for the product name twice, once per genre branch, so the
// export carries the same header twice and the loader suffixes the second.
static HAIRCARE: CategoryConfig = CategoryConfig {
    item_col: "今回ご使用の商品名を入力してください。.1",
    type_col: "ヘアケア商品を選択した方は種類を選択してください。",
    concern_col: "髪のお悩み（※複数選択可）",
    scores: &[
        "指通り・まとまり",
        "ツヤ感",
        "地肌への刺激・洗い心地",
        "ダメージ補修・翌朝の髪の状態",
        "香りの好み",
        "パッケージのときめき・使いやすさ",
        "リピート欲・おすすめ度",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_index_follows_axis_order() {
        let config = Genre::Skincare.config();
        assert_eq!(config.score_index("肌なじみ・透明感"), Some(0));
        assert_eq!(config.score_index("リピート欲・おすすめ度"), Some(6));
        assert_eq!(config.score_index("ツヤ感"), None);
    }

    #[test]
    fn required_columns_cover_scores() {
        let config = Genre::Haircare.config();
        let columns: Vec<_> = config.required_columns().collect();
        assert_eq!(columns.len(), 5 + config.scores.len());
        assert!(columns.contains(&"今回ご使用の商品名を入力してください。.1"));
        assert!(columns.contains(&AGE_COLUMN));
    }

    #[test]
    fn genre_slug_round_trips_through_serde() {
        for genre in Genre::ALL {
            let encoded = serde_json::to_string(&genre).unwrap();
            assert_eq!(encoded, format!("\"{}\"", genre.slug()));
            let decoded: Genre = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, genre);
        }
    }
}
