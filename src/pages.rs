#![cfg(feature = "web")]

use crate::error::DashboardError;
use handlebars::Handlebars;
use serde::Serialize;

const PARTIALS: [(&str, &str); 2] = [
    ("header", include_str!("./static/header.hbs")),
    ("footer", include_str!("./static/footer.hbs")),
];

const TEMPLATES: [(&str, &str); 4] = [
    ("qr", include_str!("./static/qr.hbs")),
    ("radar", include_str!("./static/radar.hbs")),
    ("scatter", include_str!("./static/scatter.hbs")),
    ("tagline", include_str!("./static/tagline.hbs")),
];

/// Compiled page templates for the dashboard modes
///
/// Values are HTML-escaped on render; only the `chart` slot is inserted raw
/// because it holds SVG produced by the chart renderers.
pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, DashboardError> {
        let mut registry = Handlebars::new();
        for (name, source) in PARTIALS {
            registry
                .register_partial(name, source)
                .map_err(|e| DashboardError::Template(e.to_string()))?;
        }
        for (name, source) in TEMPLATES {
            registry
                .register_template_string(name, source)
                .map_err(|e| DashboardError::Template(e.to_string()))?;
        }
        Ok(Pages { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, DashboardError> {
        self.registry
            .render(name, context)
            .map_err(|e| DashboardError::Template(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_text_is_escaped() {
        let pages = Pages::new().unwrap();
        let html = pages
            .render("qr", &json!({ "product": "<b>A&B</b>", "heading": "QR" }))
            .unwrap();
        assert!(html.contains("&lt;b&gt;A&amp;B&lt;/b&gt;"));
        assert!(!html.contains("<b>A&B</b>"));
    }

    #[test]
    fn chart_slot_is_inserted_raw() {
        let pages = Pages::new().unwrap();
        let html = pages
            .render("scatter", &json!({ "chart": "<svg id=\"c\"></svg>", "points": 3 }))
            .unwrap();
        assert!(html.contains("<svg id=\"c\"></svg>"));
        assert!(html.contains("回答数: 3"));
    }

    #[test]
    fn warning_and_prompt_callouts() {
        let pages = Pages::new().unwrap();
        let html = pages
            .render(
                "radar",
                &json!({ "warning": "データが読み込めていません。", "prompt": "商品を選択してください。" }),
            )
            .unwrap();
        assert!(html.contains("callout error\">データが読み込めていません。"));
        assert!(html.contains("商品を選択してください。"));
        assert!(!html.contains("<svg"));
    }
}
