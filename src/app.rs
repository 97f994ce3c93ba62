#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Query;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::aggregate::{self, AggregateRow, ConcernMatch, GroupBy};
use crate::config::Config;
use crate::error::DashboardError;
use crate::graph::{self, GraphOptions, RadarChart, ScatterPlot};
use crate::pages::Pages;
use crate::qr::QrIssuer;
use crate::registry::Genre;
use crate::source::{Snapshot, SurveyCache};
use crate::tagline::{self, Tagline, Tone};

/// Shown in place of every data-dependent view while the sheet is unavailable
pub const UNAVAILABLE_WARNING: &str = "データが読み込めていません。";

const NO_RESPONSES: &str = "このジャンルの回答はまだありません。";
const ENTER_PRODUCT: &str = "商品名を入力してください。";

const MENU: [(&str, &str, &str); 4] = [
    ("qr", "/qr", "QR生成"),
    ("radar", "/radar", "レーダーチャート比較"),
    ("scatter", "/scatter", "分布図分析"),
    ("tagline", "/tagline", "AIポップ生成"),
];

pub struct AppState {
    cache: SurveyCache,
    qr: QrIssuer,
    pages: Pages,
    concern_match: ConcernMatch,
}

impl AppState {
    pub fn new(
        cache: SurveyCache,
        qr: QrIssuer,
        concern_match: ConcernMatch,
    ) -> Result<Self, DashboardError> {
        Ok(AppState {
            cache,
            qr,
            pages: Pages::new()?,
            concern_match,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct QrQuery {
    product: Option<String>,
    download: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RadarMode {
    #[default]
    Product,
    Age,
    Concern,
}

impl RadarMode {
    const ALL: [RadarMode; 3] = [RadarMode::Product, RadarMode::Age, RadarMode::Concern];

    fn slug(self) -> &'static str {
        match self {
            RadarMode::Product => "product",
            RadarMode::Age => "age",
            RadarMode::Concern => "concern",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RadarMode::Product => "商品ごとに比較",
            RadarMode::Age => "年代別に比較",
            RadarMode::Concern => "お悩み別に比較",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RadarQuery {
    #[serde(default)]
    genre: Genre,
    #[serde(default)]
    mode: RadarMode,
    item: Option<String>,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScatterQuery {
    #[serde(default)]
    genre: Genre,
    x: Option<String>,
    y: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TaglineQuery {
    #[serde(default)]
    genre: Genre,
    item: Option<String>,
    #[serde(default)]
    tone: Tone,
    generate: Option<String>,
}

/// Template context for one page
struct View {
    template: &'static str,
    context: Map<String, Value>,
}

impl View {
    fn new(template: &'static str, heading: &str) -> Self {
        let menu: Vec<Value> = MENU
            .iter()
            .map(|&(name, href, label)| json!({ "href": href, "label": label, "active": name == template }))
            .collect();

        let mut view = View {
            template,
            context: Map::new(),
        };
        view.set("heading", heading);
        view.set("menu", menu);
        view
    }

    fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.context.insert(key.to_string(), value.into());
    }

    fn prompt(&mut self, message: &str) {
        self.set("prompt", message);
    }

    fn render(self, pages: &Pages) -> Result<Html<String>, DashboardError> {
        pages
            .render(self.template, &Value::Object(self.context))
            .map(Html)
    }
}

fn option(value: &str, label: &str, selected: bool) -> Value {
    json!({ "value": value, "label": label, "selected": selected })
}

fn genre_options(genre: Genre) -> Vec<Value> {
    Genre::ALL
        .iter()
        .map(|&g| option(g.slug(), g.label(), g == genre))
        .collect()
}

fn checkboxes<S: AsRef<str>>(values: &[S], selected: &[String]) -> Vec<Value> {
    values
        .iter()
        .map(|v| {
            let v = v.as_ref();
            option(v, v, selected.iter().any(|s| s == v))
        })
        .collect()
}

/// The requested item if the genre has it, otherwise the first one listed
fn pick_item<'a>(requested: Option<&str>, items: &[&'a str]) -> Option<&'a str> {
    requested
        .and_then(|r| items.iter().copied().find(|i| *i == r))
        .or_else(|| items.first().copied())
}

fn pick_axis(requested: Option<&str>, scores: &[&'static str], fallback: usize) -> &'static str {
    requested
        .and_then(|r| scores.iter().copied().find(|s| *s == r))
        .or_else(|| scores.get(fallback).copied())
        .unwrap_or_default()
}

/// Load the sheet, marking the view unavailable on failure
async fn load(state: &AppState, view: &mut View) -> Option<Snapshot> {
    match state.cache.load().await {
        Ok(snapshot) => {
            view.set(
                "fetched_at",
                snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            );
            Some(snapshot)
        }
        Err(e) => {
            view.set("warning", UNAVAILABLE_WARNING);
            view.set("detail", e.to_string());
            None
        }
    }
}

/// Build the dashboard router
///
/// Every response carries `Cache-Control: no-store` so browsers never show a
/// chart computed from an older sheet.
///
/// # Arguments
/// * `state` - Shared cache, QR issuer and templates
///
/// # Returns
/// * `Router` - Routes for `/`, `/qr`, `/qr.png`, `/radar`, `/scatter`,
///   `/tagline` and `POST /refresh`
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/qr") }))
        .route("/qr", get(qr_page))
        .route("/qr.png", get(qr_png))
        .route("/radar", get(radar_page))
        .route("/scatter", get(scatter_page))
        .route("/tagline", get(tagline_page))
        .route("/refresh", post(refresh))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

/// Prime the survey cache and serve the dashboard
///
/// # Arguments
/// * `config` - Parsed startup flags
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Only returns early when the
///   sheet lacks a configured column or the address cannot be bound
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cache = SurveyCache::new(config.source()?, config.cache_ttl());
    log::info!("survey sheet is reused for {}s between fetches", cache.ttl().as_secs());

    // A sheet that loads but lacks configured columns will never recover on its own
    match cache.load().await {
        Ok(_) => {}
        Err(e @ DashboardError::MissingColumn { .. }) => return Err(e.into()),
        Err(e) => log::warn!("starting without survey data: {}", e),
    }

    let state = Arc::new(AppState::new(
        cache,
        QrIssuer::new(config.form_url.clone()),
        config.concern_match,
    )?);

    let listener = TcpListener::bind(config.bind).await?;
    log::info!("Listening on http://{}", config.bind);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn qr_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QrQuery>,
) -> Result<Html<String>, DashboardError> {
    let mut view = View::new("qr", "🔗 商品別QRコード作成");

    match query.product.as_deref().map(str::trim) {
        None => {}
        Some("") => view.prompt(ENTER_PRODUCT),
        Some(product) => {
            let encoded = urlencoding::encode(product);
            view.set("product", product);
            view.set("qr_src", format!("/qr.png?product={encoded}"));
            view.set("download_href", format!("/qr.png?product={encoded}&download=1"));
            view.set("form_url", state.qr.form_url(product));
            view.set("caption", format!("{product} 専用QR"));
        }
    }

    view.render(&state.pages)
}

async fn qr_png(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QrQuery>,
) -> Result<Response, DashboardError> {
    let product = query.product.as_deref().map(str::trim).unwrap_or_default();
    if product.is_empty() {
        return Err(DashboardError::EmptySelection(ENTER_PRODUCT));
    }

    let png = state.qr.build_qr(product)?;
    let mut response = ([(header::CONTENT_TYPE, "image/png")], png).into_response();
    if query.download.is_some() {
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"qr.png\""),
        );
    }
    Ok(response)
}

async fn radar_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RadarQuery>,
) -> Result<Html<String>, DashboardError> {
    let mut view = View::new("radar", "📊 スパイダーチャート分析");
    view.set("genres", genre_options(query.genre));
    view.set(
        "modes",
        RadarMode::ALL
            .iter()
            .map(|&m| option(m.slug(), m.label(), m == query.mode))
            .collect::<Vec<_>>(),
    );

    let Some(snapshot) = load(&state, &mut view).await else {
        return view.render(&state.pages);
    };

    match radar_groups(&snapshot, &query, state.concern_match, &mut view) {
        Ok(groups) => {
            let scores = query.genre.config().scores;
            let chart = RadarChart::build(scores, &groups);
            let options = GraphOptions {
                title: format!("{}のスコア比較", query.genre.label()),
                width: 760,
                height: 560,
            };
            view.set("chart", graph::render_radar(&chart, &options)?);
            view.set("axes", scores.to_vec());
            view.set("table", means_table(&groups));
        }
        Err(DashboardError::EmptySelection(message)) => view.prompt(message),
        Err(e) => return Err(e),
    }

    view.render(&state.pages)
}

/// Groups to plot for the chosen comparison, filling in the selection widgets
fn radar_groups(
    snapshot: &Snapshot,
    query: &RadarQuery,
    matching: ConcernMatch,
    view: &mut View,
) -> Result<Vec<(String, AggregateRow)>, DashboardError> {
    let dataset = &snapshot.dataset;
    let genre = query.genre;
    let items = dataset.items(genre);
    if items.is_empty() {
        return Err(DashboardError::EmptySelection(NO_RESPONSES));
    }

    if query.mode == RadarMode::Product {
        view.set("values_legend", "商品を選択");
        view.set("value_options", checkboxes(&items, &query.values));
        if query.values.is_empty() {
            return Err(DashboardError::EmptySelection("商品を選択してください。"));
        }
        return Ok(aggregate::aggregate(
            dataset,
            genre,
            GroupBy::Product,
            &query.values,
        ));
    }

    let item = pick_item(query.item.as_deref(), &items)
        .ok_or(DashboardError::EmptySelection(NO_RESPONSES))?;
    view.set(
        "item_options",
        items
            .iter()
            .map(|&i| option(i, i, i == item))
            .collect::<Vec<_>>(),
    );

    if query.mode == RadarMode::Age {
        let available = aggregate::ages(dataset, genre, item);
        // every answered age is compared until the operator narrows it down
        let selected = if query.values.is_empty() {
            available.clone()
        } else {
            query.values.clone()
        };
        view.set("values_legend", "比較する年代を選択");
        view.set("value_options", checkboxes(&available, &selected));
        if selected.is_empty() {
            return Err(DashboardError::EmptySelection("比較する年代を選択してください。"));
        }
        return Ok(aggregate::aggregate(
            dataset,
            genre,
            GroupBy::Age { item },
            &selected,
        ));
    }

    let tags = aggregate::concern_tags(dataset, genre, item);
    view.set("values_legend", "比較するお悩みを選択");
    view.set("value_options", checkboxes(&tags, &query.values));
    if query.values.is_empty() {
        return Err(DashboardError::EmptySelection("比較するお悩みを選択してください。"));
    }
    Ok(
        aggregate::aggregate(dataset, genre, GroupBy::Concern { item, matching }, &query.values)
            .into_iter()
            .map(|(concern, row)| (format!("悩み：{concern}"), row))
            .collect(),
    )
}

fn means_table(groups: &[(String, AggregateRow)]) -> Vec<Value> {
    groups
        .iter()
        .map(|(label, row)| {
            let cells: Vec<String> = row
                .means()
                .iter()
                .map(|mean| mean.map_or_else(|| "-".to_string(), |v| format!("{v:.2}")))
                .collect();
            json!({ "label": label, "cells": cells })
        })
        .collect()
}

async fn scatter_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScatterQuery>,
) -> Result<Html<String>, DashboardError> {
    let genre = query.genre;
    let scores = genre.config().scores;
    let x = pick_axis(query.x.as_deref(), scores, 0);
    let y = pick_axis(query.y.as_deref(), scores, scores.len().saturating_sub(1));

    let mut view = View::new("scatter", "📈 お悩み×満足度の分布");
    view.set("genres", genre_options(genre));
    view.set(
        "x_options",
        scores.iter().map(|&s| option(s, s, s == x)).collect::<Vec<_>>(),
    );
    view.set(
        "y_options",
        scores.iter().map(|&s| option(s, s, s == y)).collect::<Vec<_>>(),
    );

    let Some(snapshot) = load(&state, &mut view).await else {
        return view.render(&state.pages);
    };

    let plot = ScatterPlot::build(snapshot.dataset.responses(genre), genre, x, y)?;
    let options = GraphOptions {
        title: format!("{} × {}", x, y),
        ..GraphOptions::default()
    };
    view.set("chart", graph::render_scatter(&plot, &options)?);
    view.set("points", plot.points.len());
    view.set("rows", scatter_rows(&plot));
    view.set("x_label", x);
    view.set("y_label", y);

    view.render(&state.pages)
}

/// One table row per plotted response, naming the product behind each point
fn scatter_rows(plot: &ScatterPlot) -> Vec<Value> {
    plot.points
        .iter()
        .map(|p| {
            json!({
                "item": p.item.as_deref().unwrap_or("-"),
                "age": p.age.as_deref().unwrap_or(graph::UNANSWERED),
                "x": p.x,
                "y": p.y,
            })
        })
        .collect()
}

async fn tagline_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaglineQuery>,
) -> Result<Html<String>, DashboardError> {
    let mut view = View::new("tagline", "📝 AI商品ポップ提案");
    view.set("genres", genre_options(query.genre));
    view.set(
        "tones",
        Tone::ALL
            .iter()
            .map(|&t| option(t.slug(), t.label(), t == query.tone))
            .collect::<Vec<_>>(),
    );

    let Some(snapshot) = load(&state, &mut view).await else {
        return view.render(&state.pages);
    };

    let dataset = &snapshot.dataset;
    let items = dataset.items(query.genre);
    let Some(item) = pick_item(query.item.as_deref(), &items) else {
        view.prompt(NO_RESPONSES);
        return view.render(&state.pages);
    };
    view.set(
        "item_options",
        items
            .iter()
            .map(|&i| option(i, i, i == item))
            .collect::<Vec<_>>(),
    );

    match tagline::best_feature(dataset, query.genre, item) {
        None => view.prompt("この商品にはまだスコアの回答がありません。"),
        Some(feature) => {
            view.set("best_feature", feature);
            if query.generate.is_some() {
                let tagline = Tagline::compose(query.tone, item, feature);
                view.set(
                    "tagline",
                    json!({ "text": tagline.text, "style": tagline.tone.style() }),
                );
            }
        }
    }

    view.render(&state.pages)
}

async fn refresh(State(state): State<Arc<AppState>>) -> Redirect {
    if let Err(e) = state.cache.refresh().await {
        log::warn!("manual refresh failed: {}", e);
    }
    Redirect::to("/")
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::EmptySelection(_) | DashboardError::UnknownColumn(_) => {
                StatusCode::BAD_REQUEST
            }
            e if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_unknown_item_falls_back_to_first() {
        let items = ["Cream X", "Gel Y"];
        assert_eq!(pick_item(Some("Gel Y"), &items), Some("Gel Y"));
        assert_eq!(pick_item(Some("Other"), &items), Some("Cream X"));
        assert_eq!(pick_item(None, &items), Some("Cream X"));
        assert_eq!(pick_item(None, &[]), None);
    }

    #[test]
    fn scatter_axes_default_to_first_and_last_score() {
        let scores = Genre::Skincare.config().scores;
        assert_eq!(pick_axis(None, scores, 0), scores[0]);
        assert_eq!(pick_axis(Some("bogus"), scores, scores.len() - 1), scores[scores.len() - 1]);
        assert_eq!(pick_axis(Some(scores[2]), scores, 0), scores[2]);
    }

    #[test]
    fn menu_marks_active_mode() {
        let view = View::new("scatter", "heading");
        let menu = view.context["menu"].as_array().unwrap();
        let active: Vec<&str> = menu
            .iter()
            .filter(|m| m["active"] == true)
            .map(|m| m["href"].as_str().unwrap())
            .collect();
        assert_eq!(active, ["/scatter"]);
    }

    #[test]
    fn scatter_rows_name_each_point() {
        let plot = ScatterPlot {
            x_label: "x".to_string(),
            y_label: "y".to_string(),
            points: vec![graph::ScatterPoint {
                x: 2.0,
                y: 3.5,
                age: None,
                item: Some("Gel Y".to_string()),
            }],
        };
        let rows = scatter_rows(&plot);
        assert_eq!(rows[0]["item"], "Gel Y");
        assert_eq!(rows[0]["age"], graph::UNANSWERED);
        assert_eq!(rows[0]["y"], 3.5);
    }

    #[test]
    fn undefined_means_show_as_dash() {
        let table = means_table(&[("none".to_string(), AggregateRow::undefined(2))]);
        assert_eq!(table[0]["cells"], json!(["-", "-"]));
    }
}
