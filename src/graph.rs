use crate::aggregate::{AggregateRow, sort_categories};
use crate::error::DashboardError;
use crate::registry::Genre;
use crate::table::Response;
use plotters::prelude::*;
use plotters::style::{Palette, Palette99};
use std::f64::consts::PI;

/// Legend label for responses that left the age question blank
pub const UNANSWERED: &str = "未回答";

/// Most grid rings drawn on a radar chart, whatever the scale
pub const MAX_RINGS: usize = 10;

/// Configuration options for chart rendering
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Width of the SVG in pixels
    pub width: u32,

    /// Height of the SVG in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 800,
            height: 600,
        }
    }
}

/// One polygon of a radar chart
///
/// Only axes with a defined mean get a vertex; missing means leave a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarSeries {
    pub label: String,
    /// (axis index, raw mean) in axis order
    pub vertices: Vec<(usize, f64)>,
}

impl RadarSeries {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Geometry of a radar comparison, independent of any backend
#[derive(Debug, Clone, PartialEq)]
pub struct RadarChart {
    pub axes: Vec<String>,
    pub series: Vec<RadarSeries>,
}

impl RadarChart {
    /// Build one series per group, plotting raw means without normalization
    ///
    /// # Examples
    /// ```
    /// use cosme_insight::aggregate::AggregateRow;
    /// use cosme_insight::graph::RadarChart;
    ///
    /// let groups = vec![("empty".to_string(), AggregateRow::undefined(3))];
    /// let chart = RadarChart::build(&["a", "b", "c"], &groups);
    /// assert!(chart.series[0].is_empty());
    /// assert!(chart.ring(&chart.series[0]).is_empty());
    /// ```
    pub fn build(axes: &[&str], groups: &[(String, AggregateRow)]) -> Self {
        let series = groups
            .iter()
            .map(|(label, row)| RadarSeries {
                label: label.clone(),
                vertices: (0..axes.len())
                    .filter_map(|axis| row.get(axis).map(|value| (axis, value)))
                    .collect(),
            })
            .collect();

        RadarChart {
            axes: axes.iter().map(|a| a.to_string()).collect(),
            series,
        }
    }

    /// Outer radius of the chart: the rating scale top, or a larger mean
    pub fn radial_max(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.vertices.iter().map(|&(_, v)| v))
            .fold(5.0, f64::max)
    }

    /// Grid rings as (radius fraction, scale value), innermost first
    ///
    /// One ring per scale unit, capped at [`MAX_RINGS`] with an evenly spaced
    /// step once the scale grows past that.
    ///
    /// # Examples
    /// ```
    /// use cosme_insight::graph::RadarChart;
    ///
    /// let chart = RadarChart::build(&["a", "b", "c"], &[]);
    /// let rings = chart.grid_rings();
    /// assert_eq!(rings.len(), 5);
    /// assert_eq!(rings[4], (1.0, 5.0));
    /// ```
    pub fn grid_rings(&self) -> Vec<(f64, f64)> {
        let max = self.radial_max();
        let rings = (max.ceil() as usize).clamp(1, MAX_RINGS);
        let step = max / rings as f64;
        (1..=rings)
            .map(|ring| (ring as f64 / rings as f64, step * ring as f64))
            .collect()
    }

    /// Closed outline of a series in unit-circle coordinates
    ///
    /// The first vertex is repeated at the end; an empty series yields no points.
    pub fn ring(&self, series: &RadarSeries) -> Vec<(f64, f64)> {
        let max = self.radial_max();
        let mut points: Vec<(f64, f64)> = series
            .vertices
            .iter()
            .map(|&(axis, value)| {
                let (x, y) = spoke(axis, self.axes.len());
                let r = (value / max).max(0.0);
                (x * r, y * r)
            })
            .collect();

        if let Some(&first) = points.first() {
            points.push(first);
        }
        points
    }
}

/// Unit direction of an axis on the radar
///
/// The first axis points straight up and the rest follow clockwise at equal
/// angles.
///
/// # Arguments
/// * `axis` - Index of the axis in configured order
/// * `axes` - Total number of axes
///
/// # Returns
/// * `(f64, f64)` - Point on the unit circle
pub fn spoke(axis: usize, axes: usize) -> (f64, f64) {
    let angle = PI / 2.0 - 2.0 * PI * axis as f64 / axes.max(1) as f64;
    (angle.cos(), angle.sin())
}

fn series_color(idx: usize) -> RGBColor {
    let (r, g, b) = Palette99::COLORS[idx % Palette99::COLORS.len()];
    RGBColor(r, g, b)
}

/// Render a radar chart as an SVG document
///
/// Draws the grid rings, one spoke per axis and a filled polygon per series.
/// Series without any defined mean still get a legend entry but draw nothing.
///
/// # Arguments
/// * `chart` - Axes and series built by [`RadarChart::build`]
/// * `options` - Title and pixel size of the SVG
///
/// # Returns
/// * `Result<String, DashboardError>` - SVG markup, or `Render` if plotters fails
pub fn render_radar(chart: &RadarChart, options: &GraphOptions) -> Result<String, DashboardError> {
    let mut buffer = String::new();
    draw_radar(chart, options, &mut buffer).map_err(|e| DashboardError::Render(e.to_string()))?;
    Ok(buffer)
}

fn draw_radar(
    chart: &RadarChart,
    options: &GraphOptions,
    buffer: &mut String,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::with_string(buffer, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 24).into_font())
        .margin(20)
        .build_cartesian_2d(-1.45f64..1.45f64, -1.2f64..1.2f64)?;

    let n = chart.axes.len();
    let grid = BLACK.mix(0.2).stroke_width(1);

    for (r, value) in chart.grid_rings() {
        let outline: Vec<(f64, f64)> = (0..=n)
            .map(|axis| {
                let (x, y) = spoke(axis % n.max(1), n);
                (x * r, y * r)
            })
            .collect();
        ctx.draw_series(std::iter::once(PathElement::new(outline, grid)))?;
        ctx.draw_series(std::iter::once(Text::new(
            format!("{}", value.round()),
            (0.02, r),
            ("sans-serif", 11).into_font().color(&BLACK.mix(0.5)),
        )))?;
    }

    for (axis, name) in chart.axes.iter().enumerate() {
        let (x, y) = spoke(axis, n);
        ctx.draw_series(std::iter::once(PathElement::new(vec![(0.0, 0.0), (x, y)], grid)))?;
        ctx.draw_series(std::iter::once(Text::new(
            name.clone(),
            (x * 1.08 - if x < -0.1 { 0.3 } else { 0.0 }, y * 1.08 + 0.04),
            ("sans-serif", 13).into_font(),
        )))?;
    }

    for (idx, series) in chart.series.iter().enumerate() {
        let color = series_color(idx);
        let outline = chart.ring(series);

        let fill: Vec<Polygon<(f64, f64)>> = if series.vertices.len() > 2 {
            vec![Polygon::new(outline.clone(), color.mix(0.2).filled())]
        } else {
            Vec::new()
        };
        ctx.draw_series(fill)?
            .label(series.label.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));

        if outline.len() > 2 {
            ctx.draw_series(std::iter::once(PathElement::new(
                outline.clone(),
                color.stroke_width(2),
            )))?;
        }
        ctx.draw_series(
            outline
                .iter()
                .map(|&point| Circle::new(point, 3, color.filled())),
        )?;
    }

    if !chart.series.is_empty() {
        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// One response placed on the distribution chart
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub age: Option<String>,
    pub item: Option<String>,
}

/// Raw score distribution for two axes, one point per response
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPlot {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ScatterPoint>,
}

impl ScatterPlot {
    /// Place every response that answered both axes
    ///
    /// # Errors
    /// * `UnknownColumn` if either axis is not a score column of the genre
    pub fn build(
        responses: &[Response],
        genre: Genre,
        x: &str,
        y: &str,
    ) -> Result<Self, DashboardError> {
        let config = genre.config();
        let x_axis = config
            .score_index(x)
            .ok_or_else(|| DashboardError::UnknownColumn(x.to_string()))?;
        let y_axis = config
            .score_index(y)
            .ok_or_else(|| DashboardError::UnknownColumn(y.to_string()))?;

        let points = responses
            .iter()
            .filter_map(|r| {
                Some(ScatterPoint {
                    x: r.scores.get(x_axis).copied().flatten()?,
                    y: r.scores.get(y_axis).copied().flatten()?,
                    age: r.age.clone(),
                    item: r.item.clone(),
                })
            })
            .collect();

        Ok(ScatterPlot {
            x_label: x.to_string(),
            y_label: y.to_string(),
            points,
        })
    }

    /// Legend groups: answered ages in sorted order, then unanswered if any
    pub fn age_groups(&self) -> Vec<Option<String>> {
        let mut groups: Vec<Option<String>> =
            sort_categories(self.points.iter().filter_map(|p| p.age.as_deref()))
                .into_iter()
                .map(Some)
                .collect();
        if self.points.iter().any(|p| p.age.is_none()) {
            groups.push(None);
        }
        groups
    }

    fn bounds(&self, pick: impl Fn(&ScatterPoint) -> f64) -> std::ops::Range<f64> {
        let (lo, hi) = self
            .points
            .iter()
            .map(pick)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if lo.is_finite() {
            lo - 0.5..hi + 0.5
        } else {
            0.0..6.0
        }
    }
}

/// Render the distribution chart as an SVG document
///
/// Each age group gets its own color and legend entry, with unanswered ages
/// listed last under [`UNANSWERED`].
///
/// # Arguments
/// * `plot` - Points built by [`ScatterPlot::build`]
/// * `options` - Title and pixel size of the SVG
///
/// # Returns
/// * `Result<String, DashboardError>` - SVG markup, or `Render` if plotters fails
pub fn render_scatter(plot: &ScatterPlot, options: &GraphOptions) -> Result<String, DashboardError> {
    let mut buffer = String::new();
    draw_scatter(plot, options, &mut buffer).map_err(|e| DashboardError::Render(e.to_string()))?;
    Ok(buffer)
}

fn draw_scatter(
    plot: &ScatterPlot,
    options: &GraphOptions,
    buffer: &mut String,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::with_string(buffer, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 24).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(plot.bounds(|p| p.x), plot.bounds(|p| p.y))?;

    ctx.configure_mesh()
        .x_desc(&plot.x_label)
        .y_desc(&plot.y_label)
        .draw()?;

    let groups = plot.age_groups();
    for (idx, group) in groups.iter().enumerate() {
        let color = series_color(idx);
        let members = plot
            .points
            .iter()
            .filter(|p| p.age.as_ref() == group.as_ref())
            .map(|p| Circle::new((p.x, p.y), 5, color.mix(0.8).filled()));

        ctx.draw_series(members)?
            .label(group.as_deref().unwrap_or(UNANSWERED))
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    if !groups.is_empty() {
        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{GroupBy, aggregate};
    use crate::table::{Dataset, SAMPLE_CSV};

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn first_axis_points_up_and_axes_run_clockwise() {
        assert!(close(spoke(0, 4), (0.0, 1.0)));
        assert!(close(spoke(1, 4), (1.0, 0.0)));
        assert!(close(spoke(2, 4), (0.0, -1.0)));
    }

    #[test]
    fn ring_is_closed_and_scaled_by_raw_mean() {
        let groups = vec![(
            "p".to_string(),
            AggregateRow::from_responses(
                &[Response {
                    scores: vec![Some(5.0), Some(2.5), Some(5.0), Some(2.5)],
                    ..Response::default()
                }],
                4,
            ),
        )];
        let chart = RadarChart::build(&["a", "b", "c", "d"], &groups);
        let ring = chart.ring(&chart.series[0]);
        assert_eq!(ring.len(), 5);
        assert!(close(ring[0], (0.0, 1.0)));
        assert!(close(ring[1], (0.5, 0.0)));
        assert!(close(ring[4], ring[0]));
    }

    #[test]
    fn missing_means_leave_gaps() {
        let groups = vec![(
            "p".to_string(),
            AggregateRow::from_responses(
                &[Response {
                    scores: vec![Some(3.0), None, Some(4.0)],
                    ..Response::default()
                }],
                3,
            ),
        )];
        let chart = RadarChart::build(&["a", "b", "c"], &groups);
        assert_eq!(chart.series[0].vertices, [(0, 3.0), (2, 4.0)]);
    }

    #[test]
    fn radial_max_grows_past_rating_scale() {
        let groups = vec![(
            "p".to_string(),
            AggregateRow::from_responses(
                &[Response {
                    scores: vec![Some(7.0)],
                    ..Response::default()
                }],
                1,
            ),
        )];
        assert_eq!(RadarChart::build(&["a"], &groups).radial_max(), 7.0);
        assert_eq!(RadarChart::build(&["a"], &[]).radial_max(), 5.0);
    }

    #[test]
    fn outsized_mean_keeps_grid_bounded() {
        let groups = vec![(
            "typo".to_string(),
            AggregateRow::from_responses(
                &[Response {
                    scores: vec![Some(1.0e6), Some(3.0), Some(4.0)],
                    ..Response::default()
                }],
                3,
            ),
        )];
        let chart = RadarChart::build(&["a", "b", "c"], &groups);
        let rings = chart.grid_rings();
        assert_eq!(rings.len(), MAX_RINGS);
        assert_eq!(rings[0].1, 1.0e5);
        assert_eq!(rings[MAX_RINGS - 1], (1.0, 1.0e6));

        let svg = render_radar(&chart, &GraphOptions::default()).unwrap();
        assert!(svg.len() < 200_000, "svg grew to {} bytes", svg.len());
    }

    #[test]
    fn rating_scale_gets_one_ring_per_point() {
        let chart = RadarChart::build(&["a", "b"], &[]);
        let values: Vec<f64> = chart.grid_rings().iter().map(|&(_, v)| v).collect();
        assert_eq!(values, [1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn empty_age_group_renders_without_failing() {
        let dataset = Dataset::from_csv_str(SAMPLE_CSV).unwrap();
        let genre = Genre::Skincare;
        let groups = aggregate(
            &dataset,
            genre,
            GroupBy::Age { item: "Cream X" },
            &["20代".to_string(), "60代".to_string()],
        );
        let chart = RadarChart::build(genre.config().scores, &groups);
        assert!(chart.series[1].is_empty());
        assert!(chart.ring(&chart.series[1]).is_empty());

        let svg = render_radar(&chart, &GraphOptions::default()).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("60代"));
    }

    #[test]
    fn scatter_skips_rows_missing_an_axis() {
        let dataset = Dataset::from_csv_str(SAMPLE_CSV).unwrap();
        let genre = Genre::Skincare;
        let plot = ScatterPlot::build(
            dataset.responses(genre),
            genre,
            "香りの好み",
            "リピート欲・おすすめ度",
        )
        .unwrap();
        assert_eq!(plot.points.len(), 3);
        assert_eq!(
            plot.age_groups(),
            [Some("20代".to_string()), Some("30代".to_string()), Some("40代".to_string())]
        );
    }

    #[test]
    fn scatter_rejects_columns_of_other_genre() {
        let err = ScatterPlot::build(&[], Genre::Skincare, "ツヤ感", "香りの好み").unwrap_err();
        assert_eq!(err, DashboardError::UnknownColumn("ツヤ感".to_string()));
    }

    #[test]
    fn scatter_groups_unanswered_age_last() {
        let responses = vec![
            Response {
                scores: vec![Some(1.0), Some(2.0)],
                ..Response::default()
            },
            Response {
                age: Some("30代".to_string()),
                scores: vec![Some(3.0), Some(4.0)],
                ..Response::default()
            },
        ];
        let plot = ScatterPlot::build(&responses, Genre::Skincare, "肌なじみ・透明感", "しっとり感")
            .unwrap();
        assert_eq!(plot.age_groups(), [Some("30代".to_string()), None]);

        let svg = render_scatter(&plot, &GraphOptions::default()).unwrap();
        assert!(svg.contains(UNANSWERED));
    }

    #[test]
    fn empty_scatter_still_renders() {
        let plot = ScatterPlot::build(&[], Genre::Haircare, "ツヤ感", "香りの好み").unwrap();
        assert!(plot.points.is_empty());
        assert!(render_scatter(&plot, &GraphOptions::default()).is_ok());
    }
}
