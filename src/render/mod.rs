//! Draws a [`StripeSeries`] as climate stripes.
//!
//! Rendering is a pure function of the series and a [`StripeStyle`]. Text is
//! set in a bundled DejaVu Sans, so no system fonts are needed.

pub mod colormap;

use crate::pipeline::StripeSeries;
use colormap::ColorScale;
use log::info;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::element::DashedPathElement;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const CHARTREUSE: RGBColor = RGBColor(127, 255, 0);
const FONT_FAMILY: &str = "sans-serif";
static FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
static FONT_REGISTERED: OnceLock<bool> = OnceLock::new();

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Nothing to render: the series has no buckets")]
    NoBuckets,

    #[error("Unsupported output format for '{0}': expected a .png or .svg file")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to load the bundled label font")]
    Font,

    #[error("Failed to draw stripes: {0}")]
    Drawing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Svg,
}

impl OutputFormat {
    /// Picks the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, RenderError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("png") => Ok(OutputFormat::Png),
            Some("svg") => Ok(OutputFormat::Svg),
            _ => Err(RenderError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Image size, annotations and overlay settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripeStyle {
    pub width: u32,
    pub height: u32,
    /// Draw the station title, date ticks and the anomaly colorbar.
    pub annotate: bool,
    /// Label font size in pixels. The title is drawn slightly larger.
    pub font_size: u32,
    /// Upper bound on the number of date ticks under the stripes.
    pub max_ticks: usize,
    /// Overlay the bucket mean temperature as a dashed line with square markers.
    pub line_plot: bool,
    /// Vertical margin of the line, as a fraction of the stripe height.
    pub line_margin: f64,
    pub marker_size: i32,
}

impl Default for StripeStyle {
    fn default() -> Self {
        StripeStyle {
            width: 1200,
            height: 500,
            annotate: true,
            font_size: 14,
            max_ticks: 8,
            line_plot: true,
            line_margin: 0.1,
            marker_size: 3,
        }
    }
}

/// Renders `series` to `path`, as PNG or SVG by file extension.
///
/// # Arguments
///
/// * `series` - The buckets to draw, in order. Must not be empty.
/// * `style` - Size, annotation and overlay settings.
/// * `path` - Output file. The extension picks the format.
///
/// # Errors
///
/// Returns [`RenderError::UnsupportedFormat`] for anything but `.png` or
/// `.svg`, [`RenderError::NoBuckets`] for an empty series and
/// [`RenderError::Drawing`] when the backend fails to write.
pub fn render_to_file(
    series: &StripeSeries,
    style: &StripeStyle,
    path: &Path,
) -> Result<(), RenderError> {
    let format = OutputFormat::from_path(path)?;
    render_with_format(series, style, path, format)
}

/// Renders `series` to `path` in an already chosen `format`.
pub fn render_with_format(
    series: &StripeSeries,
    style: &StripeStyle,
    path: &Path,
    format: OutputFormat,
) -> Result<(), RenderError> {
    if series.buckets.is_empty() {
        return Err(RenderError::NoBuckets);
    }
    let size = (style.width.max(1), style.height.max(1));
    match format {
        OutputFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_stripes(&root, series, style)?;
        }
        OutputFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_stripes(&root, series, style)?;
        }
    }
    info!(
        "Rendered {} stripe(s) for station {} to {}",
        series.buckets.len(),
        series.station,
        path.display()
    );
    Ok(())
}

/// Renders `series` to an in-memory SVG document.
pub fn render_svg_string(series: &StripeSeries, style: &StripeStyle) -> Result<String, RenderError> {
    if series.buckets.is_empty() {
        return Err(RenderError::NoBuckets);
    }
    let mut svg = String::new();
    {
        let size = (style.width.max(1), style.height.max(1));
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        draw_stripes(&root, series, style)?;
    }
    Ok(svg)
}

fn drawing_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Drawing(e.to_string())
}

/// Registers the bundled font with plotters once per process.
fn ensure_font() -> Result<(), RenderError> {
    let registered = *FONT_REGISTERED.get_or_init(|| {
        plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES).is_ok()
    });
    if registered {
        Ok(())
    } else {
        Err(RenderError::Font)
    }
}

fn font(size: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::Name(FONT_FAMILY), size, FontStyle::Normal)
}

/// Left and right pixel edge of stripe `index` out of `count` across `width`.
fn stripe_edges(index: usize, count: usize, width: u32) -> (i32, i32) {
    let edge = |i: usize| (i as f64 * f64::from(width) / count as f64).round() as i32;
    (edge(index), edge(index + 1))
}

/// Evenly spaced bucket indices to label, at most `max` of them and always
/// starting with the first bucket.
fn tick_indices(count: usize, max: usize) -> Vec<usize> {
    if count == 0 || max == 0 {
        return Vec::new();
    }
    let step = count.div_ceil(max);
    (0..count).step_by(step).collect()
}

fn draw_stripes<DB>(
    root: &DrawingArea<DB, Shift>,
    series: &StripeSeries,
    style: &StripeStyle,
) -> Result<(), RenderError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(drawing_error)?;
    let (lo, hi) = series.anomaly_range().ok_or(RenderError::NoBuckets)?;
    let scale = ColorScale::new(lo, hi);
    let plot = if style.annotate {
        annotate(root, series, &scale, style)?
    } else {
        root.clone()
    };

    let (width, height) = plot.dim_in_pixel();
    let height = height as i32;
    let count = series.buckets.len();
    for (i, bucket) in series.buckets.iter().enumerate() {
        let (x0, x1) = stripe_edges(i, count, width);
        plot.draw(&Rectangle::new(
            [(x0, 0), (x1, height)],
            scale.color(bucket.anomaly).filled(),
        ))
        .map_err(drawing_error)?;
    }

    if style.line_plot {
        let points = line_points(series, width, height, style.line_margin);
        plot.draw(&DashedPathElement::new(
            points.clone(),
            8,
            5,
            CHARTREUSE.stroke_width(2),
        ))
        .map_err(drawing_error)?;
        let half = style.marker_size.max(1);
        for (x, y) in points {
            plot.draw(&Rectangle::new(
                [(x - half, y - half), (x + half, y + half)],
                CHARTREUSE.filled(),
            ))
            .map_err(drawing_error)?;
        }
    }

    root.present().map_err(drawing_error)?;
    Ok(())
}

/// Draws the station title above the stripes, and the date ticks and a
/// horizontal anomaly colorbar below them. Returns the area left for the
/// stripes.
fn annotate<DB>(
    root: &DrawingArea<DB, Shift>,
    series: &StripeSeries,
    scale: &ColorScale,
    style: &StripeStyle,
) -> Result<DrawingArea<DB, Shift>, RenderError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    ensure_font()?;
    let size = f64::from(style.font_size.max(1));
    let body = root
        .titled(
            &format!("GHCN Station ID - {}", series.station),
            font(size * 1.2).color(&BLACK),
        )
        .map_err(drawing_error)?;

    let (_, body_height) = body.dim_in_pixel();
    let row = style.font_size.max(1) as i32 + 8;
    let bar = style.font_size.max(1) as i32;
    let footer = (2 * row + bar + 6).min(body_height as i32 / 2);
    let (plot, below) = body.split_vertically(body_height as i32 - footer);
    let (width, _) = plot.dim_in_pixel();

    let tick_style = font(size)
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    let labels = series.labels();
    for index in tick_indices(labels.len(), style.max_ticks) {
        let (x0, x1) = stripe_edges(index, labels.len(), width);
        below
            .draw(&Text::new(
                labels[index].as_str(),
                ((x0 + x1) / 2, 4),
                tick_style.clone(),
            ))
            .map_err(drawing_error)?;
    }

    let width = width as i32;
    let (bar_left, bar_right) = (width / 4, width * 3 / 4);
    let bar_top = row + 6;
    let span = f64::from((bar_right - bar_left - 1).max(1));
    for x in bar_left..bar_right {
        below
            .draw(&Rectangle::new(
                [(x, bar_top), (x + 1, bar_top + bar)],
                colormap::rd_bu_r(f64::from(x - bar_left) / span).filled(),
            ))
            .map_err(drawing_error)?;
    }
    below
        .draw(&Rectangle::new(
            [(bar_left, bar_top), (bar_right, bar_top + bar)],
            BLACK.stroke_width(1),
        ))
        .map_err(drawing_error)?;

    let (lo, hi) = scale.bounds();
    let middle = bar_top + bar / 2;
    let end_style = |h_pos| font(size).color(&BLACK).pos(Pos::new(h_pos, VPos::Center));
    below
        .draw(&Text::new(
            format!("{lo:.2}"),
            (bar_left - 6, middle),
            end_style(HPos::Right),
        ))
        .map_err(drawing_error)?;
    below
        .draw(&Text::new(
            format!("{hi:.2}"),
            (bar_right + 6, middle),
            end_style(HPos::Left),
        ))
        .map_err(drawing_error)?;
    below
        .draw(&Text::new(
            "Anomaly (°C)",
            (width / 2, bar_top + bar + 4),
            tick_style,
        ))
        .map_err(drawing_error)?;

    Ok(plot)
}

/// Pixel positions of the bucket means: centred on each stripe, scaled
/// between the lowest and highest mean with `margin` left free above and below.
fn line_points(series: &StripeSeries, width: u32, height: i32, margin: f64) -> Vec<(i32, i32)> {
    let count = series.buckets.len();
    let (lo, hi) = series
        .buckets
        .iter()
        .map(|b| b.mean_temp)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        });
    let margin = margin.clamp(0.0, 0.45) * f64::from(height);
    let usable = f64::from(height) - 2.0 * margin;
    series
        .buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let (x0, x1) = stripe_edges(i, count, width);
            let t = if hi > lo {
                (bucket.mean_temp - lo) / (hi - lo)
            } else {
                0.5
            };
            let y = f64::from(height) - margin - t * usable;
            ((x0 + x1) / 2, y.round() as i32)
        })
        .collect()
}
