//! Analysis figure: error histograms, error trend and expected-vs-measured scatter.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{MeasureLogError, Result};
use crate::models::LogRecord;

const FIGURE_SIZE: (u32, u32) = (1200, 800);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 18);
const DASHES: usize = 15;

type Panel<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Equal-width histogram over `[lo, hi]`; the maximum lands in the last bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub lo: f64,
    pub bin_width: f64,
    pub counts: Vec<u32>,
}

impl Histogram {
    pub fn new(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (lo, hi) = padded_bounds(values.iter().copied());
        let bin_width = (hi - lo) / bins as f64;
        let mut counts = vec![0u32; bins];
        for v in values {
            let idx = ((v - lo) / bin_width).floor().max(0.0) as usize;
            counts[idx.min(bins - 1)] += 1;
        }
        Self {
            lo,
            bin_width,
            counts,
        }
    }

    pub fn hi(&self) -> f64 {
        self.lo + self.bin_width * self.counts.len() as f64
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Min/max of `values`, widened by 0.5 each side when they coincide.
fn padded_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

/// End points of the identity reference line: 0.9 × the smallest and 1.1 × the
/// largest expected length or width.
pub fn identity_line(records: &[LogRecord]) -> (f64, f64) {
    let expected = records
        .iter()
        .flat_map(|r| [r.expected_length, r.expected_width]);
    let (lo, hi) = expected.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    (lo * 0.9, hi * 1.1)
}

/// Records in timestamp order; equal timestamps keep their file order.
pub fn trend_order(records: &[LogRecord]) -> Vec<LogRecord> {
    let mut ordered = records.to_vec();
    ordered.sort_by_key(|r| r.timestamp);
    ordered
}

/// Render the 2×2 analysis figure for `records` into an SVG file at `path`.
pub fn render_analysis_chart(records: &[LogRecord], path: &Path, bins: usize) -> Result<()> {
    if records.is_empty() {
        return Err(MeasureLogError::EmptyLog);
    }

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    let length: Vec<f64> = records.iter().map(|r| r.length_error_rel).collect();
    let width: Vec<f64> = records.iter().map(|r| r.width_error_rel).collect();
    draw_histogram(&panels[0], "Length Error Distribution (%)", &Histogram::new(&length, bins), BLUE)?;
    draw_histogram(&panels[1], "Width Error Distribution (%)", &Histogram::new(&width, bins), GREEN)?;
    draw_trend(&panels[2], &trend_order(records))?;
    draw_scatter(&panels[3], records)?;

    root.present()?;
    Ok(())
}

fn draw_histogram(area: &Panel<'_>, title: &str, hist: &Histogram, color: RGBColor) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .caption(title, CAPTION_FONT)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(hist.lo..hist.hi(), 0u32..hist.max_count() + 1)?;

    chart
        .configure_mesh()
        .x_desc("Error %")
        .y_desc("Frequency")
        .draw()?;

    chart.draw_series(hist.counts.iter().enumerate().map(|(i, &count)| {
        let x0 = hist.lo + i as f64 * hist.bin_width;
        Rectangle::new([(x0, 0), (x0 + hist.bin_width, count)], color.mix(0.7).filled())
    }))?;
    Ok(())
}

fn draw_trend(area: &Panel<'_>, ordered: &[LogRecord]) -> Result<()> {
    let (lo, hi) = padded_bounds(
        ordered
            .iter()
            .flat_map(|r| [r.length_error_rel, r.width_error_rel, r.mean_error]),
    );
    let mut chart = ChartBuilder::on(area)
        .caption("Error Trends", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(0usize..ordered.len().max(1), lo.min(0.0)..hi)?;

    chart
        .configure_mesh()
        .x_desc("Measurement #")
        .y_desc("Error %")
        .draw()?;

    let series: [(&str, RGBColor, fn(&LogRecord) -> f64); 3] = [
        ("Length", BLUE, |r| r.length_error_rel),
        ("Width", GREEN, |r| r.width_error_rel),
        ("Mean", RED, |r| r.mean_error),
    ];
    for (label, color, value) in series {
        chart
            .draw_series(LineSeries::new(
                ordered.iter().enumerate().map(|(i, r)| (i, value(r))),
                &color,
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn draw_scatter(area: &Panel<'_>, records: &[LogRecord]) -> Result<()> {
    let (line_lo, line_hi) = identity_line(records);
    let (lo, hi) = padded_bounds(
        records
            .iter()
            .flat_map(|r| [r.expected_length, r.measured_length, r.expected_width, r.measured_width])
            .chain([line_lo, line_hi]),
    );

    let mut chart = ChartBuilder::on(area)
        .caption("Expected vs Measured", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(lo..hi, lo..hi)?;

    chart
        .configure_mesh()
        .x_desc("Expected (mm)")
        .y_desc("Measured (mm)")
        .draw()?;

    chart
        .draw_series(
            records
                .iter()
                .map(|r| Circle::new((r.expected_length, r.measured_length), 4, BLUE.mix(0.7).filled())),
        )?
        .label("Length")
        .legend(|(x, y)| Circle::new((x, y), 4, BLUE.filled()));

    chart
        .draw_series(
            records
                .iter()
                .map(|r| Circle::new((r.expected_width, r.measured_width), 4, GREEN.mix(0.7).filled())),
        )?
        .label("Width")
        .legend(|(x, y)| Circle::new((x, y), 4, GREEN.filled()));

    // Dashed: every other of 2 * DASHES equal segments.
    let step = (line_hi - line_lo) / (2 * DASHES) as f64;
    chart.draw_series((0..2 * DASHES).step_by(2).map(|i| {
        let a = line_lo + i as f64 * step;
        let b = a + step;
        PathElement::new(vec![(a, a), (b, b)], RED.stroke_width(2))
    }))?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}
