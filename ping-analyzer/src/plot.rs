//! Diagnostic charts of a trace, rendered to PNG files through [`plotters`]

use plotters::coord::Shift;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;
use trace_analysis::Trace;
use trace_analysis::distribution::{binned_box_stats, empirical_cdf};
use trace_analysis::stats::TraceSummary;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("failed to create drawing area: {0}")]
    DrawingArea(String),
    #[error("failed to configure chart: {0}")]
    ChartConfig(String),
    #[error("failed to draw chart elements: {0}")]
    Drawing(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

type Result<T> = core::result::Result<T, PlotError>;

/// Half of the width of a box, in bins
const BOX_HALF_WIDTH: f64 = 0.3;

#[derive(Clone, Copy, Debug)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Whether captions, axis labels and legends are drawn
///
/// Drawing text requires a system font, the chart geometry does not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Text {
    Shown,
    Hidden,
}

type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn build_chart<'a, 'b>(
    root: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    caption: String,
    text: Text,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<Chart<'a, 'b>> {
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text == Text::Shown {
        builder
            .caption(caption, ("sans-serif", 30))
            .x_label_area_size(50)
            .y_label_area_size(70);
    }

    builder
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))
}

fn require_rtts(trace: &Trace) -> Result<f64> {
    trace
        .rtts()
        .max_by(f64::total_cmp)
        .ok_or_else(|| PlotError::InvalidData("the trace contains no RTT samples".to_string()))
}

/// Upper bound of the RTT axis, leaving some room above the highest sample
fn rtt_axis_max(max_rtt_ms: f64) -> f64 {
    if max_rtt_ms > 0.0 {
        max_rtt_ms * 1.1
    } else {
        1.0
    }
}

/// RTT of every received packet by sequence number, with lost packets marked on the x axis
pub fn render_scatter(
    trace: &Trace,
    summary: &TraceSummary,
    output_path: &Path,
    dimensions: Dimensions,
) -> Result<()> {
    draw_scatter(trace, summary, output_path, dimensions, Text::Shown)
}

fn draw_scatter(
    trace: &Trace,
    summary: &TraceSummary,
    output_path: &Path,
    dimensions: Dimensions,
    text: Text,
) -> Result<()> {
    let max_rtt_ms = require_rtts(trace)?;
    let x_max = trace.max_sequence_number().unwrap_or_default().max(1) as f64;
    let y_max = rtt_axis_max(max_rtt_ms);

    let root = BitMapBackend::new(output_path, (dimensions.width, dimensions.height))
        .into_drawing_area();
    let mut chart = build_chart(
        &root,
        "Round Trip Time per Packet".to_string(),
        text,
        0.0..x_max,
        0.0..y_max,
    )?;

    let mut mesh = chart.configure_mesh();
    match text {
        Text::Shown => mesh.x_desc("Packet sequence number").y_desc("RTT (ms)"),
        Text::Hidden => mesh.x_labels(0).y_labels(0),
    };
    mesh.draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let received = trace
        .records()
        .iter()
        .filter_map(|r| Some((r.sequence_number as f64, r.rtt_ms?)));
    chart
        .draw_series(received.map(|point| Circle::new(point, 2, BLUE.filled())))
        .map_err(|e| PlotError::Drawing(e.to_string()))?
        .label("RTT")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

    let lost = trace
        .records()
        .iter()
        .filter(|r| r.is_lost())
        .map(|r| r.sequence_number as f64);
    chart
        .draw_series(lost.map(|x| Cross::new((x, 0.0), 4, RED.stroke_width(2))))
        .map_err(|e| PlotError::Drawing(e.to_string()))?
        .label(format!("Lost ({})", summary.loss.lost))
        .legend(|(x, y)| Cross::new((x + 10, y), 4, RED.stroke_width(2)));

    if let Some(rtt) = &summary.rtt {
        chart
            .draw_series(LineSeries::new(
                [(0.0, rtt.mean_ms), (x_max, rtt.mean_ms)],
                GREEN.stroke_width(2),
            ))
            .map_err(|e| PlotError::Drawing(e.to_string()))?
            .label(format!("Mean RTT ({:.2} ms)", rtt.mean_ms))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN.stroke_width(2)));
    }

    if text == Text::Shown {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    Ok(())
}

/// One box per bin of `bin_size` consecutive packets, plus the median of the whole trace
pub fn render_boxplot(
    trace: &Trace,
    summary: &TraceSummary,
    bin_size: u64,
    output_path: &Path,
    dimensions: Dimensions,
) -> Result<()> {
    draw_boxplot(trace, summary, bin_size, output_path, dimensions, Text::Shown)
}

fn draw_boxplot(
    trace: &Trace,
    summary: &TraceSummary,
    bin_size: u64,
    output_path: &Path,
    dimensions: Dimensions,
    text: Text,
) -> Result<()> {
    let max_rtt_ms = require_rtts(trace)?;
    let bins = binned_box_stats(trace, bin_size);
    let boxes: Vec<_> = bins
        .iter()
        .enumerate()
        .filter_map(|(i, bin)| Some((i as f64, bin.stats.as_ref()?)))
        .collect();

    let x_range = -0.5..(bins.len() as f64 - 0.5);
    let y_max = rtt_axis_max(max_rtt_ms);

    let root = BitMapBackend::new(output_path, (dimensions.width, dimensions.height))
        .into_drawing_area();
    let mut chart = build_chart(
        &root,
        format!("RTT Distribution per {bin_size} Packets"),
        text,
        x_range.clone(),
        0.0..y_max,
    )?;

    let label_first_packet = |x: &f64| format!("{}", x.round().max(0.0) as u64 * bin_size);
    let mut mesh = chart.configure_mesh();
    match text {
        Text::Shown => mesh
            .x_desc("First packet of the bin")
            .y_desc("RTT (ms)")
            .x_labels(bins.len().clamp(2, 20))
            .x_label_formatter(&label_first_packet),
        Text::Hidden => mesh.x_labels(0).y_labels(0),
    };
    mesh.draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    chart
        .draw_series(boxes.iter().map(|(x, stats)| {
            Rectangle::new(
                [(x - BOX_HALF_WIDTH, stats.q1), (x + BOX_HALF_WIDTH, stats.q3)],
                BLUE.mix(0.3).filled(),
            )
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    // Box outlines, whiskers and their caps
    chart
        .draw_series(boxes.iter().flat_map(|&(x, stats)| {
            let (left, right) = (x - BOX_HALF_WIDTH, x + BOX_HALF_WIDTH);
            let cap = BOX_HALF_WIDTH / 2.0;
            [
                vec![
                    (left, stats.q1),
                    (right, stats.q1),
                    (right, stats.q3),
                    (left, stats.q3),
                    (left, stats.q1),
                ],
                vec![(x, stats.lower_whisker), (x, stats.q1)],
                vec![(x, stats.q3), (x, stats.upper_whisker)],
                vec![(x - cap, stats.lower_whisker), (x + cap, stats.lower_whisker)],
                vec![(x - cap, stats.upper_whisker), (x + cap, stats.upper_whisker)],
            ]
            .map(|points| PathElement::new(points, BLUE.stroke_width(1)))
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    chart
        .draw_series(boxes.iter().map(|&(x, stats)| {
            PathElement::new(
                vec![(x - BOX_HALF_WIDTH, stats.median), (x + BOX_HALF_WIDTH, stats.median)],
                BLACK.stroke_width(2),
            )
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    chart
        .draw_series(boxes.iter().flat_map(|&(x, stats)| {
            stats
                .outliers
                .iter()
                .map(move |&rtt| Circle::new((x, rtt), 2, RED.filled()))
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    if let Some(rtt) = &summary.rtt {
        chart
            .draw_series(LineSeries::new(
                [(x_range.start, rtt.median_ms), (x_range.end, rtt.median_ms)],
                GREEN.stroke_width(1),
            ))
            .map_err(|e| PlotError::Drawing(e.to_string()))?
            .label(format!("Overall median ({:.2} ms)", rtt.median_ms))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN.stroke_width(1)));

        if text == Text::Shown {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(|e| PlotError::Drawing(e.to_string()))?;
        }
    }

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    Ok(())
}

/// Empirical cumulative distribution of the received RTTs
pub fn render_cdf(trace: &Trace, output_path: &Path, dimensions: Dimensions) -> Result<()> {
    draw_cdf(trace, output_path, dimensions, Text::Shown)
}

fn draw_cdf(trace: &Trace, output_path: &Path, dimensions: Dimensions, text: Text) -> Result<()> {
    let cdf = empirical_cdf(trace);
    let (Some(&(x_min, _)), Some(&(highest_rtt, _))) = (cdf.first(), cdf.last()) else {
        return Err(PlotError::InvalidData(
            "the trace contains no RTT samples".to_string(),
        ));
    };

    let x_max = if highest_rtt > x_min {
        highest_rtt
    } else {
        x_min + 1.0
    };

    let root = BitMapBackend::new(output_path, (dimensions.width, dimensions.height))
        .into_drawing_area();
    let mut chart = build_chart(
        &root,
        "Empirical CDF of the Round Trip Time".to_string(),
        text,
        x_min..x_max,
        0.0..1.0,
    )?;

    let mut mesh = chart.configure_mesh();
    match text {
        Text::Shown => mesh.x_desc("RTT (ms)").y_desc("Cumulative probability"),
        Text::Hidden => mesh.x_labels(0).y_labels(0),
    };
    mesh.draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(cdf, BLUE.stroke_width(2)))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use trace_analysis::stats::summarize;
    use trace_analysis::{LoadOptions, read_trace};

    const DIMENSIONS: Dimensions = Dimensions {
        width: 800,
        height: 600,
    };

    fn load(csv: &str) -> Trace {
        read_trace(csv.as_bytes(), &LoadOptions::default())
            .unwrap()
            .trace
    }

    #[test]
    fn test_traces_without_rtts_are_rejected() {
        let output_path = std::env::temp_dir().join("ping_analyzer_rejected.png");
        let _ = fs::remove_file(&output_path);

        for trace in [Trace::default(), load("0,,128\n1,,128\n")] {
            let summary = summarize(&trace, None);

            let result = render_scatter(&trace, &summary, &output_path, DIMENSIONS);
            assert!(matches!(result, Err(PlotError::InvalidData(_))));
            let result = render_boxplot(&trace, &summary, 60, &output_path, DIMENSIONS);
            assert!(matches!(result, Err(PlotError::InvalidData(_))));
            let result = render_cdf(&trace, &output_path, DIMENSIONS);
            assert!(matches!(result, Err(PlotError::InvalidData(_))));
        }

        assert!(!output_path.exists());
    }

    #[test]
    fn test_rtt_axis_max() {
        assert_eq!(rtt_axis_max(0.0), 1.0);
        assert!((rtt_axis_max(10.0) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_plots_without_text() {
        let dir = std::env::temp_dir().join("ping_analyzer_plots_without_text");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let trace = load("0,10.0,128\n1,12.0,128\n3,11.0,128\n4,15.0,128\n5,40.0,128\n");
        let summary = summarize(&trace, None);

        draw_scatter(&trace, &summary, &dir.join("scatter.png"), DIMENSIONS, Text::Hidden)
            .unwrap();
        draw_boxplot(&trace, &summary, 2, &dir.join("boxplot.png"), DIMENSIONS, Text::Hidden)
            .unwrap();
        draw_cdf(&trace, &dir.join("cdf.png"), DIMENSIONS, Text::Hidden).unwrap();

        for name in ["scatter.png", "boxplot.png", "cdf.png"] {
            let png = fs::read(dir.join(name)).unwrap();
            assert!(png.starts_with(b"\x89PNG"), "{name} is not a PNG file");
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    #[ignore = "Font rendering not available in test environment"]
    fn test_render_all_plots() {
        let dir = std::env::temp_dir().join("ping_analyzer_plots");
        fs::create_dir_all(&dir).unwrap();

        let trace = load("0,10.0,128\n1,12.0,128\n3,11.0,128\n4,15.0,128\n5,40.0,128\n");
        let summary = summarize(&trace, None);

        render_scatter(&trace, &summary, &dir.join("scatter.png"), DIMENSIONS).unwrap();
        render_boxplot(&trace, &summary, 2, &dir.join("boxplot.png"), DIMENSIONS).unwrap();
        render_cdf(&trace, &dir.join("cdf.png"), DIMENSIONS).unwrap();

        for name in ["scatter.png", "boxplot.png", "cdf.png"] {
            assert!(dir.join(name).exists());
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
