//! Error report overlay.
//!
//! The render entry points never fail: the capture loop calls them for every
//! frame of a live stream, so any computation or drawing fault is logged and
//! replaced by an alert-coloured fallback drawn on the same frame.

use tracing::{debug, error};

use crate::calculator::{calculate_2d_error, calculate_error};
use crate::canvas::{Canvas, Color, Point, Stroke, TextStyle};
use crate::error::Result;
use crate::models::{Labels, Measurement2DErrors, Sample2D, Severity};

const SCALAR_STYLE: TextStyle = TextStyle::new(0.6, Color::YELLOW);
const SCALAR_ALERT_STYLE: TextStyle = TextStyle::new(0.6, Color::RED);
const TITLE_STYLE: TextStyle = TextStyle::new(0.5, Color::WHITE);
const BODY_STYLE: TextStyle = TextStyle::new(0.45, Color::YELLOW);
const NOTICE_STYLE: TextStyle = TextStyle::new(0.45, Color::BLUE);

const BOX_WIDTH: i32 = 280;
const BOX_HEIGHT: i32 = 110;
const FALLBACK_WIDTH: i32 = 250;
const FALLBACK_HEIGHT: i32 = 50;
const PAD_LEFT: i32 = 5;
const PAD_TOP: i32 = 25;

/// Renderer capability shared by the plain renderer and its decorators.
pub trait ErrorOverlay {
    /// Four-line report (expected, measured, absolute, relative) for one scalar.
    fn draw_error_box(&mut self, frame: &mut dyn Canvas, origin: Point, expected: f64, measured: f64);

    /// Severity-coloured length × width report panel anchored at `origin`.
    fn draw_2d_error_box(
        &mut self,
        frame: &mut dyn Canvas,
        origin: Point,
        sample: &Sample2D,
        labels: &Labels,
    );
}

impl<T: ErrorOverlay + ?Sized> ErrorOverlay for &mut T {
    fn draw_error_box(&mut self, frame: &mut dyn Canvas, origin: Point, expected: f64, measured: f64) {
        (**self).draw_error_box(frame, origin, expected, measured)
    }

    fn draw_2d_error_box(
        &mut self,
        frame: &mut dyn Canvas,
        origin: Point,
        sample: &Sample2D,
        labels: &Labels,
    ) {
        (**self).draw_2d_error_box(frame, origin, sample, labels)
    }
}

/// Panel colour for a severity band.
pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Low => Color::GREEN,
        Severity::Medium => Color::ORANGE,
        Severity::High => Color::RED,
    }
}

/// Fewer decimals as the magnitude grows, keeping the panel text narrow.
pub fn format_value(value: f64) -> String {
    if value.abs() > 999.0 {
        format!("{value:.0}")
    } else if value.abs() > 99.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    }
}

/// The stateless overlay renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorBoxRenderer;

impl ErrorBoxRenderer {
    pub fn new() -> Self {
        Self
    }

    fn try_draw_error_box(
        &self,
        frame: &mut dyn Canvas,
        origin: Point,
        expected: f64,
        measured: f64,
    ) -> Result<()> {
        let errors = calculate_error(expected, measured);
        let lines = [
            format!("Expected: {expected:.2}"),
            format!("Measured: {measured:.2}"),
            format!("Abs Error: {:.2}", errors.absolute_error),
            format!("Rel Error: {:.2}%", errors.relative_error),
        ];
        for (i, line) in lines.iter().enumerate() {
            frame.put_text(line, origin.offset(0, 20 * i as i32), SCALAR_STYLE)?;
        }
        Ok(())
    }

    fn try_draw_2d_error_box(
        &self,
        frame: &mut dyn Canvas,
        origin: Point,
        sample: &Sample2D,
        labels: &Labels,
    ) -> Result<Measurement2DErrors> {
        let [expected_length, measured_length, expected_width, measured_width] = sample.validate()?;
        debug!(
            "Drawing error box with: {expected_length:.2}×{expected_width:.2} vs {measured_length:.2}×{measured_width:.2}"
        );

        let errors = calculate_2d_error(expected_length, measured_length, expected_width, measured_width);
        let severity = Severity::from_mean_relative_error(errors.mean_relative_error);

        let top_left = origin.offset(-PAD_LEFT, -PAD_TOP);
        let bottom_right = origin.offset(BOX_WIDTH, BOX_HEIGHT);
        frame.rectangle(top_left, bottom_right, Color::PANEL, Stroke::Filled)?;
        frame.rectangle(top_left, bottom_right, severity_color(severity), Stroke::Outline(2))?;

        frame.put_text("Measurement Error Analysis", origin, TITLE_STYLE)?;

        let Labels { expected, measured } = labels;
        let rows = [
            (
                format!(
                    "Length: {expected}={}, {measured}={}",
                    format_value(expected_length),
                    format_value(measured_length)
                ),
                format!(
                    "Error: {} ({}%)",
                    format_value(errors.length.absolute_error),
                    format_value(errors.length.relative_error)
                ),
            ),
            (
                format!(
                    "Width: {expected}={}, {measured}={}",
                    format_value(expected_width),
                    format_value(measured_width)
                ),
                format!(
                    "Error: {} ({}%)",
                    format_value(errors.width.absolute_error),
                    format_value(errors.width.relative_error)
                ),
            ),
            (
                format!("Area Error: {}%", format_value(errors.area.relative_error)),
                format!("Mean Error: {}%", format_value(errors.mean_relative_error)),
            ),
        ];

        let mut y_offset = 20;
        for (first, second) in &rows {
            frame.put_text(first, origin.offset(0, y_offset), BODY_STYLE)?;
            frame.put_text(second, origin.offset(0, y_offset + 15), BODY_STYLE)?;
            y_offset += 30;
        }

        Ok(errors)
    }

    fn draw_2d_fallback(&self, frame: &mut dyn Canvas, origin: Point, sample: &Sample2D) {
        let header = frame
            .rectangle(
                origin.offset(-PAD_LEFT, -PAD_TOP),
                origin.offset(FALLBACK_WIDTH, FALLBACK_HEIGHT),
                Color::RED,
                Stroke::Outline(2),
            )
            .and_then(|_| frame.put_text("Error calculation failed", origin, TITLE_STYLE));
        if let Err(e) = header {
            error!("Failed to draw error panel fallback: {}", e);
        }

        if let Err(e) = draw_raw_values(frame, origin, sample) {
            debug!("Raw values unavailable for fallback: {}", e);
            if let Err(e) = frame.put_text("Invalid measurement values", origin.offset(0, 20), NOTICE_STYLE) {
                error!("Failed to draw invalid-values notice: {}", e);
            }
        }
    }
}

fn draw_raw_values(frame: &mut dyn Canvas, origin: Point, sample: &Sample2D) -> Result<()> {
    let [expected_length, measured_length, expected_width, measured_width] = sample.validate()?;
    frame.put_text(
        &format!("Expected: {expected_length:.1}×{expected_width:.1}"),
        origin.offset(0, 20),
        BODY_STYLE,
    )?;
    frame.put_text(
        &format!("Measured: {measured_length:.1}×{measured_width:.1}"),
        origin.offset(0, 40),
        BODY_STYLE,
    )
}

impl ErrorOverlay for ErrorBoxRenderer {
    fn draw_error_box(&mut self, frame: &mut dyn Canvas, origin: Point, expected: f64, measured: f64) {
        if let Err(e) = self.try_draw_error_box(frame, origin, expected, measured) {
            error!("Error in draw_error_box: {}", e);
            if let Err(e) = frame.put_text("Error calc failed", origin, SCALAR_ALERT_STYLE) {
                error!("Failed to draw error indicator: {}", e);
            }
        }
    }

    fn draw_2d_error_box(
        &mut self,
        frame: &mut dyn Canvas,
        origin: Point,
        sample: &Sample2D,
        labels: &Labels,
    ) {
        if let Err(e) = self.try_draw_2d_error_box(frame, origin, sample, labels) {
            error!(x = origin.x, y = origin.y, "Error calculation failed: {}", e);
            self.draw_2d_fallback(frame, origin, sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawOp, Frame};
    use crate::error::MeasureLogError;

    /// Records like `Frame` but refuses every operation after the first `budget`.
    struct FlakyCanvas {
        inner: Frame,
        budget: usize,
    }

    impl FlakyCanvas {
        fn new(budget: usize) -> Self {
            Self {
                inner: Frame::new(640, 480),
                budget,
            }
        }

        fn spend(&mut self) -> Result<()> {
            if self.budget == 0 {
                return Err(MeasureLogError::Render("primitive unavailable".into()));
            }
            self.budget -= 1;
            Ok(())
        }
    }

    impl Canvas for FlakyCanvas {
        fn put_text(&mut self, text: &str, origin: Point, style: TextStyle) -> Result<()> {
            self.spend()?;
            self.inner.put_text(text, origin, style)
        }

        fn rectangle(&mut self, a: Point, b: Point, color: Color, stroke: Stroke) -> Result<()> {
            self.spend()?;
            self.inner.rectangle(a, b, color, stroke)
        }
    }

    /// Refuses any text starting with the given prefix.
    struct FailOnText<'a>(&'a str, Frame);

    impl Canvas for FailOnText<'_> {
        fn put_text(&mut self, text: &str, origin: Point, style: TextStyle) -> Result<()> {
            if text.starts_with(self.0) {
                return Err(MeasureLogError::Render("glyph cache full".into()));
            }
            self.1.put_text(text, origin, style)
        }

        fn rectangle(&mut self, a: Point, b: Point, color: Color, stroke: Stroke) -> Result<()> {
            self.1.rectangle(a, b, color, stroke)
        }
    }

    fn border_color(frame: &Frame) -> Option<Color> {
        frame.ops().iter().find_map(|op| match op {
            DrawOp::Rect {
                color,
                stroke: Stroke::Outline(_),
                ..
            } => Some(*color),
            _ => None,
        })
    }

    #[test]
    fn test_format_value_precision_bands() {
        assert_eq!(format_value(45.0), "45.00");
        assert_eq!(format_value(99.0), "99.00");
        assert_eq!(format_value(145.25), "145.2");
        assert_eq!(format_value(999.0), "999.0");
        assert_eq!(format_value(2500.4), "2500");
        assert_eq!(format_value(-150.0), "-150.0");
    }

    #[test]
    fn test_scalar_box_draws_four_lines() {
        let mut frame = Frame::new(640, 480);
        ErrorBoxRenderer::new().draw_error_box(&mut frame, Point::new(10, 30), 50.0, 45.0);

        let texts: Vec<&str> = frame.texts().collect();
        assert_eq!(
            texts,
            vec!["Expected: 50.00", "Measured: 45.00", "Abs Error: 5.00", "Rel Error: 10.00%"]
        );
        let origins: Vec<Point> = frame
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { origin, .. } => Some(*origin),
                _ => None,
            })
            .collect();
        assert_eq!(origins[0], Point::new(10, 30));
        assert_eq!(origins[3], Point::new(10, 90));
    }

    #[test]
    fn test_scalar_box_failure_draws_alert() {
        let mut canvas = FailOnText("Rel", Frame::new(640, 480));
        ErrorBoxRenderer::new().draw_error_box(&mut canvas, Point::new(0, 20), 50.0, 45.0);

        let texts: Vec<(&str, Color)> = canvas
            .1
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, style, .. } => Some((text.as_str(), style.color)),
                DrawOp::Rect { .. } => None,
            })
            .collect();
        assert_eq!(
            texts,
            vec![
                ("Expected: 50.00", Color::YELLOW),
                ("Measured: 45.00", Color::YELLOW),
                ("Abs Error: 5.00", Color::YELLOW),
                ("Error calc failed", Color::RED),
            ]
        );
        match canvas.1.ops().last() {
            Some(DrawOp::Text { origin, .. }) => assert_eq!(*origin, Point::new(0, 20)),
            other => panic!("expected alert text, got {other:?}"),
        }
    }

    #[test]
    fn test_scalar_box_survives_exhausted_canvas() {
        let mut canvas = FlakyCanvas::new(2);
        ErrorBoxRenderer::new().draw_error_box(&mut canvas, Point::new(0, 20), 50.0, 45.0);
        // Neither the fourth line nor the alert fit, and nothing escapes.
        assert_eq!(canvas.inner.ops().len(), 2);
    }

    #[test]
    fn test_2d_box_report_text() {
        let mut frame = Frame::new(640, 480);
        let sample = Sample2D::numeric(50.0, 45.0, 50.0, 48.0);
        ErrorBoxRenderer::new().draw_2d_error_box(&mut frame, Point::new(20, 50), &sample, &Labels::default());

        let texts: Vec<&str> = frame.texts().collect();
        assert_eq!(
            texts,
            vec![
                "Measurement Error Analysis",
                "Length: Expected=50.00, Measured=45.00",
                "Error: 5.00 (10.00%)",
                "Width: Expected=50.00, Measured=48.00",
                "Error: 2.00 (4.00%)",
                "Area Error: 13.60%",
                "Mean Error: 7.00%",
            ]
        );
        assert_eq!(border_color(&frame), Some(Color::ORANGE));
        match &frame.ops()[0] {
            DrawOp::Rect {
                top_left,
                bottom_right,
                color,
                stroke,
            } => {
                assert_eq!(*top_left, Point::new(15, 25));
                assert_eq!(*bottom_right, Point::new(300, 160));
                assert_eq!(*color, Color::PANEL);
                assert_eq!(*stroke, Stroke::Filled);
            }
            other => panic!("expected background panel, got {other:?}"),
        }
    }

    #[test]
    fn test_2d_box_border_follows_severity() {
        let cases = [
            (Sample2D::numeric(50.0, 49.0, 50.0, 49.0), Color::GREEN),
            (Sample2D::numeric(50.0, 45.0, 50.0, 48.0), Color::ORANGE),
            (Sample2D::numeric(145.0, 120.0, 80.0, 70.0), Color::RED),
        ];
        for (sample, expected) in cases {
            let mut frame = Frame::new(640, 480);
            ErrorBoxRenderer.draw_2d_error_box(&mut frame, Point::new(20, 50), &sample, &Labels::default());
            assert_eq!(border_color(&frame), Some(expected), "{sample:?}");
        }
    }

    #[test]
    fn test_2d_box_custom_labels_and_large_values() {
        let mut frame = Frame::new(640, 480);
        let sample = Sample2D::numeric(1450.0, 1300.0, 145.0, 130.0);
        let labels = Labels::new("Ref", "Cam");
        ErrorBoxRenderer.draw_2d_error_box(&mut frame, Point::new(20, 50), &sample, &labels);

        assert!(frame.contains_text("Length: Ref=1450, Cam=1300"));
        assert!(frame.contains_text("Width: Ref=145.0, Cam=130.0"));
        assert!(frame.contains_text("Error: 150.0 (10.34%)"));
    }

    #[test]
    fn test_2d_box_non_numeric_input_falls_back() {
        let mut frame = Frame::new(640, 480);
        let sample = Sample2D::new("fifty", 45.0, 50.0, true);
        ErrorBoxRenderer.draw_2d_error_box(&mut frame, Point::new(20, 50), &sample, &Labels::default());

        assert!(frame.contains_text("Error calculation failed"));
        assert!(frame.contains_text("Invalid measurement values"));
        assert!(!frame.contains_text("Measurement Error Analysis"));
        assert_eq!(border_color(&frame), Some(Color::RED));
    }

    #[test]
    fn test_2d_box_non_finite_input_falls_back() {
        let mut frame = Frame::new(640, 480);
        let sample = Sample2D::numeric(f64::NAN, 45.0, 50.0, 48.0);
        ErrorBoxRenderer.draw_2d_error_box(&mut frame, Point::new(20, 50), &sample, &Labels::default());
        assert!(frame.contains_text("Invalid measurement values"));
    }

    #[test]
    fn test_2d_box_draw_failure_shows_raw_values() {
        // Background and border succeed, title fails.
        let mut canvas = FlakyCanvas::new(2);
        let sample = Sample2D::numeric(50.0, 45.0, 20.0, 18.0);
        ErrorBoxRenderer.draw_2d_error_box(&mut canvas, Point::new(20, 50), &sample, &Labels::default());
        assert_eq!(canvas.inner.ops().len(), 2);

        let mut canvas = FlakyCanvas::new(6);
        let mut frame_ops = Vec::new();
        ErrorBoxRenderer.draw_2d_error_box(&mut canvas, Point::new(20, 50), &sample, &Labels::default());
        frame_ops.extend(canvas.inner.texts().map(str::to_string));
        assert_eq!(
            frame_ops,
            vec![
                "Measurement Error Analysis",
                "Length: Expected=50.00, Measured=45.00",
                "Error: 5.00 (10.00%)",
                "Width: Expected=20.00, Measured=18.00",
            ]
        );
    }

    #[test]
    fn test_fallback_after_mid_panel_failure() {
        let mut canvas = FailOnText("Area", Frame::new(640, 480));
        let sample = Sample2D::numeric(50.0, 45.0, 20.0, 18.0);
        ErrorBoxRenderer.draw_2d_error_box(&mut canvas, Point::new(20, 50), &sample, &Labels::default());

        let frame = &canvas.1;
        assert!(frame.contains_text("Error calculation failed"));
        assert!(frame.contains_text("Expected: 50.0×20.0"));
        assert!(frame.contains_text("Measured: 45.0×18.0"));
        assert!(!frame.contains_text("Invalid measurement values"));
    }
}
