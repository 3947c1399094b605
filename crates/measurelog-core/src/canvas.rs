//! Drawing primitives the overlay renders through.
//!
//! [`Canvas`] is the seam to whatever actually paints pixels. [`Frame`] is the
//! in-process implementation: it keeps an ordered display list of the text and
//! rectangle operations issued for one video frame.

use crate::error::Result;

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const ORANGE: Color = Color::rgb(255, 165, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const PANEL: Color = Color::rgb(40, 40, 40);
}

/// A pixel position; may lie outside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Font scale relative to the base glyph height
    pub scale: f32,
    pub color: Color,
    pub thickness: u32,
}

impl TextStyle {
    pub const fn new(scale: f32, color: Color) -> Self {
        Self {
            scale,
            color,
            thickness: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Filled,
    Outline(u32),
}

/// Text and rectangle primitives on a mutable frame.
pub trait Canvas {
    /// Draw `text` with its baseline-left corner at `origin`.
    fn put_text(&mut self, text: &str, origin: Point, style: TextStyle) -> Result<()>;

    fn rectangle(
        &mut self,
        top_left: Point,
        bottom_right: Point,
        color: Color,
        stroke: Stroke,
    ) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        text: String,
        origin: Point,
        style: TextStyle,
    },
    Rect {
        top_left: Point,
        bottom_right: Point,
        color: Color,
        stroke: Stroke,
    },
}

/// One video frame's display list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn is_blank(&self) -> bool {
        self.ops.is_empty()
    }

    /// Text of every text operation, in draw order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Rect { .. } => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t.contains(needle))
    }
}

impl Canvas for Frame {
    fn put_text(&mut self, text: &str, origin: Point, style: TextStyle) -> Result<()> {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            origin,
            style,
        });
        Ok(())
    }

    fn rectangle(
        &mut self,
        top_left: Point,
        bottom_right: Point,
        color: Color,
        stroke: Stroke,
    ) -> Result<()> {
        self.ops.push(DrawOp::Rect {
            top_left,
            bottom_right,
            color,
            stroke,
        });
        Ok(())
    }
}
