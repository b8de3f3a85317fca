use crate::grid::Viewport;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xFF, 0xFF, 0xFF);
    pub const GRID: Rgb = Rgb(0x66, 0x66, 0x66);
    pub const SNAKE: Rgb = Rgb(0xFF, 0x00, 0x00);
    pub const SNAKE_HEAD: Rgb = Rgb(0xFF, 0x55, 0x55);
    pub const CRASH: Rgb = Rgb(0xFF, 0x55, 0x55);

    pub fn to_css(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn square(x: f64, y: f64, size: f64) -> Self {
        Self::new(x, y, size, size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect { rect: Rect, color: Rgb },
    /// Dashed outline.
    StrokeRect { rect: Rect, color: Rgb },
    Text { x: f64, y: f64, text: String, color: Rgb },
}

/// Logical and device-scaled dimensions of the shared surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    pub screen_width: f64,
    pub screen_height: f64,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub scale: f64,
}

impl SurfaceMetrics {
    pub fn new(viewport: Viewport, device_pixel_ratio: f64) -> Self {
        let scale = if device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            screen_width: viewport.width.max(0.0),
            screen_height: viewport.height.max(0.0),
            canvas_width: (viewport.width.max(0.0) * scale).round() as u32,
            canvas_height: (viewport.height.max(0.0) * scale).round() as u32,
            scale,
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.screen_width, self.screen_height)
    }
}

/// The context every task draws through. It collects a display list for the
/// current frame which the owning provider hands to a [`Surface`].
#[derive(Debug, Clone)]
pub struct DrawContext {
    metrics: SurfaceMetrics,
    page_hidden: bool,
    ops: Vec<DrawOp>,
}

impl DrawContext {
    pub fn new(metrics: SurfaceMetrics) -> Self {
        Self {
            metrics,
            page_hidden: false,
            ops: Vec::new(),
        }
    }

    pub fn metrics(&self) -> &SurfaceMetrics {
        &self.metrics
    }

    pub fn set_metrics(&mut self, metrics: SurfaceMetrics) {
        self.metrics = metrics;
    }

    pub fn page_hidden(&self) -> bool {
        self.page_hidden
    }

    pub fn set_page_hidden(&mut self, hidden: bool) {
        self.page_hidden = hidden;
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    pub fn stroke_rect(&mut self, rect: Rect, color: Rgb) {
        self.ops.push(DrawOp::StrokeRect { rect, color });
    }

    pub fn fill_text(&mut self, x: f64, y: f64, text: impl Into<String>, color: Rgb) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            text: text.into(),
            color,
        });
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Hand over the recorded ops, leaving the list empty.
    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn extend_ops<'a>(&mut self, ops: impl IntoIterator<Item = &'a DrawOp>) {
        self.ops.extend(ops.into_iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Abstracts the drawing backend (terminal, canvas, ...).
pub trait Surface {
    /// Apply new dimensions; called once at construction and on every resize.
    fn resize(&mut self, metrics: &SurfaceMetrics) -> io::Result<()>;

    /// Clear the backend and draw the frame's display list.
    fn present(&mut self, frame: &DrawContext) -> io::Result<()>;
}

/// Keeps every presented frame. Useful headless and in tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub frames: Vec<Vec<DrawOp>>,
    pub metrics: Option<SurfaceMetrics>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, metrics: &SurfaceMetrics) -> io::Result<()> {
        self.metrics = Some(*metrics);
        Ok(())
    }

    fn present(&mut self, frame: &DrawContext) -> io::Result<()> {
        self.frames.push(frame.ops().to_vec());
        Ok(())
    }
}
