use crate::error::Error;
use crate::surface::{DrawContext, DrawOp, Surface, SurfaceMetrics};
use std::io;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlElement};

const DEFAULT_FONT: &str = "16px Orbitron, monospace";

pub(crate) fn js_error(err: JsValue) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{:?}", err))
}

/// Draws frames onto a `<canvas>` through its 2d context.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    dash: JsValue,
}

impl CanvasSurface {
    /// Fails when the element is missing or has no 2d context.
    pub fn new(canvas_id: &str) -> Result<Self, Error> {
        let missing = |what: &str| Error::MissingSurface(format!("{} ({})", what, canvas_id));

        let window = web_sys::window().ok_or_else(|| missing("no window"))?;
        let document = window.document().ok_or_else(|| missing("no document"))?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| missing("canvas not found"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| missing("element is not a canvas"))?;

        let context = canvas
            .get_context("2d")
            .map_err(|_| missing("get_context failed"))?
            .ok_or_else(|| missing("no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| missing("unexpected context type"))?;

        let dash = js_sys::Array::of2(&JsValue::from_f64(4.0), &JsValue::from_f64(4.0)).into();

        Ok(Self {
            canvas,
            context,
            dash,
        })
    }
}

impl Surface for CanvasSurface {
    fn resize(&mut self, metrics: &SurfaceMetrics) -> io::Result<()> {
        self.canvas.set_width(metrics.canvas_width);
        self.canvas.set_height(metrics.canvas_height);

        let element: &HtmlElement = self.canvas.unchecked_ref();
        element
            .style()
            .set_property("width", &format!("{}px", metrics.screen_width))
            .map_err(js_error)?;
        element
            .style()
            .set_property("height", &format!("{}px", metrics.screen_height))
            .map_err(js_error)?;

        // Resizing the canvas resets the context, so scale again.
        self.context
            .set_transform(metrics.scale, 0.0, 0.0, metrics.scale, 0.0, 0.0)
            .map_err(js_error)?;
        self.context.set_font(DEFAULT_FONT);
        self.context.set_text_baseline("top");

        Ok(())
    }

    fn present(&mut self, frame: &DrawContext) -> io::Result<()> {
        let metrics = frame.metrics();
        self.context
            .clear_rect(0.0, 0.0, metrics.screen_width, metrics.screen_height);

        for op in frame.ops() {
            match op {
                DrawOp::FillRect { rect, color } => {
                    self.context.set_fill_style_str(&color.to_css());
                    self.context.fill_rect(rect.x, rect.y, rect.width, rect.height);
                }
                DrawOp::StrokeRect { rect, color } => {
                    self.context.set_line_dash(&self.dash).map_err(js_error)?;
                    self.context.set_stroke_style_str(&color.to_css());
                    self.context.stroke_rect(rect.x, rect.y, rect.width, rect.height);
                }
                DrawOp::Text { x, y, text, color } => {
                    self.context.set_fill_style_str(&color.to_css());
                    self.context.fill_text(text, *x, *y).map_err(js_error)?;
                }
            }
        }
        Ok(())
    }
}
