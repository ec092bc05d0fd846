use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use super::glyphs;
use crate::surface::{SceneGraph, SceneNode, VisualClass, VisualMark};

const CLEAR_COLOR: [u8; 4] = [22, 24, 30, 255];
const THING_COLOR: [u8; 4] = [120, 128, 146, 255];
const BUTTON_COLOR: [u8; 4] = [214, 200, 150, 255];
const REPRESENTATIVE_COLOR: [u8; 4] = [96, 150, 196, 255];
const BALL_COLOR: [u8; 4] = [224, 112, 86, 255];
const EDGE_COLOR: [u8; 4] = [12, 12, 16, 255];
const HELD_COLOR: [u8; 4] = [255, 210, 70, 255];
const STUCK_COLOR: [u8; 4] = [80, 220, 255, 255];
const LABEL_COLOR: [u8; 4] = [16, 16, 20, 255];
const LABEL_PAD_PX: i32 = 6;
const BASE_TEXT_SCALE: f64 = 2.0;
const MIN_LABEL_SCALE: f64 = 0.4;

/// Owns the pixel buffer and paints a [`SceneGraph`] into it each frame.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub fn render(&mut self, graph: &SceneGraph) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        paint_scene(self.pixels.frame_mut(), self.width, self.height, graph);
        self.pixels.render()
    }
}

pub(crate) fn paint_scene(frame: &mut [u8], width: u32, height: u32, graph: &SceneGraph) {
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&CLEAR_COLOR);
    }
    for (_, node) in graph.draw_order() {
        paint_node(frame, width, height, node);
    }
}

fn fill_color(class: VisualClass) -> [u8; 4] {
    match class {
        VisualClass::Thing => THING_COLOR,
        VisualClass::Button => BUTTON_COLOR,
        VisualClass::Representative => REPRESENTATIVE_COLOR,
        VisualClass::Ball => BALL_COLOR,
    }
}

fn paint_node(frame: &mut [u8], width: u32, height: u32, node: &SceneNode) {
    let rect = node.screen_rect();
    if rect.is_empty() {
        return;
    }
    let top_left = rect.top_left();
    let x = top_left.x.round() as i32;
    let y = top_left.y.round() as i32;
    let w = rect.dimensions.x.round().max(1.0) as i32;
    let h = rect.dimensions.y.round().max(1.0) as i32;
    let color = fill_color(node.spec.class);

    if node.spec.class == VisualClass::Ball {
        fill_ellipse(frame, width, height, x, y, w, h, color);
    } else {
        fill_rect(frame, width, height, x, y, w, h, color);
        outline_rect(frame, width, height, x, y, w, h, EDGE_COLOR);
    }

    if node.has_mark(VisualMark::Held) {
        outline_rect(frame, width, height, x - 2, y - 2, w + 4, h + 4, HELD_COLOR);
    } else if node.has_mark(VisualMark::Stuck) {
        outline_rect(frame, width, height, x - 1, y - 1, w + 2, h + 2, STUCK_COLOR);
    }

    if node.scale < MIN_LABEL_SCALE || node.spec.label.is_empty() {
        return;
    }
    let scale = (BASE_TEXT_SCALE * node.scale).round().max(1.0) as i32;
    let text_height = glyphs::GLYPH_HEIGHT * scale;
    let label_x = x + (LABEL_PAD_PX as f64 * node.scale).round() as i32;
    let label_y = if node.spec.class == VisualClass::Button {
        y + (h - text_height) / 2
    } else {
        y + (LABEL_PAD_PX as f64 * node.scale).round() as i32
    };
    let room = w - (label_x - x) * 2;
    if glyphs::text_width(&node.spec.label, scale) > room + glyphs::advance(scale) {
        return;
    }
    glyphs::draw_text(
        frame,
        width,
        height,
        label_x,
        label_y,
        &node.spec.label,
        scale,
        LABEL_COLOR,
    );
}

pub(crate) fn write_pixel_rgba_clipped(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    color: [u8; 4],
) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let offset = (y as usize * width as usize + x as usize) * 4;
    if let Some(pixel) = frame.get_mut(offset..offset + 4) {
        pixel.copy_from_slice(&color);
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    let start_x = x.max(0);
    let start_y = y.max(0);
    let end_x = x.saturating_add(rect_width).min(width as i32);
    let end_y = y.saturating_add(rect_height).min(height as i32);
    for py in start_y..end_y {
        for px in start_x..end_x {
            write_pixel_rgba_clipped(frame, width, height, px, py, color);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn outline_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    if rect_width <= 1 || rect_height <= 1 {
        return;
    }
    fill_rect(frame, width, height, x, y, rect_width, 1, color);
    fill_rect(frame, width, height, x, y + rect_height - 1, rect_width, 1, color);
    fill_rect(frame, width, height, x, y, 1, rect_height, color);
    fill_rect(frame, width, height, x + rect_width - 1, y, 1, rect_height, color);
}

#[allow(clippy::too_many_arguments)]
fn fill_ellipse(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    box_width: i32,
    box_height: i32,
    color: [u8; 4],
) {
    let rx = box_width as f64 / 2.0;
    let ry = box_height as f64 / 2.0;
    let cx = x as f64 + rx;
    let cy = y as f64 + ry;
    for py in y.max(0)..(y + box_height).min(height as i32) {
        for px in x.max(0)..(x + box_width).min(width as i32) {
            let dx = (px as f64 + 0.5 - cx) / rx;
            let dy = (py as f64 + 0.5 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                write_pixel_rgba_clipped(frame, width, height, px, py, color);
            }
        }
    }
}
