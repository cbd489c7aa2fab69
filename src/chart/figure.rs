//! Figure model and raster rendering
//!
//! The sandbox accumulates plotting calls into a `Figure`; rendering draws it
//! into an RGBA pixel buffer and encodes PNG. One figure per attempt, dropped
//! after encoding, so no drawing state survives into later requests.

use crate::error::{AskError, Result};

const MARGIN: u32 = 48;
const AXIS_COLOR: (u8, u8, u8) = (60, 60, 60);
const PALETTE: [(u8, u8, u8); 4] = [
    (31, 119, 180),
    (255, 127, 14),
    (44, 160, 44),
    (214, 39, 40),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Bar,
    Line,
    Scatter,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub kind: SeriesKind,
    /// Category labels for bar series; empty for line/scatter.
    pub labels: Vec<String>,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }

    pub fn push_bar(&mut self, labels: Vec<String>, values: Vec<f64>) {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect();
        self.series.push(Series {
            kind: SeriesKind::Bar,
            labels,
            points,
        });
    }

    pub fn push_xy(&mut self, kind: SeriesKind, xs: Vec<f64>, ys: Vec<f64>) {
        let points = xs.into_iter().zip(ys).collect();
        self.series.push(Series {
            kind,
            labels: Vec::new(),
            points,
        });
    }

    /// Rasterize to an encoded PNG buffer. The canvas must leave room for a
    /// plot area inside the margins.
    pub fn to_png(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Err(AskError::Chart("figure has no data to render".to_string()));
        }
        if width <= 2 * MARGIN || height <= 2 * MARGIN {
            return Err(AskError::Chart(format!(
                "canvas {}x{} is too small to plot",
                width, height
            )));
        }

        let mut canvas = Canvas::new(width, height);
        canvas.fill((255, 255, 255));

        let plot = PlotArea::fit(self, width, height);
        canvas.draw_h_line(MARGIN as i32, (width - MARGIN) as i32, (height - MARGIN) as i32, AXIS_COLOR);
        canvas.draw_v_line(MARGIN as i32, MARGIN as i32, (height - MARGIN) as i32, AXIS_COLOR);

        for (idx, series) in self.series.iter().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];
            match series.kind {
                SeriesKind::Bar => draw_bars(&mut canvas, &plot, series, color),
                SeriesKind::Line => draw_line(&mut canvas, &plot, series, color),
                SeriesKind::Scatter => draw_scatter(&mut canvas, &plot, series, color),
            }
        }

        canvas.encode_png()
    }
}

/// Data-to-pixel mapping for the plot area inside the margins.
struct PlotArea {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl PlotArea {
    fn fit(figure: &Figure, width: u32, height: u32) -> Self {
        let mut min_x = f64::MAX;
        let mut max_x = f64::MIN;
        let mut min_y = f64::MAX;
        let mut max_y = f64::MIN;
        let mut has_bars = false;

        for series in &figure.series {
            has_bars |= series.kind == SeriesKind::Bar;
            for (x, y) in &series.points {
                min_x = min_x.min(*x);
                max_x = max_x.max(*x);
                min_y = min_y.min(*y);
                max_y = max_y.max(*y);
            }
        }
        if has_bars {
            // Bars sit on a zero baseline and need a half-slot on each side.
            min_y = min_y.min(0.0);
            min_x -= 0.5;
            max_x += 0.5;
        }
        if (max_x - min_x).abs() < f64::EPSILON {
            max_x = min_x + 1.0;
        }
        if (max_y - min_y).abs() < f64::EPSILON {
            max_y = min_y + 1.0;
        }

        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            left: MARGIN as f64,
            top: MARGIN as f64,
            width: (width - 2 * MARGIN) as f64,
            height: (height - 2 * MARGIN) as f64,
        }
    }

    fn px(&self, x: f64) -> i32 {
        (self.left + (x - self.min_x) / (self.max_x - self.min_x) * self.width) as i32
    }

    fn py(&self, y: f64) -> i32 {
        (self.top + self.height - (y - self.min_y) / (self.max_y - self.min_y) * self.height)
            as i32
    }
}

fn draw_bars(canvas: &mut Canvas, plot: &PlotArea, series: &Series, color: (u8, u8, u8)) {
    let slot = plot.width / (plot.max_x - plot.min_x);
    let bar_width = (slot * 0.7).max(1.0) as i32;
    let baseline = plot.py(0.0f64.max(plot.min_y));
    for (x, y) in &series.points {
        let cx = plot.px(*x);
        let top = plot.py(*y);
        let (y0, y1) = if top <= baseline {
            (top, baseline)
        } else {
            (baseline, top)
        };
        canvas.fill_rect(cx - bar_width / 2, y0, bar_width, (y1 - y0).max(1), color);
    }
}

fn draw_line(canvas: &mut Canvas, plot: &PlotArea, series: &Series, color: (u8, u8, u8)) {
    for pair in series.points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        canvas.draw_segment(plot.px(x0), plot.py(y0), plot.px(x1), plot.py(y1), color);
    }
    draw_scatter(canvas, plot, series, color);
}

fn draw_scatter(canvas: &mut Canvas, plot: &PlotArea, series: &Series, color: (u8, u8, u8)) {
    for (x, y) in &series.points {
        canvas.fill_rect(plot.px(*x) - 2, plot.py(*y) - 2, 5, 5, color);
    }
}

struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![255u8; (width * height * 4) as usize],
        }
    }

    fn fill(&mut self, (r, g, b): (u8, u8, u8)) {
        for chunk in self.pixels.chunks_mut(4) {
            chunk[0] = r;
            chunk[1] = g;
            chunk[2] = b;
            chunk[3] = 255;
        }
    }

    fn set(&mut self, x: i32, y: i32, (r, g, b): (u8, u8, u8)) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
        self.pixels[idx] = r;
        self.pixels[idx + 1] = g;
        self.pixels[idx + 2] = b;
        self.pixels[idx + 3] = 255;
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: (u8, u8, u8)) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, color);
            }
        }
    }

    fn draw_h_line(&mut self, x0: i32, x1: i32, y: i32, color: (u8, u8, u8)) {
        for x in x0.min(x1)..=x0.max(x1) {
            self.set(x, y, color);
        }
    }

    fn draw_v_line(&mut self, x: i32, y0: i32, y1: i32, color: (u8, u8, u8)) {
        for y in y0.min(y1)..=y0.max(y1) {
            self.set(x, y, color);
        }
    }

    fn draw_segment(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: (u8, u8, u8)) {
        // Bresenham
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            self.set(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn encode_png(&self) -> Result<Vec<u8>> {
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| AskError::Chart(format!("png header: {}", e)))?;
            writer
                .write_image_data(&self.pixels)
                .map_err(|e| AskError::Chart(format!("png body: {}", e)))?;
        }
        Ok(png_data)
    }
}
