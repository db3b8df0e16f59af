use std::path::Path;

use ab_glyph::{ FontVec, PxScale };
use anyhow::{ anyhow, Context, Result };
use image::{ Rgb, RgbImage };
use imageproc::drawing::{
    draw_filled_circle_mut,
    draw_filled_rect_mut,
    draw_line_segment_mut,
    draw_text_mut,
};
use imageproc::rect::Rect;
use tracing::{ debug, warn };

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const TRAIN_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
const VALID_COLOR: Rgb<u8> = Rgb([255, 127, 14]);

const MARGIN_LEFT: u32 = 70;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 20;
const MARGIN_BOTTOM: u32 = 40;
const Y_TICKS: usize = 5;

/// Common TrueType locations tried when no plot font is configured.
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Line plot of per-epoch train and validation MSE.
pub struct HistoryPlot {
    width: u32,
    height: u32,
    font: Option<FontVec>,
}

impl HistoryPlot {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(MARGIN_LEFT + MARGIN_RIGHT + 10),
            height: height.max(MARGIN_TOP + MARGIN_BOTTOM + 10),
            font: None,
        }
    }

    /// Legend and tick labels are only drawn when a TrueType font is supplied.
    pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes).map_err(|e|
            anyhow!("invalid font {}: {e}", path.display())
        )?;
        self.font = Some(font);
        Ok(self)
    }

    /// Uses the first readable font among `candidates`. Without one the plot
    /// loses its legend text and tick labels, which is logged as a warning.
    pub fn with_first_font<P: AsRef<Path>>(self, candidates: &[P]) -> Self {
        let mut plot = self;
        for candidate in candidates {
            let (width, height) = (plot.width, plot.height);
            match plot.with_font_file(candidate) {
                Ok(found) => {
                    debug!(font = %candidate.as_ref().display(), "history plot font");
                    return found;
                }
                Err(_) => {
                    plot = HistoryPlot::new(width, height);
                }
            }
        }
        warn!("no plot font found, history plot is drawn without labels; pass --plot-font");
        plot
    }

    pub fn with_system_font(self) -> Self {
        self.with_first_font(SYSTEM_FONTS)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, train: &[f64], valid: &[f64]) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        let epochs = train.len().max(valid.len());
        let y_max = train
            .iter()
            .chain(valid.iter())
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f64, f64::max);
        let y_max = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

        let frame = Frame {
            left: MARGIN_LEFT as f32,
            right: (self.width - MARGIN_RIGHT) as f32,
            top: MARGIN_TOP as f32,
            bottom: (self.height - MARGIN_BOTTOM) as f32,
            x_min: if epochs > 1 { 1.0 } else { 0.5 },
            x_max: if epochs > 1 { epochs as f64 } else { 1.5 },
            y_max,
        };

        for tick in 0..=Y_TICKS {
            let value = (y_max * (tick as f64)) / (Y_TICKS as f64);
            let y = frame.y(value);
            draw_line_segment_mut(&mut img, (frame.left, y), (frame.right, y), GRID);
            if let Some(font) = &self.font {
                let label = format!("{:.4}", value);
                draw_text_mut(&mut img, AXIS, 4, (y as i32) - 7, PxScale::from(14.0), font, &label);
            }
        }

        draw_line_segment_mut(&mut img, (frame.left, frame.top), (frame.left, frame.bottom), AXIS);
        draw_line_segment_mut(&mut img, (frame.left, frame.bottom), (frame.right, frame.bottom), AXIS);

        if let Some(font) = &self.font {
            for epoch in x_tick_epochs(epochs) {
                let x = frame.x(epoch as f64);
                draw_line_segment_mut(&mut img, (x, frame.bottom), (x, frame.bottom + 4.0), AXIS);
                let label = epoch.to_string();
                draw_text_mut(
                    &mut img,
                    AXIS,
                    (x as i32) - 4,
                    (frame.bottom as i32) + 8,
                    PxScale::from(14.0),
                    font,
                    &label
                );
            }
        }

        draw_series(&mut img, &frame, train, TRAIN_COLOR);
        draw_series(&mut img, &frame, valid, VALID_COLOR);
        self.draw_legend(&mut img, &frame);

        img
    }

    pub fn save<P: AsRef<Path>>(&self, train: &[f64], valid: &[f64], path: P) -> Result<()> {
        let path = path.as_ref();
        self.render(train, valid)
            .save(path)
            .with_context(|| format!("failed to save history plot to {}", path.display()))
    }

    fn draw_legend(&self, img: &mut RgbImage, frame: &Frame) {
        let entries = [
            ("train_history", TRAIN_COLOR),
            ("valid_history", VALID_COLOR),
        ];
        let x = (frame.right as i32) - 130;
        for (row, (label, color)) in entries.iter().enumerate() {
            let y = (frame.top as i32) + 8 + (row as i32) * 18;
            draw_filled_rect_mut(img, Rect::at(x, y + 5).of_size(20, 4), *color);
            if let Some(font) = &self.font {
                draw_text_mut(img, AXIS, x + 26, y, PxScale::from(14.0), font, label);
            }
        }
    }
}

impl Default for HistoryPlot {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

struct Frame {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    x_min: f64,
    x_max: f64,
    y_max: f64,
}

impl Frame {
    fn x(&self, epoch: f64) -> f32 {
        let t = (epoch - self.x_min) / (self.x_max - self.x_min);
        self.left + (t as f32) * (self.right - self.left)
    }

    fn y(&self, value: f64) -> f32 {
        let t = (value / self.y_max).clamp(0.0, 1.0);
        self.bottom - (t as f32) * (self.bottom - self.top)
    }
}

fn draw_series(img: &mut RgbImage, frame: &Frame, values: &[f64], color: Rgb<u8>) {
    let points: Vec<(f32, f32)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (frame.x((i + 1) as f64), frame.y(*v)))
        .collect();

    for pair in points.windows(2) {
        draw_line_segment_mut(img, pair[0], pair[1], color);
    }
    for (x, y) in points {
        draw_filled_circle_mut(img, (x.round() as i32, y.round() as i32), 2, color);
    }
}

/// At most ten evenly spaced epoch labels.
fn x_tick_epochs(epochs: usize) -> Vec<usize> {
    if epochs == 0 {
        return vec![];
    }
    let step = epochs.div_ceil(10).max(1);
    (1..=epochs).step_by(step).collect()
}
