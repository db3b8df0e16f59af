#![allow(dead_code)]

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use burn::optim::AdamConfig;
use font_autoencoder::data::GlyphRecord;
use font_autoencoder::{ DatasetShape, GlyphAutoencoderConfig, TrainingConfig };
use image::{ GrayImage, ImageFormat, Luma };
use serde_bytes::ByteBuf;

pub const SIZE: usize = 8;

pub fn shape() -> DatasetShape {
    DatasetShape { image_size: SIZE, category_size: 5, alpha_size: 52 }
}

pub fn small_config() -> TrainingConfig {
    TrainingConfig::new(
        GlyphAutoencoderConfig::new().with_font_size(SIZE * SIZE).with_hidden_size(32).with_z_size(4),
        AdamConfig::new()
    )
        .with_image_size(SIZE)
        .with_batch_size(4)
        .with_num_epochs(2)
        .with_log_interval(1)
        .with_learning_rate(1e-2)
}

/// A glyph with a vertical bar whose column depends on `i`.
pub fn glyph_png(i: usize) -> ByteBuf {
    let column = (i % SIZE) as u32;
    let img = GrayImage::from_fn(SIZE as u32, SIZE as u32, |x, _| {
        if x == column { Luma([255]) } else { Luma([0]) }
    });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    ByteBuf::from(bytes.into_inner())
}

pub fn records(n: usize) -> Vec<GlyphRecord> {
    (0..n).map(|i| GlyphRecord((i % 5) as i64, (i % 52) as i64, glyph_png(i))).collect()
}

pub fn write_split(dir: &Path, name: &str, n: usize) {
    let mut file = File::create(dir.join(name)).unwrap();
    serde_pickle::to_writer(&mut file, &records(n), serde_pickle::SerOptions::new()).unwrap();
}

pub fn write_splits(dir: &Path, train: usize, valid: usize, test: usize) {
    write_split(dir, "train.obj", train);
    write_split(dir, "val.obj", valid);
    write_split(dir, "test.obj", test);
}

/// One pickle per record, back to back in the same file.
pub fn write_record_stream(dir: &Path, name: &str, n: usize) {
    let mut file = File::create(dir.join(name)).unwrap();
    for record in records(n) {
        serde_pickle::to_writer(&mut file, &record, serde_pickle::SerOptions::new()).unwrap();
    }
}
