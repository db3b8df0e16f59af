use std::path::Path;

use anyhow::{ anyhow, ensure, Context, Result };
use burn::{ prelude::Backend, tensor::Tensor };
use image::{ GrayImage, Luma };

/// Glyph cells per grid row; real and reconstructed glyphs alternate.
pub const GRID_COLUMNS: usize = 24;
pub const GRID_MAX_ROWS: usize = 131;
const PADDING: u32 = 2;

/// Lays out up to `GRID_MAX_ROWS * GRID_COLUMNS / 2` pairs, each real glyph
/// followed by its reconstruction. Inputs are `n * size * size` values in `[0, 1]`.
pub fn compose_glyph_grid(real: &[f32], fake: &[f32], size: usize) -> Result<GrayImage> {
    ensure!(size > 0, "glyph size must be positive");
    ensure!(real.len() == fake.len(), "real and reconstructed glyph counts differ");
    ensure!(real.len() % (size * size) == 0, "glyph buffer is not a multiple of {size}x{size}");

    let pairs = (real.len() / (size * size)).min((GRID_MAX_ROWS * GRID_COLUMNS) / 2);
    ensure!(pairs > 0, "no glyphs to draw");

    let cells = pairs * 2;
    let rows = cells.div_ceil(GRID_COLUMNS);
    let columns = cells.min(GRID_COLUMNS);
    let cell = size as u32 + PADDING;

    let mut grid = GrayImage::from_pixel(
        (columns as u32) * cell + PADDING,
        (rows as u32) * cell + PADDING,
        Luma([255])
    );

    for i in 0..cells {
        let source = if i % 2 == 0 { real } else { fake };
        let glyph = &source[(i / 2) * size * size..(i / 2 + 1) * size * size];
        let x0 = ((i % GRID_COLUMNS) as u32) * cell + PADDING;
        let y0 = ((i / GRID_COLUMNS) as u32) * cell + PADDING;

        for (offset, value) in glyph.iter().enumerate() {
            let x = x0 + ((offset % size) as u32);
            let y = y0 + ((offset / size) as u32);
            grid.put_pixel(x, y, Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8]));
        }
    }

    Ok(grid)
}

/// Writes the real-vs-reconstructed grid for a `[N, H, W]` pair of tensors.
pub fn save_glyph_grid<B: Backend, P: AsRef<Path>>(
    real: Tensor<B, 3>,
    fake: Tensor<B, 3>,
    path: P
) -> Result<()> {
    let [_, h, w] = real.dims();
    ensure!(h == w, "glyphs must be square, got {h}x{w}");
    ensure!(real.dims() == fake.dims(), "reconstruction shape {:?} differs from {:?}", fake.dims(), real.dims());

    let real = tensor_values(real)?;
    let fake = tensor_values(fake)?;
    let grid = compose_glyph_grid(&real, &fake, h)?;

    let path = path.as_ref();
    grid.save(path).with_context(|| format!("failed to save glyph grid to {}", path.display()))
}

fn tensor_values<B: Backend>(tensor: Tensor<B, 3>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("failed to read tensor values: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_real_and_reconstructed() {
        let real = vec![1.0; 2 * 4];
        let fake = vec![0.0; 2 * 4];
        let grid = compose_glyph_grid(&real, &fake, 2).unwrap();

        // 4 cells in one row.
        assert_eq!(grid.dimensions(), (4 * 4 + 2, 4 + 2));
        assert_eq!(grid.get_pixel(2, 2)[0], 255);
        assert_eq!(grid.get_pixel(6, 2)[0], 0);
        assert_eq!(grid.get_pixel(10, 2)[0], 255);
        assert_eq!(grid.get_pixel(14, 2)[0], 0);
    }

    #[test]
    fn wraps_rows_and_caps_pairs() {
        let n = GRID_MAX_ROWS * GRID_COLUMNS;
        let real = vec![0.5; n];
        let fake = vec![0.5; n];
        let grid = compose_glyph_grid(&real, &fake, 1).unwrap();
        assert_eq!(grid.dimensions(), (24 * 3 + 2, (GRID_MAX_ROWS as u32) * 3 + 2));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(compose_glyph_grid(&[], &[], 4).is_err());
        assert!(compose_glyph_grid(&[0.0; 4], &[0.0; 8], 2).is_err());
    }
}
