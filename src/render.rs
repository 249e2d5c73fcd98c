use crate::materials::{Materials, FREE_MEDIUM};
use anyhow::Result;
use ndarray::Array2;
use plotters::prelude::*;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

const FIELD_GAIN: f64 = 5.0;

/// Shade the field and material grid into an ARGB framebuffer.
///
/// Free-medium cells get the red/blue diverging map of the scaled field
/// value; material cells get a fixed gray per coefficient band. The buffer
/// is row-major, `buf[y * l + x]`.
pub fn shade(field: &Array2<f64>, materials: &Materials, buf: &mut [u32]) {
    let l = field.nrows();
    assert_eq!(buf.len(), l * l, "framebuffer does not match grid");

    buf.par_iter_mut().enumerate().for_each(|(i, pixel)| {
        let x = i % l;
        let y = i / l;
        let coeff = materials.coeff(x, y);
        *pixel = if coeff != FREE_MEDIUM {
            material_gray(coeff)
        } else {
            field_color(field[[x, y]] * FIELD_GAIN)
        };
    });
}

/// Diverging map: positive values fade white to red, non-positive white to
/// green. Channels clamp to the displayable range for large amplitudes.
fn field_color(s: f64) -> u32 {
    if s > 0.0 {
        let fade = (255.0 - s).clamp(0.0, 255.0) as u32;
        (255 << 16) | (fade << 8) | fade
    } else {
        let fade = (255.0 + s).clamp(0.0, 255.0) as u32;
        (fade << 16) | (255 << 8) | fade
    }
}

/// Fixed palette entry per material class: the barrier darkest, lighter
/// classes progressively lighter; unknown coefficients render black.
fn material_gray(coeff: f64) -> u32 {
    let level: u32 = if coeff <= 0.6 {
        45
    } else if coeff <= 0.7 {
        90
    } else if coeff <= 0.85 {
        150
    } else {
        0
    };
    (level << 16) | (level << 8) | level
}

/// Writes numbered PNG heatmap frames of the raw field.
pub struct FrameRecorder {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    // Store as a boxed trait object
    gradient: Box<dyn colorgrad::Gradient>,
}

impl FrameRecorder {
    pub fn new(output_dir: &Path, width: u32, height: u32) -> Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let gradient = Box::new(colorgrad::preset::rd_yl_bu());

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            width,
            height,
            gradient,
        })
    }

    pub fn save_frame(&self, field: &Array2<f64>, step: usize, time: f64) -> Result<()> {
        let filename = self
            .output_dir
            .join(format!("field_{:06}.png", step));
        let root =
            BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let l = field.nrows();
        let max_abs = field.iter().map(|&v| v.abs()).fold(0.0_f64, f64::max);
        let min_val = -max_abs;
        let max_val = max_abs;

        let title = format!("field at t={:.3}s (tick {})", time, step);
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 30))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0..l, 0..l)?;

        chart
            .configure_mesh()
            .x_desc("X (grid points)")
            .y_desc("Y (grid points)")
            .draw()?;

        for x in 0..l {
            for y in 0..l {
                let color = self.value_to_color(field[[x, y]], min_val, max_val);
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x, y), (x + 1, y + 1)],
                    color.filled(),
                )))?;
            }
        }

        root.present()?;
        debug!(frame = %filename.display(), "Saved frame");
        Ok(())
    }

    fn value_to_color(&self, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = if max_val > min_val {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Materials;

    fn rgb(pixel: u32) -> (u32, u32, u32) {
        ((pixel >> 16) & 0xff, (pixel >> 8) & 0xff, pixel & 0xff)
    }

    #[test]
    fn test_zero_field_is_white() {
        let field = Array2::zeros((5, 5));
        let materials = Materials::free(5);
        let mut buf = vec![0u32; 25];
        shade(&field, &materials, &mut buf);
        assert!(buf.iter().all(|&p| rgb(p) == (255, 255, 255)));
    }

    #[test]
    fn test_diverging_map_signs() {
        let mut field = Array2::zeros((5, 5));
        field[[1, 2]] = 10.0; // s = 50
        field[[3, 2]] = -10.0;
        let materials = Materials::free(5);
        let mut buf = vec![0u32; 25];
        shade(&field, &materials, &mut buf);

        // Row-major: buf[y * l + x]
        assert_eq!(rgb(buf[2 * 5 + 1]), (255, 205, 205));
        assert_eq!(rgb(buf[2 * 5 + 3]), (205, 255, 205));
    }

    #[test]
    fn test_channels_are_clamped() {
        let mut field = Array2::zeros((5, 5));
        field[[2, 2]] = 1000.0; // s = 5000, far beyond channel range
        field[[1, 1]] = -1000.0;
        let materials = Materials::free(5);
        let mut buf = vec![0u32; 25];
        shade(&field, &materials, &mut buf);

        assert_eq!(rgb(buf[2 * 5 + 2]), (255, 0, 0));
        assert_eq!(rgb(buf[1 * 5 + 1]), (0, 255, 0));
    }

    #[test]
    fn test_material_cells_override_field() {
        let mut field = Array2::zeros((201, 201));
        field[[100, 50]] = 42.0;
        let materials = Materials::default_barrier(201);
        let mut buf = vec![0u32; 201 * 201];
        shade(&field, &materials, &mut buf);

        // Barrier cell renders its gray regardless of the field value
        assert_eq!(rgb(buf[50 * 201 + 100]), (45, 45, 45));
    }

    #[test]
    fn test_material_palette_bands() {
        assert_eq!(rgb(material_gray(0.6)), (45, 45, 45));
        assert_eq!(rgb(material_gray(0.7)), (90, 90, 90));
        assert_eq!(rgb(material_gray(0.85)), (150, 150, 150));
        assert_eq!(rgb(material_gray(0.95)), (0, 0, 0));
    }

    #[test]
    fn test_recorder_writes_png() {
        let dir = std::env::temp_dir().join(format!("wavetank-frames-{}", std::process::id()));
        let recorder = FrameRecorder::new(&dir, 80, 80).unwrap();
        let field = Array2::zeros((5, 5));
        recorder.save_frame(&field, 3, 0.05).unwrap();
        assert!(dir.join("field_000003.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
