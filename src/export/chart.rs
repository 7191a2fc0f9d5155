//! Radar chart of category averages, drawn with plotters and encoded as PNG.
use super::font;
use super::placeholder::ImageBinding;
use crate::error::{FormError, Result};
use crate::util::one_line;
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::register_font;
use std::f64::consts::PI;
use std::io::Cursor;

/// Chart-to-raster collaborator: turns labelled values into an image.
pub trait ChartRenderer {
    fn render(&self, series: &[(String, f64)]) -> Result<ImageBinding>;
}

const GRID: RGBColor = RGBColor(200, 200, 200);
const SHAPE: RGBColor = RGBColor(31, 119, 180);
const LABEL: RGBColor = RGBColor(40, 40, 40);
const FONT_FAMILY: &str = "sans-serif";
const LABEL_BYTES: usize = 24;

/// Filled polygon over concentric grid rings, one labelled spoke per category.
#[derive(Debug, Clone, Copy)]
pub struct RadarChart {
    pub size: u32,
    pub max_value: f64,
    pub rings: u32,
}

impl Default for RadarChart {
    fn default() -> Self {
        Self {
            size: 800,
            max_value: 5.0,
            rings: 5,
        }
    }
}

impl RadarChart {
    /// Point on `axis` at `fraction` of the outer ring.
    fn vertex(&self, axis: usize, axes: usize, fraction: f64) -> (i32, i32) {
        let (x, y) = self.project(axis, axes, f64::from(self.size) * 0.32 * fraction);
        (x.round() as i32, y.round() as i32)
    }

    fn project(&self, axis: usize, axes: usize, radius: f64) -> (f64, f64) {
        let center = f64::from(self.size) / 2.0;
        let angle = self.angle(axis, axes);
        (center + radius * angle.cos(), center + radius * angle.sin())
    }

    fn angle(&self, axis: usize, axes: usize) -> f64 {
        -PI / 2.0 + 2.0 * PI * axis as f64 / axes as f64
    }

    fn ring(&self, fractions: impl Iterator<Item = f64>, axes: usize) -> Vec<(i32, i32)> {
        fractions
            .enumerate()
            .map(|(axis, fraction)| self.vertex(axis, axes, fraction))
            .collect()
    }

    /// Labels sit just outside the outer ring, anchored away from the center.
    fn label_style(&self, axis: usize, axes: usize) -> TextStyle<'static> {
        let angle = self.angle(axis, axes);
        let horizontal = match angle.cos() {
            cos if cos > 0.3 => HPos::Left,
            cos if cos < -0.3 => HPos::Right,
            _ => HPos::Center,
        };
        let vertical = match angle.sin() {
            sin if sin > 0.3 => VPos::Top,
            sin if sin < -0.3 => VPos::Bottom,
            _ => VPos::Center,
        };
        let points = (f64::from(self.size) / 32.0).max(12.0);
        TextStyle::from((FONT_FAMILY, points).into_font())
            .color(&LABEL)
            .pos(Pos::new(horizontal, vertical))
    }

    fn draw(&self, buffer: &mut [u8], series: &[(String, f64)]) -> Result<()> {
        let axes = series.len();
        let root = BitMapBackend::with_buffer(buffer, (self.size, self.size)).into_drawing_area();
        root.fill(&WHITE).map_err(FormError::render)?;

        for ring in 1..=self.rings {
            let fraction = f64::from(ring) / f64::from(self.rings);
            let mut outline = self.ring(vec![fraction; axes].into_iter(), axes);
            outline.push(outline[0]);
            root.draw(&PathElement::new(outline, GRID.stroke_width(1)))
                .map_err(FormError::render)?;
        }
        let center = self.vertex(0, axes, 0.0);
        for axis in 0..axes {
            let spoke = vec![center, self.vertex(axis, axes, 1.0)];
            root.draw(&PathElement::new(spoke, GRID.stroke_width(1)))
                .map_err(FormError::render)?;
        }

        let fractions = series
            .iter()
            .map(|(_, value)| value.clamp(0.0, self.max_value) / self.max_value);
        let mut shape = self.ring(fractions, axes);
        if shape.len() >= 3 {
            root.draw(&Polygon::new(shape.clone(), SHAPE.mix(0.35).filled()))
                .map_err(FormError::render)?;
        }
        shape.push(shape[0]);
        root.draw(&PathElement::new(shape, SHAPE.stroke_width(3)))
            .map_err(FormError::render)?;

        let outside = f64::from(self.size) * 0.36;
        for (axis, (label, _)) in series.iter().enumerate() {
            let (x, y) = self.project(axis, axes, outside);
            let text = one_line(label, LABEL_BYTES);
            let anchor = (x.round() as i32, y.round() as i32);
            root.draw(&Text::new(text, anchor, self.label_style(axis, axes)))
                .map_err(FormError::render)?;
        }
        root.present().map_err(FormError::render)
    }
}

impl ChartRenderer for RadarChart {
    fn render(&self, series: &[(String, f64)]) -> Result<ImageBinding> {
        if series.is_empty() {
            return Err(FormError::Render("no categories to chart".to_string()));
        }
        if self.size < 16 || self.max_value <= 0.0 {
            return Err(FormError::Render(format!(
                "invalid chart geometry (size {}, max {})",
                self.size, self.max_value
            )));
        }
        register_font(FONT_FAMILY, FontStyle::Normal, font::SANS)
            .map_err(|_| FormError::Render("bundled chart font is unreadable".to_string()))?;

        let side = self.size as usize;
        let mut buffer = vec![0u8; side * side * 3];
        self.draw(&mut buffer, series)?;

        let canvas = RgbImage::from_raw(self.size, self.size, buffer)
            .ok_or_else(|| FormError::Render("chart buffer has the wrong size".to_string()))?;
        let mut png = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(FormError::render)?;
        Ok(ImageBinding {
            png,
            width_px: self.size,
            height_px: self.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<(String, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(position, value)| (format!("c{position}"), *value))
            .collect()
    }

    fn decode(binding: &ImageBinding) -> RgbImage {
        image::load_from_memory(&binding.png)
            .expect("decode")
            .to_rgb8()
    }

    #[test]
    fn renders_a_png_of_the_configured_size() {
        let chart = RadarChart {
            size: 200,
            ..RadarChart::default()
        };
        let rendered = chart.render(&series(&[3.0, 4.5, 3.0, 5.0])).expect("render");
        assert_eq!(&rendered.png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!((rendered.width_px, rendered.height_px), (200, 200));

        let decoded = decode(&rendered);
        assert_eq!(decoded.dimensions(), (200, 200));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255]);
        let [r, _, b] = decoded.get_pixel(110, 90).0.map(u16::from);
        assert!(b > r + 20, "shape interior should carry the blue tint, got {r}/{b}");
    }

    #[test]
    fn category_names_are_drawn_next_to_their_spokes() {
        let chart = RadarChart {
            size: 200,
            ..RadarChart::default()
        };
        let labelled = vec![
            ("Governance".to_string(), 2.0),
            ("Risk".to_string(), 2.0),
            ("Privacy".to_string(), 2.0),
        ];
        let decoded = decode(&chart.render(&labelled).expect("render"));
        // Top label sits above the outer ring, where nothing else is drawn.
        let dark = (60..140)
            .flat_map(|x| (0..30).map(move |y| (x, y)))
            .filter(|(x, y)| decoded.get_pixel(*x, *y).0.iter().all(|channel| *channel < 120))
            .count();
        assert!(dark > 10, "expected label pixels above the chart, found {dark}");

        let blank = vec![(String::new(), 2.0), (String::new(), 2.0), (String::new(), 2.0)];
        let decoded = decode(&chart.render(&blank).expect("render"));
        assert!((60..140)
            .flat_map(|x| (0..30).map(move |y| (x, y)))
            .all(|(x, y)| decoded.get_pixel(x, y).0 == [255, 255, 255]));
    }

    #[test]
    fn one_or_two_categories_still_render() {
        let chart = RadarChart {
            size: 64,
            ..RadarChart::default()
        };
        assert!(chart.render(&series(&[4.0])).is_ok());
        assert!(chart.render(&series(&[1.0, 7.0])).is_ok());
    }

    #[test]
    fn empty_series_is_a_render_error() {
        assert!(matches!(
            RadarChart::default().render(&[]),
            Err(FormError::Render(_))
        ));
    }
}
