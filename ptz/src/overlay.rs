//! Telemetry overlay: frame-rate estimate and temperature drawn onto the output.
//!
//! Text lines are laid out as an SVG document, rendered with resvg into a
//! transparent pixmap and alpha-blended onto the frame.

use std::sync::Arc;
use std::time::Instant;

use image::{Rgb, RgbImage};
use thiserror::Error;
use tiny_skia::{Pixmap, Transform};
use usvg::{fontdb, Options, Tree};

use crate::config::TelemetryConfig;

/// Weight of the newest instantaneous rate in the moving average.
pub const FPS_SMOOTHING: f64 = 0.1;

pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Left edge and baseline of the first text line.
const TEXT_ORIGIN: (u32, u32) = (10, 20);
const LINE_STEP: u32 = 18;
const FONT_SIZE: u32 = 16;
const FONT_FAMILY: &str = "DejaVu Sans";

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to parse overlay SVG: {0}")]
    Svg(#[from] usvg::Error),
    #[error("Cannot allocate a {width}x{height} overlay pixmap")]
    Pixmap { width: u32, height: u32 },
}

/// Exponential moving average of the loop rate.
#[derive(Debug, Default, Clone)]
pub struct FpsEstimator {
    fps: f64,
    last: Option<Instant>,
}

impl FpsEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Record a frame at `now`. The first tick only starts the clock; the first
    /// measured interval seeds the average directly.
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        let Some(last) = self.last.replace(now) else {
            return self.fps;
        };
        let dt = now.saturating_duration_since(last).as_secs_f64();
        if dt <= 0.0 {
            self.last = Some(last);
            return self.fps;
        }
        let instant = 1.0 / dt;
        self.fps = if self.fps <= 0.0 {
            instant
        } else {
            self.fps * (1.0 - FPS_SMOOTHING) + instant * FPS_SMOOTHING
        };
        self.fps
    }

    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }
}

/// Overlay text lines for this frame, in drawing order.
pub fn overlay_lines(
    config: &TelemetryConfig,
    fps: f64,
    temperature_c: Option<f64>,
) -> Vec<String> {
    let mut lines = Vec::new();
    if !config.overlay {
        return lines;
    }
    if config.show_fps {
        lines.push(format!("FPS: {fps:.1}"));
    }
    if config.show_temp {
        if let Some(t) = temperature_c {
            lines.push(format!("Temp: {t:.1}C"));
        }
    }
    lines
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// SVG document placing `lines` top-left, one every `LINE_STEP` pixels.
pub fn overlay_svg(width: u32, height: u32, lines: &[String]) -> String {
    let Rgb([r, g, b]) = OVERLAY_COLOR;
    let color = format!("#{r:02x}{g:02x}{b:02x}");
    let (x, y0) = TEXT_ORIGIN;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#
    );
    for (i, line) in lines.iter().enumerate() {
        let y = y0 + i as u32 * LINE_STEP;
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-family="{FONT_FAMILY}, sans-serif" "#
        ));
        svg.push_str(&format!(
            r#"font-size="{FONT_SIZE}" fill="{color}">{}</text>"#,
            escape_xml(line)
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn blend_channel(base: u8, overlay: u8, alpha: u8) -> u8 {
    let alpha_f = alpha as f32 / 255.0;
    (base as f32 * (1.0 - alpha_f) + overlay as f32 * alpha_f).round() as u8
}

/// Renders overlay text onto frames with a font database loaded once.
pub struct TextOverlay {
    fontdb: Arc<fontdb::Database>,
}

impl TextOverlay {
    /// Overlay using the fonts installed on this system.
    pub fn new() -> Self {
        let mut fontdb = fontdb::Database::new();
        fontdb.load_system_fonts();
        Self::with_fontdb(fontdb)
    }

    pub fn with_fontdb(fontdb: fontdb::Database) -> Self {
        Self {
            fontdb: Arc::new(fontdb),
        }
    }

    /// Whether a face for the overlay font families is installed. Without one
    /// text renders as nothing.
    pub fn can_render_text(&self) -> bool {
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(FONT_FAMILY), fontdb::Family::SansSerif],
            ..Default::default()
        };
        self.fontdb.query(&query).is_some()
    }

    /// Blend `lines` onto `image`. An empty slice leaves the image untouched.
    pub fn draw(&self, image: &mut RgbImage, lines: &[String]) -> Result<(), OverlayError> {
        if lines.is_empty() {
            return Ok(());
        }
        let (width, height) = image.dimensions();
        let options = Options {
            fontdb: self.fontdb.clone(),
            font_family: FONT_FAMILY.to_string(),
            ..Default::default()
        };
        let tree = Tree::from_str(&overlay_svg(width, height, lines), &options)?;
        let mut pixmap =
            Pixmap::new(width, height).ok_or(OverlayError::Pixmap { width, height })?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let Some(overlay) = pixmap.pixel(x, y) else {
                continue;
            };
            if overlay.alpha() == 0 {
                continue;
            }
            let color = overlay.demultiply();
            let alpha = color.alpha();
            *pixel = Rgb([
                blend_channel(pixel[0], color.red(), alpha),
                blend_channel(pixel[1], color.green(), alpha),
                blend_channel(pixel[2], color.blue(), alpha),
            ]);
        }
        Ok(())
    }
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    #[test]
    fn test_fps_first_interval_seeds_average() {
        let t0 = Instant::now();
        let mut fps = FpsEstimator::new();
        assert_eq!(fps.tick_at(t0), 0.0);
        assert_relative_eq!(fps.tick_at(t0 + Duration::from_millis(100)), 10.0, epsilon = 1e-6);
        // 20 fps sample moves the average by 10 %
        assert_relative_eq!(
            fps.tick_at(t0 + Duration::from_millis(150)),
            10.0 * 0.9 + 20.0 * 0.1,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_fps_ignores_zero_interval() {
        let t0 = Instant::now();
        let mut fps = FpsEstimator::new();
        fps.tick_at(t0);
        fps.tick_at(t0 + Duration::from_millis(50));
        let before = fps.fps();
        assert_eq!(fps.tick_at(t0 + Duration::from_millis(50)), before);
    }

    #[test]
    fn test_overlay_lines_follow_flags() {
        let mut config = TelemetryConfig::default();
        assert!(overlay_lines(&config, 29.84, Some(45.06)).is_empty());

        config.overlay = true;
        assert_eq!(
            overlay_lines(&config, 29.84, Some(45.06)),
            vec!["FPS: 29.8".to_string(), "Temp: 45.1C".to_string()]
        );
        assert_eq!(overlay_lines(&config, 29.84, None), vec!["FPS: 29.8".to_string()]);

        config.show_fps = false;
        config.show_temp = false;
        assert!(overlay_lines(&config, 1.0, Some(1.0)).is_empty());
    }

    #[test]
    fn test_overlay_svg_layout() {
        let svg = overlay_svg(
            640,
            480,
            &["FPS: 29.8".to_string(), "Temp: 45.1C".to_string()],
        );
        assert!(svg.starts_with(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="640" height="480">"#
        ));
        assert!(svg.contains(r#"<text x="10" y="20" font-family="DejaVu Sans, sans-serif" "#));
        assert!(svg.contains(r##"font-size="16" fill="#00ff00">FPS: 29.8</text>"##));
        assert!(svg.contains(r#"<text x="10" y="38""#));
        assert!(svg.ends_with("Temp: 45.1C</text></svg>"));
    }

    #[test]
    fn test_overlay_svg_escapes_markup() {
        let svg = overlay_svg(10, 10, &["a<b & \"c\">".to_string()]);
        assert!(svg.contains(">a&lt;b &amp; &quot;c&quot;&gt;</text>"));
    }

    #[test]
    fn test_blend_channel() {
        assert_eq!(blend_channel(100, 200, 0), 100);
        assert_eq!(blend_channel(100, 200, 255), 200);
        assert_eq!(blend_channel(0, 255, 128), 128);
    }

    #[test]
    fn test_draw_without_lines_is_noop() {
        let overlay = TextOverlay::with_fontdb(fontdb::Database::new());
        let mut image = RgbImage::from_pixel(32, 32, Rgb([7, 8, 9]));
        overlay.draw(&mut image, &[]).unwrap();
        assert!(image.pixels().all(|p| *p == Rgb([7, 8, 9])));
    }

    #[test]
    fn test_draw_without_fonts_leaves_frame() {
        let overlay = TextOverlay::with_fontdb(fontdb::Database::new());
        assert!(!overlay.can_render_text());
        let mut image = RgbImage::new(200, 60);
        overlay.draw(&mut image, &["FPS: NaN".to_string()]).unwrap();
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_draw_paints_only_near_origin() {
        let overlay = TextOverlay::new();
        if !overlay.can_render_text() {
            return;
        }
        let mut image = RgbImage::new(200, 80);
        overlay.draw(&mut image, &["FPS: 1.0".to_string()]).unwrap();

        let lit: Vec<(u32, u32)> = image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[1] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|&(x, y)| x >= 8 && y < 28));
        // Green only
        assert!(image.pixels().all(|p| p[0] == 0 && p[2] == 0));
    }
}
