use crate::config::DisplayConfig;
use crate::recognition::{FaceRegion, Identity};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const KNOWN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 2;

/// Draws recognition results and writes a throttled JPEG snapshot for
/// local monitoring.
pub struct FrameAnnotator {
    snapshot_path: PathBuf,
    interval: Duration,
    font: Option<Font<'static>>,
    scale: Scale,
    last_snapshot: Option<Instant>,
}

impl FrameAnnotator {
    pub fn new(config: &DisplayConfig) -> Self {
        // Boxes are still drawn when the font is missing, labels are not
        let font = match std::fs::read(&config.font_path) {
            Ok(data) => {
                let font = Font::try_from_vec(data);
                if font.is_none() {
                    warn!("Failed to parse font file '{}'", config.font_path);
                }
                font
            }
            Err(e) => {
                warn!("Failed to read font file '{}': {}", config.font_path, e);
                None
            }
        };

        Self {
            snapshot_path: config.snapshot_path.clone(),
            interval: Duration::from_millis(config.snapshot_interval_ms),
            font,
            scale: Scale::uniform(config.font_size),
            last_snapshot: None,
        }
    }

    /// Copy of `image` with a box per face, green for known and red for unknown
    pub fn annotate(&self, image: &RgbImage, faces: &[(FaceRegion, Identity)]) -> RgbImage {
        let mut canvas = image.clone();

        for (region, identity) in faces {
            let color = if identity.is_known() {
                KNOWN_COLOR
            } else {
                UNKNOWN_COLOR
            };

            for inset in 0..BOX_THICKNESS {
                let width = region.width().saturating_sub(2 * inset);
                let height = region.height().saturating_sub(2 * inset);
                if width == 0 || height == 0 {
                    break;
                }
                let rect = Rect::at((region.left + inset) as i32, (region.top + inset) as i32)
                    .of_size(width, height);
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }

            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut canvas,
                    color,
                    region.left as i32 + 6,
                    region.top as i32 - self.scale.y as i32 - 2,
                    self.scale,
                    font,
                    identity.label(),
                );
            }
        }

        canvas
    }

    /// Annotate and save when the snapshot interval has elapsed.
    ///
    /// Returns whether a snapshot was written.
    pub async fn maybe_snapshot(
        &mut self,
        image: &RgbImage,
        faces: &[(FaceRegion, Identity)],
        now: Instant,
    ) -> bool {
        if let Some(last) = self.last_snapshot {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_snapshot = Some(now);

        let annotated = self.annotate(image, faces);
        let path = self.snapshot_path.clone();

        let result = tokio::task::spawn_blocking(move || {
            annotated.save_with_format(&path, ImageFormat::Jpeg)
        })
        .await;

        match result {
            Ok(Ok(())) => {
                debug!("Wrote monitor snapshot to {}", self.snapshot_path.display());
                true
            }
            Ok(Err(e)) => {
                warn!("Failed to write snapshot {}: {}", self.snapshot_path.display(), e);
                false
            }
            Err(e) => {
                warn!("Snapshot task failed: {}", e);
                false
            }
        }
    }
}
