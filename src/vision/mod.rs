//! Vision and image processing module
//!
//! Screen capture, template matching and OCR over the latest frame. The
//! functions here never touch the device; they read a [`Frame`] the caller
//! captured and answer where something is on it.

pub mod assets;
pub mod capture;
pub mod matching;
pub mod ocr;
pub mod region;

use image::imageops::{self, FilterType};
use image::{GenericImageView, RgbImage};

pub use assets::{AssetStore, Server, Template};
pub use capture::{CaptureError, CaptureMode, Frame, ScreenCapture};
pub use matching::DEFAULT_SIMILARITY;
pub use ocr::{match_word, OcrsRecognizer, ScanResult, TextRecognizer, WordMatch};
pub use region::{Point, Region};

/// Upscale factor applied to small text before OCR
const OCR_UPSCALE: u32 = 3;

/// Vision system errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("template not found: {0}")]
    AssetNotFound(String),
    #[error("failed to load template {name}: {source}")]
    AssetLoad {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to load model: {0}")]
    Model(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
    /// OCR ran but found nothing, the expected screen is probably not showing
    #[error("no text recognized")]
    NoText,
}

/// Template store plus OCR engine for one server variant
pub struct VisionSystem {
    assets: AssetStore,
    ocr: Box<dyn TextRecognizer>,
}

impl VisionSystem {
    pub fn new(assets: AssetStore, ocr: Box<dyn TextRecognizer>) -> Self {
        Self { assets, ocr }
    }

    pub fn server(&self) -> Server {
        self.assets.server()
    }

    pub fn assets_mut(&mut self) -> &mut AssetStore {
        &mut self.assets
    }

    pub fn asset_exists(&self, name: &str) -> bool {
        self.assets.exists(name)
    }

    /// Single-scale match of the template `name`
    pub fn find(
        &mut self,
        frame: &Frame,
        name: &str,
        similarity: f32,
        color: bool,
    ) -> Result<Option<Region>, VisionError> {
        let template = self.assets.get(name)?;
        let found = matching::find(frame, &template, similarity, color);
        log::debug!("find {} -> {:?}", name, found);
        Ok(found)
    }

    pub fn find_scaled(
        &mut self,
        frame: &Frame,
        name: &str,
        similarity: f32,
        lower: f32,
        upper: f32,
    ) -> Result<Option<Region>, VisionError> {
        let template = self.assets.get(name)?;
        Ok(matching::find_scaled(frame, &template, similarity, lower, upper))
    }

    pub fn find_all(
        &mut self,
        frame: &Frame,
        name: &str,
        similarity: f32,
        use_mask: bool,
    ) -> Result<Vec<Point>, VisionError> {
        let template = self.assets.get(name)?;
        Ok(matching::find_all(frame, &template, similarity, use_mask))
    }

    /// Locate the icon `name` that belongs to the text at `text`.
    ///
    /// Only the band below `text` inside `search` is eligible. When several
    /// icons match, the one nearest to the text's top-left corner wins.
    pub fn find_button(
        &mut self,
        frame: &Frame,
        name: &str,
        text: Region,
        search: Region,
        similarity: f32,
    ) -> Result<Option<Region>, VisionError> {
        let template = self.assets.get(name)?;
        let band_h = search.h - text.h;
        if band_h <= 0 {
            return Ok(None);
        }

        let icon = if template.gray.height() > band_h as u32 {
            imageops::crop_imm(&template.gray, 0, 0, template.gray.width(), band_h as u32).to_image()
        } else {
            template.gray.clone()
        };

        let matches = matching::find_all_image(frame, &icon, similarity);
        let tree = matching::PointTree::from_points(&matches);
        let Some(nearest) = tree.nearest_point(Point::new(text.x, text.y)) else {
            return Ok(None);
        };

        let found = Region::new(nearest.x, nearest.y, icon.width() as i32, icon.height() as i32);
        let band = Region::new(text.x, text.y, frame.width() as i32, band_h);
        Ok(band.intersection(&found).map(|_| found))
    }

    /// OCR over `region`.
    ///
    /// With `resize` the crop is upscaled first, which small digits need.
    /// Bounding boxes come back in screen coordinates. An empty result is
    /// [`VisionError::NoText`].
    pub fn scan(
        &self,
        frame: &Frame,
        region: Region,
        resize: bool,
        color: bool,
    ) -> Result<Vec<ScanResult>, VisionError> {
        let Some(area) = region.clamp_to(frame.width(), frame.height()) else {
            return Err(VisionError::NoText);
        };

        let mut crop = if color {
            imageops::crop_imm(&frame.color, area.x as u32, area.y as u32, area.w as u32, area.h as u32)
                .to_image()
        } else {
            let gray = imageops::crop_imm(&frame.gray, area.x as u32, area.y as u32, area.w as u32, area.h as u32)
                .to_image();
            RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
                let v = gray.get_pixel(x, y)[0];
                image::Rgb([v, v, v])
            })
        };

        let scale = if resize { OCR_UPSCALE } else { 1 };
        if resize {
            crop = imageops::resize(
                &crop,
                crop.width() * OCR_UPSCALE,
                crop.height() * OCR_UPSCALE,
                FilterType::CatmullRom,
            );
        }

        let mut results = self.ocr.recognize(&crop)?;
        if results.is_empty() {
            return Err(VisionError::NoText);
        }

        for result in &mut results {
            result.bbox = result.bbox.map(|b| {
                let s = scale as i32;
                Region::new(area.x + b.x / s, area.y + b.y / s, b.w / s, b.h / s)
            });
        }
        log::debug!(
            "scan {:?} -> {:?}",
            region,
            results.iter().map(|r| r.text.as_str()).collect::<Vec<_>>()
        );
        Ok(results)
    }

    /// Mean RGB of the pixels under `region`
    pub fn region_color_average(frame: &Frame, region: Region) -> Option<[f64; 3]> {
        let area = region.clamp_to(frame.width(), frame.height())?;
        let crop = imageops::crop_imm(&frame.color, area.x as u32, area.y as u32, area.w as u32, area.h as u32);
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for (_, _, p) in crop.pixels() {
            for (sum, v) in sums.iter_mut().zip(p.0) {
                *sum += v as u64;
            }
            count += 1;
        }
        (count > 0).then(|| sums.map(|s| s as f64 / count as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct CannedOcr(Vec<ScanResult>);

    impl TextRecognizer for CannedOcr {
        fn recognize(&self, _image: &RgbImage) -> Result<Vec<ScanResult>, VisionError> {
            Ok(self.0.clone())
        }
    }

    fn system(lines: Vec<ScanResult>) -> VisionSystem {
        VisionSystem::new(AssetStore::new("unused", Server::EN), Box::new(CannedOcr(lines)))
    }

    fn blank_frame() -> Frame {
        Frame::from_color(RgbImage::from_pixel(1280, 720, Rgb([90, 90, 90])))
    }

    #[test]
    fn test_scan_maps_bbox_to_screen() {
        let line = ScanResult::new("1-3", Some(Region::new(30, 60, 90, 30)));
        let vision = system(vec![line]);
        let results = vision
            .scan(&blank_frame(), Region::new(677, 132, 200, 100), true, false)
            .unwrap();
        assert_eq!(results[0].bbox, Some(Region::new(687, 152, 30, 10)));
    }

    #[test]
    fn test_scan_empty_is_no_text() {
        let vision = system(Vec::new());
        let err = vision
            .scan(&blank_frame(), Region::new(0, 0, 50, 50), false, true)
            .unwrap_err();
        assert!(matches!(err, VisionError::NoText));
    }

    #[test]
    fn test_find_button_prefers_icon_near_text() {
        let icon = RgbImage::from_fn(16, 16, |x, y| {
            if (x + y) % 4 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([30, 60, 90])
            }
        });
        let mut screen = RgbImage::from_pixel(1280, 720, Rgb([120, 120, 120]));
        imageops::replace(&mut screen, &icon, 1100, 210);
        imageops::replace(&mut screen, &icon, 1100, 500);
        let frame = Frame::from_color(screen);

        let mut vision = system(Vec::new());
        vision.assets_mut().insert(Template::from_color("farming/small_enter", icon));

        let text = Region::new(700, 190, 60, 30);
        let search = Region::new(677, 132, 747, 678);
        let found = vision
            .find_button(&frame, "farming/small_enter", text, search, 0.99)
            .unwrap();
        assert_eq!(found, Some(Region::new(1100, 210, 16, 16)));
    }

    #[test]
    fn test_region_color_average() {
        let frame = Frame::from_color(RgbImage::from_pixel(10, 10, Rgb([10, 20, 30])));
        let avg = VisionSystem::region_color_average(&frame, Region::new(2, 2, 4, 4)).unwrap();
        assert_eq!(avg, [10.0, 20.0, 30.0]);
        assert!(VisionSystem::region_color_average(&frame, Region::new(50, 50, 4, 4)).is_none());
    }
}
