//! Template image store
//!
//! Templates live under `{root}/{server}/{category}/{name}.png` and are
//! decoded once, then shared from the cache.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use super::VisionError;

/// Game server variant, each with its own art and text language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Server {
    #[default]
    EN,
    JP,
    /// Traditional Chinese
    CN,
    /// Simplified Chinese
    ZHS,
}

impl Server {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Server::EN => "EN",
            Server::JP => "JP",
            Server::CN => "CN",
            Server::ZHS => "ZHS",
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A decoded template in every form the matcher needs
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub gray: GrayImage,
    pub color: RgbImage,
    /// Opaque pixels of the source image, present only when it had alpha
    pub mask: Option<GrayImage>,
}

impl Template {
    pub fn from_image(name: &str, image: DynamicImage) -> Self {
        let mask = image.color().has_alpha().then(|| mask_from_alpha(&image));
        let color = image.to_rgb8();
        let gray = image::imageops::grayscale(&color);
        Self {
            name: name.to_string(),
            gray,
            color,
            mask,
        }
    }

    pub fn from_color(name: &str, color: RgbImage) -> Self {
        Self::from_image(name, DynamicImage::ImageRgb8(color))
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}

/// Binary mask where every pixel with non-zero alpha is 255
fn mask_from_alpha(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        if rgba.get_pixel(x, y)[3] > 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Loads and caches templates for one server variant
pub struct AssetStore {
    root: PathBuf,
    server: Server,
    cache: HashMap<String, Arc<Template>>,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, server: Server) -> Self {
        Self {
            root: root.into(),
            server,
            cache: HashMap::new(),
        }
    }

    pub fn server(&self) -> Server {
        self.server
    }

    /// Directory holding this server's templates
    pub fn server_dir(&self) -> PathBuf {
        self.root.join(self.server.dir_name())
    }

    /// File backing `name`, e.g. `goto/home`
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.server_dir().join(format!("{}.png", name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.cache.contains_key(name) || self.path_of(name).is_file()
    }

    /// Fetch a template, decoding it on first use
    pub fn get(&mut self, name: &str) -> Result<Arc<Template>, VisionError> {
        if let Some(template) = self.cache.get(name) {
            return Ok(Arc::clone(template));
        }

        let path = self.path_of(name);
        let template = Arc::new(load_template(name, &path)?);
        self.cache.insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Register an in-memory template under `name`
    pub fn insert(&mut self, template: Template) {
        self.cache.insert(template.name.clone(), Arc::new(template));
    }
}

fn load_template(name: &str, path: &Path) -> Result<Template, VisionError> {
    if !path.is_file() {
        return Err(VisionError::AssetNotFound(path.display().to_string()));
    }
    let image = image::open(path).map_err(|source| VisionError::AssetLoad {
        name: name.to_string(),
        source,
    })?;
    log::debug!("Loaded template {} ({}x{})", name, image.width(), image.height());
    Ok(Template::from_image(name, image))
}
