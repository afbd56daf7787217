//! Screen capture handling
//!
//! Pulls a still frame from the device with one of several strategies and
//! keeps the most recent one as shared state. A malformed payload is never
//! an error for the caller: the capture is simply taken again.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::{GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::android::{Device, DeviceResult};

/// Device path of the packed-capture helper binary
const HELPER_REMOTE_PATH: &str = "/data/local/tmp/ascreencap";

/// First word of a packed capture header, "BMZ1" read little-endian
const PACKED_MAGIC: u32 = 0x315A_4D42;
const PACKED_MARKER: &[u8; 4] = b"BMZ1";
const PACKED_MARKER_SWAPPED: &[u8; 4] = b"1ZMB";
const PACKED_HEADER_LEN: usize = 20;
/// Upper bound on a declared bitmap size, well above a 1280x720 BMP
const PACKED_MAX_BITMAP: usize = 64 * 1024 * 1024;

/// `width`, `height`, `format` as little-endian u32
const RAW_HEADER_LEN: usize = 12;

/// Errors decoding a capture payload, always retried by [`ScreenCapture::capture`]
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("empty capture payload")]
    Empty,
    #[error("payload is {actual} bytes, expected {expected}")]
    Truncated { expected: usize, actual: usize },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("packed capture marker not found in {0} bytes")]
    MarkerNotFound(usize),
    #[error("capture header verification failed: {0}")]
    BadHeader(String),
    #[error("packed capture decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
}

/// How frames are pulled from the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// `screencap -p`, PNG over exec-out
    #[default]
    #[serde(rename = "SCREENCAP_PNG")]
    ScreencapPng,
    /// `screencap` without encoding, fixed header then RGBA pixels
    #[serde(rename = "SCREENCAP_RAW")]
    ScreencapRaw,
    /// `screencap -p` into a file on the device, read back afterwards
    #[serde(rename = "NATIVE", alias = "UIAUTOMATOR2")]
    Native,
    /// LZ4 packed bitmaps from the aScreenCap helper
    #[serde(rename = "ASCREENCAP")]
    Packed,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureMode::ScreencapPng => "SCREENCAP_PNG",
            CaptureMode::ScreencapRaw => "SCREENCAP_RAW",
            CaptureMode::Native => "NATIVE",
            CaptureMode::Packed => "ASCREENCAP",
        };
        f.write_str(name)
    }
}

/// A captured screen, grayscale and color views of the same pixels
#[derive(Debug, Clone)]
pub struct Frame {
    pub gray: GrayImage,
    pub color: RgbImage,
}

impl Frame {
    pub fn from_color(color: RgbImage) -> Self {
        let gray = image::imageops::grayscale(&color);
        Self { gray, color }
    }

    pub fn width(&self) -> u32 {
        self.color.width()
    }

    pub fn height(&self) -> u32 {
        self.color.height()
    }
}

/// Screen capture handler
pub struct ScreenCapture {
    mode: CaptureMode,
    /// Repair `\r\n` mangling of PNG streams on old devices
    legacy: bool,
    /// Where the packed marker was found last time
    marker_offset: usize,
    latest: Option<Arc<Frame>>,
    frame_count: u64,
}

impl ScreenCapture {
    pub fn new(mode: CaptureMode, legacy: bool) -> Self {
        Self {
            mode,
            legacy,
            marker_offset: 0,
            latest: None,
            frame_count: 0,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Install whatever the active strategy needs on the device.
    ///
    /// For the packed strategy this pushes the aScreenCap helper from
    /// `helper_dir`, preferring the build for the device ABI on SDK 21-25 and
    /// `ascreencap_local` otherwise. Without a helper the capture falls back
    /// to PNG.
    pub fn prepare(&mut self, device: &mut dyn Device, helper_dir: &Path) -> DeviceResult<()> {
        if self.mode != CaptureMode::Packed {
            return Ok(());
        }

        device.shell(&format!("rm -f {}", HELPER_REMOTE_PATH))?;
        let abi = device.shell("getprop ro.product.cpu.abi")?.trim().to_string();
        let sdk: u32 = device
            .shell("getprop ro.build.version.sdk")?
            .trim()
            .parse()
            .unwrap_or(0);

        let specific = helper_dir.join(format!("ascreencap_{}", abi));
        let local = helper_dir.join("ascreencap_local");

        if (21..=25).contains(&sdk) && specific.is_file() {
            device.push(&specific, HELPER_REMOTE_PATH)?;
        } else {
            log::warn!(
                "No suitable version of aScreenCap for {} (SDK {}), using ascreencap_local...",
                abi,
                sdk
            );
            if local.is_file() {
                device.push(&local, HELPER_REMOTE_PATH)?;
            } else {
                log::error!(
                    "File \"{}\" not found. Download the aScreenCap build for your device and save it under that name.",
                    local.display()
                );
                log::warn!("aScreenCap is not ready, falling back to {}", CaptureMode::ScreencapPng);
                self.mode = CaptureMode::ScreencapPng;
                return Ok(());
            }
        }

        device.shell(&format!("chmod 0777 {}", HELPER_REMOTE_PATH))?;
        Ok(())
    }

    /// Capture a new frame, retrying until the payload decodes.
    ///
    /// Only transport failures are returned; they mean the device itself is
    /// gone and retrying here would not help.
    pub fn capture(&mut self, device: &mut dyn Device) -> DeviceResult<Arc<Frame>> {
        loop {
            let start = Instant::now();
            match self.capture_once(device)? {
                Ok(frame) => {
                    log::debug!(
                        "{} took {:.2} ms to complete.",
                        self.mode,
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                    let frame = Arc::new(frame);
                    self.latest = Some(Arc::clone(&frame));
                    self.frame_count += 1;
                    return Ok(frame);
                }
                Err(e) => log::warn!("Discarding {} capture: {}", self.mode, e),
            }
        }
    }

    fn capture_once(
        &mut self,
        device: &mut dyn Device,
    ) -> DeviceResult<Result<Frame, CaptureError>> {
        let frame = match self.mode {
            CaptureMode::ScreencapPng => {
                let data = device.exec_out("screencap -p")?;
                decode_png(&data, self.legacy)
            }
            CaptureMode::ScreencapRaw => {
                let data = device.exec_out("screencap")?;
                decode_raw(&data)
            }
            CaptureMode::Native => {
                let data = device.screenshot()?;
                decode_png(&data, false)
            }
            CaptureMode::Packed => {
                let data = device.exec_out(&format!("{} --pack 2 --stdout", HELPER_REMOTE_PATH))?;
                decode_packed(&data, &mut self.marker_offset)
            }
        };
        Ok(frame)
    }

    /// The most recent frame, shared with whoever is reading it
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.clone()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Decode a PNG screencap, optionally undoing `\n` -> `\r\n` translation
pub fn decode_png(data: &[u8], legacy: bool) -> Result<Frame, CaptureError> {
    if data.is_empty() {
        return Err(CaptureError::Empty);
    }

    let repaired;
    let bytes = if legacy {
        repaired = repair_line_endings(data);
        repaired.as_slice()
    } else {
        data
    };

    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    Ok(Frame::from_color(image.to_rgb8()))
}

fn repair_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(byte);
    }
    out
}

/// Decode a raw screencap: `{width, height, format}` then RGBA pixels
pub fn decode_raw(data: &[u8]) -> Result<Frame, CaptureError> {
    if data.len() < RAW_HEADER_LEN {
        return Err(CaptureError::Truncated {
            expected: RAW_HEADER_LEN,
            actual: data.len(),
        });
    }

    let width = read_u32_le(data, 0);
    let height = read_u32_le(data, 4);
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .and_then(|bytes| bytes.checked_add(RAW_HEADER_LEN))
        .ok_or_else(|| CaptureError::BadHeader(format!("raw size {}x{} overflows", width, height)))?;
    if data.len() != expected || width == 0 || height == 0 {
        return Err(CaptureError::Truncated {
            expected,
            actual: data.len(),
        });
    }

    let color = RgbImage::from_fn(width, height, |x, y| {
        let i = RAW_HEADER_LEN + (y as usize * width as usize + x as usize) * 4;
        image::Rgb([data[i], data[i + 1], data[i + 2]])
    });
    Ok(Frame::from_color(color))
}

/// Decode a packed capture.
///
/// Vendor builds may print linker warnings before the payload, so the
/// header is located by its marker. `offset` caches where it was found and
/// is rescanned only when it stops pointing at a marker.
pub fn decode_packed(data: &[u8], offset: &mut usize) -> Result<Frame, CaptureError> {
    if data.is_empty() {
        return Err(CaptureError::Empty);
    }

    if !has_marker_at(data, *offset) {
        *offset = data
            .windows(PACKED_MARKER.len())
            .position(|w| w == PACKED_MARKER || w == PACKED_MARKER_SWAPPED)
            .ok_or(CaptureError::MarkerNotFound(data.len()))?;
        log::debug!("Packed capture marker resynchronised at byte {}", offset);
    }

    let payload = &data[*offset..];
    if payload.len() < PACKED_HEADER_LEN {
        return Err(CaptureError::Truncated {
            expected: PACKED_HEADER_LEN,
            actual: payload.len(),
        });
    }

    let mut header = [0u32; 5];
    for (i, word) in header.iter_mut().enumerate() {
        *word = read_u32_le(payload, i * 4);
    }
    if header[0] != PACKED_MAGIC {
        for word in header.iter_mut() {
            *word = word.swap_bytes();
        }
        if header[0] != PACKED_MAGIC {
            let hex: String = payload[..PACKED_HEADER_LEN]
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect();
            return Err(CaptureError::BadHeader(hex));
        }
    }

    let uncompressed_size = header[1] as usize;
    if uncompressed_size == 0 || uncompressed_size > PACKED_MAX_BITMAP {
        return Err(CaptureError::BadHeader(format!(
            "declared size {}",
            uncompressed_size
        )));
    }
    let bitmap = lz4_flex::block::decompress(&payload[PACKED_HEADER_LEN..], uncompressed_size)?;
    let image = image::load_from_memory(&bitmap)?;
    Ok(Frame::from_color(image.to_rgb8()))
}

fn has_marker_at(data: &[u8], offset: usize) -> bool {
    data.get(offset..offset + PACKED_MARKER.len())
        .map(|w| w == PACKED_MARKER || w == PACKED_MARKER_SWAPPED)
        .unwrap_or(false)
}

fn read_u32_le(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Encode an image as a packed capture payload (for testing)
#[cfg(test)]
pub(crate) fn encode_packed(image: &RgbImage) -> Vec<u8> {
    let mut bmp = Vec::new();
    image::DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut std::io::Cursor::new(&mut bmp), ImageFormat::Bmp)
        .expect("bmp encode");

    let compressed = lz4_flex::block::compress(&bmp);
    let mut out = Vec::with_capacity(PACKED_HEADER_LEN + compressed.len());
    for word in [PACKED_MAGIC, bmp.len() as u32, 0, 0, 0] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&compressed);
    out
}

/// Encode an image as PNG bytes (for testing)
#[cfg(test)]
pub(crate) fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .expect("png encode");
    png
}
