//! Template matching over captured frames
//!
//! Scores are normalized cross-correlation in `[0, 1]`. Color matches score
//! each channel separately and average the maps.

use image::imageops::{self, FilterType};
use image::{GenericImageView, GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::template_matching::{
    find_extremes, match_template, match_template_with_mask, MatchTemplateMethod,
};
use rayon::prelude::*;

use super::assets::Template;
use super::capture::Frame;
use super::region::{Point, Region};

/// Similarity used when the caller has no better value
pub const DEFAULT_SIMILARITY: f32 = 0.9;

/// A color match whose pixels average darker than this is treated as hidden
/// behind an overlay
pub const DARKNESS_THRESHOLD: f64 = 100.0;

/// Matches closer than this many pixels are the same on-screen element
pub const MERGE_DISTANCE: f64 = 50.0;

/// Scale range explored by [`find_scaled`]
pub const SCALE_LOWER: f32 = 0.8;
pub const SCALE_UPPER: f32 = 1.2;
const SCALE_STEP: f32 = 0.02;

type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

const METHOD: MatchTemplateMethod = MatchTemplateMethod::CrossCorrelationNormalized;

fn fits(image: (u32, u32), template: (u32, u32)) -> bool {
    template.0 > 0 && template.1 > 0 && template.0 <= image.0 && template.1 <= image.1
}

/// Flat black patches have no defined correlation; score them as 0
fn sanitize(mut map: ScoreMap) -> ScoreMap {
    for p in map.pixels_mut() {
        if !p[0].is_finite() {
            p[0] = 0.0;
        }
    }
    map
}

fn score_gray(image: &GrayImage, template: &GrayImage) -> Option<ScoreMap> {
    fits(image.dimensions(), template.dimensions())
        .then(|| sanitize(match_template(image, template, METHOD)))
}

fn channel(image: &RgbImage, c: usize) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[c]])
    })
}

fn score_color(image: &RgbImage, template: &RgbImage) -> Option<ScoreMap> {
    if !fits(image.dimensions(), template.dimensions()) {
        return None;
    }

    let maps: Vec<ScoreMap> = (0..3)
        .map(|c| sanitize(match_template(&channel(image, c), &channel(template, c), METHOD)))
        .collect();

    let (w, h) = maps[0].dimensions();
    Some(ScoreMap::from_fn(w, h, |x, y| {
        let sum: f32 = maps.iter().map(|m| m.get_pixel(x, y)[0]).sum();
        Luma([sum / 3.0])
    }))
}

/// Best score and its top-left location
fn best_of(map: &ScoreMap) -> (f32, (u32, u32)) {
    let extremes = find_extremes(map);
    (extremes.max_value, extremes.max_value_location)
}

/// Whether the pixels under `region` are too dark to be a real match
pub fn is_obscured(color: &RgbImage, region: &Region) -> bool {
    let Some(area) = region.clamp_to(color.width(), color.height()) else {
        return true;
    };

    let crop = imageops::crop_imm(color, area.x as u32, area.y as u32, area.w as u32, area.h as u32);
    let (sum, count) = crop.pixels().fold((0u64, 0u64), |(sum, count), (_, _, p)| {
        (sum + p[0] as u64 + p[1] as u64 + p[2] as u64, count + 3)
    });
    count == 0 || (sum as f64 / count as f64) < DARKNESS_THRESHOLD
}

/// Single-scale search for the best match of `template`.
///
/// Color matches that sit on dark pixels are rejected since fading overlays
/// and transitions are the usual source of false positives.
pub fn find(frame: &Frame, template: &Template, similarity: f32, color: bool) -> Option<Region> {
    let map = if color {
        score_color(&frame.color, &template.color)?
    } else {
        score_gray(&frame.gray, &template.gray)?
    };

    let (score, (x, y)) = best_of(&map);
    if score < similarity {
        return None;
    }

    let (w, h) = template.gray.dimensions();
    let region = Region::new(x as i32, y as i32, w as i32, h as i32);
    if color && is_obscured(&frame.color, &region) {
        log::debug!("Match for {} at {:?} is obscured", template.name, region);
        return None;
    }
    Some(region)
}

/// Scale factors explored in pairs from both ends toward 1.0
pub fn scale_pairs(lower: f32, upper: f32) -> Vec<(f32, f32)> {
    let middle = (lower + upper) / 2.0;
    let limit = ((middle - lower) * 100.0).round() as usize;

    (0..limit)
        .map(|i| (lower + i as f32 * SCALE_STEP, upper - i as f32 * SCALE_STEP))
        .take_while(|(lo, hi)| hi - lo > SCALE_STEP / 2.0)
        .collect()
}

fn match_at_scale(gray: &GrayImage, template: &GrayImage, scale: f32, similarity: f32) -> Option<Region> {
    let w = (template.width() as f32 * scale).round() as u32;
    let h = (template.height() as f32 * scale).round() as u32;
    if w == 0 || h == 0 {
        return None;
    }

    let filter = if scale < 1.0 {
        FilterType::Triangle
    } else {
        FilterType::CatmullRom
    };
    let resized = imageops::resize(template, w, h, filter);
    let map = score_gray(gray, &resized)?;
    let (score, (x, y)) = best_of(&map);
    (score >= similarity).then(|| Region::new(x as i32, y as i32, w as i32, h as i32))
}

/// Grayscale search that tolerates the element being drawn at another size.
///
/// The template is tried at its own size first. Otherwise every scale pair
/// is matched in parallel and the success closest to 1.0 is returned.
pub fn find_scaled(
    frame: &Frame,
    template: &Template,
    similarity: f32,
    lower: f32,
    upper: f32,
) -> Option<Region> {
    if let Some(region) = match_at_scale(&frame.gray, &template.gray, 1.0, similarity) {
        return Some(region);
    }

    let scales: Vec<f32> = scale_pairs(lower, upper)
        .into_iter()
        .flat_map(|(lo, hi)| [lo, hi])
        .collect();

    let results: Vec<(f32, Region)> = scales
        .par_iter()
        .filter_map(|&scale| {
            match_at_scale(&frame.gray, &template.gray, scale, similarity).map(|r| (scale, r))
        })
        .collect();

    results
        .into_iter()
        .min_by(|a, b| (a.0 - 1.0).abs().total_cmp(&(b.0 - 1.0).abs()))
        .map(|(_, region)| region)
}

/// Every location scoring at least `similarity`, in row-major order
fn raw_matches(map: &ScoreMap, similarity: f32) -> Vec<Point> {
    map.enumerate_pixels()
        .filter(|(_, _, score)| score[0] >= similarity)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect()
}

/// All grayscale matches of `template`, one point per on-screen element.
///
/// With `use_mask` transparent template pixels are ignored.
pub fn find_all(frame: &Frame, template: &Template, similarity: f32, use_mask: bool) -> Vec<Point> {
    if !fits(frame.gray.dimensions(), template.gray.dimensions()) {
        return Vec::new();
    }

    let map = sanitize(match (&template.mask, use_mask) {
        (Some(mask), true) => match_template_with_mask(&frame.gray, &template.gray, METHOD, mask),
        _ => match_template(&frame.gray, &template.gray, METHOD),
    });

    filter_similar_coords(&raw_matches(&map, similarity), MERGE_DISTANCE)
}

/// Matches of a possibly cropped template image, used by `find_button`
pub fn find_all_image(frame: &Frame, template: &GrayImage, similarity: f32) -> Vec<Point> {
    match score_gray(&frame.gray, template) {
        Some(map) => filter_similar_coords(&raw_matches(&map, similarity), MERGE_DISTANCE),
        None => Vec::new(),
    }
}

/// Keep one representative of every cluster of points closer than `distance`.
///
/// Points are visited in order and kept when their nearest already-kept
/// point is further than `distance`, so the first point of a cluster wins.
pub fn filter_similar_coords(coords: &[Point], distance: f64) -> Vec<Point> {
    let mut tree = PointTree::new();
    let mut kept = Vec::new();
    let limit = distance * distance;

    for &coord in coords {
        let far_enough = match tree.nearest(coord) {
            Some((_, d)) => d as f64 > limit,
            None => true,
        };
        if far_enough {
            tree.insert(coord);
            kept.push(coord);
        }
    }

    log::debug!("Filtered coords: {:?}", kept);
    kept
}

#[derive(Debug, Clone)]
struct Node {
    point: Point,
    left: Option<usize>,
    right: Option<usize>,
}

/// Incremental 2-d tree for nearest-neighbour queries
#[derive(Debug, Clone, Default)]
pub struct PointTree {
    nodes: Vec<Node>,
}

impl PointTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut tree = Self::new();
        for &p in points {
            tree.insert(p);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn insert(&mut self, point: Point) {
        let new_index = self.nodes.len();
        self.nodes.push(Node {
            point,
            left: None,
            right: None,
        });
        if new_index == 0 {
            return;
        }

        let mut current = 0;
        let mut depth = 0;
        loop {
            let node = &self.nodes[current];
            let go_left = if depth % 2 == 0 {
                point.x < node.point.x
            } else {
                point.y < node.point.y
            };
            let next = if go_left { node.left } else { node.right };
            match next {
                Some(child) => {
                    current = child;
                    depth += 1;
                }
                None => {
                    let node = &mut self.nodes[current];
                    if go_left {
                        node.left = Some(new_index);
                    } else {
                        node.right = Some(new_index);
                    }
                    return;
                }
            }
        }
    }

    /// Insertion index of the closest point and its squared distance
    pub fn nearest(&self, target: Point) -> Option<(usize, i64)> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = None;
        self.search(0, 0, target, &mut best);
        best
    }

    /// The closest point itself
    pub fn nearest_point(&self, target: Point) -> Option<Point> {
        self.nearest(target).map(|(i, _)| self.nodes[i].point)
    }

    fn search(&self, index: usize, depth: usize, target: Point, best: &mut Option<(usize, i64)>) {
        let node = &self.nodes[index];
        let d = node.point.distance_sq(&target);
        if best.map_or(true, |(_, bd)| d < bd) {
            *best = Some((index, d));
        }

        let diff = if depth % 2 == 0 {
            (target.x - node.point.x) as i64
        } else {
            (target.y - node.point.y) as i64
        };
        let (near, far) = if diff < 0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(near) = near {
            self.search(near, depth + 1, target, best);
        }
        if let Some(far) = far {
            if best.map_or(true, |(_, bd)| diff * diff < bd) {
                self.search(far, depth + 1, target, best);
            }
        }
    }
}
