use image::{GrayImage, Luma};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    /// Smallest rectangle containing every point, both ends inclusive.
    fn bounding(points: &[(i32, i32)]) -> Result<Self> {
        let (mut x0, mut y0) = (i32::MAX, i32::MAX);
        let (mut x1, mut y1) = (i32::MIN, i32::MIN);
        for &(x, y) in points {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        let extent = |lo: i32, hi: i32| {
            u32::try_from(i64::from(hi) - i64::from(lo) + 1).map_err(|_| Error::PolygonTooLarge)
        };
        Ok(Rect {
            x: x0,
            y: y0,
            w: extent(x0, x1)?,
            h: extent(y0, y1)?,
        })
    }

    /// True when the rectangle lies fully inside a `width` x `height` image.
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.w as i64 <= width as i64
            && self.y as i64 + self.h as i64 <= height as i64
    }
}

impl From<RoiFeatures> for Rect {
    fn from(f: RoiFeatures) -> Self {
        Rect {
            x: f.x,
            y: f.y,
            w: f.w,
            h: f.h,
        }
    }
}

/// Flat description of an ROI, as stored alongside the results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiFeatures {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub value: i32,
    pub idx: u32,
}

/// Hands out ROI identities in construction order.
///
/// Each builder owns one, so two calibrations never share a counter.
#[derive(Debug, Clone)]
pub struct RoiIdAllocator {
    next: u32,
}

impl Default for RoiIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl RoiIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u32 {
        let idx = self.next;
        self.next += 1;
        idx
    }

    /// Build an ROI with the next free id.
    pub fn build(&mut self, polygon: Vec<(i32, i32)>) -> Result<Roi> {
        let idx = self.allocate();
        Roi::new(polygon, idx, None)
    }
}

/// A region of interest: a polygon with its bounding rectangle and mask.
///
/// The polygon is fixed at construction. Only the free `value` label may
/// change afterwards.
#[derive(Debug, Clone)]
pub struct Roi {
    polygon: Vec<(i32, i32)>,
    rect: Rect,
    mask: GrayImage,
    idx: u32,
    value: i32,
}

impl Roi {
    /// `value` defaults to `idx`.
    pub fn new(polygon: Vec<(i32, i32)>, idx: u32, value: Option<i32>) -> Result<Self> {
        if idx == 0 {
            return Err(Error::InvalidRoiId);
        }
        if polygon.len() < 3 {
            return Err(Error::DegeneratePolygon(polygon.len()));
        }
        let rect = Rect::bounding(&polygon)?;
        let mask = polygon_mask(&polygon, &rect);
        Ok(Self {
            polygon,
            rect,
            mask,
            idx,
            value: value.unwrap_or(idx as i32),
        })
    }

    pub fn idx(&self) -> u32 {
        self.idx
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn set_value(&mut self, value: i32) {
        self.value = value;
    }

    pub fn polygon(&self) -> &[(i32, i32)] {
        &self.polygon
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Binary mask (255 inside) with the same size as [Self::rect].
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Top-left corner of the bounding rectangle.
    pub fn offset(&self) -> (i32, i32) {
        (self.rect.x, self.rect.y)
    }

    pub fn longest_axis(&self) -> u32 {
        self.rect.w.max(self.rect.h)
    }

    pub fn get_feature_dict(&self) -> RoiFeatures {
        RoiFeatures {
            x: self.rect.x,
            y: self.rect.y,
            w: self.rect.w,
            h: self.rect.h,
            value: self.value,
            idx: self.idx,
        }
    }

    /// Crop `frame` to the bounding rectangle and return it with the mask.
    pub fn apply(&self, frame: &GrayImage) -> Result<(GrayImage, GrayImage)> {
        let (fw, fh) = frame.dimensions();
        if !self.rect.fits_in(fw, fh) {
            return Err(Error::RoiOutOfBounds {
                idx: self.idx,
                rect: self.rect,
                frame_width: fw,
                frame_height: fh,
            });
        }
        let crop = image::imageops::crop_imm(
            frame,
            self.rect.x as u32,
            self.rect.y as u32,
            self.rect.w,
            self.rect.h,
        )
        .to_image();
        Ok((crop, self.mask.clone()))
    }
}

fn polygon_mask(polygon: &[(i32, i32)], rect: &Rect) -> GrayImage {
    let mut mask = GrayImage::new(rect.w, rect.h);
    let mut local: Vec<Point<i32>> = polygon
        .iter()
        .map(|&(x, y)| Point::new(x - rect.x, y - rect.y))
        .collect();
    local.dedup();
    // imageproc rejects explicitly closed polygons
    while local.len() > 1 && local.first() == local.last() {
        local.pop();
    }
    if local.len() >= 3 {
        imageproc::drawing::draw_polygon_mut(&mut mask, &local, Luma([255u8]));
    } else {
        for p in local {
            mask.put_pixel(p.x as u32, p.y as u32, Luma([255u8]));
        }
    }
    mask
}
