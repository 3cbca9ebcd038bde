//! Outer contours of binary images and the shape measures computed on them.

use image::{GrayImage, Luma};
use imageproc::{
    contours::{BorderType, find_contours},
    point::Point,
};

use crate::Rect;

/// The outer border of one connected foreground region.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    points: Vec<Point<i32>>,
}

/// Rotated rectangle: centre, side lengths and orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    pub angle: f64,
}

impl RotatedRect {
    /// Reorder so that `w >= h` and fold the angle into `[0, 180)`.
    pub fn canonical(self) -> Self {
        let (w, h, angle) = if self.w < self.h {
            (self.h, self.w, self.angle - 90.0)
        } else {
            (self.w, self.h, self.angle)
        };
        Self {
            w,
            h,
            angle: angle.rem_euclid(180.0),
            ..self
        }
    }
}

/// Top-level outer contours of the nonzero pixels of `binary`.
pub fn external_blobs(binary: &GrayImage) -> Vec<Blob> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Blob::new(c.points))
        .collect()
}

impl Blob {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Union of several blobs, as the points of their joint convex hull.
    pub fn merged<'a, I: IntoIterator<Item = &'a Blob>>(blobs: I) -> Self {
        let all: Vec<Point<i32>> = blobs
            .into_iter()
            .flat_map(|b| b.points.iter().copied())
            .collect();
        Self::new(convex_hull(&all))
    }

    pub fn points(&self) -> &[Point<i32>] {
        &self.points
    }

    /// Polygon area of the border, as enclosed by pixel centres.
    pub fn area(&self) -> f64 {
        shoelace(&self.points).abs()
    }

    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                (((b.x - a.x) as f64).powi(2) + ((b.y - a.y) as f64).powi(2)).sqrt()
            })
            .sum()
    }

    /// `4π·area/perimeter²`; 1 for a perfect disc.
    pub fn circularity(&self) -> f64 {
        let p = self.perimeter();
        if p <= 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area() / (p * p)
    }

    pub fn centroid(&self) -> (f64, f64) {
        let a = shoelace(&self.points);
        let n = self.points.len();
        if a.abs() < 1e-9 {
            let n = n.max(1) as f64;
            let sx: f64 = self.points.iter().map(|p| p.x as f64).sum();
            let sy: f64 = self.points.iter().map(|p| p.y as f64).sum();
            return (sx / n, sy / n);
        }
        let (mut cx, mut cy) = (0.0, 0.0);
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            let cross = (p.x as f64) * (q.y as f64) - (q.x as f64) * (p.y as f64);
            cx += (p.x + q.x) as f64 * cross;
            cy += (p.y + q.y) as f64 * cross;
        }
        (cx / (6.0 * a), cy / (6.0 * a))
    }

    pub fn bounding_rect(&self) -> Rect {
        let xs = self.points.iter().map(|p| p.x);
        let ys = self.points.iter().map(|p| p.y);
        let (x0, x1) = (xs.clone().min().unwrap_or(0), xs.max().unwrap_or(-1));
        let (y0, y1) = (ys.clone().min().unwrap_or(0), ys.max().unwrap_or(-1));
        Rect {
            x: x0,
            y: y0,
            w: (x1 - x0 + 1).max(0) as u32,
            h: (y1 - y0 + 1).max(0) as u32,
        }
    }

    pub fn hull(&self) -> Vec<Point<i32>> {
        convex_hull(&self.points)
    }

    /// Paint the region enclosed by the border onto `canvas`.
    pub fn fill(&self, canvas: &mut GrayImage, value: u8) {
        fill_polygon(canvas, &self.points, value);
    }

    /// Smallest enclosing rotated rectangle of the convex hull.
    pub fn min_area_rect(&self) -> RotatedRect {
        let hull: Vec<(f64, f64)> = self
            .hull()
            .iter()
            .map(|p| (p.x as f64, p.y as f64))
            .collect();
        min_area_rect(&hull)
    }
}

fn shoelace(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64
        })
        .sum();
    twice as f64 / 2.0
}

pub fn convex_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    if points.len() < 3 {
        let mut out = points.to_vec();
        out.dedup();
        return out;
    }
    imageproc::geometry::convex_hull(points)
}

/// Fill `polygon` (an open ring) onto `canvas`, clipping to its bounds.
pub fn fill_polygon(canvas: &mut GrayImage, polygon: &[Point<i32>], value: u8) {
    let mut ring = polygon.to_vec();
    ring.dedup();
    // imageproc rejects explicitly closed rings
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() >= 3 {
        imageproc::drawing::draw_polygon_mut(canvas, &ring, Luma([value]));
    } else {
        let (w, h) = canvas.dimensions();
        for p in ring {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < w && (p.y as u32) < h {
                canvas.put_pixel(p.x as u32, p.y as u32, Luma([value]));
            }
        }
    }
}

/// Rotating calipers over a convex polygon.
fn min_area_rect(hull: &[(f64, f64)]) -> RotatedRect {
    match hull {
        [] => RotatedRect {
            cx: 0.0,
            cy: 0.0,
            w: 0.0,
            h: 0.0,
            angle: 0.0,
        },
        [p] => RotatedRect {
            cx: p.0,
            cy: p.1,
            w: 0.0,
            h: 0.0,
            angle: 0.0,
        },
        _ => {
            let n = hull.len();
            let mut best: Option<(f64, RotatedRect)> = None;
            for i in 0..n {
                let a = hull[i];
                let b = hull[(i + 1) % n];
                let (dx, dy) = (b.0 - a.0, b.1 - a.1);
                let len = (dx * dx + dy * dy).sqrt();
                if len < 1e-12 {
                    continue;
                }
                let u = (dx / len, dy / len);
                let v = (-u.1, u.0);
                let (mut u0, mut u1, mut v0, mut v1) =
                    (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
                for p in hull {
                    let (px, py) = (p.0 - a.0, p.1 - a.1);
                    let pu = px * u.0 + py * u.1;
                    let pv = px * v.0 + py * v.1;
                    u0 = u0.min(pu);
                    u1 = u1.max(pu);
                    v0 = v0.min(pv);
                    v1 = v1.max(pv);
                }
                let area = (u1 - u0) * (v1 - v0);
                let mu = (u0 + u1) / 2.0;
                let mv = (v0 + v1) / 2.0;
                let rect = RotatedRect {
                    cx: a.0 + mu * u.0 + mv * v.0,
                    cy: a.1 + mu * u.1 + mv * v.1,
                    w: u1 - u0,
                    h: v1 - v0,
                    angle: u.1.atan2(u.0).to_degrees(),
                };
                if best.as_ref().is_none_or(|(best_area, _)| area < *best_area) {
                    best = Some((area, rect));
                }
            }
            match best {
                Some((_, rect)) => rect,
                None => RotatedRect {
                    cx: hull[0].0,
                    cy: hull[0].1,
                    w: 0.0,
                    h: 0.0,
                    angle: 0.0,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect as IRect};

    #[test]
    fn filled_square_measures() {
        let mut img = GrayImage::new(40, 40);
        draw_filled_rect_mut(&mut img, IRect::at(10, 5).of_size(11, 21), Luma([255u8]));
        let blobs = external_blobs(&img);
        assert_eq!(blobs.len(), 1);
        let b = &blobs[0];
        assert_eq!(
            b.bounding_rect(),
            Rect {
                x: 10,
                y: 5,
                w: 11,
                h: 21
            }
        );
        assert!((b.area() - 200.0).abs() < 1e-9);
        let (cx, cy) = b.centroid();
        assert!((cx - 15.0).abs() < 1e-9);
        assert!((cy - 15.0).abs() < 1e-9);

        let r = b.min_area_rect().canonical();
        assert!((r.w - 20.0).abs() < 1e-9);
        assert!((r.h - 10.0).abs() < 1e-9);
        assert!((r.angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn holes_do_not_count_as_blobs() {
        let mut img = GrayImage::new(40, 40);
        draw_filled_rect_mut(&mut img, IRect::at(5, 5).of_size(30, 30), Luma([255u8]));
        draw_filled_rect_mut(&mut img, IRect::at(15, 15).of_size(10, 10), Luma([0u8]));
        draw_filled_rect_mut(&mut img, IRect::at(18, 18).of_size(3, 3), Luma([255u8]));
        assert_eq!(external_blobs(&img).len(), 1);
    }

    #[test]
    fn canonical_orientation() {
        let r = RotatedRect {
            cx: 0.0,
            cy: 0.0,
            w: 3.0,
            h: 8.0,
            angle: 30.0,
        }
        .canonical();
        assert_eq!((r.w, r.h), (8.0, 3.0));
        assert!((r.angle - 120.0).abs() < 1e-12);
        let r = RotatedRect {
            angle: -45.0,
            ..r
        }
        .canonical();
        assert!((r.angle - 135.0).abs() < 1e-12);
    }
}
