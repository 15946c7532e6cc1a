// THEORY:
// The `geometry` module is the shape collaborator of the tracker. The association
// engine never looks at raw shapes; it only needs four answers about them: where is
// the center, what is the minimal rotated box, how large is the area, and do two
// rotated boxes touch. Those four questions form the `Geometry` trait.
//
// Two shape representations are supported:
// 1.  **Contours**: closed polygons, as produced by a contour-following detector.
//     Area and center come from the polygon's zeroth and first moments.
// 2.  **Pixel blobs**: plain sets of foreground pixels, as produced by the
//     reference `blob_detector`. Every pixel is a unit square.
//
// The minimal oriented box of a contour is found by testing every edge direction of
// the convex hull (the optimal box always has one side collinear with a hull edge).
// Pixel blobs live on the integer grid, so their box comes from `imageproc`'s
// rotating calipers over the pixel corners, rounded back to the grid. Box
// intersection uses the separating-axis theorem on the four box edge normals.

use imageproc::point::Point;
use std::f64::consts::PI;

/// A point or vector in continuous image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    fn dot(&self, other: &Point2) -> f64 {
        self.x * other.x + self.y * other.y
    }
}

/// A rectangle rotated about its center. `angle` is in radians, measured from the
/// x axis to the side of length `width`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotatedRect {
    pub center: Point2,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl RotatedRect {
    pub const fn new(center: Point2, width: f64, height: f64, angle: f64) -> Self {
        Self {
            center,
            width,
            height,
            angle,
        }
    }

    /// An axis-aligned rectangle from its top-left corner and size.
    pub fn axis_aligned(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Point2::new(x + width / 2.0, y + height / 2.0), width, height, 0.0)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Unit vectors along the width and height sides.
    fn axes(&self) -> (Point2, Point2) {
        let (sin, cos) = self.angle.sin_cos();
        (Point2::new(cos, sin), Point2::new(-sin, cos))
    }

    /// Corners in counter-clockwise order.
    pub fn corners(&self) -> [Point2; 4] {
        let (u, v) = self.axes();
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        let c = self.center;
        let at = |a: f64, b: f64| Point2::new(c.x + u.x * a + v.x * b, c.y + u.y * a + v.y * b);
        [at(-hw, -hh), at(hw, -hh), at(hw, hh), at(-hw, hh)]
    }

    /// True when the box has a finite center, finite angle and strictly positive sides.
    pub fn is_well_formed(&self) -> bool {
        self.center.is_finite()
            && self.angle.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// A closed polygon. The last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    pub points: Vec<Point2>,
}

impl Contour {
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }
}

/// A connected set of foreground pixels, each addressed by its top-left corner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PixelBlob {
    pub pixels: Vec<(u32, u32)>,
}

/// The shape operations the tracker relies on.
pub trait Geometry {
    type Shape;

    /// Center of mass, or `None` when it is undefined (zero-area shapes).
    fn center_of(&self, shape: &Self::Shape) -> Option<Point2>;

    fn oriented_bounding_box_of(&self, shape: &Self::Shape) -> RotatedRect;

    fn area_of(&self, shape: &Self::Shape) -> f64;

    fn intersects(&self, a: &RotatedRect, b: &RotatedRect) -> bool {
        rects_intersect(a, b)
    }
}

/// Geometry over closed polygon contours.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContourGeometry;

impl Geometry for ContourGeometry {
    type Shape = Contour;

    fn center_of(&self, shape: &Contour) -> Option<Point2> {
        let signed_area = signed_area(&shape.points);
        if signed_area == 0.0 || !signed_area.is_finite() {
            return None;
        }
        let n = shape.points.len();
        let (mut cx, mut cy) = (0.0, 0.0);
        for i in 0..n {
            let p = shape.points[i];
            let q = shape.points[(i + 1) % n];
            let cross = p.x * q.y - q.x * p.y;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        let factor = 1.0 / (6.0 * signed_area);
        Some(Point2::new(cx * factor, cy * factor))
    }

    fn oriented_bounding_box_of(&self, shape: &Contour) -> RotatedRect {
        min_area_rect(&shape.points)
    }

    fn area_of(&self, shape: &Contour) -> f64 {
        signed_area(&shape.points).abs()
    }
}

/// Geometry over pixel sets, treating each pixel as a unit square.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelBlobGeometry;

impl Geometry for PixelBlobGeometry {
    type Shape = PixelBlob;

    fn center_of(&self, shape: &PixelBlob) -> Option<Point2> {
        if shape.pixels.is_empty() {
            return None;
        }
        let n = shape.pixels.len() as f64;
        let (sx, sy) = shape
            .pixels
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64 + 0.5, sy + y as f64 + 0.5));
        Some(Point2::new(sx / n, sy / n))
    }

    fn oriented_bounding_box_of(&self, shape: &PixelBlob) -> RotatedRect {
        if shape.pixels.is_empty() {
            return RotatedRect::default();
        }
        let corners: Vec<Point<i32>> = shape
            .pixels
            .iter()
            .flat_map(|&(x, y)| {
                let (x, y) = (x as i32, y as i32);
                [
                    Point::new(x, y),
                    Point::new(x + 1, y),
                    Point::new(x + 1, y + 1),
                    Point::new(x, y + 1),
                ]
            })
            .collect();
        rect_from_corners(imageproc::geometry::min_area_rect(&corners))
    }

    fn area_of(&self, shape: &PixelBlob) -> f64 {
        shape.pixels.len() as f64
    }
}

/// Rebuilds a `RotatedRect` from four corners listed in order around the rectangle.
fn rect_from_corners(corners: [Point<i32>; 4]) -> RotatedRect {
    let [a, b, c, d] = corners.map(|p| Point2::new(p.x as f64, p.y as f64));
    let center = Point2::new((a.x + b.x + c.x + d.x) / 4.0, (a.y + b.y + c.y + d.y) / 4.0);
    let width = a.distance(&b);
    let height = b.distance(&c);
    let angle = if width > 0.0 {
        normalize_angle((b.y - a.y).atan2(b.x - a.x))
    } else {
        0.0
    };
    RotatedRect::new(center, width, height, angle)
}

/// Shoelace area; positive for counter-clockwise winding.
fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum();
    twice / 2.0
}

fn cross(o: &Point2, a: &Point2, b: &Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain. Returns the hull counter-clockwise without collinear points.
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut sorted: Vec<Point2> = points.iter().copied().filter(Point2::is_finite).collect();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point2> = Vec::with_capacity(sorted.len() * 2);
    for p in sorted.iter() {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// Minimal-area rotated rectangle enclosing `points`.
/// Returns a zero-sized rectangle for empty input.
pub fn min_area_rect(points: &[Point2]) -> RotatedRect {
    let hull = convex_hull(points);
    match hull.len() {
        0 => RotatedRect::default(),
        1 => RotatedRect::new(hull[0], 0.0, 0.0, 0.0),
        2 => {
            let (a, b) = (hull[0], hull[1]);
            let center = Point2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            RotatedRect::new(center, a.distance(&b), 0.0, (b.y - a.y).atan2(b.x - a.x))
        }
        n => {
            let mut best: Option<RotatedRect> = None;
            for i in 0..n {
                let p = hull[i];
                let q = hull[(i + 1) % n];
                let length = p.distance(&q);
                if length == 0.0 {
                    continue;
                }
                let u = Point2::new((q.x - p.x) / length, (q.y - p.y) / length);
                let v = Point2::new(-u.y, u.x);

                let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
                let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
                for h in &hull {
                    let pu = h.dot(&u);
                    let pv = h.dot(&v);
                    min_u = min_u.min(pu);
                    max_u = max_u.max(pu);
                    min_v = min_v.min(pv);
                    max_v = max_v.max(pv);
                }

                let width = max_u - min_u;
                let height = max_v - min_v;
                if best.is_some_and(|b| b.area() <= width * height) {
                    continue;
                }
                let mid_u = (min_u + max_u) / 2.0;
                let mid_v = (min_v + max_v) / 2.0;
                let center = Point2::new(u.x * mid_u + v.x * mid_v, u.y * mid_u + v.y * mid_v);
                best = Some(RotatedRect::new(center, width, height, normalize_angle(u.y.atan2(u.x))));
            }
            best.unwrap_or_default()
        }
    }
}

/// A rectangle is unchanged by a half turn, so angles are kept in [0, pi).
fn normalize_angle(angle: f64) -> f64 {
    angle.rem_euclid(PI)
}

/// Separating-axis test on two rotated rectangles. Touching edges intersect.
pub fn rects_intersect(a: &RotatedRect, b: &RotatedRect) -> bool {
    let corners_a = a.corners();
    let corners_b = b.corners();
    let (au, av) = a.axes();
    let (bu, bv) = b.axes();

    [au, av, bu, bv].iter().all(|axis| {
        let project = |corners: &[Point2; 4]| {
            corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                let d = c.dot(axis);
                (lo.min(d), hi.max(d))
            })
        };
        let (min_a, max_a) = project(&corners_a);
        let (min_b, max_b) = project(&corners_b);
        max_a >= min_b && max_b >= min_a
    })
}
