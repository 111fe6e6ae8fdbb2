//! 2D points, vectors, and wire-path sampling.

use std::ops::{Add, Div, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    pub fn distance(&self, other: &Point2D) -> f32 {
        (*self - *other).magnitude()
    }
    pub fn lerp(&self, other: &Point2D, t: f32) -> Point2D {
        Point2D::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl Vec2D {
    pub const ZERO: Vec2D = Vec2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
    pub fn normalize(&self) -> Vec2D {
        let m = self.magnitude();
        if m < f32::EPSILON {
            Vec2D::ZERO
        } else {
            Vec2D::new(self.x / m, self.y / m)
        }
    }
    pub fn scale(&self, factor: f32) -> Vec2D {
        Vec2D::new(self.x * factor, self.y * factor)
    }
    pub fn dot(&self, other: &Vec2D) -> f32 {
        self.x * other.x + self.y * other.y
    }
    pub fn perpendicular(&self) -> Vec2D {
        Vec2D::new(-self.y, self.x)
    }
}

impl Sub for Point2D {
    type Output = Vec2D;
    fn sub(self, rhs: Point2D) -> Vec2D {
        Vec2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl Add<Vec2D> for Point2D {
    type Output = Point2D;
    fn add(self, rhs: Vec2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl Add for Vec2D {
    type Output = Vec2D;
    fn add(self, rhs: Vec2D) -> Vec2D {
        Vec2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl Sub for Vec2D {
    type Output = Vec2D;
    fn sub(self, rhs: Vec2D) -> Vec2D {
        Vec2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl Mul<f32> for Vec2D {
    type Output = Vec2D;
    fn mul(self, rhs: f32) -> Vec2D {
        self.scale(rhs)
    }
}
impl Div<f32> for Vec2D {
    type Output = Vec2D;
    fn div(self, rhs: f32) -> Vec2D {
        Vec2D::new(self.x / rhs, self.y / rhs)
    }
}

/// A single bend in a wire's path. Always pinned exactly on the active path.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct WireBend {
    pub position: Point2D,
    pub max_move_radius: f32,
    pub movable: bool,
}

impl WireBend {
    pub fn new(position: Point2D) -> Self {
        Self {
            position,
            max_move_radius: 40.0,
            movable: true,
        }
    }
}

/// Discretized path sample used for both length computation and
/// `position_at_progress`/`closest_point_on_path`. Smooth mode samples the
/// Catmull-Rom/quadratic-Bezier curve; polyline mode samples the raw
/// segments — both share the same adaptive step count so length and
/// progress stay consistent with each other.
#[derive(Debug, Clone)]
pub struct WirePath {
    points: Vec<Point2D>,
    cumulative: Vec<f32>,
}

impl WirePath {
    /// Build the path through `source -> bends -> destination`.
    pub fn build(source: Point2D, bends: &[WireBend], destination: Point2D, smooth: bool) -> Self {
        let mut controls = Vec::with_capacity(bends.len() + 2);
        controls.push(source);
        controls.extend(bends.iter().map(|b| b.position));
        controls.push(destination);

        let points = if !smooth || controls.len() < 3 {
            controls.clone()
        } else if controls.len() == 3 {
            Self::sample_quadratic(controls[0], controls[1], controls[2])
        } else {
            Self::sample_catmull_rom(&controls)
        };

        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0f32;
        cumulative.push(0.0);
        for pair in points.windows(2) {
            total += pair[0].distance(&pair[1]);
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    fn steps_for(len: f32) -> usize {
        (len / 5.0).floor().max(15.0) as usize
    }

    fn sample_quadratic(p0: Point2D, p1: Point2D, p2: Point2D) -> Vec<Point2D> {
        let approx_len = p0.distance(&p1) + p1.distance(&p2);
        let steps = Self::steps_for(approx_len);
        (0..=steps)
            .map(|i| {
                let t = i as f32 / steps as f32;
                let a = p0.lerp(&p1, t);
                let b = p1.lerp(&p2, t);
                a.lerp(&b, t)
            })
            .collect()
    }

    fn sample_catmull_rom(controls: &[Point2D]) -> Vec<Point2D> {
        let mut out = Vec::new();
        let n = controls.len();
        for i in 0..n - 1 {
            let p0 = controls[if i == 0 { 0 } else { i - 1 }];
            let p1 = controls[i];
            let p2 = controls[i + 1];
            let p3 = controls[if i + 2 < n { i + 2 } else { n - 1 }];
            let approx_len = p1.distance(&p2);
            let steps = Self::steps_for(approx_len);
            let start = if i == 0 { 0 } else { 1 };
            for s in start..=steps {
                let t = s as f32 / steps as f32;
                out.push(catmull_rom_point(p0, p1, p2, p3, t));
            }
        }
        out
    }

    pub fn total_length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Linearly map `progress` in [0,1] to arc length across the sampled points.
    pub fn position_at_progress(&self, progress: f32) -> Point2D {
        let progress = progress.clamp(0.0, 1.0);
        if self.points.is_empty() {
            return Point2D::new(0.0, 0.0);
        }
        if self.points.len() == 1 {
            return self.points[0];
        }
        let target = progress * self.total_length();
        let idx = match self
            .cumulative
            .binary_search_by(|c| c.partial_cmp(&target).unwrap())
        {
            Ok(i) => i,
            Err(i) => i,
        };
        let idx = idx.min(self.points.len() - 1);
        if idx == 0 {
            return self.points[0];
        }
        let seg_start = self.cumulative[idx - 1];
        let seg_end = self.cumulative[idx];
        let seg_len = seg_end - seg_start;
        let t = if seg_len > f32::EPSILON {
            (target - seg_start) / seg_len
        } else {
            0.0
        };
        self.points[idx - 1].lerp(&self.points[idx], t)
    }

    /// Tangent direction of the path near `progress`, used for movement
    /// vectors and collision math.
    pub fn tangent_at_progress(&self, progress: f32) -> Vec2D {
        if self.points.len() < 2 {
            return Vec2D::ZERO;
        }
        let eps = 0.001;
        let a = self.position_at_progress((progress - eps).max(0.0));
        let b = self.position_at_progress((progress + eps).min(1.0));
        (b - a).normalize()
    }

    /// Minimum distance from `p` to any segment of the active path, and the
    /// progress value of the closest point.
    pub fn closest_point_on_path(&self, p: Point2D) -> (Point2D, f32, f32) {
        let mut best_dist = f32::MAX;
        let mut best_point = self.points.first().copied().unwrap_or(p);
        let mut best_progress = 0.0;
        let total = self.total_length().max(f32::EPSILON);
        for i in 0..self.points.len().saturating_sub(1) {
            let a = self.points[i];
            let b = self.points[i + 1];
            let (closest, t) = closest_point_on_segment(a, b, p);
            let dist = closest.distance(&p);
            if dist < best_dist {
                best_dist = dist;
                best_point = closest;
                let seg_len = a.distance(&b);
                best_progress = (self.cumulative[i] + t * seg_len) / total;
            }
        }
        (best_point, best_dist, best_progress.clamp(0.0, 1.0))
    }

    /// Project `pos` onto the closest segment and return the index at which
    /// a new bend inserted there would live.
    pub fn closest_segment_index(&self, pos: Point2D) -> (Point2D, usize) {
        let mut best_dist = f32::MAX;
        let mut best_point = pos;
        let mut best_idx = 0;
        for i in 0..self.points.len().saturating_sub(1) {
            let (closest, _) = closest_point_on_segment(self.points[i], self.points[i + 1], pos);
            let dist = closest.distance(&pos);
            if dist < best_dist {
                best_dist = dist;
                best_point = closest;
                best_idx = i;
            }
        }
        (best_point, best_idx)
    }
}

fn closest_point_on_segment(a: Point2D, b: Point2D, p: Point2D) -> (Point2D, f32) {
    let ab = b - a;
    let len2 = ab.dot(&ab);
    if len2 < f32::EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (a + ab.scale(t), t)
}

fn catmull_rom_point(p0: Point2D, p1: Point2D, p2: Point2D, p3: Point2D, t: f32) -> Point2D {
    let t2 = t * t;
    let t3 = t2 * t;
    let x = 0.5
        * ((2.0 * p1.x)
            + (-p0.x + p2.x) * t
            + (2.0 * p0.x - 5.0 * p1.x + 4.0 * p2.x - p3.x) * t2
            + (-p0.x + 3.0 * p1.x - 3.0 * p2.x + p3.x) * t3);
    let y = 0.5
        * ((2.0 * p1.y)
            + (-p0.y + p2.y) * t
            + (2.0 * p0.y - 5.0 * p1.y + 4.0 * p2.y - p3.y) * t2
            + (-p0.y + 3.0 * p1.y - 3.0 * p2.y + p3.y) * t3);
    Point2D::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_path_is_a_line() {
        let path = WirePath::build(Point2D::new(0.0, 0.0), &[], Point2D::new(100.0, 0.0), true);
        assert!((path.total_length() - 100.0).abs() < 0.5);
        let mid = path.position_at_progress(0.5);
        assert!((mid.x - 50.0).abs() < 1.0);
    }

    #[test]
    fn polyline_length_matches_segment_sum() {
        let bends = vec![WireBend::new(Point2D::new(10.0, 0.0))];
        let path = WirePath::build(Point2D::new(0.0, 0.0), &bends, Point2D::new(10.0, 10.0), false);
        let expected = 10.0 + 10.0;
        assert!((path.total_length() - expected).abs() < 0.01);
    }

    #[test]
    fn bend_lies_exactly_on_smooth_path() {
        let bend_pos = Point2D::new(50.0, 25.0);
        let bends = vec![WireBend::new(bend_pos)];
        let path = WirePath::build(Point2D::new(0.0, 0.0), &bends, Point2D::new(100.0, 0.0), true);
        let (closest, dist, _) = path.closest_point_on_path(bend_pos);
        assert!(dist < 0.5, "bend should lie on path, got dist {dist} closest {closest:?}");
    }

    #[test]
    fn closest_point_on_path_is_zero_for_point_on_path() {
        let path = WirePath::build(Point2D::new(0.0, 0.0), &[], Point2D::new(100.0, 0.0), true);
        let (_, dist, progress) = path.closest_point_on_path(Point2D::new(50.0, 0.0));
        assert!(dist < 0.01);
        assert!((progress - 0.5).abs() < 0.01);
    }
}
