//! Connection curves: horizontal S-shaped cubic beziers with a colour
//! gradient from the source end to the sink end.

use ecolor::Color32;
use emath::{Pos2, pos2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionCurve {
    pub from: Pos2,
    pub to: Pos2,
    pub from_color: Color32,
    pub to_color: Color32,
}

impl ConnectionCurve {
    pub fn new(from: Pos2, to: Pos2, from_color: Color32, to_color: Color32) -> Self {
        Self {
            from,
            to,
            from_color,
            to_color,
        }
    }

    /// Start, two control points, end. Control points sit half the horizontal
    /// separation away from their endpoint, at the endpoint's height.
    pub fn control_points(&self) -> [Pos2; 4] {
        let dx = (self.to.x - self.from.x).abs() * 0.5;
        [
            self.from,
            pos2(self.from.x + dx, self.from.y),
            pos2(self.to.x - dx, self.to.y),
            self.to,
        ]
    }

    pub fn eval(&self, t: f32) -> Pos2 {
        let [p0, p1, p2, p3] = self.control_points();
        let t = t.clamp(0.0, 1.0);
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;
        pos2(x, y)
    }

    /// Linear gradient between the endpoint colours.
    pub fn color_at(&self, t: f32) -> Color32 {
        self.from_color.lerp_to_gamma(self.to_color, t.clamp(0.0, 1.0))
    }

    pub fn sample(&self, segments: usize) -> Vec<Pos2> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.eval(i as f32 / segments as f32))
            .collect()
    }
}
