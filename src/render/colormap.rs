use plotters::style::RGBColor;

/// ColorBrewer RdBu, reversed: deep blue for the coldest value, deep red for
/// the warmest, near white in the middle.
const RD_BU_R: [(u8, u8, u8); 11] = [
    (0x05, 0x30, 0x61),
    (0x21, 0x66, 0xac),
    (0x43, 0x93, 0xc3),
    (0x92, 0xc5, 0xde),
    (0xd1, 0xe5, 0xf0),
    (0xf7, 0xf7, 0xf7),
    (0xfd, 0xdb, 0xc7),
    (0xf4, 0xa5, 0x82),
    (0xd6, 0x60, 0x4d),
    (0xb2, 0x18, 0x2b),
    (0x67, 0x00, 0x1f),
];

/// Linear map from a value range onto the diverging colormap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    min: f64,
    max: f64,
}

impl ColorScale {
    /// Scale spanning `min..=max`. A degenerate range maps everything to the
    /// midpoint colour.
    pub fn new(min: f64, max: f64) -> Self {
        ColorScale { min, max }
    }

    /// Position of `value` in `0.0..=1.0`.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if !span.is_finite() || span <= 0.0 || !value.is_finite() {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    /// The `(min, max)` the scale was built with.
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn color(&self, value: f64) -> RGBColor {
        rd_bu_r(self.normalize(value))
    }
}

/// Samples the reversed RdBu map at `t` in `0.0..=1.0`.
pub fn rd_bu_r(t: f64) -> RGBColor {
    let scaled = t.clamp(0.0, 1.0) * (RD_BU_R.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(RD_BU_R.len() - 2);
    let frac = scaled - lower as f64;
    let (r0, g0, b0) = RD_BU_R[lower];
    let (r1, g1, b1) = RD_BU_R[lower + 1];
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_midpoint() {
        assert_eq!(rd_bu_r(0.0), RGBColor(0x05, 0x30, 0x61));
        assert_eq!(rd_bu_r(1.0), RGBColor(0x67, 0x00, 0x1f));
        assert_eq!(rd_bu_r(0.5), RGBColor(0xf7, 0xf7, 0xf7));
        assert_eq!(rd_bu_r(-3.0), rd_bu_r(0.0));
    }

    #[test]
    fn interpolates_between_stops() {
        let RGBColor(r, g, b) = rd_bu_r(0.05);
        assert_eq!((r, g, b), (0x13, 0x4b, 0x87));
    }

    #[test]
    fn scale_maps_range_onto_colormap() {
        let scale = ColorScale::new(-2.0, 2.0);
        assert_eq!(scale.normalize(-2.0), 0.0);
        assert_eq!(scale.normalize(0.0), 0.5);
        assert_eq!(scale.normalize(5.0), 1.0);
        assert_eq!(scale.color(2.0), rd_bu_r(1.0));
        assert_eq!(ColorScale::new(1.0, 1.0).normalize(1.0), 0.5);
    }
}
