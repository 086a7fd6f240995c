use crate::Ratio;

pub const COLOUR_NEUTRAL: &str = "#aaaaaa";
pub const COLOUR_EAST: &str = "#e07b39";
pub const COLOUR_WEST: &str = "#4a90d9";
pub const OPACITY_NEUTRAL: f64 = 0.3;
pub const OPACITY_MIN: f64 = 0.15;
pub const OPACITY_MAX: f64 = 0.75;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Style {
    pub fill: &'static str,
    pub opacity: f64,
}

impl Style {
    /// Colour by the leading side, with opacity growing from a 50/50 tie to unanimity. A tie leans
    /// east.
    pub fn for_share(east_share: Option<f64>) -> Style {
        let Some(share) = east_share else {
            return Style {
                fill: COLOUR_NEUTRAL,
                opacity: OPACITY_NEUTRAL,
            };
        };
        let confidence = (share - 0.5).abs() * 2.0;
        Style {
            fill: if share >= 0.5 {
                COLOUR_EAST
            } else {
                COLOUR_WEST
            },
            opacity: OPACITY_MIN + confidence * (OPACITY_MAX - OPACITY_MIN),
        }
    }

    pub fn for_ratio(ratio: Option<Ratio>) -> Style {
        Style::for_share(ratio.map(Ratio::east_share))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles() {
        assert_eq!(COLOUR_NEUTRAL, Style::for_ratio(None).fill);

        let tie = Style::for_ratio(Ratio::new(1, 1));
        assert_eq!(COLOUR_EAST, tie.fill);
        assert!((tie.opacity - OPACITY_MIN).abs() < 1e-9);

        let west = Style::for_ratio(Ratio::new(0, 4));
        assert_eq!(COLOUR_WEST, west.fill);
        assert!((west.opacity - OPACITY_MAX).abs() < 1e-9);

        let leaning = Style::for_share(Some(0.75));
        assert_eq!(COLOUR_EAST, leaning.fill);
        assert!((leaning.opacity - 0.45).abs() < 1e-9);
    }
}
