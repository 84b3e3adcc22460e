//! Text extent estimation used for auto width and auto height.

use mdsheet_conf::SpecAutofitConf;

/// Pluggable estimate of how much room a cell's text needs.
pub trait TextExtentEstimator {
    /// Unclamped column width in character units for the longest line of `text`.
    fn estimate_width(&self, text: &str) -> f64;

    /// Wrapped line count of `text`; at least 1.
    fn estimate_lines(&self, text: &str) -> usize;

    /// Row height in points for a wrapped line count.
    fn estimate_height(&self, n_lines: usize) -> f64;
}

/// Default estimator: full-width characters take two units, ASCII one.
#[derive(Debug, Clone, PartialEq)]
pub struct EastAsianTextExtent {
    n_font_size: f64,
    cfg_autofit: SpecAutofitConf,
}

impl EastAsianTextExtent {
    /// Build from the workbook font size and autofit tuning.
    pub fn new(n_font_size: f64, cfg_autofit: SpecAutofitConf) -> Self {
        Self {
            n_font_size,
            cfg_autofit,
        }
    }
}

impl TextExtentEstimator for EastAsianTextExtent {
    fn estimate_width(&self, text: &str) -> f64 {
        let n_units_max = text
            .split('\n')
            .map(calculate_text_width_units)
            .max()
            .unwrap_or(0);

        n_units_max as f64 * (self.n_font_size / self.cfg_autofit.font_size_base)
            * self.cfg_autofit.width_multiplier
    }

    fn estimate_lines(&self, text: &str) -> usize {
        let n_chars_per_line = self.cfg_autofit.chars_per_line.max(1);
        text.split('\n')
            .map(|line| calculate_text_width_units(line).div_ceil(n_chars_per_line).max(1))
            .sum()
    }

    fn estimate_height(&self, n_lines: usize) -> f64 {
        let n_height = n_lines as f64 * self.n_font_size * self.cfg_autofit.line_spacing;
        n_height.max(self.cfg_autofit.height_min)
    }
}

/// Display width units: 2 per non-ASCII char, 1 per ASCII char.
pub fn calculate_text_width_units(text: &str) -> usize {
    text.chars()
        .map(|chr| if chr.is_ascii() { 1 } else { 2 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_estimator(n_font_size: f64) -> EastAsianTextExtent {
        EastAsianTextExtent::new(n_font_size, SpecAutofitConf::default())
    }

    #[test]
    fn width_units_count_full_width_twice() {
        assert_eq!(calculate_text_width_units(""), 0);
        assert_eq!(calculate_text_width_units("abc"), 3);
        assert_eq!(calculate_text_width_units("ログイン"), 8);
        assert_eq!(calculate_text_width_units("ID/PWが正しい"), 5 + 8);
    }

    #[test]
    fn width_uses_longest_line_scaled_by_font() {
        let estimator = derive_estimator(11.0);
        let n_width = estimator.estimate_width("ab\nabcdefghij\nabc");
        assert!((n_width - 12.0).abs() < 1e-9);

        let estimator = derive_estimator(22.0);
        let n_width = estimator.estimate_width("ab");
        assert!((n_width - 4.8).abs() < 1e-9);

        assert_eq!(estimator.estimate_width(""), 0.0);
    }

    #[test]
    fn lines_wrap_per_logical_line() {
        let estimator = derive_estimator(10.0);
        assert_eq!(estimator.estimate_lines(""), 1);
        assert_eq!(estimator.estimate_lines("short"), 1);
        assert_eq!(estimator.estimate_lines(&"a".repeat(40)), 1);
        assert_eq!(estimator.estimate_lines(&"a".repeat(41)), 2);
        // 25 full-width chars = 50 units = 2 wrapped lines.
        assert_eq!(estimator.estimate_lines(&"あ".repeat(25)), 2);
        assert_eq!(estimator.estimate_lines("1. a\n2. b\n\n3. c"), 4);
    }

    #[test]
    fn height_has_floor() {
        let estimator = derive_estimator(10.0);
        assert!((estimator.estimate_height(1) - 15.0).abs() < 1e-9);
        assert!((estimator.estimate_height(3) - 45.0).abs() < 1e-9);

        let estimator = derive_estimator(6.0);
        assert!((estimator.estimate_height(1) - 15.0).abs() < 1e-9);
    }
}
