
use crate::config::TraversalConfig;

/// Depth bound for a category query, always inside the configured range.
///
/// A bound of `n` admits members at most `n` membership hops below the
/// root category: `1` is the category's direct members only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Levels(u32);

impl Levels {
    /// Clamp a numeric request into `[min_levels, max_levels]`.
    pub fn clamped(requested: i64, bounds: &TraversalConfig) -> Self {
        let min = i64::from(bounds.min_levels);
        let max = i64::from(bounds.max_levels);
        Levels(requested.clamp(min, max) as u32)
    }

    /// Parse the raw `levels` query parameter.
    ///
    /// Absent, empty or non-numeric input falls back to the default;
    /// numbers outside the range are clamped rather than rejected.
    pub fn parse(raw: Option<&str>, bounds: &TraversalConfig) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => match s.parse::<i64>() {
                Ok(n) => Self::clamped(n, bounds),
                Err(_) => Self::default_for(bounds),
            },
            None => Self::default_for(bounds),
        }
    }

    pub fn default_for(bounds: &TraversalConfig) -> Self {
        Self::clamped(i64::from(bounds.default_levels), bounds)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> TraversalConfig {
        TraversalConfig::default()
    }

    #[test]
    fn test_missing_or_garbage_uses_default() {
        assert_eq!(Levels::parse(None, &bounds()).get(), 2);
        assert_eq!(Levels::parse(Some(""), &bounds()).get(), 2);
        assert_eq!(Levels::parse(Some("deep"), &bounds()).get(), 2);
        assert_eq!(Levels::parse(Some("2.5"), &bounds()).get(), 2);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(Levels::parse(Some("0"), &bounds()).get(), 1);
        assert_eq!(Levels::parse(Some("-7"), &bounds()).get(), 1);
        assert_eq!(Levels::parse(Some("99"), &bounds()).get(), 4);
        assert_eq!(Levels::parse(Some(" 3 "), &bounds()).get(), 3);
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        assert_eq!(Levels::parse(Some("9223372036854775807"), &bounds()).get(), 4);
        // not an i64 at all: treated as non-numeric
        assert_eq!(Levels::parse(Some("99999999999999999999"), &bounds()).get(), 2);
    }
}
