//! Engine configuration

/// Options shared by the evaluator and the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineOptions {
    /// Iteration cap for Newton-Raphson solvers (RATE, IRR)
    pub max_iterations: u32,
    /// Resolve `Sheet!A1` references against the other sheets of a workbook
    pub enable_cross_sheet_refs: bool,
    /// Leave error sentinels (`#REF!`, `#NAME?`, `#VALUE!`) in failing cells instead of 0
    pub strict_mode: bool,
    /// Read ambiguous slash dates (`03/04/2024`) as day/month/year
    pub prefer_day_first_dates: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            enable_cross_sheet_refs: true,
            strict_mode: false,
            prefer_day_first_dates: false,
        }
    }
}

impl EngineOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_cross_sheet_refs(mut self, enabled: bool) -> Self {
        self.enable_cross_sheet_refs = enabled;
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_day_first_dates(mut self, day_first: bool) -> Self {
        self.prefer_day_first_dates = day_first;
        self
    }

    /// Slash-date order implied by [`prefer_day_first_dates`](Self::prefer_day_first_dates)
    pub fn date_order(&self) -> crate::date::DateOrder {
        if self.prefer_day_first_dates {
            crate::date::DateOrder::DayFirst
        } else {
            crate::date::DateOrder::MonthFirst
        }
    }
}
