use polars::prelude::*;
use std::fmt;

/// The eight tree-comparison metrics evaluated across every analysis, in the
/// order they appear in the figure grids (top row, then bottom row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Rf,
    Icrf,
    Jrf,
    Ns,
    Mci,
    Spi,
    Msd,
    Msid,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Rf,
        Metric::Icrf,
        Metric::Jrf,
        Metric::Ns,
        Metric::Mci,
        Metric::Spi,
        Metric::Msd,
        Metric::Msid,
    ];

    /// Tag used in the simulation tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Rf => "RF",
            Metric::Icrf => "ICRF",
            Metric::Jrf => "JRF",
            Metric::Ns => "NS",
            Metric::Mci => "MCI",
            Metric::Spi => "SPI",
            Metric::Msd => "MSD",
            Metric::Msid => "MSID",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Metric> {
        match tag {
            "RF" => Some(Metric::Rf),
            "ICRF" => Some(Metric::Icrf),
            "JRF" => Some(Metric::Jrf),
            "NS" => Some(Metric::Ns),
            "MCI" => Some(Metric::Mci),
            "SPI" => Some(Metric::Spi),
            "MSD" => Some(Metric::Msd),
            "MSID" => Some(Metric::Msid),
            _ => None,
        }
    }

    /// Position within [`Metric::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Metric::Rf => 0,
            Metric::Icrf => 1,
            Metric::Jrf => 2,
            Metric::Ns => 3,
            Metric::Mci => 4,
            Metric::Spi => 5,
            Metric::Msd => 6,
            Metric::Msid => 7,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A simulation table on disk that loads into a tidy [`DataFrame`].
pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

pub fn polars_err(e: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(format!("{}", e).into())
}

/// Rendering backends report their own error types; fold them into the
/// pipeline error surface.
pub fn plot_err(e: impl fmt::Display) -> PolarsError {
    PolarsError::ComputeError(format!("{}", e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_tags_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_tag(metric.as_str()), Some(metric));
        }
        assert_eq!(Metric::from_tag("NYE"), None);
    }

    #[test]
    fn metric_index_matches_order() {
        for (idx, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), idx);
        }
    }
}
