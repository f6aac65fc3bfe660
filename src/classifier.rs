/// Squared-error nearest-reference classifier
///
/// A spectrogram is reduced twice (block average, then block peak) and the
/// result compared cell by cell against the light and dark references.

use crate::config::{BlockSize, DetectorConfig};
use crate::grid::Grid;
use crate::pooling::{pool_average, pool_peak, PoolError};
use crate::spectrogram::Spectrogram;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Result of the two-stage reduction
pub type PooledGrid = Grid<i32>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("Reduction failed: {0}")]
    Pool(#[from] PoolError),

    #[error("Shape mismatch: reference is {expected:?}, input is {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// One of the two trained words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Word {
    Light,
    Dark,
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::Light => write!(f, "light"),
            Word::Dark => write!(f, "dark"),
        }
    }
}

/// Ternary classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Light,
    Dark,
    /// Error difference outside both margins; handled like noise
    Undetermined,
}

/// The two trained reference grids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceModel {
    pub light: PooledGrid,
    pub dark: PooledGrid,
}

impl ReferenceModel {
    pub fn new(light: PooledGrid, dark: PooledGrid) -> Self {
        Self { light, dark }
    }

    pub fn get(&self, word: Word) -> &PooledGrid {
        match word {
            Word::Light => &self.light,
            Word::Dark => &self.dark,
        }
    }

    /// Replace the reference for `word` entirely
    pub fn set(&mut self, word: Word, grid: PooledGrid) {
        match word {
            Word::Light => self.light = grid,
            Word::Dark => self.dark = grid,
        }
    }
}

/// Output of a reference build: the final grid and the intermediate average pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub reduced: PooledGrid,
    pub average_pool: PooledGrid,
}

/// Summed squared errors against both references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    pub light_error: i64,
    pub dark_error: i64,
}

impl Scores {
    pub fn delta(&self) -> i64 {
        self.light_error - self.dark_error
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    avg_block: BlockSize,
    peak_block: BlockSize,
    negative_margin: i64,
    positive_margin: i64,
}

impl Classifier {
    pub fn new(avg_block: BlockSize, peak_block: BlockSize, negative_margin: i64, positive_margin: i64) -> Self {
        Self {
            avg_block,
            peak_block,
            negative_margin,
            positive_margin,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(
            config.avg_block,
            config.peak_block,
            config.negative_margin,
            config.positive_margin,
        )
    }

    /// Average pool at the primary block, keep a copy, then peak pool at the secondary block
    pub fn build_reference(&self, spectrogram: &Spectrogram) -> Result<Reduction, ClassifierError> {
        let average_pool: PooledGrid = pool_average(spectrogram, self.avg_block.rows, self.avg_block.cols)?;
        let reduced = pool_peak(&average_pool, self.peak_block.rows, self.peak_block.cols)?;
        Ok(Reduction {
            reduced,
            average_pool,
        })
    }

    pub fn reduce(&self, spectrogram: &Spectrogram) -> Result<PooledGrid, ClassifierError> {
        Ok(self.build_reference(spectrogram)?.reduced)
    }

    pub fn score(&self, spectrogram: &Spectrogram, references: &ReferenceModel) -> Result<Scores, ClassifierError> {
        let reduced = self.reduce(spectrogram)?;
        Ok(Scores {
            light_error: squared_error(&references.light, &reduced)?,
            dark_error: squared_error(&references.dark, &reduced)?,
        })
    }

    pub fn classify(&self, spectrogram: &Spectrogram, references: &ReferenceModel) -> Result<Decision, ClassifierError> {
        let scores = self.score(spectrogram, references)?;
        let decision = self.decide(&scores);
        debug!(
            "lse={} dse={} delta={} -> {:?}",
            scores.light_error,
            scores.dark_error,
            scores.delta(),
            decision
        );
        Ok(decision)
    }

    /// Light for delta in (-N, 0], Dark for delta in (0, P), otherwise Undetermined
    pub fn decide(&self, scores: &Scores) -> Decision {
        let delta = scores.delta();
        if delta <= 0 && delta > -self.negative_margin {
            Decision::Light
        } else if delta > 0 && delta < self.positive_margin {
            Decision::Dark
        } else {
            Decision::Undetermined
        }
    }
}

/// Sum over all cells of the squared difference
pub fn squared_error(reference: &PooledGrid, candidate: &PooledGrid) -> Result<i64, ClassifierError> {
    if reference.shape() != candidate.shape() {
        return Err(ClassifierError::ShapeMismatch {
            expected: reference.shape(),
            found: candidate.shape(),
        });
    }

    Ok(reference
        .cells()
        .iter()
        .zip(candidate.cells())
        .map(|(&r, &c)| {
            let diff = r as i64 - c as i64;
            diff * diff
        })
        .sum())
}
