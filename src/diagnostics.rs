/// Diagnostic dump channel
///
/// Writes captures and intermediate grids as tagged, line-oriented blocks
/// for offline plotting. A block opens with a start line carrying its label
/// and closes with `--eod--`; a transmission closes with `--eot--`.

use crate::grid::Grid;
use crate::hal::Sample;
use std::fmt::Display;
use std::io::{self, Write};
use tracing::debug;

pub const TAG_FILE: &str = "--file--";
pub const TAG_EOD: &str = "--eod--";
pub const TAG_EOT: &str = "--eot--";

/// Everything captured while training one word
#[derive(Debug, Clone, Copy)]
pub struct TrainingDump<'a> {
    pub word: &'a str,
    pub samples: &'a [Sample],
    pub spectrogram: &'a Grid<u16>,
    pub average_pool: &'a Grid<i32>,
    pub reduced: &'a Grid<i32>,
}

pub struct DiagnosticWriter<W: Write> {
    out: W,
}

impl<W: Write> DiagnosticWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// One sample per line
    pub fn write_samples(&mut self, label: &str, samples: &[Sample]) -> io::Result<()> {
        self.begin(label)?;
        for sample in samples {
            writeln!(self.out, "{}", sample)?;
        }
        self.end()
    }

    /// One grid row per line, cells separated by spaces
    pub fn write_grid<T: Copy + Display>(&mut self, label: &str, grid: &Grid<T>) -> io::Result<()> {
        self.begin(label)?;
        for row in grid.iter_rows() {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(self.out, "{}", line.join(" "))?;
        }
        self.end()
    }

    /// Close the transmission
    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", TAG_EOT)?;
        self.out.flush()
    }

    /// Raw window, spectrogram and both pooling stages, then end of transmission
    pub fn write_training(&mut self, dump: &TrainingDump<'_>) -> io::Result<()> {
        debug!("Dumping {} training diagnostics", dump.word);
        self.write_samples(&format!("{}_xt.dat", dump.word), dump.samples)?;
        self.write_grid(&format!("{}_spect.dat", dump.word), dump.spectrogram)?;
        self.write_grid(&format!("{}_pool1.dat", dump.word), dump.average_pool)?;
        self.write_grid(&format!("{}_pool2.dat", dump.word), dump.reduced)?;
        self.finish()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn begin(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "........{} --{}--", TAG_FILE, label)
    }

    fn end(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", TAG_EOD)
    }
}
