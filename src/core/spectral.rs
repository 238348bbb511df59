//! Rolling-window spectral decomposition into EEG band powers.
//!
//! Each chunk shifts a fixed-length window of raw samples and the whole
//! window is transformed again. Band power is the mean normalized magnitude
//! of the one-sided spectrum over the bins that fall inside a band. No
//! windowing function or filtering is applied, so DC offset and leakage pass
//! straight through.

use crate::config::Config;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::sync::Arc;

/// Standard EEG frequency bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }
}

/// Frequency range of a band. Both edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandEdge {
    pub band: Band,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl BandEdge {
    pub const fn new(band: Band, low_hz: f64, high_hz: f64) -> Self {
        Self {
            band,
            low_hz,
            high_hz,
        }
    }

    /// Whether a frequency falls inside `[low_hz, high_hz]`.
    ///
    /// Shared edges (4, 8, 13 and 30 Hz) land in both neighbouring bands.
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz <= self.high_hz
    }
}

pub const DEFAULT_BAND_EDGES: [BandEdge; 5] = [
    BandEdge::new(Band::Delta, 0.5, 4.0),
    BandEdge::new(Band::Theta, 4.0, 8.0),
    BandEdge::new(Band::Alpha, 8.0, 13.0),
    BandEdge::new(Band::Beta, 13.0, 30.0),
    BandEdge::new(Band::Gamma, 30.0, 50.0),
];

/// Mean spectral magnitude per band for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl BandPowers {
    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    pub fn set(&mut self, band: Band, power: f64) {
        match band {
            Band::Delta => self.delta = power,
            Band::Theta => self.theta = power,
            Band::Alpha => self.alpha = power,
            Band::Beta => self.beta = power,
            Band::Gamma => self.gamma = power,
        }
    }

    /// Sum of all band powers.
    pub fn total(&self) -> f64 {
        self.delta + self.theta + self.alpha + self.beta + self.gamma
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, f64)> + '_ {
        Band::ALL.into_iter().map(move |band| (band, self.get(band)))
    }

    /// The band with the largest power.
    pub fn dominant(&self) -> Band {
        self.iter()
            .fold((Band::Delta, f64::MIN), |best, (band, power)| {
                if power > best.1 {
                    (band, power)
                } else {
                    best
                }
            })
            .0
    }
}

/// Errors raised while configuring or feeding the spectral processor.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralError {
    /// Buffer capacity of zero samples
    EmptyWindow,
    /// Sample rate of zero
    InvalidSampleRate,
    /// Band edges that are reversed, negative or above Nyquist
    InvalidBandEdge { band: Band, low_hz: f64, high_hz: f64 },
    /// The same band configured twice
    DuplicateBand(Band),
    /// A chunk longer than the rolling buffer
    ChunkTooLong { chunk_len: usize, capacity: usize },
}

impl std::fmt::Display for SpectralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpectralError::EmptyWindow => write!(f, "Rolling buffer must hold at least one sample"),
            SpectralError::InvalidSampleRate => write!(f, "Sample rate must be positive"),
            SpectralError::InvalidBandEdge {
                band,
                low_hz,
                high_hz,
            } => write!(
                f,
                "Invalid {} band edges [{low_hz}, {high_hz}] Hz",
                band.name()
            ),
            SpectralError::DuplicateBand(band) => {
                write!(f, "Band {} configured more than once", band.name())
            }
            SpectralError::ChunkTooLong {
                chunk_len,
                capacity,
            } => write!(
                f,
                "Chunk of {chunk_len} samples exceeds buffer capacity of {capacity}"
            ),
        }
    }
}

impl std::error::Error for SpectralError {}

/// Fixed-capacity FIFO sample window.
///
/// Starts zero-filled so it is always exactly at capacity.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    samples: Vec<f64>,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Result<Self, SpectralError> {
        if capacity == 0 {
            return Err(SpectralError::EmptyWindow);
        }
        Ok(Self {
            samples: vec![0.0; capacity],
        })
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    /// Shift left by `chunk.len()` and write the chunk into the tail.
    pub fn push(&mut self, chunk: &[f64]) -> Result<(), SpectralError> {
        let capacity = self.samples.len();
        let n = chunk.len();
        if n > capacity {
            return Err(SpectralError::ChunkTooLong {
                chunk_len: n,
                capacity,
            });
        }
        self.samples.copy_within(n.., 0);
        self.samples[capacity - n..].copy_from_slice(chunk);
        Ok(())
    }
}

/// Turns a stream of sample chunks into band powers.
pub struct SpectralProcessor {
    sample_rate: f64,
    buffer: RollingBuffer,
    fft: Arc<dyn Fft<f64>>,
    spectrum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
    band_bins: Vec<(Band, Vec<usize>)>,
}

impl SpectralProcessor {
    /// Create a processor with the standard band edges.
    pub fn new(sample_rate: u32, window_seconds: u32) -> Result<Self, SpectralError> {
        Self::with_edges(sample_rate, window_seconds, &DEFAULT_BAND_EDGES)
    }

    pub fn from_config(config: &Config) -> Result<Self, SpectralError> {
        Self::new(config.sample_rate, config.buffer_window_seconds)
    }

    /// Create a processor with custom band edges.
    pub fn with_edges(
        sample_rate: u32,
        window_seconds: u32,
        edges: &[BandEdge],
    ) -> Result<Self, SpectralError> {
        if sample_rate == 0 {
            return Err(SpectralError::InvalidSampleRate);
        }
        let sample_rate = sample_rate as f64;
        let buffer = RollingBuffer::new(sample_rate as usize * window_seconds as usize)?;
        let len = buffer.capacity();
        let nyquist = sample_rate / 2.0;

        let mut seen = Vec::with_capacity(edges.len());
        for edge in edges {
            let valid = edge.low_hz.is_finite()
                && edge.high_hz.is_finite()
                && edge.low_hz >= 0.0
                && edge.low_hz < edge.high_hz
                && edge.high_hz <= nyquist;
            if !valid {
                return Err(SpectralError::InvalidBandEdge {
                    band: edge.band,
                    low_hz: edge.low_hz,
                    high_hz: edge.high_hz,
                });
            }
            if seen.contains(&edge.band) {
                return Err(SpectralError::DuplicateBand(edge.band));
            }
            seen.push(edge.band);
        }

        // Bin frequencies never change, so resolve band membership once.
        let bin_count = len / 2 + 1;
        let band_bins = edges
            .iter()
            .map(|edge| {
                let bins = (0..bin_count)
                    .filter(|&k| edge.contains(bin_frequency(k, sample_rate, len)))
                    .collect();
                (edge.band, bins)
            })
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            sample_rate,
            buffer,
            fft,
            spectrum: vec![Complex::new(0.0, 0.0); len],
            scratch,
            magnitudes: vec![0.0; bin_count],
            band_bins,
        })
    }

    /// Append a chunk and recompute band powers over the full window.
    pub fn process(&mut self, chunk: &[f64]) -> Result<BandPowers, SpectralError> {
        self.buffer.push(chunk)?;

        for (slot, &sample) in self.spectrum.iter_mut().zip(self.buffer.as_slice()) {
            *slot = Complex::new(sample, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let len = self.buffer.capacity() as f64;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *magnitude = bin.norm() / len;
        }

        let mut powers = BandPowers::default();
        for (band, bins) in &self.band_bins {
            let power = if bins.is_empty() {
                0.0
            } else {
                bins.iter().map(|&k| self.magnitudes[k]).mean()
            };
            powers.set(*band, power);
        }
        Ok(powers)
    }

    /// Current window contents, oldest sample first.
    pub fn buffer(&self) -> &[f64] {
        self.buffer.as_slice()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Frequency of every one-sided spectrum bin.
    pub fn frequencies(&self) -> Vec<f64> {
        let len = self.buffer.capacity();
        (0..self.magnitudes.len())
            .map(|k| bin_frequency(k, self.sample_rate, len))
            .collect()
    }

    /// Spectrum bin indices counted towards a band.
    pub fn band_bins(&self, band: Band) -> &[usize] {
        self.band_bins
            .iter()
            .find(|(b, _)| *b == band)
            .map(|(_, bins)| bins.as_slice())
            .unwrap_or(&[])
    }
}

fn bin_frequency(k: usize, sample_rate: f64, len: usize) -> f64 {
    k as f64 * sample_rate / len as f64
}
