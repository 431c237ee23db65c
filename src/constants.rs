//! Application constants for the harp processor
//!
//! Channel schemas, physical units, detector defaults and the published
//! brine salinity coefficient sets.

// =============================================================================
// Log Format
// =============================================================================

/// Lines starting with this marker are ignored by the tokenizer
pub const COMMENT_MARKER: char = '#';

/// Number of whitespace separated fields per line (both layouts)
pub const FIELDS_PER_LINE: usize = 8;

/// Timestamp formats accepted after timezone suffixes have been handled
pub const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%dT%H:%M:%S%.f",
];

// =============================================================================
// Channel Schemas
// =============================================================================

/// Salinity harp channels in file order: `i:k: time r2 d2 r16 d16 temperature logger_temp`
pub mod salinity_channels {
    /// Resistance at 2 kHz
    pub const R2: &str = "r2";
    /// Debugging index of the 2 kHz measurement
    pub const D2: &str = "d2";
    /// Resistance at 16 kHz
    pub const R16: &str = "r16";
    /// Debugging index of the 16 kHz measurement
    pub const D16: &str = "d16";
    /// Temperature at the wire pair
    pub const TEMPERATURE: &str = "temperature";
    /// Temperature of the controller
    pub const LOGGER_TEMP: &str = "logger_temp";

    pub const NAMES: &[&str] = &[R2, D2, R16, D16, TEMPERATURE, LOGGER_TEMP];
    pub const UNITS: &[&str] = &["Ohm", "1", "Ohm", "1", "°C", "°C"];
}

/// Light harp channels: `cnt stick:diode:amplifier time C R G B Temp`
///
/// The amplifier part of the device token is carried as a trailing channel.
/// Logs read at several gains get one variable per channel and gain instead,
/// named `<channel>_amp<gain>`.
pub mod light_channels {
    pub const NAMES: &[&str] = &["C", "R", "G", "B", "Temp", "amplifier"];
    pub const AMPLIFIER: &str = "amplifier";
    pub const UNITS: &[&str] = &["counts", "counts", "counts", "counts", "°C", "1"];
}

// =============================================================================
// Derived Variables
// =============================================================================

pub mod derived {
    pub const BRINE_SALINITY: &str = "brine_salinity";
    pub const LIQUID_FRACTION: &str = "liquid_fraction";
    pub const SOLID_FRACTION: &str = "solid_fraction";
    pub const BULK_SALINITY: &str = "bulk_salinity";

    pub const SALINITY_UNIT: &str = "g/kg";
    pub const FRACTION_UNIT: &str = "1";
}

// =============================================================================
// Reference Resistance Detection Defaults
// =============================================================================

/// Resistance channel used for salinity evaluation
pub const DEFAULT_RESISTANCE_CHANNEL: &str = salinity_channels::R16;

/// Lag (in samples) of the centered difference
pub const DEFAULT_GRADIENT_LAG: usize = 20;

/// Lower and upper bound of the derivative band marking freeze onset
pub const DEFAULT_TOLERANCE: (f64, f64) = (1e-4, 3e-4);

/// Window of the moving median applied to raw series and derivatives
pub const DEFAULT_MEDIAN_WINDOW: usize = 11;

/// Butterworth low-pass order and normalised cutoff (fraction of Nyquist)
pub const DEFAULT_BUTTERWORTH_ORDER: usize = 2;
pub const DEFAULT_BUTTERWORTH_CUTOFF: f64 = 0.05;

/// Savitzky-Golay window length and polynomial order
pub const DEFAULT_SAVGOL_WINDOW: usize = 21;
pub const DEFAULT_SAVGOL_POLYORDER: usize = 3;

// =============================================================================
// Brine Salinity Coefficients (S = a + bT + cT² + dT³)
// =============================================================================

pub mod brine_coefficients {
    /// Assur (1958)
    pub const ASSUR: [f64; 4] = [-1.20, -21.8, -0.919, -0.0178];
    /// Notz & Worster (2009)
    pub const NOTZ_WORSTER: [f64; 4] = [0.0, -21.4, -0.886, -0.0170];
    /// Vancoppenolle et al. (2019), doi:10.1029/2018JC014611
    pub const VANCOPPENOLLE: [f64; 4] = [0.0, -18.7, -0.519, -0.00535];
}

// =============================================================================
// Cache Defaults
// =============================================================================

pub const DEFAULT_CACHE_CAPACITY: usize = 1;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

// =============================================================================
// Discovery
// =============================================================================

/// File patterns considered harp logs during discovery
pub const LOG_FILE_PATTERNS: &[&str] = &["*.dat", "*.txt", "*.log"];
