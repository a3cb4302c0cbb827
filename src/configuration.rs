//! Decoder configuration.
//!
//! [`DecoderOptions`] is a builder that sizes the parallel slots and
//! reader caches of [`GopDecoder`](crate::GopDecoder) and
//! [`SampleReader`](crate::SampleReader), and sets decode defaults.
//!
//! # Example
//!
//! ```
//! use frameseek::{DecoderOptions, PixelLayout};
//!
//! let options = DecoderOptions::new()
//!     .with_max_files(8)
//!     .with_readers_per_slot(2)
//!     .with_pixel_layout(PixelLayout::Bgr);
//! assert_eq!(options.max_files(), 8);
//! ```

use crate::decode::PixelLayout;

/// Configuration for the top-level decoding entry points.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// Number of files one request may address, and the number of worker
    /// slots kept warm.
    pub(crate) max_files: usize,
    /// Open readers cached per slot.
    pub(crate) readers_per_slot: usize,
    /// Default output channel order.
    pub(crate) pixel_layout: PixelLayout,
    /// Warn when decoding limited-range streams to RGB.
    pub(crate) warn_limited_color_range: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderOptions {
    /// Create options with defaults: 4 file slots, 2 cached readers per
    /// slot, RGB output, color range warnings on.
    pub fn new() -> Self {
        Self {
            max_files: 4,
            readers_per_slot: 2,
            pixel_layout: PixelLayout::Rgb,
            warn_limited_color_range: true,
        }
    }

    /// Set the number of files a single request may address. Clamped to a
    /// minimum of 1.
    #[must_use]
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    /// Set how many open readers each slot caches. Clamped to a minimum
    /// of 1.
    #[must_use]
    pub fn with_readers_per_slot(mut self, readers: usize) -> Self {
        self.readers_per_slot = readers.max(1);
        self
    }

    /// Set the default output channel order.
    #[must_use]
    pub fn with_pixel_layout(mut self, layout: PixelLayout) -> Self {
        self.pixel_layout = layout;
        self
    }

    /// Enable or disable the warning emitted when limited-range content
    /// is converted to RGB. Defaults to enabled.
    #[must_use]
    pub fn with_color_range_warnings(mut self, enabled: bool) -> Self {
        self.warn_limited_color_range = enabled;
        self
    }

    /// Number of file slots.
    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Cached readers per slot.
    pub fn readers_per_slot(&self) -> usize {
        self.readers_per_slot
    }

    /// Default output channel order.
    pub fn pixel_layout(&self) -> PixelLayout {
        self.pixel_layout
    }
}
