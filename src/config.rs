//! Engine configuration. Every knob has a default and every default can be
//! overridden per engine instance.

/// Tunables for the stripping engine.
#[derive(Debug, Clone)]
pub struct ScrubConfig {
    /// Sources larger than this are rejected before any decode or demux.
    pub max_file_size_mb: u64,
    /// Working ceiling for raster decode; sources whose dimensions exceed
    /// it are downsampled by a power of two, and the delivered output
    /// reflects that (a deliberate lossy-but-bounded policy).
    pub max_working_dimension_px: u32,
    /// Quality for JPEG re-encoding, 0-100.
    pub jpeg_quality: u8,
    /// Overwrite passes for secure temp-file erasure.
    pub secure_erase_passes: u32,
    /// Buffer size used while overwriting.
    pub secure_erase_buffer_bytes: usize,
    /// Entries kept by the optional source-size cache.
    pub size_cache_entries: usize,
    /// Logical directory below the sink root for permanent artifacts.
    pub logical_dir: String,
    /// Directory for operation-scoped staging files; the system temp dir
    /// when `None`.
    pub staging_dir: Option<std::path::PathBuf>,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_working_dimension_px: 4096,
            jpeg_quality: 95,
            secure_erase_passes: 3,
            secure_erase_buffer_bytes: 64 * 1024,
            size_cache_entries: 64,
            logical_dir: "Scrubbed".to_owned(),
            staging_dir: None,
        }
    }
}

impl ScrubConfig {
    pub(crate) fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ScrubConfig::default();
        assert_eq!(c.max_file_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(c.max_working_dimension_px, 4096);
        assert_eq!(c.jpeg_quality, 95);
        assert_eq!(c.secure_erase_passes, 3);
        assert_eq!(c.secure_erase_buffer_bytes, 65536);
    }
}
