//! Image dimension probing for the site build.
//!
//! A browser learns an image's natural size when it loads. At build time the
//! same information comes from the image file on disk, through the
//! [`DimensionProbe`] trait. [`ImageCrateProbe`] reads only the header via the
//! `image` crate, so probing a page's figures is cheap even for large files.

use crate::dom::Dimensions;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unreadable image: {0}")]
    Decode(String),
}

/// Source of natural image sizes.
///
/// Must be `Sync`: pages are enhanced in parallel and share one probe.
pub trait DimensionProbe: Sync {
    fn dimensions(&self, path: &Path) -> Result<Dimensions, ProbeError>;
}

/// Header-only probe backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateProbe;

impl DimensionProbe for ImageCrateProbe {
    fn dimensions(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| match e {
            image::ImageError::IoError(io) => ProbeError::Io(io),
            other => ProbeError::Decode(other.to_string()),
        })?;
        Ok(Dimensions { width, height })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Probe answering from a fixed table keyed by file name.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockProbe {
        pub sizes: HashMap<String, Dimensions>,
        pub probed: Mutex<Vec<PathBuf>>,
    }

    impl MockProbe {
        pub fn with_sizes(sizes: &[(&str, u32, u32)]) -> Self {
            Self {
                sizes: sizes
                    .iter()
                    .map(|&(name, width, height)| (name.to_string(), Dimensions { width, height }))
                    .collect(),
                probed: Mutex::new(Vec::new()),
            }
        }

        pub fn probed(&self) -> Vec<PathBuf> {
            self.probed.lock().unwrap().clone()
        }
    }

    impl DimensionProbe for MockProbe {
        fn dimensions(&self, path: &Path) -> Result<Dimensions, ProbeError> {
            self.probed.lock().unwrap().push(path.to_path_buf());
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.sizes
                .get(&name)
                .copied()
                .ok_or_else(|| ProbeError::Decode(format!("no mock size for {name}")))
        }
    }

    #[test]
    fn image_crate_probe_reads_png_header() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wide.png");
        crate::test_helpers::write_png(&path, 64, 16);
        let dims = ImageCrateProbe.dimensions(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 64, height: 16 });
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = ImageCrateProbe.dimensions(&tmp.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = ImageCrateProbe.dimensions(&path).unwrap_err();
        assert!(matches!(err, ProbeError::Decode(_)));
    }

    #[test]
    fn mock_probe_records_calls() {
        let probe = MockProbe::with_sizes(&[("a.png", 10, 20)]);
        assert!(probe.dimensions(Path::new("x/a.png")).is_ok());
        assert!(probe.dimensions(Path::new("x/b.png")).is_err());
        assert_eq!(probe.probed().len(), 2);
    }
}
