//! # Raw file loaders
//!
//! Every supported container format implements [`ScanSource`], which yields
//! format-independent [`RawScan`] records. The format is decided exactly once,
//! in [`open_source`], from the file extension; nothing downstream branches on
//! the source format.
//!
//! | Extension | Loader |
//! |-----------|--------|
//! | `.mzML`   | [`mzml::MzMLSource`] |
//! | `.mzXML`  | [`mzxml::MzXMLSource`] |

use std::path::Path;

use crate::scan::RawScan;

#[cfg(feature = "mzml")]
pub mod binary;
#[cfg(feature = "mzml")]
pub mod mzml;
#[cfg(feature = "mzml")]
pub mod mzxml;

/// Errors raised while loading a raw file
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing XML
    #[cfg(feature = "mzml")]
    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// Error decoding binary data arrays
    #[cfg(feature = "mzml")]
    #[error("Binary decode error: {0}")]
    BinaryError(#[from] binary::BinaryDecodeError),

    /// UTF-8 encoding error in text content
    #[error("UTF-8 encoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Invalid document structure
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// File extension does not map to a compiled-in loader
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Capability shared by all raw file loaders
pub trait ScanSource {
    /// Read the next scan, or `None` at the end of the run
    fn next_scan(&mut self) -> Result<Option<RawScan>, SourceError>;

    /// Drain the source into a vector
    fn read_all(&mut self) -> Result<Vec<RawScan>, SourceError> {
        let mut scans = Vec::new();
        while let Some(scan) = self.next_scan()? {
            scans.push(scan);
        }
        Ok(scans)
    }
}

impl<S: ScanSource + ?Sized> ScanSource for Box<S> {
    fn next_scan(&mut self) -> Result<Option<RawScan>, SourceError> {
        (**self).next_scan()
    }
}

/// Supported raw container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// HUPO-PSI mzML
    MzML,
    /// ISB mzXML
    MzXML,
}

impl SourceFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "mzml" => Some(SourceFormat::MzML),
            "mzxml" => Some(SourceFormat::MzXML),
            _ => None,
        }
    }
}

/// Open a raw file with the loader matching its extension
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<Box<dyn ScanSource>, SourceError> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path)
        .ok_or_else(|| SourceError::UnsupportedFormat(path.display().to_string()))?;

    log::debug!("Opening {} as {:?}", path.display(), format);

    #[cfg(feature = "mzml")]
    {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let source: Box<dyn ScanSource> = match format {
            SourceFormat::MzML => Box::new(mzml::MzMLSource::new(reader)),
            SourceFormat::MzXML => Box::new(mzxml::MzXMLSource::new(reader)),
        };
        Ok(source)
    }

    #[cfg(not(feature = "mzml"))]
    {
        Err(SourceError::UnsupportedFormat(format!(
            "{} ({:?} support requires the `mzml` feature)",
            path.display(),
            format
        )))
    }
}

/// Load every scan of a raw file
pub fn load_scans<P: AsRef<Path>>(path: P) -> Result<Vec<RawScan>, SourceError> {
    open_source(path)?.read_all()
}
