//! # mzML Loader
//!
//! Streaming reader for HUPO-PSI mzML files. Spectra are pulled one at a time
//! with quick-xml; binary data arrays are decoded as they close, so memory use
//! is bounded by a single spectrum.
//!
//! ```text
//! mzML
//! └── run
//!     └── spectrumList
//!         └── spectrum              -> RawScan
//!             ├── cvParam          (ms level, TIC)
//!             ├── scanList/scan
//!             │   └── cvParam      (scan start time + unit)
//!             ├── precursorList
//!             │   └── precursor
//!             │       ├── isolationWindow/cvParam  (target m/z)
//!             │       └── selectedIonList/selectedIon/cvParam  (selected m/z)
//!             └── binaryDataArrayList
//!                 └── binaryDataArray   (m/z | intensity, Base64)
//! ```
//!
//! Scan times are normalized to seconds.

mod cv_params;
pub(super) mod helpers;
mod streamer;

pub use cv_params::{normalize_retention_time, CvParam, MS_CV_ACCESSIONS};
pub use streamer::MzMLSource;
