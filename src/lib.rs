//! # breathXplorer - Breath Mass Spectrometry Feature Extraction
//!
//! `breathxplorer` turns raw breath-analysis MS runs into aligned feature
//! tables. A run is a sequence of scans acquired while a subject exhales into
//! the source; volatile compounds show up as ion traces that rise and fall with
//! each breath.
//!
//! ## Pipeline
//!
//! ```text
//! .mzML / .mzXML
//!      │ formats::open_source
//!      ▼
//! Vec<RawScan> ──► ChromatogramBuilder ──► PeakDetector ──► FeatureSet
//!                  (m/z buckets)           (topological       │
//!                                           or mixture)       │ QualityFilter (RSD)
//!                                                             ▼
//!                         AlignmentEngine ◄── FeatureSet, FeatureSet, …
//!                               │
//!                               ▼
//!                            Sample ──► AnnotationEngine / TandemRetriever
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use breathxplorer::prelude::*;
//!
//! let scans = load_scans("breath_01.mzML")?;
//! let extraction = FeatureExtractor::default().extract(
//!     "breath_01",
//!     &scans,
//!     false,
//!     0.5,
//!     PeakMethod::Topological,
//!     1,
//! )?;
//! let filtered = QualityFilter::new().filter(&extraction.feature_set, 0.5);
//!
//! let sample = AlignmentEngine::default().align_default(&[filtered], &["breath_01"])?;
//! println!("{}", sample);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`tolerance`]: absolute and ppm m/z windows
//! - [`scan`]: the format-independent scan record
//! - [`formats`]: mzML and mzXML loaders
//! - [`chromatogram`]: m/z bucketing into ion traces
//! - [`peak`]: topological and Gaussian-mixture peak detection
//! - [`feature`]: extraction, feature sets and RSD filtering
//! - [`alignment`]: cross-sample m/z alignment
//! - [`annotation`]: adduct and isotope relationships
//! - [`tandem`]: MS/MS retrieval and MGF I/O
//! - [`table`]: CSV feature and aligned tables
//! - [`report`]: run reports and JSON summaries

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
// Allow some patterns common in scientific code
#![allow(clippy::too_many_arguments)]

pub mod alignment;
pub mod annotation;
pub mod chromatogram;
pub mod feature;
pub mod formats;
pub mod peak;
pub mod report;
pub mod scan;
pub mod table;
pub mod tandem;
pub mod tolerance;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::alignment::{AlignedRow, AlignmentConfig, AlignmentEngine, AlignmentError, Sample};
    pub use crate::annotation::{
        Annotated, AnnotationConfig, AnnotationEngine, Relation, RelationKind, ADDUCT_RULES,
        ISOTOPE_RULES,
    };
    pub use crate::chromatogram::{Chromatogram, ChromatogramBuilder, ChromatogramConfig, IonTrace};
    pub use crate::feature::{
        relative_std_dev, rsd_quantile, time_union, ExtractError, Extraction, ExtractionConfig,
        ExtractionWarning, Feature, FeatureExtractor, FeatureSet, MzTable, QualityFilter,
    };
    pub use crate::formats::{load_scans, open_source, ScanSource, SourceError, SourceFormat};
    pub use crate::peak::{
        Detection, DetectionWarning, GaussianMixtureDetector, MixtureConfig, PeakAlgorithm,
        PeakDetector, PeakInterval, PeakMethod, TopologicalConfig, TopologicalDetector,
    };
    pub use crate::report::{RunEntry, RunRecord, RunReport, RunStatus, RunSummary};
    pub use crate::scan::RawScan;
    pub use crate::table::{
        read_feature_set, read_sample, write_annotated_sample, write_feature_set, write_sample,
        TableError,
    };
    pub use crate::tandem::{
        parse_mgf, read_mgf_file, write_mgf_file, MgfError, TandemConfig, TandemRetriever,
        TandemSpectrum,
    };
    pub use crate::tolerance::Tolerance;
}
