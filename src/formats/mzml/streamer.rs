//! Streaming mzML parser using quick-xml
//!
//! Pulls `<spectrum>` elements one at a time; everything outside the spectrum
//! list (file description, software, chromatograms) is skipped.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::cv_params::{normalize_retention_time, CvParam, MS_CV_ACCESSIONS};
use super::helpers::{get_attribute, parse_cv_param};
use crate::formats::binary::{BinaryDecoder, Compression, Endian, Precision};
use crate::formats::{ScanSource, SourceError};
use crate::scan::RawScan;

/// Streaming loader for mzML files
pub struct MzMLSource<R: BufRead> {
    reader: Reader<R>,
    spectra_read: usize,
    finished: bool,
}

impl<R: BufRead> MzMLSource<R> {
    /// Create a new loader from a BufRead source
    pub fn new(reader: R) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);

        Self {
            reader: xml_reader,
            spectra_read: 0,
            finished: false,
        }
    }

    /// Number of spectra read so far
    pub fn spectra_read(&self) -> usize {
        self.spectra_read
    }

    /// Parse a single spectrum element
    fn parse_spectrum(&mut self, start_event: &BytesStart) -> Result<RawScan, SourceError> {
        let default_array_length: Option<usize> =
            get_attribute(start_event, "defaultArrayLength")?.and_then(|s| s.parse().ok());

        let mut scan = RawScan {
            ms_level: 1,
            ..Default::default()
        };
        let mut scan_time: Option<f64> = None;
        let mut isolation_target: Option<f64> = None;

        let mut depth = 1;
        let mut in_precursor_list = false;
        let mut current_binary_array: Option<BinaryArrayContext> = None;
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    match e.name().as_ref() {
                        b"cvParam" => {
                            let cv_param = parse_cv_param(e)?;
                            Self::route_cv_param(
                                &mut scan,
                                &mut scan_time,
                                &mut isolation_target,
                                current_binary_array.as_mut(),
                                in_precursor_list,
                                cv_param,
                            );
                        }
                        b"precursorList" => in_precursor_list = true,
                        b"binaryDataArray" => {
                            current_binary_array = Some(BinaryArrayContext::default());
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    if e.name().as_ref() == b"cvParam" {
                        let cv_param = parse_cv_param(e)?;
                        Self::route_cv_param(
                            &mut scan,
                            &mut scan_time,
                            &mut isolation_target,
                            current_binary_array.as_mut(),
                            in_precursor_list,
                            cv_param,
                        );
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if let Some(ref mut ctx) = current_binary_array {
                        ctx.base64_data.push_str(&t.unescape()?);
                    }
                }
                Ok(Event::End(ref e)) => {
                    depth -= 1;
                    match e.name().as_ref() {
                        b"spectrum" if depth == 0 => break,
                        b"precursorList" => in_precursor_list = false,
                        b"binaryDataArray" => {
                            if let Some(ctx) = current_binary_array.take() {
                                ctx.decode_into(&mut scan, default_array_length)?;
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => {
                    return Err(SourceError::InvalidStructure(
                        "Unexpected EOF in spectrum".to_string(),
                    ));
                }
                Err(e) => return Err(SourceError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }

        scan.scan_time = scan_time.ok_or_else(|| {
            SourceError::InvalidStructure(format!(
                "spectrum {} has no scan start time",
                self.spectra_read
            ))
        })?;
        if scan.ms_level > 1 && scan.precursor_mz.is_none() {
            scan.precursor_mz = isolation_target;
        }

        Ok(scan)
    }

    fn route_cv_param(
        scan: &mut RawScan,
        scan_time: &mut Option<f64>,
        isolation_target: &mut Option<f64>,
        binary_array: Option<&mut BinaryArrayContext>,
        in_precursor_list: bool,
        cv: CvParam,
    ) {
        if let Some(ctx) = binary_array {
            ctx.cv_params.push(cv);
            return;
        }

        match cv.accession.as_str() {
            MS_CV_ACCESSIONS::MS_LEVEL => {
                scan.ms_level = cv.value_as_u8().unwrap_or(1);
            }
            MS_CV_ACCESSIONS::SCAN_START_TIME => {
                if let Some(val) = cv.value_as_f64() {
                    *scan_time = Some(normalize_retention_time(val, cv.unit_accession.as_deref()));
                }
            }
            MS_CV_ACCESSIONS::TOTAL_ION_CURRENT => {
                scan.total_ion_current = cv.value_as_f64();
            }
            MS_CV_ACCESSIONS::SELECTED_ION_MZ if in_precursor_list => {
                // First selected ion wins
                if scan.precursor_mz.is_none() {
                    scan.precursor_mz = cv.value_as_f64();
                }
            }
            MS_CV_ACCESSIONS::ISOLATION_WINDOW_TARGET_MZ if in_precursor_list => {
                *isolation_target = cv.value_as_f64();
            }
            _ => {}
        }
    }
}

impl<R: BufRead> ScanSource for MzMLSource<R> {
    fn next_scan(&mut self) -> Result<Option<RawScan>, SourceError> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if e.name().as_ref() == b"spectrum" {
                        let start = e.into_owned();
                        let scan = self.parse_spectrum(&start)?;
                        self.spectra_read += 1;
                        return Ok(Some(scan));
                    }
                }
                Ok(Event::End(ref e)) => {
                    if e.name().as_ref() == b"spectrumList" {
                        self.finished = true;
                        return Ok(None);
                    }
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => return Err(SourceError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }
    }
}

/// Context for parsing binary data arrays
#[derive(Debug, Default)]
struct BinaryArrayContext {
    cv_params: Vec<CvParam>,
    base64_data: String,
}

impl BinaryArrayContext {
    fn decode_into(self, scan: &mut RawScan, expected: Option<usize>) -> Result<(), SourceError> {
        let mut precision = Precision::Float64;
        let mut compression = Compression::None;
        let mut is_mz = false;
        let mut is_intensity = false;

        for cv in &self.cv_params {
            match cv.accession.as_str() {
                MS_CV_ACCESSIONS::FLOAT_32_BIT => precision = Precision::Float32,
                MS_CV_ACCESSIONS::FLOAT_64_BIT => precision = Precision::Float64,
                MS_CV_ACCESSIONS::ZLIB_COMPRESSION => compression = Compression::Zlib,
                MS_CV_ACCESSIONS::NO_COMPRESSION => compression = Compression::None,
                MS_CV_ACCESSIONS::MZ_ARRAY => is_mz = true,
                MS_CV_ACCESSIONS::INTENSITY_ARRAY => is_intensity = true,
                _ => {}
            }
        }

        // Other arrays (time, charge, noise, ...) are not needed
        if !is_mz && !is_intensity {
            return Ok(());
        }

        let values = BinaryDecoder::decode(
            &self.base64_data,
            precision,
            compression,
            Endian::Little,
            expected.filter(|_| !self.base64_data.trim().is_empty()),
        )?;

        if is_mz {
            scan.mz = values;
        } else {
            scan.intensity = values;
        }
        Ok(())
    }
}
