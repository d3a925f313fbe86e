//! # mzXML Loader
//!
//! Streaming reader for ISB mzXML files.
//!
//! mzXML keeps scan metadata in attributes and nests fragment scans inside
//! their parent survey scan:
//!
//! ```text
//! mzXML
//! └── msRun
//!     └── scan  (num, msLevel, peaksCount, retentionTime="PT12.5S")
//!         ├── peaks  (interleaved m/z,intensity; network byte order)
//!         └── scan  (msLevel="2")
//!             ├── precursorMz  (text)
//!             └── peaks
//! ```
//!
//! Scans are emitted in document order of their opening tags, so a parent is
//! always yielded before the fragment scans nested in it.

use std::collections::VecDeque;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::binary::{BinaryDecoder, Compression, Endian, Precision};
use super::mzml::helpers::get_attribute;
use super::{ScanSource, SourceError};
use crate::scan::RawScan;

/// Streaming loader for mzXML files
pub struct MzXMLSource<R: BufRead> {
    reader: Reader<R>,
    /// Scans whose opening tag has been seen, in document order
    pending: VecDeque<Option<RawScan>>,
    /// Scans still open, innermost last (index into `pending` + partial state)
    open: Vec<OpenScan>,
    finished: bool,
}

#[derive(Debug)]
struct OpenScan {
    slot: usize,
    scan: RawScan,
    peaks_count: Option<usize>,
}

#[derive(Debug, Default)]
struct PeaksContext {
    precision: Precision,
    compression: Compression,
    endian: Option<Endian>,
    base64_data: String,
}

#[derive(Debug)]
enum TextTarget {
    Peaks(PeaksContext),
    Precursor(String),
}

impl<R: BufRead> MzXMLSource<R> {
    /// Create a new loader from a BufRead source
    pub fn new(reader: R) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);

        Self {
            reader: xml_reader,
            pending: VecDeque::new(),
            open: Vec::new(),
            finished: false,
        }
    }

    fn pop_ready(&mut self) -> Option<RawScan> {
        if matches!(self.pending.front(), Some(Some(_))) {
            let scan = self.pending.pop_front().flatten();
            // Shift slot indexes of scans still open
            for open in &mut self.open {
                open.slot -= 1;
            }
            return scan;
        }
        None
    }

    fn open_scan(&mut self, e: &BytesStart) -> Result<(), SourceError> {
        let ms_level = match get_attribute(e, "msLevel")? {
            Some(level) => level.trim().parse::<u8>().map_err(|_| {
                SourceError::InvalidStructure(format!("invalid msLevel '{}'", level))
            })?,
            None => 1,
        };
        let retention = get_attribute(e, "retentionTime")?.ok_or_else(|| {
            SourceError::InvalidStructure("scan without retentionTime".to_string())
        })?;
        let scan_time = parse_duration(&retention).ok_or_else(|| {
            SourceError::InvalidStructure(format!("invalid retentionTime '{}'", retention))
        })?;
        let total_ion_current =
            get_attribute(e, "totIonCurrent")?.and_then(|v| v.trim().parse::<f64>().ok());
        let peaks_count =
            get_attribute(e, "peaksCount")?.and_then(|v| v.trim().parse::<usize>().ok());

        let slot = self.pending.len();
        self.pending.push_back(None);
        self.open.push(OpenScan {
            slot,
            scan: RawScan {
                scan_time,
                ms_level,
                total_ion_current,
                ..Default::default()
            },
            peaks_count,
        });
        Ok(())
    }

    fn close_scan(&mut self) -> Result<(), SourceError> {
        let open = self.open.pop().ok_or_else(|| {
            SourceError::InvalidStructure("unbalanced </scan>".to_string())
        })?;
        if let Some(slot) = self.pending.get_mut(open.slot) {
            *slot = Some(open.scan);
        }
        Ok(())
    }

    fn finish_text(&mut self, target: TextTarget) -> Result<(), SourceError> {
        let Some(open) = self.open.last_mut() else {
            return Ok(());
        };
        match target {
            TextTarget::Precursor(text) => {
                open.scan.precursor_mz = text.trim().parse::<f64>().ok();
            }
            TextTarget::Peaks(ctx) => {
                let expected = open
                    .peaks_count
                    .map(|n| n * 2)
                    .filter(|_| !ctx.base64_data.trim().is_empty());
                let values = BinaryDecoder::decode(
                    &ctx.base64_data,
                    ctx.precision,
                    ctx.compression,
                    ctx.endian.unwrap_or(Endian::Big),
                    expected,
                )?;
                if values.len() % 2 != 0 {
                    return Err(SourceError::InvalidStructure(
                        "odd number of values in interleaved peaks".to_string(),
                    ));
                }
                let (mz, intensity): (Vec<f64>, Vec<f64>) =
                    values.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip();
                open.scan.mz = mz;
                open.scan.intensity = intensity;
            }
        }
        Ok(())
    }
}

fn peaks_context(e: &BytesStart) -> Result<PeaksContext, SourceError> {
    let precision = match get_attribute(e, "precision")? {
        Some(bits) => Precision::from_bits(&bits).ok_or_else(|| {
            SourceError::InvalidStructure(format!("unsupported peaks precision '{}'", bits))
        })?,
        None => Precision::Float32,
    };
    let compression = match get_attribute(e, "compressionType")?.as_deref() {
        Some("zlib") => Compression::Zlib,
        Some("none") | None => Compression::None,
        Some(other) => {
            return Err(SourceError::InvalidStructure(format!(
                "unsupported compressionType '{}'",
                other
            )))
        }
    };
    let endian = match get_attribute(e, "byteOrder")?.as_deref() {
        Some("little") => Some(Endian::Little),
        _ => Some(Endian::Big),
    };
    if let Some(order) = get_attribute(e, "pairOrder")?.or(get_attribute(e, "contentType")?) {
        if order != "m/z-int" {
            return Err(SourceError::InvalidStructure(format!(
                "unsupported peaks pair order '{}'",
                order
            )));
        }
    }

    Ok(PeaksContext {
        precision,
        compression,
        endian,
        base64_data: String::new(),
    })
}

impl<R: BufRead> ScanSource for MzXMLSource<R> {
    fn next_scan(&mut self) -> Result<Option<RawScan>, SourceError> {
        if let Some(scan) = self.pop_ready() {
            return Ok(Some(scan));
        }
        if self.finished {
            return Ok(None);
        }

        let mut text_target: Option<TextTarget> = None;
        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"scan" => self.open_scan(e)?,
                    b"peaks" if !self.open.is_empty() => {
                        text_target = Some(TextTarget::Peaks(peaks_context(e)?));
                    }
                    b"precursorMz" if !self.open.is_empty() => {
                        text_target = Some(TextTarget::Precursor(String::new()));
                    }
                    _ => {}
                },
                Ok(Event::Empty(ref e)) => {
                    // `<peaks .../>` carries no data points
                    if e.name().as_ref() == b"peaks" && !self.open.is_empty() {
                        self.finish_text(TextTarget::Peaks(peaks_context(e)?))?;
                    }
                }
                Ok(Event::Text(ref t)) => match text_target {
                    Some(TextTarget::Peaks(ref mut ctx)) => ctx.base64_data.push_str(&t.unescape()?),
                    Some(TextTarget::Precursor(ref mut text)) => text.push_str(&t.unescape()?),
                    None => {}
                },
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"peaks" | b"precursorMz" => {
                        if let Some(target) = text_target.take() {
                            self.finish_text(target)?;
                        }
                    }
                    b"scan" => {
                        self.close_scan()?;
                        if let Some(scan) = self.pop_ready() {
                            return Ok(Some(scan));
                        }
                    }
                    b"msRun" => {
                        self.finished = true;
                        break;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => {
                    self.finished = true;
                    break;
                }
                Err(e) => return Err(SourceError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }

        if !self.open.is_empty() {
            return Err(SourceError::InvalidStructure(
                "Unexpected EOF in scan".to_string(),
            ));
        }
        Ok(self.pop_ready())
    }
}

/// Parse an `xs:duration` retention time (`PT1M30.5S`) into seconds
///
/// Bare numbers are accepted and taken as seconds.
pub fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(seconds) = text.parse::<f64>() {
        return Some(seconds);
    }

    let rest = text.strip_prefix("PT").or_else(|| text.strip_prefix("-PT"))?;
    let negative = text.starts_with('-');

    let mut total = 0.0;
    let mut number = String::new();
    for c in rest.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'H' | 'M' | 'S' => {
                let value: f64 = number.parse().ok()?;
                total += match c {
                    'H' => value * 3600.0,
                    'M' => value * 60.0,
                    _ => value,
                };
                number.clear();
            }
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }

    Some(if negative { -total } else { total })
}
