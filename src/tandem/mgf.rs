//! Mascot Generic Format (MGF) reading and writing
//!
//! ```text
//! BEGIN IONS
//! TITLE=scan=12 precursor=101.0600
//! PEPMASS=101.06
//! MSLEVEL=2
//! RTINSECONDS=14.2
//! 45.03 120.5
//! 57.07 88
//! END IONS
//!
//! ```
//!
//! Numbers are written with Rust's shortest round-trip formatting, so a parsed
//! block writes back byte for byte. Unknown `KEY=VALUE` headers are ignored on
//! read.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::TandemSpectrum;

/// Errors from MGF reading or writing
#[derive(Debug, thiserror::Error)]
pub enum MgfError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed content
    #[error("MGF parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },
}

fn parse_error(line: usize, message: impl Into<String>) -> MgfError {
    MgfError::Parse {
        line,
        message: message.into(),
    }
}

/// Write spectra as MGF blocks
///
/// Fragments with intensity at or below `min_fragment_intensity` are dropped.
pub fn write_mgf<W: Write>(
    writer: &mut W,
    spectra: &[TandemSpectrum],
    min_fragment_intensity: f64,
) -> Result<(), MgfError> {
    for spectrum in spectra {
        writeln!(writer, "BEGIN IONS")?;
        if let Some(title) = &spectrum.title {
            writeln!(writer, "TITLE={}", title)?;
        }
        writeln!(writer, "PEPMASS={}", spectrum.precursor_mz)?;
        writeln!(writer, "MSLEVEL={}", spectrum.ms_level)?;
        if let Some(rt) = spectrum.retention_time {
            writeln!(writer, "RTINSECONDS={}", rt)?;
        }
        for &(mz, intensity) in &spectrum.peaks {
            if intensity > min_fragment_intensity {
                writeln!(writer, "{} {}", mz, intensity)?;
            }
        }
        writeln!(writer, "END IONS")?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Render spectra as an MGF string
pub fn to_mgf_string(spectra: &[TandemSpectrum], min_fragment_intensity: f64) -> String {
    let mut buffer = Vec::new();
    // Writing to a Vec cannot fail
    let _ = write_mgf(&mut buffer, spectra, min_fragment_intensity);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Write spectra to an MGF file
pub fn write_mgf_file<P: AsRef<Path>>(
    path: P,
    spectra: &[TandemSpectrum],
    min_fragment_intensity: f64,
) -> Result<(), MgfError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_mgf(&mut writer, spectra, min_fragment_intensity)?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Default)]
struct Block {
    start_line: usize,
    title: Option<String>,
    precursor_mz: Option<f64>,
    ms_level: Option<u8>,
    retention_time: Option<f64>,
    peaks: Vec<(f64, f64)>,
}

impl Block {
    fn finish(self) -> Result<TandemSpectrum, MgfError> {
        let precursor_mz = self
            .precursor_mz
            .ok_or_else(|| parse_error(self.start_line, "block has no PEPMASS"))?;
        Ok(TandemSpectrum {
            precursor_mz,
            ms_level: self.ms_level.unwrap_or(2),
            peaks: self.peaks,
            title: self.title,
            retention_time: self.retention_time,
        })
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, line: usize, what: &str) -> Result<T, MgfError> {
    text.trim()
        .parse()
        .map_err(|_| parse_error(line, format!("invalid {} '{}'", what, text.trim())))
}

/// Read every block of an MGF stream
pub fn read_mgf<R: BufRead>(reader: R) -> Result<Vec<TandemSpectrum>, MgfError> {
    let mut spectra = Vec::new();
    let mut block: Option<Block> = None;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match block.as_mut() {
            None => {
                if line == "BEGIN IONS" {
                    block = Some(Block {
                        start_line: line_no,
                        ..Default::default()
                    });
                } else {
                    return Err(parse_error(line_no, format!("expected BEGIN IONS, found '{}'", line)));
                }
            }
            Some(current) => {
                if line == "END IONS" {
                    if let Some(done) = block.take() {
                        spectra.push(done.finish()?);
                    }
                } else if line == "BEGIN IONS" {
                    return Err(parse_error(line_no, "nested BEGIN IONS"));
                } else if let Some((key, value)) = line.split_once('=') {
                    match key.trim().to_ascii_uppercase().as_str() {
                        "TITLE" => current.title = Some(value.to_string()),
                        "PEPMASS" => {
                            // PEPMASS may carry an intensity after the m/z
                            let mz = value.split_whitespace().next().unwrap_or("");
                            current.precursor_mz = Some(parse_number(mz, line_no, "PEPMASS")?);
                        }
                        "MSLEVEL" => current.ms_level = Some(parse_number(value, line_no, "MSLEVEL")?),
                        "RTINSECONDS" => {
                            current.retention_time = Some(parse_number(value, line_no, "RTINSECONDS")?)
                        }
                        _ => {}
                    }
                } else {
                    let mut fields = line.split_whitespace();
                    let (Some(mz), Some(intensity)) = (fields.next(), fields.next()) else {
                        return Err(parse_error(line_no, format!("expected '<mz> <intensity>', found '{}'", line)));
                    };
                    current.peaks.push((
                        parse_number(mz, line_no, "fragment m/z")?,
                        parse_number(intensity, line_no, "fragment intensity")?,
                    ));
                }
            }
        }
    }

    if let Some(open) = block {
        return Err(parse_error(open.start_line, "block is missing END IONS"));
    }
    Ok(spectra)
}

/// Parse MGF text
pub fn parse_mgf(text: &str) -> Result<Vec<TandemSpectrum>, MgfError> {
    read_mgf(text.as_bytes())
}

/// Read an MGF file
pub fn read_mgf_file<P: AsRef<Path>>(path: P) -> Result<Vec<TandemSpectrum>, MgfError> {
    read_mgf(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "BEGIN IONS\nTITLE=scan=3 precursor=101.0600\nPEPMASS=101.06\nMSLEVEL=2\nRTINSECONDS=14.25\n45.03 120.5\n57.0701 88\nEND IONS\n\n";

    #[test]
    fn test_parse_block() {
        let spectra = parse_mgf(BLOCK).unwrap();

        assert_eq!(spectra.len(), 1);
        let s = &spectra[0];
        assert_eq!(s.precursor_mz, 101.06);
        assert_eq!(s.ms_level, 2);
        assert_eq!(s.title.as_deref(), Some("scan=3 precursor=101.0600"));
        assert_eq!(s.retention_time, Some(14.25));
        assert_eq!(s.peaks, vec![(45.03, 120.5), (57.0701, 88.0)]);
    }

    #[test]
    fn test_write_round_trip_is_exact() {
        let spectra = parse_mgf(BLOCK).unwrap();
        assert_eq!(to_mgf_string(&spectra, 0.001), BLOCK);
    }

    #[test]
    fn test_writer_drops_faint_fragments() {
        let spectrum = TandemSpectrum::new(88.5, 2, vec![(20.0, 0.0005), (30.0, 0.001), (40.0, 5.0)]);
        let text = to_mgf_string(&[spectrum], 0.001);
        assert_eq!(text, "BEGIN IONS\nPEPMASS=88.5\nMSLEVEL=2\n40 5\nEND IONS\n\n");
    }

    #[test]
    fn test_pepmass_with_intensity_and_defaults() {
        let spectra = parse_mgf("BEGIN IONS\nPEPMASS=120.5 3000\nCHARGE=1+\n10 1\nEND IONS\n").unwrap();
        assert_eq!(spectra[0].precursor_mz, 120.5);
        assert_eq!(spectra[0].ms_level, 2);
        assert_eq!(spectra[0].title, None);
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let err = parse_mgf("BEGIN IONS\nPEPMASS=1\n10 abc\nEND IONS\n").unwrap_err();
        assert!(matches!(err, MgfError::Parse { line: 3, .. }));

        let err = parse_mgf("BEGIN IONS\nMSLEVEL=2\nEND IONS\n").unwrap_err();
        assert!(matches!(err, MgfError::Parse { line: 1, .. }));

        let err = parse_mgf("BEGIN IONS\nPEPMASS=1\n").unwrap_err();
        assert!(matches!(err, MgfError::Parse { line: 1, .. }));

        assert!(parse_mgf("PEPMASS=1\n").is_err());
    }
}
