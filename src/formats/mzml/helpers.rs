use quick_xml::events::BytesStart;

use super::cv_params::CvParam;
use crate::formats::SourceError;

/// Get an attribute value from a start or empty element
pub(crate) fn get_attribute(e: &BytesStart, name: &str) -> Result<Option<String>, SourceError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SourceError::XmlError(quick_xml::Error::from(e)))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = std::str::from_utf8(&attr.value)?.to_string();
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Parse a cvParam element
pub(super) fn parse_cv_param(e: &BytesStart) -> Result<CvParam, SourceError> {
    Ok(CvParam {
        accession: get_attribute(e, "accession")?.unwrap_or_default(),
        value: get_attribute(e, "value")?,
        unit_accession: get_attribute(e, "unitAccession")?,
    })
}
