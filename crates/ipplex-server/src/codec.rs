// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-rolled RFC 8010 SS3 binary IPP codec: parses a request body into
// attribute groups plus trailing document data, and builds responses the
// same way. Generalized from a single hardcoded printer's encoder to one
// that any operation handler in this crate can drive against any printer.

use tracing::warn;

// ---------------------------------------------------------------------------
// Delimiter tags (RFC 8010 SS3.5.1)
// ---------------------------------------------------------------------------

pub const TAG_OPERATION_ATTRIBUTES: u8 = 0x01;
pub const TAG_JOB_ATTRIBUTES: u8 = 0x02;
pub const TAG_END_OF_ATTRIBUTES: u8 = 0x03;
pub const TAG_PRINTER_ATTRIBUTES: u8 = 0x04;
pub const TAG_UNSUPPORTED_ATTRIBUTES: u8 = 0x05;
pub const TAG_SUBSCRIPTION_ATTRIBUTES: u8 = 0x06;
pub const TAG_EVENT_NOTIFICATION_ATTRIBUTES: u8 = 0x07;

// ---------------------------------------------------------------------------
// Value tags (RFC 8010 SS3.5.2)
// ---------------------------------------------------------------------------

pub const VALUE_TAG_UNSUPPORTED: u8 = 0x10;
pub const VALUE_TAG_NO_VALUE: u8 = 0x13;
pub const VALUE_TAG_INTEGER: u8 = 0x21;
pub const VALUE_TAG_BOOLEAN: u8 = 0x22;
pub const VALUE_TAG_ENUM: u8 = 0x23;
pub const VALUE_TAG_DATE_TIME: u8 = 0x31;
pub const VALUE_TAG_TEXT: u8 = 0x41;
pub const VALUE_TAG_NAME: u8 = 0x42;
pub const VALUE_TAG_KEYWORD: u8 = 0x44;
pub const VALUE_TAG_URI: u8 = 0x45;
pub const VALUE_TAG_CHARSET: u8 = 0x47;
pub const VALUE_TAG_NATURAL_LANGUAGE: u8 = 0x48;
pub const VALUE_TAG_MIME_MEDIA_TYPE: u8 = 0x49;

// ---------------------------------------------------------------------------
// IPP version
// ---------------------------------------------------------------------------

pub const IPP_VERSION_MAJOR: u8 = 0x01;
pub const IPP_VERSION_MINOR: u8 = 0x01;

// ---------------------------------------------------------------------------
// Status codes (RFC 8011 SS4.1.8), the subset this server returns
// ---------------------------------------------------------------------------

pub const STATUS_OK: u16 = 0x0000;
pub const STATUS_CLIENT_ERROR_BAD_REQUEST: u16 = 0x0400;
pub const STATUS_CLIENT_ERROR_NOT_FOUND: u16 = 0x0406;
pub const STATUS_CLIENT_ERROR_NOT_POSSIBLE: u16 = 0x0409;
pub const STATUS_CLIENT_ERROR_DOCUMENT_FORMAT_NOT_SUPPORTED: u16 = 0x040A;
pub const STATUS_SERVER_ERROR_OPERATION_NOT_SUPPORTED: u16 = 0x0501;
pub const STATUS_SERVER_ERROR_INTERNAL: u16 = 0x0500;
pub const STATUS_SERVER_ERROR_BUSY: u16 = 0x0509;

/// A single parsed IPP attribute.
#[derive(Debug, Clone)]
pub struct IppAttribute {
    pub value_tag: u8,
    pub name: String,
    pub value: Vec<u8>,
}

/// A group of attributes delimited by a group tag.
#[derive(Debug, Clone)]
pub struct IppAttributeGroup {
    pub delimiter: u8,
    pub attributes: Vec<IppAttribute>,
}

impl IppAttributeGroup {
    pub fn get(&self, name: &str) -> Option<&IppAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|a| String::from_utf8(a.value.clone()).ok())
    }

    pub fn get_integer(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|a| {
            if a.value.len() == 4 {
                Some(i32::from_be_bytes([a.value[0], a.value[1], a.value[2], a.value[3]]))
            } else {
                None
            }
        })
    }

    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|a| a.value.first().map(|b| *b != 0))
    }

    /// All values of a possibly-`1setOf` attribute, following the
    /// additional-value convention (name-length = 0 on repeats).
    pub fn get_all_strings(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut collecting = false;
        for attr in &self.attributes {
            if attr.name == name {
                collecting = true;
            } else if attr.name.is_empty() {
                if !collecting {
                    continue;
                }
            } else {
                collecting = false;
                continue;
            }
            if collecting {
                if let Ok(s) = String::from_utf8(attr.value.clone()) {
                    out.push(s);
                }
            }
        }
        out
    }
}

/// A fully parsed IPP request.
#[derive(Debug)]
pub struct IppRequest {
    pub version_major: u8,
    pub version_minor: u8,
    pub operation_id: u16,
    pub request_id: u32,
    pub attribute_groups: Vec<IppAttributeGroup>,
    pub document_data: Vec<u8>,
}

impl IppRequest {
    pub fn operation_attributes(&self) -> Option<&IppAttributeGroup> {
        self.attribute_groups.iter().find(|g| g.delimiter == TAG_OPERATION_ATTRIBUTES)
    }

    pub fn job_attributes(&self) -> Option<&IppAttributeGroup> {
        self.attribute_groups.iter().find(|g| g.delimiter == TAG_JOB_ATTRIBUTES)
    }
}

/// Parse a raw IPP message body (RFC 8010 SS3.1) into an [`IppRequest`].
pub fn parse_ipp_request(data: &[u8]) -> std::result::Result<IppRequest, String> {
    if data.len() < 8 {
        return Err(format!("IPP request too short: {} bytes (minimum 8)", data.len()));
    }

    let version_major = data[0];
    let version_minor = data[1];
    let operation_id = u16::from_be_bytes([data[2], data[3]]);
    let request_id = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

    let mut pos = 8;
    let mut attribute_groups: Vec<IppAttributeGroup> = Vec::new();
    let mut current_group: Option<IppAttributeGroup> = None;

    while pos < data.len() {
        let tag = data[pos];

        if tag <= 0x0F {
            if let Some(group) = current_group.take() {
                attribute_groups.push(group);
            }
            if tag == TAG_END_OF_ATTRIBUTES {
                pos += 1;
                break;
            }
            current_group = Some(IppAttributeGroup { delimiter: tag, attributes: Vec::new() });
            pos += 1;
            continue;
        }

        let value_tag = tag;
        pos += 1;

        if pos + 2 > data.len() {
            return Err("truncated name-length field".into());
        }
        let name_length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;

        if pos + name_length > data.len() {
            return Err("truncated attribute name".into());
        }
        let name = String::from_utf8_lossy(&data[pos..pos + name_length]).to_string();
        pos += name_length;

        if pos + 2 > data.len() {
            return Err("truncated value-length field".into());
        }
        let value_length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;

        if pos + value_length > data.len() {
            return Err("truncated attribute value".into());
        }
        let value = data[pos..pos + value_length].to_vec();
        pos += value_length;

        let attr = IppAttribute { value_tag, name, value };
        match current_group {
            Some(ref mut group) => group.attributes.push(attr),
            None => warn!("IPP attribute outside of any group -- discarded"),
        }
    }

    if let Some(group) = current_group.take() {
        attribute_groups.push(group);
    }

    let document_data = if pos < data.len() { data[pos..].to_vec() } else { Vec::new() };

    Ok(IppRequest { version_major, version_minor, operation_id, request_id, attribute_groups, document_data })
}

/// Builder for IPP response messages (RFC 8010 SS3.4).
pub struct IppResponseBuilder {
    buf: Vec<u8>,
}

impl IppResponseBuilder {
    pub fn new(status_code: u16, request_id: u32) -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.push(IPP_VERSION_MAJOR);
        buf.push(IPP_VERSION_MINOR);
        buf.extend_from_slice(&status_code.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        Self { buf }
    }

    pub fn begin_group(&mut self, delimiter: u8) -> &mut Self {
        self.buf.push(delimiter);
        self
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_TEXT, name, value.as_bytes())
    }

    pub fn name_attr(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_NAME, name, value.as_bytes())
    }

    pub fn keyword(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_KEYWORD, name, value.as_bytes())
    }

    pub fn keyword_additional(&mut self, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_KEYWORD, "", value.as_bytes())
    }

    pub fn mime_media_type(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_MIME_MEDIA_TYPE, name, value.as_bytes())
    }

    pub fn mime_media_type_additional(&mut self, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_MIME_MEDIA_TYPE, "", value.as_bytes())
    }

    pub fn uri(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_URI, name, value.as_bytes())
    }

    pub fn charset(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_CHARSET, name, value.as_bytes())
    }

    pub fn natural_language(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_NATURAL_LANGUAGE, name, value.as_bytes())
    }

    pub fn integer(&mut self, name: &str, value: i32) -> &mut Self {
        self.write_attr(VALUE_TAG_INTEGER, name, &value.to_be_bytes())
    }

    pub fn enum_attr(&mut self, name: &str, value: i32) -> &mut Self {
        self.write_attr(VALUE_TAG_ENUM, name, &value.to_be_bytes())
    }

    pub fn boolean(&mut self, name: &str, value: bool) -> &mut Self {
        self.write_attr(VALUE_TAG_BOOLEAN, name, &[if value { 0x01 } else { 0x00 }])
    }

    pub fn no_value(&mut self, name: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_NO_VALUE, name, &[])
    }

    pub fn write_attr(&mut self, value_tag: u8, name: &str, value: &[u8]) -> &mut Self {
        self.buf.push(value_tag);
        let name_bytes = name.as_bytes();
        self.buf.extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(name_bytes);
        self.buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(value);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.buf.push(TAG_END_OF_ATTRIBUTES);
        self.buf
    }
}

/// Build a minimal error response carrying only a status message.
pub fn build_error_response(status: u16, request_id: u32, message: &str) -> Vec<u8> {
    let mut resp = IppResponseBuilder::new(status, request_id);
    resp.begin_group(TAG_OPERATION_ATTRIBUTES)
        .charset("attributes-charset", "utf-8")
        .natural_language("attributes-natural-language", "en")
        .text("status-message", message);
    resp.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_attr(buf: &mut Vec<u8>, value_tag: u8, name: &str, value: &[u8]) {
        buf.push(value_tag);
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        buf.extend_from_slice(value);
    }

    fn build_test_request(operation_id: u16, request_id: u32, attrs: &[(u8, &str, &[u8])], doc: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(IPP_VERSION_MAJOR);
        buf.push(IPP_VERSION_MINOR);
        buf.extend_from_slice(&operation_id.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        buf.push(TAG_OPERATION_ATTRIBUTES);
        write_test_attr(&mut buf, VALUE_TAG_CHARSET, "attributes-charset", b"utf-8");
        write_test_attr(&mut buf, VALUE_TAG_NATURAL_LANGUAGE, "attributes-natural-language", b"en");
        for &(tag, name, value) in attrs {
            write_test_attr(&mut buf, tag, name, value);
        }
        buf.push(TAG_END_OF_ATTRIBUTES);
        buf.extend_from_slice(doc);
        buf
    }

    #[test]
    fn parses_minimal_request() {
        let data = build_test_request(0x000B, 42, &[], &[]);
        let req = parse_ipp_request(&data).unwrap();
        assert_eq!(req.operation_id, 0x000B);
        assert_eq!(req.request_id, 42);
        assert!(req.document_data.is_empty());
    }

    #[test]
    fn parses_document_data_after_end_of_attributes() {
        let doc = b"%PDF-1.4 ...";
        let data = build_test_request(0x0002, 7, &[], doc);
        let req = parse_ipp_request(&data).unwrap();
        assert_eq!(req.document_data, doc);
    }

    #[test]
    fn get_all_strings_collects_1setof_additional_values() {
        let attrs: Vec<(u8, &str, &[u8])> = vec![
            (VALUE_TAG_KEYWORD, "document-format-supported", b"application/pdf"),
            (VALUE_TAG_KEYWORD, "", b"image/pwg-raster"),
            (VALUE_TAG_KEYWORD, "", b"application/octet-stream"),
        ];
        let data = build_test_request(0x000B, 1, &attrs, &[]);
        let req = parse_ipp_request(&data).unwrap();
        let group = req.operation_attributes().unwrap();
        assert_eq!(
            group.get_all_strings("document-format-supported"),
            vec!["application/pdf", "image/pwg-raster", "application/octet-stream"]
        );
    }

    #[test]
    fn rejects_truncated_request() {
        assert!(parse_ipp_request(&[0x01, 0x01]).is_err());
    }

    #[test]
    fn round_trips_integer_attribute() {
        let bytes = 17i32.to_be_bytes();
        let data = build_test_request(0x0008, 3, &[(VALUE_TAG_INTEGER, "job-id", &bytes)], &[]);
        let req = parse_ipp_request(&data).unwrap();
        assert_eq!(req.operation_attributes().unwrap().get_integer("job-id"), Some(17));
    }

    #[test]
    fn error_response_carries_status_message() {
        let bytes = build_error_response(STATUS_CLIENT_ERROR_NOT_FOUND, 9, "no such job");
        assert_eq!(bytes[2..4], STATUS_CLIENT_ERROR_NOT_FOUND.to_be_bytes());
        assert_eq!(bytes[4..8], 9u32.to_be_bytes());
    }
}
