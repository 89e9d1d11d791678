//! PLY header schema and parser

use std::fmt;
use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlyError, Result};
use crate::types::{ByteOrder, DataType};

/// Encoding of the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl Format {
    pub fn is_binary(self) -> bool {
        !matches!(self, Format::Ascii)
    }

    /// Byte order of binary data, `None` for ASCII.
    pub fn byte_order(self) -> Option<ByteOrder> {
        match self {
            Format::Ascii => None,
            Format::BinaryLittleEndian => Some(ByteOrder::Little),
            Format::BinaryBigEndian => Some(ByteOrder::Big),
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Format::Ascii => "ascii",
            Format::BinaryLittleEndian => "binary_little_endian",
            Format::BinaryBigEndian => "binary_big_endian",
        }
    }
}

/// A named field of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub data_type: DataType,
    /// Type of the length prefix when this is a list property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_count_type: Option<DataType>,
}

impl Property {
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            list_count_type: None,
        }
    }

    pub fn list(name: impl Into<String>, count_type: DataType, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            list_count_type: Some(count_type),
        }
    }

    pub fn is_list(&self) -> bool {
        self.list_count_type.is_some()
    }
}

/// A record type with a fixed number of instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub count: usize,
    /// Declaration order, which is also the on-disk field order.
    pub properties: Vec<Property>,
}

impl Element {
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            count,
            properties: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Bytes per binary record, or `None` if any property is a list.
    pub fn row_width(&self) -> Option<usize> {
        self.properties
            .iter()
            .map(|p| (!p.is_list()).then(|| p.data_type.width()))
            .sum()
    }
}

/// Everything declared between `ply` and `end_header`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub format: Format,
    pub version: String,
    pub elements: Vec<Element>,
    pub comments: Vec<String>,
    pub obj_info: Vec<String>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            format: Format::Ascii,
            version: "1.0".to_string(),
            elements: Vec::new(),
            comments: Vec::new(),
            obj_info: Vec::new(),
        }
    }
}

impl Header {
    pub fn is_binary(&self) -> bool {
        self.format.is_binary()
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn has_element(&self, name: &str) -> bool {
        self.element(name).is_some()
    }

    /// Parse a header, leaving `reader` at the first byte after `end_header`.
    #[tracing::instrument(skip_all)]
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Header> {
        let mut header = Header::default();
        let mut raw = Vec::new();
        let mut line_no = 0;

        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                return Err(PlyError::header(line_no, "missing end_header"));
            }
            line_no += 1;

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            let mut tokens = line.split_whitespace();

            match tokens.next() {
                None | Some("ply") | Some("PLY") => {}
                Some("comment") => header.comments.push(rest_of_line(line, "comment")),
                Some("obj_info") => header.obj_info.push(rest_of_line(line, "obj_info")),
                Some("format") => header.read_format(line_no, tokens)?,
                Some("element") => header.read_element(line_no, tokens)?,
                Some("property") => header.read_property(line_no, tokens)?,
                Some("end_header") => break,
                Some(other) => {
                    return Err(PlyError::header(
                        line_no,
                        format!("unexpected keyword '{}'", other),
                    ));
                }
            }
        }

        if header.elements.is_empty() {
            warn!("PLY header declares no elements");
        }
        debug!(
            "Parsed PLY header: format={:?}, {} elements, {} comments",
            header.format,
            header.elements.len(),
            header.comments.len()
        );
        Ok(header)
    }

    fn read_format<'a>(
        &mut self,
        line: usize,
        mut tokens: impl Iterator<Item = &'a str>,
    ) -> Result<()> {
        self.format = match tokens.next() {
            Some("ascii") | Some("ASCII") => Format::Ascii,
            Some("binary_little_endian") => Format::BinaryLittleEndian,
            Some("binary_big_endian") => Format::BinaryBigEndian,
            Some(other) => {
                return Err(PlyError::header(line, format!("unknown format '{}'", other)));
            }
            None => return Err(PlyError::header(line, "format line without a format")),
        };
        if let Some(version) = tokens.next() {
            if version != "1.0" {
                warn!("Unexpected PLY version '{}', decoding as 1.0", version);
            }
            self.version = version.to_string();
        }
        Ok(())
    }

    fn read_element<'a>(
        &mut self,
        line: usize,
        mut tokens: impl Iterator<Item = &'a str>,
    ) -> Result<()> {
        let name = tokens
            .next()
            .ok_or_else(|| PlyError::header(line, "element line without a name"))?;
        let count = tokens
            .next()
            .ok_or_else(|| PlyError::header(line, format!("element '{}' without a count", name)))?;
        let count = count.parse::<usize>().map_err(|_| {
            PlyError::header(line, format!("invalid count '{}' for element '{}'", count, name))
        })?;
        self.elements.push(Element::new(name, count));
        Ok(())
    }

    fn read_property<'a>(
        &mut self,
        line: usize,
        mut tokens: impl Iterator<Item = &'a str>,
    ) -> Result<()> {
        let Some(element) = self.elements.last_mut() else {
            return Err(PlyError::header(line, "property declared before any element"));
        };
        let mut next = |what: &str| {
            tokens
                .next()
                .ok_or_else(|| PlyError::header(line, format!("property line missing {}", what)))
        };

        let first = next("a type")?;
        let property = if first == "list" {
            let count_token = next("a list count type")?;
            let value_token = next("a list value type")?;
            let name = next("a name")?;
            let count_type: DataType = count_token.parse()?;
            if count_type.is_float() {
                return Err(PlyError::UnsupportedDataType(format!(
                    "{} as list count",
                    count_token
                )));
            }
            Property::list(name, count_type, value_token.parse()?)
        } else {
            let name = next("a name")?;
            Property::scalar(name, first.parse()?)
        };

        element.properties.push(property);
        Ok(())
    }
}

fn rest_of_line(line: &str, keyword: &str) -> String {
    line.trim_start()
        .strip_prefix(keyword)
        .unwrap_or_default()
        .trim()
        .to_string()
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ply")?;
        writeln!(f, "format {} {}", self.format.keyword(), self.version)?;
        for comment in &self.comments {
            writeln!(f, "comment {}", comment)?;
        }
        for info in &self.obj_info {
            writeln!(f, "obj_info {}", info)?;
        }
        for element in &self.elements {
            writeln!(f, "element {} {}", element.name, element.count)?;
            for property in &element.properties {
                match property.list_count_type {
                    Some(count_type) => writeln!(
                        f,
                        "property list {} {} {}",
                        count_type, property.data_type, property.name
                    )?,
                    None => writeln!(f, "property {} {}", property.data_type, property.name)?,
                }
            }
        }
        writeln!(f, "end_header")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    const CUBE_HEADER: &str = "ply\n\
        format ascii 1.0\n\
        comment made by hand\n\
        obj_info generated for tests\n\
        element vertex 8\n\
        property float x\n\
        property float y\n\
        property float z\n\
        property uchar red\n\
        element face 6\n\
        property list uchar int vertex_indices\n\
        end_header\n";

    fn parse(text: &str) -> Result<Header> {
        Header::parse(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn test_parse_elements_and_properties() {
        let header = parse(CUBE_HEADER).unwrap();
        assert_eq!(header.format, Format::Ascii);
        assert_eq!(header.elements.len(), 2);

        let vertex = header.element("vertex").unwrap();
        assert_eq!(vertex.count, 8);
        let names: Vec<&str> = vertex.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z", "red"]);
        assert_eq!(vertex.property("red").unwrap().data_type, DataType::UInt8);
        assert_eq!(vertex.row_width(), Some(13));

        let face = header.element("face").unwrap();
        let indices = face.property("vertex_indices").unwrap();
        assert!(indices.is_list());
        assert_eq!(indices.list_count_type, Some(DataType::UInt8));
        assert_eq!(indices.data_type, DataType::Int32);
        assert_eq!(face.row_width(), None);
    }

    #[test]
    fn test_comments_and_obj_info_are_captured() {
        let header = parse(CUBE_HEADER).unwrap();
        assert_eq!(header.comments, vec!["made by hand".to_string()]);
        assert_eq!(header.obj_info, vec!["generated for tests".to_string()]);
    }

    #[test]
    fn test_binary_formats() {
        let le = parse("ply\nformat binary_little_endian 1.0\nend_header\n").unwrap();
        assert!(le.is_binary());
        assert_eq!(le.format.byte_order(), Some(ByteOrder::Little));

        let be = parse("ply\nformat binary_big_endian 1.0\nend_header\n").unwrap();
        assert!(be.is_binary());
        assert_eq!(be.format.byte_order(), Some(ByteOrder::Big));

        let upper = parse("PLY\nformat ASCII 1.0\nend_header\n").unwrap();
        assert!(!upper.is_binary());
    }

    #[test]
    fn test_reader_positioned_after_end_header() {
        let text = "ply\r\nformat binary_little_endian 1.0\r\nelement v 1\r\nproperty uchar a\r\nend_header\r\n\x07rest";
        let mut cursor = Cursor::new(text.as_bytes());
        let header = Header::parse(&mut cursor).unwrap();
        assert_eq!(header.elements[0].properties[0].name, "a");

        let mut remaining = Vec::new();
        cursor.read_to_end(&mut remaining).unwrap();
        assert_eq!(remaining, b"\x07rest");
    }

    #[test]
    fn test_property_before_element_fails() {
        let err = parse("ply\nformat ascii 1.0\nproperty float x\nend_header\n").unwrap_err();
        assert!(matches!(err, PlyError::HeaderSyntax { line: 3, .. }));

        // Placement is checked before the type tokens are resolved.
        let err = parse("ply\nformat ascii 1.0\nproperty int64 x\nend_header\n").unwrap_err();
        assert!(matches!(err, PlyError::HeaderSyntax { line: 3, .. }));
        let err =
            parse("ply\nformat ascii 1.0\nproperty list float int x\nend_header\n").unwrap_err();
        assert!(matches!(err, PlyError::HeaderSyntax { line: 3, .. }));
    }

    #[test]
    fn test_unknown_keyword_fails() {
        let err = parse("ply\nformat ascii 1.0\nvertices 3\nend_header\n").unwrap_err();
        assert!(matches!(err, PlyError::HeaderSyntax { line: 3, .. }));
    }

    #[test]
    fn test_unsupported_type_consumes_line() {
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty int64 x\nend_header\n";
        let mut cursor = Cursor::new(text.as_bytes());
        let err = Header::parse(&mut cursor).unwrap_err();
        assert!(matches!(err, PlyError::UnsupportedDataType(ref t) if t == "int64"));

        let mut remaining = String::new();
        cursor.read_to_string(&mut remaining).unwrap();
        assert_eq!(remaining, "end_header\n");
    }

    #[test]
    fn test_float_list_count_rejected() {
        let text = "ply\nformat ascii 1.0\nelement face 1\nproperty list float int idx\nend_header\n";
        assert!(matches!(
            parse(text).unwrap_err(),
            PlyError::UnsupportedDataType(_)
        ));
    }

    #[test]
    fn test_missing_end_header() {
        let err = parse("ply\nformat ascii 1.0\nelement vertex 1\n").unwrap_err();
        assert!(matches!(err, PlyError::HeaderSyntax { .. }));
    }

    #[test]
    fn test_invalid_element_count() {
        let err = parse("ply\nformat ascii 1.0\nelement vertex -4\nend_header\n").unwrap_err();
        assert!(matches!(err, PlyError::HeaderSyntax { line: 3, .. }));
    }

    #[test]
    fn test_display_round_trip() {
        let mut header = Header {
            format: Format::BinaryBigEndian,
            ..Header::default()
        };
        header.comments.push("round trip".to_string());
        for (i, name) in ["vertex", "face", "edge"].iter().enumerate() {
            let mut element = Element::new(*name, i * 7 + 1);
            for (j, ty) in DataType::ALL.iter().enumerate() {
                element
                    .properties
                    .push(Property::scalar(format!("p{}", j), *ty));
            }
            element
                .properties
                .push(Property::list("items", DataType::UInt16, DataType::Float64));
            header.elements.push(element);
        }

        let text = header.to_string();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed, header);
        assert_eq!(reparsed.to_string(), text);
    }

    #[test]
    fn test_aliases_parse_to_same_schema() {
        let short = parse("ply\nformat ascii 1.0\nelement v 1\nproperty char a\nproperty list uchar double b\nend_header\n").unwrap();
        let long = parse("ply\nformat ascii 1.0\nelement v 1\nproperty int8 a\nproperty list uint8 float64 b\nend_header\n").unwrap();
        assert_eq!(short, long);
    }
}
