//! CSV reading and writing with encoding and delimiter handling.
//!
//! Turns file bytes into [`Row`]s and back. No rule logic here.

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use encoding_rs::Encoding;
use std::fs;
use std::path::Path;

use crate::config::{CsvSettings, Delimiter, Dialect};
use crate::error::{CsvError, CsvResult};
use crate::models::{Cell, Row};

/// How a file was read, and therefore how it is written back.
#[derive(Debug, Clone, Copy)]
pub struct CsvFormat {
    pub encoding: &'static Encoding,
    /// The input started with a byte-order mark.
    pub bom: bool,
    pub delimiter: u8,
    pub dialect: Dialect,
}

/// Decoded file content and the encoding actually used.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
    pub bom: bool,
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub format: CsvFormat,
    /// Header record, when the settings say the file has one
    pub headers: Option<Vec<String>>,
    /// Data rows
    pub rows: Vec<Row>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let result = chardet::detect(bytes);
    let charset = result.0.to_lowercase();

    // Normalize charset names
    let label = match charset.as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8",
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-15",
        "windows-1252" | "cp1252" => "windows-1252",
        other => other,
    };

    Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8)
}

/// Resolve a configured encoding label, `auto` meaning detection.
pub fn resolve_encoding(label: &str, bytes: &[u8]) -> CsvResult<&'static Encoding> {
    if label.eq_ignore_ascii_case("auto") {
        let detected = detect_encoding(bytes);
        tracing::debug!(encoding = detected.name(), "detected encoding");
        return Ok(detected);
    }

    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| CsvError::UnknownEncoding(label.to_string()))
}

/// Decode bytes with the given encoding, unless a byte-order mark names another.
pub fn decode_content(bytes: &[u8], encoding: &'static Encoding) -> Decoded {
    let (encoding, bom_len) = match Encoding::for_bom(bytes) {
        Some((from_bom, len)) => {
            if from_bom != encoding {
                tracing::debug!(
                    configured = encoding.name(),
                    detected = from_bom.name(),
                    "byte-order mark overrides encoding"
                );
            }
            (from_bom, len)
        }
        None => (encoding, 0),
    };

    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    if had_errors {
        tracing::warn!(encoding = encoding.name(), "input contains malformed sequences");
    }

    Decoded {
        text: text.into_owned(),
        encoding,
        bom: bom_len > 0,
    }
}

/// Encode text with `encoding`, prefixed by its byte-order mark when `bom`.
///
/// UTF-16 is encoded here since `encoding_rs` only decodes it.
pub fn encode_content(text: &str, encoding: &'static Encoding, bom: bool) -> Vec<u8> {
    if encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE {
        let little_endian = encoding == encoding_rs::UTF_16LE;
        let unit_bytes = |unit: u16| {
            if little_endian {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            }
        };

        let mut out = Vec::with_capacity(text.len() * 2 + 2);
        if bom {
            out.extend_from_slice(&unit_bytes(0xFEFF));
        }
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit_bytes(unit));
        }
        return out;
    }

    let (bytes, used, had_errors) = encoding.encode(text);
    if had_errors {
        tracing::warn!(
            encoding = used.name(),
            "some characters could not be represented and were replaced"
        );
    }

    let mut out = Vec::with_capacity(bytes.len() + 3);
    if bom && used == encoding_rs::UTF_8 {
        out.extend_from_slice(b"\xEF\xBB\xBF");
    }
    out.extend_from_slice(&bytes);
    out
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [b';', b',', b'\t', b'|'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV bytes according to the settings.
pub fn parse_bytes(bytes: &[u8], settings: &CsvSettings) -> CsvResult<ParseResult> {
    let encoding = resolve_encoding(&settings.file_encoding, bytes)?;
    let decoded = decode_content(bytes, encoding);

    let delimiter = match settings.delimiter {
        Some(Delimiter::Char(d)) => d,
        Some(Delimiter::Auto) => detect_delimiter(&decoded.text),
        None => settings.dialect.delimiter(),
    };

    let format = CsvFormat {
        encoding: decoded.encoding,
        bom: decoded.bom,
        delimiter,
        dialect: settings.dialect,
    };
    parse_str(&decoded.text, format, settings.has_headers, settings.parse_numbers)
}

/// Parse decoded CSV text with an explicit format.
pub fn parse_str(
    content: &str,
    format: CsvFormat,
    has_headers: bool,
    parse_numbers: bool,
) -> CsvResult<ParseResult> {
    let mut reader = ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers = None;
    let mut rows = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;

        if idx == 0 && has_headers {
            headers = Some(record.iter().map(str::to_string).collect());
            continue;
        }

        let row: Row = record
            .iter()
            .map(|field| {
                if parse_numbers {
                    Cell::parse(field)
                } else {
                    Cell::text(field)
                }
            })
            .collect();
        rows.push(row);
    }

    Ok(ParseResult {
        format,
        headers,
        rows,
    })
}

/// Read and parse a CSV file.
pub fn parse_csv_file(path: &Path, settings: &CsvSettings) -> CsvResult<ParseResult> {
    let bytes = fs::read(path)?;
    parse_bytes(&bytes, settings)
}

/// Render rows as CSV text in the given format (headers first, if any).
pub fn write_str(headers: Option<&[String]>, rows: &[Row], format: CsvFormat) -> CsvResult<String> {
    let (terminator, quote_style) = match format.dialect {
        Dialect::Excel | Dialect::ExcelTab => (Terminator::CRLF, QuoteStyle::Necessary),
        Dialect::Unix => (Terminator::Any(b'\n'), QuoteStyle::Always),
    };

    let mut writer = WriterBuilder::new()
        .delimiter(format.delimiter)
        .terminator(terminator)
        .quote_style(quote_style)
        .flexible(true)
        .from_writer(Vec::new());

    if let Some(headers) = headers {
        writer.write_record(headers)?;
    }
    for row in rows {
        writer.write_record(row.iter().map(Cell::to_text))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Write(e.to_string()))
}

/// Render rows and encode them with the format's encoding and byte-order mark.
pub fn write_bytes(headers: Option<&[String]>, rows: &[Row], format: CsvFormat) -> CsvResult<Vec<u8>> {
    let text = write_str(headers, rows, format)?;
    Ok(encode_content(&text, format.encoding, format.bom))
}

/// Write rows to a CSV file.
pub fn write_csv_file(
    path: &Path,
    headers: Option<&[String]>,
    rows: &[Row],
    format: CsvFormat,
) -> CsvResult<()> {
    let bytes = write_bytes(headers, rows, format)?;
    fs::write(path, bytes)?;
    Ok(())
}
