//! CSV sheet reading and writing with encoding and delimiter auto-detection.
//!
//! A sheet is one CSV file. No rule logic lives here: cells are returned
//! verbatim (blanks as empty strings), and the engines decide what a cell
//! means.

use std::path::Path;

use crate::error::{SourceError, SourceResult};
use crate::models::Table;

/// Delimiter used when writing sheets back out.
pub const OUTPUT_DELIMITER: u8 = b',';

/// Detect the encoding of raw bytes with chardet, normalized to the labels
/// [`decode_content`] understands.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// A UTF-8 byte order mark is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SourceResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => {
            let codec = encoding_rs::Encoding::for_label(other.as_bytes())
                .ok_or_else(|| SourceError::Encoding(format!("unsupported encoding '{}'", other)))?;
            codec.decode(bytes).0.into_owned()
        }
    };

    Ok(decoded)
}

/// Detect the delimiter by counting candidates in the first line.
///
/// Ties and lines without any candidate fall back to `;`.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse already-decoded CSV text into a [`Table`].
///
/// The first record is the header row. Records made only of empty cells are
/// skipped, the way trailing blank lines of a spreadsheet export are.
pub fn parse_sheet(sheet: &str, content: &str, delimiter: char) -> SourceResult<Table> {
    let csv_error = |e: csv::Error| SourceError::Csv {
        sheet: sheet.to_string(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let headers: Vec<String> = match records.next() {
        Some(record) => record.map_err(csv_error)?.iter().map(str::to_string).collect(),
        None => return Err(SourceError::EmptySheet(sheet.to_string())),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(csv_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::from_rows(headers, rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(sheet: &str, bytes: &[u8]) -> SourceResult<Table> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    parse_sheet(sheet, &content, delimiter)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto(sheet: &str, path: &Path) -> SourceResult<Table> {
    let bytes = std::fs::read(path)?;
    parse_bytes_auto(sheet, &bytes)
}

/// Render a table as CSV text (header row first).
pub fn table_to_csv(table: &Table) -> std::io::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(OUTPUT_DELIMITER)
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Sheet name for a CSV file: its file stem.
pub fn sheet_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_sheet() {
        let table = parse_sheet("Template", "name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.columns(), &["name", "age"]);
        assert_eq!(table.cell(0, "name"), "Alice");
        assert_eq!(table.cell(1, "age"), "25");
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let table = parse_sheet("Template", "name,label\nAlice,\"Hello, World\"", ',').unwrap();
        assert_eq!(table.cell(0, "label"), "Hello, World");
    }

    #[test]
    fn test_blank_cells_are_empty_strings() {
        let table = parse_sheet("Template", "a;b;c\n1;;nan", ';').unwrap();

        assert_eq!(table.cell(0, "b"), "");
        assert_eq!(table.cell(0, "c"), "nan");
    }

    #[test]
    fn test_empty_records_skipped() {
        let table = parse_sheet("Template", "a;b\n1;2\n;\n3;4\n", ';').unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_empty_sheet_error() {
        let err = parse_sheet("Parameters", "", ';').unwrap_err();
        assert!(err.to_string().contains("Parameters"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ';');
    }

    #[test]
    fn test_auto_parse_strips_bom() {
        let bytes = b"\xEF\xBB\xBFCode;Label\nFR;France";
        let table = parse_bytes_auto("Countries", bytes).unwrap();

        assert_eq!(table.columns(), &["Code", "Label"]);
        assert_eq!(table.cell(0, "Label"), "France");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_csv_round_trip_keeps_blanks() {
        let table = Table::from_str_rows(&["id", "note"], &[&["1", ""], &["2", "a;b"]]);
        let text = table_to_csv(&table).unwrap();
        let back = parse_sheet("Result", &text, ',').unwrap();

        assert_eq!(back, table);
    }
}
