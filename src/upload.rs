use anyhow::Context;

/// One data line of an uploaded file, cells in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<String>,
}

impl RawRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(String::as_str)
    }

    /// Preview-grid edit. Short rows are padded up to `idx`.
    pub fn set<S: Into<String>>(&mut self, idx: usize, value: S) {
        if self.cells.len() <= idx {
            self.cells.resize(idx + 1, String::new());
        }
        self.cells[idx] = value.into();
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedFile {
    /// At least one header and one row with a non-blank cell.
    pub fn is_loadable(&self) -> bool {
        !self.headers.is_empty() && !self.rows.is_empty()
    }
}

/// Parse an uploaded CSV in one pass. Accepts a UTF-8 BOM and CRLF or LF line
/// endings; fully blank lines are dropped.
pub fn parse_csv(data: &[u8]) -> Result<ParsedFile, anyhow::Error> {
    let data = String::from_utf8_lossy(data);
    let data = data.strip_prefix('\u{feff}').unwrap_or(&*data);
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .context("Unable to read header row")?
        .iter()
        .map(str::to_string)
        .collect();
    let headers = if headers.iter().all(String::is_empty) {
        vec![]
    } else {
        headers
    };
    let rows = rdr
        .records()
        .enumerate()
        .map(|(i, r)| {
            r.map(|r| RawRow::new(r.iter().map(str::to_string).collect()))
                .with_context(|| format!("Unable to parse record {}", i + 1))
        })
        .filter(|r| !r.as_ref().is_ok_and(RawRow::is_blank))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParsedFile { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bom_and_crlf() {
        let data = "\u{feff}Name,SKU\r\nMug,M-1\r\nCup,C-2\r\n";
        let parsed = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(vec!["Name", "SKU"], parsed.headers);
        assert_eq!(2, parsed.rows.len());
        assert_eq!(Some("C-2"), parsed.rows[1].get(1));
    }

    #[test]
    fn drops_blank_lines_and_keeps_short_rows() {
        let data = "Name,SKU,Stock\nMug,M-1\n,,\n\nCup,C-2,4\n";
        let parsed = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(2, parsed.rows.len());
        assert_eq!(None, parsed.rows[0].get(2));
        assert!(parsed.is_loadable());
    }

    #[test]
    fn header_only_file_is_not_loadable() {
        let parsed = parse_csv(b"Name,SKU\n").unwrap();
        assert!(!parsed.is_loadable());
        let parsed = parse_csv(b"").unwrap();
        assert!(!parsed.is_loadable());
    }

    #[test]
    fn trims_headers_not_cells() {
        let parsed = parse_csv(b" Name ,SKU\n Mug ,M-1\n").unwrap();
        assert_eq!("Name", parsed.headers[0]);
        assert_eq!(Some(" Mug "), parsed.rows[0].get(0));
    }

    #[test]
    fn edits_pad_short_rows() {
        let mut row = RawRow::new(vec!["Mug".into()]);
        row.set(2, "5");
        assert_eq!(Some(""), row.get(1));
        assert_eq!(Some("5"), row.get(2));
    }
}
