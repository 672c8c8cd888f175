//! Cell and range references

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell reference (e.g., "A1", "$B$2", "Sheet2!C3")
///
/// Row and column are 0-based internally; the `$` markers are kept so the
/// reference renders back the way it was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRef {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., ZZZ=18277)
    pub col: u32,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
    /// Sheet qualifier, unquoted
    pub sheet: Option<String>,
}

impl CellRef {
    /// Create a new relative reference on the current sheet
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
            sheet: None,
        }
    }

    /// Create a reference with explicit absolute/relative flags
    pub fn with_absolute(row: u32, col: u32, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
            sheet: None,
        }
    }

    /// Attach a sheet qualifier
    pub fn on_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Parse a reference from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::CellRef;
    ///
    /// let r = CellRef::parse("$B$2").unwrap();
    /// assert_eq!((r.row, r.col), (1, 1));
    /// assert!(r.row_absolute && r.col_absolute);
    ///
    /// let r = CellRef::parse("'Q1 ''24'!c3").unwrap();
    /// assert_eq!(r.sheet.as_deref(), Some("Q1 '24"));
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidReference("empty reference".into()));
        }

        let (sheet, address) = split_sheet(s)?;
        let mut cell = parse_address(address, s)?;
        cell.sheet = sheet;
        Ok(cell)
    }

    /// Format as A1-style string, including any sheet qualifier
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();

        if let Some(sheet) = &self.sheet {
            result.push_str(&quote_sheet_name(sheet));
            result.push('!');
        }
        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&index_to_column(self.col + 1));
        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());

        result
    }

    /// Create a range from this reference to another
    pub fn to(&self, other: CellRef) -> RangeRef {
        RangeRef::new(self.clone(), other)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangle of cells (e.g., "A1:B10")
///
/// The corners are stored as written. Geometry accessors normalize them, so
/// `B2:A1` covers the same cells as `A1:B2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeRef {
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    /// Create a new range. An unqualified end inherits the start's sheet.
    pub fn new(start: CellRef, mut end: CellRef) -> Self {
        if end.sheet.is_none() {
            end.sheet = start.sheet.clone();
        }
        Self { start, end }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self::new(
            CellRef::new(start_row, start_col),
            CellRef::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(cell: CellRef) -> Self {
        Self {
            start: cell.clone(),
            end: cell,
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        // The last colon separates the corners; earlier ones can only appear
        // inside a quoted sheet name.
        match s.rfind(':') {
            Some(colon_pos) if !inside_quotes(s, colon_pos) => {
                let start = CellRef::parse(&s[..colon_pos])?;
                let end = CellRef::parse(&s[colon_pos + 1..])?;
                Ok(Self::new(start, end))
            }
            _ => Ok(Self::single(CellRef::parse(s)?)),
        }
    }

    /// Sheet qualifier of the range
    pub fn sheet(&self) -> Option<&str> {
        self.start.sheet.as_deref()
    }

    pub fn top(&self) -> u32 {
        self.start.row.min(self.end.row)
    }

    pub fn bottom(&self) -> u32 {
        self.start.row.max(self.end.row)
    }

    pub fn left(&self) -> u32 {
        self.start.col.min(self.end.col)
    }

    pub fn right(&self) -> u32 {
        self.start.col.max(self.end.col)
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.bottom() - self.top() + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u32 {
        self.right() - self.left() + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Check if a (row, col) position is within this range
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.top() && row <= self.bottom() && col >= self.left() && col <= self.right()
    }

    /// Iterate over all (row, col) positions in the range, row by row
    pub fn cells(&self) -> RangeCells {
        RangeCells {
            bottom: self.bottom(),
            left: self.left(),
            right: self.right(),
            row: self.top(),
            col: self.left(),
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            return self.start.to_a1_string();
        }
        // The end inherits the start's sheet, so it is never repeated.
        let mut end = self.end.clone();
        if end.sheet == self.start.sheet {
            end.sheet = None;
        }
        format!("{}:{}", self.start.to_a1_string(), end.to_a1_string())
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for RangeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Row-major iterator over the positions of a range
#[derive(Debug, Clone)]
pub struct RangeCells {
    bottom: u32,
    left: u32,
    right: u32,
    row: u32,
    col: u32,
}

impl Iterator for RangeCells {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.row > self.bottom {
            return None;
        }

        let pos = (self.row, self.col);

        self.col += 1;
        if self.col > self.right {
            self.col = self.left;
            self.row += 1;
        }

        Some(pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.row > self.bottom {
            return (0, Some(0));
        }
        let width = (self.right - self.left + 1) as usize;
        let full_rows = (self.bottom - self.row) as usize;
        let remaining = full_rows * width + (self.right - self.col + 1) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RangeCells {}

/// Parse a cell reference such as `B2`, `$A$1`, `Sheet1!C3` or `'My Sheet'!D4`
pub fn parse_cell_ref(text: &str) -> Result<CellRef> {
    CellRef::parse(text)
}

/// Parse a range such as `A1:B10` or `Data!A1:C3`; a lone cell becomes a 1x1 range
pub fn parse_range_ref(text: &str) -> Result<RangeRef> {
    RangeRef::parse(text)
}

/// Render a cell reference back to A1 notation
pub fn cell_ref_to_a1(cell: &CellRef) -> String {
    cell.to_a1_string()
}

/// Render a range back to A1 notation
pub fn range_ref_to_a1(range: &RangeRef) -> String {
    range.to_a1_string()
}

/// Convert column letters to a 1-based index (A = 1, Z = 26, AA = 27)
pub fn column_to_index(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidReference("empty column letters".into()));
    }

    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidReference(format!(
                "invalid column letter '{}'",
                c
            )));
        }
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))
            .ok_or_else(|| Error::InvalidReference(format!("column '{}' too large", letters)))?;
    }

    Ok(index)
}

/// Convert a 1-based column index to letters (1 = A, 27 = AA). Index 0 has no letters.
pub fn index_to_column(index: u32) -> String {
    let mut result = Vec::new();
    let mut n = index;

    while n > 0 {
        n -= 1;
        result.push((n % 26) as u8 + b'A');
        n /= 26;
    }

    result.iter().rev().map(|&b| b as char).collect()
}

/// Quote a sheet name when it is not a bare identifier (`[A-Za-z0-9_.]`, no leading digit)
pub fn quote_sheet_name(name: &str) -> String {
    let bare = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if bare {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Split an optional `Sheet!` / `'Quoted Sheet'!` prefix from the address part
fn split_sheet(s: &str) -> Result<(Option<String>, &str)> {
    if let Some(rest) = s.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            // '' is an escaped quote inside the name
            if rest[i + 1..].starts_with('\'') {
                name.push('\'');
                chars.next();
                continue;
            }
            let after = &rest[i + 1..];
            return match after.strip_prefix('!') {
                Some(address) if !name.is_empty() => Ok((Some(name), address)),
                _ => Err(Error::reference(s, "expected '!' after quoted sheet name")),
            };
        }
        return Err(Error::reference(s, "unterminated sheet name"));
    }

    match s.split_once('!') {
        Some(("", _)) => Err(Error::reference(s, "empty sheet name")),
        Some((sheet, address)) => Ok((Some(sheet.to_string()), address)),
        None => Ok((None, s)),
    }
}

/// Parse the `[$]LETTERS[$]DIGITS` part of a reference
fn parse_address(address: &str, full: &str) -> Result<CellRef> {
    let bytes = address.as_bytes();
    let mut pos = 0;

    let col_absolute = if bytes.first() == Some(&b'$') {
        pos += 1;
        true
    } else {
        false
    };

    let col_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    if pos == col_start {
        return Err(Error::reference(full, "no column letters"));
    }
    let col = column_to_index(&address[col_start..pos])?;

    let row_absolute = if bytes.get(pos) == Some(&b'$') {
        pos += 1;
        true
    } else {
        false
    };

    let row_str = &address[pos..];
    if row_str.is_empty() || !row_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::reference(full, "invalid row number"));
    }
    let row: u32 = row_str
        .parse()
        .map_err(|_| Error::reference(full, "invalid row number"))?;

    if row == 0 || row > MAX_ROWS {
        return Err(Error::reference(full, "row out of bounds"));
    }
    if col > MAX_COLS {
        return Err(Error::reference(full, "column out of bounds"));
    }

    Ok(CellRef::with_absolute(
        row - 1,
        col - 1,
        row_absolute,
        col_absolute,
    ))
}

/// Whether byte offset `pos` falls inside a single-quoted section
fn inside_quotes(s: &str, pos: usize) -> bool {
    s[..pos].bytes().filter(|&b| b == b'\'').count() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_column_conversions() {
        assert_eq!(column_to_index("A").unwrap(), 1);
        assert_eq!(column_to_index("Z").unwrap(), 26);
        assert_eq!(column_to_index("AA").unwrap(), 27);
        assert_eq!(column_to_index("zz").unwrap(), 702);
        assert_eq!(column_to_index("AAA").unwrap(), 703);
        assert!(column_to_index("").is_err());
        assert!(column_to_index("A1").is_err());

        assert_eq!(index_to_column(1), "A");
        assert_eq!(index_to_column(26), "Z");
        assert_eq!(index_to_column(27), "AA");
        assert_eq!(index_to_column(702), "ZZ");
        assert_eq!(index_to_column(703), "AAA");
        assert_eq!(index_to_column(0), "");
    }

    #[test]
    fn test_parse_cell_ref() {
        let r = parse_cell_ref("A1").unwrap();
        assert_eq!(r, CellRef::new(0, 0));

        let r = parse_cell_ref("$c$10").unwrap();
        assert_eq!(r, CellRef::with_absolute(9, 2, true, true));

        let r = parse_cell_ref("$A1").unwrap();
        assert!(r.col_absolute);
        assert!(!r.row_absolute);

        let r = parse_cell_ref("Sheet2!B2").unwrap();
        assert_eq!(r, CellRef::new(1, 1).on_sheet("Sheet2"));

        let r = parse_cell_ref("'My Sheet'!B2").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("My Sheet"));

        let r = parse_cell_ref("'It''s'!A1").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("It's"));
    }

    #[test]
    fn test_parse_cell_ref_errors() {
        for bad in ["", "A", "1", "A0", "A1B", "1A", "A 1", "!A1", "'Open!A1", "'X'A1", "A1048577"] {
            assert!(parse_cell_ref(bad).is_err(), "{} should not parse", bad);
        }
    }

    #[test]
    fn test_parse_range_ref() {
        let range = parse_range_ref("A1:B3").unwrap();
        assert_eq!(range.start, CellRef::new(0, 0));
        assert_eq!(range.end, CellRef::new(2, 1));
        assert_eq!(range.row_count(), 3);
        assert_eq!(range.col_count(), 2);

        let range = parse_range_ref("Data!$A$1:C2").unwrap();
        assert_eq!(range.sheet(), Some("Data"));
        assert_eq!(range.end.sheet.as_deref(), Some("Data"));
        assert!(range.start.row_absolute);
        assert!(!range.end.row_absolute);

        let range = parse_range_ref("'a:b'!A1:B2").unwrap();
        assert_eq!(range.sheet(), Some("a:b"));

        let range = parse_range_ref("C3").unwrap();
        assert_eq!(range.cell_count(), 1);
    }

    #[test]
    fn test_range_geometry_is_normalized() {
        let range = parse_range_ref("C4:A2").unwrap();
        assert_eq!((range.top(), range.bottom()), (1, 3));
        assert_eq!((range.left(), range.right()), (0, 2));
        assert!(range.contains(2, 1));
        assert!(!range.contains(0, 0));
    }

    #[test]
    fn test_range_cells_row_major() {
        let range = parse_range_ref("A1:B2").unwrap();
        let cells: Vec<_> = range.cells().collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(range.cells().len(), 4);
    }

    #[test]
    fn test_render_references() {
        assert_eq!(cell_ref_to_a1(&CellRef::new(0, 0)), "A1");
        assert_eq!(
            cell_ref_to_a1(&CellRef::with_absolute(99, 27, true, false)),
            "AB$100"
        );
        assert_eq!(
            cell_ref_to_a1(&CellRef::new(1, 1).on_sheet("Q1 Sales")),
            "'Q1 Sales'!B2"
        );
        assert_eq!(cell_ref_to_a1(&CellRef::new(0, 0).on_sheet("2024")), "'2024'!A1");
        assert_eq!(cell_ref_to_a1(&CellRef::new(0, 0).on_sheet("data.v2")), "data.v2!A1");

        let range = parse_range_ref("Sheet1!A1:B2").unwrap();
        assert_eq!(range_ref_to_a1(&range), "Sheet1!A1:B2");
    }

    proptest! {
        #[test]
        fn column_conversion_is_inverse(index in 1u32..17_576) {
            prop_assert_eq!(column_to_index(&index_to_column(index)).unwrap(), index);
        }

        #[test]
        fn cell_ref_round_trips(
            row in 0u32..MAX_ROWS,
            col in 0u32..MAX_COLS,
            row_absolute in any::<bool>(),
            col_absolute in any::<bool>(),
            sheet in proptest::option::of("[A-Za-z][A-Za-z0-9 '_]{0,8}"),
        ) {
            let mut cell = CellRef::with_absolute(row, col, row_absolute, col_absolute);
            cell.sheet = sheet;
            let text = cell_ref_to_a1(&cell);
            prop_assert_eq!(parse_cell_ref(&text).unwrap(), cell.clone());
            let relaxed = parse_cell_ref(&text.to_lowercase()).unwrap();
            prop_assert_eq!(cell_ref_to_a1(&relaxed).to_uppercase(), text.to_uppercase());
        }
    }
}
