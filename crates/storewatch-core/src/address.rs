//! A1-notation cell addresses
//!
//! Rows are 1-based like the sheet UI; columns are 0-based indices
//! (`A` = 0) so they line up with the cell vectors returned by
//! [`TabularStore::read_rows`](crate::TabularStore::read_rows).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A single cell address such as `J2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// 1-based row number
    pub row: u32,
    /// 0-based column index
    pub column: usize,
}

impl CellAddress {
    /// Create a new address
    pub fn new(row: u32, column: usize) -> Self {
        Self { row, column }
    }

    /// Parse an A1 address (`"J2"`, `"aa10"`)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| Error::invalid_input(format!("Cell address has no row: '{}'", s)))?;
        let (letters, digits) = s.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::invalid_input(format!(
                "Cell address has no valid column: '{}'",
                s
            )));
        }

        let row: u32 = digits
            .parse()
            .map_err(|_| Error::invalid_input(format!("Cell address has invalid row: '{}'", s)))?;
        if row == 0 {
            return Err(Error::invalid_input(format!(
                "Cell address rows start at 1: '{}'",
                s
            )));
        }

        let mut column = 0usize;
        for c in letters.chars() {
            let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            column = column
                .checked_mul(26)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| Error::invalid_input(format!("Column out of range: '{}'", s)))?;
        }

        Ok(Self {
            row,
            column: column - 1,
        })
    }
}

/// Column letters for a 0-based index (`0` -> `A`, `26` -> `AA`)
pub fn column_letters(mut column: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (column % 26) as u8);
        if column < 26 {
            break;
        }
        column = column / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for CellAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
