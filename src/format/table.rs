//! Table, row and cell formatting (w:tblPr, w:trPr, w:tcPr)

use super::sparse_format;
use crate::xml::RawXmlNode;

/// Merge state of a cell in one direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CellMerge {
    /// Not merged
    #[default]
    None,
    /// First cell of a merged range
    First,
    /// Continues the merged range of the previous cell
    Previous,
}

/// Cell formatting
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellFormat {
    /// Preferred width in twips
    pub width: Option<i32>,
    /// Number of grid columns spanned
    pub grid_span: Option<u32>,
    /// Shading fill (RGB hex)
    pub shading: Option<String>,
    /// Vertical alignment ("top", "center", "bottom")
    pub vertical_align: Option<String>,
    /// Horizontal merge state
    pub horizontal_merge: CellMerge,
    /// Vertical merge state
    pub vertical_merge: CellMerge,
    /// Unrecognized children (preserved)
    pub unknown: Vec<RawXmlNode>,
}

sparse_format!(CellFormat {
    options: [width, grid_span, shading, vertical_align],
    flags: [horizontal_merge, vertical_merge]
});

impl CellFormat {
    /// Grid columns covered by this cell
    pub fn span(&self) -> u32 {
        self.grid_span.unwrap_or(1).max(1)
    }

    /// Set width in twips
    pub fn with_width(mut self, twips: i32) -> Self {
        self.width = Some(twips);
        self
    }

    /// Set shading fill
    pub fn with_shading(mut self, fill: impl Into<String>) -> Self {
        self.shading = Some(fill.into());
        self
    }
}

/// Row formatting
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowFormat {
    /// Row height in twips
    pub height: Option<u32>,
    /// Height rule ("auto", "exact", "atLeast")
    pub height_rule: Option<String>,
    /// Repeat as header row
    pub header: Option<bool>,
    /// Do not split across pages
    pub cant_split: Option<bool>,
    /// Unrecognized children (preserved)
    pub unknown: Vec<RawXmlNode>,
}

sparse_format!(RowFormat {
    options: [height, height_rule, header, cant_split]
});

/// Which conditional regions of the table style apply (w:tblLook)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableLook {
    pub first_row: bool,
    pub last_row: bool,
    pub first_column: bool,
    pub last_column: bool,
    pub no_horizontal_band: bool,
    pub no_vertical_band: bool,
}

impl TableLook {
    const FIRST_ROW: u16 = 0x0020;
    const LAST_ROW: u16 = 0x0040;
    const FIRST_COLUMN: u16 = 0x0080;
    const LAST_COLUMN: u16 = 0x0100;
    const NO_H_BAND: u16 = 0x0200;
    const NO_V_BAND: u16 = 0x0400;

    /// Decode the legacy hex bitmask form (`w:val="04A0"`)
    pub fn from_bits(bits: u16) -> Self {
        TableLook {
            first_row: bits & Self::FIRST_ROW != 0,
            last_row: bits & Self::LAST_ROW != 0,
            first_column: bits & Self::FIRST_COLUMN != 0,
            last_column: bits & Self::LAST_COLUMN != 0,
            no_horizontal_band: bits & Self::NO_H_BAND != 0,
            no_vertical_band: bits & Self::NO_V_BAND != 0,
        }
    }

    /// Encode as the legacy hex bitmask
    pub fn bits(&self) -> u16 {
        let mut bits = 0;
        for (on, bit) in [
            (self.first_row, Self::FIRST_ROW),
            (self.last_row, Self::LAST_ROW),
            (self.first_column, Self::FIRST_COLUMN),
            (self.last_column, Self::LAST_COLUMN),
            (self.no_horizontal_band, Self::NO_H_BAND),
            (self.no_vertical_band, Self::NO_V_BAND),
        ] {
            if on {
                bits |= bit;
            }
        }
        bits
    }
}

/// Table formatting
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableFormat {
    /// Preferred width in twips
    pub width: Option<i32>,
    /// Justification of the table on the page
    pub justification: Option<String>,
    /// Conditional formatting switches
    pub look: Option<TableLook>,
    /// Rows per horizontal band
    pub row_band_size: Option<u32>,
    /// Columns per vertical band
    pub column_band_size: Option<u32>,
    /// Unrecognized children (preserved)
    pub unknown: Vec<RawXmlNode>,
}

sparse_format!(TableFormat {
    options: [width, justification, look, row_band_size, column_band_size]
});

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_look_bits() {
        let look = TableLook::from_bits(0x04A0);
        assert!(look.first_row);
        assert!(look.first_column);
        assert!(look.no_vertical_band);
        assert!(!look.last_row);
        assert_eq!(look.bits(), 0x04A0);
    }

    #[test]
    fn test_cell_merge_flags_merge() {
        let mut cell = CellFormat::default().with_width(1000);
        let over = CellFormat {
            horizontal_merge: CellMerge::First,
            ..Default::default()
        };
        cell.merge(&over);
        assert_eq!(cell.horizontal_merge, CellMerge::First);
        assert_eq!(cell.width, Some(1000));
        assert_eq!(cell.span(), 1);
    }
}
