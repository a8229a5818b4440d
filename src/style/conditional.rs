//! Table conditional formatting (w:tblStylePr)

use crate::format::{CellFormat, ParagraphFormat, RowFormat, RunFormat, TableFormat};
use crate::xml::RawXmlNode;

/// Region of a table a conditional format applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableRegion {
    FirstRow,
    LastRow,
    FirstColumn,
    LastColumn,
    OddRowBand,
    EvenRowBand,
    OddColumnBand,
    EvenColumnBand,
    TopLeftCell,
    TopRightCell,
    BottomLeftCell,
    BottomRightCell,
}

impl TableRegion {
    /// Every region, in slot order
    pub const ALL: [TableRegion; 12] = [
        TableRegion::FirstRow,
        TableRegion::LastRow,
        TableRegion::FirstColumn,
        TableRegion::LastColumn,
        TableRegion::OddRowBand,
        TableRegion::EvenRowBand,
        TableRegion::OddColumnBand,
        TableRegion::EvenColumnBand,
        TableRegion::TopLeftCell,
        TableRegion::TopRightCell,
        TableRegion::BottomLeftCell,
        TableRegion::BottomRightCell,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    /// Conflict priority; higher wins
    pub fn priority(self) -> u8 {
        match self {
            TableRegion::OddColumnBand | TableRegion::EvenColumnBand => 0,
            TableRegion::OddRowBand | TableRegion::EvenRowBand => 1,
            TableRegion::LastColumn => 2,
            TableRegion::FirstColumn => 3,
            TableRegion::LastRow => 4,
            TableRegion::FirstRow => 5,
            TableRegion::TopLeftCell
            | TableRegion::TopRightCell
            | TableRegion::BottomLeftCell
            | TableRegion::BottomRightCell => 6,
        }
    }

    /// Value of `w:tblStylePr/@w:type`
    pub fn as_str(self) -> &'static str {
        match self {
            TableRegion::FirstRow => "firstRow",
            TableRegion::LastRow => "lastRow",
            TableRegion::FirstColumn => "firstCol",
            TableRegion::LastColumn => "lastCol",
            TableRegion::OddRowBand => "band1Horz",
            TableRegion::EvenRowBand => "band2Horz",
            TableRegion::OddColumnBand => "band1Vert",
            TableRegion::EvenColumnBand => "band2Vert",
            TableRegion::TopLeftCell => "nwCell",
            TableRegion::TopRightCell => "neCell",
            TableRegion::BottomLeftCell => "swCell",
            TableRegion::BottomRightCell => "seCell",
        }
    }

    /// Parse `w:tblStylePr/@w:type`
    pub fn parse(value: &str) -> Option<Self> {
        TableRegion::ALL.into_iter().find(|r| r.as_str() == value)
    }
}

/// Formatting applied to one table region
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionalStyle {
    pub run_format: RunFormat,
    pub paragraph_format: ParagraphFormat,
    pub table_format: TableFormat,
    pub row_format: RowFormat,
    pub cell_format: CellFormat,
    /// Unrecognized children (preserved)
    pub unknown: Vec<RawXmlNode>,
}

/// Conditional formats of a table style, one slot per region
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionalStyles {
    slots: [Option<ConditionalStyle>; 12],
}

impl ConditionalStyles {
    /// Format for a region, if the style sets one
    pub fn get(&self, region: TableRegion) -> Option<&ConditionalStyle> {
        self.slots[region.slot()].as_ref()
    }

    /// Mutable format for a region, created on demand
    pub fn get_or_insert(&mut self, region: TableRegion) -> &mut ConditionalStyle {
        self.slots[region.slot()].get_or_insert_with(ConditionalStyle::default)
    }

    /// Set the format of a region
    pub fn set(&mut self, region: TableRegion, style: ConditionalStyle) {
        self.slots[region.slot()] = Some(style);
    }

    /// Clear a region
    pub fn remove(&mut self, region: TableRegion) -> Option<ConditionalStyle> {
        self.slots[region.slot()].take()
    }

    /// Regions that are set, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (TableRegion, &ConditionalStyle)> {
        TableRegion::ALL
            .into_iter()
            .filter_map(move |r| self.get(r).map(|s| (r, s)))
    }

    /// Whether no region is set
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }
}
