//! Sparse formatting property sets
//!
//! Every property is optional: `None` means "not set here, inherit".
//! Style resolution layers these sets with [`RunFormat::merge`] and friends.

mod paragraph;
mod run;
mod table;

pub use paragraph::{NumberingRef, ParagraphFormat};
pub use run::RunFormat;
pub use table::{CellFormat, CellMerge, RowFormat, TableFormat, TableLook};

/// Generates `merge`, `is_empty` and `restricted_to` for a sparse format.
///
/// `options` are `Option<T>` fields; `flags` are plain fields whose
/// `Default` value means "not set".
macro_rules! sparse_format {
    ($ty:ident { options: [$($opt:ident),* $(,)?] $(, flags: [$($flag:ident),* $(,)?])? }) => {
        impl $ty {
            /// Overlay every property set in `other` onto `self`
            pub fn merge(&mut self, other: &$ty) {
                $(
                    if other.$opt.is_some() {
                        self.$opt = other.$opt.clone();
                    }
                )*
                $($(
                    if other.$flag != Default::default() {
                        self.$flag = other.$flag;
                    }
                )*)?
                if !other.unknown.is_empty() {
                    self.unknown = other.unknown.clone();
                }
            }

            /// Whether no property is set
            pub fn is_empty(&self) -> bool {
                $(self.$opt.is_none() &&)*
                $($(self.$flag == Default::default() &&)*)?
                self.unknown.is_empty()
            }

            /// Copy keeping only the properties that are set in `mask`
            pub fn restricted_to(&self, mask: &$ty) -> $ty {
                $ty {
                    $(
                        $opt: if mask.$opt.is_some() {
                            self.$opt.clone()
                        } else {
                            None
                        },
                    )*
                    $($(
                        $flag: if mask.$flag != Default::default() {
                            self.$flag
                        } else {
                            Default::default()
                        },
                    )*)?
                    unknown: Vec::new(),
                }
            }
        }
    };
}

pub(crate) use sparse_format;
