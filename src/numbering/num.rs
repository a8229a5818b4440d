//! Numbering instance definitions

use crate::error::Result;
use crate::xml::{collect_attrs, get_w_attr, get_w_val, write_val};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::BufRead;

use super::level::LevelOverride;
use crate::xml::is_extension_attr;

/// Numbering instance (w:num)
#[derive(Clone, Debug, PartialEq)]
pub struct Num {
    /// Numbering ID (referenced by paragraphs)
    pub num_id: u32,
    /// Referenced abstract numbering ID
    pub abstract_num_id: u32,
    /// Level overrides
    pub level_overrides: Vec<LevelOverride>,
    /// Other attributes (w16cid:durableId, ...)
    pub attrs: Vec<(String, String)>,
}

impl Num {
    /// Create a new numbering instance
    pub fn new(num_id: u32, abstract_num_id: u32) -> Self {
        Num {
            num_id,
            abstract_num_id,
            level_overrides: Vec::new(),
            attrs: Vec::new(),
        }
    }

    /// Override for one level
    pub fn level_override(&self, ilvl: u8) -> Option<&LevelOverride> {
        self.level_overrides.iter().find(|o| o.ilvl == ilvl)
    }

    pub(crate) fn from_reader<R: BufRead>(
        reader: &mut Reader<R>,
        start: &BytesStart,
    ) -> Result<Self> {
        let mut num = Num::new(
            get_w_attr(start, "numId")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            0,
        );
        num.attrs = collect_attrs(start)
            .into_iter()
            .filter(|(k, _)| !k.ends_with("numId"))
            .collect();

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    if e.name().local_name().as_ref() == b"lvlOverride" {
                        num.level_overrides
                            .push(LevelOverride::from_reader(reader, &e)?);
                    } else {
                        crate::xml::skip_element(reader, &e)?;
                    }
                }
                Event::Empty(e) => {
                    if e.name().local_name().as_ref() == b"abstractNumId" {
                        num.abstract_num_id =
                            get_w_val(&e).and_then(|v| v.parse().ok()).unwrap_or(0);
                    }
                }
                Event::End(e) => {
                    if e.name().local_name().as_ref() == b"num" {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(num)
    }

    pub(crate) fn write_to<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
        extensions: bool,
    ) -> Result<()> {
        let mut start = BytesStart::new("w:num");
        start.push_attribute(("w:numId", self.num_id.to_string().as_str()));
        for (k, v) in &self.attrs {
            if extensions || !is_extension_attr(k) {
                start.push_attribute((k.as_str(), v.as_str()));
            }
        }
        writer.write_event(Event::Start(start))?;

        write_val(writer, "w:abstractNumId", &self.abstract_num_id.to_string())?;
        for lo in &self.level_overrides {
            lo.write_to(writer, extensions)?;
        }

        writer.write_event(Event::End(BytesEnd::new("w:num")))?;
        Ok(())
    }
}
