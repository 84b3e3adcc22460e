//! Low-level OOXML helpers: raw event splicing, attributes, cell references, zip parts.

use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

////////////////////////////////////////////////////////////////////////////////
// #region RawEvents

/// XML events paired with the exact source text they were parsed from.
///
/// Copying the raw slices of every event reproduces the input byte for byte,
/// so a rewrite only touches the elements it replaces.
pub struct RawXmlEvents<'a> {
    reader: Reader<&'a [u8]>,
    xml: &'a str,
    n_pos: usize,
}

impl<'a> RawXmlEvents<'a> {
    /// Start reading `xml` without trimming whitespace.
    pub fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            xml,
            n_pos: 0,
        }
    }
}

impl<'a> Iterator for RawXmlEvents<'a> {
    type Item = Result<(Event<'a>, &'a str), String>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.reader.read_event() {
            Ok(Event::Eof) => return None,
            Ok(event) => event,
            Err(err) => {
                return Some(Err(format!(
                    "XML parse error at byte {}: {err}",
                    self.reader.buffer_position()
                )));
            }
        };
        let n_end = match usize::try_from(self.reader.buffer_position()) {
            Ok(n_end) if n_end <= self.xml.len() => n_end,
            _ => return Some(Err("XML reader position out of range".to_string())),
        };
        let c_raw = self.xml.get(self.n_pos..n_end).unwrap_or_default();
        self.n_pos = n_end;
        Some(Ok((event, c_raw)))
    }
}

/// Edit applied to one matching empty element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumXmlEdit {
    /// Copy the element unchanged.
    Keep,
    /// Remove the element.
    Drop,
    /// Replace the element with this markup.
    Replace(String),
}

/// Rewrite every empty element with local name `tag`; all other text is copied verbatim.
pub fn rewrite_empty_elements(
    xml: &str,
    tag: &str,
    mut derive_edit: impl FnMut(&BytesStart) -> EnumXmlEdit,
) -> Result<String, String> {
    let mut c_out = String::with_capacity(xml.len());
    for item in RawXmlEvents::new(xml) {
        let (event, c_raw) = item?;
        match event {
            Event::Empty(e) if is_tag(&e, tag) => match derive_edit(&e) {
                EnumXmlEdit::Keep => c_out.push_str(c_raw),
                EnumXmlEdit::Drop => {}
                EnumXmlEdit::Replace(c_markup) => c_out.push_str(&c_markup),
            },
            _ => c_out.push_str(c_raw),
        }
    }
    Ok(c_out)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tags

/// Whether the element's local name is `tag`.
pub fn is_tag(e: &BytesStart, tag: &str) -> bool {
    e.local_name().as_ref() == tag.as_bytes()
}

/// Unescaped value of the attribute whose local name is `key`.
pub fn derive_attr_value(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key.as_bytes())
        .and_then(|attr| attr.unescape_value().ok().map(|val| val.into_owned()))
}

/// Re-serialize a start tag with attributes overridden, added, or removed.
///
/// `overrides` pairs a qualified attribute name with its new value; `None` removes it.
/// Attributes not named keep their original escaped text.
pub fn rebuild_start_tag(e: &BytesStart, overrides: &[(&str, Option<String>)], if_empty: bool) -> String {
    let c_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut c_tag = format!("<{c_name}");
    for attr in e.attributes().with_checks(false).flatten() {
        let c_key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if overrides.iter().any(|(key, _)| *key == c_key) {
            continue;
        }
        let c_value = String::from_utf8_lossy(&attr.value).replace('"', "&quot;");
        c_tag.push_str(&format!(" {c_key}=\"{c_value}\""));
    }
    for (key, value) in overrides {
        if let Some(value) = value {
            c_tag.push_str(&format!(" {key}=\"{}\"", escape(value.as_str())));
        }
    }
    c_tag.push_str(if if_empty { "/>" } else { ">" });
    c_tag
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellReferences

/// Column letters for a zero-based column index (`0` is `A`).
pub fn derive_col_letters(col: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = col + 1;
    while n_rest > 0 {
        let n_digit = (n_rest - 1) % 26;
        l_chars.push(char::from(b'A' + n_digit as u8));
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// A1-style reference for a zero-based cell.
pub fn derive_cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", derive_col_letters(col), row + 1)
}

/// Zero-based `(row, col)` of an A1-style reference; `$` anchors are ignored.
pub fn parse_cell_ref(c_ref: &str) -> Option<(usize, usize)> {
    let c_ref = c_ref.replace('$', "");
    let n_split = c_ref.find(|ch: char| ch.is_ascii_digit())?;
    let (c_letters, c_digits) = c_ref.split_at(n_split);
    if c_letters.is_empty() || !c_letters.chars().all(|ch| ch.is_ascii_uppercase()) {
        return None;
    }
    let n_col = c_letters
        .bytes()
        .fold(0usize, |acc, byte| acc * 26 + usize::from(byte - b'A' + 1));
    let n_row: usize = c_digits.parse().ok()?;
    if n_row == 0 {
        return None;
    }
    Some((n_row - 1, n_col - 1))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Package

/// Read one package part as UTF-8 text.
pub fn read_zip_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, String> {
    let mut file = archive
        .by_name(name)
        .map_err(|err| format!("missing part {name}: {err}"))?;
    let mut c_text = String::new();
    file.read_to_string(&mut c_text)
        .map_err(|err| format!("unreadable part {name}: {err}"))?;
    Ok(c_text)
}

/// Package path of a relationship target relative to `xl/`.
pub fn normalize_part_path(target: &str) -> String {
    let c_joined = match target.strip_prefix('/') {
        Some(c_abs) => c_abs.to_string(),
        None => format!("xl/{target}"),
    };
    let mut l_segments: Vec<&str> = Vec::new();
    for c_seg in c_joined.split('/') {
        match c_seg {
            "" | "." => {}
            ".." => {
                l_segments.pop();
            }
            _ => l_segments.push(c_seg),
        }
    }
    l_segments.join("/")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_events_reproduce_the_input() {
        let xml = "<?xml version=\"1.0\"?>\n<a x='1'>\n  <b/><!-- c --><d>t&amp;x</d>\n</a>";
        let c_out: String = RawXmlEvents::new(xml)
            .map(|item| item.unwrap().1.to_string())
            .collect();
        assert_eq!(c_out, xml);
    }

    #[test]
    fn empty_elements_can_be_dropped_or_replaced() {
        let xml = r#"<r><x id="1"/><x id="2"/><y/></r>"#;
        let c_out = rewrite_empty_elements(xml, "x", |e| {
            match derive_attr_value(e, "id").as_deref() {
                Some("1") => EnumXmlEdit::Drop,
                _ => EnumXmlEdit::Replace(rebuild_start_tag(
                    e,
                    &[("id", Some("9".to_string()))],
                    true,
                )),
            }
        })
        .unwrap();
        assert_eq!(c_out, r#"<r><x id="9"/><y/></r>"#);
    }

    #[test]
    fn start_tag_keeps_unnamed_attributes() {
        let xml = r#"<row r="3" spans="1:10" s='2' ht="15"/>"#;
        let (event, _) = RawXmlEvents::new(xml).next().unwrap().unwrap();
        let Event::Empty(e) = event else {
            panic!("expected empty element");
        };
        assert_eq!(derive_attr_value(&e, "ht").as_deref(), Some("15"));
        let c_tag = rebuild_start_tag(
            &e,
            &[("spans", None), ("ht", Some("30".to_string()))],
            false,
        );
        assert_eq!(c_tag, r#"<row r="3" s="2" ht="30">"#);
    }

    #[test]
    fn cell_references() {
        assert_eq!(derive_cell_ref(0, 0), "A1");
        assert_eq!(derive_cell_ref(9, 25), "Z10");
        assert_eq!(derive_cell_ref(0, 26), "AA1");
        assert_eq!(derive_col_letters(701), "ZZ");
        assert_eq!(parse_cell_ref("M1"), Some((0, 12)));
        assert_eq!(parse_cell_ref("$AB$12"), Some((11, 27)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A0"), None);
    }

    #[test]
    fn relationship_targets_resolve_under_xl() {
        assert_eq!(
            normalize_part_path("worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            normalize_part_path("/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
        assert_eq!(normalize_part_path("../xl/sheet3.xml"), "xl/sheet3.xml");
    }
}
