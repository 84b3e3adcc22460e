//! Stylesheet registration for cells written into a template package.

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::conf::N_NUM_FMT_ID_CUSTOM_MIN;
use crate::ooxml::{RawXmlEvents, derive_attr_value, is_tag, rebuild_start_tag};
use crate::spec::SpecCellFormat;

/// Stylesheet sections that receive new entries, in schema order.
const TUP_STYLE_SECTIONS: [&str; 5] = ["numFmts", "fonts", "fills", "borders", "cellXfs"];

/// Entry counts of an existing stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecStyleCounts {
    /// `<numFmt>` entries.
    pub n_num_fmts: usize,
    /// Largest custom number format id in use.
    pub n_num_fmt_id_max: usize,
    /// Existing custom number formats by code.
    pub dict_num_fmt_ids: BTreeMap<String, usize>,
    /// `<font>` entries.
    pub n_fonts: usize,
    /// `<fill>` entries.
    pub n_fills: usize,
    /// `<border>` entries.
    pub n_borders: usize,
    /// `<xf>` entries of `<cellXfs>`.
    pub n_cell_xfs: usize,
    /// Sections present in the stylesheet.
    pub set_sections: BTreeSet<String>,
}

impl SpecStyleCounts {
    fn count_child(&mut self, c_section: Option<&str>, e: &BytesStart) {
        match c_section {
            Some("numFmts") if is_tag(e, "numFmt") => {
                self.n_num_fmts += 1;
                let n_id = derive_attr_value(e, "numFmtId")
                    .and_then(|val| val.parse::<usize>().ok());
                if let Some(n_id) = n_id {
                    self.n_num_fmt_id_max = self.n_num_fmt_id_max.max(n_id);
                    if let Some(c_code) = derive_attr_value(e, "formatCode") {
                        self.dict_num_fmt_ids.entry(c_code).or_insert(n_id);
                    }
                }
            }
            Some("fonts") if is_tag(e, "font") => self.n_fonts += 1,
            Some("fills") if is_tag(e, "fill") => self.n_fills += 1,
            Some("borders") if is_tag(e, "border") => self.n_borders += 1,
            Some("cellXfs") if is_tag(e, "xf") => self.n_cell_xfs += 1,
            _ => {}
        }
    }
}

/// Count the entries of each stylesheet section.
pub fn scan_style_counts(xml: &str) -> Result<SpecStyleCounts, String> {
    let mut counts = SpecStyleCounts::default();
    let mut c_section: Option<&'static str> = None;

    for item in RawXmlEvents::new(xml) {
        let (event, _) = item?;
        match event {
            Event::Start(e) => match TUP_STYLE_SECTIONS.iter().find(|tag| is_tag(&e, tag)) {
                Some(tag) => {
                    c_section = Some(*tag);
                    counts.set_sections.insert(tag.to_string());
                }
                None => counts.count_child(c_section, &e),
            },
            Event::Empty(e) => match TUP_STYLE_SECTIONS.iter().find(|tag| is_tag(&e, tag)) {
                Some(tag) => {
                    counts.set_sections.insert(tag.to_string());
                }
                None => counts.count_child(c_section, &e),
            },
            Event::End(e) => {
                if c_section.is_some_and(|tag| is_tag_end(e.local_name().as_ref(), tag)) {
                    c_section = None;
                }
            }
            _ => {}
        }
    }

    Ok(counts)
}

fn is_tag_end(name: &[u8], tag: &str) -> bool {
    name == tag.as_bytes()
}

/// Cell formats appended to an existing stylesheet; each distinct format gets one `<xf>`.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    counts: SpecStyleCounts,
    l_num_fmts: Vec<(usize, String)>,
    l_fonts: Vec<String>,
    l_fills: Vec<String>,
    l_borders: Vec<String>,
    l_xfs: Vec<String>,
}

impl StyleRegistry {
    /// Registry appending after the given existing entries.
    pub fn new(counts: SpecStyleCounts) -> Self {
        Self {
            counts,
            ..Default::default()
        }
    }

    /// `<cellXfs>` index for `fmt`; the default format maps to index 0.
    pub fn register(&mut self, fmt: &SpecCellFormat) -> usize {
        if *fmt == SpecCellFormat::default() {
            return 0;
        }

        let n_num_fmt_id = fmt
            .num_format
            .as_deref()
            .map(|c_code| self.intern_num_fmt(c_code))
            .unwrap_or(0);
        let n_font_id = derive_font_xml(fmt)
            .map(|c_xml| intern(&mut self.l_fonts, self.counts.n_fonts, c_xml))
            .unwrap_or(0);
        let n_fill_id = derive_fill_xml(fmt)
            .map(|c_xml| intern(&mut self.l_fills, self.counts.n_fills, c_xml))
            .unwrap_or(0);
        let n_border_id = derive_border_xml(fmt)
            .map(|c_xml| intern(&mut self.l_borders, self.counts.n_borders, c_xml))
            .unwrap_or(0);

        let c_xf = derive_xf_xml(fmt, n_num_fmt_id, n_font_id, n_fill_id, n_border_id);
        intern(&mut self.l_xfs, self.counts.n_cell_xfs, c_xf)
    }

    fn intern_num_fmt(&mut self, c_code: &str) -> usize {
        if let Some(&n_id) = self.counts.dict_num_fmt_ids.get(c_code) {
            return n_id;
        }
        if let Some((n_id, _)) = self.l_num_fmts.iter().find(|(_, code)| code == c_code) {
            return *n_id;
        }
        let n_id = N_NUM_FMT_ID_CUSTOM_MIN.max(self.counts.n_num_fmt_id_max + 1)
            + self.l_num_fmts.len();
        self.l_num_fmts.push((n_id, c_code.to_string()));
        n_id
    }

    /// New entries and existing count for one section.
    fn derive_section(&self, tag: &str) -> (Vec<String>, usize) {
        match tag {
            "numFmts" => (
                self.l_num_fmts
                    .iter()
                    .map(|(n_id, c_code)| {
                        format!(
                            "<numFmt numFmtId=\"{n_id}\" formatCode=\"{}\"/>",
                            escape(c_code.as_str())
                        )
                    })
                    .collect(),
                self.counts.n_num_fmts,
            ),
            "fonts" => (self.l_fonts.clone(), self.counts.n_fonts),
            "fills" => (self.l_fills.clone(), self.counts.n_fills),
            "borders" => (self.l_borders.clone(), self.counts.n_borders),
            "cellXfs" => (self.l_xfs.clone(), self.counts.n_cell_xfs),
            _ => (Vec::new(), 0),
        }
    }

    /// Append the registered entries to `xml` and update section counts.
    pub fn splice_styles_xml(&self, xml: &str) -> Result<String, String> {
        for tag in &TUP_STYLE_SECTIONS[1..] {
            let (l_new, _) = self.derive_section(tag);
            if !l_new.is_empty() && !self.counts.set_sections.contains(*tag) {
                return Err(format!("stylesheet has no <{tag}> section"));
            }
        }
        let (l_num_fmts_new, _) = self.derive_section("numFmts");
        let mut if_num_fmts_pending =
            !l_num_fmts_new.is_empty() && !self.counts.set_sections.contains("numFmts");

        let mut c_out = String::with_capacity(xml.len());
        for item in RawXmlEvents::new(xml) {
            let (event, c_raw) = item?;
            match &event {
                Event::Start(e) | Event::Empty(e) if if_num_fmts_pending && is_tag(e, "fonts") => {
                    c_out.push_str(&format!(
                        "<numFmts count=\"{}\">{}</numFmts>",
                        l_num_fmts_new.len(),
                        l_num_fmts_new.concat()
                    ));
                    if_num_fmts_pending = false;
                }
                _ => {}
            }

            let c_section = match &event {
                Event::Start(e) | Event::Empty(e) => {
                    TUP_STYLE_SECTIONS.iter().find(|tag| is_tag(e, tag))
                }
                Event::End(e) => TUP_STYLE_SECTIONS
                    .iter()
                    .find(|tag| is_tag_end(e.local_name().as_ref(), tag)),
                _ => None,
            };
            let Some(tag) = c_section else {
                c_out.push_str(c_raw);
                continue;
            };
            let (l_new, n_existing) = self.derive_section(tag);
            if l_new.is_empty() {
                c_out.push_str(c_raw);
                continue;
            }

            let l_count = [("count", Some((n_existing + l_new.len()).to_string()))];
            match &event {
                Event::Start(e) => c_out.push_str(&rebuild_start_tag(e, &l_count, false)),
                Event::Empty(e) => {
                    c_out.push_str(&rebuild_start_tag(e, &l_count, false));
                    c_out.push_str(&l_new.concat());
                    c_out.push_str(&format!("</{}>", String::from_utf8_lossy(e.name().as_ref())));
                }
                _ => {
                    c_out.push_str(&l_new.concat());
                    c_out.push_str(c_raw);
                }
            }
        }

        Ok(c_out)
    }
}

fn intern(l_items: &mut Vec<String>, n_offset: usize, c_item: String) -> usize {
    match l_items.iter().position(|item| *item == c_item) {
        Some(n_idx) => n_offset + n_idx,
        None => {
            l_items.push(c_item);
            n_offset + l_items.len() - 1
        }
    }
}

/// `FFRRGGBB` from `#RRGGBB`; other shapes pass through uppercased.
fn derive_argb(color: &str) -> String {
    let c_hex = color.trim().trim_start_matches('#').to_ascii_uppercase();
    if c_hex.len() == 6 {
        format!("FF{c_hex}")
    } else {
        c_hex
    }
}

fn derive_font_xml(fmt: &SpecCellFormat) -> Option<String> {
    if fmt.font_name.is_none()
        && fmt.font_size.is_none()
        && fmt.bold.is_none()
        && fmt.font_color.is_none()
    {
        return None;
    }
    let mut c_xml = String::from("<font>");
    if fmt.bold.unwrap_or(false) {
        c_xml.push_str("<b/>");
    }
    c_xml.push_str(&format!("<sz val=\"{}\"/>", fmt.font_size.unwrap_or(11.0)));
    if let Some(color) = &fmt.font_color {
        c_xml.push_str(&format!("<color rgb=\"{}\"/>", derive_argb(color)));
    }
    c_xml.push_str(&format!(
        "<name val=\"{}\"/>",
        escape(fmt.font_name.as_deref().unwrap_or("Calibri"))
    ));
    c_xml.push_str("</font>");
    Some(c_xml)
}

fn derive_fill_xml(fmt: &SpecCellFormat) -> Option<String> {
    fmt.bg_color.as_ref().map(|color| {
        format!(
            "<fill><patternFill patternType=\"solid\"><fgColor rgb=\"{}\"/><bgColor indexed=\"64\"/></patternFill></fill>",
            derive_argb(color)
        )
    })
}

fn derive_border_style_name(border: i64) -> Option<&'static str> {
    match border {
        1 => Some("thin"),
        2 => Some("medium"),
        3 => Some("dashed"),
        4 => Some("dotted"),
        5 => Some("thick"),
        6 => Some("double"),
        7 => Some("hair"),
        _ => None,
    }
}

fn derive_border_xml(fmt: &SpecCellFormat) -> Option<String> {
    let c_style = fmt.border.and_then(derive_border_style_name)?;
    let c_sides: String = ["left", "right", "top", "bottom"]
        .iter()
        .map(|side| format!("<{side} style=\"{c_style}\"/>"))
        .collect();
    Some(format!("<border>{c_sides}<diagonal/></border>"))
}

fn derive_horizontal_name(align: &str) -> Option<&'static str> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some("general"),
        "left" => Some("left"),
        "center" => Some("center"),
        "right" => Some("right"),
        "justify" => Some("justify"),
        "distributed" => Some("distributed"),
        _ => None,
    }
}

fn derive_vertical_name(valign: &str) -> Option<&'static str> {
    match valign.trim().to_ascii_lowercase().as_str() {
        "top" => Some("top"),
        "vcenter" => Some("center"),
        "bottom" => Some("bottom"),
        "vjustify" => Some("justify"),
        "vdistributed" => Some("distributed"),
        _ => None,
    }
}

fn derive_xf_xml(
    fmt: &SpecCellFormat,
    n_num_fmt_id: usize,
    n_font_id: usize,
    n_fill_id: usize,
    n_border_id: usize,
) -> String {
    let mut c_xf = format!(
        "<xf numFmtId=\"{n_num_fmt_id}\" fontId=\"{n_font_id}\" fillId=\"{n_fill_id}\" borderId=\"{n_border_id}\" xfId=\"0\""
    );
    for (c_attr, if_applied) in [
        ("applyNumberFormat", n_num_fmt_id > 0),
        ("applyFont", n_font_id > 0),
        ("applyFill", n_fill_id > 0),
        ("applyBorder", n_border_id > 0),
    ] {
        if if_applied {
            c_xf.push_str(&format!(" {c_attr}=\"1\""));
        }
    }

    let mut c_alignment = String::new();
    if let Some(c_name) = fmt.align.as_deref().and_then(derive_horizontal_name) {
        c_alignment.push_str(&format!(" horizontal=\"{c_name}\""));
    }
    if let Some(c_name) = fmt.valign.as_deref().and_then(derive_vertical_name) {
        c_alignment.push_str(&format!(" vertical=\"{c_name}\""));
    }
    if fmt.text_wrap.unwrap_or(false) {
        c_alignment.push_str(" wrapText=\"1\"");
    }

    if c_alignment.is_empty() {
        c_xf.push_str("/>");
    } else {
        c_xf.push_str(&format!(" applyAlignment=\"1\"><alignment{c_alignment}/></xf>"));
    }
    c_xf
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs><dxfs count="1"><dxf><font><b/></font></dxf></dxfs></styleSheet>"#;

    fn derive_header_format() -> SpecCellFormat {
        SpecCellFormat {
            font_name: Some("Meiryo UI".to_string()),
            font_size: Some(10.0),
            bold: Some(true),
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            border: Some(1),
            text_wrap: Some(true),
            bg_color: Some("#4F81BD".to_string()),
            font_color: Some("#FFFFFF".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn counts_ignore_nested_and_differential_entries() {
        let counts = scan_style_counts(C_STYLES).unwrap();
        assert_eq!(counts.n_fonts, 1);
        assert_eq!(counts.n_fills, 2);
        assert_eq!(counts.n_borders, 1);
        assert_eq!(counts.n_cell_xfs, 2);
        assert_eq!(counts.n_num_fmts, 0);
        assert!(!counts.set_sections.contains("numFmts"));
    }

    #[test]
    fn registered_formats_are_appended_once() {
        let mut registry = StyleRegistry::new(scan_style_counts(C_STYLES).unwrap());
        let n_header = registry.register(&derive_header_format());
        let n_header_again = registry.register(&derive_header_format());
        let n_date = registry.register(&SpecCellFormat {
            num_format: Some("yyyy/m/d".to_string()),
            ..Default::default()
        });
        assert_eq!(n_header, 2);
        assert_eq!(n_header_again, 2);
        assert_eq!(n_date, 3);
        assert_eq!(registry.register(&SpecCellFormat::default()), 0);

        let c_out = registry.splice_styles_xml(C_STYLES).unwrap();
        assert!(c_out.contains(r#"<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy/m/d"/></numFmts><fonts count="2">"#));
        assert!(c_out.contains(r#"<font><b/><sz val="10"/><color rgb="FFFFFFFF"/><name val="Meiryo UI"/></font></fonts>"#));
        assert!(c_out.contains(r#"<fills count="3">"#));
        assert!(c_out.contains(r#"<fgColor rgb="FF4F81BD"/>"#));
        assert!(c_out.contains(r#"<borders count="2">"#));
        assert!(c_out.contains(r#"<left style="thin"/>"#));
        assert!(c_out.contains(r#"<cellXfs count="4">"#));
        assert!(c_out.contains(r#"<alignment horizontal="center" vertical="center" wrapText="1"/>"#));
        assert!(c_out.contains(r#"<cellStyleXfs count="1">"#));
        assert!(c_out.contains(r#"<dxfs count="1"><dxf><font><b/></font></dxf></dxfs>"#));
        assert_eq!(scan_style_counts(&c_out).unwrap().n_cell_xfs, 4);
    }

    #[test]
    fn nothing_registered_leaves_stylesheet_unchanged() {
        let registry = StyleRegistry::new(scan_style_counts(C_STYLES).unwrap());
        assert_eq!(registry.splice_styles_xml(C_STYLES).unwrap(), C_STYLES);
    }

    #[test]
    fn missing_font_section_is_an_error() {
        let c_styles = r#"<styleSheet><cellXfs count="1"><xf/></cellXfs></styleSheet>"#;
        let mut registry = StyleRegistry::new(scan_style_counts(c_styles).unwrap());
        registry.register(&derive_header_format());
        let err = registry.splice_styles_xml(c_styles).unwrap_err();
        assert!(err.contains("<fonts>"));
    }

    #[test]
    fn existing_number_format_is_reused() {
        let c_styles = r#"<styleSheet><numFmts count="1"><numFmt numFmtId="170" formatCode="yyyy/m/d"/></numFmts><fonts count="1"><font/></fonts><fills count="1"><fill/></fills><borders count="1"><border/></borders><cellXfs count="1"><xf/></cellXfs></styleSheet>"#;
        let mut registry = StyleRegistry::new(scan_style_counts(c_styles).unwrap());
        registry.register(&SpecCellFormat {
            num_format: Some("yyyy/m/d".to_string()),
            ..Default::default()
        });
        registry.register(&SpecCellFormat {
            num_format: Some("0.00%".to_string()),
            ..Default::default()
        });
        let c_out = registry.splice_styles_xml(c_styles).unwrap();
        assert!(c_out.contains(r#"<numFmts count="2"><numFmt numFmtId="170" formatCode="yyyy/m/d"/><numFmt numFmtId="171" formatCode="0.00%"/></numFmts>"#));
        assert!(c_out.contains(r#"<xf numFmtId="170" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#));
    }
}
