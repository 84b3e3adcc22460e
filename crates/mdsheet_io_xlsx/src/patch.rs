//! In-place template patching.
//!
//! The target sheet part and the stylesheet are rewritten event by event; every
//! other part of the package is copied unchanged. Template formulas, styles,
//! column widths, validations, drawings and sheets outside the data block survive.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::conf::{
    C_PART_CALC_CHAIN, C_PART_CONTENT_TYPES, C_PART_STYLES, C_PART_WORKBOOK,
    C_PART_WORKBOOK_RELS, TUP_SHEET_TAGS_AFTER_MERGE, resolve_cell_format_spec,
};
use crate::grid::SpecGridCell;
use crate::ooxml::{
    EnumXmlEdit, RawXmlEvents, derive_attr_value, derive_cell_ref, is_tag, normalize_part_path,
    parse_cell_ref, read_zip_text, rebuild_start_tag, rewrite_empty_elements,
};
use crate::spec::{EnumCellValue, SpecLayoutFormats, SpecSheetPatch, XlsxLayoutError};
use crate::styles::{StyleRegistry, scan_style_counts};

/// Zero-based `(row, col)` to `<cellXfs>` index.
type XfIndex = BTreeMap<(usize, usize), usize>;

////////////////////////////////////////////////////////////////////////////////
// #region Package

/// Apply `patch` to the template package at `path` and return the new package bytes.
///
/// The template file itself is only read.
pub fn patch_template_package(
    path: &Path,
    patch: &SpecSheetPatch,
    formats: &SpecLayoutFormats,
) -> Result<Vec<u8>, XlsxLayoutError> {
    let file = File::open(path).map_err(|err| XlsxLayoutError::TemplatePackage {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    rewrite_package(file, patch, formats).map_err(|message| XlsxLayoutError::TemplatePackage {
        path: path.to_path_buf(),
        message,
    })
}

fn rewrite_package<R: Read + Seek>(
    reader: R,
    patch: &SpecSheetPatch,
    formats: &SpecLayoutFormats,
) -> Result<Vec<u8>, String> {
    let mut archive =
        ZipArchive::new(reader).map_err(|err| format!("not an xlsx package: {err}"))?;

    let c_workbook = read_zip_text(&mut archive, C_PART_WORKBOOK)?;
    let c_rels = read_zip_text(&mut archive, C_PART_WORKBOOK_RELS)?;
    let c_part_sheet = locate_sheet_part(&c_workbook, &c_rels, &patch.sheet_name)?;
    let c_sheet = read_zip_text(&mut archive, &c_part_sheet)?;
    let c_styles = read_zip_text(&mut archive, C_PART_STYLES)?;

    let mut registry = StyleRegistry::new(scan_style_counts(&c_styles)?);
    let dict_xf: XfIndex = patch
        .cells
        .iter()
        .map(|(&key, cell)| {
            let fmt_spec = resolve_cell_format_spec(formats, cell.style, &cell.value);
            (key, registry.register(&fmt_spec))
        })
        .collect();

    let mut dict_parts: BTreeMap<String, String> = BTreeMap::new();
    dict_parts.insert(
        c_part_sheet.clone(),
        splice_sheet_xml(&c_sheet, patch, &dict_xf)?,
    );
    dict_parts.insert(
        C_PART_STYLES.to_string(),
        registry.splice_styles_xml(&c_styles)?,
    );
    dict_parts.insert(
        C_PART_WORKBOOK.to_string(),
        rewrite_empty_elements(&c_workbook, "calcPr", |e| {
            EnumXmlEdit::Replace(rebuild_start_tag(
                e,
                &[("fullCalcOnLoad", Some("1".to_string()))],
                true,
            ))
        })?,
    );

    // Cell edits invalidate the calculation chain; the application rebuilds it.
    let if_calc_chain = archive.file_names().any(|name| name == C_PART_CALC_CHAIN);
    if if_calc_chain {
        let c_content_types = read_zip_text(&mut archive, C_PART_CONTENT_TYPES)?;
        dict_parts.insert(
            C_PART_CONTENT_TYPES.to_string(),
            rewrite_empty_elements(&c_content_types, "Override", |e| {
                let c_part = derive_attr_value(e, "PartName").unwrap_or_default();
                if c_part.trim_start_matches('/') == C_PART_CALC_CHAIN {
                    EnumXmlEdit::Drop
                } else {
                    EnumXmlEdit::Keep
                }
            })?,
        );
        dict_parts.insert(
            C_PART_WORKBOOK_RELS.to_string(),
            rewrite_empty_elements(&c_rels, "Relationship", |e| {
                let c_target = derive_attr_value(e, "Target").unwrap_or_default();
                if normalize_part_path(&c_target) == C_PART_CALC_CHAIN {
                    EnumXmlEdit::Drop
                } else {
                    EnumXmlEdit::Keep
                }
            })?,
        );
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for n_idx in 0..archive.len() {
        let mut file = archive
            .by_index(n_idx)
            .map_err(|err| format!("unreadable package entry {n_idx}: {err}"))?;
        let c_name = file.name().to_string();
        if if_calc_chain && c_name == C_PART_CALC_CHAIN {
            continue;
        }

        let method = match file.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default().compression_method(method);
        if file.is_dir() {
            writer
                .add_directory(c_name, options)
                .map_err(|err| format!("cannot add package directory: {err}"))?;
            continue;
        }

        let mut v_data = Vec::new();
        match dict_parts.get(&c_name) {
            Some(c_text) => v_data.extend_from_slice(c_text.as_bytes()),
            None => {
                file.read_to_end(&mut v_data)
                    .map_err(|err| format!("unreadable part {c_name}: {err}"))?;
            }
        }
        writer
            .start_file(c_name.as_str(), options)
            .map_err(|err| format!("cannot write part {c_name}: {err}"))?;
        writer
            .write_all(&v_data)
            .map_err(|err| format!("cannot write part {c_name}: {err}"))?;
    }

    let cursor = writer
        .finish()
        .map_err(|err| format!("cannot finish package: {err}"))?;
    debug!(
        part = %c_part_sheet,
        n_cells = patch.cells.len(),
        n_merges = patch.merges.len(),
        if_calc_chain,
        "patched template package"
    );
    Ok(cursor.into_inner())
}

/// Package path of the worksheet part named `sheet_name`.
pub fn locate_sheet_part(
    workbook_xml: &str,
    rels_xml: &str,
    sheet_name: &str,
) -> Result<String, String> {
    let mut c_rel_id = None;
    for item in RawXmlEvents::new(workbook_xml) {
        let (event, _) = item?;
        if let Event::Start(e) | Event::Empty(e) = event
            && is_tag(&e, "sheet")
            && derive_attr_value(&e, "name").as_deref() == Some(sheet_name)
        {
            c_rel_id = derive_attr_value(&e, "id");
            break;
        }
    }
    let c_rel_id = c_rel_id.ok_or_else(|| format!("workbook has no sheet {sheet_name:?}"))?;

    for item in RawXmlEvents::new(rels_xml) {
        let (event, _) = item?;
        if let Event::Start(e) | Event::Empty(e) = event
            && is_tag(&e, "Relationship")
            && derive_attr_value(&e, "Id").as_deref() == Some(c_rel_id.as_str())
            && let Some(c_target) = derive_attr_value(&e, "Target")
        {
            return Ok(normalize_part_path(&c_target));
        }
    }
    Err(format!("no relationship {c_rel_id:?} for sheet {sheet_name:?}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetSplice

/// Rewrite one worksheet part with `patch`; `dict_xf` supplies cell style indexes.
pub fn splice_sheet_xml(xml: &str, patch: &SpecSheetPatch, dict_xf: &XfIndex) -> Result<String, String> {
    let mut splice = SheetSplice::new(patch, dict_xf, xml.len());
    let mut events = RawXmlEvents::new(xml);
    let mut n_depth = 0usize;

    while let Some(item) = events.next() {
        let (event, c_raw) = item?;
        match &event {
            Event::Start(e) | Event::Empty(e) => {
                let if_empty = matches!(event, Event::Empty(_));
                if n_depth == 1 {
                    splice.before_sheet_child(e);
                    if is_tag(e, "dimension") && if_empty {
                        splice.write_dimension(e, c_raw);
                        continue;
                    }
                    if is_tag(e, "cols") {
                        splice.write_cols(if_empty, &mut events)?;
                        continue;
                    }
                    if is_tag(e, "mergeCells") {
                        if !if_empty {
                            skip_element(&mut events)?;
                        }
                        splice.write_merges();
                        continue;
                    }
                    if is_tag(e, "sheetData") {
                        if if_empty {
                            splice.c_out.push_str("<sheetData>");
                            splice.flush_rows(None);
                            splice.c_out.push_str("</sheetData>");
                            splice.if_sheet_data_done = true;
                            continue;
                        }
                        splice.if_in_sheet_data = true;
                    }
                } else if n_depth == 2
                    && splice.if_in_sheet_data
                    && is_tag(e, "row")
                    && splice.write_row(e, if_empty, &mut events)?
                {
                    continue;
                }
                splice.c_out.push_str(c_raw);
                if !if_empty {
                    n_depth += 1;
                }
            }
            Event::End(e) => {
                n_depth = n_depth.saturating_sub(1);
                let name = e.local_name();
                if n_depth == 1 && splice.if_in_sheet_data && name.as_ref() == b"sheetData" {
                    splice.flush_rows(None);
                    splice.if_in_sheet_data = false;
                    splice.if_sheet_data_done = true;
                }
                if n_depth == 0 {
                    splice.write_merges();
                }
                splice.c_out.push_str(c_raw);
            }
            _ => splice.c_out.push_str(c_raw),
        }
    }

    Ok(splice.c_out)
}

struct SheetSplice<'p> {
    patch: &'p SpecSheetPatch,
    dict_xf: &'p XfIndex,
    c_out: String,
    set_rows_pending: BTreeSet<usize>,
    n_row_next: usize,
    if_in_sheet_data: bool,
    if_sheet_data_done: bool,
    if_cols_done: bool,
    if_merges_done: bool,
}

impl<'p> SheetSplice<'p> {
    fn new(patch: &'p SpecSheetPatch, dict_xf: &'p XfIndex, n_capacity: usize) -> Self {
        let set_rows_pending = patch
            .cells
            .keys()
            .map(|&(row, _)| row)
            .chain(patch.heights.keys().copied())
            .filter(|&row| patch.contains_row(row))
            .collect();
        Self {
            patch,
            dict_xf,
            c_out: String::with_capacity(n_capacity),
            set_rows_pending,
            n_row_next: 0,
            if_in_sheet_data: false,
            if_sheet_data_done: false,
            if_cols_done: false,
            if_merges_done: false,
        }
    }

    /// Insert sections the template lacks ahead of the first child that must follow them.
    fn before_sheet_child(&mut self, e: &BytesStart) {
        if !self.if_cols_done && is_tag(e, "sheetData") {
            self.write_col_tags(&[]);
        }
        if !self.if_merges_done
            && self.if_sheet_data_done
            && TUP_SHEET_TAGS_AFTER_MERGE.iter().any(|tag| is_tag(e, tag))
        {
            self.write_merges();
        }
    }

    fn write_dimension(&mut self, e: &BytesStart, c_raw: &str) {
        let l_old = derive_attr_value(e, "ref")
            .map(|c_ref| {
                c_ref
                    .split(':')
                    .filter_map(parse_cell_ref)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let l_corners: Vec<(usize, usize)> =
            l_old.into_iter().chain(self.patch.cells.keys().copied()).collect();
        let (Some(n_row_min), Some(n_row_max), Some(n_col_min), Some(n_col_max)) = (
            l_corners.iter().map(|&(row, _)| row).min(),
            l_corners.iter().map(|&(row, _)| row).max(),
            l_corners.iter().map(|&(_, col)| col).min(),
            l_corners.iter().map(|&(_, col)| col).max(),
        ) else {
            self.c_out.push_str(c_raw);
            return;
        };

        let c_start = derive_cell_ref(n_row_min, n_col_min);
        let c_end = derive_cell_ref(n_row_max, n_col_max);
        let c_ref = if c_start == c_end {
            c_start
        } else {
            format!("{c_start}:{c_end}")
        };
        self.c_out
            .push_str(&rebuild_start_tag(e, &[("ref", Some(c_ref))], true));
    }

    fn write_cols(&mut self, if_empty: bool, events: &mut RawXmlEvents) -> Result<(), String> {
        let mut l_cols = Vec::new();
        if !if_empty {
            loop {
                let Some(item) = events.next() else {
                    return Err("sheet XML ends inside <cols>".to_string());
                };
                let (event, c_raw) = item?;
                match event {
                    Event::Empty(e) if is_tag(&e, "col") => {
                        let n_min = derive_attr_value(&e, "min")
                            .and_then(|val| val.parse::<usize>().ok())
                            .unwrap_or(1)
                            .max(1);
                        let n_max = derive_attr_value(&e, "max")
                            .and_then(|val| val.parse::<usize>().ok())
                            .unwrap_or(n_min)
                            .max(n_min);
                        l_cols.push(SpecColTag {
                            e: e.into_owned(),
                            c_raw: c_raw.to_string(),
                            n_min,
                            n_max,
                        });
                    }
                    Event::End(e) if e.local_name().as_ref() == b"cols" => break,
                    _ => {}
                }
            }
        }
        self.write_col_tags(&l_cols);
        Ok(())
    }

    fn write_col_tags(&mut self, l_cols: &[SpecColTag]) {
        self.if_cols_done = true;
        let l_tags = plan_col_tags(l_cols, &self.patch.widths);
        if l_tags.is_empty() {
            return;
        }
        self.c_out.push_str("<cols>");
        self.c_out.push_str(&l_tags.concat());
        self.c_out.push_str("</cols>");
    }

    fn write_merges(&mut self) {
        if self.if_merges_done {
            return;
        }
        self.if_merges_done = true;
        if self.patch.merges.is_empty() {
            return;
        }
        self.c_out.push_str(&format!(
            "<mergeCells count=\"{}\">",
            self.patch.merges.len()
        ));
        for merge in &self.patch.merges {
            self.c_out.push_str(&format!(
                "<mergeCell ref=\"{}:{}\"/>",
                derive_cell_ref(merge.row_start, merge.col_start),
                derive_cell_ref(merge.row_end, merge.col_end)
            ));
        }
        self.c_out.push_str("</mergeCells>");
    }

    /// Rewrite a template row inside the patched block; `false` leaves it to be copied.
    fn write_row(
        &mut self,
        e: &BytesStart,
        if_empty: bool,
        events: &mut RawXmlEvents,
    ) -> Result<bool, String> {
        let n_row = derive_attr_value(e, "r")
            .and_then(|val| val.parse::<usize>().ok())
            .and_then(|n_row| n_row.checked_sub(1))
            .unwrap_or(self.n_row_next);
        self.n_row_next = n_row + 1;
        self.flush_rows(Some(n_row));
        if !self.patch.contains_row(n_row) {
            return Ok(false);
        }

        let (l_kept, c_tail) = if if_empty {
            (Vec::new(), String::new())
        } else {
            capture_row_children(events, self.patch.n_cols)?
        };
        let mut l_overrides = vec![("r", Some((n_row + 1).to_string())), ("spans", None)];
        if let Some(n_height) = self.patch.heights.get(&n_row) {
            l_overrides.push(("ht", Some(n_height.to_string())));
            l_overrides.push(("customHeight", Some("1".to_string())));
        }
        self.c_out.push_str(&rebuild_start_tag(e, &l_overrides, false));
        self.write_row_cells(n_row, l_kept);
        self.c_out.push_str(&c_tail);
        self.c_out.push_str(&format!(
            "</{}>",
            String::from_utf8_lossy(e.name().as_ref())
        ));
        self.set_rows_pending.remove(&n_row);
        Ok(true)
    }

    /// Write pending new rows above `row_limit`, or all of them.
    fn flush_rows(&mut self, row_limit: Option<usize>) {
        let l_rows: Vec<usize> = self
            .set_rows_pending
            .iter()
            .copied()
            .filter(|&row| row_limit.is_none_or(|limit| row < limit))
            .collect();
        for row in l_rows {
            self.set_rows_pending.remove(&row);
            let c_height = self
                .patch
                .heights
                .get(&row)
                .map(|n_height| format!(" ht=\"{n_height}\" customHeight=\"1\""))
                .unwrap_or_default();
            self.c_out
                .push_str(&format!("<row r=\"{}\"{c_height}>", row + 1));
            self.write_row_cells(row, Vec::new());
            self.c_out.push_str("</row>");
        }
    }

    fn write_row_cells(&mut self, row: usize, l_kept: Vec<(usize, String)>) {
        let mut l_cells: Vec<(usize, String)> = self
            .patch
            .cells
            .range((row, 0)..(row, self.patch.n_cols))
            .map(|(&(_, col), cell)| {
                let n_xf = self.dict_xf.get(&(row, col)).copied().unwrap_or(0);
                (col, derive_cell_xml(row, col, cell, n_xf))
            })
            .collect();
        l_cells.extend(l_kept);
        l_cells.sort_by_key(|(col, _)| *col);
        for (_, c_cell) in l_cells {
            self.c_out.push_str(&c_cell);
        }
    }
}

/// Template `<col>` element with its span.
struct SpecColTag {
    e: BytesStart<'static>,
    c_raw: String,
    n_min: usize,
    n_max: usize,
}

/// `<col>` tags after applying zero-based `widths`, sorted by first column.
///
/// Template spans are split around patched columns; a patched column keeps the
/// template's other attributes, such as its style.
fn plan_col_tags(l_cols: &[SpecColTag], widths: &BTreeMap<usize, f64>) -> Vec<String> {
    let mut l_tags: Vec<(usize, String)> = Vec::new();
    let mut set_covered = BTreeSet::new();
    let derive_span = |tag: &SpecColTag, n_min: usize, n_max: usize, n_width: Option<f64>| {
        let mut l_overrides = vec![
            ("min", Some(n_min.to_string())),
            ("max", Some(n_max.to_string())),
        ];
        if let Some(n_width) = n_width {
            l_overrides.push(("width", Some(derive_stored_col_width(n_width).to_string())));
            l_overrides.push(("customWidth", Some("1".to_string())));
        }
        rebuild_start_tag(&tag.e, &l_overrides, true)
    };

    for tag in l_cols {
        if widths.range(tag.n_min - 1..tag.n_max).next().is_none() {
            l_tags.push((tag.n_min, tag.c_raw.clone()));
            continue;
        }
        let mut n_run_start = None;
        for n_col in tag.n_min..=tag.n_max {
            match widths.get(&(n_col - 1)) {
                Some(&n_width) => {
                    if let Some(n_start) = n_run_start.take() {
                        l_tags.push((n_start, derive_span(tag, n_start, n_col - 1, None)));
                    }
                    l_tags.push((n_col, derive_span(tag, n_col, n_col, Some(n_width))));
                    set_covered.insert(n_col);
                }
                None => {
                    n_run_start.get_or_insert(n_col);
                }
            }
        }
        if let Some(n_start) = n_run_start {
            l_tags.push((n_start, derive_span(tag, n_start, tag.n_max, None)));
        }
    }

    for (&col, &n_width) in widths {
        let n_col = col + 1;
        if set_covered.contains(&n_col) {
            continue;
        }
        l_tags.push((
            n_col,
            format!(
                "<col min=\"{n_col}\" max=\"{n_col}\" width=\"{}\" customWidth=\"1\"/>",
                derive_stored_col_width(n_width)
            ),
        ));
    }

    l_tags.sort_by_key(|(n_col, _)| *n_col);
    l_tags.into_iter().map(|(_, c_tag)| c_tag).collect()
}

/// Width as stored in `<col>`, including the cell padding the application adds.
fn derive_stored_col_width(n_width: f64) -> f64 {
    let n_digit = 7.0;
    let n_padding = 5.0;
    if n_width <= 0.0 {
        0.0
    } else if n_width < 1.0 {
        ((n_width * (n_digit + n_padding)).round() / n_digit * 256.0).trunc() / 256.0
    } else {
        ((n_width * n_digit + n_padding) / n_digit * 256.0).trunc() / 256.0
    }
}

/// Template cells at or right of `n_cols` with their column, plus any non-cell children.
fn capture_row_children(
    events: &mut RawXmlEvents,
    n_cols: usize,
) -> Result<(Vec<(usize, String)>, String), String> {
    let mut l_kept = Vec::new();
    let mut c_tail = String::new();
    let mut c_cell = String::new();
    let mut n_col_cell = 0usize;
    let mut n_col_next = 0usize;
    let mut n_depth = 0usize;

    loop {
        let Some(item) = events.next() else {
            return Err("sheet XML ends inside <row>".to_string());
        };
        let (event, c_raw) = item?;
        match &event {
            Event::Start(e) | Event::Empty(e) if n_depth == 0 && is_tag(e, "c") => {
                n_col_cell = derive_attr_value(e, "r")
                    .and_then(|c_ref| parse_cell_ref(&c_ref))
                    .map(|(_, col)| col)
                    .unwrap_or(n_col_next);
                n_col_next = n_col_cell + 1;
                if matches!(event, Event::Empty(_)) {
                    if n_col_cell >= n_cols {
                        l_kept.push((n_col_cell, c_raw.to_string()));
                    }
                } else {
                    c_cell = c_raw.to_string();
                    n_depth = 1;
                }
            }
            Event::End(_) if n_depth == 0 => break,
            Event::End(_) if n_depth == 1 && !c_cell.is_empty() => {
                c_cell.push_str(c_raw);
                if n_col_cell >= n_cols {
                    l_kept.push((n_col_cell, std::mem::take(&mut c_cell)));
                }
                c_cell.clear();
                n_depth = 0;
            }
            _ => {
                match &event {
                    Event::Start(_) => n_depth += 1,
                    Event::End(_) => n_depth -= 1,
                    _ => {}
                }
                if c_cell.is_empty() {
                    c_tail.push_str(c_raw);
                } else {
                    c_cell.push_str(c_raw);
                }
            }
        }
    }

    Ok((l_kept, c_tail))
}

/// Skip the rest of an element whose start tag was just read.
fn skip_element(events: &mut RawXmlEvents) -> Result<(), String> {
    let mut n_depth = 0usize;
    loop {
        let Some(item) = events.next() else {
            return Err("sheet XML ends inside an element".to_string());
        };
        match item?.0 {
            Event::Start(_) => n_depth += 1,
            Event::End(_) if n_depth == 0 => return Ok(()),
            Event::End(_) => n_depth -= 1,
            _ => {}
        }
    }
}

fn derive_cell_xml(row: usize, col: usize, cell: &SpecGridCell, n_xf: usize) -> String {
    let c_ref = derive_cell_ref(row, col);
    let c_style = if n_xf > 0 {
        format!(" s=\"{n_xf}\"")
    } else {
        String::new()
    };
    match &cell.value {
        EnumCellValue::None => format!("<c r=\"{c_ref}\"{c_style}/>"),
        EnumCellValue::String(val) => format!(
            "<c r=\"{c_ref}\"{c_style} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            escape(val.as_str())
        ),
        EnumCellValue::Number(val) | EnumCellValue::DateTime(val) => {
            format!("<c r=\"{c_ref}\"{c_style}><v>{val}</v></c>")
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
