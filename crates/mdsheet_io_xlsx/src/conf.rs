//! XLSX layout constants and default format preset factories.

use mdsheet_conf::{EnumHorizontalAlign, EnumVerticalAlign, SpecConvertConf};

use crate::spec::{EnumCellStyle, EnumCellValue, SpecCellFormat, SpecLayoutFormats};

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Header fill color.
pub const C_COLOR_HEADER_BG: &str = "#4F81BD";
/// Header font color.
pub const C_COLOR_HEADER_FONT: &str = "#FFFFFF";
/// Number format for date cells carried over from a template.
pub const C_NUM_FORMAT_DATETIME: &str = "yyyy/m/d";
/// Thin border style code.
pub const N_BORDER_THIN: i64 = 1;

/// Value shape of a hierarchical identifier cell.
pub const C_PATTERN_IDENTIFIER: &str = r"^\d+-\d+-\d+$";

/// One-based spreadsheet row of the first data row in a fresh sheet.
pub const N_ROW_ORIGIN_FRESH: usize = 2;

/// Workbook part listing the sheets.
pub const C_PART_WORKBOOK: &str = "xl/workbook.xml";
/// Relationships of the workbook part.
pub const C_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
/// Shared stylesheet part.
pub const C_PART_STYLES: &str = "xl/styles.xml";
/// Formula calculation chain; dropped whenever a sheet is patched.
pub const C_PART_CALC_CHAIN: &str = "xl/calcChain.xml";
/// Package content-type listing.
pub const C_PART_CONTENT_TYPES: &str = "[Content_Types].xml";

/// Worksheet children that must follow `<mergeCells>`, in schema order.
pub const TUP_SHEET_TAGS_AFTER_MERGE: [&str; 24] = [
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// First id available to custom number formats.
pub const N_NUM_FMT_ID_CUSTOM_MIN: usize = 164;

/// Format-spec alignment name for a horizontal alignment.
pub fn derive_horizontal_align_name(align: EnumHorizontalAlign) -> &'static str {
    match align {
        EnumHorizontalAlign::General => "general",
        EnumHorizontalAlign::Left => "left",
        EnumHorizontalAlign::Center => "center",
        EnumHorizontalAlign::Right => "right",
        EnumHorizontalAlign::Justify => "justify",
        EnumHorizontalAlign::Distributed => "distributed",
    }
}

/// Format-spec alignment name for a vertical alignment.
pub fn derive_vertical_align_name(align: EnumVerticalAlign) -> &'static str {
    match align {
        EnumVerticalAlign::Top => "top",
        EnumVerticalAlign::Center => "vcenter",
        EnumVerticalAlign::Bottom => "bottom",
        EnumVerticalAlign::Justify => "vjustify",
        EnumVerticalAlign::Distributed => "vdistributed",
    }
}

/// Build the header, per-column data, and auxiliary format presets for a config.
pub fn derive_layout_formats(conf: &SpecConvertConf) -> SpecLayoutFormats {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some(conf.excel_settings.font_name.clone()),
        font_size: Some(conf.excel_settings.font_size),
        border: Some(N_BORDER_THIN),
        text_wrap: Some(true),
        ..Default::default()
    };

    let header = cfg_base_fmt_spec.with_(SpecCellFormat {
        bold: Some(true),
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        bg_color: Some(C_COLOR_HEADER_BG.to_string()),
        font_color: Some(C_COLOR_HEADER_FONT.to_string()),
        ..Default::default()
    });

    let primary = conf
        .columns
        .iter()
        .map(|col| {
            cfg_base_fmt_spec.with_(SpecCellFormat {
                align: Some(derive_horizontal_align_name(col.horizontal).to_string()),
                valign: Some(derive_vertical_align_name(col.vertical).to_string()),
                ..Default::default()
            })
        })
        .collect();

    let auxiliary = cfg_base_fmt_spec.with_(SpecCellFormat {
        align: Some("left".to_string()),
        valign: Some("top".to_string()),
        ..Default::default()
    });

    SpecLayoutFormats {
        header,
        primary,
        auxiliary,
        datetime: SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_DATETIME.to_string()),
            ..Default::default()
        },
    }
}

/// Concrete format spec for a style slot and value.
pub fn resolve_cell_format_spec(
    formats: &SpecLayoutFormats,
    style: EnumCellStyle,
    value: &EnumCellValue,
) -> SpecCellFormat {
    let fmt_spec = match style {
        EnumCellStyle::Raw => SpecCellFormat::default(),
        EnumCellStyle::Header => formats.header.clone(),
        EnumCellStyle::Primary(col) => formats.primary.get(col).cloned().unwrap_or_default(),
        EnumCellStyle::Auxiliary => formats.auxiliary.clone(),
    };
    match value {
        EnumCellValue::DateTime(_) => fmt_spec.merge(&formats.datetime),
        _ => fmt_spec,
    }
}
