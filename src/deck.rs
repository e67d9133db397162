// PowerPoint (.pptx) deck assembly.
//
// The package is written part by part into an in-memory zip: one slide
// master, one "Title Only" layout, one theme, then a slide per export item.
// All geometry and colours come from `DeckStyle`.
use crate::chart::ChartImage;
use crate::config::{BoxIn, DeckStyle, DelayRule};
use crate::error::Result;
use crate::reports::{DashboardMetrics, MetricKind};
use crate::util::format_plain;
use chrono::Utc;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const EMU_PER_INCH: f64 = 914_400.0;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
// Built-in "Medium Style 2 - Accent 1".
const TABLE_STYLE_ID: &str = "{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}";

/// One slide worth of content.
#[derive(Debug, Clone)]
pub enum ExportItem<'a> {
    Dashboard {
        metrics: &'a DashboardMetrics,
        delay_rule: DelayRule,
    },
    Chart(&'a ChartImage),
}

impl ExportItem<'_> {
    fn is_dashboard(&self) -> bool {
        matches!(self, ExportItem::Dashboard { .. })
    }
}

/// Slide titles in the order `build_deck` lays them out.
pub fn slide_titles(items: &[ExportItem<'_>], style: &DeckStyle) -> Vec<String> {
    ordered(items)
        .into_iter()
        .map(|item| match item {
            ExportItem::Dashboard { .. } => style.dashboard_title.clone(),
            ExportItem::Chart(img) => img.title.clone(),
        })
        .collect()
}

/// The dashboard slide goes first; charts keep their relative order.
fn ordered<'i, 'a>(items: &'i [ExportItem<'a>]) -> Vec<&'i ExportItem<'a>> {
    let (mut dashboards, charts): (Vec<_>, Vec<_>) = items.iter().partition(|i| i.is_dashboard());
    dashboards.extend(charts);
    dashboards
}

pub fn build_deck(items: &[ExportItem<'_>], style: &DeckStyle) -> Result<Vec<u8>> {
    let items = ordered(items);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut media: Vec<String> = Vec::new();
    let mut slides: Vec<(String, String)> = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let n = idx + 1;
        match item {
            ExportItem::Dashboard { metrics, delay_rule } => {
                slides.push((
                    dashboard_slide(metrics, *delay_rule, style),
                    slide_rels(None),
                ));
            }
            ExportItem::Chart(img) => {
                let name = format!("image{}.png", media.len() + 1);
                zip.start_file(format!("ppt/media/{}", name), options)?;
                zip.write_all(&img.png)?;
                media.push(name.clone());
                slides.push((chart_slide(img, n, style), slide_rels(Some(&name))));
            }
        }
    }

    let parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".to_string(), content_types(slides.len())),
        ("_rels/.rels".to_string(), package_rels()),
        ("docProps/core.xml".to_string(), core_props()),
        ("docProps/app.xml".to_string(), app_props(slides.len())),
        ("ppt/presentation.xml".to_string(), presentation(slides.len(), style)),
        ("ppt/_rels/presentation.xml.rels".to_string(), presentation_rels(slides.len())),
        ("ppt/slideMasters/slideMaster1.xml".to_string(), slide_master(style)),
        ("ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(), master_rels()),
        ("ppt/slideLayouts/slideLayout1.xml".to_string(), slide_layout(style)),
        ("ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(), layout_rels()),
        ("ppt/theme/theme1.xml".to_string(), theme()),
    ];
    for (path, xml) in parts {
        zip.start_file(path, options)?;
        zip.write_all(xml.as_bytes())?;
    }
    for (i, (xml, rels)) in slides.iter().enumerate() {
        zip.start_file(format!("ppt/slides/slide{}.xml", i + 1), options)?;
        zip.write_all(xml.as_bytes())?;
        zip.start_file(format!("ppt/slides/_rels/slide{}.xml.rels", i + 1), options)?;
        zip.write_all(rels.as_bytes())?;
    }

    let bytes = zip.finish()?.into_inner();
    info!(slides = slides.len(), images = media.len(), bytes = bytes.len(), "deck built");
    Ok(bytes)
}

fn emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}

fn pt100(points: f64) -> i64 {
    (points * 100.0).round() as i64
}

pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn xfrm(b: BoxIn, tag: &str) -> String {
    format!(
        r#"<{tag}><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></{tag}>"#,
        emu(b.x),
        emu(b.y),
        emu(b.w),
        emu(b.h),
        tag = tag
    )
}

fn run(text: &str, size_pt: f64, bold: bool, color: Option<String>) -> String {
    let fill = color
        .map(|c| format!(r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, c))
        .unwrap_or_default();
    format!(
        r#"<a:r><a:rPr lang="en-US" sz="{}" b="{}" dirty="0">{}</a:rPr><a:t>{}</a:t></a:r>"#,
        pt100(size_pt),
        if bold { 1 } else { 0 },
        fill,
        xml_escape(text)
    )
}

const GROUP_PROPS: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

fn title_shape(title: &str, style: &DeckStyle) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr>{}</p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p>{}</a:p></p:txBody></p:sp>"#,
        xfrm(style.title_box, "a:xfrm"),
        run(title, style.title_font_pt, style.title_bold, None)
    )
}

fn slide_doc(shapes: &str) -> String {
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{GROUP_PROPS}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn table_cell(text: &str, size_pt: f64, bold: bool) -> String {
    format!(
        r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p>{}</a:p></a:txBody><a:tcPr/></a:tc>"#,
        run(text, size_pt, bold, None)
    )
}

fn callout(id: usize, b: BoxIn, text: &str, style: &DeckStyle) -> String {
    let color = Some(style.callout_text_color.hex());
    let paragraphs: String = text
        .lines()
        .map(|line| {
            format!(
                r#"<a:p><a:pPr algn="ctr"/>{}</a:p>"#,
                run(line, style.callout_font_pt, true, color.clone())
            )
        })
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Rectangle {}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val="{}"/></a:solidFill></p:spPr><p:txBody><a:bodyPr rtlCol="0" anchor="ctr"/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        id - 1,
        xfrm(b, "a:xfrm"),
        style.callout_fill.hex(),
    )
}

/// Two-column Activity/Value table plus the delayed and waiting callouts.
fn dashboard_slide(metrics: &DashboardMetrics, rule: DelayRule, style: &DeckStyle) -> String {
    let rows = metrics.rows();
    let row_h = emu(style.table_box.h / (rows.len() + 1) as f64);

    let mut tbl = String::new();
    let _ = write!(
        tbl,
        r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"><a:tableStyleId>{}</a:tableStyleId></a:tblPr><a:tblGrid><a:gridCol w="{}"/><a:gridCol w="{}"/></a:tblGrid>"#,
        TABLE_STYLE_ID,
        emu(style.table_col_widths_in[0]),
        emu(style.table_col_widths_in[1]),
    );
    let _ = write!(
        tbl,
        r#"<a:tr h="{}">{}{}</a:tr>"#,
        row_h,
        table_cell("Activity", style.table_font_pt, true),
        table_cell("Value", style.table_font_pt, true)
    );
    for row in &rows {
        let _ = write!(
            tbl,
            r#"<a:tr h="{}">{}{}</a:tr>"#,
            row_h,
            table_cell(&row.activity, style.table_font_pt, false),
            table_cell(&row.value, style.table_font_pt, false)
        );
    }
    tbl.push_str("</a:tbl>");

    let frame = format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="3" name="Table 2"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>{}<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">{}</a:graphicData></a:graphic></p:graphicFrame>"#,
        xfrm(style.table_box, "p:xfrm"),
        tbl
    );

    let threshold = format_plain(rule.threshold());
    let delayed = percent_text(metrics, MetricKind::DelayedPct);
    let waiting = percent_text(metrics, MetricKind::WaitingPct);
    let [left, right] = style.callout_boxes;
    let shapes = [
        title_shape(&style.dashboard_title, style),
        frame,
        callout(
            4,
            left,
            &format!("Delaying Approvals >\n{} Days\n{}", threshold, delayed),
            style,
        ),
        callout(5, right, &format!("POs Waiting for\nApproval\n{}", waiting), style),
    ]
    .concat();
    slide_doc(&shapes)
}

fn percent_text(metrics: &DashboardMetrics, kind: MetricKind) -> String {
    metrics
        .percent(kind)
        .map(|p| format!("{:.2}%", p))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Title plus the chart, scaled to the configured width.
fn chart_slide(img: &ChartImage, n: usize, style: &DeckStyle) -> String {
    let aspect = if img.width_px == 0 {
        0.0
    } else {
        img.height_px as f64 / img.width_px as f64
    };
    let placement = BoxIn {
        x: style.chart_left_in,
        y: style.chart_top_in,
        w: style.chart_width_in,
        h: style.chart_width_in * aspect,
    };
    let pic = format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="3" name="Picture {n}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        xfrm(placement, "a:xfrm")
    );
    slide_doc(&(title_shape(&img.title, style) + &pic))
}

fn slide_rels(image: Option<&str>) -> String {
    let mut rels = format!(
        r#"<Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#
    );
    if let Some(name) = image {
        let _ = write!(
            rels,
            r#"<Relationship Id="rId2" Type="{REL_BASE}/image" Target="../media/{name}"/>"#
        );
    }
    format!(r#"{XML_DECL}<Relationships xmlns="{NS_PKG_REL}">{rels}</Relationships>"#)
}

fn content_types(slides: usize) -> String {
    let mut overrides = String::new();
    for i in 1..=slides {
        let _ = write!(
            overrides,
            r#"<Override PartName="/ppt/slides/slide{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );
    }
    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>{overrides}</Types>"#
    )
}

fn package_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{REL_BASE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

fn core_props() -> String {
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>PO Report</dc:title><dc:creator>po_report</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified></cp:coreProperties>"#
    )
}

fn app_props(slides: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>po_report</Application><Slides>{slides}</Slides></Properties>"#
    )
}

fn presentation(slides: usize, style: &DeckStyle) -> String {
    let mut ids = String::new();
    for i in 0..slides {
        let _ = write!(ids, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, 3 + i);
    }
    let slide_list = if ids.is_empty() {
        String::new()
    } else {
        format!("<p:sldIdLst>{ids}</p:sldIdLst>")
    };
    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{slide_list}<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        emu(style.slide_width_in),
        emu(style.slide_height_in)
    )
}

fn presentation_rels(slides: usize) -> String {
    let mut rels = format!(
        r#"<Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/theme" Target="theme/theme1.xml"/>"#
    );
    for i in 0..slides {
        let _ = write!(
            rels,
            r#"<Relationship Id="rId{}" Type="{REL_BASE}/slide" Target="slides/slide{}.xml"/>"#,
            3 + i,
            1 + i
        );
    }
    format!(r#"{XML_DECL}<Relationships xmlns="{NS_PKG_REL}">{rels}</Relationships>"#)
}

fn placeholder_title(style: &DeckStyle) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr>{}</p:spPr><p:txBody><a:bodyPr anchor="ctr"/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#,
        xfrm(style.title_box, "a:xfrm")
    )
}

fn slide_master(style: &DeckStyle) -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{GROUP_PROPS}{}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle><a:lvl1pPr algn="ctr"><a:defRPr sz="{}" b="1"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mj-lt"/></a:defRPr></a:lvl1pPr></p:titleStyle><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#,
        placeholder_title(style),
        pt100(style.title_font_pt)
    )
}

fn master_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/theme" Target="../theme/theme1.xml"/></Relationships>"#
    )
}

fn slide_layout(style: &DeckStyle) -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="titleOnly" preserve="1"><p:cSld name="Title Only"><p:spTree>{GROUP_PROPS}{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        placeholder_title(style)
    )
}

fn layout_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
    )
}

fn theme() -> String {
    let colors = [
        ("dk1", "000000"),
        ("lt1", "FFFFFF"),
        ("dk2", "1F497D"),
        ("lt2", "EEECE1"),
        ("accent1", "4F81BD"),
        ("accent2", "C0504D"),
        ("accent3", "9BBB59"),
        ("accent4", "8064A2"),
        ("accent5", "4BACC6"),
        ("accent6", "F79646"),
        ("hlink", "0000FF"),
        ("folHlink", "800080"),
    ];
    let clr: String = colors
        .iter()
        .map(|(name, hex)| format!(r#"<a:{name}><a:srgbClr val="{hex}"/></a:{name}>"#))
        .collect();
    let font = |face: &str| {
        format!(r#"<a:latin typeface="{face}"/><a:ea typeface=""/><a:cs typeface=""/>"#)
    };
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = r#"<a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#;
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";
    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="Office Theme"><a:themeElements><a:clrScheme name="Office">{clr}</a:clrScheme><a:fontScheme name="Office"><a:majorFont>{}</a:majorFont><a:minorFont>{}</a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{fill}{fill}{fill}</a:fillStyleLst><a:lnStyleLst>{line}{line}{line}</a:lnStyleLst><a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst><a:bgFillStyleLst>{fill}{fill}{fill}</a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#,
        font("Calibri"),
        font("Calibri")
    )
}
