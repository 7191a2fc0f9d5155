//! Word (OOXML) template rendering.
//!
//! The template is a `.docx` package. Placeholders are substituted in the
//! main document part and in header/footer parts. Word often splits typed
//! text over several runs, so a paragraph whose token only exists across run
//! boundaries is collapsed into its first run before substitution.
//!
//! Image bindings replace the whole run holding their token with an inline
//! drawing `IMAGE_WIDTH_INCHES` wide; the PNG is added under `word/media/`
//! together with its relationship and content type.
use super::placeholder::{fill, token, token_regex, Bindings, ImageBinding};
use super::{DocumentRenderer, TemplateOutline};
use crate::error::{FormError, Result};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::OnceLock;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const IMAGE_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const EMU_PER_INCH: f64 = 914_400.0;

/// Rendered width of image placeholders.
pub const IMAGE_WIDTH_INCHES: f64 = 6.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct DocxRenderer;

impl DocumentRenderer for DocxRenderer {
    fn render(&self, template: &[u8], bindings: &Bindings) -> Result<Vec<u8>> {
        let mut package = Package::read(template)?;
        if package.get(DOCUMENT_PART).is_none() {
            return Err(FormError::Render(format!(
                "template is missing {DOCUMENT_PART}"
            )));
        }

        let mut media = MediaRegistry::default();
        let parts: Vec<String> = package
            .entries
            .iter()
            .filter(|entry| is_text_part(&entry.name))
            .map(|entry| entry.name.clone())
            .collect();
        for part in parts {
            let mut xml = package.text(&part)?;
            xml = merge_split_tokens(&xml);
            if part == DOCUMENT_PART {
                xml = embed_images(xml, &bindings.images, &mut media)?;
            }
            let filled = fill(&xml, bindings, escape_value);
            tracing::debug!(
                part = %part,
                replaced = filled.replaced,
                unmatched = filled.unmatched.len(),
                "filled template part"
            );
            if !filled.unmatched.is_empty() {
                tracing::info!(
                    part = %part,
                    tokens = ?filled.unmatched,
                    "placeholders left unbound"
                );
            }
            package.set(&part, filled.text.into_bytes());
        }

        if !media.is_empty() {
            media.install(&mut package)?;
        }
        package.write()
    }
}

/// Minimal `.docx` used when no template file is configured: a heading, one
/// `Row N` paragraph per row, then the summary.
pub fn default_template(outline: &TemplateOutline) -> Result<Vec<u8>> {
    let mut body = String::new();
    body.push_str(
        r#"<w:p><w:r><w:rPr><w:b/><w:sz w:val="32"/></w:rPr><w:t>Generated Content</w:t></w:r></w:p>"#,
    );
    if outline.company {
        body.push_str(&text_paragraph("{{Company_Name}}"));
    }
    for row in 1..=outline.rows {
        body.push_str(&text_paragraph(&format!("Row {row}: {{{{row_{row}}}}}")));
    }
    if outline.chart {
        body.push_str(&text_paragraph("{{Spider_Chart}}"));
    }
    body.push_str(&text_paragraph("{{Executive_Summary}}"));

    let document = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#
        ),
        body
    );
    let content_types = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#,
        r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        r#"</Types>"#
    );
    let package_rels = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
        r#"</Relationships>"#
    );

    let package = Package {
        entries: vec![
            Entry::file(CONTENT_TYPES_PART, content_types),
            Entry::file("_rels/.rels", package_rels),
            Entry::file(DOCUMENT_PART, document),
            Entry::file(DOCUMENT_RELS_PART, empty_relationships()),
        ],
    };
    package.write()
}

fn text_paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

fn empty_relationships() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
    )
    .to_string()
}

fn is_text_part(name: &str) -> bool {
    name == DOCUMENT_PART
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

impl Entry {
    fn file(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
            is_dir: false,
        }
    }
}

/// The zip members of a package, in their original order.
struct Package {
    entries: Vec<Entry>,
}

impl Package {
    fn read(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| FormError::Render(format!("template is not a .docx package: {err}")))?;
        let mut entries = Vec::with_capacity(archive.len());
        for position in 0..archive.len() {
            let mut file = archive.by_index(position).map_err(FormError::render)?;
            let mut data = Vec::new();
            file.read_to_end(&mut data).map_err(FormError::render)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    fn text(&self, name: &str) -> Result<String> {
        let entry = self
            .get(name)
            .ok_or_else(|| FormError::Render(format!("template is missing {name}")))?;
        String::from_utf8(entry.data.clone())
            .map_err(|err| FormError::Render(format!("{name} is not UTF-8: {err}")))
    }

    fn set(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry::file(name, data)),
        }
    }

    fn write(&self) -> Result<Vec<u8>> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            if entry.is_dir {
                writer
                    .add_directory(entry.name.as_str(), options)
                    .map_err(FormError::render)?;
                continue;
            }
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(FormError::render)?;
            writer.write_all(&entry.data).map_err(FormError::render)?;
        }
        let cursor = writer.finish().map_err(FormError::render)?;
        Ok(cursor.into_inner())
    }
}

fn paragraph_regex() -> &'static Regex {
    static PARAGRAPH: OnceLock<Regex> = OnceLock::new();
    PARAGRAPH.get_or_init(|| {
        Regex::new(r"(?s)<w:p(?:\s[^>]*)?>.*?</w:p>").expect("paragraph regex")
    })
}

fn text_regex() -> &'static Regex {
    static TEXT: OnceLock<Regex> = OnceLock::new();
    TEXT.get_or_init(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("text regex"))
}

/// Collapse paragraphs whose tokens straddle run boundaries, and mark every
/// text element holding a token as whitespace-preserving.
fn merge_split_tokens(xml: &str) -> String {
    paragraph_regex()
        .replace_all(xml, |caps: &Captures| merge_paragraph(&caps[0]))
        .into_owned()
}

fn merge_paragraph(paragraph: &str) -> String {
    let texts: Vec<String> = text_regex()
        .captures_iter(paragraph)
        .map(|caps| caps[1].to_string())
        .collect();
    let joined = texts.concat();
    let whole = token_regex().find_iter(&joined).count();
    if whole == 0 {
        return paragraph.to_string();
    }
    let per_run: usize = texts
        .iter()
        .map(|text| token_regex().find_iter(text).count())
        .sum();

    if per_run == whole {
        return text_regex()
            .replace_all(paragraph, |caps: &Captures| {
                if token_regex().is_match(&caps[1]) {
                    preserved_text(&caps[1])
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
    }

    let mut first = true;
    text_regex()
        .replace_all(paragraph, |_: &Captures| {
            if first {
                first = false;
                preserved_text(&joined)
            } else {
                preserved_text("")
            }
        })
        .into_owned()
}

fn preserved_text(inner: &str) -> String {
    format!(r#"<w:t xml:space="preserve">{inner}</w:t>"#)
}

/// XML-escape a bound value; line breaks and tabs become run-level elements.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let normalized = value.replace("\r\n", "\n");
    for ch in normalized.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str(r#"</w:t><w:br/><w:t xml:space="preserve">"#),
            '\t' => escaped.push_str(r#"</w:t><w:tab/><w:t xml:space="preserve">"#),
            _ => escaped.push(ch),
        }
    }
    escaped
}

struct MediaItem {
    relationship_id: String,
    part_name: String,
    png: Vec<u8>,
}

/// Images embedded during one render, keyed by placeholder name.
#[derive(Default)]
struct MediaRegistry {
    items: BTreeMap<String, MediaItem>,
    next_drawing_id: u32,
}

impl MediaRegistry {
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn relationship_for(&mut self, name: &str, image: &ImageBinding) -> String {
        let next = self.items.len() + 1;
        self.items
            .entry(name.to_string())
            .or_insert_with(|| MediaItem {
                relationship_id: format!("rIdFormdocImage{next}"),
                part_name: format!("media/formdoc_image{next}.png"),
                png: image.png.clone(),
            })
            .relationship_id
            .clone()
    }

    fn drawing_id(&mut self) -> u32 {
        self.next_drawing_id += 1;
        4000 + self.next_drawing_id
    }

    fn install(self, package: &mut Package) -> Result<()> {
        let mut rels = match package.get(DOCUMENT_RELS_PART) {
            Some(_) => package.text(DOCUMENT_RELS_PART)?,
            None => empty_relationships(),
        };
        let mut content_types = package.text(CONTENT_TYPES_PART)?;

        let mut additions = String::new();
        for item in self.items.values() {
            additions.push_str(&format!(
                r#"<Relationship Id="{}" Type="{IMAGE_RELATIONSHIP}" Target="{}"/>"#,
                item.relationship_id, item.part_name
            ));
        }
        insert_before_close(&mut rels, "</Relationships>", &additions)?;

        if !content_types.to_ascii_lowercase().contains(r#"extension="png""#) {
            insert_before_close(
                &mut content_types,
                "</Types>",
                r#"<Default Extension="png" ContentType="image/png"/>"#,
            )?;
        }

        package.set(DOCUMENT_RELS_PART, rels.into_bytes());
        package.set(CONTENT_TYPES_PART, content_types.into_bytes());
        for item in self.items.into_values() {
            package.set(&format!("word/{}", item.part_name), item.png);
        }
        Ok(())
    }
}

fn insert_before_close(xml: &mut String, close: &str, addition: &str) -> Result<()> {
    let position = xml
        .rfind(close)
        .ok_or_else(|| FormError::Render(format!("malformed package part: no {close}")))?;
    xml.insert_str(position, addition);
    Ok(())
}

/// Replace each run holding an image token with an inline drawing.
fn embed_images(
    mut xml: String,
    images: &BTreeMap<String, ImageBinding>,
    media: &mut MediaRegistry,
) -> Result<String> {
    for (name, image) in images {
        let marker = token(name);
        while let Some(position) = xml.find(&marker) {
            let head = &xml[..position];
            let run_start = head.rfind("<w:r>").max(head.rfind("<w:r "));
            let run_end = xml[position..]
                .find("</w:r>")
                .map(|offset| position + offset + "</w:r>".len());
            let (Some(start), Some(end)) = (run_start, run_end) else {
                return Err(FormError::Render(format!(
                    "image placeholder {marker} is not inside a text run"
                )));
            };
            let relationship_id = media.relationship_for(name, image);
            let drawing = drawing_run(&relationship_id, media.drawing_id(), image);
            xml.replace_range(start..end, &drawing);
        }
    }
    Ok(xml)
}

fn drawing_run(relationship_id: &str, drawing_id: u32, image: &ImageBinding) -> String {
    let cx = (IMAGE_WIDTH_INCHES * EMU_PER_INCH).round() as u64;
    let cy = if image.width_px == 0 {
        cx
    } else {
        (cx as f64 * f64::from(image.height_px) / f64::from(image.width_px)).round() as u64
    };
    format!(
        concat!(
            r#"<w:r><w:drawing>"#,
            r#"<wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {id}"/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="image{id}.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:embed="{rid}"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
        ),
        cx = cx,
        cy = cy,
        id = drawing_id,
        rid = relationship_id
    )
}

#[cfg(test)]
#[path = "docx_tests.rs"]
mod tests;
