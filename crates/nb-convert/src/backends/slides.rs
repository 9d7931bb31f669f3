//! Slide text: extraction from `.pptx` archives and slide-deck generation
//! from plain text.
//!
//! Extraction reads `ppt/slides/slideN.xml` directly. Each `<p:sp>` shape
//! contributes one text block, paragraphs joined with newlines. Generation
//! emits a flat OpenDocument presentation that LibreOffice turns into pptx.

use std::io::Read;
use std::path::Path;

use nb_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static SLIDE_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").expect("valid regex"));
static SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p:sp\b.*?</p:sp>").expect("valid regex"));
static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:p(?:\s[^>]*)?>(.*?)</a:p>").expect("valid regex"));
static RUN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:t(?:\s[^>]*)?>(.*?)</a:t>").expect("valid regex"));

/// Title used for generated JSON documents.
const JSON_TITLE: &str = "Extracted Presentation";
const TITLE_MAX_CHARS: usize = 50;

/// Text blocks of one slide, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub number: usize,
    pub texts: Vec<String>,
}

/// Read every slide of a pptx archive, ordered by slide number.
pub fn read_pptx(path: &Path) -> Result<Vec<Slide>> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::conversion("presentation", format!("not a pptx archive: {e}")))?;

    let mut entries: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| {
            let caps = SLIDE_ENTRY.captures(name)?;
            let n = caps[1].parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    entries.sort_unstable_by_key(|(n, _)| *n);

    let mut slides = Vec::with_capacity(entries.len());
    for (i, (_, name)) in entries.into_iter().enumerate() {
        let mut xml = String::new();
        archive
            .by_name(&name)
            .map_err(|e| Error::conversion("presentation", format!("{name}: {e}")))?
            .read_to_string(&mut xml)?;
        slides.push(Slide {
            number: i + 1,
            texts: shape_texts(&xml),
        });
    }
    Ok(slides)
}

fn shape_texts(xml: &str) -> Vec<String> {
    SHAPE
        .find_iter(xml)
        .map(|shape| {
            PARAGRAPH
                .captures_iter(shape.as_str())
                .map(|p| {
                    RUN_TEXT
                        .captures_iter(&p[1])
                        .map(|t| xml_unescape(&t[1]))
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// `=== SLIDE n ===` headers followed by each shape's text.
pub fn render_text(slides: &[Slide]) -> String {
    slides
        .iter()
        .map(|slide| {
            let mut block = format!("=== SLIDE {} ===\n", slide.number);
            for text in &slide.texts {
                block.push_str(text);
                block.push('\n');
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct JsonDeck<'a> {
    title: &'static str,
    slides: Vec<JsonSlide<'a>>,
}

#[derive(Serialize)]
struct JsonSlide<'a> {
    slide_number: usize,
    content: Vec<JsonBlock<'a>>,
}

#[derive(Serialize)]
struct JsonBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

pub fn render_json(slides: &[Slide]) -> serde_json::Result<String> {
    let deck = JsonDeck {
        title: JSON_TITLE,
        slides: slides
            .iter()
            .map(|s| JsonSlide {
                slide_number: s.number,
                content: s
                    .texts
                    .iter()
                    .map(|t| JsonBlock {
                        kind: "text",
                        content: t,
                    })
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&deck)
}

/// A slide built from text: first line is the title, the rest is the body.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideDraft {
    pub title: String,
    pub body: Vec<String>,
}

/// Split text into slides. `=== SLIDE n ===` markers take precedence;
/// otherwise blank lines separate slides.
pub fn split_text(content: &str) -> Vec<SlideDraft> {
    let content = content.replace("\r\n", "\n");
    let chunks: Vec<&str> = if content.contains("=== SLIDE") {
        content
            .split("=== SLIDE")
            .skip(1)
            .map(|chunk| chunk.split_once('\n').map(|(_, rest)| rest).unwrap_or(""))
            .collect()
    } else {
        content.split("\n\n").collect()
    };

    chunks
        .into_iter()
        .filter_map(|chunk| {
            let mut lines = chunk.trim().lines();
            let title = lines.next()?.trim();
            let title = if title.chars().count() > TITLE_MAX_CHARS {
                let cut: String = title.chars().take(TITLE_MAX_CHARS).collect();
                format!("{cut}...")
            } else {
                title.to_string()
            };
            Some(SlideDraft {
                title,
                body: lines.map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Flat ODF presentation (`.fodp`) with one title and outline frame per
/// slide.
pub fn render_fodp(drafts: &[SlideDraft]) -> String {
    let mut pages = String::new();
    for (i, draft) in drafts.iter().enumerate() {
        pages.push_str(&format!(
            "   <draw:page draw:name=\"Slide{}\" draw:master-page-name=\"Default\">\n",
            i + 1
        ));
        pages.push_str(
            "    <draw:frame presentation:class=\"title\" svg:x=\"1.5cm\" svg:y=\"1cm\" \
             svg:width=\"25cm\" svg:height=\"3cm\"><draw:text-box>",
        );
        pages.push_str(&format!("<text:p>{}</text:p>", xml_escape(&draft.title)));
        pages.push_str("</draw:text-box></draw:frame>\n");
        if !draft.body.is_empty() {
            pages.push_str(
                "    <draw:frame presentation:class=\"outline\" svg:x=\"1.5cm\" svg:y=\"4.5cm\" \
                 svg:width=\"25cm\" svg:height=\"13cm\"><draw:text-box>",
            );
            for line in &draft.body {
                pages.push_str(&format!("<text:p>{}</text:p>", xml_escape(line)));
            }
            pages.push_str("</draw:text-box></draw:frame>\n");
        }
        pages.push_str("   </draw:page>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0"
 xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0"
 xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"
 xmlns:draw="urn:oasis:names:tc:opendocument:xmlns:drawing:1.0"
 xmlns:presentation="urn:oasis:names:tc:opendocument:xmlns:presentation:1.0"
 xmlns:svg="urn:oasis:names:tc:opendocument:xmlns:svg-compatible:1.0"
 office:version="1.2" office:mimetype="application/vnd.oasis.opendocument.presentation">
 <office:master-styles>
  <style:master-page style:name="Default"/>
 </office:master-styles>
 <office:body>
  <office:presentation>
{pages}  </office:presentation>
 </office:body>
</office:document>
"#
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xml_unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SLIDE_XML: &str = r#"<p:sld><p:cSld><p:spTree>
<p:sp><p:nvSpPr/><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="en"/><a:t>Quarterly </a:t></a:r><a:r><a:t>Report</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:txBody><a:p><a:pPr lvl="1"/><a:r><a:t>Revenue &amp; costs</a:t></a:r></a:p><a:p><a:r><a:t>Q&#x33; &lt;draft&gt;</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:txBody><a:p><a:r><a:t>   </a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#;

    fn write_pptx(path: &Path, slides: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", opts).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        for (name, xml) in slides {
            zip.start_file(*name, opts).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_shape_text() {
        assert_eq!(
            shape_texts(SLIDE_XML),
            vec!["Quarterly Report", "Revenue & costs\nQ3 <draft>"]
        );
    }

    #[test]
    fn slides_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        let one = "<p:sp><a:p><a:r><a:t>one</a:t></a:r></a:p></p:sp>";
        let ten = "<p:sp><a:p><a:r><a:t>ten</a:t></a:r></a:p></p:sp>";
        let two = "<p:sp><a:p><a:r><a:t>two</a:t></a:r></a:p></p:sp>";
        write_pptx(
            &path,
            &[
                ("ppt/slides/slide10.xml", ten),
                ("ppt/slides/slide1.xml", one),
                ("ppt/slides/slide2.xml", two),
                ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
            ],
        );

        let slides = read_pptx(&path).unwrap();
        let texts: Vec<_> = slides.iter().map(|s| s.texts[0].as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "ten"]);
        assert_eq!(slides[2].number, 3);
    }

    #[test]
    fn non_zip_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(
            read_pptx(&path),
            Err(Error::ConversionFailed { .. })
        ));
    }

    #[test]
    fn text_and_json_rendering() {
        let slides = vec![
            Slide { number: 1, texts: vec!["Title".into(), "Body".into()] },
            Slide { number: 2, texts: vec![] },
        ];
        assert_eq!(
            render_text(&slides),
            "=== SLIDE 1 ===\nTitle\nBody\n\n=== SLIDE 2 ===\n"
        );

        let json: serde_json::Value = serde_json::from_str(&render_json(&slides).unwrap()).unwrap();
        assert_eq!(json["title"], "Extracted Presentation");
        assert_eq!(json["slides"][0]["slide_number"], 1);
        assert_eq!(json["slides"][0]["content"][1]["type"], "text");
        assert_eq!(json["slides"][0]["content"][1]["content"], "Body");
        assert_eq!(json["slides"][1]["content"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn split_on_blank_lines() {
        let drafts = split_text("Intro\nwelcome all\n\nAgenda\n- one\n- two\n\n\n");
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].title, "Intro");
        assert_eq!(drafts[1].body, vec!["- one", "- two"]);
    }

    #[test]
    fn split_on_slide_markers() {
        let text = "=== SLIDE 1 ===\nHello\nworld\n\n=== SLIDE 2 ===\nSecond\n";
        let drafts = split_text(text);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].title, "Hello");
        assert_eq!(drafts[0].body, vec!["world"]);
        assert_eq!(drafts[1].title, "Second");
    }

    #[test]
    fn long_titles_truncated() {
        let drafts = split_text(&"x".repeat(80));
        assert_eq!(drafts[0].title, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn fodp_escapes_text() {
        let doc = render_fodp(&[SlideDraft { title: "A & B".into(), body: vec!["<1>".into()] }]);
        assert!(doc.contains("<text:p>A &amp; B</text:p>"));
        assert!(doc.contains("<text:p>&lt;1&gt;</text:p>"));
        assert!(doc.contains("draw:name=\"Slide1\""));
    }

    #[test]
    fn unescape_leaves_stray_ampersands() {
        assert_eq!(xml_unescape("a & b &#65;"), "a & b A");
    }
}
