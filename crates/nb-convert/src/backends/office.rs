//! Document, spreadsheet and presentation conversion.
//!
//! Format changes between office file types go through headless
//! LibreOffice. Text extraction from pptx and the CSV to JSON/HTML
//! renderings are done natively.

use std::path::{Path, PathBuf};

use nb_core::{Error, Result};

use super::{slides, table::Table};
use crate::command::ToolCommand;
use crate::converter::ConversionRequest;
use crate::tools::ToolRegistry;

const DOCX_FILTER: &str = "docx:MS Word 2007 XML";
const TXT_FILTER: &str = "txt:Text (encoded):UTF8";
const CSV_FILTER: &str = "csv:Text - txt - csv (StarCalc):44,34,76";
const XLSX_FILTER: &str = "xlsx:Calc MS Excel 2007 XML";
const XLS_FILTER: &str = "xls:MS Excel 97";
const PPTX_FILTER: &str = "pptx:Impress MS PowerPoint 2007 XML";
const PDF_IMPORT: &str = "writer_pdf_import";

/// A single headless LibreOffice conversion.
///
/// Each run gets a private profile directory: concurrent soffice processes
/// sharing a profile block on its lock file.
struct OfficeRun<'a> {
    soffice: &'a Path,
    input: &'a Path,
    convert_to: &'a str,
    infilter: Option<&'a str>,
}

impl OfficeRun<'_> {
    /// Convert and move the result to `dest`.
    async fn write_to(&self, dest: &Path) -> Result<()> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let work = tempfile::Builder::new()
            .prefix(".soffice-")
            .tempdir_in(parent)?;
        let work_path = std::fs::canonicalize(work.path())?;
        let outdir = work_path.join("out");
        let profile = work_path.join("profile");

        let mut cmd = ToolCommand::new(self.soffice.to_path_buf());
        cmd.args(["--headless", "--norestore", "--nologo", "--nolockcheck"])
            .arg(format!("-env:UserInstallation=file://{}", profile.display()));
        if let Some(filter) = self.infilter {
            cmd.arg(format!("--infilter={filter}"));
        }
        cmd.arg("--convert-to")
            .arg(self.convert_to)
            .arg("--outdir")
            .arg(outdir.to_string_lossy())
            .arg(self.input.to_string_lossy());
        cmd.execute().await?;

        let produced = produced_path(&outdir, self.input, self.convert_to);
        if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            return Err(Error::conversion(
                "soffice",
                format!("no output written for {}", self.input.display()),
            ));
        }
        tokio::fs::rename(&produced, dest).await?;
        Ok(())
    }
}

/// soffice names its output `{input stem}.{extension of the filter spec}`.
fn produced_path(outdir: &Path, input: &Path, convert_to: &str) -> PathBuf {
    let ext = convert_to.split(':').next().unwrap_or(convert_to);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    outdir.join(format!("{stem}.{ext}"))
}

fn office_run<'a>(
    tools: &'a ToolRegistry,
    input: &'a Path,
    convert_to: &'a str,
) -> Result<OfficeRun<'a>> {
    Ok(OfficeRun {
        soffice: tools.require("soffice")?,
        input,
        convert_to,
        infilter: None,
    })
}

/// Scratch directory beside the output, removed on drop.
fn scratch_dir(request: &ConversionRequest) -> Result<tempfile::TempDir> {
    let parent = request.output.parent().unwrap_or_else(|| Path::new("."));
    Ok(tempfile::Builder::new().prefix(".scratch-").tempdir_in(parent)?)
}

pub async fn convert_document(tools: &ToolRegistry, request: &ConversionRequest) -> Result<()> {
    let mut run = match request.target_format.as_str() {
        "docx" => office_run(tools, &request.input, DOCX_FILTER)?,
        "txt" => office_run(tools, &request.input, TXT_FILTER)?,
        other => return Err(Error::unsupported(&request.source_extension, other)),
    };
    if request.source_extension == "pdf" {
        run.infilter = Some(PDF_IMPORT);
    }
    run.write_to(&request.output).await
}

pub async fn convert_spreadsheet(tools: &ToolRegistry, request: &ConversionRequest) -> Result<()> {
    let source = request.source_extension.as_str();
    let target = request.target_format.as_str();

    if source == target {
        tokio::fs::copy(&request.input, &request.output).await?;
        return Ok(());
    }

    match target {
        "json" | "html" => {
            let table = Table::from_csv(&read_as_csv(tools, request).await?);
            let rendered = if target == "json" {
                table
                    .to_records_json()
                    .map_err(|e| Error::conversion("spreadsheet", e))?
            } else {
                table.to_html()
            };
            tokio::fs::write(&request.output, rendered).await?;
            Ok(())
        }
        "csv" => office_run(tools, &request.input, CSV_FILTER)?.write_to(&request.output).await,
        "xlsx" => office_run(tools, &request.input, XLSX_FILTER)?.write_to(&request.output).await,
        "xls" => office_run(tools, &request.input, XLS_FILTER)?.write_to(&request.output).await,
        other => Err(Error::unsupported(source, other)),
    }
}

/// CSV text of the first sheet.
async fn read_as_csv(tools: &ToolRegistry, request: &ConversionRequest) -> Result<String> {
    if request.source_extension == "csv" {
        return read_text(&request.input).await;
    }
    let scratch = scratch_dir(request)?;
    let csv = scratch.path().join("sheet.csv");
    office_run(tools, &request.input, CSV_FILTER)?.write_to(&csv).await?;
    read_text(&csv).await
}

async fn read_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub async fn convert_presentation(tools: &ToolRegistry, request: &ConversionRequest) -> Result<()> {
    let source = request.source_extension.as_str();
    let target = request.target_format.as_str();

    match (source, target) {
        ("pptx", "txt" | "json") => {
            let input = request.input.clone();
            let deck = tokio::task::spawn_blocking(move || slides::read_pptx(&input))
                .await
                .map_err(|e| Error::Internal(format!("pptx task panicked: {e}")))??;
            let rendered = if target == "txt" {
                slides::render_text(&deck)
            } else {
                slides::render_json(&deck).map_err(|e| Error::conversion("presentation", e))?
            };
            tokio::fs::write(&request.output, rendered).await?;
            Ok(())
        }
        ("txt" | "docx", "pptx") => {
            let scratch = scratch_dir(request)?;
            let text = if source == "docx" {
                let txt = scratch.path().join("source.txt");
                office_run(tools, &request.input, TXT_FILTER)?.write_to(&txt).await?;
                read_text(&txt).await?
            } else {
                read_text(&request.input).await?
            };

            let drafts = slides::split_text(&text);
            if drafts.is_empty() {
                return Err(Error::conversion("presentation", "input contains no text"));
            }
            let deck = scratch.path().join("deck.fodp");
            tokio::fs::write(&deck, slides::render_fodp(&drafts)).await?;
            office_run(tools, &deck, PPTX_FILTER)?.write_to(&request.output).await
        }
        _ => Err(Error::unsupported(source, target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dir: &Path, input: &str, target: &str) -> ConversionRequest {
        let source = input.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        ConversionRequest {
            input: dir.join(input),
            output: dir.join(format!("out.{target}")),
            source_extension: source.into(),
            target_format: target.into(),
        }
    }

    #[test]
    fn soffice_output_name() {
        let p = produced_path(Path::new("/w/out"), Path::new("/in/abc_report.docx"), TXT_FILTER);
        assert_eq!(p, PathBuf::from("/w/out/abc_report.txt"));
    }

    #[tokio::test]
    async fn csv_to_json_is_native() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.csv"), "city,pop\nOslo,709000\n").unwrap();
        let req = request(dir.path(), "in.csv", "json");

        convert_spreadsheet(&ToolRegistry::empty(), &req).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&req.output).unwrap()).unwrap();
        assert_eq!(json[0]["city"], "Oslo");
        assert_eq!(json[0]["pop"], 709000);
    }

    #[tokio::test]
    async fn csv_to_html_is_native() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.csv"), "a\n1\n").unwrap();
        let req = request(dir.path(), "in.csv", "html");

        convert_spreadsheet(&ToolRegistry::empty(), &req).await.unwrap();
        let html = std::fs::read_to_string(&req.output).unwrap();
        assert!(html.contains("<td>1</td>"));
    }

    #[tokio::test]
    async fn same_format_copies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.csv"), "a,b\n").unwrap();
        let req = request(dir.path(), "in.csv", "csv");

        convert_spreadsheet(&ToolRegistry::empty(), &req).await.unwrap();
        assert_eq!(std::fs::read_to_string(&req.output).unwrap(), "a,b\n");
    }

    #[tokio::test]
    async fn office_formats_need_soffice() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.csv"), "a\n1\n").unwrap();
        let req = request(dir.path(), "in.csv", "xlsx");

        let err = convert_spreadsheet(&ToolRegistry::empty(), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_text_makes_no_deck() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.txt"), "\n\n").unwrap();
        let req = request(dir.path(), "in.txt", "pptx");

        let err = convert_presentation(&ToolRegistry::empty(), &req)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no text"));
        assert!(!req.output.exists());
    }

    #[tokio::test]
    async fn document_rejects_unknown_target() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), "in.txt", "odt");
        let err = convert_document(&ToolRegistry::empty(), &req).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }
}
