use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use pdfium_render::prelude::*;
use serde::Serialize;

use labextract::types::{
    BibliographyEntry, CitationOccurrence, ExtractedLabel, LabelKind, PageFragments,
};
use labextract::{Engine, find_citations, pdf};

#[derive(Parser)]
#[command(
    name = "labextract",
    about = "Extract figure/equation labels, citations, and bibliography from PDFs"
)]
struct Cli {
    /// PDF file to process
    file: PathBuf,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Skip the inline citation scan
    #[arg(long)]
    no_citations: bool,

    /// Write PNG region captures for every label into this directory
    #[arg(long)]
    captures: Option<PathBuf>,

    /// Render scale for region captures
    #[arg(long, default_value_t = 2.0)]
    capture_scale: f32,

    /// Override pdfium library path
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_path: Option<String>,
}

#[derive(Serialize)]
struct CitationOutput {
    #[serde(flatten)]
    occurrence: CitationOccurrence,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_key: Option<String>,
}

#[derive(Serialize)]
struct DocumentOutput<'a> {
    figures: &'a BTreeMap<String, ExtractedLabel>,
    equations: &'a BTreeMap<String, ExtractedLabel>,
    bibliography: &'a BTreeMap<String, BibliographyEntry>,
    citations: Vec<CitationOutput>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let pdfium = bind_pdfium(&cli.pdfium_path)?;
    let document = pdf::load_document(&pdfium, &cli.file)?;
    let pages = pdf::extract_fragments(&document);

    let mut engine = Engine::new();
    engine.extract(&pages);

    let citations = if cli.no_citations {
        Vec::new()
    } else {
        find_citations(&pages)
    };

    if let Some(dir) = &cli.captures {
        write_captures(&mut engine, &document, &pages, dir, cli.capture_scale)?;
    }

    print_output(&engine, citations, cli.pretty)
}

fn bind_pdfium(pdfium_path: &Option<String>) -> Result<Pdfium> {
    let bindings = if let Some(path) = pdfium_path {
        Pdfium::bind_to_library(path)
            .with_context(|| format!("Failed to load pdfium from: {path}"))?
    } else {
        Pdfium::bind_to_system_library()
            .context("Failed to find pdfium. Install pdfium-binaries or use --pdfium-path")?
    };
    Ok(Pdfium::new(bindings))
}

/// Render each labeled page once per label and write the captured regions.
fn write_captures(
    engine: &mut Engine,
    document: &PdfDocument,
    pages: &[PageFragments],
    dir: &Path,
    scale: f32,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create capture directory: {}", dir.display()))?;

    let labels: Vec<(LabelKind, String, usize)> = engine
        .figures()
        .values()
        .chain(engine.equations().values())
        .map(|label| (label.kind, label.number.clone(), label.page_number))
        .collect();

    for (kind, number, page_number) in labels {
        let Some(page_height) = pages
            .iter()
            .find(|p| p.page_number == page_number)
            .map(|p| p.height)
        else {
            continue;
        };
        let raster = match pdf::render_page_raster(document, page_number, scale) {
            Ok(raster) => raster,
            Err(err) => {
                log::warn!("could not render page {page_number} for capture: {err:#}");
                continue;
            }
        };
        let Some(bytes) = engine.capture_label(kind, &number, &raster, page_height) else {
            continue;
        };
        let stem = match kind {
            LabelKind::Figure => "figure",
            LabelKind::Equation => "equation",
        };
        let path = dir.join(format!("{stem}-{number}.png"));
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write capture: {}", path.display()))?;
    }
    Ok(())
}

fn print_output(engine: &Engine, citations: Vec<CitationOccurrence>, pretty: bool) -> Result<()> {
    let citations = citations
        .into_iter()
        .map(|occurrence| {
            let resolved_key = engine
                .resolve(&occurrence.reference_key)
                .map(|entry| entry.key.clone());
            CitationOutput { occurrence, resolved_key }
        })
        .collect();
    let output = DocumentOutput {
        figures: engine.figures(),
        equations: engine.equations(),
        bibliography: engine.bibliography(),
        citations,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");
    Ok(())
}
