//! PDF Font Swap CLI tool
//!
//! A command-line tool for re-drawing the text of a PDF in another font.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use lopdf::Document;
use std::path::PathBuf;
use std::process;

use pdf_fontswap::fonts::ReplacementFont;
use pdf_fontswap::pdf::{list_page_fonts, replace_fonts, ReplaceMode, ReplaceOptions, StreamOwner};

/// PDF Font Swap - Re-draw PDF text in a different font
#[derive(Parser)]
#[command(name = "pdf-fontswap")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Re-draw every word in Times-BoldItalic
    pdf-fontswap replace input.pdf -o output.pdf

    # Re-draw whole lines of pages 1 and 3 to 5 in Courier
    pdf-fontswap replace input.pdf -o output.pdf --font cour --mode line --pages 1,3-5

    # Use a TrueType font file
    pdf-fontswap replace input.pdf -o output.pdf --font-file DejaVuSans.ttf

    # Show which fonts would be replaced
    pdf-fontswap fonts input.pdf --font Helvetica")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the fonts of a PDF
    Replace {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        /// Standard font to use, by PostScript name or short name (tibi, helv, cour, ...)
        #[arg(long, default_value = "Times-BoldItalic", conflicts_with = "font_file")]
        font: String,

        /// TrueType/OpenType font file to use instead of a standard font
        #[arg(long)]
        font_file: Option<PathBuf>,

        /// How the original text is hidden and re-drawn
        #[arg(long, value_enum, default_value_t = Mode::Word)]
        mode: Mode,

        /// Pages to process, e.g. "1,3-5" (default: all)
        #[arg(long)]
        pages: Option<String>,
    },

    /// List the fonts used on each page
    Fonts {
        /// PDF file to inspect
        input: PathBuf,

        /// Replacement font; fonts matching it are marked as kept
        #[arg(long, default_value = "Times-BoldItalic", conflicts_with = "font_file")]
        font: String,

        /// TrueType/OpenType replacement font file
        #[arg(long)]
        font_file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Remove the text and re-draw whole lines
    Line,
    /// Remove the text and re-draw word by word
    Word,
    /// Cover the text with white boxes and draw over them
    Patch,
}

impl From<Mode> for ReplaceMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Line => ReplaceMode::Line,
            Mode::Word => ReplaceMode::Word,
            Mode::Patch => ReplaceMode::Patch,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replace { input, output, font, font_file, mode, pages } => {
            cmd_replace(input, output, font, font_file, mode, pages)
        }
        Commands::Fonts { input, font, font_file } => cmd_fonts(input, font, font_file),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Parse a page selection like "1,3-5" into 1-based page numbers
fn parse_pages(selection: &str) -> anyhow::Result<Vec<u32>> {
    let mut pages = Vec::new();
    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (first, last) = match part.split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (part, part),
        };
        let first: u32 = first.parse().with_context(|| format!("Invalid page: {}", part))?;
        let last: u32 = last.parse().with_context(|| format!("Invalid page: {}", part))?;
        if first == 0 || last < first {
            bail!("Invalid page range: {}", part);
        }
        for page in first..=last {
            if !pages.contains(&page) {
                pages.push(page);
            }
        }
    }
    if pages.is_empty() {
        bail!("No pages selected: {:?}", selection);
    }
    Ok(pages)
}

fn load_font(font: &str, font_file: Option<PathBuf>) -> anyhow::Result<ReplacementFont> {
    match font_file {
        Some(path) => ReplacementFont::from_file(&path)
            .with_context(|| format!("Cannot load font file {}", path.display())),
        None => Ok(ReplacementFont::by_name(font)?),
    }
}

/// Replace the fonts of a PDF
fn cmd_replace(
    input: PathBuf,
    output: PathBuf,
    font: String,
    font_file: Option<PathBuf>,
    mode: Mode,
    pages: Option<String>,
) -> anyhow::Result<()> {
    let options = ReplaceOptions {
        font: load_font(&font, font_file)?,
        mode: mode.into(),
        pages: pages.as_deref().map(parse_pages).transpose()?,
    };

    let report = replace_fonts(&input, &output, &options)?;

    eprintln!(
        "Re-drew text on {} of {} pages ({} unchanged, {} text runs)",
        report.pages_replaced, report.page_count, report.pages_unchanged, report.runs_written
    );
    eprintln!("Output: {}", output.display());
    Ok(())
}

/// List the fonts of every page
fn cmd_fonts(input: PathBuf, font: String, font_file: Option<PathBuf>) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }
    let replacement = load_font(&font, font_file)?;
    let doc = Document::load(&input)?;

    println!("File: {}", input.display());
    for (number, page_id) in doc.get_pages() {
        println!("Page {}:", number);
        for font in list_page_fonts(&doc, page_id)? {
            let location = match font.owner {
                StreamOwner::Page => String::new(),
                StreamOwner::XObject((id, generation)) => format!(" in form {} {} R", id, generation),
            };
            let action = if replacement.matches_base_font(&font.base_font) {
                "keep"
            } else {
                "replace"
            };
            println!(
                "  /{} {} ({}){} - {}",
                font.resource, font.base_font, font.subtype, location, action
            );
        }
    }
    Ok(())
}
