//! PDF manipulation module

pub mod cmap;
pub mod color_space;
pub mod content_filter;
pub mod doc_font;
pub mod extract;
pub mod fontrefs;
pub mod replace;
pub mod rescale;
pub mod resources;
pub mod segment;
pub mod writer;

// Re-export commonly used items
pub use content_filter::{cont_clean, SelectorRule};
pub use extract::{extract_text, TextLine, TextSpan};
pub use fontrefs::{get_page_fontrefs, list_page_fonts, FontRefs, PageFont, StreamOwner};
pub use replace::{
    replace_fonts, replace_page_fonts, replace_pages, PageOutcome, ReplaceMode, ReplaceOptions,
    ReplaceReport,
};
pub use segment::{Granularity, Segment};
pub use writer::TextWriter;
