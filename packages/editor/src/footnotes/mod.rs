//! # Footnotes
//!
//! Footnote numbering is recomputed for every revision. A footnote's display
//! index is the order in which visible inline footnotes first reference it,
//! counted separately for the document and for each table element:
//!
//! ```text
//! body:      ...text[2]... more[1,3]...        B → 1, A → 2, C → 3
//!                    │          │ │
//! footnotes: B ◄─────┼──────────┘ │
//!            A ◄─────┘            │
//!            C ◄──────────────────┘
//! ```
//!
//! Footnotes that no visible marker references are reported as unused.

mod commands;
mod state;

pub use commands::{
    delete_footnote, focus_footnote_marker, insert_inline_footnote, insert_table_footnote,
    FootnoteKind,
};
pub use state::{
    FootnoteEntry, FootnoteScope, FootnotesElementState, FootnotesState, InlineFootnoteEntry,
};
