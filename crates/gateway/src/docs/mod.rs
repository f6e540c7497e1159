//! Documentation question answering.
//!
//! The public API documentation page is split into its `<section id=...>`
//! blocks, each block is embedded, and questions are answered by a chat
//! model from the closest sections:
//!
//! 1. **Sections** - [`parse_sections`] turns the HTML page into titled text
//! 2. **Index** - [`DocIndex`] searches section embeddings, from `PostgreSQL`
//!    ([`PgDocIndex`]) or a JSON snapshot ([`DocSnapshotIndex`])
//! 3. **Answer** - [`DocTool`] embeds the question, takes the top sections
//!    and asks the model for a Markdown answer
//!
//! The index is built offline by [`builder`].

pub mod builder;
mod error;
mod index;
mod sections;
mod tool;

pub use error::DocsError;
pub use index::{DocHit, DocIndex, DocRecord, DocSnapshot, DocSnapshotIndex, PgDocIndex};
pub use sections::{DEFAULT_DOCS_URL, DocSection, fetch_docs, parse_sections};
pub use tool::{DOC_TOP_K, DocTool};
