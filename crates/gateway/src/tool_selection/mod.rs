//! Candidate retrieval, plan gating and LLM operation selection.
//!
//! With ~190 market-data operations available, the model is never shown the
//! whole catalogue. Selection narrows it in stages:
//!
//! 1. **Retrieval** - embed the query and take the top-K nearest operations
//!    from the semantic index, always adding the fallback operation
//! 2. **Plan gate** - split candidates into those the caller's subscription
//!    covers and those that need a higher plan
//! 3. **Selection** - offer the allowed candidates as functions and force the
//!    model to call exactly one
//!
//! The index is built offline by [`seeder`].

mod embeddings;
mod error;
mod index;
mod plan_gate;
mod retrieval;
pub mod seeder;
mod selector;

pub use embeddings::{Embedder, EmbeddingClient};
pub use error::ToolSelectionError;
pub use index::{
    EmbeddingRecord, IndexReport, PgVectorIndex, SearchHit, SemanticIndex, Snapshot,
    SnapshotIndex, verify_index,
};
pub(crate) use index::{cosine, norm};
pub use plan_gate::{GateOutcome, PlanGate};
pub use retrieval::Retriever;
pub use seeder::{IndexDocument, IndexHints, SeedOptions, SeedResult};
pub use selector::{Selection, ToolSelector};
