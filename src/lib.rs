//! # ragmill
//!
//! A document ingestion and vector similarity search service.
//!
//! Text, Markdown, PDF, and Office documents are addressed by content hash,
//! segmented into chunks, and committed to a pluggable vector index. Search
//! runs against the index with an inclusive score threshold and backfills
//! document provenance from an in-memory registry.
//!
//! ## Pipeline
//!
//! ```text
//!   upload ──▶ extract ──▶ address ──▶ segment ──▶ registry
//!                                                     │
//!                                                     ▼
//!   search ◀── resolve ◀── index ◀──── sync ◀─────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`address`] | Content-hash document identity |
//! | [`config`] | TOML configuration loading and validation |
//! | [`extract`] | Per-format text extraction (PDF, DOCX, XLSX, plain) |
//! | [`index`] | The [`index::VectorIndex`] trait and in-memory backend |
//! | [`models`] | Shared data types |
//! | [`registry`] | Insertion-ordered document registry |
//! | [`resolve`] | Threshold filtering and provenance backfill |
//! | [`segment`] | Sentence-aware and naive chunking |
//! | [`server`] | Axum JSON API |
//! | [`service`] | Composition root tying the pipeline together |
//! | [`sync`] | Registry/index synchronization state machine |

pub mod address;
pub mod config;
pub mod extract;
pub mod index;
pub mod models;
pub mod registry;
pub mod resolve;
pub mod segment;
pub mod server;
pub mod service;
pub mod sync;
