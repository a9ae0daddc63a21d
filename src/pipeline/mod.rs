//! Pipeline stages for question extraction.
//!
//! Each submodule implements exactly one transformation step and is
//! testable on its own; only [`extract`] knows about PDF internals.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ lines ──▶ table ──▶ segment ──▶ build ──▶ normalize
//! (bytes)   (lopdf)    (Y-bands)  (| a |)    (FSM)        ▲
//!                                                         │
//!           extract ──▶ lines ──────────────▶ answer_key ─┘
//!           (answer-key document, optional)
//! ```
//!
//! 1. [`input`]      — read a file path, reject non-PDF bytes early
//! 2. [`extract`]    — positioned text fragments per page; runs in
//!    `spawn_blocking`, one task per page
//! 3. [`lines`]      — fragments → reading-order lines, optionally per column
//! 4. [`table`]      — column-aligned runs of question lines → Markdown rows
//! 5. [`segment`]    — lines → question blocks via a four-state machine
//! 6. [`answer_key`] — key document lines → number → letter, then a pure
//!    lookup merge by question number
//! 7. [`build`]      — blocks → validated `Question` records
//! 8. [`normalize`]  — text cleanup for the Markdown + math renderer

pub mod answer_key;
pub mod build;
pub mod extract;
pub mod input;
pub mod lines;
pub mod normalize;
pub mod segment;
pub mod table;
