// ABOUTME: Public library API for Granola note and transcript export
// ABOUTME: Re-exports core modules for external use

pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod filename;
pub mod format;
pub mod fs;
pub mod logging;
pub mod model;
pub mod prosemirror;
pub mod sync;

pub use error::{Error, Result};
pub use model::{Document, DocumentTree, Frontmatter, TreeNode};
