//! # Prepass Core
//!
//! Source-to-source rewriting of contract sources ahead of a backend that
//! cannot handle inherited constructors or size-erased selector collisions:
//! - Text patching with batched, disjoint edits
//! - A syntax tree and index rebuilt after every committed batch
//! - Import flattening, constructor flattening, selector disambiguation
//! - Address, storage and call-site analysis handed to the backend

#![warn(clippy::all)]

pub mod ast;
pub mod backend;
pub mod errors;
pub mod index;
pub mod parser;
pub mod passes;
pub mod pipeline;
pub mod source;

use std::path::{Path, PathBuf};

pub use backend::{Backend, BackendConfig, JsonBackend};
pub use errors::{CallIssue, CallIssueKind, PrepassError, Result};
pub use index::{AstIndex, FunctionKey, FunctionRef, ResolveError};
pub use parser::{ParseError, Parser, SolidityParser};
pub use passes::{FileResolver, FsResolver, InMemoryResolver, Pass, PassContext};
pub use pipeline::{AnalysisMetadata, Pipeline, PipelineState, PrepassOutput};
pub use source::{Edit, SourceText, TextPatcher};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for prepass components
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("prepass_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Settings for one prepass run
#[derive(Debug, Clone, Default)]
pub struct PrepassConfig {
    /// Contract whose constructor chain is flattened
    pub main_contract: String,
    /// Print the backend output after a successful run
    pub print_ir: bool,
    /// Extra directories searched for imports
    pub include_paths: Vec<PathBuf>,
    pub backend: BackendConfig,
}

/// Run the standard pipeline over a file on disk
pub fn prepass_file(path: &Path, config: &PrepassConfig) -> Result<PrepassOutput> {
    let text = std::fs::read_to_string(path)?;
    let resolver = FsResolver::new(config.include_paths.clone());
    Pipeline::standard().run(&text, path, &SolidityParser::new(), &resolver, config)
}
