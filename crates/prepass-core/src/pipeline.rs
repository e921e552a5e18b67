/*!
# Pipeline Driver

Runs the fixed pass sequence over one `PipelineState`. Passes stage edits;
after every step marked as a barrier the driver commits the batch and, if
the text changed, reparses it and rebuilds the AST index. A reparse failure
means a pass produced invalid text and aborts the run.

```text
comments -> imports -> [reparse] -> address_types -> constructor -> [reparse]
  -> selectors -> function_calls -> [reparse] -> storage
```
*/

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{CallIssue, PrepassError, Result};
use crate::index::AstIndex;
use crate::parser::Parser;
use crate::passes::{
    AddressTypeAnalyzer, AddressUsage, CommentStripper, ConstructorFlattener, ConstructorReport,
    FileResolver, FunctionCallRewriter, ImportResolver, MarkedFunctions, Pass, PassContext,
    SelectorResolver, StorageAccessMap, StorageClassifier,
};
use crate::source::{SourceText, TextPatcher};
use crate::PrepassConfig;

/// Everything the analysis passes hand to the backend
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisMetadata {
    pub main_contract: String,
    pub address_functions: Vec<AddressUsage>,
    pub constructors: Vec<ConstructorReport>,
    pub marked_functions: MarkedFunctions,
    pub storage: StorageAccessMap,
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PrepassOutput {
    pub source: String,
    pub metadata: AnalysisMetadata,
    /// Non-fatal call resolution problems
    pub warnings: Vec<CallIssue>,
}

/// Mutable state threaded through every pass of one run
pub struct PipelineState {
    source: SourceText,
    index: Option<AstIndex>,
    pub patcher: TextPatcher,
    pub metadata: AnalysisMetadata,
    pub warnings: Vec<CallIssue>,
}

impl PipelineState {
    pub fn new(source: SourceText) -> Self {
        Self {
            source,
            index: None,
            patcher: TextPatcher::new(),
            metadata: AnalysisMetadata::default(),
            warnings: Vec::new(),
        }
    }

    pub fn source(&self) -> &SourceText {
        &self.source
    }

    /// Index for the current source version
    pub fn index(&self) -> Result<&AstIndex> {
        match &self.index {
            Some(index) if index.version() == self.source.version() => Ok(index),
            _ => Err(PrepassError::StaleIndex {
                version: self.source.version(),
            }),
        }
    }

    /// Parse the initial text; failures are the user's syntax errors
    fn parse_initial(&mut self, parser: &dyn Parser, file: &Path) -> Result<()> {
        let unit = parser
            .parse(self.source.text())
            .map_err(|e| PrepassError::Parse {
                file: file.display().to_string(),
                line: e.line,
                column: e.column,
                message: e.message,
            })?;
        self.index = Some(AstIndex::build(&self.source, unit));
        Ok(())
    }

    /// Commit the staged batch and reparse if the text changed
    fn commit(&mut self, parser: &dyn Parser, pass: &'static str) -> Result<()> {
        let edits = self.patcher.staged().len();
        let next = self.patcher.commit(&self.source)?;
        if next.version() == self.source.version() {
            debug!(pass, "nothing to commit");
            return Ok(());
        }

        self.index = None;
        self.source = next;
        let unit = parser
            .parse(self.source.text())
            .map_err(|e| PrepassError::SyntaxRegression {
                pass,
                line: e.line,
                column: e.column,
                message: e.message,
            })?;
        self.index = Some(AstIndex::build(&self.source, unit));
        info!(
            pass,
            edits,
            version = self.source.version(),
            "reparsed rewritten source"
        );
        Ok(())
    }
}

struct Step {
    pass: Box<dyn Pass>,
    /// Commit and reparse after this pass
    barrier: bool,
}

/// Ordered pass sequence
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Pipeline {
    /// Empty pipeline, for running passes in isolation
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// The full rewrite sequence
    pub fn standard() -> Self {
        Self::empty()
            .barrier(CommentStripper)
            .barrier(ImportResolver)
            .then(AddressTypeAnalyzer)
            .barrier(ConstructorFlattener)
            .then(SelectorResolver)
            .barrier(FunctionCallRewriter)
            .then(StorageClassifier)
    }

    /// Append a pass whose edits join the next batch
    pub fn then(mut self, pass: impl Pass + 'static) -> Self {
        self.steps.push(Step {
            pass: Box::new(pass),
            barrier: false,
        });
        self
    }

    /// Append a pass followed by a commit and reparse
    pub fn barrier(mut self, pass: impl Pass + 'static) -> Self {
        self.steps.push(Step {
            pass: Box::new(pass),
            barrier: true,
        });
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.pass.name()).collect()
    }

    /// Run every pass over `text`, read from `source_path`
    pub fn run(
        &self,
        text: &str,
        source_path: &Path,
        parser: &dyn Parser,
        resolver: &dyn FileResolver,
        config: &PrepassConfig,
    ) -> Result<PrepassOutput> {
        let ctx = PassContext {
            parser,
            resolver,
            config,
            source_path,
        };
        let mut state = PipelineState::new(SourceText::new(text));
        state.metadata.main_contract = config.main_contract.clone();
        state.parse_initial(parser, source_path)?;
        info!(
            file = %source_path.display(),
            contract = %config.main_contract,
            parser = parser.name(),
            "starting prepass"
        );

        for step in &self.steps {
            let name = step.pass.name();
            debug!(pass = name, "running pass");
            if let Err(err) = step.pass.run(&mut state, &ctx) {
                state.patcher.discard();
                return Err(err.in_pass(name));
            }
            if step.barrier {
                state.commit(parser, name)?;
            }
        }
        if !state.patcher.is_empty() {
            state.commit(parser, "finalize")?;
        }

        info!(
            version = state.source.version(),
            warnings = state.warnings.len(),
            "prepass finished"
        );
        Ok(PrepassOutput {
            source: state.source.text().to_string(),
            metadata: state.metadata,
            warnings: state.warnings,
        })
    }
}
