/*!
# Import Flattening

Replaces every import directive with the flattened text of the imported
file, producing one self-contained unit. Files currently being expanded
form a load stack; meeting one of them again is a cycle. A file that was
already spliced once is replaced by nothing on later imports, which keeps
diamond-shaped import graphs from duplicating declarations.
*/

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use super::comments::strip_comments;
use super::{Pass, PassContext};
use crate::errors::{PrepassError, Result};
use crate::parser::Parser;
use crate::pipeline::PipelineState;

/// An import target located by a `FileResolver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Identity of the file; two imports of one file yield the same path
    pub path: PathBuf,
    pub text: String,
}

/// Locates and loads the file an import directive names
pub trait FileResolver: Send + Sync {
    fn resolve(&self, import: &str, from: &Path) -> Result<ResolvedFile>;
}

/// Resolves imports on disk, relative to the importing file first and
/// then against each include directory in order
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    include_paths: Vec<PathBuf>,
}

impl FsResolver {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }
}

impl FileResolver for FsResolver {
    fn resolve(&self, import: &str, from: &Path) -> Result<ResolvedFile> {
        let relative = from
            .parent()
            .map(|dir| dir.join(import))
            .unwrap_or_else(|| PathBuf::from(import));
        let candidates =
            std::iter::once(relative).chain(self.include_paths.iter().map(|dir| dir.join(import)));

        for candidate in candidates {
            if candidate.is_file() {
                let path = candidate.canonicalize()?;
                let text = fs::read_to_string(&path)?;
                return Ok(ResolvedFile { path, text });
            }
        }
        Err(PrepassError::FileNotFound {
            import: import.to_string(),
            from: from.to_path_buf(),
        })
    }
}

/// Resolves imports against a fixed set of named sources
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolver {
    files: IndexMap<PathBuf, String>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), text.into());
    }
}

impl FileResolver for InMemoryResolver {
    fn resolve(&self, import: &str, from: &Path) -> Result<ResolvedFile> {
        let relative = normalize(&from.parent().unwrap_or(Path::new("")).join(import));
        let bare = normalize(Path::new(import));
        for path in [relative, bare] {
            if let Some(text) = self.files.get(&path) {
                return Ok(ResolvedFile {
                    path,
                    text: text.clone(),
                });
            }
        }
        Err(PrepassError::FileNotFound {
            import: import.to_string(),
            from: from.to_path_buf(),
        })
    }
}

/// Lexically resolves `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub struct ImportResolver;

impl Pass for ImportResolver {
    fn name(&self) -> &'static str {
        "imports"
    }

    fn description(&self) -> &'static str {
        "Splices imported files in place of their import directives"
    }

    fn run(&self, state: &mut PipelineState, ctx: &PassContext<'_>) -> Result<()> {
        let index = state.index()?;
        let imports: Vec<_> = index
            .unit()
            .imports()
            .map(|import| (import.span, import.path.clone()))
            .collect();
        if imports.is_empty() {
            debug!("no import directives");
            return Ok(());
        }

        let mut flattener = Flattener {
            parser: ctx.parser,
            resolver: ctx.resolver,
            load_stack: vec![ctx
                .source_path
                .canonicalize()
                .unwrap_or_else(|_| normalize(ctx.source_path))],
            spliced: HashSet::new(),
        };
        let mut edits = Vec::with_capacity(imports.len());
        for (span, path) in imports {
            let text = flattener.expand(&path, ctx.source_path)?;
            edits.push((span, text));
        }

        info!(
            directives = edits.len(),
            files = flattener.spliced.len(),
            "flattened imports"
        );
        for (span, text) in edits {
            state.patcher.stage_span(span, text)?;
        }
        Ok(())
    }
}

struct Flattener<'a> {
    parser: &'a dyn Parser,
    resolver: &'a dyn FileResolver,
    /// Files whose expansion is in progress, outermost first
    load_stack: Vec<PathBuf>,
    spliced: HashSet<PathBuf>,
}

impl Flattener<'_> {
    /// Flattened text to put in place of `import "<import>"` inside `from`
    fn expand(&mut self, import: &str, from: &Path) -> Result<String> {
        let file = self.resolver.resolve(import, from)?;

        if let Some(start) = self.load_stack.iter().position(|p| *p == file.path) {
            let chain = self.load_stack[start..]
                .iter()
                .chain(std::iter::once(&file.path))
                .map(|p| p.display().to_string())
                .collect();
            return Err(PrepassError::CyclicImport { chain });
        }
        if self.spliced.contains(&file.path) {
            debug!(path = %file.path.display(), "already spliced");
            return Ok(String::new());
        }

        let text = strip_comments(&file.text)?;
        let unit = self.parser.parse(&text).map_err(|e| PrepassError::Parse {
            file: file.path.display().to_string(),
            line: e.line,
            column: e.column,
            message: e.message,
        })?;

        self.load_stack.push(file.path.clone());
        let mut nested = Vec::new();
        for directive in unit.imports() {
            let expanded = self.expand(&directive.path, &file.path)?;
            nested.push((directive.span, expanded));
        }
        self.load_stack.pop();

        let mut flattened = text;
        for (span, expanded) in nested.into_iter().rev() {
            flattened.replace_range(span.range(), &expanded);
        }
        self.spliced.insert(file.path);
        Ok(flattened)
    }
}
