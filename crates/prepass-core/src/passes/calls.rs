// Call-site rewriting: applies the renames decided by the selector pass to
// every call that resolves to a renamed definition.

use tracing::{debug, warn};

use super::{Pass, PassContext};
use crate::ast::Span;
use crate::errors::{CallIssue, CallIssueKind, Result};
use crate::index::{AstIndex, ResolveError};
use crate::passes::selectors::MarkedFunctions;
use crate::pipeline::PipelineState;

pub struct FunctionCallRewriter;

impl Pass for FunctionCallRewriter {
    fn name(&self) -> &'static str {
        "function_calls"
    }

    fn description(&self) -> &'static str {
        "Points call sites at the renamed definitions they resolve to"
    }

    fn run(&self, state: &mut PipelineState, _ctx: &PassContext<'_>) -> Result<()> {
        let (edits, issues) = rewrite(state.index()?, &state.metadata.marked_functions);
        debug!(edits = edits.len(), warnings = issues.len(), "rewrote call sites");

        for (span, name) in edits {
            state.patcher.stage_span(span, name)?;
        }
        state.warnings.extend(issues);
        Ok(())
    }
}

fn rewrite(index: &AstIndex, marked: &MarkedFunctions) -> (Vec<(Span, String)>, Vec<CallIssue>) {
    let mut edits = Vec::new();
    let mut issues = Vec::new();

    for (contract, call) in index.call_sites() {
        match index.resolve_function_call(contract, call) {
            Ok(Some(target)) => {
                if let Some(name) = marked.rename_for(&target.key()) {
                    edits.push((call.callee_span, name.to_string()));
                }
            }
            Ok(None) => {}
            Err(err) => {
                let (line, column) = index.line_col(call.callee_span.start);
                let function = index
                    .inside_which_function(call.span.start)
                    .map(|(_, f)| f.name.clone());
                let kind = match err {
                    ResolveError::Ambiguous { candidates } => CallIssueKind::Ambiguous { candidates },
                    ResolveError::Unresolved => CallIssueKind::Unresolved,
                };
                let issue = CallIssue {
                    kind,
                    contract: contract.name.clone(),
                    function,
                    callee: call.callee.clone(),
                    line,
                    column,
                };
                warn!(%issue, "call left unmodified");
                issues.push(issue);
            }
        }
    }
    (edits, issues)
}
