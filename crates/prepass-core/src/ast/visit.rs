/*!
# AST Traversal

Closed set of node kinds the passes care about, plus a depth-first walker.
Visitors receive every node through one `visit` method and pick the
variants they need with a `match`.
*/

use super::*;

/// Borrowed view of one node
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Import(&'a ImportDirective),
    Contract(&'a ContractDefinition),
    Function(&'a FunctionDefinition),
    Variable(&'a VariableDeclaration),
    Modifier(&'a ModifierInvocation),
    Call(&'a FunctionCall),
    Identifier(&'a Identifier),
}

impl<'a> Node<'a> {
    pub fn span(&self) -> Span {
        match self {
            Node::Import(n) => n.span,
            Node::Contract(n) => n.span,
            Node::Function(n) => n.span,
            Node::Variable(n) => n.span,
            Node::Modifier(n) => n.span,
            Node::Call(n) => n.span,
            Node::Identifier(n) => n.span,
        }
    }
}

/// Where the walker currently is.
///
/// Container nodes (`Contract`, `Function`) are visited with the scope that
/// encloses them; their children are visited with the inner scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub contract: Option<&'a ContractDefinition>,
    pub function: Option<&'a FunctionDefinition>,
}

pub trait Visitor<'a> {
    /// Called for every node; returning `false` skips the node's children
    fn visit(&mut self, node: Node<'a>, scope: Scope<'a>) -> bool;
}

/// Walk a source unit depth-first in declaration order
pub fn walk<'a, V: Visitor<'a> + ?Sized>(unit: &'a SourceUnit, visitor: &mut V) {
    for item in &unit.items {
        match item {
            SourceItem::Import(import) => {
                visitor.visit(Node::Import(import), Scope::default());
            }
            SourceItem::Contract(contract) => walk_contract(contract, visitor),
            SourceItem::Pragma(_) | SourceItem::Other(_) => {}
        }
    }
}

fn walk_contract<'a, V: Visitor<'a> + ?Sized>(contract: &'a ContractDefinition, visitor: &mut V) {
    let scope = Scope {
        contract: Some(contract),
        function: None,
    };
    if !visitor.visit(Node::Contract(contract), Scope::default()) {
        return;
    }
    for base in &contract.bases {
        if visitor.visit(Node::Modifier(base), scope) {
            walk_calls(&base.calls, scope, visitor);
        }
    }
    for variable in &contract.variables {
        if visitor.visit(Node::Variable(variable), scope) {
            walk_calls(&variable.calls, scope, visitor);
        }
    }
    for function in &contract.functions {
        walk_function(contract, function, visitor);
    }
}

fn walk_function<'a, V: Visitor<'a> + ?Sized>(
    contract: &'a ContractDefinition,
    function: &'a FunctionDefinition,
    visitor: &mut V,
) {
    let outer = Scope {
        contract: Some(contract),
        function: None,
    };
    if !visitor.visit(Node::Function(function), outer) {
        return;
    }
    let scope = Scope {
        contract: Some(contract),
        function: Some(function),
    };
    for param in function.parameters.iter().chain(function.returns.iter()) {
        visitor.visit(Node::Variable(param), scope);
    }
    for modifier in &function.modifiers {
        if visitor.visit(Node::Modifier(modifier), scope) {
            walk_calls(&modifier.calls, scope, visitor);
        }
    }
    if let Some(body) = &function.body {
        for local in &body.locals {
            visitor.visit(Node::Variable(local), scope);
        }
        walk_calls(&body.calls, scope, visitor);
        for ident in &body.identifiers {
            visitor.visit(Node::Identifier(ident), scope);
        }
    }
}

fn walk_calls<'a, V: Visitor<'a> + ?Sized>(
    calls: &'a [FunctionCall],
    scope: Scope<'a>,
    visitor: &mut V,
) {
    for call in calls {
        visitor.visit(Node::Call(call), scope);
    }
}

/// Visitor built from a closure, handy for one-off collections
pub struct FnVisitor<F>(pub F);

impl<'a, F> Visitor<'a> for FnVisitor<F>
where
    F: FnMut(Node<'a>, Scope<'a>) -> bool,
{
    fn visit(&mut self, node: Node<'a>, scope: Scope<'a>) -> bool {
        (self.0)(node, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parser, SolidityParser};

    #[test]
    fn test_walk_reports_scopes_and_prunes() {
        let unit = SolidityParser::new()
            .parse(
                "import \"x.sol\";
                 contract A is B(1) {
                     uint total = h(1);
                     function f(uint a) public m(k(a)) { uint b = a; g(b); }
                 }
                 contract Skipped { function h() public { g(); } }",
            )
            .unwrap();

        let mut seen = Vec::new();
        walk(
            &unit,
            &mut FnVisitor(|node: Node<'_>, scope: Scope<'_>| {
                let owner = scope.function.map(|f| f.name.clone()).unwrap_or_default();
                let label = match node {
                    Node::Import(i) => format!("import {}", i.path),
                    Node::Contract(c) => format!("contract {}", c.name),
                    Node::Function(f) => format!("function {}", f.name),
                    Node::Variable(v) => format!("var {} in '{owner}'", v.name.clone().unwrap_or_default()),
                    Node::Modifier(m) => format!("modifier {}", m.name),
                    Node::Call(c) => format!("call {} in '{owner}'", c.callee),
                    Node::Identifier(i) => format!("ident {}", i.name),
                };
                let descend = !matches!(node, Node::Contract(c) if c.name == "Skipped");
                seen.push(label);
                descend
            }),
        );

        assert_eq!(
            seen,
            vec![
                "import x.sol",
                "contract A",
                "modifier B",
                "var total in ''",
                "call h in ''",
                "function f",
                "var a in 'f'",
                "modifier m",
                "call k in 'f'",
                "var b in 'f'",
                "call g in 'f'",
                "ident b",
                "ident a",
                "ident g",
                "ident b",
                "contract Skipped",
            ]
        );
    }
}
