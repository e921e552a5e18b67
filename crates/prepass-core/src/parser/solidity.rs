// Front-end on top of the tree-sitter Solidity grammar.
//
// The concrete syntax tree is mapped onto the crate's AST. Declarations are
// mapped fully; function bodies only contribute the calls, identifier uses
// and local declarations found inside them.

use tree_sitter::{Node as SyntaxNode, Tree};

use crate::ast::*;

use super::{ParseError, Parser};

/// Bundled front-end
#[derive(Debug, Default, Clone, Copy)]
pub struct SolidityParser;

impl SolidityParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for SolidityParser {
    fn parse(&self, source: &str) -> Result<SourceUnit, ParseError> {
        let tree = syntax_tree(source)?;
        let root = tree.root_node();
        if let Some(node) = first_error(root) {
            return Err(syntax_error(source, node));
        }
        Ok(Mapper { source }.source_unit(root))
    }

    fn name(&self) -> &'static str {
        "solidity"
    }
}

fn syntax_tree(source: &str) -> Result<Tree, ParseError> {
    let mut parser = tree_sitter::Parser::new();
    let language = tree_sitter_solidity::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| ParseError::at(source, 0, format!("failed to load grammar: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParseError::at(source, 0, "parser produced no tree"))
}

/// Words that never denote a variable or a callable
const KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "return", "returns", "emit", "new", "delete", "break",
    "continue", "try", "catch", "unchecked", "assembly", "memory", "storage", "calldata", "this",
    "super", "true", "false", "var", "public", "private", "internal", "external", "pure", "view",
    "payable", "constant", "immutable", "indexed", "virtual", "override", "function", "mapping",
    "type", "_", "wei", "gwei", "ether", "seconds", "minutes", "hours", "days", "weeks",
];

const LOCATIONS: &[&str] = &["memory", "storage", "calldata"];

const MUTABILITY: &[&str] = &["pure", "view", "payable", "constant"];

fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Elementary type names, which make `T(x)` a conversion rather than a call
fn is_elementary_type(text: &str) -> bool {
    let sized = |prefix: &str| {
        text.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    };
    matches!(
        text,
        "bool" | "address" | "string" | "bytes" | "byte" | "uint" | "int" | "payable" | "fixed"
            | "ufixed"
    ) || sized("uint")
        || sized("int")
        || sized("bytes")
}

fn normalize_elementary(text: &str) -> &str {
    match text {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        other => other,
    }
}

fn first_error(node: SyntaxNode<'_>) -> Option<SyntaxNode<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    children(node).into_iter().find_map(first_error)
}

fn syntax_error(source: &str, node: SyntaxNode<'_>) -> ParseError {
    let message = if node.is_missing() {
        format!("expected '{}'", node.kind())
    } else {
        let leaf = first_leaf(node);
        match &source[leaf.byte_range()] {
            "" => "unexpected end of input".to_string(),
            text => format!("unexpected '{}'", text.lines().next().unwrap_or(text)),
        }
    };
    ParseError::at(source, node.start_byte(), message)
}

fn children(node: SyntaxNode<'_>) -> Vec<SyntaxNode<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn named_children(node: SyntaxNode<'_>) -> Vec<SyntaxNode<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn first_leaf(node: SyntaxNode<'_>) -> SyntaxNode<'_> {
    let mut node = node;
    while let Some(child) = node.child(0) {
        node = child;
    }
    node
}

/// Strips the single-child `expression` and `statement` wrappers
fn unwrap(node: SyntaxNode<'_>) -> SyntaxNode<'_> {
    let mut node = node;
    while matches!(node.kind(), "expression" | "statement" | "primary_expression") {
        match named_children(node).as_slice() {
            [inner] => node = *inner,
            _ => break,
        }
    }
    node
}

fn span(node: SyntaxNode<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn without_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_argument_list(kind: &str) -> bool {
    matches!(kind, "call_arguments" | "arguments" | "argument_list")
}

/// Nodes collected from a function body or an expression
#[derive(Default)]
struct Scan {
    locals: Vec<VariableDeclaration>,
    calls: Vec<FunctionCall>,
    identifiers: Vec<Identifier>,
}

struct Mapper<'s> {
    source: &'s str,
}

impl<'s> Mapper<'s> {
    fn text(&self, node: SyntaxNode<'_>) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn source_unit(&self, root: SyntaxNode<'_>) -> SourceUnit {
        let items = named_children(root)
            .into_iter()
            .map(|node| match node.kind() {
                "pragma_directive" => SourceItem::Pragma(span(node)),
                "import_directive" => SourceItem::Import(self.import_directive(node)),
                "contract_declaration" | "interface_declaration" | "library_declaration" => {
                    SourceItem::Contract(self.contract(node))
                }
                _ => SourceItem::Other(self.opaque_item(node)),
            })
            .collect();
        SourceUnit {
            items,
            span: Span::new(0, self.source.len()),
        }
    }

    /// Struct, enum, free function, constant: kept as text
    fn opaque_item(&self, node: SyntaxNode<'_>) -> OpaqueItem {
        let keyword = self.text(first_leaf(node)).to_string();
        let declares = matches!(
            keyword.as_str(),
            "struct" | "enum" | "event" | "error" | "type" | "function"
        );
        OpaqueItem {
            name: if declares { self.declared_name(node) } else { None },
            keyword,
            span: span(node),
        }
    }

    fn declared_name(&self, node: SyntaxNode<'_>) -> Option<String> {
        node.child_by_field_name("name")
            .or_else(|| children(node).into_iter().find(|c| c.kind() == "identifier"))
            .map(|n| self.text(n).to_string())
    }

    fn import_directive(&self, node: SyntaxNode<'_>) -> ImportDirective {
        let mut tokens = Vec::new();
        import_tokens(node, &mut tokens);

        let mut import = ImportDirective {
            path: String::new(),
            path_span: span(node),
            unit_alias: None,
            symbols: Vec::new(),
            span: span(node),
        };
        let mut in_braces = false;
        let mut after_as = false;
        for token in tokens {
            match token.kind() {
                "as" => {
                    after_as = true;
                    continue;
                }
                "{" => in_braces = true,
                "}" => in_braces = false,
                "string" | "string_literal" => {
                    import.path = self
                        .text(token)
                        .trim_matches(|c| c == '"' || c == '\'')
                        .to_string();
                    import.path_span = span(token);
                }
                "identifier" => {
                    let name = self.text(token).to_string();
                    match (after_as, in_braces) {
                        (true, true) => {
                            if let Some(last) = import.symbols.last_mut() {
                                last.1 = Some(name);
                            }
                        }
                        (true, false) => import.unit_alias = Some(name),
                        (false, true) => import.symbols.push((name, None)),
                        (false, false) => {}
                    }
                }
                _ => {}
            }
            after_as = false;
        }
        import
    }

    fn contract(&self, node: SyntaxNode<'_>) -> ContractDefinition {
        let all = children(node);
        let kind = match node.kind() {
            "interface_declaration" => ContractKind::Interface,
            "library_declaration" => ContractKind::Library,
            _ => ContractKind::Contract,
        };
        let name = node
            .child_by_field_name("name")
            .or_else(|| all.iter().copied().find(|c| c.kind() == "identifier"));

        let mut bases = Vec::new();
        for child in &all {
            if child.kind() == "inheritance_specifier" {
                bases.push(self.invocation(*child));
            } else if child.kind().contains("heritage") {
                for specifier in children(*child) {
                    if specifier.kind() == "inheritance_specifier" {
                        bases.push(self.invocation(specifier));
                    }
                }
            }
        }

        let body = node
            .child_by_field_name("body")
            .or_else(|| all.iter().copied().find(|c| c.kind() == "contract_body"));

        let mut contract = ContractDefinition {
            name: name.map(|n| self.text(n).to_string()).unwrap_or_default(),
            name_span: name.map(span).unwrap_or_else(|| span(node)),
            kind,
            is_abstract: all.iter().any(|c| c.kind() == "abstract"),
            bases,
            variables: Vec::new(),
            functions: Vec::new(),
            type_names: Vec::new(),
            body_span: body.map(span).unwrap_or_else(|| span(node)),
            span: span(node),
        };

        for member in body.map(named_children).unwrap_or_default() {
            match member.kind() {
                "function_definition" => {
                    contract
                        .functions
                        .push(self.function(member, FunctionKind::Function));
                }
                "constructor_definition" => {
                    contract
                        .functions
                        .push(self.function(member, FunctionKind::Constructor));
                }
                "modifier_definition" => {
                    contract
                        .functions
                        .push(self.function(member, FunctionKind::Modifier));
                }
                "fallback_receive_definition" => {
                    let receive = children(member).iter().any(|c| self.text(*c) == "receive");
                    let kind = if receive {
                        FunctionKind::Receive
                    } else {
                        FunctionKind::Fallback
                    };
                    contract.functions.push(self.function(member, kind));
                }
                "state_variable_declaration" | "constant_variable_declaration" => {
                    contract.variables.push(self.state_variable(member));
                }
                "struct_declaration"
                | "enum_declaration"
                | "event_definition"
                | "error_declaration"
                | "user_defined_type_definition" => {
                    if let Some(name) = self.declared_name(member) {
                        contract.type_names.push(name);
                    }
                }
                _ => {}
            }
        }
        contract
    }

    /// `Name`, `Lib.Name` or either followed by an argument list
    fn invocation(&self, node: SyntaxNode<'_>) -> ModifierInvocation {
        let all = children(node);
        let head_len = all
            .iter()
            .position(|c| c.kind() == "(" || is_argument_list(c.kind()))
            .unwrap_or(all.len());
        let name_span = match (all.first(), all[..head_len].last()) {
            (Some(first), Some(last)) => Span::new(first.start_byte(), last.end_byte()),
            _ => span(node),
        };

        let mut invocation = ModifierInvocation {
            name: without_whitespace(name_span.slice(self.source)),
            name_span,
            arguments: None,
            args_span: None,
            calls: Vec::new(),
            span: span(node),
        };
        if let Some((args, args_span)) = self.argument_list(node) {
            let mut scan = Scan::default();
            for arg in &args {
                self.scan(*arg, &mut scan);
            }
            scan.calls.sort_by_key(|c| c.callee_span.start);
            invocation.calls = scan.calls;
            invocation.arguments = Some(args.into_iter().map(|a| self.argument(a)).collect());
            invocation.args_span = Some(args_span);
        }
        invocation
    }

    /// Arguments of a call-shaped node and the span of their parentheses
    fn argument_list<'t>(&self, node: SyntaxNode<'t>) -> Option<(Vec<SyntaxNode<'t>>, Span)> {
        let all = children(node);
        if let Some(list) = all.iter().find(|c| is_argument_list(c.kind())) {
            return self.argument_list(*list);
        }
        let open = all.iter().position(|c| c.kind() == "(")?;
        let close = open + all[open..].iter().position(|c| c.kind() == ")")?;
        let args = all[open + 1..close]
            .iter()
            .filter(|c| c.is_named() && c.kind() != "comment")
            .copied()
            .collect();
        Some((args, Span::new(all[open].start_byte(), all[close].end_byte())))
    }

    fn function(&self, node: SyntaxNode<'_>, kind: FunctionKind) -> FunctionDefinition {
        let all = children(node);
        let name_node = match kind {
            FunctionKind::Function | FunctionKind::Modifier => node
                .child_by_field_name("name")
                .or_else(|| all.iter().copied().find(|c| c.kind() == "identifier")),
            _ => None,
        };
        let name = match kind {
            FunctionKind::Constructor => "constructor",
            FunctionKind::Fallback => "fallback",
            FunctionKind::Receive => "receive",
            FunctionKind::Function | FunctionKind::Modifier => {
                name_node.map(|n| self.text(n)).unwrap_or_default()
            }
        };
        let name_span = name_node.map(span);

        let (parameters, params_span) = self.parameter_list(node);
        let params_span = params_span.unwrap_or_else(|| {
            Span::point(name_span.map_or(node.start_byte(), |s| s.end))
        });
        let body = node
            .child_by_field_name("body")
            .or_else(|| all.iter().copied().find(|c| c.kind() == "function_body"));

        let mut function = FunctionDefinition {
            kind,
            name: name.to_string(),
            name_span,
            parameters,
            params_span,
            returns: Vec::new(),
            visibility: Visibility::Unspecified,
            mutability: None,
            attributes: Vec::new(),
            modifiers: Vec::new(),
            body: body.map(|b| self.block(b)),
            span: span(node),
        };

        for child in all {
            if Some(child) == name_node || Some(child) == body {
                continue;
            }
            match child.kind() {
                "modifier_invocation" => function.modifiers.push(self.invocation(child)),
                "return_type_definition" => function.returns = self.parameter_list(child).0,
                "override_specifier" => function.attributes.push(self.attribute(child)),
                "parameter" | "parameter_list" => {}
                _ => {
                    let text = self.text(child);
                    if let Some(visibility) = Visibility::from_keyword(text) {
                        function.visibility = visibility;
                        function.attributes.push(self.attribute(child));
                    } else if MUTABILITY.contains(&text) {
                        function.mutability = Some(text.to_string());
                        function.attributes.push(self.attribute(child));
                    } else if text == "virtual" {
                        function.attributes.push(self.attribute(child));
                    }
                }
            }
        }
        function
    }

    fn attribute(&self, node: SyntaxNode<'_>) -> Attribute {
        Attribute {
            text: self.text(node).to_string(),
            span: span(node),
        }
    }

    /// Parameters declared directly by `node` and the span of their parentheses
    fn parameter_list(&self, node: SyntaxNode<'_>) -> (Vec<VariableDeclaration>, Option<Span>) {
        let all = children(node);
        if let Some(list) = all.iter().find(|c| c.kind() == "parameter_list") {
            return self.parameter_list(*list);
        }
        let parameters = all
            .iter()
            .filter(|c| c.kind() == "parameter")
            .map(|p| self.variable(*p))
            .collect();
        let parens = all.iter().position(|c| c.kind() == "(").and_then(|open| {
            let close = all[open..].iter().find(|c| c.kind() == ")")?;
            Some(Span::new(all[open].start_byte(), close.end_byte()))
        });
        (parameters, parens)
    }

    /// Parameter or local: `Type [location] [name]`
    fn variable(&self, node: SyntaxNode<'_>) -> VariableDeclaration {
        let all = children(node);
        let type_node = node
            .child_by_field_name("type")
            .or_else(|| named_children(node).first().copied())
            .unwrap_or(node);
        let name = node.child_by_field_name("name").or_else(|| {
            all.iter()
                .rev()
                .copied()
                .find(|c| c.kind() == "identifier" && *c != type_node)
        });
        VariableDeclaration {
            name: name.map(|n| self.text(n).to_string()),
            name_span: name.map(span),
            type_name: self.type_name(type_node),
            location: all
                .iter()
                .map(|c| self.text(*c))
                .find(|t| LOCATIONS.contains(t))
                .map(str::to_string),
            visibility: None,
            is_constant: false,
            is_immutable: false,
            calls: Vec::new(),
            span: span(node),
        }
    }

    fn state_variable(&self, node: SyntaxNode<'_>) -> VariableDeclaration {
        let all = children(node);
        let type_node = node
            .child_by_field_name("type")
            .or_else(|| named_children(node).first().copied())
            .unwrap_or(node);
        let header: Vec<_> = all.iter().copied().take_while(|c| c.kind() != "=").collect();
        let name = node.child_by_field_name("name").or_else(|| {
            header
                .iter()
                .rev()
                .copied()
                .find(|c| c.kind() == "identifier" && *c != type_node)
        });
        let value = node
            .child_by_field_name("value")
            .or_else(|| all.get(header.len() + 1).copied());

        let mut declaration = VariableDeclaration {
            name: name.map(|n| self.text(n).to_string()),
            name_span: name.map(span),
            type_name: self.type_name(type_node),
            location: None,
            visibility: None,
            is_constant: node.kind() == "constant_variable_declaration",
            is_immutable: false,
            calls: Vec::new(),
            span: span(node),
        };
        for child in header {
            if Some(child) == name || child == type_node {
                continue;
            }
            match self.text(child) {
                "constant" => declaration.is_constant = true,
                "immutable" => declaration.is_immutable = true,
                text => {
                    if let Some(visibility) = Visibility::from_keyword(text) {
                        declaration.visibility = Some(visibility);
                    }
                }
            }
        }
        if let Some(value) = value {
            let mut scan = Scan::default();
            self.scan(value, &mut scan);
            scan.calls.sort_by_key(|c| c.callee_span.start);
            declaration.calls = scan.calls;
        }
        declaration
    }

    fn type_name(&self, node: SyntaxNode<'_>) -> TypeName {
        TypeName {
            text: self.type_text(node),
            span: span(node),
        }
    }

    /// Normalized spelling: `uint` becomes `uint256`, `address payable` becomes `address`
    fn type_text(&self, node: SyntaxNode<'_>) -> String {
        match node.kind() {
            "primitive_type" => {
                let text = collapse_whitespace(self.text(node));
                if text.starts_with("address") {
                    "address".to_string()
                } else {
                    normalize_elementary(&text).to_string()
                }
            }
            "type_name" => {
                let parts = named_children(node);
                let leading = node.child(0).map(|c| c.kind()).unwrap_or_default();
                match leading {
                    "mapping" => {
                        let types: Vec<_> = parts.iter().filter(|p| p.kind() != "identifier").collect();
                        match (types.first(), types.last()) {
                            (Some(key), Some(value)) if types.len() >= 2 => format!(
                                "mapping({} => {})",
                                self.type_text(**key),
                                self.type_text(**value)
                            ),
                            _ => collapse_whitespace(self.text(node)),
                        }
                    }
                    "function" => collapse_whitespace(self.text(node)),
                    _ => match parts.first() {
                        Some(inner) if inner.end_byte() == node.end_byte() => self.type_text(*inner),
                        // Array: element type followed by its `[..]` suffix
                        Some(inner) => format!(
                            "{}{}",
                            self.type_text(*inner),
                            without_whitespace(&self.source[inner.end_byte()..node.end_byte()])
                        ),
                        None => collapse_whitespace(self.text(node)),
                    },
                }
            }
            "identifier" | "user_defined_type" => without_whitespace(self.text(node)),
            _ => {
                let text = collapse_whitespace(self.text(node));
                normalize_elementary(&text).to_string()
            }
        }
    }

    /// Function or modifier body
    fn block(&self, node: SyntaxNode<'_>) -> Block {
        let mut scan = Scan::default();
        for child in children(node) {
            self.scan(child, &mut scan);
        }
        scan.calls.sort_by_key(|c| c.callee_span.start);
        Block {
            span: span(node),
            locals: scan.locals,
            calls: scan.calls,
            identifiers: scan.identifiers,
        }
    }

    fn scan(&self, node: SyntaxNode<'_>, out: &mut Scan) {
        match node.kind() {
            // Inline assembly is a different language
            "assembly_statement" | "comment" => return,
            "identifier" => {
                let name = self.text(node);
                if !is_keyword(name) {
                    out.identifiers.push(Identifier {
                        name: name.to_string(),
                        span: span(node),
                    });
                }
                return;
            }
            "member_expression" => {
                if let Some(object) = member_object(node) {
                    self.scan(object, out);
                }
                return;
            }
            "emit_statement" => {
                self.scan_emit(node, out);
                return;
            }
            "new_expression" => {
                for child in children(node) {
                    if !matches!(child.kind(), "type_name" | "user_defined_type" | "identifier") {
                        self.scan(child, out);
                    }
                }
                return;
            }
            "variable_declaration" => out.locals.push(self.variable(node)),
            "call_expression" => {
                if let Some(call) = self.call(node) {
                    out.calls.push(call);
                }
            }
            _ => {}
        }

        let all = children(node);
        let keyed = all.iter().any(|c| c.kind() == "{")
            || node.kind().contains("argument")
            || node.kind().contains("field");
        for (i, child) in all.iter().enumerate() {
            // `{name: value}` keys are not identifier uses
            let is_key = keyed
                && child.kind() == "identifier"
                && all.get(i + 1).is_some_and(|next| next.kind() == ":");
            if !is_key {
                self.scan(*child, out);
            }
        }
    }

    /// The event name is not an identifier use; its arguments are
    fn scan_emit(&self, node: SyntaxNode<'_>, out: &mut Scan) {
        let event = node
            .child_by_field_name("name")
            .or_else(|| named_children(node).first().copied());
        for child in children(node) {
            if Some(child) != event {
                self.scan(child, out);
                continue;
            }
            let event = unwrap(child);
            if event.kind() == "call_expression" {
                for arg in self.argument_list(event).map(|(args, _)| args).unwrap_or_default() {
                    self.scan(arg, out);
                }
            }
        }
    }

    fn call(&self, node: SyntaxNode<'_>) -> Option<FunctionCall> {
        let mut function = unwrap(
            node.child_by_field_name("function")
                .or_else(|| named_children(node).first().copied())?,
        );
        // `f{value: v}(...)`
        if function.kind() == "struct_expression" {
            function = unwrap(named_children(function).first().copied()?);
        }

        let (callee, receiver) = match function.kind() {
            "identifier" => {
                let name = self.text(function);
                if is_keyword(name) || is_elementary_type(name) {
                    return None;
                }
                (function, Receiver::None)
            }
            "member_expression" => {
                let property = function
                    .child_by_field_name("property")
                    .or_else(|| named_children(function).last().copied())?;
                (property, self.receiver(member_object(function)?))
            }
            _ => return None,
        };

        let (args, _) = self.argument_list(node)?;
        Some(FunctionCall {
            callee: self.text(callee).to_string(),
            callee_span: span(callee),
            receiver,
            arguments: args.into_iter().map(|a| self.argument(a)).collect(),
            span: Span::new(callee.start_byte(), node.end_byte()),
        })
    }

    fn receiver(&self, object: SyntaxNode<'_>) -> Receiver {
        match (object.kind(), self.text(object)) {
            (_, "this") => Receiver::This,
            (_, "super") => Receiver::Super,
            ("identifier", name) => Receiver::Named(name.to_string()),
            ("call_expression", _) => {
                let cast = object
                    .child_by_field_name("function")
                    .or_else(|| named_children(object).first().copied())
                    .map(unwrap);
                match cast {
                    Some(f) if f.kind() == "identifier" && !is_keyword(self.text(f)) => {
                        Receiver::Cast(self.text(f).to_string())
                    }
                    _ => Receiver::Other,
                }
            }
            _ => Receiver::Other,
        }
    }

    /// One entry of an argument list
    fn argument(&self, node: SyntaxNode<'_>) -> Expression {
        // A `{name: value}` block stays whole
        let named = children(node).iter().any(|c| c.kind() == "{");
        if node.kind() == "call_argument" && !named {
            if let Some(inner) = named_children(node).first() {
                return self.expression(*inner);
            }
        }
        self.expression(node)
    }

    fn expression(&self, node: SyntaxNode<'_>) -> Expression {
        let inner = unwrap(node);
        let text = self.text(inner);
        let kind = match inner.kind() {
            "number_literal" => ExpressionKind::Number,
            "string_literal" | "string" | "hex_string_literal" | "unicode_string_literal" => {
                ExpressionKind::Str
            }
            "boolean_literal" => ExpressionKind::Bool,
            _ if text == "true" || text == "false" => ExpressionKind::Bool,
            "identifier" if !is_keyword(text) => ExpressionKind::Identifier(text.to_string()),
            _ => ExpressionKind::Other,
        };
        let mut scan = Scan::default();
        self.scan(node, &mut scan);
        Expression {
            kind,
            span: span(node),
            identifiers: scan.identifiers,
        }
    }
}

/// Leaves of an import directive, with strings and identifiers kept whole
fn import_tokens<'t>(node: SyntaxNode<'t>, out: &mut Vec<SyntaxNode<'t>>) {
    for child in children(node) {
        if child.child_count() == 0
            || matches!(child.kind(), "string" | "string_literal" | "identifier")
        {
            out.push(child);
        } else {
            import_tokens(child, out);
        }
    }
}

fn member_object(node: SyntaxNode<'_>) -> Option<SyntaxNode<'_>> {
    node.child_by_field_name("object")
        .or_else(|| named_children(node).first().copied())
        .map(unwrap)
}
