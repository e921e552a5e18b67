/*!
# AST Index

Structural queries over one parse result. An index is built for exactly one
`SourceText` version and is thrown away whenever the text changes.
*/

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::ast::*;
use crate::errors::{PrepassError, Result};
use crate::parser::line_col;
use crate::source::SourceText;

/// Global functions that never resolve to a user definition
const BUILTINS: &[&str] = &[
    "require",
    "assert",
    "revert",
    "keccak256",
    "sha256",
    "sha3",
    "ripemd160",
    "ecrecover",
    "addmod",
    "mulmod",
    "blockhash",
    "blobhash",
    "gasleft",
    "selfdestruct",
    "suicide",
];

/// Version-independent identity of a function definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FunctionKey {
    pub contract: String,
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.contract,
            self.name,
            self.parameter_types.join(",")
        )
    }
}

/// A function definition together with the contract declaring it
#[derive(Debug, Clone, Copy)]
pub struct FunctionRef<'a> {
    pub contract: &'a ContractDefinition,
    pub function: &'a FunctionDefinition,
}

impl<'a> FunctionRef<'a> {
    pub fn key(&self) -> FunctionKey {
        FunctionKey {
            contract: self.contract.name.clone(),
            name: self.function.name.clone(),
            parameter_types: self.function.parameter_types(),
        }
    }

    /// Reachable through the contract's external interface
    pub fn is_externally_visible(&self) -> bool {
        match self.function.visibility {
            Visibility::Public | Visibility::External => true,
            Visibility::Internal | Visibility::Private => false,
            Visibility::Unspecified => true,
        }
    }
}

impl fmt::Display for FunctionRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.contract.name, self.function.signature())
    }
}

/// Non-fatal outcome of call resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("ambiguous call, candidates: {}", candidates.join(", "))]
    Ambiguous { candidates: Vec<String> },

    #[error("no matching definition")]
    Unresolved,
}

/// Overloads sharing a name and concrete parameter types along one chain
#[derive(Debug, Clone)]
pub struct SignatureFamily<'a> {
    pub name: String,
    pub parameter_types: Vec<String>,
    /// Base-to-derived; the last entry is the effective definition
    pub definitions: Vec<FunctionRef<'a>>,
}

impl<'a> SignatureFamily<'a> {
    pub fn effective(&self) -> FunctionRef<'a> {
        self.definitions[self.definitions.len() - 1]
    }
}

/// Inferred type of a call argument
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArgType {
    IntLiteral,
    StrLiteral,
    Bool,
    Typed(String),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Match {
    No,
    Implicit,
    Exact,
}

pub struct AstIndex {
    unit: SourceUnit,
    text: String,
    version: u64,
}

impl AstIndex {
    pub fn build(source: &SourceText, unit: SourceUnit) -> Self {
        Self {
            unit,
            text: source.text().to_string(),
            version: source.version(),
        }
    }

    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        line_col(&self.text, offset)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &ContractDefinition> {
        self.unit.contracts()
    }

    pub fn contract(&self, name: &str) -> Option<&ContractDefinition> {
        // `Lib.Base` in an inheritance list refers to `Base`
        let name = name.rsplit('.').next().unwrap_or(name);
        self.unit.contract(name)
    }

    pub fn require_contract(&self, name: &str) -> Result<&ContractDefinition> {
        self.contract(name)
            .ok_or_else(|| PrepassError::UnknownContract(name.to_string()))
    }

    /// Innermost function whose span contains `offset`
    pub fn inside_which_function(
        &self,
        offset: usize,
    ) -> Option<(&ContractDefinition, &FunctionDefinition)> {
        self.contracts()
            .filter(|c| c.span.contains(offset))
            .flat_map(|c| c.functions.iter().map(move |f| (c, f)))
            .filter(|(_, f)| f.span.contains(offset))
            .min_by_key(|(_, f)| f.span.len())
    }

    /// Every call site in the unit with the contract it appears in
    pub fn call_sites<'a>(&'a self) -> Vec<(&'a ContractDefinition, &'a FunctionCall)> {
        let mut sites = Vec::new();
        walk(
            &self.unit,
            &mut FnVisitor(|node: Node<'a>, scope: Scope<'a>| {
                if let (Node::Call(call), Some(contract)) = (node, scope.contract) {
                    sites.push((contract, call));
                }
                true
            }),
        );
        sites
    }

    /// C3 linearization of `name`, ordered base-to-derived (`name` is last)
    pub fn linearize(&self, name: &str) -> Result<Vec<&ContractDefinition>> {
        let mut active = Vec::new();
        let mut order = self.linearize_names(name, &mut active)?;
        order.reverse();
        order
            .iter()
            .map(|n| self.require_contract(n))
            .collect()
    }

    /// Most-derived first, as produced by the merge
    fn linearize_names(&self, name: &str, active: &mut Vec<String>) -> Result<Vec<String>> {
        let contract = self.contract(name).ok_or_else(|| PrepassError::Inheritance {
            contract: active.last().cloned().unwrap_or_else(|| name.to_string()),
            message: format!("base contract '{name}' is not defined"),
        })?;
        if active.contains(&contract.name) {
            return Err(PrepassError::Inheritance {
                contract: contract.name.clone(),
                message: "inheritance cycle".to_string(),
            });
        }
        active.push(contract.name.clone());

        // Solidity lists bases from "most base-like" to "most derived"
        let mut sequences = Vec::new();
        for base in contract.bases.iter().rev() {
            sequences.push(self.linearize_names(&base.name, active)?);
        }
        sequences.push(
            contract
                .bases
                .iter()
                .rev()
                .map(|b| b.name.rsplit('.').next().unwrap_or(&b.name).to_string())
                .collect(),
        );
        active.pop();

        let mut result = vec![contract.name.clone()];
        loop {
            sequences.retain(|s| !s.is_empty());
            if sequences.is_empty() {
                return Ok(result);
            }
            let head = sequences
                .iter()
                .map(|s| &s[0])
                .find(|candidate| !sequences.iter().any(|s| s[1..].contains(candidate)))
                .cloned()
                .ok_or_else(|| PrepassError::Inheritance {
                    contract: contract.name.clone(),
                    message: "linearization of inheritance graph impossible".to_string(),
                })?;
            for sequence in &mut sequences {
                if sequence[0] == head {
                    sequence.remove(0);
                }
            }
            result.push(head);
        }
    }

    /// State variable visible from `contract`, with the contract declaring it
    pub fn state_variable(
        &self,
        contract: &ContractDefinition,
        name: &str,
    ) -> Option<(&ContractDefinition, &VariableDeclaration)> {
        let chain = self.linearize(&contract.name).ok()?;
        chain
            .into_iter()
            .rev()
            .find_map(|c| c.variable(name).map(|v| (c, v)))
    }

    /// Type of a name as seen from inside `function` of `contract`
    pub fn variable_type<'a>(
        &'a self,
        contract: &ContractDefinition,
        function: Option<&'a FunctionDefinition>,
        name: &str,
    ) -> Option<&'a TypeName> {
        if let Some(local) = function.and_then(|f| f.declaration(name)) {
            return Some(&local.type_name);
        }
        self.state_variable(contract, name)
            .map(|(_, v)| &v.type_name)
    }

    /// Struct, enum, event, error, contract and free-function names
    pub fn is_non_function_name(&self, name: &str) -> bool {
        self.contract(name).is_some()
            || self.unit.free_names().any(|n| n == name)
            || self
                .contracts()
                .any(|c| c.type_names.iter().any(|t| t == name))
    }

    /// Public and external functions of `contract`, grouped by name
    pub fn signature_groups(
        &self,
        contract: &ContractDefinition,
    ) -> Result<IndexMap<String, Vec<SignatureFamily<'_>>>> {
        let chain = self.linearize(&contract.name)?;
        let mut families: IndexMap<(String, Vec<String>), Vec<FunctionRef<'_>>> = IndexMap::new();
        for owner in chain {
            for function in owner.functions.iter().filter(|f| f.kind == FunctionKind::Function) {
                families
                    .entry((function.name.clone(), function.parameter_types()))
                    .or_default()
                    .push(FunctionRef {
                        contract: owner,
                        function,
                    });
            }
        }

        let mut groups: IndexMap<String, Vec<SignatureFamily<'_>>> = IndexMap::new();
        for ((name, parameter_types), definitions) in families {
            let family = SignatureFamily {
                name: name.clone(),
                parameter_types,
                definitions,
            };
            if family.effective().is_externally_visible() {
                groups.entry(name).or_default().push(family);
            }
        }
        Ok(groups)
    }

    /// Resolve the definition a call site refers to.
    ///
    /// `Ok(None)` means the call does not target a user-defined function
    /// (builtins, conversions, struct constructors, calls on values of
    /// non-contract type); those are not resolution failures.
    pub fn resolve_function_call(
        &self,
        contract: &ContractDefinition,
        call: &FunctionCall,
    ) -> std::result::Result<Option<FunctionRef<'_>>, ResolveError> {
        let enclosing = self
            .inside_which_function(call.span.start)
            .map(|(_, f)| f);

        let scope: Vec<&ContractDefinition> = match &call.receiver {
            Receiver::None => {
                if BUILTINS.contains(&call.callee.as_str())
                    || self.is_non_function_name(&call.callee)
                    || self.variable_type(contract, enclosing, &call.callee).is_some()
                {
                    return Ok(None);
                }
                self.chain_or_unresolved(&contract.name)?
            }
            Receiver::This => self.chain_or_unresolved(&contract.name)?,
            Receiver::Super => {
                let mut chain = self.chain_or_unresolved(&contract.name)?;
                chain.pop();
                chain
            }
            Receiver::Named(target) => {
                if self.contract(target).is_some() {
                    self.chain_or_unresolved(target)?
                } else {
                    match self.variable_type(contract, enclosing, target) {
                        Some(ty) if self.contract(&ty.text).is_some() => {
                            self.chain_or_unresolved(&ty.text)?
                        }
                        _ => return Ok(None),
                    }
                }
            }
            Receiver::Cast(target) => {
                if self.contract(target).is_none() {
                    return Ok(None);
                }
                self.chain_or_unresolved(target)?
            }
            Receiver::Other => return Ok(None),
        };

        let candidates = visible_overloads(&scope, &call.callee);
        let named_arguments = call.arguments.len() == 1
            && call.arguments[0].span.slice(&self.text).starts_with('{');

        let mut exact = Vec::new();
        let mut implicit = Vec::new();
        for candidate in candidates {
            if named_arguments {
                implicit.push(candidate);
                continue;
            }
            if candidate.function.parameters.len() != call.arguments.len() {
                continue;
            }
            let quality = candidate
                .function
                .parameters
                .iter()
                .zip(&call.arguments)
                .map(|(param, arg)| {
                    let arg_type = self.argument_type(contract, enclosing, arg);
                    self.conversion(&arg_type, &param.type_name.text)
                })
                .min()
                .unwrap_or(Match::Exact);
            match quality {
                Match::Exact => exact.push(candidate),
                Match::Implicit => implicit.push(candidate),
                Match::No => {}
            }
        }

        let pick = if exact.is_empty() { implicit } else { exact };
        match pick.len() {
            0 => Err(ResolveError::Unresolved),
            1 => Ok(Some(pick[0])),
            _ => Err(ResolveError::Ambiguous {
                candidates: pick.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }

    fn chain_or_unresolved(
        &self,
        name: &str,
    ) -> std::result::Result<Vec<&ContractDefinition>, ResolveError> {
        self.linearize(name).map_err(|_| ResolveError::Unresolved)
    }

    fn argument_type(
        &self,
        contract: &ContractDefinition,
        function: Option<&FunctionDefinition>,
        arg: &Expression,
    ) -> ArgType {
        match &arg.kind {
            ExpressionKind::Number => ArgType::IntLiteral,
            ExpressionKind::Str => ArgType::StrLiteral,
            ExpressionKind::Bool => ArgType::Bool,
            ExpressionKind::Identifier(name) => self
                .variable_type(contract, function, name)
                .map(|t| ArgType::Typed(t.text.clone()))
                .unwrap_or(ArgType::Unknown),
            ExpressionKind::Other => ArgType::Unknown,
        }
    }

    fn conversion(&self, arg: &ArgType, param: &str) -> Match {
        match arg {
            ArgType::Unknown => Match::Implicit,
            ArgType::Bool => {
                if param == "bool" {
                    Match::Exact
                } else {
                    Match::No
                }
            }
            ArgType::IntLiteral => {
                if integer_width(param).is_some() || fixed_bytes_width(param).is_some() {
                    Match::Implicit
                } else {
                    Match::No
                }
            }
            ArgType::StrLiteral => match param {
                "string" => Match::Exact,
                "bytes" => Match::Implicit,
                p if p.starts_with("bytes") && !p.contains('[') => Match::Implicit,
                _ => Match::No,
            },
            ArgType::Typed(actual) => {
                if actual == param {
                    return Match::Exact;
                }
                if let (Some((signed_a, width_a)), Some((signed_p, width_p))) =
                    (integer_width(actual), integer_width(param))
                {
                    return if signed_a == signed_p && width_a <= width_p {
                        Match::Implicit
                    } else {
                        Match::No
                    };
                }
                if self.contract(actual).is_some() {
                    if param == "address" {
                        return Match::Implicit;
                    }
                    let is_base = self
                        .linearize(actual)
                        .map(|chain| chain.iter().any(|c| c.name == param))
                        .unwrap_or(false);
                    if is_base {
                        return Match::Implicit;
                    }
                }
                Match::No
            }
        }
    }
}

/// Overloads of `name` visible through `chain`; overridden definitions are
/// shadowed by the most-derived one
fn visible_overloads<'a>(chain: &[&'a ContractDefinition], name: &str) -> Vec<FunctionRef<'a>> {
    let mut seen = HashSet::new();
    let mut overloads = Vec::new();
    for contract in chain.iter().rev() {
        let named = contract
            .functions
            .iter()
            .filter(|f| f.kind == FunctionKind::Function && f.name == name);
        for function in named {
            if seen.insert(function.parameter_types()) {
                overloads.push(FunctionRef {
                    contract,
                    function,
                });
            }
        }
    }
    overloads
}

/// Byte count of `bytes1` through `bytes32`
fn fixed_bytes_width(ty: &str) -> Option<u32> {
    let width: u32 = ty.strip_prefix("bytes")?.parse().ok()?;
    (1..=32).contains(&width).then_some(width)
}

/// `(signed, bits)` for integer types
fn integer_width(ty: &str) -> Option<(bool, u32)> {
    let (signed, digits) = if let Some(rest) = ty.strip_prefix("uint") {
        (false, rest)
    } else if let Some(rest) = ty.strip_prefix("int") {
        (true, rest)
    } else {
        return None;
    };
    digits.parse().ok().map(|bits| (signed, bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parser, SolidityParser};

    fn index(source: &str) -> AstIndex {
        let text = SourceText::new(source);
        let unit = SolidityParser::new().parse(text.text()).unwrap();
        AstIndex::build(&text, unit)
    }

    fn chain_names(index: &AstIndex, name: &str) -> Vec<String> {
        index
            .linearize(name)
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    #[test]
    fn test_linearization_diamond() {
        let index = index(
            "contract A {} contract B is A {} contract C is A {} contract D is B, C {}",
        );
        assert_eq!(chain_names(&index, "D"), vec!["A", "B", "C", "D"]);
        assert_eq!(chain_names(&index, "A"), vec!["A"]);
    }

    #[test]
    fn test_linearization_rejects_inconsistent_order() {
        let index = index("contract A {} contract B is A {} contract C is B, A {}");
        assert!(matches!(
            index.linearize("C"),
            Err(PrepassError::Inheritance { .. })
        ));
    }

    #[test]
    fn test_unknown_base_is_inheritance_error() {
        let index = index("contract B is Missing {}");
        assert!(matches!(
            index.linearize("B"),
            Err(PrepassError::Inheritance { .. })
        ));
    }

    #[test]
    fn test_inside_which_function() {
        let source = "contract A { uint x; function f() public { x = 1; } function g() public {} }";
        let index = index(source);
        let inside = source.find("x = 1").unwrap();
        let (contract, function) = index.inside_which_function(inside).unwrap();
        assert_eq!(contract.name, "A");
        assert_eq!(function.name, "f");
        let at_state = source.find("uint x").unwrap();
        assert!(index.inside_which_function(at_state).is_none());
    }

    fn resolve(
        index: &AstIndex,
        contract: &str,
        callee: &str,
    ) -> std::result::Result<Option<String>, ResolveError> {
        let (owner, call) = index
            .call_sites()
            .into_iter()
            .find(|(c, call)| c.name == contract && call.callee == callee)
            .unwrap();
        index
            .resolve_function_call(owner, call)
            .map(|r| r.map(|f| f.to_string()))
    }

    #[test]
    fn test_resolve_prefers_exact_match() {
        let index = index(
            "contract A {
                function f(uint8 a) internal {}
                function f(uint256 a) internal {}
                function g(uint256 v) public { f(v); }
            }",
        );
        assert_eq!(resolve(&index, "A", "f").unwrap(), Some("A.f(uint256)".to_string()));
    }

    #[test]
    fn test_resolve_literal_is_ambiguous_between_integer_overloads() {
        let index = index(
            "contract A {
                function f(uint8 a) internal {}
                function f(uint256 a) internal {}
                function g() public { f(1); }
            }",
        );
        assert!(matches!(
            resolve(&index, "A", "f"),
            Err(ResolveError::Ambiguous { candidates }) if candidates.len() == 2
        ));
    }

    #[test]
    fn test_resolve_filters_by_arity_and_array_type() {
        let index = index(
            "contract A {
                function foo(uint x) public {}
                function foo(uint[] memory x) public {}
                function bar() public { foo(5); }
            }",
        );
        assert_eq!(resolve(&index, "A", "foo").unwrap(), Some("A.foo(uint256)".to_string()));
    }

    #[test]
    fn test_resolve_inherited_and_overridden() {
        let index = index(
            "contract A { function f() public virtual {} }
             contract B is A { function f() public override {} function g() public { f(); } }",
        );
        assert_eq!(resolve(&index, "B", "f").unwrap(), Some("B.f()".to_string()));
    }

    #[test]
    fn test_resolve_super_skips_self() {
        let index = index(
            "contract A { function f() public virtual {} }
             contract B is A { function f() public override { super.f(); } }",
        );
        assert_eq!(resolve(&index, "B", "f").unwrap(), Some("A.f()".to_string()));
    }

    #[test]
    fn test_resolve_through_interface_cast() {
        let index = index(
            "interface IToken { function transfer(address to, uint amount) external; }
             contract Vault { function pay(address t, address to) public { IToken(t).transfer(to, 1); } }",
        );
        assert_eq!(
            resolve(&index, "Vault", "transfer").unwrap(),
            Some("IToken.transfer(address,uint256)".to_string())
        );
    }

    #[test]
    fn test_builtins_and_unknown_receivers_are_skipped() {
        let index = index(
            "contract A { uint[] xs; function f() public { require(true); xs.push(1); } }",
        );
        let (owner, _) = index.call_sites()[0];
        for (_, call) in index.call_sites() {
            assert_eq!(index.resolve_function_call(owner, call).unwrap().map(|f| f.to_string()), None);
        }
    }

    #[test]
    fn test_integer_literal_converts_to_fixed_bytes() {
        let index = index(
            "contract A {
                function f(bytes4 tag) internal {}
                function g() public { f(1); }
            }",
        );
        assert_eq!(resolve(&index, "A", "f").unwrap(), Some("A.f(bytes4)".to_string()));
        assert_eq!(index.conversion(&ArgType::IntLiteral, "bytes32"), Match::Implicit);
        assert_eq!(index.conversion(&ArgType::IntLiteral, "bytes"), Match::No);
        assert_eq!(index.conversion(&ArgType::IntLiteral, "bytes33"), Match::No);
    }

    #[test]
    fn test_unresolved_call() {
        let index = index("contract A { function f() public { nothing(1); } }");
        assert_eq!(resolve(&index, "A", "nothing"), Err(ResolveError::Unresolved));
    }

    #[test]
    fn test_signature_groups_only_external_surface() {
        let index = index(
            "contract A {
                function foo(uint x) public {}
                function foo(uint[] memory x) external {}
                function foo(bool b) internal {}
                function bar() public {}
            }",
        );
        let contract = index.contract("A").unwrap();
        let groups = index.signature_groups(contract).unwrap();
        assert_eq!(groups["foo"].len(), 2);
        assert_eq!(groups["bar"].len(), 1);
    }
}
