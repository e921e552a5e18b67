/*!
# Constructor Flattening

The backend accepts a single constructor per deployed contract. For the
main contract, every explicit base constructor in its linearization is
turned into an internal initializer function, base arguments given in
`is B(...)` lists or as `B(...)` constructor modifiers are removed, and the
main contract's constructor calls the initializers base-to-derived with the
bound arguments before running its own body.

Base constructor parameters that no contract in the chain binds are exposed
as parameters of the merged constructor.

Other concrete contracts that inherit one of the converted bases get the
same treatment for those bases: their constructor is rewritten (or added)
to call the initializers, unless a concrete base of theirs already does.
*/

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Pass, PassContext};
use crate::ast::{ContractDefinition, Expression, FunctionDefinition, Span, VariableDeclaration};
use crate::errors::{PrepassError, Result};
use crate::index::AstIndex;
use crate::pipeline::PipelineState;

/// Prefix of the internal functions base constructors are turned into
pub const INITIALIZER_PREFIX: &str = "__constructor_";

/// Flattening outcome for one concrete contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstructorReport {
    pub contract: String,
    /// Linearized chain, base-to-derived
    pub chain: Vec<String>,
    /// Some base constructor takes arguments, so a merged constructor is needed
    pub synthesized: bool,
    /// Parameter declarations of the merged constructor
    pub parameters: Vec<String>,
    /// Initializer calls, in run order
    pub initializers: Vec<String>,
    /// The source was rewritten for this contract
    pub applied: bool,
}

pub struct ConstructorFlattener;

impl Pass for ConstructorFlattener {
    fn name(&self) -> &'static str {
        "constructor"
    }

    fn description(&self) -> &'static str {
        "Merges the constructors along the main contract's inheritance chain"
    }

    fn run(&self, state: &mut PipelineState, ctx: &PassContext<'_>) -> Result<()> {
        let (edits, reports) = flatten(state.index()?, &ctx.config.main_contract)?;
        for (span, replacement) in edits {
            state.patcher.stage_span(span, replacement)?;
        }
        state.metadata.constructors = reports;
        Ok(())
    }
}

/// Edits for the whole unit plus one report per concrete contract, main first
fn flatten(index: &AstIndex, main: &str) -> Result<(Vec<(Span, String)>, Vec<ConstructorReport>)> {
    let main = index.require_contract(main)?;
    let mut main_plan = plan(index, main, &|_| true)?;

    if !main_plan.report.synthesized {
        debug!(contract = %main.name, "no constructor flattening required");
        let mut reports = vec![main_plan.report];
        for contract in index.contracts().filter(|c| c.is_concrete() && c.name != main.name) {
            match plan(index, contract, &|_| true) {
                Ok(plan) => reports.push(plan.report),
                Err(err) => warn!(contract = %contract.name, error = %err, "constructor plan failed"),
            }
        }
        return Ok((Vec::new(), reports));
    }

    let main_chain: HashSet<&str> = main_plan.chain.iter().map(|c| c.name.as_str()).collect();
    let converted: HashSet<&str> = main_plan.chain[..main_plan.chain.len() - 1]
        .iter()
        .filter(|b| b.constructor().is_some())
        .map(|b| b.name.as_str())
        .collect();

    // Concrete contracts outside the main chain that inherit a converted
    // base lose that constructor too and need their own initializer calls
    let mut affected: IndexMap<&str, Vec<&ContractDefinition>> = IndexMap::new();
    for contract in index.contracts().filter(|c| c.is_concrete() && !main_chain.contains(c.name.as_str())) {
        // Failures are reported when the contract is planned below
        let Ok(chain) = index.linearize(&contract.name) else {
            continue;
        };
        let bases = &chain[..chain.len() - 1];
        if bases.iter().any(|b| converted.contains(b.name.as_str())) {
            affected.insert(contract.name.as_str(), chain);
        }
    }

    let mut plans = Vec::new();
    let mut reports = Vec::new();
    for contract in index.contracts().filter(|c| c.is_concrete() && c.name != main.name) {
        let Some(chain) = affected.get(contract.name.as_str()) else {
            match plan(index, contract, &|_| true) {
                Ok(plan) => reports.push(plan.report),
                Err(err) => warn!(contract = %contract.name, error = %err, "constructor plan failed"),
            }
            continue;
        };
        // Converted bases already initialized by an affected base's constructor
        let covered: HashSet<&str> = chain[..chain.len() - 1]
            .iter()
            .filter_map(|b| affected.get(b.name.as_str()))
            .flatten()
            .map(|c| c.name.as_str())
            .filter(|name| converted.contains(name))
            .collect();
        let initialize = |base: &ContractDefinition| {
            converted.contains(base.name.as_str()) && !covered.contains(base.name.as_str())
        };
        let mut plan = plan(index, contract, &initialize)?;
        plan.report.applied = !plan.report.initializers.is_empty();
        plans.push(plan);
    }

    let rewritten: HashSet<&str> = std::iter::once(&main_plan)
        .chain(plans.iter().filter(|p| p.report.applied))
        .filter(|p| p.contract.constructor().is_some())
        .map(|p| p.contract.name.as_str())
        .collect();

    let mut edits = conversion_edits(index, &main_plan.chain, &converted, &rewritten)?;
    edits.extend(main_plan.constructor_edits(index, &converted)?);
    main_plan.report.applied = true;
    info!(
        contract = %main.name,
        initializers = main_plan.report.initializers.len(),
        parameters = main_plan.report.parameters.len(),
        "synthesized constructor"
    );

    for plan in plans {
        if plan.report.applied {
            edits.extend(plan.constructor_edits(index, &converted)?);
            info!(
                contract = %plan.contract.name,
                initializers = plan.report.initializers.len(),
                "synthesized constructor for contract inheriting a converted base"
            );
        }
        reports.push(plan.report);
    }

    // Keep source order among the other contracts
    let order: Vec<&str> = index.contracts().map(|c| c.name.as_str()).collect();
    reports.sort_by_key(|r| order.iter().position(|name| *name == r.contract));
    reports.insert(0, main_plan.report);
    Ok((edits, reports))
}

/// Arguments a contract in the chain passes to one of its bases
struct Binding<'a> {
    supplier: &'a ContractDefinition,
    arguments: &'a [Expression],
    /// Given as a constructor modifier, so it may use the supplier's parameters
    in_constructor: bool,
}

struct Plan<'a> {
    contract: &'a ContractDefinition,
    chain: Vec<&'a ContractDefinition>,
    report: ConstructorReport,
}

/// Plans `contract`'s merged constructor. Only bases accepted by
/// `initialize` get initializer calls and exposed parameters.
fn plan<'a>(
    index: &'a AstIndex,
    contract: &'a ContractDefinition,
    initialize: &dyn Fn(&ContractDefinition) -> bool,
) -> Result<Plan<'a>> {
    let text = index.text();
    let chain = index.linearize(&contract.name)?;
    let bases = &chain[..chain.len() - 1];
    let synthesized = bases
        .iter()
        .any(|b| b.constructor().is_some_and(|c| !c.parameters.is_empty()));

    let bindings = collect_bindings(contract, &chain)?;

    // Parameters nobody binds become parameters of the merged constructor
    let own_params = contract
        .constructor()
        .map(|c| c.parameters.as_slice())
        .unwrap_or_default();
    let mut taken: HashSet<String> = own_params.iter().filter_map(|p| p.name.clone()).collect();
    let mut parameters = Vec::new();
    let mut exposed: HashMap<&str, Vec<String>> = HashMap::new();
    for &base in bases {
        let Some(ctor) = base.constructor() else {
            continue;
        };
        if !initialize(base) || bindings.contains_key(base.name.as_str()) {
            continue;
        }
        let mut names = Vec::new();
        for param in &ctor.parameters {
            let mut name = match &param.name {
                Some(name) if !taken.contains(name) => name.clone(),
                Some(name) => format!("{}_{}", name, base.name),
                None => format!("arg{}", parameters.len()),
            };
            while taken.contains(&name) {
                name.push('_');
            }
            taken.insert(name.clone());
            parameters.push(declaration(text, param, &name));
            names.push(name);
        }
        exposed.insert(base.name.as_str(), names);
    }
    parameters.extend(own_params.iter().map(|p| p.span.slice(text).to_string()));

    // Walk derived to base so every supplier's environment exists before
    // the arguments it passes are rendered
    let mut environments: HashMap<&str, HashMap<String, String>> = HashMap::new();
    let mut arguments: HashMap<&str, Vec<String>> = HashMap::new();
    for &current in chain.iter().rev() {
        let params = current
            .constructor()
            .map(|c| c.parameters.as_slice())
            .unwrap_or_default();
        let values: Vec<String> = if current.name == contract.name {
            Vec::new()
        } else if let Some(binding) = bindings.get(current.name.as_str()) {
            let empty = HashMap::new();
            let env = if binding.in_constructor {
                environments.get(binding.supplier.name.as_str()).unwrap_or(&empty)
            } else {
                &empty
            };
            binding
                .arguments
                .iter()
                .map(|arg| arg.render(text, &|ident| env.get(ident).cloned()))
                .collect()
        } else {
            exposed.get(current.name.as_str()).cloned().unwrap_or_default()
        };

        let env = params
            .iter()
            .zip(&values)
            .filter_map(|(param, value)| {
                let name = param.name.clone()?;
                Some((name, parenthesize(value)))
            })
            .collect();
        environments.insert(current.name.as_str(), env);
        arguments.insert(current.name.as_str(), values);
    }

    let initializers = bases
        .iter()
        .filter(|b| b.constructor().is_some() && initialize(b))
        .map(|b| {
            let args = arguments.get(b.name.as_str()).cloned().unwrap_or_default();
            format!("{}{}({})", INITIALIZER_PREFIX, b.name, args.join(", "))
        })
        .collect();

    Ok(Plan {
        contract,
        report: ConstructorReport {
            contract: contract.name.clone(),
            chain: chain.iter().map(|c| c.name.clone()).collect(),
            synthesized,
            parameters,
            initializers,
            applied: false,
        },
        chain,
    })
}

/// Collects the argument lists given to each base along the chain
fn collect_bindings<'a>(
    contract: &ContractDefinition,
    chain: &[&'a ContractDefinition],
) -> Result<HashMap<&'a str, Binding<'a>>> {
    let mut bindings: HashMap<&str, Binding<'_>> = HashMap::new();
    for &supplier in chain {
        let constructor_sites = supplier
            .constructor()
            .into_iter()
            .flat_map(|c| c.modifiers.iter())
            .map(|m| (m, true));
        let inheritance_sites = supplier.bases.iter().map(|b| (b, false));

        for (site, in_constructor) in inheritance_sites.chain(constructor_sites) {
            let Some(arguments) = &site.arguments else {
                continue;
            };
            let Some(&base) = chain.iter().find(|c| c.name == simple_name(&site.name)) else {
                continue;
            };

            let expected = base.constructor().map(|c| c.parameters.as_slice()).unwrap_or_default();
            if arguments.len() < expected.len() {
                let missing = &expected[arguments.len()];
                return Err(PrepassError::MissingConstructorArgs {
                    contract: contract.name.clone(),
                    base: base.name.clone(),
                    parameter: missing
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("#{}", arguments.len())),
                });
            }
            if arguments.len() > expected.len() {
                return Err(PrepassError::Inheritance {
                    contract: supplier.name.clone(),
                    message: format!(
                        "base '{}' takes {} constructor arguments, {} given",
                        base.name,
                        expected.len(),
                        arguments.len()
                    ),
                });
            }

            let binding = Binding {
                supplier,
                arguments,
                in_constructor,
            };
            if bindings.insert(base.name.as_str(), binding).is_some() {
                return Err(PrepassError::Inheritance {
                    contract: contract.name.clone(),
                    message: format!("arguments for base '{}' given more than once", base.name),
                });
            }
        }
    }
    Ok(bindings)
}

/// Turns the converted base constructors into initializers and removes the
/// argument lists given to them anywhere in the unit
fn conversion_edits(
    index: &AstIndex,
    chain: &[&ContractDefinition],
    converted: &HashSet<&str>,
    rewritten: &HashSet<&str>,
) -> Result<Vec<(Span, String)>> {
    let text = index.text();
    let is_base_call = |name: &str| index.contract(name).is_some();
    let mut edits = Vec::new();

    for base in &chain[..chain.len() - 1] {
        let Some(ctor) = base.constructor() else {
            continue;
        };
        let body = body_span(base, ctor)?;
        let mut header = format!(
            "function {}{}{} internal",
            INITIALIZER_PREFIX,
            base.name,
            ctor.params_span.slice(text)
        );
        for modifier in ctor.modifiers.iter().filter(|m| !is_base_call(&m.name)) {
            header.push(' ');
            header.push_str(modifier.span.slice(text));
        }
        header.push(' ');
        edits.push((Span::new(ctor.span.start, body.start), header));
    }

    for contract in index.contracts() {
        for specifier in &contract.bases {
            if !converted.contains(simple_name(&specifier.name)) {
                continue;
            }
            if let Some(args) = specifier.args_span {
                edits.push((args, String::new()));
            }
        }
        // Rewritten headers drop these invocations themselves
        let name = contract.name.as_str();
        if converted.contains(name) || rewritten.contains(name) {
            continue;
        }
        if let Some(ctor) = contract.constructor() {
            for modifier in &ctor.modifiers {
                if converted.contains(simple_name(&modifier.name)) {
                    edits.push((modifier.span, String::new()));
                }
            }
        }
    }
    Ok(edits)
}

impl<'a> Plan<'a> {
    /// Rewrites or inserts the contract's constructor so it runs the initializers
    fn constructor_edits(
        &self,
        index: &'a AstIndex,
        converted: &HashSet<&str>,
    ) -> Result<Vec<(Span, String)>> {
        let text = index.text();
        // Invocations of bases that still have a constructor stay in the header
        let dropped = |name: &str| {
            let name = simple_name(name);
            converted.contains(name) || index.contract(name).is_some_and(|c| c.constructor().is_none())
        };

        let calls: String = self
            .report
            .initializers
            .iter()
            .map(|call| format!("\n        {call};"))
            .collect();
        let parameters = self.report.parameters.join(", ");

        let mut edits = Vec::new();
        match self.contract.constructor() {
            Some(ctor) => {
                let body = body_span(self.contract, ctor)?;
                let mut header = format!("constructor({parameters})");
                for attribute in &ctor.attributes {
                    header.push(' ');
                    header.push_str(&attribute.text);
                }
                for modifier in ctor.modifiers.iter().filter(|m| !dropped(&m.name)) {
                    header.push(' ');
                    header.push_str(modifier.span.slice(text));
                }
                header.push(' ');
                edits.push((Span::new(ctor.span.start, body.start), header));
                edits.push((Span::point(body.start + 1), calls));
            }
            None => {
                let constructor = format!("\n    constructor({parameters}) {{{calls}\n    }}\n");
                edits.push((Span::point(self.contract.body_span.start + 1), constructor));
            }
        }
        Ok(edits)
    }
}

fn body_span(contract: &ContractDefinition, ctor: &FunctionDefinition) -> Result<Span> {
    ctor.body.as_ref().map(|b| b.span).ok_or_else(|| {
        PrepassError::Invariant(format!("constructor of '{}' has no body", contract.name))
    })
}

/// `Lib.Base` names `Base`
fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Declaration of an exposed parameter under its merged name
fn declaration(text: &str, param: &VariableDeclaration, name: &str) -> String {
    let mut out = param.type_name.span.slice(text).to_string();
    if let Some(location) = &param.location {
        out.push(' ');
        out.push_str(location);
    }
    out.push(' ');
    out.push_str(name);
    out
}

/// Wraps compound expressions before they replace an identifier
fn parenthesize(value: &str) -> String {
    let atomic = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    let quoted = value.len() >= 2
        && (value.starts_with('"') || value.starts_with('\''))
        && !value[1..value.len() - 1].contains(&['"', '\''][..]);
    if atomic || quoted {
        value.to_string()
    } else {
        format!("({value})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parser, SolidityParser};
    use crate::source::{SourceText, TextPatcher};
    use pretty_assertions::assert_eq;

    fn index(source: &str) -> AstIndex {
        let text = SourceText::new(source);
        let unit = SolidityParser::new().parse(text.text()).unwrap();
        AstIndex::build(&text, unit)
    }

    /// Reports (main first) and the rewritten source, which must still parse
    fn rewrite(source: &str, main: &str) -> (Vec<ConstructorReport>, String) {
        let index = index(source);
        let (edits, reports) = flatten(&index, main).unwrap();
        let mut patcher = TextPatcher::new();
        for (span, replacement) in edits {
            patcher.stage_span(span, replacement).unwrap();
        }
        let text = patcher.commit(&SourceText::new(source)).unwrap();
        SolidityParser::new().parse(text.text()).unwrap();
        (reports, text.text().to_string())
    }

    fn rewrite_main(source: &str, main: &str) -> (ConstructorReport, String) {
        let (mut reports, text) = rewrite(source, main);
        (reports.remove(0), text)
    }

    #[test]
    fn test_inheritance_site_argument_is_bound() {
        let (report, text) = rewrite_main(
            "contract A { constructor(uint x) {} } contract B is A(5) { }",
            "B",
        );
        assert!(report.synthesized);
        assert!(report.parameters.is_empty());
        assert_eq!(report.initializers, vec!["__constructor_A(5)"]);
        assert_eq!(
            text,
            "contract A { function __constructor_A(uint x) internal {} } contract B is A {\n    constructor() {\n        __constructor_A(5);\n    }\n }"
        );
    }

    #[test]
    fn test_constructor_modifier_arguments_are_substituted_through_the_chain() {
        let (report, text) = rewrite_main(
            "contract A { uint a; constructor(uint x) { a = x; } }
             contract B is A { constructor(uint y) A(y * 2) {} }
             contract C is B { constructor(uint z) payable B(z + 1) { } }",
            "C",
        );
        assert_eq!(report.chain, vec!["A", "B", "C"]);
        assert_eq!(report.parameters, vec!["uint z"]);
        assert_eq!(
            report.initializers,
            vec!["__constructor_A((z + 1) * 2)", "__constructor_B(z + 1)"]
        );
        assert!(text.contains("function __constructor_A(uint x) internal { a = x; }"));
        assert!(text.contains("function __constructor_B(uint y) internal {}"));
        assert!(text.contains(
            "constructor(uint z) payable {\n        __constructor_A((z + 1) * 2);\n        __constructor_B(z + 1); }"
        ));
    }

    #[test]
    fn test_unbound_parameters_are_exposed_with_collision_suffix() {
        let (report, _) = rewrite_main(
            "contract A { constructor(uint x) {} }
             contract B { constructor(string memory x, address) {} }
             abstract contract M is A, B {}
             contract C is M { constructor(uint x) {} }",
            "C",
        );
        assert_eq!(
            report.parameters,
            vec!["uint x_A", "string memory x_B", "address arg2", "uint x"]
        );
        assert_eq!(
            report.initializers,
            vec!["__constructor_A(x_A)", "__constructor_B(x_B, arg2)"]
        );
    }

    #[test]
    fn test_zero_argument_bases_need_no_synthesis() {
        let index = index("contract A { constructor() {} } contract B is A {}");
        let report = plan(&index, index.contract("B").unwrap(), &|_| true).unwrap().report;
        assert!(!report.synthesized);
        assert_eq!(report.initializers, vec!["__constructor_A()"]);
    }

    #[test]
    fn test_too_few_arguments_names_parameter() {
        let index = index(
            "contract A { constructor(uint x, uint y) {} } contract B is A(1) {}",
        );
        let err = plan(&index, index.contract("B").unwrap(), &|_| true).err().unwrap();
        assert!(matches!(
            err,
            PrepassError::MissingConstructorArgs { contract, base, parameter }
                if contract == "B" && base == "A" && parameter == "y"
        ));
    }

    #[test]
    fn test_too_many_arguments_is_inheritance_error() {
        let index = index("contract A { constructor(uint x) {} } contract B is A(1, 2) {}");
        let err = plan(&index, index.contract("B").unwrap(), &|_| true).err().unwrap();
        assert!(matches!(err, PrepassError::Inheritance { .. }));
    }

    #[test]
    fn test_other_contracts_call_initializers_of_converted_bases() {
        let (reports, text) = rewrite(
            "contract A{uint a; constructor(uint x){a=x;}} contract B is A(1){} contract D is A{constructor() A(2){}}",
            "B",
        );
        assert_eq!(
            text,
            "contract A{uint a; function __constructor_A(uint x) internal {a=x;}} contract B is A{\n    constructor() {\n        __constructor_A(1);\n    }\n} contract D is A{constructor() {\n        __constructor_A(2);}}"
        );
        let names: Vec<_> = reports.iter().map(|r| r.contract.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "D"]);
        assert!(!reports[1].applied);
        assert!(reports[2].applied);
        assert_eq!(reports[2].initializers, vec!["__constructor_A(2)"]);
    }

    #[test]
    fn test_concrete_base_covers_converted_initializer() {
        let (reports, text) = rewrite(
            "contract A { constructor(uint x) {} }
             contract B is A(1) {}
             contract C is A(2) {}
             contract D is C {}",
            "B",
        );
        assert!(text.contains("contract C is A {\n    constructor() {\n        __constructor_A(2);\n    }\n}"));
        assert!(text.contains("contract D is C {}"));

        let d = reports.iter().find(|r| r.contract == "D").unwrap();
        assert!(!d.applied);
        assert!(d.initializers.is_empty());
        let names: Vec<_> = reports.iter().map(|r| r.contract.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_unrelated_contracts_are_left_alone() {
        let source = "contract A { constructor(uint x) {} }
             contract B is A(1) {}
             contract E { constructor(uint y) {} }
             contract F is E(3) {}";
        let (reports, text) = rewrite(source, "B");
        assert!(text.contains("contract F is E(3) {}"));
        assert!(text.contains("contract E { constructor(uint y) {} }"));
        let f = reports.iter().find(|r| r.contract == "F").unwrap();
        assert!(f.synthesized);
        assert!(!f.applied);
    }

    #[test]
    fn test_parenthesize() {
        assert_eq!(parenthesize("x"), "x");
        assert_eq!(parenthesize("42"), "42");
        assert_eq!(parenthesize("\"a b\""), "\"a b\"");
        assert_eq!(parenthesize("a + b"), "(a + b)");
        assert_eq!(parenthesize("f(1)"), "(f(1))");
    }
}
