// Address type analysis: records which functions declare values of type
// `address` or of a contract type, which the backend lowers to addresses.

use serde::Serialize;
use tracing::debug;

use super::{Pass, PassContext};
use crate::ast::{base_type, VariableDeclaration};
use crate::errors::Result;
use crate::index::AstIndex;
use crate::pipeline::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationRole {
    Parameter,
    Return,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressDeclaration {
    pub name: Option<String>,
    pub type_name: String,
    pub role: DeclarationRole,
    /// Declared with a contract or interface type rather than `address`
    pub contract_address: bool,
}

/// One function that handles address-typed values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressUsage {
    pub contract: String,
    pub function: String,
    pub declarations: Vec<AddressDeclaration>,
}

pub struct AddressTypeAnalyzer;

impl Pass for AddressTypeAnalyzer {
    fn name(&self) -> &'static str {
        "address_types"
    }

    fn description(&self) -> &'static str {
        "Marks functions whose parameters, returns or locals are addresses"
    }

    fn run(&self, state: &mut PipelineState, _ctx: &PassContext<'_>) -> Result<()> {
        let usages = analyze(state.index()?);
        debug!(functions = usages.len(), "address-typed functions");
        state.metadata.address_functions = usages;
        Ok(())
    }
}

fn analyze(index: &AstIndex) -> Vec<AddressUsage> {
    let mut usages = Vec::new();
    for contract in index.contracts() {
        for function in &contract.functions {
            let locals = function.body.iter().flat_map(|b| b.locals.iter());
            let roles = function
                .parameters
                .iter()
                .map(|d| (d, DeclarationRole::Parameter))
                .chain(function.returns.iter().map(|d| (d, DeclarationRole::Return)))
                .chain(locals.map(|d| (d, DeclarationRole::Local)));

            let declarations: Vec<_> = roles
                .filter_map(|(decl, role)| classify(index, decl, role))
                .collect();
            if !declarations.is_empty() {
                usages.push(AddressUsage {
                    contract: contract.name.clone(),
                    function: function.signature(),
                    declarations,
                });
            }
        }
    }
    usages
}

fn classify(
    index: &AstIndex,
    decl: &VariableDeclaration,
    role: DeclarationRole,
) -> Option<AddressDeclaration> {
    let base = base_type(&decl.type_name.text);
    let contract_address = index.contract(base).is_some();
    if base != "address" && !contract_address {
        return None;
    }
    Some(AddressDeclaration {
        name: decl.name.clone(),
        type_name: decl.type_name.text.clone(),
        role,
        contract_address,
    })
}
