// Storage classification: every state variable with its owner, and for
// each one the functions whose bodies read or write it.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::{Pass, PassContext};
use crate::errors::Result;
use crate::index::AstIndex;
use crate::pipeline::PipelineState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageVariable {
    pub contract: String,
    pub name: String,
    pub type_name: String,
    pub constant: bool,
    pub immutable: bool,
}

impl StorageVariable {
    /// `Contract.name`
    pub fn id(&self) -> String {
        format!("{}.{}", self.contract, self.name)
    }

    /// Occupies a storage slot
    pub fn is_stored(&self) -> bool {
        !self.constant && !self.immutable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageAccessMap {
    pub variables: Vec<StorageVariable>,
    /// Variable id to the functions referencing it, as `Contract.name(types)`
    pub accesses: BTreeMap<String, BTreeSet<String>>,
}

impl StorageAccessMap {
    pub fn functions_touching(&self, id: &str) -> impl Iterator<Item = &str> {
        self.accesses
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }
}

pub struct StorageClassifier;

impl Pass for StorageClassifier {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn description(&self) -> &'static str {
        "Maps state variables to the functions that reference them"
    }

    fn run(&self, state: &mut PipelineState, _ctx: &PassContext<'_>) -> Result<()> {
        let map = classify(state.index()?);
        debug!(
            variables = map.variables.len(),
            referenced = map.accesses.len(),
            "classified storage"
        );
        state.metadata.storage = map;
        Ok(())
    }
}

fn classify(index: &AstIndex) -> StorageAccessMap {
    let mut map = StorageAccessMap::default();

    for contract in index.contracts() {
        for variable in &contract.variables {
            let Some(name) = &variable.name else {
                continue;
            };
            map.variables.push(StorageVariable {
                contract: contract.name.clone(),
                name: name.clone(),
                type_name: variable.type_name.text.clone(),
                constant: variable.is_constant,
                immutable: variable.is_immutable,
            });
        }
    }

    for contract in index.contracts() {
        for function in &contract.functions {
            let Some(body) = &function.body else {
                continue;
            };
            let rendered = format!("{}.{}", contract.name, function.signature());
            for ident in &body.identifiers {
                // Parameters and locals shadow state variables
                if function.declaration(&ident.name).is_some() {
                    continue;
                }
                if let Some((owner, _)) = index.state_variable(contract, &ident.name) {
                    map.accesses
                        .entry(format!("{}.{}", owner.name, ident.name))
                        .or_default()
                        .insert(rendered.clone());
                }
            }
        }
    }
    map
}
