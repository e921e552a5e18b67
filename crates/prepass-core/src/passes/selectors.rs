/*!
# Selector Disambiguation

The backend erases the size of dynamically-sized parameters, so `foo(uint)`
and `foo(uint[])` end up with one selector. For every contract, public and
external overloads whose canonical selectors coincide are split: one
member keeps its name, every other member is renamed with a suffix derived
from its concrete parameter types. Overriding definitions along the chain
share the rename of the definition they override, so a new name is chosen
clear of every function visible in the contracts that inherit it.
*/

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use tiny_keccak::{Hasher, Keccak};
use tracing::{debug, info};

use super::{Pass, PassContext};
use crate::ast::{base_type, ContractDefinition, Span};
use crate::errors::{PrepassError, Result};
use crate::index::{AstIndex, FunctionKey, FunctionRef, SignatureFamily};
use crate::pipeline::PipelineState;

/// One member of a colliding overload set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkedFunction {
    pub contract: String,
    pub original_name: String,
    pub new_name: Option<String>,
    pub original_selector: String,
    pub selector: String,
    pub parameter_types: Vec<String>,
    pub canonical_types: Vec<String>,
}

/// Rename decisions handed to the call rewriter and the backend
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarkedFunctions {
    pub entries: Vec<MarkedFunction>,
    #[serde(skip)]
    renames: BTreeMap<FunctionKey, String>,
}

impl MarkedFunctions {
    /// New name of a definition, if it was renamed
    pub fn rename_for(&self, key: &FunctionKey) -> Option<&str> {
        self.renames.get(key).map(String::as_str)
    }

    pub fn renames(&self) -> impl Iterator<Item = (&FunctionKey, &str)> {
        self.renames.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Size-erased form of a normalized type
pub fn canonical_type(ty: &str) -> String {
    if let Some(element) = ty.strip_suffix("[]") {
        return canonical_type(element);
    }
    if ty.ends_with(']') {
        if let Some(open) = ty.rfind('[') {
            return format!("{}{}", canonical_type(&ty[..open]), &ty[open..]);
        }
    }
    match ty {
        "string" | "bytes" => "bytes".to_string(),
        other => other.to_string(),
    }
}

/// First four bytes of Keccak-256 over `name(type1,type2,...)`, as `0x%08x`
pub fn selector(name: &str, types: &[String]) -> String {
    let signature = format!("{}({})", name, types.join(","));
    let mut hasher = Keccak::v256();
    hasher.update(signature.as_bytes());
    let mut digest = [0u8; 32];
    hasher.finalize(&mut digest);
    let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    format!("0x{value:08x}")
}

fn is_dynamic(ty: &str) -> bool {
    ty.contains("[]") || matches!(base_type(ty), "string" | "bytes")
}

/// `foo` with `(uint256[], bytes32[2])` becomes `foo_uint256_dyn_bytes32_2`
fn renamed(name: &str, types: &[String]) -> String {
    let mut out = name.to_string();
    for ty in types {
        out.push('_');
        let mut chars = ty.chars();
        while let Some(c) = chars.next() {
            match c {
                '[' => {
                    let size: String = chars.by_ref().take_while(|&c| c != ']').collect();
                    if size.is_empty() {
                        out.push_str("_dyn");
                    } else {
                        out.push('_');
                        out.extend(size.chars().map(sanitize));
                    }
                }
                c => out.push(sanitize(c)),
            }
        }
    }
    out
}

fn sanitize(c: char) -> char {
    if c.is_ascii_alphanumeric() || c == '_' {
        c
    } else {
        '_'
    }
}

/// Member of one overload group with its derived forms
struct Member<'a> {
    family: &'a SignatureFamily<'a>,
    canonical: Vec<String>,
    original_selector: String,
}

pub struct SelectorResolver;

impl Pass for SelectorResolver {
    fn name(&self) -> &'static str {
        "selectors"
    }

    fn description(&self) -> &'static str {
        "Renames public overloads whose size-erased selectors collide"
    }

    fn run(&self, state: &mut PipelineState, _ctx: &PassContext<'_>) -> Result<()> {
        let index = state.index()?;
        let resolution = resolve(index)?;

        let mut edits = Vec::with_capacity(resolution.spans.len());
        for (key, span) in &resolution.spans {
            let name = resolution.marked.rename_for(key).ok_or_else(|| {
                PrepassError::Invariant(format!("no rename recorded for {key}"))
            })?;
            edits.push((*span, name.to_string()));
        }
        info!(
            marked = resolution.marked.entries.len(),
            renamed = edits.len(),
            "resolved selector collisions"
        );

        for (span, name) in edits {
            state.patcher.stage_span(span, name)?;
        }
        state.metadata.marked_functions = resolution.marked;
        Ok(())
    }
}

struct Resolution {
    marked: MarkedFunctions,
    /// Name span of every renamed definition
    spans: BTreeMap<FunctionKey, Span>,
}

fn resolve(index: &AstIndex) -> Result<Resolution> {
    let mut contracts: Vec<(usize, &ContractDefinition)> = Vec::new();
    for contract in index.contracts() {
        contracts.push((index.linearize(&contract.name)?.len(), contract));
    }
    // Bases first, so overrides inherit their base's decision
    contracts.sort_by_key(|(depth, _)| *depth);

    let mut resolution = Resolution {
        marked: MarkedFunctions::default(),
        spans: BTreeMap::new(),
    };
    for (_, contract) in contracts {
        resolve_contract(index, contract, &mut resolution)?;
    }
    Ok(resolution)
}

fn resolve_contract(
    index: &AstIndex,
    contract: &ContractDefinition,
    resolution: &mut Resolution,
) -> Result<()> {
    let groups = index.signature_groups(contract)?;
    let abi_types = |types: &[String]| -> Vec<String> {
        types
            .iter()
            .map(|ty| {
                // Contract types travel as addresses
                let base = base_type(ty);
                let ty = if index.contract(base).is_some() {
                    format!("address{}", &ty[base.len()..])
                } else {
                    ty.clone()
                };
                canonical_type(&ty)
            })
            .collect()
    };
    // Derived contracts inherit the renames, so their names are taken too
    let mut used_names: HashSet<String> = resolution.marked.renames.values().cloned().collect();
    for other in index.contracts() {
        let chain = index.linearize(&other.name)?;
        if chain.iter().any(|c| c.name == contract.name) {
            used_names.extend(chain.iter().flat_map(|c| c.functions.iter().map(|f| f.name.clone())));
        }
    }
    let mut used_selectors: HashSet<String> = groups
        .values()
        .flatten()
        .map(|family| {
            let name = inherited_name(resolution, family).unwrap_or_else(|| family.name.clone());
            selector(&name, &abi_types(&family.parameter_types))
        })
        .collect();

    for (name, families) in &groups {
        if families.len() < 2 {
            continue;
        }
        let mut by_selector: IndexMap<String, Vec<Member<'_>>> = IndexMap::new();
        for family in families {
            let canonical = abi_types(&family.parameter_types);
            let original_selector = selector(name, &canonical);
            by_selector
                .entry(original_selector.clone())
                .or_default()
                .push(Member {
                    family,
                    canonical,
                    original_selector,
                });
        }

        for members in by_selector.values().filter(|m| m.len() >= 2) {
            // Overrides of an already renamed definition take over its name
            let mut pending = Vec::new();
            for (i, member) in members.iter().enumerate() {
                match inherited_name(resolution, member.family) {
                    Some(name) => {
                        for definition in &member.family.definitions {
                            record_rename(resolution, definition.key(), definition, &name)?;
                        }
                    }
                    None => pending.push(i),
                }
            }
            // Prefer a member without dynamic parameters, then the earliest
            let keeper = pending.iter().copied().min_by_key(|&i| {
                let dynamic = members[i].family.parameter_types.iter().any(|t| is_dynamic(t));
                (dynamic, i)
            });

            for &i in &pending {
                if Some(i) == keeper {
                    continue;
                }
                let member = &members[i];
                let base_name = renamed(name, &member.family.parameter_types);
                let mut candidate = base_name.clone();
                let mut counter = 1;
                while used_names.contains(&candidate)
                    || used_selectors.contains(&selector(&candidate, &member.canonical))
                {
                    counter += 1;
                    candidate = format!("{base_name}_{counter}");
                }
                used_names.insert(candidate.clone());
                used_selectors.insert(selector(&candidate, &member.canonical));
                debug!(
                    contract = %contract.name,
                    from = %member.family.effective(),
                    to = %candidate,
                    "renaming colliding overload"
                );

                for definition in &member.family.definitions {
                    record_rename(resolution, definition.key(), definition, &candidate)?;
                }
            }

            for member in members {
                let new_name = resolution
                    .marked
                    .rename_for(&member.family.effective().key())
                    .map(str::to_string);
                let final_name = new_name.as_deref().unwrap_or(name);
                resolution.marked.entries.push(MarkedFunction {
                    contract: contract.name.clone(),
                    original_name: name.clone(),
                    selector: selector(final_name, &member.canonical),
                    new_name,
                    original_selector: member.original_selector.clone(),
                    parameter_types: member.family.parameter_types.clone(),
                    canonical_types: member.canonical.clone(),
                });
            }
        }
    }
    Ok(())
}

/// New name already given to some definition of `family`
fn inherited_name(resolution: &Resolution, family: &SignatureFamily<'_>) -> Option<String> {
    family
        .definitions
        .iter()
        .find_map(|d| resolution.marked.rename_for(&d.key()))
        .map(str::to_string)
}

fn record_rename(
    resolution: &mut Resolution,
    key: FunctionKey,
    definition: &FunctionRef<'_>,
    name: &str,
) -> Result<()> {
    let span = definition
        .function
        .name_span
        .ok_or_else(|| PrepassError::Invariant(format!("function {key} has no name span")))?;
    resolution.spans.insert(key.clone(), span);
    resolution.marked.renames.insert(key, name.to_string());
    Ok(())
}
