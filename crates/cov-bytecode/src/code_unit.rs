//! Code units: the tree of function/module/comprehension bodies the
//! analyzer discovers and analyzes independently.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::instruction::RawInstruction;

/// A constant embedded in a code unit: either a nested code object
/// (closures, comprehensions, nested `def`s) or an opaque value the
/// analyzer never needs to look inside.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeConstant {
    Code(CodeUnit),
    Other,
}

/// A compiled function/module/comprehension body: a name, its source file,
/// its linear instruction stream, and any nested code units it embeds as
/// constants.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    pub name: String,
    pub filename: PathBuf,
    pub instructions: Vec<RawInstruction>,
    pub consts: Vec<CodeConstant>,
}

impl CodeUnit {
    pub fn new(name: impl Into<String>, filename: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            instructions: Vec::new(),
            consts: Vec::new(),
        }
    }

    /// Code units nested directly as constants (not transitive).
    pub fn sub_units(&self) -> impl Iterator<Item = &CodeUnit> {
        self.consts.iter().filter_map(|c| match c {
            CodeConstant::Code(unit) => Some(unit),
            CodeConstant::Other => None,
        })
    }
}

/// Stable identifier assigned to a code unit during discovery. Rust code
/// units are plain owned values (no `id(code)` analogue), so analysis keys
/// maps by this interned id rather than by address or equality.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodeUnitId(pub u32);

/// The transitive closure of code units reachable from a root, each given a
/// stable [`CodeUnitId`]. Eagerly materializes owned copies since
/// `CodeUnit` has no interior sharing, unlike a worklist over borrowed
/// nodes.
#[derive(Debug, Clone, Default)]
pub struct CodeUnitRegistry {
    units: Vec<CodeUnit>,
}

impl CodeUnitRegistry {
    /// Discover every code unit reachable from `root` (including `root`
    /// itself), assigning ids in discovery order (root first).
    pub fn discover(root: CodeUnit) -> Self {
        let mut units = Vec::new();
        let mut remaining = vec![root];
        while let Some(unit) = remaining.pop() {
            for sub in unit.sub_units() {
                remaining.push(sub.clone());
            }
            units.push(unit);
        }
        Self { units }
    }

    pub fn get(&self, id: CodeUnitId) -> &CodeUnit {
        &self.units[id.0 as usize]
    }

    pub fn ids(&self) -> impl Iterator<Item = CodeUnitId> {
        (0..self.units.len() as u32).map(CodeUnitId)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CodeUnitId, &CodeUnit)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, u)| (CodeUnitId(i as u32), u))
    }
}

/// Group code units by the absolute file path they belong to, so a report
/// can walk one file's units together regardless of discovery order.
pub fn group_by_file(registry: &CodeUnitRegistry) -> HashMap<PathBuf, Vec<CodeUnitId>> {
    let mut grouped: HashMap<PathBuf, Vec<CodeUnitId>> = HashMap::new();
    for (id, unit) in registry.iter() {
        grouped.entry(unit.filename.clone()).or_default().push(id);
    }
    grouped
}
