use hashbrown::hash_map::{Entry, Values};
use serde::{Deserialize, Serialize};

use common::normalize_string::NormalizeString;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum InputKind {
    /// A socket accepting a value expression (connects to an output).
    Value,
    /// A slot accepting a statement chain (connects to a previous).
    Statement,
}

/// Declares that a block kind carries a connection, with an optional
/// compatibility filter. An empty spec means "accepts anything".
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct ConnectionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    pub kind: InputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub default_value: String,
}

/// Declarative shape of a block kind: which connections it carries, its
/// inputs and its editable fields.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct BlockDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ConnectionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<ConnectionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<ConnectionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
}

impl BlockDef {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            return Err(anyhow::Error::msg("Block definition has no name"));
        }
        for input in &self.inputs {
            if self.inputs.iter().filter(|i| i.name == input.name).count() > 1 {
                return Err(anyhow::anyhow!("Duplicate input name: {}", input.name));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct BlockLibrary {
    defs: hashbrown::HashMap<String, BlockDef>,
}

impl BlockLibrary {
    pub fn from_yaml_file(file_path: &str) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(file_path)?;
        Self::from_yaml(&yaml)
    }
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let defs: Vec<BlockDef> = serde_yml::from_str(yaml)?;
        for def in &defs {
            def.validate()?;
        }
        Ok(defs.into())
    }
    pub fn to_yaml(&self) -> String {
        let mut defs: Vec<&BlockDef> = self.defs.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));

        serde_yml::to_string(&defs)
            .expect("Failed to serialize block library to YAML")
            .normalize()
    }

    pub fn def_by_name(&self, name: &str) -> Option<&BlockDef> {
        self.defs.get(name)
    }
    pub fn def_by_name_mut(&mut self, name: &str) -> Option<&mut BlockDef> {
        self.defs.get_mut(name)
    }

    pub fn add(&mut self, def: BlockDef) {
        let entry = self.defs.entry(def.name.clone());
        match entry {
            Entry::Occupied(_) => {
                panic!("Block definition already exists: {}", def.name);
            }
            Entry::Vacant(_) => {
                entry.insert(def);
            }
        }
    }
    pub fn iter(&self) -> Values<'_, String, BlockDef> {
        self.defs.values()
    }
    pub fn merge(&mut self, other: BlockLibrary) {
        for (_name, def) in other.defs {
            self.add(def);
        }
    }
    pub fn len(&self) -> usize {
        self.defs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl<It> From<It> for BlockLibrary
where
    It: IntoIterator<Item = BlockDef>,
{
    fn from(iter: It) -> Self {
        let mut library = BlockLibrary::default();
        for def in iter {
            library.add(def);
        }
        library
    }
}
