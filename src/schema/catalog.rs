use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One field of the dataset as described by the schema description file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl FieldInfo {
    pub fn new(name: &str, description: &str, examples: &[&str]) -> Self {
        Self {
            name: clean_field_name(name),
            description: description.trim().to_string(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Row of the description CSV. Header spellings vary between exports.
#[derive(Debug, Deserialize)]
struct DescriptionRow {
    #[serde(rename = "Column_Name", alias = "Column Name", alias = "column_name", alias = "Column")]
    column_name: String,
    #[serde(rename = "Description", alias = "description", default)]
    description: String,
    #[serde(rename = "Example", alias = "example", alias = "Examples", default)]
    example: String,
}

/// Ordered, immutable list of dataset fields.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    fields: Vec<FieldInfo>,
    // lowercase name -> index into `fields`
    by_lower_name: HashMap<String, usize>,
}

impl SchemaCatalog {
    pub fn new(fields: Vec<FieldInfo>) -> Result<Self> {
        let mut kept: Vec<FieldInfo> = Vec::with_capacity(fields.len());
        let mut by_lower_name = HashMap::new();

        for field in fields {
            if field.name.is_empty() {
                continue;
            }
            let key = field.name.to_lowercase();
            if by_lower_name.contains_key(&key) {
                warn!("Duplicate schema field '{}' ignored", field.name);
                continue;
            }
            by_lower_name.insert(key, kept.len());
            kept.push(field);
        }

        if kept.is_empty() {
            return Err(AgentError::Catalog("schema catalog has no fields".to_string()));
        }

        Ok(Self {
            fields: kept,
            by_lower_name,
        })
    }

    /// Load the description CSV (`Column_Name`, `Description`, `Example`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AgentError::Catalog(format!("Schema file not found: {}", path.display())));
        }
        let file = std::fs::File::open(path)?;
        let catalog = Self::from_reader(file)?;
        info!("Loaded schema catalog with {} fields from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut fields = Vec::new();
        for row in rdr.deserialize::<DescriptionRow>() {
            let row = row?;
            fields.push(FieldInfo {
                name: clean_field_name(&row.column_name),
                description: row.description,
                examples: split_examples(&row.example),
            });
        }

        Self::new(fields)
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Case-insensitive lookup returning the catalog's own spelling.
    pub fn resolve(&self, name: &str) -> Option<&FieldInfo> {
        let key = clean_field_name(name).to_lowercase();
        self.by_lower_name.get(&key).map(|&idx| &self.fields[idx])
    }

    /// Field names most similar to `name` (Jaro-Winkler), best first.
    pub fn closest(&self, name: &str, limit: usize) -> Vec<&str> {
        let needle = name.to_lowercase();
        let mut scored: Vec<(f64, usize)> = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, f)| (strsim::jaro_winkler(&needle, &f.name.to_lowercase()), idx))
            .filter(|(score, _)| *score >= 0.7)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, idx)| self.fields[idx].name.as_str())
            .collect()
    }
}

/// Column names are trimmed and inner spaces become underscores, for both the
/// dataset header and the description file.
pub fn clean_field_name(raw: &str) -> String {
    raw.trim().replace(' ', "_")
}

fn split_examples(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" || raw.eq_ignore_ascii_case("nan") {
        return Vec::new();
    }
    raw.split(';')
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_string())
        .collect()
}
