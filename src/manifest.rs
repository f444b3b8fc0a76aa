//! The travel manifest: a JSON array of records that point at avatar and
//! content images.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::image_processor::{webp_file_name, ConversionReport};

pub const AVATAR: &str = "avatar";
pub const IMAGE: &str = "image";

/// One manifest entry.
///
/// Only `avatar` and `image` are interpreted. Every other key is carried
/// through untouched, and key order survives a load/save cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    avatar: Option<String>,
    image: Option<String>,
    fields: Map<String, Value>,
}

impl Record {
    pub fn from_object(index: usize, fields: Map<String, Value>) -> Result<Self> {
        let avatar = string_field(index, &fields, AVATAR)?;
        let image = string_field(index, &fields, IMAGE)?;

        Ok(Record {
            avatar,
            image,
            fields,
        })
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Point `avatar` and `image` at their webp counterparts.
    ///
    /// Missing, null, and empty fields are left as they are.
    pub fn rewrite(&mut self, avatar_prefix: &str, image_prefix: &str) {
        if let Some(avatar) = self.avatar.as_mut().filter(|s| !s.is_empty()) {
            *avatar = rewrite_path(avatar, avatar_prefix);
        }
        if let Some(image) = self.image.as_mut().filter(|s| !s.is_empty()) {
            *image = rewrite_path(image, image_prefix);
        }
    }

    pub fn to_object(&self) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        // insert on an existing key keeps its position
        if let Some(avatar) = &self.avatar {
            fields.insert(AVATAR.to_string(), Value::String(avatar.clone()));
        }
        if let Some(image) = &self.image {
            fields.insert(IMAGE.to_string(), Value::String(image.clone()));
        }
        fields
    }
}

fn string_field(index: usize, fields: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => anyhow::bail!(
            "Record {index}: field `{key}` must be a string, found {}",
            json_type(other)
        ),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `travel/avatar/a1.jpg` + `travel/avatar-webp` -> `travel/avatar-webp/a1.webp`
pub fn rewrite_path(path: &str, prefix: &str) -> String {
    let file_name = webp_file_name(path);
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file_name
    } else {
        format!("{prefix}/{file_name}")
    }
}

/// A rewritten reference whose webp file was not produced by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub index: usize,
    pub field: &'static str,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    records: Vec<Record>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;

        Self::from_value(value)
            .with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            other => anyhow::bail!("Manifest must be a JSON array, found {}", json_type(&other)),
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(fields) => Record::from_object(index, fields),
                other => anyhow::bail!(
                    "Record {index} must be an object, found {}",
                    json_type(&other)
                ),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Manifest { records })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite every record's avatar/image reference. Order is unchanged.
    pub fn rewrite(mut self, avatar_prefix: &str, image_prefix: &str) -> Self {
        for record in &mut self.records {
            record.rewrite(avatar_prefix, image_prefix);
        }
        self
    }

    /// References that name a webp file neither report produced.
    ///
    /// Only meaningful after [`Manifest::rewrite`].
    pub fn dangling_references(
        &self,
        avatars: &ConversionReport,
        images: &ConversionReport,
    ) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();

        for (index, record) in self.records.iter().enumerate() {
            let fields = [(AVATAR, record.avatar(), avatars), (IMAGE, record.image(), images)];
            for (field, path, report) in fields {
                let Some(path) = path.filter(|p| !p.is_empty()) else {
                    continue;
                };
                let file_name = Path::new(path)
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                if !report.produced(&file_name) {
                    dangling.push(DanglingReference {
                        index,
                        field,
                        path: path.to_string(),
                    });
                }
            }
        }

        dangling
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.records
                .iter()
                .map(|r| Value::Object(r.to_object()))
                .collect(),
        )
    }

    /// Two-space indented JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut json =
            serde_json::to_string_pretty(&self.to_value()).context("Failed to serialize manifest")?;
        json.push('\n');
        Ok(json)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }
}
