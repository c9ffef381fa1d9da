//! Schema registry: class and attribute definitions loaded from the
//! declarative schema source.
//!
//! The schema source is a JSON document shaped `{ module: { class: { attr:
//! {type, unit?, keywords?, description?} } } }`. The special class key
//! `global_attributes` describes the module's own attributes rather than an
//! object class. A copy of the source is bundled into the crate so a
//! registry is always available without external files.
//!
//! Two pieces are structural and therefore injected rather than declared:
//! a synthetic `clock` class, and a synthetic `parent` object-reference
//! attribute on every object class.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::diagnostics::Diagnostics;
use crate::error::GlmResult;
use crate::value::SemanticKind;

/// Classes whose instances represent a network connection; their `from`
/// and `to` attributes become graph edges. `parent` tags the virtual
/// containment edge.
static EDGE_CLASSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "switch",
        "fuse",
        "recloser",
        "regulator",
        "transformer",
        "overhead_line",
        "underground_line",
        "triplex_line",
        "parent",
    ]
    .into_iter()
    .collect()
});

/// Classes whose instances represent a network entity (graph node).
static NODE_CLASSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "substation",
        "node",
        "load",
        "meter",
        "triplex_node",
        "triplex_meter",
        "house",
    ]
    .into_iter()
    .collect()
});

/// True if instances of `class_name` carry `from`/`to` network connections.
pub fn is_edge_class(class_name: &str) -> bool {
    EDGE_CLASSES.contains(class_name)
}

/// True if instances of `class_name` are network entities.
pub fn is_node_class(class_name: &str) -> bool {
    NODE_CLASSES.contains(class_name)
}

/// Typed descriptor for one schema attribute.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: SemanticKind,
    /// Unit string, or `|kw1|kw2|...|` keyword domain for enumeration/set
    /// kinds and booleans.
    pub unit_or_domain: String,
    /// Human-readable label (the declared description when present).
    pub label: String,
}

impl AttributeDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: SemanticKind,
        unit_or_domain: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            unit_or_domain: unit_or_domain.into(),
            label: label.into(),
        }
    }

    /// Free-form text descriptor used for attributes discovered at runtime.
    pub fn text(name: &str) -> Self {
        Self::new(name, SemanticKind::Text, "", name)
    }
}

/// Ordered attribute map for one class.
#[derive(Debug, Clone)]
pub struct ClassSchema {
    name: String,
    attributes: IndexMap<String, AttributeDescriptor>,
    adhoc: bool,
}

impl ClassSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            adhoc: false,
        }
    }

    fn new_adhoc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            adhoc: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for classes invented at runtime (unknown `class` blocks).
    pub fn is_adhoc(&self) -> bool {
        self.adhoc
    }

    pub fn add_attribute(&mut self, descriptor: AttributeDescriptor) {
        self.attributes.insert(descriptor.name.clone(), descriptor);
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    keywords: Option<Vec<String>>,
}

type RawSchema = BTreeMap<String, BTreeMap<String, BTreeMap<String, RawAttribute>>>;

/// Registry of class schemas, split into module-level schemas (clock,
/// declared modules, ad hoc class blocks) and object classes. Built once
/// at model construction and immutable apart from ad hoc additions.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    modules: IndexMap<String, ClassSchema>,
    objects: IndexMap<String, ClassSchema>,
    module_names: HashSet<String>,
}

impl SchemaRegistry {
    /// An empty registry containing only the synthetic `clock` class.
    pub fn empty() -> Self {
        let mut modules = IndexMap::new();
        modules.insert("clock".to_string(), clock_schema());
        Self {
            modules,
            objects: IndexMap::new(),
            module_names: HashSet::new(),
        }
    }

    /// Load the schema source bundled into the crate.
    pub fn bundled(diag: &mut Diagnostics) -> GlmResult<Self> {
        Self::from_json_str(include_str!("../data/glm_classes.json"), diag)
    }

    /// Load a schema source from disk.
    pub fn from_path(
        path: impl AsRef<std::path::Path>,
        diag: &mut Diagnostics,
    ) -> GlmResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json_str(&source, diag)
    }

    /// Load a registry from declarative JSON. Unrecognized primitive kinds
    /// are skipped with a diagnostic, not fatal.
    pub fn from_json_str(source: &str, diag: &mut Diagnostics) -> GlmResult<Self> {
        let raw: RawSchema = serde_json::from_str(source)?;
        let mut registry = Self::empty();

        for (module_name, classes) in raw {
            registry.module_names.insert(module_name.clone());
            for (class_name, attrs) in classes {
                if class_name == "global_attributes" {
                    let mut schema = ClassSchema::new(&module_name);
                    fill_schema(&mut schema, attrs, diag);
                    registry.modules.insert(module_name.clone(), schema);
                } else {
                    let mut schema = ClassSchema::new(&class_name);
                    schema.add_attribute(parent_descriptor());
                    fill_schema(&mut schema, attrs, diag);
                    registry.objects.insert(class_name, schema);
                }
            }
        }
        Ok(registry)
    }

    pub fn object_class(&self, name: &str) -> Option<&ClassSchema> {
        self.objects.get(name)
    }

    pub fn module_class(&self, name: &str) -> Option<&ClassSchema> {
        self.modules.get(name)
    }

    /// True when `name` is a declared module (serialized `module X`);
    /// other module-level schemas are ad hoc classes (serialized `class X`).
    pub fn is_declared_module(&self, name: &str) -> bool {
        self.module_names.contains(name)
    }

    pub fn module_class_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(|s| s.as_str())
    }

    pub fn object_class_names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(|s| s.as_str())
    }

    /// Register an unknown object class discovered at runtime.
    pub fn add_adhoc_object_class(&mut self, name: &str) -> &mut ClassSchema {
        self.objects.entry(name.to_string()).or_insert_with(|| {
            let mut schema = ClassSchema::new_adhoc(name);
            schema.add_attribute(parent_descriptor());
            schema
        })
    }

    /// Register an unknown module-level class discovered at runtime.
    pub fn add_adhoc_module_class(&mut self, name: &str) -> &mut ClassSchema {
        self.modules
            .entry(name.to_string())
            .or_insert_with(|| ClassSchema::new_adhoc(name))
    }

    /// Record an attribute with no declared descriptor as free-form text so
    /// later instances of the class validate cleanly (forward-compatibility
    /// policy).
    pub fn ensure_object_attribute(&mut self, class_name: &str, attr_name: &str) {
        if let Some(schema) = self.objects.get_mut(class_name) {
            if schema.attribute(attr_name).is_none() {
                schema.add_attribute(AttributeDescriptor::text(attr_name));
            }
        }
    }

    /// Same forward-compatibility policy for module-level schemas.
    pub fn ensure_module_attribute(&mut self, class_name: &str, attr_name: &str) {
        if let Some(schema) = self.modules.get_mut(class_name) {
            if schema.attribute(attr_name).is_none() {
                schema.add_attribute(AttributeDescriptor::text(attr_name));
            }
        }
    }
}

fn fill_schema(
    schema: &mut ClassSchema,
    attrs: BTreeMap<String, RawAttribute>,
    diag: &mut Diagnostics,
) {
    for (attr_name, raw) in attrs {
        let Some(kind) = SemanticKind::from_primitive(&raw.kind) else {
            diag.add_warning_with_entity(
                "schema",
                &format!("unrecognized primitive kind '{}', attribute skipped", raw.kind),
                &format!("{}.{}", schema.name(), attr_name),
            );
            continue;
        };

        let unit_or_domain = match kind {
            SemanticKind::Enumeration | SemanticKind::Set => {
                let keywords = raw.keywords.unwrap_or_default();
                format!("|{}|", keywords.join("|"))
            }
            SemanticKind::Bool => "|true|false|".to_string(),
            _ => raw.unit.unwrap_or_default(),
        };

        let label = raw
            .description
            .unwrap_or_else(|| attr_name.replace(['_', '.'], " "));

        schema.add_attribute(AttributeDescriptor::new(attr_name, kind, unit_or_domain, label));
    }
}

/// Synthetic schema for the clock block; not declared in the schema source.
fn clock_schema() -> ClassSchema {
    let mut schema = ClassSchema::new("clock");
    for (name, label) in [
        ("timezone", "Time zone"),
        ("timestamp", "Start time"),
        ("starttime", "Start time"),
        ("stoptime", "Stop time"),
    ] {
        schema.add_attribute(AttributeDescriptor::new(name, SemanticKind::Text, "", label));
    }
    schema
}

/// Synthetic `parent` attribute injected on every object class.
fn parent_descriptor() -> AttributeDescriptor {
    AttributeDescriptor::new("parent", SemanticKind::ObjectRef, "", "Parent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_schema_loads() {
        let mut diag = Diagnostics::new();
        let registry = SchemaRegistry::bundled(&mut diag).expect("bundled schema parses");
        assert!(!diag.has_issues(), "bundled schema is clean: {}", diag);

        let meter = registry.object_class("meter").expect("meter declared");
        assert_eq!(
            meter.attribute("nominal_voltage").unwrap().kind,
            SemanticKind::Real
        );
        assert_eq!(meter.attribute("phases").unwrap().kind, SemanticKind::Set);

        // modules expose their global attributes
        let powerflow = registry.module_class("powerflow").unwrap();
        assert_eq!(
            powerflow.attribute("solver_method").unwrap().kind,
            SemanticKind::Enumeration
        );
        assert!(registry.is_declared_module("powerflow"));
    }

    #[test]
    fn test_clock_and_parent_injection() {
        let mut diag = Diagnostics::new();
        let registry = SchemaRegistry::bundled(&mut diag).unwrap();

        let clock = registry.module_class("clock").expect("clock injected");
        assert!(clock.attribute("starttime").is_some());
        assert!(clock.attribute("stoptime").is_some());

        for class in ["node", "house", "recorder"] {
            let schema = registry.object_class(class).unwrap();
            let parent = schema.attribute("parent").expect("parent injected");
            assert_eq!(parent.kind, SemanticKind::ObjectRef);
        }
    }

    #[test]
    fn test_enum_domain_capture() {
        let mut diag = Diagnostics::new();
        let registry = SchemaRegistry::bundled(&mut diag).unwrap();
        let node = registry.object_class("node").unwrap();
        let bustype = node.attribute("bustype").unwrap();
        assert_eq!(bustype.unit_or_domain, "|PQ|PV|SWING|");
    }

    #[test]
    fn test_unknown_primitive_skipped_with_diagnostic() {
        let source = r#"{
            "powerflow": {
                "widget": {
                    "good": { "type": "double", "unit": "V" },
                    "weird": { "type": "quaternion" }
                }
            }
        }"#;
        let mut diag = Diagnostics::new();
        let registry = SchemaRegistry::from_json_str(source, &mut diag).unwrap();

        let widget = registry.object_class("widget").unwrap();
        assert!(widget.attribute("good").is_some());
        assert!(widget.attribute("weird").is_none());
        assert_eq!(diag.issues_by_category("schema").count(), 1);
    }

    #[test]
    fn test_adhoc_classes() {
        let mut registry = SchemaRegistry::empty();
        let schema = registry.add_adhoc_object_class("sensor");
        schema.add_attribute(AttributeDescriptor::text("reading"));
        assert!(registry.object_class("sensor").unwrap().is_adhoc());
        assert!(registry.object_class("sensor").unwrap().attribute("parent").is_some());

        registry.add_adhoc_module_class("player_config");
        assert!(!registry.is_declared_module("player_config"));
    }

    #[test]
    fn test_edge_and_node_tags() {
        assert!(is_edge_class("transformer"));
        assert!(is_edge_class("parent"));
        assert!(is_node_class("triplex_meter"));
        assert!(!is_node_class("recorder"));
        assert!(!is_edge_class("house"));
    }
}
