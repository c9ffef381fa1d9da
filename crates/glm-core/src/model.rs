//! In-memory model: typed instances, per-class entity stores, and the
//! validated mutation API.
//!
//! A [`Model`] is the root aggregate produced by the parser and consumed
//! by the serializer and graph builder. Identities live in a single flat
//! namespace across every object class; the global identity index enforces
//! that, rejecting a second definition under a different class instead of
//! silently shadowing it.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::comments::CommentTables;
use crate::diagnostics::Diagnostics;
use crate::schema::SchemaRegistry;
use crate::value::{AttributeValue, SemanticKind};

/// One typed instance of a class. Attribute insertion order is preserved
/// for serialization; a `None` value means the attribute was cleared and
/// is skipped on output.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class_name: String,
    pub identity: String,
    pub attributes: IndexMap<String, Option<AttributeValue>>,
}

impl Instance {
    pub fn new(class_name: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            identity: identity.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn set(&mut self, attr: &str, value: AttributeValue) {
        self.attributes.insert(attr.to_string(), Some(value));
    }

    pub fn get(&self, attr: &str) -> Option<&AttributeValue> {
        self.attributes.get(attr).and_then(Option::as_ref)
    }

    /// Referenced instance name held by `attr`, if any.
    pub fn reference(&self, attr: &str) -> Option<&str> {
        self.get(attr).and_then(AttributeValue::as_name)
    }
}

/// All instances of one class, keyed by identity in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    class_name: String,
    instances: IndexMap<String, Instance>,
}

impl EntityStore {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            instances: IndexMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Fetch or create the instance for `identity`. Repeated definitions
    /// merge rather than replace.
    pub fn instance_mut(&mut self, identity: &str) -> &mut Instance {
        let class_name = self.class_name.clone();
        self.instances
            .entry(identity.to_string())
            .or_insert_with(|| Instance::new(class_name, identity))
    }

    pub fn get_instance(&self, identity: &str) -> Option<&Instance> {
        self.instances.get(identity)
    }

    pub fn get_instance_mut(&mut self, identity: &str) -> Option<&mut Instance> {
        self.instances.get_mut(identity)
    }

    pub fn delete_instance(&mut self, identity: &str) -> Option<Instance> {
        self.instances.shift_remove(identity)
    }

    /// Re-key an instance, preserving its position in the store.
    pub fn rename_instance(&mut self, old: &str, new: &str) -> bool {
        let Some(index) = self.instances.get_index_of(old) else {
            return false;
        };
        let Some((_, mut instance)) = self.instances.swap_remove_index(index) else {
            return false;
        };
        instance.identity = new.to_string();
        let (inserted, _) = self.instances.insert_full(new.to_string(), instance);
        self.instances.swap_indices(index, inserted);
        true
    }

    pub fn instance_names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn instances_mut(&mut self) -> impl Iterator<Item = &mut Instance> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Root aggregate for one GLM file.
#[derive(Debug, Clone)]
pub struct Model {
    schema: SchemaRegistry,
    clock: Instance,
    set_lines: Vec<String>,
    define_lines: Vec<String>,
    include_lines: Vec<String>,
    /// Global attribute values per declared module or ad hoc class block.
    module_instances: IndexMap<String, Instance>,
    /// Object instances grouped by class.
    objects: IndexMap<String, EntityStore>,
    comments: CommentTables,
    /// Schedule blocks captured verbatim, header line included.
    schedules: IndexMap<String, Vec<String>>,
    /// Flat namespace: identity -> owning class.
    identity_index: HashMap<String, String>,
    /// `class:ID` backreferences -> identity, resolved at finalize.
    oid_index: HashMap<String, String>,
    synthetic_counters: HashMap<String, usize>,
}

impl Model {
    pub fn new(schema: SchemaRegistry) -> Self {
        Self {
            schema,
            clock: Instance::new("clock", "clock"),
            set_lines: Vec::new(),
            define_lines: Vec::new(),
            include_lines: Vec::new(),
            module_instances: IndexMap::new(),
            objects: IndexMap::new(),
            comments: CommentTables::new(),
            schedules: IndexMap::new(),
            identity_index: HashMap::new(),
            oid_index: HashMap::new(),
            synthetic_counters: HashMap::new(),
        }
    }

    /// Model backed by the bundled schema.
    pub fn with_bundled_schema(diag: &mut Diagnostics) -> crate::error::GlmResult<Self> {
        Ok(Self::new(SchemaRegistry::bundled(diag)?))
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.schema
    }

    pub fn clock(&self) -> &Instance {
        &self.clock
    }

    pub fn comments(&self) -> &CommentTables {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut CommentTables {
        &mut self.comments
    }

    pub fn set_lines(&self) -> &[String] {
        &self.set_lines
    }

    pub fn define_lines(&self) -> &[String] {
        &self.define_lines
    }

    pub fn include_lines(&self) -> &[String] {
        &self.include_lines
    }

    pub fn module_instances(&self) -> impl Iterator<Item = &Instance> {
        self.module_instances.values()
    }

    pub fn module_instance(&self, name: &str) -> Option<&Instance> {
        self.module_instances.get(name)
    }

    pub fn stores(&self) -> impl Iterator<Item = &EntityStore> {
        self.objects.values()
    }

    pub fn store(&self, class: &str) -> Option<&EntityStore> {
        self.objects.get(class)
    }

    pub fn instance(&self, class: &str, identity: &str) -> Option<&Instance> {
        self.objects.get(class)?.get_instance(identity)
    }

    pub fn schedules(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.schedules.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Owning class for an identity, if defined.
    pub fn class_of(&self, identity: &str) -> Option<&str> {
        self.identity_index.get(identity).map(String::as_str)
    }

    pub fn total_objects(&self) -> usize {
        self.objects.values().map(EntityStore::len).sum()
    }

    // ---- parser-facing construction -------------------------------------

    /// Claim `identity` for `class` in the flat namespace. A clash with a
    /// different class rejects the claim with an `identity-clash` error;
    /// re-claiming under the same class merges.
    pub fn declare_object(&mut self, class: &str, identity: &str, diag: &mut Diagnostics) -> bool {
        if let Some(owner) = self.identity_index.get(identity) {
            if owner != class {
                diag.add_error_with_entity(
                    "identity-clash",
                    &format!("identity already used by class {}", owner),
                    &format!("{} {}", class, identity),
                );
                return false;
            }
        } else {
            self.identity_index
                .insert(identity.to_string(), class.to_string());
        }

        if self.schema.object_class(class).is_none() {
            diag.add_warning_with_entity(
                "unknown-class",
                "object class has no schema, treating attributes as text",
                class,
            );
            self.schema.add_adhoc_object_class(class);
        }

        self.objects
            .entry(class.to_string())
            .or_insert_with(|| EntityStore::new(class))
            .instance_mut(identity);
        true
    }

    /// Store one raw attribute on an object instance, converting through
    /// the class schema. Attributes with no descriptor are kept as text
    /// and reported once per (class, attribute).
    pub fn set_object_attribute_raw(
        &mut self,
        class: &str,
        identity: &str,
        attr: &str,
        raw: &str,
        diag: &mut Diagnostics,
    ) {
        let kind = self
            .schema
            .object_class(class)
            .and_then(|s| s.attribute(attr))
            .map(|d| d.kind);

        let value = match kind {
            Some(kind) => AttributeValue::parse(kind, raw),
            None => {
                diag.add_warning_with_entity(
                    "unrecognized-attribute",
                    &format!("attribute '{}' not declared for class {}", attr, class),
                    &format!("{} {}", class, identity),
                );
                self.schema.ensure_object_attribute(class, attr);
                AttributeValue::text(raw)
            }
        };

        self.objects
            .entry(class.to_string())
            .or_insert_with(|| EntityStore::new(class))
            .instance_mut(identity)
            .set(attr, value);
    }

    /// Register a module block (declared `module X` or terse `module X;`).
    pub fn declare_module(&mut self, name: &str) {
        if self.schema.module_class(name).is_none() {
            self.schema.add_adhoc_module_class(name);
        }
        self.module_instances
            .entry(name.to_string())
            .or_insert_with(|| Instance::new(name, name));
    }

    /// Register an ad hoc `class X` block at module level.
    pub fn declare_class(&mut self, name: &str) {
        self.schema.add_adhoc_module_class(name);
        self.module_instances
            .entry(name.to_string())
            .or_insert_with(|| Instance::new(name, name));
    }

    pub fn set_module_attribute_raw(
        &mut self,
        module: &str,
        attr: &str,
        raw: &str,
        diag: &mut Diagnostics,
    ) {
        let kind = self
            .schema
            .module_class(module)
            .and_then(|s| s.attribute(attr))
            .map(|d| d.kind);

        let value = match kind {
            Some(kind) => AttributeValue::parse(kind, raw),
            None => {
                diag.add_warning_with_entity(
                    "unrecognized-attribute",
                    &format!("attribute '{}' not declared for module {}", attr, module),
                    module,
                );
                self.schema.ensure_module_attribute(module, attr);
                AttributeValue::text(raw)
            }
        };

        self.module_instances
            .entry(module.to_string())
            .or_insert_with(|| Instance::new(module, module))
            .set(attr, value);
    }

    pub fn set_clock_attribute_raw(&mut self, attr: &str, raw: &str) {
        self.clock
            .set(attr, AttributeValue::parse(SemanticKind::Text, raw));
    }

    /// Record a `class:ID` backreference for later resolution.
    pub fn register_oid(&mut self, oid: &str, identity: &str) {
        self.oid_index.insert(oid.to_string(), identity.to_string());
    }

    /// Identity previously registered for a `class:ID` backreference.
    pub fn oid_identity(&self, oid: &str) -> Option<&str> {
        self.oid_index.get(oid).map(String::as_str)
    }

    pub fn add_schedule(&mut self, name: &str, lines: Vec<String>) {
        self.schedules.insert(name.to_string(), lines);
    }

    pub fn push_set_line(&mut self, line: impl Into<String>) {
        self.set_lines.push(line.into());
    }

    pub fn push_define_line(&mut self, line: impl Into<String>) {
        self.define_lines.push(line.into());
    }

    pub fn push_include_line(&mut self, line: impl Into<String>) {
        self.include_lines.push(line.into());
    }

    /// Next free synthesized identity for anonymous instances of `class`.
    pub fn next_synthetic_identity(&mut self, class: &str) -> String {
        loop {
            let counter = self.synthetic_counters.entry(class.to_string()).or_insert(0);
            *counter += 1;
            let candidate = format!("{}_{}", class, counter);
            if !self.identity_index.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Post-parse fixups: substitute resolved `class:ID` backreferences,
    /// then report dangling structural references.
    pub fn finalize(&mut self, diag: &mut Diagnostics) {
        self.resolve_backreferences();
        self.validate_references(diag);
    }

    fn resolve_backreferences(&mut self) {
        if self.oid_index.is_empty() {
            return;
        }
        for store in self.objects.values_mut() {
            for instance in store.instances_mut() {
                for value in instance.attributes.values_mut().flatten() {
                    if let Some(name) = value.as_name() {
                        if let Some(identity) = self.oid_index.get(name) {
                            let identity = identity.clone();
                            value.rename(&identity);
                        }
                    }
                }
            }
        }
    }

    /// Structural references (`from`, `to`, `parent`) must name a defined
    /// identity; anything else is a dangling-reference warning.
    pub fn validate_references(&self, diag: &mut Diagnostics) {
        for store in self.objects.values() {
            for instance in store.instances() {
                for attr in ["from", "to", "parent"] {
                    if let Some(target) = instance.reference(attr) {
                        if !self.identity_index.contains_key(target) {
                            diag.add_warning_with_entity(
                                "dangling-reference",
                                &format!("'{}' names missing object '{}'", attr, target),
                                &format!("{} {}", instance.class_name, instance.identity),
                            );
                        }
                    }
                }
            }
        }
    }

    // ---- modifier API ---------------------------------------------------

    /// Add (or merge into) an object, storing raw attribute text through
    /// the schema. Unknown classes get an ad hoc schema with a diagnostic.
    pub fn add_object(
        &mut self,
        class: &str,
        identity: &str,
        attrs: &[(&str, &str)],
        diag: &mut Diagnostics,
    ) -> bool {
        if !self.declare_object(class, identity, diag) {
            return false;
        }
        for (attr, raw) in attrs {
            self.set_object_attribute_raw(class, identity, attr, raw, diag);
        }
        true
    }

    /// Rename an object and rewrite every by-name reference to it across
    /// all classes. Returns false when `old` is not an instance of `class`.
    pub fn rename_object(&mut self, class: &str, old: &str, new: &str) -> bool {
        let Some(store) = self.objects.get_mut(class) else {
            return false;
        };
        if !store.rename_instance(old, new) {
            return false;
        }

        for store in self.objects.values_mut() {
            for instance in store.instances_mut() {
                for value in instance.attributes.values_mut().flatten() {
                    if value.names(old) {
                        value.rename(new);
                    }
                }
            }
        }

        self.identity_index.remove(old);
        self.identity_index
            .insert(new.to_string(), class.to_string());
        for identity in self.oid_index.values_mut() {
            if identity == old {
                *identity = new.to_string();
            }
        }
        self.comments.rename_entity(old, new);
        true
    }

    /// Delete an object, cascading one level to instances whose `parent`
    /// names it. The cascade is not recursive; grandchildren are left
    /// behind with dangling parents, which the next validation reports.
    pub fn delete_object(&mut self, class: &str, identity: &str) -> bool {
        let Some(store) = self.objects.get_mut(class) else {
            return false;
        };
        if store.delete_instance(identity).is_none() {
            return false;
        }
        self.identity_index.remove(identity);
        self.comments.remove_entity(identity);

        let children: Vec<(String, String)> = self
            .objects
            .values()
            .flat_map(EntityStore::instances)
            .filter(|i| i.reference("parent") == Some(identity))
            .map(|i| (i.class_name.clone(), i.identity.clone()))
            .collect();

        for (child_class, child_identity) in children {
            if let Some(store) = self.objects.get_mut(&child_class) {
                store.delete_instance(&child_identity);
            }
            self.identity_index.remove(&child_identity);
            self.comments.remove_entity(&child_identity);
        }
        true
    }

    /// Validated single-attribute write. Returns false when the instance
    /// does not exist.
    pub fn set_attribute(
        &mut self,
        class: &str,
        identity: &str,
        attr: &str,
        raw: &str,
        diag: &mut Diagnostics,
    ) -> bool {
        if self.instance(class, identity).is_none() {
            return false;
        }
        self.set_object_attribute_raw(class, identity, attr, raw, diag);
        true
    }

    pub fn get_attribute(&self, class: &str, identity: &str, attr: &str) -> Option<&AttributeValue> {
        self.instance(class, identity)?.get(attr)
    }

    pub fn set_clock(&mut self, starttime: &str, stoptime: &str, timezone: &str) {
        self.clock.set("starttime", AttributeValue::text(starttime));
        self.clock.set("stoptime", AttributeValue::text(stoptime));
        self.clock.set("timezone", AttributeValue::text(timezone));
    }

    pub fn add_include(&mut self, path: &str) {
        let line = format!("#include \"{}\"", path);
        if !self.include_lines.contains(&line) {
            self.include_lines.push(line);
        }
    }

    pub fn del_include(&mut self, path: &str) {
        let line = format!("#include \"{}\"", path);
        self.include_lines.retain(|l| l != &line);
    }

    pub fn add_set(&mut self, key: &str, value: &str) {
        self.del_set(key);
        self.set_lines.push(format!("#set {}={}", key, value));
    }

    pub fn del_set(&mut self, key: &str) {
        let prefix = format!("#set {}=", key);
        self.set_lines.retain(|l| !l.starts_with(&prefix));
    }

    pub fn add_define(&mut self, key: &str, value: &str) {
        self.del_define(key);
        self.define_lines.push(format!("#define {}={}", key, value));
    }

    pub fn del_define(&mut self, key: &str) {
        let prefix = format!("#define {}=", key);
        self.define_lines.retain(|l| !l.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_model() -> (Model, Diagnostics) {
        let mut diag = Diagnostics::new();
        let model = Model::with_bundled_schema(&mut diag).unwrap();
        assert!(!diag.has_issues());
        (model, diag)
    }

    #[test]
    fn test_add_and_get() {
        let (mut model, mut diag) = test_model();
        assert!(model.add_object(
            "meter",
            "m1",
            &[("phases", "ABCN"), ("nominal_voltage", "7200")],
            &mut diag,
        ));

        assert_eq!(model.class_of("m1"), Some("meter"));
        assert_eq!(
            model.get_attribute("meter", "m1", "nominal_voltage"),
            Some(&AttributeValue::Real(7200.0))
        );
        assert_eq!(model.total_objects(), 1);
    }

    #[test]
    fn test_unrecognized_attribute_stored_as_text() {
        let (mut model, mut diag) = test_model();
        model.add_object("meter", "m1", &[("bogus_attr", "42")], &mut diag);

        assert_eq!(
            model.get_attribute("meter", "m1", "bogus_attr"),
            Some(&AttributeValue::Text("42".to_string()))
        );
        assert_eq!(diag.issues_by_category("unrecognized-attribute").count(), 1);
    }

    #[test]
    fn test_identity_clash_rejected() {
        let (mut model, mut diag) = test_model();
        model.add_object("node", "n1", &[], &mut diag);
        assert!(!model.add_object("load", "n1", &[], &mut diag));

        assert_eq!(model.class_of("n1"), Some("node"));
        assert_eq!(diag.issues_by_category("identity-clash").count(), 1);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_repeat_definition_merges() {
        let (mut model, mut diag) = test_model();
        model.add_object("node", "n1", &[("bustype", "SWING")], &mut diag);
        model.add_object("node", "n1", &[("nominal_voltage", "7200")], &mut diag);

        assert_eq!(model.store("node").unwrap().len(), 1);
        let instance = model.instance("node", "n1").unwrap();
        assert!(instance.get("bustype").is_some());
        assert!(instance.get("nominal_voltage").is_some());
    }

    #[test]
    fn test_unknown_class_gets_adhoc_schema() {
        let (mut model, mut diag) = test_model();
        model.add_object("widget", "w1", &[("x", "1")], &mut diag);

        assert!(model.schema().object_class("widget").unwrap().is_adhoc());
        assert_eq!(diag.issues_by_category("unknown-class").count(), 1);
    }

    #[test]
    fn test_rename_rewrites_references() {
        let (mut model, mut diag) = test_model();
        model.add_object("node", "n1", &[], &mut diag);
        model.add_object("node", "n2", &[], &mut diag);
        model.add_object("switch", "sw1", &[("from", "n1"), ("to", "n2")], &mut diag);
        model.add_object("house", "h1", &[("parent", "n1")], &mut diag);
        model.comments_mut().entry_mut("n1").push_outside("// head");

        assert!(model.rename_object("node", "n1", "feeder_head"));

        assert!(model.instance("node", "n1").is_none());
        assert!(model.instance("node", "feeder_head").is_some());
        assert_eq!(model.get_attribute("switch", "sw1", "from").unwrap().to_string(), "feeder_head");
        assert_eq!(model.get_attribute("house", "h1", "parent").unwrap().to_string(), "feeder_head");
        assert_eq!(model.class_of("feeder_head"), Some("node"));
        assert_eq!(model.class_of("n1"), None);
        assert!(model.comments().get("feeder_head").is_some());
    }

    #[test]
    fn test_rename_missing_returns_false() {
        let (mut model, _) = test_model();
        assert!(!model.rename_object("node", "ghost", "anything"));
    }

    #[test]
    fn test_delete_cascades_one_level() {
        let (mut model, mut diag) = test_model();
        model.add_object("node", "n1", &[], &mut diag);
        model.add_object("meter", "m1", &[("parent", "n1")], &mut diag);
        model.add_object("house", "h1", &[("parent", "m1")], &mut diag);

        assert!(model.delete_object("node", "n1"));

        // n1 and its direct child are gone, the grandchild stays
        assert!(model.instance("node", "n1").is_none());
        assert!(model.instance("meter", "m1").is_none());
        assert!(model.instance("house", "h1").is_some());

        // the grandchild's parent now dangles
        let mut check = Diagnostics::new();
        model.validate_references(&mut check);
        assert_eq!(check.issues_by_category("dangling-reference").count(), 1);
    }

    #[test]
    fn test_synthetic_identity_skips_taken_names() {
        let (mut model, mut diag) = test_model();
        assert_eq!(model.next_synthetic_identity("load"), "load_1");
        model.add_object("load", "load_2", &[], &mut diag);
        // load_2 is taken by an explicit name, counter rolls past it
        assert_eq!(model.next_synthetic_identity("load"), "load_3");
    }

    #[test]
    fn test_backreference_resolution() {
        let (mut model, mut diag) = test_model();
        model.add_object("node", "n1", &[], &mut diag);
        model.register_oid("node:12", "n1");
        model.add_object("house", "h1", &[("parent", "node:12")], &mut diag);

        model.finalize(&mut diag);

        assert_eq!(model.get_attribute("house", "h1", "parent").unwrap().to_string(), "n1");
        assert_eq!(diag.issues_by_category("dangling-reference").count(), 0);
    }

    #[test]
    fn test_dangling_reference_detected() {
        let (mut model, mut diag) = test_model();
        model.add_object("node", "n1", &[], &mut diag);
        model.add_object("switch", "sw1", &[("from", "n1"), ("to", "ghost")], &mut diag);

        let mut check = Diagnostics::new();
        model.validate_references(&mut check);
        let issues: Vec<_> = check.issues_by_category("dangling-reference").collect();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("ghost"));
    }

    #[test]
    fn test_clock_and_directives() {
        let (mut model, _) = test_model();
        model.set_clock("'2023-07-01 00:00:00'", "'2023-07-02 00:00:00'", "EST+5EDT");
        assert_eq!(
            model.clock().get("timezone").unwrap().to_string(),
            "EST+5EDT"
        );

        model.add_include("schedules.glm");
        model.add_include("schedules.glm");
        assert_eq!(model.include_lines(), ["#include \"schedules.glm\""]);
        model.del_include("schedules.glm");
        assert!(model.include_lines().is_empty());

        model.add_set("minimum_timestep", "15");
        model.add_set("minimum_timestep", "30");
        assert_eq!(model.set_lines(), ["#set minimum_timestep=30"]);
        model.del_set("minimum_timestep");
        assert!(model.set_lines().is_empty());

        model.add_define("VSOURCE", "66395.28");
        assert_eq!(model.define_lines(), ["#define VSOURCE=66395.28"]);
        model.del_define("VSOURCE");
        assert!(model.define_lines().is_empty());
    }
}
