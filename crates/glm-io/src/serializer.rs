//! GLM text emission.
//!
//! Output order is fixed: clock, `#set` lines, `#define` lines,
//! `#include` lines, module and class blocks, objects, schedules. Objects
//! come out in topology-traversal order first so electrically connected
//! equipment stays contiguous, then everything the graph does not cover
//! in store order. Comments replay from the side tables at the positions
//! they were captured.

use std::collections::HashSet;

use glm_core::comments::{EntityComments, KEY_LAST, KEY_NAME};
use glm_core::graph::build_graph;
use glm_core::model::Instance;
use glm_core::{Diagnostics, Model};

/// Render the model as GLM text.
pub fn to_string(model: &Model) -> String {
    let mut out = String::new();

    emit_clock(&mut out, model);
    emit_directive_group(&mut out, model.set_lines());
    emit_directive_group(&mut out, model.define_lines());
    emit_directive_group(&mut out, model.include_lines());
    emit_modules(&mut out, model);
    emit_objects(&mut out, model);
    emit_schedules(&mut out, model);

    out
}

fn emit_clock(out: &mut String, model: &Model) {
    let clock = model.clock();
    if clock.attributes.values().all(Option::is_none) {
        return;
    }
    let comments = model.comments().get("clock");
    emit_outside(out, comments);
    out.push_str("clock {\n");
    emit_attributes(out, clock, comments);
    out.push_str("}\n\n");
}

fn emit_directive_group(out: &mut String, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
}

fn emit_modules(out: &mut String, model: &Model) {
    for instance in model.module_instances() {
        let name = &instance.identity;
        let keyword = if model.schema().is_declared_module(name) {
            "module"
        } else {
            "class"
        };
        let comments = model.comments().get(name);
        emit_outside(out, comments);
        if instance.attributes.values().all(Option::is_none) {
            out.push_str(&format!("{} {};\n\n", keyword, name));
            continue;
        }
        out.push_str(&format!("{} {} {{\n", keyword, name));
        emit_attributes(out, instance, comments);
        out.push_str("}\n\n");
    }
}

fn emit_objects(out: &mut String, model: &Model) {
    // the graph is a pure projection; anomalies it reports here were
    // already surfaced when the model was built
    let mut scratch = Diagnostics::new();
    let topo = build_graph(model, &mut scratch);

    let mut emitted: HashSet<(String, String)> = HashSet::new();
    for (class, identity) in topo.ordered_instances() {
        if let Some(instance) = model.instance(&class, &identity) {
            if emitted.insert((class.clone(), identity.clone())) {
                emit_instance(out, model, instance);
            }
        }
    }

    for store in model.stores() {
        for instance in store.instances() {
            let key = (instance.class_name.clone(), instance.identity.clone());
            if !emitted.contains(&key) {
                emit_instance(out, model, instance);
            }
        }
    }
}

fn emit_instance(out: &mut String, model: &Model, instance: &Instance) {
    let comments = model.comments().get(&instance.identity);
    emit_outside(out, comments);

    out.push_str(&format!("object {} {{\n", instance.class_name));
    if let Some(comments) = comments {
        for text in comments.inside_for(KEY_NAME) {
            out.push_str(&format!("  // {}\n", text));
        }
    }
    out.push_str(&format!("  name {};", instance.identity));
    if let Some(text) = comments.and_then(|c| c.inline_for(KEY_NAME)) {
        out.push_str(&format!(" // {}", text));
    }
    out.push('\n');

    emit_attributes(out, instance, comments);
    out.push_str("}\n\n");
}

/// Shared attribute body emission: inside comments above their anchor,
/// inline comments on the line, cleared values skipped, `__last__`
/// comments before the caller's closing brace.
fn emit_attributes(out: &mut String, instance: &Instance, comments: Option<&EntityComments>) {
    for (attr, value) in &instance.attributes {
        let Some(value) = value else {
            continue;
        };
        if let Some(comments) = comments {
            for text in comments.inside_for(attr) {
                out.push_str(&format!("  // {}\n", text));
            }
        }
        out.push_str(&format!("  {} {};", attr, value));
        if let Some(text) = comments.and_then(|c| c.inline_for(attr)) {
            out.push_str(&format!(" // {}", text));
        }
        out.push('\n');
    }
    if let Some(comments) = comments {
        for text in comments.inside_for(KEY_LAST) {
            out.push_str(&format!("  // {}\n", text));
        }
    }
}

fn emit_outside(out: &mut String, comments: Option<&EntityComments>) {
    if let Some(comments) = comments {
        for line in &comments.outside {
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn emit_schedules(out: &mut String, model: &Model) {
    for (name, lines) in model.schedules() {
        emit_outside(out, model.comments().get(name));
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
}
