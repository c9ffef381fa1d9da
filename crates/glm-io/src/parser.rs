//! Recursive-descent block parser for GLM text.
//!
//! One routine per block kind: `clock`/`module`/`class` attribute blocks,
//! `object` blocks (recursive, with `parent` injection for nesting), and
//! `schedule` blocks captured verbatim. The parser is best-effort: only an
//! unterminated block is fatal. Lines it cannot place are dropped with an
//! `unparsed-line` diagnostic and counted in [`ParseStats`].

use glm_core::comments::{KEY_LAST, KEY_NAME};
use glm_core::{Diagnostics, GlmError, GlmResult, Model, ParseStats, SchemaRegistry};

use crate::token::{classify, normalize, DirectiveKind, LineKind};

/// Parser output: the model plus everything observed along the way.
#[derive(Debug)]
pub struct ParseResult {
    pub model: Model,
    pub diagnostics: Diagnostics,
    pub stats: ParseStats,
}

/// Parse GLM text against the bundled schema.
pub fn parse_str(text: &str) -> GlmResult<ParseResult> {
    let mut diag = Diagnostics::new();
    let model = Model::with_bundled_schema(&mut diag)?;
    Parser::new(model, diag, text).run()
}

/// Parse GLM text against a caller-supplied schema registry.
pub fn parse_str_with_schema(text: &str, schema: SchemaRegistry) -> GlmResult<ParseResult> {
    Parser::new(Model::new(schema), Diagnostics::new(), text).run()
}

struct Parser {
    /// (1-based line number, normalized text), blanks dropped.
    lines: Vec<(usize, String)>,
    pos: usize,
    model: Model,
    diag: Diagnostics,
    stats: ParseStats,
    /// Comment lines waiting to attach above the next top-level block.
    pending_outside: Vec<String>,
}

/// Attribute line buffered until the owning object's identity is known.
struct BufferedAttr {
    key: String,
    value: String,
    inline: Option<String>,
    inside: Vec<String>,
}

impl Parser {
    fn new(model: Model, diag: Diagnostics, text: &str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(i, raw)| (i + 1, normalize(raw)))
            .filter(|(_, line)| !line.is_empty())
            .collect();
        Self {
            lines,
            pos: 0,
            model,
            diag,
            stats: ParseStats::default(),
            pending_outside: Vec::new(),
        }
    }

    fn next_line(&mut self) -> Option<(usize, String)> {
        let line = self.lines.get(self.pos).cloned();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn run(mut self) -> GlmResult<ParseResult> {
        while let Some((lineno, text)) = self.next_line() {
            match classify(&text) {
                LineKind::Comment { text } => {
                    self.pending_outside.push(format!("// {}", text));
                }
                LineKind::Directive { kind, text } => {
                    self.stats.directives += 1;
                    match kind {
                        DirectiveKind::Set => self.model.push_set_line(text),
                        DirectiveKind::Define => self.model.push_define_line(text),
                        DirectiveKind::Include => self.model.push_include_line(text),
                    }
                }
                LineKind::BlockOpen {
                    keyword,
                    argument,
                    oid,
                    terse,
                    trailing_comment,
                } => match keyword.as_str() {
                    "clock" => self.parse_clock(lineno)?,
                    "module" | "class" => {
                        self.parse_module_or_class(&keyword, &argument, terse, lineno)?
                    }
                    "schedule" => {
                        if terse {
                            self.stats.schedules += 1;
                            self.take_outside_comments(&argument);
                            self.model
                                .add_schedule(&argument, vec![format!("schedule {};", argument)]);
                        } else {
                            self.parse_schedule(&argument, lineno)?;
                        }
                    }
                    "object" => {
                        if terse {
                            self.declare_forward_object(&argument, oid.as_deref());
                        } else {
                            self.parse_object(
                                &argument,
                                oid.as_deref(),
                                None,
                                trailing_comment,
                                lineno,
                            )?;
                        }
                    }
                    other => {
                        self.skip_line(lineno, &format!("unexpected block keyword '{}'", other));
                    }
                },
                LineKind::Assignment { .. } | LineKind::Close | LineKind::Other => {
                    self.skip_line(lineno, &format!("cannot place line '{}'", text));
                }
            }
        }

        self.model.finalize(&mut self.diag);
        Ok(ParseResult {
            model: self.model,
            diagnostics: self.diag,
            stats: self.stats,
        })
    }

    fn skip_line(&mut self, lineno: usize, message: &str) {
        self.diag.add_warning_at_line("unparsed-line", message, lineno);
        self.stats.skipped_lines += 1;
    }

    /// `clock { ... }`: attributes go straight onto the model's clock
    /// instance; comments attach under the `clock` identity.
    fn parse_clock(&mut self, open_line: usize) -> GlmResult<()> {
        self.stats.modules += 1;
        self.take_outside_comments("clock");
        let mut pending_inside: Vec<String> = Vec::new();

        loop {
            let Some((lineno, text)) = self.next_line() else {
                return Err(unterminated("clock", "clock", open_line));
            };
            match classify(&text) {
                LineKind::Comment { text } => pending_inside.push(text),
                LineKind::Assignment {
                    key,
                    value,
                    trailing_comment,
                } => {
                    let entry = self.model.comments_mut().entry_mut("clock");
                    for comment in pending_inside.drain(..) {
                        entry.push_inside(&key, comment);
                    }
                    if let Some(comment) = trailing_comment {
                        entry.set_inline(&key, comment);
                    }
                    self.model.set_clock_attribute_raw(&key, &value);
                }
                LineKind::Close => {
                    let entry = self.model.comments_mut().entry_mut("clock");
                    for comment in pending_inside.drain(..) {
                        entry.push_inside(KEY_LAST, comment);
                    }
                    return Ok(());
                }
                _ => self.skip_line(lineno, &format!("cannot place line '{}' in clock", text)),
            }
        }
    }

    /// `module X { ... }`, `class X { ... }`, or the terse `module X;`.
    fn parse_module_or_class(
        &mut self,
        keyword: &str,
        name: &str,
        terse: bool,
        open_line: usize,
    ) -> GlmResult<()> {
        if keyword == "module" {
            self.stats.modules += 1;
            self.model.declare_module(name);
        } else {
            self.stats.classes += 1;
            self.model.declare_class(name);
        }
        self.take_outside_comments(name);
        if terse {
            return Ok(());
        }

        let mut pending_inside: Vec<String> = Vec::new();
        loop {
            let Some((lineno, text)) = self.next_line() else {
                return Err(unterminated(keyword, name, open_line));
            };
            match classify(&text) {
                LineKind::Comment { text } => pending_inside.push(text),
                LineKind::Assignment {
                    key,
                    value,
                    trailing_comment,
                } => {
                    let entry = self.model.comments_mut().entry_mut(name);
                    for comment in pending_inside.drain(..) {
                        entry.push_inside(&key, comment);
                    }
                    if let Some(comment) = trailing_comment {
                        entry.set_inline(&key, comment);
                    }
                    self.model
                        .set_module_attribute_raw(name, &key, &value, &mut self.diag);
                }
                LineKind::Close => {
                    let entry = self.model.comments_mut().entry_mut(name);
                    for comment in pending_inside.drain(..) {
                        entry.push_inside(KEY_LAST, comment);
                    }
                    return Ok(());
                }
                _ => self.skip_line(
                    lineno,
                    &format!("cannot place line '{}' in {} {}", text, keyword, name),
                ),
            }
        }
    }

    /// `schedule name { ... }` captured verbatim with two-space
    /// re-indentation per brace depth; nested braces are legal.
    fn parse_schedule(&mut self, name: &str, open_line: usize) -> GlmResult<()> {
        self.stats.schedules += 1;
        self.take_outside_comments(name);

        let mut lines = vec![format!("schedule {} {{", name)];
        let mut depth: usize = 1;
        loop {
            let Some((_, text)) = self.next_line() else {
                return Err(unterminated("schedule", name, open_line));
            };
            let opens = text.matches('{').count();
            let closes = text.matches('}').count();
            let new_depth = (depth + opens).saturating_sub(closes);
            if new_depth == 0 {
                lines.push("}".to_string());
                self.model.add_schedule(name, lines);
                return Ok(());
            }
            let indent = "  ".repeat(depth.min(new_depth));
            lines.push(format!("{}{}", indent, text));
            depth = new_depth;
        }
    }

    /// `object <class>;` / `object <class>:<id>;` forward declaration:
    /// creates an empty instance a later full definition merges into.
    fn declare_forward_object(&mut self, argument: &str, oid: Option<&str>) {
        self.stats.objects += 1;
        let class = argument.split(':').next().unwrap_or(argument).to_string();
        let registered = oid
            .and_then(|o| self.model.oid_identity(o))
            .map(str::to_string);
        let identity = match registered {
            Some(existing) => existing,
            None => self.model.next_synthetic_identity(&class),
        };
        self.model.declare_object(&class, &identity, &mut self.diag);
        if let Some(oid) = oid {
            self.model.register_oid(oid, &identity);
        }
        self.take_outside_comments(&identity);
    }

    /// Consume a block's lines without touching the model, tracking
    /// nesting depth. Used to drop the children of a discarded block.
    fn skip_block(&mut self, keyword: &str, name: &str, open_line: usize) -> GlmResult<()> {
        let mut depth = 1usize;
        while depth > 0 {
            let Some((_, text)) = self.next_line() else {
                return Err(unterminated(keyword, name, open_line));
            };
            match classify(&text) {
                LineKind::BlockOpen { terse: false, .. } => depth += 1,
                LineKind::Close => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// `object class { ... }`, recursive. `parent` carries the enclosing
    /// object's identity for nested blocks; it wins over any explicit
    /// `parent` line in the body. Returns the final identity.
    fn parse_object(
        &mut self,
        argument: &str,
        oid: Option<&str>,
        parent: Option<&str>,
        trailing_comment: Option<String>,
        open_line: usize,
    ) -> GlmResult<String> {
        self.stats.objects += 1;
        let class = argument.split(':').next().unwrap_or(argument).to_string();
        let outside = std::mem::take(&mut self.pending_outside);

        let mut identity: Option<String> = None;
        // the instance exists in the model only once the identity is known
        let mut flushed = false;
        // false when the identity clashed and the block is being discarded
        let mut active = true;
        let mut buffered: Vec<BufferedAttr> = Vec::new();
        let mut name_inside: Vec<String> = Vec::new();
        let mut pending_inside: Vec<String> = Vec::new();
        if let Some(comment) = trailing_comment {
            pending_inside.push(comment);
        }

        // a backreference already registered by a forward declaration pins
        // the identity up front; a `name` line in the body renames it
        let forward = oid
            .and_then(|o| self.model.oid_identity(o))
            .map(str::to_string);
        if let Some(existing) = forward {
            identity = Some(existing.clone());
            flushed = true;
            active = self.flush_object(
                &class,
                &existing,
                parent,
                &outside,
                &name_inside,
                &mut buffered,
            );
        }

        loop {
            let Some((lineno, text)) = self.next_line() else {
                return Err(unterminated("object", &class, open_line));
            };
            match classify(&text) {
                LineKind::Comment { text } => pending_inside.push(text),
                LineKind::Assignment {
                    key,
                    value,
                    trailing_comment,
                } if key == "name" => {
                    if let Some(current) = identity.clone() {
                        // name arriving after the identity was synthesized
                        // for a nested child; rename keeps the child's
                        // parent reference correct
                        if active && self.model.rename_object(&class, &current, &value) {
                            identity = Some(value.clone());
                        }
                    } else {
                        identity = Some(value.clone());
                        name_inside.append(&mut pending_inside);
                        flushed = true;
                        active = self.flush_object(
                            &class,
                            &value,
                            parent,
                            &outside,
                            &name_inside,
                            &mut buffered,
                        );
                    }
                    if active {
                        if let Some(comment) = trailing_comment {
                            if let Some(id) = &identity {
                                self.model
                                    .comments_mut()
                                    .entry_mut(id)
                                    .set_inline(KEY_NAME, comment);
                            }
                        }
                        for comment in pending_inside.drain(..) {
                            if let Some(id) = &identity {
                                self.model
                                    .comments_mut()
                                    .entry_mut(id)
                                    .push_inside(KEY_NAME, comment);
                            }
                        }
                    } else {
                        pending_inside.clear();
                    }
                }
                LineKind::Assignment {
                    key,
                    value,
                    trailing_comment,
                } => {
                    if flushed {
                        if active {
                            let id = identity.clone().unwrap_or_default();
                            let entry = self.model.comments_mut().entry_mut(&id);
                            for comment in pending_inside.drain(..) {
                                entry.push_inside(&key, comment);
                            }
                            if let Some(comment) = trailing_comment {
                                entry.set_inline(&key, comment);
                            }
                            self.model
                                .set_object_attribute_raw(&class, &id, &key, &value, &mut self.diag);
                        } else {
                            pending_inside.clear();
                        }
                    } else {
                        buffered.push(BufferedAttr {
                            key,
                            value,
                            inline: trailing_comment,
                            inside: std::mem::take(&mut pending_inside),
                        });
                    }
                }
                LineKind::BlockOpen {
                    keyword,
                    argument,
                    oid: child_oid,
                    terse: false,
                    trailing_comment,
                } if keyword == "object" => {
                    // a discarded block discards its children too
                    if !active {
                        self.skip_block("object", &argument, lineno)?;
                        continue;
                    }
                    // nesting forces the enclosing identity into existence
                    if identity.is_none() {
                        let synthesized = self.model.next_synthetic_identity(&class);
                        identity = Some(synthesized.clone());
                        flushed = true;
                        active = self.flush_object(
                            &class,
                            &synthesized,
                            parent,
                            &outside,
                            &name_inside,
                            &mut buffered,
                        );
                    }
                    let enclosing = identity.clone().unwrap_or_default();
                    self.parse_object(
                        &argument,
                        child_oid.as_deref(),
                        Some(&enclosing),
                        trailing_comment,
                        lineno,
                    )?;
                }
                LineKind::Close => break,
                _ => self.skip_line(
                    lineno,
                    &format!("cannot place line '{}' in object {}", text, class),
                ),
            }
        }

        // anonymous object with no nesting: identity synthesized at close
        let identity = match identity {
            Some(id) => id,
            None => self.model.next_synthetic_identity(&class),
        };
        if !flushed {
            active = self.flush_object(
                &class,
                &identity,
                parent,
                &outside,
                &name_inside,
                &mut buffered,
            );
        }
        if active {
            // the containment relation wins over any explicit parent line
            if let Some(parent) = parent {
                self.model
                    .set_object_attribute_raw(&class, &identity, "parent", parent, &mut self.diag);
            }
            if let Some(oid) = oid {
                self.model.register_oid(oid, &identity);
            }
            let entry = self.model.comments_mut().entry_mut(&identity);
            for comment in pending_inside.drain(..) {
                entry.push_inside(KEY_LAST, comment);
            }
        }
        Ok(identity)
    }

    /// Create the instance and drain everything buffered before the
    /// identity was known. Returns false when the identity clashed and the
    /// rest of the block should be discarded.
    fn flush_object(
        &mut self,
        class: &str,
        identity: &str,
        parent: Option<&str>,
        outside: &[String],
        name_inside: &[String],
        buffered: &mut Vec<BufferedAttr>,
    ) -> bool {
        if !self.model.declare_object(class, identity, &mut self.diag) {
            buffered.clear();
            return false;
        }

        let entry = self.model.comments_mut().entry_mut(identity);
        for line in outside {
            entry.push_outside(line.clone());
        }
        for comment in name_inside {
            entry.push_inside(KEY_NAME, comment.clone());
        }

        // a nested block's parent slot goes in first so it serializes at
        // the top; the final value is re-asserted when the block closes
        if let Some(parent) = parent {
            self.model
                .set_object_attribute_raw(class, identity, "parent", parent, &mut self.diag);
        }

        for attr in buffered.drain(..) {
            let entry = self.model.comments_mut().entry_mut(identity);
            for comment in attr.inside {
                entry.push_inside(&attr.key, comment);
            }
            if let Some(comment) = attr.inline {
                entry.set_inline(&attr.key, comment);
            }
            self.model
                .set_object_attribute_raw(class, identity, &attr.key, &attr.value, &mut self.diag);
        }
        true
    }

    fn take_outside_comments(&mut self, identity: &str) {
        if self.pending_outside.is_empty() {
            return;
        }
        let outside = std::mem::take(&mut self.pending_outside);
        let entry = self.model.comments_mut().entry_mut(identity);
        for line in outside {
            entry.push_outside(line);
        }
    }
}

fn unterminated(keyword: &str, name: &str, open_line: usize) -> GlmError {
    GlmError::Structural(format!(
        "block '{} {}' opened at line {} never closed",
        keyword, name, open_line
    ))
}
