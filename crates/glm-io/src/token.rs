//! Line classification for GLM text.
//!
//! GLM is line-oriented: every meaningful line is a comment, a `#`
//! directive, a block opener, an attribute assignment, or a closing
//! brace. The parser walks a cursor of classified lines, so the
//! classification table lives here where it can be tested on its own.

/// `#` directive families that are captured and replayed verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Set,
    Define,
    Include,
}

/// Classification of one normalized source line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    /// `// ...` comment; `text` is the content after the slashes.
    Comment { text: String },
    /// `#set`/`#define`/`#include` line, kept verbatim (including a
    /// leading `//` on commented-out directives).
    Directive { kind: DirectiveKind, text: String },
    /// `keyword argument {` opener, or a terse forward declaration
    /// (`module climate;`).
    BlockOpen {
        keyword: String,
        /// Class or name after the keyword; empty for `clock {`.
        argument: String,
        /// `class:ID` backreference form, kept whole (`node:12`).
        oid: Option<String>,
        terse: bool,
        trailing_comment: Option<String>,
    },
    /// `key value;` with an optional trailing comment.
    Assignment {
        key: String,
        value: String,
        trailing_comment: Option<String>,
    },
    /// `}` or `};`
    Close,
    /// Anything the table does not recognize.
    Other,
}

/// Collapse tabs and trim; the parser skips lines that normalize empty.
pub fn normalize(raw: &str) -> String {
    raw.replace('\t', " ").trim().to_string()
}

const BLOCK_KEYWORDS: [&str; 5] = ["clock", "module", "class", "object", "schedule"];

/// Classify one normalized, non-empty line.
pub fn classify(line: &str) -> LineKind {
    if let Some(rest) = line.strip_prefix("//") {
        let rest_trimmed = rest.trim();
        // commented-out directives are preserved as directives so they
        // replay in the directive section, still disabled
        if let Some(kind) = directive_kind(rest_trimmed) {
            return LineKind::Directive {
                kind,
                text: line.to_string(),
            };
        }
        return LineKind::Comment {
            text: rest_trimmed.to_string(),
        };
    }

    if line.starts_with('#') {
        return match directive_kind(line) {
            Some(kind) => LineKind::Directive {
                kind,
                text: line.to_string(),
            },
            None => LineKind::Other,
        };
    }

    if line == "}" || line == "};" {
        return LineKind::Close;
    }

    let (body, trailing_comment) = split_trailing_comment(line);
    let body = body.trim();

    if body == "}" || body == "};" {
        return LineKind::Close;
    }

    if let Some(head) = body.strip_suffix('{') {
        let head = head.trim();
        let mut parts = head.splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or_default();
        if BLOCK_KEYWORDS.contains(&keyword) {
            let argument = parts.next().unwrap_or("").trim().to_string();
            let oid = argument.contains(':').then(|| argument.clone());
            return LineKind::BlockOpen {
                keyword: keyword.to_string(),
                argument,
                oid,
                terse: false,
                trailing_comment,
            };
        }
        return LineKind::Other;
    }

    if let Some(body) = body.strip_suffix(';') {
        let body = body.trim();
        let mut parts = body.splitn(2, char::is_whitespace);
        let first = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or("").trim();

        // terse forward declarations: `module climate;`, `object node:12;`
        if matches!(first, "module" | "class" | "object" | "schedule")
            && !rest.is_empty()
            && !rest.contains(' ')
        {
            let oid = rest.contains(':').then(|| rest.to_string());
            return LineKind::BlockOpen {
                keyword: first.to_string(),
                argument: rest.to_string(),
                oid,
                terse: true,
                trailing_comment,
            };
        }

        if first.is_empty() {
            return LineKind::Other;
        }
        return LineKind::Assignment {
            key: first.to_string(),
            value: rest.to_string(),
            trailing_comment,
        };
    }

    LineKind::Other
}

fn directive_kind(text: &str) -> Option<DirectiveKind> {
    if text.starts_with("#set") {
        Some(DirectiveKind::Set)
    } else if text.starts_with("#define") {
        Some(DirectiveKind::Define)
    } else if text.starts_with("#include") {
        Some(DirectiveKind::Include)
    } else {
        None
    }
}

/// Split `key value; // note` into the statement and the note. The `//`
/// must sit at the start or after whitespace so values like URLs are not
/// chopped.
fn split_trailing_comment(line: &str) -> (&str, Option<String>) {
    let mut search_from = 0;
    while let Some(offset) = line[search_from..].find("//") {
        let index = search_from + offset;
        let preceded_by_space = index == 0
            || line[..index]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace);
        if preceded_by_space {
            let comment = line[index + 2..].trim().to_string();
            return (&line[..index], Some(comment));
        }
        search_from = index + 2;
    }
    (line, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment() {
        assert_eq!(
            classify("// feeder head section"),
            LineKind::Comment {
                text: "feeder head section".to_string()
            }
        );
    }

    #[test]
    fn test_directives() {
        assert!(matches!(
            classify("#set minimum_timestep=15"),
            LineKind::Directive {
                kind: DirectiveKind::Set,
                ..
            }
        ));
        assert!(matches!(
            classify("#define VSOURCE=66395.28"),
            LineKind::Directive {
                kind: DirectiveKind::Define,
                ..
            }
        ));
        assert!(matches!(
            classify("#include \"schedules.glm\""),
            LineKind::Directive {
                kind: DirectiveKind::Include,
                ..
            }
        ));
        // commented-out directive keeps the slashes in its text
        let LineKind::Directive { kind, text } = classify("// #include \"extra.glm\"") else {
            panic!("expected directive");
        };
        assert_eq!(kind, DirectiveKind::Include);
        assert!(text.starts_with("//"));
    }

    #[test]
    fn test_unknown_macro_is_other() {
        assert_eq!(classify("#ifdef USE_FNCS"), LineKind::Other);
    }

    #[test]
    fn test_block_open_variants() {
        assert_eq!(
            classify("object overhead_line {"),
            LineKind::BlockOpen {
                keyword: "object".to_string(),
                argument: "overhead_line".to_string(),
                oid: None,
                terse: false,
                trailing_comment: None,
            }
        );
        assert_eq!(
            classify("clock {"),
            LineKind::BlockOpen {
                keyword: "clock".to_string(),
                argument: String::new(),
                oid: None,
                terse: false,
                trailing_comment: None,
            }
        );
        // backreference form keeps the whole class:ID token
        assert_eq!(
            classify("object node:12 {"),
            LineKind::BlockOpen {
                keyword: "object".to_string(),
                argument: "node:12".to_string(),
                oid: Some("node:12".to_string()),
                terse: false,
                trailing_comment: None,
            }
        );
    }

    #[test]
    fn test_terse_module_declaration() {
        assert_eq!(
            classify("module climate;"),
            LineKind::BlockOpen {
                keyword: "module".to_string(),
                argument: "climate".to_string(),
                oid: None,
                terse: true,
                trailing_comment: None,
            }
        );
    }

    #[test]
    fn test_terse_object_and_schedule_declarations() {
        assert_eq!(
            classify("object node:12;"),
            LineKind::BlockOpen {
                keyword: "object".to_string(),
                argument: "node:12".to_string(),
                oid: Some("node:12".to_string()),
                terse: true,
                trailing_comment: None,
            }
        );
        assert_eq!(
            classify("schedule dryer;"),
            LineKind::BlockOpen {
                keyword: "schedule".to_string(),
                argument: "dryer".to_string(),
                oid: None,
                terse: true,
                trailing_comment: None,
            }
        );
    }

    #[test]
    fn test_assignment() {
        assert_eq!(
            classify("nominal_voltage 7200;"),
            LineKind::Assignment {
                key: "nominal_voltage".to_string(),
                value: "7200".to_string(),
                trailing_comment: None,
            }
        );
        // quoted values with spaces stay whole
        assert_eq!(
            classify("starttime '2023-07-01 00:00:00';"),
            LineKind::Assignment {
                key: "starttime".to_string(),
                value: "'2023-07-01 00:00:00'".to_string(),
                trailing_comment: None,
            }
        );
    }

    #[test]
    fn test_assignment_with_inline_comment() {
        assert_eq!(
            classify("phases ABCN; // all three plus neutral"),
            LineKind::Assignment {
                key: "phases".to_string(),
                value: "ABCN".to_string(),
                trailing_comment: Some("all three plus neutral".to_string()),
            }
        );
    }

    #[test]
    fn test_macro_value_opaque() {
        assert_eq!(
            classify("voltage_A ${VSOURCE};"),
            LineKind::Assignment {
                key: "voltage_A".to_string(),
                value: "${VSOURCE}".to_string(),
                trailing_comment: None,
            }
        );
    }

    #[test]
    fn test_close() {
        assert_eq!(classify("}"), LineKind::Close);
        assert_eq!(classify("};"), LineKind::Close);
    }

    #[test]
    fn test_malformed_is_other() {
        assert_eq!(classify("this has no terminator"), LineKind::Other);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("\tname\tn1;  "), "name n1;");
        assert_eq!(normalize("   "), "");
    }
}
