//! A JSON parser in string mode. Escape sequences commit with `Cut`, so a
//! malformed escape fails the whole string instead of backtracking into the
//! plain-character alternative.

use descent::{build_parser, BoxError, GrammarErrors, Mode, Parser};
use serde_json::{Map, Number, Value};

pub fn json_parser() -> Result<Parser<Value>, GrammarErrors> {
    build_parser(Mode::string(), |g| {
        g.start("document");

        g.define("document", |g| {
            g.whitespace();
            g.lookahead(|g| g.string(["{", "["]));
            g.call("value");
            g.whitespace();
        });

        g.define("value", |g| {
            g.choice(|c| {
                c.case(|g| g.call("list"));
                c.case(|g| g.call("object"));
                c.case(|g| g.call("string"));
                c.case(|g| g.call("number"));
                c.case(|g| g.capture("true", |g| g.string(["true"])));
                c.case(|g| g.capture("false", |g| g.string(["false"])));
                c.case(|g| g.capture("null", |g| g.string(["null"])));
            });
        });

        g.define("list", |g| {
            g.string(["["]);
            g.whitespace();
            g.capture("list", |g| {
                g.optional(|g| {
                    g.call("value");
                    g.repeat(0, 0, |g| {
                        g.whitespace();
                        g.string([","]);
                        g.whitespace();
                        g.call("value");
                    });
                });
            });
            g.whitespace();
            g.string(["]"]);
        });

        g.define("object", |g| {
            g.string(["{"]);
            g.whitespace();
            g.capture("object", |g| {
                g.optional(|g| {
                    g.call("string");
                    g.whitespace();
                    g.string([":"]);
                    g.whitespace();
                    g.call("value");
                    g.whitespace();
                    g.repeat(0, 0, |g| {
                        g.string([","]);
                        g.whitespace();
                        g.call("string");
                        g.whitespace();
                        g.string([":"]);
                        g.whitespace();
                        g.call("value");
                        g.whitespace();
                    });
                });
            });
            g.string(["}"]);
        });

        g.define("string", |g| {
            g.string(["\""]);
            g.capture("string", |g| {
                g.repeat(0, 0, |g| {
                    g.choice(|c| {
                        c.case(|g| {
                            g.string(["\\u"]);
                            g.cut();
                            g.rune_range(["0-9", "a-f", "A-F"]);
                            g.rune_range(["0-9", "a-f", "A-F"]);
                            g.rune_range(["0-9", "a-f", "A-F"]);
                            g.rune_range(["0-9", "a-f", "A-F"]);
                        });
                        c.case(|g| {
                            g.string(["\\"]);
                            g.cut();
                            g.string(["\"", "\\", "/", "b", "f", "n", "r", "t"]);
                        });
                        c.case(|g| {
                            g.reject(|g| g.string(["\\", "\""]));
                            g.rune();
                        });
                    });
                });
            });
            g.string(["\""]);
        });

        g.define("number", |g| {
            g.capture("number", |g| {
                g.optional(|g| g.string(["-"]));
                g.choice(|c| {
                    c.case(|g| g.string(["0"]));
                    c.case(|g| {
                        g.rune_range(["1-9"]);
                        g.repeat(0, 0, |g| g.rune_range(["0-9"]));
                    });
                });
                g.optional(|g| {
                    g.string(["."]);
                    g.repeat(1, 0, |g| g.rune_range(["0-9"]));
                });
                g.optional(|g| {
                    g.string(["e", "E"]);
                    g.optional(|g| g.string(["+", "-"]));
                    g.repeat(1, 0, |g| g.rune_range(["0-9"]));
                });
            });
        });

        g.builder("list", |_s, args| Ok(Value::Array(args)));
        g.builder("object", |_s, args| build_object(args));
        g.builder("string", |s, _args| Ok(Value::String(unescape(s)?)));
        g.builder("number", |s, _args| build_number(s));
        g.builder("true", |_s, _args| Ok(Value::Bool(true)));
        g.builder("false", |_s, _args| Ok(Value::Bool(false)));
        g.builder("null", |_s, _args| Ok(Value::Null));
    })
}

pub(crate) fn build_object(args: Vec<Value>) -> Result<Value, BoxError> {
    let mut map = Map::with_capacity(args.len() / 2);
    let mut args = args.into_iter();
    while let Some(key) = args.next() {
        let value = args.next().ok_or("object key without a value")?;
        match key {
            Value::String(key) => {
                map.insert(key, value);
            }
            other => return Err(format!("object key is not a string: {other}").into()),
        }
    }
    Ok(Value::Object(map))
}

pub(crate) fn build_number(raw: &str) -> Result<Value, BoxError> {
    let fractional = raw.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'));
    if !fractional {
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
    }
    let f: f64 = raw.parse()?;
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "number out of range".into())
}

pub(crate) fn unescape(raw: &str) -> Result<String, BoxError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&code, 16)?;
                match char::from_u32(code) {
                    Some(c) => out.push(c),
                    None => return Err(format!("invalid escape \\u{code:04x}").into()),
                }
            }
            other => return Err(format!("invalid escape {other:?}").into()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(src: &str) {
        let parser = json_parser().expect("grammar should build");
        let ours = parser.parse(src).expect("parse should succeed");
        let reference: Value = serde_json::from_str(src).expect("reference decoder agrees");
        assert_eq!(ours, reference, "round trip mismatch for {src:?}");
    }

    #[test]
    fn grammar_builds() {
        json_parser().expect("grammar should build");
    }

    #[test]
    fn parses_flat_list() {
        let parser = json_parser().unwrap();
        let tree = parser.parse_tree("[1,2,3]").unwrap();
        let root = tree.root();
        assert_eq!(root.name(), "list");
        assert_eq!(root.child_count(), 3);
        let spans: Vec<&str> = root.children().map(|n| n.text()).collect();
        assert_eq!(spans, ["1", "2", "3"]);
    }

    #[test]
    fn round_trips_match_reference_decoder() {
        round_trip("[1,2,3]");
        round_trip(r#"{"A":1}"#);
        round_trip(r#"{"a": [1, 2.5, -3e2], "b": {"nested": null}, "c": [true, false]}"#);
        round_trip(r#"["plain", "esc\n\t\"quote\"", "\u0041"]"#);
        round_trip("[]");
        round_trip("{}");
        round_trip("[0, -7, 10, 1.25e-3]");
    }

    #[test]
    fn rejects_malformed_documents() {
        let parser = json_parser().unwrap();
        for src in ["", "1", "[1,", "{\"a\" 1}", "[\"\\x\"]", "[01]"] {
            assert!(parser.parse_tree(src).is_err(), "{src:?} should not parse");
        }
    }

    #[test]
    fn escape_cut_commits() {
        let parser = json_parser().unwrap();
        // "\q" reaches the escape case, cuts, then fails; the
        // plain-character alternative must not rescue it
        assert!(parser.parse_tree(r#"["\q"]"#).is_err());
    }
}
