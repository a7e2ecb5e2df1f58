//! An indentation-sensitive YAML subset in text mode: block objects and
//! lists through offside blocks, continuation lines through `Indent`, and
//! JSON-style flow values. Comments, anchors, and multi-document streams are
//! out of scope.

use descent::{build_parser, GrammarErrors, Mode, Parser};
use serde_json::Value;

use crate::json::{build_number, build_object, unescape};

pub fn yaml_parser() -> Result<Parser<Value>, GrammarErrors> {
    build_parser(Mode::text(), |g| {
        g.start("document");

        g.define("document", |g| {
            g.call("gap?");
            g.choice(|c| {
                c.case(|g| g.call("indented-object"));
                c.case(|g| g.call("indented-list"));
                c.case(|g| {
                    g.whitespace();
                    g.call("value");
                });
            });
            g.call("gap?");
            g.whitespace_newline();
        });

        // blank space up to and including line breaks
        g.define("gap?", |g| {
            g.repeat(0, 0, |g| {
                g.whitespace();
                g.newline();
            });
        });

        g.define("indented-value", |g| {
            g.choice(|c| {
                c.case(|g| g.call("indented-object"));
                c.case(|g| g.call("indented-list"));
                c.case(|g| g.call("value"));
            });
        });

        g.define("indented-object", |g| {
            g.capture("object", |g| {
                g.offside_block(|g| {
                    g.call("key");
                    g.whitespace();
                    g.string([":"]);
                    g.call("entry-value");
                    g.repeat(0, 0, |g| {
                        g.newline();
                        g.indent();
                        g.call("key");
                        g.whitespace();
                        g.string([":"]);
                        g.call("entry-value");
                    });
                });
            });
        });

        g.define("indented-list", |g| {
            g.capture("list", |g| {
                g.offside_block(|g| {
                    g.print("new list");
                    g.string(["-"]);
                    g.call("entry-value");
                    g.repeat(0, 0, |g| {
                        g.newline();
                        g.indent();
                        g.string(["-"]);
                        g.call("entry-value");
                    });
                });
            });
        });

        // the value of one `key:` or `-` entry, inline or on a deeper line
        g.define("entry-value", |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.whitespace();
                    g.call("indented-value");
                });
                c.case(|g| {
                    g.whitespace();
                    g.newline();
                    g.indent();
                    g.rune_range([" ", "\t"]);
                    g.whitespace();
                    g.call("indented-value");
                });
            });
        });

        g.define("key", |g| {
            g.choice(|c| {
                c.case(|g| g.call("string"));
                c.case(|g| {
                    g.capture("key", |g| {
                        g.rune_range(["a-z", "A-Z", "_"]);
                        g.repeat(0, 0, |g| g.rune_range(["a-z", "A-Z", "_", "0-9"]));
                    });
                });
            });
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
                            g.rune_range_inverted(["\r", "\n"]);
                        });
                    });
                });
            });
            g.string(["\""]);
        });

        g.define("number", |g| {
            g.capture("number", |g| {
                g.optional(|g| g.string(["-"]));
                g.repeat(1, 0, |g| g.rune_range(["0-9"]));
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
        g.builder("key", |s, _args| Ok(Value::String(s.to_string())));
        g.builder("number", |s, _args| build_number(s));
        g.builder("true", |_s, _args| Ok(Value::Bool(true)));
        g.builder("false", |_s, _args| Ok(Value::Bool(false)));
        g.builder("null", |_s, _args| Ok(Value::Null));
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parsed(src: &str) -> Value {
        let _ = env_logger::builder().is_test(true).try_init();
        let parser = yaml_parser().expect("grammar should build");
        parser.parse(src).expect("parse should succeed")
    }

    #[test]
    fn grammar_builds() {
        yaml_parser().expect("grammar should build");
    }

    #[test]
    fn flow_values() {
        assert_eq!(parsed("[1,2,3]"), json!([1, 2, 3]));
        assert_eq!(parsed(r#"{"A":1}"#), json!({"A": 1}));
        assert_eq!(parsed("42"), json!(42));
        assert_eq!(parsed("true"), json!(true));
    }

    #[test]
    fn single_pair() {
        assert_eq!(parsed("a: 1"), json!({"a": 1}));
    }

    #[test]
    fn block_object() {
        assert_eq!(
            parsed("a: 1\nb: 2\n"),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn block_list() {
        assert_eq!(parsed("- 1\n- 2\n- 3\n"), json!([1, 2, 3]));
    }

    #[test]
    fn nested_object_value() {
        assert_eq!(
            parsed("a:\n b: 1\n"),
            json!({"a": {"b": 1}})
        );
    }

    #[test]
    fn nested_list() {
        assert_eq!(
            parsed("- 1\n- \n - 2\n - 3\n"),
            json!([1, [2, 3]])
        );
    }

    #[test]
    fn inconsistent_indent_is_rejected() {
        let parser = yaml_parser().unwrap();
        assert!(parser.parse_tree("- 1\n - 2\n").is_err());
    }
}
