//! Grammar construction errors: builder misuse, closure and reachability,
//! nullability declarations, left-recursion declarations, mode gating.

use descent::{build_grammar, GrammarErrors, Mode};

fn errors(body: impl FnOnce(&mut descent::GrammarBuilder<()>)) -> GrammarErrors {
    build_grammar(Mode::string(), body).err().expect("grammar should be rejected")
}

fn messages(errors: &GrammarErrors) -> String {
    errors.to_string()
}

#[test]
fn empty_grammar_is_rejected() {
    let errs = errors(|_g| {});
    assert!(messages(&errs).contains("starting rule undefined"));
}

#[test]
fn missing_start_rule() {
    let errs = errors(|g| g.start("missing"));
    assert!(messages(&errs).contains("starting rule \"missing\" is missing"));
}

#[test]
fn missing_called_rule() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.call("missing"));
    });
    assert!(messages(&errs).contains("missing rule \"missing\""));
}

#[test]
fn unused_rule_is_reported() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.string(["x"]));
        g.define("orphan", |g| g.string(["y"]));
    });
    assert!(messages(&errs).contains("unused rule \"orphan\""));
}

#[test]
fn nested_define_is_rejected() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.define("inner", |g| g.string(["x"]));
        });
    });
    assert!(messages(&errs).contains("cannot call define inside define"));
}

#[test]
fn operations_outside_define_are_rejected() {
    let errs = errors(|g| {
        g.string(["x"]);
    });
    assert!(messages(&errs).contains("inside define"));
}

#[test]
fn duplicate_rule_is_rejected() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.string(["x"]));
        g.define("expr", |g| g.string(["y"]));
    });
    assert!(messages(&errs).contains("cannot redefine \"expr\""));
}

#[test]
fn cut_must_sit_directly_in_a_choice_case() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.string(["x"]);
            g.cut();
        });
    });
    assert!(messages(&errs).contains("Cut must appear directly inside a Choice case"));

    // nested one level deeper than the case is still an error
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.sequence(|g| g.cut());
                });
            });
        });
    });
    assert!(messages(&errs).contains("Cut must appear directly inside a Choice case"));
}

#[test]
fn byte_actions_are_rejected_outside_binary_mode() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.byte());
    });
    assert!(messages(&errs).contains("Byte is not allowed in string mode"));
}

#[test]
fn indentation_is_rejected_in_string_mode() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.indented_block(|g| g.string(["x"]));
        });
    });
    assert!(messages(&errs).contains("IndentedBlock is not allowed in string mode"));
}

#[test]
fn reserved_characters_in_text_literals() {
    let result = build_grammar::<()>(Mode::text(), |g| {
        g.start("expr");
        g.define("expr", |g| g.string(["a\tb"]));
    });
    let errs = result.err().expect("grammar should be rejected");
    assert!(messages(&errs).contains("reserved"));
}

#[test]
fn empty_and_missing_literals() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.string(std::iter::empty::<&str>()));
    });
    assert!(messages(&errs).contains("missing operand"));

    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.string([""]));
    });
    assert!(messages(&errs).contains("empty string alternate"));
}

#[test]
fn invalid_range_specifications() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.rune_range(["z-a"]));
    });
    assert!(messages(&errs).contains("invalid range specification"));

    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.rune_range(["a-"]));
    });
    assert!(messages(&errs).contains("invalid range specification"));
}

#[test]
fn nullable_rules_must_declare_it() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.optional(|g| g.string(["x"])));
    });
    assert!(messages(&errs).contains("not declared nullable"));
}

#[test]
fn declared_nullable_rules_must_be_nullable() {
    let errs = errors(|g| {
        g.start("expr?");
        g.define("expr?", |g| g.string(["x"]));
    });
    assert!(messages(&errs).contains("declared nullable but cannot match empty"));
}

#[test]
fn undeclared_left_recursion_is_rejected() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.call("expr");
                    g.string(["+"]);
                });
                c.case(|g| g.string(["1"]));
            });
        });
    });
    assert!(messages(&errs).contains("left recursion must be declared"));
}

#[test]
fn mutual_left_recursion_is_rejected() {
    let errs = errors(|g| {
        g.start("a");
        g.define("a", |g| {
            g.choice(|c| {
                c.case(|g| g.call("b"));
                c.case(|g| g.string(["x"]));
            });
        });
        g.define("b", |g| {
            g.call("a");
            g.string(["y"]);
        });
    });
    assert!(messages(&errs).contains("left recursion"));
}

#[test]
fn declared_mutual_left_recursion_is_rejected() {
    let errs = errors(|g| {
        g.start("a");
        g.define_recursive("a", &["a"], |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.call("b");
                    g.string(["+"]);
                });
                c.case(|g| {
                    g.no_corner("a", 2);
                    g.string(["x"]);
                });
            });
        });
        g.define("b", |g| g.call("a"));
    });
    assert!(messages(&errs).contains("mutual left recursion is not supported"));
}

#[test]
fn recursion_declared_without_left_recursion() {
    let errs = errors(|g| {
        g.start("expr");
        g.define_recursive("expr", &["expr"], |g| {
            g.no_corner("expr", 1);
            g.string(["x"]);
        });
    });
    assert!(messages(&errs).contains("declared recursive but has no left recursion"));
}

#[test]
fn recursion_markers_require_a_declaration() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.recur("expr"));
    });
    assert!(messages(&errs).contains("not declared recursive"));
}

#[test]
fn builders_and_captures_must_pair_up() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.capture("lonely", |g| g.string(["x"]));
        });
        g.builder("orphan", |_s, _args| Ok(()));
    });
    let text = messages(&errs);
    assert!(text.contains("builder \"orphan\" has no matching capture"));
    assert!(text.contains("capture \"lonely\" has no builder"));
}

#[test]
fn duplicate_builders_are_rejected() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.capture("x", |g| g.string(["x"]));
        });
        g.builder("x", |_s, _args| Ok(()));
        g.builder("x", |_s, _args| Ok(()));
    });
    assert!(messages(&errs).contains("builder \"x\" already registered"));
}

#[test]
fn errors_carry_call_sites() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.call("missing"));
    });
    let error = &errs.errors()[0];
    assert!(error.site.file().ends_with("errors.rs"));
    assert!(error.site.line() > 0);
    assert_eq!(error.rule.as_deref(), Some("expr"));
}

#[test]
fn first_error_suppresses_dependent_operations() {
    let errs = errors(|g| {
        g.start("expr");
        g.string(["outside"]);
        g.define("expr", |g| g.string(["x"]));
    });
    // only the misplaced operation is reported; the later define is skipped,
    // not reported as a second failure
    assert_eq!(errs.len(), 1);
}

#[test]
fn repeat_bounds_are_checked() {
    let errs = errors(|g| {
        g.start("expr");
        g.define("expr", |g| g.repeat(3, 2, |g| g.string(["x"])));
    });
    assert!(messages(&errs).contains("repeat minimum exceeds maximum"));
}
