//! End-to-end behavior of compiled parsers: literals, backtracking, cut,
//! captures, indentation, dispatch, and left recursion.

use descent::{build_parser, Mode, NodeRef, ParseTree, Parser};

fn parser(body: impl FnOnce(&mut descent::GrammarBuilder<()>)) -> Parser<()> {
    build_parser(Mode::string(), body).expect("grammar should build")
}

fn text_parser(body: impl FnOnce(&mut descent::GrammarBuilder<()>)) -> Parser<()> {
    build_parser(Mode::text(), body).expect("grammar should build")
}

fn names(tree: &ParseTree<'_>) -> Vec<String> {
    (0..tree.node_count() as u32)
        .map(|i| tree.node(i).name().to_string())
        .collect()
}

#[test]
fn literal_rule_matches_completely() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| g.string(["true", "false"]));
    });
    let tree = p.parse_tree("true").unwrap();
    let root = tree.root();
    assert_eq!(root.name(), "expr");
    assert_eq!((root.span().start(), root.span().end()), (0, 4));
    assert_eq!(tree.node_count(), 1);
    assert!(p.parse_tree("blue").is_err());
    assert!(p.parse_tree("truex").is_err(), "trailing input must fail");
    assert!(p.parse_tree("").is_err());
}

#[test]
fn optional_suffix_after_call() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.call("truerule");
                    g.optional(|g| g.string(["y"]));
                });
                c.case(|g| g.call("falserule"));
            });
        });
        g.define("truerule", |g| g.string(["true"]));
        g.define("falserule", |g| g.string(["false"]));
    });
    assert!(p.test_matches(&["true", "truey", "false"], &["blue", "", "truex"]));
    assert!(p.test_rule("truerule", &["true"], &["", "bad", "true more"]));
}

fn nested_capture_parser() -> Parser<()> {
    parser(|g| {
        g.start("main");
        g.define("main", |g| {
            g.capture("main", |g| {
                g.string(["A"]);
                g.choice(|c| {
                    c.case(|g| g.capture("bcd", |g| g.string(["BCD"])));
                    c.case(|g| {
                        g.capture("b", |g| {
                            g.capture("b2", |g| g.string(["B"]));
                            g.capture("c", |g| g.string(["C"]));
                        });
                    });
                });
            });
        });
    })
}

#[test]
fn nested_captures_build_in_arena_order() {
    let p = nested_capture_parser();

    let tree = p.parse_tree("ABC").unwrap();
    assert_eq!(names(&tree), ["b2", "c", "b", "main"]);
    let root = tree.root();
    assert_eq!(root.name(), "main");
    assert_eq!(root.text(), "ABC");
    let b = root.children().next().unwrap();
    assert_eq!(b.name(), "b");
    let inner: Vec<&str> = b.children().map(|n| n.name()).collect();
    assert_eq!(inner, ["b2", "c"]);

    let tree = p.parse_tree("ABCD").unwrap();
    assert_eq!(names(&tree), ["bcd", "main"]);
    let bcd = tree.root().children().next().unwrap();
    assert_eq!(bcd.text(), "BCD");
    assert_eq!((bcd.span().start(), bcd.span().end()), (1, 4));
}

#[test]
fn parsing_is_deterministic() {
    let p = nested_capture_parser();
    let first = p.parse_tree("ABC").unwrap();
    let second = p.parse_tree("ABC").unwrap();
    assert_eq!(first, second);
}

#[test]
fn capture_spans_contain_children_in_order() {
    let p = nested_capture_parser();
    let tree = p.parse_tree("ABC").unwrap();
    tree.walk(|node: NodeRef<'_, '_>| {
        let mut end = node.span().start();
        for child in node.children() {
            assert!(child.span().start() >= end, "children must be ordered");
            assert!(child.span().end() <= node.span().end());
            end = child.span().end();
        }
    });
}

#[test]
fn cut_commits_to_a_choice_case() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.string(["a"]);
                    g.cut();
                    g.string(["x"]);
                });
                c.case(|g| g.string(["ab"]));
            });
        });
    });
    // "ab" matches the second case, but the first case passed its cut
    assert!(p.test_matches(&["ax"], &["ab"]));
}

#[test]
fn cut_is_local_to_its_choice() {
    let p = parser(|g| {
        g.start("outer");
        g.define("outer", |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.choice(|c| {
                        c.case(|g| {
                            g.string(["a"]);
                            g.cut();
                            g.string(["x"]);
                        });
                    });
                });
                c.case(|g| g.string(["ab"]));
            });
        });
    });
    // the inner cut stops the inner choice only
    assert!(p.test_matches(&["ax", "ab"], &["a"]));
}

#[test]
fn cut_survives_nested_sequences() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.sequence(|g| {
                        g.string(["a"]);
                    });
                    g.cut();
                    g.optional(|g| g.string(["!"]));
                    g.string(["x"]);
                });
                c.case(|g| g.string(["ab"]));
            });
        });
    });
    assert!(p.test_matches(&["ax", "a!x"], &["ab"]));
}

#[test]
fn repeat_terminates_on_zero_width_iterations() {
    let p = parser(|g| {
        g.start("r?");
        g.define("r?", |g| {
            g.repeat(0, 0, |g| g.optional(|g| g.string(["a"])));
        });
    });
    assert!(p.test_matches(&["", "a", "aaa"], &["b"]));
}

#[test]
fn repeat_bounds() {
    let p = parser(|g| {
        g.start("r");
        g.define("r", |g| g.repeat(2, 3, |g| g.string(["a"])));
    });
    assert!(p.test_matches(&["aa", "aaa"], &["", "a", "aaaa"]));
}

#[test]
fn lookahead_peeks_without_consuming_or_capturing() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.lookahead(|g| g.capture("peeked", |g| g.string(["a"])));
            g.string(["ab"]);
        });
    });
    let tree = p.parse_tree("ab").unwrap();
    // the lookahead capture is discarded; only the synthesized root remains
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.root().name(), "expr");
    assert!(p.parse_tree("b").is_err());
}

#[test]
fn reject_inverts_its_body() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.reject(|g| g.string(["b"]));
            g.rune();
        });
    });
    assert!(p.test_matches(&["a", "x"], &["b", ""]));
}

#[test]
fn rune_ranges_and_inversion() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.rune_range(["a-z", "0-9"]);
            g.rune_range_inverted(["x"]);
        });
    });
    assert!(p.test_matches(&["ab", "7y"], &["Ab", "ax", "a"]));
}

#[test]
fn string_dispatch_prefers_longest_key() {
    let p = parser(|g| {
        g.start("d");
        g.define("d", |g| {
            g.match_string(|m| {
                m.arm("a", |g| {
                    g.string(["a"]);
                    g.string(["2"]);
                });
                m.arm("ab", |g| {
                    g.string(["ab"]);
                    g.string(["1"]);
                });
            });
        });
    });
    // "ab1" must dispatch to the longer key even though "a" was declared first
    assert!(p.test_matches(&["ab1", "a2"], &["ab2", "b1", ""]));
}

#[test]
fn rune_dispatch() {
    let p = parser(|g| {
        g.start("d");
        g.define("d", |g| {
            g.match_rune(|m| {
                m.arm('x', |g| {
                    g.rune();
                    g.string(["1"]);
                });
                m.arm('y', |g| {
                    g.rune();
                    g.string(["2"]);
                });
            });
        });
    });
    assert!(p.test_matches(&["x1", "y2"], &["x2", "z1", ""]));
}

#[test]
fn whitespace_budget_splits_tabs() {
    let p = build_parser::<()>(Mode::text().with_tabstop(4), |g| {
        g.start("w");
        g.define("w", |g| {
            g.whitespace_columns(2, 2);
            g.whitespace_columns(2, 2);
        });
    })
    .unwrap();
    // one tab is four columns; two exact-two matches split it
    assert!(p.test_matches(&["\t", "    ", "  \t"], &[" ", "   ", "\t "]));
}

#[test]
fn newline_and_line_boundaries() {
    let p = text_parser(|g| {
        g.start("lines");
        g.define("lines", |g| {
            g.start_of_file();
            g.repeat(1, 0, |g| {
                g.start_of_line();
                g.string(["a"]);
                g.end_of_line();
            });
            g.end_of_file();
        });
    });
    assert!(p.test_matches(&["a", "a\na", "a\r\na\ra"], &["", "b", "a\nb", " a"]));
}

#[test]
fn start_of_line_fails_mid_line() {
    let p = text_parser(|g| {
        g.start("expr");
        g.define("expr", |g| {
            g.string(["a"]);
            g.start_of_line();
            g.string(["b"]);
        });
    });
    assert!(p.test_matches(&[], &["ab"]));
}

#[test]
fn whitespace_newline_always_succeeds() {
    let p = text_parser(|g| {
        g.start("wn?");
        g.define("wn?", |g| g.whitespace_newline());
    });
    assert!(p.test_matches(&["", " ", " \t\r\n  \n"], &["x", " x"]));
}

#[test]
fn space_and_tab_terminals() {
    let p = text_parser(|g| {
        g.start("st");
        g.define("st", |g| {
            g.space();
            g.tab();
        });
    });
    assert!(p.test_matches(&[" \t"], &["\t ", "  ", ""]));
}

#[test]
fn indented_block_requires_consistent_prefix() {
    let p = text_parser(|g| {
        g.start("block");
        g.define("block", |g| {
            g.string(["block:"]);
            g.newline();
            g.indented_block(|g| {
                g.repeat(0, 0, |g| {
                    g.indent();
                    g.string(["row"]);
                    g.newline();
                });
            });
        });
    });
    assert!(p.test_matches(
        &["block:\n row\n row\n", "block:\n\trow\n\trow\n"],
        &["block:\n row\n  row\n", "block:\nrow\n"],
    ));
}

#[test]
fn offside_block_fixes_the_entry_column() {
    let p = text_parser(|g| {
        g.start("do");
        g.define("do", |g| {
            g.string(["do"]);
            g.offside_block(|g| {
                g.repeat(0, 0, |g| {
                    g.indent();
                    g.string(["row"]);
                    g.newline();
                });
            });
        });
    });
    assert!(p.test_matches(
        &["do\n  row\n  row\n"],
        &["do\n  row\n row\n", "do\n  row\n   row\n"],
    ));
}

#[test]
fn nested_indented_blocks_compose() {
    let p = text_parser(|g| {
        g.start("outer");
        g.define("outer", |g| {
            g.string(["outer:"]);
            g.newline();
            g.indented_block(|g| {
                g.indent();
                g.string(["inner:"]);
                g.newline();
                g.indented_block(|g| {
                    g.repeat(1, 0, |g| {
                        g.indent();
                        g.string(["x"]);
                        g.newline();
                    });
                });
            });
        });
    });
    // the inner prefix is the outer prefix plus one more column
    assert!(p.test_matches(
        &["outer:\n inner:\n  x\n  x\n"],
        &["outer:\n inner:\n x\n", "outer:\n inner:\n   x\n  x\n"],
    ));
}

#[test]
fn binary_mode_matches_bytes() {
    let p = build_parser::<()>(Mode::binary(), |g| {
        g.start("frame");
        g.define("frame", |g| {
            g.bytes(&[b"\x01\x02"]);
            g.byte_range(&[(0x30, 0x39)]);
            g.match_byte(|m| {
                m.arm(b'!', |g| {
                    g.byte();
                });
                m.arm(b'?', |g| {
                    g.byte_string(["?end"]);
                });
            });
        });
    })
    .unwrap();
    assert!(p.test_matches(
        &["\u{1}\u{2}5!", "\u{1}\u{2}0?end"],
        &["\u{1}\u{2}x!", "\u{1}\u{2}5.", ""],
    ));
}

#[test]
fn left_recursion_builds_left_leaning_trees() {
    let p = infix_tree_parser();
    let tree = p.parse_tree("1+2+3").unwrap();
    let root = tree.root();
    assert_eq!(root.name(), "add");
    assert_eq!(root.text(), "1+2+3");
    let children: Vec<(String, String)> = root
        .children()
        .map(|n| (n.name().to_string(), n.text().to_string()))
        .collect();
    assert_eq!(
        children,
        [
            ("add".to_string(), "1+2".to_string()),
            ("num".to_string(), "3".to_string()),
        ]
    );
    let inner = root.children().next().unwrap();
    let inner: Vec<&str> = inner.children().map(|n| n.text()).collect();
    assert_eq!(inner, ["1", "2"]);
}

#[test]
fn stump_makes_right_associative_operators() {
    let p = infix_tree_parser();
    let tree = p.parse_tree("1=2=3").unwrap();
    let root = tree.root();
    assert_eq!(root.name(), "eq");
    let children: Vec<(String, String)> = root
        .children()
        .map(|n| (n.name().to_string(), n.text().to_string()))
        .collect();
    assert_eq!(
        children,
        [
            ("num".to_string(), "1".to_string()),
            ("eq".to_string(), "2=3".to_string()),
        ]
    );
}

#[test]
fn recursive_rule_alone_still_matches_atoms() {
    let p = infix_tree_parser();
    let tree = p.parse_tree("7").unwrap();
    assert_eq!(tree.root().name(), "num");
    assert!(p.parse_tree("1+").is_err());
    assert!(p.parse_tree("+1").is_err());
}

fn infix_tree_parser() -> Parser<()> {
    parser(|g| {
        g.start("expr");
        g.define_recursive("expr", &["expr"], |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.capture("add", |g| {
                        g.corner("expr", 1);
                        g.recur("expr");
                        g.string(["+"]);
                        g.stump("expr");
                    });
                });
                c.case(|g| {
                    g.capture("eq", |g| {
                        g.corner("expr", 2);
                        g.stump("expr");
                        g.string(["="]);
                        g.recur("expr");
                    });
                });
                c.case(|g| {
                    g.no_corner("expr", 3);
                    g.capture("num", |g| g.rune_range(["0-9"]));
                });
            });
        });
    })
}

#[test]
fn builders_fold_the_tree() {
    let p = build_parser::<String>(Mode::string(), |g| {
        g.start("pair");
        g.define("pair", |g| {
            g.capture("pair", |g| {
                g.capture("word", |g| g.repeat(1, 0, |g| g.rune_range(["a-z"])));
                g.string([":"]);
                g.capture("word", |g| g.repeat(1, 0, |g| g.rune_range(["a-z"])));
            });
        });
        g.builder("word", |s, _| Ok(s.to_string()));
        g.builder("pair", |_, args| Ok(format!("{}={}", args[0], args[1])));
    })
    .unwrap();
    assert_eq!(p.parse("key:value").unwrap(), "key=value");
}

#[test]
fn builder_errors_propagate() {
    let p = build_parser::<String>(Mode::string(), |g| {
        g.start("w");
        g.define("w", |g| {
            g.capture("word", |g| g.repeat(1, 0, |g| g.rune_range(["a-z"])));
        });
        g.builder("word", |_s, _| Err("nope".into()));
    })
    .unwrap();
    match p.parse("abc") {
        Err(descent::ParseError::Build(err)) => assert_eq!(err.to_string(), "nope"),
        other => panic!("expected a build error, got {other:?}"),
    }
}

#[test]
fn print_and_trace_report_through_the_log_sink() {
    use std::sync::{Arc, Mutex};

    let messages: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = messages.clone();
    let p = build_parser::<()>(Mode::string(), |g| {
        g.start("expr");
        g.define("expr", |g| {
            g.print("starting");
            g.trace(|g| g.string(["x"]));
        });
        g.log_fn(move |message| sink.lock().unwrap().push(message.to_string()));
    })
    .unwrap();
    p.parse_tree("x").unwrap();
    let messages = messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("print(\"starting\")")));
    assert!(messages.iter().any(|m| m.contains("trace enter")));
    assert!(messages.iter().any(|m| m.contains("trace exit")));
}

#[test]
fn parse_without_builders_is_refused() {
    let p = parser(|g| {
        g.start("expr");
        g.define("expr", |g| g.string(["x"]));
    });
    assert!(matches!(p.parse("x"), Err(descent::ParseError::Build(_))));
}
