//! Left-recursive infix expressions. `+` is left-associative through
//! `Corner`/`Recur` at precedence 1; `=` is right-associative through `Stump`
//! at precedence 2; numbers are the `NoCorner`-guarded atom. Builders fold to
//! parenthesized strings so associativity is directly visible.

use descent::{build_parser, GrammarErrors, Mode, Parser};

pub fn infix_parser() -> Result<Parser<String>, GrammarErrors> {
    build_parser(Mode::string(), |g| {
        g.start("statement");

        g.define("statement", |g| {
            g.whitespace();
            g.call("expression");
            g.whitespace();
        });

        g.define_recursive("expression", &["expression"], |g| {
            g.choice(|c| {
                c.case(|g| {
                    g.capture("add", |g| {
                        g.corner("expression", 1);
                        g.recur("expression");
                        g.whitespace();
                        g.string(["+"]);
                        g.whitespace();
                        g.stump("expression");
                    });
                });
                c.case(|g| {
                    g.capture("assign", |g| {
                        g.corner("expression", 2);
                        g.stump("expression");
                        g.whitespace();
                        g.string(["="]);
                        g.whitespace();
                        g.recur("expression");
                    });
                });
                c.case(|g| {
                    g.no_corner("expression", 3);
                    g.call("number");
                });
            });
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
            });
        });

        g.builder("number", |s, _args| Ok(s.to_string()));
        g.builder("add", |_s, args| match <[String; 2]>::try_from(args) {
            Ok([lhs, rhs]) => Ok(format!("({lhs}+{rhs})")),
            Err(_) => Err("add expects two operands".into()),
        });
        g.builder("assign", |_s, args| match <[String; 2]>::try_from(args) {
            Ok([lhs, rhs]) => Ok(format!("({lhs}={rhs})")),
            Err(_) => Err("assign expects two operands".into()),
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folded(src: &str) -> String {
        let parser = infix_parser().expect("grammar should build");
        parser.parse(src).expect("parse should succeed")
    }

    #[test]
    fn grammar_builds() {
        infix_parser().expect("grammar should build");
    }

    #[test]
    fn single_number() {
        assert_eq!(folded("1"), "1");
        assert_eq!(folded(" 42 "), "42");
        assert_eq!(folded("-3.5"), "-3.5");
    }

    #[test]
    fn addition_is_left_associative() {
        assert_eq!(folded("1+2"), "(1+2)");
        assert_eq!(folded("1+2+3"), "((1+2)+3)");
        assert_eq!(folded("1 + 2 + 3 + 4"), "(((1+2)+3)+4)");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(folded("1=2"), "(1=2)");
        assert_eq!(folded("1=2=3"), "(1=(2=3))");
    }

    #[test]
    fn assignment_binds_tighter_than_addition() {
        assert_eq!(folded("1+2=3"), "(1+(2=3))");
    }

    #[test]
    fn rejects_dangling_operators() {
        let parser = infix_parser().unwrap();
        for src in ["", "+", "1+", "=2", "1++2"] {
            assert!(parser.parse_tree(src).is_err(), "{src:?} should not parse");
        }
    }
}
