#![allow(clippy::empty_docs)]
#[derive(Parser)]
#[grammar = "frontend/dae_grammar.pest"] // relative to src
pub struct DaeParser;

use pest::error::Error;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use std::boxed::Box;

use super::ast;
use super::ast::{Ast, AstKind, StringSpan};

//name       = @{ !keyword ~ ("_" | ASCII_ALPHA) ~ ident_char* }
fn parse_name(pair: Pair<Rule>) -> &str {
    pair.as_str()
}

fn to_span(pair: &Pair<Rule>) -> Option<StringSpan> {
    Some(StringSpan {
        pos_start: pair.as_span().start(),
        pos_end: pair.as_span().end(),
    })
}

fn join_spans(left: &Ast, right: &Ast) -> Option<StringSpan> {
    match (left.span, right.span) {
        (Some(l), Some(r)) => Some(StringSpan {
            pos_start: l.pos_start,
            pos_end: r.pos_end,
        }),
        _ => None,
    }
}

// folds `operand ~ (op ~ operand)*` into left associative binops
fn parse_left_assoc<'a>(mut inner: Pairs<'a, Rule>) -> Ast<'a> {
    let mut head = parse_value(inner.next().unwrap());
    while let Some(op) = inner.next() {
        let rhs = parse_value(inner.next().unwrap());
        let span = join_spans(&head, &rhs);
        head = Ast {
            kind: AstKind::Binop(ast::Binop {
                op: op.as_str(),
                left: Box::new(head),
                right: Box::new(rhs),
            }),
            span,
        };
    }
    head
}

fn parse_value(pair: Pair<'_, Rule>) -> Ast<'_> {
    let span = to_span(&pair);
    match pair.as_rule() {
        Rule::name => Ast {
            kind: AstKind::Name(pair.as_str()),
            span,
        },

        // real       = @{ digits ~ ("." ~ digits?)? ~ exponent? }
        Rule::real => Ast {
            kind: AstKind::Number(pair.as_str().parse().unwrap()),
            span,
        },

        // boolean    = @{ ("true" | "false") ~ !ident_char }
        Rule::boolean => Ast {
            kind: AstKind::Bool(pair.as_str() == "true"),
            span,
        },

        // string     = ${ "\"" ~ string_inner ~ "\"" }
        Rule::string => Ast {
            kind: AstKind::Str(pair.into_inner().next().unwrap().as_str()),
            span,
        },

        // model      = { "model" ~ name ~ element* ~ "end" ~ name ~ ";" }
        Rule::model => {
            let mut inner = pair.into_inner();
            let name = parse_name(inner.next().unwrap());
            let mut model = ast::Model {
                name,
                types: Vec::new(),
                functions: Vec::new(),
                components: Vec::new(),
                initial_equations: Vec::new(),
                equations: Vec::new(),
            };
            for element in inner {
                match element.as_rule() {
                    Rule::type_decl => model.types.push(Box::new(parse_value(element))),
                    Rule::function_decl => model.functions.push(Box::new(parse_value(element))),
                    Rule::component => model.components.push(Box::new(parse_value(element))),
                    Rule::initial_section => model
                        .initial_equations
                        .extend(element.into_inner().map(parse_value).map(Box::new)),
                    Rule::equation_section => model
                        .equations
                        .extend(element.into_inner().map(parse_value).map(Box::new)),
                    // the closing name
                    Rule::name => {}
                    _ => unreachable!("{:?}", element.to_string()),
                }
            }
            Ast {
                kind: AstKind::Model(model),
                span,
            }
        }

        // type_decl  = { "type" ~ name ~ "=" ~ name ~ modification? ~ ";" }
        Rule::type_decl => {
            let mut inner = pair.into_inner();
            let name = parse_name(inner.next().unwrap());
            let base = parse_name(inner.next().unwrap());
            let attributes = match inner.next() {
                Some(modification) => modification.into_inner().map(parse_value).map(Box::new).collect(),
                None => Vec::new(),
            };
            Ast {
                kind: AstKind::TypeDecl(ast::TypeDecl {
                    name,
                    base,
                    attributes,
                }),
                span,
            }
        }

        // function_decl = { "function" ~ name ~ params ~ "=" ~ outputs ~ ";" }
        Rule::function_decl => {
            let mut inner = pair.into_inner();
            let name = parse_name(inner.next().unwrap());
            let params = inner.next().unwrap().into_inner().map(parse_name).collect();
            let outputs = inner
                .next()
                .unwrap()
                .into_inner()
                .map(parse_value)
                .map(Box::new)
                .collect();
            Ast {
                kind: AstKind::Function(ast::FunctionDecl {
                    name,
                    params,
                    outputs,
                }),
                span,
            }
        }

        // component  = { prefix* ~ name ~ name ~ modification? ~ (alias | binding)? ~ ";" }
        Rule::component => {
            let mut inner = pair.into_inner().peekable();
            let mut prefixes = Vec::new();
            while let Some(prefix) = inner.next_if(|p| p.as_rule() == Rule::prefix) {
                prefixes.push(match prefix.as_str() {
                    "constant" => ast::Prefix::Constant,
                    "parameter" => ast::Prefix::Parameter,
                    "discrete" => ast::Prefix::Discrete,
                    "input" => ast::Prefix::Input,
                    "output" => ast::Prefix::Output,
                    other => unreachable!("unknown prefix {}", other),
                });
            }
            let type_name = parse_name(inner.next().unwrap());
            let name = parse_name(inner.next().unwrap());
            let mut component = ast::Component {
                prefixes,
                type_name,
                name,
                attributes: Vec::new(),
                binding: None,
                alias: None,
            };
            for rest in inner {
                match rest.as_rule() {
                    Rule::modification => {
                        component.attributes = rest.into_inner().map(parse_value).map(Box::new).collect()
                    }
                    // binding    = { "=" ~ expression }
                    Rule::binding => {
                        component.binding =
                            Some(Box::new(parse_value(rest.into_inner().next().unwrap())))
                    }
                    // alias      = { "alias" ~ negation? ~ name }
                    Rule::alias => {
                        let mut alias = rest.into_inner().peekable();
                        let negated = alias.next_if(|p| p.as_rule() == Rule::negation).is_some();
                        component.alias = Some(ast::Alias {
                            name: parse_name(alias.next().unwrap()),
                            negated,
                        });
                    }
                    _ => unreachable!("{:?}", rest.to_string()),
                }
            }
            Ast {
                kind: AstKind::Component(component),
                span,
            }
        }

        // attribute  = { name ~ "=" ~ (string | expression) }
        Rule::attribute => {
            let mut inner = pair.into_inner();
            Ast {
                kind: AstKind::Attribute(ast::Attribute {
                    name: parse_name(inner.next().unwrap()),
                    value: Box::new(parse_value(inner.next().unwrap())),
                }),
                span,
            }
        }

        // equation   = { expression ~ "=" ~ expression ~ ";" }
        Rule::equation => {
            let mut inner = pair.into_inner();
            Ast {
                kind: AstKind::Equation(ast::Equation {
                    lhs: Box::new(parse_value(inner.next().unwrap())),
                    rhs: Box::new(parse_value(inner.next().unwrap())),
                }),
                span,
            }
        }

        // expression = { conjunction ~ (or_op ~ conjunction)* }
        // conjunction = { inversion ~ (and_op ~ inversion)* }
        // relation   = { arithmetic ~ (rel_op ~ arithmetic)? }
        // term       = { power ~ (factor_op ~ power)* }
        // power      = { factor ~ (pow_op ~ factor)? }
        Rule::expression | Rule::conjunction | Rule::relation | Rule::term | Rule::power => {
            parse_left_assoc(pair.into_inner())
        }

        // inversion  = { not_op? ~ relation }
        Rule::inversion => {
            let mut inner = pair.into_inner();
            let first = inner.next().unwrap();
            if first.as_rule() == Rule::not_op {
                Ast {
                    kind: AstKind::Monop(ast::Monop {
                        op: "not",
                        child: Box::new(parse_value(inner.next().unwrap())),
                    }),
                    span,
                }
            } else {
                parse_value(first)
            }
        }

        // arithmetic = { sign? ~ term ~ (term_op ~ term)* }
        Rule::arithmetic => {
            let mut inner = pair.into_inner().peekable();
            let sign = inner.next_if(|p| p.as_rule() == Rule::sign);
            let mut head = parse_value(inner.next().unwrap());
            // a sign binds to the first term only
            if let Some(sign) = sign {
                let head_span = head.span.map(|s| StringSpan {
                    pos_start: sign.as_span().start(),
                    pos_end: s.pos_end,
                });
                head = Ast {
                    kind: AstKind::Monop(ast::Monop {
                        op: sign.as_str(),
                        child: Box::new(head),
                    }),
                    span: head_span,
                };
            }
            while let Some(op) = inner.next() {
                let rhs = parse_value(inner.next().unwrap());
                let span = join_spans(&head, &rhs);
                head = Ast {
                    kind: AstKind::Binop(ast::Binop {
                        op: op.as_str(),
                        left: Box::new(head),
                        right: Box::new(rhs),
                    }),
                    span,
                };
            }
            head
        }

        // factor     = { call | real | boolean | name | "(" ~ expression ~ ")" }
        Rule::factor => parse_value(pair.into_inner().next().unwrap()),

        // call       = { name ~ "(" ~ (expression ~ ("," ~ expression)*)? ~ ")" ~ output_index? }
        Rule::call => {
            let mut inner = pair.into_inner();
            let fn_name = parse_name(inner.next().unwrap());
            let mut args = Vec::new();
            let mut output = None;
            for arg in inner {
                if arg.as_rule() == Rule::output_index {
                    output = Some(arg.into_inner().next().unwrap().as_str().parse().unwrap());
                } else {
                    args.push(Box::new(parse_value(arg)));
                }
            }
            Ast {
                kind: AstKind::Call(ast::Call {
                    fn_name,
                    args,
                    output,
                }),
                span,
            }
        }

        _ => unreachable!("{:?}", pair.to_string()),
    }
}

pub fn parse_string(text: &str) -> Result<Box<Ast>, Box<Error<Rule>>> {
    let main = DaeParser::parse(Rule::main, text)?.next().unwrap();
    let model = main.into_inner().next().unwrap();
    Ok(Box::new(parse_value(model)))
}

#[cfg(test)]
mod tests {
    use super::parse_string;
    use crate::frontend::ast::{self, AstKind};

    fn ast_to_model(text: &str) -> ast::Model<'_> {
        match parse_string(text).unwrap().kind {
            AstKind::Model(model) => model,
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_model() {
        let model = ast_to_model("model test end test;");
        assert_eq!(model.name, "test");
        assert!(model.components.is_empty());
        assert!(model.equations.is_empty());
    }

    #[test]
    fn components_and_sections() {
        let text = "
        model circuit
            type Voltage = Real(unit = \"V\", nominal = 10);
            function f(a, b) = (a * 0.5, b + a);
            parameter Real p(start = 1) = 2 * q;
            input output Voltage v;
            Real z alias -y;
            Real y;
        initial equation
            y = 0;
        equation
            der(y) = -z + f(p, 1){1};
            v = y;
        end circuit;
        ";
        let model = ast_to_model(text);
        assert_eq!(model.types.len(), 1);
        assert_eq!(model.functions.len(), 1);
        assert_eq!(model.components.len(), 4);
        assert_eq!(model.initial_equations.len(), 1);
        assert_eq!(model.equations.len(), 2);

        if let AstKind::TypeDecl(decl) = &model.types[0].kind {
            assert_eq!(decl.name, "Voltage");
            assert_eq!(decl.base, "Real");
            assert_eq!(decl.attributes.len(), 2);
            assert!(
                matches!(&decl.attributes[0].kind, AstKind::Attribute(attr) if matches!(attr.value.kind, AstKind::Str("V")))
            );
        } else {
            panic!("should be a type declaration");
        }
        if let AstKind::Function(decl) = &model.functions[0].kind {
            assert_eq!(decl.params, vec!["a", "b"]);
            assert_eq!(decl.outputs.len(), 2);
        } else {
            panic!("should be a function");
        }
        if let AstKind::Component(comp) = &model.components[0].kind {
            assert!(comp.has_prefix(ast::Prefix::Parameter));
            assert_eq!(comp.type_name, "Real");
            assert_eq!(comp.name, "p");
            assert_eq!(comp.attributes.len(), 1);
            assert_eq!(comp.binding.as_ref().unwrap().to_string(), "2 * q");
        } else {
            panic!("should be a component");
        }
        if let AstKind::Component(comp) = &model.components[1].kind {
            assert!(comp.has_prefix(ast::Prefix::Input));
            assert!(comp.has_prefix(ast::Prefix::Output));
        } else {
            panic!("should be a component");
        }
        if let AstKind::Component(comp) = &model.components[2].kind {
            let alias = comp.alias.as_ref().unwrap();
            assert_eq!(alias.name, "y");
            assert!(alias.negated);
        } else {
            panic!("should be a component");
        }
        if let AstKind::Equation(eqn) = &model.equations[0].kind {
            assert!(matches!(&eqn.lhs.kind, AstKind::Call(call) if call.fn_name == "der"));
            assert!(matches!(&eqn.rhs.kind, AstKind::Binop(binop) if binop.op == "+"));
            assert_eq!(eqn.rhs.to_string(), "- z + f(p, 1){1}");
        } else {
            panic!("should be an equation");
        }
    }

    #[test]
    fn precedence() {
        let model = ast_to_model(
            "model m equation x = a + b * c ^ 2 - d / e; y = a < b and not c or d; end m;",
        );
        assert_eq!(model.equations.len(), 2);
        if let AstKind::Equation(eqn) = &model.equations[0].kind {
            let AstKind::Binop(sub) = &eqn.rhs.kind else {
                panic!("should be a binop")
            };
            assert_eq!(sub.op, "-");
            assert!(matches!(&sub.left.kind, AstKind::Binop(add) if add.op == "+"));
            assert!(matches!(&sub.right.kind, AstKind::Binop(div) if div.op == "/"));
        }
        if let AstKind::Equation(eqn) = &model.equations[1].kind {
            assert!(matches!(&eqn.rhs.kind, AstKind::Binop(or) if or.op == "or"));
        }
    }

    #[test]
    fn comments_and_spans() {
        let text = "model m\n  // a comment\n  Real x; /* block */\nequation\n  x = 1.5e2;\nend m;";
        let model = ast_to_model(text);
        let span = model.components[0].span.unwrap();
        assert_eq!(&text[span.pos_start..span.pos_end], "Real x;");
        if let AstKind::Equation(eqn) = &model.equations[0].kind {
            assert!(matches!(eqn.rhs.kind, AstKind::Number(v) if v == 150.0));
        }
    }

    #[test]
    fn keywords_are_not_names() {
        assert!(parse_string("model m Real end; end m;").is_err());
        assert!(parse_string("model m Real x end m;").is_err());
    }
}
