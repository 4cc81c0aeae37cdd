//! Traversal path templates.
//!
//! A label's `path:` annotation describes how to walk from the anchor node to
//! nodes of that label, e.g. `(a:Account)-[:MADE_PAYMENT]->(p:Payment)`. The
//! pattern is parsed once, at compile time, into a list of hops. Store readers
//! either walk the hops directly or render the pre-built `MATCH` pattern with
//! the anchor id as the only bound parameter; request input never reaches the
//! pattern text.
//!
//! Grammar accepted here:
//!
//! ```text
//! path   := node (rel node)*
//! node   := "(" [var] [":" Label] ")"
//! rel    := "-[" [var] [":" TYPE] "]->" | "<-[" [var] [":" TYPE] "]-" | "-[" [var] [":" TYPE] "]-"
//! ```
//!
//! Node variables follow the generator's convention: the anchor is always `a`,
//! and every other labelled node uses the lowercase first letter of its label.

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, recognize},
    error::ParseError,
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use super::errors::SchemaParseError;

/// Variable bound to the anchor node in every path.
pub const ANCHOR_VARIABLE: &str = "a";

/// Name of the single query parameter a compiled path is bound by.
pub const ANCHOR_PARAMETER: &str = "anchor_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Either,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStep {
    pub variable: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub rel_type: Option<String>,
    pub direction: Direction,
    pub node: NodeStep,
}

/// A validated traversal from the anchor node to nodes of one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    label: String,
    hops: Vec<Hop>,
    /// `MATCH` pattern rendered once from the validated hops.
    pattern: String,
}

impl PathTemplate {
    /// Parse and validate `pattern` as the path from the anchor to `label`.
    pub fn compile(
        label: &str,
        pattern: &str,
        anchor_label: &str,
    ) -> Result<Self, SchemaParseError> {
        let (rest, (start, raw_hops)) = ws(parse_path)
            .parse(pattern)
            .map_err(|e| SchemaParseError::invalid_path(label, format!("cannot parse `{}`: {}", pattern, e)))?;
        if !rest.is_empty() {
            return Err(SchemaParseError::invalid_path(
                label,
                format!("unexpected trailing input `{}`", rest),
            ));
        }
        if raw_hops.is_empty() {
            return Err(SchemaParseError::invalid_path(
                label,
                "path must contain at least one relationship",
            ));
        }

        if start.variable != Some(ANCHOR_VARIABLE) || start.label != Some(anchor_label) {
            return Err(SchemaParseError::invalid_path(
                label,
                format!(
                    "path must start at ({}:{})",
                    ANCHOR_VARIABLE, anchor_label
                ),
            ));
        }

        let mut seen = vec![ANCHOR_VARIABLE];
        let mut hops = Vec::with_capacity(raw_hops.len());
        let last = raw_hops.len() - 1;
        for (idx, (rel, node)) in raw_hops.into_iter().enumerate() {
            let direction = match (rel.left_arrow, rel.right_arrow) {
                (false, true) => Direction::Outgoing,
                (true, false) => Direction::Incoming,
                (false, false) => Direction::Either,
                (true, true) => {
                    return Err(SchemaParseError::invalid_path(
                        label,
                        "relationship cannot point both ways",
                    ))
                }
            };

            if idx == last && node.label != Some(label) {
                return Err(SchemaParseError::invalid_path(
                    label,
                    format!("path must end at a `{}` node", label),
                ));
            }

            if let Some(variable) = node.variable {
                let Some(node_label) = node.label else {
                    return Err(SchemaParseError::invalid_path(
                        label,
                        format!("node variable `{}` has no label", variable),
                    ));
                };
                let expected = node_variable(node_label);
                if variable != expected {
                    return Err(SchemaParseError::invalid_path(
                        label,
                        format!(
                            "node `{}` should use variable `{}`, found `{}`",
                            node_label, expected, variable
                        ),
                    ));
                }
                if seen.contains(&variable) {
                    return Err(SchemaParseError::invalid_path(
                        label,
                        format!("node variable `{}` is bound twice", variable),
                    ));
                }
                seen.push(variable);
            } else if idx == last {
                return Err(SchemaParseError::invalid_path(
                    label,
                    format!("target node `{}` needs a variable", label),
                ));
            }

            hops.push(Hop {
                rel_type: rel.rel_type.map(str::to_string),
                direction,
                node: NodeStep {
                    variable: node.variable.map(str::to_string),
                    label: node.label.map(str::to_string),
                },
            });
        }

        let pattern = render_pattern(anchor_label, &hops);
        Ok(PathTemplate {
            label: label.to_string(),
            hops,
            pattern,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Normalised `MATCH` pattern, identifiers quoted where needed.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Variable bound to the target node (the last hop).
    pub fn target_variable(&self) -> &str {
        self.hops
            .last()
            .and_then(|hop| hop.node.variable.as_deref())
            .unwrap_or(ANCHOR_VARIABLE)
    }
}

/// The conventional node variable for `label`: its lowercase first letter.
pub fn node_variable(label: &str) -> String {
    label
        .chars()
        .next()
        .map(|c| c.to_lowercase().collect())
        .unwrap_or_default()
}

/// Quote a Cypher identifier with backticks unless it is a plain identifier.
pub fn quote_identifier(ident: &str) -> String {
    let mut chars = ident.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        ident.to_string()
    } else {
        format!("`{}`", ident.replace('`', "``"))
    }
}

fn render_node(variable: Option<&str>, label: Option<&str>) -> String {
    let mut out = String::from("(");
    if let Some(v) = variable {
        out.push_str(v);
    }
    if let Some(l) = label {
        out.push(':');
        out.push_str(&quote_identifier(l));
    }
    out.push(')');
    out
}

fn render_pattern(anchor_label: &str, hops: &[Hop]) -> String {
    let mut out = render_node(Some(ANCHOR_VARIABLE), Some(anchor_label));
    for hop in hops {
        let rel = match &hop.rel_type {
            Some(t) => format!("[:{}]", quote_identifier(t)),
            None => "[]".to_string(),
        };
        match hop.direction {
            Direction::Outgoing => out.push_str(&format!("-{}->", rel)),
            Direction::Incoming => out.push_str(&format!("<-{}-", rel)),
            Direction::Either => out.push_str(&format!("-{}-", rel)),
        }
        out.push_str(&render_node(
            hop.node.variable.as_deref(),
            hop.node.label.as_deref(),
        ));
    }
    out
}

#[derive(Debug)]
struct RawNode<'a> {
    variable: Option<&'a str>,
    label: Option<&'a str>,
}

#[derive(Debug)]
struct RawRel<'a> {
    left_arrow: bool,
    rel_type: Option<&'a str>,
    right_arrow: bool,
}

type RawPath<'a> = (RawNode<'a>, Vec<(RawRel<'a>, RawNode<'a>)>);

fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

/// `[var][:Name]` inside parentheses or brackets.
fn binding(input: &str) -> IResult<&str, (Option<&str>, Option<&str>)> {
    (
        ws(opt(identifier)),
        opt(preceded(ws(char(':')), ws(identifier))),
    )
        .parse(input)
}

fn parse_node(input: &str) -> IResult<&str, RawNode<'_>> {
    map(delimited(char('('), binding, char(')')), |(variable, label)| {
        RawNode { variable, label }
    })
    .parse(input)
}

fn parse_relationship(input: &str) -> IResult<&str, RawRel<'_>> {
    map(
        (
            opt(tag("<")),
            char('-'),
            delimited(char('['), binding, char(']')),
            char('-'),
            opt(tag(">")),
        ),
        |(left, _, (_, rel_type), _, right)| RawRel {
            left_arrow: left.is_some(),
            rel_type,
            right_arrow: right.is_some(),
        },
    )
    .parse(input)
}

fn parse_path(input: &str) -> IResult<&str, RawPath<'_>> {
    (parse_node, many0(pair(ws(parse_relationship), ws(parse_node)))).parse(input)
}
