//! CSS selector lexing, parsing and matching.
//!
//! Supported grammar: type and universal selectors, `#id`, `.class`,
//! attribute selectors (`[a]`, `=`, `~=`, `|=`, `^=`, `$=`, `*=`), the
//! structural pseudo-classes `:first-child`, `:last-child`, `:only-child`,
//! `:first-of-type`, `:last-of-type`, `:nth-child()`, `:nth-of-type()`, the four
//! combinators and comma-separated groups.

use crate::dom::{Document, ElementData, NodeId};
use crate::error::{SelectorError, SelectorResult};
use logos::Logos;
use std::fmt;
use std::ops::Range;

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token<'src> {
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    #[regex(r"-?[_a-zA-Z][_a-zA-Z0-9-]*", |lex| lex.slice())]
    Ident(&'src str),

    #[regex(r"#[_a-zA-Z0-9-]+", |lex| &lex.slice()[1..])]
    Hash(&'src str),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unquote(lex.slice()))]
    Str(&'src str),

    #[regex(r"[0-9]+", |lex| lex.slice())]
    Number(&'src str),

    #[token(",")]
    Comma,

    #[token(">")]
    Greater,

    #[token("+")]
    Plus,

    #[token("~")]
    Tilde,

    #[token("*")]
    Star,

    #[token(".")]
    Dot,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(":")]
    Colon,

    #[token("=")]
    Equals,

    #[token("~=")]
    Includes,

    #[token("|=")]
    DashMatch,

    #[token("^=")]
    Prefix,

    #[token("$=")]
    Suffix,

    #[token("*=")]
    Substring,
}

fn unquote(raw: &str) -> &str {
    &raw[1..raw.len() - 1]
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Whitespace => write!(f, "whitespace"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::Hash(s) => write!(f, "#{}", s),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Comma => write!(f, ","),
            Token::Greater => write!(f, ">"),
            Token::Plus => write!(f, "+"),
            Token::Tilde => write!(f, "~"),
            Token::Star => write!(f, "*"),
            Token::Dot => write!(f, "."),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Colon => write!(f, ":"),
            Token::Equals => write!(f, "="),
            Token::Includes => write!(f, "~="),
            Token::DashMatch => write!(f, "|="),
            Token::Prefix => write!(f, "^="),
            Token::Suffix => write!(f, "$="),
            Token::Substring => write!(f, "*="),
        }
    }
}

/// Tokenize a selector, failing on the first unrecognized character
pub fn tokenize(source: &str) -> SelectorResult<Vec<(Token<'_>, Range<usize>)>> {
    Token::lexer(source)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok((token, span)),
            Err(()) => Err(SelectorError::lexer_error(span.start)),
        })
        .collect()
}

// -- AST -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList(pub Vec<ComplexSelector>);

/// Compound selectors joined by combinators, left to right
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    pub compounds: Vec<CompoundSelector>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
    pub combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundSelector {
    /// Lowercase tag name; `None` matches any element
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
    pub pseudos: Vec<PseudoClass>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub matcher: Option<(AttributeOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    NthChild(Nth),
    NthOfType(Nth),
}

/// `an+b`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nth {
    pub a: i32,
    pub b: i32,
}

impl Nth {
    pub fn parse(expr: &str) -> Option<Self> {
        let compact: String = expr
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match compact.as_str() {
            "odd" => return Some(Nth { a: 2, b: 1 }),
            "even" => return Some(Nth { a: 2, b: 0 }),
            "" => return None,
            _ => {}
        }
        let Some((a, b)) = compact.split_once('n') else {
            return compact.parse().ok().map(|b| Nth { a: 0, b });
        };
        let a = match a {
            "" | "+" => 1,
            "-" => -1,
            other => other.parse().ok()?,
        };
        let b = if b.is_empty() { 0 } else { b.parse().ok()? };
        Some(Nth { a, b })
    }

    /// Whether the 1-based `index` is selected
    pub fn matches(&self, index: usize) -> bool {
        let index = index as i32;
        if self.a == 0 {
            return index == self.b;
        }
        let delta = index - self.b;
        delta % self.a == 0 && delta / self.a >= 0
    }
}

// -- parsing -------------------------------------------------------------------

pub fn parse_selector(source: &str) -> SelectorResult<SelectorList> {
    SelectorParser::new(source)?.parse_list()
}

struct SelectorParser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, Range<usize>)>,
    pos: usize,
}

impl<'src> SelectorParser<'src> {
    fn new(source: &'src str) -> SelectorResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    fn parse_list(&mut self) -> SelectorResult<SelectorList> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Err(SelectorError::Empty);
        }

        let mut selectors = vec![self.parse_complex()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some((Token::Comma, _)) => {
                    self.advance();
                    self.skip_whitespace();
                    selectors.push(self.parse_complex()?);
                }
                Some((token, span)) => {
                    return Err(SelectorError::unexpected_token(span.start, "',' or end", token.to_string()))
                }
            }
        }
        Ok(SelectorList(selectors))
    }

    fn parse_complex(&mut self) -> SelectorResult<ComplexSelector> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some((Token::Comma, _)) => break,
                Some((Token::Greater, _)) => Combinator::Child,
                Some((Token::Plus, _)) => Combinator::NextSibling,
                Some((Token::Tilde, _)) => Combinator::SubsequentSibling,
                Some(_) if had_whitespace => Combinator::Descendant,
                Some((token, span)) => {
                    return Err(SelectorError::unexpected_token(span.start, "combinator", token.to_string()))
                }
            };
            if combinator != Combinator::Descendant {
                self.advance();
                self.skip_whitespace();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> SelectorResult<CompoundSelector> {
        let start = self.pos;
        let mut compound = CompoundSelector::default();

        match self.peek() {
            Some((Token::Ident(name), _)) => {
                compound.tag = Some(name.to_ascii_lowercase());
                self.advance();
            }
            Some((Token::Star, _)) => {
                self.advance();
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some((Token::Hash(id), _)) => {
                    compound.ids.push(id.to_string());
                    self.advance();
                }
                Some((Token::Dot, _)) => {
                    self.advance();
                    compound.classes.push(self.expect_ident("class name")?);
                }
                Some((Token::LBracket, _)) => {
                    self.advance();
                    compound.attributes.push(self.parse_attribute()?);
                }
                Some((Token::Colon, _)) => {
                    self.advance();
                    compound.pseudos.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(match self.peek() {
                Some((token, span)) => {
                    SelectorError::unexpected_token(span.start, "selector", token.to_string())
                }
                None => SelectorError::unexpected_end(self.source.len()),
            });
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> SelectorResult<AttributeSelector> {
        self.skip_whitespace();
        let name = self.expect_ident("attribute name")?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.peek() {
            Some((Token::RBracket, _)) => {
                self.advance();
                return Ok(AttributeSelector {
                    name,
                    matcher: None,
                });
            }
            Some((Token::Equals, _)) => AttributeOp::Equals,
            Some((Token::Includes, _)) => AttributeOp::Includes,
            Some((Token::DashMatch, _)) => AttributeOp::DashMatch,
            Some((Token::Prefix, _)) => AttributeOp::Prefix,
            Some((Token::Suffix, _)) => AttributeOp::Suffix,
            Some((Token::Substring, _)) => AttributeOp::Substring,
            Some((token, span)) => {
                return Err(SelectorError::unexpected_token(span.start, "attribute operator", token.to_string()))
            }
            None => return Err(SelectorError::unexpected_end(self.source.len())),
        };
        self.advance();
        self.skip_whitespace();

        let value = match self.peek() {
            Some((Token::Ident(v) | Token::Str(v) | Token::Number(v), _)) => unescape(v),
            Some((token, span)) => {
                return Err(SelectorError::unexpected_token(span.start, "attribute value", token.to_string()))
            }
            None => return Err(SelectorError::unexpected_end(self.source.len())),
        };
        self.advance();
        self.skip_whitespace();

        // case-sensitivity flags are accepted and ignored
        if let Some((Token::Ident(flag), _)) = self.peek() {
            if flag.eq_ignore_ascii_case("i") || flag.eq_ignore_ascii_case("s") {
                self.advance();
                self.skip_whitespace();
            }
        }
        self.expect(Token::RBracket)?;

        Ok(AttributeSelector {
            name,
            matcher: Some((op, value)),
        })
    }

    fn parse_pseudo(&mut self) -> SelectorResult<PseudoClass> {
        let pos = self.peek_span().start;
        let name = self.expect_ident("pseudo-class")?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(PseudoClass::FirstChild),
            "last-child" => Ok(PseudoClass::LastChild),
            "only-child" => Ok(PseudoClass::OnlyChild),
            "first-of-type" => Ok(PseudoClass::FirstOfType),
            "last-of-type" => Ok(PseudoClass::LastOfType),
            "nth-child" => Ok(PseudoClass::NthChild(self.parse_nth_argument()?)),
            "nth-of-type" => Ok(PseudoClass::NthOfType(self.parse_nth_argument()?)),
            _ => Err(SelectorError::UnsupportedPseudo { pos, name }),
        }
    }

    fn parse_nth_argument(&mut self) -> SelectorResult<Nth> {
        self.expect(Token::LParen)?;
        let start = self.peek_span().start;
        while !matches!(self.peek(), Some((Token::RParen, _)) | None) {
            self.advance();
        }
        let end = self.peek_span().start;
        self.expect(Token::RParen)?;

        let expr = &self.source[start..end];
        Nth::parse(expr).ok_or_else(|| SelectorError::InvalidNth {
            pos: start,
            expr: expr.to_string(),
        })
    }

    // -- token helpers -----------------------------------------------------------

    fn peek(&self) -> Option<&(Token<'src>, Range<usize>)> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_span(&self) -> Range<usize> {
        self.peek()
            .map(|(_, span)| span.clone())
            .unwrap_or(self.source.len()..self.source.len())
    }

    /// Skip whitespace tokens; returns whether any were skipped
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some((Token::Whitespace, _))) {
            self.advance();
        }
        self.pos != start
    }

    fn expect(&mut self, expected: Token<'_>) -> SelectorResult<()> {
        match self.peek() {
            Some((token, _)) if std::mem::discriminant(token) == std::mem::discriminant(&expected) => {
                self.advance();
                Ok(())
            }
            Some((token, span)) => Err(SelectorError::unexpected_token(
                span.start,
                expected.to_string(),
                token.to_string(),
            )),
            None => Err(SelectorError::unexpected_end(self.source.len())),
        }
    }

    fn expect_ident(&mut self, what: &str) -> SelectorResult<String> {
        match self.peek() {
            Some((Token::Ident(name), _)) => {
                let name = name.to_string();
                self.advance();
                Ok(name)
            }
            Some((token, span)) => Err(SelectorError::unexpected_token(span.start, what, token.to_string())),
            None => Err(SelectorError::unexpected_end(self.source.len())),
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

// -- matching ------------------------------------------------------------------

impl SelectorList {
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.0.iter().any(|selector| selector.matches(doc, node))
    }

    /// First connected element in document order matching any selector
    pub fn first_match(&self, doc: &Document) -> Option<NodeId> {
        doc.elements().into_iter().find(|id| self.matches(doc, *id))
    }

    pub fn all_matches(&self, doc: &Document) -> Vec<NodeId> {
        doc.elements()
            .into_iter()
            .filter(|id| self.matches(doc, *id))
            .collect()
    }
}

impl ComplexSelector {
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.matches_at(doc, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, doc: &Document, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(doc, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        let next = index - 1;
        match self.combinators[next] {
            Combinator::Child => doc
                .parent_element(node)
                .is_some_and(|parent| self.matches_at(doc, parent, next)),
            Combinator::Descendant => {
                let mut current = doc.parent_element(node);
                while let Some(ancestor) = current {
                    if self.matches_at(doc, ancestor, next) {
                        return true;
                    }
                    current = doc.parent_element(ancestor);
                }
                false
            }
            Combinator::NextSibling => doc
                .previous_element_siblings(node)
                .first()
                .is_some_and(|sibling| self.matches_at(doc, *sibling, next)),
            Combinator::SubsequentSibling => doc
                .previous_element_siblings(node)
                .into_iter()
                .any(|sibling| self.matches_at(doc, sibling, next)),
        }
    }
}

impl CompoundSelector {
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.ids.iter().all(|id| el.attr("id") == Some(id.as_str()))
            && self.classes.iter().all(|class| el.has_class(class))
            && self.attributes.iter().all(|attr| attr.matches(el))
            && self.pseudos.iter().all(|pseudo| pseudo.matches(doc, node))
    }
}

impl AttributeSelector {
    fn matches(&self, el: &ElementData) -> bool {
        let Some(actual) = el.attr(&self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.matcher else {
            return true;
        };
        let expected = expected.as_str();
        match op {
            AttributeOp::Equals => actual == expected,
            AttributeOp::Includes => actual.split_ascii_whitespace().any(|w| w == expected),
            AttributeOp::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttributeOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttributeOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttributeOp::Substring => !expected.is_empty() && actual.contains(expected),
        }
    }
}

impl PseudoClass {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(parent) = doc.parent(node) else {
            return false;
        };
        let siblings: Vec<NodeId> = doc.element_children(parent).collect();
        let tag = doc.tag(node).unwrap_or_default();
        let same_type: Vec<NodeId> = siblings
            .iter()
            .copied()
            .filter(|s| doc.tag(*s) == Some(tag))
            .collect();
        let position = |list: &[NodeId]| list.iter().position(|s| *s == node).map(|i| i + 1);

        match self {
            PseudoClass::FirstChild => siblings.first() == Some(&node),
            PseudoClass::LastChild => siblings.last() == Some(&node),
            PseudoClass::OnlyChild => siblings.len() == 1,
            PseudoClass::FirstOfType => same_type.first() == Some(&node),
            PseudoClass::LastOfType => same_type.last() == Some(&node),
            PseudoClass::NthChild(nth) => position(&siblings).is_some_and(|i| nth.matches(i)),
            PseudoClass::NthOfType(nth) => position(&same_type).is_some_and(|i| nth.matches(i)),
        }
    }
}

impl Document {
    /// First element matching `selector`, in document order
    pub fn query_selector(&self, selector: &str) -> SelectorResult<Option<NodeId>> {
        Ok(parse_selector(selector)?.first_match(self))
    }

    pub fn query_selector_all(&self, selector: &str) -> SelectorResult<Vec<NodeId>> {
        Ok(parse_selector(selector)?.all_matches(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;

    fn page() -> Document {
        parse_document(
            r#"<html><body>
                <header id="top" class="site-header dark"><a href="/home" lang="en-US">Home</a></header>
                <main>
                    <section class="hero"><h1>Title</h1><p>one</p><p class="lead">two</p></section>
                    <ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>
                </main>
            </body></html>"#,
        )
    }

    fn text_of(doc: &Document, selector: &str) -> Option<String> {
        doc.query_selector(selector)
            .unwrap()
            .map(|id| doc.text_content(id))
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<_> = tokenize("div#a.b > [x~='y']").unwrap().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("div"),
                Token::Hash("a"),
                Token::Dot,
                Token::Ident("b"),
                Token::Whitespace,
                Token::Greater,
                Token::Whitespace,
                Token::LBracket,
                Token::Ident("x"),
                Token::Includes,
                Token::Str("y"),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_selector("   "), Err(SelectorError::Empty));
        assert!(matches!(parse_selector("div >"), Err(SelectorError::UnexpectedEnd { .. })));
        assert!(matches!(parse_selector("a:hover"), Err(SelectorError::UnsupportedPseudo { .. })));
        assert!(matches!(parse_selector("li:nth-child(x)"), Err(SelectorError::InvalidNth { .. })));
        assert!(matches!(parse_selector("div{"), Err(SelectorError::LexerError { pos: 3 })));
    }

    #[test]
    fn test_simple_selectors() {
        let doc = page();
        assert_eq!(text_of(&doc, "h1").as_deref(), Some("Title"));
        assert_eq!(text_of(&doc, "#top").as_deref(), Some("Home"));
        assert_eq!(text_of(&doc, ".lead").as_deref(), Some("two"));
        assert_eq!(text_of(&doc, "header.dark.site-header").as_deref(), Some("Home"));
        assert_eq!(text_of(&doc, ".missing"), None);
    }

    #[test]
    fn test_attribute_selectors() {
        let doc = page();
        assert!(text_of(&doc, "[href]").is_some());
        assert!(text_of(&doc, r#"a[href="/home"]"#).is_some());
        assert!(text_of(&doc, "a[href^='/ho']").is_some());
        assert!(text_of(&doc, "a[href$=me]").is_some());
        assert!(text_of(&doc, "a[href*=om]").is_some());
        assert!(text_of(&doc, "a[lang|=en]").is_some());
        assert!(text_of(&doc, "[class~=dark]").is_some());
        assert!(text_of(&doc, "[class~=dar]").is_none());
    }

    #[test]
    fn test_combinators() {
        let doc = page();
        assert_eq!(text_of(&doc, "main p").as_deref(), Some("one"));
        assert_eq!(text_of(&doc, "section > h1").as_deref(), Some("Title"));
        assert_eq!(text_of(&doc, "main > h1"), None);
        assert_eq!(text_of(&doc, "h1 + p").as_deref(), Some("one"));
        assert_eq!(text_of(&doc, "h1 ~ .lead").as_deref(), Some("two"));
        assert_eq!(text_of(&doc, "body main section p.lead").as_deref(), Some("two"));
    }

    #[test]
    fn test_structural_pseudo_classes() {
        let doc = page();
        assert_eq!(text_of(&doc, "li:first-child").as_deref(), Some("a"));
        assert_eq!(text_of(&doc, "li:last-child").as_deref(), Some("d"));
        assert_eq!(text_of(&doc, "li:nth-child(3)").as_deref(), Some("c"));
        assert_eq!(text_of(&doc, "p:nth-of-type(2)").as_deref(), Some("two"));
        assert_eq!(text_of(&doc, "section p:first-of-type").as_deref(), Some("one"));
        let even = doc.query_selector_all("li:nth-child(even)").unwrap();
        assert_eq!(even.len(), 2);
        let from_second = doc.query_selector_all("li:nth-child(n+2)").unwrap();
        assert_eq!(from_second.len(), 3);
    }

    #[test]
    fn test_group_takes_first_in_document_order() {
        let doc = page();
        assert_eq!(text_of(&doc, ".lead, h1").as_deref(), Some("Title"));
        assert_eq!(doc.query_selector_all("h1, .lead").unwrap().len(), 2);
    }

    #[test]
    fn test_nth_parse() {
        assert_eq!(Nth::parse("odd"), Some(Nth { a: 2, b: 1 }));
        assert_eq!(Nth::parse(" 3 "), Some(Nth { a: 0, b: 3 }));
        assert_eq!(Nth::parse("-n+3"), Some(Nth { a: -1, b: 3 }));
        assert_eq!(Nth::parse("2n + 1"), Some(Nth { a: 2, b: 1 }));
        assert!(Nth { a: -1, b: 3 }.matches(3));
        assert!(!Nth { a: -1, b: 3 }.matches(4));
    }
}
