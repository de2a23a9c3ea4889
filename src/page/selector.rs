//! Minimal CSS selector support for in-memory pages.
//!
//! Selectors are tokenized with `cssparser`. Supported: comma separated
//! lists of compound selectors made of a tag (or `*`), `#id`, `.class` and
//! attribute selectors (`[a]`, `[a=v]`, `[a~=v]`, `[a|=v]`, `[a*=v]`,
//! `[a^=v]`, `[a$=v]`, each with an optional `i` or `s` flag). Combinators
//! and pseudo-classes are rejected.
use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, Token};

use crate::error::PageError;

type ParseResult<'i, T> = Result<T, ParseError<'i, &'static str>>;

/// Element view the matcher needs.
pub trait Selectable {
    fn tag(&self) -> &str;
    fn id(&self) -> Option<&str>;
    fn has_class(&self, class: &str) -> bool;
    fn attribute(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Word,
    Dash,
    Contains,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    test: Option<(AttrOp, String)>,
    case_insensitive: bool,
}

impl AttrSelector {
    fn matches(&self, element: &dyn Selectable) -> bool {
        let Some(actual) = element.attribute(&self.name) else {
            return false;
        };

        let Some((op, expected)) = &self.test else {
            return true;
        };

        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual, expected.clone())
        };

        match op {
            AttrOp::Equals => actual == expected,
            AttrOp::Word => actual.split_whitespace().any(|w| w == expected),
            AttrOp::Dash => {
                actual == expected || actual.starts_with(&format!("{expected}-"))
            }
            AttrOp::Contains => !expected.is_empty() && actual.contains(&expected),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttrSelector>,
}

impl Compound {
    fn matches(&self, element: &dyn Selectable) -> bool {
        if let Some(tag) = &self.tag
            && !tag.eq_ignore_ascii_case(element.tag())
        {
            return false;
        }

        if let Some(id) = &self.id
            && element.id() != Some(id.as_str())
        {
            return false;
        }

        self.classes.iter().all(|c| element.has_class(c))
            && self.attributes.iter().all(|a| a.matches(element))
    }
}

/// Parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    compounds: Vec<Compound>,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, PageError> {
        let mut input = ParserInput::new(selector);
        let mut parser = Parser::new(&mut input);

        parser
            .parse_comma_separated(parse_compound)
            .map(|compounds| Self { compounds })
            .map_err(|e| invalid(selector, e))
    }

    pub fn matches(&self, element: &dyn Selectable) -> bool {
        self.compounds.iter().any(|c| c.matches(element))
    }
}

fn invalid(selector: &str, error: ParseError<'_, &'static str>) -> PageError {
    let reason = match error.kind {
        ParseErrorKind::Custom(reason) => reason.to_string(),
        ParseErrorKind::Basic(kind) => format!("{kind:?}"),
    };
    PageError::InvalidSelector(format!("{selector}: {reason}"))
}

fn parse_compound<'i>(input: &mut Parser<'i, '_>) -> ParseResult<'i, Compound> {
    let mut compound = Compound::default();
    let mut empty = true;
    let mut after_space = false;

    loop {
        let token = match input.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        if let Token::WhiteSpace(_) = token {
            after_space = true;
            continue;
        }

        if after_space && !empty {
            return Err(input.new_custom_error("combinators are not supported"));
        }
        after_space = false;

        match token {
            Token::Ident(tag) if empty => compound.tag = Some(tag.to_string()),
            Token::Delim('*') if empty => {}
            Token::IDHash(id) | Token::Hash(id) => compound.id = Some(id.to_string()),
            Token::Delim('.') => match input.next_including_whitespace()?.clone() {
                Token::Ident(class) => compound.classes.push(class.to_string()),
                _ => return Err(input.new_custom_error("missing class name after .")),
            },
            Token::SquareBracketBlock => {
                let attribute = input.parse_nested_block(parse_attribute)?;
                compound.attributes.push(attribute);
            }
            Token::Colon => {
                return Err(input.new_custom_error("pseudo-classes are not supported"));
            }
            Token::Delim('>' | '+' | '~') => {
                return Err(input.new_custom_error("combinators are not supported"));
            }
            _ => return Err(input.new_custom_error("unexpected token")),
        }
        empty = false;
    }

    if empty {
        return Err(input.new_custom_error("empty selector"));
    }

    Ok(compound)
}

fn parse_attribute<'i>(input: &mut Parser<'i, '_>) -> ParseResult<'i, AttrSelector> {
    let name = input.expect_ident()?.to_string();

    let op = match input.next().cloned() {
        Err(_) => {
            return Ok(AttrSelector {
                name,
                test: None,
                case_insensitive: false,
            });
        }
        Ok(Token::Delim('=')) => AttrOp::Equals,
        Ok(Token::IncludeMatch) => AttrOp::Word,
        Ok(Token::DashMatch) => AttrOp::Dash,
        Ok(Token::SubstringMatch) => AttrOp::Contains,
        Ok(Token::PrefixMatch) => AttrOp::Prefix,
        Ok(Token::SuffixMatch) => AttrOp::Suffix,
        Ok(_) => return Err(input.new_custom_error("malformed attribute operator")),
    };

    let value = input.expect_ident_or_string()?.to_string();

    let case_insensitive = match input.try_parse(|p| p.expect_ident_cloned()) {
        Ok(flag) if flag.eq_ignore_ascii_case("i") => true,
        Ok(flag) if flag.eq_ignore_ascii_case("s") => false,
        Ok(_) => return Err(input.new_custom_error("unknown attribute flag")),
        Err(_) => false,
    };

    input.expect_exhausted()?;

    Ok(AttrSelector {
        name,
        test: Some((op, value)),
        case_insensitive,
    })
}
