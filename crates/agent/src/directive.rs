//! Directive extraction — find one structured value embedded in model text.
//!
//! Models rarely answer with bare JSON. They wrap it in prose or code
//! fences, so the extractor slices the candidate out of the surrounding
//! text before parsing. Any failure means "no directive".

use memweave_config::DirectiveStrategy;
use serde_json::Value;

/// Which shapes count as a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// An object or a list (tool calls)
    ObjectOrList,
    /// An object only (synthesis batches)
    Object,
}

impl DirectiveKind {
    fn accepts_opener(self, c: char) -> bool {
        match self {
            Self::ObjectOrList => c == '{' || c == '[',
            Self::Object => c == '{',
        }
    }

    fn accepts_value(self, value: &Value) -> bool {
        match self {
            Self::ObjectOrList => value.is_object() || value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Locates and parses directives using a configured strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveExtractor {
    strategy: DirectiveStrategy,
}

impl DirectiveExtractor {
    pub fn new(strategy: DirectiveStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> DirectiveStrategy {
        self.strategy
    }

    /// Extract the directive of `kind` from `text`, if there is one.
    ///
    /// `FirstLast` tries a single slice from the first opener. `Balanced`
    /// moves on to the next opener until a balanced slice parses.
    pub fn extract(&self, text: &str, kind: DirectiveKind) -> Option<Value> {
        let mut openers = text.char_indices().filter(|(_, c)| kind.accepts_opener(*c));

        match self.strategy {
            DirectiveStrategy::FirstLast => {
                let (start, opener) = openers.next()?;
                parse_as(first_last_slice(text, start, opener)?, kind)
            }
            DirectiveStrategy::Balanced => openers
                .filter_map(|(start, _)| balanced_slice(text, start))
                .find_map(|slice| parse_as(slice, kind)),
        }
    }
}

fn parse_as(slice: &str, kind: DirectiveKind) -> Option<Value> {
    let value: Value = serde_json::from_str(slice).ok()?;
    kind.accepts_value(&value).then_some(value)
}

fn closer_for(opener: char) -> char {
    if opener == '[' { ']' } else { '}' }
}

/// From the opener to the last matching closer anywhere after it.
fn first_last_slice(text: &str, start: usize, opener: char) -> Option<&str> {
    let end = text.rfind(closer_for(opener))?;
    (end > start).then(|| &text[start..=end])
}

/// From the opener to the closer that brings nesting depth back to zero.
///
/// Delimiters inside string literals are ignored, honouring backslash
/// escapes.
fn balanced_slice(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let end = start + i + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}
