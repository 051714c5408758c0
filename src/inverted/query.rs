use log::debug;

use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::inverted::index::InvertedIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryToken {
    Term(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

/// NOT binds tightest, then AND, then OR. Anything else never outranks an
/// operator, which keeps `(` from being popped as one.
fn precedence(token: &QueryToken) -> u8 {
    match token {
        QueryToken::Not => 3,
        QueryToken::And => 2,
        QueryToken::Or => 1,
        _ => 0,
    }
}

fn malformed(context: impl Into<String>) -> Error {
    Error::invalid_input(format!("malformed query: {}", context.into()))
}

/// Boolean query evaluation over an inverted index: Shunting-Yard to RPN,
/// then RPN evaluation against per-term posting lists. Performs only reads.
pub struct QueryProcessor<'a> {
    index: &'a InvertedIndex,
}

impl<'a> QueryProcessor<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        QueryProcessor { index }
    }

    /// Evaluate `query`, returning a sorted, duplicate-free doc-id list.
    pub fn execute(&self, query: &str) -> Result<Vec<DocId>> {
        let tokens = tokenize(query);
        let rpn = to_rpn(tokens)?;
        let result = self.evaluate_rpn(rpn)?;
        debug!("query '{}' matched {} documents", query, result.len());
        Ok(result)
    }

    fn evaluate_rpn(&self, rpn: Vec<QueryToken>) -> Result<Vec<DocId>> {
        // The complement universe is every doc id the index has observed.
        let universe: Vec<DocId> = if rpn.contains(&QueryToken::Not) {
            (1..=self.index.total_documents()).collect()
        } else {
            Vec::new()
        };

        let mut stack: Vec<Vec<DocId>> = Vec::new();
        for token in rpn {
            match token {
                QueryToken::Term(term) => stack.push(self.index.get_postings(&term)),
                QueryToken::Not => {
                    let operand = stack
                        .pop()
                        .ok_or_else(|| malformed("NOT operator with no operand"))?;
                    stack.push(difference(&universe, &operand));
                }
                QueryToken::And | QueryToken::Or => {
                    let right = stack
                        .pop()
                        .ok_or_else(|| malformed("binary operator with insufficient operands"))?;
                    let left = stack
                        .pop()
                        .ok_or_else(|| malformed("binary operator with insufficient operands"))?;
                    let merged = if token == QueryToken::And {
                        intersect(&left, &right)
                    } else {
                        union_lists(&left, &right)
                    };
                    stack.push(merged);
                }
                QueryToken::LParen | QueryToken::RParen => {
                    return Err(malformed("unbalanced parentheses"));
                }
            }
        }

        if stack.len() != 1 {
            return Err(malformed("expression does not reduce to a single result"));
        }
        Ok(stack.remove(0))
    }
}

/// Split on whitespace, peeling parentheses off term edges; operators are
/// case-insensitive, terms are lowercased before lookup.
fn tokenize(query: &str) -> Vec<QueryToken> {
    let mut tokens = Vec::new();
    for raw in query.split_whitespace() {
        let mut rest = raw;
        while let Some(stripped) = rest.strip_prefix('(') {
            tokens.push(QueryToken::LParen);
            rest = stripped;
        }
        let mut trailing = 0usize;
        while let Some(stripped) = rest.strip_suffix(')') {
            trailing += 1;
            rest = stripped;
        }

        if !rest.is_empty() {
            if rest.eq_ignore_ascii_case("AND") {
                tokens.push(QueryToken::And);
            } else if rest.eq_ignore_ascii_case("OR") {
                tokens.push(QueryToken::Or);
            } else if rest.eq_ignore_ascii_case("NOT") {
                tokens.push(QueryToken::Not);
            } else {
                tokens.push(QueryToken::Term(rest.to_ascii_lowercase()));
            }
        }

        for _ in 0..trailing {
            tokens.push(QueryToken::RParen);
        }
    }
    tokens
}

/// Shunting-Yard conversion to postfix. AND and OR associate left; the
/// unary NOT associates right so `NOT NOT x` nests instead of clashing.
fn to_rpn(tokens: Vec<QueryToken>) -> Result<Vec<QueryToken>> {
    let mut output = Vec::new();
    let mut stack: Vec<QueryToken> = Vec::new();

    for token in tokens {
        match token {
            QueryToken::Term(_) => output.push(token),
            QueryToken::And | QueryToken::Or | QueryToken::Not => {
                let right_assoc = token == QueryToken::Not;
                let my_prec = precedence(&token);
                while let Some(top) = stack.last() {
                    let top_prec = precedence(top);
                    let pop = if right_assoc {
                        top_prec > my_prec
                    } else {
                        top_prec >= my_prec
                    };
                    if !pop {
                        break;
                    }
                    if let Some(op) = stack.pop() {
                        output.push(op);
                    }
                }
                stack.push(token);
            }
            QueryToken::LParen => stack.push(token),
            QueryToken::RParen => loop {
                match stack.pop() {
                    Some(QueryToken::LParen) => break,
                    Some(op) => output.push(op),
                    None => return Err(malformed("mismatched parentheses")),
                }
            },
        }
    }

    while let Some(op) = stack.pop() {
        if op == QueryToken::LParen {
            return Err(malformed("mismatched parentheses"));
        }
        output.push(op);
    }

    Ok(output)
}

/// Sorted-merge intersection of two sorted duplicate-free lists.
pub fn intersect(list1: &[DocId], list2: &[DocId]) -> Vec<DocId> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < list1.len() && j < list2.len() {
        if list1[i] == list2[j] {
            result.push(list1[i]);
            i += 1;
            j += 1;
        } else if list1[i] < list2[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

/// Sorted-merge union of two sorted duplicate-free lists.
pub fn union_lists(list1: &[DocId], list2: &[DocId]) -> Vec<DocId> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < list1.len() && j < list2.len() {
        if list1[i] == list2[j] {
            result.push(list1[i]);
            i += 1;
            j += 1;
        } else if list1[i] < list2[j] {
            result.push(list1[i]);
            i += 1;
        } else {
            result.push(list2[j]);
            j += 1;
        }
    }
    result.extend_from_slice(&list1[i..]);
    result.extend_from_slice(&list2[j..]);
    result
}

/// Elements of `list1` absent from `list2`; both sorted and duplicate-free.
pub fn difference(list1: &[DocId], list2: &[DocId]) -> Vec<DocId> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < list1.len() && j < list2.len() {
        if list1[i] == list2[j] {
            i += 1;
            j += 1;
        } else if list1[i] < list2[j] {
            result.push(list1[i]);
            i += 1;
        } else {
            j += 1;
        }
    }
    result.extend_from_slice(&list1[i..]);
    result
}
