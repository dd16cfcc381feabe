/*! Natural, numeric-aware ordering of peak attribute values */
use std::cmp::Ordering;

use crate::peak::AttributeValue;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Chunk<'a> {
    Number(f64, &'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        if bytes[i].is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let token = &s[start..i];
            out.push(Chunk::Number(token.parse().unwrap_or(f64::NAN), token));
        } else {
            while i < bytes.len() && !bytes[i].is_ascii_digit() {
                i += 1;
            }
            out.push(Chunk::Text(&s[start..i]));
        }
    }
    out
}

/// Compare two strings so that embedded numbers are ordered by value,
/// e.g. `"peak 2" < "peak 10"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);
    for (x, y) in ca.iter().zip(cb.iter()) {
        let ord = match (x, y) {
            (Chunk::Number(u, us), Chunk::Number(v, vs)) => u.total_cmp(v).then_with(|| us.cmp(vs)),
            (Chunk::Number(..), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(..)) => Ordering::Greater,
            (Chunk::Text(u), Chunk::Text(v)) => u.cmp(v),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len())
}

/// Order two attribute values. Numbers are compared by value, text naturally,
/// missing text first and numbers before any text.
pub fn attribute_cmp(a: &AttributeValue, b: &AttributeValue) -> Ordering {
    match (a, b) {
        (AttributeValue::Text(u), AttributeValue::Text(v)) => match (u, v) {
            (Some(u), Some(v)) => natural_cmp(u, v),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        },
        (AttributeValue::Text(_), _) => Ordering::Greater,
        (_, AttributeValue::Text(_)) => Ordering::Less,
        (AttributeValue::Index(u), AttributeValue::Index(v)) => u.cmp(v),
        (u, v) => {
            let u = u.as_f64().unwrap_or(f64::NAN);
            let v = v.as_f64().unwrap_or(f64::NAN);
            u.total_cmp(&v)
        }
    }
}
