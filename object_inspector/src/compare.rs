/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Display order for properties.

use std::cmp::Ordering;

use crate::remote::PROTO_PROPERTY;
use crate::remote::PropertyDescriptor;

/// Total order used to display sibling properties.
///
/// The prototype link always sorts last, symbol-keyed properties sort
/// after every string-keyed one, and the rest use [`natural_cmp`].
pub fn compare_properties(a: &PropertyDescriptor, b: &PropertyDescriptor) -> Ordering {
    match (a.name == PROTO_PROPERTY, b.name == PROTO_PROPERTY) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    match (a.is_symbol(), b.is_symbol()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => natural_cmp(&a.name, &b.name),
    }
}

/// Stable in-place sort with [`compare_properties`].
pub fn sort_properties(properties: &mut [PropertyDescriptor]) {
    properties.sort_by(compare_properties);
}

/// Compare strings chunk by chunk, treating runs of ASCII digits as
/// numbers so that `"a2" < "a10"`.
///
/// A digit run sorts before a non-digit run. Digit runs of equal value
/// but different length (leading zeros) order the longer run first,
/// except when both are all zeros, where the shorter one wins.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a;
    let mut b = b;
    loop {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        let chunk_a = leading_chunk(a);
        let chunk_b = leading_chunk(b);
        let a_is_num = starts_with_digit(chunk_a);
        let b_is_num = starts_with_digit(chunk_b);
        match (a_is_num, b_is_num) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (true, true) => {
                let ordering = compare_digit_runs(chunk_a, chunk_b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (false, false) => {
                if chunk_a != chunk_b {
                    return chunk_a.cmp(chunk_b);
                }
            }
        }
        a = &a[chunk_a.len()..];
        b = &b[chunk_b.len()..];
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

/// The maximal leading run of either digits or non-digits.
fn leading_chunk(s: &str) -> &str {
    let digits = starts_with_digit(s);
    let end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() != digits)
        .map_or(s.len(), |(i, _)| i);
    &s[..end]
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    let by_value = a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed));
    if by_value != Ordering::Equal || a.len() == b.len() {
        return by_value;
    }
    if a_trimmed.is_empty() {
        a.len().cmp(&b.len())
    } else {
        b.len().cmp(&a.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteObject;
    use crate::remote::ValueType;

    fn named(name: &str) -> PropertyDescriptor {
        PropertyDescriptor::data(name, RemoteObject::number(0.0))
    }

    fn symbol(name: &str) -> PropertyDescriptor {
        let mut descriptor = named(name);
        descriptor.symbol = Some(RemoteObject::primitive(ValueType::Symbol, name));
        descriptor
    }

    fn names(properties: &[PropertyDescriptor]) -> Vec<&str> {
        properties.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_natural_order() {
        assert_eq!(natural_cmp("a2", "a10"), Ordering::Less);
        assert_eq!(natural_cmp("a10", "a2"), Ordering::Greater);
        assert_eq!(natural_cmp("2", "10"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abd"), Ordering::Less);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("1a", "a"), Ordering::Less);
        assert_eq!(natural_cmp("x", "x"), Ordering::Equal);
    }

    #[test]
    fn test_natural_order_leading_zeros() {
        assert_eq!(natural_cmp("01", "1"), Ordering::Less);
        assert_eq!(natural_cmp("0", "00"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Less);
    }

    #[test]
    fn test_natural_order_huge_numbers() {
        assert_eq!(
            natural_cmp("99999999999999999999999", "100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn test_display_order() {
        let mut properties = vec![
            named("a2"),
            named("a10"),
            named("a1"),
            named("__proto__"),
            symbol("Symbol(s)"),
        ];
        sort_properties(&mut properties);
        assert_eq!(
            names(&properties),
            vec!["a1", "a2", "a10", "Symbol(s)", "__proto__"]
        );
    }

    #[test]
    fn test_proto_after_symbols_regardless_of_position() {
        let mut properties = vec![named("__proto__"), symbol("Symbol(a)"), named("z")];
        sort_properties(&mut properties);
        assert_eq!(names(&properties), vec!["z", "Symbol(a)", "__proto__"]);
    }

    #[test]
    fn test_equal_keys_keep_order() {
        let mut first = named("dup");
        first.enumerable = false;
        let second = named("dup");
        let mut properties = vec![first.clone(), second.clone()];
        sort_properties(&mut properties);
        assert_eq!(properties, vec![first, second]);
    }
}
