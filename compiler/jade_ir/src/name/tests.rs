use pretty_assertions::assert_eq;

use super::*;

#[test]
fn intern_is_stable() {
    let mut interner = StringInterner::new();
    let a = interner.intern("java/lang/Object");
    let b = interner.intern("java/lang/Object");
    assert_eq!(a, b);
    assert_eq!(interner.resolve(a), "java/lang/Object");
}

#[test]
fn distinct_strings_get_distinct_names() {
    let mut interner = StringInterner::new();
    let a = interner.intern("field_a");
    let b = interner.intern("field_b");
    assert_ne!(a, b);
    assert_eq!(interner.resolve(a), "field_a");
    assert_eq!(interner.resolve(b), "field_b");
}

#[test]
fn empty_string_is_pre_interned() {
    let mut interner = StringInterner::new();
    assert_eq!(interner.intern(""), Name::EMPTY);
    assert_eq!(interner.resolve(Name::EMPTY), "");
    assert_eq!(interner.len(), 1);
}

#[test]
fn unknown_name_resolves_to_empty() {
    let interner = StringInterner::new();
    assert_eq!(interner.resolve(Name::from_raw(999)), "");
}
