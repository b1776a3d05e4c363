use jade_ir::Name;
use pretty_assertions::assert_eq;

use super::*;

#[test]
fn unknown_callee_defaults_to_captured_args() {
    let table = EscapePolicyTable::new();
    let effect = table.effect(Name::from_raw(42));
    assert_eq!(effect, CalleeEffect::UNKNOWN);
    assert_eq!(effect.args, ArgPolicy::Captured);
    assert_eq!(effect.ret, ReturnPolicy::Unknown);
}

#[test]
fn registered_effect_wins() {
    let callee = Name::from_raw(7);
    let mut table = EscapePolicyTable::new();
    table.insert(
        callee,
        CalleeEffect {
            args: ArgPolicy::NotCaptured,
            ret: ReturnPolicy::FreshObject,
        },
    );

    assert_eq!(table.effect(callee).args, ArgPolicy::NotCaptured);
    assert_eq!(table.effect(callee).ret, ReturnPolicy::FreshObject);
    // Other callees are untouched.
    assert_eq!(table.effect(Name::from_raw(8)), CalleeEffect::UNKNOWN);
}

#[test]
fn table_builds_from_iterator() {
    let a = Name::from_raw(1);
    let b = Name::from_raw(2);
    let table: EscapePolicyTable = [
        (
            a,
            CalleeEffect {
                args: ArgPolicy::Escapes,
                ret: ReturnPolicy::Unknown,
            },
        ),
        (
            b,
            CalleeEffect {
                args: ArgPolicy::Captured,
                ret: ReturnPolicy::MayAliasArgs,
            },
        ),
    ]
    .into_iter()
    .collect();

    assert_eq!(table.effect(a).args, ArgPolicy::Escapes);
    assert_eq!(table.effect(b).ret, ReturnPolicy::MayAliasArgs);
}
