use std::cmp::Ordering;

use proptest::prelude::*;
use rwi_core::{Base64Order, ByteOrder};

const SYMBOLS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn symbol_key(len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(SYMBOLS), len)
}

fn any_order() -> impl Strategy<Value = Base64Order> {
    (any::<bool>(), any::<bool>(), prop::option::of(symbol_key(4))).prop_map(
        |(enhanced, ascending, zero)| {
            let order = if enhanced {
                Base64Order::enhanced(ascending)
            } else {
                Base64Order::standard(ascending)
            };
            match zero {
                Some(zero) => order.rotate(&zero),
                None => order,
            }
        },
    )
}

proptest! {
    #[test]
    fn compare_is_reflexive_and_antisymmetric(
        order in any_order(),
        a in prop::collection::vec(any::<u8>(), 0..16),
        b in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        prop_assert_eq!(order.compare(&a, &a), Ordering::Equal);
        prop_assert_eq!(order.compare(&a, &b), order.compare(&b, &a).reverse());
    }

    #[test]
    fn compare_is_transitive(
        order in any_order(),
        mut keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..8), 3),
    ) {
        keys.sort_by(|x, y| order.compare(x, y));
        prop_assert_ne!(order.compare(&keys[0], &keys[1]), Ordering::Greater);
        prop_assert_ne!(order.compare(&keys[1], &keys[2]), Ordering::Greater);
        prop_assert_ne!(order.compare(&keys[0], &keys[2]), Ordering::Greater);
    }

    #[test]
    fn bytes_round_trip(
        enhanced in any::<bool>(),
        triples in prop::collection::vec(any::<[u8; 3]>(), 0..20),
    ) {
        let order = if enhanced { Base64Order::enhanced(true) } else { Base64Order::standard(true) };
        let bytes: Vec<u8> = triples.concat();
        let symbols = order.encode(&bytes);
        prop_assert_eq!(symbols.len(), bytes.len() / 3 * 4);
        prop_assert_eq!(order.decode(symbols.as_bytes()), bytes);
    }

    #[test]
    fn longs_round_trip_when_wide_enough(value in 0u64..(1u64 << 60), width in 10usize..=11) {
        let order = Base64Order::enhanced(true);
        let symbols = order.encode_long(value, width);
        prop_assert_eq!(symbols.len(), width);
        prop_assert_eq!(order.decode_long(symbols.as_bytes()), value);
    }

    #[test]
    fn rotation_moves_smaller_keys_behind_the_zero_point(
        mut keys in prop::collection::vec(symbol_key(12), 4),
    ) {
        let plain = Base64Order::enhanced(true);
        keys.sort_by(|x, y| plain.compare(x, y));
        keys.dedup();
        prop_assume!(keys.len() == 4);
        let (a, b, z, above) = (&keys[0], &keys[1], &keys[2], &keys[3]);

        let ring = plain.rotate(z);
        prop_assert_eq!(ring.compare(z, a), Ordering::Less);
        prop_assert_eq!(ring.compare(above, a), Ordering::Less);
        prop_assert_eq!(ring.compare(above, b), Ordering::Less);
        prop_assert_eq!(ring.compare(a, b), Ordering::Less);
        prop_assert_eq!(ring.compare(z, above), Ordering::Less);
        // the original order is untouched
        prop_assert_eq!(plain.compare(a, z), Ordering::Less);
    }

    #[test]
    fn uncardinal_inverts_cardinal(key in symbol_key(10), zero in prop::option::of(symbol_key(10))) {
        let plain = Base64Order::enhanced(true);
        let order = match &zero {
            Some(zero) => plain.rotate(zero),
            None => plain,
        };
        let position = order.cardinal(&key);
        if zero.is_none() {
            prop_assert!(position <= rwi_core::LONG_MAX);
        }
        prop_assert_eq!(order.uncardinal(position), key);
    }

    #[test]
    fn pivot_comparison_matches_compare(
        ascending in any::<bool>(),
        pivot in symbol_key(12),
        others in prop::collection::vec(symbol_key(12), 1..32),
    ) {
        let order = Base64Order::enhanced(ascending);
        let compiled = order.compile_pivot(&pivot);
        for other in &others {
            prop_assert_eq!(order.compare_pivot(&compiled, other), order.compare(&pivot, other));
        }
    }
}

#[test]
fn byte_255_survives_a_two_symbol_round_trip() {
    let order = Base64Order::enhanced(true);
    let symbols = order.encode_long(255, 2);
    assert_eq!(symbols.len(), 2);
    assert_eq!(order.decode_long(symbols.as_bytes()), 255);
}
