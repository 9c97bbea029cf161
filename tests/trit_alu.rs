use proptest::prelude::*;
use t3vm::alu;
use t3vm::trit::TritWord;

fn word_strategy(len: usize) -> impl Strategy<Value = TritWord> {
    let bound = (3i64.pow(len as u32) - 1) / 2;
    (-bound..=bound).prop_map(move |v| TritWord::from_decimal(v, len).unwrap())
}

proptest! {
    #[test]
    fn add_is_commutative(a in word_strategy(9), b in word_strategy(9)) {
        let (r1, _) = alu::add(&a, &b);
        let (r2, _) = alu::add(&b, &a);
        prop_assert_eq!(r1, r2);
    }

    #[test]
    fn add_then_sub_is_identity(a in word_strategy(9), b in word_strategy(9)) {
        let (sum, _) = alu::add(&a, &b);
        let (back, _) = alu::sub(&sum, &b);
        prop_assert_eq!(back.to_decimal(), a.to_decimal());
    }

    #[test]
    fn double_negation_is_identity(a in word_strategy(9)) {
        let once = alu::neg(&a);
        let twice = alu::neg(&once);
        prop_assert_eq!(twice.to_decimal(), a.to_decimal());
    }

    #[test]
    fn division_satisfies_remainder_bound(a in word_strategy(9), b in word_strategy(9)) {
        prop_assume!(b.to_decimal() != 0);
        if let Ok((q, r)) = alu::div(&a, &b, None) {
            prop_assert_eq!(q.to_decimal() * b.to_decimal() + r.to_decimal(), a.to_decimal());
            prop_assert!(2 * r.to_decimal().abs() <= b.to_decimal().abs());
        }
    }
}

#[test]
fn div_by_zero_is_an_error() {
    let a = TritWord::from_decimal(9, 9).unwrap();
    let zero = TritWord::zero(9);
    assert!(alu::div(&a, &zero, Some(3)).is_err());
}

#[test]
fn nand_is_de_morgan_of_and() {
    let a = TritWord::from_decimal(5, 9).unwrap();
    let b = TritWord::from_decimal(-2, 9).unwrap();
    let nand = alu::nand(&a, &b);
    let and_then_not = alu::not(&alu::cons(&a, &b));
    assert_eq!(nand, and_then_not);
}
