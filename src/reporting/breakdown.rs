use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// `part` as a percentage of `total`, two decimal places. Zero when total is zero.
pub fn percent_of(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        (part * HUNDRED / total).round_dp(2)
    }
}

/// Share of the overall total for each amount, in input order.
pub fn percentages(amounts: &[Decimal]) -> Vec<Decimal> {
    let total: Decimal = amounts.iter().copied().sum();
    amounts.iter().map(|amount| percent_of(*amount, total)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64, scale: u32) -> Decimal {
        Decimal::new(value, scale)
    }

    #[test]
    fn zero_total_gives_zero_percentages() {
        let shares = percentages(&[Decimal::ZERO, Decimal::ZERO, Decimal::ZERO]);
        assert!(shares.iter().all(|p| p.is_zero()));
        assert!(percentages(&[]).is_empty());
    }

    #[test]
    fn shares_sum_to_about_one_hundred() {
        let shares = percentages(&[dec(10000, 2), dec(10000, 2), dec(10000, 2)]);
        assert_eq!(shares, vec![dec(3333, 2), dec(3333, 2), dec(3333, 2)]);

        let sum: Decimal = shares.iter().copied().sum();
        assert!((sum - HUNDRED).abs() <= dec(5, 2));
    }

    #[test]
    fn uneven_split() {
        let shares = percentages(&[dec(750, 0), dec(250, 0)]);
        assert_eq!(shares, vec![dec(75, 0), dec(25, 0)]);
    }

    #[test]
    fn percent_of_guards_division() {
        assert_eq!(percent_of(dec(5, 0), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent_of(dec(1, 0), dec(8, 0)), dec(1250, 2));
    }
}
