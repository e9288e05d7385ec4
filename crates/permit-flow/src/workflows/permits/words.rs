use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::fees::round2;

const ONES: [&str; 20] = [
    "ZERO",
    "ONE",
    "TWO",
    "THREE",
    "FOUR",
    "FIVE",
    "SIX",
    "SEVEN",
    "EIGHT",
    "NINE",
    "TEN",
    "ELEVEN",
    "TWELVE",
    "THIRTEEN",
    "FOURTEEN",
    "FIFTEEN",
    "SIXTEEN",
    "SEVENTEEN",
    "EIGHTEEN",
    "NINETEEN",
];

const TENS: [&str; 10] = [
    "", "", "TWENTY", "THIRTY", "FORTY", "FIFTY", "SIXTY", "SEVENTY", "EIGHTY", "NINETY",
];

/// Enough groups for `Decimal::MAX` (about 7.9 x 10^28).
const SCALES: [&str; 10] = [
    "",
    "THOUSAND",
    "MILLION",
    "BILLION",
    "TRILLION",
    "QUADRILLION",
    "QUINTILLION",
    "SEXTILLION",
    "SEPTILLION",
    "OCTILLION",
];

fn below_hundred(n: u128, out: &mut Vec<&'static str>) {
    if n < 20 {
        out.push(ONES[n as usize]);
    } else {
        out.push(TENS[(n / 10) as usize]);
        if n % 10 != 0 {
            out.push(ONES[(n % 10) as usize]);
        }
    }
}

fn below_thousand(n: u128, out: &mut Vec<&'static str>) {
    if n >= 100 {
        out.push(ONES[(n / 100) as usize]);
        out.push("HUNDRED");
    }
    if n % 100 != 0 {
        below_hundred(n % 100, out);
    }
}

fn integer_words(mut n: u128) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut groups = Vec::new();
    while n > 0 {
        groups.push(n % 1000);
        n /= 1000;
    }

    let mut words = Vec::new();
    for (scale, group) in groups.iter().enumerate().rev() {
        if *group == 0 {
            continue;
        }
        below_thousand(*group, &mut words);
        if scale > 0 {
            words.push(SCALES[scale]);
        }
    }
    words.join(" ")
}

/// Render a peso amount the way it is printed on official receipts.
///
/// `1234.50` becomes `ONE THOUSAND TWO HUNDRED THIRTY FOUR AND FIFTY CENTS PESOS ONLY`.
pub fn amount_to_words(amount: Decimal) -> String {
    let rounded = round2(amount.abs());
    let whole = rounded.trunc();
    let cents = ((rounded - whole) * Decimal::ONE_HUNDRED)
        .to_u128()
        .unwrap_or_default();
    // Every non-negative integral Decimal fits in u128.
    let whole = whole.to_u128().unwrap_or_default();

    let mut text = integer_words(whole);
    if cents > 0 {
        text.push_str(" AND ");
        let mut cent_words = Vec::new();
        below_hundred(cents, &mut cent_words);
        text.push_str(&cent_words.join(" "));
        text.push_str(" CENTS");
    }
    text.push_str(" PESOS ONLY");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_receipt_amounts() {
        assert_eq!(
            amount_to_words(Decimal::new(123450, 2)),
            "ONE THOUSAND TWO HUNDRED THIRTY FOUR AND FIFTY CENTS PESOS ONLY"
        );
        assert_eq!(amount_to_words(Decimal::ZERO), "ZERO PESOS ONLY");
        assert_eq!(
            amount_to_words(Decimal::new(30_000, 0)),
            "THIRTY THOUSAND PESOS ONLY"
        );
        assert_eq!(
            amount_to_words(Decimal::new(1_000_015, 2)),
            "TEN THOUSAND AND FIFTEEN CENTS PESOS ONLY"
        );
    }

    #[test]
    fn skips_empty_groups() {
        assert_eq!(
            amount_to_words(Decimal::new(2_000_101, 0)),
            "TWO MILLION ONE HUNDRED ONE PESOS ONLY"
        );
        assert_eq!(
            amount_to_words(Decimal::new(90, 2)),
            "ZERO AND NINETY CENTS PESOS ONLY"
        );
    }

    #[test]
    fn renders_amounts_beyond_u64() {
        let past_u64 = Decimal::from(u64::MAX) + Decimal::ONE;
        assert_eq!(
            amount_to_words(past_u64),
            "EIGHTEEN QUINTILLION FOUR HUNDRED FORTY SIX QUADRILLION SEVEN HUNDRED FORTY FOUR \
             TRILLION SEVENTY THREE BILLION SEVEN HUNDRED NINE MILLION FIVE HUNDRED FIFTY ONE \
             THOUSAND SIX HUNDRED SIXTEEN PESOS ONLY"
        );
        assert!(amount_to_words(Decimal::MAX)
            .starts_with("SEVENTY NINE OCTILLION TWO HUNDRED TWENTY EIGHT SEPTILLION"));
    }
}
