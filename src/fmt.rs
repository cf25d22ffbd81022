use rust_decimal::Decimal;

/// Format an amount with thousands separators and two decimals: 1,234.56
pub fn money(val: Decimal) -> String {
    let val = val.round_dp(2);
    let negative = val.is_sign_negative() && !val.is_zero();
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Plain two-decimal rendering used in CSV output.
pub fn plain(val: Decimal) -> String {
    let mut val = val.round_dp(2);
    if val.is_zero() {
        val.set_sign_positive(true);
    }
    format!("{val:.2}")
}
