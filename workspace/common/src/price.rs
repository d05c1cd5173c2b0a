/// Formats a whole-Rupiah amount with comma thousands separators.
///
/// ```
/// assert_eq!(common::format_rupiah(150000), "Rp150,000");
/// assert_eq!(common::format_rupiah(-1500), "-Rp1,500");
/// ```
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-Rp{}", grouped)
    } else {
        format!("Rp{}", grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_amounts_have_no_separator() {
        assert_eq!(format_rupiah(0), "Rp0");
        assert_eq!(format_rupiah(999), "Rp999");
    }

    #[test]
    fn test_groups_by_thousands() {
        assert_eq!(format_rupiah(1000), "Rp1,000");
        assert_eq!(format_rupiah(10000), "Rp10,000");
        assert_eq!(format_rupiah(150000), "Rp150,000");
        assert_eq!(format_rupiah(1234567), "Rp1,234,567");
    }

    #[test]
    fn test_negative_amounts() {
        assert_eq!(format_rupiah(-10000), "-Rp10,000");
        assert_eq!(format_rupiah(i64::MIN), "-Rp9,223,372,036,854,775,808");
    }
}
