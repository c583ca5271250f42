//! Human-readable invoice numbers
//!
//! Numbers come from the per-user counter (`InvoicingPort::next_invoice_sequence`)
//! and are rendered as `INV-` plus the sequence padded to three digits.

/// Prefix carried by every invoice number
pub const INVOICE_NUMBER_PREFIX: &str = "INV-";

/// Formats a counter value as an invoice number
///
/// ```
/// use domain_invoicing::numbering::format_invoice_number;
/// assert_eq!(format_invoice_number(7), "INV-007");
/// assert_eq!(format_invoice_number(1234), "INV-1234");
/// ```
pub fn format_invoice_number(sequence: u32) -> String {
    format!("{}{:03}", INVOICE_NUMBER_PREFIX, sequence)
}

/// Extracts the sequence from an invoice number, if it has the standard shape
pub fn parse_invoice_sequence(number: &str) -> Option<u32> {
    number
        .strip_prefix(INVOICE_NUMBER_PREFIX)
        .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

/// Highest sequence among `numbers`, used to floor the counter
pub fn highest_sequence<'a, I>(numbers: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    numbers
        .into_iter()
        .filter_map(parse_invoice_sequence)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_foreign_numbers() {
        assert_eq!(parse_invoice_sequence("INV-042"), Some(42));
        assert_eq!(parse_invoice_sequence("INV-"), None);
        assert_eq!(parse_invoice_sequence("2024-001"), None);
        assert_eq!(parse_invoice_sequence("INV-12a"), None);
    }

    #[test]
    fn test_highest_sequence() {
        assert_eq!(highest_sequence(["INV-003", "INV-010", "custom"]), 10);
        assert_eq!(highest_sequence(Vec::<&str>::new()), 0);
    }
}
