//! Integer-cent invoice arithmetic.
//!
//! All monetary amounts move through the platform as integer cents.
//! Derived invoice fields (GST, total) are never stored independently of
//! the subtotal: every write that touches the subtotal recomputes them
//! through [`InvoiceTotals::compute`], so a stored invoice can never
//! carry a stale total.

use serde::{Deserialize, Serialize};

/// Divisor for basis-point rates (100% == 10 000 bps).
const BASIS_POINTS: i128 = 10_000;

/// Derived amounts for one invoice, computed from the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal_cents: i64,
    pub gst_amount_cents: i64,
    pub total_cents: i64,
}

impl InvoiceTotals {
    /// Compute GST and total for a subtotal at the given rate.
    ///
    /// GST is rounded half away from zero at the cent boundary, matching
    /// IRAS practice for tax invoices. Intermediate math is `i128` so no
    /// realistic subtotal can overflow.
    #[must_use]
    pub fn compute(subtotal_cents: i64, gst_rate_bps: u32) -> Self {
        let scaled = i128::from(subtotal_cents) * i128::from(gst_rate_bps);
        let half = BASIS_POINTS / 2;
        let gst = if scaled >= 0 {
            (scaled + half) / BASIS_POINTS
        } else {
            (scaled - half) / BASIS_POINTS
        };
        // i128 -> i64 cannot lose range here: |gst| <= |subtotal|
        // for any rate below 10 000 bps.
        let gst_amount_cents = gst as i64;
        Self {
            subtotal_cents,
            gst_amount_cents,
            total_cents: subtotal_cents + gst_amount_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nine_percent_of_hundred_dollars() {
        let totals = InvoiceTotals::compute(10_000, 900);
        assert_eq!(totals.gst_amount_cents, 900);
        assert_eq!(totals.total_cents, 10_900);
    }

    #[test]
    fn test_half_cent_rounds_up() {
        // 50 cents at 9% = 4.5 cents of GST
        let totals = InvoiceTotals::compute(50, 900);
        assert_eq!(totals.gst_amount_cents, 5);
        assert_eq!(totals.total_cents, 55);
    }

    #[test]
    fn test_below_half_cent_rounds_down() {
        // 49 cents at 9% = 4.41 cents of GST
        let totals = InvoiceTotals::compute(49, 900);
        assert_eq!(totals.gst_amount_cents, 4);
        assert_eq!(totals.total_cents, 53);
    }

    #[test]
    fn test_zero_subtotal() {
        let totals = InvoiceTotals::compute(0, 900);
        assert_eq!(totals.gst_amount_cents, 0);
        assert_eq!(totals.total_cents, 0);
    }

    #[test]
    fn test_zero_rate() {
        let totals = InvoiceTotals::compute(123_456, 0);
        assert_eq!(totals.gst_amount_cents, 0);
        assert_eq!(totals.total_cents, 123_456);
    }

    #[test]
    fn test_credit_note_rounds_away_from_zero() {
        // Negative subtotals (credit notes) mirror the positive rounding.
        let totals = InvoiceTotals::compute(-50, 900);
        assert_eq!(totals.gst_amount_cents, -5);
        assert_eq!(totals.total_cents, -55);
    }

    #[test]
    fn test_large_subtotal_no_overflow() {
        let totals = InvoiceTotals::compute(i64::MAX / 2, 900);
        assert!(totals.gst_amount_cents > 0);
    }
}
