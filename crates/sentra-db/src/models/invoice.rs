//! Invoice model.
//!
//! Amounts are integer cents. The derived columns (`gst_amount_cents`,
//! `total_cents`) are always supplied by the caller from
//! `sentra_core::money`, recomputed in the same write that changes the
//! subtotal; nothing here stores a total it did not just derive.
//!
//! The mutation verbs are shaped for idempotent re-application: replaying
//! `mark_paid` on an already-paid invoice sets the same fields to the
//! same values and keeps the original `paid_at`.

use chrono::{DateTime, Datelike, Utc};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Invoice lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Void,
    Uncollectible,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Draft => write!(f, "draft"),
            InvoiceStatus::Open => write!(f, "open"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Void => write!(f, "void"),
            InvoiceStatus::Uncollectible => write!(f, "uncollectible"),
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(InvoiceStatus::Draft),
            "open" => Ok(InvoiceStatus::Open),
            "paid" => Ok(InvoiceStatus::Paid),
            "void" => Ok(InvoiceStatus::Void),
            "uncollectible" => Ok(InvoiceStatus::Uncollectible),
            _ => Err(format!("Invalid invoice status: {s}")),
        }
    }
}

/// An invoice in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Invoice {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: Uuid,
    /// Human-readable number, `INV-YYYYMM-NNNN`.
    pub invoice_number: String,
    /// Lifecycle status.
    pub status: String,
    /// ISO currency code.
    pub currency: String,
    /// Pre-tax amount in cents.
    pub subtotal_cents: i64,
    /// GST in cents, derived from the subtotal.
    pub gst_amount_cents: i64,
    /// Subtotal plus GST.
    pub total_cents: i64,
    /// Amount received so far.
    pub amount_paid_cents: i64,
    /// Payment provider's invoice id, when one exists.
    pub external_invoice_id: Option<String>,
    /// When the invoice was issued.
    pub issued_at: DateTime<Utc>,
    /// Payment deadline.
    pub due_at: Option<DateTime<Utc>>,
    /// When payment was recorded.
    pub paid_at: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub organization_id: Uuid,
    pub invoice_number: String,
    pub currency: String,
    pub subtotal_cents: i64,
    pub gst_amount_cents: i64,
    pub total_cents: i64,
    pub due_at: Option<DateTime<Utc>>,
    pub external_invoice_id: Option<String>,
}

/// Format an invoice number from the issue month and a 1-based sequence.
#[must_use]
pub fn format_invoice_number(issued_at: DateTime<Utc>, seq: i64) -> String {
    format!(
        "INV-{:04}{:02}-{:04}",
        issued_at.year(),
        issued_at.month(),
        seq
    )
}

impl Invoice {
    /// Get the status as enum.
    #[must_use]
    pub fn status_enum(&self) -> Option<InvoiceStatus> {
        self.status.parse().ok()
    }

    /// Count invoices issued in the same calendar month as `at`.
    ///
    /// Used for number allocation; the UNIQUE constraint on
    /// `invoice_number` is the backstop if two creates race.
    pub async fn count_issued_in_month<'e, E>(
        executor: E,
        at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM invoices
            WHERE date_trunc('month', issued_at) = date_trunc('month', $1::timestamptz)
            ",
        )
        .bind(at)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Create an invoice in `open` status.
    pub async fn create<'e, E>(executor: E, input: &NewInvoice) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO invoices
                (organization_id, invoice_number, status, currency, subtotal_cents,
                 gst_amount_cents, total_cents, due_at, external_invoice_id)
            VALUES ($1, $2, 'open', $3, $4, $5, $6, $7, $8)
            RETURNING id, organization_id, invoice_number, status, currency, subtotal_cents,
                      gst_amount_cents, total_cents, amount_paid_cents, external_invoice_id,
                      issued_at, due_at, paid_at, created_at, updated_at
            ",
        )
        .bind(input.organization_id)
        .bind(&input.invoice_number)
        .bind(&input.currency)
        .bind(input.subtotal_cents)
        .bind(input.gst_amount_cents)
        .bind(input.total_cents)
        .bind(input.due_at)
        .bind(&input.external_invoice_id)
        .fetch_one(executor)
        .await
    }

    /// Fetch an invoice by id.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, organization_id, invoice_number, status, currency, subtotal_cents,
                   gst_amount_cents, total_cents, amount_paid_cents, external_invoice_id,
                   issued_at, due_at, paid_at, created_at, updated_at
            FROM invoices
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Fetch an invoice by the payment provider's id.
    pub async fn find_by_external_id<'e, E>(
        executor: E,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, organization_id, invoice_number, status, currency, subtotal_cents,
                   gst_amount_cents, total_cents, amount_paid_cents, external_invoice_id,
                   issued_at, due_at, paid_at, created_at, updated_at
            FROM invoices
            WHERE external_invoice_id = $1
            ",
        )
        .bind(external_id)
        .fetch_optional(executor)
        .await
    }

    /// Record payment in full.
    ///
    /// Idempotent: re-applying to a paid invoice rewrites the same
    /// values and keeps the first `paid_at`. Void invoices are not
    /// eligible; `None` is returned and the caller decides severity.
    pub async fn mark_paid<'e, E>(
        executor: E,
        id: Uuid,
        amount_paid_cents: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            UPDATE invoices
            SET status = 'paid', paid_at = COALESCE(paid_at, $3),
                amount_paid_cents = $2, updated_at = $3
            WHERE id = $1 AND status <> 'void'
            RETURNING id, organization_id, invoice_number, status, currency, subtotal_cents,
                      gst_amount_cents, total_cents, amount_paid_cents, external_invoice_id,
                      issued_at, due_at, paid_at, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(amount_paid_cents)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Push an invoice back to `open` after a failed payment attempt.
    ///
    /// No-op (zero rows) for paid or void invoices; a stale failure
    /// event must not unseat a recorded payment.
    pub async fn mark_payment_failed<'e, E>(
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE invoices
            SET status = 'open', updated_at = $2
            WHERE id = $1 AND status NOT IN ('paid', 'void')
            ",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Void a draft or open invoice. Paid invoices cannot be voided.
    pub async fn mark_void<'e, E>(
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            UPDATE invoices
            SET status = 'void', updated_at = $2
            WHERE id = $1 AND status IN ('draft', 'open')
            RETURNING id, organization_id, invoice_number, status, currency, subtotal_cents,
                      gst_amount_cents, total_cents, amount_paid_cents, external_invoice_id,
                      issued_at, due_at, paid_at, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_round_trip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Open,
            InvoiceStatus::Paid,
            InvoiceStatus::Void,
            InvoiceStatus::Uncollectible,
        ] {
            assert_eq!(status.to_string().parse::<InvoiceStatus>(), Ok(status));
        }
        assert!("refunded".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn test_invoice_number_format() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        assert_eq!(format_invoice_number(issued, 1), "INV-202603-0001");
        assert_eq!(format_invoice_number(issued, 42), "INV-202603-0042");
        assert_eq!(format_invoice_number(issued, 12345), "INV-202603-12345");
    }

    #[test]
    fn test_invoice_number_pads_month() {
        let issued = Utc.with_ymd_and_hms(2027, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(format_invoice_number(issued, 7), "INV-202701-0007");
    }
}
