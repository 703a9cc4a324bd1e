//! Invoice document rendering seam.
//!
//! Real PDF generation is provided by the host application. The bundled
//! [`PlainTextRenderer`] produces a text rendition of the same layout for
//! development and tests.

use std::fmt::Write as _;

use thiserror::Error;

use orbit_invoicing::Invoice;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PdfError {
    #[error("pdf rendering failed: {0}")]
    Render(String),

    #[error("pdf renderer unavailable")]
    Unavailable,
}

pub trait PdfRenderer: Send + Sync {
    fn render(&self, invoice: &Invoice) -> Result<Vec<u8>, PdfError>;
}

/// Header, line items and totals as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl PdfRenderer for PlainTextRenderer {
    fn render(&self, invoice: &Invoice) -> Result<Vec<u8>, PdfError> {
        if !invoice.is_created() {
            return Err(PdfError::Render("invoice has not been created".to_string()));
        }

        let mut out = String::new();
        write_document(&mut out, invoice).map_err(|e| PdfError::Render(e.to_string()))?;
        Ok(out.into_bytes())
    }
}

fn write_document(out: &mut String, invoice: &Invoice) -> std::fmt::Result {
    let currency = invoice.currency();

    writeln!(out, "INVOICE {}", invoice.invoice_number())?;
    writeln!(out, "Status: {}", invoice.status())?;
    if let Some(issue_date) = invoice.issue_date() {
        writeln!(out, "Issue date: {issue_date}")?;
    }
    if let Some(due_date) = invoice.due_date() {
        writeln!(out, "Due date: {due_date}")?;
    }
    writeln!(out)?;

    for item in invoice.items() {
        writeln!(
            out,
            "{} | {} x {} = {} {currency}",
            item.description, item.quantity, item.unit_price, item.amount
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Subtotal: {} {currency}", invoice.subtotal())?;
    writeln!(out, "Tax: {} {currency}", invoice.tax_amount())?;
    writeln!(out, "Discount: {} {currency}", invoice.discount_amount())?;
    writeln!(out, "Total: {} {currency}", invoice.total_amount())?;
    writeln!(out, "Paid: {} {currency}", invoice.amount_paid())?;
    writeln!(out, "Balance due: {} {currency}", invoice.remaining_balance())?;

    if let Some(terms) = invoice.payment_terms() {
        writeln!(out, "Payment terms: {terms}")?;
    }
    if let Some(notes) = invoice.notes() {
        writeln!(out, "Notes: {notes}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::InvoiceId;

    #[test]
    fn refuses_uncreated_invoices() {
        let err = PlainTextRenderer.render(&Invoice::empty(InvoiceId::new())).unwrap_err();
        assert!(matches!(err, PdfError::Render(_)));
    }
}
