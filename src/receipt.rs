use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{PrintError, Result},
    escpos::{first_unencodable, CommandBuffer, PrinterDialect},
    money::Money,
};

/// Blank lines fed before the cut so the last printed line clears the cutter
pub const TRAILING_FEED_LINES: usize = 4;

/// Timestamp format used in the document header
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Store identity printed at the top of every receipt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreIdentity {
    /// Store name
    pub name: String,
    /// Postal address, may be empty
    pub address: String,
    /// Phone number, may be empty
    pub phone: String,
}

/// Document metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptMeta {
    /// Order or bill number
    pub document_id: String,
    /// When the document was issued
    pub timestamp: NaiveDateTime,
    /// Customer or table name, may be empty
    pub counterparty: String,
}

/// One row of the item table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item name
    pub name: String,
    /// Quantity
    pub quantity: u32,
    /// Price of one unit
    pub unit_price: Money,
    /// Amount for the row
    pub line_total: Money,
}

impl LineItem {
    /// Create a row whose total is `quantity * unit_price`
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            line_total: unit_price * quantity,
        }
    }
}

/// A business document ready for printing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Store identity
    pub header: StoreIdentity,
    /// Document metadata
    pub meta: ReceiptMeta,
    /// Item rows in print order
    pub line_items: Vec<LineItem>,
    /// Grand total
    pub total: Money,
    /// Payment method shown under the total
    pub payment_label: String,
    /// Closing text
    pub footer_text: String,
}

/// Line width and item table columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptLayout {
    /// Characters per line
    pub width: usize,
    /// Item name column
    pub name_width: usize,
    /// Quantity column
    pub qty_width: usize,
    /// Unit price column
    pub rate_width: usize,
    /// Line total column
    pub amount_width: usize,
}

impl Default for ReceiptLayout {
    /// 58 mm paper: 32 columns
    fn default() -> Self {
        Self {
            width: 32,
            name_width: 14,
            qty_width: 4,
            rate_width: 7,
            amount_width: 7,
        }
    }
}

impl ReceiptLayout {
    /// Check that the columns exactly fill the line
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Config`] when they do not.
    pub fn validate(&self) -> Result<()> {
        let sum = self.name_width + self.qty_width + self.rate_width + self.amount_width;
        if sum != self.width || self.width == 0 {
            return Err(PrintError::Config(format!(
                "item columns sum to {sum}, line width is {}",
                self.width
            )));
        }
        Ok(())
    }

    /// Render one item table row, exactly `width` characters
    ///
    /// A numeric value wider than its column takes the extra space from the
    /// name column. When the numbers still do not fit, the rate column and
    /// then the quantity column are left out; the amount is never cut.
    #[must_use]
    pub fn table_row(&self, name: &str, qty: &str, rate: &str, amount: &str) -> String {
        let mut qty_w = self.qty_width.max(char_len(qty) + 1);
        let mut rate_w = self.rate_width.max(char_len(rate) + 1);
        let amount_w = self.amount_width.max(char_len(amount) + 1);
        if qty_w + rate_w + amount_w > self.width {
            rate_w = 0;
        }
        if qty_w + rate_w + amount_w > self.width {
            qty_w = 0;
        }
        let name_w = self.width.saturating_sub(qty_w + rate_w + amount_w);

        let row = format!(
            "{}{}{}{}",
            pad_right(name, name_w),
            pad_left(qty, qty_w),
            pad_left(rate, rate_w),
            pad_left(amount, amount_w)
        );
        truncate(&row, self.width)
    }

    /// Render a label/value row, exactly `width` characters
    #[must_use]
    pub fn pair(&self, label: &str, value: &str) -> String {
        let value = truncate(value, self.width);
        let label_w = self.width - char_len(&value);
        let label = truncate(label, label_w.saturating_sub(1));
        format!("{}{}", pad_right(&label, label_w), value)
    }

    /// A full-width separator line
    #[must_use]
    pub fn rule(&self, c: char) -> String {
        std::iter::repeat_n(c, self.width).collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn pad_right(s: &str, width: usize) -> String {
    let s = truncate(s, width);
    let fill = width - char_len(&s);
    format!("{s}{}", " ".repeat(fill))
}

fn pad_left(s: &str, width: usize) -> String {
    let s = truncate(s, width);
    let fill = width - char_len(&s);
    format!("{}{s}", " ".repeat(fill))
}

/// Renders receipts for one printer dialect and paper layout
#[derive(Debug, Clone, Default)]
pub struct ReceiptEncoder {
    dialect: PrinterDialect,
    layout: ReceiptLayout,
}

impl ReceiptEncoder {
    /// Create an encoder
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Config`] if the layout columns do not fill the line.
    pub fn new(dialect: PrinterDialect, layout: ReceiptLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self { dialect, layout })
    }

    /// Paper layout in use
    #[must_use]
    pub const fn layout(&self) -> &ReceiptLayout {
        &self.layout
    }

    /// Render a receipt
    #[must_use]
    pub fn encode(&self, receipt: &Receipt) -> Vec<u8> {
        let layout = &self.layout;
        let mut out = CommandBuffer::new(self.dialect);

        out.initialize();

        out.center().double_size(true).bold(true);
        out.line(&receipt.header.name);
        out.double_size(false).bold(false);
        if !receipt.header.address.is_empty() {
            out.line(&receipt.header.address);
        }
        if !receipt.header.phone.is_empty() {
            out.line(&format!("Tel: {}", receipt.header.phone));
        }

        out.left().line(&layout.rule('-'));
        out.line(&layout.pair("No:", &receipt.meta.document_id));
        out.line(&layout.pair(
            "Date:",
            &receipt.meta.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ));
        if !receipt.meta.counterparty.is_empty() {
            out.line(&layout.pair("Customer:", &receipt.meta.counterparty));
        }
        out.line(&layout.rule('-'));

        out.bold(true)
            .line(&layout.table_row("Item", "Qty", "Rate", "Amount"))
            .bold(false);
        out.line(&layout.rule('-'));
        for item in &receipt.line_items {
            out.line(&layout.table_row(
                &item.name,
                &item.quantity.to_string(),
                &item.unit_price.to_string(),
                &item.line_total.to_string(),
            ));
        }
        out.line(&layout.rule('-'));

        out.bold(true)
            .line(&layout.pair("TOTAL", &receipt.total.to_string()))
            .bold(false);
        if !receipt.payment_label.is_empty() {
            out.line(&layout.pair("Payment:", &receipt.payment_label));
        }
        out.line(&layout.rule('='));

        if !receipt.footer_text.is_empty() {
            out.center();
            for line in receipt.footer_text.lines() {
                out.line(line);
            }
            out.left();
        }

        out.feed(TRAILING_FEED_LINES).cut();

        let bytes = out.build();
        debug!(
            document = %receipt.meta.document_id,
            items = receipt.line_items.len(),
            bytes = bytes.len(),
            "Encoded receipt"
        );
        bytes
    }

    /// Render a short test page carrying `text`
    #[must_use]
    pub fn encode_test_page(&self, text: &str) -> Vec<u8> {
        let mut out = CommandBuffer::new(self.dialect);
        out.initialize().left();
        for line in text.lines() {
            out.line(line);
        }
        out.feed(TRAILING_FEED_LINES).cut();
        out.build()
    }
}

/// Find the first character in a receipt that cannot be printed as one byte
///
/// # Errors
///
/// Returns [`PrintError::EncodingUnsupported`] naming the field and character.
pub fn check_encodable(receipt: &Receipt) -> Result<()> {
    let mut fields: Vec<(String, &str)> = vec![
        ("store name".to_string(), receipt.header.name.as_str()),
        ("store address".to_string(), receipt.header.address.as_str()),
        ("store phone".to_string(), receipt.header.phone.as_str()),
        ("document id".to_string(), receipt.meta.document_id.as_str()),
        ("counterparty".to_string(), receipt.meta.counterparty.as_str()),
        ("payment label".to_string(), receipt.payment_label.as_str()),
        ("footer".to_string(), receipt.footer_text.as_str()),
    ];
    fields.extend(
        receipt
            .line_items
            .iter()
            .enumerate()
            .map(|(i, item)| (format!("item {}", i + 1), item.name.as_str())),
    );

    for (field, value) in fields {
        if let Some(character) = first_unencodable(value) {
            return Err(PrintError::EncodingUnsupported { field, character });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn acme_receipt() -> Receipt {
        Receipt {
            header: StoreIdentity {
                name: "Acme".to_string(),
                address: "1 Main St".to_string(),
                phone: "555-0100".to_string(),
            },
            meta: ReceiptMeta {
                document_id: "B-1001".to_string(),
                timestamp: NaiveDate::from_ymd_opt(2026, 3, 14)
                    .unwrap()
                    .and_hms_opt(9, 30, 0)
                    .unwrap(),
                counterparty: "Table 4".to_string(),
            },
            line_items: vec![LineItem::new("Tea", 2, Money::from_major(25))],
            total: Money::from_major(50),
            payment_label: "Cash".to_string(),
            footer_text: "Thank you!".to_string(),
        }
    }

    /// Printable lines of an encoded stream, with control sequences removed
    fn text_lines(bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                0x1B | 0x1D => {
                    // every ESC/POS sequence used here is prefix + command + one argument,
                    // except ESC @
                    i += if bytes.get(i + 1) == Some(&b'@') { 2 } else { 3 };
                    continue;
                }
                0x0A => lines.push(std::mem::take(&mut current)),
                b => current.push(char::from(b)),
            }
            i += 1;
        }
        lines
    }

    #[test]
    fn test_layout_validation() {
        assert!(ReceiptLayout::default().validate().is_ok());
        let broken = ReceiptLayout {
            name_width: 20,
            ..ReceiptLayout::default()
        };
        assert!(matches!(broken.validate(), Err(PrintError::Config(_))));
        assert!(ReceiptEncoder::new(PrinterDialect::EscPos, broken).is_err());
    }

    #[test]
    fn test_table_row_truncation_law() {
        let layout = ReceiptLayout::default();
        for len in 0..60 {
            let name = "x".repeat(len);
            let row = layout.table_row(&name, "2", "25", "50");
            assert_eq!(row.chars().count(), 32, "name length {len}");
        }

        let row = layout.table_row("Masala Chai Extra Large", "12", "125.50", "1506");
        assert_eq!(row.chars().count(), 32);
        assert!(row.starts_with("Masala Chai Ex"));
        assert!(row.ends_with("   1506"));
    }

    #[test]
    fn test_wide_numbers_borrow_from_name() {
        let layout = ReceiptLayout::default();
        let row = layout.table_row("Banquet", "1", "1234567.50", "1234567.50");
        assert_eq!(row.chars().count(), 32);
        assert!(row.ends_with(" 1234567.50 1234567.50"));
    }

    #[test]
    fn test_oversized_numbers_drop_rate_not_amount() {
        let layout = ReceiptLayout::default();
        let row = layout.table_row("Hall", "1", "123456789012.50", "123456789012.50");
        assert_eq!(row.chars().count(), 32);
        assert!(row.ends_with(" 123456789012.50"));
        assert_eq!(row.matches("123456789012.50").count(), 1);

        let row = layout.table_row("Hall", "12", "1", "1234567890123456789012345678.50");
        assert_eq!(row.chars().count(), 32);
        assert!(row.ends_with(" 1234567890123456789012345678.50"));
    }

    #[test]
    fn test_pair_rows() {
        let layout = ReceiptLayout::default();
        let row = layout.pair("Date:", "14/03/2026 09:30");
        assert_eq!(row.chars().count(), 32);
        assert!(row.starts_with("Date:"));
        assert!(row.ends_with("14/03/2026 09:30"));

        let row = layout.pair("A very long label that overflows", "50");
        assert_eq!(row.chars().count(), 32);
        assert!(row.ends_with(" 50"));
    }

    #[test]
    fn test_acme_scenario() {
        let encoder = ReceiptEncoder::default();
        let bytes = encoder.encode(&acme_receipt());
        let lines = text_lines(&bytes);

        let tea = lines.iter().find(|l| l.starts_with("Tea")).unwrap();
        assert_eq!(
            tea,
            &format!("Tea{}2{}25{}50", " ".repeat(14), " ".repeat(5), " ".repeat(5))
        );

        let total = lines.iter().find(|l| l.starts_with("TOTAL")).unwrap();
        assert_eq!(total, &format!("TOTAL{}50", " ".repeat(25)));
        assert!(lines.iter().any(|l| l == "Acme"));
        assert!(!lines.iter().any(|l| l.contains("50.00")));
    }

    #[test]
    fn test_all_tabular_rows_are_full_width() {
        let mut receipt = acme_receipt();
        receipt.line_items.push(LineItem::new(
            "An extraordinarily long dish name",
            3,
            Money::from_decimal(12.5),
        ));
        let lines = text_lines(&ReceiptEncoder::default().encode(&receipt));

        let start = lines.iter().position(|l| l.starts_with("Item")).unwrap();
        for row in &lines[start..start + 4] {
            assert_eq!(row.chars().count(), 32, "{row:?}");
        }
        assert!(lines.iter().any(|l| l.ends_with("12.50  37.50")));
    }

    #[test]
    fn test_item_name_newline_stays_on_its_row() {
        let mut receipt = acme_receipt();
        receipt.line_items[0].name = "Tea\nExtra".to_string();
        let bytes = ReceiptEncoder::default().encode(&receipt);
        let lines = text_lines(&bytes);

        let row = lines.iter().find(|l| l.starts_with("Tea")).unwrap();
        assert!(row.starts_with("Tea Extra"));
        assert_eq!(row.chars().count(), 32);
        assert!(!lines.iter().any(|l| l.starts_with("Extra")));
    }

    #[test]
    fn test_trailer_feeds_then_cuts_once() {
        let bytes = ReceiptEncoder::default().encode(&acme_receipt());
        assert!(bytes.starts_with(&[0x1B, 0x40]));
        assert!(bytes.ends_with(&[0x0A, 0x0A, 0x0A, 0x0A, 0x1D, 0x56, 0x00]));
        let cuts = bytes.windows(3).filter(|w| *w == [0x1D, 0x56, 0x00]).count();
        assert_eq!(cuts, 1);
    }

    #[test]
    fn test_star_dialect_cut() {
        let encoder =
            ReceiptEncoder::new(PrinterDialect::StarPrnt, ReceiptLayout::default()).unwrap();
        let bytes = encoder.encode(&acme_receipt());
        assert!(bytes.ends_with(&[0x1B, 0x64, 0x00]));
    }

    #[test]
    fn test_check_encodable() {
        let receipt = acme_receipt();
        assert!(check_encodable(&receipt).is_ok());

        let mut receipt = acme_receipt();
        receipt.line_items[0].name = "Crème brûlée".to_string();
        assert!(check_encodable(&receipt).is_ok());

        receipt.line_items[0].name = "Matcha 抹茶".to_string();
        match check_encodable(&receipt) {
            Err(PrintError::EncodingUnsupported { field, character }) => {
                assert_eq!(field, "item 1");
                assert_eq!(character, '抹');
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_test_page() {
        let bytes = ReceiptEncoder::default().encode_test_page("Printer OK");
        let lines = text_lines(&bytes);
        assert_eq!(lines[0], "Printer OK");
        assert!(bytes.ends_with(&[0x1D, 0x56, 0x00]));
    }
}
