//! Barcode normalization.
//!
//! Sources disagree on how a product's barcode is written: an 11-digit UPC
//! core, a 12-digit UPC-A, a zero-padded 13-digit EAN, and so on. Everything
//! here is pure; [`generate_variants`] produces the equivalence set that the
//! pipeline context uses to decide whether two results describe the same item.

use crate::error::BarcodeError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Shortest core accepted by [`calculate_check_digit`] (an EAN-8 core).
pub const MIN_CHECK_DIGIT_CORE_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum BarcodeFormat {
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "UPC-A-Core")]
    UpcACore,
    #[serde(rename = "EAN-8")]
    Ean8,
    #[serde(rename = "GTIN-14")]
    Gtin14,
}

impl BarcodeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::UpcACore => "UPC-A-Core",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::Gtin14 => "GTIN-14",
        }
    }

    /// Fixed human-readable note attached to every variant of this format.
    pub fn note(&self) -> &'static str {
        match self {
            BarcodeFormat::Ean13 => "13-digit EAN with US/Canada zero prefix",
            BarcodeFormat::UpcA => "12-digit UPC-A including check digit",
            BarcodeFormat::UpcACore => "11-digit UPC-A without check digit",
            BarcodeFormat::Ean8 => "8-digit short-form EAN",
            BarcodeFormat::Gtin14 => "14-digit GTIN, no equivalence expansion",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One representation of a barcode. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BarcodeVariant {
    pub barcode: String,
    pub format: BarcodeFormat,
    pub note: &'static str,
}

impl BarcodeVariant {
    fn new(barcode: impl Into<String>, format: BarcodeFormat) -> Self {
        Self {
            barcode: barcode.into(),
            format,
            note: format.note(),
        }
    }
}

/// Strip everything that is not an ASCII digit.
pub fn normalize_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Every representation of `raw` that denotes the same product.
///
/// Unrecognized or ambiguous shapes (including non-US EAN-13 codes) yield an
/// empty set, which callers must read as "cannot establish equivalence".
pub fn generate_variants(raw: &str) -> BTreeSet<BarcodeVariant> {
    let digits = normalize_digits(raw);
    let mut variants = BTreeSet::new();

    match digits.len() {
        14 => {
            variants.insert(BarcodeVariant::new(digits, BarcodeFormat::Gtin14));
        }
        8 => {
            variants.insert(BarcodeVariant::new(digits, BarcodeFormat::Ean8));
        }
        13 if digits.starts_with('0') => {
            let upc_a = &digits[1..];
            let core = &upc_a[..11];
            variants.insert(BarcodeVariant::new(core, BarcodeFormat::UpcACore));
            variants.insert(BarcodeVariant::new(upc_a, BarcodeFormat::UpcA));
            variants.insert(BarcodeVariant::new(digits, BarcodeFormat::Ean13));
        }
        12 => {
            let core = &digits[..11];
            variants.insert(BarcodeVariant::new(core, BarcodeFormat::UpcACore));
            variants.insert(BarcodeVariant::new(format!("0{digits}"), BarcodeFormat::Ean13));
            variants.insert(BarcodeVariant::new(digits, BarcodeFormat::UpcA));
        }
        11 => {
            // Length is fixed at 11 here, so this only fails on a broken invariant.
            let check = match calculate_check_digit(&digits) {
                Ok(check) => check,
                Err(e) => {
                    tracing::error!(barcode = %digits, "Check digit computation failed: {}", e);
                    return variants;
                }
            };
            let upc_a = format!("{digits}{check}");
            variants.insert(BarcodeVariant::new(format!("0{upc_a}"), BarcodeFormat::Ean13));
            variants.insert(BarcodeVariant::new(upc_a, BarcodeFormat::UpcA));
            variants.insert(BarcodeVariant::new(digits, BarcodeFormat::UpcACore));
        }
        _ => {}
    }

    variants
}

/// GS1 mod-10 check digit for `core`: rightmost digit weighted 3, then
/// alternating 1 and 3 leftwards.
pub fn calculate_check_digit(core: &str) -> Result<char, BarcodeError> {
    let len = core.chars().count();
    if len < MIN_CHECK_DIGIT_CORE_LEN {
        return Err(BarcodeError::CoreTooShort {
            len,
            min: MIN_CHECK_DIGIT_CORE_LEN,
        });
    }

    let mut sum = 0u32;
    for (position, c) in core.chars().rev().enumerate() {
        let digit = c.to_digit(10).ok_or(BarcodeError::NonDigit(c))?;
        let weight = if position % 2 == 0 { 3 } else { 1 };
        sum += digit * weight;
    }

    let check = (10 - (sum % 10)) % 10;
    // check is always 0..=9
    Ok(char::from(b'0' + check as u8))
}

/// Whether the trailing digit of `code` is the correct GS1 check digit.
///
/// Works for 8, 12, 13 and 14 digit codes alike. With `is_ean` set, a
/// 12-digit code is read as an EAN-13 missing its leading zero.
pub fn has_valid_check_digit(code: &str, is_ean: bool) -> bool {
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let code = if is_ean && code.len() == 12 {
        format!("0{code}")
    } else {
        code.to_string()
    };

    if code.len() < MIN_CHECK_DIGIT_CORE_LEN + 1 {
        return false;
    }

    let (core, claimed) = code.split_at(code.len() - 1);
    match calculate_check_digit(core) {
        Ok(expected) => claimed.starts_with(expected),
        Err(_) => false,
    }
}

/// Whether two raw barcodes denote the same product.
///
/// Identical digit strings always match, even when no variants can be
/// generated for them.
pub fn is_equivalent(a: &str, b: &str) -> bool {
    let a_digits = normalize_digits(a);
    if a_digits.is_empty() {
        return false;
    }
    if a_digits == normalize_digits(b) {
        return true;
    }
    let a_variants = generate_variants(&a_digits);
    if a_variants.is_empty() {
        return false;
    }
    let b_variants = generate_variants(b);
    !a_variants.is_disjoint(&b_variants)
}

/// The 13-digit EAN form of a UPC-compatible barcode, if it has one.
pub fn canonical_ean13(raw: &str) -> Option<String> {
    generate_variants(raw)
        .into_iter()
        .find(|v| v.format == BarcodeFormat::Ean13)
        .map(|v| v.barcode)
}
