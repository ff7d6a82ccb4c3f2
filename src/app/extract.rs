use std::sync::Arc;

use scraper::{Html, Selector};

use super::error::ExtractError;
use super::site::SiteSelectors;
use super::types::{ProductRecord, stock_quantity};

/// Parses fetched product pages into [`ProductRecord`]s.
pub struct ProductExtractor {
    selectors: Arc<SiteSelectors>,
}

impl ProductExtractor {
    pub fn new(selectors: Arc<SiteSelectors>) -> Self {
        Self { selectors }
    }

    /// `url` is the fetch target and becomes the record's canonical url.
    pub fn extract(&self, html: &str, url: &str) -> Result<ProductRecord, ExtractError> {
        let doc = Html::parse_document(html);
        let sel = &self.selectors;

        if any_text_equals(&doc, sel.flash_message, sel.session_expired_text) {
            return Err(ExtractError::SessionExpired);
        }

        let product_name = require(extract_first_text(&doc, sel.product_title), "name")?;
        let ean = require(
            extract_first_text(&doc, sel.ean_label)
                .replace(sel.ean_prefix, "")
                .trim()
                .to_string(),
            "EAN",
        )?;
        let price = parse_price(&extract_first_text(&doc, sel.price))
            .ok_or(ExtractError::Validation { field: "price" })?;

        if let Some(status) = sel.stock_status
            && !has_element(&doc, status)
        {
            return Err(ExtractError::Validation {
                field: "availability",
            });
        }
        let quantity = stock_quantity(has_element(&doc, sel.in_stock_marker));

        Ok(ProductRecord {
            ean,
            product_name,
            price,
            quantity,
            url: url.to_string(),
        })
    }
}

fn require(value: String, field: &'static str) -> Result<String, ExtractError> {
    if value.is_empty() {
        Err(ExtractError::Validation { field })
    } else {
        Ok(value)
    }
}

fn extract_first_text(doc: &Html, selector: &str) -> String {
    let selector = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => return String::new(),
    };

    for el in doc.select(&selector) {
        let text = normalize_text(&el.text().collect::<Vec<_>>().join(" "));
        if !text.is_empty() {
            return text;
        }
    }

    String::new()
}

fn any_text_equals(doc: &Html, selector: &str, expected: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    doc.select(&selector)
        .any(|el| normalize_text(&el.text().collect::<Vec<_>>().join(" ")) == expected)
}

fn has_element(doc: &Html, selector: &str) -> bool {
    Selector::parse(selector)
        .map(|s| doc.select(&s).next().is_some())
        .unwrap_or(false)
}

fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a locale-formatted price ("1.234,56 €", "€ 1,234.56", "1234.56").
///
/// When both separators occur the rightmost one is the decimal mark. A lone
/// separator of either kind followed by exactly three digits is a thousands
/// separator ("2.500 €"), otherwise decimal. Several identical separators are
/// always thousands.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();
    let normalized = if dots > 0 && commas > 0 {
        if cleaned.rfind(',') > cleaned.rfind('.') {
            cleaned.replace('.', "").replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else if commas == 1 {
        single_separator(&cleaned, ',')
    } else if dots == 1 {
        single_separator(&cleaned, '.')
    } else if commas > 1 {
        cleaned.replace(',', "")
    } else if dots > 1 {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Exactly three trailing digits make `sep` a thousands separator, anything
/// else a decimal mark.
fn single_separator(cleaned: &str, sep: char) -> String {
    let after = cleaned.rsplit(sep).next().unwrap_or("");
    if after.len() == 3 {
        cleaned.replace(sep, "")
    } else {
        cleaned.replace(sep, ".")
    }
}
