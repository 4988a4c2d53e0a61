//! Add-on options from the space page.

use std::collections::HashMap;

use scraper::{Html, Selector};

use crate::error::Result;
use crate::models::{OptionEntry, OptionPriceChange, SelectorConfig};
use crate::services::{element_text, parse_selector};

const UNKNOWN: &str = "不明";

/// Options listed on a space page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionPage {
    /// Page title
    pub space_name: String,
    pub options: Vec<OptionEntry>,
}

/// Parse the option list. Pages without an options heading list none.
pub fn parse_options(document: &Html, selectors: &SelectorConfig) -> Result<OptionPage> {
    let title_sel = parse_selector("title")?;
    let space_name = document
        .select(&title_sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let section_sel = parse_selector(&selectors.option_section)?;
    if document.select(&section_sel).next().is_none() {
        return Ok(OptionPage {
            space_name,
            options: Vec::new(),
        });
    }

    let item_sel = parse_selector(&selectors.option_item)?;
    let name_sel = parse_selector(&selectors.option_name)?;
    let price_sel = parse_selector(&selectors.option_price)?;

    let options = document
        .select(&item_sel)
        .map(|item| {
            let text_of = |sel: &Selector| {
                item.select(sel)
                    .next()
                    .map(element_text)
                    .unwrap_or_else(|| UNKNOWN.to_string())
            };
            OptionEntry {
                name: text_of(&name_sel),
                price: text_of(&price_sel),
            }
        })
        .collect();

    Ok(OptionPage {
        space_name,
        options,
    })
}

/// Options whose price changed since the previous scrape.
///
/// Options that are new, or had an empty price before, are not changes.
pub fn detect_price_changes(
    previous: &[OptionEntry],
    current: &[OptionEntry],
) -> Vec<OptionPriceChange> {
    let old: HashMap<&str, &str> = previous
        .iter()
        .map(|o| (o.name.as_str(), o.price.as_str()))
        .collect();

    current
        .iter()
        .filter_map(|option| {
            let old_price = old.get(option.name.as_str())?;
            (!old_price.is_empty() && *old_price != option.price).then(|| OptionPriceChange {
                option_name: option.name.clone(),
                old_price: old_price.to_string(),
                new_price: option.price.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, price: &str) -> OptionEntry {
        OptionEntry {
            name: name.into(),
            price: price.into(),
        }
    }

    #[test]
    fn test_parse_options() {
        let page = r#"
            <html><head><title> 会議室A | スペースマーケット </title></head><body>
              <h2 id="room-options">オプション</h2>
              <ul class="css-1gjx5c5">
                <li class="css-zzxv54"><p class="css-l8u2g2">プロジェクター</p><p class="css-0">1,100円</p></li>
                <li class="css-zzxv54"><p class="css-l8u2g2">清掃代行</p></li>
              </ul>
            </body></html>
        "#;
        let document = Html::parse_document(page);
        let parsed = parse_options(&document, &SelectorConfig::default()).unwrap();

        assert_eq!(parsed.space_name, "会議室A | スペースマーケット");
        assert_eq!(
            parsed.options,
            vec![entry("プロジェクター", "1,100円"), entry("清掃代行", "不明")]
        );
    }

    #[test]
    fn test_no_options_section() {
        let page = r#"<html><body><li class="css-zzxv54"><p class="css-l8u2g2">x</p></li></body></html>"#;
        let parsed = parse_options(&Html::parse_document(page), &SelectorConfig::default()).unwrap();
        assert!(parsed.options.is_empty());
        assert_eq!(parsed.space_name, "不明");
    }

    #[test]
    fn test_detect_price_changes() {
        let previous = vec![
            entry("プロジェクター", "1,100円"),
            entry("清掃代行", "3,000円"),
            entry("延長コード", ""),
        ];
        let current = vec![
            entry("プロジェクター", "1,650円"),
            entry("清掃代行", "3,000円"),
            entry("延長コード", "500円"),
            entry("ホワイトボード", "無料"),
        ];

        let changes = detect_price_changes(&previous, &current);
        assert_eq!(
            changes,
            vec![OptionPriceChange {
                option_name: "プロジェクター".into(),
                old_price: "1,100円".into(),
                new_price: "1,650円".into(),
            }]
        );
        assert!(detect_price_changes(&[], &current).is_empty());
    }
}
