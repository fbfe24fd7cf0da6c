//! Pulls card balances out of pasted bank SMS text.
//!
//! Best effort only. A line counts when it names a card (by its last four
//! digits) and carries a balance keyword; the largest number on such a
//! line is taken as the balance. Messages that mention several amounts or
//! several cards on one line can be attributed wrongly, and that is a
//! known limitation of the heuristic.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::digits::to_english_digits;

const ZWNJ: char = '\u{200C}';

fn masked_card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*{2,}\s*([0-9]{4})").expect("masked card regex"))
}

fn grouped_card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[0-9]{4}(?:[-\s]*(?:[0-9]{4}|\*{2,4})){2}[-\s]*([0-9]{4})")
            .expect("grouped card regex")
    })
}

fn labeled_card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"کارت\s*(?:شماره)?\s*\*{0,4}\s*([0-9]{4})").expect("labeled card regex")
    })
}

fn balance_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(موجودی|مانده|balance|available|avail)").expect("balance keyword regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("number regex"))
}

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]*(?:[,٬][ \t]*)+").expect("separator regex"))
}

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n|\u{2028}|\u{2029}").expect("line break regex"))
}

/// ASCII digits, no ZWNJ, thousands separators (and the spaces around
/// them) removed. Line breaks survive.
pub fn normalize(text: &str) -> String {
    let ascii: String = to_english_digits(text).chars().filter(|c| *c != ZWNJ).collect();
    separator_re().replace_all(&ascii, "").into_owned()
}

/// Last four card digits named in `text`, trying the masked, grouped and
/// labeled forms in that order.
pub fn find_last4(text: &str) -> Option<String> {
    [masked_card_re(), grouped_card_re(), labeled_card_re()]
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Largest number in `text` when it carries a balance keyword. Digit runs
/// that do not fit an `i64` are skipped.
pub fn find_balance(text: &str) -> Option<i64> {
    if !balance_keyword_re().is_match(text) {
        return None;
    }
    number_re()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .max()
}

/// Maps card last-4 digits to the most recently seen balance.
pub fn parse_balances(raw: &str) -> BTreeMap<String, i64> {
    let norm = normalize(raw);
    let mut balances = BTreeMap::new();

    for line in line_break_re().split(&norm) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let last4 = find_last4(line);
        let balance = find_balance(line);
        debug!("SMS line {:?}: card={:?} balance={:?}", line, last4, balance);
        if let (Some(last4), Some(balance)) = (last4, balance) {
            balances.insert(last4, balance);
        }
    }

    if balances.is_empty() {
        if let (Some(last4), Some(balance)) = (find_last4(&norm), find_balance(&norm)) {
            debug!("SMS whole-text fallback: card={} balance={}", last4, balance);
            balances.insert(last4, balance);
        }
    }

    balances
}
