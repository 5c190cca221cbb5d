//! Parsers for menu input. `None` always means "invalid, ask again".

use regex::Regex;
use std::sync::OnceLock;

/// Answer to a numbered menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Index(usize),
    Back,
    Quit,
}

/// Answer to the card list menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemCommand {
    Details(usize),
    Comment(usize),
    Move(usize),
    Select(Vec<usize>),
    Refetch,
    Back,
    Quit,
}

/// Answer to the "b or q" acknowledgement prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Back,
    Quit,
}

/// 1-based `input` as a 0-based index below `count`
pub fn parse_index(input: &str, count: usize) -> Option<usize> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: usize = input.parse().ok()?;
    (1..=count).contains(&number).then(|| number - 1)
}

pub fn parse_choice(input: &str, count: usize, allow_back: bool) -> Option<Choice> {
    match input.trim() {
        "q" => Some(Choice::Quit),
        "b" if allow_back => Some(Choice::Back),
        other => parse_index(other, count).map(Choice::Index),
    }
}

pub fn parse_ack(input: &str) -> Option<Ack> {
    match input.trim() {
        "b" => Some(Ack::Back),
        "q" => Some(Ack::Quit),
        _ => None,
    }
}

/// Comma-separated 1-based indexes, deduplicated in first-seen order.
///
/// Every token must be an in-range number; one bad token rejects the lot.
pub fn parse_csv_indexes(input: &str, count: usize) -> Vec<usize> {
    let parts: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    let mut indexes = Vec::with_capacity(parts.len());
    for part in parts {
        let Some(index) = parse_index(part, count) else {
            return Vec::new();
        };
        if !indexes.contains(&index) {
            indexes.push(index);
        }
    }
    indexes
}

/// `ctx N` / `mv N`, case-insensitive
fn parse_prefixed(input: &str, count: usize) -> Option<ItemCommand> {
    static PREFIXED: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PREFIXED.get_or_init(|| Regex::new(r"(?i)^(ctx|mv)\s+(\d+)$").expect("valid regex"));

    let caps = pattern.captures(input)?;
    let index = parse_index(&caps[2], count)?;
    if caps[1].eq_ignore_ascii_case("ctx") {
        Some(ItemCommand::Comment(index))
    } else {
        Some(ItemCommand::Move(index))
    }
}

pub fn parse_item_command(input: &str, count: usize) -> Option<ItemCommand> {
    let input = input.trim();
    match input {
        "q" => return Some(ItemCommand::Quit),
        "b" => return Some(ItemCommand::Back),
        "r" => return Some(ItemCommand::Refetch),
        _ => {}
    }

    if let Some(command) = parse_prefixed(input, count) {
        return Some(command);
    }
    if let Some(index) = parse_index(input, count) {
        return Some(ItemCommand::Details(index));
    }

    let indexes = parse_csv_indexes(input, count);
    (!indexes.is_empty()).then_some(ItemCommand::Select(indexes))
}
