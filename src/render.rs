//! Terminal output for menus, card details and the listing dump.

use crate::models::{Column, Item};
use std::io::{self, Write};

pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Numbered menu under a `== title ==` heading
pub fn menu<W: Write, S: AsRef<str>>(out: &mut W, title: &str, labels: &[S]) -> io::Result<()> {
    writeln!(out, "\n== {title} ==")?;
    for (index, label) in labels.iter().enumerate() {
        writeln!(out, "{}. {}", index + 1, label.as_ref())?;
    }
    Ok(())
}

pub fn choice_prompt(allow_back: bool) -> &'static str {
    if allow_back {
        "Select number (b=back, q=quit): "
    } else {
        "Select number (q=quit): "
    }
}

pub fn items_menu<W: Write>(out: &mut W, items: &[Item]) -> io::Result<()> {
    let labels: Vec<String> = items.iter().map(Item::to_string).collect();
    menu(out, "Cards", &labels)?;
    writeln!(out, "\nOptions:")?;
    writeln!(out, "Enter a number to view details.")?;
    writeln!(out, "Enter a comma-separated list to add to the PRD (e.g., 1,3,5).")?;
    writeln!(out, "ctx N = ask for more context on card N.")?;
    writeln!(out, "mv N = move card N to a different column.")?;
    writeln!(out, "r = refetch list, b = back, q = quit")
}

pub fn item_details<W: Write>(out: &mut W, item: &Item) -> io::Result<()> {
    writeln!(out, "\n== Card Details ==")?;
    writeln!(out, "ID: {}", item.id)?;
    writeln!(out, "Title: {}", item.title)?;
    writeln!(out, "Status: {}", item.status)?;
    if let Some(created) = item.created_at {
        writeln!(out, "Created: {}", created.format("%Y-%m-%d %H:%M"))?;
    }
    if let Some(updated) = item.updated_at {
        writeln!(out, "Updated: {}", updated.format("%Y-%m-%d %H:%M"))?;
    }
    if let Some(url) = &item.url {
        writeln!(out, "URL: {url}")?;
    }
    if let Some(description) = item.description.as_deref().filter(|d| !d.is_empty()) {
        writeln!(out, "\nDescription:\n{description}")?;
    }
    Ok(())
}

/// One column of the non-interactive listing
pub fn listing_column<W: Write>(out: &mut W, column: &Column, items: &[Item]) -> io::Result<()> {
    writeln!(out, "\n# {}", column.name)?;
    if items.is_empty() {
        return writeln!(out, "(no cards)");
    }
    for item in items {
        writeln!(out, "- {item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_menu_numbers_from_one() {
        let text = render(|out| menu(out, "Columns", &["Todo", "Done"]));
        assert_eq!(text, "\n== Columns ==\n1. Todo\n2. Done\n");
    }

    #[test]
    fn test_item_details_full() {
        let item = Item {
            id: 9,
            title: "Ship it".to_string(),
            status: "active".to_string(),
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()),
            updated_at: None,
            description: Some("All the things".to_string()),
            url: Some("https://example.test/9".to_string()),
        };
        let text = render(|out| item_details(out, &item));
        assert!(
            text.contains("ID: 9\nTitle: Ship it\nStatus: active\nCreated: 2024-05-01 08:00\n")
        );
        assert!(!text.contains("Updated:"));
        assert!(text.contains("URL: https://example.test/9"));
        assert!(text.ends_with("\nDescription:\nAll the things\n"));
    }

    #[test]
    fn test_item_details_skips_empty_description() {
        let item = Item {
            description: Some(String::new()),
            ..Item::new(1, "Bare")
        };
        let text = render(|out| item_details(out, &item));
        assert!(!text.contains("Description"));
    }

    #[test]
    fn test_listing_column() {
        let column = Column {
            id: 1,
            name: "Todo".to_string(),
            cards_url: None,
        };
        let text = render(|out| listing_column(out, &column, &[Item::new(4, "Write docs")]));
        assert_eq!(text, "\n# Todo\n- [4] Write docs\n");

        let empty = render(|out| listing_column(out, &column, &[]));
        assert_eq!(empty, "\n# Todo\n(no cards)\n");
    }
}
