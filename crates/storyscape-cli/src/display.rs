//! Display utilities for CLI output
//!
//! Provides colored, formatted output for cached favorites.

use colored::*;
use storyscape_core::{AssetSlot, StoryRecord};

/// Print success message
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print error message
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// First `max` characters of a text, with an ellipsis if cut
fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Print a favorite in list format (compact)
pub fn print_favorite_list_item(record: &StoryRecord, index: usize) {
    println!(
        "  {} {} {} - {}",
        format!("[{}]", index + 1).cyan(),
        record.title.yellow(),
        format!("({})", record.id.short()).dimmed(),
        record.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
    );
}

/// Print a list of favorites
pub fn print_favorite_list(records: &[StoryRecord]) {
    if records.is_empty() {
        println!("{}", "No favorites cached".dimmed());
        return;
    }

    println!("{}", format!("Favorites ({}):", records.len()).bold());
    for (i, record) in records.iter().enumerate() {
        print_favorite_list_item(record, i);
    }
}

/// Print a favorite in detail, with which images are cached
pub fn print_favorite(record: &StoryRecord, cached: &[(AssetSlot, Option<usize>)]) {
    println!("{}", "─".repeat(50).dimmed());
    println!("{}: {}", "Title".bold(), record.title.yellow());
    println!("{}: {}", "ID".dimmed(), record.id);
    if let Some(owner) = &record.owner_id {
        println!("{}: {}", "Owner".dimmed(), owner);
    }
    println!(
        "{}: {}",
        "Created".dimmed(),
        record.created_at.format("%Y-%m-%d %H:%M")
    );
    for (slot, size) in cached {
        let status = match size {
            Some(bytes) => format!("{bytes} bytes").green().to_string(),
            None => "not cached".dimmed().italic().to_string(),
        };
        println!("{}: {}", format!("{slot} image").dimmed(), status);
    }
    println!();
    for text in [&record.introduction, &record.middle, &record.conclusion] {
        if text.is_empty() {
            println!("{}", "(empty)".dimmed().italic());
        } else {
            println!("{}", preview(text, 200));
        }
        println!();
    }
    println!("{}", "─".repeat(50).dimmed());
}
