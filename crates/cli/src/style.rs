//! Terminal styling helpers.

use console::Style;

/// Green checkmark followed by `msg`.
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Yellow warning sign followed by `msg`.
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Colour for a diff operation symbol: `+` green, `-` red, `~` yellow.
pub fn op_color(symbol: char) -> comfy_table::Color {
    match symbol {
        '+' => comfy_table::Color::Green,
        '-' => comfy_table::Color::Red,
        _ => comfy_table::Color::Yellow,
    }
}
