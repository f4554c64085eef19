use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::types::ImportResult;

pub fn print_summary(result: &ImportResult) {
    println!("Form: {}", result.form_name);
    if result.dry_run {
        println!("Dry run: no documents were uploaded or written");
    } else {
        println!("Output: {}", result.output_dir.display());
    }

    let mut table = Table::new();
    table.set_header(vec![header_cell("Outcome"), header_cell("Rows")]);
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    let summary = &result.summary;
    table.add_row(vec![
        Cell::new("Imported").fg(Color::Green),
        count_cell(summary.imported, Color::Green),
    ]);
    table.add_row(vec![
        Cell::new("Updated").fg(Color::Blue),
        count_cell(summary.updated, Color::Blue),
    ]);
    table.add_row(vec![
        Cell::new("Ignored").fg(Color::Yellow),
        count_cell(summary.ignored, Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("Deleted").fg(Color::Red),
        count_cell(summary.deleted, Color::Red),
    ]);
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(summary.total()).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: u64, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        Cell::new(count).fg(Color::DarkGrey)
    }
}
