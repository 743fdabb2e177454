//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `orgchart_core` linkage without the Flutter runtime.
//! - Optionally print the hierarchy stored in a database file.
//!
//! Usage: `orgchart [DB_PATH]`

use orgchart_core::{open_db, EditorConfig, HierarchyEditor, SqliteEmployeeStore};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("orgchart_core ping={}", orgchart_core::ping());
    println!("orgchart_core version={}", orgchart_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match dump_hierarchy(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn dump_hierarchy(db_path: &str) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let store = SqliteEmployeeStore::try_new(&conn).map_err(|err| err.to_string())?;
    let editor =
        HierarchyEditor::open(&store, EditorConfig::default()).map_err(|err| err.to_string())?;

    println!("employees={}", editor.forest().len());
    for warning in editor.warnings() {
        println!("warning: {warning}");
    }
    for (depth, node) in editor.forest().walk() {
        let label = if node.attributes.display_name.is_empty() {
            node.id.to_string()
        } else {
            node.attributes.display_name.clone()
        };
        println!("{}{} [{}]", "  ".repeat(depth), label, node.attributes.title);
    }
    let unreachable = editor.unreachable_nodes();
    if !unreachable.is_empty() {
        println!("unreachable={}", unreachable.len());
    }
    Ok(())
}
