//! The REPL: prompt, line reader, textual command parser, and row/tree
//! printing. Everything the storage engine treats as an external
//! collaborator lives here.

use crate::errors;
use crate::storage::table::{BTreeEvent, NodeKind};
use crate::storage::{ExecuteResult, Row, Table};
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

const PROMPT: &str = "db > ";

enum MetaCommandResult {
    Success,
    Exit,
    Unrecognized,
}

enum PrepareResult {
    Success(Statement),
    SyntaxError,
    StringTooLong,
    NegativeId,
    Unrecognized,
}

enum Statement {
    Insert(Row),
    Select,
}

pub fn repl_loop<R: BufRead, W: Write>(
    table: &mut Table,
    mut input: R,
    mut output: W,
) -> Result<(), errors::Error> {
    let mut line = String::new();
    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        line.clear();
        let bytes_read = input.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        let text = line.trim_end_matches(['\n', '\r']);

        if text.starts_with('.') {
            match do_meta_command(text, table, &mut output)? {
                MetaCommandResult::Success => continue,
                MetaCommandResult::Exit => break,
                MetaCommandResult::Unrecognized => {
                    writeln!(output, "Unrecognized command '{}'.", text)?;
                    continue;
                }
            }
        }

        match prepare_statement(text) {
            PrepareResult::Success(statement) => execute_statement(statement, table, &mut output)?,
            PrepareResult::SyntaxError => {
                writeln!(output, "Syntax error. Could not parse statement.")?;
            }
            PrepareResult::StringTooLong => {
                writeln!(output, "String is too long.")?;
            }
            PrepareResult::NegativeId => {
                writeln!(output, "ID must be positive.")?;
            }
            PrepareResult::Unrecognized => {
                writeln!(output, "Unrecognized keyword at start of '{}'.", text)?;
            }
        }
    }
    Ok(())
}

fn do_meta_command<W: Write>(
    text: &str,
    table: &mut Table,
    output: &mut W,
) -> Result<MetaCommandResult, errors::Error> {
    match text {
        ".exit" => {
            info!("Exiting on meta-command.");
            Ok(MetaCommandResult::Exit)
        }
        ".constants" => {
            info!("Printing constants.");
            print_constants(output)?;
            Ok(MetaCommandResult::Success)
        }
        ".btree" => {
            info!("Dumping btree.");
            let events = table.dump_btree()?;
            print_btree(&events, output)?;
            Ok(MetaCommandResult::Success)
        }
        _ => {
            warn!(command = text, "Unrecognized meta-command.");
            Ok(MetaCommandResult::Unrecognized)
        }
    }
}

fn print_constants<W: Write>(output: &mut W) -> io::Result<()> {
    for (name, value) in crate::storage::node::constants() {
        writeln!(output, "{} = {}", name, value)?;
    }
    Ok(())
}

fn print_btree<W: Write>(events: &[BTreeEvent], output: &mut W) -> io::Result<()> {
    for event in events {
        let indent = "  ".repeat(event.indent);
        match event.key {
            None => {
                let label = match event.kind {
                    NodeKind::Leaf => "leaf",
                    NodeKind::Internal => "internal",
                };
                writeln!(output, "{}- {} (size {})", indent, label, event.count)?;
            }
            Some(key) => writeln!(output, "{}- {}", indent, key)?,
        }
    }
    Ok(())
}

fn prepare_statement(text: &str) -> PrepareResult {
    if let Some(rest) = text.strip_prefix("insert") {
        return prepare_insert(rest);
    }
    if text.starts_with("select") {
        return PrepareResult::Success(Statement::Select);
    }
    PrepareResult::Unrecognized
}

fn prepare_insert(rest: &str) -> PrepareResult {
    let mut parts = rest.split_whitespace();
    let id_str = match parts.next() {
        Some(s) => s,
        None => return PrepareResult::SyntaxError,
    };
    let username = match parts.next() {
        Some(s) => s,
        None => return PrepareResult::SyntaxError,
    };
    let email = match parts.next() {
        Some(s) => s,
        None => return PrepareResult::SyntaxError,
    };
    if parts.next().is_some() {
        return PrepareResult::SyntaxError;
    }

    let id: i64 = match id_str.parse() {
        Ok(id) => id,
        Err(_) => return PrepareResult::SyntaxError,
    };
    if id < 0 {
        return PrepareResult::NegativeId;
    }

    if username.len() > crate::storage::row::MAX_USERNAME_LEN
        || email.len() > crate::storage::row::MAX_EMAIL_LEN
    {
        return PrepareResult::StringTooLong;
    }

    PrepareResult::Success(Statement::Insert(Row::new(id as u32, username, email)))
}

fn execute_statement<W: Write>(
    statement: Statement,
    table: &mut Table,
    output: &mut W,
) -> Result<(), errors::Error> {
    match statement {
        Statement::Insert(row) => match table.execute_insert(&row)? {
            ExecuteResult::Success => writeln!(output, "Executed.")?,
            ExecuteResult::DuplicateKey => writeln!(output, "Error: Duplicate key.")?,
            ExecuteResult::TableFull => writeln!(output, "Error: Table full.")?,
        },
        Statement::Select => {
            let mut rows = Vec::new();
            table.execute_select(|row| rows.push(row.clone()))?;
            for row in rows {
                writeln!(output, "{}", row)?;
            }
            writeln!(output, "Executed.")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn run(table: &mut Table, script: &str) -> String {
        let mut out = Vec::new();
        repl_loop(table, script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn prompts_stripped(output: &str) -> String {
        output.replace(PROMPT, "")
    }

    #[test]
    fn s1_empty_select() {
        let file = NamedTempFile::new().unwrap();
        let mut table = Table::open(file.path()).unwrap();
        let out = run(&mut table, "select\n.exit\n");
        assert_eq!(prompts_stripped(&out), "Executed.\n");
    }

    #[test]
    fn s2_insert_then_select() {
        let file = NamedTempFile::new().unwrap();
        let mut table = Table::open(file.path()).unwrap();
        let out = run(
            &mut table,
            "insert 1 user1 person1@example.com\nselect\n.exit\n",
        );
        assert_eq!(
            prompts_stripped(&out),
            "Executed.\n(1, user1, person1@example.com)\nExecuted.\n"
        );
    }

    #[test]
    fn s3_duplicate_key() {
        let file = NamedTempFile::new().unwrap();
        let mut table = Table::open(file.path()).unwrap();
        let out = run(&mut table, "insert 1 a a@x\ninsert 1 b b@x\nselect\n.exit\n");
        assert_eq!(
            prompts_stripped(&out),
            "Executed.\nError: Duplicate key.\n(1, a, a@x)\nExecuted.\n"
        );
    }

    #[test]
    fn s4_oversize_username_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut table = Table::open(file.path()).unwrap();
        let long_username = "a".repeat(33);
        let out = run(&mut table, &format!("insert 1 {} a@x\n.exit\n", long_username));
        assert_eq!(prompts_stripped(&out), "String is too long.\n");
    }

    #[test]
    fn s5_negative_id_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut table = Table::open(file.path()).unwrap();
        let out = run(&mut table, "insert -1 u u@x\n.exit\n");
        assert_eq!(prompts_stripped(&out), "ID must be positive.\n");
    }

    #[test]
    fn unrecognized_statement_reports_the_offending_input() {
        let file = NamedTempFile::new().unwrap();
        let mut table = Table::open(file.path()).unwrap();
        let out = run(&mut table, "bogus\n.exit\n");
        assert_eq!(
            prompts_stripped(&out),
            "Unrecognized keyword at start of 'bogus'.\n"
        );
    }
}
