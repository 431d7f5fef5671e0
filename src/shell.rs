/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::{BlockIdT, TEMP_RESULT_RELATION};
use crate::engine::{Engine, EngineError};
use crate::relation::CompareOp;

use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::path::Path;

const HELP_TEXT: &str = "\
Commands:
  status                                Bitmap prefix and catalog listing
  schema <R>                            Schema of a relation
  select all <R>                        Print every record
  select where <F> <OP> <V> <R> [| <R'>]  Filtered select, optionally into R'
  add_from_csv <R> <path> fix|var       Create relation from a CSV file
  insert_from_csv <R> <path> <N>        Append up to N CSV records
  insert <R> <v1> <v2> ...              Insert one record
  modify <R> <F> <V> <v1> <v2> ...      Rewrite records where F == V
  delete <R>                            Drop a relation
  delete where <F> <OP> <V> <R>         Delete matching records
  rel_block_info <R>                    Blocks of a relation
  block_info <idx>                      Physical position of a block
  print_block <idx>                     Raw contents of a block
  disk_info                             Disk geometry
  disk_cap                              Capacity accounting
  buffer_status                         Buffer pool frame table
  pin|unpin|request|dirty <idx>         Raw buffer operations
  exit                                  Flush everything and quit";

/// The interactive shell: a thin, line-oriented front end over the engine.
pub struct Shell {
    engine: Engine,
}

impl Shell {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Read-eval-print until `exit` or end of input, then flush all state.
    pub fn run(&mut self) -> Result<(), EngineError> {
        let mut editor = Editor::<()>::new();
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(line.as_str());
                    if !self.handle_command(&line) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("input error: {e}");
                    break;
                }
            }
        }
        self.engine.shutdown()?;
        println!("bye");
        Ok(())
    }

    /// Dispatch one command line. Returns false when the shell should quit.
    pub fn handle_command(&mut self, line: &str) -> bool {
        let tokens = split_tokens(line);
        if tokens.is_empty() {
            return true;
        }

        let result = match tokens[0].as_str() {
            "exit" => return false,
            "help" => {
                println!("{HELP_TEXT}");
                Ok(())
            }
            "status" => self.cmd_status(),
            "schema" if tokens.len() == 2 => self.cmd_schema(&tokens[1]),
            "select" => self.cmd_select(&tokens),
            "add_from_csv" if tokens.len() == 4 => match tokens[3].as_str() {
                "fix" => self.cmd_add_from_csv(&tokens[1], &tokens[2], true),
                "var" => self.cmd_add_from_csv(&tokens[1], &tokens[2], false),
                other => {
                    println!("expected 'fix' or 'var', got '{other}'");
                    Ok(())
                }
            },
            "insert_from_csv" if tokens.len() == 4 => {
                match tokens[3].parse::<usize>() {
                    Ok(limit) => self.cmd_insert_from_csv(&tokens[1], &tokens[2], limit),
                    Err(_) => {
                        println!("'{}' is not a record count", tokens[3]);
                        Ok(())
                    }
                }
            }
            "insert" if tokens.len() >= 3 => self.cmd_insert(&tokens[1], &tokens[2..]),
            "modify" if tokens.len() >= 5 => {
                self.cmd_modify(&tokens[1], &tokens[2], &tokens[3], &tokens[4..])
            }
            "delete" if tokens.len() == 2 => self.cmd_drop(&tokens[1]),
            "delete" if tokens.len() == 6 && tokens[1] == "where" => {
                self.cmd_delete_where(&tokens[2], &tokens[3], &tokens[4], &tokens[5])
            }
            "rel_block_info" if tokens.len() == 2 => self.cmd_rel_block_info(&tokens[1]),
            "block_info" if tokens.len() == 2 => self.cmd_block_info(&tokens[1]),
            "print_block" if tokens.len() == 2 => self.cmd_print_block(&tokens[1]),
            "disk_info" => self.cmd_disk_info(),
            "disk_cap" => self.cmd_disk_cap(),
            "buffer_status" => self.cmd_buffer_status(),
            "pin" | "unpin" | "request" | "dirty" if tokens.len() == 2 => {
                self.cmd_buffer_op(&tokens[0], &tokens[1])
            }
            _ => {
                println!("unrecognized command (try 'help')");
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("error: {e}");
        }
        true
    }

    fn cmd_status(&mut self) -> Result<(), EngineError> {
        let bitmap = self.engine.bitmap();
        let shown = bitmap.total_blocks().min(80);
        println!("bitmap (first {shown} bits):");
        let mut line = String::new();
        for block in 0..shown {
            line.push(if bitmap.get(block) { '1' } else { '0' });
            if (block + 1) % 8 == 0 {
                line.push(' ');
            }
        }
        println!("{line}\n");
        println!("catalog:");
        let mut names: Vec<String> =
            self.engine.catalog().iter().map(|r| r.name.clone()).collect();
        names.sort();
        for name in names {
            self.cmd_schema(&name)?;
            println!();
        }
        Ok(())
    }

    fn cmd_schema(&mut self, relation: &str) -> Result<(), EngineError> {
        let Some(rel) = self.engine.catalog().get(relation) else {
            println!("relation not found: {relation}");
            return Ok(());
        };
        println!("name: {}", rel.name);
        println!("format: {}", if rel.is_fixed { "fixed" } else { "variable" });
        println!("fields:");
        let width = rel.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
        for field in &rel.fields {
            if rel.is_fixed {
                println!("  - {:width$} ({}, {})", field.name, field.field_type, field.size);
            } else {
                println!("  - {:width$} ({})", field.name, field.field_type);
            }
        }
        let blocks: Vec<String> = rel.blocks.iter().map(|b| b.to_string()).collect();
        println!("blocks: {}", if blocks.is_empty() { "none".to_string() } else { blocks.join(", ") });
        if let Some(header) = rel.hash_index_block {
            println!("hash index header: {header}");
        }
        Ok(())
    }

    fn cmd_select(&mut self, tokens: &[String]) -> Result<(), EngineError> {
        match tokens.get(1).map(String::as_str) {
            Some("all") if tokens.len() == 3 => self.print_relation(&tokens[2]),
            Some("where") if tokens.len() >= 6 => {
                let (field, op, value, relation) =
                    (&tokens[2], &tokens[3], &tokens[4], &tokens[5]);
                let op: CompareOp = match op.parse() {
                    Ok(op) => op,
                    Err(e) => {
                        println!("{e}");
                        return Ok(());
                    }
                };
                let output = match tokens.get(6).map(String::as_str) {
                    Some("|") => match tokens.get(7) {
                        Some(name) => name.clone(),
                        None => {
                            println!("missing output relation after '|'");
                            return Ok(());
                        }
                    },
                    Some(other) => {
                        println!("unexpected token '{other}'");
                        return Ok(());
                    }
                    None => TEMP_RESULT_RELATION.to_string(),
                };

                self.engine.select_where(relation, field, op, value, &output)?;
                self.print_relation(&output)?;
                if output == TEMP_RESULT_RELATION {
                    self.engine.drop_relation(&output)?;
                }
                Ok(())
            }
            _ => {
                println!("usage: select all <R> | select where <F> <OP> <V> <R> [| <R'>]");
                Ok(())
            }
        }
    }

    fn cmd_add_from_csv(
        &mut self,
        relation: &str,
        path: &str,
        is_fixed: bool,
    ) -> Result<(), EngineError> {
        let loaded = self
            .engine
            .create_relation_from_csv(relation, Path::new(path), is_fixed)?;
        println!("loaded {loaded} records into '{relation}'");
        Ok(())
    }

    fn cmd_insert_from_csv(
        &mut self,
        relation: &str,
        path: &str,
        limit: usize,
    ) -> Result<(), EngineError> {
        let loaded = self
            .engine
            .insert_n_from_csv(relation, Path::new(path), limit)?;
        println!("inserted {loaded} records into '{relation}'");
        Ok(())
    }

    fn cmd_insert(&mut self, relation: &str, values: &[String]) -> Result<(), EngineError> {
        let (block, slot) = self.engine.insert_values(relation, values)?;
        let address = self.engine.disk().position_of(block)?;
        println!("inserted into block {block} slot {slot} ({address})");
        Ok(())
    }

    fn cmd_modify(
        &mut self,
        relation: &str,
        field: &str,
        value: &str,
        new_values: &[String],
    ) -> Result<(), EngineError> {
        let changed = self.engine.modify(relation, field, value, new_values)?;
        println!("modified {changed} records");
        Ok(())
    }

    fn cmd_drop(&mut self, relation: &str) -> Result<(), EngineError> {
        if self.engine.drop_relation(relation)? {
            println!("dropped '{relation}'");
        } else {
            println!("relation not found: {relation}");
        }
        Ok(())
    }

    fn cmd_delete_where(
        &mut self,
        field: &str,
        op: &str,
        value: &str,
        relation: &str,
    ) -> Result<(), EngineError> {
        let op: CompareOp = match op.parse() {
            Ok(op) => op,
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        };
        let deleted = self.engine.delete_where(relation, field, op, value)?;
        println!("deleted {deleted} records");
        Ok(())
    }

    fn cmd_rel_block_info(&mut self, relation: &str) -> Result<(), EngineError> {
        for usage in self.engine.relation_block_info(relation)? {
            println!(
                "block {:>4} | {} | {} / {} bytes used",
                usage.block, usage.address, usage.used_bytes, usage.block_size
            );
        }
        Ok(())
    }

    fn cmd_block_info(&mut self, token: &str) -> Result<(), EngineError> {
        let Some(block) = parse_block(token) else {
            return Ok(());
        };
        let address = self.engine.disk().position_of(block)?;
        println!("block {block}: {address}");
        Ok(())
    }

    fn cmd_print_block(&mut self, token: &str) -> Result<(), EngineError> {
        let Some(block) = parse_block(token) else {
            return Ok(());
        };
        let bytes = self.engine.buffer_mut().get_block(block)?;
        let text = String::from_utf8_lossy(bytes);
        println!("{}", text.trim_end_matches('\0'));
        Ok(())
    }

    fn cmd_disk_info(&mut self) -> Result<(), EngineError> {
        let config = *self.engine.disk().config();
        println!("platters:            {}", config.platters);
        println!("surfaces/platter:    2");
        println!("tracks/surface:      {}", config.tracks);
        println!("sectors/track:       {}", config.sectors);
        println!("blocks/sector:       {}", config.blocks_per_sector);
        println!("block size:          {} bytes", config.block_size);
        println!("total blocks:        {}", config.total_blocks());
        let capacity = config.total_blocks() as f64 * config.block_size as f64;
        println!("capacity:            {:.2} MiB", capacity / (1024.0 * 1024.0));
        Ok(())
    }

    fn cmd_disk_cap(&mut self) -> Result<(), EngineError> {
        let report = self.engine.disk_capacity()?;
        println!("total blocks:             {}", report.total_blocks);
        println!(
            "total capacity:           {} bytes",
            report.total_blocks as usize * report.block_size
        );
        println!(
            "free capacity:            {} bytes",
            report.free_blocks as usize * report.block_size
        );
        println!(
            "used capacity:            {} bytes",
            report.used_blocks as usize * report.block_size
        );
        println!(
            "relation data blocks:     {} ({} bytes)",
            report.data_blocks,
            report.data_blocks as usize * report.block_size
        );
        println!("bytes used in records:    {}", report.data_bytes);
        Ok(())
    }

    fn cmd_buffer_status(&mut self) -> Result<(), EngineError> {
        let buffer = self.engine.buffer();
        let hand = buffer.clock_hand();
        println!("buffer pool ({})", buffer.policy_name());
        println!(
            "{:<7}{:<8}{:<7}{:>7}{:>6}{:>5}",
            "frame", "block", "dirty", "time", "pins", "ref"
        );
        println!("{}", "-".repeat(40));
        for (id, frame) in buffer.frames().iter().enumerate() {
            let block = frame
                .block_id()
                .map_or("-".to_string(), |b| b.to_string());
            print!(
                "{:<7}{:<8}{:<7}{:>7}{:>6}{:>5}",
                id,
                block,
                if frame.is_dirty() { "yes" } else { "no" },
                frame.last_used(),
                frame.pin_count(),
                if frame.referenced() { "1" } else { "0" }
            );
            if hand == Some(id) {
                print!("  <- hand");
            }
            println!();
        }
        Ok(())
    }

    fn cmd_buffer_op(&mut self, op: &str, token: &str) -> Result<(), EngineError> {
        let Some(block) = parse_block(token) else {
            return Ok(());
        };
        match op {
            "pin" => self.engine.buffer_mut().pin(block)?,
            "unpin" => self.engine.buffer_mut().unpin(block)?,
            "request" => {
                self.engine.buffer_mut().get_block(block)?;
            }
            "dirty" => self.engine.buffer_mut().mark_dirty(block)?,
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Render a relation as an aligned table, every column padded to its
    /// widest cell.
    fn print_relation(&mut self, relation: &str) -> Result<(), EngineError> {
        let Some(rel) = self.engine.catalog().get(relation) else {
            println!("relation not found: {relation}");
            return Ok(());
        };
        let headers: Vec<String> = rel.fields.iter().map(|f| f.name.clone()).collect();
        let rows = self.engine.scan_relation(relation)?;

        let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let total: usize = 3 + widths.iter().map(|w| w + 1).sum::<usize>();
        let separator = "-".repeat(total);

        println!("{separator}");
        print_row(&headers, &widths);
        println!("{separator}");
        for row in &rows {
            print_row(row, &widths);
        }
        println!("{separator}");
        println!("{} records", rows.len());
        Ok(())
    }
}

fn print_row(cells: &[String], widths: &[usize]) {
    print!("|");
    for (cell, width) in cells.iter().zip(widths) {
        print!(" {cell:<width$}");
    }
    println!(" |");
}

fn parse_block(token: &str) -> Option<BlockIdT> {
    match token.parse() {
        Ok(block) => Some(block),
        Err(_) => {
            println!("'{token}' is not a block index");
            None
        }
    }
}

/// Split a command line on whitespace; double-quoted stretches keep their
/// spaces and lose the quotes.
fn split_tokens(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_tokens() {
        assert_eq!(
            split_tokens("select all emp"),
            vec!["select", "all", "emp"]
        );
    }

    #[test]
    fn test_split_quoted_tokens() {
        assert_eq!(
            split_tokens(r#"insert emp 0001 "Alice Smith" 30"#),
            vec!["insert", "emp", "0001", "Alice Smith", "30"]
        );
    }

    #[test]
    fn test_split_collapses_whitespace() {
        assert_eq!(split_tokens("  a   b  "), vec!["a", "b"]);
        assert!(split_tokens("   ").is_empty());
    }
}
