//! `fprintf`, `fscanf` and `sscanf`, plus console input.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Write as _};
use std::path::{Path, PathBuf};

use hbl_formula::Value;
use hbl_ir::{Command, CommandData, InstructionList, Opcode, ScanFormat};

use super::scanner::Scanner;
use crate::globals::END_OF_FILE;
use crate::payload::ConstructRequest;
use crate::{ExecError, ObjectKind, Session};

/// Options collected from an `fprintf` argument list.
#[derive(Default)]
struct FileFlags {
    clear: bool,
    keep_open: bool,
    close: bool,
}

impl Session {
    pub(super) fn fprintf(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let namespace = list.namespace();
        let mut texts = command.texts_from(0);
        let Some(destination) = texts.next() else {
            return Ok(());
        };
        let path = match destination {
            "stdout" => None,
            other => Some(PathBuf::from(self.literal(other, namespace)?)),
        };

        let mut out = String::new();
        let mut flags = FileFlags::default();
        for argument in texts {
            match argument {
                "CLEAR_FILE" => flags.clear = true,
                "KEEP_OPEN" => flags.keep_open = true,
                "CLOSE_FILE" => flags.close = true,
                "LIST_ALL_VARIABLES" => {
                    let names: Vec<&str> = self.variables.defined().map(|(name, _)| name).collect();
                    let _ = write!(out, "{{{}}}", names.join(", "));
                }
                "PRINT_SELF" => {
                    let _ = write!(out, "{list}");
                }
                other => out.push_str(&self.evaluate_text(other, namespace)?.to_text()),
            }
        }

        match path {
            None => {
                self.config.print_handler.print(&out);
                Ok(())
            }
            Some(path) => self.write_file(&path, &out, &flags),
        }
    }

    fn write_file(&mut self, path: &Path, text: &str, flags: &FileFlags) -> Result<(), ExecError> {
        let was_open = self.open_files.contains_key(path);
        if flags.clear {
            self.open_files.remove(path);
            File::create(path).map_err(|err| ExecError::io("Truncating", path, err))?;
        }
        let mut file = match self.open_files.remove(path) {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| ExecError::io("Opening", path, err))?,
        };
        file.write_all(text.as_bytes())
            .map_err(|err| ExecError::io("Writing to", path, err))?;
        if (flags.keep_open || was_open) && !flags.close {
            self.open_files.insert(path.to_path_buf(), file);
        }
        Ok(())
    }

    /// Next line for a `stdin` read: the list's input redirect when one is
    /// active, the console otherwise. `None` once the input is exhausted.
    pub(super) fn next_line(&mut self, list: &InstructionList) -> Result<Option<String>, ExecError> {
        if let Some(line) = list.next_input() {
            return Ok(line);
        }
        if !self.dialog_prompt.is_empty() {
            self.config.print_handler.print(&format!("{}:", self.dialog_prompt));
        }
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|err| ExecError::io("Reading", "stdin", err))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string()))
    }

    pub(super) fn scan(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let CommandData::Scan { formats, rewind } = command.data() else {
            return Ok(());
        };
        let Some(source) = command.text(0) else {
            return Ok(());
        };
        let namespace = list.namespace();
        let targets: Vec<String> = command.texts_from(1).map(|t| list.qualify(t)).collect();

        let (data, key) = if source == "stdin" {
            let line = self
                .next_line(list)?
                .ok_or_else(|| ExecError::message("Ran out of standard input"))?;
            (line, None)
        } else if command.opcode() == Opcode::Sscanf {
            let name = list.qualify(source);
            match self.variables.get_by_name(&name) {
                Value::Str(text) => (text.to_string(), Some(name)),
                _ => {
                    return Err(ExecError::message(format!(
                        "{name} does not refer to a string variable in call to sscanf"
                    )))
                }
            }
        } else {
            let name = self.literal(source, namespace)?;
            let path = hbl_build::paths::resolve(&name, list.source_file(), &self.config.search_paths);
            let text = fs::read_to_string(&path).map_err(|_| {
                ExecError::message(format!("{} could not be opened for reading by fscanf", path.display()))
            })?;
            (text, Some(path.to_string_lossy().into_owned()))
        };

        let at_eof = self
            .variables
            .get_by_name(END_OF_FILE)
            .as_number()
            .is_some_and(|n| n > 0.0);
        let start = match &key {
            Some(key) if *rewind || at_eof => {
                self.scan_positions.remove(key);
                0
            }
            Some(key) => self.scan_positions.get(key).copied().unwrap_or(0),
            None => 0,
        };
        if key.is_some() && start >= data.len() {
            self.variables.set_by_name(END_OF_FILE, Value::Number(1.0));
            return Ok(());
        }

        let mut scanner = Scanner::new(&data, start);
        let mut read = 0;
        for (format, target) in formats.iter().zip(&targets) {
            if scanner.at_end() {
                break;
            }
            let value = match format {
                ScanFormat::Number => match scanner.number() {
                    Some(n) => Value::Number(n),
                    None => break,
                },
                ScanFormat::String => Value::from(scanner.string()),
                ScanFormat::Raw => Value::from(scanner.raw()),
                ScanFormat::Lines => Value::dict(scanner.lines()),
                ScanFormat::Matrix | ScanFormat::NumericMatrix => match scanner.block(b'{', b'}') {
                    Some(block) => self.evaluate_text(block, None)?,
                    None => break,
                },
                ScanFormat::Tree => match scanner.block(b'(', b')') {
                    Some(block) => {
                        self.scanned_tree(target, block)?;
                        read += 1;
                        continue;
                    }
                    None => break,
                },
            };
            self.variables.set_by_name(target, value);
            read += 1;
        }

        if let Some(key) = key {
            self.scan_positions.insert(key, scanner.pos());
        }
        if read < targets.len() {
            self.variables.set_by_name(END_OF_FILE, Value::Number(1.0));
            return Err(ExecError::message("fscanf could not read all the parameters requested."));
        }
        self.variables.set_by_name(END_OF_FILE, Value::Number(0.0));
        Ok(())
    }

    /// A `Tree` field read by `fscanf` declares a tree object.
    fn scanned_tree(&mut self, name: &str, block: &str) -> Result<(), ExecError> {
        let flags = CommandData::None;
        let source = format!("Tree {name} = {block};");
        let request = ConstructRequest {
            opcode: Opcode::Tree,
            kind: ObjectKind::Tree,
            name: name.to_string(),
            operation: None,
            texts: vec![block.to_string()],
            arguments: vec![Value::from(block)],
            flags: &flags,
            source: &source,
        };
        self.payload.construct(request, &mut self.objects)?;
        Ok(())
    }
}
