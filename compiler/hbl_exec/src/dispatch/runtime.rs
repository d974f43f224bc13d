//! Interpreter-level built-ins: assertions, version checks, profiling and
//! interactive choice lists.

use std::cmp::Ordering;

use hbl_formula::{Dict, Matrix, Value};
use hbl_ir::{Command, CommandData, InstructionList, ProfileAction};

use crate::globals::SELECTION_STRINGS;
use crate::{ExecError, ObjectKind, Session, HBL_VERSION};

/// One selectable `ChoiceList` entry.
struct Choice {
    /// Position in the full option list, reported back to the program.
    index: usize,
    name: String,
    description: String,
}

impl Session {
    pub(super) fn assert(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let namespace = list.namespace();
        let expression = command.text(0).unwrap_or_default();
        let Some(value) = self.evaluate_text(expression, namespace)?.as_number() else {
            return Err(ExecError::message(format!(
                "Assertion statement '{expression}' must evaluate to a number"
            )));
        };
        if value != 0.0 {
            return Ok(());
        }

        let message = match command.text(1) {
            Some(custom) => self.literal(custom, namespace)?,
            None => format!("Assertion '{expression}' failed."),
        };
        if self.config.soft_assertions {
            self.config.print_handler.println(&message);
            list.finish();
            return Ok(());
        }
        Err(ExecError::message(message))
    }

    pub(super) fn require_version(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let required = self.literal(command.text(0).unwrap_or_default(), list.namespace())?;
        if compare_versions(&required, HBL_VERSION) == Ordering::Greater {
            return Err(ExecError::message(format!(
                "Current script requires at least version {required} of HBL. Please download an updated version and try again."
            )));
        }
        Ok(())
    }

    /// The value layer carries no constraints; only the names are checked.
    pub(super) fn clear_constraints(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let names: Vec<String> = command.texts_from(0).map(str::to_string).collect();
        for name in names {
            if !self.variables.is_defined(&list.qualify(&name)) {
                self.warn(format!("'{name}' is not an existing variable in call to ClearConstraints"));
            }
        }
        Ok(())
    }

    pub(super) fn set_dialog_prompt(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        self.dialog_prompt = self.literal(command.text(0).unwrap_or_default(), list.namespace())?;
        Ok(())
    }

    pub(super) fn profile(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let CommandData::Profile(action) = command.data() else {
            return Ok(());
        };
        match action {
            ProfileAction::Start => list.start_profile(),
            ProfileAction::Pause => list.set_profile_active(false),
            ProfileAction::Resume => list.set_profile_active(true),
            ProfileAction::Collect => {
                let Some(counters) = list.profile() else {
                    return Err(ExecError::message("Profiler dump invoked before #profile START;"));
                };
                let mut instructions = Dict::new();
                let mut stats = Vec::new();
                for (i, (seconds, hits)) in counters.seconds.iter().zip(&counters.hits).enumerate() {
                    if *hits == 0 {
                        continue;
                    }
                    let text = list.command(i).map(ToString::to_string).unwrap_or_default();
                    instructions.insert(stats.len().to_string(), Value::from(text));
                    stats.push(vec![*seconds, *hits as f64]);
                }
                let stats = if stats.is_empty() {
                    Matrix::zeros(0, 2)
                } else {
                    Matrix::from_rows(stats).unwrap_or_else(|| Matrix::zeros(0, 2))
                };

                let mut dump = Dict::new();
                dump.insert("INSTRUCTION".to_string(), Value::dict(instructions));
                dump.insert("STATS".to_string(), Value::matrix(stats));
                let receptacle = list.qualify(command.text(0).unwrap_or_default());
                self.variables.set_by_name(&receptacle, Value::dict(dump));
            }
        }
        Ok(())
    }

    /// `ChoiceList(receptacle, title, count, skip, options)`.
    ///
    /// A count of 1 stores the picked index; a larger count stores a sorted
    /// row of indices; 0 keeps reading until `d` or the end of input. `q`
    /// cancels with -1. The picked names go to `SELECTION_STRINGS`.
    pub(super) fn choice_list(&mut self, list: &InstructionList, command: &Command) -> Result<(), ExecError> {
        let namespace = list.namespace();
        let receptacle = list.qualify(command.text(0).unwrap_or_default());
        let title = self.literal(command.text(1).unwrap_or_default(), namespace)?;
        let mut count = self.number(command.text(2).unwrap_or_default(), namespace)?;
        if count < 0.0 {
            self.warn(format!("ChoiceList expects a non-negative selection count, had {count}; using 1"));
            count = 1.0;
        }
        let count = count as usize;

        let excluded = self.excluded_choices(list, command.text(3).unwrap_or("SKIP_NONE"))?;
        let inline = matches!(command.data(), CommandData::Choice { inline: true });
        let available: Vec<Choice> = self
            .choice_options(list, command, inline)?
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !excluded.contains(index))
            .map(|(index, (name, description))| Choice {
                index,
                name,
                description,
            })
            .collect();
        if available.is_empty() {
            return Err(ExecError::message("List of selections is invalid in ChoiceList"));
        }
        if count > available.len() {
            return Err(ExecError::message("List of selections is too short in ChoiceList"));
        }

        if list.input().is_none() {
            let handler = &self.config.print_handler;
            handler.println(&title);
            for (i, choice) in available.iter().enumerate() {
                handler.println(&format!("\t({}):[{}] {}", i + 1, choice.name, choice.description));
            }
        }

        let mut picked: Vec<&Choice> = Vec::new();
        let mut cancelled = false;
        while count == 0 || picked.len() < count {
            let Some(line) = self.next_line(list)? else {
                cancelled = count > 0;
                break;
            };
            let line = line.trim();
            if line == "q" {
                cancelled = true;
                break;
            }
            if count == 0 && line == "d" {
                break;
            }
            let found = available.iter().find(|choice| choice.name == line).or_else(|| {
                line.parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| available.get(i))
            });
            match found {
                Some(choice) if !picked.iter().any(|p| p.index == choice.index) => picked.push(choice),
                Some(_) => {}
                None => {
                    self.warn(format!("'{line}' is not a valid choice in ChoiceList"));
                    if count == 1 {
                        cancelled = true;
                        break;
                    }
                }
            }
        }

        if cancelled || picked.is_empty() {
            self.variables.set_by_name(&receptacle, Value::Number(-1.0));
            self.variables.set_by_name(SELECTION_STRINGS, Value::Undefined);
            return Ok(());
        }
        picked.sort_by_key(|choice| choice.index);
        let result = if count == 1 {
            self.variables
                .set_by_name(SELECTION_STRINGS, Value::from(picked[0].name.as_str()));
            Value::Number(picked[0].index as f64)
        } else {
            let names: Dict = picked
                .iter()
                .enumerate()
                .map(|(i, choice)| (i.to_string(), Value::from(choice.name.as_str())))
                .collect();
            self.variables.set_by_name(SELECTION_STRINGS, Value::dict(names));
            let row = picked.iter().map(|choice| choice.index as f64).collect();
            Value::matrix(Matrix::from_rows(vec![row]).unwrap_or_else(|| Matrix::zeros(1, 0)))
        };
        self.variables.set_by_name(&receptacle, result);
        Ok(())
    }

    /// Option indices removed by the skip argument: `SKIP_NONE`, one index,
    /// or a matrix of indices.
    fn excluded_choices(&mut self, list: &InstructionList, skip: &str) -> Result<Vec<usize>, ExecError> {
        if skip == "SKIP_NONE" {
            return Ok(Vec::new());
        }
        let indices = match self.evaluate_text(skip, list.namespace())? {
            Value::Number(n) => vec![n],
            Value::Matrix(m) => m.cells().to_vec(),
            _ => Vec::new(),
        };
        let excluded = indices
            .into_iter()
            .filter(|n| *n >= 0.0 && n.is_finite())
            .map(|n| n as usize)
            .collect();
        Ok(excluded)
    }

    fn choice_options(
        &mut self,
        list: &InstructionList,
        command: &Command,
        inline: bool,
    ) -> Result<Vec<(String, String)>, ExecError> {
        if inline {
            let texts: Vec<&str> = command.texts_from(4).collect();
            return Ok(texts
                .chunks_exact(2)
                .map(|pair| (pair[0].to_string(), pair[1].to_string()))
                .collect());
        }
        let source = command.text(4).unwrap_or_default();
        if source == "LikelihoodFunction" {
            let count = self.objects.count_of_kind(ObjectKind::LikelihoodFunction);
            return Ok((0..count)
                .filter_map(|i| self.objects.nth_of_kind(ObjectKind::LikelihoodFunction, i))
                .map(|record| (record.name.clone(), format!("Likelihood function {}", record.name)))
                .collect());
        }
        match self.evaluate_text(source, list.namespace())? {
            Value::Dict(options) => Ok(options
                .iter()
                .map(|(name, description)| (name.clone(), description.to_text()))
                .collect()),
            _ => Err(ExecError::message("List of selections is invalid in ChoiceList")),
        }
    }
}

/// Compare dotted versions by their leading numeric components; missing
/// components count as zero.
fn compare_versions(left: &str, right: &str) -> Ordering {
    fn components(version: &str) -> Vec<u64> {
        let numeric = version
            .trim()
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or_default();
        numeric
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    }
    let (left, right) = (components(left), components(right));
    let len = left.len().max(right.len());
    (0..len)
        .map(|i| {
            let a = left.get(i).copied().unwrap_or(0);
            let b = right.get(i).copied().unwrap_or(0);
            a.cmp(&b)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
