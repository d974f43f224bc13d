//! Typed declarations and the commands with their own argument grammar.
//!
//! Declarations follow one of two shapes, `Kind id = Op(args)` or
//! `Kind id = (args)`. Every construct emits exactly one command whose
//! first parameter is the target identifier.

use hbl_ir::{
    Command, CommandData, Keyword, MergeMode, Opcode, ProfileAction, ScanFormat,
};
use hbl_segment::{extract_conditions, scan};

use super::{Builder, Frame, LoopExit};
use crate::{paths, BuildError};

/// `Kind id = rhs`, split at the first top-level `=`.
fn split_declaration(text: &str, keyword_len: usize) -> Option<(&str, &str)> {
    let eq = scan::find_terminator(text, keyword_len, '=')?;
    let id = text[keyword_len..eq].trim();
    let rhs = text[eq + 1..].trim();
    scan::is_valid_identifier(id, true).then_some((id, rhs))
}

/// `Op(args)`: the operation name and its arguments.
fn split_call(rhs: &str) -> Option<(&str, Vec<String>)> {
    let open = rhs.find('(')?;
    let conditions = extract_conditions(rhs, open + 1, ',', true);
    Some((rhs[..open].trim(), conditions.pieces))
}

/// `(args)` as written after the `=` of a tuple declaration.
fn tuple(rhs: &str) -> Option<Vec<String>> {
    rhs.starts_with('(')
        .then(|| extract_conditions(rhs, 1, ',', true).pieces)
}

fn keyword_len(text: &str) -> usize {
    text.find(' ').map_or(text.len(), |space| space + 1)
}

/// Arguments of a call-style command `Name(args)`.
fn call_arguments(text: &str) -> Vec<String> {
    let open = text.find('(').map_or(text.len(), |open| open + 1);
    extract_conditions(text, open, ',', true).pieces
}

/// `#profile START|PAUSE|RESUME|receptacle`
pub(super) fn profile(frame: &mut Frame, text: &str) -> Result<(), BuildError> {
    let argument = text["#profile".len()..].trim();
    let action = match argument {
        "START" => ProfileAction::Start,
        "PAUSE" => ProfileAction::Pause,
        "RESUME" => ProfileAction::Resume,
        id if scan::is_valid_identifier(id, true) => ProfileAction::Collect,
        _ => {
            return Err(BuildError::malformed(format!(
                "#profile expects START, PAUSE, RESUME or a receptacle. Had '{argument}'"
            )))
        }
    };
    let mut command =
        Command::new(Opcode::Profile, text).with_data(CommandData::Profile(action));
    if action == ProfileAction::Collect {
        command = command.with_text(argument);
    }
    frame.list.push(command);
    Ok(())
}

impl Builder<'_> {
    pub(super) fn construct(
        &mut self,
        frame: &mut Frame,
        text: &str,
        keyword: Keyword,
    ) -> Result<(), BuildError> {
        let command = match keyword {
            Keyword::DataSet => data_set(text)?,
            Keyword::DataSetFilter => data_set_filter(text)?,
            Keyword::Tree | Keyword::Topology => tree(text, keyword)?,
            Keyword::LikelihoodFunction | Keyword::LikelihoodFunction3 => {
                likelihood_function(text, keyword == Keyword::LikelihoodFunction3)?
            }
            Keyword::Model => model(text)?,
            Keyword::Category => category(text)?,
            Keyword::Scfg => generic_tuple(text, Opcode::Scfg, "SCFG")?,
            Keyword::Bgm => generic_tuple(text, Opcode::Bgm, "BayesianGraphicalModel")?,
            Keyword::Fscanf => scan_command(text, Opcode::Fscanf)?,
            Keyword::Sscanf => scan_command(text, Opcode::Sscanf)?,
            Keyword::ChoiceList => choice_list(text)?,
            Keyword::ExecuteCommands => self.execute(text, Opcode::ExecuteCommands)?,
            Keyword::ExecuteAFile => self.execute(text, Opcode::ExecuteAFile)?,
            Keyword::LoadFunctionLibrary => self.execute(text, Opcode::LoadFunctionLibrary)?,
            Keyword::MpiSend => mpi_send(text)?,
            Keyword::MpiReceive => mpi_receive(text)?,
            other => {
                return Err(BuildError::malformed(format!(
                    "'{other}' can not be used as a statement here: '{text}'"
                )))
            }
        };
        tracing::trace!(opcode = %command.opcode(), "built construct");
        frame.list.push(command);
        Ok(())
    }

    /// `ExecuteCommands`, `ExecuteAFile`, `LoadFunctionLibrary`.
    ///
    /// Parameters: code or path, the including file (or empty), the input
    /// redirect (or empty), the namespace (or empty).
    fn execute(&self, text: &str, opcode: Opcode) -> Result<Command, BuildError> {
        let pieces = call_arguments(text);
        if pieces.is_empty() || pieces.len() > 3 || pieces[0].is_empty() {
            return Err(BuildError::malformed(
                "Expected: ExecuteCommands (identifier, <compiled|(input redirect<,string prefix>)>) or ExecuteAFile (path name, <compiled|(input redirect<,string prefix>)> or LoadFunctionLibrary (path name, <compiled|(input redirect<,string prefix>)>)",
            ));
        }

        let compiled = pieces
            .get(1)
            .is_some_and(|p| p == "compiled" || scan::unquote(p).is_some_and(|p| p == "compiled"));
        let redirect = pieces.get(1).filter(|_| !compiled).map_or("", String::as_str);
        let namespace = pieces
            .get(2)
            .map(String::as_str)
            .filter(|ns| *ns != "enclosing_namespace")
            .unwrap_or_default();
        let current = self
            .current_file()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Command::new(opcode, text)
            .with_text(pieces[0].as_str())
            .with_text(current)
            .with_text(redirect)
            .with_text(namespace)
            .with_data(CommandData::Execute { compiled }))
    }

    /// `#include "path"`: the file's statements are built in place.
    pub(super) fn build_include(
        &mut self,
        frame: &mut Frame,
        text: &str,
        exits: Option<&mut Vec<LoopExit>>,
    ) -> Result<(), BuildError> {
        let argument = text["#include".len()..].trim();
        let Some(name) = scan::unquote(argument).filter(|name| !name.is_empty()) else {
            return Err(BuildError::IncludeFilename(argument.to_string()));
        };

        let path = paths::resolve(&name, self.current_file(), &self.search_paths);
        let source = std::fs::read_to_string(&path)
            .map_err(|source| BuildError::ReadFile { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "including batch file");

        self.file_stack.push(path);
        let built = self.build_into(frame, &source, exits);
        self.file_stack.pop();
        built
    }
}

// ─── Declarations ───

fn data_set(text: &str) -> Result<Command, BuildError> {
    let Some((id, rhs)) = split_declaration(text, "DataSet ".len()) else {
        return Err(BuildError::malformed("DataSet declaration missing a valid identifier"));
    };
    let Some((operation, pieces)) = split_call(rhs) else {
        return Err(unknown_data_set(text));
    };

    match operation {
        "ReadDataFile" | "ReadFromString" => {
            let [source] = pieces.as_slice() else {
                return Err(BuildError::malformed("DataSet declaration missing a valid filename"));
            };
            Ok(Command::new(Opcode::DataSet, text)
                .with_text(id)
                .with_text(source.as_str())
                .with_data(CommandData::DataSet {
                    from_string: operation == "ReadFromString",
                }))
        }
        "SimulateDataSet" => {
            if pieces.is_empty() || pieces.len() > 4 || pieces[0].is_empty() {
                return Err(BuildError::malformed(
                    "DataSet simulation missing a valid likelihood function (and up to 3 optional arguments)",
                ));
            }
            Ok(Command::new(Opcode::SimulateDataSet, text)
                .with_text(id)
                .with_texts(pieces))
        }
        "Concatenate" | "Combine" => {
            let purge = pieces.first().is_some_and(|p| p == "purge");
            let sources: Vec<String> = pieces
                .into_iter()
                .skip(usize::from(purge))
                .filter(|p| !p.is_empty())
                .collect();
            if sources.is_empty() {
                return Err(BuildError::malformed(
                    "DataSet merging operation missing a valid list of arguments.",
                ));
            }
            let mode = if operation == "Concatenate" {
                MergeMode::Concatenate
            } else {
                MergeMode::Combine
            };
            Ok(Command::new(Opcode::DataSetMerge, text)
                .with_text(id)
                .with_texts(sources)
                .with_data(CommandData::Merge { mode, purge }))
        }
        _ => Err(unknown_data_set(text)),
    }
}

fn unknown_data_set(text: &str) -> BuildError {
    BuildError::malformed(format!(
        "Expected DataSet ident = ReadDataFile(filename); or DataSet ident = SimulateDataSet (LikelihoodFunction); or DataSet ident = Concatenate (<purge>,<list of DataSets>); or DataSet ident = Combine (<purge>,<list of DataSets>) or DataSet ident = ReadFromString (string). Had '{text}'"
    ))
}

/// `DataSetFilter id = CreateFilter|Permute|Bootstrap(data set, ...)`;
/// the operation name becomes the second parameter.
fn data_set_filter(text: &str) -> Result<Command, BuildError> {
    let Some((id, rhs)) = split_declaration(text, "DataSetFilter ".len()) else {
        return Err(BuildError::malformed(
            "DataSetFilter declaration missing a valid identifier",
        ));
    };
    let Some((operation, pieces)) = split_call(rhs).filter(|(op, _)| {
        matches!(*op, "CreateFilter" | "Permute" | "Bootstrap")
    }) else {
        return Err(BuildError::malformed(
            "Expected: DataSetFilter dataSetFilterid = CreateFilter (datasetid,unit,vertical partition,horizontal partition,alphabet exclusions); or Permute/Bootstrap (dataset/filter,<atom>,<column partition>)",
        ));
    };

    let minimum = if operation == "CreateFilter" { 1 } else { 2 };
    if pieces.len() < minimum || pieces[0].is_empty() {
        return Err(BuildError::malformed("Parameter(s) missing in DataSetFilter definition."));
    }
    Ok(Command::new(Opcode::DataSetFilter, text)
        .with_text(id)
        .with_text(operation)
        .with_texts(pieces))
}

/// `Tree id = expr` and `Topology id = expr`.
fn tree(text: &str, keyword: Keyword) -> Result<Command, BuildError> {
    let (opcode, len) = if keyword == Keyword::Topology {
        (Opcode::Topology, "Topology ".len())
    } else {
        (Opcode::Tree, "Tree ".len())
    };
    let Some((id, rhs)) = split_declaration(text, len) else {
        return Err(BuildError::malformed(format!(
            "{keyword} declaration missing a valid identifier"
        )));
    };
    if rhs.is_empty() {
        return Err(BuildError::malformed(format!(
            "{keyword} declaration missing a valid tree string or expression"
        )));
    }
    Ok(Command::new(opcode, text).with_text(id).with_text(rhs))
}

fn likelihood_function(text: &str, explicit_frequencies: bool) -> Result<Command, BuildError> {
    let Some((id, rhs)) = split_declaration(text, keyword_len(text)) else {
        return Err(BuildError::malformed(
            "Likelihood function declaration missing a valid identifier",
        ));
    };
    let pieces = tuple(rhs)
        .filter(|pieces| pieces.iter().any(|p| !p.is_empty()))
        .ok_or_else(|| {
            BuildError::malformed(
                "Expected: Likelihood Function ident = (tree1, datasetfilter1,...)",
            )
        })?;
    Ok(Command::new(Opcode::LikelihoodFunction, text)
        .with_text(id)
        .with_texts(pieces)
        .with_data(CommandData::Likelihood {
            explicit_frequencies,
        }))
}

/// `Model id = (matrix, frequencies[, options])`.
fn model(text: &str) -> Result<Command, BuildError> {
    let Some((id, rhs)) = split_declaration(text, "Model ".len()) else {
        return Err(BuildError::malformed("Model declaration missing a valid identifier."));
    };
    let pieces = tuple(rhs).unwrap_or_default();
    if pieces.len() < 2 {
        return Err(BuildError::malformed(
            "Parameter(s) missing in Model definition. Must have a matrix and a compatible eqiulibrium frequencies vector.",
        ));
    }
    if pieces.len() > 3 {
        return Err(BuildError::malformed(
            "Too many parameters (3 max) in Model definition",
        ));
    }
    Ok(Command::new(Opcode::Model, text).with_text(id).with_texts(pieces))
}

fn category(text: &str) -> Result<Command, BuildError> {
    let Some((id, rhs)) = split_declaration(text, "category ".len()) else {
        return Err(BuildError::malformed(
            "Category variable declaration missing a valid identifier",
        ));
    };
    let pieces = tuple(rhs).unwrap_or_default();
    if pieces.len() < 7 {
        return Err(BuildError::malformed(
            "Expected: category <id> = (number of intervals, weights, method for representation, density, cumulative, left bound, right bound,<optional mean cumulative function>,<optional hidden markov matrix>);",
        ));
    }
    Ok(Command::new(Opcode::Category, text).with_text(id).with_texts(pieces))
}

/// `SCFG id = (...)` and `BayesianGraphicalModel id = (...)`.
fn generic_tuple(text: &str, opcode: Opcode, what: &str) -> Result<Command, BuildError> {
    let Some((id, rhs)) = split_declaration(text, keyword_len(text)) else {
        return Err(BuildError::malformed(format!(
            "{what} declaration missing a valid identifier"
        )));
    };
    let pieces = tuple(rhs)
        .filter(|pieces| !pieces.is_empty() && !pieces[0].is_empty())
        .ok_or_else(|| BuildError::malformed(format!("Expected: {what} ident = (...)")))?;
    Ok(Command::new(opcode, text).with_text(id).with_texts(pieces))
}

// ─── Call-style commands ───

/// `fscanf(source, "fmt,...", targets...)`; `REWIND` may lead the list.
fn scan_command(text: &str, opcode: Opcode) -> Result<Command, BuildError> {
    let mut pieces = call_arguments(text);
    if pieces.len() < 3 {
        return Err(BuildError::malformed("Too few arguments in call to fscanf or sscanf"));
    }

    let rewind = pieces[1] == "REWIND" || scan::unquote(&pieces[1]).is_some_and(|f| f == "REWIND");
    if rewind {
        pieces.remove(1);
        if pieces.len() < 3 {
            return Err(BuildError::malformed("Too few arguments in call to fscanf or sscanf"));
        }
    }

    let descriptors = scan::unquote(&pieces[1]).unwrap_or_else(|| pieces[1].clone());
    let formats = extract_conditions(&descriptors, 0, ',', true)
        .pieces
        .iter()
        .map(|d| {
            ScanFormat::from_name(d.trim()).ok_or_else(|| {
                BuildError::malformed(format!(
                    "{d} is not a valid type descriptor for fscanf. Allowed ones are:Number, Matrix, NMatrix, Tree, String, Raw, Lines"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let targets = &pieces[2..];
    if targets.len() != formats.len() {
        return Err(BuildError::malformed(format!(
            "fscanf passed {} parameter type descriptors and {} actual arguments",
            formats.len(),
            targets.len()
        )));
    }
    if let Some(bad) = targets.iter().find(|t| !scan::is_valid_identifier(t, true)) {
        return Err(BuildError::malformed(format!(
            "fscanf passed an invalid variable identifier: {bad}"
        )));
    }

    Ok(Command::new(opcode, text)
        .with_text(pieces[0].as_str())
        .with_texts(targets.iter().map(String::as_str))
        .with_data(CommandData::Scan { formats, rewind }))
}

/// `ChoiceList(receptacle, title, count, skip, source)` or with inline
/// choice/description pairs in place of `source`.
fn choice_list(text: &str) -> Result<Command, BuildError> {
    let pieces = call_arguments(text);
    if pieces.len() < 5 {
        return Err(BuildError::malformed("ChoiceList needs at least 5 arguments"));
    }
    if !scan::is_valid_identifier(&pieces[0], true) {
        return Err(BuildError::malformed(format!(
            "ChoiceList passed an invalid receptacle: {}",
            pieces[0]
        )));
    }

    let inline = pieces.len() > 5;
    if inline && (pieces.len() - 4) % 2 != 0 {
        return Err(BuildError::malformed(
            "ChoiceList inline options must come as choice, description pairs",
        ));
    }
    let mut command = Command::new(Opcode::ChoiceList, text).with_texts(pieces[..4].iter().map(String::as_str));
    if inline {
        command = command.with_texts(
            pieces[4..]
                .iter()
                .map(|p| scan::unquote(p).unwrap_or_else(|| p.clone())),
        );
    } else {
        command = command.with_text(pieces[4].as_str());
    }
    Ok(command.with_data(CommandData::Choice { inline }))
}

fn mpi_send(text: &str) -> Result<Command, BuildError> {
    let pieces = call_arguments(text);
    if !(2..=3).contains(&pieces.len()) {
        return Err(BuildError::malformed(
            "Expected: MPISend (numeric node ID, string with HBL code <or> a LF ID).",
        ));
    }
    Ok(Command::new(Opcode::MpiSend, text).with_texts(pieces))
}

fn mpi_receive(text: &str) -> Result<Command, BuildError> {
    let pieces = call_arguments(text);
    if pieces.len() != 3 {
        return Err(BuildError::malformed(
            "Expected: MPIReceive (can receive from node, received from node, receptacle for the string result).",
        ));
    }
    Ok(Command::new(Opcode::MpiReceive, text).with_texts(pieces))
}
