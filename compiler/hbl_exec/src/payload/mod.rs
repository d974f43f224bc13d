//! The object layer behind typed constructs.
//!
//! Statements such as `DataSet ds = ReadDataFile(..)` or
//! `LikelihoodFunction lf = (..)` declare named objects whose numerical
//! meaning lives outside the interpreter. The dispatcher validates the
//! command, evaluates its arguments and hands a [`ConstructRequest`] to the
//! session's [`Payload`]. Named objects are kept in the session's
//! [`ObjectStore`] so later statements (`GetString`, `Export`,
//! `DeleteObject`, `MPISend`) can find them.

use std::fmt;

use hbl_formula::Value;
use hbl_ir::{CommandData, Opcode};
use thiserror::Error;

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

/// Kinds of named objects.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    DataSet,
    DataSetFilter,
    Tree,
    Topology,
    Model,
    LikelihoodFunction,
    Category,
    Scfg,
    Bgm,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 9] = [
        ObjectKind::DataSet,
        ObjectKind::DataSetFilter,
        ObjectKind::Tree,
        ObjectKind::Topology,
        ObjectKind::Model,
        ObjectKind::LikelihoodFunction,
        ObjectKind::Category,
        ObjectKind::Scfg,
        ObjectKind::Bgm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::DataSet => "DataSet",
            ObjectKind::DataSetFilter => "DataSetFilter",
            ObjectKind::Tree => "Tree",
            ObjectKind::Topology => "Topology",
            ObjectKind::Model => "Model",
            ObjectKind::LikelihoodFunction => "LikelihoodFunction",
            ObjectKind::Category => "Category",
            ObjectKind::Scfg => "SCFG",
            ObjectKind::Bgm => "BayesianGraphicalModel",
        }
    }

    pub fn from_name(name: &str) -> Option<ObjectKind> {
        ObjectKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Kind declared by an object-construct opcode.
    pub fn from_opcode(opcode: Opcode) -> Option<ObjectKind> {
        Some(match opcode {
            Opcode::DataSet | Opcode::SimulateDataSet | Opcode::DataSetMerge => ObjectKind::DataSet,
            Opcode::DataSetFilter => ObjectKind::DataSetFilter,
            Opcode::Tree => ObjectKind::Tree,
            Opcode::Topology => ObjectKind::Topology,
            Opcode::Model => ObjectKind::Model,
            Opcode::LikelihoodFunction => ObjectKind::LikelihoodFunction,
            Opcode::Category => ObjectKind::Category,
            Opcode::Scfg => ObjectKind::Scfg,
            Opcode::Bgm => ObjectKind::Bgm,
            _ => return None,
        })
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored named object.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    pub kind: ObjectKind,
    /// Namespace-qualified name.
    pub name: String,
    /// Constructor used, e.g. `ReadDataFile` or `Concatenate`.
    pub operation: Option<String>,
    pub arguments: Vec<Value>,
    /// The declaring statement.
    pub source: String,
}

/// Named objects in declaration order.
///
/// Redeclaring a name replaces the record in place, so positional lookups
/// (`GetString(x, DataSet, 0)`) stay put.
#[derive(Debug, Default)]
pub struct ObjectStore {
    records: Vec<ObjectRecord>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ObjectRecord) {
        match self.records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ObjectRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<ObjectRecord> {
        let at = self.records.iter().position(|r| r.name == name)?;
        Some(self.records.remove(at))
    }

    /// The `index`-th object of `kind`, counting in declaration order.
    pub fn nth_of_kind(&self, kind: ObjectKind, index: usize) -> Option<&ObjectRecord> {
        self.records.iter().filter(|r| r.kind == kind).nth(index)
    }

    pub fn count_of_kind(&self, kind: ObjectKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Everything a construct command hands to the payload.
#[derive(Debug)]
pub struct ConstructRequest<'a> {
    pub opcode: Opcode,
    pub kind: ObjectKind,
    /// Qualified name of the object being declared.
    pub name: String,
    pub operation: Option<String>,
    /// Argument texts as written.
    pub texts: Vec<String>,
    /// Evaluated arguments, parallel to `texts`. An argument naming an
    /// existing object evaluates to that object's qualified name.
    pub arguments: Vec<Value>,
    pub flags: &'a CommandData,
    pub source: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("{0} is not supported by the active object layer")]
    Unsupported(&'static str),

    #[error("Could not find source {kind} '{name}'")]
    MissingObject { kind: &'static str, name: String },

    #[error("{0}")]
    Message(String),
}

/// Numerical collaborator for typed constructs and object operations.
pub trait Payload {
    /// Build (or rebuild) the object described by `request`.
    fn construct(
        &mut self,
        request: ConstructRequest<'_>,
        objects: &mut ObjectStore,
    ) -> Result<(), PayloadError>;

    /// Run an object operation such as `Optimize`. A returned value is
    /// stored in the receptacle named by the first argument.
    fn operation(
        &mut self,
        opcode: Opcode,
        arguments: &[String],
        objects: &mut ObjectStore,
    ) -> Result<Option<Value>, PayloadError>;
}

/// Default payload: records declarations, supports no operations.
#[derive(Debug, Default)]
pub struct RecordingPayload;

impl RecordingPayload {
    fn require(
        objects: &ObjectStore,
        argument: Option<&Value>,
        text: Option<&String>,
        accepted: &[ObjectKind],
    ) -> Result<String, PayloadError> {
        let found = argument
            .and_then(Value::as_str)
            .and_then(|name| objects.get(name))
            .filter(|record| accepted.contains(&record.kind));
        match found {
            Some(record) => Ok(record.name.clone()),
            None => Err(PayloadError::MissingObject {
                kind: accepted.first().map_or("object", |kind| kind.name()),
                name: text.cloned().unwrap_or_default(),
            }),
        }
    }
}

impl Payload for RecordingPayload {
    fn construct(
        &mut self,
        request: ConstructRequest<'_>,
        objects: &mut ObjectStore,
    ) -> Result<(), PayloadError> {
        match (request.opcode, request.flags) {
            (Opcode::DataSetFilter, _) => {
                Self::require(
                    objects,
                    request.arguments.first(),
                    request.texts.first(),
                    &[ObjectKind::DataSet, ObjectKind::DataSetFilter],
                )?;
            }
            (Opcode::DataSetMerge, CommandData::Merge { purge, .. }) => {
                let mut sources = Vec::with_capacity(request.arguments.len());
                for (value, text) in request.arguments.iter().zip(&request.texts) {
                    sources.push(Self::require(objects, Some(value), Some(text), &[ObjectKind::DataSet])?);
                }
                if *purge {
                    for source in &sources {
                        if *source != request.name {
                            objects.remove(source);
                        }
                    }
                }
            }
            _ => {}
        }

        tracing::debug!(kind = %request.kind, name = %request.name, "recorded object");
        objects.insert(ObjectRecord {
            kind: request.kind,
            name: request.name,
            operation: request.operation,
            arguments: request.arguments,
            source: request.source.to_string(),
        });
        Ok(())
    }

    fn operation(
        &mut self,
        opcode: Opcode,
        _arguments: &[String],
        _objects: &mut ObjectStore,
    ) -> Result<Option<Value>, PayloadError> {
        Err(PayloadError::Unsupported(opcode.name()))
    }
}
