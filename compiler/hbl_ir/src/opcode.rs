//! Command opcodes.
//!
//! Every command carries one [`Opcode`]. The numeric [`Opcode::code`] is the
//! historical tag printed in disassembly and profiling output; dispatch
//! matches on the enum itself.

use std::fmt;

/// What a command does when the dispatcher reaches it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Unresolved `break`/`continue` site or placeholder jump.
    Nop,
    /// Expression statement or assignment.
    Formula,
    /// Conditional or unconditional jump.
    Jump,
    /// `DataSet x = ReadDataFile(..)` / `ReadFromString(..)`.
    DataSet,
    DataSetFilter,
    Tree,
    Fprintf,
    HarvestFrequencies,
    Optimize,
    LikelihoodFunction,
    /// `DataSet x = SimulateDataSet(..)`.
    SimulateDataSet,
    Return,
    /// `DataSet x = Concatenate(..)` / `Combine(..)`.
    DataSetMerge,
    Import,
    Category,
    SelectTemplateModel,
    Fscanf,
    Model,
    ChoiceList,
    ExecuteCommands,
    MpiSend,
    MpiReceive,
    GetDataInfo,
    StateCounter,
    DoSql,
    Topology,
    Sscanf,
    GetNeutralNull,
    Profile,
    Scfg,
    ExecuteAFile,
    Bgm,
    LoadFunctionLibrary,
    /// A `namespace` block compiled into its own list.
    NestedList,
    GetString,
    SetParameter,
    SetDialogPrompt,
    Export,
    Assert,
    RequireVersion,
    DeleteObject,
    ClearConstraints,
    CovarianceMatrix,
    LfCompute,
    UseModel,
    MolecularClock,
    GetUrl,
    Differentiate,
    FindRoot,
    Integrate,
    GetInformation,
    ReplicateConstraint,
    ConstructCategoryMatrix,
    OpenWindow,
    AlignSequences,
}

impl Opcode {
    /// Numeric tag.
    pub fn code(self) -> i16 {
        match self {
            Opcode::Nop => -1,
            Opcode::Formula => 0,
            Opcode::Jump => 4,
            Opcode::DataSet => 5,
            Opcode::DataSetFilter => 6,
            Opcode::Tree => 7,
            Opcode::Fprintf => 8,
            Opcode::HarvestFrequencies => 9,
            Opcode::Optimize => 10,
            Opcode::LikelihoodFunction => 11,
            Opcode::SimulateDataSet => 12,
            Opcode::Return => 14,
            Opcode::DataSetMerge => 16,
            Opcode::Import => 18,
            Opcode::Category => 20,
            Opcode::SelectTemplateModel => 24,
            Opcode::Fscanf => 25,
            Opcode::Model => 31,
            Opcode::ChoiceList => 32,
            Opcode::CovarianceMatrix => 35,
            Opcode::ExecuteCommands => 39,
            Opcode::MpiSend => 44,
            Opcode::MpiReceive => 45,
            Opcode::GetDataInfo => 46,
            Opcode::StateCounter => 47,
            Opcode::DoSql => 53,
            Opcode::Topology => 54,
            Opcode::Sscanf => 56,
            Opcode::GetNeutralNull => 57,
            Opcode::Profile => 58,
            Opcode::Scfg => 61,
            Opcode::ExecuteAFile => 62,
            Opcode::Bgm => 64,
            Opcode::LoadFunctionLibrary => 66,
            Opcode::NestedList => 67,
            Opcode::GetString => 68,
            Opcode::SetParameter => 69,
            Opcode::SetDialogPrompt => 70,
            Opcode::Export => 71,
            Opcode::Assert => 72,
            Opcode::RequireVersion => 73,
            Opcode::DeleteObject => 74,
            Opcode::ClearConstraints => 75,
            Opcode::LfCompute => 76,
            Opcode::UseModel => 77,
            Opcode::MolecularClock => 78,
            Opcode::GetUrl => 79,
            Opcode::Differentiate => 80,
            Opcode::FindRoot => 81,
            Opcode::Integrate => 82,
            Opcode::GetInformation => 83,
            Opcode::ReplicateConstraint => 84,
            Opcode::ConstructCategoryMatrix => 85,
            Opcode::OpenWindow => 86,
            Opcode::AlignSequences => 87,
        }
    }

    /// Statement keyword the opcode is written as.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Formula => "formula",
            Opcode::Jump => "jump",
            Opcode::DataSet | Opcode::SimulateDataSet | Opcode::DataSetMerge => "DataSet",
            Opcode::DataSetFilter => "DataSetFilter",
            Opcode::Tree => "Tree",
            Opcode::Fprintf => "fprintf",
            Opcode::HarvestFrequencies => "HarvestFrequencies",
            Opcode::Optimize => "Optimize",
            Opcode::LikelihoodFunction => "LikelihoodFunction",
            Opcode::Return => "return",
            Opcode::Import => "Import",
            Opcode::Category => "category",
            Opcode::SelectTemplateModel => "SelectTemplateModel",
            Opcode::Fscanf => "fscanf",
            Opcode::Model => "Model",
            Opcode::ChoiceList => "ChoiceList",
            Opcode::ExecuteCommands => "ExecuteCommands",
            Opcode::MpiSend => "MPISend",
            Opcode::MpiReceive => "MPIReceive",
            Opcode::GetDataInfo => "GetDataInfo",
            Opcode::StateCounter => "StateCounter",
            Opcode::DoSql => "DoSQL",
            Opcode::Topology => "Topology",
            Opcode::Sscanf => "sscanf",
            Opcode::GetNeutralNull => "GetNeutralNull",
            Opcode::Profile => "#profile",
            Opcode::Scfg => "SCFG",
            Opcode::ExecuteAFile => "ExecuteAFile",
            Opcode::Bgm => "BayesianGraphicalModel",
            Opcode::LoadFunctionLibrary => "LoadFunctionLibrary",
            Opcode::NestedList => "namespace",
            Opcode::GetString => "GetString",
            Opcode::SetParameter => "SetParameter",
            Opcode::SetDialogPrompt => "SetDialogPrompt",
            Opcode::Export => "Export",
            Opcode::Assert => "assert",
            Opcode::RequireVersion => "RequireVersion",
            Opcode::DeleteObject => "DeleteObject",
            Opcode::ClearConstraints => "ClearConstraints",
            Opcode::CovarianceMatrix => "CovarianceMatrix",
            Opcode::LfCompute => "LFCompute",
            Opcode::UseModel => "UseModel",
            Opcode::MolecularClock => "MolecularClock",
            Opcode::GetUrl => "GetURL",
            Opcode::Differentiate => "Differentiate",
            Opcode::FindRoot => "FindRoot",
            Opcode::Integrate => "Integrate",
            Opcode::GetInformation => "GetInformation",
            Opcode::ReplicateConstraint => "ReplicateConstraint",
            Opcode::ConstructCategoryMatrix => "ConstructCategoryMatrix",
            Opcode::OpenWindow => "OpenWindow",
            Opcode::AlignSequences => "AlignSequences",
        }
    }

    /// Declares a named object held by the payload.
    pub fn is_object_construct(self) -> bool {
        matches!(
            self,
            Opcode::DataSet
                | Opcode::SimulateDataSet
                | Opcode::DataSetMerge
                | Opcode::DataSetFilter
                | Opcode::Tree
                | Opcode::Topology
                | Opcode::Model
                | Opcode::LikelihoodFunction
                | Opcode::Category
                | Opcode::Scfg
                | Opcode::Bgm
        )
    }

    /// Forwarded to the payload without interpreter-side semantics.
    pub fn is_payload_operation(self) -> bool {
        matches!(
            self,
            Opcode::HarvestFrequencies
                | Opcode::Optimize
                | Opcode::CovarianceMatrix
                | Opcode::LfCompute
                | Opcode::Differentiate
                | Opcode::FindRoot
                | Opcode::Integrate
                | Opcode::GetDataInfo
                | Opcode::GetInformation
                | Opcode::MolecularClock
                | Opcode::ReplicateConstraint
                | Opcode::UseModel
                | Opcode::SelectTemplateModel
                | Opcode::ConstructCategoryMatrix
                | Opcode::OpenWindow
                | Opcode::GetUrl
                | Opcode::DoSql
                | Opcode::AlignSequences
                | Opcode::GetNeutralNull
                | Opcode::StateCounter
                | Opcode::Import
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
