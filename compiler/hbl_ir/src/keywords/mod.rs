//! Statement keyword table.
//!
//! Statements are classified by their longest matching keyword prefix.
//! Prefixes are stored in a byte trie; a keyword that ends in an identifier
//! character (`break`, `return`, `#include`) additionally requires that the
//! statement does not continue the identifier, so `returned = 1` stays a
//! formula.
//!
//! Call-style commands carry an [`ExtractSpec`]: how many arguments they
//! take and which delimiter separates them.

use std::fmt;
use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::Opcode;


/// What a statement's leading keyword selects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    For,
    While,
    Break,
    Continue,
    If,
    Else,
    Do,
    Return,
    Function,
    FFunction,
    LFunction,
    Namespace,
    Include,
    Profile,
    DataSet,
    DataSetFilter,
    Tree,
    Topology,
    LikelihoodFunction,
    LikelihoodFunction3,
    Model,
    Category,
    Scfg,
    Bgm,
    Fscanf,
    Sscanf,
    ChoiceList,
    ExecuteCommands,
    ExecuteAFile,
    LoadFunctionLibrary,
    MpiSend,
    MpiReceive,
    /// Call-style command with a generic argument list.
    Command(Opcode),
}

/// Accepted argument counts for a call-style statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExtractSpec {
    /// Allowed piece counts; a single negative entry `-n` means "at least n".
    pub counts: &'static [i32],
    pub delimiter: char,
    /// Cut the statement down to what follows the argument list.
    pub trim: bool,
}

/// Why a piece count was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CountMismatch {
    OneOf(String),
    AtLeast(usize),
}

impl ExtractSpec {
    const fn args(counts: &'static [i32]) -> Self {
        ExtractSpec {
            counts,
            delimiter: ',',
            trim: false,
        }
    }

    const fn header(counts: &'static [i32]) -> Self {
        ExtractSpec {
            counts,
            delimiter: ';',
            trim: true,
        }
    }

    pub fn check(&self, found: usize) -> Result<(), CountMismatch> {
        if self.counts.iter().any(|&c| c >= 0 && c as usize == found) {
            return Ok(());
        }
        match self.counts {
            [minimum] if *minimum < 0 => {
                let minimum = minimum.unsigned_abs() as usize;
                if found >= minimum {
                    Ok(())
                } else {
                    Err(CountMismatch::AtLeast(minimum))
                }
            }
            counts => Err(CountMismatch::OneOf(format!(
                "{{{}}}",
                counts
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            ))),
        }
    }
}

impl Keyword {
    pub fn extract_spec(self) -> Option<ExtractSpec> {
        let counts: &'static [i32] = match self {
            Keyword::For => return Some(ExtractSpec::header(&[3])),
            Keyword::While => return Some(ExtractSpec::header(&[1])),
            Keyword::Command(opcode) => match opcode {
                Opcode::Fprintf
                | Opcode::DeleteObject
                | Opcode::ClearConstraints
                | Opcode::Import => &[-1],
                Opcode::GetString => &[3, 4],
                Opcode::Export | Opcode::LfCompute | Opcode::StateCounter => &[2],
                Opcode::Assert => &[1, 2],
                Opcode::RequireVersion
                | Opcode::SetDialogPrompt
                | Opcode::SelectTemplateModel
                | Opcode::UseModel => &[1],
                Opcode::SetParameter | Opcode::DoSql | Opcode::AlignSequences => &[3],
                Opcode::HarvestFrequencies => &[5, 6],
                Opcode::Optimize | Opcode::CovarianceMatrix => &[2, 3],
                Opcode::MolecularClock => &[-2],
                Opcode::GetUrl | Opcode::GetInformation | Opcode::OpenWindow => &[2, 3],
                Opcode::Differentiate => &[3, 4],
                Opcode::FindRoot | Opcode::GetNeutralNull => &[5],
                Opcode::Integrate => &[5, 6],
                Opcode::GetDataInfo => &[2, 3, 4, 5],
                Opcode::ReplicateConstraint => &[-3],
                Opcode::ConstructCategoryMatrix => &[2, 3, 4],
                _ => return None,
            },
            _ => return None,
        };
        Some(ExtractSpec::args(counts))
    }
}

/// Every keyword prefix, as it appears in segmented statements.
pub const KEYWORDS: &[(&str, Keyword)] = &[
    ("for(", Keyword::For),
    ("while(", Keyword::While),
    ("break", Keyword::Break),
    ("continue", Keyword::Continue),
    ("if(", Keyword::If),
    ("else", Keyword::Else),
    ("do{", Keyword::Do),
    ("return", Keyword::Return),
    ("function ", Keyword::Function),
    ("ffunction ", Keyword::FFunction),
    ("lfunction ", Keyword::LFunction),
    ("namespace ", Keyword::Namespace),
    ("#include", Keyword::Include),
    ("#profile", Keyword::Profile),
    ("DataSet ", Keyword::DataSet),
    ("DataSetFilter ", Keyword::DataSetFilter),
    ("Tree ", Keyword::Tree),
    ("Topology ", Keyword::Topology),
    ("LikelihoodFunction ", Keyword::LikelihoodFunction),
    ("LikelihoodFunction3 ", Keyword::LikelihoodFunction3),
    ("Model ", Keyword::Model),
    ("category ", Keyword::Category),
    ("SCFG ", Keyword::Scfg),
    ("BayesianGraphicalModel ", Keyword::Bgm),
    ("fscanf(", Keyword::Fscanf),
    ("sscanf(", Keyword::Sscanf),
    ("ChoiceList(", Keyword::ChoiceList),
    ("ExecuteCommands(", Keyword::ExecuteCommands),
    ("ExecuteAFile(", Keyword::ExecuteAFile),
    ("LoadFunctionLibrary(", Keyword::LoadFunctionLibrary),
    ("MPISend(", Keyword::MpiSend),
    ("MPIReceive(", Keyword::MpiReceive),
    ("fprintf(", Keyword::Command(Opcode::Fprintf)),
    ("GetString(", Keyword::Command(Opcode::GetString)),
    ("Export(", Keyword::Command(Opcode::Export)),
    ("assert(", Keyword::Command(Opcode::Assert)),
    ("RequireVersion(", Keyword::Command(Opcode::RequireVersion)),
    ("DeleteObject(", Keyword::Command(Opcode::DeleteObject)),
    ("ClearConstraints(", Keyword::Command(Opcode::ClearConstraints)),
    ("SetDialogPrompt(", Keyword::Command(Opcode::SetDialogPrompt)),
    ("SetParameter(", Keyword::Command(Opcode::SetParameter)),
    ("HarvestFrequencies(", Keyword::Command(Opcode::HarvestFrequencies)),
    ("Optimize(", Keyword::Command(Opcode::Optimize)),
    ("CovarianceMatrix(", Keyword::Command(Opcode::CovarianceMatrix)),
    ("LFCompute(", Keyword::Command(Opcode::LfCompute)),
    ("SelectTemplateModel(", Keyword::Command(Opcode::SelectTemplateModel)),
    ("UseModel(", Keyword::Command(Opcode::UseModel)),
    ("MolecularClock(", Keyword::Command(Opcode::MolecularClock)),
    ("GetURL(", Keyword::Command(Opcode::GetUrl)),
    ("Differentiate(", Keyword::Command(Opcode::Differentiate)),
    ("FindRoot(", Keyword::Command(Opcode::FindRoot)),
    ("Integrate(", Keyword::Command(Opcode::Integrate)),
    ("GetDataInfo(", Keyword::Command(Opcode::GetDataInfo)),
    ("GetInformation(", Keyword::Command(Opcode::GetInformation)),
    ("ReplicateConstraint(", Keyword::Command(Opcode::ReplicateConstraint)),
    ("ConstructCategoryMatrix(", Keyword::Command(Opcode::ConstructCategoryMatrix)),
    ("OpenWindow(", Keyword::Command(Opcode::OpenWindow)),
    ("DoSQL(", Keyword::Command(Opcode::DoSql)),
    ("AlignSequences(", Keyword::Command(Opcode::AlignSequences)),
    ("GetNeutralNull(", Keyword::Command(Opcode::GetNeutralNull)),
    ("StateCounter(", Keyword::Command(Opcode::StateCounter)),
    ("Import(", Keyword::Command(Opcode::Import)),
];

/// A keyword matched at the start of a statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeywordMatch {
    pub keyword: Keyword,
    /// Byte length of the matched prefix.
    pub len: usize,
}

#[derive(Debug, Default)]
struct Node {
    children: SmallVec<[(u8, u32); 4]>,
    value: Option<Keyword>,
    /// The key ends in an identifier character.
    needs_boundary: bool,
}

/// Byte trie over keyword prefixes.
#[derive(Debug)]
pub struct KeywordTrie {
    nodes: Vec<Node>,
}

impl Default for KeywordTrie {
    fn default() -> Self {
        KeywordTrie {
            nodes: vec![Node::default()],
        }
    }
}

impl KeywordTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// The trie over [`KEYWORDS`].
    pub fn standard() -> &'static KeywordTrie {
        static STANDARD: OnceLock<KeywordTrie> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut trie = KeywordTrie::new();
            for &(key, keyword) in KEYWORDS {
                trie.insert(key, keyword);
            }
            trie
        })
    }

    pub fn insert(&mut self, key: &str, keyword: Keyword) {
        let mut at = 0_usize;
        for byte in key.bytes() {
            let next = self.nodes[at]
                .children
                .iter()
                .find(|(b, _)| *b == byte)
                .map(|&(_, child)| child as usize);
            at = match next {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[at].children.push((byte, child as u32));
                    child
                }
            };
        }
        let node = &mut self.nodes[at];
        node.value = Some(keyword);
        node.needs_boundary = key
            .bytes()
            .last()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_');
    }

    /// Longest keyword that prefixes `text` and respects its boundary rule.
    pub fn longest_prefix(&self, text: &str) -> Option<KeywordMatch> {
        let bytes = text.as_bytes();
        let mut at = 0_usize;
        let mut best = None;

        for (i, &byte) in bytes.iter().enumerate() {
            let Some(&(_, child)) = self.nodes[at].children.iter().find(|(b, _)| *b == byte) else {
                break;
            };
            at = child as usize;
            let node = &self.nodes[at];
            if let Some(keyword) = node.value {
                let len = i + 1;
                let continues_ident = bytes
                    .get(len)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_');
                if !(node.needs_boundary && continues_ident) {
                    best = Some(KeywordMatch { keyword, len });
                }
            }
        }
        best
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = KEYWORDS
            .iter()
            .find(|(_, k)| k == self)
            .map_or("?", |(key, _)| key);
        f.write_str(key.trim_end_matches(['(', ' ', '{']))
    }
}
