//! Data structure composition
//!
//! Named, ordered aggregates of parameters and nested structures. Member
//! order is the byte order on the wire; decoding walks members by declared
//! width and never relies on tags inside the packed bytes.

mod layout;
pub mod templates;

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::param::{IoDirection, ParameterDescriptor, Value};

pub use layout::{
    check_parameter_list, collect_length_labels, decode_member, encode_member, LengthLabels,
};
pub use templates::ErrorPolicy;

/// A parameter list element: scalar or aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Param(ParameterDescriptor),
    Structure(DataStructure),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Param(p) => p.name(),
            Member::Structure(s) => s.name(),
        }
    }

    pub fn io(&self) -> IoDirection {
        match self {
            Member::Param(p) => p.io(),
            Member::Structure(s) => s.io(),
        }
    }

    pub fn dimension(&self) -> u32 {
        match self {
            Member::Param(p) => p.dimension(),
            Member::Structure(s) => s.dimension(),
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Member::Param(p) if p.is_hole())
    }

    /// Bytes of all occurrences
    pub fn byte_width(&self) -> usize {
        match self {
            Member::Param(p) => p.byte_width(),
            Member::Structure(s) => s.byte_width(),
        }
    }

    /// Zero value with this member's shape
    pub fn zero_value(&self) -> Value {
        match self {
            Member::Param(p) => p.zero_value(),
            Member::Structure(s) => Value::Record(
                s.members()
                    .iter()
                    .filter(|m| !m.is_hole())
                    .map(|m| (m.name().to_string(), m.zero_value()))
                    .collect(),
            ),
        }
    }
}

impl From<ParameterDescriptor> for Member {
    fn from(value: ParameterDescriptor) -> Self {
        Member::Param(value)
    }
}

impl From<DataStructure> for Member {
    fn from(value: DataStructure) -> Self {
        Member::Structure(value)
    }
}

/// Named ordered aggregate, optionally repeated
#[derive(Debug, Clone, PartialEq)]
pub struct DataStructure {
    name: String,
    members: Vec<Member>,
    dimension: u32,
    io: IoDirection,
    comment: String,
    length_label: Option<String>,
    captures_errors: bool,
}

impl DataStructure {
    /// Create a structure; member names must be unique and non-empty
    pub fn new(name: impl Into<String>, members: Vec<Member>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("data structure".to_string()));
        }
        check_unique_names(&format!("structure '{}'", name), &members)?;
        Ok(Self::fixed(name, members))
    }

    /// Structure with members known to be well formed
    pub(crate) fn fixed(name: impl Into<String>, members: Vec<Member>) -> Self {
        Self {
            name: name.into(),
            members,
            dimension: 0,
            io: IoDirection::Both,
            comment: String::new(),
            length_label: None,
            captures_errors: false,
        }
    }

    /// Lay the member list out `dimension` times; 0 is a single occurrence
    pub fn with_dimension(mut self, dimension: u32) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_io(mut self, io: IoDirection) -> Self {
        self.io = io;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Label whose byte width integer parameters can reference
    pub fn with_length_label(mut self, label: impl Into<String>) -> Self {
        self.length_label = Some(label.into());
        self
    }

    /// Mark as an error-code structure whose exception fields are surfaced
    pub(crate) fn capturing_errors(mut self) -> Self {
        self.captures_errors = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn io(&self) -> IoDirection {
        self.io
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn length_label(&self) -> Option<&str> {
        self.length_label.as_deref()
    }

    pub fn captures_errors(&self) -> bool {
        self.captures_errors
    }

    /// Bytes of one occurrence
    pub fn occurrence_width(&self) -> usize {
        self.members.iter().map(Member::byte_width).sum()
    }

    /// Bytes of all occurrences
    pub fn byte_width(&self) -> usize {
        self.occurrence_width() * self.dimension.max(1) as usize
    }
}

/// Reject empty or repeated names within one scope
pub fn check_unique_names(scope: &str, members: &[Member]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for member in members {
        if member.name().is_empty() {
            return Err(ValidationError::EmptyName(scope.to_string()));
        }
        if !seen.insert(member.name()) {
            return Err(ValidationError::DuplicateName {
                name: member.name().to_string(),
                scope: scope.to_string(),
            });
        }
    }
    Ok(())
}
