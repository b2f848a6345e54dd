//! Call manifests
//!
//! A manifest is a JSON description of one program call: the target, its
//! collection, and the parameter list with initial values. It is how the
//! CLI describes calls without Rust code. Every parameter goes through the
//! same validating constructors a library caller would use.
//!
//! ```json
//! {
//!   "program": "QRCVDTAQ",
//!   "collection": "QSYS",
//!   "params": [
//!     { "name": "queue", "type": "char", "size": 10, "io": "in", "value": "ORDERS" },
//!     { "name": "length", "type": "packed", "length": 5, "io": "out" },
//!     { "type": "error_code" }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::ValidationError;
use crate::param::{dimension_from_i64, ByteOrder, IoDirection, ParameterDescriptor, Varying};
use crate::request::{CallOptions, CallRequest};
use crate::structure::{DataStructure, ErrorPolicy, Member};

/// Errors while loading a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One program call as described on disk
#[derive(Debug, Clone, Deserialize)]
pub struct CallManifest {
    pub program: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

/// One parameter list element
#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub io: IoDirection,
    #[serde(default)]
    pub comment: String,
    /// Occurrence count; signed so a negative count is reported, not rejected by the parser
    #[serde(default)]
    pub dim: i64,
    #[serde(flatten)]
    pub kind: KindSpec,
}

/// Type-specific part of a parameter
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindSpec {
    Char {
        size: u32,
        #[serde(default)]
        value: String,
        #[serde(default)]
        varying: Varying,
        /// `value` holds hex bytes transferred verbatim
        #[serde(default)]
        hex: bool,
        #[serde(default)]
        before: Option<String>,
        #[serde(default)]
        after: Option<String>,
    },
    Int {
        bits: u8,
        #[serde(default)]
        value: i64,
        #[serde(default)]
        byte_order: ByteOrder,
        #[serde(default)]
        length_of: Option<String>,
    },
    Uint {
        bits: u8,
        #[serde(default)]
        value: u64,
        #[serde(default)]
        byte_order: ByteOrder,
        #[serde(default)]
        length_of: Option<String>,
    },
    Float {
        #[serde(default)]
        value: f32,
        #[serde(default)]
        byte_order: ByteOrder,
    },
    Real {
        #[serde(default)]
        value: f64,
        #[serde(default)]
        byte_order: ByteOrder,
    },
    Packed {
        length: u8,
        #[serde(default)]
        scale: u8,
        #[serde(default)]
        value: Option<String>,
    },
    Zoned {
        length: u8,
        #[serde(default)]
        scale: u8,
        #[serde(default)]
        value: Option<String>,
    },
    Binary {
        size: u32,
        /// Hex encoded initial bytes
        #[serde(default)]
        value: String,
    },
    Hole {
        size: u32,
    },
    Struct {
        members: Vec<ParamSpec>,
        #[serde(default)]
        label: Option<String>,
    },
    /// The error-code structure selected by configuration
    ErrorCode,
}

impl CallManifest {
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validated parameter list
    pub fn members(&self, policy: ErrorPolicy) -> Result<Vec<Member>, ManifestError> {
        self.params
            .iter()
            .map(|spec| spec.to_member(policy).map_err(ManifestError::from))
            .collect()
    }

    pub fn options(&self) -> CallOptions {
        match self.entry_point.as_deref() {
            Some(entry) => CallOptions::entry_point(entry),
            None => CallOptions::default(),
        }
    }

    /// Validated call request; `default_collection` applies when the manifest names none
    pub fn to_request(
        &self,
        policy: ErrorPolicy,
        default_collection: &str,
    ) -> Result<CallRequest, ManifestError> {
        let collection = if self.collection.trim().is_empty() {
            default_collection
        } else {
            self.collection.as_str()
        };
        let request = CallRequest::new(&self.program, collection, self.members(policy)?)?
            .with_options(self.options());
        Ok(request)
    }
}

impl ParamSpec {
    fn to_member(&self, policy: ErrorPolicy) -> Result<Member, ValidationError> {
        let name = self.name.as_str();
        let io = self.io;
        let dim = dimension_from_i64(name, self.dim)?;

        let descriptor = match &self.kind {
            KindSpec::ErrorCode => return Ok(Member::Structure(policy.structure())),
            KindSpec::Struct { members, label } => {
                let members = members
                    .iter()
                    .map(|m| m.to_member(policy))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut structure = DataStructure::new(name, members)?
                    .with_dimension(dim)
                    .with_io(io)
                    .with_comment(self.comment.as_str());
                if let Some(label) = label {
                    structure = structure.with_length_label(label.as_str());
                }
                return Ok(Member::Structure(structure));
            }
            KindSpec::Char {
                size,
                value,
                varying,
                hex,
                before,
                after,
            } => {
                let descriptor = if *hex {
                    ParameterDescriptor::char_hex(io, name, *size, value)?
                } else {
                    ParameterDescriptor::char(io, name, *size, value.as_str())?
                };
                descriptor
                    .with_varying(*varying)?
                    .with_encodings(before.clone(), after.clone())?
            }
            KindSpec::Int {
                bits,
                value,
                byte_order,
                length_of,
            } => {
                let descriptor =
                    ParameterDescriptor::signed(io, name, *bits, *value)?.with_byte_order(*byte_order)?;
                match length_of {
                    Some(label) => descriptor.with_length_of(label.as_str())?,
                    None => descriptor,
                }
            }
            KindSpec::Uint {
                bits,
                value,
                byte_order,
                length_of,
            } => {
                let descriptor = ParameterDescriptor::unsigned(io, name, *bits, *value)?
                    .with_byte_order(*byte_order)?;
                match length_of {
                    Some(label) => descriptor.with_length_of(label.as_str())?,
                    None => descriptor,
                }
            }
            KindSpec::Float { value, byte_order } => {
                ParameterDescriptor::float(io, name, *value)?.with_byte_order(*byte_order)?
            }
            KindSpec::Real { value, byte_order } => {
                ParameterDescriptor::real(io, name, *value)?.with_byte_order(*byte_order)?
            }
            KindSpec::Packed {
                length,
                scale,
                value,
            } => ParameterDescriptor::packed(io, name, *length, *scale, value.as_deref().unwrap_or("0"))?,
            KindSpec::Zoned {
                length,
                scale,
                value,
            } => ParameterDescriptor::zoned(io, name, *length, *scale, value.as_deref().unwrap_or("0"))?,
            KindSpec::Binary { size, value } => {
                let bytes = hex::decode(value).map_err(|e| ValidationError::InvalidValue {
                    name: name.to_string(),
                    reason: format!("bad hex: {}", e),
                })?;
                ParameterDescriptor::binary(io, name, *size, bytes)?
            }
            KindSpec::Hole { size } => ParameterDescriptor::hole(name, *size),
        };

        Ok(Member::Param(
            descriptor
                .with_dimension(dim)
                .with_comment(self.comment.as_str()),
        ))
    }
}
