use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(ClientId);
string_newtype!(UserHandle);

impl ClientId {
    /// Trims surrounding whitespace and rejects an empty identifier.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyClientId);
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// One classification entry returned by the analyze endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    /// Percentage in `[0, 100]` as reported by the endpoint.
    pub confidence: f64,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }

    /// One decimal place, exact ties rounded away from zero.
    pub fn formatted_confidence(&self) -> String {
        format!("{:.1}%", round_tenths(self.confidence))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.formatted_confidence())
    }
}

/// `{:.1}` rounds an exact tie to even. A double sits exactly halfway between
/// two tenths only when its fractional part is .25 or .75 (odd quarters);
/// those are rounded away from zero, everything else is left to the formatter.
fn round_tenths(value: f64) -> f64 {
    let quarters = value * 4.0;
    let is_tie = quarters.is_finite() && quarters.fract() == 0.0 && quarters % 2.0 != 0.0;
    if is_tie {
        (value * 10.0).round() / 10.0
    } else {
        value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub labels: Vec<Label>,
}

/// An image selected for analysis, read fully into memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}
