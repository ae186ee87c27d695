//! Validated value types shared by the order engine.
//!
//! Every type here can only be constructed through a checking constructor, so code that
//! receives one can rely on its shape without re-validating:
//!
//! - [`NonEmptyText`]: trimmed free text with at least one non-whitespace character
//!   (instructions, void reasons).
//! - [`ConceptCode`]: an opaque reference into an external catalog (drug, units, route,
//!   frequency, care setting, order type, reason concepts).
//! - [`NonNegativeDecimal`]: a finite number `>= 0` (dose, dispensed quantity).

use std::fmt;

/// Errors that can occur when creating validated value types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValueError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// A catalog code contained whitespace or control characters
    #[error("Code '{0}' contains whitespace or control characters")]
    InvalidCode(String),
    /// A numeric value was NaN or infinite
    #[error("Number must be finite")]
    NotFinite,
    /// A numeric value was below zero
    #[error("Number must not be negative, got {0}")]
    Negative(f64),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText`, trimming the input.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Empty`] if nothing remains after trimming.
    pub fn new(input: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Opaque reference to an entry in an external catalog.
///
/// The engine never interprets codes; it only compares them for equality. A code is the
/// trimmed input and may not contain inner whitespace, so `"51"` and `" 51 "` are the same
/// reference while `"5 1"` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConceptCode(String);

impl ConceptCode {
    /// Parses a catalog code.
    ///
    /// # Errors
    ///
    /// - [`ValueError::Empty`] if the trimmed input is empty.
    /// - [`ValueError::InvalidCode`] if it contains whitespace or control characters.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty);
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ValueError::InvalidCode(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ConceptCode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConceptCode::parse(s)
    }
}

impl serde::Serialize for ConceptCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ConceptCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ConceptCode::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A finite, non-negative decimal.
///
/// Negative zero is normalised to `0.0` so that equality comparisons between two parsed
/// values behave as a clinician would expect.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct NonNegativeDecimal(f64);

impl NonNegativeDecimal {
    /// # Errors
    ///
    /// - [`ValueError::NotFinite`] for NaN or infinities.
    /// - [`ValueError::Negative`] for values below zero.
    pub fn new(value: f64) -> Result<Self, ValueError> {
        if !value.is_finite() {
            return Err(ValueError::NotFinite);
        }
        if value < 0.0 {
            return Err(ValueError::Negative(value));
        }
        // -0.0 compares equal to 0.0 but prints differently
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for NonNegativeDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for NonNegativeDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonNegativeDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = f64::deserialize(deserializer)?;
        NonNegativeDecimal::new(v).map_err(serde::de::Error::custom)
    }
}
