//! Serde helpers for big integers.
//!
//! Records written by earlier tooling store commitments and generators as
//! plain JSON integers of 500+ bits. With `serde_json`'s
//! `arbitrary_precision` feature those digits survive a round trip through
//! [`serde_json::Number`], which is what these helpers go through.

use num_bigint::BigUint;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

use crate::math::FieldElement;

fn to_number(value: &BigUint) -> Result<Number, String> {
    value
        .to_str_radix(10)
        .parse::<Number>()
        .map_err(|e| e.to_string())
}

fn from_number(number: &Number) -> Result<BigUint, String> {
    let digits = number.to_string();
    digits
        .parse::<BigUint>()
        .map_err(|_| format!("expected a non-negative integer, got {digits}"))
}

/// `#[serde(with = "biguint")]` for a single decimal integer.
pub mod biguint {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        to_number(value)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let number = Number::deserialize(deserializer)?;
        from_number(&number).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "biguint_seq")]` for a list of decimal integers.
pub mod biguint_seq {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[BigUint], serializer: S) -> Result<S::Ok, S::Error> {
        let numbers = values
            .iter()
            .map(to_number)
            .collect::<Result<Vec<_>, _>>()
            .map_err(S::Error::custom)?;
        numbers.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigUint>, D::Error> {
        Vec::<Number>::deserialize(deserializer)?
            .iter()
            .map(from_number)
            .collect::<Result<Vec<_>, _>>()
            .map_err(D::Error::custom)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        biguint::serialize(self.as_biguint(), serializer)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = biguint::deserialize(deserializer)?;
        FieldElement::from_canonical(value)
            .ok_or_else(|| D::Error::custom("field element is not below the field prime"))
    }
}
