use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Any JSON scalar the pool schema accepts for ids and answers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(Scalar::into_text)
}

/// Opaque stimulus identifier, kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StimulusId(String);

impl StimulusId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StimulusId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        scalar_text(deserializer).map(StimulusId)
    }
}

impl fmt::Display for StimulusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StimulusId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u32> for StimulusId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

/// A subject response or a stimulus' correct answer.
///
/// Pool files write answers as strings or numbers interchangeably, and
/// hosts usually hand back text from their input widget. The variant
/// records which one was given so [`Answer::loosely_eq`] can compare the
/// way a loose equality between a number and a string does: two texts match
/// only on equal text, a number matches text that reads as the same number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Number(f64),
    Text(String),
}

impl Answer {
    pub fn new(value: impl Into<String>) -> Self {
        Answer::Text(value.into())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Answer::Number(_))
    }

    pub fn loosely_eq(&self, other: &Answer) -> bool {
        match (self, other) {
            (Answer::Text(a), Answer::Text(b)) => a == b,
            (Answer::Number(a), Answer::Number(b)) => a == b,
            (Answer::Number(n), Answer::Text(t)) | (Answer::Text(t), Answer::Number(n)) => {
                text_as_number(t) == Some(*n)
            }
        }
    }
}

/// Numeric reading of text: surrounding whitespace is ignored, blank text
/// reads as zero, and only decimal notation or `Infinity` is accepted.
fn text_as_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if unsigned == "Infinity" {
        let negative = trimmed.starts_with('-');
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }
    let decimal = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !decimal {
        return None;
    }
    trimmed.parse().ok()
}

impl<'de> Deserialize<'de> for Answer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Scalar::deserialize(deserializer)? {
            Scalar::Text(s) => Answer::Text(s),
            Scalar::Integer(i) => Answer::Number(i as f64),
            Scalar::Float(f) => Answer::Number(f),
            Scalar::Flag(b) => Answer::Number(if b { 1.0 } else { 0.0 }),
        })
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Number(n) => write!(f, "{n}"),
            Answer::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Answer {
    fn from(s: &str) -> Self {
        Answer::Text(s.to_string())
    }
}

impl From<String> for Answer {
    fn from(s: String) -> Self {
        Answer::Text(s)
    }
}

impl From<u32> for Answer {
    fn from(n: u32) -> Self {
        Answer::Number(f64::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_match_text_that_reads_as_the_same_number() {
        assert!(Answer::from("2").loosely_eq(&Answer::from(2)));
        assert!(Answer::from(2).loosely_eq(&Answer::from("2.0")));
        assert!(Answer::from(" 3").loosely_eq(&Answer::from(3)));
        assert!(!Answer::from("1").loosely_eq(&Answer::from(2)));
        assert!(!Answer::from("two").loosely_eq(&Answer::from(2)));
        assert!(!Answer::from("0x2").loosely_eq(&Answer::from(2)));
    }

    #[test]
    fn texts_compare_as_text() {
        assert!(Answer::from("left").loosely_eq(&Answer::from("left")));
        assert!(!Answer::from("left").loosely_eq(&Answer::from("right")));
        assert!(!Answer::from("2.0").loosely_eq(&Answer::from("2")));
        assert!(!Answer::from("inf").loosely_eq(&Answer::from("infinity")));
    }

    #[test]
    fn infinity_is_only_read_in_full() {
        assert_eq!(text_as_number("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(text_as_number("inf"), None);
        assert_eq!(text_as_number(""), Some(0.0));
    }

    #[test]
    fn ids_and_answers_accept_json_scalars() {
        let id: StimulusId = serde_json::from_str("17").unwrap();
        assert_eq!(id.as_str(), "17");

        let answer: Answer = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(answer, Answer::from("3"));

        let number: Answer = serde_json::from_str("3").unwrap();
        assert!(number.is_numeric());
        assert_eq!(number.to_string(), "3");

        let flag: Answer = serde_json::from_str("true").unwrap();
        assert_eq!(flag, Answer::Number(1.0));
    }

    #[test]
    fn serializes_in_its_original_form() {
        assert_eq!(serde_json::to_string(&Answer::from(2)).unwrap(), "2.0");
        assert_eq!(serde_json::to_string(&Answer::from("2")).unwrap(), "\"2\"");
    }
}
