//! Core data model.
//!
//! A job descriptor is what producers push: a handler class plus an ordered
//! list of primitive arguments. Its serialized JSON form is the unit stored
//! in a queue, and the exact string is what gets removed once the job ran.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// A primitive job argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for Arg {
    /// Plain rendering used when building default lock names: strings are
    /// unquoted and null renders as the empty string. Floats keep their
    /// decimal point, so `1.0` and `1` give different names.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Null => Ok(()),
            Arg::Bool(b) => write!(f, "{b}"),
            Arg::Int(n) => write!(f, "{n}"),
            Arg::Float(x) => write!(f, "{x:?}"),
            Arg::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Int(n)
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Arg::Int(n.into())
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<f64> for Arg {
    fn from(x: f64) -> Self {
        Arg::Float(x)
    }
}

// ---------------------------------------------------------------------------
// Job Descriptor
// ---------------------------------------------------------------------------

/// What a producer enqueues: which handler to run, and with what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Handler identity, looked up in the [`HandlerRegistry`](crate::handler::HandlerRegistry).
    pub class: String,

    /// Ordered arguments passed to the handler.
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl JobDescriptor {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Serialize to the form stored in a queue.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a queue entry.
    pub fn from_payload(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

// ---------------------------------------------------------------------------
// Job (reservation)
// ---------------------------------------------------------------------------

/// A reserved job: a descriptor taken from a named queue.
///
/// `payload` keeps the exact string read from the queue so that removal
/// matches the stored entry byte for byte, whatever encoder the producer used.
#[derive(Debug, Clone)]
pub struct Job {
    pub queue: String,
    pub descriptor: JobDescriptor,
    pub payload: String,
    /// When the lock was claimed; release logs how long it was held.
    pub reserved_at: DateTime<Utc>,
}

impl Job {
    /// Build a reservation from a raw queue entry.
    pub fn new(queue: impl Into<String>, payload: impl Into<String>) -> Result<Self> {
        let payload = payload.into();
        let descriptor = JobDescriptor::from_payload(&payload)?;
        Ok(Self {
            queue: queue.into(),
            descriptor,
            payload,
            reserved_at: Utc::now(),
        })
    }

    pub fn class(&self) -> &str {
        &self.descriptor.class
    }

    pub fn args(&self) -> &[Arg] {
        &self.descriptor.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_keeps_class_and_argument_order() {
        let desc = JobDescriptor::new("Resize").arg("a.png").arg(42).arg(true);
        let payload = desc.to_payload().unwrap();
        assert_eq!(payload, r#"{"class":"Resize","args":["a.png",42,true]}"#);
        assert_eq!(JobDescriptor::from_payload(&payload).unwrap(), desc);
    }

    #[test]
    fn missing_args_decode_as_empty() {
        let desc = JobDescriptor::from_payload(r#"{"class":"Ping"}"#).unwrap();
        assert_eq!(desc.class, "Ping");
        assert!(desc.args.is_empty());
    }

    #[test]
    fn arg_display_is_plain_text() {
        assert_eq!(Arg::from("bar").to_string(), "bar");
        assert_eq!(Arg::from(42).to_string(), "42");
        assert_eq!(Arg::Null.to_string(), "");
        assert_eq!(Arg::from(false).to_string(), "false");
        assert_eq!(Arg::from(1.0).to_string(), "1.0");
        assert_eq!(Arg::from(2.5).to_string(), "2.5");
    }

    #[test]
    fn whole_float_decodes_as_float() {
        let desc = JobDescriptor::from_payload(r#"{"class":"X","args":[1,1.0]}"#).unwrap();
        assert_eq!(desc.args, vec![Arg::Int(1), Arg::Float(1.0)]);
    }

    #[test]
    fn job_keeps_raw_payload() {
        // Whitespace differs from our encoder; removal must use the raw form.
        let raw = r#"{ "class": "X", "args": ["a"] }"#;
        let job = Job::new("q", raw).unwrap();
        assert_eq!(job.payload, raw);
        assert_eq!(job.class(), "X");
        assert_eq!(job.args(), &[Arg::from("a")]);
        assert!(job.reserved_at <= Utc::now());
    }

    #[test]
    fn malformed_payload_is_codec_error() {
        let err = Job::new("q", "not json {{{").unwrap_err();
        assert!(matches!(err, crate::error::Error::Codec(_)));
    }
}
