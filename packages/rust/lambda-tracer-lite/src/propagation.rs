//! X-Ray trace header handling.
//!
//! The Lambda runtime hands every invocation an X-Ray trace header, either on
//! the invocation context or through the `_X_AMZN_TRACE_ID` environment
//! variable. The tracer derives the transaction id from its `Root` and lets
//! HTTP adapters forward a child header on outgoing requests so downstream
//! functions join the same transaction.

use crate::{constants::env_vars, logger::Logger};
use lambda_runtime::Context;
use std::{env, fmt, str::FromStr};

static LOGGER: Logger = Logger::const_new("propagation");

/// Header name used for X-Ray propagation over HTTP.
pub const AWS_XRAY_TRACE_HEADER: &str = "x-amzn-trace-id";

/// Parsed `Root=...;Parent=...;Sampled=...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    /// e.g. `1-5759e988-bd862e3fe1be46a994272793`
    pub root: String,
    pub parent: Option<String>,
    pub sampled: Option<bool>,
}

impl TraceHeader {
    const ROOT: &'static str = "Root";
    const PARENT: &'static str = "Parent";
    const SAMPLED: &'static str = "Sampled";
    const DELIMITER: char = ';';

    /// Header of the current invocation: the context first, then the environment.
    pub fn for_invocation(context: &Context) -> Option<Self> {
        let raw = context
            .xray_trace_id
            .clone()
            .or_else(|| env::var(env_vars::AMZN_TRACE_ID).ok())?;
        match raw.parse() {
            Ok(header) => Some(header),
            Err(err) => {
                LOGGER.debug(format!("ignoring trace header {:?}: {}", raw, err));
                None
            }
        }
    }

    /// Transaction id: the random part of the root (`1-{time}-{random}`).
    pub fn transaction_id(&self) -> &str {
        self.root.splitn(3, '-').nth(2).unwrap_or(self.root.as_str())
    }

    /// Header for an outgoing call made from the span `span_id`.
    pub fn child_header(&self, span_id: &str) -> String {
        let parent: String = span_id
            .chars()
            .filter(char::is_ascii_hexdigit)
            .take(16)
            .collect::<String>()
            .to_lowercase();
        let parent = format!("{:0<16}", parent);

        let mut header = format!("{}={};{}={}", Self::ROOT, self.root, Self::PARENT, parent);
        if let Some(sampled) = self.sampled {
            header.push_str(&format!(";{}={}", Self::SAMPLED, u8::from(sampled)));
        }
        header
    }
}

impl FromStr for TraceHeader {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut root = None;
        let mut parent = None;
        let mut sampled = None;

        for (key, value) in s
            .split(Self::DELIMITER)
            .filter_map(|part| part.trim().split_once('='))
        {
            match key {
                Self::ROOT => root = Some(value.to_string()),
                Self::PARENT => parent = Some(value.to_string()),
                Self::SAMPLED => {
                    sampled = match value {
                        "0" => Some(false),
                        "1" => Some(true),
                        // "?" means the decision is deferred
                        _ => None,
                    }
                }
                // Lineage and vendor keys are carried by the runtime but unused here
                _ => {}
            }
        }

        let root = root.ok_or_else(|| "missing Root".to_string())?;
        if root.split('-').count() != 3 {
            return Err(format!("malformed Root {:?}", root));
        }
        Ok(Self {
            root,
            parent,
            sampled,
        })
    }
}

impl fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", Self::ROOT, self.root)?;
        if let Some(parent) = &self.parent {
            write!(f, ";{}={}", Self::PARENT, parent)?;
        }
        if let Some(sampled) = self.sampled {
            write!(f, ";{}={}", Self::SAMPLED, u8::from(sampled))?;
        }
        Ok(())
    }
}

/// Transaction id for an invocation, random when no trace header is available.
pub fn transaction_id(header: Option<&TraceHeader>) -> String {
    header
        .map(|header| header.transaction_id().to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const HEADER: &str = "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1";

    #[test]
    fn test_parse() {
        let header: TraceHeader = HEADER.parse().unwrap();
        assert_eq!(header.root, "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(header.parent.as_deref(), Some("53995c3f42cd8ad8"));
        assert_eq!(header.sampled, Some(true));
        assert_eq!(header.transaction_id(), "bd862e3fe1be46a994272793");
        assert_eq!(header.to_string(), HEADER);
    }

    #[test]
    fn test_parse_with_lineage_and_no_parent() {
        let header: TraceHeader = "Root=1-5759e988-bd862e3fe1be46a994272793;Lineage=a87bd80c:0"
            .parse()
            .unwrap();
        assert!(header.parent.is_none());
        assert!(header.sampled.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<TraceHeader>().is_err());
        assert!("Parent=53995c3f42cd8ad8".parse::<TraceHeader>().is_err());
        assert!("Root=garbage".parse::<TraceHeader>().is_err());
    }

    #[test]
    fn test_child_header() {
        let header: TraceHeader = HEADER.parse().unwrap();
        let child = header.child_header("0f3c1e2a-9b7d-4c11-8e55-2f6a7b8c9d0e");
        assert_eq!(
            child,
            "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=0f3c1e2a9b7d4c11;Sampled=1"
        );
    }

    #[test]
    #[serial]
    fn test_transaction_id_sources() {
        env::remove_var(env_vars::AMZN_TRACE_ID);
        let id_for =
            |context: &Context| transaction_id(TraceHeader::for_invocation(context).as_ref());

        let mut context = Context::default();
        context.xray_trace_id = Some(HEADER.to_string());
        assert_eq!(id_for(&context), "bd862e3fe1be46a994272793");

        context.xray_trace_id = None;
        env::set_var(
            env_vars::AMZN_TRACE_ID,
            "Root=1-65a1b2c3-000000000000000000000abc;Sampled=0",
        );
        assert_eq!(id_for(&context), "000000000000000000000abc");

        env::remove_var(env_vars::AMZN_TRACE_ID);
        let random = id_for(&context);
        assert_eq!(random.len(), 32);
        assert_ne!(random, id_for(&context));
    }
}
