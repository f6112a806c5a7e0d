//! Query text grammar
//!
//! A query is whitespace-tokenized: the first token names the operation,
//! every following token is `key=value` with the value percent-decoded.
//! Repeated `qualifier=` and `value=` tokens accumulate in positional
//! order; repeated `family=` tokens accumulate for CREATE. Unknown keys
//! fail the request.
//!
//! ```text
//! write key=champ:1 family=champions qualifier=titles value=15
//! read prefix=user:12 family=profile latest=2
//! delete key=champ:1 family=champions qualifier=titles ttl=3600
//! create family=champions family=profile
//! ```

use celltable_core::{Error, Result};

/// Operation selected by a query's first token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperation {
    /// Register column families.
    Create,
    /// Append cell values.
    Write,
    /// Point lookup or row scan.
    Read,
    /// Tombstone placement.
    Delete,
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// The operation.
    pub operation: QueryOperation,
    /// The raw query text, as received (recorded to the WAL for mutations).
    pub raw: String,
    /// `key=` exact row key.
    pub row_key: Option<String>,
    /// `prefix=` row-key prefix scan.
    pub prefix: Option<String>,
    /// `regex=` row-key pattern scan.
    pub regex: Option<String>,
    /// `family=` tokens in order (one expected except for CREATE).
    pub families: Vec<String>,
    /// `qualifier=` tokens in positional order.
    pub qualifiers: Vec<String>,
    /// `value=` tokens in positional order, as raw bytes.
    pub values: Vec<Vec<u8>>,
    /// `timestamp=` caller-supplied nanoseconds.
    pub timestamp: Option<i64>,
    /// `ttl=` seconds.
    pub ttl: Option<i64>,
    /// `latest=` cap on live values returned per qualifier (0 = all).
    pub latest: usize,
}

impl Query {
    /// Parse raw query text.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut tokens = raw.split_whitespace();
        let op_token = tokens
            .next()
            .ok_or_else(|| Error::InvalidArgument("empty query".to_string()))?;

        let operation = match op_token.to_ascii_lowercase().as_str() {
            "create" => QueryOperation::Create,
            "write" => QueryOperation::Write,
            "read" => QueryOperation::Read,
            "delete" => QueryOperation::Delete,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown operation '{other}'"
                )))
            }
        };

        let mut query = Query {
            operation,
            raw: raw.to_string(),
            row_key: None,
            prefix: None,
            regex: None,
            families: Vec::new(),
            qualifiers: Vec::new(),
            values: Vec::new(),
            timestamp: None,
            ttl: None,
            latest: 0,
        };

        for token in tokens {
            let (key, encoded) = token.split_once('=').ok_or_else(|| {
                Error::InvalidArgument(format!("malformed token '{token}', expected key=value"))
            })?;
            let decoded = percent_decode(encoded)?;

            match key {
                "value" => {
                    query.values.push(decoded);
                    continue;
                }
                _ => {}
            }

            let text = String::from_utf8(decoded).map_err(|_| {
                Error::InvalidArgument(format!("parameter '{key}' is not valid UTF-8"))
            })?;
            match key {
                "key" => query.row_key = Some(text),
                "prefix" => query.prefix = Some(text),
                "regex" => query.regex = Some(text),
                "family" => query.families.push(text),
                "qualifier" => query.qualifiers.push(text),
                "timestamp" => {
                    let ts: i64 = text.parse().map_err(|_| {
                        Error::InvalidArgument(format!("bad timestamp '{text}'"))
                    })?;
                    if ts <= 0 {
                        return Err(Error::InvalidArgument(format!(
                            "timestamp must be positive, got {ts}"
                        )));
                    }
                    query.timestamp = Some(ts);
                }
                "ttl" => {
                    let ttl: i64 = text
                        .parse()
                        .map_err(|_| Error::InvalidArgument(format!("bad ttl '{text}'")))?;
                    if ttl < 0 {
                        return Err(Error::InvalidArgument(format!(
                            "ttl must not be negative, got {ttl}"
                        )));
                    }
                    query.ttl = Some(ttl);
                }
                "latest" => {
                    let latest: i64 = text
                        .parse()
                        .map_err(|_| Error::InvalidArgument(format!("bad latest '{text}'")))?;
                    if latest < 0 {
                        return Err(Error::InvalidArgument(format!(
                            "latest must not be negative, got {latest}"
                        )));
                    }
                    query.latest = latest as usize;
                }
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "unknown parameter '{other}'"
                    )))
                }
            }
        }

        Ok(query)
    }

    /// The single family for non-CREATE operations, if exactly one was given.
    pub fn single_family(&self) -> Result<Option<&str>> {
        match self.families.len() {
            0 => Ok(None),
            1 => Ok(Some(self.families[0].as_str())),
            n => Err(Error::InvalidArgument(format!(
                "expected one family, got {n}"
            ))),
        }
    }
}

/// Decode `%XX` escapes. `+` is a literal plus, not a space.
fn percent_decode(encoded: &str) -> Result<Vec<u8>> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = encoded.get(i + 1..i + 3).ok_or_else(|| {
                    Error::InvalidArgument(format!("truncated percent escape in '{encoded}'"))
                })?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| {
                    Error::InvalidArgument(format!("bad percent escape '%{hex}'"))
                })?;
                out.push(byte);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write() {
        let q = Query::parse("write key=champ:1 family=champions qualifier=titles value=15")
            .unwrap();
        assert_eq!(q.operation, QueryOperation::Write);
        assert_eq!(q.row_key.as_deref(), Some("champ:1"));
        assert_eq!(q.single_family().unwrap(), Some("champions"));
        assert_eq!(q.qualifiers, vec!["titles"]);
        assert_eq!(q.values, vec![b"15".to_vec()]);
    }

    #[test]
    fn repeated_qualifier_value_accumulate_in_order() {
        let q = Query::parse(
            "write key=r family=f qualifier=a value=1 qualifier=b value=2 qualifier=c value=3",
        )
        .unwrap();
        assert_eq!(q.qualifiers, vec!["a", "b", "c"]);
        assert_eq!(q.values, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn percent_decoding() {
        let q = Query::parse("write key=r%20k family=f qualifier=q value=a%3Db%20c").unwrap();
        assert_eq!(q.row_key.as_deref(), Some("r k"));
        assert_eq!(q.values[0], b"a=b c".to_vec());
    }

    #[test]
    fn plus_is_literal() {
        let q = Query::parse("write key=a+b family=f qualifier=q value=1+2").unwrap();
        assert_eq!(q.row_key.as_deref(), Some("a+b"));
        assert_eq!(q.values[0], b"1+2".to_vec());
    }

    #[test]
    fn malformed_escape_fails() {
        assert!(Query::parse("read key=a%2 family=f").is_err());
        assert!(Query::parse("read key=a%zz family=f").is_err());
    }

    #[test]
    fn unknown_operation_rejected() {
        let err = Query::parse("upsert key=r").unwrap_err();
        assert!(err.is_invalid());
    }

    #[test]
    fn empty_query_rejected() {
        assert!(Query::parse("   ").is_err());
    }

    #[test]
    fn unknown_parameter_rejected() {
        let err = Query::parse("read key=r family=f shard=3").unwrap_err();
        assert!(err.is_invalid());
    }

    #[test]
    fn token_without_equals_rejected() {
        assert!(Query::parse("read key=r family").is_err());
    }

    #[test]
    fn operation_is_case_insensitive() {
        assert_eq!(
            Query::parse("READ key=r family=f").unwrap().operation,
            QueryOperation::Read
        );
        assert_eq!(
            Query::parse("Write key=r family=f qualifier=q value=v")
                .unwrap()
                .operation,
            QueryOperation::Write
        );
    }

    #[test]
    fn numeric_parameters() {
        let q = Query::parse("read key=r family=f latest=2").unwrap();
        assert_eq!(q.latest, 2);

        let q = Query::parse("delete key=r family=f ttl=60 timestamp=5").unwrap();
        assert_eq!(q.ttl, Some(60));
        assert_eq!(q.timestamp, Some(5));
    }

    #[test]
    fn negative_latest_rejected() {
        assert!(Query::parse("read key=r family=f latest=-1").is_err());
    }

    #[test]
    fn bad_timestamp_rejected() {
        assert!(Query::parse("write key=r family=f qualifier=q value=v timestamp=abc").is_err());
        assert!(Query::parse("write key=r family=f qualifier=q value=v timestamp=0").is_err());
    }

    #[test]
    fn create_accumulates_families() {
        let q = Query::parse("create family=a family=b").unwrap();
        assert_eq!(q.operation, QueryOperation::Create);
        assert_eq!(q.families, vec!["a", "b"]);
        assert!(q.single_family().is_err());
    }

    #[test]
    fn raw_text_is_preserved() {
        let raw = "write key=r family=f qualifier=q value=v";
        assert_eq!(Query::parse(raw).unwrap().raw, raw);
    }

    #[test]
    fn empty_value_allowed() {
        let q = Query::parse("write key=r family=f qualifier=q value=").unwrap();
        assert_eq!(q.values, vec![Vec::<u8>::new()]);
    }
}
