//! Invocation request decoding.
//!
//! ```text
//! <Invoke>
//!   <Resource registry="app">app:type=Pool,name=main</Resource>
//!   <Operation name="resize">
//!     <Parameter name="size" type="int">16</Parameter>
//!   </Operation>
//! </Invoke>
//! ```
//!
//! The `registry` attribute and parameter names are optional. Unknown
//! attributes and elements are ignored.

use std::io::Read;

use mxgate_core::{parse_element, NamePattern, XmlElement};

use crate::error::GatewayError;

pub const INVOKE_TAG: &str = "Invoke";
pub const RESOURCE_TAG: &str = "Resource";
pub const OPERATION_TAG: &str = "Operation";
pub const PARAMETER_TAG: &str = "Parameter";

/// One decoded parameter: raw text plus its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: Option<String>,
    pub type_name: String,
    pub value: String,
}

impl ParameterSpec {
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: None,
            type_name: type_name.into(),
            value: value.into(),
        }
    }
}

/// A decoded invocation request. Immutable once decoded.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Glob over registry ids; `None` means every registry.
    pub registry: Option<String>,
    pub resource: NamePattern,
    pub operation: String,
    pub parameters: Vec<ParameterSpec>,
}

/// Decodes invocation requests under an absolute length cap.
#[derive(Debug, Clone, Copy)]
pub struct InvocationRequestDecoder {
    max_length: usize,
}

impl InvocationRequestDecoder {
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Reads exactly `declared_length` characters from `body` and decodes
    /// them. Characters past the declared length are discarded.
    ///
    /// # Errors
    ///
    /// In order of checking: `RequestEmpty` for a missing body or a zero
    /// length, `RequestMalformed` for a negative length, `RequestTooLarge`
    /// above the cap, `RequestTruncated` when the body is shorter than
    /// declared, and `RequestMalformed` for any structural problem.
    pub fn decode<R: Read>(
        &self,
        body: Option<R>,
        declared_length: i64,
    ) -> Result<InvocationRequest, GatewayError> {
        let Some(body) = body else {
            return Err(GatewayError::RequestEmpty("no request body".to_string()));
        };
        let length = self.validate_length(declared_length)?;
        let text = read_chars(body, length)?;
        decode_document(&text)
    }

    fn validate_length(&self, declared: i64) -> Result<usize, GatewayError> {
        if declared == 0 {
            return Err(GatewayError::RequestEmpty("declared length is zero".to_string()));
        }
        let length = usize::try_from(declared).map_err(|_| {
            GatewayError::RequestMalformed(format!("declared length {declared} is negative"))
        })?;
        if length > self.max_length {
            return Err(GatewayError::RequestTooLarge {
                declared,
                max: self.max_length,
            });
        }
        Ok(length)
    }
}

/// Reads the first `length` characters of `body`.
fn read_chars<R: Read>(body: R, length: usize) -> Result<String, GatewayError> {
    // A character is at most four bytes, so this always covers `length`
    // characters when they are present.
    let byte_budget = u64::try_from(length.saturating_mul(4)).unwrap_or(u64::MAX);
    let mut bytes = Vec::with_capacity(length);
    body.take(byte_budget)
        .read_to_end(&mut bytes)
        .map_err(|err| GatewayError::RequestMalformed(format!("reading request body: {err}")))?;

    let decoded = utf8_prefix(&bytes, length)?;
    let text: String = decoded.chars().take(length).collect();
    let available = text.chars().count();
    if available < length {
        return Err(GatewayError::RequestTruncated {
            declared: length,
            available,
        });
    }
    Ok(text)
}

/// Longest valid UTF-8 prefix of `bytes`.
///
/// A sequence cut off at the end of the buffer is dropped. An invalid byte
/// is an error unless the valid text before it already holds `length`
/// characters.
fn utf8_prefix(bytes: &[u8], length: usize) -> Result<&str, GatewayError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            let prefix = std::str::from_utf8(&bytes[..err.valid_up_to()])
                .map_err(|_| malformed("request body is not valid UTF-8"))?;
            if err.error_len().is_some() && prefix.chars().count() < length {
                return Err(malformed(format!(
                    "request body is not valid UTF-8 at byte {}",
                    err.valid_up_to()
                )));
            }
            Ok(prefix)
        }
    }
}

fn malformed(reason: impl Into<String>) -> GatewayError {
    GatewayError::RequestMalformed(reason.into())
}

/// Exactly one child named `name`.
fn single_child<'a>(parent: &'a XmlElement, name: &str) -> Result<&'a XmlElement, GatewayError> {
    let mut matches = parent.children.iter().filter(|c| c.name == name);
    let first = matches
        .next()
        .ok_or_else(|| malformed(format!("missing <{name}> element")))?;
    if matches.next().is_some() {
        return Err(malformed(format!("more than one <{name}> element")));
    }
    Ok(first)
}

fn decode_document(text: &str) -> Result<InvocationRequest, GatewayError> {
    let root = parse_element(text).map_err(|err| malformed(err.to_string()))?;
    if root.name != INVOKE_TAG {
        return Err(malformed(format!(
            "expected <{INVOKE_TAG}> root element, found <{}>",
            root.name
        )));
    }

    let resource_el = single_child(&root, RESOURCE_TAG)?;
    let identity = resource_el.text.trim();
    if identity.is_empty() {
        return Err(malformed("empty <Resource> element"));
    }
    let resource = NamePattern::parse(identity)
        .map_err(|err| malformed(format!("resource {identity:?}: {err}")))?;
    let registry = resource_el
        .attr("registry")
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let operation_el = single_child(&root, OPERATION_TAG)?;
    let operation = operation_el
        .attr("name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed("<Operation> requires a name attribute"))?
        .to_string();

    let parameters = operation_el
        .children_named(PARAMETER_TAG)
        .enumerate()
        .map(|(index, el)| {
            let type_name = el
                .attr("type")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| malformed(format!("parameter {index} has no type attribute")))?;
            Ok(ParameterSpec {
                name: el.attr("name").map(str::to_string),
                type_name: type_name.to_string(),
                value: el.text.clone(),
            })
        })
        .collect::<Result<Vec<_>, GatewayError>>()?;

    Ok(InvocationRequest {
        registry,
        resource,
        operation,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<Invoke version="1.0"><Resource registry="app">app:type=Pool</Resource><Operation name="echo" extra="ignored"><Parameter name="v" type="int">5</Parameter><Parameter type="string"/></Operation></Invoke>"#;

    fn decoder() -> InvocationRequestDecoder {
        InvocationRequestDecoder::new(4096)
    }

    fn len(s: &str) -> i64 {
        i64::try_from(s.chars().count()).unwrap()
    }

    fn decode(s: &str) -> Result<InvocationRequest, GatewayError> {
        decoder().decode(Some(s.as_bytes()), len(s))
    }

    #[test]
    fn decodes_full_request() {
        let req = decode(SAMPLE).unwrap();
        assert_eq!(req.registry.as_deref(), Some("app"));
        assert_eq!(req.resource.as_str(), "app:type=Pool");
        assert_eq!(req.operation, "echo");
        assert_eq!(
            req.parameters,
            vec![
                ParameterSpec {
                    name: Some("v".into()),
                    type_name: "int".into(),
                    value: "5".into()
                },
                ParameterSpec::new("string", ""),
            ]
        );
    }

    #[test]
    fn trailing_data_past_declared_length_is_discarded() {
        let padded = format!("{SAMPLE}<garbage>that is not xml");
        let req = decoder().decode(Some(padded.as_bytes()), len(SAMPLE)).unwrap();
        assert_eq!(req.operation, "echo");
    }

    #[test]
    fn declared_length_counts_characters() {
        let doc = r#"<Invoke><Resource>app:type=Grüße</Resource><Operation name="ö"/></Invoke>"#;
        let req = decoder().decode(Some(doc.as_bytes()), len(doc)).unwrap();
        assert_eq!(req.operation, "ö");
    }

    #[test]
    fn length_errors_are_distinct() {
        let d = decoder();
        assert!(matches!(
            d.decode(None::<&[u8]>, 10),
            Err(GatewayError::RequestEmpty(_))
        ));
        assert!(matches!(
            d.decode(Some(SAMPLE.as_bytes()), 0),
            Err(GatewayError::RequestEmpty(_))
        ));
        assert!(matches!(
            d.decode(Some(SAMPLE.as_bytes()), -5),
            Err(GatewayError::RequestMalformed(_))
        ));
        assert!(matches!(
            d.decode(Some(SAMPLE.as_bytes()), 4097),
            Err(GatewayError::RequestTooLarge { declared: 4097, max: 4096 })
        ));
        assert!(matches!(
            d.decode(Some(SAMPLE.as_bytes()), len(SAMPLE) + 10),
            Err(GatewayError::RequestTruncated { .. })
        ));
    }

    #[test]
    fn structural_errors_are_malformed() {
        let cases = [
            r#"<Call><Resource>a:b=c</Resource><Operation name="x"/></Call>"#,
            r#"<Invoke><Operation name="x"/></Invoke>"#,
            r"<Invoke><Resource>a:b=c</Resource></Invoke>",
            r"<Invoke><Resource>a:b=c</Resource><Operation/></Invoke>",
            r#"<Invoke><Resource>a:b=c</Resource><Operation name="x"><Parameter>1</Parameter></Operation></Invoke>"#,
            r#"<Invoke><Resource>a:b=c</Resource><Resource>d:e=f</Resource><Operation name="x"/></Invoke>"#,
            r#"<Invoke><Resource>no-colon</Resource><Operation name="x"/></Invoke>"#,
            r"<Invoke><Resource>a:b=c</Resource>",
        ];
        for case in cases {
            let err = decode(case).unwrap_err();
            assert!(
                matches!(err, GatewayError::RequestMalformed(_)),
                "{case}: {err:?}"
            );
        }
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut body = br#"<Invoke><Resource>app:type=Pool</Resource><Operation name="echo"><Parameter type="string">"#.to_vec();
        body.extend_from_slice(&[0xFF, 0xFE]);
        body.extend_from_slice(b"</Parameter></Operation></Invoke>");
        let declared = i64::try_from(body.len()).unwrap();

        let err = decoder().decode(Some(body.as_slice()), declared).unwrap_err();
        assert!(matches!(err, GatewayError::RequestMalformed(_)), "{err:?}");
    }

    #[test]
    fn invalid_utf8_past_declared_length_is_discarded() {
        let mut body = SAMPLE.as_bytes().to_vec();
        body.extend_from_slice(&[0xC3, 0x28, 0xFF]);
        let req = decoder().decode(Some(body.as_slice()), len(SAMPLE)).unwrap();
        assert_eq!(req.operation, "echo");
    }

    #[test]
    fn multibyte_character_cut_by_byte_budget_is_dropped() {
        // Fifteen bytes end inside the eighth two-byte character.
        let prefix = utf8_prefix(&"ééééééééé".as_bytes()[..15], 4).unwrap();
        assert_eq!(prefix.chars().count(), 7);
    }

    #[test]
    fn declared_length_cut_inside_document_is_malformed() {
        let err = decoder().decode(Some(SAMPLE.as_bytes()), 20).unwrap_err();
        assert!(matches!(err, GatewayError::RequestMalformed(_)));
    }
}
