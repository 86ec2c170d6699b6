//! Response classification and decoding
//!
//! A response is first checked against the success set, then handed to one
//! of a closed set of decode modes chosen by the caller:
//!
//! | Mode | Output | Empty body |
//! |------|--------|------------|
//! | [`Discard`] | `()` | ok |
//! | [`DecodeInto<T>`] | `Option<T>` | `None` |
//! | [`CopyRaw<W>`] | `W` | nothing written |
//! | [`DecodeBundleOf<T>`] | [`Resources<T>`] | no items |

use std::io::Write;
use std::marker::PhantomData;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::warn;

use super::errors::ApiError;
use crate::http::ResponseEnvelope;

/// Statuses treated as success; everything else is an error.
pub const SUCCESS_STATUSES: [StatusCode; 5] = [
    StatusCode::OK,
    StatusCode::CREATED,
    StatusCode::ACCEPTED,
    StatusCode::NO_CONTENT,
    StatusCode::NOT_MODIFIED,
];

mod sealed {
    pub trait Sealed {}
}

/// How a successful response body is turned into a value.
pub trait Decode: sealed::Sealed {
    type Output;

    /// A 404 while decoding in this mode means "no results".
    const IS_SEARCH: bool = false;

    fn decode(self, envelope: &ResponseEnvelope) -> Result<Self::Output, ApiError>;
}

/// Ignore the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl sealed::Sealed for Discard {}

impl Decode for Discard {
    type Output = ();

    fn decode(self, _envelope: &ResponseEnvelope) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Decode the body as JSON into `T`.
pub struct DecodeInto<T>(PhantomData<fn() -> T>);

impl<T> DecodeInto<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DecodeInto<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> sealed::Sealed for DecodeInto<T> {}

impl<T: DeserializeOwned> Decode for DecodeInto<T> {
    type Output = Option<T>;

    fn decode(self, envelope: &ResponseEnvelope) -> Result<Option<T>, ApiError> {
        if envelope.is_body_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&envelope.body)
            .map(Some)
            .map_err(|e| ApiError::decode(envelope, e.to_string()))
    }
}

/// Copy the body verbatim into a writer, which is handed back.
pub struct CopyRaw<W>(pub W);

impl<W> sealed::Sealed for CopyRaw<W> {}

impl<W: Write> Decode for CopyRaw<W> {
    type Output = W;

    fn decode(self, envelope: &ResponseEnvelope) -> Result<W, ApiError> {
        let mut sink = self.0;
        sink.write_all(&envelope.body)
            .and_then(|()| sink.flush())
            .map_err(|e| ApiError::decode(envelope, format!("failed to copy body: {e}")))?;
        Ok(sink)
    }
}

/// Decode a FHIR/SCIM `Bundle`, then every entry's resource as `T`.
///
/// Entries that do not decode are skipped and counted in
/// [`Resources::skipped`].
pub struct DecodeBundleOf<T>(PhantomData<fn() -> T>);

impl<T> DecodeBundleOf<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DecodeBundleOf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> sealed::Sealed for DecodeBundleOf<T> {}

impl<T: DeserializeOwned> Decode for DecodeBundleOf<T> {
    type Output = Resources<T>;

    const IS_SEARCH: bool = true;

    fn decode(self, envelope: &ResponseEnvelope) -> Result<Resources<T>, ApiError> {
        if envelope.is_body_empty() {
            return Ok(Resources::default());
        }

        let bundle: Bundle = serde_json::from_slice(&envelope.body)
            .map_err(|e| ApiError::decode(envelope, format!("invalid bundle: {e}")))?;

        let mut resources = Resources {
            total: bundle.total,
            bundle_type: bundle.bundle_type,
            items: Vec::with_capacity(bundle.entry.len()),
            skipped: 0,
        };

        for (index, entry) in bundle.entry.into_iter().enumerate() {
            let Some(raw) = entry.resource else {
                warn!(index, url = %envelope.url, "bundle entry has no resource; skipping");
                resources.skipped += 1;
                continue;
            };
            match serde_json::from_str::<T>(raw.get()) {
                Ok(item) => resources.items.push(item),
                Err(err) => {
                    warn!(index, url = %envelope.url, error = %err, "skipping bad bundle entry");
                    resources.skipped += 1;
                }
            }
        }

        Ok(resources)
    }
}

/// Resources extracted from a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Resources<T> {
    /// `total` as reported by the server, which may exceed `items.len()`
    pub total: Option<u64>,
    pub bundle_type: Option<String>,
    pub items: Vec<T>,
    /// Entries that were missing a resource or failed to decode
    pub skipped: usize,
}

impl<T> Default for Resources<T> {
    fn default() -> Self {
        Self { total: None, bundle_type: None, items: Vec::new(), skipped: 0 }
    }
}

impl<T> Resources<T> {
    /// No total reported, or a total of zero, and nothing decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.total.unwrap_or(0) == 0
    }
}

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(default, rename = "type")]
    bundle_type: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    entry: Vec<BundleEntry>,
}

#[derive(Debug, Deserialize)]
struct BundleEntry {
    #[serde(default)]
    resource: Option<Box<RawValue>>,
}

/// FHIR `OperationOutcome` error body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub issue: Vec<OutcomeIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeIssue {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<OutcomeDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl OutcomeIssue {
    fn summary(&self) -> String {
        self.diagnostics
            .clone()
            .or_else(|| self.details.as_ref().and_then(|d| d.text.clone()))
            .unwrap_or_else(|| format!("{} {}", self.severity, self.code).trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify the status of a response.
///
/// # Errors
/// `EmptyResult` for a 404 while searching, `Status` for anything outside
/// [`SUCCESS_STATUSES`]
pub fn check_response(envelope: &ResponseEnvelope, is_search: bool) -> Result<(), ApiError> {
    if SUCCESS_STATUSES.contains(&envelope.status) {
        return Ok(());
    }
    if is_search && envelope.status == StatusCode::NOT_FOUND {
        return Err(ApiError::EmptyResult { envelope: Box::new(envelope.clone()) });
    }

    let (detail, outcome) = describe_error_body(&envelope.body);
    let prefix = format!("{} {}: {}", envelope.method, envelope.url, envelope.status);
    let message = match detail {
        Some(detail) => format!("{prefix}: {detail}"),
        None => prefix,
    };

    Err(ApiError::Status {
        status: envelope.status,
        message,
        outcome,
        envelope: Box::new(envelope.clone()),
    })
}

fn describe_error_body(body: &[u8]) -> (Option<String>, Option<OperationOutcome>) {
    if body.iter().all(u8::is_ascii_whitespace) {
        return (None, None);
    }

    if let Ok(outcome) = serde_json::from_slice::<OperationOutcome>(body) {
        if !outcome.issue.is_empty() {
            let detail =
                outcome.issue.iter().map(OutcomeIssue::summary).collect::<Vec<_>>().join("; ");
            return (Some(detail), Some(outcome));
        }
    }

    if let Ok(payload) = serde_json::from_slice::<ErrorPayload>(body) {
        let detail = match (payload.error, payload.error_description, payload.message) {
            (Some(error), Some(description), _) => Some(format!("{error}: {description}")),
            (_, Some(description), _) => Some(description),
            (_, _, Some(message)) => Some(message),
            (Some(error), None, None) => Some(error),
            (None, None, None) => None,
        };
        return (detail, None);
    }

    (None, None)
}
