//! Image review request and response model.
//!
//! Mirrors the `imagepolicy.k8s.io` ImageReview shape sent by the API server:
//!
//! ```json
//! { "apiVersion": "imagepolicy.k8s.io/v1alpha1", "kind": "ImageReview",
//!   "spec": { "containers": [ { "image": "nginx:1.20" } ] } }
//! ```
//!
//! Only the `spec` object is required. Every other field defaults when absent
//! or `null`, and `apiVersion`/`kind` are echoed back untouched in the response.

use std::collections::BTreeMap;

use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::webhooks::policies::Verdict;

/// Errors raised while decoding an inbound review payload.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The request body carried no bytes (or only whitespace)
    #[error("request body is empty")]
    Empty,

    /// A structurally required field was absent or null
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The body was not a JSON object of the expected shape
    #[error("malformed image review: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A single container in the review spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Free-form image reference (`repo[:tag][@digest]`), possibly empty
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

/// The `spec` object of an image review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReviewSpec {
    /// Containers in the order the workload declares them
    #[serde(default, deserialize_with = "null_as_default")]
    pub containers: Vec<ContainerSpec>,

    /// Pod annotations matching `*.image-policy.k8s.io/*`
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub annotations: BTreeMap<String, String>,

    /// Namespace of the pod under review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A validated inbound review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub api_version: String,
    pub kind: String,
    pub spec: ImageReviewSpec,
}

/// The `status` object written back into the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReviewStatus {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Verdict> for ImageReviewStatus {
    fn from(verdict: &Verdict) -> Self {
        Self {
            allowed: verdict.is_allowed(),
            reason: verdict.reason().map(str::to_string),
        }
    }
}

/// The review envelope returned to the API server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub spec: ImageReviewSpec,
    pub status: ImageReviewStatus,
}

/// Wire shape used for decoding; `spec` stays optional so its absence maps to
/// [`ParseError::MissingField`] rather than a generic serde message.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReview {
    #[serde(default, deserialize_with = "null_as_default")]
    api_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    kind: String,
    #[serde(default)]
    spec: Option<ImageReviewSpec>,
}

/// Decode a raw request body into a [`ReviewRequest`].
///
/// Any `status` the caller sent is ignored; it is recomputed by the policy engine.
pub fn parse(raw: &[u8]) -> Result<ReviewRequest, ParseError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }

    let mut value: Value = serde_json::from_slice(raw)?;
    ensure_objects(&mut value)?;

    let review: RawReview = serde_json::from_value(value)?;
    let spec = review.spec.ok_or(ParseError::MissingField("spec"))?;

    Ok(ReviewRequest {
        api_version: review.api_version,
        kind: review.kind,
        spec,
    })
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Require JSON objects for the envelope, `spec` and each container.
///
/// Derived struct decoding also accepts positional arrays, so the shape is
/// checked on the untyped value first. A `null` container decodes as an empty one.
fn ensure_objects(review: &mut Value) -> Result<(), ParseError> {
    let envelope = as_object(review, "an image review object")?;

    let Some(spec) = envelope.get_mut("spec").filter(|spec| !spec.is_null()) else {
        return Ok(());
    };
    let spec = as_object(spec, "a spec object")?;

    if let Some(Value::Array(containers)) = spec.get_mut("containers") {
        for container in containers.iter_mut() {
            if container.is_null() {
                *container = Value::Object(Map::new());
            }
            as_object(container, "a container object")?;
        }
    }
    Ok(())
}

fn as_object<'a>(
    value: &'a mut Value,
    expected: &'static str,
) -> Result<&'a mut Map<String, Value>, ParseError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(serde_json::Error::invalid_type(unexpected(other), &expected).into()),
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

impl ReviewRequest {
    /// Images in declaration order
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.spec.containers.iter().map(|c| c.image.as_str())
    }

    /// Build the response envelope, echoing `apiVersion`, `kind` and `spec`.
    pub fn into_response(self, verdict: &Verdict) -> ReviewResponse {
        ReviewResponse {
            api_version: self.api_version,
            kind: self.kind,
            spec: self.spec,
            status: ImageReviewStatus::from(verdict),
        }
    }
}
