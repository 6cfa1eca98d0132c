//! Policy-aware JSON decoding of vendor payloads.
//!
//! Vendor structs keep the keys they don't model in a flattened `extra`
//! map. Whether such keys are an error is decided after parsing, so the
//! same structs serve both the strict and the lenient policy.

use genai_relay_model::{DecodePolicy, Error};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Keys a vendor struct doesn't model.
pub(crate) type Extra = Map<String, Value>;

/// Reports the keys that were not modeled, with their path.
pub(crate) trait UnknownFields {
    fn collect_unknown(&self, path: &str, out: &mut Vec<String>);
}

impl<T: UnknownFields> UnknownFields for Option<T> {
    fn collect_unknown(&self, path: &str, out: &mut Vec<String>) {
        if let Some(inner) = self {
            inner.collect_unknown(path, out);
        }
    }
}

impl<T: UnknownFields> UnknownFields for Vec<T> {
    fn collect_unknown(&self, path: &str, out: &mut Vec<String>) {
        for (i, item) in self.iter().enumerate() {
            item.collect_unknown(&format!("{path}[{i}]"), out);
        }
    }
}

/// A payload that may carry an error reported by the vendor in place of
/// its regular content.
pub(crate) trait VendorError {
    fn vendor_error(&self) -> Option<String>;
}

/// An error object sent inside an otherwise successful response. Vendors
/// disagree on its shape, so only the message is looked at.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub(crate) struct ApiError(Value);

impl ApiError {
    pub(crate) fn message(&self) -> String {
        match self.0.get("message").unwrap_or(&self.0) {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Implements [`UnknownFields`] for a struct with an `extra` field,
/// recursing into the listed fields. Keys listed in `known` are expected
/// but deliberately not modeled.
macro_rules! unknown_fields {
    (
        $ty:ty { $($field:ident),* $(,)? }
        $(, known = [$($known:literal),* $(,)?])?
    ) => {
        impl $crate::decode::UnknownFields for $ty {
            fn collect_unknown(&self, path: &str, out: &mut Vec<String>) {
                const KNOWN: &[&str] = &[$($($known),*)?];
                out.extend(
                    self.extra
                        .keys()
                        .filter(|key| !KNOWN.contains(&key.as_str()))
                        .map(|key| format!("{path}.{key}")),
                );
                $(
                    $crate::decode::UnknownFields::collect_unknown(
                        &self.$field,
                        &format!("{path}.{}", stringify!($field)),
                        out,
                    );
                )*
            }
        }
    };
}

/// Decodes `data` as `T`, applying the policy to unmodeled keys.
///
/// `root` names the payload in error messages, e.g. `chunk`.
pub(crate) fn from_slice<T>(
    data: &[u8],
    policy: DecodePolicy,
    root: &str,
) -> Result<T, Error>
where
    T: DeserializeOwned + UnknownFields,
{
    let value = parse(data, root)?;
    check(value, policy, root)
}

/// Like [`from_slice`], but an error reported by the vendor inside the
/// payload fails the call with that error, whatever the policy.
pub(crate) fn vendor_payload<T>(
    vendor: &str,
    data: &[u8],
    policy: DecodePolicy,
    root: &str,
) -> Result<T, Error>
where
    T: DeserializeOwned + UnknownFields + VendorError,
{
    let value: T = parse(data, root)?;
    if let Some(message) = value.vendor_error() {
        return Err(Error::transport(format!("{vendor}: {message}")));
    }
    check(value, policy, root)
}

fn parse<T: DeserializeOwned>(data: &[u8], root: &str) -> Result<T, Error> {
    serde_json::from_slice(data).map_err(|err| {
        Error::decode(format!(
            "failed to decode {root} {:?}: {err}",
            String::from_utf8_lossy(data)
        ))
    })
}

fn check<T: UnknownFields>(
    value: T,
    policy: DecodePolicy,
    root: &str,
) -> Result<T, Error> {
    let mut unknown = Vec::new();
    value.collect_unknown(root, &mut unknown);
    if unknown.is_empty() {
        return Ok(value);
    }
    match policy {
        DecodePolicy::Strict => Err(Error::decode(format!(
            "unknown fields: {}",
            unknown.join(", ")
        ))),
        DecodePolicy::Lenient => {
            warn!("ignoring unknown fields: {}", unknown.join(", "));
            Ok(value)
        }
    }
}
