use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a scripted response body.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BodyStep {
    /// Yields a chunk of bytes.
    Bytes(Vec<u8>),
    /// Yields a chunk of UTF-8 text.
    Text(String),
    /// Waits before the next step.
    Delay {
        /// The delay in milliseconds.
        millis: u64,
    },
    /// Never yields again, like a connection that went silent.
    Stall,
    /// Fails the read with a transport error.
    Fail(String),
}

/// A response the transport hands out, in order, for each request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptedResponse {
    /// The status code.
    pub status: u16,
    /// The `Content-Type` header.
    pub content_type: Option<String>,
    /// The body, step by step.
    pub steps: Vec<BodyStep>,
}

impl ScriptedResponse {
    /// Creates a successful event stream from raw body steps.
    #[inline]
    pub fn event_stream(steps: impl Into<Vec<BodyStep>>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/event-stream".to_owned()),
            steps: steps.into(),
        }
    }

    /// Creates a successful event stream with one `data: ` event per
    /// payload. The `[DONE]` sentinel is not added.
    pub fn sse<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let steps: Vec<_> = payloads
            .into_iter()
            .map(|payload| BodyStep::Text(sse_event(payload.as_ref())))
            .collect();
        Self::event_stream(steps)
    }

    /// Creates a JSON response.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_owned()),
            steps: vec![BodyStep::Text(body.to_string())],
        }
    }

    /// Inserts a delay before every chunk of the body.
    pub fn with_delay(mut self, millis: u64) -> Self {
        self.steps = self
            .steps
            .into_iter()
            .flat_map(|step| [BodyStep::Delay { millis }, step])
            .collect();
        self
    }

    /// Appends a step to the body.
    #[inline]
    pub fn then(mut self, step: BodyStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// Formats a payload as a server-sent event.
#[inline]
pub fn sse_event(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_script() {
        let script: Vec<ScriptedResponse> = serde_json::from_str(
            r#"[
                {
                    "status": 200,
                    "content_type": "text/event-stream",
                    "steps": [
                        { "type": "text", "data": "data: {}\n\n" },
                        { "type": "delay", "data": { "millis": 5 } },
                        { "type": "stall" }
                    ]
                },
                { "status": 500, "content_type": null, "steps": [] }
            ]"#,
        )
        .unwrap();
        assert_eq!(
            script[0],
            ScriptedResponse::sse(["{}"])
                .then(BodyStep::Delay { millis: 5 })
                .then(BodyStep::Stall)
        );
        assert_eq!(script[1].status, 500);
    }

    #[test]
    fn test_with_delay() {
        let resp = ScriptedResponse::sse(["a", "b"]).with_delay(3);
        assert_eq!(
            resp.steps,
            vec![
                BodyStep::Delay { millis: 3 },
                BodyStep::Text("data: a\n\n".to_owned()),
                BodyStep::Delay { millis: 3 },
                BodyStep::Text("data: b\n\n".to_owned()),
            ]
        );
    }
}
