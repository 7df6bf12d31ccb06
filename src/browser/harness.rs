//! Execution harness for caller-supplied page scripts.
//!
//! User code never runs bare: it is wrapped in an IIFE that races the
//! script against a timeout, catches both synchronous throws and rejected
//! promises, and always resolves to a `{success, result?, error?,
//! execution_ms}` envelope. The harness is the reliability boundary for
//! injected code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

/// Maximum accepted user script size in bytes.
const MAX_SCRIPT_BYTES: usize = 100 * 1024;

/// Patterns that indicate an attempt to escape the page context.
const FORBIDDEN_PATTERNS: &[&str] = &[
    "require(",
    "process.",
    "child_process",
    "__dirname",
    "__filename",
    "import(",
];

/// Result envelope produced by the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_ms: u64,
}

impl ScriptOutcome {
    /// Envelope for scripts that never reached the page.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            execution_ms: 0,
        }
    }
}

/// Reject scripts the harness should never even attempt.
pub fn validate_script(code: &str) -> ServiceResult<()> {
    if code.trim().is_empty() {
        return Err(ServiceError::InvalidInput("empty script".into()));
    }
    if code.len() > MAX_SCRIPT_BYTES {
        return Err(ServiceError::InvalidInput(format!(
            "script exceeds {MAX_SCRIPT_BYTES} bytes"
        )));
    }
    for pattern in FORBIDDEN_PATTERNS {
        if code.contains(pattern) {
            return Err(ServiceError::ScriptError(format!(
                "forbidden pattern in script: {pattern}"
            )));
        }
    }
    Ok(())
}

/// Wrap user code in the timeout/error harness.
///
/// The returned expression always evaluates to a JSON-serializable envelope,
/// so `evaluate` on the wrapped script cannot throw from user code.
#[must_use]
pub fn wrap_script(code: &str, timeout_ms: u64) -> String {
    format!(
        r#"(async function() {{
    const started = Date.now();
    const timeoutPromise = new Promise((_, reject) => {{
        setTimeout(() => reject(new Error('timeout')), {timeout_ms});
    }});
    const codePromise = new Promise((resolve, reject) => {{
        try {{
            const result = (function() {{
                {code}
            }})();
            Promise.resolve(result).then(resolve).catch(reject);
        }} catch (error) {{
            reject(error);
        }}
    }});
    try {{
        const result = await Promise.race([codePromise, timeoutPromise]);
        return {{
            success: true,
            result: result === undefined ? null : result,
            execution_ms: Date.now() - started
        }};
    }} catch (error) {{
        return {{
            success: false,
            error: error && error.message ? error.message : 'unknown error',
            execution_ms: Date.now() - started
        }};
    }}
}})()"#
    )
}

/// Parse the harness envelope out of an `evaluate` result.
#[must_use]
pub fn parse_outcome(value: Value) -> ScriptOutcome {
    match serde_json::from_value::<ScriptOutcome>(value.clone()) {
        Ok(outcome) => outcome,
        Err(_) => ScriptOutcome {
            success: false,
            result: Some(value),
            error: Some("script returned a non-envelope value".into()),
            execution_ms: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrapped_script_embeds_code_and_timeout() {
        let wrapped = wrap_script("return document.title", 2000);
        assert!(wrapped.contains("return document.title"));
        assert!(wrapped.contains("2000"));
        assert!(wrapped.contains("Promise.race"));
    }

    #[test]
    fn validation_rejects_context_escapes() {
        assert!(validate_script("return require('fs')").is_err());
        assert!(validate_script("process.exit(1)").is_err());
        assert!(validate_script("").is_err());
        assert!(validate_script("return document.title").is_ok());
    }

    #[test]
    fn envelope_parses_both_shapes() {
        let ok = parse_outcome(json!({
            "success": true, "result": "Example Domain", "execution_ms": 12
        }));
        assert!(ok.success);
        assert_eq!(ok.result, Some(json!("Example Domain")));

        let err = parse_outcome(json!({
            "success": false, "error": "timeout", "execution_ms": 2001
        }));
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("timeout"));
    }
}
