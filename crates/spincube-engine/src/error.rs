use std::fmt;

use crate::device::ShaderStage;

/// Which kind of named shader input failed to resolve.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindingKind {
    Attribute,
    Uniform,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Attribute => f.write_str("attribute"),
            BindingKind::Uniform => f.write_str("uniform"),
        }
    }
}

/// Errors surfaced by the rendering pipeline.
///
/// Compile, link and binding errors only happen while bringing the loop up and are
/// recoverable by retrying with different source. `InvalidContext` is fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A shader stage was rejected by the compiler. `log` is the compiler diagnostic.
    ShaderCompile { stage: ShaderStage, log: String },
    /// The compiled stages could not be linked into one program.
    ShaderLink { log: String },
    /// No usable GPU context.
    InvalidContext { reason: String },
    /// A named input the loop depends on is absent from the linked program.
    MissingBinding { kind: BindingKind, name: String },
    /// A frame was requested before the loop was initialized.
    NotReady,
}

impl RenderError {
    pub(crate) fn invalid_context(reason: impl Into<String>) -> Self {
        Self::InvalidContext { reason: reason.into() }
    }

    /// Returns `true` when no retry within this process can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::InvalidContext { .. })
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ShaderCompile { stage, log } => {
                write!(f, "{stage} shader failed to compile: {log}")
            }
            RenderError::ShaderLink { log } => write!(f, "shader program failed to link: {log}"),
            RenderError::InvalidContext { reason } => write!(f, "invalid GPU context: {reason}"),
            RenderError::MissingBinding { kind, name } => {
                write!(f, "linked program has no active {kind} named `{name}`")
            }
            RenderError::NotReady => f.write_str("render loop has not been initialized"),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_message_carries_log() {
        let err = RenderError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "expected `;`".into(),
        };
        assert_eq!(err.to_string(), "fragment shader failed to compile: expected `;`");
    }

    #[test]
    fn only_context_errors_are_fatal() {
        assert!(RenderError::invalid_context("lost").is_fatal());
        assert!(!RenderError::ShaderLink { log: String::new() }.is_fatal());
        assert!(!RenderError::NotReady.is_fatal());
    }

    #[test]
    fn missing_binding_names_the_input() {
        let err = RenderError::MissingBinding {
            kind: BindingKind::Uniform,
            name: "u_projectionMatrix".into(),
        };
        assert!(err.to_string().contains("uniform named `u_projectionMatrix`"));
    }
}
