use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Capture device unavailable. Fatal to the session.
    Device,
    /// A remote call failed or returned unusable output.
    Generation,
    /// Gallery load/save failed. Logged, never shown.
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    kind: ErrorKind,
    message: String,
}

impl SessionError {
    pub fn device(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Device,
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Generation,
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Persistence,
            message: message.into(),
        }
    }

    /// Builds a generation error from an anyhow chain, keeping every cause.
    pub fn generation_from(err: &anyhow::Error) -> Self {
        Self::generation(error_chain_text(err))
    }

    pub fn persistence_from(err: &anyhow::Error) -> Self {
        Self::persistence(error_chain_text(err))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Device
    }

    /// The single message shown to the user for this failure class.
    pub fn user_message(&self) -> &'static str {
        user_message(self.kind)
    }
}

pub fn user_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Device => "Camera unavailable. Check permissions and restart the session.",
        ErrorKind::Generation => "Couldn't reach the pose coach. Please try again.",
        ErrorKind::Persistence => "Gallery storage is unavailable.",
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SessionError {}

pub fn error_chain_text(err: &anyhow::Error) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|last| last == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return err.to_string();
    }
    parts.join(" | caused by: ")
}
