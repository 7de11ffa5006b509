// Error taxonomy shared by the native boundary, the session, and the CLI.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    /// Caller misuse: lifecycle out of turn, bad buffer layout, wrong dtype.
    Input,
    /// A native entry point returned a nonzero status.
    Kernel,
    /// Permanent contract placeholder; never a transient failure.
    NotImplemented,
    UnsupportedType,
    Timer,
    Load,
    Lookup,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    function: Option<String>,
    detail: Option<String>,
    kernel_message: Option<String>,
    component: Option<String>,
    path: Option<PathBuf>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            function: None,
            detail: None,
            kernel_message: None,
            component: None,
            path: None,
            source: None,
        }
    }

    pub(crate) fn not_implemented(function: &str) -> Self {
        Self::new(ErrorKind::NotImplemented)
            .with_function(function)
            .with_message("not implemented by this interface")
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn kernel_message(&self) -> Option<&str> {
        self.kernel_message.as_deref()
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    pub fn with_kernel_message(mut self, message: impl Into<String>) -> Self {
        self.kernel_message = Some(message.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(function) = &self.function {
            write!(f, " in {function}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        if let Some(component) = &self.component {
            write!(f, " [{component}]")?;
        }
        if let Some(kernel_message) = &self.kernel_message {
            write!(f, " => {kernel_message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Input => 2,
        ErrorKind::Kernel => 3,
        ErrorKind::NotImplemented => 4,
        ErrorKind::UnsupportedType => 5,
        ErrorKind::Timer => 6,
        ErrorKind::Load => 7,
        ErrorKind::Lookup => 8,
        ErrorKind::Io => 9,
    }
}
