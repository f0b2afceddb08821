use std::error::Error;
use std::fmt::{Display, Formatter};

pub type XcheckResult<T> = Result<T, XcheckError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XcheckErrorCategory {
    ParseError,
    ResolutionError,
    ConfigError,
    ExternalToolError,
    LedgerIoError,
}

impl XcheckErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "ParseError",
            Self::ResolutionError => "ResolutionError",
            Self::ConfigError => "ConfigError",
            Self::ExternalToolError => "ExternalToolError",
            Self::LedgerIoError => "LedgerIoError",
        }
    }

    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ConfigError => 2,
            Self::LedgerIoError => 3,
            Self::ParseError => 4,
            Self::ResolutionError => 5,
            Self::ExternalToolError => 6,
        }
    }
}

impl Display for XcheckErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcheckError {
    category: XcheckErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl XcheckError {
    pub fn new(
        category: XcheckErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn parse(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(XcheckErrorCategory::ParseError, placeholder, message)
    }

    pub fn resolution(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(XcheckErrorCategory::ResolutionError, placeholder, message)
    }

    pub fn config(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(XcheckErrorCategory::ConfigError, placeholder, message)
    }

    pub fn external_tool(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(XcheckErrorCategory::ExternalToolError, placeholder, message)
    }

    pub fn ledger_io(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(XcheckErrorCategory::LedgerIoError, placeholder, message)
    }

    pub const fn category(&self) -> XcheckErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for XcheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for XcheckError {}
