//! Error types for loading template sources

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Path expression syntax error (spans are relative to the path text)
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    /// Markup that is not well formed
    #[error("malformed markup at {span:?}: {message}")]
    Markup { span: Span, message: String },

    /// The same attribute appears twice on one element
    #[error("duplicate attribute '{name}' at {span:?}")]
    DuplicateAttribute { name: String, span: Span },

    /// A root or copy template declared without an id
    #[error("template at {span:?} has no id")]
    MissingId { span: Span },

    /// A directive whose path expression cannot be parsed
    #[error("invalid path '{path}' at {span:?}: {message}")]
    InvalidPath {
        path: String,
        span: Span,
        message: String,
    },

    /// Structurally valid markup that is not a valid declaration
    #[error("invalid declaration at {span:?}: {message}")]
    InvalidDeclaration { span: Span, message: String },
}

impl ParseError {
    pub fn markup(span: Span, message: impl Into<String>) -> Self {
        Self::Markup {
            span,
            message: message.into(),
        }
    }

    pub fn invalid(span: Span, message: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            span,
            message: message.into(),
        }
    }

    /// Source span of the error
    pub fn span(&self) -> &Span {
        match self {
            Self::Syntax { span, .. }
            | Self::Markup { span, .. }
            | Self::DuplicateAttribute { span, .. }
            | Self::MissingId { span }
            | Self::InvalidPath { span, .. }
            | Self::InvalidDeclaration { span, .. } => span,
        }
    }

    /// Short description without the location prefix
    pub fn message(&self) -> String {
        match self {
            Self::Syntax {
                message, expected, ..
            } => {
                if expected.is_empty() {
                    message.clone()
                } else {
                    format!("{}\nExpected: {}", message, expected.join(", "))
                }
            }
            Self::Markup { message, .. } | Self::InvalidDeclaration { message, .. } => {
                message.clone()
            }
            Self::DuplicateAttribute { name, .. } => format!("attribute '{}' is repeated", name),
            Self::MissingId { .. } => "template has no id".to_string(),
            Self::InvalidPath { path, message, .. } => {
                format!("invalid path '{}': {}", path, message)
            }
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        let span = self.span().clone();
        let message = self.message();

        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(&message)
            .with_label(
                Label::new((filename, span))
                    .with_message(&message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => format!("{}: {}", filename, self),
        }
    }
}

impl<'a> From<chumsky::error::Rich<'a, crate::parser::lexer::Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, crate::parser::lexer::Token>) -> Self {
        use chumsky::error::{RichPattern, RichReason};

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => match found {
                Some(tok) => format!("Unexpected {}", format_token(tok)),
                None => "Unexpected end of path".to_string(),
            },
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(format_token(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of path".to_string()),
                RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                RichPattern::Any => Some("any token".to_string()),
                RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a path token for human-readable error messages
fn format_token(tok: &crate::parser::lexer::Token) -> String {
    use crate::parser::lexer::Token;
    match tok {
        Token::Name(s) => format!("name '{}'", s),
        Token::String(s) => format!("string '{}'", s),
        Token::DoubleSlash => "'//'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::At => "'@'".to_string(),
        Token::Equals => "'='".to_string(),
        Token::Unknown => "character".to_string(),
    }
}
