//! Lexer for patch path expressions using logos

use logos::Logos;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Axis separators (longer pattern first)
    #[token("//")]
    DoubleSlash,
    #[token("/")]
    Slash,
    #[token(".")]
    Dot,

    // Wildcard tag test
    #[token("*")]
    Star,

    // Predicates
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("@")]
    At,
    #[token("=")]
    Equals,

    // Tag and attribute names, including namespaced and dashed names
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_:.-]*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    String(String),

    // Produced for input no other token accepts
    Unknown,
}

/// Lex input string into tokens with spans
///
/// Unrecognized input becomes [`Token::Unknown`] so the parser reports it.
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| (tok.unwrap_or(Token::Unknown), span))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_tokens() {
        let tokens: Vec<_> = lex(".//a/b").map(|(t, _)| t).collect();
        assert_eq!(
            tokens,
            vec![
                Token::Dot,
                Token::DoubleSlash,
                Token::Name("a".to_string()),
                Token::Slash,
                Token::Name("b".to_string())
            ]
        );
    }

    #[test]
    fn test_predicate_tokens() {
        let tokens: Vec<_> = lex(r#"div[@hx-get="/x"]"#).map(|(t, _)| t).collect();
        assert_eq!(
            tokens,
            vec![
                Token::Name("div".to_string()),
                Token::BracketOpen,
                Token::At,
                Token::Name("hx-get".to_string()),
                Token::Equals,
                Token::String("/x".to_string()),
                Token::BracketClose
            ]
        );
    }

    #[test]
    fn test_single_quoted_strings() {
        let tokens: Vec<_> = lex("'a b'").map(|(t, _)| t).collect();
        assert_eq!(tokens, vec![Token::String("a b".to_string())]);
    }

    #[test]
    fn test_unknown_characters() {
        let tokens: Vec<_> = lex("a ! b").map(|(t, _)| t).collect();
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".to_string()),
                Token::Unknown,
                Token::Name("b".to_string())
            ]
        );
    }
}
