//! Path expression parser using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Parse a path expression such as `.//div[@class="main"]/span`
pub fn parse_path(input: &str) -> Result<PathExpr, Vec<crate::ParseError>> {
    let len = input.len();

    // Create a logos lexer and convert to token stream
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    path_parser()
        .parse(token_stream)
        .into_result()
        .map(|steps| PathExpr {
            source: input.trim().to_string(),
            steps,
        })
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

fn path_parser<'a, I>() -> impl Parser<'a, I, Vec<Step>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let name = select! {
        Token::Name(s) => s,
    };

    let string_literal = select! {
        Token::String(s) => s,
    };

    let node_test = choice((
        just(Token::Star).to(NodeTest::Any),
        name.clone().map(NodeTest::Tag),
    ));

    // [@attr] or [@attr="value"]
    let predicate = just(Token::At)
        .ignore_then(name)
        .then(just(Token::Equals).ignore_then(string_literal).or_not())
        .map(|(name, value)| match value {
            Some(value) => Predicate::AttributeEquals { name, value },
            None => Predicate::HasAttribute(name),
        })
        .delimited_by(just(Token::BracketOpen), just(Token::BracketClose));

    let step_body = node_test.then(predicate.repeated().collect::<Vec<_>>());

    let separator = choice((
        just(Token::DoubleSlash).to(Axis::Descendant),
        just(Token::Slash).to(Axis::Child),
    ));

    // Optional anchor before the first step: `.//`, `//`, `./`, `/`
    let anchor = just(Token::Dot)
        .or_not()
        .ignore_then(separator.clone())
        .or_not()
        .map(|axis| axis.unwrap_or(Axis::Child));

    let first = anchor
        .then(step_body.clone())
        .map(|(axis, (test, predicates))| Step {
            axis,
            test,
            predicates,
        });

    let rest = separator
        .then(step_body)
        .map(|(axis, (test, predicates))| Step {
            axis,
            test,
            predicates,
        })
        .repeated()
        .collect::<Vec<_>>();

    first
        .then(rest)
        .then_ignore(end())
        .map(|(first, rest)| {
            let mut steps = Vec::with_capacity(rest.len() + 1);
            steps.push(first);
            steps.extend(rest);
            steps
        })
}
