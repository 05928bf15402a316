pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{
        escaped_transform, is_not, tag, take_until, take_while, take_while_m_n, take_while1,
    },
    character::complete::{char, digit0, digit1, hex_digit1, multispace1, none_of, one_of},
    combinator::{map, map_opt, map_res, not, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::position;
use smol_str::SmolStr;
use token::{TemplatePart, Token, TokenKind};

use crate::range::Span;

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token::new($kind, span.into())).parse(input)
        }
    };
}

/// Splits `code` into tokens, always terminated by [`TokenKind::Eof`].
pub fn tokenize(code: &str) -> Result<Vec<Token>, LexerError> {
    let input = Span::new(code);
    let (span, mut tokens) = many0(spaced_token)
        .parse(input)
        .map_err(|e| to_lexer_error(e, input))?;
    let (span, trailing) = trivia(span).map_err(|e| to_lexer_error(e, span))?;

    if let Some(c) = span.fragment().chars().next() {
        return Err(LexerError::UnexpectedCharacter(c, span.into()));
    }

    let mut eof = Token::new(TokenKind::Eof, span.into());
    eof.newline_before = trailing.fragment().contains('\n');
    tokens.push(eof);

    Ok(tokens)
}

fn to_lexer_error(err: nom::Err<nom::error::Error<Span>>, fallback: Span) -> LexerError {
    let span = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
        nom::Err::Incomplete(_) => fallback,
    };

    LexerError::UnexpectedCharacter(span.fragment().chars().next().unwrap_or(' '), span.into())
}

fn line_comment(input: Span) -> IResult<Span, Span> {
    recognize(pair(tag("//"), opt(is_not("\r\n")))).parse(input)
}

fn block_comment(input: Span) -> IResult<Span, Span> {
    recognize(delimited(tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

fn trivia(input: Span) -> IResult<Span, Span> {
    recognize(many0(alt((multispace1, line_comment, block_comment)))).parse(input)
}

fn spaced_token(input: Span) -> IResult<Span, Token> {
    map(pair(trivia, token), |(trivia, mut token)| {
        token.newline_before = trivia.fragment().contains('\n');
        token
    })
    .parse(input)
}

define_token_parser!(strict_eq, "===", TokenKind::EqEqEq);
define_token_parser!(strict_not_eq, "!==", TokenKind::NotEqEq);
define_token_parser!(arrow, "=>", TokenKind::Arrow);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(not_eq, "!=", TokenKind::NotEq);
define_token_parser!(lt_eq, "<=", TokenKind::LtEq);
define_token_parser!(gt_eq, ">=", TokenKind::GtEq);
define_token_parser!(and_and, "&&", TokenKind::AndAnd);
define_token_parser!(or_or, "||", TokenKind::OrOr);
define_token_parser!(nullish, "??", TokenKind::QuestionQuestion);
define_token_parser!(plus_plus, "++", TokenKind::PlusPlus);
define_token_parser!(minus_minus, "--", TokenKind::MinusMinus);
define_token_parser!(plus_eq, "+=", TokenKind::PlusEq);
define_token_parser!(minus_eq, "-=", TokenKind::MinusEq);
define_token_parser!(star_eq, "*=", TokenKind::StarEq);
define_token_parser!(slash_eq, "/=", TokenKind::SlashEq);
define_token_parser!(percent_eq, "%=", TokenKind::PercentEq);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(semi_colon, ";", TokenKind::SemiColon);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(question, "?", TokenKind::Question);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(star, "*", TokenKind::Star);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(equal, "=", TokenKind::Eq);
define_token_parser!(bang, "!", TokenKind::Bang);

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        alt((strict_eq, strict_not_eq)),
        alt((
            arrow,
            eq_eq,
            not_eq,
            lt_eq,
            gt_eq,
            and_and,
            or_or,
            nullish,
            plus_plus,
            minus_minus,
            plus_eq,
            minus_eq,
            star_eq,
            slash_eq,
            percent_eq,
        )),
        alt((
            l_brace, r_brace, l_paren, r_paren, l_bracket, r_bracket, semi_colon, comma, dot, colon,
            question, plus, minus, star, slash, percent, lt, gt, equal, bang,
        )),
    ))
    .parse(input)
}

fn hex_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize(pair(alt((tag("0x"), tag("0X"))), hex_digit1)),
        |span: Span| {
            u64::from_str_radix(&span.fragment()[2..], 16)
                .map(|n| Token::new(TokenKind::Number(n as f64), span.into()))
        },
    )
    .parse(input)
}

fn decimal_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize(pair(
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(pair(one_of("eE"), pair(opt(one_of("+-")), digit1))),
        )),
        |span: Span| {
            span.fragment()
                .parse::<f64>()
                .map(|n| Token::new(TokenKind::Number(n), span.into()))
        },
    )
    .parse(input)
}

fn unicode(input: Span) -> IResult<Span, char> {
    map_opt(
        map_res(
            preceded(
                char('u'),
                alt((
                    delimited(
                        char('{'),
                        take_while_m_n(1, 6, |c: char| c.is_ascii_hexdigit()),
                        char('}'),
                    ),
                    take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
                )),
            ),
            |span: Span| u32::from_str_radix(span.fragment(), 16),
        ),
        char::from_u32,
    )
    .parse(input)
}

fn escape_sequence(input: Span) -> IResult<Span, char> {
    alt((
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
        value('`', char('`')),
        value('$', char('$')),
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        value('\0', char('0')),
        unicode,
    ))
    .parse(input)
}

fn double_quoted(input: Span) -> IResult<Span, String> {
    delimited(
        char('"'),
        escaped_transform(none_of("\"\\\n"), '\\', escape_sequence),
        char('"'),
    )
    .parse(input)
}

fn single_quoted(input: Span) -> IResult<Span, String> {
    delimited(
        char('\''),
        escaped_transform(none_of("'\\\n"), '\\', escape_sequence),
        char('\''),
    )
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, s) = alt((
        value(String::new(), tag("\"\"")),
        value(String::new(), tag("''")),
        double_quoted,
        single_quoted,
    ))
    .parse(span)?;

    Ok((span, Token::new(TokenKind::String(s), start.into())))
}

fn template_substitution(input: Span) -> IResult<Span, TemplatePart> {
    let (span, _) = tag("${").parse(input)?;
    let (span, start) = position(span)?;
    let (span, code) = terminated(take_until("}"), char('}')).parse(span)?;

    Ok((
        span,
        TemplatePart::Code(code.fragment().to_string(), start.into()),
    ))
}

fn template_part(input: Span) -> IResult<Span, TemplatePart> {
    alt((
        template_substitution,
        map(
            escaped_transform(none_of("`\\$"), '\\', escape_sequence),
            TemplatePart::Text,
        ),
        map(terminated(char('$'), not(char('{'))), |_| {
            TemplatePart::Text("$".to_string())
        }),
    ))
    .parse(input)
}

fn template_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, parts) = delimited(char('`'), many0(template_part), char('`')).parse(span)?;

    Ok((span, Token::new(TokenKind::Template(parts), start.into())))
}

fn literals(input: Span) -> IResult<Span, Token> {
    alt((hex_literal, decimal_literal, string_literal, template_literal)).parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
        )),
        |span: Span| {
            let kind = TokenKind::keyword(span.fragment())
                .unwrap_or_else(|| TokenKind::Ident(SmolStr::new(span.fragment())));
            Token::new(kind, span.into())
        },
    )
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((literals, punctuations, ident)).parse(input)
}
