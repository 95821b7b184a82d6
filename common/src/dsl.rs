//! Compact filter expressions, e.g. `status:(open OR closed) year:[1990 TO *]`.
//!
//! Field names are facet names; the facet type decides which filter a clause
//! becomes:
//!
//! * `facet:value`, `facet:(a OR b)` on term facets produce term filters
//! * `facet:[lo TO hi]`, `facet:>=lo`, `facet:<=hi` on histogram facets produce
//!   histogram filters, on daterange facets range filters (`*` leaves a side open)
//! * `facet:*` produces an exists filter
//!
//! Daterange bounds accept `YYYY-MM-DD`, converted to epoch milliseconds.

use chrono::NaiveDate;

use crate::error::ConfigError;
use crate::facet::{FacetConfig, FacetType};
use crate::filter::{Bound, Filter};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Colon,
    Value(String),
    Star,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    To,
    Gte,
    Lte,
}

struct Tokenizer {
    input: Vec<char>,
    pos: usize,
}

impl Tokenizer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn read_while<F>(&mut self, predicate: F) -> String
    where
        F: Fn(char) -> bool,
    {
        let mut result = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            result.push(ch);
            self.advance();
        }
        result
    }

    fn read_quoted(&mut self) -> Result<String, String> {
        self.advance();
        let value = self.read_while(|c| c != '"');
        match self.advance() {
            Some('"') => Ok(value),
            _ => Err("Unterminated quoted value".to_string()),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let ch = match self.peek() {
                Some(c) => c,
                None => break,
            };

            match ch {
                '(' => {
                    self.advance();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    self.advance();
                    tokens.push(Token::RParen);
                }
                '[' => {
                    self.advance();
                    tokens.push(Token::LBracket);
                }
                ']' => {
                    self.advance();
                    tokens.push(Token::RBracket);
                }
                '*' => {
                    self.advance();
                    tokens.push(Token::Star);
                }
                '"' => tokens.push(Token::Value(self.read_quoted()?)),
                ':' => {
                    self.advance();
                    self.skip_whitespace();
                    match (self.peek(), self.peek_next()) {
                        (Some('>'), Some('=')) => {
                            self.pos += 2;
                            tokens.push(Token::Gte);
                        }
                        (Some('<'), Some('=')) => {
                            self.pos += 2;
                            tokens.push(Token::Lte);
                        }
                        (Some('>'), _) | (Some('<'), _) => {
                            return Err("Only inclusive bounds (>= and <=) are supported".to_string());
                        }
                        _ => tokens.push(Token::Colon),
                    }
                }
                _ if ch.is_alphanumeric()
                    || ch == '_'
                    || (ch == '-' && matches!(self.peek_next(), Some(d) if d.is_ascii_digit())) =>
                {
                    let mut word = String::new();
                    if ch == '-' {
                        self.advance();
                        word.push('-');
                    }
                    word.push_str(
                        &self.read_while(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-')),
                    );
                    match word.to_uppercase().as_str() {
                        "AND" => tokens.push(Token::And),
                        "OR" => tokens.push(Token::Or),
                        "TO" => tokens.push(Token::To),
                        _ => {
                            self.skip_whitespace();
                            if self.peek() == Some(':') {
                                tokens.push(Token::Field(word));
                            } else {
                                tokens.push(Token::Value(word));
                            }
                        }
                    }
                }
                _ => return Err(format!("Unexpected character: {}", ch)),
            }
        }

        Ok(tokens)
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    facets: &'a [FacetConfig],
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, facets: &'a [FacetConfig]) -> Self {
        Self {
            tokens,
            pos: 0,
            facets,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse(&mut self) -> Result<Vec<Filter>, ConfigError> {
        let mut filters = Vec::new();

        while self.peek().is_some() {
            filters.push(self.parse_clause()?);

            // AND is implicit between clauses
            if matches!(self.peek(), Some(Token::And)) {
                self.advance();
            }
        }

        Ok(filters)
    }

    fn parse_clause(&mut self) -> Result<Filter, ConfigError> {
        let name = match self.advance() {
            Some(Token::Field(f)) => f,
            _ => return Err(dsl_error("Expected facet name")),
        };
        let facet = self
            .facets
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ConfigError::UnknownFacet(name.clone()))?;

        let filter = match self.advance() {
            Some(Token::Gte) => {
                let gte = self.parse_bound(facet)?;
                range_filter(facet, gte, None)?
            }
            Some(Token::Lte) => {
                let lte = self.parse_bound(facet)?;
                range_filter(facet, None, lte)?
            }
            Some(Token::Colon) => match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    Filter::exists(&facet.name, &facet.field)
                }
                Some(Token::LParen) => {
                    let values = self.parse_group()?;
                    term_filter(facet, values)?
                }
                Some(Token::LBracket) => {
                    let (gte, lte) = self.parse_range(facet)?;
                    range_filter(facet, gte, lte)?
                }
                _ => {
                    let value = self.parse_value()?;
                    match facet.facet_type {
                        FacetType::Term => term_filter(facet, vec![value])?,
                        _ => {
                            let bound = to_bound(facet, &value)?;
                            range_filter(facet, Some(bound.clone()), Some(bound))?
                        }
                    }
                }
            },
            _ => return Err(dsl_error("Expected colon or operator")),
        };

        filter.validate()?;
        Ok(filter)
    }

    fn parse_group(&mut self) -> Result<Vec<String>, ConfigError> {
        // Consume (
        self.advance();

        let mut values = vec![self.parse_value()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            values.push(self.parse_value()?);
        }

        match self.advance() {
            Some(Token::RParen) => Ok(values),
            _ => Err(dsl_error("Expected closing parenthesis")),
        }
    }

    fn parse_range(
        &mut self,
        facet: &FacetConfig,
    ) -> Result<(Option<Bound>, Option<Bound>), ConfigError> {
        // Consume [
        self.advance();

        let min = self.parse_bound(facet)?;
        match self.advance() {
            Some(Token::To) => {}
            _ => return Err(dsl_error("Expected TO in range")),
        }
        let max = self.parse_bound(facet)?;

        match self.advance() {
            Some(Token::RBracket) => Ok((min, max)),
            _ => Err(dsl_error("Expected closing bracket")),
        }
    }

    /// `*` is an open side.
    fn parse_bound(&mut self, facet: &FacetConfig) -> Result<Option<Bound>, ConfigError> {
        if matches!(self.peek(), Some(Token::Star)) {
            self.advance();
            return Ok(None);
        }
        let value = self.parse_value()?;
        to_bound(facet, &value).map(Some)
    }

    fn parse_value(&mut self) -> Result<String, ConfigError> {
        match self.advance() {
            Some(Token::Value(v)) => Ok(v),
            _ => Err(dsl_error("Expected value")),
        }
    }
}

fn dsl_error(message: &str) -> ConfigError {
    ConfigError::Dsl(message.to_string())
}

fn term_filter(facet: &FacetConfig, values: Vec<String>) -> Result<Filter, ConfigError> {
    if facet.facet_type != FacetType::Term {
        return Err(ConfigError::Dsl(format!(
            "{} is not a term facet; use a range",
            facet.name
        )));
    }
    Ok(Filter::term(&facet.name, &facet.field, values))
}

fn range_filter(
    facet: &FacetConfig,
    gte: Option<Bound>,
    lte: Option<Bound>,
) -> Result<Filter, ConfigError> {
    match facet.facet_type {
        FacetType::Histogram => Ok(Filter::histogram(&facet.name, &facet.field, gte, lte)),
        FacetType::Daterange => Ok(Filter::range(&facet.name, &facet.field, gte, lte)),
        FacetType::Term => Err(ConfigError::Dsl(format!(
            "{} is a term facet and takes no range",
            facet.name
        ))),
    }
}

fn to_bound(facet: &FacetConfig, value: &str) -> Result<Bound, ConfigError> {
    if let Ok(i) = value.parse::<i64>() {
        return Ok(Bound::Integer(i));
    }
    match facet.facet_type {
        FacetType::Daterange => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| Bound::Integer(dt.and_utc().timestamp_millis()))
            .ok_or_else(|| ConfigError::Dsl(format!("Invalid date for {}: {}", facet.name, value))),
        _ => value
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Bound::Number)
            .ok_or_else(|| ConfigError::Dsl(format!("Invalid number for {}: {}", facet.name, value))),
    }
}

/// Parses a filter expression against the configured facets.
pub fn parse_filters(query: &str, facets: &[FacetConfig]) -> Result<Vec<Filter>, ConfigError> {
    let tokens = Tokenizer::new(query).tokenize().map_err(ConfigError::Dsl)?;
    Parser::new(tokens, facets).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facets() -> Vec<FacetConfig> {
        vec![
            FacetConfig::term("status", "status.keyword"),
            FacetConfig::term("genre", "genre.keyword"),
            FacetConfig::histogram("price", "price"),
            FacetConfig::daterange("published", "published_at"),
            FacetConfig::term("cover", "cover_url"),
        ]
    }

    #[test]
    fn test_single_term() {
        let result = parse_filters("status:open", &facets()).unwrap();
        assert_eq!(result, vec![Filter::term("status", "status.keyword", ["open"])]);
    }

    #[test]
    fn test_or_group() {
        let result = parse_filters("genre:(fantasy OR \"science fiction\" OR horror)", &facets())
            .unwrap();
        assert_eq!(
            result,
            vec![Filter::term(
                "genre",
                "genre.keyword",
                ["fantasy", "science fiction", "horror"]
            )]
        );
    }

    #[test]
    fn test_histogram_range() {
        let result = parse_filters("price:[10 TO 49.5]", &facets()).unwrap();
        assert_eq!(
            result,
            vec![Filter::histogram(
                "price",
                "price",
                Some(Bound::Integer(10)),
                Some(Bound::Number(49.5))
            )]
        );
    }

    #[test]
    fn test_open_ranges() {
        let result = parse_filters("price:[* TO 200] AND price:>=100", &facets()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            result[0],
            Filter::histogram("price", "price", None, Some(Bound::Integer(200)))
        );
        assert_eq!(
            result[1],
            Filter::histogram("price", "price", Some(Bound::Integer(100)), None)
        );

        let lte = parse_filters("price:<=-5", &facets()).unwrap();
        assert_eq!(
            lte[0],
            Filter::histogram("price", "price", None, Some(Bound::Integer(-5)))
        );
    }

    #[test]
    fn test_date_range() {
        let result = parse_filters("published:[2024-01-01 TO 2024-01-02]", &facets()).unwrap();
        assert_eq!(
            result,
            vec![Filter::range(
                "published",
                "published_at",
                Some(Bound::Integer(1_704_067_200_000)),
                Some(Bound::Integer(1_704_153_600_000))
            )]
        );
    }

    #[test]
    fn test_exists() {
        let result = parse_filters("cover:*", &facets()).unwrap();
        assert_eq!(result, vec![Filter::exists("cover", "cover_url")]);
    }

    #[test]
    fn test_implicit_and() {
        let result = parse_filters("status:open genre:(a OR b) price:[1 TO 2]", &facets()).unwrap();
        let names: Vec<&str> = result.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["status", "genre", "price"]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_filters("color:red", &facets()),
            Err(ConfigError::UnknownFacet(_))
        ));
        assert!(matches!(
            parse_filters("status:[1 TO 2]", &facets()),
            Err(ConfigError::Dsl(_))
        ));
        assert!(matches!(
            parse_filters("price:(1 OR 2)", &facets()),
            Err(ConfigError::Dsl(_))
        ));
        assert!(matches!(
            parse_filters("price:>5", &facets()),
            Err(ConfigError::Dsl(_))
        ));
        assert!(matches!(
            parse_filters("price:[50 TO 10]", &facets()),
            Err(ConfigError::InvalidBounds { .. })
        ));
        assert!(matches!(
            parse_filters("published:[yesterday TO *]", &facets()),
            Err(ConfigError::Dsl(_))
        ));
        assert!(matches!(
            parse_filters("status:(open", &facets()),
            Err(ConfigError::Dsl(_))
        ));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for query in [
            "price:>=inf",
            "price:<=nan",
            "price:[\"-inf\" TO 10]",
            "price:[1 TO infinity]",
        ] {
            assert!(
                matches!(parse_filters(query, &facets()), Err(ConfigError::Dsl(_))),
                "{}",
                query
            );
        }
    }
}
