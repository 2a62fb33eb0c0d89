//! The grammar of the search language.

use crate::clause::{Argument, ArgumentList, Clause};
use crate::error::Error;
use crate::identifier::{FilteredSegment, Identifier, InlineFilter, Path};
use crate::operation::Operator;
use crate::statement::{
    DomainStatement, DomainValue, MapperStatement, Statement, ValueListStatement,
};
use crate::subquery::{Refinement, Subquery};
use crate::token::{Token, ValueList};
use chumsky::prelude::*;

pub type Extra<'a> = extra::Err<Rich<'a, char>>;

/// Characters an unquoted value may contain, next to alphanumerics.
const BARE: &str = "%.-_*;:/";

fn word<'a>() -> impl Parser<'a, &'a str, &'a str, Extra<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1)
        .map_slice(|s| s)
}

/// A keyword, ignoring case.
pub fn keyword<'a>(keyword: &'static str) -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    word()
        .filter(move |w: &&str| w.eq_ignore_ascii_case(keyword))
        .ignored()
}

fn is_connective(word: &str) -> bool {
    word.eq_ignore_ascii_case("and") || word.eq_ignore_ascii_case("or")
}

pub fn name<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || *c == '_')
                .repeated(),
        )
        .map_slice(|s: &str| s.to_string())
}

fn quoted<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> + Clone {
    let quoted_with = |quote: char| {
        just('\\')
            .ignore_then(any())
            .or(any().filter(move |c: &char| *c != quote && *c != '\\'))
            .repeated()
            .collect::<String>()
            .delimited_by(just(quote), just(quote))
    };

    quoted_with('"').or(quoted_with('\''))
}

fn bare<'a>() -> impl Parser<'a, &'a str, &'a str, Extra<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_alphanumeric() || BARE.contains(*c))
        .repeated()
        .at_least(1)
        .map_slice(|s| s)
}

/// A single value: quoted, or a bare word classified by its shape.
pub fn value<'a>() -> impl Parser<'a, &'a str, Token, Extra<'a>> + Clone {
    quoted().map(Token::String).or(bare().map(Token::classify))
}

/// A value inside a clause, where a bare `and` or `or` continues the clause.
fn list_value<'a>() -> impl Parser<'a, &'a str, Token, Extra<'a>> + Clone {
    quoted().map(Token::String).or(bare()
        .filter(|w: &&str| !is_connective(w))
        .map(Token::classify))
}

/// Values, separated by whitespace or commas.
fn values<'a, P>(item: P) -> impl Parser<'a, &'a str, ValueList, Extra<'a>> + Clone
where
    P: Parser<'a, &'a str, Token, Extra<'a>> + Clone,
{
    let separator = just(',')
        .padded()
        .ignored()
        .or(text::whitespace().at_least(1).ignored());

    item.separated_by(separator)
        .at_least(1)
        .collect::<Vec<_>>()
        .map(ValueList)
}

pub fn value_list<'a>() -> impl Parser<'a, &'a str, ValueList, Extra<'a>> + Clone {
    values(list_value())
}

pub fn operator<'a>() -> impl Parser<'a, &'a str, Operator, Extra<'a>> + Clone {
    let symbol = choice((
        just("==").to(Operator::Equal),
        just("!=").to(Operator::NotEqual),
        just("<>").to(Operator::NotEqual),
        just("<=").to(Operator::LessEqual),
        just(">=").to(Operator::GreaterEqual),
        just("=").to(Operator::Equal),
        just("<").to(Operator::Less),
        just(">").to(Operator::Greater),
    ));

    let keyword = word().try_map(|w: &str, span| match Operator::from_keyword(w) {
        Some(operator) if operator != Operator::In => Ok(operator),
        _ => Err(Rich::custom(span, format!("unknown operator: {w}"))),
    });

    symbol.or(keyword)
}

fn and_op<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    keyword("and").or(just("&&").ignored())
}

fn or_op<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    keyword("or").or(just("||").ignored())
}

fn not_op<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    keyword("not").or(just('!').ignored())
}

pub fn path<'a>() -> impl Parser<'a, &'a str, Path, Extra<'a>> + Clone {
    name()
        .separated_by(just('.'))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(Path::new)
}

fn inline_filter<'a>() -> impl Parser<'a, &'a str, InlineFilter, Extra<'a>> + Clone {
    name()
        .padded()
        .then(operator())
        .then(value().padded())
        .map(|((attribute, operator), value)| InlineFilter {
            attribute,
            operator,
            value,
        })
}

/// `relation.relation[filter, filter]`
fn filtered_segment<'a>() -> impl Parser<'a, &'a str, FilteredSegment, Extra<'a>> + Clone {
    name()
        .separated_by(just('.'))
        .at_least(1)
        .collect::<Vec<_>>()
        .then(
            inline_filter()
                .separated_by(just(','))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just('['), just(']')),
        )
        .map(|(relations, filters)| FilteredSegment { relations, filters })
}

pub fn identifier<'a>() -> impl Parser<'a, &'a str, Identifier, Extra<'a>> + Clone {
    let filtered = filtered_segment()
        .separated_by(just('.'))
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(just('.'))
        .then(path())
        .map(|(segments, leaf)| Identifier::Filtered { segments, leaf });

    filtered.or(path().map(Identifier::Unfiltered))
}

/// `function(identifier)`, `function(DISTINCT identifier)` or `function(function(...))`
pub fn function_identifier<'a>() -> impl Parser<'a, &'a str, Identifier, Extra<'a>> + Clone {
    recursive(|function| {
        let distinct = keyword("distinct")
            .then(text::whitespace().at_least(1))
            .or_not()
            .map(|distinct| distinct.is_some());

        name()
            .then_ignore(just('(').padded())
            .then(choice((
                function.map(|inner| (false, inner)),
                distinct.then(identifier()),
            )))
            .then_ignore(just(')').padded())
            .map(|(name, (distinct, inner))| Identifier::Function {
                name: name.to_lowercase(),
                distinct,
                inner: Box::new(inner),
            })
    })
}

/// `(table.attribute [WHERE path operator value] [CORRELATE])`
pub fn subquery<'a>() -> impl Parser<'a, &'a str, Subquery, Extra<'a>> + Clone {
    let selected = function_identifier().or(path()
        .filter(|path: &Path| !path.steps.is_empty())
        .map(Identifier::Unfiltered));

    let refinement = keyword("where")
        .padded()
        .ignore_then(path())
        .then(operator().padded())
        .then(value())
        .map(|((identifier, operator), value)| Refinement::Where {
            identifier,
            operator,
            value,
        });

    let correlate = keyword("correlate").padded().to(Refinement::Correlate);

    selected
        .padded()
        .then(refinement.or_not())
        .then(correlate.or_not())
        .then_ignore(text::whitespace())
        .delimited_by(just('('), just(')'))
        .map(|((identifier, refinement), correlate)| Subquery {
            identifier,
            refinements: refinement.into_iter().chain(correlate).collect(),
        })
}

fn argument<'a>() -> impl Parser<'a, &'a str, Argument, Extra<'a>> + Clone {
    subquery()
        .map(|subquery| Argument::Subquery(Box::new(subquery)))
        .or(list_value().map(Argument::Token))
}

fn argument_list<'a>() -> impl Parser<'a, &'a str, ArgumentList, Extra<'a>> + Clone {
    choice((
        subquery().map(|subquery| ArgumentList::Subquery(Box::new(subquery))),
        value_list()
            .padded()
            .delimited_by(just('('), just(')'))
            .map(ArgumentList::Tokens),
        value_list().map(ArgumentList::Tokens),
    ))
}

/// Fold a list of clauses into a single one.
fn combine(mut clauses: Vec<Clause>, combinator: fn(Vec<Clause>) -> Clause) -> Clause {
    match clauses.len() {
        1 => clauses.remove(0),
        _ => combinator(clauses),
    }
}

pub fn clause<'a>() -> impl Parser<'a, &'a str, Clause, Extra<'a>> + Clone {
    recursive(|clause| {
        let function = function_identifier()
            .then(operator().padded())
            .then(argument())
            .map(|((identifier, operator), argument)| Clause::Function {
                identifier,
                operator,
                argument,
            });

        let between = identifier()
            .then_ignore(keyword("between").padded())
            .then(value())
            .then_ignore(and_op().padded())
            .then(value())
            .map(|((identifier, low), high)| Clause::Between {
                identifier,
                low,
                high,
            });

        let in_set = identifier()
            .then(keyword("not").padded().or_not())
            .then_ignore(keyword("in").padded())
            .then(argument_list())
            .map(|((identifier, negated), arguments)| Clause::InSet {
                identifier,
                negated: negated.is_some(),
                arguments,
            });

        let on_date = identifier()
            .then_ignore(keyword("on").padded())
            .then(value())
            .map(|(identifier, value)| Clause::OnDate { identifier, value });

        let binary = identifier()
            .then(operator().padded())
            .then(argument())
            .map(|((identifier, operator), argument)| Clause::Binary {
                identifier,
                operator,
                argument,
            });

        let parenthesized = clause
            .padded()
            .delimited_by(just('('), just(')'))
            .map(|clause| Clause::Parenthesized(Box::new(clause)));

        let base = choice((function, between, in_set, on_date, binary, parenthesized))
            .padded()
            .boxed();

        let not_term = not_op()
            .padded()
            .repeated()
            .count()
            .then(base)
            .map(|(count, clause)| (0..count).fold(clause, |clause, _| Clause::Not(Box::new(clause))));

        let and_term = not_term
            .separated_by(and_op().padded())
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|clauses| combine(clauses, Clause::And));

        and_term
            .separated_by(or_op().padded())
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|clauses| combine(clauses, Clause::Or))
    })
}

/// `domain WHERE clause`
pub fn mapper_statement<'a>() -> impl Parser<'a, &'a str, MapperStatement, Extra<'a>> + Clone {
    name()
        .padded()
        .then_ignore(keyword("where"))
        .then(clause())
        .then_ignore(end())
        .map(|(domain, clause)| MapperStatement { domain, clause })
}

/// `domain operator value`, `domain operator *` or `domain IN values`
pub fn domain_statement<'a>() -> impl Parser<'a, &'a str, DomainStatement, Extra<'a>> + Clone {
    let star = operator()
        .padded()
        .then_ignore(just('*').padded())
        .then_ignore(end())
        .map(|operator| (operator, DomainValue::Star));

    let single = operator()
        .padded()
        .then(value().padded())
        .then_ignore(end())
        .map(|(operator, value)| (operator, DomainValue::Token(value)));

    let list = keyword("in")
        .padded()
        .ignore_then(values(value()).padded())
        .then_ignore(end())
        .map(|values| (Operator::In, DomainValue::List(values)));

    name()
        .padded()
        .then(choice((star, single, list)))
        .map(|(domain, (operator, value))| DomainStatement {
            domain,
            operator,
            value,
        })
}

/// Nothing but values.
pub fn value_list_statement<'a>() -> impl Parser<'a, &'a str, ValueListStatement, Extra<'a>> + Clone {
    values(value())
        .padded()
        .then_ignore(end())
        .map(|values| ValueListStatement { values })
}

fn run<'a, O>(parser: impl Parser<'a, &'a str, O, Extra<'a>>, text: &'a str) -> Result<O, Error> {
    parser.parse(text).into_result().map_err(|errors| {
        let (position, message) = errors
            .first()
            .map(|err| (err.span().start, err.to_string()))
            .unwrap_or_default();
        Error::Syntax {
            text: text.to_string(),
            position,
            message,
        }
    })
}

pub fn parse_mapper(text: &str) -> Result<MapperStatement, Error> {
    run(mapper_statement(), text)
}

pub fn parse_domain(text: &str) -> Result<DomainStatement, Error> {
    run(domain_statement(), text)
}

pub fn parse_value_list(text: &str) -> Result<ValueListStatement, Error> {
    run(value_list_statement(), text)
}

/// Parse any kind of statement, trying the most specific one first.
///
/// If none matches, the error which got the furthest is reported.
pub fn parse(text: &str) -> Result<Statement, Error> {
    let mapper = match parse_mapper(text) {
        Ok(statement) => return Ok(Statement::Mapper(statement)),
        Err(err) => err,
    };
    let domain = match parse_domain(text) {
        Ok(statement) => return Ok(Statement::Domain(statement)),
        Err(err) => err,
    };
    let list = match parse_value_list(text) {
        Ok(statement) => return Ok(Statement::ValueList(statement)),
        Err(err) => err,
    };

    let position = |err: &Error| match err {
        Error::Syntax { position, .. } => *position,
        _ => 0,
    };

    let mut best = mapper;
    for err in [domain, list] {
        if position(&err) > position(&best) {
            best = err;
        }
    }
    Err(best)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(names: &str) -> Path {
        Path::new(names.split('.').map(String::from).collect())
    }

    fn ident(names: &str) -> Identifier {
        Identifier::Unfiltered(path(names))
    }

    fn string(value: &str) -> Token {
        Token::String(value.into())
    }

    fn number(value: &str) -> Token {
        Token::classify(value)
    }

    fn mapper(text: &str) -> MapperStatement {
        match parse_mapper(text) {
            Ok(statement) => statement,
            Err(err) => panic!("failed to parse '{text}': {err}"),
        }
    }

    #[test]
    fn test_values() {
        for (text, expected) in [
            ("Poa", string("Poa")),
            ("'Poa annua'", string("Poa annua")),
            (r#""say \"hi\"""#, string(r#"say "hi""#)),
            ("None", Token::None),
            ("'None'", string("None")),
            ("Empty", Token::Empty),
            ("2021-01-01", string("2021-01-01")),
            ("P_1%", string("P_1%")),
        ] {
            assert_eq!(value().parse(text).unwrap(), expected, "{text}");
        }

        assert_eq!(
            value().parse("-1.5").unwrap(),
            Token::Numeric {
                value: -1.5,
                raw: "-1.5".into()
            }
        );
        assert!(value().parse("a b").has_errors());
    }

    #[test]
    fn test_operators() {
        for (text, expected) in [
            ("=", Operator::Equal),
            ("==", Operator::Equal),
            ("IS", Operator::Equal),
            ("<>", Operator::NotEqual),
            ("not", Operator::NotEqual),
            ("<=", Operator::LessEqual),
            ("ILike", Operator::Like),
            ("has", Operator::Contains),
        ] {
            assert_eq!(operator().parse(text).unwrap(), expected, "{text}");
        }
        assert!(operator().parse("in").has_errors());
        assert!(operator().parse("between").has_errors());
    }

    #[test]
    fn test_binary() {
        assert_eq!(
            mapper("genus where family.epithet = Poaceae"),
            MapperStatement {
                domain: "genus".into(),
                clause: Clause::Binary {
                    identifier: ident("family.epithet"),
                    operator: Operator::Equal,
                    argument: Argument::Token(string("Poaceae")),
                },
            }
        );
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(
            mapper("plant WHERE quantity > 2 OR quantity < 1"),
            mapper("plant where quantity > 2 or quantity < 1"),
        );
        assert_eq!(
            mapper("plant where quantity>2||quantity<1"),
            mapper("plant where quantity > 2 or quantity < 1"),
        );
    }

    #[test]
    fn test_precedence() {
        let statement = mapper("plant where not code = a and quantity = 1 or quantity = 2");
        assert_eq!(
            statement.clause,
            Clause::Or(vec![
                Clause::And(vec![
                    Clause::Not(Box::new(Clause::Binary {
                        identifier: ident("code"),
                        operator: Operator::Equal,
                        argument: Argument::Token(string("a")),
                    })),
                    Clause::Binary {
                        identifier: ident("quantity"),
                        operator: Operator::Equal,
                        argument: Argument::Token(number("1")),
                    },
                ]),
                Clause::Binary {
                    identifier: ident("quantity"),
                    operator: Operator::Equal,
                    argument: Argument::Token(number("2")),
                },
            ])
        );
    }

    #[test]
    fn test_parenthesized() {
        let statement = mapper("plant where not (quantity = 1 or quantity = 2)");
        assert!(matches!(
            statement.clause,
            Clause::Not(inner) if matches!(*inner, Clause::Parenthesized(_))
        ));
    }

    #[test]
    fn test_between_in_on() {
        assert_eq!(
            mapper("plant where quantity between 1 and 3").clause,
            Clause::Between {
                identifier: ident("quantity"),
                low: number("1"),
                high: number("3"),
            }
        );
        assert_eq!(
            mapper("plant where code in P1, P2 P3 and quantity = 1").clause,
            Clause::And(vec![
                Clause::InSet {
                    identifier: ident("code"),
                    negated: false,
                    arguments: ArgumentList::Tokens(ValueList(vec![
                        string("P1"),
                        string("P2"),
                        string("P3"),
                    ])),
                },
                Clause::Binary {
                    identifier: ident("quantity"),
                    operator: Operator::Equal,
                    argument: Argument::Token(number("1")),
                },
            ])
        );
        assert_eq!(
            mapper("plant where code not in ('P1', 'P2')").clause,
            Clause::InSet {
                identifier: ident("code"),
                negated: true,
                arguments: ArgumentList::Tokens(ValueList(vec![string("P1"), string("P2")])),
            }
        );
        assert_eq!(
            mapper("plant where planted on 1/1/2021").clause,
            Clause::OnDate {
                identifier: ident("planted"),
                value: string("1/1/2021"),
            }
        );
    }

    #[test]
    fn test_filtered_identifier() {
        assert_eq!(
            mapper("family where genera[epithet='Poa', author!=None].species.epithet = annua")
                .clause,
            Clause::Binary {
                identifier: Identifier::Filtered {
                    segments: vec![FilteredSegment {
                        relations: vec!["genera".into()],
                        filters: vec![
                            InlineFilter {
                                attribute: "epithet".into(),
                                operator: Operator::Equal,
                                value: string("Poa"),
                            },
                            InlineFilter {
                                attribute: "author".into(),
                                operator: Operator::NotEqual,
                                value: Token::None,
                            },
                        ],
                    }],
                    leaf: path("species.epithet"),
                },
                operator: Operator::Equal,
                argument: Argument::Token(string("annua")),
            }
        );
    }

    #[test]
    fn test_functions() {
        assert_eq!(
            mapper("genus where COUNT(DISTINCT species.id) > 1").clause,
            Clause::Function {
                identifier: Identifier::Function {
                    name: "count".into(),
                    distinct: true,
                    inner: Box::new(ident("species.id")),
                },
                operator: Operator::Greater,
                argument: Argument::Token(number("1")),
            }
        );

        let statement = mapper("genus where max(length(species.epithet)) >= 10");
        let Clause::Function { identifier, .. } = statement.clause else {
            panic!("not a function clause");
        };
        assert_eq!(identifier.to_string(), "max(length(species.epithet))");
    }

    #[test]
    fn test_subquery() {
        let statement = mapper(
            "species where accessions.received = (max(accession.received) where code like A% correlate)",
        );
        let Clause::Binary {
            argument: Argument::Subquery(subquery),
            ..
        } = statement.clause
        else {
            panic!("not a sub-query");
        };
        assert!(subquery.is_correlated());
        assert_eq!(subquery.refinements.len(), 2);

        let statement = mapper(
            "species where genus.epithet in (genus.epithet where family.epithet = Poaceae)",
        );
        assert_eq!(
            statement.clause,
            Clause::InSet {
                identifier: ident("genus.epithet"),
                negated: false,
                arguments: ArgumentList::Subquery(Box::new(Subquery {
                    identifier: ident("genus.epithet"),
                    refinements: vec![Refinement::Where {
                        identifier: path("family.epithet"),
                        operator: Operator::Equal,
                        value: string("Poaceae"),
                    }],
                })),
            }
        );

        let statement = mapper("accession where count(plants.id) > (max(plant.quantity) correlate)");
        let Clause::Function { argument, .. } = statement.clause else {
            panic!("not a function clause");
        };
        assert_eq!(
            argument,
            Argument::Subquery(Box::new(Subquery {
                identifier: Identifier::Function {
                    name: "max".into(),
                    distinct: false,
                    inner: Box::new(ident("plant.quantity")),
                },
                refinements: vec![Refinement::Correlate],
            }))
        );
    }

    #[test]
    fn test_domain_statement() {
        assert_eq!(
            parse_domain("loc=LOC1").unwrap(),
            DomainStatement {
                domain: "loc".into(),
                operator: Operator::Equal,
                value: DomainValue::Token(string("LOC1")),
            }
        );
        assert_eq!(
            parse_domain("genus = *").unwrap().value,
            DomainValue::Star
        );
        assert_eq!(
            parse_domain("gen in Poa Inga, Acacia").unwrap().value,
            DomainValue::List(ValueList(vec![
                string("Poa"),
                string("Inga"),
                string("Acacia"),
            ]))
        );
        assert!(parse_domain("genus where epithet = Poa").is_err());
        assert!(parse_domain("Poa annua").is_err());
    }

    #[test]
    fn test_statements() {
        assert!(matches!(
            parse("genus where epithet = Poa"),
            Ok(Statement::Mapper(_))
        ));
        assert!(matches!(parse("gen = Poa"), Ok(Statement::Domain(_))));
        assert!(matches!(
            parse("Poa annua, 'Inga edulis' and"),
            Ok(Statement::ValueList(statement)) if statement.values.len() == 4
        ));
    }

    #[test]
    fn test_syntax_error() {
        let Err(Error::Syntax { text, position, .. }) = parse_mapper("genus where epithet = ")
        else {
            panic!("not a syntax error");
        };
        assert_eq!(text, "genus where epithet = ");
        assert!(position >= "genus where epithet".len(), "{position}");

        assert!(matches!(parse("genus where (epithet = Poa"), Err(Error::Syntax { .. })));
    }
}
