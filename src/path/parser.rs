//! Textual path syntax.
//!
//! ```text
//! expr      := "." | step+
//! step      := ("/" | "//") [axis "::"] nametest predicate*
//! nametest  := NAME | "*"
//! predicate := "[" "." "=" literal "]"
//!            | "[" relpath "]"
//! relpath   := ["." | ""] ("/" | "//") step-body ... | step-body ...
//! literal   := '...' | "..."
//! ```
//!
//! A relative path that starts with a bare name uses the child axis.

use crate::path::errors::QueryError;
use crate::path::expr::{Axis, NameTest, PathExpression, Step};
use crate::path::predicate::Predicate;

pub fn parse(input: &str) -> Result<PathExpression, QueryError> {
    let mut cursor = Cursor::new(input);
    cursor.skip_ws();

    if cursor.at_end() {
        return Err(cursor.error("empty path expression"));
    }
    if cursor.rest().trim() == "." {
        return Ok(PathExpression::empty());
    }

    let mut steps = Vec::new();
    while !cursor.at_end() {
        let axis = cursor
            .slash()
            .ok_or_else(|| cursor.error("expected '/' or '//'"))?;
        steps.push(parse_step_body(&mut cursor, axis)?);
        cursor.skip_ws();
    }

    Ok(PathExpression::new(steps))
}

struct Cursor<'s> {
    input: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    fn new(input: &'s str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// `//` or `/`, longest first.
    fn slash(&mut self) -> Option<Axis> {
        if self.eat("//") {
            Some(Axis::Descendant)
        } else if self.eat("/") {
            Some(Axis::Child)
        } else {
            None
        }
    }

    fn name(&mut self) -> &'s str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::Syntax {
            input: self.input.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }
}

fn parse_step_body(cursor: &mut Cursor<'_>, slash_axis: Axis) -> Result<Step, QueryError> {
    cursor.skip_ws();

    let name_test = if cursor.eat("*") {
        NameTest::Any
    } else {
        let name = cursor.name();
        if name.is_empty() {
            return Err(cursor.error("expected node name or '*'"));
        }
        NameTest::Named(name.to_string())
    };

    let (axis, name_test) = if cursor.eat("::") {
        let NameTest::Named(axis_name) = name_test else {
            return Err(cursor.error("'*' is not an axis"));
        };
        if slash_axis == Axis::Descendant {
            return Err(cursor.error("explicit axis is not allowed after '//'"));
        }
        let axis: Axis = axis_name.parse()?;
        let name_test = if cursor.eat("*") {
            NameTest::Any
        } else {
            let name = cursor.name();
            if name.is_empty() {
                return Err(cursor.error("expected node name or '*' after axis"));
            }
            NameTest::Named(name.to_string())
        };
        (axis, name_test)
    } else {
        (slash_axis, name_test)
    };

    let mut step = Step::new(axis, name_test);
    cursor.skip_ws();
    while cursor.peek() == Some('[') {
        cursor.bump();
        step.predicates.push(parse_predicate(cursor)?);
        cursor.skip_ws();
    }
    Ok(step)
}

fn parse_predicate(cursor: &mut Cursor<'_>) -> Result<Predicate, QueryError> {
    cursor.skip_ws();

    match cursor.peek() {
        Some(c) if c.is_ascii_digit() => {
            return Err(cursor.error("positional predicates are not supported"));
        }
        Some('@') => return Err(cursor.error("attribute predicates are not supported")),
        Some(']') => return Err(cursor.error("empty predicate")),
        None => return Err(cursor.error("unterminated predicate")),
        _ => {}
    }

    let predicate = if cursor.rest().starts_with('.') && !cursor.rest().starts_with("./") {
        cursor.bump();
        cursor.skip_ws();
        if !cursor.eat("=") {
            return Err(cursor.error("expected '=' after '.'"));
        }
        cursor.skip_ws();
        Predicate::Value(parse_literal(cursor)?)
    } else {
        Predicate::Nested(parse_relative(cursor)?)
    };

    cursor.skip_ws();
    if !cursor.eat("]") {
        return Err(cursor.error("expected ']'"));
    }
    Ok(predicate)
}

fn parse_relative(cursor: &mut Cursor<'_>) -> Result<PathExpression, QueryError> {
    cursor.eat(".");
    let first_axis = cursor.slash().unwrap_or(Axis::Child);
    let mut steps = vec![parse_step_body(cursor, first_axis)?];

    loop {
        cursor.skip_ws();
        match cursor.slash() {
            Some(axis) => steps.push(parse_step_body(cursor, axis)?),
            None => break,
        }
    }

    Ok(PathExpression::new(steps))
}

fn parse_literal(cursor: &mut Cursor<'_>) -> Result<String, QueryError> {
    let quote = match cursor.peek() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(cursor.error("expected quoted literal")),
    };
    cursor.bump();

    let start = cursor.pos;
    loop {
        match cursor.bump() {
            Some(c) if c == quote => {
                let end = cursor.pos - quote.len_utf8();
                return Ok(cursor.input[start..end].to_string());
            }
            Some(_) => {}
            None => return Err(cursor.error("unterminated literal")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        parse(input).unwrap().to_string()
    }

    #[test]
    fn parse_child_and_descendant_steps() {
        let expr = parse("/unit//class/name").unwrap();
        let axes: Vec<Axis> = expr.steps().iter().map(|s| s.axis).collect();
        assert_eq!(axes, vec![Axis::Child, Axis::Descendant, Axis::Child]);
        assert_eq!(expr.steps()[2].name, NameTest::Named("name".into()));
    }

    #[test]
    fn parse_value_predicate() {
        let expr = parse("//packageName[.='com.foo.bar']").unwrap();
        let step = &expr.steps()[0];
        assert!(matches!(&step.predicates[0], Predicate::Value(v) if v == "com.foo.bar"));

        let expr = parse("//id[ . = \"it's\" ]").unwrap();
        assert!(matches!(&expr.steps()[0].predicates[0], Predicate::Value(v) if v == "it's"));
    }

    #[test]
    fn parse_nested_predicate() {
        let expr = parse("//class[name[.='Foo']]/method").unwrap();
        let Predicate::Nested(nested) = &expr.steps()[0].predicates[0] else {
            panic!("expected nested predicate");
        };
        assert_eq!(nested.steps().len(), 1);
        assert_eq!(nested.steps()[0].axis, Axis::Child);
        assert_eq!(expr.steps().len(), 2);
    }

    #[test]
    fn parse_nested_descendant_and_dot_slash() {
        let expr = parse("//fn[.//call]").unwrap();
        let Predicate::Nested(nested) = &expr.steps()[0].predicates[0] else {
            panic!("expected nested predicate");
        };
        assert_eq!(nested.steps()[0].axis, Axis::Descendant);

        let expr = parse("//fn[//call/arg]").unwrap();
        let Predicate::Nested(nested) = &expr.steps()[0].predicates[0] else {
            panic!("expected nested predicate");
        };
        assert_eq!(nested.steps().len(), 2);
    }

    #[test]
    fn parse_explicit_axes() {
        let expr = parse("/descendant::name").unwrap();
        assert_eq!(expr.steps()[0].axis, Axis::Descendant);
        let expr = parse("/child::*").unwrap();
        assert_eq!(expr.steps()[0].name, NameTest::Any);
    }

    #[test]
    fn unknown_axis_is_unsupported() {
        assert!(matches!(
            parse("/ancestor::class"),
            Err(QueryError::UnsupportedAxis { axis }) if axis == "ancestor"
        ));
    }

    #[test]
    fn unsupported_predicates_are_errors() {
        assert!(matches!(parse("//a[1]"), Err(QueryError::Syntax { .. })));
        assert!(matches!(parse("//a[@id='x']"), Err(QueryError::Syntax { .. })));
        assert!(matches!(parse("//a[]"), Err(QueryError::Syntax { .. })));
    }

    #[test]
    fn syntax_errors_report_position() {
        let err = parse("class/name").unwrap_err();
        assert!(matches!(err, QueryError::Syntax { position: 0, .. }));

        let err = parse("//a[.='x'").unwrap_err();
        assert!(matches!(err, QueryError::Syntax { .. }));

        let err = parse("//a[.='x]").unwrap_err();
        assert!(matches!(err, QueryError::Syntax { ref message, .. } if message == "unterminated literal"));

        assert!(parse("").is_err());
        assert!(parse("//").is_err());
    }

    #[test]
    fn dot_is_the_empty_expression() {
        assert!(parse(".").unwrap().is_empty());
    }

    #[test]
    fn stringify_matches_parsed_form() {
        assert_eq!(roundtrip("//class[name[.='Foo']]/method"), "//class[name[.='Foo']]/method");
        assert_eq!(roundtrip("/unit/*"), "/unit/*");
        assert_eq!(roundtrip("/descendant::x"), "//x");
        assert_eq!(roundtrip("//fn[.//call]"), "//fn[//call]");
    }
}
