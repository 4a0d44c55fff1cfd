//! Named placeholder rewriting
//!
//! `@name` placeholders become `$1`, `$2`, ... in order of first appearance,
//! and a name used twice reuses its number. `@@` sequences are copied
//! unchanged, as is everything inside string literals (including `E'...'`
//! escapes and `$tag$` bodies), quoted identifiers and comments.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use type_mapping::SqlValue;

use super::statement::Statement;
use crate::errors::DataError;

/// Statement text in the engine's positional dialect with its ordered values
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn follows_name(sql: &str) -> bool {
    sql.chars().next_back().is_some_and(|c| is_name_char(c) || c == '$')
}

/// Copy a quoted run up to and including its closing `quote`; a doubled quote
/// stays inside the run
fn copy_quoted(chars: &mut Peekable<Chars<'_>>, sql: &mut String, quote: char, backslash_escapes: bool) {
    while let Some(c) = chars.next() {
        sql.push(c);
        if backslash_escapes && c == '\\' {
            if let Some(escaped) = chars.next() {
                sql.push(escaped);
            }
        } else if c == quote {
            if chars.peek() == Some(&quote) {
                chars.next();
                sql.push(quote);
            } else {
                return;
            }
        }
    }
}

fn copy_line_comment(chars: &mut Peekable<Chars<'_>>, sql: &mut String) {
    for c in chars.by_ref() {
        sql.push(c);
        if c == '\n' {
            return;
        }
    }
}

/// Block comments nest
fn copy_block_comment(chars: &mut Peekable<Chars<'_>>, sql: &mut String) {
    let mut depth = 1;
    while let Some(c) = chars.next() {
        sql.push(c);
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            sql.push('*');
            depth += 1;
        } else if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            sql.push('/');
            depth -= 1;
            if depth == 0 {
                return;
            }
        }
    }
}

/// Called after a `$`; copies a `$tag$ ... $tag$` body when one starts here
fn copy_dollar_quoted(chars: &mut Peekable<Chars<'_>>, sql: &mut String) {
    let mut tag = String::new();
    if chars.peek().is_some_and(|c| c.is_ascii_alphabetic() || *c == '_') {
        while let Some(&next) = chars.peek() {
            if !is_name_char(next) {
                break;
            }
            tag.push(next);
            chars.next();
        }
    }

    if chars.peek() != Some(&'$') {
        sql.push_str(&tag);
        return;
    }
    chars.next();

    let delimiter = format!("${}$", tag);
    sql.push_str(&delimiter[1..]);
    let body_start = sql.len();
    for c in chars.by_ref() {
        sql.push(c);
        if sql.len() >= body_start + delimiter.len() && sql.ends_with(&delimiter) {
            return;
        }
    }
}

pub fn bind_placeholders(statement: &Statement) -> Result<BoundStatement, DataError> {
    let text = statement.text();
    let mut sql = String::with_capacity(text.len());
    let mut values = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                sql.push(c);
                copy_quoted(&mut chars, &mut sql, c, false);
                continue;
            }
            'E' | 'e' if chars.peek() == Some(&'\'') && !follows_name(&sql) => {
                sql.push(c);
                sql.push('\'');
                chars.next();
                copy_quoted(&mut chars, &mut sql, '\'', true);
                continue;
            }
            '-' if chars.peek() == Some(&'-') => {
                sql.push(c);
                copy_line_comment(&mut chars, &mut sql);
                continue;
            }
            '/' if chars.peek() == Some(&'*') => {
                sql.push(c);
                sql.push('*');
                chars.next();
                copy_block_comment(&mut chars, &mut sql);
                continue;
            }
            '$' if !follows_name(&sql) => {
                sql.push(c);
                copy_dollar_quoted(&mut chars, &mut sql);
                continue;
            }
            '@' => {}
            _ => {
                sql.push(c);
                continue;
            }
        }

        if chars.peek() == Some(&'@') {
            chars.next();
            sql.push_str("@@");
            continue;
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if !is_name_char(next) {
                break;
            }
            name.push(next);
            chars.next();
        }

        if name.is_empty() {
            sql.push('@');
            continue;
        }

        let key = name.to_ascii_lowercase();
        let position = match positions.get(&key) {
            Some(position) => *position,
            None => {
                let value = statement.parameter(&name).ok_or_else(|| {
                    DataError::Validation(format!("No parameter supplied for placeholder @{}", name))
                })?;
                values.push(value.clone());
                positions.insert(key, values.len());
                values.len()
            }
        };
        sql.push('$');
        sql.push_str(&position.to_string());
    }

    Ok(BoundStatement { sql, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_in_order_of_appearance() {
        let statement = Statement::new("UPDATE dbo.Class SET ClassName=@ClassName WHERE ClassID = @__Key")
            .with_parameter("@__Key", 3)
            .with_parameter("ClassName", "2B");

        let bound = bind_placeholders(&statement).unwrap();
        assert_eq!(bound.sql, "UPDATE dbo.Class SET ClassName=$1 WHERE ClassID = $2");
        assert_eq!(
            bound.values,
            vec![SqlValue::Text("2B".into()), SqlValue::Integer(3)]
        );
    }

    #[test]
    fn test_repeated_name_reuses_position() {
        let statement = Statement::new("DELETE FROM dbo.Grade WHERE StudentID = @Id OR TutorID = @id")
            .with_parameter("Id", 9);

        let bound = bind_placeholders(&statement).unwrap();
        assert_eq!(bound.sql, "DELETE FROM dbo.Grade WHERE StudentID = $1 OR TutorID = $1");
        assert_eq!(bound.values.len(), 1);
    }

    #[test]
    fn test_literals_and_double_at_untouched() {
        let statement = Statement::new("SELECT '@Id', @@VERSION, 'it''s @x' WHERE a = @Id")
            .with_parameter("Id", 1);

        let bound = bind_placeholders(&statement).unwrap();
        assert_eq!(bound.sql, "SELECT '@Id', @@VERSION, 'it''s @x' WHERE a = $1");
    }

    #[test]
    fn test_comments_and_escapes_do_not_hide_later_placeholders() {
        let statement = Statement::new(
            "DELETE FROM dbo.Grade -- the student's grades\n\
             WHERE Note <> E'it\\'s @x' /* don't /* nest @y */ */ AND StudentID = @Id",
        )
        .with_parameter("Id", 7);

        let bound = bind_placeholders(&statement).unwrap();
        assert_eq!(
            bound.sql,
            "DELETE FROM dbo.Grade -- the student's grades\n\
             WHERE Note <> E'it\\'s @x' /* don't /* nest @y */ */ AND StudentID = $1"
        );
        assert_eq!(bound.values, vec![SqlValue::Integer(7)]);
    }

    #[test]
    fn test_dollar_quoted_bodies_and_identifiers_untouched() {
        let statement = Statement::new(
            "SELECT $$it's @a$$, $body$ @b $body$, \"Odd@Name\" FROM dbo.Class WHERE ClassID = @Id",
        )
        .with_parameter("Id", 2);

        let bound = bind_placeholders(&statement).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT $$it's @a$$, $body$ @b $body$, \"Odd@Name\" FROM dbo.Class WHERE ClassID = $1"
        );
    }

    #[test]
    fn test_unbound_placeholder_is_rejected() {
        let statement = Statement::new("SELECT * FROM dbo.Student WHERE StudentID = @Id");

        let err = bind_placeholders(&statement).unwrap_err();
        assert!(matches!(err, DataError::Validation(msg) if msg.contains("@Id")));
    }

    #[test]
    fn test_unreferenced_parameters_are_not_bound() {
        let statement = Statement::new("SELECT 1").with_parameter("Unused", 1);

        let bound = bind_placeholders(&statement).unwrap();
        assert_eq!(bound.sql, "SELECT 1");
        assert!(bound.values.is_empty());
    }
}
