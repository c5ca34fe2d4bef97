//! `@placeholder` expansion inside template strings.
//!
//! # Supported Placeholders
//!
//! - `@integer(min, max)`, `@natural(min, max)`, `@float(min, max)`, `@boolean`
//! - `@string(min, max)`, `@word`, `@sentence`, `@paragraph`, `@title`
//! - `@name`, `@first`, `@last`, `@email`, `@url`, `@ip`, `@city`
//! - `@guid` / `@uuid`, `@id`
//! - `@date(fmt)`, `@datetime(fmt)`, `@time(fmt)` (chrono strftime formats)
//! - `@color`, `@pick(a, b, c)`
//!
//! A string made of a single placeholder becomes a typed value (`"@integer"`
//! yields a number). Placeholders embedded in text are interpolated.
//! Unknown placeholders are left untouched. Out-of-range arguments are a
//! `MockError`.

use super::MAX_REPEAT;
use crate::error::MockError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use fake::faker::address::en::CityName;
use fake::faker::internet::en::{DomainSuffix, FreeEmail, IPv4};
use fake::faker::lorem::en::{Paragraph, Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::Fake;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"@([a-zA-Z]+)(?:\(([^)]*)\))?").unwrap())
}

/// Expand every placeholder in `template`.
pub fn expand_placeholders(template: &str) -> Result<Value, MockError> {
    let regex = get_placeholder_regex();

    let Some(caps) = regex.captures(template) else {
        return Ok(Value::String(template.to_string()));
    };
    let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
    if whole.len() == template.len() {
        let args = parse_args(caps.get(2).map(|m| m.as_str()));
        if let Some(value) = resolve(&caps[1], &args)? {
            return Ok(value);
        }
    }

    let mut failure = None;
    let expanded = regex.replace_all(template, |caps: &regex::Captures| {
        let args = parse_args(caps.get(2).map(|m| m.as_str()));
        match resolve(&caps[1], &args) {
            Ok(Some(Value::String(s))) => s,
            Ok(Some(other)) => other.to_string(),
            Ok(None) => caps[0].to_string(),
            Err(e) => {
                failure.get_or_insert(e);
                String::new()
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(Value::String(expanded.into_owned())),
    }
}

fn parse_args(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|a| a.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn arg<T: std::str::FromStr>(args: &[String], index: usize) -> Option<T> {
    args.get(index).and_then(|a| a.parse().ok())
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn invalid_argument(name: &str, reason: impl Into<String>) -> MockError {
    MockError::InvalidArgument {
        placeholder: name.to_string(),
        reason: reason.into(),
    }
}

fn resolve(name: &str, args: &[String]) -> Result<Option<Value>, MockError> {
    let mut rng = rand::thread_rng();

    let value = match name {
        "integer" | "int" => {
            let (min, max) = ordered(
                arg(args, 0).unwrap_or(-10_000i64),
                arg(args, 1).unwrap_or(10_000i64),
            );
            Value::from(rng.gen_range(min..=max))
        }
        "natural" => {
            let (min, max) = ordered(arg(args, 0).unwrap_or(0u64), arg(args, 1).unwrap_or(10_000u64));
            Value::from(rng.gen_range(min..=max))
        }
        "float" => {
            let (min, max) = ordered(arg(args, 0).unwrap_or(0f64), arg(args, 1).unwrap_or(1000f64));
            if !(min.is_finite() && max.is_finite() && (max - min).is_finite()) {
                return Err(invalid_argument(name, "bounds must be finite and span a finite range"));
            }
            let raw = if min == max { min } else { rng.gen_range(min..max) };
            Value::from((raw * 100.0).round() / 100.0)
        }
        "boolean" | "bool" => Value::Bool(rng.gen()),
        "string" => {
            let (min, max) = ordered(arg(args, 0).unwrap_or(3u64), arg(args, 1).unwrap_or(7u64));
            if max > MAX_REPEAT {
                return Err(invalid_argument(
                    name,
                    format!("length {max} exceeds the limit of {MAX_REPEAT}"),
                ));
            }
            let len = rng.gen_range(min..=max);
            let s: String = (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            Value::String(s)
        }
        "word" => Value::String(Word().fake()),
        "sentence" => Value::String(Sentence(4..10).fake()),
        "paragraph" => Value::String(Paragraph(3..6).fake()),
        "title" => {
            let words: Vec<String> = Words(3..6).fake();
            let title: Vec<String> = words.iter().map(|w| capitalize(w)).collect();
            Value::String(title.join(" "))
        }
        "name" => Value::String(Name().fake()),
        "first" => Value::String(FirstName().fake()),
        "last" => Value::String(LastName().fake()),
        "email" => Value::String(FreeEmail().fake()),
        "url" => {
            let word: String = Word().fake();
            let suffix: String = DomainSuffix().fake();
            Value::String(format!("http://www.{word}.{suffix}"))
        }
        "ip" => Value::String(IPv4().fake()),
        "city" => Value::String(CityName().fake()),
        "guid" | "uuid" => Value::String(uuid::Uuid::new_v4().to_string()),
        "id" => {
            let digits: String = (0..18).map(|_| rng.gen_range(b'0'..=b'9') as char).collect();
            Value::String(digits)
        }
        "date" => Value::String(random_datetime(args.first(), "%Y-%m-%d")),
        "datetime" => Value::String(random_datetime(args.first(), "%Y-%m-%d %H:%M:%S")),
        "time" => Value::String(random_datetime(args.first(), "%H:%M:%S")),
        "color" => Value::String(format!("#{:06x}", rng.gen_range(0..=0xff_ffffu32))),
        "pick" => {
            match args.choose(&mut rng) {
                Some(choice) => Value::String(choice.clone()),
                None => return Ok(None),
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(value))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn random_datetime(format: Option<&String>, default_format: &str) -> String {
    // 1970-01-01 .. 2037-12-31
    let secs = rand::thread_rng().gen_range(0..2_145_830_400i64);
    let datetime: DateTime<Utc> = DateTime::from_timestamp(secs, 0).unwrap_or_default();

    let format = match format {
        Some(f) if !f.is_empty() && !StrftimeItems::new(f).any(|i| matches!(i, Item::Error)) => {
            f.as_str()
        }
        _ => default_format,
    };
    datetime.format(format).to_string()
}
