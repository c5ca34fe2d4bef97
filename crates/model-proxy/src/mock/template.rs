//! Template expansion for mock rules.
//!
//! Object keys may carry a generation rule after a `|`:
//!
//! ```json
//! {
//!   "list|1-10": [{"id|+1": 1, "name": "@name"}],
//!   "score|1-100.1-2": 0,
//!   "tag|2": "ab",
//!   "active|1": true,
//!   "status|1": ["open", "closed"]
//! }
//! ```
//!
//! - string: repeat `count` / `min..=max` times
//! - number: random integer in `min..=max`, optional `.dmin-dmax` decimals,
//!   `+step` keeps the base value
//! - boolean: `|1` is a coin flip, `|min-max` keeps the given value with
//!   probability `min / (min + max)`
//! - array: `|1` picks one element, otherwise repeats the contents
//! - object: picks `count` / `min..=max` properties

use super::placeholder::expand_placeholders;
use super::{MockGenerator, MAX_REPEAT};
use crate::error::MockError;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;

static RULE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_rule_regex() -> &'static Regex {
    RULE_REGEX.get_or_init(|| {
        Regex::new(r"^(.+?)\|(?:\+(\d+)|(\d+)(?:-(\d+))?(?:\.(\d+)(?:-(\d+))?)?)$").unwrap()
    })
}

/// Parsed `name|rule` key
#[derive(Debug, Clone, PartialEq)]
struct KeyRule {
    name: String,
    rule: String,
    step: Option<u64>,
    min: Option<u64>,
    max: Option<u64>,
    dmin: Option<u32>,
    dmax: Option<u32>,
}

impl KeyRule {
    fn parse(key: &str) -> Option<Self> {
        let caps = get_rule_regex().captures(key)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());

        Some(Self {
            name: caps[1].to_string(),
            rule: key[caps[1].len() + 1..].to_string(),
            step: num(2),
            min: num(3),
            max: num(4),
            dmin: num(5).map(|d| d.min(16) as u32),
            dmax: num(6).map(|d| d.min(16) as u32),
        })
    }

    fn invalid(&self) -> MockError {
        MockError::InvalidRange {
            key: self.name.clone(),
            rule: self.rule.clone(),
        }
    }

    /// Count drawn from `min` or `min..=max`
    fn count(&self, rng: &mut impl Rng) -> Result<Option<u64>, MockError> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => Err(self.invalid()),
            (Some(min), Some(max)) => Ok(Some(rng.gen_range(min..=max))),
            (Some(min), None) => Ok(Some(min)),
            _ => Ok(None),
        }
    }

    /// Like `count`, bounded by `MAX_REPEAT` since the result sizes an
    /// allocation
    fn repeat_count(&self, rng: &mut impl Rng) -> Result<Option<u64>, MockError> {
        match self.max.or(self.min) {
            Some(upper) if upper > MAX_REPEAT => Err(MockError::TooLarge {
                key: self.name.clone(),
                count: upper,
                limit: MAX_REPEAT,
            }),
            _ => self.count(rng),
        }
    }

    fn decimals(&self, rng: &mut impl Rng) -> Result<Option<u32>, MockError> {
        match (self.dmin, self.dmax) {
            (Some(dmin), Some(dmax)) if dmin > dmax => Err(self.invalid()),
            (Some(dmin), Some(dmax)) => Ok(Some(rng.gen_range(dmin..=dmax))),
            (Some(dmin), None) => Ok(Some(dmin)),
            _ => Ok(None),
        }
    }
}

/// Default `MockGenerator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    fn expand(&self, value: &Value) -> Result<Value, MockError> {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    match KeyRule::parse(key) {
                        Some(rule) => {
                            let generated = self.apply_rule(&rule, value)?;
                            out.insert(rule.name, generated);
                        }
                        None => {
                            out.insert(key.clone(), self.expand(value)?);
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::String(s) => expand_placeholders(s),
            other => Ok(other.clone()),
        }
    }

    fn apply_rule(&self, rule: &KeyRule, value: &Value) -> Result<Value, MockError> {
        let mut rng = rand::thread_rng();

        match value {
            Value::String(s) => match rule.repeat_count(&mut rng)? {
                Some(count) => {
                    let mut out = String::with_capacity(s.len().saturating_mul(count as usize));
                    for _ in 0..count {
                        match expand_placeholders(s)? {
                            Value::String(part) => out.push_str(&part),
                            other => out.push_str(&other.to_string()),
                        }
                    }
                    Ok(Value::String(out))
                }
                None => expand_placeholders(s),
            },
            Value::Number(base) => self.generate_number(rule, base, &mut rng),
            Value::Bool(b) => match (rule.min, rule.max) {
                (Some(min), Some(max)) => match min.checked_add(max) {
                    Some(0) => Ok(Value::Bool(rng.gen())),
                    Some(total) => {
                        let keep = rng.gen_bool(min as f64 / total as f64);
                        Ok(Value::Bool(if keep { *b } else { !*b }))
                    }
                    None => Err(MockError::Overflow {
                        key: rule.name.clone(),
                        rule: rule.rule.clone(),
                    }),
                },
                (Some(_), None) => Ok(Value::Bool(rng.gen())),
                _ => Ok(Value::Bool(*b)),
            },
            Value::Array(items) => {
                if items.is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }
                if rule.min == Some(1) && rule.max.is_none() {
                    let index = rng.gen_range(0..items.len());
                    return self.expand(&items[index]);
                }
                match rule.repeat_count(&mut rng)? {
                    Some(count) => {
                        let mut out =
                            Vec::with_capacity(items.len().saturating_mul(count as usize));
                        for _ in 0..count {
                            for item in items {
                                out.push(self.expand(item)?);
                            }
                        }
                        Ok(Value::Array(out))
                    }
                    None => self.expand(value),
                }
            }
            Value::Object(map) => match rule.count(&mut rng)? {
                Some(count) => {
                    let count = (count as usize).min(map.len());
                    let mut picked = rand::seq::index::sample(&mut rng, map.len(), count).into_vec();
                    picked.sort_unstable();

                    let mut out = Map::with_capacity(count);
                    for (i, (key, value)) in map.iter().enumerate() {
                        if picked.binary_search(&i).is_ok() {
                            out.insert(key.clone(), value.clone());
                        }
                    }
                    self.expand(&Value::Object(out))
                }
                None => self.expand(value),
            },
            Value::Null => Ok(Value::Null),
        }
    }

    fn generate_number(
        &self,
        rule: &KeyRule,
        base: &Number,
        rng: &mut impl Rng,
    ) -> Result<Value, MockError> {
        if rule.step.is_some() {
            return Ok(Value::Number(base.clone()));
        }

        let int_part = match rule.count(rng)? {
            Some(n) => n as i64,
            None => base.as_f64().map(|f| f.trunc() as i64).unwrap_or_default(),
        };

        match rule.decimals(rng)? {
            Some(0) | None => Ok(Value::from(int_part)),
            Some(decimals) => {
                let mut digits: String = (0..decimals - 1)
                    .map(|_| rng.gen_range(b'0'..=b'9') as char)
                    .collect();
                // last digit is never zero so the precision survives
                digits.push(rng.gen_range(b'1'..=b'9') as char);
                let text = format!("{int_part}.{digits}");
                Ok(text
                    .parse::<f64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::from(int_part)))
            }
        }
    }
}

impl MockGenerator for TemplateEngine {
    fn generate(&self, template: &Value) -> Result<Value, MockError> {
        self.expand(template)
    }
}
