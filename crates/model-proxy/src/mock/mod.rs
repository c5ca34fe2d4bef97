//! Mock response generation.
//!
//! Executors in `mock`/`mockerr` status never reach the network; they answer
//! with a template from the interface's mock rule, either verbatim or passed
//! through a `MockGenerator`.
//!
//! # Module Structure
//!
//! - `template` - `TemplateEngine`, the default generator (`name|rule` keys)
//! - `placeholder` - `@placeholder` expansion inside strings

mod placeholder;
mod template;

use crate::error::MockError;
use serde_json::Value;

pub use placeholder::expand_placeholders;
pub use template::TemplateEngine;

/// Largest repeat count or generated string length a rule may ask for
pub const MAX_REPEAT: u64 = 10_000;

/// Turns a mock template into a concrete value.
pub trait MockGenerator: Send + Sync {
    fn generate(&self, template: &Value) -> Result<Value, MockError>;
}
