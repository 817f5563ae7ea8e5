use std::fmt;

use crate::analysis::{decode_response, TreeResult};

const EXAMPLE_PREFIX: &str = "tweetExample";

const EXAMPLE_ONE: &str = include_str!("../fixtures/example1.json");
const EXAMPLE_TWO: &str = include_str!("../fixtures/example2.json");
const EXAMPLE_THREE: &str = include_str!("../fixtures/example3.json");

/// Symbolic key selecting one of the bundled analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExampleKey {
    One,
    Two,
    Three,
}

impl ExampleKey {
    pub const ALL: [ExampleKey; 3] = [ExampleKey::One, ExampleKey::Two, ExampleKey::Three];

    pub fn parse(raw: &str) -> Option<Self> {
        let number = raw.trim().strip_prefix(EXAMPLE_PREFIX)?;
        match number {
            "1" => Some(ExampleKey::One),
            "2" => Some(ExampleKey::Two),
            "3" => Some(ExampleKey::Three),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            ExampleKey::One => 1,
            ExampleKey::Two => 2,
            ExampleKey::Three => 3,
        }
    }

    pub fn label(&self) -> String {
        format!("Example {}", self.number())
    }

    fn fixture(&self) -> &'static str {
        match self {
            ExampleKey::One => EXAMPLE_ONE,
            ExampleKey::Two => EXAMPLE_TWO,
            ExampleKey::Three => EXAMPLE_THREE,
        }
    }

    /// Decodes the bundled fixture. Fixtures use the same envelope as the
    /// live backend.
    pub fn load(&self) -> Result<TreeResult, serde_json::Error> {
        decode_response(self.fixture())
    }
}

impl fmt::Display for ExampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", EXAMPLE_PREFIX, self.number())
    }
}
