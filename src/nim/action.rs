//! Actions: remove a number of objects from one pile

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::State;
use crate::Error;

/// Remove `count` objects from pile `pile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Action {
    pub pile: usize,
    pub count: u32,
}

impl Action {
    pub fn new(pile: usize, count: u32) -> Self {
        Self { pile, count }
    }

    /// Whether this action may be applied to `state`.
    ///
    /// The pile must exist and hold at least `count` objects, and at least one
    /// object must be removed.
    pub fn is_valid(&self, state: &State) -> bool {
        self.count >= 1
            && state
                .piles()
                .get(self.pile)
                .is_some_and(|&size| self.count <= size)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "From pile {} remove {} object", self.pile, self.count)?;
        if self.count > 1 {
            write!(f, "s")?;
        }
        Ok(())
    }
}

impl FromStr for Action {
    type Err = Error;

    /// Parse one line holding exactly two integers: pile index and count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::ParseAction {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = s.split_whitespace();
        let pile = tokens
            .next()
            .ok_or_else(|| invalid("missing pile index"))?
            .parse::<usize>()
            .map_err(|e| invalid(&format!("pile index: {e}")))?;
        let count = tokens
            .next()
            .ok_or_else(|| invalid("missing object count"))?
            .parse::<u32>()
            .map_err(|e| invalid(&format!("object count: {e}")))?;
        if tokens.next().is_some() {
            return Err(invalid("expected exactly two integers"));
        }

        Ok(Self { pile, count })
    }
}
