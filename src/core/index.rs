use crate::error::{Result, SpecError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Every chapter, section and question can be repeated. The index keeps track
/// of the repeat number at each level so that every answer gets its own slot.
///
/// Serialized as `CHAPTER.SECTION.QUESTION`, e.g. `0.0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index {
    pub chapter: u32,
    pub section: u32,
    pub question: u32,
}

/// Repeat level of an index component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Chapter,
    Section,
    Question,
}

impl Index {
    pub const DEFAULT: Index = Index {
        chapter: 0,
        section: 0,
        question: 0,
    };

    pub fn new(chapter: u32, section: u32, question: u32) -> Self {
        Self {
            chapter,
            section,
            question,
        }
    }

    /// Parse `c.s.q`; anything other than three dot-separated integers is rejected.
    pub fn parse(index: &str) -> Result<Self> {
        let malformed = || SpecError::MalformedIndex(index.to_string());
        let mut parts = index.split('.');
        let mut next = || -> Result<u32> {
            parts
                .next()
                .ok_or_else(malformed)?
                .trim()
                .parse::<u32>()
                .map_err(|_| malformed())
        };
        let parsed = Index::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(parsed)
    }

    /// Replace exactly one component.
    pub fn with_level(self, level: Level, value: u32) -> Self {
        match level {
            Level::Chapter => Index::new(value, self.section, self.question),
            Level::Section => Index::new(self.chapter, value, self.question),
            Level::Question => Index::new(self.chapter, self.section, value),
        }
    }

    /// Index of the enclosing scope, used only when looking up answers:
    /// question -> section -> chapter. `None` when there is no higher scope.
    pub fn step_up(self) -> Option<Self> {
        if self.question > 0 && self.section > 0 {
            Some(Index::new(self.chapter, self.section - 1, 0))
        } else if self.chapter > 0 {
            Some(Index::new(self.chapter - 1, 0, 0))
        } else {
            None
        }
    }

    /// The value at one level.
    pub fn component(self, level: Level) -> u32 {
        match level {
            Level::Chapter => self.chapter,
            Level::Section => self.section,
            Level::Question => self.question,
        }
    }
}

/// String form of [`Index::with_level`].
pub fn update_index(index: &str, value: u32, level: Level) -> Result<String> {
    Ok(Index::parse(index)?.with_level(level, value).to_string())
}

/// String form of [`Index::step_up`].
pub fn level_up_index(index: &str) -> Result<Option<String>> {
    Ok(Index::parse(index)?.step_up().map(|i| i.to_string()))
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.chapter, self.section, self.question)
    }
}

impl FromStr for Index {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self> {
        Index::parse(s)
    }
}

impl Serialize for Index {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Index {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Index::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_agree() {
        for (c, s, q) in [(0, 0, 0), (1, 2, 3), (12, 0, 7), (0, 40, 0)] {
            let formatted = Index::new(c, s, q).to_string();
            assert_eq!(Index::parse(&formatted).unwrap(), Index::new(c, s, q));
        }
        assert_eq!(Index::default().to_string(), "0.0.0");
    }

    #[test]
    fn parse_rejects_wrong_shapes() {
        for bad in ["", "0.0", "0.0.0.0", "a.b.c", "1..2", "-1.0.0", "1.2.x"] {
            assert!(
                matches!(Index::parse(bad), Err(SpecError::MalformedIndex(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn with_level_touches_one_component() {
        let i = Index::new(1, 2, 3);
        assert_eq!(i.with_level(Level::Chapter, 9), Index::new(9, 2, 3));
        assert_eq!(i.with_level(Level::Section, 9), Index::new(1, 9, 3));
        assert_eq!(i.with_level(Level::Question, 9), Index::new(1, 2, 9));
        assert_eq!(i.with_level(Level::Section, 9).component(Level::Section), 9);
        assert_eq!(i.component(Level::Question), 3);
        assert_eq!(update_index("1.2.3", 0, Level::Section).unwrap(), "1.0.3");
    }

    #[test]
    fn step_up_rules() {
        assert_eq!(Index::new(2, 3, 4).step_up(), Some(Index::new(2, 2, 0)));
        assert_eq!(Index::new(2, 0, 4).step_up(), Some(Index::new(1, 0, 0)));
        assert_eq!(Index::new(2, 3, 0).step_up(), Some(Index::new(1, 0, 0)));
        assert_eq!(Index::new(0, 3, 4).step_up(), Some(Index::new(0, 2, 0)));
        assert_eq!(Index::new(0, 3, 0).step_up(), None);
        assert_eq!(Index::DEFAULT.step_up(), None);
        assert_eq!(level_up_index("0.0.0").unwrap(), None);
    }

    #[test]
    fn step_up_terminates() {
        for c in 0..4 {
            for s in 0..4 {
                for q in 0..4 {
                    let mut cur = Some(Index::new(c, s, q));
                    let mut steps = 0;
                    while let Some(i) = cur {
                        cur = i.step_up();
                        steps += 1;
                        assert!(steps < 16, "step_up from {c}.{s}.{q} does not terminate");
                    }
                }
            }
        }
    }

    #[test]
    fn serde_uses_dotted_string() {
        let json = serde_json::to_string(&Index::new(1, 0, 2)).unwrap();
        assert_eq!(json, "\"1.0.2\"");
        let back: Index = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Index::new(1, 0, 2));
        assert!(serde_json::from_str::<Index>("\"1.0\"").is_err());
    }
}
