//! Maven versions and version ranges.
//!
//! A version is split into items at `.`, `-` and at every switch between
//! digits and letters, so `1.0-rc1`, `1.0.rc.1` and `1.0rc1` compare equal.
//! Trailing items that compare equal to "nothing" (`0`, `ga`, `final`,
//! `release`) are dropped, so `1`, `1.0` and `1.0.0` are the same version.
//!
//! Known qualifiers order as
//! `alpha < beta < milestone < rc < snapshot < (release) < sp`; any other
//! word sorts below a release and above the pre-release qualifiers.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone)]
pub struct MavenVersion {
    text: String,
    items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Number(u64),
    Qualifier(Qualifier),
    Word(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Qualifier {
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Release,
    Sp,
}

impl Item {
    fn from_token(token: &str) -> Self {
        if let Ok(n) = token.parse::<u64>() {
            return Item::Number(n);
        }
        let qualifier = match token.to_ascii_lowercase().as_str() {
            "alpha" | "a" => Qualifier::Alpha,
            "beta" | "b" => Qualifier::Beta,
            "milestone" | "m" => Qualifier::Milestone,
            "rc" | "cr" => Qualifier::Rc,
            "snapshot" => Qualifier::Snapshot,
            "ga" | "final" | "release" => Qualifier::Release,
            "sp" => Qualifier::Sp,
            _ => return Item::Word(token.to_ascii_lowercase()),
        };
        Item::Qualifier(qualifier)
    }

    /// How this item compares to a missing one at the same position.
    fn against_nothing(&self) -> Ordering {
        match self {
            Item::Number(n) => n.cmp(&0),
            Item::Qualifier(q) => q.cmp(&Qualifier::Release),
            Item::Word(_) => Ordering::Less,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Item::Qualifier(q) if *q < Qualifier::Release => 0,
            Item::Word(_) => 1,
            Item::Qualifier(_) => 2,
            Item::Number(_) => 3,
        }
    }
}

impl Ord for Item {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Item::Number(a), Item::Number(b)) => a.cmp(b),
            (Item::Qualifier(a), Item::Qualifier(b)) => a.cmp(b),
            (Item::Word(a), Item::Word(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn tokenize(version: &str) -> Vec<Item> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut previous: Option<char> = None;
    for (i, ch) in version.char_indices() {
        let boundary = match previous {
            _ if ch == '.' || ch == '-' || ch == '_' => true,
            Some(p) => p.is_ascii_digit() != ch.is_ascii_digit() && p != '.' && p != '-' && p != '_',
            None => false,
        };
        if boundary {
            if start < i {
                items.push(Item::from_token(&version[start..i]));
            }
            start = if ch == '.' || ch == '-' || ch == '_' { i + ch.len_utf8() } else { i };
        }
        previous = Some(ch);
    }
    if start < version.len() {
        items.push(Item::from_token(&version[start..]));
    }
    while items
        .last()
        .is_some_and(|item| item.against_nothing() == Ordering::Equal)
    {
        items.pop();
    }
    items
}

impl MavenVersion {
    pub fn parse(version: &str) -> Self {
        let text = version.trim().to_string();
        let items = tokenize(&text);
        Self { text, items }
    }

    pub fn is_snapshot(&self) -> bool {
        self.text.to_ascii_uppercase().ends_with("SNAPSHOT")
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.items.len().max(other.items.len());
        (0..len)
            .map(|i| match (self.items.get(i), other.items.get(i)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(a), None) => a.against_nothing(),
                (None, Some(b)) => b.against_nothing().reverse(),
                (None, None) => Ordering::Equal,
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows ordering: `1.0` == `1.0.0`.
impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for MavenVersion {}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    Inclusive(MavenVersion),
    Exclusive(MavenVersion),
}

impl Bound {
    fn parse(text: &str, inclusive: bool) -> Self {
        let text = text.trim();
        match (text.is_empty(), inclusive) {
            (true, _) => Bound::Unbounded,
            (false, true) => Bound::Inclusive(MavenVersion::parse(text)),
            (false, false) => Bound::Exclusive(MavenVersion::parse(text)),
        }
    }
}

/// A Maven range: `[1.0,2.0)`, `(,2.0]`, `[1.0,)`, or `[1.5]` for exactly one
/// version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Bound,
    pub upper: Bound,
}

impl VersionRange {
    /// Matches every version.
    pub fn unbounded() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Parse one bracketed range. Bare versions and malformed brackets
    /// yield `None`.
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        let open = s.chars().next()?;
        let close = s.chars().last()?;
        if s.len() < 2 || !matches!(open, '[' | '(') || !matches!(close, ']' | ')') {
            return None;
        }
        let inner = &s[1..s.len() - 1];
        match inner.split_once(',') {
            Some((lower, upper)) if !upper.contains(',') => Some(Self {
                lower: Bound::parse(lower, open == '['),
                upper: Bound::parse(upper, close == ']'),
            }),
            Some(_) => None,
            None if open == '[' && close == ']' && !inner.trim().is_empty() => {
                let exact = MavenVersion::parse(inner);
                Some(Self {
                    lower: Bound::Inclusive(exact.clone()),
                    upper: Bound::Inclusive(exact),
                })
            }
            None => None,
        }
    }

    /// Parse a union of ranges such as `[1.0,1.2],[1.5,)`.
    pub fn parse_union(spec: &str) -> Option<Vec<Self>> {
        let mut ranges = Vec::new();
        let mut rest = spec.trim();
        while !rest.is_empty() {
            let end = rest.find([']', ')'])?;
            ranges.push(Self::parse(&rest[..=end])?);
            rest = rest[end + 1..].trim_start();
            if let Some(next) = rest.strip_prefix(',') {
                rest = next.trim_start();
                if rest.is_empty() {
                    return None;
                }
            } else if !rest.is_empty() {
                return None;
            }
        }
        (!ranges.is_empty()).then_some(ranges)
    }

    pub fn contains(&self, version: &MavenVersion) -> bool {
        let above = match self.lower {
            Bound::Unbounded => true,
            Bound::Inclusive(ref v) => version >= v,
            Bound::Exclusive(ref v) => version > v,
        };
        let below = match self.upper {
            Bound::Unbounded => true,
            Bound::Inclusive(ref v) => version <= v,
            Bound::Exclusive(ref v) => version < v,
        };
        above && below
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Bound::Inclusive(lo), Bound::Inclusive(hi)) = (&self.lower, &self.upper) {
            if lo.as_str() == hi.as_str() {
                return write!(f, "[{lo}]");
            }
        }
        match self.lower {
            Bound::Unbounded => f.write_str("(,")?,
            Bound::Inclusive(ref v) => write!(f, "[{v},")?,
            Bound::Exclusive(ref v) => write!(f, "({v},")?,
        }
        match self.upper {
            Bound::Unbounded => f.write_str(")"),
            Bound::Inclusive(ref v) => write!(f, "{v}]"),
            Bound::Exclusive(ref v) => write!(f, "{v})"),
        }
    }
}
