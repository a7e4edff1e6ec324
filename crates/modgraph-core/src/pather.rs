use std::fmt;

/// Slash-delimited content path. Segment 0 is the owning mod's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pather {
    parts: Vec<String>,
}

impl Pather {
    pub fn parse(path: &str) -> Self {
        let mut parts: Vec<String> = path.split('/').map(str::to_string).collect();
        if parts.first().is_some_and(|p| p.is_empty()) {
            parts.remove(0);
        }
        Self { parts }
    }

    /// Applies `other` segment by segment: `.` is skipped, `..` drops the last
    /// segment (never the root), anything else is appended.
    pub fn apply(&mut self, other: &Pather) {
        for part in &other.parts {
            match part.as_str() {
                "." => continue,
                ".." => {
                    if self.parts.len() > 1 {
                        self.parts.pop();
                    }
                }
                _ => self.parts.push(part.clone()),
            }
        }
    }

    pub fn apply_str(&mut self, other: &str) {
        self.apply(&Pather::parse(other));
    }

    pub fn pop(&mut self) -> Option<String> {
        self.parts.pop()
    }

    pub fn add(&mut self, part: impl Into<String>) {
        self.parts.push(part.into());
    }

    /// Truncates to the root segment.
    pub fn to_root(&mut self) {
        self.parts.truncate(1);
    }

    pub fn root(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    /// Everything after the mod name, as used for file system lookups.
    pub fn rootless(&self) -> String {
        self.parts.iter().skip(1).map(String::as_str).collect::<Vec<_>>().join("/")
    }
}

impl fmt::Display for Pather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("/"))
    }
}

/// Strips the mod segment off a location string.
pub fn without_root(location: &str) -> &str {
    match location.find('/') {
        Some(idx) => &location[idx + 1..],
        None => location,
    }
}
