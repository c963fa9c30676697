//! MQTT-style topic patterns for subscriptions.
//!
//! - `+` matches exactly one level
//! - `#` matches the remaining levels, including none; only valid last

/// A parsed subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
    Rest,
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        for part in raw.split('/') {
            match part {
                "+" => segments.push(Segment::Single),
                "#" => {
                    // Anything after `#` can never be reached.
                    segments.push(Segment::Rest);
                    break;
                }
                lit => segments.push(Segment::Literal(lit.to_string())),
            }
        }
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check whether a concrete path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let mut levels = path.split('/');
        for seg in &self.segments {
            match seg {
                Segment::Rest => return true,
                Segment::Single => {
                    if levels.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(lit) => match levels.next() {
                    Some(level) if level == lit => {}
                    _ => return false,
                },
            }
        }
        levels.next().is_none()
    }
}
