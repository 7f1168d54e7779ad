/// Separator between a node's base name and its deletion timestamp.
pub const SEPARATOR: &str = ".d";

/// A name as it appears inside a trash tree: `<base>.d<timestamp>[/<sub path>]`.
///
/// `timestamp` is `None` when the trailing segment is not a plain
/// non-negative integer. That happens for nodes below an already trashed
/// root, which are never a root trash event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrashedName<'a> {
    pub base: &'a str,
    pub timestamp: Option<i64>,
}

impl<'a> TrashedName<'a> {
    pub fn parse(name: &'a str) -> Self {
        let not_root = TrashedName {
            base: name,
            timestamp: None,
        };
        let Some((base, suffix)) = name.rsplit_once(SEPARATOR) else {
            return not_root;
        };
        if base.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return not_root;
        }
        match suffix.parse::<i64>() {
            Ok(timestamp) => TrashedName {
                base,
                timestamp: Some(timestamp),
            },
            Err(_) => not_root,
        }
    }

    /// `(base, timestamp)` when this names the root of a trashed node.
    pub fn root(&self) -> Option<(&'a str, i64)> {
        self.timestamp.map(|ts| (self.base, ts))
    }
}

pub fn format(base: &str, timestamp: i64) -> String {
    format!("{}{}{}", base, SEPARATOR, timestamp)
}
