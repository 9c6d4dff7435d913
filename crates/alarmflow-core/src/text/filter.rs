// ── Whitelist / blacklist filter ──

/// Outcome of checking a fax against the keyword lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    /// A whitelist is configured and no line contains any of its entries.
    NotWhitelisted,
    /// A line contains the given blacklisted entry.
    Blacklisted(String),
}

impl FilterVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Substring filter over normalized OCR lines.
///
/// The whitelist is checked first, the blacklist second. A blacklist hit
/// rejects the fax even when the whitelist matched.
#[derive(Debug, Clone, Default)]
pub struct AlarmFilter {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl AlarmFilter {
    /// Empty entries are dropped; they would match every line.
    pub fn new(whitelist: &[String], blacklist: &[String]) -> Self {
        let keep = |list: &[String]| -> Vec<String> {
            list.iter().filter(|s| !s.is_empty()).cloned().collect()
        };
        Self {
            whitelist: keep(whitelist),
            blacklist: keep(blacklist),
        }
    }

    pub fn check(&self, lines: &[String]) -> FilterVerdict {
        if !self.whitelist.is_empty()
            && !lines
                .iter()
                .any(|line| self.whitelist.iter().any(|w| line.contains(w.as_str())))
        {
            return FilterVerdict::NotWhitelisted;
        }

        for line in lines {
            if let Some(hit) = self.blacklist.iter().find(|b| line.contains(b.as_str())) {
                return FilterVerdict::Blacklisted(hit.clone());
            }
        }
        FilterVerdict::Accept
    }
}
