use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// How a new long value / short code pair is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePolicy {
    /// Write the forward entry, then the reverse entry, unconditionally.
    ///
    /// Two concurrent creates for the same unseen value both allocate a
    /// code. The later forward write wins and both codes resolve.
    #[default]
    LastWriterWins,
    /// Write the reverse entry, then claim the forward entry only if it is
    /// still absent. A creator that loses the claim returns the winner's code.
    SetIfAbsent,
}

impl WritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePolicy::LastWriterWins => "last-writer-wins",
            WritePolicy::SetIfAbsent => "set-if-absent",
        }
    }
}

impl Display for WritePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-writer-wins" => Ok(WritePolicy::LastWriterWins),
            "set-if-absent" => Ok(WritePolicy::SetIfAbsent),
            other => Err(format!(
                "unknown write policy '{other}', expected 'last-writer-wins' or 'set-if-absent'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_form() {
        for policy in [WritePolicy::LastWriterWins, WritePolicy::SetIfAbsent] {
            assert_eq!(policy.to_string().parse::<WritePolicy>(), Ok(policy));
        }
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!("first-writer-wins".parse::<WritePolicy>().is_err());
    }
}
