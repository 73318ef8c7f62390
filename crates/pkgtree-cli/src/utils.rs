use std::{
    fmt::Display,
    sync::{LazyLock, PoisonError, RwLock},
};

use nu_ansi_term::Color;
use pkgtree_core::{error::RepositoryError, Result};

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn set_color(enabled: bool) {
    *COLOR.write().unwrap_or_else(PoisonError::into_inner) = enabled;
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = *COLOR.read().unwrap_or_else(PoisonError::into_inner);
        if color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Parses a comma separated option value with `parse`, naming `what` in the
/// error.
pub fn parse_list<T, E: Display>(
    values: &[String],
    what: &str,
    parse: impl Fn(&str) -> std::result::Result<T, E>,
) -> Result<Vec<T>> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| {
            parse(value).map_err(|err| {
                RepositoryError::InvalidArgument(format!("invalid {what} '{value}': {err}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pkgtree_qa::QaCheckProperty;
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_parse_list() {
        let values = vec!["slow".to_string(), " ".to_string(), "needs_vcs".to_string()];
        let parsed = parse_list(&values, "property", QaCheckProperty::from_str).unwrap();
        assert_eq!(parsed, vec![QaCheckProperty::Slow, QaCheckProperty::NeedsVcs]);

        let err = parse_list(&["fast".to_string()], "property", QaCheckProperty::from_str)
            .unwrap_err();
        assert!(err.to_string().contains("invalid property 'fast'"));
    }

    #[test]
    #[serial]
    fn test_colored_plain() {
        set_color(false);
        assert_eq!(Colored(Color::Red, "x").to_string(), "x");
        set_color(true);
    }
}
