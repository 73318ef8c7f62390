use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use nu_ansi_term::Color::{Blue, Cyan, Green, Red, Yellow};
use pkgtree_core::{
    error::RepositoryError,
    repository::Repository,
    Result,
};
use pkgtree_qa::{QaCheckProperties, QaCheckProperty, QaMessage, QaMessageLevel, QaReporter};
use pkgtree_utils::path::resolve_path;
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{debug, info};

use crate::utils::{parse_list, Colored};

/// Logs findings as they arrive and counts them per level.
#[derive(Default)]
struct LogReporter {
    counts: BTreeMap<QaMessageLevel, usize>,
}

impl QaReporter for LogReporter {
    fn message(&mut self, message: QaMessage) {
        *self.counts.entry(message.level).or_default() += 1;
        let level = match message.level {
            QaMessageLevel::Error => Colored(Red, message.level),
            QaMessageLevel::Warning => Colored(Yellow, message.level),
            QaMessageLevel::Info => Colored(Cyan, message.level),
            QaMessageLevel::Debug => Colored(Blue, message.level),
        };
        info!(
            entry = %message.entry.display(),
            level = %message.level,
            check = message.check,
            text = message.text,
            "[{}] {}: {} ({})",
            level,
            message.entry.display(),
            message.text,
            message.check
        );
    }

    fn status(&mut self, text: &str) {
        debug!("{}", text);
    }
}

pub struct QaOptions<'a> {
    pub target: Option<&'a str>,
    pub level: &'a str,
    pub include: &'a [String],
    pub exclude: &'a [String],
}

/// Runs QA over `target` (or the whole tree) and prints a summary. Returns
/// `false` if any error-level finding was reported.
pub fn run_qa(repo: &dyn Repository, options: QaOptions<'_>, json: bool) -> Result<bool> {
    let Some(qa) = repo.qa_interface() else {
        return Err(RepositoryError::InvalidArgument(format!(
            "{} does not support QA checks",
            repo.name()
        )));
    };

    let minimum_level = QaMessageLevel::from_str(options.level).map_err(|_| {
        RepositoryError::InvalidArgument(format!("invalid level '{}'", options.level))
    })?;
    let include: QaCheckProperties =
        parse_list(options.include, "property", QaCheckProperty::from_str)?
            .into_iter()
            .collect();
    let exclude: QaCheckProperties =
        parse_list(options.exclude, "property", QaCheckProperty::from_str)?
            .into_iter()
            .collect();

    let target = qa_target(repo, options.target)?;
    let mut reporter = LogReporter::default();
    qa.check_qa(&mut reporter, &include, &exclude, minimum_level, &target)?;

    let total: usize = reporter.counts.values().sum();
    if json {
        info!(total = total, counts = ?reporter.counts, "{} findings", total);
    } else {
        let mut builder = Builder::new();
        for (level, count) in &reporter.counts {
            builder.push_record([level.to_string(), count.to_string()]);
        }
        builder.push_record(["total".to_string(), total.to_string()]);
        let table = builder
            .build()
            .with(Panel::header(format!("QA of {}", target.display())))
            .with(Style::rounded())
            .with(BorderCorrection {})
            .to_string();
        info!("\n{table}");
    }

    if total == 0 {
        info!("{}", Colored(Green, "No findings"));
    }
    Ok(!reporter.counts.contains_key(&QaMessageLevel::Error))
}

/// A command-line target is taken relative to the working directory, not
/// to the tree.
fn qa_target(repo: &dyn Repository, target: Option<&str>) -> Result<PathBuf> {
    if let Some(target) = target {
        return Ok(resolve_path(target)?);
    }
    repo.location().map(Path::to_path_buf).ok_or_else(|| {
        RepositoryError::InvalidArgument(format!("{} has no location to check", repo.name()))
    })
}

#[cfg(test)]
mod tests {
    use pkgtree_core::repositories::FakeRepository;
    use pkgtree_utils::path::normalize;

    use super::*;

    #[test]
    fn test_qa_target_relative_to_cwd() {
        let repo = FakeRepository::new("fake").unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            qa_target(&repo, Some("foo1")).unwrap(),
            normalize(&cwd.join("foo1"))
        );
        assert_eq!(
            qa_target(&repo, Some("foo/../bar")).unwrap(),
            normalize(&cwd.join("bar"))
        );
        assert!(matches!(
            qa_target(&repo, None),
            Err(RepositoryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_log_reporter_counts() {
        let mut reporter = LogReporter::default();
        reporter.message(QaMessage::new("/a", QaMessageLevel::Error, "x", "broken"));
        reporter.message(QaMessage::new("/b", QaMessageLevel::Error, "x", "broken"));
        reporter.message(QaMessage::new("/c", QaMessageLevel::Info, "y", "note"));
        reporter.status("Done");

        assert_eq!(reporter.counts.get(&QaMessageLevel::Error), Some(&2));
        assert_eq!(reporter.counts.get(&QaMessageLevel::Info), Some(&1));
        assert_eq!(reporter.counts.get(&QaMessageLevel::Warning), None);
    }
}
