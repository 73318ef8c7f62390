mod message;
mod reporter;

pub use message::*;
pub use reporter::*;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    fn finding(level: QaMessageLevel) -> QaMessage {
        QaMessage::new(
            "cat-one/pkg-one/pkg-one-1.ebuild",
            level,
            "whitespace",
            "trailing whitespace on line 3",
        )
    }

    #[test]
    fn test_level_ordering() {
        let levels: Vec<_> = QaMessageLevel::iter().collect();
        assert_eq!(
            levels,
            vec![
                QaMessageLevel::Debug,
                QaMessageLevel::Info,
                QaMessageLevel::Warning,
                QaMessageLevel::Error,
            ]
        );
        assert!(QaMessageLevel::Debug < QaMessageLevel::Info);
        assert!(QaMessageLevel::Warning < QaMessageLevel::Error);
    }

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!(
            QaMessageLevel::from_str("warning").unwrap(),
            QaMessageLevel::Warning
        );
        assert_eq!(
            QaMessageLevel::from_str("ERROR").unwrap(),
            QaMessageLevel::Error
        );
        assert!(QaMessageLevel::from_str("fatal").is_err());
        assert_eq!(QaMessageLevel::Info.to_string(), "info");
    }

    #[test]
    fn test_property_parse() {
        assert_eq!(
            QaCheckProperty::from_str("needs_vcs").unwrap(),
            QaCheckProperty::NeedsVcs
        );
        assert_eq!(
            QaCheckProperty::from_str("slow").unwrap(),
            QaCheckProperty::Slow
        );
    }

    #[test]
    fn test_properties_set_logic() {
        let check = QaCheckProperties::new()
            .with(QaCheckProperty::Slow)
            .with(QaCheckProperty::Untested);

        let include: QaCheckProperties = [QaCheckProperty::Slow].into_iter().collect();
        let exclude: QaCheckProperties = [QaCheckProperty::NeedsVcs].into_iter().collect();

        assert!(check.is_superset(&include));
        assert!(check.is_disjoint(&exclude));
        assert!(check.is_superset(&QaCheckProperties::new()));
        assert!(!QaCheckProperties::new().is_superset(&include));
    }

    #[test]
    fn test_message_display() {
        let message = finding(QaMessageLevel::Warning);
        assert_eq!(
            message.to_string(),
            "cat-one/pkg-one/pkg-one-1.ebuild: [warning] whitespace: trailing whitespace on line 3"
        );
    }

    #[test]
    fn test_message_serializes() {
        let json = serde_json::to_string(&finding(QaMessageLevel::Error)).unwrap();
        assert!(json.contains("\"level\":\"error\""));
        assert!(json.contains("\"check\":\"whitespace\""));
    }

    #[test]
    fn test_null_reporter() {
        let mut reporter = NullReporter;
        reporter.status("checking tree");
        reporter.message(finding(QaMessageLevel::Info));
    }

    #[test]
    fn test_channel_reporter() {
        let (mut reporter, rx) = ChannelReporter::new();
        reporter.status("checking tree");
        reporter.message(finding(QaMessageLevel::Warning));
        reporter.message(finding(QaMessageLevel::Error));

        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].level, QaMessageLevel::Error);
    }

    #[test]
    fn test_channel_reporter_receiver_dropped() {
        let (mut reporter, rx) = ChannelReporter::new();
        drop(rx);
        reporter.message(finding(QaMessageLevel::Info));
    }

    #[test]
    fn test_collector_reporter() {
        let mut reporter = CollectorReporter::default();
        assert!(reporter.is_empty());

        reporter.status("checking packages");
        reporter.message(finding(QaMessageLevel::Warning));

        assert_eq!(reporter.len(), 1);
        assert_eq!(reporter.statuses(), &["checking packages".to_string()]);
        assert_eq!(reporter.messages()[0].check, "whitespace");
    }

    #[test]
    fn test_reporter_as_trait_object() {
        let mut collector = CollectorReporter::default();
        {
            let reporter: &mut dyn QaReporter = &mut collector;
            reporter.message(finding(QaMessageLevel::Debug));
        }
        assert_eq!(collector.into_messages().len(), 1);
    }
}
