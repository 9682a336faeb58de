//! Gateway topic parsing.
//!
//! Gateways publish on two topic families:
//!
//! - `/{gateway_id}/subnode/{sensor_id}/data_ctrl/property` for telemetry
//! - `/{gateway_id}/subnode/{sensor_id}/common/event` for device events
//!
//! Ids are alphanumeric. Anything else is malformed and dropped.

use std::sync::LazyLock;

use regex::Regex;

use sensor_core::MsgKind;

static TELEMETRY_TOPIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-zA-Z0-9]+)/subnode/([a-zA-Z0-9]+)/data_ctrl/property$")
        .expect("telemetry topic pattern is valid")
});

static EVENT_TOPIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-zA-Z0-9]+)/subnode/([a-zA-Z0-9]+)/common/event$")
        .expect("event topic pattern is valid")
});

/// A recognized gateway topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub msg_kind: MsgKind,
    pub gateway_id: String,
    pub sensor_id: String,
}

/// Parses a topic into its kind and ids, `None` for anything malformed.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic> {
    let (msg_kind, captures) = if let Some(captures) = TELEMETRY_TOPIC.captures(topic) {
        (MsgKind::Telemetry, captures)
    } else if let Some(captures) = EVENT_TOPIC.captures(topic) {
        (MsgKind::DeviceEvent, captures)
    } else {
        return None;
    };

    Some(ParsedTopic {
        msg_kind,
        gateway_id: captures[1].to_string(),
        sensor_id: captures[2].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_topic_parses() {
        let parsed = parse_topic("/GW01/subnode/S123/data_ctrl/property").unwrap();
        assert_eq!(parsed.msg_kind, MsgKind::Telemetry);
        assert_eq!(parsed.gateway_id, "GW01");
        assert_eq!(parsed.sensor_id, "S123");
    }

    #[test]
    fn test_event_topic_parses() {
        let parsed = parse_topic("/gw2/subnode/sensor9/common/event").unwrap();
        assert_eq!(parsed.msg_kind, MsgKind::DeviceEvent);
        assert_eq!(parsed.gateway_id, "gw2");
        assert_eq!(parsed.sensor_id, "sensor9");
    }

    #[test]
    fn test_malformed_topics_rejected() {
        // Missing leading slash
        assert!(parse_topic("GW01/subnode/S123/data_ctrl/property").is_none());
        // Non-alphanumeric id segment
        assert!(parse_topic("/GW-01/subnode/S123/data_ctrl/property").is_none());
        // Empty id segment
        assert!(parse_topic("//subnode/S123/data_ctrl/property").is_none());
        // Wrong suffix
        assert!(parse_topic("/GW01/subnode/S123/data_ctrl/status").is_none());
        // Trailing segment
        assert!(parse_topic("/GW01/subnode/S123/common/event/extra").is_none());
    }
}
