use crate::error::TopicError;
use crate::sensor::SensorKind;

pub const TOPIC_ROOT: &str = "home";

/// Routed topic `home/<room>/<kind>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub room: String,
    pub kind: SensorKind,
}

/// Splits a transport topic into room and sensor kind
///
/// Only the exact shape `home/<room>/<kind>` is accepted, where `<room>` is a
/// non empty segment and `<kind>` one of the known [`SensorKind`]s.
pub fn route(topic: &str) -> Result<Route, TopicError> {
    let path: Vec<&str> = topic.split('/').collect();
    if path.len() != 3 {
        return Err(TopicError::Malformed(format!(
            "Couldn't split topic: {}",
            topic
        )));
    } else if path[0] != TOPIC_ROOT {
        return Err(TopicError::Malformed(format!("Invalid topic: {}", topic)));
    } else if path[1].is_empty() {
        return Err(TopicError::Malformed(format!("Missing room: {}", topic)));
    }

    let kind: SensorKind = path[2].parse()?;
    Ok(Route {
        room: path[1].to_owned(),
        kind,
    })
}

/// Subscription filters, one single-level wildcard per kind
pub fn subscription_filters() -> Vec<String> {
    SensorKind::ALL
        .iter()
        .map(|kind| format!("{}/+/{}", TOPIC_ROOT, kind))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid_topics() {
        for kind in SensorKind::ALL {
            let topic = format!("home/bedroom/{}", kind);
            assert_eq!(
                Ok(Route {
                    room: "bedroom".to_owned(),
                    kind
                }),
                route(&topic)
            );
        }
    }

    #[test]
    fn test_malformed_topics() {
        let invalid = [
            "",
            "home",
            "home/kitchen",
            "home/kitchen/",
            "home//env",
            "home/kitchen/thermostat",
            "house/kitchen/env",
            "home/kitchen/env/extra",
            "/home/kitchen/env",
        ];
        for topic in invalid {
            assert!(
                matches!(route(topic), Err(TopicError::Malformed(_))),
                "accepted {}",
                topic
            );
        }
    }

    #[test]
    fn test_subscription_filters() {
        assert_eq!(
            vec![
                "home/+/mmwave",
                "home/+/pir",
                "home/+/door",
                "home/+/window",
                "home/+/env",
                "home/+/alert",
            ],
            subscription_filters()
        );
    }
}
