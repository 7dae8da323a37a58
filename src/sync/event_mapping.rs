use serde::{Deserialize, Serialize};

use crate::events::EventRecord;
use crate::storage::config::SyncConfig;

/// Request body for `events.insert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBody {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDateTime {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone")]
    pub time_zone: String,
}

pub fn detail_link(base_url: &str, path_template: &str, id: i64) -> String {
    let path = path_template.replace("{id}", &id.to_string());
    let separator = if path.starts_with('/') { "" } else { "/" };
    format!("{}{}{}", base_url.trim_end_matches('/'), separator, path)
}

pub fn description(record: &EventRecord, link: &str, site_name: &str) -> String {
    let rsvp_limit = record
        .rsvp_limit
        .map(|limit| limit.to_string())
        .unwrap_or_else(|| "None".to_string());

    let names = record.rsvp_names();
    let rsvps = if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    };

    [
        format!("Description: {}", record.description),
        format!("Event Type: {}", record.event_type),
        format!("RSVP Limit: {}", rsvp_limit),
        format!("RSVPS: {}", rsvps),
        format!("View on <a href={}>{}</a>", link, site_name),
    ]
    .join("\n")
}

/// Turns event records into calendar request bodies.
#[derive(Debug, Clone)]
pub struct EventMapper {
    time_zone: String,
    site_base_url: String,
    site_name: String,
    detail_path: String,
}

impl EventMapper {
    pub fn new(time_zone: impl Into<String>, site_base_url: impl Into<String>) -> Self {
        Self {
            time_zone: time_zone.into(),
            site_base_url: site_base_url.into(),
            site_name: "HKN website".to_string(),
            detail_path: "/events/{id}".to_string(),
        }
    }

    pub fn from_config(sync: &SyncConfig) -> Self {
        Self::new(sync.time_zone.clone(), sync.site_base_url.clone())
            .with_site_name(sync.site_name.clone())
            .with_detail_path(sync.detail_path.clone())
    }

    pub fn with_site_name(mut self, site_name: String) -> Self {
        self.site_name = site_name;
        self
    }

    pub fn with_detail_path(mut self, detail_path: String) -> Self {
        self.detail_path = detail_path;
        self
    }

    pub fn to_body(&self, record: &EventRecord) -> EventBody {
        let link = detail_link(&self.site_base_url, &self.detail_path, record.id);

        EventBody {
            summary: record.name.clone(),
            location: record.location.clone(),
            description: description(record, &link, &self.site_name),
            start: EventDateTime {
                date_time: record.start_time.to_api_string(),
                time_zone: self.time_zone.clone(),
            },
            end: EventDateTime {
                date_time: record.end_time.to_api_string(),
                time_zone: self.time_zone.clone(),
            },
        }
    }

    /// Record id and request body for each record, in order.
    pub fn plan<'a>(
        &self,
        records: impl IntoIterator<Item = &'a EventRecord>,
    ) -> Vec<(i64, EventBody)> {
        records
            .into_iter()
            .map(|record| (record.id, self.to_body(record)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Attendee, EventTime};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn create_test_record(rsvps: Vec<Attendee>, rsvp_limit: Option<u32>) -> EventRecord {
        EventRecord {
            id: 42,
            name: "Intro to Git".to_string(),
            location: "Soda 306".to_string(),
            event_type: "Tech Talk".to_string(),
            description: "Learn version control".to_string(),
            start_time: EventTime::parse("2024-02-10T18:00:00-08:00").unwrap(),
            end_time: EventTime::parse("2024-02-10T19:00:00-08:00").unwrap(),
            rsvp_limit,
            rsvps,
        }
    }

    fn mapper() -> EventMapper {
        EventMapper::new("America/Los_Angeles", "https://dev-hkn.eecs.berkeley.edu")
    }

    #[test]
    fn description_lists_all_fields() {
        let record = create_test_record(
            vec![Attendee::new("Ada", "Lovelace"), Attendee::new("Alan", "Turing")],
            Some(30),
        );

        let text = description(&record, "https://example.org/events/42", "HKN website");

        assert_eq!(
            text,
            "Description: Learn version control\n\
             Event Type: Tech Talk\n\
             RSVP Limit: 30\n\
             RSVPS: Ada Lovelace, Alan Turing\n\
             View on <a href=https://example.org/events/42>HKN website</a>"
        );
    }

    #[test]
    fn missing_limit_and_rsvps_render_as_none() {
        let record = create_test_record(vec![], None);

        let text = description(&record, "L", "HKN website");

        assert!(text.contains("RSVP Limit: None\n"));
        assert!(text.contains("RSVPS: None\n"));
    }

    #[test]
    fn detail_link_joins_base_and_path() {
        assert_eq!(
            detail_link("https://example.org/", "/events/{id}", 5),
            "https://example.org/events/5"
        );
        assert_eq!(
            detail_link("https://example.org", "events/{id}/detail", 5),
            "https://example.org/events/5/detail"
        );
    }

    #[test]
    fn body_carries_times_in_configured_zone() {
        let record = create_test_record(vec![], None);

        let body = mapper().to_body(&record);

        assert_eq!(body.summary, "Intro to Git");
        assert_eq!(body.location, "Soda 306");
        assert_eq!(
            body.start,
            EventDateTime {
                date_time: "2024-02-10T18:00:00-08:00".to_string(),
                time_zone: "America/Los_Angeles".to_string(),
            }
        );
        assert_eq!(body.end.date_time, "2024-02-10T19:00:00-08:00");
        assert!(body.description.ends_with(
            "<a href=https://dev-hkn.eecs.berkeley.edu/events/42>HKN website</a>"
        ));
    }

    #[test]
    fn body_serializes_with_google_field_names() {
        let body = mapper().to_body(&create_test_record(vec![], None));

        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["start"]["dateTime"], "2024-02-10T18:00:00-08:00");
        assert_eq!(json["end"]["timeZone"], "America/Los_Angeles");
        assert_eq!(json["summary"], "Intro to Git");
    }

    #[test]
    fn custom_site_name_and_path_are_used() {
        let body = mapper()
            .with_site_name("club site".to_string())
            .with_detail_path("/e/{id}".to_string())
            .to_body(&create_test_record(vec![], None));

        assert!(body.description.ends_with(
            "<a href=https://dev-hkn.eecs.berkeley.edu/e/42>club site</a>"
        ));
    }

    #[test]
    fn plan_keeps_record_order_and_ids() {
        let mut quiz = create_test_record(vec![], None);
        quiz.id = 9;
        quiz.name = "Quiz Night".to_string();
        let records = vec![create_test_record(vec![], None), quiz];

        let plan = mapper().plan(&records);

        let ids: Vec<i64> = plan.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![42, 9]);
        assert_eq!(plan[1].1.summary, "Quiz Night");
        assert!(plan[1].1.description.contains("/events/9>"));
    }

    proptest! {
        #[test]
        fn description_always_has_five_lines(
            names in prop::collection::vec(("[A-Za-z]{1,8}", "[A-Za-z]{0,8}"), 0..6),
            limit in prop::option::of(0u32..500),
        ) {
            let rsvps = names
                .iter()
                .map(|(first, last)| Attendee::new(first.as_str(), last.as_str()))
                .collect::<Vec<_>>();
            let record = create_test_record(rsvps, limit);

            let text = description(&record, "L", "S");
            let lines: Vec<&str> = text.lines().collect();

            prop_assert_eq!(lines.len(), 5);
            prop_assert!(lines[3].starts_with("RSVPS: "));
            if names.is_empty() {
                prop_assert_eq!(lines[3], "RSVPS: None");
            } else {
                prop_assert_eq!(lines[3].matches(", ").count(), names.len() - 1);
            }
        }
    }
}
