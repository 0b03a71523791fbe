use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How and when a survey leaves the building. The three variants are mutually
/// exclusive by construction, so a config can never carry both a schedule and a
/// trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeliveryConfig {
    /// No automation; sends happen only on an explicit request.
    Manual {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        email_addresses: Vec<String>,
    },
    /// Recurring cadence (daily, weekly, or monthly at a time of day).
    Scheduled {
        email_addresses: Vec<String>,
        schedule: DeliverySchedule,
    },
    /// Fires after a delay once a matching business event arrives.
    Triggered {
        email_addresses: Vec<String>,
        trigger: DeliveryTrigger,
    },
}

impl DeliveryConfig {
    pub fn recipients(&self) -> &[String] {
        match self {
            DeliveryConfig::Manual { email_addresses }
            | DeliveryConfig::Scheduled {
                email_addresses, ..
            }
            | DeliveryConfig::Triggered {
                email_addresses, ..
            } => email_addresses,
        }
    }

    /// Reject malformed configs before they are saved or acted on. The
    /// scheduler never guesses a default cadence for a config that fails here.
    pub fn validate(&self) -> Result<(), DeliveryConfigError> {
        match self {
            DeliveryConfig::Manual { .. } => Ok(()),
            DeliveryConfig::Scheduled {
                email_addresses,
                schedule,
            } => {
                require_recipients(email_addresses)?;
                schedule.cadence.validate()
            }
            DeliveryConfig::Triggered {
                email_addresses, ..
            } => require_recipients(email_addresses),
        }
    }
}

fn require_recipients(email_addresses: &[String]) -> Result<(), DeliveryConfigError> {
    if email_addresses
        .iter()
        .any(|address| !address.trim().is_empty())
    {
        Ok(())
    } else {
        Err(DeliveryConfigError::NoRecipients)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySchedule {
    #[serde(flatten)]
    pub cadence: ScheduleCadence,
    /// Time of day in the survey owner's zone, `"HH:MM"` on the wire.
    #[serde(
        serialize_with = "serialize_time",
        deserialize_with = "deserialize_time"
    )]
    pub time: NaiveTime,
    /// No delivery is ever due before this date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

/// Recurrence shape. Weekly carries 0..=6 with 0 = Sunday; monthly carries
/// 1..=31 and clamps to shorter months at scheduling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum ScheduleCadence {
    Daily,
    Weekly { day_of_week: u8 },
    Monthly { day_of_month: u8 },
}

impl ScheduleCadence {
    fn validate(self) -> Result<(), DeliveryConfigError> {
        match self {
            ScheduleCadence::Daily => Ok(()),
            ScheduleCadence::Weekly { day_of_week } if day_of_week > 6 => {
                Err(DeliveryConfigError::DayOfWeekOutOfRange(day_of_week))
            }
            ScheduleCadence::Weekly { .. } => Ok(()),
            ScheduleCadence::Monthly { day_of_month }
                if !(1..=31).contains(&day_of_month) =>
            {
                Err(DeliveryConfigError::DayOfMonthOutOfRange(day_of_month))
            }
            ScheduleCadence::Monthly { .. } => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTrigger {
    #[serde(rename = "type")]
    pub event: TriggerEvent,
    pub delay_hours: u32,
    pub send_automatically: bool,
}

/// Business events that may arm a delayed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerEvent {
    TicketClosed,
    PurchaseCompleted,
}

impl TriggerEvent {
    pub const fn label(self) -> &'static str {
        match self {
            TriggerEvent::TicketClosed => "ticket-closed",
            TriggerEvent::PurchaseCompleted => "purchase-completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryConfigError {
    #[error("scheduled and triggered deliveries need at least one recipient")]
    NoRecipients,
    #[error("day_of_week {0} is outside 0..=6 (0 = Sunday)")]
    DayOfWeekOutOfRange(u8),
    #[error("day_of_month {0} is outside 1..=31")]
    DayOfMonthOutOfRange(u8),
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
}

fn serialize_time<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.format("%H:%M").to_string())
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(cadence: ScheduleCadence) -> DeliveryConfig {
        DeliveryConfig::Scheduled {
            email_addresses: vec!["ops@example.com".to_string()],
            schedule: DeliverySchedule {
                cadence,
                time: parse_time("09:00").expect("valid time"),
                start_date: None,
            },
        }
    }

    #[test]
    fn manual_config_needs_no_recipients() {
        let config = DeliveryConfig::Manual {
            email_addresses: Vec::new(),
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn scheduled_config_rejects_empty_recipient_list() {
        let config = DeliveryConfig::Scheduled {
            email_addresses: vec!["   ".to_string()],
            schedule: DeliverySchedule {
                cadence: ScheduleCadence::Daily,
                time: parse_time("09:00").expect("valid time"),
                start_date: None,
            },
        };
        assert_eq!(config.validate(), Err(DeliveryConfigError::NoRecipients));
    }

    #[test]
    fn out_of_range_days_are_rejected() {
        assert_eq!(
            scheduled(ScheduleCadence::Weekly { day_of_week: 7 }).validate(),
            Err(DeliveryConfigError::DayOfWeekOutOfRange(7))
        );
        assert_eq!(
            scheduled(ScheduleCadence::Monthly { day_of_month: 0 }).validate(),
            Err(DeliveryConfigError::DayOfMonthOutOfRange(0))
        );
        assert_eq!(
            scheduled(ScheduleCadence::Monthly { day_of_month: 31 }).validate(),
            Ok(())
        );
    }

    #[test]
    fn round_trips_the_wire_shape() {
        let config = scheduled(ScheduleCadence::Weekly { day_of_week: 1 });
        let json = serde_json::to_value(&config).expect("serializes");
        assert_eq!(json["type"], "scheduled");
        assert_eq!(json["schedule"]["frequency"], "weekly");
        assert_eq!(json["schedule"]["day_of_week"], 1);
        assert_eq!(json["schedule"]["time"], "09:00");

        let back: DeliveryConfig = serde_json::from_value(json).expect("deserializes");
        assert_eq!(back, config);
    }

    #[test]
    fn unknown_delivery_type_is_rejected() {
        let raw = r#"{ "type": "broadcast", "email_addresses": [] }"#;
        assert!(serde_json::from_str::<DeliveryConfig>(raw).is_err());
    }
}
