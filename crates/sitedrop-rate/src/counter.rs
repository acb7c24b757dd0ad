use std::fmt;

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Upload,
    Deploy,
    ApiCall,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [Self::Upload, Self::Deploy, Self::ApiCall];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Deploy => "deploy",
            Self::ApiCall => "api_call",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usage of one action kind by one subject within the current day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub subject_id: String,
    pub action_kind: ActionKind,
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitCounter {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Midnight UTC following `now`.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Apply one admission check to the stored counter slot.
///
/// A denied request leaves the slot untouched.
pub fn admit(
    slot: &mut Option<RateLimitCounter>,
    subject_id: &str,
    action_kind: ActionKind,
    limit: u32,
    now: DateTime<Utc>,
) -> Decision {
    match slot {
        Some(counter) if !counter.is_expired(now) => {
            if counter.count >= limit {
                return Decision {
                    allowed: false,
                    remaining: 0,
                    reset_at: counter.reset_at,
                };
            }
            counter.count += 1;
            Decision {
                allowed: true,
                remaining: limit - counter.count,
                reset_at: counter.reset_at,
            }
        }
        _ if limit == 0 => Decision {
            allowed: false,
            remaining: 0,
            reset_at: next_reset(now),
        },
        _ => {
            let counter = RateLimitCounter {
                subject_id: subject_id.to_owned(),
                action_kind,
                count: 1,
                reset_at: next_reset(now),
            };
            let decision = Decision {
                allowed: true,
                remaining: limit - 1,
                reset_at: counter.reset_at,
            };
            *slot = Some(counter);
            decision
        }
    }
}
