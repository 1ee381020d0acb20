use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::grid::CollisionPolicy;
use crate::models::{DayTable, DayTableError, SCHOOL_WEEK};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub backend_base_url: Url,
    pub debug: bool,
    pub enable_swagger: bool,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub day_labels: Vec<String>,
    pub collision_policy: CollisionPolicy,
    pub calendar_name: String,
    pub timezone: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_BACKEND_BASE_URL, APP_DAY_LABELS=Monday,Tuesday,...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("day_labels"),
            )
            .set_default("backend_base_url", "http://localhost:8000/api/v1")?
            .set_default("debug", false)?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("request_timeout_secs", 30)?
            .set_default("day_labels", SCHOOL_WEEK.to_vec())?
            .set_default("collision_policy", "first_match")?
            .set_default("calendar_name", "School Timetable")?
            .build()?;

        config.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn day_table(&self) -> Result<DayTable, DayTableError> {
        DayTable::from_labels(&self.day_labels)
    }

    pub fn timezone(&self) -> Result<Option<Tz>, String> {
        self.timezone
            .as_deref()
            .map(|name| name.parse::<Tz>().map_err(|_| format!("unknown timezone: {name}")))
            .transpose()
    }
}
