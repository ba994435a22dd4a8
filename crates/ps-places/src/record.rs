use serde::{Deserialize, Serialize};

/// The consumer-facing record. Field order is the JSON key order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub address: String,
    pub canton: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub opening_hours: OpeningHours,
    pub products: Vec<String>,
    pub organic: bool,
    pub lat: f64,
    pub lng: f64,
    pub image: String,
}

/// Opening hours as either a weekday mapping or a single display string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpeningHours {
    Weekly(WeeklyHours),
    Joined(String),
}

impl OpeningHours {
    /// Single-cell rendering used by the CSV exporter.
    pub fn display(&self) -> String {
        match self {
            OpeningHours::Weekly(weekly) => weekly
                .days()
                .map(|(day, hours)| format!("{day}: {hours}"))
                .collect::<Vec<_>>()
                .join("; "),
            OpeningHours::Joined(joined) => joined.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyHours {
    #[serde(rename = "Mon", default, skip_serializing_if = "Option::is_none")]
    pub mon: Option<String>,
    #[serde(rename = "Tue", default, skip_serializing_if = "Option::is_none")]
    pub tue: Option<String>,
    #[serde(rename = "Wed", default, skip_serializing_if = "Option::is_none")]
    pub wed: Option<String>,
    #[serde(rename = "Thu", default, skip_serializing_if = "Option::is_none")]
    pub thu: Option<String>,
    #[serde(rename = "Fri", default, skip_serializing_if = "Option::is_none")]
    pub fri: Option<String>,
    #[serde(rename = "Sat", default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<String>,
    #[serde(rename = "Sun", default, skip_serializing_if = "Option::is_none")]
    pub sun: Option<String>,
}

/// Day names the provider uses in `weekday_text`, by language, Monday first.
const DAY_NAMES: &[[&str; 7]] = &[
    ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"],
    ["montag", "dienstag", "mittwoch", "donnerstag", "freitag", "samstag", "sonntag"],
    ["lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche"],
    ["mon", "tue", "wed", "thu", "fri", "sat", "sun"],
];

impl WeeklyHours {
    fn slot(&mut self, index: usize) -> Option<&mut Option<String>> {
        match index {
            0 => Some(&mut self.mon),
            1 => Some(&mut self.tue),
            2 => Some(&mut self.wed),
            3 => Some(&mut self.thu),
            4 => Some(&mut self.fri),
            5 => Some(&mut self.sat),
            6 => Some(&mut self.sun),
            _ => None,
        }
    }

    /// Set the hours for a day given by name ("Monday", "Mon", "montag", ...).
    /// Returns false if the day is not recognised.
    pub fn set(&mut self, day: &str, hours: &str) -> bool {
        let day = day.trim().to_lowercase();
        let index = DAY_NAMES
            .iter()
            .find_map(|names| names.iter().position(|name| *name == day));
        match index.and_then(|i| self.slot(i)) {
            Some(slot) => {
                *slot = Some(hours.trim().to_string());
                true
            }
            None => false,
        }
    }

    /// Parse `weekday_text` lines of the form `Monday: 9:00 AM – 6:00 PM`.
    /// Lines without a recognised day are skipped.
    pub fn from_weekday_text<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut weekly = Self::default();
        for line in lines {
            if let Some((day, hours)) = line.as_ref().split_once(':') {
                weekly.set(day, hours);
            }
        }
        weekly
    }

    /// Whether `word` names a weekday in one of the known languages.
    pub fn is_day_name(word: &str) -> bool {
        let word = word.trim().to_lowercase();
        DAY_NAMES.iter().flatten().any(|name| *name == word)
    }

    /// Populated days in Monday-to-Sunday order.
    pub fn days(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("Mon", &self.mon),
            ("Tue", &self.tue),
            ("Wed", &self.wed),
            ("Thu", &self.thu),
            ("Fri", &self.fri),
            ("Sat", &self.sat),
            ("Sun", &self.sun),
        ]
        .into_iter()
        .filter_map(|(day, hours)| hours.as_deref().map(|h| (day, h)))
    }
}
