use serde::{Deserialize, Serialize};

use crate::constants::ADMIN_AREA_LEVEL_1;

/// A place as returned by the provider, either from a search page or from the
/// details service. Every field is optional on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlaceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<OpeningHoursText>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LatLng>,
}

/// Coordinates as sent by the provider. Kept as raw JSON values because
/// previously saved files sometimes carry them as strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub lat: serde_json::Value,
    #[serde(default)]
    pub lng: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpeningHoursText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_now: Option<bool>,
    #[serde(default)]
    pub weekday_text: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponent {
    #[serde(default)]
    pub long_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    pub fn has_type(&self, kind: &str) -> bool {
        self.types.iter().any(|t| t == kind)
    }
}

impl RawPlaceRecord {
    pub fn place_id(&self) -> Option<&str> {
        self.place_id.as_deref()
    }

    pub fn location(&self) -> Option<&LatLng> {
        self.geometry.as_ref().and_then(|g| g.location.as_ref())
    }

    pub fn weekday_text(&self) -> &[String] {
        self.opening_hours
            .as_ref()
            .map(|h| h.weekday_text.as_slice())
            .unwrap_or_default()
    }

    /// The first address component tagged with `kind`.
    pub fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.address_components.iter().find(|c| c.has_type(kind))
    }

    /// The level-1 administrative area (the canton), if the provider sent one.
    pub fn admin_area(&self) -> Option<&AddressComponent> {
        self.component(ADMIN_AREA_LEVEL_1)
    }

    /// Fill fields that are missing here from `details`. Values already on
    /// `self` win, except for address components and hours, which the details
    /// service returns in full while search pages omit them.
    pub fn merge_details(mut self, details: RawPlaceRecord) -> Self {
        self.place_id = self.place_id.or(details.place_id);
        self.name = self.name.or(details.name);
        self.formatted_address = self.formatted_address.or(details.formatted_address);
        self.geometry = self.geometry.or(details.geometry);
        if self.types.is_empty() {
            self.types = details.types;
        }
        self.website = self.website.or(details.website);
        self.url = self.url.or(details.url);
        self.formatted_phone_number = self
            .formatted_phone_number
            .or(details.formatted_phone_number);
        if details.opening_hours.is_some() {
            self.opening_hours = details.opening_hours;
        }
        if !details.address_components.is_empty() {
            self.address_components = details.address_components;
        }
        self
    }
}
