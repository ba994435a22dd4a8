use std::time::Duration;

/// The default endpoint for the Places text search service
pub const DEFAULT_TEXT_SEARCH_URL: &str =
    "https://maps.googleapis.com/maps/api/place/textsearch/json";

/// The default endpoint for the Places nearby search service
pub const DEFAULT_NEARBY_SEARCH_URL: &str =
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

/// The default endpoint for the Places details service
pub const DEFAULT_DETAILS_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";

/// Fields requested from the details service.
pub const DETAIL_FIELDS: &str = "name,formatted_address,geometry,place_id,types,website,url,opening_hours,address_components,formatted_phone_number";

/// Query parameter carrying the API key
pub const API_KEY_PARAM: &str = "key";

/// Address component type marking the canton.
pub const ADMIN_AREA_LEVEL_1: &str = "administrative_area_level_1";

/// Continuation tokens only become valid a short while after they are issued.
pub const DEFAULT_PAGE_TOKEN_DELAY: Duration = Duration::from_secs(2);

/// The provider never returns more than three pages per query.
pub const DEFAULT_MAX_PAGES: u32 = 3;

pub const DEFAULT_REGION: &str = "Aargau";
pub const DEFAULT_KEYWORD: &str = "farm shops";
