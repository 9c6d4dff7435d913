// ── Location domain type ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// A geographic location as printed on an alarm fax.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyLocation {
    /// Free-form location name (municipality part, landmark, ...).
    pub location: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub street: Option<String>,
    pub street_number: Option<String>,
    /// Nearest intersection, if the dispatch center supplied one.
    pub intersection: Option<String>,
    /// Named property or building ("Objekt").
    pub property: Option<String>,
    pub geo_latitude: Option<f64>,
    pub geo_longitude: Option<f64>,
}

impl PropertyLocation {
    /// A location is meaningful when it has a street and either a zip code or a city.
    pub fn is_meaningful(&self) -> bool {
        (has_text(self.zip_code.as_deref()) || has_text(self.city.as_deref()))
            && has_text(self.street.as_deref())
    }

    pub fn has_geo_coordinates(&self) -> bool {
        self.geo_latitude.is_some() && self.geo_longitude.is_some()
    }
}

impl fmt::Display for PropertyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let street = non_blank(self.street.as_deref());
        let zip = non_blank(self.zip_code.as_deref());
        let city = non_blank(self.city.as_deref());

        if let Some(street) = street {
            write!(f, "{street}")?;
            if let Some(number) = non_blank(self.street_number.as_deref()) {
                write!(f, " {number}")?;
            }
            if zip.is_some() || city.is_some() {
                write!(f, ", ")?;
            }
        }

        match (zip, city) {
            (Some(zip), Some(city)) => write!(f, "{zip} {city}"),
            (Some(zip), None) => write!(f, "{zip}"),
            (None, Some(city)) => write!(f, "{city}"),
            (None, None) => Ok(()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn has_text(value: Option<&str>) -> bool {
    non_blank(value).is_some()
}
