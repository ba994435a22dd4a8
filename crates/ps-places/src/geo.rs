use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Rough centre of Canton Aargau, the default origin for nearby searches.
pub const AARGAU_CENTER: Coordinates = Coordinates::new(47.3887, 8.0558);

/// Approximate bounding box of Canton Aargau.
pub const AARGAU_BOUNDS: BoundingBox = BoundingBox {
    south: 47.1393,
    west: 7.7075,
    north: 47.6229,
    east: 8.4651,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: Coordinates) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lng)
    }

    /// `size` x `size` evenly spaced search origins covering the box, row by
    /// row from the south-west corner. A size of 1 yields the centre.
    pub fn grid(&self, size: usize) -> Vec<Coordinates> {
        match size {
            0 => Vec::new(),
            1 => vec![Coordinates::new(
                (self.south + self.north) / 2.0,
                (self.west + self.east) / 2.0,
            )],
            _ => {
                let steps = (size - 1) as f64;
                let lat_step = (self.north - self.south) / steps;
                let lng_step = (self.east - self.west) / steps;
                (0..size)
                    .flat_map(|i| {
                        (0..size).map(move |j| {
                            Coordinates::new(
                                self.south + i as f64 * lat_step,
                                self.west + j as f64 * lng_step,
                            )
                        })
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("expected `south,west,north,east` with south < north and west < east, got `{0}`")]
pub struct ParseBoundsError(String);

impl FromStr for BoundingBox {
    type Err = ParseBoundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseBoundsError(s.to_string()))?;
        match parts.as_slice() {
            [south, west, north, east] if south < north && west < east => Ok(Self {
                south: *south,
                west: *west,
                north: *north,
                east: *east,
            }),
            _ => Err(ParseBoundsError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aargau_bounds_contain_center() {
        assert!(AARGAU_BOUNDS.contains(AARGAU_CENTER));
        assert!(!AARGAU_BOUNDS.contains(Coordinates::new(46.2044, 6.1432)));
    }

    #[test]
    fn grid_covers_corners() {
        // Act
        let grid = AARGAU_BOUNDS.grid(5);

        // Assert
        assert_eq!(grid.len(), 25);
        assert_eq!(grid[0], Coordinates::new(AARGAU_BOUNDS.south, AARGAU_BOUNDS.west));
        let last = grid[24];
        assert!((last.lat - AARGAU_BOUNDS.north).abs() < 1e-9);
        assert!((last.lng - AARGAU_BOUNDS.east).abs() < 1e-9);
        assert!(grid.iter().all(|point| AARGAU_BOUNDS.contains(Coordinates::new(
            point.lat.min(AARGAU_BOUNDS.north),
            point.lng.min(AARGAU_BOUNDS.east)
        ))));
    }

    #[test]
    fn grid_of_one_is_the_centre() {
        let grid = AARGAU_BOUNDS.grid(1);
        assert_eq!(grid.len(), 1);
        assert!(AARGAU_BOUNDS.contains(grid[0]));
        assert!(AARGAU_BOUNDS.grid(0).is_empty());
    }

    #[test]
    fn bounds_parse() {
        let parsed: BoundingBox = "47.1, 7.7, 47.6, 8.4".parse().unwrap();
        assert_eq!(parsed.north, 47.6);
        assert!("47.6,7.7,47.1,8.4".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn coordinates_validate_ranges() {
        assert!(Coordinates::new(47.0, 8.0).is_valid());
        assert!(!Coordinates::new(91.0, 8.0).is_valid());
        assert!(!Coordinates::new(47.0, f64::NAN).is_valid());
    }
}
