//! `name_WWxHH.png` file naming for snapped maps.
//!
//! The suffix records the map size in grid cells so a later print run does
//! not need to recalibrate. Sizes may be fractional (`cave_10.5x8.png`).
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref MAP_NAME: Regex =
        Regex::new(r"^(\w+?)_*(\d+(?:\.\d*)?|\.\d+)x(\d+(?:\.\d*)?|\.\d+)\.png$").unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FileNameError {
    #[error("'{0}' does not follow the name_WWxHH.png convention")]
    NoMatch(String),
    #[error("invalid cell count '{0}'")]
    BadNumber(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapFileName {
    pub name: String,
    pub cols: f32,
    pub rows: f32,
}

impl MapFileName {
    pub fn new(name: impl Into<String>, cols: f32, rows: f32) -> Self {
        Self {
            name: name.into(),
            cols,
            rows,
        }
    }

    /// Parse a bare file name (no directories).
    pub fn parse(file_name: &str) -> Result<Self, FileNameError> {
        let caps = MAP_NAME
            .captures(file_name)
            .ok_or_else(|| FileNameError::NoMatch(file_name.to_string()))?;
        let number = |i: usize| {
            let s = &caps[i];
            s.parse::<f32>()
                .map_err(|_| FileNameError::BadNumber(s.to_string()))
        };
        Ok(Self {
            name: caps[1].to_string(),
            cols: number(2)?,
            rows: number(3)?,
        })
    }

    /// `name_WWxHH.png`, whole numbers without a decimal point.
    pub fn file_name(&self) -> String {
        self.to_string()
    }

    /// Whole cell counts, if both dimensions are integral.
    pub fn cells(&self) -> Option<(u32, u32)> {
        let whole = |v: f32| (v >= 0.0 && v.fract() == 0.0).then_some(v as u32);
        Some((whole(self.cols)?, whole(self.rows)?))
    }
}

impl fmt::Display for MapFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}x{}.png", self.name, self.cols, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_sizes() {
        let m = MapFileName::parse("tavern_24x30.png").unwrap();
        assert_eq!(m, MapFileName::new("tavern", 24.0, 30.0));
        assert_eq!(m.cells(), Some((24, 30)));

        let f = MapFileName::parse("cave_10.5x.5.png").unwrap();
        assert_eq!((f.cols, f.rows), (10.5, 0.5));
        assert_eq!(f.cells(), None);
    }

    #[test]
    fn extra_underscores_belong_to_the_separator() {
        let m = MapFileName::parse("map_two__12x8.png").unwrap();
        assert_eq!(m.name, "map_two");
    }

    #[test]
    fn rejects_other_names() {
        assert!(matches!(
            MapFileName::parse("tavern.png"),
            Err(FileNameError::NoMatch(_))
        ));
        assert!(MapFileName::parse("tavern_24x30.jpg").is_err());
    }

    #[test]
    fn formats_round_trip() {
        let m = MapFileName::new("ruins", 20.0, 12.5);
        assert_eq!(m.file_name(), "ruins_20x12.5.png");
        assert_eq!(MapFileName::parse(&m.file_name()).unwrap(), m);
    }
}
