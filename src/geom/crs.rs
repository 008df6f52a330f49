use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::{Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarmonizeError;

/// A coordinate reference system, identified by EPSG code or by a raw PROJ.4 definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    Epsg(u32),
    Proj4(String),
}

static EPSG_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:urn:ogc:def:crs:)?EPSG:(?:[\d.]*:)?(\d+)$").expect("valid EPSG regex")
});

static WKT_AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid AUTHORITY regex")
});

static ESRI_UTM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)UTM_Zone_(\d{1,2})([NS])").expect("valid UTM regex")
});

impl Crs {
    /// EPSG:4326, WGS84 longitude/latitude.
    pub const WGS84: Crs = Crs::Epsg(4326);

    /// Get the EPSG code, if this CRS is identified by one.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Proj4(_) => None,
        }
    }

    /// PROJ.4 definition of this CRS, if one is known.
    pub fn proj4(&self) -> Result<String> {
        match self {
            Crs::Proj4(definition) => Ok(definition.clone()),
            Crs::Epsg(code) => epsg_proj4(*code)
                .ok_or_else(|| HarmonizeError::UnsupportedCrs(self.to_string()).into()),
        }
    }

    /// True for longitude/latitude systems, whose coordinates are angles rather than lengths.
    pub fn is_geographic(&self) -> bool {
        match self {
            Crs::Proj4(definition) => definition.contains("+proj=longlat") || definition.contains("+proj=latlong"),
            Crs::Epsg(code) => epsg_proj4(*code)
                .is_some_and(|definition| definition.contains("+proj=longlat")),
        }
    }

    /// Identify the CRS declared by a shapefile `.prj` (ESRI WKT). Returns None if unrecognized.
    pub fn from_prj_wkt(wkt: &str) -> Option<Crs> {
        // The outermost AUTHORITY clause is the last one in the WKT.
        if let Some(caps) = WKT_AUTHORITY.captures_iter(wkt).last() {
            return caps[1].parse().ok().map(Crs::Epsg);
        }

        let projected = wkt.trim_start().starts_with("PROJCS");
        if !projected {
            if wkt.contains("GCS_WGS_1984") { return Some(Crs::Epsg(4326)) }
            if wkt.contains("GCS_North_American_1983") { return Some(Crs::Epsg(4269)) }
            return None;
        }

        if wkt.contains("WGS_1984_Web_Mercator") { return Some(Crs::Epsg(3857)) }
        if wkt.contains("StatePlane_Ohio_North_FIPS_3401_Feet") { return Some(Crs::Epsg(3734)) }
        if wkt.contains("StatePlane_Ohio_South_FIPS_3402_Feet") { return Some(Crs::Epsg(3735)) }
        if wkt.contains("StatePlane_Ohio_North_FIPS_3401") { return Some(Crs::Epsg(32122)) }
        if wkt.contains("StatePlane_Ohio_South_FIPS_3402") { return Some(Crs::Epsg(32123)) }

        let caps = ESRI_UTM.captures(wkt)?;
        let zone: u32 = caps[1].parse().ok()?;
        let north = caps[2].eq_ignore_ascii_case("N");
        match (wkt.contains("NAD_1983"), north) {
            (true, true) => Some(Crs::Epsg(26900 + zone)),
            (_, true) => Some(Crs::Epsg(32600 + zone)),
            (_, false) => Some(Crs::Epsg(32700 + zone)),
        }
    }
}

/// Built-in PROJ.4 definitions for the EPSG codes precinct data usually arrives in.
fn epsg_proj4(code: u32) -> Option<String> {
    let definition = match code {
        4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        4269 => "+proj=longlat +datum=NAD83 +no_defs".to_string(),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs".to_string(),
        // NAD83 / Ohio North and South, US survey feet and metres
        3734 => "+proj=lcc +lat_0=39.6666666666667 +lon_0=-82.5 +lat_1=41.7 +lat_2=40.4333333333333 +x_0=600000 +y_0=0 +datum=NAD83 +units=us-ft +no_defs".to_string(),
        3735 => "+proj=lcc +lat_0=38 +lon_0=-82.5 +lat_1=40.0333333333333 +lat_2=38.7333333333333 +x_0=600000 +y_0=0 +datum=NAD83 +units=us-ft +no_defs".to_string(),
        32122 => "+proj=lcc +lat_0=39.6666666666667 +lon_0=-82.5 +lat_1=41.7 +lat_2=40.4333333333333 +x_0=600000 +y_0=0 +datum=NAD83 +units=m +no_defs".to_string(),
        32123 => "+proj=lcc +lat_0=38 +lon_0=-82.5 +lat_1=40.0333333333333 +lat_2=38.7333333333333 +x_0=600000 +y_0=0 +datum=NAD83 +units=m +no_defs".to_string(),
        // UTM zones: NAD83 north, WGS84 north and south
        26901..=26923 => format!("+proj=utm +zone={} +datum=NAD83 +units=m +no_defs", code - 26900),
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", code - 32600),
        32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs", code - 32700),
        _ => return None,
    };
    Some(definition)
}

impl FromStr for Crs {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with("+proj=") {
            return Ok(Crs::Proj4(s.to_string()));
        }
        if s.eq_ignore_ascii_case("OGC:CRS84") || s.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") {
            return Ok(Crs::WGS84);
        }
        match EPSG_CODE.captures(s) {
            Some(caps) => Ok(Crs::Epsg(caps[1].parse()?)),
            None => bail!("unrecognized CRS identifier: {s:?}"),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> { value.parse() }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self { crs.to_string() }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj4(definition) => f.write_str(definition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_identifier_spellings() {
        assert_eq!("EPSG:3735".parse::<Crs>().unwrap(), Crs::Epsg(3735));
        assert_eq!("epsg:4326".parse::<Crs>().unwrap(), Crs::Epsg(4326));
        assert_eq!("urn:ogc:def:crs:EPSG::3734".parse::<Crs>().unwrap(), Crs::Epsg(3734));
        assert_eq!("OGC:CRS84".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!(
            "+proj=utm +zone=17 +datum=NAD83".parse::<Crs>().unwrap(),
            Crs::Proj4("+proj=utm +zone=17 +datum=NAD83".into()),
        );
        assert!("not a crs".parse::<Crs>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for crs in [Crs::Epsg(26917), Crs::Proj4("+proj=longlat +datum=WGS84".into())] {
            assert_eq!(crs.to_string().parse::<Crs>().unwrap(), crs);
        }
    }

    #[test]
    fn geographic_systems_are_flagged() {
        assert!(Crs::WGS84.is_geographic());
        assert!(Crs::Epsg(4269).is_geographic());
        assert!(!Crs::Epsg(3735).is_geographic());
        assert!(!Crs::Epsg(32617).is_geographic());
        assert!(!Crs::Epsg(999_999).is_geographic());
    }

    #[test]
    fn unknown_codes_are_unsupported_for_reprojection() {
        let err = Crs::Epsg(2000).proj4().unwrap_err();
        assert!(matches!(err.downcast_ref::<HarmonizeError>(), Some(HarmonizeError::UnsupportedCrs(_))));
        assert!(Crs::Epsg(32617).proj4().unwrap().contains("+zone=17"));
        assert!(Crs::Epsg(32717).proj4().unwrap().contains("+south"));
    }

    #[test]
    fn prj_with_authority_uses_outermost_code() {
        let wkt = r#"PROJCS["NAD83 / Ohio South (ftUS)",GEOGCS["NAD83",AUTHORITY["EPSG","4269"]],UNIT["US survey foot",0.3048006096012192],AUTHORITY["EPSG","3735"]]"#;
        assert_eq!(Crs::from_prj_wkt(wkt), Some(Crs::Epsg(3735)));
    }

    #[test]
    fn prj_esri_names_are_recognized() {
        let geographic = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]]"#;
        assert_eq!(Crs::from_prj_wkt(geographic), Some(Crs::WGS84));

        let state_plane = r#"PROJCS["NAD_1983_StatePlane_Ohio_South_FIPS_3402_Feet",GEOGCS["GCS_North_American_1983"]]"#;
        assert_eq!(Crs::from_prj_wkt(state_plane), Some(Crs::Epsg(3735)));

        let utm = r#"PROJCS["NAD_1983_UTM_Zone_17N",GEOGCS["GCS_North_American_1983"]]"#;
        assert_eq!(Crs::from_prj_wkt(utm), Some(Crs::Epsg(26917)));

        assert_eq!(Crs::from_prj_wkt(r#"PROJCS["Custom_Local_Grid"]"#), None);
    }
}
