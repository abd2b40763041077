//! Read-only storage of observed typhoon tracks.
//!
//! The [`TyphoonTrackStore`] is built once at startup from a flat tabular
//! dataset and never changes afterwards. Construction validates the data:
//! coordinates must be in range and each typhoon's observations must be
//! strictly increasing in time. A dataset that fails either check is
//! unusable and is rejected with a [`TrackError`].
//!
//! # CSV format
//!
//! The first non-blank line is a header. Column names are matched
//! case-insensitively; extra columns are ignored. Fields may be quoted
//! with `"`, in which case they can contain commas and `""` stands for a
//! literal quote. Records cannot span lines.
//!
//! | Column | Accepted names | Content |
//! |--------|----------------|---------|
//! | time | `unixtime` | UTC seconds since the epoch |
//! | typhoon | `TYPHOON NUMBER`, `typhoon_number`, `typhoon_id` | integer id |
//! | latitude | `LAT`, `latitude` | degrees |
//! | longitude | `LON`, `longitude` | degrees |
//! | intensity (optional) | `INTENSITY`, `PRESSURE`, `GRADE`, `CATEGORY` | number, may be blank |

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use tpg_types::{GeoPosition, TyphoonId, TyphoonObservation, TyphoonSnapshot};

use crate::TrackError;

/// Immutable typhoon observations, grouped per typhoon and ordered by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TyphoonTrackStore {
    tracks: BTreeMap<TyphoonId, Vec<TyphoonObservation>>,
}

impl TyphoonTrackStore {
    /// Build a store from observations.
    ///
    /// Observations of different typhoons may be interleaved, but each
    /// typhoon's own observations must appear in strictly increasing time
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::NonMonotonicTimestamp`] if a typhoon's
    /// observations are not strictly increasing in time.
    pub fn from_observations<I>(observations: I) -> Result<Self, TrackError>
    where
        I: IntoIterator<Item = TyphoonObservation>,
    {
        let mut tracks: BTreeMap<TyphoonId, Vec<TyphoonObservation>> = BTreeMap::new();
        for observation in observations {
            let track = tracks.entry(observation.typhoon_id).or_default();
            if let Some(previous) = track.last() {
                if observation.time <= previous.time {
                    return Err(TrackError::NonMonotonicTimestamp {
                        typhoon_id: observation.typhoon_id,
                        previous: previous.time,
                        found: observation.time,
                    });
                }
            }
            track.push(observation);
        }
        Ok(Self { tracks })
    }

    /// Parse a store from CSV text (see the module docs for the format).
    ///
    /// # Errors
    ///
    /// Returns [`TrackError`] if the header lacks a required column, a field
    /// cannot be parsed, a coordinate is out of range, or timestamps are not
    /// strictly increasing per typhoon.
    pub fn from_csv_str(input: &str) -> Result<Self, TrackError> {
        let mut lines = input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Err(TrackError::Empty);
        };
        let columns = CsvColumns::from_header(header)?;

        let mut observations = Vec::new();
        for (index, line) in lines {
            let fields = split_csv_line(line);
            observations.push(columns.parse_row(index.saturating_add(1), &fields)?);
        }

        Self::from_observations(observations)
    }

    /// Read and parse a CSV track file.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Io`] if the file cannot be read, or any error
    /// from [`TyphoonTrackStore::from_csv_str`].
    pub fn from_csv_path(path: &Path) -> Result<Self, TrackError> {
        let contents = std::fs::read_to_string(path).map_err(|source| TrackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_csv_str(&contents)?;
        info!(
            path = %path.display(),
            typhoons = store.typhoon_count(),
            observations = store.observation_count(),
            "Typhoon tracks loaded"
        );
        Ok(store)
    }

    /// Number of distinct typhoons.
    pub fn typhoon_count(&self) -> usize {
        self.tracks.len()
    }

    /// Total number of observations across all typhoons.
    pub fn observation_count(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    /// Whether the store holds no observations.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All typhoon ids in ascending order.
    pub fn typhoon_ids(&self) -> impl Iterator<Item = TyphoonId> + '_ {
        self.tracks.keys().copied()
    }

    /// The full observed track of one typhoon.
    pub fn track(&self, id: TyphoonId) -> Option<&[TyphoonObservation]> {
        self.tracks.get(&id).map(Vec::as_slice)
    }

    /// Time of the first observation of a typhoon.
    pub fn genesis_time(&self, id: TyphoonId) -> Option<DateTime<Utc>> {
        self.tracks.get(&id)?.first().map(|o| o.time)
    }

    /// Time of the last observation of a typhoon.
    pub fn dissipation_time(&self, id: TyphoonId) -> Option<DateTime<Utc>> {
        self.tracks.get(&id)?.last().map(|o| o.time)
    }

    /// Earliest and latest observation times across the whole dataset.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.tracks.values().filter_map(|t| t.first()).map(|o| o.time).min()?;
        let end = self.tracks.values().filter_map(|t| t.last()).map(|o| o.time).max()?;
        Some((start, end))
    }

    /// The observation of a typhoon at exactly `time`.
    pub fn observation_at(&self, id: TyphoonId, time: DateTime<Utc>) -> Option<&TyphoonObservation> {
        let track = self.tracks.get(&id)?;
        let index = track.binary_search_by_key(&time, |o| o.time).ok()?;
        track.get(index)
    }

    /// Observations of a typhoon with `from <= time <= to`.
    pub fn observations_between(
        &self,
        id: TyphoonId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> &[TyphoonObservation] {
        let Some(track) = self.tracks.get(&id) else {
            return &[];
        };
        let lower = track.partition_point(|o| o.time < from);
        let upper = track.partition_point(|o| o.time <= to);
        track.get(lower..upper).unwrap_or(&[])
    }

    /// Position of a typhoon at `time`, interpolated along the great circle
    /// between the surrounding observations.
    ///
    /// `None` before genesis or after the last observation.
    pub fn position_at(&self, id: TyphoonId, time: DateTime<Utc>) -> Option<GeoPosition> {
        let track = self.tracks.get(&id)?;
        let index = track.partition_point(|o| o.time < time);
        let next = track.get(index)?;
        if next.time == time {
            return Some(next.position);
        }
        let previous = track.get(index.checked_sub(1)?)?;
        let span = hours(next.time.signed_duration_since(previous.time));
        let elapsed = hours(time.signed_duration_since(previous.time));
        Some(previous.position.interpolate(next.position, elapsed / span))
    }

    /// Every typhoon that exists at `time`, with its position.
    pub fn active_at(&self, time: DateTime<Utc>) -> Vec<TyphoonSnapshot> {
        self.typhoon_ids()
            .filter_map(|typhoon_id| {
                self.position_at(typhoon_id, time)
                    .map(|position| TyphoonSnapshot {
                        typhoon_id,
                        position,
                    })
            })
            .collect()
    }
}

/// Length of a duration in fractional hours.
#[allow(clippy::cast_precision_loss)] // track spans are far below 2^52 seconds
pub fn hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

/// Column positions resolved from the CSV header.
#[derive(Debug)]
struct CsvColumns {
    time: usize,
    typhoon: usize,
    lat: usize,
    lon: usize,
    intensity: Option<usize>,
    width: usize,
}

impl CsvColumns {
    fn from_header(header: &str) -> Result<Self, TrackError> {
        let names: Vec<String> = split_csv_line(header)
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));
        let require = |aliases: &[&str], column: &'static str| {
            find(aliases).ok_or(TrackError::MissingColumn { column })
        };

        Ok(Self {
            time: require(&["unixtime"], "unixtime")?,
            typhoon: require(
                &["typhoon number", "typhoon_number", "typhoon_id"],
                "TYPHOON NUMBER",
            )?,
            lat: require(&["lat", "latitude"], "LAT")?,
            lon: require(&["lon", "longitude"], "LON")?,
            intensity: find(&["intensity", "pressure", "grade", "category"]),
            width: names.len(),
        })
    }

    fn parse_row(&self, line: usize, fields: &[String]) -> Result<TyphoonObservation, TrackError> {
        if fields.len() < self.width {
            return Err(TrackError::ShortRow {
                line,
                expected: self.width,
                found: fields.len(),
            });
        }

        let seconds: i64 = parse_field(fields, self.time, line, "unixtime")?;
        let time = DateTime::from_timestamp(seconds, 0).ok_or_else(|| TrackError::Parse {
            line,
            column: "unixtime",
            value: seconds.to_string(),
        })?;
        let typhoon_id = TyphoonId::new(parse_field(fields, self.typhoon, line, "TYPHOON NUMBER")?);
        let lat: f64 = parse_field(fields, self.lat, line, "LAT")?;
        let lon: f64 = parse_field(fields, self.lon, line, "LON")?;
        let Ok(position) = GeoPosition::new(lat, lon) else {
            return Err(TrackError::InvalidCoordinate { line, lat, lon });
        };

        let intensity = match self.intensity {
            Some(index) if fields.get(index).is_some_and(|f| !f.is_empty()) => {
                Some(parse_field(fields, index, line, "INTENSITY")?)
            }
            _ => None,
        };

        Ok(TyphoonObservation {
            typhoon_id,
            time,
            position,
            intensity,
        })
    }
}

/// Split one CSV record into trimmed fields, honouring `"` quoting.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_owned()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_owned());
    fields
}

fn parse_field<T: std::str::FromStr>(
    fields: &[String],
    index: usize,
    line: usize,
    column: &'static str,
) -> Result<T, TrackError> {
    let raw = fields.get(index).map_or("", String::as_str);
    raw.parse().ok().ok_or_else(|| TrackError::Parse {
        line,
        column,
        value: raw.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const CSV: &str = "\
unixtime,TYPHOON NUMBER,LAT,LON,PRESSURE
1564617600,1909,15.0,140.0,990
1564639200,1909,16.0,139.0,985
1564660800,1909,17.0,138.0,
1564617600,1910,20.0,150.0,1000
";

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 8, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn parses_csv_and_groups_by_typhoon() {
        let store = TyphoonTrackStore::from_csv_str(CSV).unwrap();
        assert_eq!(store.typhoon_count(), 2);
        assert_eq!(store.observation_count(), 4);
        assert_eq!(store.genesis_time(TyphoonId::new(1909)), Some(t(0)));
        assert_eq!(store.dissipation_time(TyphoonId::new(1909)), Some(t(12)));
        let first = store.observation_at(TyphoonId::new(1909), t(0)).unwrap();
        assert_eq!(first.intensity.map(|i| i.round()), Some(990.0));
        let last = store.observation_at(TyphoonId::new(1909), t(12)).unwrap();
        assert!(last.intensity.is_none());
    }

    #[test]
    fn header_is_case_insensitive_and_intensity_optional() {
        let csv = "lat,lon,typhoon_id,UNIXTIME\n10.0,130.0,7,1564617600\n";
        let store = TyphoonTrackStore::from_csv_str(csv).unwrap();
        assert_eq!(store.typhoon_ids().collect::<Vec<_>>(), vec![TyphoonId::new(7)]);
    }

    #[test]
    fn missing_column_rejected() {
        let err = TyphoonTrackStore::from_csv_str("unixtime,LAT,LON\n1,2,3\n").unwrap_err();
        assert!(matches!(err, TrackError::MissingColumn { column: "TYPHOON NUMBER" }));
    }

    #[test]
    fn out_of_range_coordinate_rejected() {
        let csv = "unixtime,TYPHOON NUMBER,LAT,LON\n1564617600,1,95.0,140.0\n";
        let err = TyphoonTrackStore::from_csv_str(csv).unwrap_err();
        assert!(matches!(err, TrackError::InvalidCoordinate { line: 2, .. }));
    }

    #[test]
    fn non_monotonic_timestamps_rejected() {
        let csv = "unixtime,TYPHOON NUMBER,LAT,LON\n\
                   1564639200,1,15.0,140.0\n\
                   1564617600,1,16.0,140.0\n";
        let err = TyphoonTrackStore::from_csv_str(csv).unwrap_err();
        assert!(matches!(err, TrackError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn duplicate_timestamps_rejected() {
        let csv = "unixtime,TYPHOON NUMBER,LAT,LON\n\
                   1564617600,1,15.0,140.0\n\
                   1564617600,1,16.0,140.0\n";
        assert!(TyphoonTrackStore::from_csv_str(csv).is_err());
    }

    #[test]
    fn unparsable_field_reports_line() {
        let csv = "unixtime,TYPHOON NUMBER,LAT,LON\n1564617600,1,north,140.0\n";
        let err = TyphoonTrackStore::from_csv_str(csv).unwrap_err();
        assert!(matches!(err, TrackError::Parse { line: 2, column: "LAT", .. }));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(
            TyphoonTrackStore::from_csv_str("\n\n"),
            Err(TrackError::Empty)
        ));
    }

    #[test]
    fn position_interpolates_between_observations() {
        let store = TyphoonTrackStore::from_csv_str(CSV).unwrap();
        let id = TyphoonId::new(1909);
        let mid = store.position_at(id, t(3)).unwrap();
        assert!((mid.lat() - 15.5).abs() < 0.05, "got {mid}");
        assert!(store.position_at(id, t(13)).is_none());
        assert!(store.position_at(id, t(0)).is_some());
    }

    #[test]
    fn observations_between_is_inclusive() {
        let store = TyphoonTrackStore::from_csv_str(CSV).unwrap();
        let window = store.observations_between(TyphoonId::new(1909), t(6), t(12));
        assert_eq!(window.len(), 2);
        assert!(store
            .observations_between(TyphoonId::new(42), t(0), t(12))
            .is_empty());
    }

    #[test]
    fn time_range_and_active_typhoons() {
        let store = TyphoonTrackStore::from_csv_str(CSV).unwrap();
        assert_eq!(store.time_range(), Some((t(0), t(12))));
        assert_eq!(store.active_at(t(0)).len(), 2);
        assert_eq!(store.active_at(t(6)).len(), 1);
    }

    #[test]
    fn quoted_fields_may_contain_commas() {
        let csv = "\
\"NAME\",\"unixtime\",\"TYPHOON NUMBER\",LAT,LON
\"Faxai, 1915\",1564617600,1915,15.0,140.0
\"Lingling \"\"13\"\"\", 1564639200 ,1913,16.0,139.0
";
        let store = TyphoonTrackStore::from_csv_str(csv).unwrap();
        assert_eq!(store.typhoon_count(), 2);
        let faxai = store.observations_between(TyphoonId::new(1915), t(0), t(0));
        assert_eq!(faxai.len(), 1);
        assert!((faxai[0].position.lat() - 15.0).abs() < 1e-9);
        assert_eq!(store.genesis_time(TyphoonId::new(1913)), Some(t(6)));
    }

    #[test]
    fn split_handles_quotes_and_blanks() {
        assert_eq!(split_csv_line("a, \"b,c\" ,,\"d\"\"e\""), ["a", "b,c", "", "d\"e"]);
        assert_eq!(split_csv_line(""), [""]);
    }
}
