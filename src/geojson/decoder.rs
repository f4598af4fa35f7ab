//! Streaming decoder for GeoJSON feature collections.
//!
//! [`FeatureStream`] walks the top level of the document until it finds the
//! `features` member, then yields one feature at a time. Only the bytes of
//! the current feature are held in memory; the rest of the array is never
//! buffered.
//!
//! ```
//! use geoaddress::geojson::{DecodedFeature, FeatureStream};
//!
//! let input = r#"{"type": "FeatureCollection", "features": [
//!     {"properties": {"addr:street": "Hauptstraße"}, "geometry": null},
//!     {"properties": "not a map"}
//! ]}"#;
//! let outcomes: Vec<_> = FeatureStream::new(input.as_bytes())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert!(matches!(outcomes[0], DecodedFeature::Feature(_)));
//! assert!(matches!(outcomes[1], DecodedFeature::Malformed { index: 1, .. }));
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};

use crate::error::{GeoAddressError, Result};
use crate::geojson::feature::Feature;

/// Read buffer for input files.
const INPUT_BUFFER_SIZE: usize = 1 << 20;

/// Scratch capacity kept between features. A single oversized feature does
/// not pin its allocation for the rest of the run.
const SCRATCH_RETAIN: usize = 4 << 20;

/// Member of the root object that holds the feature array.
const FEATURES_MEMBER: &str = "features";

/// Per-feature decode outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFeature {
    /// The feature parsed.
    Feature(Feature),
    /// The element was well delimited but not a valid feature. Decoding
    /// continues with the next element.
    Malformed { index: u64, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// Still scanning top-level members.
    Header,
    /// Positioned inside the `features` array.
    Features,
    /// Array closed, member absent, or a fatal error occurred.
    Done,
}

/// Lazy, forward-only sequence of features read from a [`BufRead`].
///
/// The iterator yields `Err` only for problems that make the rest of the
/// document unreadable (I/O failure, truncated input, root not an object,
/// a stray `}`, `:` or `,` inside the array);
/// after such an error it is exhausted.
pub struct FeatureStream<R> {
    reader: R,
    state: StreamState,
    scratch: Vec<u8>,
    index: u64,
}

impl FeatureStream<BufReader<File>> {
    /// Open a feature collection file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(FeatureStream::new(BufReader::with_capacity(
            INPUT_BUFFER_SIZE,
            file,
        )))
    }
}

impl<R: BufRead> FeatureStream<R> {
    /// Wrap a reader positioned at the start of the document.
    pub fn new(reader: R) -> Self {
        FeatureStream {
            reader,
            state: StreamState::Header,
            scratch: Vec::with_capacity(4096),
            index: 0,
        }
    }

    /// Number of array elements consumed so far.
    pub fn elements_read(&self) -> u64 {
        self.index
    }

    /// Skip whitespace and return the next byte without consuming it.
    fn skip_ws(&mut self) -> Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(pos) => {
                    let next = buf[pos];
                    self.reader.consume(pos);
                    return Ok(Some(next));
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    fn expect(&mut self, want: u8, context: &str) -> Result<()> {
        match self.skip_ws()? {
            Some(b) if b == want => {
                self.reader.consume(1);
                Ok(())
            }
            Some(b) => Err(GeoAddressError::decode(format!(
                "expected '{}' {context}, found '{}'",
                want as char, b as char
            ))),
            None => Err(unexpected_eof(context)),
        }
    }

    /// Read one JSON value, appending its bytes to the scratch buffer when
    /// `capture` is set.
    fn read_value(&mut self, capture: bool) -> Result<()> {
        match self.skip_ws()? {
            None => Err(unexpected_eof("while reading a value")),
            Some(b'"' | b'{' | b'[') => self.read_delimited(capture),
            Some(_) => self.read_scalar(capture),
        }
    }

    /// Strings, objects and arrays: everything up to the matching close.
    fn read_delimited(&mut self, capture: bool) -> Result<()> {
        let mut scan = ValueScan::default();
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Err(unexpected_eof("inside a value"));
            }
            let (used, done) = scan.feed(buf);
            if capture {
                self.scratch.extend_from_slice(&buf[..used]);
            }
            self.reader.consume(used);
            if done {
                return Ok(());
            }
        }
    }

    /// Numbers, literals: everything up to the next delimiter.
    fn read_scalar(&mut self, capture: bool) -> Result<()> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let end = buf
                .iter()
                .position(|&b| matches!(b, b',' | b']' | b'}') || b.is_ascii_whitespace());
            let used = end.unwrap_or(buf.len());
            if capture {
                self.scratch.extend_from_slice(&buf[..used]);
            }
            self.reader.consume(used);
            if end.is_some() {
                return Ok(());
            }
        }
    }

    /// Walk root members until `features`. Returns `false` when the root
    /// object closes without one.
    fn seek_features(&mut self) -> Result<bool> {
        self.expect(b'{', "at document root")?;
        loop {
            match self.skip_ws()? {
                Some(b'}') => {
                    self.reader.consume(1);
                    return Ok(false);
                }
                Some(b',') => {
                    self.reader.consume(1);
                    continue;
                }
                Some(b'"') => {}
                Some(b) => {
                    return Err(GeoAddressError::decode(format!(
                        "unexpected '{}' between root members",
                        b as char
                    )));
                }
                None => return Err(unexpected_eof("in the root object")),
            }

            self.scratch.clear();
            self.read_delimited(true)?;
            let key: String = serde_json::from_slice(&self.scratch)
                .map_err(|e| GeoAddressError::decode(format!("invalid member name: {e}")))?;
            self.expect(b':', "after a member name")?;

            if key == FEATURES_MEMBER {
                return match self.skip_ws()? {
                    Some(b'[') => {
                        self.reader.consume(1);
                        Ok(true)
                    }
                    Some(_) => Err(GeoAddressError::decode("`features` member is not an array")),
                    None => Err(unexpected_eof("after `features`")),
                };
            }

            debug!("Skipping root member {key:?}");
            self.read_value(false)?;
        }
    }

    fn next_element(&mut self) -> Result<Option<DecodedFeature>> {
        let mut next = self.skip_ws()?;
        if next == Some(b',') {
            self.reader.consume(1);
            next = self.skip_ws()?;
        }
        match next {
            None => Err(unexpected_eof("inside the `features` array")),
            Some(b']') => {
                self.reader.consume(1);
                self.state = StreamState::Done;
                Ok(None)
            }
            Some(b @ (b'}' | b':' | b',')) => Err(GeoAddressError::decode(format!(
                "unexpected '{}' in the `features` array after element {}",
                b as char, self.index
            ))),
            Some(_) => {
                if self.scratch.capacity() > SCRATCH_RETAIN {
                    self.scratch = Vec::with_capacity(4096);
                }
                self.scratch.clear();
                self.read_value(true)?;
                // Every element has to move the reader forward.
                if self.scratch.is_empty() {
                    return Err(GeoAddressError::decode(format!(
                        "empty element {} in the `features` array",
                        self.index
                    )));
                }

                let index = self.index;
                self.index += 1;
                let outcome = match serde_json::from_slice::<Feature>(&self.scratch) {
                    Ok(feature) => DecodedFeature::Feature(feature),
                    Err(e) => DecodedFeature::Malformed {
                        index,
                        reason: e.to_string(),
                    },
                };
                Ok(Some(outcome))
            }
        }
    }
}

impl<R: BufRead> Iterator for FeatureStream<R> {
    type Item = Result<DecodedFeature>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let result = match self.state {
                StreamState::Done => return None,
                StreamState::Header => match self.seek_features() {
                    Ok(true) => {
                        self.state = StreamState::Features;
                        continue;
                    }
                    Ok(false) => {
                        warn!("Document has no `{FEATURES_MEMBER}` member");
                        self.state = StreamState::Done;
                        return None;
                    }
                    Err(e) => Err(e),
                },
                StreamState::Features => self.next_element(),
            };

            return match result {
                Ok(Some(outcome)) => Some(Ok(outcome)),
                Ok(None) => None,
                Err(e) => {
                    self.state = StreamState::Done;
                    Some(Err(e))
                }
            };
        }
    }
}

fn unexpected_eof(context: &str) -> GeoAddressError {
    GeoAddressError::decode(format!("unexpected end of input {context}"))
}

/// Tracks nesting and string state across buffer refills.
#[derive(Debug, Default)]
struct ValueScan {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ValueScan {
    /// Consume bytes of `buf`. Returns how many bytes belong to the value and
    /// whether the value ended within them.
    fn feed(&mut self, buf: &[u8]) -> (usize, bool) {
        for (i, &b) in buf.iter().enumerate() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return (i + 1, true);
                    }
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return (i + 1, true);
                    }
                }
                _ => {}
            }
        }
        (buf.len(), false)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::geojson::feature::GeometryType;

    fn decode_all(input: &str) -> Vec<Result<DecodedFeature>> {
        FeatureStream::new(Cursor::new(input.as_bytes().to_vec())).collect()
    }

    fn point(street: &str) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"addr:street":"{street}"}},"geometry":{{"type":"Point","coordinates":[1.0,2.0]}}}}"#
        )
    }

    #[test]
    fn test_yields_each_feature() {
        let input = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            point("A"),
            point("B")
        );
        let outcomes = decode_all(&input);
        assert_eq!(outcomes.len(), 2);
        for outcome in outcomes {
            match outcome.unwrap() {
                DecodedFeature::Feature(f) => {
                    assert_eq!(f.geometry.unwrap().kind, GeometryType::Point)
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_skips_other_root_members() {
        let input = format!(
            r#"{{"name": "x", "bbox": [1, 2, [3, "]"]], "meta": {{"a": "}}"}}, "count": 12,
               "features": [ {} ], "trailing": {{ "ignored": true }} }}"#,
            point("Bergstraße")
        );
        let outcomes = decode_all(&input);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Ok(DecodedFeature::Feature(_))));
    }

    #[test]
    fn test_malformed_feature_is_skipped() {
        let input = format!(
            r#"{{"features":[{}, {{"geometry": 5, "properties": "oops"}}, 17, {}]}}"#,
            point("A"),
            point("B")
        );
        let outcomes: Vec<DecodedFeature> =
            decode_all(&input).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[1], DecodedFeature::Malformed { index: 1, .. }));
        assert!(matches!(outcomes[2], DecodedFeature::Malformed { index: 2, .. }));
        assert!(matches!(outcomes[3], DecodedFeature::Feature(_)));
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        let input = r#"{"features":[{"properties":{"addr:street":"Am \"Ring\" }]"},"geometry":null}]}"#;
        let outcomes = decode_all(input);
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Ok(DecodedFeature::Feature(f)) => assert_eq!(
                f.properties.text("addr:street").as_deref(),
                Some("Am \"Ring\" }]")
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_features_member() {
        assert!(decode_all(r#"{"type": "FeatureCollection"}"#).is_empty());
    }

    #[test]
    fn test_empty_features_array() {
        assert!(decode_all(r#"{"features": []}"#).is_empty());
    }

    #[test]
    fn test_root_must_be_object() {
        let outcomes = decode_all("[1, 2]");
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(GeoAddressError::Decode(_))));
    }

    #[test]
    fn test_truncated_input_is_fatal() {
        let input = format!(r#"{{"features":[{}, {{"properties": {{"#, point("A"));
        let outcomes = decode_all(&input);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_err());
    }

    #[test]
    fn test_stray_brace_in_array_is_fatal() {
        let input = format!(r#"{{"features":[{} }} ]}}"#, point("A"));
        let outcomes: Vec<_> = FeatureStream::new(Cursor::new(input.into_bytes()))
            .take(10)
            .collect();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], Ok(DecodedFeature::Feature(_))));
        assert!(matches!(outcomes[1], Err(GeoAddressError::Decode(_))));
    }

    #[test]
    fn test_array_closed_by_brace_is_fatal() {
        let outcomes: Vec<_> = FeatureStream::new(Cursor::new(br#"{"features":[}"#.to_vec()))
            .take(10)
            .collect();
        assert!(matches!(outcomes.as_slice(), [Err(GeoAddressError::Decode(_))]));
    }

    #[test]
    fn test_stray_separators_are_fatal() {
        for input in [r#"{"features":[,,]}"#, r#"{"features":[{} : {}]}"#] {
            let outcomes: Vec<_> = FeatureStream::new(Cursor::new(input.as_bytes().to_vec()))
                .take(10)
                .collect();
            assert!(
                matches!(outcomes.last(), Some(Err(GeoAddressError::Decode(_)))),
                "{input}: {outcomes:?}"
            );
            assert!(outcomes.len() <= 2, "{input}: {outcomes:?}");
        }
    }

    #[test]
    fn test_features_not_array() {
        let outcomes = decode_all(r#"{"features": {"a": 1}}"#);
        assert!(matches!(outcomes.as_slice(), [Err(GeoAddressError::Decode(_))]));
    }

    #[test]
    fn test_small_read_buffer() {
        let input = format!(
            r#"{{"features":[{},{},{}]}}"#,
            point("Lange Straße"),
            point("Kurze Gasse"),
            point("Weg")
        );
        let reader = BufReader::with_capacity(3, Cursor::new(input.into_bytes()));
        let mut stream = FeatureStream::new(reader);
        let count = stream.by_ref().filter(|r| r.is_ok()).count();
        assert_eq!(count, 3);
        assert_eq!(stream.elements_read(), 3);
    }

    #[test]
    fn test_value_scan_across_chunks() {
        let mut scan = ValueScan::default();
        assert_eq!(scan.feed(br#"{"a": "x\"#), (9, false));
        assert_eq!(scan.feed(br#""}"}, 1"#), (4, true));
    }
}
