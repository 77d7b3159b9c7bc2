//! Playback windows declared by `/MediaClip` dictionaries.
//!
//! Three layouts are seen in the wild, all in seconds:
//!
//! * `/C [start end]`
//! * `/C << /S start /D duration >>` or `/C << /S start /E end >>`
//! * `/S start` with `/D duration` or `/E end` on the clip itself
//!
//! Any of the numbers may also be a media timespan, `<< /V n >>` or
//! `<< /T << /V n >> >>`.

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::media::TimeWindow;
use crate::pdf_utils::object_number;
use crate::walker::{resolve, resolve_array, resolve_dict};

/// Upper bound on `/V` and `/T` wrappers around one timespan value.
const MAX_TIMESPAN_NESTING: usize = 8;

/// Derive a time window from a MediaClip dictionary.
///
/// Returns `None` when no complete range can be read. When both `/E` and
/// `/D` are present, `/E` wins.
pub fn time_window_from_media_clip(document: &Document, clip: &Dictionary) -> Option<TimeWindow> {
    if let Ok(c) = clip.get(b"C") {
        if let Some(items) = resolve_array(document, c) {
            if items.len() >= 2 {
                let start = seconds(document, &items[0])?;
                let end = seconds(document, &items[1])?;
                return Some(window(start, end));
            }
        } else if let Some(range) = resolve_dict(document, c) {
            // A missing start inside /C means the clip begins at zero.
            let start = field_seconds(document, range, b"S").unwrap_or(0.0);
            if let Some(end) = end_seconds(document, range, start) {
                return Some(window(start, end));
            }
        }
    }

    let start = field_seconds(document, clip, b"S")?;
    let end = end_seconds(document, clip, start)?;
    Some(window(start, end))
}

fn end_seconds(document: &Document, dict: &Dictionary, start: f64) -> Option<f64> {
    if let Some(end) = field_seconds(document, dict, b"E") {
        return Some(end);
    }
    field_seconds(document, dict, b"D").map(|duration| start + duration)
}

fn field_seconds(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    dict.get(key).ok().and_then(|v| seconds(document, v))
}

/// A plain number, or a timespan dictionary wrapping one through `/V` or
/// `/T`. Wrappers nested deeper than [`MAX_TIMESPAN_NESTING`], including
/// ones that loop back on themselves, yield `None`.
fn seconds(document: &Document, obj: &Object) -> Option<f64> {
    let mut current = obj;
    for _ in 0..MAX_TIMESPAN_NESTING {
        let resolved = resolve(document, current)?;
        if let Some(n) = object_number(resolved) {
            return Some(n as f64);
        }

        let dict = resolved.as_dict().ok()?;
        current = match dict.get(b"V") {
            Ok(v) => v,
            Err(_) => dict.get(b"T").ok()?,
        };
    }

    debug!("media timespan nested too deeply");
    None
}

fn window(start: f64, end: f64) -> TimeWindow {
    let tw = TimeWindow::new((start * 1000.0).round() as i64, (end * 1000.0).round() as i64);
    debug!(start_ms = tw.start_ms, end_ms = tw.end_ms, "media clip window");
    tw
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn doc() -> Document {
        Document::with_version("1.5")
    }

    #[test]
    fn start_and_duration_on_the_clip() {
        let clip = dictionary! { "S" => Object::Real(2.0), "D" => Object::Real(3.0) };
        assert_eq!(time_window_from_media_clip(&doc(), &clip), Some(TimeWindow::new(2000, 5000)));
    }

    #[test]
    fn end_takes_precedence_over_duration() {
        let clip = dictionary! { "S" => 1, "D" => 10, "E" => 4 };
        assert_eq!(time_window_from_media_clip(&doc(), &clip), Some(TimeWindow::new(1000, 4000)));
    }

    #[test]
    fn clip_array_is_start_and_end() {
        let clip = dictionary! { "C" => vec![Object::Real(1.5), Object::Integer(7)] };
        assert_eq!(time_window_from_media_clip(&doc(), &clip), Some(TimeWindow::new(1500, 7000)));
    }

    #[test]
    fn clip_dictionary_defaults_start_to_zero() {
        let clip = dictionary! { "C" => dictionary! { "D" => Object::Real(2.25) } };
        assert_eq!(time_window_from_media_clip(&doc(), &clip), Some(TimeWindow::new(0, 2250)));
    }

    #[test]
    fn timespan_wrappers_are_unwrapped() {
        let clip = dictionary! {
            "S" => dictionary! { "V" => 3 },
            "E" => dictionary! { "T" => dictionary! { "V" => Object::Real(4.5) } },
        };
        assert_eq!(time_window_from_media_clip(&doc(), &clip), Some(TimeWindow::new(3000, 4500)));
    }

    #[test]
    fn self_referencing_timespan_yields_nothing() {
        let mut d = doc();
        let span = d.new_object_id();
        d.objects.insert(span, Object::Dictionary(dictionary! { "V" => span }));
        let clip = dictionary! { "S" => span, "D" => 1 };
        assert_eq!(time_window_from_media_clip(&d, &clip), None);

        let looped = d.new_object_id();
        d.objects.insert(looped, Object::Dictionary(dictionary! { "T" => dictionary! { "V" => looped } }));
        let clip = dictionary! { "C" => vec![Object::Integer(0), Object::Reference(looped)] };
        assert_eq!(time_window_from_media_clip(&d, &clip), None);
    }

    #[test]
    fn referenced_clip_range_is_resolved() {
        let mut d = doc();
        let range = d.add_object(dictionary! { "S" => 2, "E" => 6 });
        let clip = dictionary! { "C" => range };
        assert_eq!(time_window_from_media_clip(&d, &clip), Some(TimeWindow::new(2000, 6000)));
    }

    #[test]
    fn start_without_end_yields_nothing() {
        assert_eq!(time_window_from_media_clip(&doc(), &dictionary! { "S" => 2 }), None);
        assert_eq!(time_window_from_media_clip(&doc(), &Dictionary::new()), None);
        let bad = dictionary! { "C" => vec![Object::Integer(1), Object::Name(b"x".to_vec())] };
        assert_eq!(time_window_from_media_clip(&doc(), &bad), None);
    }
}
