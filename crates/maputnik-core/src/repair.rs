//! Validation plus best-effort repair.
//!
//! A candidate document is never rejected. When it has errors, a copy with
//! each offending property removed is derived so the live preview keeps
//! rendering. That copy is display-only: it is neither persisted nor
//! recorded in history.

use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::{ValidationError, duplicate_empty_ids_in_value};
use crate::document::StyleDocument;
use crate::error::Result;
use crate::path::{JsonPath, reduce_error_path};
use crate::validate::StyleValidator;

/// A repaired, display-only copy of an invalid document.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyStyleDocument(Value);

impl DirtyStyleDocument {
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Outcome of validating a candidate document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Synthesized errors first, then validator errors in validator order.
    pub errors: Vec<ValidationError>,
    /// Present exactly when `errors` is non-empty.
    pub dirty: Option<DirtyStyleDocument>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a typed document.
pub fn validate_style(
    validator: &dyn StyleValidator,
    style: &StyleDocument,
) -> Result<ValidationReport> {
    Ok(validate_value(validator, &style.to_value()?))
}

/// Validate a JSON document and derive the repaired copy when needed.
#[must_use]
pub fn validate_value(validator: &dyn StyleValidator, style: &Value) -> ValidationReport {
    let mut errors = duplicate_empty_ids_in_value(style);
    errors.extend(
        validator
            .validate(style)
            .into_iter()
            .map(ValidationError::classify),
    );

    if errors.is_empty() {
        return ValidationReport::default();
    }
    debug!(count = errors.len(), "style has validation errors");
    let dirty = DirtyStyleDocument(repair(style, &errors));
    ValidationReport {
        errors,
        dirty: Some(dirty),
    }
}

/// Remove every property an error points at from a copy of `style`.
///
/// Errors that do not address a property below an indexed element, and
/// paths that cannot be parsed, are logged and skipped.
#[must_use]
pub fn repair(style: &Value, errors: &[ValidationError]) -> Value {
    let mut repaired = style.clone();
    for error in errors {
        let Some(reduced) = reduce_error_path(&error.message) else {
            warn!(error = %error.message, "validation error has no repairable path");
            continue;
        };
        match reduced.parse::<JsonPath>() {
            Ok(path) => {
                if path.remove(&mut repaired).is_some() {
                    debug!(%path, "removed invalid property");
                }
            }
            Err(err) => warn!(path = reduced, error = %err, "cannot repair path"),
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::SpecValidator;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Debug, Clone)]
    struct CapturedEvent {
        level: tracing::Level,
        fields: Vec<(String, String)>,
    }

    impl CapturedEvent {
        fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        }
    }

    struct FieldVisitor(Vec<(String, String)>);

    impl tracing::field::Visit for FieldVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{value:?}")));
        }
        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.0.push((field.name().to_string(), value.to_string()));
        }
    }

    struct EventCapture(Arc<Mutex<Vec<CapturedEvent>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = FieldVisitor(Vec::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(CapturedEvent {
                level: *event.metadata().level(),
                fields: visitor.0,
            });
        }
    }

    fn with_captured_events(f: impl FnOnce()) -> Vec<CapturedEvent> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(EventCapture(Arc::clone(&events)));
        tracing::subscriber::with_default(subscriber, f);
        events.lock().unwrap().clone()
    }

    fn invalid_fill() -> Value {
        json!({
            "version": 8,
            "sources": {"osm": {"type": "vector", "url": "https://example.com/t.json"}},
            "layers": [{
                "id": "water", "type": "fill", "source": "osm", "source-layer": "water",
                "paint": {"fill-color": 5, "fill-opacity": 0.5}
            }]
        })
    }

    #[test]
    fn valid_documents_have_no_dirty_copy() {
        let mut style = invalid_fill();
        style["layers"][0]["paint"]["fill-color"] = json!("#00f");
        let report = validate_value(&SpecValidator, &style);
        assert!(report.is_valid());
        assert!(report.dirty.is_none());
    }

    #[test]
    fn repair_with_no_errors_is_identity() {
        let style = invalid_fill();
        assert_eq!(repair(&style, &[]), style);
    }

    #[test]
    fn invalid_property_is_removed_from_dirty_copy() {
        let style = invalid_fill();
        let report = validate_value(&SpecValidator, &style);
        assert_eq!(report.errors.len(), 1);
        let dirty = report.dirty.unwrap().into_value();
        assert_eq!(dirty["layers"][0]["paint"], json!({"fill-opacity": 0.5}));
        // The input is untouched.
        assert_eq!(style["layers"][0]["paint"]["fill-color"], json!(5));
    }

    #[test]
    fn deep_paths_reduce_to_the_property() {
        let style = json!({"layers": [{"filter": ["all", ["==", ["get", 1]]], "id": "a"}]});
        let errors = [ValidationError::classify("layers[0].filter[1][1][0]: bad")];
        assert_eq!(repair(&style, &errors), json!({"layers": [{"id": "a"}]}));
    }

    #[test]
    fn unrepairable_errors_are_skipped() {
        let style = invalid_fill();
        let errors = [
            ValidationError::classify("layers[0]: source \"x\" not found"),
            ValidationError::classify("version: expected one of [8], 7 found"),
            ValidationError::classify("layers[9].paint.fill-color: missing layer"),
        ];
        assert_eq!(repair(&style, &errors), style);
    }

    #[test]
    fn skipped_errors_are_logged_as_warnings() {
        let style = invalid_fill();
        let errors = [
            ValidationError::classify("version: expected one of [8], 7 found"),
            ValidationError::classify("layers[0].paint.fill-color: color expected"),
        ];
        let events = with_captured_events(|| {
            let _ = repair(&style, &errors);
        });

        let warnings: Vec<_> = events
            .iter()
            .filter(|event| event.level == tracing::Level::WARN)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].field("error"),
            Some("version: expected one of [8], 7 found")
        );
        assert!(
            warnings[0]
                .field("message")
                .is_some_and(|message| message.contains("no repairable path"))
        );
        assert!(events.iter().any(|event| event.level == tracing::Level::DEBUG));
    }

    #[test]
    fn synthesized_errors_come_first() {
        let style = json!({
            "version": 8,
            "sources": {},
            "layers": [
                {"id": "", "type": "background"},
                {"id": "", "type": "background", "paint": {"background-color": 1}}
            ]
        });
        let report = validate_value(&SpecValidator, &style);
        let messages: Vec<_> = report.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "layers[1]: duplicate layer id [empty_string], previously used",
                "layers[1].paint.background-color: color expected, number found",
            ]
        );
    }

    #[test]
    fn typed_documents_validate_through_json() {
        let style = StyleDocument::from_value(invalid_fill()).unwrap();
        let report = validate_style(&SpecValidator, &style).unwrap();
        assert_eq!(
            report.errors[0].parsed.as_ref().map(|p| p.key.as_str()),
            Some("paint.fill-color")
        );
    }
}
