//! Collaborator contracts the core consumes from its host.

use mapdoc_breakout::BreakoutControls;
use mapdoc_error::{MapdocError, Result};
use mapdoc_types::{Field, Record, RecordId};

/// Builds detached records from field parameters.
///
/// The returned record is not attached to any collection; insertion is the
/// caller's (command's) job. Fails when a mandatory field is missing.
pub trait RecordFactory {
    /// Build one record, minting an id unless an explicit one is given.
    fn create(&self, fields: Vec<Field>, explicit_id: Option<RecordId>) -> Result<Record>;
}

/// Supplies the valid value set for select-type fields.
///
/// Values come back as `(value, display label)` pairs and feed breakout
/// option lists.
pub trait TaxonomySource {
    /// The configured values for `field`.
    fn values(&self, field: &str) -> Result<Vec<(String, String)>>;
}

/// A factory that enforces a fixed mandatory-field list.
#[derive(Debug, Clone, Default)]
pub struct BasicRecordFactory {
    mandatory: Vec<String>,
}

impl BasicRecordFactory {
    /// A factory requiring the given fields on every record.
    #[must_use]
    pub fn new(mandatory: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { mandatory: mandatory.into_iter().map(Into::into).collect() }
    }
}

impl RecordFactory for BasicRecordFactory {
    fn create(&self, fields: Vec<Field>, explicit_id: Option<RecordId>) -> Result<Record> {
        for required in &self.mandatory {
            if !fields.iter().any(|f| &f.key == required) {
                return Err(MapdocError::MissingField { field: required.clone() });
            }
        }
        Ok(match explicit_id {
            Some(id) => Record::with_id(id, fields),
            None => Record::new(fields),
        })
    }
}

/// Pull option lists for every registered control from the taxonomy source.
///
/// A source failure for one field propagates; callers decide whether a
/// partially-populated control list is acceptable.
pub fn populate_options(
    controls: &mut BreakoutControls,
    source: &dyn TaxonomySource,
) -> Result<()> {
    let fields: Vec<String> = controls
        .entries()
        .iter()
        .map(|e| e.field.clone())
        .collect();
    for field in fields {
        let options = source.values(&field)?;
        controls.set_options(&field, options)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapdoc_types::FieldValue;

    fn field(key: &str, value: &str) -> Field {
        Field { key: key.into(), value: FieldValue::Text(value.into()) }
    }

    #[test]
    fn test_factory_rejects_missing_mandatory_field() {
        let factory = BasicRecordFactory::new(["title"]);
        let err = factory.create(vec![field("note", "x")], None).unwrap_err();
        assert!(matches!(err, MapdocError::MissingField { .. }));
    }

    #[test]
    fn test_factory_honors_explicit_id() {
        let factory = BasicRecordFactory::new(["title"]);
        let id = RecordId::mint();
        let record = factory
            .create(vec![field("title", "t")], Some(id))
            .unwrap();
        assert_eq!(record.id(), id);
        assert_eq!(record.owner(), None);
    }

    #[test]
    fn test_populate_options_fills_registered_controls() {
        struct Fixed;
        impl TaxonomySource for Fixed {
            fn values(&self, field: &str) -> mapdoc_error::Result<Vec<(String, String)>> {
                Ok(vec![(format!("{field}-v"), format!("{field} label"))])
            }
        }
        let mut controls = BreakoutControls::new();
        controls.register("status");
        populate_options(&mut controls, &Fixed).unwrap();
        assert_eq!(
            controls.value_label("status", Some("status-v")),
            "status label"
        );
    }
}
